//! Workload Simulator
//!
//! [`StressTester`] replays a [`ScenarioConfig`] against any pair of
//! [`RecordStore`](crate::store::RecordStore)s and reports what it did in
//! [`WorkloadStats`]. The [`dst`] harness runs it across seed batches and
//! checks the workload's invariants.

mod config;
pub mod dst;
mod stats;
mod stress;

pub use config::{ConfigError, CountRange, ScenarioConfig};
pub use dst::{
    fingerprint, run_workload_dst_batch, summarize_workload_dst_batch, RecordPrint,
    WorkloadDSTHarness, WorkloadDSTResult,
};
pub use stats::WorkloadStats;
pub use stress::StressTester;
