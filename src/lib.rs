//! Deterministic cache-churn workload against a pair of encrypted record
//! stores, for reproducing store corruption around compaction.

pub mod actions;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod simulator;
pub mod store;
pub mod workload;

pub use actions::{Actions, Status};
pub use error::{Error, PolicyViolation, Result};
pub use lifecycle::StoreLifecycle;
pub use model::{Record, RecordKind};
pub use simulator::DeterministicRng;
pub use store::{FileRecordStore, InMemoryRecordStore, RecordStore, StoreError};
pub use workload::{ScenarioConfig, StressTester, WorkloadStats};
