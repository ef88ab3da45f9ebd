//! Record Model
//!
//! Five linked record kinds that make up the churn workload. Records are
//! plain data: generation draws come from a caller-supplied
//! [`DeterministicRng`](crate::simulator::DeterministicRng) and nothing here
//! touches a store.
//!
//! ## Linkage
//!
//! ```text
//! SmallThing2 ──▶ SmallThing1
//! LargeThing  ──▶ MediumThing
//! HugeThing   ──▶ SmallThing1, SmallThing2, MediumThing, LargeThing
//! ```
//!
//! Links are identifiers only. Nothing checks that a target still exists.

mod record;

pub use record::{
    HugeLinks, ModelError, Record, RecordId, Thing, CREATED_ON_MAX_SECS, CREATED_ON_MIN_SECS,
    PAYLOAD_ALPHABET, VERSION_MAX, VERSION_MIN,
};

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Discriminant of a [`Thing`], used for store partitioning and scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordKind {
    SmallThing1,
    SmallThing2,
    MediumThing,
    LargeThing,
    HugeThing,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::SmallThing1,
        RecordKind::SmallThing2,
        RecordKind::MediumThing,
        RecordKind::LargeThing,
        RecordKind::HugeThing,
    ];

    /// Kinds permitted in the small store
    pub const SMALL_STORE: [RecordKind; 2] = [RecordKind::SmallThing1, RecordKind::SmallThing2];

    /// Kinds permitted in the large store
    pub const LARGE_STORE: [RecordKind; 4] = [
        RecordKind::SmallThing1,
        RecordKind::MediumThing,
        RecordKind::LargeThing,
        RecordKind::HugeThing,
    ];

    /// Payload length range in bytes, inclusive on both ends.
    pub const fn size_range(self) -> RangeInclusive<u64> {
        match self {
            RecordKind::SmallThing1 | RecordKind::SmallThing2 => 500..=1_000,
            RecordKind::MediumThing => 4_000..=10_000,
            RecordKind::LargeThing => 16_000..=256_000,
            RecordKind::HugeThing => 750_000..=2_000_000,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            RecordKind::SmallThing1 => "SmallThing1",
            RecordKind::SmallThing2 => "SmallThing2",
            RecordKind::MediumThing => "MediumThing",
            RecordKind::LargeThing => "LargeThing",
            RecordKind::HugeThing => "HugeThing",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
