use crate::model::RecordKind;
use std::collections::BTreeMap;

/// Counters collected over one workload run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkloadStats {
    /// Records created, per kind, across both stores
    pub created: BTreeMap<RecordKind, u64>,
    /// Churn units applied to the cache
    pub cache_updates: u64,
    /// Pinned MediumThings deleted by churn
    pub cache_deletions: u64,
    /// Unpinned records deleted by sync passes
    pub sync_deletions: u64,
    /// Items that reused an existing MediumThing
    pub linked_existing: u64,
    pub rounds: u64,
    pub days: u64,
    pub items: u64,
    /// Values drawn from the scenario stream
    pub draws: u64,
    /// Draw mapping the run was made with, see `simulator::RNG_VERSION`
    pub rng_version: u32,
}

impl WorkloadStats {
    pub fn record_created(&mut self, kind: RecordKind) {
        *self.created.entry(kind).or_insert(0) += 1;
    }

    pub fn created(&self, kind: RecordKind) -> u64 {
        self.created.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_created(&self) -> u64 {
        self.created.values().sum()
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        let per_kind: Vec<String> = RecordKind::ALL
            .iter()
            .map(|&kind| format!("{}={}", kind, self.created(kind)))
            .collect();
        format!(
            "rounds={} days={} items={} created[{}] cache_updates={} cache_deletions={} sync_deletions={} linked_existing={} draws={} rng_version={}",
            self.rounds,
            self.days,
            self.items,
            per_kind.join(" "),
            self.cache_updates,
            self.cache_deletions,
            self.sync_deletions,
            self.linked_existing,
            self.draws,
            self.rng_version,
        )
    }
}
