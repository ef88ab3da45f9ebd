//! Workload Deterministic Simulation Testing Harness
//!
//! Runs a scenario on in-memory stores and checks, per seed:
//!
//! - **Initial cache scale**: seeded MediumThing count is within `initial_cached_data`
//! - **Cache retention**: after every sync pass only pinned records remain,
//!   and no pinned record was lost
//! - **Partition integrity**: each store holds only its permitted kinds
//! - **Linkage closure**: every link on a surviving record resolves
//! - **Replay determinism**: a second plain run with the same seed yields
//!   the same fingerprint and counters
//!
//! Record ids are random, so fingerprints compare link targets by their
//! insertion rank instead of by id.

use super::{ScenarioConfig, StressTester, WorkloadStats};
use crate::model::{Record, RecordKind};
use crate::store::{InMemoryRecordStore, RecordStore};
use chrono::{DateTime, Utc};

/// Seed-independent view of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPrint {
    pub kind: RecordKind,
    pub created_on: DateTime<Utc>,
    pub version: Option<u8>,
    pub payload_len: usize,
    pub payload_char: Option<char>,
    pub keep_cached: bool,
    /// Insertion rank of each link target among records of its kind,
    /// `None` when the target no longer exists
    pub links: Vec<Option<usize>>,
}

/// Fingerprint of a store pair: small-store records, then large-store
/// records, each in insertion order.
pub fn fingerprint<S: RecordStore, L: RecordStore>(small: &S, large: &L) -> Vec<RecordPrint> {
    let mut prints = Vec::with_capacity(small.len() + large.len());
    for kind in small.permitted_kinds() {
        for record in small.objects(*kind) {
            prints.push(print(record, small, large));
        }
    }
    for kind in large.permitted_kinds() {
        for record in large.objects(*kind) {
            prints.push(print(record, small, large));
        }
    }
    prints
}

fn print<S: RecordStore, L: RecordStore>(record: &Record, small: &S, large: &L) -> RecordPrint {
    let links = record
        .link_targets()
        .into_iter()
        .map(|(kind, id)| {
            let candidates = match kind {
                // Small-kind links always point into the small store
                RecordKind::SmallThing1 | RecordKind::SmallThing2 => small.objects(kind),
                _ => large.objects(kind),
            };
            candidates.iter().position(|r| &r.id == id)
        })
        .collect();

    RecordPrint {
        kind: record.kind(),
        created_on: record.created_on,
        version: record.version,
        payload_len: record.payload_len(),
        payload_char: record.data.as_ref().and_then(|d| d.chars().next()),
        keep_cached: record.keep_cached,
        links,
    }
}

/// Result of a single DST run
#[derive(Debug)]
pub struct WorkloadDSTResult {
    pub seed: u64,
    pub stats: WorkloadStats,
    pub small_records: usize,
    pub large_records: usize,
    /// Sync passes whose outcome was checked
    pub retention_checks: u64,
    pub passed: bool,
    pub error_message: Option<String>,
}

pub struct WorkloadDSTHarness {
    seed: u64,
    scenario: ScenarioConfig,
}

impl WorkloadDSTHarness {
    /// `scenario.seed` is replaced by `seed`.
    pub fn new(seed: u64, scenario: ScenarioConfig) -> Self {
        WorkloadDSTHarness {
            seed,
            scenario: scenario.with_seed(seed),
        }
    }

    pub fn run(&self) -> WorkloadDSTResult {
        let mut small = InMemoryRecordStore::small();
        let mut large = InMemoryRecordStore::large();
        let mut retention_checks = 0;

        let outcome = self.run_checked(&mut small, &mut large, &mut retention_checks);
        let (stats, error_message) = match outcome {
            Ok(stats) => (stats, self.check_final(&small, &large).err()),
            Err(msg) => (WorkloadStats::default(), Some(msg)),
        };
        let error_message = error_message.or_else(|| self.check_replay(&small, &large, &stats).err());

        WorkloadDSTResult {
            seed: self.seed,
            stats,
            small_records: small.len(),
            large_records: large.len(),
            retention_checks,
            passed: error_message.is_none(),
            error_message,
        }
    }

    /// Same step sequence as [`StressTester::run`], with checks in between.
    fn run_checked(
        &self,
        small: &mut InMemoryRecordStore,
        large: &mut InMemoryRecordStore,
        retention_checks: &mut u64,
    ) -> Result<WorkloadStats, String> {
        self.scenario.validate().map_err(|e| e.to_string())?;
        let mut tester = StressTester::new(self.scenario.clone(), small, large);

        tester.simulate_initial_cache().map_err(|e| e.to_string())?;
        let seeded = tester.large().objects(RecordKind::MediumThing).len() as u64;
        if !self.scenario.initial_cached_data.contains(seeded) {
            return Err(format!(
                "initial cache holds {} MediumThings, outside {}",
                seeded, self.scenario.initial_cached_data
            ));
        }

        let rounds = tester.draw_rounds();
        for round in 1..=rounds {
            tester.simulate_cache_update().map_err(|e| e.to_string())?;
            let pinned_before: Vec<String> = pinned_ids(tester.small())
                .into_iter()
                .chain(pinned_ids(tester.large()))
                .collect();

            tester.simulate_sync().map_err(|e| e.to_string())?;
            check_retention(tester.small(), tester.large(), &pinned_before)
                .map_err(|e| format!("round {}: {}", round, e))?;
            *retention_checks += 1;

            tester.simulate_offline_days().map_err(|e| e.to_string())?;
        }
        Ok(tester.finish())
    }

    fn check_final(&self, small: &InMemoryRecordStore, large: &InMemoryRecordStore) -> Result<(), String> {
        for (store_name, store_kinds, records) in [
            ("small", &RecordKind::SMALL_STORE[..], small.iter().collect::<Vec<_>>()),
            ("large", &RecordKind::LARGE_STORE[..], large.iter().collect::<Vec<_>>()),
        ] {
            if let Some(r) = records.iter().find(|r| !store_kinds.contains(&r.kind())) {
                return Err(format!("{} store holds a {}", store_name, r.kind()));
            }
        }

        for p in fingerprint(small, large) {
            if p.links.iter().any(Option::is_none) {
                return Err(format!("{} has a dangling link", p.kind));
            }
        }
        Ok(())
    }

    /// Plain run with the same seed must match exactly.
    fn check_replay(
        &self,
        small: &InMemoryRecordStore,
        large: &InMemoryRecordStore,
        stats: &WorkloadStats,
    ) -> Result<(), String> {
        let mut replay_small = InMemoryRecordStore::small();
        let mut replay_large = InMemoryRecordStore::large();
        let replay_stats = StressTester::new(self.scenario.clone(), &mut replay_small, &mut replay_large)
            .run()
            .map_err(|e| format!("replay failed: {}", e))?;

        if &replay_stats != stats {
            return Err(format!(
                "replay counters differ: {} vs {}",
                replay_stats.summary(),
                stats.summary()
            ));
        }
        if fingerprint(&replay_small, &replay_large) != fingerprint(small, large) {
            return Err("replay produced different records".to_string());
        }
        Ok(())
    }
}

fn pinned_ids<S: RecordStore>(store: &S) -> Vec<String> {
    store
        .permitted_kinds()
        .iter()
        .flat_map(|&kind| store.objects(kind))
        .filter(|r| r.keep_cached)
        .map(|r| r.id.clone())
        .collect()
}

fn check_retention<S: RecordStore, L: RecordStore>(
    small: &S,
    large: &L,
    pinned_before: &[String],
) -> Result<(), String> {
    let remaining = small.len() + large.len();
    if remaining != pinned_before.len() {
        return Err(format!(
            "{} records after sync, {} were pinned",
            remaining,
            pinned_before.len()
        ));
    }
    for id in pinned_before {
        let kept = small.get(id).or_else(|| large.get(id));
        match kept {
            Some(r) if r.keep_cached => {}
            Some(_) => return Err(format!("record {} lost its pin", id)),
            None => return Err(format!("pinned record {} deleted by sync", id)),
        }
    }
    Ok(())
}

/// Run a batch of DST tests across multiple seeds
pub fn run_workload_dst_batch(
    seeds: std::ops::Range<u64>,
    scenario: ScenarioConfig,
) -> Vec<WorkloadDSTResult> {
    seeds
        .map(|seed| WorkloadDSTHarness::new(seed, scenario.clone()).run())
        .collect()
}

/// Summarize batch results
pub fn summarize_workload_dst_batch(results: &[WorkloadDSTResult]) -> String {
    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = total - passed;

    let created: u64 = results.iter().map(|r| r.stats.total_created()).sum();
    let synced: u64 = results.iter().map(|r| r.stats.sync_deletions).sum();
    let checks: u64 = results.iter().map(|r| r.retention_checks).sum();

    let mut summary = format!(
        "Workload DST Batch: {}/{} passed ({} failed)\n\
         Records created: {}, Sync deletions: {}, Retention checks: {}",
        passed, total, failed, created, synced, checks
    );

    if failed > 0 {
        summary.push_str("\n\nFailed seeds:");
        for r in results.iter().filter(|r| !r.passed) {
            summary.push_str(&format!(
                "\n  Seed {}: {}",
                r.seed,
                r.error_message.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_seed_passes() {
        let result = WorkloadDSTHarness::new(1, ScenarioConfig::test(0)).run();
        assert!(result.passed, "{:?}", result.error_message);
        assert_eq!(result.retention_checks, result.stats.rounds);
        assert!(result.large_records > 0);
    }

    #[test]
    fn test_fingerprint_uses_ranks() {
        let mut small = InMemoryRecordStore::small();
        let large = InMemoryRecordStore::large();
        let a = Record::new(RecordKind::SmallThing1);
        let b = Record::new(RecordKind::SmallThing1);
        let link = Record::new(RecordKind::SmallThing2).link_small_thing1(&b).unwrap();
        for r in [&a, &b, &link] {
            small.save(r).unwrap();
        }

        let prints = fingerprint(&small, &large);
        assert_eq!(prints.len(), 3);
        assert_eq!(prints[2].links, vec![Some(1)]);
    }

    #[test]
    fn test_retention_check_catches_lost_pin() {
        let small = InMemoryRecordStore::small();
        let large = InMemoryRecordStore::large();
        let err = check_retention(&small, &large, &["gone".to_string()]).unwrap_err();
        assert!(err.contains("1 were pinned"));
    }

    #[test]
    fn test_summary_lists_failures() {
        let results = vec![WorkloadDSTResult {
            seed: 9,
            stats: WorkloadStats::default(),
            small_records: 0,
            large_records: 0,
            retention_checks: 0,
            passed: false,
            error_message: Some("boom".to_string()),
        }];
        let summary = summarize_workload_dst_batch(&results);
        assert!(summary.contains("0/1 passed"));
        assert!(summary.contains("Seed 9: boom"));
    }
}
