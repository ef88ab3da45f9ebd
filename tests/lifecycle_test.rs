//! Lifecycle Integration Tests
//!
//! Runs the workload against the encrypted file stores in a temp directory
//! and exercises the create / compact / restore cycle end to end.

use churn_sim::lifecycle::StoreLifecycle;
use churn_sim::model::RecordKind;
use churn_sim::store::{InMemoryRecordStore, RecordStore};
use churn_sim::workload::{fingerprint, CountRange, ScenarioConfig, StressTester};
use churn_sim::{Actions, Error, PolicyViolation, Status};
use std::fs;

#[test]
fn test_file_stores_match_in_memory_run() {
    for seed in 0..3 {
        let dir = tempfile::tempdir().unwrap();
        let scenario = ScenarioConfig::test(seed);

        let mut mem_small = InMemoryRecordStore::small();
        let mut mem_large = InMemoryRecordStore::large();
        let expected_stats = StressTester::new(scenario.clone(), &mut mem_small, &mut mem_large)
            .run()
            .unwrap();
        let expected = fingerprint(&mem_small, &mem_large);

        let mut lifecycle = StoreLifecycle::new(dir.path());
        {
            let (mut small, mut large) = lifecycle.open_stores(false).unwrap();
            let stats = StressTester::new(scenario, &mut small, &mut large)
                .run()
                .unwrap();
            assert_eq!(stats, expected_stats, "Seed {}: counters differ", seed);
        }

        // Replayed from disk
        let (small, large) = lifecycle.open_stores(false).unwrap();
        assert_eq!(
            fingerprint(&small, &large),
            expected,
            "Seed {}: reopened stores differ",
            seed
        );
    }
}

#[test]
fn test_compaction_after_workload_keeps_records() {
    let dir = tempfile::tempdir().unwrap();
    // The second round's sync pass deletes the first round's items
    let scenario = ScenarioConfig {
        rounds_of_offline_work: CountRange::exactly(2),
        ..ScenarioConfig::test(11)
    };

    let mut lifecycle = StoreLifecycle::new(dir.path());
    let before = {
        let (mut small, mut large) = lifecycle.open_stores(false).unwrap();
        StressTester::new(scenario, &mut small, &mut large)
            .run()
            .unwrap();
        fingerprint(&small, &large)
    };
    let large_size = fs::metadata(&lifecycle.paths().large).unwrap().len();

    // A fresh manager stands in for a restarted process
    let mut restarted = StoreLifecycle::new(dir.path());
    let (small, large) = restarted.open_stores(true).unwrap();
    assert_eq!(fingerprint(&small, &large), before);

    let compacted_size = fs::metadata(&restarted.paths().large).unwrap().len();
    assert!(
        compacted_size < large_size,
        "sync deletions should leave garbage to reclaim: {} !< {}",
        compacted_size,
        large_size
    );
    assert_eq!(large.stats().unwrap().file_size, compacted_size);
}

#[test]
fn test_actions_create_then_compact() {
    let dir = tempfile::tempdir().unwrap();

    let mut actions = Actions::new(dir.path()).with_scenario(ScenarioConfig::test(5));
    let stats = actions.create_test_databases().unwrap();
    assert!(stats.rounds >= 1);
    assert!(stats.created(RecordKind::HugeThing) >= 1);
    for path in actions
        .lifecycle()
        .paths()
        .primaries()
        .into_iter()
        .chain(actions.lifecycle().paths().backups())
    {
        assert!(path.exists(), "{} missing", path.display());
    }
    // The create pass already opened the stores in this process
    assert_eq!(
        actions.status(),
        Status {
            databases_exist: true,
            compacting_possible: false
        }
    );
    assert!(matches!(
        actions.compact_and_write(),
        Err(Error::Policy(PolicyViolation::CompactionAlreadyPerformed { .. }))
    ));

    let mut restarted = Actions::new(dir.path()).with_scenario(ScenarioConfig::test(5));
    assert!(restarted.status().compacting_possible);
    let large_before = {
        let mut probe = StoreLifecycle::new(dir.path());
        let (_small, large) = probe.open_stores(false).unwrap();
        large.len()
    };

    restarted.compact_and_write().unwrap();
    assert!(!restarted.status().compacting_possible);

    let mut probe = StoreLifecycle::new(dir.path());
    let (small, large) = probe.open_stores(false).unwrap();
    assert_eq!(large.len(), large_before + 4);
    let huge = large
        .objects(RecordKind::HugeThing)
        .into_iter()
        .last()
        .unwrap();
    let targets = huge.link_targets();
    assert!(small.get(targets[0].1).is_some());
    assert!(small.get(targets[1].1).is_some());
    assert!(large.get(targets[2].1).is_some());
    assert!(large.get(targets[3].1).is_some());

    // Only one compacting open per process
    assert!(matches!(restarted.compact_and_write(), Err(Error::Policy(_))));
}

#[test]
fn test_restore_undoes_compact_and_write() {
    let dir = tempfile::tempdir().unwrap();
    let mut actions = Actions::new(dir.path()).with_scenario(ScenarioConfig::test(8));
    actions.create_test_databases().unwrap();

    let paths = actions.lifecycle().paths().clone();
    let small_backup = fs::read(&paths.small_backup).unwrap();
    let large_backup = fs::read(&paths.large_backup).unwrap();

    Actions::new(dir.path()).compact_and_write().unwrap();
    assert_ne!(fs::read(&paths.large).unwrap(), large_backup);

    actions.restore_test_databases().unwrap();
    assert_eq!(fs::read(&paths.small).unwrap(), small_backup);
    assert_eq!(fs::read(&paths.large).unwrap(), large_backup);
}

#[test]
fn test_create_wipes_previous_run() {
    let dir = tempfile::tempdir().unwrap();
    let scenario = ScenarioConfig::test(2);

    let mut first = Actions::new(dir.path()).with_scenario(scenario.clone());
    first.create_test_databases().unwrap();
    let first_prints = {
        let mut probe = StoreLifecycle::new(dir.path());
        let (small, large) = probe.open_stores(false).unwrap();
        fingerprint(&small, &large)
    };

    // Same seed from scratch gives the same records, not a doubled store
    let mut second = Actions::new(dir.path()).with_scenario(scenario);
    second.create_test_databases().unwrap();
    let mut probe = StoreLifecycle::new(dir.path());
    let (small, large) = probe.open_stores(false).unwrap();
    assert_eq!(fingerprint(&small, &large), first_prints);
}
