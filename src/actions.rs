//! Entry points: build the test databases, then compact and write.
//!
//! The usual reproduction is `create_test_databases` once, then
//! `compact_and_write` in a fresh process. A second compaction in the
//! same process is refused by the lifecycle manager.

use crate::error::Result;
use crate::lifecycle::StoreLifecycle;
use crate::model::{Record, RecordKind};
use crate::simulator::DeterministicRng;
use crate::store::RecordStore;
use crate::workload::{ScenarioConfig, StressTester, WorkloadStats};
use std::path::Path;
use tracing::info;

/// What `status` reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub databases_exist: bool,
    pub compacting_possible: bool,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "databases exist: {}\ncompacting possible: {}",
            yes_no(self.databases_exist),
            yes_no(self.compacting_possible)
        )
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

#[derive(Debug)]
pub struct Actions {
    lifecycle: StoreLifecycle,
    scenario: ScenarioConfig,
}

impl Actions {
    /// Actions over `data_dir` with the failure scenario.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Actions {
            lifecycle: StoreLifecycle::new(data_dir),
            scenario: ScenarioConfig::failure(),
        }
    }

    pub fn with_scenario(mut self, scenario: ScenarioConfig) -> Self {
        self.scenario = scenario;
        self
    }

    pub fn lifecycle(&self) -> &StoreLifecycle {
        &self.lifecycle
    }

    pub fn scenario(&self) -> &ScenarioConfig {
        &self.scenario
    }

    /// Wipe, run the scenario on fresh stores, then back them up.
    pub fn create_test_databases(&mut self) -> Result<WorkloadStats> {
        self.scenario.validate()?;
        self.lifecycle.wipe();
        let stats = self.run_stress_test()?;
        self.lifecycle.backup()?;
        Ok(stats)
    }

    /// Run the scenario against the stores as they are. Both stores are
    /// closed before this returns.
    pub fn run_stress_test(&mut self) -> Result<WorkloadStats> {
        self.scenario.validate()?;
        if let Ok(text) = self.scenario.to_toml_string() {
            info!(scenario = %text, "running scenario");
        }

        let (mut small, mut large) = self.lifecycle.open_stores(false)?;
        let stats = StressTester::new(self.scenario.clone(), &mut small, &mut large).run()?;
        Ok(stats)
    }

    /// Reopen both stores with compaction and write one linked record graph.
    pub fn compact_and_write(&mut self) -> Result<()> {
        let (mut small, mut large) = self.lifecycle.open_stores(true)?;
        let mut rng = DeterministicRng::new(self.scenario.seed);

        let small_thing1 = Record::new(RecordKind::SmallThing1).populate(&mut rng);
        small.save(&small_thing1)?;
        let small_thing2 = Record::new(RecordKind::SmallThing2)
            .link_small_thing1(&small_thing1)?
            .populate(&mut rng);
        small.save(&small_thing2)?;

        let scratch = Record::new(RecordKind::SmallThing1).populate(&mut rng);
        large.save(&scratch)?;
        let medium = Record::new(RecordKind::MediumThing).populate(&mut rng);
        large.save(&medium)?;
        let large_thing = Record::new(RecordKind::LargeThing)
            .populate(&mut rng)
            .link_medium_thing(&medium)?;
        large.save(&large_thing)?;
        let huge = Record::new(RecordKind::HugeThing)
            .populate(&mut rng)
            .link_all(&small_thing1, &small_thing2, &medium, &large_thing)?;
        large.save(&huge)?;

        info!(
            small_records = small.len(),
            large_records = large.len(),
            "compacted and wrote linked records"
        );
        Ok(())
    }

    pub fn restore_test_databases(&self) -> Result<()> {
        self.lifecycle.restore()
    }

    pub fn status(&self) -> Status {
        Status {
            databases_exist: self.lifecycle.databases_exist(),
            compacting_possible: self.lifecycle.compacting_possible(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_status_display() {
        let status = Status {
            databases_exist: true,
            compacting_possible: false,
        };
        assert_eq!(
            status.to_string(),
            "databases exist: yes\ncompacting possible: no"
        );
    }

    #[test]
    fn test_fresh_status() {
        let dir = tempfile::tempdir().unwrap();
        let actions = Actions::new(dir.path());
        assert_eq!(
            actions.status(),
            Status {
                databases_exist: false,
                compacting_possible: true
            }
        );
        assert_eq!(actions.scenario(), &ScenarioConfig::failure());
    }

    #[test]
    fn test_invalid_scenario_opens_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut scenario = ScenarioConfig::test(0);
        scenario.new_cached_data_likelihood = 2.0;
        let mut actions = Actions::new(dir.path()).with_scenario(scenario);

        assert!(actions.run_stress_test().is_err());
        assert!(actions.status().compacting_possible);
    }

    #[test]
    fn test_invalid_scenario_keeps_existing_databases() {
        let dir = tempfile::tempdir().unwrap();
        Actions::new(dir.path())
            .with_scenario(ScenarioConfig::test(4))
            .create_test_databases()
            .unwrap();

        let mut scenario = ScenarioConfig::test(4);
        scenario.cache_deletion_likelihood = -1.0;
        let mut actions = Actions::new(dir.path()).with_scenario(scenario);
        let paths = actions.lifecycle().paths().clone();
        let before: Vec<Vec<u8>> = paths
            .primaries()
            .into_iter()
            .chain(paths.backups())
            .map(|p| std::fs::read(p).unwrap())
            .collect();

        assert!(matches!(
            actions.create_test_databases(),
            Err(Error::Config(_))
        ));
        let after: Vec<Vec<u8>> = paths
            .primaries()
            .into_iter()
            .chain(paths.backups())
            .map(|p| std::fs::read(p).unwrap())
            .collect();
        assert_eq!(before, after);
    }
}
