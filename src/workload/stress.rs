//! The churn workload.
//!
//! One run seeds a pinned cache of MediumThings, then repeats rounds of
//! online work (cache churn followed by a sync pass that drops everything
//! unpinned) and offline days that each build linked record graphs.
//!
//! Every random choice comes from the tester's own stream, in a fixed
//! order. Store scans are insertion-ordered, so two runs with the same
//! seed make the same choices.

use super::{ScenarioConfig, WorkloadStats};
use crate::error::Result;
use crate::model::{Record, RecordKind};
use crate::simulator::{DeterministicRng, RNG_VERSION};
use crate::store::{RecordStore, StoreError};
use tracing::{debug, info};

/// Drives a small store `S` and a large store `L` through a scenario.
pub struct StressTester<'a, S: RecordStore, L: RecordStore> {
    config: ScenarioConfig,
    rng: DeterministicRng,
    small: &'a mut S,
    large: &'a mut L,
    stats: WorkloadStats,
}

impl<'a, S: RecordStore, L: RecordStore> StressTester<'a, S, L> {
    /// Tester with a fresh scenario stream seeded from `config.seed`.
    pub fn new(config: ScenarioConfig, small: &'a mut S, large: &'a mut L) -> Self {
        let rng = DeterministicRng::new(config.seed);
        Self::with_rng(config, rng, small, large)
    }

    pub fn with_rng(
        config: ScenarioConfig,
        rng: DeterministicRng,
        small: &'a mut S,
        large: &'a mut L,
    ) -> Self {
        StressTester {
            config,
            rng,
            small,
            large,
            stats: WorkloadStats::default(),
        }
    }

    pub fn small(&self) -> &S {
        self.small
    }

    pub fn large(&self) -> &L {
        self.large
    }

    pub fn stats(&self) -> &WorkloadStats {
        &self.stats
    }

    /// Run the whole scenario. Stops at the first error.
    pub fn run(mut self) -> Result<WorkloadStats> {
        self.config.validate()?;
        info!(seed = self.config.seed, rng_version = RNG_VERSION, "starting workload");

        self.simulate_initial_cache()?;

        let rounds = self.draw_rounds();
        for round in 1..=rounds {
            info!(round, rounds, "offline round");
            self.simulate_round()?;
        }

        let stats = self.finish();
        info!(summary = %stats.summary(), "workload complete");
        Ok(stats)
    }

    /// Draw the number of rounds. [`StressTester::run`] does this right
    /// after the initial cache.
    pub fn draw_rounds(&mut self) -> u64 {
        self.config.rounds_of_offline_work.draw(&mut self.rng)
    }

    /// Final counters, including the number of draws consumed.
    pub fn finish(mut self) -> WorkloadStats {
        self.stats.draws = self.rng.draws();
        self.stats.rng_version = RNG_VERSION;
        self.stats
    }

    /// Pin an initial batch of MediumThings in the large store.
    pub fn simulate_initial_cache(&mut self) -> Result<()> {
        let count = self.config.initial_cached_data.draw(&mut self.rng);
        info!(count, "caching MediumThings");
        for _ in 0..count {
            let record = Record::new(RecordKind::MediumThing)
                .populate(&mut self.rng)
                .cache();
            self.create_large(&record)?;
        }
        Ok(())
    }

    /// Online work, then the offline days.
    pub fn simulate_round(&mut self) -> Result<()> {
        self.simulate_online_work()?;
        self.simulate_offline_days()
    }

    /// Cache churn followed by a sync pass.
    pub fn simulate_online_work(&mut self) -> Result<()> {
        self.simulate_cache_update()?;
        self.simulate_sync()
    }

    /// Draw the day count and run each day. Closes the round.
    pub fn simulate_offline_days(&mut self) -> Result<()> {
        let days = self.config.days_per_offline_round.draw(&mut self.rng);
        for day in 1..=days {
            debug!(day, days, "offline day");
            self.simulate_offline_day()?;
        }
        self.stats.rounds += 1;
        Ok(())
    }

    /// Add, rewrite or drop pinned MediumThings.
    pub fn simulate_cache_update(&mut self) -> Result<()> {
        let units = self.config.cache_update_size.draw(&mut self.rng);
        for _ in 0..units {
            self.stats.cache_updates += 1;

            if self.rng.decide(self.config.new_cached_data_likelihood) {
                let record = Record::new(RecordKind::MediumThing)
                    .populate(&mut self.rng)
                    .cache();
                self.create_large(&record)?;
                continue;
            }

            let Some(mut existing) = choose_existing(&mut self.rng, &*self.large) else {
                continue;
            };

            let mut txn = self.large.begin_write();
            if self.rng.decide(self.config.cache_deletion_likelihood) {
                txn.delete(&existing.id);
                self.stats.cache_deletions += 1;
            } else {
                existing.repopulate(&mut self.rng);
                txn.put(existing);
            }
            txn.commit()?;
        }
        Ok(())
    }

    /// Delete every unpinned record, small store first.
    pub fn simulate_sync(&mut self) -> Result<()> {
        let small = delete_unpinned(&mut *self.small)?;
        let large = delete_unpinned(&mut *self.large)?;
        debug!(small, large, "sync pass deleted unpinned records");
        self.stats.sync_deletions += small + large;
        Ok(())
    }

    /// Start-of-day records in the small store, then the day's items.
    pub fn simulate_offline_day(&mut self) -> Result<()> {
        for _ in 0..2 {
            let scratch = Record::new(RecordKind::SmallThing1).populate(&mut self.rng);
            self.create_small(&scratch)?;
        }
        let small_thing1 = Record::new(RecordKind::SmallThing1).populate(&mut self.rng);
        self.create_small(&small_thing1)?;
        let small_thing2 = Record::new(RecordKind::SmallThing2)
            .link_small_thing1(&small_thing1)?
            .populate(&mut self.rng);
        self.create_small(&small_thing2)?;

        let items = self.config.items_per_day.draw(&mut self.rng);
        for item in 1..=items {
            debug!(item, items, "generating item");
            self.simulate_item(&small_thing1, &small_thing2)?;
        }
        self.stats.days += 1;
        Ok(())
    }

    fn simulate_item(&mut self, small_thing1: &Record, small_thing2: &Record) -> Result<()> {
        let scratch = Record::new(RecordKind::SmallThing1).populate(&mut self.rng);
        self.create_large(&scratch)?;

        let medium = self.get_medium_thing()?;
        let large = Record::new(RecordKind::LargeThing)
            .populate(&mut self.rng)
            .link_medium_thing(&medium)?;
        self.create_large(&large)?;

        let huge = Record::new(RecordKind::HugeThing)
            .populate(&mut self.rng)
            .link_all(small_thing1, small_thing2, &medium, &large)?;
        self.create_large(&huge)?;

        self.stats.items += 1;
        Ok(())
    }

    /// Usually an existing MediumThing, otherwise a new unpinned one.
    ///
    /// The decision is drawn first. The selection draw only happens when
    /// the decision says to reuse.
    pub fn get_medium_thing(&mut self) -> Result<Record> {
        if self.rng.decide(self.config.link_existing_item_likelihood) {
            if let Some(existing) = choose_existing(&mut self.rng, &*self.large) {
                self.stats.linked_existing += 1;
                return Ok(existing);
            }
        }
        let record = Record::new(RecordKind::MediumThing).populate(&mut self.rng);
        self.create_large(&record)?;
        Ok(record)
    }

    fn create_small(&mut self, record: &Record) -> Result<()> {
        self.small.save(record)?;
        self.stats.record_created(record.kind());
        Ok(())
    }

    fn create_large(&mut self, record: &Record) -> Result<()> {
        self.large.save(record)?;
        self.stats.record_created(record.kind());
        Ok(())
    }
}

/// Uniformly pick a stored MediumThing. No draw when there are none.
fn choose_existing<T: RecordStore>(rng: &mut DeterministicRng, store: &T) -> Option<Record> {
    let candidates = store.objects(RecordKind::MediumThing);
    rng.choose(&candidates).map(|r| (*r).clone())
}

/// One transaction per deleted record, kinds in permitted order.
fn delete_unpinned<T: RecordStore>(store: &mut T) -> std::result::Result<u64, StoreError> {
    let kinds = store.permitted_kinds().to_vec();
    let mut deleted = 0;
    for kind in kinds {
        let doomed: Vec<String> = store
            .objects(kind)
            .into_iter()
            .filter(|r| !r.keep_cached)
            .map(|r| r.id.clone())
            .collect();
        for id in doomed {
            let mut txn = store.begin_write();
            txn.delete(&id);
            txn.commit()?;
            deleted += 1;
        }
    }
    Ok(deleted)
}
