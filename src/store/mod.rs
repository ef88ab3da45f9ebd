//! Record Stores
//!
//! The contract the workload runs against, plus two engines:
//!
//! - [`InMemoryRecordStore`]: no persistence, for tests and benches
//! - [`FileRecordStore`]: encrypted append-only log with compact-on-open
//!
//! Every change goes through a [`WriteTransaction`]. A transaction is a
//! batch of [`Mutation`]s that the engine validates as a whole and then
//! applies atomically. Dropping an uncommitted transaction discards it.
//!
//! ## Ordering
//!
//! [`RecordStore::objects`] returns records in first-insertion order. An
//! upsert keeps the record's original position, a delete followed by a
//! re-insert moves it to the end.

mod cipher;
mod config;
mod error;
mod file;
mod frame;
mod memory;
mod table;

pub use cipher::{EncryptionKey, ENCRYPTION_KEY_LEN};
pub use config::{CompactionDecision, StoreConfig};
pub use error::StoreError;
pub use file::{FileRecordStore, StoreStats};
pub use frame::{FORMAT_VERSION, FRAME_OVERHEAD, HEADER_SIZE, STORE_MAGIC};
pub use memory::InMemoryRecordStore;

use crate::model::{Record, RecordId, RecordKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One change inside a write transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    /// Insert, or replace the record with the same id
    Put(Record),
    /// Remove an existing record
    Delete(RecordId),
}

/// Object store holding a fixed set of record kinds.
pub trait RecordStore {
    fn name(&self) -> &str;

    /// Kinds this store accepts. Puts of any other kind are rejected.
    fn permitted_kinds(&self) -> &[RecordKind];

    /// Records of one kind, in insertion order.
    fn objects(&self, kind: RecordKind) -> Vec<&Record>;

    fn get(&self, id: &str) -> Option<&Record>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate and atomically apply one batch. On error nothing changes.
    fn apply(&mut self, batch: Vec<Mutation>) -> Result<(), StoreError>;

    fn begin_write(&mut self) -> WriteTransaction<'_, Self>
    where
        Self: Sized,
    {
        WriteTransaction::new(self)
    }

    /// Run `f` inside a transaction, committing only if it returns `Ok`.
    fn write<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        Self: Sized,
        F: FnOnce(&mut WriteTransaction<'_, Self>) -> Result<T, StoreError>,
    {
        let mut txn = self.begin_write();
        let value = f(&mut txn)?;
        txn.commit()?;
        Ok(value)
    }

    /// Upsert a single record in its own transaction.
    fn save(&mut self, record: &Record) -> Result<(), StoreError>
    where
        Self: Sized,
    {
        self.write(|txn| {
            txn.put(record.clone());
            Ok(())
        })
    }
}

/// Scoped write transaction. Rolls back on drop unless committed.
pub struct WriteTransaction<'a, S: RecordStore + ?Sized> {
    store: &'a mut S,
    pending: Vec<Mutation>,
    committed: bool,
}

impl<'a, S: RecordStore + ?Sized> WriteTransaction<'a, S> {
    fn new(store: &'a mut S) -> Self {
        WriteTransaction {
            store,
            pending: Vec::new(),
            committed: false,
        }
    }

    pub fn put(&mut self, record: Record) {
        self.pending.push(Mutation::Put(record));
    }

    pub fn delete(&mut self, id: &str) {
        self.pending.push(Mutation::Delete(id.to_string()));
    }

    /// Committed state, not including this transaction's pending mutations.
    pub fn store(&self) -> &S {
        self.store
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn commit(mut self) -> Result<(), StoreError> {
        let batch = std::mem::take(&mut self.pending);
        self.committed = true;
        if batch.is_empty() {
            return Ok(());
        }
        self.store.apply(batch)
    }
}

impl<S: RecordStore + ?Sized> Drop for WriteTransaction<'_, S> {
    fn drop(&mut self) {
        if !self.committed && !self.pending.is_empty() {
            debug!(
                store = self.store.name(),
                mutations = self.pending.len(),
                "rolling back write transaction"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::DeterministicRng;

    fn medium(rng: &mut DeterministicRng) -> Record {
        Record::new(RecordKind::MediumThing).populate(rng)
    }

    #[test]
    fn test_save_is_upsert() {
        let mut rng = DeterministicRng::new(1);
        let mut store = InMemoryRecordStore::large();
        let mut record = medium(&mut rng);
        store.save(&record).unwrap();
        record.repopulate(&mut rng);
        store.save(&record).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&record.id), Some(&record));
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let mut rng = DeterministicRng::new(1);
        let mut store = InMemoryRecordStore::large();
        {
            let mut txn = store.begin_write();
            txn.put(medium(&mut rng));
            assert_eq!(txn.pending(), 1);
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_write_commits_only_on_ok() {
        let mut rng = DeterministicRng::new(1);
        let mut store = InMemoryRecordStore::large();
        let record = medium(&mut rng);

        let result: Result<(), StoreError> = store.write(|txn| {
            txn.put(record.clone());
            Err(StoreError::NotFound("abort".to_string()))
        });
        assert!(result.is_err());
        assert!(store.is_empty());

        store
            .write(|txn| {
                txn.put(record.clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_rejected_batch_changes_nothing() {
        let mut rng = DeterministicRng::new(1);
        let mut store = InMemoryRecordStore::small();
        let st1 = Record::new(RecordKind::SmallThing1).populate(&mut rng);

        let result = store.write(|txn| {
            txn.put(st1.clone());
            txn.put(medium(&mut rng));
            Ok(())
        });
        assert!(matches!(result, Err(StoreError::KindNotPermitted { .. })));
        assert!(store.get(&st1.id).is_none());
    }

    #[test]
    fn test_transaction_reads_committed_state() {
        let mut rng = DeterministicRng::new(1);
        let mut store = InMemoryRecordStore::large();
        let record = medium(&mut rng);
        store.save(&record).unwrap();

        store
            .write(|txn| {
                assert!(txn.store().get(&record.id).is_some());
                txn.delete(&record.id);
                assert!(txn.store().get(&record.id).is_some());
                Ok(())
            })
            .unwrap();
        assert!(store.is_empty());
    }
}
