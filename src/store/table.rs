//! Insertion-ordered record table shared by the store engines.

use super::{Mutation, StoreError};
use crate::model::{Record, RecordId, RecordKind};
use std::collections::{BTreeMap, HashMap};

/// Records keyed by first-insertion sequence, with an id index.
///
/// Scans walk the sequence order, so "pick a random existing record" is
/// reproducible. Upserts keep the original sequence number.
#[derive(Debug, Default)]
pub(crate) struct RecordTable {
    records: BTreeMap<u64, Record>,
    index: HashMap<RecordId, u64>,
    next_seq: u64,
}

impl RecordTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Record> {
        self.index.get(id).and_then(|seq| self.records.get(seq))
    }

    pub(crate) fn objects(&self, kind: RecordKind) -> Vec<&Record> {
        self.records.values().filter(|r| r.kind() == kind).collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Validate a batch against current contents without changing anything.
    pub(crate) fn check(
        &self,
        batch: &[Mutation],
        store: &str,
        kinds: &[RecordKind],
    ) -> Result<(), StoreError> {
        // Kind of each id as seen after the preceding mutations of this batch.
        let mut overlay: HashMap<&str, Option<RecordKind>> = HashMap::new();

        for mutation in batch {
            match mutation {
                Mutation::Put(record) => {
                    let incoming = record.kind();
                    if !kinds.contains(&incoming) {
                        return Err(StoreError::KindNotPermitted {
                            store: store.to_string(),
                            kind: incoming,
                        });
                    }
                    if let Some(existing) = self.kind_after(&overlay, &record.id) {
                        if existing != incoming {
                            return Err(StoreError::IdConflict {
                                id: record.id.clone(),
                                existing,
                                incoming,
                            });
                        }
                    }
                    overlay.insert(record.id.as_str(), Some(incoming));
                }
                Mutation::Delete(id) => {
                    if self.kind_after(&overlay, id).is_none() {
                        return Err(StoreError::NotFound(id.clone()));
                    }
                    overlay.insert(id.as_str(), None);
                }
            }
        }
        Ok(())
    }

    fn kind_after(&self, overlay: &HashMap<&str, Option<RecordKind>>, id: &str) -> Option<RecordKind> {
        match overlay.get(id) {
            Some(kind) => *kind,
            None => self.get(id).map(Record::kind),
        }
    }

    /// Apply a batch that already passed [`RecordTable::check`].
    pub(crate) fn apply(&mut self, batch: Vec<Mutation>) {
        for mutation in batch {
            match mutation {
                Mutation::Put(record) => match self.index.get(&record.id) {
                    Some(&seq) => {
                        self.records.insert(seq, record);
                    }
                    None => {
                        let seq = self.next_seq;
                        self.next_seq += 1;
                        self.index.insert(record.id.clone(), seq);
                        self.records.insert(seq, record);
                    }
                },
                Mutation::Delete(id) => {
                    if let Some(seq) = self.index.remove(&id) {
                        self.records.remove(&seq);
                    }
                }
            }
        }
        debug_assert_eq!(
            self.records.len(),
            self.index.len(),
            "Invariant: every record has exactly one index entry"
        );
    }
}
