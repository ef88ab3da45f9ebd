use super::table::RecordTable;
use super::{Mutation, RecordStore, StoreError};
use crate::model::{Record, RecordKind};

/// Volatile store. Same contract as the file store, nothing touches disk.
#[derive(Debug)]
pub struct InMemoryRecordStore {
    name: String,
    kinds: Vec<RecordKind>,
    table: RecordTable,
}

impl InMemoryRecordStore {
    pub fn new(name: impl Into<String>, kinds: &[RecordKind]) -> Self {
        InMemoryRecordStore {
            name: name.into(),
            kinds: kinds.to_vec(),
            table: RecordTable::new(),
        }
    }

    /// Store accepting the small-store kinds
    pub fn small() -> Self {
        Self::new("small", &RecordKind::SMALL_STORE)
    }

    /// Store accepting the large-store kinds
    pub fn large() -> Self {
        Self::new("large", &RecordKind::LARGE_STORE)
    }

    /// All records, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.table.iter()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn permitted_kinds(&self) -> &[RecordKind] {
        &self.kinds
    }

    fn objects(&self, kind: RecordKind) -> Vec<&Record> {
        self.table.objects(kind)
    }

    fn get(&self, id: &str) -> Option<&Record> {
        self.table.get(id)
    }

    fn len(&self) -> usize {
        self.table.len()
    }

    fn apply(&mut self, batch: Vec<Mutation>) -> Result<(), StoreError> {
        self.table.check(&batch, &self.name, &self.kinds)?;
        self.table.apply(batch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitioned_kinds() {
        let mut small = InMemoryRecordStore::small();
        let mut large = InMemoryRecordStore::large();

        assert!(small.save(&Record::new(RecordKind::SmallThing2)).is_ok());
        assert!(small.save(&Record::new(RecordKind::HugeThing)).is_err());
        assert!(large.save(&Record::new(RecordKind::HugeThing)).is_ok());
        assert!(large.save(&Record::new(RecordKind::SmallThing2)).is_err());

        // SmallThing1 is the one kind both accept
        assert!(small.save(&Record::new(RecordKind::SmallThing1)).is_ok());
        assert!(large.save(&Record::new(RecordKind::SmallThing1)).is_ok());
    }

    #[test]
    fn test_objects_filters_by_kind() {
        let mut store = InMemoryRecordStore::large();
        store.save(&Record::new(RecordKind::MediumThing)).unwrap();
        store.save(&Record::new(RecordKind::LargeThing)).unwrap();
        store.save(&Record::new(RecordKind::MediumThing)).unwrap();

        assert_eq!(store.objects(RecordKind::MediumThing).len(), 2);
        assert_eq!(store.objects(RecordKind::LargeThing).len(), 1);
        assert!(store.objects(RecordKind::HugeThing).is_empty());
        assert_eq!(store.iter().count(), 3);
    }
}
