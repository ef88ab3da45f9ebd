use super::RecordKind;
use crate::simulator::DeterministicRng;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RecordId = String;

/// Characters a payload may be built from.
pub const PAYLOAD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-.[]#{}()'\"!@$%^&*+=";

const YEAR_SECS: f64 = 365.0 * 24.0 * 60.0 * 60.0;
/// Earliest `created_on`, in seconds after the Unix epoch
pub const CREATED_ON_MIN_SECS: f64 = 43.0 * YEAR_SECS;
/// Latest `created_on`, in seconds after the Unix epoch
pub const CREATED_ON_MAX_SECS: f64 = 44.0 * YEAR_SECS;

pub const VERSION_MIN: u8 = 1;
pub const VERSION_MAX: u8 = 7;

/// Model errors. These are caller bugs, not data problems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A link was requested on, or to, a record of the wrong kind
    KindMismatch {
        role: &'static str,
        expected: RecordKind,
        actual: RecordKind,
    },
    /// A HugeThing's links are write-once
    LinksAlreadySet(RecordId),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::KindMismatch {
                role,
                expected,
                actual,
            } => write!(f, "{} must be a {}, got {}", role, expected, actual),
            ModelError::LinksAlreadySet(id) => {
                write!(f, "HugeThing {} is already linked", id)
            }
        }
    }
}

impl std::error::Error for ModelError {}

/// The four links of a HugeThing, set together exactly once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HugeLinks {
    pub small_thing1_id: RecordId,
    pub small_thing2_id: RecordId,
    pub medium_thing_id: RecordId,
    pub large_thing_id: RecordId,
}

/// Per-kind link fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Thing {
    SmallThing1,
    SmallThing2 { small_thing1_id: Option<RecordId> },
    MediumThing,
    LargeThing { medium_thing_id: Option<RecordId> },
    HugeThing { links: Option<HugeLinks> },
}

impl Thing {
    fn empty(kind: RecordKind) -> Self {
        match kind {
            RecordKind::SmallThing1 => Thing::SmallThing1,
            RecordKind::SmallThing2 => Thing::SmallThing2 {
                small_thing1_id: None,
            },
            RecordKind::MediumThing => Thing::MediumThing,
            RecordKind::LargeThing => Thing::LargeThing {
                medium_thing_id: None,
            },
            RecordKind::HugeThing => Thing::HugeThing { links: None },
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Thing::SmallThing1 => RecordKind::SmallThing1,
            Thing::SmallThing2 { .. } => RecordKind::SmallThing2,
            Thing::MediumThing => RecordKind::MediumThing,
            Thing::LargeThing { .. } => RecordKind::LargeThing,
            Thing::HugeThing { .. } => RecordKind::HugeThing,
        }
    }
}

/// A single workload record.
///
/// Built with a consuming chain, e.g.
/// `Record::new(RecordKind::MediumThing).populate(&mut rng).cache()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub data: Option<String>,
    pub keep_cached: bool,
    pub created_on: DateTime<Utc>,
    pub version: Option<u8>,
    pub thing: Thing,
}

impl Record {
    pub fn new(kind: RecordKind) -> Self {
        Record {
            id: Uuid::new_v4().to_string(),
            data: None,
            keep_cached: false,
            created_on: Utc::now(),
            version: None,
            thing: Thing::empty(kind),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.thing.kind()
    }

    /// Re-roll `created_on`, `version` and `data`, in that order.
    pub fn populate(mut self, rng: &mut DeterministicRng) -> Self {
        self.repopulate(rng);
        self
    }

    /// In-place form of [`Record::populate`], for updating stored records.
    ///
    /// Draw order is fixed: created_on, version, payload length, payload
    /// character. Replays depend on it.
    pub fn repopulate(&mut self, rng: &mut DeterministicRng) {
        let secs = rng.gen_f64_between(CREATED_ON_MIN_SECS, CREATED_ON_MAX_SECS);
        self.created_on = timestamp_from_secs(secs);

        self.version =
            Some(rng.gen_range_inclusive(u64::from(VERSION_MIN), u64::from(VERSION_MAX)) as u8);

        let range = self.kind().size_range();
        let len = rng.gen_range_inclusive(*range.start(), *range.end()) as usize;
        self.data = Some(random_payload(len, rng));
    }

    /// Pin the record so a sync pass keeps it.
    pub fn cache(mut self) -> Self {
        self.keep_cached = true;
        self
    }

    /// Point a SmallThing2 at a SmallThing1.
    pub fn link_small_thing1(mut self, small_thing1: &Record) -> Result<Self, ModelError> {
        expect_kind("linked record", small_thing1, RecordKind::SmallThing1)?;
        match &mut self.thing {
            Thing::SmallThing2 { small_thing1_id } => {
                *small_thing1_id = Some(small_thing1.id.clone());
                Ok(self)
            }
            other => Err(ModelError::KindMismatch {
                role: "link_small_thing1 target",
                expected: RecordKind::SmallThing2,
                actual: other.kind(),
            }),
        }
    }

    /// Point a LargeThing at a MediumThing.
    pub fn link_medium_thing(mut self, medium_thing: &Record) -> Result<Self, ModelError> {
        expect_kind("linked record", medium_thing, RecordKind::MediumThing)?;
        match &mut self.thing {
            Thing::LargeThing { medium_thing_id } => {
                *medium_thing_id = Some(medium_thing.id.clone());
                Ok(self)
            }
            other => Err(ModelError::KindMismatch {
                role: "link_medium_thing target",
                expected: RecordKind::LargeThing,
                actual: other.kind(),
            }),
        }
    }

    /// Set all four links of a HugeThing. Fails if they are already set.
    pub fn link_all(
        mut self,
        small_thing1: &Record,
        small_thing2: &Record,
        medium_thing: &Record,
        large_thing: &Record,
    ) -> Result<Self, ModelError> {
        expect_kind("small_thing1", small_thing1, RecordKind::SmallThing1)?;
        expect_kind("small_thing2", small_thing2, RecordKind::SmallThing2)?;
        expect_kind("medium_thing", medium_thing, RecordKind::MediumThing)?;
        expect_kind("large_thing", large_thing, RecordKind::LargeThing)?;

        match &mut self.thing {
            Thing::HugeThing { links: Some(_) } => Err(ModelError::LinksAlreadySet(self.id.clone())),
            Thing::HugeThing { links } => {
                *links = Some(HugeLinks {
                    small_thing1_id: small_thing1.id.clone(),
                    small_thing2_id: small_thing2.id.clone(),
                    medium_thing_id: medium_thing.id.clone(),
                    large_thing_id: large_thing.id.clone(),
                });
                Ok(self)
            }
            other => Err(ModelError::KindMismatch {
                role: "link_all target",
                expected: RecordKind::HugeThing,
                actual: other.kind(),
            }),
        }
    }

    /// Identifiers this record points at, in field order.
    pub fn link_targets(&self) -> Vec<(RecordKind, &RecordId)> {
        match &self.thing {
            Thing::SmallThing2 {
                small_thing1_id: Some(id),
            } => vec![(RecordKind::SmallThing1, id)],
            Thing::LargeThing {
                medium_thing_id: Some(id),
            } => vec![(RecordKind::MediumThing, id)],
            Thing::HugeThing { links: Some(l) } => vec![
                (RecordKind::SmallThing1, &l.small_thing1_id),
                (RecordKind::SmallThing2, &l.small_thing2_id),
                (RecordKind::MediumThing, &l.medium_thing_id),
                (RecordKind::LargeThing, &l.large_thing_id),
            ],
            _ => Vec::new(),
        }
    }

    pub fn payload_len(&self) -> usize {
        self.data.as_ref().map_or(0, String::len)
    }
}

fn expect_kind(role: &'static str, record: &Record, expected: RecordKind) -> Result<(), ModelError> {
    let actual = record.kind();
    if actual == expected {
        Ok(())
    } else {
        Err(ModelError::KindMismatch {
            role,
            expected,
            actual,
        })
    }
}

fn timestamp_from_secs(secs: f64) -> DateTime<Utc> {
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999)).unwrap_or_default()
}

/// One character from the alphabet, repeated `len` times.
fn random_payload(len: usize, rng: &mut DeterministicRng) -> String {
    let index = rng.gen_below(PAYLOAD_ALPHABET.len() as u64) as usize;
    let ch = char::from(PAYLOAD_ALPHABET[index]);
    std::iter::repeat(ch).take(len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_unpopulated() {
        let record = Record::new(RecordKind::MediumThing);
        assert!(record.data.is_none());
        assert!(record.version.is_none());
        assert!(!record.keep_cached);
        assert_eq!(record.kind(), RecordKind::MediumThing);
    }

    #[test]
    fn test_identities_are_unique() {
        let a = Record::new(RecordKind::SmallThing1);
        let b = Record::new(RecordKind::SmallThing1);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_populate_respects_ranges() {
        let mut rng = DeterministicRng::new(11);
        for kind in RecordKind::ALL {
            for _ in 0..5 {
                let record = Record::new(kind).populate(&mut rng);
                let len = record.payload_len() as u64;
                assert!(kind.size_range().contains(&len), "{} len {}", kind, len);

                let version = record.version.unwrap();
                assert!((VERSION_MIN..=VERSION_MAX).contains(&version));

                let secs = record.created_on.timestamp() as f64;
                assert!(secs >= CREATED_ON_MIN_SECS.floor() && secs <= CREATED_ON_MAX_SECS);
            }
        }
    }

    #[test]
    fn test_created_on_lands_in_window_years() {
        use chrono::Datelike;

        let mut rng = DeterministicRng::new(12);
        for _ in 0..50 {
            let record = Record::new(RecordKind::SmallThing2).populate(&mut rng);
            // 43 to 44 years of 365 days after 1970
            let year = record.created_on.year();
            assert!((2012..=2013).contains(&year), "year {}", year);
        }
    }

    #[test]
    fn test_payload_is_single_alphabet_char() {
        let mut rng = DeterministicRng::new(4);
        let record = Record::new(RecordKind::SmallThing1).populate(&mut rng);
        let data = record.data.unwrap();
        let first = data.as_bytes()[0];
        assert!(PAYLOAD_ALPHABET.contains(&first));
        assert!(data.bytes().all(|b| b == first));
    }

    #[test]
    fn test_populate_consumes_four_draws() {
        let mut rng = DeterministicRng::new(8);
        Record::new(RecordKind::LargeThing).populate(&mut rng);
        // Rejection sampling can add draws, but never fewer than four.
        assert!(rng.draws() >= 4);
    }

    #[test]
    fn test_populate_is_deterministic() {
        let mut a = DeterministicRng::new(21);
        let mut b = DeterministicRng::new(21);
        let ra = Record::new(RecordKind::HugeThing).populate(&mut a);
        let rb = Record::new(RecordKind::HugeThing).populate(&mut b);
        assert_eq!(ra.created_on, rb.created_on);
        assert_eq!(ra.version, rb.version);
        assert_eq!(ra.data, rb.data);
        assert_ne!(ra.id, rb.id);
    }

    #[test]
    fn test_repopulate_rerolls_fields() {
        let mut rng = DeterministicRng::new(2);
        let mut record = Record::new(RecordKind::MediumThing).populate(&mut rng).cache();
        let before = (record.created_on, record.data.clone());
        record.repopulate(&mut rng);
        assert_ne!(before, (record.created_on, record.data.clone()));
        assert!(record.keep_cached, "repopulate must not unpin");
    }

    #[test]
    fn test_cache_is_idempotent_and_draws_nothing() {
        let mut rng = DeterministicRng::new(2);
        let record = Record::new(RecordKind::MediumThing).populate(&mut rng);
        let draws = rng.draws();
        let record = record.cache().cache();
        assert!(record.keep_cached);
        assert_eq!(rng.draws(), draws);
    }

    #[test]
    fn test_link_small_thing1() {
        let st1 = Record::new(RecordKind::SmallThing1);
        let st2 = Record::new(RecordKind::SmallThing2)
            .link_small_thing1(&st1)
            .unwrap();
        assert_eq!(st2.link_targets(), vec![(RecordKind::SmallThing1, &st1.id)]);
    }

    #[test]
    fn test_link_rejects_wrong_kinds() {
        let medium = Record::new(RecordKind::MediumThing);
        let err = Record::new(RecordKind::SmallThing2)
            .link_small_thing1(&medium)
            .unwrap_err();
        assert!(matches!(err, ModelError::KindMismatch { .. }));

        let st1 = Record::new(RecordKind::SmallThing1);
        let err = Record::new(RecordKind::MediumThing)
            .link_small_thing1(&st1)
            .unwrap_err();
        assert!(matches!(
            err,
            ModelError::KindMismatch {
                expected: RecordKind::SmallThing2,
                ..
            }
        ));
    }

    #[test]
    fn test_huge_links_are_write_once() {
        let st1 = Record::new(RecordKind::SmallThing1);
        let st2 = Record::new(RecordKind::SmallThing2);
        let medium = Record::new(RecordKind::MediumThing);
        let large = Record::new(RecordKind::LargeThing);

        let huge = Record::new(RecordKind::HugeThing)
            .link_all(&st1, &st2, &medium, &large)
            .unwrap();
        assert_eq!(huge.link_targets().len(), 4);

        let other = Record::new(RecordKind::MediumThing);
        let err = huge
            .clone()
            .link_all(&st1, &st2, &other, &large)
            .unwrap_err();
        assert_eq!(err, ModelError::LinksAlreadySet(huge.id.clone()));
    }

    #[test]
    fn test_link_draws_nothing() {
        let mut rng = DeterministicRng::new(3);
        let medium = Record::new(RecordKind::MediumThing).populate(&mut rng);
        let large = Record::new(RecordKind::LargeThing).populate(&mut rng);
        let draws = rng.draws();

        let large = large.link_medium_thing(&medium).unwrap();
        assert_eq!(rng.draws(), draws);
        assert_eq!(large.link_targets(), vec![(RecordKind::MediumThing, &medium.id)]);
    }
}
