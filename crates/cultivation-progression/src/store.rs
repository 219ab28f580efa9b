//! Versioned storage for progression records.
//!
//! Records are stored as encoded bytes with a version number. Callers get an
//! owned copy on every load, so nobody holds a mutable view of stored state.
//! Writes either check the version they read (optimistic) or run a closure
//! atomically against the stored record (conditional update).

use crate::record::ProgressionRecord;
use cultivation_common::{ConcurrencyConflict, CultivationResult, UserId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// A decoded record with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    /// Version at read time.
    pub version: u64,
    /// The value.
    pub value: T,
}

/// Document store for progression records.
pub trait ProgressionStore: Send + Sync {
    /// Loads a record.
    fn load(&self, user: UserId) -> CultivationResult<Option<Versioned<ProgressionRecord>>>;

    /// Stores a new record at version 1 unless one exists; returns the stored copy.
    fn insert_if_absent(&self, record: &ProgressionRecord) -> CultivationResult<Versioned<ProgressionRecord>>;

    /// Writes `record` if the stored version is still `expected`.
    ///
    /// Returns the new version, or `ConcurrencyConflict` on mismatch.
    fn save(&self, record: &ProgressionRecord, expected: u64) -> CultivationResult<u64>;

    /// Runs `update` against the stored record atomically.
    ///
    /// The record is written back (and its version bumped) only when `update`
    /// returns `true`. Returns `None` when the user has no record.
    fn update_atomic(
        &self,
        user: UserId,
        update: &mut dyn FnMut(&mut ProgressionRecord) -> bool,
    ) -> CultivationResult<Option<Versioned<ProgressionRecord>>>;
}

/// Single-process store backed by a `DashMap`.
#[derive(Debug, Default)]
pub struct InMemoryProgressionStore {
    records: DashMap<UserId, (u64, Vec<u8>)>,
}

impl InMemoryProgressionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ProgressionStore for InMemoryProgressionStore {
    fn load(&self, user: UserId) -> CultivationResult<Option<Versioned<ProgressionRecord>>> {
        let Some(stored) = self.records.get(&user) else {
            return Ok(None);
        };
        let (version, bytes) = stored.value();
        Ok(Some(Versioned {
            version: *version,
            value: ProgressionRecord::from_bytes(bytes)?,
        }))
    }

    fn insert_if_absent(&self, record: &ProgressionRecord) -> CultivationResult<Versioned<ProgressionRecord>> {
        match self.records.entry(record.user) {
            Entry::Occupied(stored) => {
                let (version, bytes) = stored.get();
                Ok(Versioned {
                    version: *version,
                    value: ProgressionRecord::from_bytes(bytes)?,
                })
            },
            Entry::Vacant(slot) => {
                slot.insert((1, record.to_bytes()?));
                debug!("Created progression record for {}", record.user);
                Ok(Versioned {
                    version: 1,
                    value: record.clone(),
                })
            },
        }
    }

    fn save(&self, record: &ProgressionRecord, expected: u64) -> CultivationResult<u64> {
        let bytes = record.to_bytes()?;
        let conflict = |actual| ConcurrencyConflict {
            expected,
            actual,
            attempts: 1,
        };
        match self.records.entry(record.user) {
            Entry::Occupied(mut stored) => {
                let actual = stored.get().0;
                if actual != expected {
                    return Err(conflict(actual).into());
                }
                stored.insert((actual + 1, bytes));
                Ok(actual + 1)
            },
            Entry::Vacant(slot) => {
                if expected != 0 {
                    return Err(conflict(0).into());
                }
                slot.insert((1, bytes));
                Ok(1)
            },
        }
    }

    fn update_atomic(
        &self,
        user: UserId,
        update: &mut dyn FnMut(&mut ProgressionRecord) -> bool,
    ) -> CultivationResult<Option<Versioned<ProgressionRecord>>> {
        let Some(mut stored) = self.records.get_mut(&user) else {
            return Ok(None);
        };
        let mut record = ProgressionRecord::from_bytes(&stored.1)?;
        if update(&mut record) {
            let bytes = record.to_bytes()?;
            stored.0 += 1;
            stored.1 = bytes;
        }
        Ok(Some(Versioned {
            version: stored.0,
            value: record,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cultivation_common::CultivationError;

    #[test]
    fn test_insert_load_save() {
        let store = InMemoryProgressionStore::new();
        let user = UserId::new(1);
        assert!(store.load(user).expect("load").is_none());

        let created = store.insert_if_absent(&ProgressionRecord::new(user)).expect("insert");
        assert_eq!(created.version, 1);

        let mut record = created.value;
        record.experience = 500;
        assert_eq!(store.save(&record, 1).expect("save"), 2);

        let loaded = store.load(user).expect("load").expect("present");
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.value.experience, 500);

        // A second insert keeps the existing record.
        let again = store.insert_if_absent(&ProgressionRecord::new(user)).expect("insert");
        assert_eq!(again.value.experience, 500);
    }

    #[test]
    fn test_stale_save_conflicts() {
        let store = InMemoryProgressionStore::new();
        let user = UserId::new(1);
        store.insert_if_absent(&ProgressionRecord::new(user)).expect("insert");
        let record = ProgressionRecord::new(user);
        store.save(&record, 1).expect("first writer");

        let err = store.save(&record, 1).unwrap_err();
        assert_eq!(
            err,
            CultivationError::Conflict(ConcurrencyConflict {
                expected: 1,
                actual: 2,
                attempts: 1
            })
        );
    }

    #[test]
    fn test_update_atomic_writes_only_on_change() {
        let store = InMemoryProgressionStore::new();
        let user = UserId::new(1);
        store.insert_if_absent(&ProgressionRecord::new(user)).expect("insert");

        let unchanged = store.update_atomic(user, &mut |_| false).expect("ok").expect("present");
        assert_eq!(unchanged.version, 1);

        let changed = store
            .update_atomic(user, &mut |r| {
                r.experience += 7;
                true
            })
            .expect("ok")
            .expect("present");
        assert_eq!(changed.version, 2);
        assert_eq!(changed.value.experience, 7);

        assert!(store.update_atomic(UserId::new(2), &mut |_| true).expect("ok").is_none());
    }

    #[test]
    fn test_concurrent_atomic_updates() {
        let store = InMemoryProgressionStore::new();
        let user = UserId::new(1);
        store.insert_if_absent(&ProgressionRecord::new(user)).expect("insert");
        std::thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    store
                        .update_atomic(user, &mut |r| {
                            r.experience += 1;
                            true
                        })
                        .expect("ok");
                });
            }
        });
        let loaded = store.load(user).expect("load").expect("present");
        assert_eq!(loaded.value.experience, 16);
        assert_eq!(loaded.version, 17);
    }
}
