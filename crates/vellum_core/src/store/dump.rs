//! Export and import of complete store state.
//!
//! A dump is a self-contained JSON document holding every object, ledger,
//! lock and publish pointer. It is what the `vellum` CLI reads, and the
//! way a single-process deployment persists its in-memory store.

use super::{InMemoryStore, LockStore, ObjectStore, PublishStore, Stores};
use crate::error::{CoreError, CoreResult};
use crate::lock::Lock;
use crate::model::{ContentObject, Version};
use crate::types::ObjectId;
use crate::version_number::VersionNumber;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Current dump format version.
pub const DUMP_FORMAT_VERSION: u32 = 1;

/// The ledger of one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDump {
    /// Owning object.
    pub object: ObjectId,
    /// Versions in append order.
    pub versions: Vec<Version>,
}

/// A held lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockDump {
    /// Locked object.
    pub object: ObjectId,
    /// The lock.
    pub lock: Lock,
}

/// A publish pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedDump {
    /// Published object.
    pub object: ObjectId,
    /// Published version number.
    pub number: VersionNumber,
}

/// Full store state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDump {
    /// Format version of this dump.
    pub format_version: u32,
    /// All objects, ordered by ID.
    pub objects: Vec<ContentObject>,
    /// All ledgers, ordered by object ID.
    pub ledgers: Vec<LedgerDump>,
    /// All locks, ordered by object ID.
    pub locks: Vec<LockDump>,
    /// All publish pointers, ordered by object ID.
    pub published: Vec<PublishedDump>,
}

impl StoreDump {
    /// Writes the dump as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Reads a dump written by [`StoreDump::save`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the dump was written by an
    /// incompatible format version.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let dump: StoreDump = serde_json::from_reader(reader)?;
        if dump.format_version != DUMP_FORMAT_VERSION {
            return Err(CoreError::invalid_operation(format!(
                "unsupported dump format v{}, expected v{}",
                dump.format_version, DUMP_FORMAT_VERSION
            )));
        }
        Ok(dump)
    }

    /// Returns the ledger of an object.
    #[must_use]
    pub fn ledger(&self, object: ObjectId) -> &[Version] {
        self.ledgers
            .iter()
            .find(|l| l.object == object)
            .map(|l| l.versions.as_slice())
            .unwrap_or_default()
    }

    /// Returns the next unused object and content set IDs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the highest ID in use is `u64::MAX`.
    pub fn next_ids(&self) -> CoreResult<(u64, u64)> {
        let next = |highest: Option<u64>, what: &str| {
            highest.unwrap_or(0).checked_add(1).ok_or_else(|| {
                CoreError::invalid_operation(format!("{what} IDs are exhausted"))
            })
        };
        let next_object = next(self.objects.iter().map(|o| o.id.as_u64()).max(), "object")?;
        let next_set = next(
            self.objects
                .iter()
                .filter_map(|o| o.content_set.map(|s| s.as_u64()))
                .max(),
            "content set",
        )?;
        Ok((next_object, next_set))
    }
}

impl StoreDump {
    /// Captures the state reachable through a set of store seams.
    ///
    /// Only ledgers of existing objects are visited.
    pub fn capture(stores: &Stores) -> CoreResult<Self> {
        let mut dump = Self {
            format_version: DUMP_FORMAT_VERSION,
            objects: Vec::new(),
            ledgers: Vec::new(),
            locks: Vec::new(),
            published: Vec::new(),
        };
        for id in stores.objects.object_ids()? {
            let Some(object) = stores.objects.object(id)? else {
                continue;
            };
            let versions = stores.ledger.versions(id)?;
            if !versions.is_empty() {
                dump.ledgers.push(LedgerDump {
                    object: id,
                    versions,
                });
            }
            if let Some(lock) = stores.locks.lock(id)? {
                dump.locks.push(LockDump { object: id, lock });
            }
            if let Some(number) = stores.publish.published(id)? {
                dump.published.push(PublishedDump { object: id, number });
            }
            dump.objects.push(object);
        }
        Ok(dump)
    }
}

impl InMemoryStore {
    /// Captures the complete store state.
    #[must_use]
    pub fn export(&self) -> StoreDump {
        StoreDump {
            format_version: DUMP_FORMAT_VERSION,
            objects: self.snapshot_objects(),
            ledgers: self
                .snapshot_ledgers()
                .into_iter()
                .map(|(object, versions)| LedgerDump { object, versions })
                .collect(),
            locks: self
                .snapshot_locks()
                .into_iter()
                .map(|(object, lock)| LockDump { object, lock })
                .collect(),
            published: self
                .snapshot_published()
                .into_iter()
                .map(|(object, number)| PublishedDump { object, number })
                .collect(),
        }
    }

    /// Rebuilds a store from a dump.
    ///
    /// # Errors
    ///
    /// Fails if the dump violates the variant uniqueness constraint.
    pub fn import(dump: StoreDump) -> CoreResult<Self> {
        let store = Self::new();
        for object in dump.objects {
            store.insert_object(object)?;
        }
        for ledger in dump.ledgers {
            store.load_ledger(ledger.object, ledger.versions);
        }
        for entry in dump.locks {
            store.put_lock(entry.object, entry.lock)?;
        }
        for entry in dump.published {
            store.set_published(entry.object, entry.number)?;
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentDraft;
    use crate::repository::{NewObject, Repository};
    use crate::types::{ContainerRef, UserId};
    use tempfile::TempDir;

    fn sample() -> Repository {
        let repo = Repository::open_in_memory();
        let draft = ContentDraft::new("page");
        for _ in 0..3 {
            repo.create(NewObject::page(ContainerRef::new(1), draft.clone(), UserId::new(1)))
                .unwrap();
        }
        repo.publish(ObjectId::new(2)).unwrap();
        repo.acquire(ObjectId::new(3), UserId::new(1)).unwrap();
        repo
    }

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let dump = sample().export().unwrap();
        dump.save(&path).unwrap();

        let loaded = StoreDump::load(&path).unwrap();
        assert_eq!(loaded, dump);
        assert_eq!(loaded.ledgers.len(), 3);
        assert_eq!(loaded.locks.len(), 1);
        assert_eq!(loaded.published[0].object, ObjectId::new(2));
        assert_eq!(loaded.next_ids().unwrap(), (4, 1));
    }

    #[test]
    fn exhausted_ids_cannot_be_resumed() {
        let mut dump = sample().export().unwrap();
        dump.objects[0].id = ObjectId::new(u64::MAX);
        assert!(matches!(
            dump.next_ids(),
            Err(CoreError::InvalidOperation { .. })
        ));
        assert!(Repository::from_dump(dump, Repository::builder()).is_err());
    }

    #[test]
    fn load_rejects_other_format_versions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let mut dump = sample().export().unwrap();
        dump.format_version = DUMP_FORMAT_VERSION + 1;
        dump.save(&path).unwrap();

        assert!(matches!(
            StoreDump::load(&path),
            Err(CoreError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn import_matches_capture() {
        let repo = sample();
        let captured = repo.export().unwrap();
        let store = InMemoryStore::import(captured.clone()).unwrap();
        assert_eq!(store.export(), captured);
        assert!(captured.ledger(ObjectId::new(9)).is_empty());
    }
}
