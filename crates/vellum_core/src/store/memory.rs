//! In-memory store implementing every store seam.

use super::{LedgerStore, LockStore, ObjectStore, PublishStore};
use crate::error::{CoreError, CoreResult};
use crate::lock::Lock;
use crate::model::{ContentObject, Version};
use crate::types::{ContentSetId, Language, ObjectId};
use crate::version_number::VersionNumber;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
struct ObjectTable {
    by_id: BTreeMap<ObjectId, ContentObject>,
    by_variant: HashMap<(ContentSetId, Language), ObjectId>,
}

impl ObjectTable {
    fn claim_slot(&self, object: &ContentObject) -> CoreResult<()> {
        if let Some(key) = object.variant_key() {
            if let Some(holder) = self.by_variant.get(&key) {
                if *holder != object.id {
                    return Err(CoreError::DuplicateVariant {
                        content_set: key.0,
                        language: key.1,
                    });
                }
            }
        }
        Ok(())
    }
}

/// An in-memory store.
///
/// This store keeps objects, ledgers, locks and publish pointers in memory
/// and is suitable for:
/// - Unit and integration tests
/// - Single-process deployments that persist through [`super::StoreDump`]
///
/// # Thread Safety
///
/// Each table sits behind its own `RwLock`; compare-and-append and the
/// variant uniqueness check run under the write lock of their table.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: RwLock<ObjectTable>,
    ledgers: RwLock<HashMap<ObjectId, Vec<Version>>>,
    locks: RwLock<HashMap<ObjectId, Lock>>,
    published: RwLock<HashMap<ObjectId, VersionNumber>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.read().by_id.len()
    }

    /// Returns the total number of versions across all ledgers.
    #[must_use]
    pub fn version_count(&self) -> usize {
        self.ledgers.read().values().map(Vec::len).sum()
    }

    pub(super) fn snapshot_objects(&self) -> Vec<ContentObject> {
        self.objects.read().by_id.values().cloned().collect()
    }

    pub(super) fn snapshot_ledgers(&self) -> BTreeMap<ObjectId, Vec<Version>> {
        self.ledgers
            .read()
            .iter()
            .map(|(id, versions)| (*id, versions.clone()))
            .collect()
    }

    pub(super) fn snapshot_locks(&self) -> BTreeMap<ObjectId, Lock> {
        self.locks
            .read()
            .iter()
            .map(|(id, lock)| (*id, lock.clone()))
            .collect()
    }

    pub(super) fn snapshot_published(&self) -> BTreeMap<ObjectId, VersionNumber> {
        self.published
            .read()
            .iter()
            .map(|(id, number)| (*id, *number))
            .collect()
    }

    pub(super) fn load_ledger(&self, object: ObjectId, versions: Vec<Version>) {
        self.ledgers.write().insert(object, versions);
    }
}

impl ObjectStore for InMemoryStore {
    fn insert_object(&self, object: ContentObject) -> CoreResult<()> {
        let mut table = self.objects.write();
        if table.by_id.contains_key(&object.id) {
            return Err(CoreError::invalid_operation(format!(
                "object {} already exists",
                object.id
            )));
        }
        table.claim_slot(&object)?;
        if let Some(key) = object.variant_key() {
            table.by_variant.insert(key, object.id);
        }
        table.by_id.insert(object.id, object);
        Ok(())
    }

    fn object(&self, id: ObjectId) -> CoreResult<Option<ContentObject>> {
        Ok(self.objects.read().by_id.get(&id).cloned())
    }

    fn update_object(&self, object: &ContentObject) -> CoreResult<()> {
        let mut table = self.objects.write();
        let (previous_key, assigned) = match table.by_id.get(&object.id) {
            Some(existing) => (existing.variant_key(), existing.content_set),
            None => return Err(CoreError::object_not_found(object.id)),
        };
        let mut object = object.clone();
        if object.content_set.is_none() {
            object.content_set = assigned;
        }
        table.claim_slot(&object)?;

        let next_key = object.variant_key();
        if previous_key != next_key {
            if let Some(key) = previous_key {
                table.by_variant.remove(&key);
            }
            if let Some(key) = next_key {
                table.by_variant.insert(key, object.id);
            }
        }
        table.by_id.insert(object.id, object);
        Ok(())
    }

    fn assign_content_set(
        &self,
        id: ObjectId,
        proposed: ContentSetId,
    ) -> CoreResult<ContentSetId> {
        let mut table = self.objects.write();
        let mut object = match table.by_id.get(&id) {
            Some(existing) => match existing.content_set {
                Some(set) => return Ok(set),
                None => existing.clone(),
            },
            None => return Err(CoreError::object_not_found(id)),
        };
        object.content_set = Some(proposed);
        table.claim_slot(&object)?;
        if let Some(key) = object.variant_key() {
            table.by_variant.insert(key, id);
        }
        table.by_id.insert(id, object);
        Ok(proposed)
    }

    fn remove_object(&self, id: ObjectId) -> CoreResult<Option<ContentObject>> {
        let mut table = self.objects.write();
        let removed = table.by_id.remove(&id);
        if let Some(key) = removed.as_ref().and_then(ContentObject::variant_key) {
            table.by_variant.remove(&key);
        }
        Ok(removed)
    }

    fn find_variant(
        &self,
        content_set: ContentSetId,
        language: &Language,
    ) -> CoreResult<Option<ContentObject>> {
        let table = self.objects.read();
        Ok(table
            .by_variant
            .get(&(content_set, language.clone()))
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    fn variants(&self, content_set: ContentSetId) -> CoreResult<Vec<ContentObject>> {
        Ok(self
            .objects
            .read()
            .by_id
            .values()
            .filter(|o| o.content_set == Some(content_set))
            .cloned()
            .collect())
    }

    fn object_ids(&self) -> CoreResult<Vec<ObjectId>> {
        Ok(self.objects.read().by_id.keys().copied().collect())
    }
}

impl LedgerStore for InMemoryStore {
    fn append_if_head(
        &self,
        object: ObjectId,
        expected_head: Option<VersionNumber>,
        version: Version,
    ) -> CoreResult<()> {
        let mut ledgers = self.ledgers.write();
        let ledger = ledgers.entry(object).or_default();
        let actual = ledger.last().map(|v| v.number);
        if actual != expected_head {
            return Err(CoreError::StaleWrite {
                object,
                expected: expected_head,
                actual,
            });
        }
        ledger.push(version);
        Ok(())
    }

    fn versions(&self, object: ObjectId) -> CoreResult<Vec<Version>> {
        Ok(self.ledgers.read().get(&object).cloned().unwrap_or_default())
    }

    fn head(&self, object: ObjectId) -> CoreResult<Option<Version>> {
        Ok(self
            .ledgers
            .read()
            .get(&object)
            .and_then(|ledger| ledger.last())
            .cloned())
    }

    fn purge_versions(&self, object: ObjectId) -> CoreResult<usize> {
        Ok(self
            .ledgers
            .write()
            .remove(&object)
            .map_or(0, |ledger| ledger.len()))
    }
}

impl LockStore for InMemoryStore {
    fn lock(&self, object: ObjectId) -> CoreResult<Option<Lock>> {
        Ok(self.locks.read().get(&object).cloned())
    }

    fn put_lock(&self, object: ObjectId, lock: Lock) -> CoreResult<()> {
        self.locks.write().insert(object, lock);
        Ok(())
    }

    fn remove_lock(&self, object: ObjectId) -> CoreResult<Option<Lock>> {
        Ok(self.locks.write().remove(&object))
    }
}

impl PublishStore for InMemoryStore {
    fn published(&self, object: ObjectId) -> CoreResult<Option<VersionNumber>> {
        Ok(self.published.read().get(&object).copied())
    }

    fn set_published(
        &self,
        object: ObjectId,
        number: VersionNumber,
    ) -> CoreResult<Option<VersionNumber>> {
        Ok(self.published.write().insert(object, number))
    }

    fn clear_published(&self, object: ObjectId) -> CoreResult<Option<VersionNumber>> {
        Ok(self.published.write().remove(&object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::GlobalId;
    use crate::model::{ContentSnapshot, ObjectKind};
    use crate::types::{ContainerRef, Timestamp, UserId};
    use std::sync::Arc;
    use std::time::Duration;

    fn object(id: u64, set: Option<u64>, language: &str) -> ContentObject {
        let mut obj = ContentObject::new(
            ObjectId::new(id),
            GlobalId::random(),
            ObjectKind::Page,
            ContainerRef::new(1),
            Some(Language::new(language)),
            ContentSnapshot::named("page"),
        );
        obj.content_set = set.map(ContentSetId::new);
        obj
    }

    fn version(sequence: u64, number: VersionNumber) -> Version {
        let content = ContentSnapshot::named("page");
        let digest = content.digest().unwrap();
        Version {
            sequence,
            number,
            timestamp: Timestamp::from_millis(sequence),
            editor: UserId::new(1),
            published: false,
            content: Arc::new(content),
            digest,
        }
    }

    #[test]
    fn insert_and_get_object() {
        let store = InMemoryStore::new();
        store.insert_object(object(1, None, "en")).unwrap();
        let loaded = store.object(ObjectId::new(1)).unwrap().unwrap();
        assert_eq!(loaded.id, ObjectId::new(1));
        assert_eq!(store.object_count(), 1);
    }

    #[test]
    fn insert_rejects_existing_id() {
        let store = InMemoryStore::new();
        store.insert_object(object(1, None, "en")).unwrap();
        let result = store.insert_object(object(1, None, "de"));
        assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
    }

    #[test]
    fn variant_slot_is_unique() {
        let store = InMemoryStore::new();
        store.insert_object(object(1, Some(5), "en")).unwrap();
        let result = store.insert_object(object(2, Some(5), "en"));
        assert!(matches!(result, Err(CoreError::DuplicateVariant { .. })));
        store.insert_object(object(3, Some(5), "de")).unwrap();

        let found = store
            .find_variant(ContentSetId::new(5), &Language::new("de"))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, ObjectId::new(3));
        assert_eq!(store.variants(ContentSetId::new(5)).unwrap().len(), 2);
    }

    #[test]
    fn update_moves_variant_slot() {
        let store = InMemoryStore::new();
        store.insert_object(object(1, None, "en")).unwrap();

        let mut obj = store.object(ObjectId::new(1)).unwrap().unwrap();
        obj.content_set = Some(ContentSetId::new(9));
        store.update_object(&obj).unwrap();
        assert!(store
            .find_variant(ContentSetId::new(9), &Language::new("en"))
            .unwrap()
            .is_some());

        let clash = object(2, Some(9), "en");
        store.insert_object(object(2, None, "en")).unwrap();
        assert!(matches!(
            store.update_object(&clash),
            Err(CoreError::DuplicateVariant { .. })
        ));
    }

    #[test]
    fn content_set_is_assigned_once() {
        let store = InMemoryStore::new();
        store.insert_object(object(1, None, "de")).unwrap();

        let first = store
            .assign_content_set(ObjectId::new(1), ContentSetId::new(4))
            .unwrap();
        let second = store
            .assign_content_set(ObjectId::new(1), ContentSetId::new(8))
            .unwrap();
        assert_eq!(first, ContentSetId::new(4));
        assert_eq!(second, ContentSetId::new(4));
        assert!(store
            .find_variant(ContentSetId::new(4), &Language::new("de"))
            .unwrap()
            .is_some());
        assert!(store.variants(ContentSetId::new(8)).unwrap().is_empty());

        let missing = store.assign_content_set(ObjectId::new(2), ContentSetId::new(4));
        assert!(matches!(missing, Err(CoreError::ObjectNotFound { .. })));
    }

    #[test]
    fn racing_assignments_agree_on_one_set() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_object(object(1, None, "de")).unwrap();

        let handles: Vec<_> = (10..18)
            .map(|proposed| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .assign_content_set(ObjectId::new(1), ContentSetId::new(proposed))
                        .unwrap()
                })
            })
            .collect();
        let sets: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(sets.iter().all(|s| *s == sets[0]));
        let stored = store.object(ObjectId::new(1)).unwrap().unwrap();
        assert_eq!(stored.content_set, Some(sets[0]));
    }

    #[test]
    fn stale_update_keeps_assigned_set() {
        let store = InMemoryStore::new();
        store.insert_object(object(1, None, "de")).unwrap();
        let stale = store.object(ObjectId::new(1)).unwrap().unwrap();
        store
            .assign_content_set(ObjectId::new(1), ContentSetId::new(4))
            .unwrap();

        store.update_object(&stale).unwrap();
        let stored = store.object(ObjectId::new(1)).unwrap().unwrap();
        assert_eq!(stored.content_set, Some(ContentSetId::new(4)));
    }

    #[test]
    fn update_missing_object_fails() {
        let store = InMemoryStore::new();
        let result = store.update_object(&object(4, None, "en"));
        assert!(matches!(result, Err(CoreError::ObjectNotFound { .. })));
    }

    #[test]
    fn remove_frees_variant_slot() {
        let store = InMemoryStore::new();
        store.insert_object(object(1, Some(5), "en")).unwrap();
        assert!(store.remove_object(ObjectId::new(1)).unwrap().is_some());
        store.insert_object(object(2, Some(5), "en")).unwrap();
    }

    #[test]
    fn append_checks_head() {
        let store = InMemoryStore::new();
        let id = ObjectId::new(1);
        store
            .append_if_head(id, None, version(1, VersionNumber::FIRST))
            .unwrap();

        let stale = store.append_if_head(id, None, version(2, VersionNumber::new(1, 1)));
        assert!(matches!(stale, Err(CoreError::StaleWrite { .. })));

        store
            .append_if_head(
                id,
                Some(VersionNumber::FIRST),
                version(2, VersionNumber::new(1, 1)),
            )
            .unwrap();
        assert_eq!(store.versions(id).unwrap().len(), 2);
        assert_eq!(store.head(id).unwrap().unwrap().sequence, 2);
        assert_eq!(store.purge_versions(id).unwrap(), 2);
        assert!(store.head(id).unwrap().is_none());
    }

    #[test]
    fn locks_and_publish_pointers() {
        let store = InMemoryStore::new();
        let id = ObjectId::new(1);
        let lock = Lock {
            owner: UserId::new(3),
            acquired_at: Timestamp::from_millis(10),
            timeout: Duration::from_secs(1),
        };
        store.put_lock(id, lock.clone()).unwrap();
        assert_eq!(store.lock(id).unwrap(), Some(lock));
        assert!(store.remove_lock(id).unwrap().is_some());
        assert!(store.lock(id).unwrap().is_none());

        assert_eq!(store.set_published(id, VersionNumber::FIRST).unwrap(), None);
        assert_eq!(
            store.set_published(id, VersionNumber::new(2, 0)).unwrap(),
            Some(VersionNumber::FIRST)
        );
        assert_eq!(store.published(id).unwrap(), Some(VersionNumber::new(2, 0)));
        assert!(store.clear_published(id).unwrap().is_some());
    }
}
