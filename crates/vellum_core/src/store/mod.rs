//! Store seams.
//!
//! Every component receives the stores it needs explicitly; there is no
//! ambient global registry. A store's lifetime is that of the surrounding
//! transaction provided by the caller.
//!
//! ## Invariants every implementation upholds
//!
//! - [`ObjectStore`] rejects a second object in the same
//!   `(content set, language)` slot with [`crate::CoreError::DuplicateVariant`]
//! - [`ObjectStore`] assigns an object's content set at most once
//! - [`LedgerStore::append_if_head`] is an atomic compare-and-append
//! - [`LockStore`] holds at most one lock per object
//! - [`PublishStore`] holds at most one published version per object

mod dump;
mod memory;

pub use dump::{LedgerDump, LockDump, PublishedDump, StoreDump, DUMP_FORMAT_VERSION};
pub use memory::InMemoryStore;

use crate::error::CoreResult;
use crate::lock::Lock;
use crate::model::{ContentObject, Version};
use crate::types::{ContentSetId, Language, ObjectId};
use crate::version_number::VersionNumber;
use std::sync::Arc;

/// Persistent content objects.
pub trait ObjectStore: Send + Sync {
    /// Inserts a new object.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateVariant` if another object occupies the same
    /// `(content set, language)` slot, `InvalidOperation` if the ID is taken.
    fn insert_object(&self, object: ContentObject) -> CoreResult<()>;

    /// Returns an object by ID.
    fn object(&self, id: ObjectId) -> CoreResult<Option<ContentObject>>;

    /// Replaces an existing object.
    ///
    /// An object without a content set keeps the set already stored for it.
    ///
    /// # Errors
    ///
    /// Returns `ObjectNotFound` if the object does not exist and
    /// `DuplicateVariant` if the update would collide with another variant.
    fn update_object(&self, object: &ContentObject) -> CoreResult<()>;

    /// Gives `id` the content set `proposed` unless it already has one, and
    /// returns the set the object ends up in.
    ///
    /// The check and the write are one atomic step, so callers racing on the
    /// same object all observe the first assignment.
    ///
    /// # Errors
    ///
    /// Returns `ObjectNotFound` if the object does not exist and
    /// `DuplicateVariant` if the object's language slot in `proposed` is taken.
    fn assign_content_set(
        &self,
        id: ObjectId,
        proposed: ContentSetId,
    ) -> CoreResult<ContentSetId>;

    /// Removes an object, returning it.
    fn remove_object(&self, id: ObjectId) -> CoreResult<Option<ContentObject>>;

    /// Returns the object occupying a `(content set, language)` slot.
    fn find_variant(
        &self,
        content_set: ContentSetId,
        language: &Language,
    ) -> CoreResult<Option<ContentObject>>;

    /// Returns every object in a content set, ordered by ID.
    fn variants(&self, content_set: ContentSetId) -> CoreResult<Vec<ContentObject>>;

    /// Returns the IDs of all stored objects, ordered.
    fn object_ids(&self) -> CoreResult<Vec<ObjectId>>;
}

/// Append-only version history per object.
pub trait LedgerStore: Send + Sync {
    /// Appends `version` if the ledger head's number equals `expected_head`.
    ///
    /// # Errors
    ///
    /// Returns `StaleWrite` if the head moved.
    fn append_if_head(
        &self,
        object: ObjectId,
        expected_head: Option<VersionNumber>,
        version: Version,
    ) -> CoreResult<()>;

    /// Returns all versions of an object in append order.
    fn versions(&self, object: ObjectId) -> CoreResult<Vec<Version>>;

    /// Returns the most recently appended version.
    fn head(&self, object: ObjectId) -> CoreResult<Option<Version>>;

    /// Deletes an object's entire history, returning how many versions went.
    fn purge_versions(&self, object: ObjectId) -> CoreResult<usize>;
}

/// Application-level edit locks.
pub trait LockStore: Send + Sync {
    /// Returns the lock on an object, expired or not.
    fn lock(&self, object: ObjectId) -> CoreResult<Option<Lock>>;

    /// Stores a lock, replacing any existing one.
    fn put_lock(&self, object: ObjectId, lock: Lock) -> CoreResult<()>;

    /// Removes the lock on an object, returning it.
    fn remove_lock(&self, object: ObjectId) -> CoreResult<Option<Lock>>;
}

/// The published-version pointer per object.
pub trait PublishStore: Send + Sync {
    /// Returns the published version number.
    fn published(&self, object: ObjectId) -> CoreResult<Option<VersionNumber>>;

    /// Points the object at a new published version, returning the previous one.
    fn set_published(
        &self,
        object: ObjectId,
        number: VersionNumber,
    ) -> CoreResult<Option<VersionNumber>>;

    /// Clears the pointer, returning the previous one.
    fn clear_published(&self, object: ObjectId) -> CoreResult<Option<VersionNumber>>;
}

/// The full set of stores a repository works against.
#[derive(Clone)]
pub struct Stores {
    /// Content objects.
    pub objects: Arc<dyn ObjectStore>,
    /// Version ledgers.
    pub ledger: Arc<dyn LedgerStore>,
    /// Edit locks.
    pub locks: Arc<dyn LockStore>,
    /// Publish pointers.
    pub publish: Arc<dyn PublishStore>,
}

impl Stores {
    /// Uses one in-memory store for all four roles.
    #[must_use]
    pub fn from_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            objects: Arc::clone(&store) as Arc<dyn ObjectStore>,
            ledger: Arc::clone(&store) as Arc<dyn LedgerStore>,
            locks: Arc::clone(&store) as Arc<dyn LockStore>,
            publish: store,
        }
    }

    /// Creates a fresh in-memory store set.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(InMemoryStore::new()))
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
