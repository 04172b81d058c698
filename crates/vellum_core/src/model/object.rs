//! Content objects and the versioning capability.

use super::ContentSnapshot;
use crate::identity::GlobalId;
use crate::types::{ContainerRef, ContentSetId, Language, ObjectId, Timestamp};
use crate::version_number::VersionNumber;
use serde::{Deserialize, Serialize};

/// The concrete kind of a content object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// A page.
    Page,
    /// A file or image.
    File,
    /// A folder.
    Folder,
}

/// Where a language variant was last synchronized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPointer {
    /// The variant this one was translated from.
    pub source: ObjectId,
    /// Timestamp of the source version this variant is in sync with.
    pub version_timestamp: Timestamp,
}

/// A mutable, identity-bearing editable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentObject {
    /// Store-local ID.
    pub id: ObjectId,
    /// Global ID, assigned at creation and never changed.
    pub global_id: GlobalId,
    /// Concrete kind.
    pub kind: ObjectKind,
    /// Translation group, if the object has ever been translated.
    pub content_set: Option<ContentSetId>,
    /// Language of this variant.
    pub language: Option<Language>,
    /// Number of the ledger head as last seen by this record.
    pub current_version: Option<VersionNumber>,
    /// Live location. Never versioned.
    pub container: ContainerRef,
    /// Tombstone timestamp for soft-deleted objects.
    pub deleted: Option<Timestamp>,
    /// Sync pointer into another variant's ledger.
    pub synced_with: Option<SyncPointer>,
    /// Working copy of the versioned content.
    pub draft: ContentSnapshot,
}

impl ContentObject {
    /// Creates a fresh, unversioned object.
    #[must_use]
    pub fn new(
        id: ObjectId,
        global_id: GlobalId,
        kind: ObjectKind,
        container: ContainerRef,
        language: Option<Language>,
        draft: ContentSnapshot,
    ) -> Self {
        Self {
            id,
            global_id,
            kind,
            content_set: None,
            language,
            current_version: None,
            container,
            deleted: None,
            synced_with: None,
            draft,
        }
    }

    /// Returns true if the object is in the wastebin.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted.is_some()
    }

    /// Returns the `(content set, language)` slot this object occupies.
    #[must_use]
    pub fn variant_key(&self) -> Option<(ContentSetId, Language)> {
        match (self.content_set, &self.language) {
            (Some(set), Some(language)) => Some((set, language.clone())),
            _ => None,
        }
    }
}

/// Capability shared by every versioned entity kind.
///
/// The restore engine and ledger only depend on this interface.
pub trait Versionable {
    /// Store-local ID.
    fn id(&self) -> ObjectId;

    /// Global ID.
    fn global_id(&self) -> GlobalId;

    /// Current working copy of the versioned content.
    fn field_groups(&self) -> &ContentSnapshot;

    /// Replaces the working copy. Identities must already be resolved.
    fn apply_snapshot(&mut self, snapshot: ContentSnapshot);
}

impl Versionable for ContentObject {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn global_id(&self) -> GlobalId {
        self.global_id
    }

    fn field_groups(&self) -> &ContentSnapshot {
        &self.draft
    }

    fn apply_snapshot(&mut self, snapshot: ContentSnapshot) {
        self.draft = snapshot;
    }
}
