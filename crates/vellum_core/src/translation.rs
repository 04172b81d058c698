//! Translation coordinator.
//!
//! Language variants of one logical item share a content set. At most one
//! object may occupy each `(content set, language)` slot; concurrent
//! requests for the same slot are serialized in a [`KeyedRegions`] region
//! and all observe the single winner. When several processes share one
//! store, the store's atomic content-set assignment and its unique slot
//! constraint keep them on the same winner.

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::identity::IdentityAllocator;
use crate::ledger::VersionLedger;
use crate::lock::{ensure_editable, live_object, KeyedRegions};
use crate::model::{ContentObject, FieldContent, SyncPointer, Version};
use crate::restore::{IdentityPolicy, RestoreEngine, RestoreScope};
use crate::store::{LockStore, ObjectStore};
use crate::types::{ContentSetId, Language, ObjectId, Timestamp, UserId};
use std::sync::Arc;
use tracing::{debug, info};

/// Parameters of a translation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateRequest {
    /// The object to translate.
    pub source: ObjectId,
    /// The target language.
    pub language: Language,
    /// Copy field values; otherwise only the field-group shell is copied.
    pub copy_content: bool,
    /// Source version to translate from; defaults to the latest.
    pub source_version: Option<Timestamp>,
    /// Author of the new variant's first version.
    pub editor: UserId,
}

impl TranslateRequest {
    /// Translates the latest source version, copying content.
    pub fn new(source: ObjectId, language: impl Into<Language>, editor: UserId) -> Self {
        Self {
            source,
            language: language.into(),
            copy_content: true,
            source_version: None,
            editor,
        }
    }

    /// Copies only the field-group shell.
    #[must_use]
    pub fn shell_only(mut self) -> Self {
        self.copy_content = false;
        self
    }

    /// Translates from the version current at `timestamp`.
    #[must_use]
    pub fn from_version(mut self, timestamp: Timestamp) -> Self {
        self.source_version = Some(timestamp);
        self
    }
}

/// Manages content sets and their language variants.
pub struct TranslationCoordinator {
    objects: Arc<dyn ObjectStore>,
    locks: Arc<dyn LockStore>,
    ledger: Arc<VersionLedger>,
    restore: Arc<RestoreEngine>,
    object_regions: Arc<KeyedRegions<ObjectId>>,
    variant_regions: KeyedRegions<(ContentSetId, Language)>,
    allocator: Arc<dyn IdentityAllocator>,
    clock: Arc<dyn Clock>,
}

impl TranslationCoordinator {
    /// Creates a coordinator.
    ///
    /// `object_regions` must be the same regions the lock manager uses.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        locks: Arc<dyn LockStore>,
        ledger: Arc<VersionLedger>,
        restore: Arc<RestoreEngine>,
        object_regions: Arc<KeyedRegions<ObjectId>>,
        variant_regions: KeyedRegions<(ContentSetId, Language)>,
        allocator: Arc<dyn IdentityAllocator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            objects,
            locks,
            ledger,
            restore,
            object_regions,
            variant_regions,
            allocator,
            clock,
        }
    }

    /// Returns the variant of `request.source` in `request.language`,
    /// creating it if the slot is empty.
    ///
    /// Repeated and concurrent calls for the same slot return the same
    /// object. Translating into the source's own language returns the source.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the source has no language, and
    /// `VersionNotFound` if `source_version` precedes the source's history.
    pub fn translate(&self, request: &TranslateRequest) -> CoreResult<ContentObject> {
        let source = live_object(self.objects.as_ref(), request.source)?;
        let Some(source_language) = source.language.clone() else {
            return Err(CoreError::invalid_operation(format!(
                "{} has no language and cannot be translated",
                source.id
            )));
        };
        if source_language == request.language {
            return Ok(source);
        }

        let content_set = self.content_set_of(source.id)?;
        let basis = match request.source_version {
            Some(timestamp) => self.ledger.version_at(source.id, timestamp)?,
            None => self.head(source.id)?,
        };

        let key = (content_set, request.language.clone());
        self.variant_regions.run(&key, || {
            if let Some(existing) = self.objects.find_variant(content_set, &request.language)? {
                debug!(
                    source = %source.id,
                    variant = %existing.id,
                    language = %request.language,
                    "translation already exists"
                );
                return Ok(existing);
            }
            self.create_variant(&source, content_set, &basis, request)
        })
    }

    /// Returns true if the variant's sync pointer matches the source's
    /// latest version.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the object was not created by
    /// translation.
    pub fn in_sync(&self, target: ObjectId) -> CoreResult<bool> {
        let (_, pointer) = self.pointer_of(target)?;
        let head = self.head(pointer.source)?;
        Ok(head.timestamp == pointer.version_timestamp)
    }

    /// Moves the sync pointer without copying content.
    pub fn synchronize(&self, target: ObjectId, timestamp: Timestamp) -> CoreResult<ContentObject> {
        self.object_regions.run(&target, || {
            let (mut record, pointer) = self.pointer_of(target)?;
            record.synced_with = Some(SyncPointer {
                source: pointer.source,
                version_timestamp: timestamp,
            });
            self.objects.update_object(&record)?;
            debug!(%target, source = %pointer.source, %timestamp, "sync pointer moved");
            Ok(record)
        })
    }

    /// Copies the source's content at `timestamp` (default: latest) onto the
    /// variant, appends a version and moves the sync pointer.
    ///
    /// The variant keeps its own identities; field-groups new to it get
    /// fresh ones.
    ///
    /// # Errors
    ///
    /// Returns `LockConflict` if another user is editing the variant.
    pub fn sync_content(
        &self,
        target: ObjectId,
        editor: UserId,
        timestamp: Option<Timestamp>,
    ) -> CoreResult<Version> {
        self.object_regions.run(&target, || {
            let (mut record, pointer) = self.pointer_of(target)?;
            if let Some(deleted_at) = record.deleted {
                return Err(CoreError::ObjectDeleted {
                    object: target,
                    deleted_at,
                });
            }
            ensure_editable(self.locks.as_ref(), target, editor, self.clock.now())?;

            let basis = match timestamp {
                Some(at) => self.ledger.version_at(pointer.source, at)?,
                None => self.head(pointer.source)?,
            };
            self.restore.apply(
                &mut record,
                &basis.content,
                RestoreScope::Object,
                IdentityPolicy::Fresh,
            )?;
            let version = self.ledger.append(
                target,
                record.current_version,
                &record.draft,
                editor,
                false,
                false,
            )?;
            record.current_version = Some(version.number);
            record.synced_with = Some(SyncPointer {
                source: pointer.source,
                version_timestamp: basis.timestamp,
            });
            self.objects.update_object(&record)?;

            info!(%target, source = %pointer.source, number = %version.number, "variant synchronized");
            Ok(version)
        })
    }

    /// Returns every variant of a content set, ordered by ID.
    pub fn variants(&self, content_set: ContentSetId) -> CoreResult<Vec<ContentObject>> {
        self.objects.variants(content_set)
    }

    /// Returns the source's content set, assigning one on first use.
    ///
    /// The assignment itself is a compare-and-set in the object store, so
    /// repositories in other processes agree on the set as well.
    fn content_set_of(&self, source: ObjectId) -> CoreResult<ContentSetId> {
        self.object_regions.run(&source, || {
            let record = live_object(self.objects.as_ref(), source)?;
            if let Some(set) = record.content_set {
                return Ok(set);
            }
            let proposed = self.allocator.content_set_id();
            let set = self.objects.assign_content_set(source, proposed)?;
            if set == proposed {
                info!(object = %source, content_set = %set, "content set assigned");
            } else {
                debug!(object = %source, content_set = %set, "content set assigned elsewhere");
            }
            Ok(set)
        })
    }

    fn create_variant(
        &self,
        source: &ContentObject,
        content_set: ContentSetId,
        basis: &Version,
        request: &TranslateRequest,
    ) -> CoreResult<ContentObject> {
        let mut variant = ContentObject::new(
            self.allocator.object_id(),
            self.allocator.global_id(),
            source.kind,
            source.container,
            Some(request.language.clone()),
            Default::default(),
        );
        variant.content_set = Some(content_set);
        variant.synced_with = Some(SyncPointer {
            source: source.id,
            version_timestamp: basis.timestamp,
        });
        self.restore.apply(
            &mut variant,
            &basis.content,
            RestoreScope::Object,
            IdentityPolicy::Fresh,
        )?;
        if !request.copy_content {
            for value in variant.draft.groups.values_mut().flat_map(|g| g.values.values_mut()) {
                value.content = FieldContent::Empty;
            }
        }

        match self.objects.insert_object(variant.clone()) {
            Ok(()) => {}
            Err(CoreError::DuplicateVariant { .. }) => {
                // Another process filled the slot between our check and insert.
                if let Some(winner) = self.objects.find_variant(content_set, &request.language)? {
                    return Ok(winner);
                }
                return Err(CoreError::DuplicateVariant {
                    content_set,
                    language: request.language.clone(),
                });
            }
            Err(e) => return Err(e),
        }

        self.ledger.record(&mut variant, request.editor, false)?;
        self.objects.update_object(&variant)?;
        info!(
            source = %source.id,
            variant = %variant.id,
            language = %request.language,
            %content_set,
            "translation created"
        );
        Ok(variant)
    }

    fn pointer_of(&self, target: ObjectId) -> CoreResult<(ContentObject, SyncPointer)> {
        let record = self
            .objects
            .object(target)?
            .ok_or_else(|| CoreError::object_not_found(target))?;
        match record.synced_with {
            Some(pointer) => Ok((record, pointer)),
            None => Err(CoreError::invalid_operation(format!(
                "{target} is not a translation"
            ))),
        }
    }

    fn head(&self, object: ObjectId) -> CoreResult<Version> {
        self.ledger
            .latest(object)?
            .ok_or_else(|| CoreError::invalid_operation(format!("{object} has no versions")))
    }
}

impl std::fmt::Debug for TranslationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationCoordinator")
            .field("object_regions", &self.object_regions)
            .field("variant_regions", &self.variant_regions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::Config;
    use crate::identity::SequentialAllocator;
    use crate::model::{ContentDraft, ContentSnapshot, ObjectKind};
    use crate::registry::{DefinitionRegistry, InMemoryDefinitions};
    use crate::store::{InMemoryStore, LedgerStore, PublishStore};
    use crate::types::{ContainerRef, DefinitionId};
    use crate::version_number::VersionNumber;
    use std::thread;
    use std::time::Duration;

    const EDITOR: UserId = UserId::new(1);
    const TEXT: DefinitionId = DefinitionId::new(1);

    struct Fixture {
        coordinator: Arc<TranslationCoordinator>,
        ledger: Arc<VersionLedger>,
        store: Arc<InMemoryStore>,
        clock: Arc<ManualClock>,
        allocator: Arc<dyn IdentityAllocator>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(50_000)));
        let allocator: Arc<dyn IdentityAllocator> = Arc::new(SequentialAllocator::new());
        let ledger = Arc::new(VersionLedger::new(
            Arc::clone(&store) as Arc<dyn LedgerStore>,
            Arc::clone(&store) as Arc<dyn PublishStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let regions = Arc::new(KeyedRegions::new(Duration::from_secs(5)));
        let restore = Arc::new(RestoreEngine::new(
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            Arc::clone(&store) as Arc<dyn LockStore>,
            Arc::clone(&ledger),
            Arc::clone(&regions),
            Arc::new(InMemoryDefinitions::with_definitions([TEXT])) as Arc<dyn DefinitionRegistry>,
            Arc::clone(&allocator),
            Arc::clone(&clock) as Arc<dyn Clock>,
            &Config::default(),
        ));
        let coordinator = Arc::new(TranslationCoordinator::new(
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            Arc::clone(&store) as Arc<dyn LockStore>,
            Arc::clone(&ledger),
            restore,
            regions,
            KeyedRegions::new(Duration::from_secs(5)),
            Arc::clone(&allocator),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        Fixture {
            coordinator,
            ledger,
            store,
            clock,
            allocator,
        }
    }

    fn text(body: &str) -> ContentDraft {
        ContentDraft::new("page").with_group("body", TEXT, [("text", FieldContent::text(body))])
    }

    impl Fixture {
        fn source(&self, language: Option<&str>) -> ObjectId {
            let id = self.allocator.object_id();
            let draft = ContentSnapshot::default().apply_draft(&text("hello"), self.allocator.as_ref());
            let mut object = ContentObject::new(
                id,
                self.allocator.global_id(),
                ObjectKind::Page,
                ContainerRef::new(3),
                language.map(Language::from),
                draft,
            );
            self.ledger.record(&mut object, EDITOR, false).unwrap();
            self.store.insert_object(object).unwrap();
            id
        }

        fn edit(&self, id: ObjectId, body: &str) {
            self.clock.advance(Duration::from_secs(30));
            let mut object = self.store.object(id).unwrap().unwrap();
            object.draft = object.draft.apply_draft(&text(body), self.allocator.as_ref());
            self.ledger.record(&mut object, EDITOR, false).unwrap();
            self.store.update_object(&object).unwrap();
        }
    }

    #[test]
    fn translate_creates_variant_in_new_content_set() {
        let f = fixture();
        let source = f.source(Some("de"));
        let variant = f
            .coordinator
            .translate(&TranslateRequest::new(source, "en", EDITOR))
            .unwrap();

        let source_record = f.store.object(source).unwrap().unwrap();
        assert!(source_record.content_set.is_some());
        assert_eq!(variant.content_set, source_record.content_set);
        assert_eq!(variant.language, Some(Language::from("en")));
        assert_ne!(variant.global_id, source_record.global_id);
        assert_eq!(variant.current_version, Some(VersionNumber::FIRST));
        assert!(variant.draft.same_content(&source_record.draft));
        assert!(f.coordinator.in_sync(variant.id).unwrap());
    }

    #[test]
    fn translate_is_idempotent() {
        let f = fixture();
        let source = f.source(Some("de"));
        let request = TranslateRequest::new(source, "en", EDITOR);
        let first = f.coordinator.translate(&request).unwrap();
        let second = f.coordinator.translate(&request).unwrap();
        assert_eq!(first.id, second.id);
        let set = first.content_set.unwrap();
        assert_eq!(f.coordinator.variants(set).unwrap().len(), 2);
    }

    #[test]
    fn translate_into_own_language_returns_source() {
        let f = fixture();
        let source = f.source(Some("de"));
        let result = f
            .coordinator
            .translate(&TranslateRequest::new(source, "DE", EDITOR))
            .unwrap();
        assert_eq!(result.id, source);
    }

    #[test]
    fn translate_requires_source_language() {
        let f = fixture();
        let source = f.source(None);
        let result = f.coordinator.translate(&TranslateRequest::new(source, "en", EDITOR));
        assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
    }

    #[test]
    fn shell_only_translation_blanks_values() {
        let f = fixture();
        let source = f.source(Some("de"));
        let variant = f
            .coordinator
            .translate(&TranslateRequest::new(source, "fr", EDITOR).shell_only())
            .unwrap();
        let body = variant.draft.group("body").unwrap();
        assert_eq!(body.definition, TEXT);
        assert_eq!(body.value("text"), Some(&FieldContent::Empty));
    }

    #[test]
    fn concurrent_translate_converges() {
        let f = fixture();
        let source = f.source(Some("de"));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let coordinator = Arc::clone(&f.coordinator);
                thread::spawn(move || {
                    coordinator
                        .translate(&TranslateRequest::new(source, "en", EDITOR))
                        .unwrap()
                        .id
                })
            })
            .collect();
        let ids: Vec<ObjectId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));

        let set = f.store.object(source).unwrap().unwrap().content_set.unwrap();
        let english: Vec<_> = f
            .coordinator
            .variants(set)
            .unwrap()
            .into_iter()
            .filter(|o| o.language == Some(Language::from("en")))
            .collect();
        assert_eq!(english.len(), 1);
    }

    #[test]
    fn source_edit_breaks_sync_lazily() {
        let f = fixture();
        let source = f.source(Some("de"));
        let variant = f
            .coordinator
            .translate(&TranslateRequest::new(source, "en", EDITOR))
            .unwrap();
        f.edit(source, "changed");
        assert!(!f.coordinator.in_sync(variant.id).unwrap());

        let head = f.ledger.latest(source).unwrap().unwrap();
        f.coordinator.synchronize(variant.id, head.timestamp).unwrap();
        assert!(f.coordinator.in_sync(variant.id).unwrap());
    }

    #[test]
    fn sync_content_copies_source_and_keeps_identities() {
        let f = fixture();
        let source = f.source(Some("de"));
        let variant = f
            .coordinator
            .translate(&TranslateRequest::new(source, "en", EDITOR))
            .unwrap();
        f.edit(source, "neu");

        let version = f.coordinator.sync_content(variant.id, EDITOR, None).unwrap();
        assert_eq!(version.number, VersionNumber::new(1, 1));

        let after = f.store.object(variant.id).unwrap().unwrap();
        assert_eq!(after.draft.global_ids(), variant.draft.global_ids());
        assert_eq!(
            after.draft.group("body").unwrap().value("text"),
            Some(&FieldContent::text("neu"))
        );
        assert!(f.coordinator.in_sync(variant.id).unwrap());
    }

    #[test]
    fn in_sync_rejects_non_translation() {
        let f = fixture();
        let source = f.source(Some("de"));
        assert!(matches!(
            f.coordinator.in_sync(source),
            Err(CoreError::InvalidOperation { .. })
        ));
    }
}
