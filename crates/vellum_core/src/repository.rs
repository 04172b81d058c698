//! Repository facade.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::identity::{IdentityAllocator, SequentialAllocator};
use crate::ledger::VersionLedger;
use crate::lock::{
    ensure_editable, live_object, AcquireOutcome, CancelOutcome, KeyedRegions, LockInfo,
    LockManager, SaveOptions, SaveOutcome,
};
use crate::model::{ContentDraft, ContentObject, ContentSnapshot, ObjectKind, Version};
use crate::publish::{PublishSnapshots, PublishStatus, Rendition};
use crate::registry::{DefinitionRegistry, InMemoryDefinitions};
use crate::restore::RestoreEngine;
use crate::store::{InMemoryStore, StoreDump, Stores};
use crate::translation::{TranslateRequest, TranslationCoordinator};
use crate::types::{ContainerRef, ContentSetId, Language, ObjectId, Timestamp, UserId};
use crate::verify::{verify_dump, VerifyReport};
use crate::version_number::VersionNumber;
use std::sync::Arc;
use tracing::{debug, info};

/// Parameters for creating a content object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewObject {
    /// Concrete kind.
    pub kind: ObjectKind,
    /// Initial location.
    pub container: ContainerRef,
    /// Language, required for translation.
    pub language: Option<Language>,
    /// Initial content from the defining layout.
    pub content: ContentDraft,
    /// Author of version 1.0.
    pub editor: UserId,
}

impl NewObject {
    /// A page with the given initial content.
    pub fn page(container: ContainerRef, content: ContentDraft, editor: UserId) -> Self {
        Self {
            kind: ObjectKind::Page,
            container,
            language: None,
            content,
            editor,
        }
    }

    /// Sets the language.
    #[must_use]
    pub fn in_language(mut self, language: impl Into<Language>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// The versioned content-object store.
///
/// `Repository` wires the six components over one set of stores:
/// - [`VersionLedger`] for append-only history
/// - [`LockManager`] for edit locks and saves
/// - [`RestoreEngine`] for restores
/// - [`TranslationCoordinator`] for language variants
/// - [`PublishSnapshots`] for publish state and rendering
///
/// Every operation is synchronous. Each call runs as one unit against the
/// stores; wrapping calls in a transaction is the caller's concern.
///
/// ```rust,ignore
/// let repo = Repository::open_in_memory();
/// let page = repo.create(NewObject::page(ContainerRef::new(1), draft, editor))?;
/// repo.acquire(page.id, editor)?;
/// repo.save(page.id, editor, &edited, SaveOptions::major())?;
/// repo.release(page.id, editor, SaveOptions::draft_only())?;
/// repo.publish(page.id)?;
/// ```
pub struct Repository {
    config: Config,
    stores: Stores,
    clock: Arc<dyn Clock>,
    allocator: Arc<dyn IdentityAllocator>,
    definitions: Arc<dyn DefinitionRegistry>,
    regions: Arc<KeyedRegions<ObjectId>>,
    ledger: Arc<VersionLedger>,
    locks: LockManager,
    restore: Arc<RestoreEngine>,
    translations: TranslationCoordinator,
    publish: PublishSnapshots,
}

/// Builder for [`Repository`].
#[derive(Default)]
pub struct RepositoryBuilder {
    config: Config,
    stores: Option<Stores>,
    clock: Option<Arc<dyn Clock>>,
    allocator: Option<Arc<dyn IdentityAllocator>>,
    definitions: Option<Arc<dyn DefinitionRegistry>>,
}

impl RepositoryBuilder {
    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the stores. Defaults to a fresh in-memory store.
    #[must_use]
    pub fn stores(mut self, stores: Stores) -> Self {
        self.stores = Some(stores);
        self
    }

    /// Sets the clock. Defaults to [`SystemClock`].
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the identity allocator. Defaults to [`SequentialAllocator`].
    #[must_use]
    pub fn allocator(mut self, allocator: Arc<dyn IdentityAllocator>) -> Self {
        self.allocator = Some(allocator);
        self
    }

    /// Sets the definition registry. Defaults to an empty registry.
    #[must_use]
    pub fn definitions(mut self, definitions: Arc<dyn DefinitionRegistry>) -> Self {
        self.definitions = Some(definitions);
        self
    }

    /// Wires the components.
    #[must_use]
    pub fn build(self) -> Repository {
        let config = self.config;
        let stores = self.stores.unwrap_or_else(Stores::in_memory);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let allocator = self
            .allocator
            .unwrap_or_else(|| Arc::new(SequentialAllocator::new()) as Arc<dyn IdentityAllocator>);
        let definitions = self
            .definitions
            .unwrap_or_else(|| Arc::new(InMemoryDefinitions::new()) as Arc<dyn DefinitionRegistry>);

        let regions = Arc::new(KeyedRegions::new(config.region_wait));
        let ledger = Arc::new(VersionLedger::new(
            Arc::clone(&stores.ledger),
            Arc::clone(&stores.publish),
            Arc::clone(&clock),
        ));
        let locks = LockManager::new(
            Arc::clone(&stores.objects),
            Arc::clone(&stores.locks),
            Arc::clone(&ledger),
            Arc::clone(&regions),
            Arc::clone(&allocator),
            Arc::clone(&clock),
            &config,
        );
        let restore = Arc::new(RestoreEngine::new(
            Arc::clone(&stores.objects),
            Arc::clone(&stores.locks),
            Arc::clone(&ledger),
            Arc::clone(&regions),
            Arc::clone(&definitions),
            Arc::clone(&allocator),
            Arc::clone(&clock),
            &config,
        ));
        let translations = TranslationCoordinator::new(
            Arc::clone(&stores.objects),
            Arc::clone(&stores.locks),
            Arc::clone(&ledger),
            Arc::clone(&restore),
            Arc::clone(&regions),
            KeyedRegions::new(config.region_wait),
            Arc::clone(&allocator),
            Arc::clone(&clock),
        );
        let publish = PublishSnapshots::new(
            Arc::clone(&stores.objects),
            Arc::clone(&ledger),
            Arc::clone(&regions),
        );

        Repository {
            config,
            stores,
            clock,
            allocator,
            definitions,
            regions,
            ledger,
            locks,
            restore,
            translations,
            publish,
        }
    }
}

impl Repository {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> RepositoryBuilder {
        RepositoryBuilder::default()
    }

    /// Opens an empty in-memory repository with default settings.
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self::builder().build()
    }

    /// Rebuilds a repository from a dump.
    ///
    /// Allocation resumes after the highest IDs in the dump.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the dump's IDs are exhausted or its
    /// objects collide.
    pub fn from_dump(dump: StoreDump, builder: RepositoryBuilder) -> CoreResult<Self> {
        let (next_object, next_set) = dump.next_ids()?;
        let store = Arc::new(InMemoryStore::import(dump)?);
        let allocator = Arc::new(SequentialAllocator::resume(next_object, next_set));
        Ok(builder
            .stores(Stores::from_memory(store))
            .allocator(allocator)
            .build())
    }

    /// Captures every object with its ledger, lock and publish pointer.
    pub fn export(&self) -> CoreResult<StoreDump> {
        StoreDump::capture(&self.stores)
    }

    /// Checks the model invariants over the current state.
    pub fn verify(&self) -> CoreResult<VerifyReport> {
        Ok(verify_dump(&self.export()?))
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ========================================================================
    // Object lifecycle
    // ========================================================================

    /// Creates an object and appends version 1.0.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the content references an unknown
    /// field-group definition.
    pub fn create(&self, new: NewObject) -> CoreResult<ContentObject> {
        self.check_definitions(&new.content)?;
        let draft = ContentSnapshot::default().apply_draft(&new.content, self.allocator.as_ref());
        let mut object = ContentObject::new(
            self.allocator.object_id(),
            self.allocator.global_id(),
            new.kind,
            new.container,
            new.language,
            draft,
        );
        let id = object.id;
        self.regions.run(&id, || {
            self.stores.objects.insert_object(object.clone())?;
            self.ledger.record(&mut object, new.editor, false)?;
            self.stores.objects.update_object(&object)?;
            info!(object = %id, kind = ?object.kind, "created");
            Ok(object)
        })
    }

    /// Returns an object, including objects in the wastebin.
    pub fn object(&self, id: ObjectId) -> CoreResult<ContentObject> {
        self.stores
            .objects
            .object(id)?
            .ok_or_else(|| CoreError::object_not_found(id))
    }

    /// Moves an object. Location is live state and never versioned.
    pub fn move_to(&self, id: ObjectId, container: ContainerRef) -> CoreResult<ContentObject> {
        self.regions.run(&id, || {
            let mut record = live_object(self.stores.objects.as_ref(), id)?;
            let from = record.container;
            record.container = container;
            self.stores.objects.update_object(&record)?;
            debug!(object = %id, %from, to = %container, "moved");
            Ok(record)
        })
    }

    /// Moves an object to the wastebin.
    ///
    /// Any lock of `user` is dropped. The variant slot stays occupied until
    /// the object is purged.
    ///
    /// # Errors
    ///
    /// Returns `LockConflict` while another user edits the object.
    pub fn delete(&self, id: ObjectId, user: UserId) -> CoreResult<ContentObject> {
        self.regions.run(&id, || {
            let mut record = live_object(self.stores.objects.as_ref(), id)?;
            let now = self.clock.now();
            ensure_editable(self.stores.locks.as_ref(), id, user, now)?;
            record.deleted = Some(now);
            self.stores.objects.update_object(&record)?;
            self.stores.locks.remove_lock(id)?;
            info!(object = %id, %user, "moved to wastebin");
            Ok(record)
        })
    }

    /// Restores an object from the wastebin.
    pub fn undelete(&self, id: ObjectId) -> CoreResult<ContentObject> {
        self.regions.run(&id, || {
            let mut record = self.object(id)?;
            if record.deleted.take().is_none() {
                return Err(CoreError::invalid_operation(format!("{id} is not deleted")));
            }
            self.stores.objects.update_object(&record)?;
            info!(object = %id, "restored from wastebin");
            Ok(record)
        })
    }

    /// Permanently removes a deleted object together with its history.
    ///
    /// Returns the number of versions garbage-collected.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` unless the object is in the wastebin.
    pub fn purge(&self, id: ObjectId) -> CoreResult<usize> {
        self.regions.run(&id, || {
            let record = self.object(id)?;
            if !record.is_deleted() {
                return Err(CoreError::invalid_operation(format!(
                    "{id} must be deleted before it can be purged"
                )));
            }
            self.stores.objects.remove_object(id)?;
            self.stores.locks.remove_lock(id)?;
            let versions = self.ledger.purge(id)?;
            info!(object = %id, versions, "purged");
            Ok(versions)
        })
    }

    // ========================================================================
    // Locks and saves
    // ========================================================================

    /// See [`LockManager::acquire`].
    pub fn acquire(&self, id: ObjectId, user: UserId) -> CoreResult<AcquireOutcome> {
        self.locks.acquire(id, user)
    }

    /// See [`LockManager::release`].
    pub fn release(
        &self,
        id: ObjectId,
        user: UserId,
        options: SaveOptions,
    ) -> CoreResult<Option<Version>> {
        self.locks.release(id, user, options)
    }

    /// See [`LockManager::cancel`].
    pub fn cancel(&self, id: ObjectId, user: UserId) -> CoreResult<CancelOutcome> {
        self.locks.cancel(id, user)
    }

    /// Saves a draft through [`LockManager::save`] after checking its definitions.
    pub fn save(
        &self,
        id: ObjectId,
        user: UserId,
        draft: &ContentDraft,
        options: SaveOptions,
    ) -> CoreResult<SaveOutcome> {
        self.check_definitions(draft)?;
        self.locks.save(id, user, draft, options)
    }

    /// See [`LockManager::lock_info`].
    pub fn lock_info(&self, id: ObjectId) -> CoreResult<Option<LockInfo>> {
        self.locks.lock_info(id)
    }

    // ========================================================================
    // History
    // ========================================================================

    /// All versions in append order.
    pub fn versions(&self, id: ObjectId) -> CoreResult<Vec<Version>> {
        self.ledger.list(id)
    }

    /// The most recent version.
    pub fn latest(&self, id: ObjectId) -> CoreResult<Option<Version>> {
        self.ledger.latest(id)
    }

    /// The version with the given number.
    pub fn version(&self, id: ObjectId, number: VersionNumber) -> CoreResult<Option<Version>> {
        self.ledger.version(id, number)
    }

    /// The version current at `timestamp`.
    pub fn version_at(&self, id: ObjectId, timestamp: Timestamp) -> CoreResult<Version> {
        self.ledger.version_at(id, timestamp)
    }

    /// See [`RestoreEngine::restore_object`].
    pub fn restore_object(
        &self,
        id: ObjectId,
        target: Timestamp,
        editor: UserId,
    ) -> CoreResult<Version> {
        self.restore.restore_object(id, target, editor)
    }

    /// See [`RestoreEngine::restore_field_group`].
    pub fn restore_field_group(
        &self,
        id: ObjectId,
        name: &str,
        target: Timestamp,
        editor: UserId,
    ) -> CoreResult<Version> {
        self.restore.restore_field_group(id, name, target, editor)
    }

    // ========================================================================
    // Translations
    // ========================================================================

    /// See [`TranslationCoordinator::translate`].
    pub fn translate(&self, request: &TranslateRequest) -> CoreResult<ContentObject> {
        self.translations.translate(request)
    }

    /// See [`TranslationCoordinator::in_sync`].
    pub fn in_sync(&self, id: ObjectId) -> CoreResult<bool> {
        self.translations.in_sync(id)
    }

    /// See [`TranslationCoordinator::synchronize`].
    pub fn synchronize(&self, id: ObjectId, timestamp: Timestamp) -> CoreResult<ContentObject> {
        self.translations.synchronize(id, timestamp)
    }

    /// See [`TranslationCoordinator::sync_content`].
    pub fn sync_content(
        &self,
        id: ObjectId,
        editor: UserId,
        timestamp: Option<Timestamp>,
    ) -> CoreResult<Version> {
        self.translations.sync_content(id, editor, timestamp)
    }

    /// See [`TranslationCoordinator::variants`].
    pub fn variants(&self, content_set: ContentSetId) -> CoreResult<Vec<ContentObject>> {
        self.translations.variants(content_set)
    }

    // ========================================================================
    // Publishing
    // ========================================================================

    /// See [`PublishSnapshots::publish`].
    pub fn publish(&self, id: ObjectId) -> CoreResult<Version> {
        self.publish.publish(id)
    }

    /// See [`PublishSnapshots::unpublish`].
    pub fn unpublish(&self, id: ObjectId) -> CoreResult<Option<VersionNumber>> {
        self.publish.unpublish(id)
    }

    /// See [`PublishSnapshots::status`].
    pub fn status(&self, id: ObjectId) -> CoreResult<PublishStatus> {
        self.publish.status(id)
    }

    /// See [`PublishSnapshots::render_for_publish`].
    pub fn render_for_publish(&self, id: ObjectId) -> CoreResult<Rendition> {
        self.publish.render_for_publish(id)
    }

    /// See [`PublishSnapshots::render_for_preview`].
    pub fn render_for_preview(&self, id: ObjectId) -> CoreResult<Rendition> {
        self.publish.render_for_preview(id)
    }

    fn check_definitions(&self, draft: &ContentDraft) -> CoreResult<()> {
        match draft
            .groups
            .iter()
            .find(|(_, group)| !self.definitions.exists(group.definition))
        {
            Some((name, group)) => Err(CoreError::invalid_operation(format!(
                "field group {name:?} references unknown definition {}",
                group.definition
            ))),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("config", &self.config)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}
