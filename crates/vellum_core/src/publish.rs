//! Publish snapshot store.
//!
//! The published version is a pointer into the ledger, kept apart from the
//! working copy. Rendering for publish takes content from that version and
//! location from the live object; rendering for preview takes both from the
//! live object.

use crate::error::{CoreError, CoreResult};
use crate::ledger::VersionLedger;
use crate::lock::{live_object, KeyedRegions};
use crate::model::{ContentSnapshot, Version};
use crate::store::ObjectStore;
use crate::types::{ContainerRef, ObjectId};
use crate::version_number::VersionNumber;
use std::sync::Arc;
use tracing::info;

/// Publication state of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    /// No version is published.
    Offline,
    /// The published version is the ledger head and the working copy matches it.
    Published,
    /// A version is published but newer content exists.
    Modified,
}

impl std::fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Offline => "offline",
            Self::Published => "published",
            Self::Modified => "modified",
        };
        f.write_str(label)
    }
}

/// What a renderer sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    /// The rendered object.
    pub object: ObjectId,
    /// Version the content came from; `None` for a never-versioned draft.
    pub version: Option<VersionNumber>,
    /// Field-group content.
    pub content: Arc<ContentSnapshot>,
    /// Live location of the object.
    pub container: ContainerRef,
}

/// Promotes ledger versions to published and renders objects.
pub struct PublishSnapshots {
    objects: Arc<dyn ObjectStore>,
    ledger: Arc<VersionLedger>,
    regions: Arc<KeyedRegions<ObjectId>>,
}

impl PublishSnapshots {
    /// Creates the publish store facade.
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        ledger: Arc<VersionLedger>,
        regions: Arc<KeyedRegions<ObjectId>>,
    ) -> Self {
        Self {
            objects,
            ledger,
            regions,
        }
    }

    /// Flags the ledger head as published, un-flagging the previous one.
    ///
    /// # Errors
    ///
    /// Returns `ObjectDeleted` for objects in the wastebin.
    pub fn publish(&self, object: ObjectId) -> CoreResult<Version> {
        self.regions.run(&object, || {
            live_object(self.objects.as_ref(), object)?;
            let mut head = self.ledger.latest(object)?.ok_or_else(|| {
                CoreError::invalid_operation(format!("{object} has no version to publish"))
            })?;
            let previous = self.ledger.mark_published(object, head.number)?;
            head.published = true;
            info!(%object, number = %head.number, ?previous, "published");
            Ok(head)
        })
    }

    /// Takes an object offline, returning the previously published number.
    pub fn unpublish(&self, object: ObjectId) -> CoreResult<Option<VersionNumber>> {
        self.regions.run(&object, || {
            let previous = self.ledger.clear_published(object)?;
            if let Some(number) = previous {
                info!(%object, %number, "unpublished");
            }
            Ok(previous)
        })
    }

    /// Returns the publication state.
    pub fn status(&self, object: ObjectId) -> CoreResult<PublishStatus> {
        let record = self
            .objects
            .object(object)?
            .ok_or_else(|| CoreError::object_not_found(object))?;
        let Some(published) = self.ledger.published(object)? else {
            return Ok(PublishStatus::Offline);
        };
        let Some(head) = self.ledger.latest(object)? else {
            return Ok(PublishStatus::Offline);
        };
        if head.number == published && head.content.same_content(&record.draft) {
            Ok(PublishStatus::Published)
        } else {
            Ok(PublishStatus::Modified)
        }
    }

    /// Published content with the live container.
    ///
    /// # Errors
    ///
    /// Returns `NotPublished` if no version is published and `ObjectDeleted`
    /// if the object is in the wastebin.
    pub fn render_for_publish(&self, object: ObjectId) -> CoreResult<Rendition> {
        let record = live_object(self.objects.as_ref(), object)?;
        let number = self
            .ledger
            .published(object)?
            .ok_or(CoreError::NotPublished { object })?;
        let version = self
            .ledger
            .version(object, number)?
            .ok_or(CoreError::NotPublished { object })?;
        Ok(Rendition {
            object,
            version: Some(version.number),
            content: version.content,
            container: record.container,
        })
    }

    /// Working copy with the live container.
    pub fn render_for_preview(&self, object: ObjectId) -> CoreResult<Rendition> {
        let record = live_object(self.objects.as_ref(), object)?;
        Ok(Rendition {
            object,
            version: record.current_version,
            content: Arc::new(record.draft),
            container: record.container,
        })
    }
}

impl std::fmt::Debug for PublishSnapshots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishSnapshots").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::identity::{GlobalId, IdentityAllocator, SequentialAllocator};
    use crate::model::{ContentDraft, ContentObject, FieldContent, ObjectKind};
    use crate::store::{InMemoryStore, LedgerStore, PublishStore};
    use crate::types::{DefinitionId, Timestamp, UserId};
    use std::time::Duration;

    const EDITOR: UserId = UserId::new(1);

    struct Fixture {
        publish: PublishSnapshots,
        ledger: Arc<VersionLedger>,
        store: Arc<InMemoryStore>,
        allocator: SequentialAllocator,
        id: ObjectId,
    }

    fn body(text: &str) -> ContentDraft {
        ContentDraft::new("page").with_group(
            "body",
            DefinitionId::new(1),
            [("text", FieldContent::text(text))],
        )
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_000)));
        let ledger = Arc::new(VersionLedger::new(
            Arc::clone(&store) as Arc<dyn LedgerStore>,
            Arc::clone(&store) as Arc<dyn PublishStore>,
            clock as Arc<dyn Clock>,
        ));
        let publish = PublishSnapshots::new(
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            Arc::clone(&ledger),
            Arc::new(KeyedRegions::new(Duration::from_secs(1))),
        );
        let allocator = SequentialAllocator::new();
        let id = allocator.object_id();
        let mut object = ContentObject::new(
            id,
            GlobalId::random(),
            ObjectKind::Page,
            ContainerRef::new(1),
            None,
            ContentSnapshot::default().apply_draft(&body("v1"), &allocator),
        );
        ledger.record(&mut object, EDITOR, false).unwrap();
        store.insert_object(object).unwrap();
        Fixture {
            publish,
            ledger,
            store,
            allocator,
            id,
        }
    }

    impl Fixture {
        fn edit(&self, text: &str) {
            let mut object = self.store.object(self.id).unwrap().unwrap();
            object.draft = object.draft.apply_draft(&body(text), &self.allocator);
            self.ledger.record(&mut object, EDITOR, true).unwrap();
            self.store.update_object(&object).unwrap();
        }

        fn move_to(&self, container: ContainerRef) {
            let mut object = self.store.object(self.id).unwrap().unwrap();
            object.container = container;
            self.store.update_object(&object).unwrap();
        }
    }

    #[test]
    fn unpublished_object_cannot_render_for_publish() {
        let f = fixture();
        assert_eq!(f.publish.status(f.id).unwrap(), PublishStatus::Offline);
        assert!(matches!(
            f.publish.render_for_publish(f.id),
            Err(CoreError::NotPublished { .. })
        ));
    }

    #[test]
    fn publish_isolates_content_but_not_location() {
        let f = fixture();
        f.edit("v2");
        let published = f.publish.publish(f.id).unwrap();
        assert!(published.published);
        assert_eq!(published.number, VersionNumber::new(2, 0));

        f.edit("v3");
        f.move_to(ContainerRef::new(42));

        let live = f.publish.render_for_publish(f.id).unwrap();
        assert_eq!(live.version, Some(VersionNumber::new(2, 0)));
        assert_eq!(
            live.content.group("body").unwrap().value("text"),
            Some(&FieldContent::text("v2"))
        );
        assert_eq!(live.container, ContainerRef::new(42));

        let preview = f.publish.render_for_preview(f.id).unwrap();
        assert_eq!(preview.version, Some(VersionNumber::new(3, 0)));
        assert_eq!(
            preview.content.group("body").unwrap().value("text"),
            Some(&FieldContent::text("v3"))
        );
    }

    #[test]
    fn status_tracks_modifications() {
        let f = fixture();
        f.publish.publish(f.id).unwrap();
        assert_eq!(f.publish.status(f.id).unwrap(), PublishStatus::Published);
        f.edit("changed");
        assert_eq!(f.publish.status(f.id).unwrap(), PublishStatus::Modified);
        f.publish.publish(f.id).unwrap();
        assert_eq!(f.publish.status(f.id).unwrap(), PublishStatus::Published);
    }

    #[test]
    fn republish_moves_flag() {
        let f = fixture();
        f.publish.publish(f.id).unwrap();
        f.edit("v2");
        f.publish.publish(f.id).unwrap();
        let published: Vec<_> = f
            .ledger
            .list(f.id)
            .unwrap()
            .into_iter()
            .filter(|v| v.published)
            .map(|v| v.number)
            .collect();
        assert_eq!(published, vec![VersionNumber::new(2, 0)]);
    }

    #[test]
    fn unpublish_takes_object_offline() {
        let f = fixture();
        f.publish.publish(f.id).unwrap();
        assert_eq!(f.publish.unpublish(f.id).unwrap(), Some(VersionNumber::FIRST));
        assert_eq!(f.publish.status(f.id).unwrap(), PublishStatus::Offline);
        assert_eq!(f.publish.unpublish(f.id).unwrap(), None);
    }
}
