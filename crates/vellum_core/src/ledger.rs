//! Version ledger.
//!
//! The ledger is the only writer of version history. `append` is its single
//! mutator and uses optimistic concurrency: the caller states which head it
//! based its write on, and the append is rejected with
//! [`CoreError::StaleWrite`] if the head has moved since.

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::model::{ContentObject, ContentSnapshot, Version};
use crate::store::{LedgerStore, PublishStore};
use crate::types::{ObjectId, Timestamp, UserId};
use crate::version_number::{next_version, VersionNumber};
use std::sync::Arc;
use tracing::{debug, warn};

/// Append-only history of versions per object.
pub struct VersionLedger {
    store: Arc<dyn LedgerStore>,
    publish: Arc<dyn PublishStore>,
    clock: Arc<dyn Clock>,
}

impl VersionLedger {
    /// Creates a ledger over the given stores.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        publish: Arc<dyn PublishStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            publish,
            clock,
        }
    }

    /// Appends a snapshot as the next version.
    ///
    /// `expected_head` is the caller's view of the current version number.
    /// The snapshot is deep-copied; the returned version shares it read-only.
    ///
    /// # Errors
    ///
    /// Returns `StaleWrite` if the ledger head is not `expected_head`, and
    /// `InvalidOperation` if the head's version number cannot be bumped.
    pub fn append(
        &self,
        object: ObjectId,
        expected_head: Option<VersionNumber>,
        snapshot: &ContentSnapshot,
        editor: UserId,
        published: bool,
        major: bool,
    ) -> CoreResult<Version> {
        let head = self.store.head(object)?;
        let actual = head.as_ref().map(|v| v.number);
        if actual != expected_head {
            warn!(%object, ?expected_head, ?actual, "rejecting stale append");
            return Err(CoreError::StaleWrite {
                object,
                expected: expected_head,
                actual,
            });
        }

        let now = self.clock.now();
        let timestamp = match &head {
            Some(h) if h.timestamp >= now => h.timestamp.next(),
            _ => now,
        };

        let mut version = Version {
            sequence: head.as_ref().map_or(1, |h| h.sequence + 1),
            number: next_version(expected_head, major)?,
            timestamp,
            editor,
            published: false,
            content: Arc::new(snapshot.clone()),
            digest: snapshot.digest()?,
        };
        self.store
            .append_if_head(object, expected_head, version.clone())?;

        if published {
            self.publish.set_published(object, version.number)?;
            version.published = true;
        }

        debug!(%object, number = %version.number, %editor, "appended version");
        Ok(version)
    }

    /// Appends the object's working copy if it differs from the ledger head.
    ///
    /// On success `object.current_version` is advanced; persisting the
    /// object record is the caller's job. Returns `None` when the content is
    /// unchanged, which leaves the ledger untouched.
    pub fn record(
        &self,
        object: &mut ContentObject,
        editor: UserId,
        major: bool,
    ) -> CoreResult<Option<Version>> {
        if !self.differs_from_head(object.id, &object.draft)? {
            debug!(object = %object.id, "content unchanged, no new version");
            return Ok(None);
        }
        let version = self.append(
            object.id,
            object.current_version,
            &object.draft,
            editor,
            false,
            major,
        )?;
        object.current_version = Some(version.number);
        Ok(Some(version))
    }

    /// Returns true if `snapshot` differs in content from the ledger head.
    pub fn differs_from_head(&self, object: ObjectId, snapshot: &ContentSnapshot) -> CoreResult<bool> {
        Ok(match self.store.head(object)? {
            Some(head) => !head.content.same_content(snapshot),
            None => true,
        })
    }

    /// Lists all versions in append order.
    ///
    /// The result is a finite copy; call again to restart from the beginning.
    pub fn list(&self, object: ObjectId) -> CoreResult<Vec<Version>> {
        let published = self.publish.published(object)?;
        let mut versions = self.store.versions(object)?;
        for version in &mut versions {
            version.published = Some(version.number) == published;
        }
        Ok(versions)
    }

    /// Returns the most recent version.
    pub fn latest(&self, object: ObjectId) -> CoreResult<Option<Version>> {
        self.store
            .head(object)?
            .map(|v| self.with_flag(object, v))
            .transpose()
    }

    /// Returns the version with the given number.
    pub fn version(&self, object: ObjectId, number: VersionNumber) -> CoreResult<Option<Version>> {
        Ok(self.list(object)?.into_iter().find(|v| v.number == number))
    }

    /// Returns the latest version appended at or before `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns `VersionNotFound` if the history starts after `timestamp`.
    pub fn version_at(&self, object: ObjectId, timestamp: Timestamp) -> CoreResult<Version> {
        self.list(object)?
            .into_iter()
            .rev()
            .find(|v| v.timestamp <= timestamp)
            .ok_or(CoreError::VersionNotFound { object, timestamp })
    }

    /// Returns the published version number.
    pub fn published(&self, object: ObjectId) -> CoreResult<Option<VersionNumber>> {
        self.publish.published(object)
    }

    /// Flags `number` as the published version, un-flagging the previous one.
    pub fn mark_published(
        &self,
        object: ObjectId,
        number: VersionNumber,
    ) -> CoreResult<Option<VersionNumber>> {
        self.publish.set_published(object, number)
    }

    /// Clears the published flag.
    pub fn clear_published(&self, object: ObjectId) -> CoreResult<Option<VersionNumber>> {
        self.publish.clear_published(object)
    }

    /// Garbage-collects the history of a purged object.
    pub fn purge(&self, object: ObjectId) -> CoreResult<usize> {
        self.publish.clear_published(object)?;
        self.store.purge_versions(object)
    }

    fn with_flag(&self, object: ObjectId, mut version: Version) -> CoreResult<Version> {
        version.published = self.publish.published(object)? == Some(version.number);
        Ok(version)
    }
}

impl std::fmt::Debug for VersionLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionLedger").finish_non_exhaustive()
    }
}
