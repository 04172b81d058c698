//! Edit locks.
//!
//! An edit [`Lock`] is a long-lived, application-level reservation of one
//! object by one user. Expiry is detected lazily: an expired lock stays in
//! place until another user tries to acquire the object.
//!
//! Every state transition runs inside the object's [`KeyedRegions`] slot,
//! so concurrent requests on the same object are serialized for the
//! duration of one call only.

mod region;

pub use region::KeyedRegions;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::identity::IdentityAllocator;
use crate::ledger::VersionLedger;
use crate::model::{ContentDraft, ContentObject, Version};
use crate::store::{LockStore, ObjectStore};
use crate::types::{ObjectId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Exclusive edit rights of one user on one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    /// The lock holder.
    pub owner: UserId,
    /// When the lock was (last) acquired.
    pub acquired_at: Timestamp,
    /// How long the lock is honoured.
    pub timeout: Duration,
}

impl Lock {
    /// Returns the moment the lock stops being honoured.
    #[must_use]
    pub fn expires_at(&self) -> Timestamp {
        self.acquired_at.saturating_add(self.timeout)
    }

    /// Returns true once `timeout` has fully elapsed.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now.duration_since(self.acquired_at) >= self.timeout
    }

    /// Time left until expiry.
    #[must_use]
    pub fn remaining(&self, now: Timestamp) -> Duration {
        self.expires_at().duration_since(now)
    }
}

/// A lock as seen at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    /// The stored lock.
    pub lock: Lock,
    /// Whether it may be taken over.
    pub expired: bool,
}

/// Result of [`LockManager::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The object was unlocked and is now locked by the caller.
    Acquired,
    /// The caller already held the lock; it has been refreshed.
    AlreadyHeld,
    /// An expired lock of another user was replaced.
    TakenOver {
        /// The user whose lock expired.
        previous_owner: UserId,
        /// The version auto-saved on their behalf, if their draft had changes.
        saved: Option<Version>,
    },
}

/// Result of [`LockManager::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Draft changes were discarded and the lock released.
    Cancelled {
        /// Whether the working copy differed from the ledger head.
        discarded_changes: bool,
    },
    /// The object was not locked; nothing happened.
    NotLocked,
}

/// Options for saving a working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveOptions {
    /// Append a version if the content differs from the ledger head.
    pub create_version: bool,
    /// Make that version a major one.
    pub major: bool,
}

impl SaveOptions {
    /// Save the working copy only.
    #[must_use]
    pub const fn draft_only() -> Self {
        Self {
            create_version: false,
            major: false,
        }
    }

    /// Save and append a minor version if changed.
    #[must_use]
    pub const fn minor() -> Self {
        Self {
            create_version: true,
            major: false,
        }
    }

    /// Save and append a major version if changed.
    #[must_use]
    pub const fn major() -> Self {
        Self {
            create_version: true,
            major: true,
        }
    }
}

/// Result of a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// The saved object record.
    pub object: ContentObject,
    /// The version appended, if any.
    pub version: Option<Version>,
}

/// Grants, refreshes, releases and takes over edit locks.
pub struct LockManager {
    objects: Arc<dyn ObjectStore>,
    locks: Arc<dyn LockStore>,
    ledger: Arc<VersionLedger>,
    regions: Arc<KeyedRegions<ObjectId>>,
    allocator: Arc<dyn IdentityAllocator>,
    clock: Arc<dyn Clock>,
    lock_timeout: Duration,
    takeover_major: bool,
}

impl LockManager {
    /// Creates a lock manager.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        locks: Arc<dyn LockStore>,
        ledger: Arc<VersionLedger>,
        regions: Arc<KeyedRegions<ObjectId>>,
        allocator: Arc<dyn IdentityAllocator>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self {
            objects,
            locks,
            ledger,
            regions,
            allocator,
            clock,
            lock_timeout: config.lock_timeout,
            takeover_major: config.takeover_major,
        }
    }

    /// Acquires the edit lock on an object.
    ///
    /// Re-acquiring an owned lock succeeds without creating a version. An
    /// expired lock of another user is taken over after auto-saving that
    /// user's draft, if it differs from the ledger head.
    ///
    /// # Errors
    ///
    /// Returns `LockConflict` while another user's lock is still honoured.
    pub fn acquire(&self, object: ObjectId, user: UserId) -> CoreResult<AcquireOutcome> {
        self.regions.run(&object, || {
            let mut record = live_object(self.objects.as_ref(), object)?;
            let now = self.clock.now();
            let fresh = Lock {
                owner: user,
                acquired_at: now,
                timeout: self.lock_timeout,
            };

            match self.locks.lock(object)? {
                None => {
                    self.locks.put_lock(object, fresh)?;
                    debug!(%object, %user, "lock acquired");
                    Ok(AcquireOutcome::Acquired)
                }
                Some(held) if held.owner == user => {
                    self.locks.put_lock(object, fresh)?;
                    debug!(%object, %user, "lock refreshed");
                    Ok(AcquireOutcome::AlreadyHeld)
                }
                Some(held) if !held.is_expired(now) => Err(CoreError::LockConflict {
                    object,
                    owner: held.owner,
                    remaining: held.remaining(now),
                }),
                Some(held) => {
                    let saved = self.ledger.record(&mut record, held.owner, self.takeover_major)?;
                    if saved.is_some() {
                        self.objects.update_object(&record)?;
                    }
                    self.locks.put_lock(object, fresh)?;
                    warn!(
                        %object,
                        previous_owner = %held.owner,
                        new_owner = %user,
                        autosaved = saved.is_some(),
                        "expired lock taken over"
                    );
                    Ok(AcquireOutcome::TakenOver {
                        previous_owner: held.owner,
                        saved,
                    })
                }
            }
        })
    }

    /// Replaces the working copy with `draft`.
    ///
    /// Field-groups and values are matched by name so their identities
    /// survive; new ones get fresh global IDs. A version is appended only
    /// if requested and the content differs from the ledger head.
    ///
    /// # Errors
    ///
    /// Returns `NotLockOwner` unless `user` holds the lock.
    pub fn save(
        &self,
        object: ObjectId,
        user: UserId,
        draft: &ContentDraft,
        options: SaveOptions,
    ) -> CoreResult<SaveOutcome> {
        self.regions.run(&object, || {
            let mut record = live_object(self.objects.as_ref(), object)?;
            self.require_owner(object, user)?;

            let merged = record.draft.apply_draft(draft, self.allocator.as_ref());
            record.draft = merged;
            let version = if options.create_version {
                self.ledger.record(&mut record, user, options.major)?
            } else {
                None
            };
            self.objects.update_object(&record)?;
            debug!(%object, %user, versioned = version.is_some(), "working copy saved");
            Ok(SaveOutcome {
                object: record,
                version,
            })
        })
    }

    /// Releases the caller's lock, optionally versioning the working copy first.
    ///
    /// # Errors
    ///
    /// Returns `NotLockOwner` unless `user` holds the lock.
    pub fn release(
        &self,
        object: ObjectId,
        user: UserId,
        options: SaveOptions,
    ) -> CoreResult<Option<Version>> {
        self.regions.run(&object, || {
            let mut record = self
                .objects
                .object(object)?
                .ok_or_else(|| CoreError::object_not_found(object))?;
            self.require_owner(object, user)?;

            let version = if options.create_version && !record.is_deleted() {
                self.ledger.record(&mut record, user, options.major)?
            } else {
                None
            };
            if version.is_some() {
                self.objects.update_object(&record)?;
            }
            self.locks.remove_lock(object)?;
            debug!(%object, %user, versioned = version.is_some(), "lock released");
            Ok(version)
        })
    }

    /// Discards the working copy and releases the lock. Never appends.
    ///
    /// Cancelling an unlocked object is a no-op. The publish pointer is
    /// never touched, so a published, unmodified object stays so.
    ///
    /// # Errors
    ///
    /// Returns `NotLockOwner` if another user holds the lock.
    pub fn cancel(&self, object: ObjectId, user: UserId) -> CoreResult<CancelOutcome> {
        self.regions.run(&object, || {
            let Some(held) = self.locks.lock(object)? else {
                return Ok(CancelOutcome::NotLocked);
            };
            if held.owner != user {
                return Err(CoreError::NotLockOwner {
                    object,
                    caller: user,
                    owner: Some(held.owner),
                });
            }

            let mut discarded_changes = false;
            if let Some(mut record) = self.objects.object(object)? {
                if let Some(head) = self.ledger.latest(object)? {
                    if !head.content.same_content(&record.draft) {
                        record.draft = head.content.as_ref().clone();
                        record.current_version = Some(head.number);
                        self.objects.update_object(&record)?;
                        discarded_changes = true;
                    }
                }
            }
            self.locks.remove_lock(object)?;
            debug!(%object, %user, discarded_changes, "edit cancelled");
            Ok(CancelOutcome::Cancelled { discarded_changes })
        })
    }

    /// Returns the current lock and whether it has expired.
    pub fn lock_info(&self, object: ObjectId) -> CoreResult<Option<LockInfo>> {
        let now = self.clock.now();
        Ok(self.locks.lock(object)?.map(|lock| LockInfo {
            expired: lock.is_expired(now),
            lock,
        }))
    }

    fn require_owner(&self, object: ObjectId, user: UserId) -> CoreResult<()> {
        match self.locks.lock(object)? {
            Some(held) if held.owner == user => Ok(()),
            held => Err(CoreError::NotLockOwner {
                object,
                caller: user,
                owner: held.map(|l| l.owner),
            }),
        }
    }
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("lock_timeout", &self.lock_timeout)
            .field("takeover_major", &self.takeover_major)
            .finish_non_exhaustive()
    }
}

/// Loads an object that must exist and must not be in the wastebin.
pub(crate) fn live_object(objects: &dyn ObjectStore, id: ObjectId) -> CoreResult<ContentObject> {
    let object = objects
        .object(id)?
        .ok_or_else(|| CoreError::object_not_found(id))?;
    match object.deleted {
        Some(deleted_at) => Err(CoreError::ObjectDeleted {
            object: id,
            deleted_at,
        }),
        None => Ok(object),
    }
}

/// Fails with `LockConflict` if another user holds an unexpired lock.
pub(crate) fn ensure_editable(
    locks: &dyn LockStore,
    object: ObjectId,
    user: UserId,
    now: Timestamp,
) -> CoreResult<()> {
    match locks.lock(object)? {
        Some(held) if held.owner != user && !held.is_expired(now) => Err(CoreError::LockConflict {
            object,
            owner: held.owner,
            remaining: held.remaining(now),
        }),
        _ => Ok(()),
    }
}
