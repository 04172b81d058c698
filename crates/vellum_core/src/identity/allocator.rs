//! Identity allocation.

use super::GlobalId;
use crate::types::{ContentSetId, ObjectId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out identities for newly created entities.
///
/// Every method is called exactly once per new entity. Restores and
/// translation copies of entities that already carry an identity never call
/// the allocator for them.
pub trait IdentityAllocator: Send + Sync + fmt::Debug {
    /// Allocates a store-local object ID.
    fn object_id(&self) -> ObjectId;

    /// Allocates a global ID.
    fn global_id(&self) -> GlobalId;

    /// Allocates a content set ID.
    fn content_set_id(&self) -> ContentSetId;
}

/// Allocator backed by two atomic counters and random UUIDs.
#[derive(Debug)]
pub struct SequentialAllocator {
    next_object: AtomicU64,
    next_content_set: AtomicU64,
}

impl SequentialAllocator {
    /// Creates an allocator whose first object and content set IDs are 1.
    #[must_use]
    pub fn new() -> Self {
        Self::resume(1, 1)
    }

    /// Creates an allocator continuing from previously issued IDs.
    #[must_use]
    pub fn resume(next_object: u64, next_content_set: u64) -> Self {
        Self {
            next_object: AtomicU64::new(next_object.max(1)),
            next_content_set: AtomicU64::new(next_content_set.max(1)),
        }
    }
}

impl Default for SequentialAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityAllocator for SequentialAllocator {
    fn object_id(&self) -> ObjectId {
        ObjectId::new(self.next_object.fetch_add(1, Ordering::SeqCst))
    }

    fn global_id(&self) -> GlobalId {
        GlobalId::random()
    }

    fn content_set_id(&self) -> ContentSetId {
        ContentSetId::new(self.next_content_set.fetch_add(1, Ordering::SeqCst))
    }
}
