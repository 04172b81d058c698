//! Stable identities and their allocation.

mod allocator;
mod global_id;

pub use allocator::{IdentityAllocator, SequentialAllocator};
pub use global_id::GlobalId;
