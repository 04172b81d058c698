//! Short-lived mutual exclusion keyed by resource.

use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

/// Named critical sections, one per key.
///
/// Unlike an edit [`super::Lock`], a region is held only for the duration
/// of a single call. Waiting is bounded by `wait`; slots are dropped once
/// nobody holds or waits on them.
pub struct KeyedRegions<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
    wait: Duration,
}

impl<K> KeyedRegions<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Creates an empty set of regions.
    #[must_use]
    pub fn new(wait: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            wait,
        }
    }

    /// Runs `f` while holding the region for `key`.
    ///
    /// # Errors
    ///
    /// Returns `RegionTimeout` if the region could not be entered within the
    /// configured wait, otherwise whatever `f` returns.
    pub fn run<R>(&self, key: &K, f: impl FnOnce() -> CoreResult<R>) -> CoreResult<R> {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        let claim = SlotClaim {
            regions: self,
            key,
            slot,
        };

        let outcome = match claim.slot.try_lock_for(self.wait) {
            Some(_guard) => f(),
            None => Err(CoreError::region_timeout(format!("{key:?}"), self.wait)),
        };
        outcome
    }

    /// Returns the number of keys currently held or waited on.
    #[must_use]
    pub fn active(&self) -> usize {
        self.slots.lock().len()
    }

    fn release_slot(&self, key: &K, slot: &Arc<Mutex<()>>) {
        // Clones only happen under `slots`, so the count is stable here.
        let mut slots = self.slots.lock();
        if Arc::strong_count(slot) == 2 {
            slots.remove(key);
        }
    }
}

/// A caller's hold on a slot; releases it on drop, including on unwind.
struct SlotClaim<'a, K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    regions: &'a KeyedRegions<K>,
    key: &'a K,
    slot: Arc<Mutex<()>>,
}

impl<K> Drop for SlotClaim<'_, K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn drop(&mut self) {
        self.regions.release_slot(self.key, &self.slot);
    }
}

impl<K> fmt::Debug for KeyedRegions<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedRegions")
            .field("wait", &self.wait)
            .finish_non_exhaustive()
    }
}
