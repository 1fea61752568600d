//! Per-kind element containers
//!
//! An [`ElementRegistry`] keeps three lists of shared entity handles:
//!
//! ```text
//!  raw    ── control-thread truth, edited by add/remove
//!  buffer ── snapshot of raw staged for promotion
//!  pure   ── render-thread truth, replaced only by synchronize()
//! ```
//!
//! `raw` and `buffer` live behind the registry mutex; `pure` sits behind a
//! lock only the render thread takes. The deferred variant parks removed
//! handles in a pending list and releases them during the next successful
//! `synchronize()`, after the old pure list has been swapped out.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};

/// What happens to a handle removed from the raw list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    /// Handle is dropped by the registry as soon as the pure list stops referencing it
    Immediate,
    /// Handle is kept in a pending list until the next successful synchronize
    Deferred,
}

struct Lists<T> {
    raw: Vec<Arc<T>>,
    buffer: Vec<Arc<T>>,
    pending: Vec<Arc<T>>,
    dirty: bool,
}

/// Raw/buffer/pure registry of shared handles
pub struct ElementRegistry<T> {
    policy: RemovalPolicy,
    lists: Mutex<Lists<T>>,
    pure: RwLock<Vec<Arc<T>>>,
}

impl<T> ElementRegistry<T> {
    /// Registry that releases removed handles immediately
    pub fn new() -> Self {
        Self::with_policy(RemovalPolicy::Immediate)
    }

    /// Registry that defers releasing removed handles to the next synchronize
    pub fn deferred() -> Self {
        Self::with_policy(RemovalPolicy::Deferred)
    }

    /// Registry with an explicit removal policy
    pub fn with_policy(policy: RemovalPolicy) -> Self {
        Self {
            policy,
            lists: Mutex::new(Lists {
                raw: Vec::new(),
                buffer: Vec::new(),
                pending: Vec::new(),
                dirty: false,
            }),
            pure: RwLock::new(Vec::new()),
        }
    }

    /// Removal policy of this registry
    pub const fn policy(&self) -> RemovalPolicy {
        self.policy
    }

    /// Append a handle to the raw list
    ///
    /// Fails when `check_duplicate` is set and the handle is already present.
    pub fn add(&self, item: Arc<T>, check_duplicate: bool) -> bool {
        let mut lists = self.lists.lock();
        if check_duplicate && lists.raw.iter().any(|existing| Arc::ptr_eq(existing, &item)) {
            log::trace!("Registry add rejected: duplicate handle");
            return false;
        }
        lists.raw.push(item);
        lists.buffer = lists.raw.clone();
        lists.dirty = true;
        true
    }

    /// Remove a handle from the raw list; fails if it is not present
    pub fn remove(&self, item: &Arc<T>) -> bool {
        let mut lists = self.lists.lock();
        self.remove_locked(&mut lists, item)
    }

    /// Remove every handle in `items`, returning how many were present
    ///
    /// All removals land in the same synchronize cycle.
    pub fn remove_many(&self, items: &[Arc<T>]) -> usize {
        let mut lists = self.lists.lock();
        items
            .iter()
            .filter(|item| self.remove_locked(&mut lists, item))
            .count()
    }

    fn remove_locked(&self, lists: &mut Lists<T>, item: &Arc<T>) -> bool {
        let Some(index) = lists.raw.iter().position(|existing| Arc::ptr_eq(existing, item)) else {
            return false;
        };
        let removed = lists.raw.remove(index);
        lists.buffer = lists.raw.clone();
        lists.dirty = true;
        if self.policy == RemovalPolicy::Deferred {
            lists.pending.push(removed);
        }
        true
    }

    /// Promote the staged buffer to the pure list if anything changed
    ///
    /// Deferred removals are released here, strictly after the swap, and
    /// outside the registry lock. Returns whether a swap occurred.
    pub fn synchronize(&self) -> bool {
        let released = {
            let mut lists = self.lists.lock();
            if !lists.dirty {
                return false;
            }
            std::mem::swap(&mut *self.pure.write(), &mut lists.buffer);
            // buffer now holds the previous pure list; re-derive it so no stale
            // handles outlive this frame
            lists.buffer = lists.raw.clone();
            lists.dirty = false;
            std::mem::take(&mut lists.pending)
        };

        if !released.is_empty() {
            log::trace!("Registry released {} deferred handle(s)", released.len());
        }
        drop(released);
        true
    }

    /// Whether `item` is currently in the raw list
    pub fn find_in_raw(&self, item: &Arc<T>) -> bool {
        self.lists.lock().raw.iter().any(|existing| Arc::ptr_eq(existing, item))
    }

    /// First raw handle matching `predicate`
    pub fn find_in_raw_by(&self, predicate: impl Fn(&T) -> bool) -> Option<Arc<T>> {
        self.lists.lock().raw.iter().find(|item| predicate(item)).cloned()
    }

    /// Copy of the raw list (control thread)
    pub fn raw_snapshot(&self) -> Vec<Arc<T>> {
        self.lists.lock().raw.clone()
    }

    /// Copy of the pure list (render thread)
    pub fn pure_snapshot(&self) -> Vec<Arc<T>> {
        self.pure.read().clone()
    }

    /// Read access to the pure list (render thread)
    pub fn pure(&self) -> RwLockReadGuard<'_, Vec<Arc<T>>> {
        self.pure.read()
    }

    /// Number of handles in the raw list
    pub fn raw_len(&self) -> usize {
        self.lists.lock().raw.len()
    }

    /// Number of handles in the pure list
    pub fn pure_len(&self) -> usize {
        self.pure.read().len()
    }

    /// Number of removed handles awaiting release
    pub fn pending_len(&self) -> usize {
        self.lists.lock().pending.len()
    }

    /// Whether raw changes are waiting for synchronize
    pub fn is_dirty(&self) -> bool {
        self.lists.lock().dirty
    }
}

impl<T> Default for ElementRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Weak;

    fn names(list: &[Arc<String>]) -> Vec<String> {
        list.iter().map(|s| s.as_str().to_string()).collect()
    }

    #[test]
    fn test_add_is_invisible_until_synchronize() {
        let registry = ElementRegistry::new();
        assert!(registry.add(Arc::new("hull".to_string()), false));
        assert_eq!(registry.raw_len(), 1);
        assert_eq!(registry.pure_len(), 0);

        assert!(registry.synchronize());
        assert_eq!(registry.pure_len(), 1);
        assert!(!registry.synchronize());
    }

    #[test]
    fn test_duplicate_check() {
        let registry = ElementRegistry::new();
        let item = Arc::new(7_u32);
        assert!(registry.add(Arc::clone(&item), true));
        assert!(!registry.add(Arc::clone(&item), true));
        assert!(registry.add(Arc::clone(&item), false));
        assert_eq!(registry.raw_len(), 2);
    }

    #[test]
    fn test_remove_missing_fails() {
        let registry: ElementRegistry<u32> = ElementRegistry::new();
        assert!(!registry.remove(&Arc::new(1)));
        assert!(!registry.is_dirty());
    }

    #[test]
    fn test_pure_unchanged_until_synchronize_then_matches_raw() {
        let registry = ElementRegistry::new();
        let a = Arc::new("a".to_string());
        let b = Arc::new("b".to_string());
        registry.add(Arc::clone(&a), true);
        registry.synchronize();

        registry.add(Arc::clone(&b), true);
        registry.remove(&a);
        registry.add(Arc::clone(&a), true);
        assert_eq!(names(&registry.pure_snapshot()), vec!["a"]);

        registry.synchronize();
        assert_eq!(names(&registry.pure_snapshot()), names(&registry.raw_snapshot()));
        assert_eq!(names(&registry.pure_snapshot()), vec!["b", "a"]);
    }

    #[test]
    fn test_remove_many_counts_present_items() {
        let registry = ElementRegistry::new();
        let a = Arc::new(1_u8);
        let b = Arc::new(2_u8);
        let stranger = Arc::new(3_u8);
        registry.add(Arc::clone(&a), true);
        registry.add(Arc::clone(&b), true);

        assert_eq!(registry.remove_many(&[a, stranger, b]), 2);
        assert_eq!(registry.raw_len(), 0);
    }

    #[test]
    fn test_deferred_release_happens_on_next_synchronize() {
        let registry = ElementRegistry::deferred();
        let item = Arc::new("doomed".to_string());
        let weak: Weak<String> = Arc::downgrade(&item);
        registry.add(item, true);
        registry.synchronize();

        let handle = weak.upgrade().expect("alive");
        assert!(registry.remove(&handle));
        drop(handle);

        // pure still references it, and the pending list keeps it alive
        assert_eq!(registry.pending_len(), 1);
        assert!(weak.upgrade().is_some());

        assert!(registry.synchronize());
        assert_eq!(registry.pending_len(), 0);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_immediate_registry_does_not_park_removals() {
        let registry = ElementRegistry::new();
        let item = Arc::new(1_u32);
        registry.add(Arc::clone(&item), true);
        registry.remove(&item);
        assert_eq!(registry.pending_len(), 0);
    }

    #[test]
    fn test_find_in_raw() {
        let registry = ElementRegistry::new();
        let item = Arc::new("lamp".to_string());
        registry.add(Arc::clone(&item), true);
        assert!(registry.find_in_raw(&item));
        assert!(!registry.find_in_raw(&Arc::new("lamp".to_string())));
        assert!(registry.find_in_raw_by(|s| s == "lamp").is_some());
    }
}
