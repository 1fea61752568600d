//! Double-buffered value shared between the control and render threads
//!
//! ```text
//!  control thread                     render thread
//!  ──────────────                     ─────────────
//!  set()/modify() ──► raw + dirty ──update()──► pure ◄── pure() while drawing
//! ```
//!
//! The raw side lives behind the owning entity's mutex and is the only side
//! the control thread ever writes. The pure side is behind a lock that only
//! the render thread takes: `update()` write-locks it for the copy, drawing
//! read-locks it. A slow draw therefore never blocks a control-thread
//! mutation, and a half-finished mutation is never visible to drawing.

use std::fmt;
use std::ops::Deref;

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard};

struct RawSlot<T> {
    value: T,
    dirty: bool,
}

/// A control-side ("raw") value, a render-side ("pure") value and a dirty bit
pub struct DualBuffer<T> {
    raw: Mutex<RawSlot<T>>,
    pure: RwLock<T>,
}

impl<T: Clone> DualBuffer<T> {
    /// Create a buffer whose raw and pure sides both hold `value`
    pub fn new(value: T) -> Self {
        Self {
            raw: Mutex::new(RawSlot { value: value.clone(), dirty: false }),
            pure: RwLock::new(value),
        }
    }

    /// Replace the raw value; a no-op when it already equals `value`
    ///
    /// Returns whether the raw side changed.
    pub fn set(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        let mut slot = self.raw.lock();
        if slot.value == value {
            return false;
        }
        slot.value = value;
        slot.dirty = true;
        true
    }

    /// Mutate the raw value in place
    ///
    /// The closure reports whether it changed anything; only then is the
    /// buffer marked dirty.
    pub fn modify(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        let mut slot = self.raw.lock();
        let changed = f(&mut slot.value);
        if changed {
            slot.dirty = true;
        }
        changed
    }

    /// Lock the raw side for a multi-step mutation
    ///
    /// Reading through the guard does not dirty the buffer; call
    /// [`RawGuard::commit`] to obtain mutable access and mark it dirty.
    pub fn lock_raw(&self) -> RawGuard<'_, T> {
        RawGuard { slot: self.raw.lock() }
    }

    /// Clone of the raw value (control thread view)
    pub fn raw(&self) -> T {
        self.raw.lock().value.clone()
    }

    /// Read the raw value without cloning it
    pub fn with_raw<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.raw.lock().value)
    }

    /// Read access to the pure value (render thread view)
    pub fn pure(&self) -> RwLockReadGuard<'_, T> {
        self.pure.read()
    }

    /// Whether the raw side holds changes not yet promoted
    pub fn is_dirty(&self) -> bool {
        self.raw.lock().dirty
    }

    /// Promote raw to pure if dirty, clearing the dirty bit
    ///
    /// Only the render thread's synchronize step may call this. Returns
    /// whether a copy occurred.
    pub fn update(&self) -> bool {
        let mut slot = self.raw.lock();
        if !slot.dirty {
            return false;
        }
        self.pure.write().clone_from(&slot.value);
        slot.dirty = false;
        true
    }
}

impl<T: Clone + Default> Default for DualBuffer<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for DualBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.raw.lock();
        f.debug_struct("DualBuffer")
            .field("raw", &slot.value)
            .field("dirty", &slot.dirty)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to the raw side of a [`DualBuffer`]
pub struct RawGuard<'a, T> {
    slot: MutexGuard<'a, RawSlot<T>>,
}

impl<T> RawGuard<'_, T> {
    /// Mutable access to the raw value; marks the buffer dirty
    pub fn commit(&mut self) -> &mut T {
        self.slot.dirty = true;
        &mut self.slot.value
    }
}

impl<T> Deref for RawGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.slot.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_set_is_invisible_until_update() {
        let buffer = DualBuffer::new(1_u32);
        assert!(buffer.set(2));
        assert!(buffer.set(3));
        assert_eq!(*buffer.pure(), 1);
        assert_eq!(buffer.raw(), 3);

        assert!(buffer.update());
        assert_eq!(*buffer.pure(), 3);
        assert!(!buffer.is_dirty());
    }

    #[test]
    fn test_setting_equal_value_is_noop() {
        let buffer = DualBuffer::new("hull".to_string());
        assert!(!buffer.set("hull".to_string()));
        assert!(!buffer.is_dirty());
        assert!(!buffer.update());
    }

    #[test]
    fn test_modify_only_dirties_on_change() {
        let buffer = DualBuffer::new(vec![1, 2, 3]);
        assert!(!buffer.modify(|v| {
            v.retain(|&x| x < 10);
            false
        }));
        assert!(!buffer.is_dirty());

        assert!(buffer.modify(|v| {
            v.push(4);
            true
        }));
        assert!(buffer.update());
        assert_eq!(buffer.pure().len(), 4);
    }

    #[test]
    fn test_raw_guard_commit_marks_dirty() {
        let buffer = DualBuffer::new(5_i32);
        {
            let guard = buffer.lock_raw();
            assert_eq!(*guard, 5);
        }
        assert!(!buffer.is_dirty());
        {
            let mut guard = buffer.lock_raw();
            *guard.commit() = 6;
        }
        assert!(buffer.is_dirty());
        buffer.update();
        assert_eq!(*buffer.pure(), 6);
    }

    #[test]
    fn test_reader_only_observes_updated_values() {
        // Writer only ever publishes pairs (n, n); readers must never see a torn pair
        // or a value that skipped update().
        let buffer = Arc::new(DualBuffer::new((0_u64, 0_u64)));
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let buffer = Arc::clone(&buffer);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                for n in 1..2000_u64 {
                    buffer.modify(|pair| {
                        pair.0 = n;
                        pair.1 = n;
                        true
                    });
                }
                done.store(true, Ordering::Release);
            })
        };

        let mut last_seen = 0;
        while !done.load(Ordering::Acquire) {
            let before = *buffer.pure();
            assert_eq!(before.0, before.1);
            assert_eq!(before.0, last_seen, "pure changed without update()");
            buffer.update();
            last_seen = buffer.pure().0;
        }
        writer.join().expect("writer thread");
        buffer.update();
        assert_eq!(*buffer.pure(), (1999, 1999));
    }
}
