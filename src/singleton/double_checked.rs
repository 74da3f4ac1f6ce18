// Double-checked locking.
//
// Fast path: one Acquire load of the slot pointer, no lock. Slow path: take
// the lock, check again, construct, publish with a Release store.
//
// The orderings are load-bearing. The Release store makes the fully built
// value visible before the pointer; the Acquire load on the fast path pairs
// with it. With Relaxed on either side a reader could see a non-null pointer
// to memory whose contents it cannot see yet.

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use log::debug;

use super::{Instance, LazySlot, Worker};

pub struct DoubleCheckedSlot<T> {
    value: AtomicPtr<T>,
    lock: Mutex<()>,
    _marker: PhantomData<T>,
}

// SAFETY: same contract as `LockedSlot`: shared access hands out `&T` and the
// owning thread may differ from the constructing one.
unsafe impl<T: Send> Send for DoubleCheckedSlot<T> {}
unsafe impl<T: Send + Sync> Sync for DoubleCheckedSlot<T> {}

impl<T> DoubleCheckedSlot<T> {
    pub const fn new() -> Self {
        Self {
            value: AtomicPtr::new(ptr::null_mut()),
            lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    /// Empties the slot, returning the previous value.
    pub fn reset(&mut self) -> Option<T> {
        let value = std::mem::replace(self.value.get_mut(), ptr::null_mut());
        if value.is_null() {
            return None;
        }
        // SAFETY: non-null pointers in the slot always come from
        // `Box::into_raw`, and `&mut self` proves no reference is outstanding.
        Some(*unsafe { Box::from_raw(value) })
    }
}

impl<T> Default for DoubleCheckedSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for DoubleCheckedSlot<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T> LazySlot<T> for DoubleCheckedSlot<T> {
    fn get_or_try_init<F, E>(&self, init: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.get() {
            return Ok(value);
        }

        // The guard is held only to serialize constructors; it protects no
        // data, so a poisoned lock is safe to reuse.
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have published between the first check and
        // acquiring the lock.
        let mut value = self.value.load(Ordering::Acquire);
        if value.is_null() {
            debug!("double-checked slot empty after re-check, constructing");
            let constructed = match init() {
                Ok(constructed) => constructed,
                Err(err) => {
                    debug!("double-checked construction failed, slot stays empty");
                    return Err(err);
                }
            };
            value = Box::into_raw(Box::new(constructed));
            self.value.store(value, Ordering::Release);
        }

        // SAFETY: `value` is non-null and was published by a Release store
        // that this thread has synchronized with; it stays allocated until
        // `reset(&mut self)` or `Drop`.
        Ok(unsafe { &*value })
    }

    fn get(&self) -> Option<&T> {
        let value = self.value.load(Ordering::Acquire);
        // SAFETY: the Acquire load pairs with the Release store that
        // published the pointer, so the pointee is fully initialized.
        unsafe { value.as_ref() }
    }
}

static INSTANCE: DoubleCheckedSlot<Worker> = DoubleCheckedSlot::new();
static CONSTRUCTIONS: AtomicUsize = AtomicUsize::new(0);

pub fn get_instance() -> &'static dyn Instance {
    INSTANCE.get_or_init(|| {
        CONSTRUCTIONS.fetch_add(1, Ordering::Relaxed);
        Worker::new("double_checked")
    })
}

/// How many times the global instance has been built (0 or 1).
pub fn construction_count() -> usize {
    CONSTRUCTIONS.load(Ordering::Relaxed)
}
