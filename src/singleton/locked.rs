// Lazy initialization with a mutex around every access.
//
// Trivially correct: the check, the construction and the read all happen
// under one lock. Every call pays for the lock, even long after construction.

use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

use super::{Instance, LazySlot, Worker};

pub struct LockedSlot<T> {
    // Leaked from a `Box` on construction and only turned back into one by
    // `reset`/`Drop`. The box itself is never moved while references exist.
    slot: Mutex<Option<NonNull<T>>>,
    _marker: PhantomData<T>,
}

// SAFETY: references handed out from `&LockedSlot<T>` point at the stored
// `T`, so sharing the slot shares `T` (needs `Sync`) and the value may be
// dropped on a different thread than the one that built it (needs `Send`).
unsafe impl<T: Send> Send for LockedSlot<T> {}
unsafe impl<T: Send + Sync> Sync for LockedSlot<T> {}

impl<T> LockedSlot<T> {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            _marker: PhantomData,
        }
    }

    /// Empties the slot, returning the previous value.
    pub fn reset(&mut self) -> Option<T> {
        let value = self
            .slot
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        // SAFETY: the pointer came from `Box::leak`, and `&mut self` proves
        // no reference handed out by this slot is still alive.
        Some(*unsafe { Box::from_raw(value.as_ptr()) })
    }

    // The value is only stored after construction succeeds, so a poisoned
    // lock still guards a consistent slot.
    fn lock(&self) -> MutexGuard<'_, Option<NonNull<T>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for LockedSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LockedSlot<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T> LazySlot<T> for LockedSlot<T> {
    fn get_or_try_init<F, E>(&self, init: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let mut slot = self.lock();
        let stored = *slot;
        let value = match stored {
            Some(value) => value,
            None => {
                debug!("locked slot empty, constructing under the lock");
                let constructed = match init() {
                    Ok(constructed) => constructed,
                    Err(err) => {
                        debug!("locked slot construction failed, slot stays empty");
                        return Err(err);
                    }
                };
                let value = NonNull::from(Box::leak(Box::new(constructed)));
                *slot = Some(value);
                value
            }
        };
        drop(slot);

        // SAFETY: the allocation is only released by `reset(&mut self)` or
        // `Drop`, neither of which can run while `&self` is borrowed.
        Ok(unsafe { value.as_ref() })
    }

    fn get(&self) -> Option<&T> {
        let value = (*self.lock())?;
        // SAFETY: see `get_or_try_init`.
        Some(unsafe { value.as_ref() })
    }
}

static INSTANCE: LockedSlot<Worker> = LockedSlot::new();
static CONSTRUCTIONS: AtomicUsize = AtomicUsize::new(0);

pub fn get_instance() -> &'static dyn Instance {
    INSTANCE.get_or_init(|| {
        CONSTRUCTIONS.fetch_add(1, Ordering::Relaxed);
        Worker::new("locked")
    })
}

/// How many times the global instance has been built (0 or 1).
pub fn construction_count() -> usize {
    CONSTRUCTIONS.load(Ordering::Relaxed)
}
