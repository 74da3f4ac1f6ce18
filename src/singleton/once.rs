// Lazy initialization through a one-shot execute-once primitive.
//
// `Once` is an explicit state machine `NotStarted -> InProgress -> Done`
// behind a `Mutex` + `Condvar`. Callers that arrive while the initializer is
// running sleep on the condvar. Once `Done` is reached an `AtomicBool` fast
// path means no caller ever touches the mutex again.

use std::cell::UnsafeCell;
use std::convert::Infallible;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use log::debug;

use super::{Instance, LazySlot, Worker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnceState {
    NotStarted,
    InProgress,
    Done,
}

/// Runs an initializer exactly once, however many threads race for it.
///
/// If the initializer fails or panics the state falls back to `NotStarted`
/// and one of the waiting callers takes over.
pub struct Once {
    done: AtomicBool,
    state: Mutex<OnceState>,
    finished: Condvar,
}

impl Once {
    pub const fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
            state: Mutex::new(OnceState::NotStarted),
            finished: Condvar::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn state(&self) -> OnceState {
        *self.lock_state()
    }

    pub fn call_once<F>(&self, f: F)
    where
        F: FnOnce(),
    {
        match self.try_call_once(|| Ok::<(), Infallible>(f())) {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    /// Runs `f` unless a previous call already succeeded.
    ///
    /// Blocks while another thread is inside its initializer. An `Err` from
    /// `f` is returned to this caller only and re-opens the `Once`.
    pub fn try_call_once<F, E>(&self, f: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        if self.is_completed() {
            return Ok(());
        }

        let mut state = self.lock_state();
        loop {
            match *state {
                OnceState::Done => return Ok(()),
                OnceState::InProgress => {
                    state = self
                        .finished
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                OnceState::NotStarted => break,
            }
        }
        *state = OnceState::InProgress;
        drop(state);

        // Runs on every exit path, including unwinding out of `f`.
        let mut completion = Completion {
            once: self,
            outcome: OnceState::NotStarted,
        };
        f()?;
        completion.outcome = OnceState::Done;
        Ok(())
    }

    // The state mutex is never held while user code runs, so poisoning can
    // only come from a panic in this module; the state is still valid.
    fn lock_state(&self) -> MutexGuard<'_, OnceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Once {
    fn default() -> Self {
        Self::new()
    }
}

struct Completion<'a> {
    once: &'a Once,
    outcome: OnceState,
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        let mut state = self.once.lock_state();
        *state = self.outcome;
        if self.outcome == OnceState::Done {
            self.once.done.store(true, Ordering::Release);
        } else {
            debug!("once initializer did not complete, reopening");
        }
        drop(state);
        self.once.finished.notify_all();
    }
}

pub struct OnceSlot<T> {
    once: Once,
    value: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: the value is written exactly once, by the thread that owns the
// `InProgress` state, before `done` is published with Release. Readers only
// touch it after an Acquire load of `done`.
unsafe impl<T: Send> Send for OnceSlot<T> {}
unsafe impl<T: Send + Sync> Sync for OnceSlot<T> {}

impl<T> OnceSlot<T> {
    pub const fn new() -> Self {
        Self {
            once: Once::new(),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Empties the slot, returning the previous value.
    pub fn reset(&mut self) -> Option<T> {
        if !self.once.is_completed() {
            return None;
        }
        self.once = Once::new();
        // SAFETY: the old `Once` was `Done`, so the value was written, and it
        // is read out exactly once because the fresh `Once` is `NotStarted`.
        Some(unsafe { self.value.get_mut().assume_init_read() })
    }
}

impl<T> Default for OnceSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for OnceSlot<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T> LazySlot<T> for OnceSlot<T> {
    fn get_or_try_init<F, E>(&self, init: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.get() {
            return Ok(value);
        }

        self.once.try_call_once(|| {
            debug!("once slot running its initializer");
            let value = init()?;
            // SAFETY: only the thread holding the `InProgress` state gets
            // here, and no reader looks at the cell until `Done`.
            unsafe { (*self.value.get()).write(value) };
            Ok(())
        })?;

        // SAFETY: `try_call_once` returned `Ok`, so the `Once` is `Done` and
        // the value is initialized.
        Ok(unsafe { (*self.value.get()).assume_init_ref() })
    }

    fn get(&self) -> Option<&T> {
        if !self.once.is_completed() {
            return None;
        }
        // SAFETY: `Done` was observed with Acquire, pairing with the Release
        // store that followed the write.
        Some(unsafe { (*self.value.get()).assume_init_ref() })
    }
}

static INSTANCE: OnceSlot<Worker> = OnceSlot::new();
static CONSTRUCTIONS: AtomicUsize = AtomicUsize::new(0);

pub fn get_instance() -> &'static dyn Instance {
    INSTANCE.get_or_init(|| {
        CONSTRUCTIONS.fetch_add(1, Ordering::Relaxed);
        Worker::new("once")
    })
}

/// How many times the global instance has been built (0 or 1).
pub fn construction_count() -> usize {
    CONSTRUCTIONS.load(Ordering::Relaxed)
}
