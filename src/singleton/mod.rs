//! # Singleton Pattern: four ways to build exactly one instance
//!
//! Each variant comes in two layers:
//!
//! - a reusable **holder** (`EagerSlot`, `LockedSlot`, `DoubleCheckedSlot`,
//!   `OnceSlot`) that can live in a `static` or be owned by a test and passed
//!   around by reference, and
//! - a process-wide `get_instance()` accessor built on a `static` holder,
//!   returning `&'static dyn Instance`.
//!
//! | Variant          | Constructed      | Blocks                           |
//! |------------------|------------------|----------------------------------|
//! | `eager`          | before `main`    | never                            |
//! | `locked`         | first call       | every call takes the mutex       |
//! | `double_checked` | first call       | only callers racing construction |
//! | `once`           | first call       | only while the initializer runs  |
//!
//! Slot lifecycle for the lazy holders: `Empty -> Constructing -> Populated`.
//! A failed or panicking constructor moves `Constructing` back to `Empty`, so
//! a later caller retries. `Populated` is terminal until `reset(&mut self)`.

use std::convert::Infallible;

use log::trace;

pub mod double_checked;
pub mod eager;
pub mod locked;
pub mod once;

pub use double_checked::DoubleCheckedSlot;
pub use eager::EagerSlot;
pub use locked::LockedSlot;
pub use once::{Once, OnceSlot, OnceState};

/// The capability set every singleton hands out.
pub trait Instance: Send + Sync {
    /// No observable side effect; proves the returned value is usable.
    fn work(&self);

    /// Which variant built this instance.
    fn variant(&self) -> &'static str;
}

/// Payload stored by the global accessors.
#[derive(Debug)]
pub struct Worker {
    variant: &'static str,
}

impl Worker {
    pub const fn new(variant: &'static str) -> Self {
        Self { variant }
    }
}

impl Instance for Worker {
    fn work(&self) {
        trace!("{} singleton working", self.variant);
    }

    fn variant(&self) -> &'static str {
        self.variant
    }
}

/// Identity comparison for trait objects (ignores vtable metadata).
pub fn same_instance(a: &dyn Instance, b: &dyn Instance) -> bool {
    std::ptr::addr_eq(a, b)
}

/// A slot that holds at most one `T`, constructed on first access.
///
/// Implementors guarantee that across any number of concurrent callers the
/// initializer of at most one successful call runs, and that every returned
/// reference points at that one value.
pub trait LazySlot<T> {
    /// Returns the stored value, running `init` if the slot is empty.
    ///
    /// If `init` fails the slot stays empty and the error is returned to this
    /// caller only.
    fn get_or_try_init<F, E>(&self, init: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>;

    /// Returns the stored value without constructing it.
    fn get(&self) -> Option<&T>;

    fn get_or_init<F>(&self, init: F) -> &T
    where
        F: FnOnce() -> T,
    {
        match self.get_or_try_init(|| Ok::<T, Infallible>(init())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    fn is_populated(&self) -> bool {
        self.get().is_some()
    }
}
