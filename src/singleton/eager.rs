// Eager ("hungry") initialization.
//
// The global instance is built by a `const fn` and lives in the binary image,
// so it exists before `main` runs and no caller can ever see an empty slot.
// The cost is paid whether or not anyone asks for it.

use super::{Instance, Worker};

/// Holder whose value is supplied at construction time.
///
/// There is no empty state: whoever creates the holder pays for the value up
/// front, and `get` is a plain field read.
#[derive(Debug)]
pub struct EagerSlot<T> {
    value: T,
}

impl<T> EagerSlot<T> {
    pub const fn new(value: T) -> Self {
        Self { value }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

static INSTANCE: EagerSlot<Worker> = EagerSlot::new(Worker::new("eager"));

pub fn get_instance() -> &'static dyn Instance {
    INSTANCE.get()
}
