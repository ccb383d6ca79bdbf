//! Tri-state lazy cell for build-once, invalidate-on-change values.
//!
//! Every cached artifact in the engine (resource entries, aggregate bytes,
//! collection identities, compressed artifacts, bundle generations) lives in
//! a [`Lazy`]. The cell moves through three states:
//!
//! ```text
//! Unbuilt ──get──▶ Building ──ok──▶ Built(value)
//!    ▲                 │                 │
//!    └──────err────────┘                 │
//!    └─────────────invalidate/take───────┘
//! ```
//!
//! Reads of a built value go through an `ArcSwapOption` and never touch the
//! mutex. A miss takes the mutex, re-checks, and either builds (one builder
//! per cell) or waits on the condvar for the in-flight builder.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::{Condvar, Mutex};

/// Observable state of a [`Lazy`] cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LazyState {
    Unbuilt,
    Building,
    Built,
}

enum Slot<T> {
    Unbuilt,
    Building,
    Built(Arc<T>),
}

/// A lazily built, explicitly invalidated value.
pub struct Lazy<T> {
    fast: ArcSwapOption<T>,
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Default for Lazy<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy").field("state", &self.state()).finish()
    }
}

impl<T> Lazy<T> {
    pub fn new() -> Self {
        Self {
            fast: ArcSwapOption::empty(),
            slot: Mutex::new(Slot::Unbuilt),
            ready: Condvar::new(),
        }
    }

    /// Current state of the cell.
    pub fn state(&self) -> LazyState {
        match &*self.slot.lock() {
            Slot::Unbuilt => LazyState::Unbuilt,
            Slot::Building => LazyState::Building,
            Slot::Built(_) => LazyState::Built,
        }
    }

    /// The built value, if any, without building.
    #[inline]
    pub fn peek(&self) -> Option<Arc<T>> {
        self.fast.load_full()
    }

    /// Get the built value, building it with `build` on a miss.
    pub fn get_or_init(&self, build: impl FnOnce() -> T) -> Arc<T> {
        match self.get_or_try_init(|| Ok::<_, std::convert::Infallible>(build())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Get the built value, building it with `build` on a miss.
    ///
    /// A failed build leaves the cell `Unbuilt` and wakes any waiters, which
    /// then build on their own account.
    pub fn get_or_try_init<E>(&self, build: impl FnOnce() -> Result<T, E>) -> Result<Arc<T>, E> {
        if let Some(value) = self.fast.load_full() {
            return Ok(value);
        }

        let mut slot = self.slot.lock();
        loop {
            match &*slot {
                Slot::Built(value) => return Ok(Arc::clone(value)),
                Slot::Building => self.ready.wait(&mut slot),
                Slot::Unbuilt => break,
            }
        }
        *slot = Slot::Building;
        drop(slot);

        let mut reset = ResetOnUnwind { cell: self, armed: true };
        let result = build();
        reset.armed = false;

        let mut slot = self.slot.lock();
        let result = match result {
            Ok(value) => {
                let value = Arc::new(value);
                *slot = Slot::Built(Arc::clone(&value));
                self.fast.store(Some(Arc::clone(&value)));
                Ok(value)
            }
            Err(e) => {
                *slot = Slot::Unbuilt;
                Err(e)
            }
        };
        self.ready.notify_all();
        result
    }

    /// Drop the built value and return it.
    ///
    /// Waits for an in-flight build to finish first, so the value a builder
    /// produced from stale inputs never outlives the invalidation.
    pub fn take(&self) -> Option<Arc<T>> {
        let mut slot = self.slot.lock();
        while matches!(*slot, Slot::Building) {
            self.ready.wait(&mut slot);
        }
        self.fast.store(None);
        match std::mem::replace(&mut *slot, Slot::Unbuilt) {
            Slot::Built(value) => Some(value),
            _ => None,
        }
    }

    /// Drop the built value. Returns whether there was one.
    #[inline]
    pub fn invalidate(&self) -> bool {
        self.take().is_some()
    }
}

/// Puts the cell back to `Unbuilt` if the builder panics.
struct ResetOnUnwind<'a, T> {
    cell: &'a Lazy<T>,
    armed: bool,
}

impl<T> Drop for ResetOnUnwind<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            *self.cell.slot.lock() = Slot::Unbuilt;
            self.cell.ready.notify_all();
        }
    }
}
