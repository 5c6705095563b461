//! In-process collaborators.
//!
//! [`MemoryStore`] behaves like a realtime database with path-based
//! subscriptions and [`MemoryGeolocation`] like a device whose fixes are
//! driven by the caller. Both back local development and the test suites.

mod geolocation;
mod store;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use self::geolocation::{MemoryGeolocation, WatchEvent};
pub use self::store::MemoryStore;

// Listener callbacks never run under these locks, so a poisoned guard still
// holds consistent data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
