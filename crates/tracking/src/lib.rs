//! # Tracking
//!
//! The vehicle side of the tracking subsystem: sampling the device's
//! location while the vehicle is in service and publishing it to the shared
//! store.

mod config;
mod controller;
mod provider;
mod publisher;
mod sampler;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use self::config::*;
pub use self::controller::*;
pub use self::provider::*;
pub use self::publisher::*;
pub use self::sampler::*;

// Callbacks are never invoked while these locks are held.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
