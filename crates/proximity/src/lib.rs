//! # Proximity
//!
//! The passenger side of the tracking subsystem: a live, geohash-ordered
//! view of every broadcasting vehicle that answers "which vehicles are near
//! me" without reading the whole collection.

mod config;
mod index;
mod subscription;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use self::config::*;
pub use self::index::ProximityIndex;
pub use self::subscription::*;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
