//! # Provider
//!
//! Provider defines external data interfaces for the crate: the device
//! geolocation capability, the realtime document store, the identity
//! provider and a clock.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::position::Fix;

/// Callback invoked for every fix a watch produces.
pub type FixCallback = Arc<dyn Fn(Fix) + Send + Sync>;

/// Callback invoked when a watch fails to acquire a fix.
pub type PositionErrorCallback = Arc<dyn Fn(PositionError) + Send + Sync>;

/// Callback invoked for store change notifications.
pub type EventCallback = Arc<dyn Fn(StoreEvent) + Send + Sync>;

/// Opaque reference to an active geolocation watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(pub u64);

/// Opaque reference to a registered store listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionKind {
    /// Foreground location access.
    Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accuracy {
    High,
    Balanced,
    Low,
}

/// Sampling configuration passed to [`Geolocation::watch_position`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    pub accuracy: Accuracy,
    /// Minimum movement before a new fix is emitted.
    pub min_distance_m: f64,
    pub min_interval_ms: u64,
    pub fastest_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionErrorCode {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
}

/// Hardware or driver level failure reported by a watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionError {
    pub code: PositionErrorCode,
    pub message: String,
}

impl PositionError {
    #[must_use]
    pub fn new(code: PositionErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// The `Geolocation` trait wraps the device's location capability.
pub trait Geolocation: Send + Sync {
    /// Ask the platform for a permission. May prompt the user.
    fn request_permission(
        &self, kind: PermissionKind,
    ) -> impl Future<Output = Result<Permission>> + Send;

    /// Begin continuous sampling. Callbacks fire until the watch is cleared.
    ///
    /// # Errors
    ///
    /// Returns an error when the platform refuses to create the watch.
    fn watch_position(
        &self, options: &WatchOptions, on_fix: FixCallback, on_error: PositionErrorCallback,
    ) -> Result<WatchId>;

    /// Cancel a watch and release its callbacks. Unknown ids are ignored.
    fn clear_watch(&self, watch: WatchId);
}

/// Change notification kinds a store listener can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Value,
    ChildAdded,
    ChildChanged,
    ChildRemoved,
}

/// A change notification delivered to a store listener.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// The full value at the listened path; `None` once removed.
    Value(Option<Value>),
    ChildAdded { key: String, value: Value },
    ChildChanged { key: String, value: Value },
    ChildRemoved { key: String },
}

impl StoreEvent {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Value(_) => EventKind::Value,
            Self::ChildAdded { .. } => EventKind::ChildAdded,
            Self::ChildChanged { .. } => EventKind::ChildChanged,
            Self::ChildRemoved { .. } => EventKind::ChildRemoved,
        }
    }
}

/// The `DocumentStore` trait defines a path-addressable realtime store.
pub trait DocumentStore: Send + Sync {
    /// Overwrite the value at `path`.
    fn set(&self, path: &str, value: &Value) -> impl Future<Output = Result<()>> + Send;

    /// Shallow-merge `partial` into the object at `path`.
    fn update(&self, path: &str, partial: &Value) -> impl Future<Output = Result<()>> + Send;

    fn remove(&self, path: &str) -> impl Future<Output = Result<()>> + Send;

    /// Read the value at `path` once.
    fn once(&self, path: &str) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Register a listener for `kind` events at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or the store rejects the
    /// registration.
    fn on(&self, path: &str, kind: EventKind, callback: EventCallback) -> Result<ListenerId>;

    /// Detach a listener. Detaching twice is a no-op.
    fn off(&self, path: &str, listener: ListenerId);
}

/// Stable identifier of the signed-in user (driver/vehicle).
pub trait Identity: Send + Sync {
    fn user_id(&self) -> impl Future<Output = Result<String>> + Send;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Provider entry point implemented by the host application.
pub trait Provider: Geolocation + DocumentStore + Identity + Clock {}

impl<T> Provider for T where T: Geolocation + DocumentStore + Identity + Clock {}
