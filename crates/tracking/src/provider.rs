//! # Provider
//!
//! Provider defines external data interfaces for the crate.

pub use realtime::{Clock, DocumentStore, Geolocation};

/// Provider entry point implemented by the host application.
pub trait Provider: Geolocation + DocumentStore + Clock + 'static {}

impl<T> Provider for T where T: Geolocation + DocumentStore + Clock + 'static {}
