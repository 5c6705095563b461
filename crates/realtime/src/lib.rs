//! # Realtime Core
//!
//! Core modules shared by the vehicle tracking and proximity crates.

mod error;
mod position;
mod provider;

pub mod memory;

pub use crate::error::*;
pub use crate::position::*;
pub use crate::provider::*;
