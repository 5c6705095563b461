//! # Geo Index
//!
//! Pure functions for spatial indexing of vehicle positions: geohash
//! encoding and decoding, the set of geohash prefixes covering a circle, and
//! great-circle distance.
//!
//! A proximity query runs in two passes. [`covering_prefixes`] gives a coarse
//! pre-filter that can be evaluated as lexical range scans over a sorted
//! geohash index ([`prefix_range`]); [`distance_m`] then keeps only the
//! candidates inside the radius.
//!
//! ```
//! use geoindex::{covering_prefixes, distance_m, encode};
//!
//! let hash = encode(10.0, 122.0, 9).unwrap();
//! let prefixes = covering_prefixes(10.0, 122.0, 500.0).unwrap();
//! assert!(prefixes.iter().any(|p| hash.starts_with(p.as_str())));
//! assert!(distance_m((10.0, 122.0), (10.0001, 122.0001)) < 20.0);
//! ```

mod cover;
mod distance;
mod geohash;

use thiserror::Error;

pub use crate::cover::{covering_prefixes, prefix_range};
pub use crate::distance::{EARTH_RADIUS_M, distance_m};
pub use crate::geohash::{BoundingBox, MAX_PRECISION, cell_size, decode, encode, neighbors};

/// Result type for geo functions.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("invalid geohash: {0:?}")]
    InvalidGeohash(String),

    #[error("geohash precision must be 1..={MAX_PRECISION}, got {0}")]
    InvalidPrecision(usize),

    #[error("radius must be a finite, non-negative number of meters, got {0}")]
    InvalidRadius(f64),
}

/// Check that a coordinate pair is finite and within WGS-84 bounds.
///
/// # Errors
///
/// Returns [`Error::InvalidCoordinates`] when either value is out of range.
pub fn validate(latitude: f64, longitude: f64) -> Result<()> {
    let valid = latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude);
    if valid { Ok(()) } else { Err(Error::InvalidCoordinates { latitude, longitude }) }
}
