//! Geohash prefixes covering a circle.

use crate::distance::EARTH_RADIUS_M;
use crate::geohash::{MAX_PRECISION, cell_size, encode, neighbors};
use crate::{Error, Result, validate};

// widen the circle slightly so float error never drops a boundary cell
const MARGIN: f64 = 1.0 + 1e-6;

/// Geohash prefixes whose cells together contain every point within
/// `radius_m` of the center.
///
/// The prefix length is the longest precision whose cell is at least as
/// large as the circle's bounding box, so the center cell plus its
/// neighbors always covers the circle. When the circle reaches a pole or is
/// wider than any cell, the result is `[""]`, which matches every hash.
///
/// # Errors
///
/// Returns an error for invalid coordinates or a negative/non-finite radius.
pub fn covering_prefixes(latitude: f64, longitude: f64, radius_m: f64) -> Result<Vec<String>> {
    validate(latitude, longitude)?;
    if !radius_m.is_finite() || radius_m < 0.0 {
        return Err(Error::InvalidRadius(radius_m));
    }

    let angular = radius_m / EARTH_RADIUS_M * MARGIN;
    let lat_extent = angular.to_degrees();
    if latitude.abs() + lat_extent >= 90.0 {
        return Ok(vec![String::new()]);
    }
    // widest longitude offset of a spherical cap
    let lon_extent = (angular.sin() / latitude.to_radians().cos()).asin().to_degrees();

    let Some(precision) = (1..=MAX_PRECISION).rev().find(|&precision| {
        let (height, width) = cell_size(precision);
        height >= lat_extent && width >= lon_extent
    }) else {
        return Ok(vec![String::new()]);
    };

    let center = encode(latitude, longitude, precision)?;
    let mut prefixes = neighbors(&center)?;
    prefixes.insert(0, center);
    Ok(prefixes)
}

/// Inclusive lexical range `(start, end)` of every geohash beginning with
/// `prefix`, for range scans over a sorted geohash index.
#[must_use]
pub fn prefix_range(prefix: &str) -> (String, String) {
    // '~' sorts after every geohash character
    (prefix.to_string(), format!("{prefix}~"))
}
