//! Base-32 geohash.

use crate::{Error, Result, validate};

/// Longest supported geohash, roughly 37mm x 19mm.
pub const MAX_PRECISION: usize = 12;

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Rectangle covered by a geohash cell, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    const WORLD: Self = Self { min_lat: -90.0, max_lat: 90.0, min_lon: -180.0, max_lon: 180.0 };

    /// `(latitude, longitude)` of the cell center.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        ((self.min_lat + self.max_lat) / 2.0, (self.min_lon + self.max_lon) / 2.0)
    }

    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&latitude)
            && (self.min_lon..=self.max_lon).contains(&longitude)
    }

    #[must_use]
    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    #[must_use]
    pub fn lon_span(&self) -> f64 {
        self.max_lon - self.min_lon
    }
}

/// Encode a coordinate pair as a geohash of `precision` characters.
///
/// # Errors
///
/// Returns an error for out-of-range coordinates or a precision outside
/// `1..=MAX_PRECISION`.
pub fn encode(latitude: f64, longitude: f64, precision: usize) -> Result<String> {
    validate(latitude, longitude)?;
    if !(1..=MAX_PRECISION).contains(&precision) {
        return Err(Error::InvalidPrecision(precision));
    }

    let mut lat = (-90.0, 90.0);
    let mut lon = (-180.0, 180.0);
    let mut hash = String::with_capacity(precision);
    let mut index = 0;
    let mut bits = 0;
    let mut even = true;

    while hash.len() < precision {
        // bits alternate, longitude first
        let (range, value) = if even { (&mut lon, longitude) } else { (&mut lat, latitude) };
        let mid = f64::midpoint(range.0, range.1);
        if value >= mid {
            index = index * 2 + 1;
            range.0 = mid;
        } else {
            index *= 2;
            range.1 = mid;
        }
        even = !even;

        bits += 1;
        if bits == 5 {
            hash.push(char::from(BASE32[index]));
            bits = 0;
            index = 0;
        }
    }

    Ok(hash)
}

/// Decode a geohash to the cell it names. The empty hash is the whole world.
///
/// # Errors
///
/// Returns [`Error::InvalidGeohash`] for characters outside the geohash
/// alphabet or hashes longer than [`MAX_PRECISION`].
pub fn decode(hash: &str) -> Result<BoundingBox> {
    if hash.len() > MAX_PRECISION {
        return Err(Error::InvalidGeohash(hash.to_string()));
    }

    let mut cell = BoundingBox::WORLD;
    let mut even = true;

    for ch in hash.chars() {
        let lower = ch.to_ascii_lowercase();
        let Some(index) = BASE32.iter().position(|&c| char::from(c) == lower) else {
            return Err(Error::InvalidGeohash(hash.to_string()));
        };

        for shift in (0..5).rev() {
            let bit = (index >> shift) & 1 == 1;
            if even {
                let mid = f64::midpoint(cell.min_lon, cell.max_lon);
                if bit { cell.min_lon = mid } else { cell.max_lon = mid }
            } else {
                let mid = f64::midpoint(cell.min_lat, cell.max_lat);
                if bit { cell.min_lat = mid } else { cell.max_lat = mid }
            }
            even = !even;
        }
    }

    Ok(cell)
}

/// `(lat_span, lon_span)` in degrees of a cell at `precision`.
#[must_use]
pub fn cell_size(precision: usize) -> (f64, f64) {
    let bits = 5 * precision.min(MAX_PRECISION);
    let lon_bits = bits.div_ceil(2);
    let lat_bits = bits / 2;
    (180.0 / pow2(lat_bits), 360.0 / pow2(lon_bits))
}

fn pow2(exp: usize) -> f64 {
    // exp never exceeds 30 (MAX_PRECISION * 5 / 2)
    (0..exp).fold(1.0, |acc, _| acc * 2.0)
}

/// The up to eight cells surrounding `hash`, at the same precision.
///
/// Longitude wraps across the antimeridian; cells past a pole are omitted.
///
/// # Errors
///
/// Returns an error when `hash` is empty or not a valid geohash.
pub fn neighbors(hash: &str) -> Result<Vec<String>> {
    if hash.is_empty() {
        return Err(Error::InvalidGeohash(String::new()));
    }
    let cell = decode(hash)?;
    let (lat, lon) = cell.center();
    let (height, width) = (cell.lat_span(), cell.lon_span());

    let mut found = Vec::with_capacity(8);
    for dy in [1_i8, 0, -1] {
        for dx in [-1_i8, 0, 1] {
            if dy == 0 && dx == 0 {
                continue;
            }
            let n_lat = f64::from(dy).mul_add(height, lat);
            if !(-90.0..=90.0).contains(&n_lat) {
                continue;
            }
            let n_lon = wrap_longitude(f64::from(dx).mul_add(width, lon));
            let neighbor = encode(n_lat, n_lon, hash.len())?;
            if neighbor != hash && !found.contains(&neighbor) {
                found.push(neighbor);
            }
        }
    }
    Ok(found)
}

fn wrap_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn known_hashes() {
        assert_eq!(encode(42.605, -5.603, 5).unwrap(), "ezs42");
        assert_eq!(encode(57.64911, 10.40744, 11).unwrap(), "u4pruydqqvj");
    }

    #[test]
    fn decode_contains_point() {
        let cell = decode("ezs42").unwrap();
        assert!(cell.contains(42.605, -5.603));
        let (lat, lon) = cell.center();
        assert!((lat - 42.605).abs() < 0.03);
        assert!((lon - (-5.603)).abs() < 0.03);
    }

    #[test]
    fn decode_is_case_insensitive() {
        assert_eq!(decode("EZS42").unwrap(), decode("ezs42").unwrap());
    }

    #[test]
    fn invalid_input() {
        assert_eq!(decode("ezsa2"), Err(Error::InvalidGeohash("ezsa2".to_string())));
        assert!(decode("0123456789bcd").is_err());
        assert_eq!(encode(0.0, 0.0, 0), Err(Error::InvalidPrecision(0)));
        assert_eq!(encode(0.0, 0.0, 13), Err(Error::InvalidPrecision(13)));
        assert!(encode(91.0, 0.0, 5).is_err());
        assert!(neighbors("").is_err());
    }

    #[test]
    fn world_edges() {
        assert_eq!(encode(90.0, 180.0, 3).unwrap(), "zzz");
        assert_eq!(encode(-90.0, -180.0, 3).unwrap(), "000");
        assert_eq!(decode("").unwrap(), BoundingBox::WORLD);
    }

    #[test]
    fn cell_sizes() {
        let (lat, lon) = cell_size(1);
        assert!((lat - 45.0).abs() < f64::EPSILON);
        assert!((lon - 45.0).abs() < f64::EPSILON);

        let cell = decode("wdw4f2p0d").unwrap();
        let (lat, lon) = cell_size(9);
        assert!((cell.lat_span() - lat).abs() < 1e-12);
        assert!((cell.lon_span() - lon).abs() < 1e-12);
    }

    #[test]
    fn eight_neighbors() {
        let hash = encode(10.0, 122.0, 6).unwrap();
        let around = neighbors(&hash).unwrap();
        assert_eq!(around.len(), 8);
        assert!(!around.contains(&hash));
        assert!(around.iter().all(|n| n.len() == 6));
    }

    #[test]
    fn neighbors_wrap_antimeridian() {
        let east = encode(0.0, 179.99, 3).unwrap();
        let west = encode(0.0, -179.99, 3).unwrap();
        assert!(neighbors(&east).unwrap().contains(&west));
        assert!(neighbors(&west).unwrap().contains(&east));
    }

    #[test]
    fn neighbors_at_pole() {
        let hash = encode(89.99, 0.0, 2).unwrap();
        let around = neighbors(&hash).unwrap();
        assert_eq!(around.len(), 5);
    }
}
