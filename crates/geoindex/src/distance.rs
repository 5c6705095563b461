/// Mean earth radius (IUGG) in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance in meters between two `(latitude, longitude)`
/// positions, using the haversine formula.
#[must_use]
pub fn distance_m(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point() {
        assert!(distance_m((10.0, 122.0), (10.0, 122.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn one_degree_of_latitude() {
        let dist = distance_m((0.0, 0.0), (1.0, 0.0));
        assert!((dist - 111_195.0).abs() < 1.0);
    }

    #[test]
    fn symmetric() {
        let a = (10.3157, 123.8854);
        let b = (10.2926, 123.9020);
        assert!((distance_m(a, b) - distance_m(b, a)).abs() < 1e-9);
    }

    #[test]
    fn short_hop() {
        // ~15.6m diagonal at 10 degrees north
        let dist = distance_m((10.0, 122.0), (10.0001, 122.0001));
        assert!(dist > 15.0 && dist < 16.0);
    }

    #[test]
    fn across_antimeridian() {
        let dist = distance_m((0.0, 179.999), (0.0, -179.999));
        assert!(dist < 250.0);
    }
}
