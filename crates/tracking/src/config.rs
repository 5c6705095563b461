use std::env;

use geoindex::MAX_PRECISION;

/// Default geohash length for published positions (~4.8m cells).
pub const DEFAULT_PRECISION: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingConfig {
    /// Collection holding one position record per vehicle.
    pub positions_path: String,
    pub geohash_precision: usize,
}

impl TrackingConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let positions_path = env::var("VEHICLE_POSITIONS_PATH")
            .ok()
            .map(|value| value.trim().trim_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.positions_path);
        let geohash_precision =
            env_usize("GEOHASH_PRECISION", defaults.geohash_precision).clamp(1, MAX_PRECISION);

        Self { positions_path, geohash_precision }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            positions_path: "vehicle_positions".to_string(),
            geohash_precision: DEFAULT_PRECISION,
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|value| value.trim().parse::<usize>().ok()).unwrap_or(default)
}
