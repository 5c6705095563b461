use std::env;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Collection holding one position record per vehicle.
    pub positions_path: String,

    /// Positions older than this are left out of query results. `None`, the
    /// default, keeps every position until its record is removed; a vehicle
    /// parked at a terminal publishes no new fixes but is still in service.
    pub max_age: Option<Duration>,
}

impl IndexConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let positions_path = env::var("VEHICLE_POSITIONS_PATH")
            .ok()
            .map(|value| value.trim().trim_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.positions_path);

        let max_age = match env::var("POSITION_MAX_AGE_SECS").ok().map(|v| v.trim().parse::<u64>())
        {
            Some(Ok(secs)) if secs > 0 => Some(Duration::from_secs(secs)),
            _ => defaults.max_age,
        };

        Self { positions_path, max_age }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { positions_path: "vehicle_positions".to_string(), max_age: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.positions_path, "vehicle_positions");
        assert_eq!(config.max_age, None);
    }
}
