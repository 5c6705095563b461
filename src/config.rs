pub fn get_vehicle_status_path() -> String {
    std::env::var("VEHICLE_STATUS_PATH")
        .ok()
        .map(|value| value.trim().trim_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| {
            let default = "vehicle_status".to_string();
            tracing::trace!("VEHICLE_STATUS_PATH not set, using default: {default}");
            default
        })
}

pub fn get_default_radius() -> f64 {
    env_meters("NEARBY_DEFAULT_RADIUS_M", 1_000.0)
}

pub fn get_max_radius() -> f64 {
    env_meters("NEARBY_MAX_RADIUS_M", 10_000.0)
}

fn env_meters(key: &str, default: f64) -> f64 {
    match std::env::var(key).ok().map(|value| value.trim().parse::<f64>()) {
        Some(Ok(meters)) if meters.is_finite() && meters > 0.0 => meters,
        Some(_) => {
            tracing::warn!("{key} is not a positive distance, using default: {default}");
            default
        }
        None => {
            tracing::trace!("{key} not set, using default: {default}");
            default
        }
    }
}
