use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use proximity::ProximityIndex;
use realtime::{HttpError, Result, VehiclePosition, bad_request};
use serde::{Deserialize, Serialize};

use crate::config;

/// Routes served to passengers. The host binds the listener.
pub fn router(index: ProximityIndex) -> Router {
    Router::new().route("/vehicles/nearby", get(nearby)).with_state(index)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lon: f64,

    /// Search radius in meters, at least zero.
    pub radius: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyReply {
    pub vehicles: Vec<VehiclePosition>,
}

/// Vehicles near a point, nearest first.
///
/// # Errors
///
/// Responds with 400 for out-of-range coordinates or radius.
pub async fn nearby(
    State(index): State<ProximityIndex>, Query(query): Query<NearbyQuery>,
) -> std::result::Result<Json<NearbyReply>, HttpError> {
    Ok(Json(find_nearby(&index, &query)?))
}

fn find_nearby(index: &ProximityIndex, query: &NearbyQuery) -> Result<NearbyReply> {
    let radius = query.radius.unwrap_or_else(config::get_default_radius);
    // zero matches vehicles at the exact point
    if !radius.is_finite() || radius < 0.0 {
        return Err(bad_request!("radius must be a non-negative distance, got {radius}"));
    }
    let max_radius = config::get_max_radius();
    if radius > max_radius {
        return Err(bad_request!("radius {radius} exceeds the {max_radius}m limit"));
    }

    let vehicles = index.query_near(query.lat, query.lon, radius)?;
    tracing::debug!(lat = query.lat, lon = query.lon, radius, found = vehicles.len());

    Ok(NearbyReply { vehicles })
}

#[cfg(test)]
mod tests {
    use proximity::IndexConfig;
    use realtime::Error;

    use super::*;

    #[test]
    fn radius_rules() {
        let index = ProximityIndex::new(IndexConfig::default());
        let query = |radius| NearbyQuery { lat: 10.0, lon: 122.0, radius: Some(radius) };

        let err = find_nearby(&index, &query(-1.0)).expect_err("negative radius");
        assert!(matches!(err, Error::BadRequest(_)));
        let err = find_nearby(&index, &query(1e9)).expect_err("radius over the limit");
        assert!(matches!(err, Error::BadRequest(_)));

        let reply = find_nearby(&index, &query(0.0)).expect("zero radius");
        assert!(reply.vehicles.is_empty());
    }
}
