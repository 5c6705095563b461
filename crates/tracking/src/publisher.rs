//! # Position Publisher
//!
//! Writes a vehicle's latest position to the shared store. Each write is a
//! full overwrite of the vehicle's single record; nothing is merged and no
//! history is kept.

use std::sync::Arc;

use realtime::{Clock, DocumentStore, Error, Result, VehiclePosition, bad_request};
use tracing::{debug, warn};

use crate::config::TrackingConfig;

// characters the store does not accept in a path segment
const RESERVED: [char; 6] = ['/', '.', '#', '$', '[', ']'];

pub struct PositionPublisher<S> {
    store: Arc<S>,
    positions_path: String,
    precision: usize,
}

impl<S: DocumentStore + Clock> PositionPublisher<S> {
    #[must_use]
    pub fn new(store: Arc<S>, config: &TrackingConfig) -> Self {
        Self {
            store,
            positions_path: config.positions_path.clone(),
            precision: config.geohash_precision,
        }
    }

    /// Store path of the vehicle's position record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] when the id is empty or contains a
    /// reserved path character.
    pub fn path(&self, vehicle_id: &str) -> Result<String> {
        if vehicle_id.is_empty() || vehicle_id.contains(RESERVED) {
            return Err(bad_request!("invalid vehicle id {vehicle_id:?}"));
        }
        Ok(format!("{}/{vehicle_id}", self.positions_path))
    }

    /// Overwrite the vehicle's record with the given coordinates, a fresh
    /// geohash and the current time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCoordinates`] for out-of-range input and
    /// [`Error::PublishFailure`] when the store rejects the write. Store
    /// failures are logged here; callers can safely ignore them.
    pub async fn publish(
        &self, vehicle_id: &str, latitude: f64, longitude: f64,
    ) -> Result<VehiclePosition> {
        let path = self.path(vehicle_id)?;
        let geohash = geoindex::encode(latitude, longitude, self.precision)?;
        let position = VehiclePosition {
            vehicle_id: vehicle_id.to_string(),
            latitude,
            longitude,
            geohash,
            timestamp: self.store.now().timestamp_millis(),
        };
        let value = serde_json::to_value(&position)?;

        if let Err(e) = self.store.set(&path, &value).await {
            let error = Error::PublishFailure(format!("{e:#}"));
            warn!(monotonic_counter.publish_failures = 1, %vehicle_id, error = %error);
            return Err(error);
        }

        debug!(%vehicle_id, geohash = %position.geohash, "position published");
        Ok(position)
    }

    /// Remove the vehicle's record. Removing an absent record succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PublishFailure`] when the store rejects the removal.
    pub async fn clear(&self, vehicle_id: &str) -> Result<()> {
        let path = self.path(vehicle_id)?;

        if let Err(e) = self.store.remove(&path).await {
            let error = Error::PublishFailure(format!("{e:#}"));
            warn!(monotonic_counter.clear_failures = 1, %vehicle_id, error = %error);
            return Err(error);
        }

        debug!(%vehicle_id, "position cleared");
        Ok(())
    }

    /// Read the vehicle's current record.
    ///
    /// # Errors
    ///
    /// Returns an error when the store read fails or the record is malformed.
    pub async fn fetch(&self, vehicle_id: &str) -> Result<Option<VehiclePosition>> {
        let path = self.path(vehicle_id)?;
        let Some(value) = self.store.once(&path).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(value)?))
    }
}
