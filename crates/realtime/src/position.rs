//! # Position
//!
//! Records shared between the vehicle (writer) and passenger (reader) sides.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, bad_request};

/// Latest known position of a vehicle, stored at `{positions}/{vehicle_id}`.
///
/// Writes are full overwrites: there is never more than one record per
/// vehicle and no history is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePosition {
    pub vehicle_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub geohash: String,

    /// Milliseconds since the Unix epoch, set at write time.
    pub timestamp: i64,
}

impl VehiclePosition {
    /// `(latitude, longitude)` pair.
    #[must_use]
    pub const fn coordinates(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

/// A single geolocation sample reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl Fix {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, accuracy: None, altitude: None }
    }
}

/// Externally owned service status stored at `{status}/{vehicle_id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VehicleStatus {
    InService,
    OutOfService,
}

impl VehicleStatus {
    #[must_use]
    pub const fn is_in_service(self) -> bool {
        matches!(self, Self::InService)
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InService => write!(f, "in-service"),
            Self::OutOfService => write!(f, "out-of-service"),
        }
    }
}

impl FromStr for VehicleStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in-service" | "in_service" => Ok(Self::InService),
            "out-of-service" | "out_of_service" => Ok(Self::OutOfService),
            other => Err(bad_request!("unknown vehicle status: {other}")),
        }
    }
}
