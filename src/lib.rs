//! # Jeepney
//!
//! Live location sharing for a jeepney fleet. Vehicles broadcast their
//! position while in service ([`VehicleSession`]); passengers query the
//! vehicles around them through a [`proximity::ProximityIndex`], served over
//! HTTP by [`http::router`].

pub mod config;
pub mod http;
mod provider;
pub mod session;

pub use self::provider::Provider;
pub use self::session::VehicleSession;
pub use {geoindex, proximity, realtime, tracking};
