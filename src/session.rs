//! # Vehicle Session
//!
//! Runs tracking for the signed-in vehicle for as long as the session is
//! open. The vehicle's externally managed service status drives tracking:
//! `in-service` starts broadcasting and anything else stops it and removes
//! the vehicle's position.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context as _;
use realtime::{Error, EventKind, ListenerId, Result, StoreEvent, VehicleStatus};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracking::{TrackingConfig, TrackingController};

use crate::config;
use crate::provider::Provider;

pub struct VehicleSession<P: Provider> {
    provider: Arc<P>,
    controller: Arc<TrackingController<P>>,
    status_path: String,
    listener: Mutex<Option<ListenerId>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    last_error: Arc<Mutex<Option<Error>>>,
}

impl<P: Provider> VehicleSession<P> {
    /// Open a session for the signed-in vehicle.
    ///
    /// Location permission is requested up front. Tracking then follows the
    /// vehicle's status record until [`Self::close`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] when location access is refused,
    /// or an error when the vehicle id cannot be resolved or the status
    /// listener cannot be registered.
    pub async fn open(provider: Arc<P>, tracking: &TrackingConfig) -> Result<Self> {
        let vehicle_id = provider.user_id().await.context("resolving vehicle id")?;
        let controller =
            Arc::new(TrackingController::new(Arc::clone(&provider), vehicle_id.clone(), tracking));

        if !controller.sampler().request_authorization().await? {
            return Err(Error::PermissionDenied);
        }

        let status_path = format!("{}/{vehicle_id}", config::get_vehicle_status_path());
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = provider.on(
            &status_path,
            EventKind::Value,
            Arc::new(move |event| {
                if let StoreEvent::Value(value) = event {
                    let _ = tx.send(value);
                }
            }),
        )?;

        let last_error = Arc::new(Mutex::new(None));
        let worker =
            tokio::spawn(follow_status(rx, Arc::clone(&controller), Arc::clone(&last_error)));

        info!(%vehicle_id, %status_path, "vehicle session opened");
        Ok(Self {
            provider,
            controller,
            status_path,
            listener: Mutex::new(Some(listener)),
            worker: Mutex::new(Some(worker)),
            last_error,
        })
    }

    #[must_use]
    pub fn vehicle_id(&self) -> &str {
        self.controller.vehicle_id()
    }

    #[must_use]
    pub fn controller(&self) -> &TrackingController<P> {
        &self.controller
    }

    /// Whether the vehicle's position is being broadcast.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.controller.is_active()
    }

    /// The most recent failure to follow a status change, or the sampling
    /// failure that ended broadcasting. After a sampling failure the vehicle
    /// stays off the map until tracking is started again.
    #[must_use]
    pub fn last_error(&self) -> Option<Error> {
        lock(&self.last_error).clone().or_else(|| self.controller.last_error())
    }

    /// Stop following the status record, stop tracking and remove the
    /// vehicle's position. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PublishFailure`] when the position could not be
    /// removed.
    pub async fn close(&self) -> Result<()> {
        self.detach();
        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            worker.abort();
            let _ = worker.await;
        }

        self.controller.stop().await?;
        info!(vehicle_id = %self.vehicle_id(), "vehicle session closed");
        Ok(())
    }

    fn detach(&self) {
        let listener = lock(&self.listener).take();
        if let Some(listener) = listener {
            self.provider.off(&self.status_path, listener);
        }
    }
}

impl<P: Provider> Drop for VehicleSession<P> {
    fn drop(&mut self) {
        self.detach();
        if let Some(worker) = lock(&self.worker).take() {
            worker.abort();
        }
    }
}

// applies status changes one at a time, in the order they were delivered
async fn follow_status<P: Provider>(
    mut rx: mpsc::UnboundedReceiver<Option<Value>>, controller: Arc<TrackingController<P>>,
    last_error: Arc<Mutex<Option<Error>>>,
) {
    while let Some(value) = rx.recv().await {
        let status = match parse_status(value) {
            Ok(status) => status,
            Err(e) => {
                warn!(vehicle_id = %controller.vehicle_id(), error = %e, "ignoring status");
                continue;
            }
        };

        match controller.apply_status(status).await {
            Ok(()) => {
                debug!(vehicle_id = %controller.vehicle_id(), %status, "status applied");
                *lock(&last_error) = None;
            }
            Err(e) => {
                warn!(vehicle_id = %controller.vehicle_id(), %status, error = %e);
                *lock(&last_error) = Some(e);
            }
        }
    }
}

/// A missing status record means the vehicle is not in service.
fn parse_status(value: Option<Value>) -> Result<VehicleStatus> {
    match value {
        None => Ok(VehicleStatus::OutOfService),
        Some(Value::String(status)) => status.parse(),
        Some(other) => Err(Error::InvalidFormat(format!("status should be a string: {other}"))),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
