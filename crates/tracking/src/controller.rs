//! # Tracking Controller
//!
//! Ties a [`LocationSampler`] to a [`PositionPublisher`] for one vehicle.
//! Fixes are published in arrival order by a single pump task; stopping
//! cancels sampling, waits for the pump to finish and then removes the
//! vehicle's record, so the removal is always the last write. When sampling
//! fails the pump removes the record itself before exiting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use realtime::{Error, Result, VehicleStatus};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::TrackingConfig;
use crate::lock;
use crate::provider::Provider;
use crate::publisher::PositionPublisher;
use crate::sampler::{FixStream, LocationSampler};

pub struct TrackingController<P: Provider> {
    vehicle_id: String,
    sampler: LocationSampler<P>,
    publisher: Arc<PositionPublisher<P>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    published: Arc<watch::Sender<u64>>,
    failure: Arc<Mutex<Option<Error>>>,

    // a record may exist that this controller is responsible for removing
    broadcasting: Arc<AtomicBool>,
}

impl<P: Provider> TrackingController<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, vehicle_id: impl Into<String>, config: &TrackingConfig) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            sampler: LocationSampler::new(Arc::clone(&provider)),
            publisher: Arc::new(PositionPublisher::new(provider, config)),
            pump: Mutex::new(None),
            published: Arc::new(watch::channel(0).0),
            failure: Arc::new(Mutex::new(None)),
            broadcasting: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    #[must_use]
    pub const fn sampler(&self) -> &LocationSampler<P> {
        &self.sampler
    }

    #[must_use]
    pub fn publisher(&self) -> &PositionPublisher<P> {
        &self.publisher
    }

    /// Whether location sampling is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.sampler.is_active()
    }

    /// The error that ended the last tracking session, if sampling failed
    /// rather than being stopped. Cleared by the next start or stop.
    #[must_use]
    pub fn last_error(&self) -> Option<Error> {
        lock(&self.failure).clone()
    }

    /// Count of successful publishes since the controller was created.
    #[must_use]
    pub fn published(&self) -> watch::Receiver<u64> {
        self.published.subscribe()
    }

    /// Start broadcasting the vehicle's position. A running session is
    /// replaced.
    ///
    /// Authorization is requested first; the user is prompted at most once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] when location access is refused
    /// and [`Error::LocationUnavailable`] when sampling cannot begin.
    pub async fn start(&self) -> Result<()> {
        if !self.sampler.request_authorization().await? {
            return Err(Error::PermissionDenied);
        }

        self.halt_pump().await;
        let fixes = self.sampler.start_stream()?;
        let session = self.sampler.session_id();
        self.broadcasting.store(true, Ordering::SeqCst);
        *lock(&self.failure) = None;

        let ended = Ended {
            failure: Arc::clone(&self.failure),
            broadcasting: Arc::clone(&self.broadcasting),
        };
        let pump = tokio::spawn(pump(
            fixes,
            Arc::clone(&self.publisher),
            self.vehicle_id.clone(),
            Arc::clone(&self.published),
            ended,
            session,
        ));
        *lock(&self.pump) = Some(pump);

        info!(vehicle_id = %self.vehicle_id, "tracking started");
        Ok(())
    }

    /// Stop broadcasting and remove the vehicle's record. Safe to call when
    /// already stopped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PublishFailure`] when the record could not be
    /// removed. Sampling is stopped regardless.
    pub async fn stop(&self) -> Result<()> {
        self.sampler.stop();
        self.halt_pump().await;
        *lock(&self.failure) = None;
        self.publisher.clear(&self.vehicle_id).await?;
        self.broadcasting.store(false, Ordering::SeqCst);

        info!(vehicle_id = %self.vehicle_id, "tracking stopped");
        Ok(())
    }

    /// Start or stop tracking to match the vehicle's service status.
    ///
    /// # Errors
    ///
    /// Returns the error from [`Self::start`] or [`Self::stop`].
    pub async fn apply_status(&self, status: VehicleStatus) -> Result<()> {
        debug!(vehicle_id = %self.vehicle_id, %status, "applying vehicle status");

        match status {
            VehicleStatus::InService if self.is_active() => Ok(()),
            VehicleStatus::InService => self.start().await,
            VehicleStatus::OutOfService => self.stop().await,
        }
    }

    async fn halt_pump(&self) {
        let pump = lock(&self.pump).take();
        if let Some(pump) = pump {
            pump.abort();
            let _ = pump.await;
        }
    }
}

// where the pump reports a sampling failure
struct Ended {
    failure: Arc<Mutex<Option<Error>>>,
    broadcasting: Arc<AtomicBool>,
}

async fn pump<P: Provider>(
    mut fixes: FixStream, publisher: Arc<PositionPublisher<P>>, vehicle_id: String,
    published: Arc<watch::Sender<u64>>, ended: Ended, session: Option<Uuid>,
) {
    while let Some(next) = fixes.next().await {
        match next {
            Ok(fix) => {
                // failures are logged by the publisher; the next fix retries
                if publisher.publish(&vehicle_id, fix.latitude, fix.longitude).await.is_ok() {
                    published.send_modify(|count| *count += 1);
                }
            }
            Err(e) => {
                error!(%vehicle_id, ?session, error = %e, "location sampling ended");
                *lock(&ended.failure) = Some(e);

                // sampling has stopped, so the record no longer tracks the vehicle
                if publisher.clear(&vehicle_id).await.is_ok() {
                    ended.broadcasting.store(false, Ordering::SeqCst);
                }
                return;
            }
        }
    }
    debug!(%vehicle_id, ?session, "fix stream closed");
}

impl<P: Provider> Drop for TrackingController<P> {
    fn drop(&mut self) {
        self.sampler.stop();
        let pump = lock(&self.pump).take();
        if !self.broadcasting.load(Ordering::SeqCst) {
            if let Some(pump) = pump {
                pump.abort();
            }
            return;
        }

        // best effort: a record left behind after a crash is for an external
        // sweeper to remove
        let Ok(runtime) = Handle::try_current() else {
            if let Some(pump) = pump {
                pump.abort();
            }
            warn!(vehicle_id = %self.vehicle_id, "no runtime to clear position on drop");
            return;
        };

        let publisher = Arc::clone(&self.publisher);
        let vehicle_id = self.vehicle_id.clone();
        runtime.spawn(async move {
            if let Some(pump) = pump {
                pump.abort();
                let _ = pump.await;
            }
            let _ = publisher.clear(&vehicle_id).await;
        });
    }
}
