//! # Location Sampler
//!
//! Owns the device's continuous geolocation subscription. At most one watch
//! is live per sampler: starting again cancels the previous watch before the
//! new one is created, and every callback is tagged with the generation it
//! was created for so that late deliveries from a cancelled watch are dropped.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use anyhow::Context as _;
use futures::channel::mpsc::{self, UnboundedReceiver};
use futures::{Stream, StreamExt};
use realtime::{
    Accuracy, Error, Fix, FixCallback, Geolocation, Permission, PermissionKind, PositionError,
    PositionErrorCallback, PositionErrorCode, Result, WatchId, WatchOptions,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::lock;

/// Options every watch is created with.
pub const SAMPLING: WatchOptions = WatchOptions {
    accuracy: Accuracy::High,
    min_distance_m: 5.0,
    min_interval_ms: 5_000,
    fastest_interval_ms: 2_000,
};

/// Callback receiving sampler failures.
pub type ErrorCallback = Arc<dyn Fn(Error) + Send + Sync>;

/// Outcome of the most recent permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Authorization {
    #[default]
    Unknown,
    Granted,
    Denied,
}

pub struct LocationSampler<G> {
    geolocation: Arc<G>,
    state: Arc<Mutex<SessionState>>,
}

#[derive(Debug, Default)]
struct SessionState {
    authorization: Authorization,
    generation: u64,
    active: Option<ActiveWatch>,
}

#[derive(Debug, Clone, Copy)]
struct ActiveWatch {
    watch: WatchId,
    session: Uuid,
}

impl<G: Geolocation + 'static> LocationSampler<G> {
    #[must_use]
    pub fn new(geolocation: Arc<G>) -> Self {
        Self { geolocation, state: Arc::new(Mutex::new(SessionState::default())) }
    }

    /// Ask for foreground location access.
    ///
    /// The platform is prompted at most once: after a grant or a denial the
    /// recorded answer is returned without prompting again. Call
    /// [`Self::reset_authorization`] once the user has changed the setting.
    ///
    /// # Errors
    ///
    /// Returns an error when the platform cannot answer the request.
    pub async fn request_authorization(&self) -> Result<bool> {
        let authorization = lock(&self.state).authorization;
        match authorization {
            Authorization::Granted => return Ok(true),
            Authorization::Denied => {
                debug!("location permission previously denied, not prompting");
                return Ok(false);
            }
            Authorization::Unknown => {}
        }

        let permission = self
            .geolocation
            .request_permission(PermissionKind::Location)
            .await
            .context("requesting location permission")?;
        let granted = permission == Permission::Granted;

        lock(&self.state).authorization =
            if granted { Authorization::Granted } else { Authorization::Denied };
        if !granted {
            warn!(monotonic_counter.permission_denied = 1, "location permission denied");
        }

        Ok(granted)
    }

    #[must_use]
    pub fn authorization(&self) -> Authorization {
        lock(&self.state).authorization
    }

    /// Forget the recorded permission answer so the next request prompts.
    pub fn reset_authorization(&self) {
        lock(&self.state).authorization = Authorization::Unknown;
    }

    /// Begin continuous sampling, delivering fixes to `on_fix` and failures
    /// to `on_error`.
    ///
    /// A watch that is already running is cancelled first. A failure clears
    /// the sampler's handle, so a later `start` is never blocked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] when authorization has not been
    /// granted and [`Error::LocationUnavailable`] when the platform refuses
    /// to create the watch.
    pub fn start(&self, on_fix: FixCallback, on_error: ErrorCallback) -> Result<()> {
        let (generation, stale) = {
            let mut state = lock(&self.state);
            if state.authorization != Authorization::Granted {
                return Err(Error::PermissionDenied);
            }
            state.generation += 1;
            (state.generation, state.active.take())
        };

        if let Some(stale) = stale {
            let conflict = Error::StaleSessionConflict(format!("session {}", stale.session));
            warn!(error = %conflict, watch = stale.watch.0, "restarting active location watch");
            self.geolocation.clear_watch(stale.watch);
        }

        let fix_state = Arc::clone(&self.state);
        let guarded_fix: FixCallback = Arc::new(move |fix: Fix| {
            let current = lock(&fix_state).generation == generation;
            if current {
                on_fix(fix);
            }
        });

        let error_state = Arc::clone(&self.state);
        let geolocation = Arc::clone(&self.geolocation);
        let guarded_error: PositionErrorCallback = Arc::new(move |err: PositionError| {
            let failed = {
                let mut state = lock(&error_state);
                if state.generation != generation {
                    return;
                }
                state.generation += 1;
                if err.code == PositionErrorCode::PermissionDenied {
                    state.authorization = Authorization::Denied;
                }
                state.active.take()
            };
            if let Some(failed) = failed {
                geolocation.clear_watch(failed.watch);
            }

            let error = match err.code {
                PositionErrorCode::PermissionDenied => Error::PermissionDenied,
                PositionErrorCode::PositionUnavailable | PositionErrorCode::Timeout => {
                    Error::LocationUnavailable(err.message)
                }
            };
            warn!(monotonic_counter.location_errors = 1, error = %error, "location watch failed");
            on_error(error);
        });

        let watch = self
            .geolocation
            .watch_position(&SAMPLING, guarded_fix, guarded_error)
            .map_err(|e| Error::LocationUnavailable(format!("{e:#}")))?;

        let session = Uuid::new_v4();
        let superseded = {
            let mut state = lock(&self.state);
            let superseded = state.generation != generation;
            if !superseded {
                state.active = Some(ActiveWatch { watch, session });
            }
            superseded
        };

        // stopped, failed or restarted while the watch was being created
        if superseded {
            debug!(watch = watch.0, "discarding superseded location watch");
            self.geolocation.clear_watch(watch);
            return Ok(());
        }

        info!(%session, watch = watch.0, "location sampling started");
        Ok(())
    }

    /// Begin sampling and return the fixes as a stream.
    ///
    /// The stream yields `Ok(fix)` for each sample and ends after yielding
    /// the first `Err`, or once the watch is cancelled.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::start`].
    pub fn start_stream(&self) -> Result<FixStream> {
        let (tx, rx) = mpsc::unbounded();
        let fix_tx = tx.clone();

        self.start(
            Arc::new(move |fix| {
                let _ = fix_tx.unbounded_send(Ok(fix));
            }),
            Arc::new(move |err| {
                let _ = tx.unbounded_send(Err(err));
                tx.close_channel();
            }),
        )?;

        Ok(FixStream { inner: rx })
    }

    /// Cancel the active watch, if any. Safe to call repeatedly.
    pub fn stop(&self) {
        let active = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.active.take()
        };

        if let Some(active) = active {
            self.geolocation.clear_watch(active.watch);
            info!(session = %active.session, "location sampling stopped");
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        lock(&self.state).active.is_some()
    }

    /// Identifier of the running sampling session, used to correlate logs.
    #[must_use]
    pub fn session_id(&self) -> Option<Uuid> {
        lock(&self.state).active.map(|active| active.session)
    }
}

/// Fixes produced by [`LocationSampler::start_stream`].
pub struct FixStream {
    inner: UnboundedReceiver<Result<Fix>>,
}

impl Stream for FixStream {
    type Item = Result<Fix>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}
