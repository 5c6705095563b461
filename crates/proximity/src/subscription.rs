//! # Subscription
//!
//! Keeps a [`ProximityIndex`] in step with the positions collection through
//! the store's child events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use realtime::{
    DocumentStore, EventCallback, EventKind, ListenerId, Result, StoreEvent, VehiclePosition,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::index::ProximityIndex;
use crate::lock;

const CHILD_EVENTS: [EventKind; 3] =
    [EventKind::ChildAdded, EventKind::ChildChanged, EventKind::ChildRemoved];

/// Hooks run after the index has applied a change.
///
/// Every method defaults to a no-op. Hooks run on the store's delivery
/// context and may query the index.
pub trait PositionListener: Send + Sync + 'static {
    fn on_add(&self, _position: &VehiclePosition) {}

    fn on_update(&self, _position: &VehiclePosition) {}

    fn on_remove(&self, _vehicle_id: &str) {}
}

impl PositionListener for () {}

impl ProximityIndex {
    /// Attach the index to the positions collection in `store`.
    ///
    /// Existing records are delivered as additions, so the index is
    /// populated by the time this returns when the store delivers
    /// synchronously. Detach with [`Subscription::unsubscribe`] or by
    /// dropping the subscription.
    ///
    /// An index may be fed by several subscriptions at once; its entries are
    /// dropped when the last of them detaches.
    ///
    /// # Errors
    ///
    /// Returns an error when the store refuses a listener registration. Any
    /// listeners registered before the failure are detached.
    pub fn subscribe<S, L>(&self, store: Arc<S>, listener: L) -> Result<Subscription<S>>
    where
        S: DocumentStore + 'static,
        L: PositionListener,
    {
        let path = self.config.positions_path.clone();
        self.subscribers.fetch_add(1, Ordering::SeqCst);
        let attached = Arc::new(AtomicBool::new(true));
        let callback: EventCallback = {
            let index = self.clone();
            let attached = Arc::clone(&attached);
            let listener = Arc::new(listener);
            Arc::new(move |event| {
                if attached.load(Ordering::SeqCst) {
                    apply(&index, listener.as_ref(), event);
                }
            })
        };

        let subscription = Subscription {
            store,
            path,
            index: self.clone(),
            attached,
            listeners: Mutex::new(Vec::with_capacity(CHILD_EVENTS.len())),
        };

        for kind in CHILD_EVENTS {
            let id = subscription.store.on(&subscription.path, kind, Arc::clone(&callback))?;
            lock(&subscription.listeners).push(id);
        }

        info!(path = %subscription.path, vehicles = self.len(), "proximity index attached");
        Ok(subscription)
    }
}

fn apply(index: &ProximityIndex, listener: &dyn PositionListener, event: StoreEvent) {
    match event {
        StoreEvent::ChildAdded { key, value } | StoreEvent::ChildChanged { key, value } => {
            let Some(position) = decode(&key, value) else {
                return;
            };
            let upserted = index.write().upsert(position.clone());
            match upserted {
                Ok(false) => listener.on_add(&position),
                Ok(true) => listener.on_update(&position),
                Err(e) => {
                    warn!(monotonic_counter.malformed_positions = 1, vehicle_id = %key, error = %e);
                }
            }
        }
        StoreEvent::ChildRemoved { key } => {
            let removed = index.write().remove(&key);
            if removed {
                listener.on_remove(&key);
            }
        }
        StoreEvent::Value(_) => {}
    }
}

// the child key names the vehicle, whatever the record body says
fn decode(key: &str, value: Value) -> Option<VehiclePosition> {
    match serde_json::from_value::<VehiclePosition>(value) {
        Ok(mut position) => {
            if position.vehicle_id != key {
                debug!(vehicle_id = %key, body = %position.vehicle_id, "record id differs");
                position.vehicle_id = key.to_string();
            }
            Some(position)
        }
        Err(e) => {
            warn!(monotonic_counter.malformed_positions = 1, vehicle_id = %key, error = %e);
            None
        }
    }
}

/// A live attachment between a [`ProximityIndex`] and the store.
///
/// Dropping the subscription detaches it.
pub struct Subscription<S: DocumentStore + 'static> {
    store: Arc<S>,
    path: String,
    index: ProximityIndex,
    attached: Arc<AtomicBool>,
    listeners: Mutex<Vec<ListenerId>>,
}

impl<S: DocumentStore + 'static> Subscription<S> {
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Detach from the store. The index is emptied once no other
    /// subscription feeds it. Safe to call repeatedly.
    pub fn unsubscribe(&self) {
        if !self.attached.swap(false, Ordering::SeqCst) {
            return;
        }

        let listeners = std::mem::take(&mut *lock(&self.listeners));
        for id in listeners {
            self.store.off(&self.path, id);
        }

        // other subscriptions still keep the entries current
        let last = self.index.subscribers.fetch_sub(1, Ordering::SeqCst) == 1;
        if last {
            self.index.write().clear();
        }

        info!(path = %self.path, last, "proximity index detached");
    }
}

impl<S: DocumentStore + 'static> Drop for Subscription<S> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
