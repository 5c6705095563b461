//! # Proximity Index
//!
//! In-memory mirror of the positions collection, keyed both by vehicle and
//! by a full-precision geohash. The geohash ordering turns a radius query
//! into a handful of range scans followed by an exact distance check.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use geoindex::{MAX_PRECISION, covering_prefixes, distance_m, prefix_range};
use realtime::{Clock, Result, SystemClock, VehiclePosition};

use crate::config::IndexConfig;

/// Live set of vehicle positions supporting radius queries.
///
/// Cloning is cheap and every clone shares the same entries. Populate the
/// index with [`ProximityIndex::subscribe`](crate::ProximityIndex::subscribe).
/// The entries are kept while at least one subscription is attached.
#[derive(Clone)]
pub struct ProximityIndex {
    entries: Arc<RwLock<Entries>>,
    pub(crate) config: IndexConfig,
    clock: Arc<dyn Clock>,

    // live subscriptions feeding `entries`
    pub(crate) subscribers: Arc<AtomicUsize>,
}

#[derive(Debug, Default)]
pub(crate) struct Entries {
    by_vehicle: HashMap<String, Entry>,
    by_hash: BTreeSet<(String, String)>,
}

#[derive(Debug)]
struct Entry {
    key: String,
    position: VehiclePosition,
}

impl Entries {
    /// Insert or replace a position. Returns `true` when the vehicle was
    /// already indexed.
    pub(crate) fn upsert(&mut self, position: VehiclePosition) -> Result<bool> {
        // the stored geohash may use any precision, so index on our own
        let key = geoindex::encode(position.latitude, position.longitude, MAX_PRECISION)?;
        let vehicle_id = position.vehicle_id.clone();

        let entry = Entry { key: key.clone(), position };
        let previous = self.by_vehicle.insert(vehicle_id.clone(), entry);
        if let Some(previous) = &previous {
            self.by_hash.remove(&(previous.key.clone(), vehicle_id.clone()));
        }
        self.by_hash.insert((key, vehicle_id));

        Ok(previous.is_some())
    }

    pub(crate) fn remove(&mut self, vehicle_id: &str) -> bool {
        let Some(entry) = self.by_vehicle.remove(vehicle_id) else {
            return false;
        };
        self.by_hash.remove(&(entry.key, vehicle_id.to_string()));
        true
    }

    pub(crate) fn clear(&mut self) {
        self.by_vehicle.clear();
        self.by_hash.clear();
    }
}

impl ProximityIndex {
    #[must_use]
    pub fn new(config: IndexConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an index that judges position age by `clock`.
    #[must_use]
    pub fn with_clock(config: IndexConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Entries::default())),
            config,
            clock,
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Vehicles within `radius_m` meters of the given point, nearest first.
    ///
    /// The result is a snapshot taken at call time. When a maximum age is
    /// configured, positions older than it are left out.
    ///
    /// # Errors
    ///
    /// Returns [`realtime::Error::InvalidCoordinates`] for an out-of-range
    /// point or a negative radius.
    pub fn query_near(
        &self, latitude: f64, longitude: f64, radius_m: f64,
    ) -> Result<Vec<VehiclePosition>> {
        let prefixes = covering_prefixes(latitude, longitude, radius_m)?;
        let cutoff = self.config.max_age.map(|max_age| {
            let max_age = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
            self.clock.now().timestamp_millis().saturating_sub(max_age)
        });

        let entries = self.read();
        let mut nearby = Vec::new();

        for prefix in &prefixes {
            let (start, end) = prefix_range(prefix);
            let range = (start, String::new())..=(end, String::new());

            for (_, vehicle_id) in entries.by_hash.range(range) {
                let Some(Entry { position, .. }) = entries.by_vehicle.get(vehicle_id) else {
                    continue;
                };
                if cutoff.is_some_and(|cutoff| position.timestamp < cutoff) {
                    continue;
                }
                let distance = distance_m((latitude, longitude), position.coordinates());
                if distance <= radius_m {
                    nearby.push((distance, position.clone()));
                }
            }
        }
        drop(entries);

        nearby.sort_by(|(a, first), (b, second)| {
            a.total_cmp(b).then_with(|| first.vehicle_id.cmp(&second.vehicle_id))
        });
        Ok(nearby.into_iter().map(|(_, position)| position).collect())
    }

    #[must_use]
    pub fn get(&self, vehicle_id: &str) -> Option<VehiclePosition> {
        self.read().by_vehicle.get(vehicle_id).map(|entry| entry.position.clone())
    }

    /// Every indexed position, ordered by vehicle id.
    #[must_use]
    pub fn positions(&self) -> Vec<VehiclePosition> {
        let mut positions: Vec<_> =
            self.read().by_vehicle.values().map(|entry| entry.position.clone()).collect();
        positions.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id));
        positions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().by_vehicle.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().by_vehicle.is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
