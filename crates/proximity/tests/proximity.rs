#![allow(missing_docs)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;
use proximity::{IndexConfig, PositionListener, ProximityIndex};
use realtime::memory::MemoryStore;
use realtime::{Clock, DocumentStore, Error, VehiclePosition};
use serde_json::{Value, json};

/// 2026-03-01T08:00:00Z
const NOW_MILLIS: i64 = 1_772_352_000_000;

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(NOW_MILLIS).expect("should be a valid time")
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Added(String),
    Updated(String),
    Removed(String),
}

#[derive(Clone)]
struct Recorder {
    index: ProximityIndex,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Recorder {
    fn new(index: &ProximityIndex) -> Self {
        Self { index: index.clone(), seen: Arc::new(Mutex::new(Vec::new())) }
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().expect("should lock").clone()
    }
}

impl PositionListener for Recorder {
    fn on_add(&self, position: &VehiclePosition) {
        assert_eq!(self.index.get(&position.vehicle_id).as_ref(), Some(position));
        self.seen.lock().expect("should lock").push(Seen::Added(position.vehicle_id.clone()));
    }

    fn on_update(&self, position: &VehiclePosition) {
        assert_eq!(self.index.get(&position.vehicle_id).as_ref(), Some(position));
        self.seen.lock().expect("should lock").push(Seen::Updated(position.vehicle_id.clone()));
    }

    fn on_remove(&self, vehicle_id: &str) {
        assert_eq!(self.index.get(vehicle_id), None);
        self.seen.lock().expect("should lock").push(Seen::Removed(vehicle_id.to_string()));
    }
}

fn index() -> ProximityIndex {
    ProximityIndex::with_clock(IndexConfig::default(), Arc::new(FixedClock))
}

fn record(vehicle_id: &str, latitude: f64, longitude: f64, timestamp: i64) -> Value {
    let position = VehiclePosition {
        vehicle_id: vehicle_id.to_string(),
        latitude,
        longitude,
        geohash: geoindex::encode(latitude, longitude, 9).expect("should encode"),
        timestamp,
    };
    serde_json::to_value(position).expect("should serialize")
}

async fn put(store: &MemoryStore, vehicle_id: &str, latitude: f64, longitude: f64) {
    let path = format!("vehicle_positions/{vehicle_id}");
    let value = record(vehicle_id, latitude, longitude, NOW_MILLIS);
    store.set(&path, &value).await.expect("should write");
}

fn ids(positions: &[VehiclePosition]) -> Vec<&str> {
    positions.iter().map(|p| p.vehicle_id.as_str()).collect()
}

// Should return only vehicles inside the radius, nearest first.
#[tokio::test]
async fn query_within_radius() {
    let store = MemoryStore::new();
    let index = index();
    let _subscription = index.subscribe(Arc::new(store.clone()), ()).expect("should subscribe");

    put(&store, "far", 10.01, 122.0).await;
    put(&store, "near", 10.0001, 122.0001).await;
    put(&store, "here", 10.0, 122.0).await;

    let nearby = index.query_near(10.0, 122.0, 50.0).expect("should query");
    assert_eq!(ids(&nearby), vec!["here", "near"]);

    let nearby = index.query_near(10.0, 122.0, 2_000.0).expect("should query");
    assert_eq!(ids(&nearby), vec!["here", "near", "far"]);

    assert!(index.query_near(10.5, 122.5, 100.0).expect("should query").is_empty());
}

// Should load records that existed before subscribing.
#[tokio::test]
async fn existing_records_loaded() {
    let store = MemoryStore::new();
    put(&store, "a", 10.0, 122.0).await;
    put(&store, "b", 14.5995, 120.9842).await;

    let index = index();
    let recorder = Recorder::new(&index);
    let _subscription =
        index.subscribe(Arc::new(store.clone()), recorder.clone()).expect("should subscribe");

    assert_eq!(index.len(), 2);
    assert_eq!(ids(&index.positions()), vec!["a", "b"]);
    assert_eq!(recorder.seen(), vec![Seen::Added("a".to_string()), Seen::Added("b".to_string())]);
}

// Should track moves and removals, updating the index before each hook.
#[tokio::test]
async fn follows_changes() {
    let store = MemoryStore::new();
    let index = index();
    let recorder = Recorder::new(&index);
    let _subscription =
        index.subscribe(Arc::new(store.clone()), recorder.clone()).expect("should subscribe");

    put(&store, "jeep", 10.3, 123.9).await;
    assert!(index.query_near(10.0, 122.0, 100.0).expect("should query").is_empty());

    put(&store, "jeep", 10.0, 122.0).await;
    assert_eq!(ids(&index.query_near(10.0, 122.0, 100.0).expect("should query")), vec!["jeep"]);
    assert_eq!(index.len(), 1);

    store.remove("vehicle_positions/jeep").await.expect("should remove");
    assert!(index.query_near(10.0, 122.0, 100.0).expect("should query").is_empty());
    assert!(index.is_empty());

    assert_eq!(
        recorder.seen(),
        vec![
            Seen::Added("jeep".to_string()),
            Seen::Updated("jeep".to_string()),
            Seen::Removed("jeep".to_string()),
        ]
    );
}

// Should detach every listener and empty the index, once.
#[tokio::test]
async fn unsubscribe_is_idempotent() {
    let store = MemoryStore::new();
    let index = index();
    let subscription = index.subscribe(Arc::new(store.clone()), ()).expect("should subscribe");
    put(&store, "a", 10.0, 122.0).await;

    assert!(subscription.is_attached());
    assert_eq!(store.listener_count("vehicle_positions"), 3);

    subscription.unsubscribe();
    subscription.unsubscribe();

    assert!(!subscription.is_attached());
    assert_eq!(store.listener_count("vehicle_positions"), 0);
    assert!(index.is_empty());

    put(&store, "b", 10.0, 122.0).await;
    assert!(index.is_empty());
}

// Should detach when the subscription goes out of scope.
#[tokio::test]
async fn drop_detaches() {
    let store = MemoryStore::new();
    let index = index();
    {
        let _subscription =
            index.subscribe(Arc::new(store.clone()), ()).expect("should subscribe");
        put(&store, "a", 10.0, 122.0).await;
        assert_eq!(index.len(), 1);
    }

    assert_eq!(store.listener_count("vehicle_positions"), 0);
    assert!(index.is_empty());
}

// Should skip records that do not decode and keep indexing the rest.
#[tokio::test]
async fn malformed_records_skipped() {
    let store = MemoryStore::new();
    let index = index();
    let recorder = Recorder::new(&index);
    let _subscription =
        index.subscribe(Arc::new(store.clone()), recorder.clone()).expect("should subscribe");

    store.set("vehicle_positions/bad", &json!({"lat": 10.0})).await.expect("should write");
    let out_of_range = json!({
        "vehicleId": "wild",
        "latitude": 95.0,
        "longitude": 122.0,
        "geohash": "w9ybbhmwn",
        "timestamp": NOW_MILLIS,
    });
    store.set("vehicle_positions/wild", &out_of_range).await.expect("should write");
    put(&store, "good", 10.0, 122.0).await;

    assert_eq!(ids(&index.positions()), vec!["good"]);
    assert_eq!(recorder.seen(), vec![Seen::Added("good".to_string())]);
}

// Should name the vehicle after the record's key.
#[tokio::test]
async fn key_names_vehicle() {
    let store = MemoryStore::new();
    let index = index();
    let _subscription = index.subscribe(Arc::new(store.clone()), ()).expect("should subscribe");

    let body = record("someone-else", 10.0, 122.0, NOW_MILLIS);
    store.set("vehicle_positions/jeep-7", &body).await.expect("should write");

    let position = index.get("jeep-7").expect("should be indexed");
    assert_eq!(position.vehicle_id, "jeep-7");
    assert_eq!(index.get("someone-else"), None);
}

// Should keep a vehicle that has not moved for a while visible for as long as
// its record exists.
#[tokio::test]
async fn stationary_vehicle_visible() {
    let store = MemoryStore::new();
    let parked = record("parked", 10.0, 122.0, NOW_MILLIS - 6 * 60_000);
    store.set("vehicle_positions/parked", &parked).await.expect("should write");

    let index = index();
    assert_eq!(index.config().max_age, None);
    let _subscription = index.subscribe(Arc::new(store.clone()), ()).expect("should subscribe");
    assert_eq!(ids(&index.query_near(10.0, 122.0, 100.0).expect("should query")), vec!["parked"]);

    store.remove("vehicle_positions/parked").await.expect("should remove");
    assert!(index.query_near(10.0, 122.0, 100.0).expect("should query").is_empty());
}

// Should leave positions older than a configured maximum age out of queries.
#[tokio::test]
async fn stale_positions_filtered() {
    let store = MemoryStore::new();
    let stale = record("stale", 10.0, 122.0, NOW_MILLIS - 301_000);
    store.set("vehicle_positions/stale", &stale).await.expect("should write");
    let fresh = record("fresh", 10.0, 122.0, NOW_MILLIS - 60_000);
    store.set("vehicle_positions/fresh", &fresh).await.expect("should write");

    let config = IndexConfig { max_age: Some(Duration::from_secs(300)), ..IndexConfig::default() };
    let bounded = ProximityIndex::with_clock(config, Arc::new(FixedClock));
    let _bounded = bounded.subscribe(Arc::new(store.clone()), ()).expect("should subscribe");
    assert_eq!(ids(&bounded.query_near(10.0, 122.0, 10.0).expect("should query")), vec!["fresh"]);
    assert_eq!(bounded.len(), 2);

    let config = IndexConfig { max_age: Some(Duration::from_secs(30)), ..IndexConfig::default() };
    let strict = ProximityIndex::with_clock(config, Arc::new(FixedClock));
    let _strict = strict.subscribe(Arc::new(store), ()).expect("should subscribe");
    assert!(strict.query_near(10.0, 122.0, 10.0).expect("should query").is_empty());
}

// Should keep the shared entries while another subscription is still attached.
#[tokio::test]
async fn shared_index_outlives_one_subscription() {
    let store = Arc::new(MemoryStore::new());
    let index = index();
    let first = index.subscribe(Arc::clone(&store), ()).expect("should subscribe");
    let second = index.clone().subscribe(Arc::clone(&store), ()).expect("should subscribe");
    put(&store, "a", 10.0, 122.0).await;

    first.unsubscribe();
    assert!(second.is_attached());
    assert_eq!(store.listener_count("vehicle_positions"), 3);
    assert_eq!(ids(&index.query_near(10.0, 122.0, 100.0).expect("should query")), vec!["a"]);

    put(&store, "b", 10.0001, 122.0001).await;
    assert_eq!(index.len(), 2);

    drop(second);
    assert!(index.is_empty());
    assert_eq!(store.listener_count("vehicle_positions"), 0);
}

// Should find vehicles across the antimeridian.
#[tokio::test]
async fn query_across_antimeridian() {
    let store = MemoryStore::new();
    let index = index();
    let _subscription = index.subscribe(Arc::new(store.clone()), ()).expect("should subscribe");

    put(&store, "east", 0.0, 179.9999).await;
    let nearby = index.query_near(0.0, -179.9999, 100.0).expect("should query");
    assert_eq!(ids(&nearby), vec!["east"]);
}

// Should reject queries with invalid coordinates or radius.
#[test]
fn invalid_queries() {
    let index = index();

    let err = index.query_near(91.0, 0.0, 10.0).expect_err("should reject latitude");
    assert!(matches!(err, Error::InvalidCoordinates(_)));
    let err = index.query_near(0.0, 181.0, 10.0).expect_err("should reject longitude");
    assert!(matches!(err, Error::InvalidCoordinates(_)));
    let err = index.query_near(0.0, 0.0, -1.0).expect_err("should reject radius");
    assert!(matches!(err, Error::InvalidCoordinates(_)));
}
