use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::debug;

use super::lock;
use crate::provider::{DocumentStore, EventCallback, EventKind, ListenerId, StoreEvent};

/// Path-keyed document store with a change feed.
///
/// Records live at leaf paths (`vehicle_positions/v1`). A collection is the
/// set of records one segment below it: reading `vehicle_positions` yields an
/// object keyed by child name, and child listeners registered there see each
/// record added, changed or removed.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    records: DashMap<String, Value>,
    listeners: Mutex<Vec<Listener>>,
    next_listener: AtomicU64,
    offline: AtomicBool,
}

struct Listener {
    id: ListenerId,
    path: String,
    kind: EventKind,
    callback: EventCallback,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every write until switched back online.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of listeners registered at `path`.
    #[must_use]
    pub fn listener_count(&self, path: &str) -> usize {
        let path = path.trim_matches('/');
        lock(&self.inner.listeners).iter().filter(|l| l.path == path).count()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    fn check_online(&self) -> Result<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            bail!("store unavailable: offline");
        }
        Ok(())
    }

    fn value_at(&self, path: &str) -> Option<Value> {
        let exact = self.inner.records.get(path).map(|entry| entry.value().clone());
        if exact.is_some() {
            return exact;
        }
        let children = self.children(path);
        if children.is_empty() {
            return None;
        }
        Some(Value::Object(children.into_iter().collect::<Map<_, _>>()))
    }

    fn children(&self, path: &str) -> BTreeMap<String, Value> {
        self.inner
            .records
            .iter()
            .filter_map(|entry| {
                let rest = entry.key().strip_prefix(path)?.strip_prefix('/')?;
                (!rest.contains('/')).then(|| (rest.to_string(), entry.value().clone()))
            })
            .collect()
    }

    // Commit a write and notify listeners once the change is visible.
    fn apply(&self, path: &str, next: Option<Value>) {
        let previous = match &next {
            Some(value) => self.inner.records.insert(path.to_string(), value.clone()),
            None => self.inner.records.remove(path).map(|(_, value)| value),
        };
        if previous == next {
            return;
        }

        let parent = path.rsplit_once('/');
        let child_event = parent.map(|(_, key)| {
            let key = key.to_string();
            match (&previous, &next) {
                (None, Some(value)) => StoreEvent::ChildAdded { key, value: value.clone() },
                (Some(_), Some(value)) => StoreEvent::ChildChanged { key, value: value.clone() },
                _ => StoreEvent::ChildRemoved { key },
            }
        });

        let mut pending = Vec::new();
        {
            let listeners = lock(&self.inner.listeners);
            for listener in listeners.iter() {
                if listener.path == path && listener.kind == EventKind::Value {
                    pending.push((Arc::clone(&listener.callback), StoreEvent::Value(next.clone())));
                    continue;
                }
                let Some((parent_path, _)) = parent else { continue };
                if listener.path != parent_path {
                    continue;
                }
                if listener.kind == EventKind::Value {
                    let collection = self.value_at(parent_path);
                    pending.push((Arc::clone(&listener.callback), StoreEvent::Value(collection)));
                } else if let Some(event) =
                    child_event.as_ref().filter(|event| event.kind() == listener.kind)
                {
                    pending.push((Arc::clone(&listener.callback), event.clone()));
                }
            }
        }

        for (callback, event) in pending {
            callback(event);
        }
    }
}

fn normalize(path: &str) -> Result<String> {
    let path = path.trim_matches('/');
    if path.is_empty() || path.split('/').any(str::is_empty) {
        return Err(anyhow!("invalid store path: {path:?}"));
    }
    Ok(path.to_string())
}

impl DocumentStore for MemoryStore {
    async fn set(&self, path: &str, value: &Value) -> Result<()> {
        let path = normalize(path)?;
        self.check_online()?;
        if value.is_null() {
            self.apply(&path, None);
        } else {
            self.apply(&path, Some(value.clone()));
        }
        Ok(())
    }

    async fn update(&self, path: &str, partial: &Value) -> Result<()> {
        let path = normalize(path)?;
        self.check_online()?;
        let Value::Object(fields) = partial else {
            bail!("update at {path} requires an object");
        };

        let mut merged = match self.inner.records.get(&path).map(|entry| entry.value().clone()) {
            Some(Value::Object(existing)) => existing,
            _ => Map::new(),
        };
        for (key, value) in fields {
            if value.is_null() {
                merged.remove(key);
            } else {
                merged.insert(key.clone(), value.clone());
            }
        }

        let next = (!merged.is_empty()).then_some(Value::Object(merged));
        self.apply(&path, next);
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let path = normalize(path)?;
        self.check_online()?;
        self.apply(&path, None);
        Ok(())
    }

    async fn once(&self, path: &str) -> Result<Option<Value>> {
        let path = normalize(path)?;
        Ok(self.value_at(&path))
    }

    fn on(&self, path: &str, kind: EventKind, callback: EventCallback) -> Result<ListenerId> {
        let path = normalize(path)?;
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::SeqCst));

        lock(&self.inner.listeners).push(Listener {
            id,
            path: path.clone(),
            kind,
            callback: Arc::clone(&callback),
        });
        debug!(path = %path, ?kind, listener = id.0, "listener attached");

        // initial delivery mirrors a realtime database: current value, or one
        // child_added per existing child
        match kind {
            EventKind::Value => callback(StoreEvent::Value(self.value_at(&path))),
            EventKind::ChildAdded => {
                for (key, value) in self.children(&path) {
                    callback(StoreEvent::ChildAdded { key, value });
                }
            }
            EventKind::ChildChanged | EventKind::ChildRemoved => {}
        }

        Ok(id)
    }

    fn off(&self, path: &str, listener: ListenerId) {
        let path = path.trim_matches('/');
        let mut listeners = lock(&self.inner.listeners);
        let before = listeners.len();
        listeners.retain(|l| !(l.id == listener && l.path == path));
        if listeners.len() < before {
            debug!(path = %path, listener = listener.0, "listener detached");
        }
    }
}
