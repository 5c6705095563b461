use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;

use super::lock;
use crate::position::Fix;
use crate::provider::{
    FixCallback, Geolocation, Permission, PermissionKind, PositionError, PositionErrorCallback,
    WatchId, WatchOptions,
};

/// Watch lifecycle entries, in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    Started(WatchId),
    Cleared(WatchId),
}

/// A geolocation device whose fixes and failures are driven by the caller.
#[derive(Clone)]
pub struct MemoryGeolocation {
    inner: Arc<Inner>,
}

struct Inner {
    permission: Mutex<Permission>,
    prompts: AtomicUsize,
    next_watch: AtomicU64,
    watches: Mutex<BTreeMap<WatchId, Watch>>,
    journal: Mutex<Vec<WatchEvent>>,
}

#[derive(Clone)]
struct Watch {
    options: WatchOptions,
    on_fix: FixCallback,
    on_error: PositionErrorCallback,
}

impl Default for MemoryGeolocation {
    fn default() -> Self {
        Self::new(Permission::Granted)
    }
}

impl MemoryGeolocation {
    /// A device that answers permission prompts with `permission`.
    #[must_use]
    pub fn new(permission: Permission) -> Self {
        Self {
            inner: Arc::new(Inner {
                permission: Mutex::new(permission),
                prompts: AtomicUsize::new(0),
                next_watch: AtomicU64::new(1),
                watches: Mutex::new(BTreeMap::new()),
                journal: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Change the answer to future permission prompts.
    pub fn set_permission(&self, permission: Permission) {
        *lock(&self.inner.permission) = permission;
    }

    /// Number of times the user has been prompted.
    #[must_use]
    pub fn prompts(&self) -> usize {
        self.inner.prompts.load(Ordering::SeqCst)
    }

    /// Deliver a fix to every active watch. Returns the number of watches
    /// that received it.
    pub fn emit(&self, fix: Fix) -> usize {
        let watches = self.snapshot();
        for watch in &watches {
            (watch.on_fix)(fix);
        }
        watches.len()
    }

    /// Deliver a failure to every active watch.
    pub fn fail(&self, error: &PositionError) -> usize {
        let watches = self.snapshot();
        for watch in &watches {
            (watch.on_error)(error.clone());
        }
        watches.len()
    }

    #[must_use]
    pub fn active_watches(&self) -> usize {
        lock(&self.inner.watches).len()
    }

    /// Options of the most recently started, still active watch.
    #[must_use]
    pub fn last_options(&self) -> Option<WatchOptions> {
        lock(&self.inner.watches).values().next_back().map(|watch| watch.options)
    }

    #[must_use]
    pub fn journal(&self) -> Vec<WatchEvent> {
        lock(&self.inner.journal).clone()
    }

    // callbacks run outside the lock so they may clear their own watch
    fn snapshot(&self) -> Vec<Watch> {
        lock(&self.inner.watches).values().cloned().collect()
    }
}

impl Geolocation for MemoryGeolocation {
    async fn request_permission(&self, _kind: PermissionKind) -> Result<Permission> {
        self.inner.prompts.fetch_add(1, Ordering::SeqCst);
        Ok(*lock(&self.inner.permission))
    }

    fn watch_position(
        &self, options: &WatchOptions, on_fix: FixCallback, on_error: PositionErrorCallback,
    ) -> Result<WatchId> {
        let id = WatchId(self.inner.next_watch.fetch_add(1, Ordering::SeqCst));
        lock(&self.inner.watches).insert(id, Watch { options: *options, on_fix, on_error });
        lock(&self.inner.journal).push(WatchEvent::Started(id));
        Ok(id)
    }

    fn clear_watch(&self, watch: WatchId) {
        if lock(&self.inner.watches).remove(&watch).is_some() {
            lock(&self.inner.journal).push(WatchEvent::Cleared(watch));
        }
    }
}
