//! Admission control: per-sender sliding-window rate limiting plus a bounded pool
//! of processing slots.
//!
//! Rate bookkeeping lives behind a `std::sync::Mutex` that is never held across an
//! await. Bookkeeping failures fail open; slot failures fail closed.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::{Duration, Instant},
};

use huddle_core::config::AdmissionConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const RATE_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(300);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionSettings {
    pub max_concurrent_requests: usize,
    pub max_requests_per_minute: usize,
    pub cleanup_interval: Duration,
    pub slot_timeout: Duration,
    pub retention: Duration,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            max_requests_per_minute: 60,
            cleanup_interval: Duration::from_secs(300),
            slot_timeout: Duration::from_secs(1),
            retention: DEFAULT_RETENTION,
        }
    }
}

impl From<&AdmissionConfig> for AdmissionSettings {
    fn from(config: &AdmissionConfig) -> Self {
        Self {
            max_concurrent_requests: config.max_concurrent_requests,
            max_requests_per_minute: config.max_requests_per_minute,
            cleanup_interval: config.cleanup_interval(),
            slot_timeout: config.slot_timeout(),
            retention: DEFAULT_RETENTION,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionMetrics {
    pub active_requests: usize,
    pub active_slots: usize,
    pub max_slots: usize,
    pub tracked_senders: usize,
    pub admitted_total: u64,
    pub rate_limited_total: u64,
    pub busy_total: u64,
}

/// Timestamps of one sender's recent requests.
#[derive(Debug)]
struct RateWindow {
    hits: VecDeque<Instant>,
    last_activity: Instant,
}

impl RateWindow {
    fn new(now: Instant, capacity: usize) -> Self {
        Self { hits: VecDeque::with_capacity(capacity.min(1_024)), last_activity: now }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.hits.front() {
            if now.saturating_duration_since(*oldest) >= RATE_WINDOW {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }
}

#[derive(Debug)]
struct GovernorState {
    windows: HashMap<String, RateWindow>,
    active: HashSet<Uuid>,
    last_cleanup: Instant,
}

#[derive(Debug, Default)]
struct Counters {
    admitted: AtomicU64,
    rate_limited: AtomicU64,
    busy: AtomicU64,
}

pub struct AdmissionGovernor {
    settings: AdmissionSettings,
    state: Arc<Mutex<GovernorState>>,
    slots: Arc<Semaphore>,
    counters: Counters,
}

/// Tracking handle for one admitted request.
///
/// Removed from the active set exactly once: by `remove_request` or on drop.
#[derive(Debug)]
pub struct RequestToken {
    id: Uuid,
    state: Arc<Mutex<GovernorState>>,
}

impl RequestToken {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for RequestToken {
    fn drop(&mut self) {
        let mut state = lock_recovering(&self.state);
        state.active.remove(&self.id);
    }
}

/// A held processing slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct SlotPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGovernor {
    pub fn new(settings: AdmissionSettings) -> Self {
        Self::new_at(settings, Instant::now())
    }

    fn new_at(settings: AdmissionSettings, now: Instant) -> Self {
        let slots = Arc::new(Semaphore::new(settings.max_concurrent_requests));
        Self {
            state: Arc::new(Mutex::new(GovernorState {
                windows: HashMap::new(),
                active: HashSet::new(),
                last_cleanup: now,
            })),
            slots,
            settings,
            counters: Counters::default(),
        }
    }

    pub fn settings(&self) -> &AdmissionSettings {
        &self.settings
    }

    /// Returns `true` when the sender is over the limit. Allowed requests are
    /// recorded in the sender's window.
    pub fn check_rate_limit(&self, sender_id: &str) -> bool {
        self.check_rate_limit_at(sender_id, Instant::now())
    }

    pub fn check_rate_limit_at(&self, sender_id: &str, now: Instant) -> bool {
        let Ok(mut state) = self.state.lock() else {
            warn!(
                event_name = "admission.rate.bookkeeping_failed",
                sender_id,
                "rate window lock poisoned; admitting request"
            );
            return false;
        };

        if now.saturating_duration_since(state.last_cleanup) >= self.settings.cleanup_interval {
            let removed = sweep(&mut state, now, self.settings.retention);
            state.last_cleanup = now;
            if removed > 0 {
                debug!(event_name = "admission.cleanup", removed, "dropped idle rate windows");
            }
        }

        let max = self.settings.max_requests_per_minute;
        let window = state
            .windows
            .entry(sender_id.to_string())
            .or_insert_with(|| RateWindow::new(now, max));
        window.prune(now);
        window.last_activity = now;

        if window.hits.len() >= max {
            drop(state);
            self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
            info!(
                event_name = "admission.rate.limited",
                sender_id,
                limit = max,
                "sender exceeded request rate"
            );
            return true;
        }

        window.hits.push_back(now);
        false
    }

    pub fn add_request(&self, sender_id: &str) -> RequestToken {
        let id = Uuid::new_v4();
        lock_recovering(&self.state).active.insert(id);
        self.counters.admitted.fetch_add(1, Ordering::Relaxed);
        debug!(event_name = "admission.request.added", sender_id, request_id = %id, "request tracked");
        RequestToken { id, state: self.state.clone() }
    }

    pub fn remove_request(&self, token: RequestToken) {
        drop(token);
    }

    /// Waits at most `timeout` for a free slot.
    pub async fn acquire_slot(&self, timeout: Duration) -> Option<SlotPermit> {
        match tokio::time::timeout(timeout, self.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Some(SlotPermit { _permit: permit }),
            Ok(Err(_closed)) => {
                self.counters.busy.fetch_add(1, Ordering::Relaxed);
                warn!(event_name = "admission.slot.closed", "slot pool closed; treating as busy");
                None
            }
            Err(_elapsed) => {
                self.counters.busy.fetch_add(1, Ordering::Relaxed);
                info!(
                    event_name = "admission.slot.timeout",
                    timeout_ms = timeout.as_millis() as u64,
                    "no processing slot became free"
                );
                None
            }
        }
    }

    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    pub fn cleanup_at(&self, now: Instant) -> usize {
        let mut state = lock_recovering(&self.state);
        let removed = sweep(&mut state, now, self.settings.retention);
        state.last_cleanup = now;
        removed
    }

    pub fn active_requests(&self) -> usize {
        lock_recovering(&self.state).active.len()
    }

    pub fn metrics(&self) -> AdmissionMetrics {
        let (active_requests, tracked_senders) = {
            let state = lock_recovering(&self.state);
            (state.active.len(), state.windows.len())
        };
        let max_slots = self.settings.max_concurrent_requests;
        AdmissionMetrics {
            active_requests,
            active_slots: max_slots.saturating_sub(self.slots.available_permits()),
            max_slots,
            tracked_senders,
            admitted_total: self.counters.admitted.load(Ordering::Relaxed),
            rate_limited_total: self.counters.rate_limited.load(Ordering::Relaxed),
            busy_total: self.counters.busy.load(Ordering::Relaxed),
        }
    }
}

/// Drops windows that are empty after pruning and idle past `retention`.
fn sweep(state: &mut GovernorState, now: Instant, retention: Duration) -> usize {
    let before = state.windows.len();
    state.windows.retain(|_, window| {
        window.prune(now);
        !window.hits.is_empty() || now.saturating_duration_since(window.last_activity) < retention
    });
    before - state.windows.len()
}

// Release paths must run even after a panic elsewhere poisoned the lock.
fn lock_recovering(state: &Mutex<GovernorState>) -> MutexGuard<'_, GovernorState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
