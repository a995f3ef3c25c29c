//! Tracker registry and the tracking-client abstraction it drives.

pub mod fields;
pub mod hit;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::codec::{StringMap, WireValue};
use crate::error::{external_failure, not_initialized, BridgeError, BridgeErrorCode, BridgeResult};
use crate::logger::LogLevel;

pub(crate) const TRACKER_NOT_INITIALIZED: &str =
    "Tracker not initialized. Call setTrackingId prior to using tracker.";

/// One configured destination owned by the native SDK.
pub trait TrackerHandle: Send + Sync {
    /// Destination id, when the SDK can report it.
    fn tracking_id(&self) -> Option<String>;
    fn get(&self, key: &str) -> Option<String>;
    /// `None` clears the property.
    fn set(&self, key: &str, value: Option<&str>);
    /// Queues a hit. Queued hits leave the device on the SDK's own schedule.
    fn send(&self, hit: &StringMap) -> BridgeResult<()>;
    fn set_exception_reporting(&self, enabled: bool);
    fn set_advertising_id_collection(&self, enabled: bool);
}

/// Process-wide entry point of the native tracking SDK.
#[async_trait]
pub trait AnalyticsClient: Send + Sync {
    fn create_tracker(&self, tracking_id: &str) -> BridgeResult<Arc<dyn TrackerHandle>>;
    fn close_tracker(&self, tracker: &dyn TrackerHandle);
    /// Flushes locally queued hits.
    async fn dispatch_local_hits(&self) -> BridgeResult<()>;
    fn set_dispatch_interval(&self, interval: Duration);
    fn set_log_level(&self, level: LogLevel);
    fn set_app_opt_out(&self, opt_out: bool);
    fn app_opt_out(&self) -> bool;
}

/// Result of a `get` across the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackerValue {
    Single(Option<String>),
    /// `(destination id, value)` in registration order.
    PerTracker(Vec<(String, Option<String>)>),
}

impl TrackerValue {
    /// A single value encodes as a string or null, several as `[[id, value], ...]`.
    pub fn to_wire(&self) -> WireValue {
        fn optional(value: &Option<String>) -> JsonValue {
            value.clone().map(JsonValue::String).unwrap_or(JsonValue::Null)
        }
        match self {
            TrackerValue::Single(value) => optional(value),
            TrackerValue::PerTracker(pairs) => JsonValue::Array(
                pairs
                    .iter()
                    .map(|(id, value)| JsonValue::Array(vec![JsonValue::String(id.clone()), optional(value)]))
                    .collect(),
            ),
        }
    }
}

/// How the live trackers were registered. Decides the shape of [`TrackerRegistry::get`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TrackerMode {
    /// Registered with `setTrackingId`; at most one tracker.
    #[default]
    Single,
    /// Registered with `setTrackingIds`; answers are per-tracker pairs even for one id.
    Multi,
}

#[derive(Default)]
struct TrackerSet {
    mode: TrackerMode,
    trackers: Vec<Arc<dyn TrackerHandle>>,
}

/// Owns the live trackers, in creation order.
///
/// Replacement happens under the write lock, so readers observe either the old set or the
/// complete new one. The client is never called while the lock is held, so a panicking SDK
/// call cannot leave the registry poisoned.
pub struct TrackerRegistry {
    client: Arc<dyn AnalyticsClient>,
    trackers: RwLock<TrackerSet>,
    report_uncaught_exceptions: bool,
    advertising_id_collection: AtomicBool,
}

impl fmt::Debug for TrackerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerRegistry")
            .field("mode", &self.mode())
            .field("trackers", &self.tracking_ids())
            .field(
                "advertising_id_collection",
                &self.advertising_id_collection.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl TrackerRegistry {
    pub fn new(client: Arc<dyn AnalyticsClient>, report_uncaught_exceptions: bool) -> Self {
        Self {
            client,
            trackers: RwLock::new(TrackerSet::default()),
            report_uncaught_exceptions,
            advertising_id_collection: AtomicBool::new(false),
        }
    }

    pub fn client(&self) -> &Arc<dyn AnalyticsClient> {
        &self.client
    }

    pub fn len(&self) -> usize {
        self.read().trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_initialized(&self) -> bool {
        !self.is_empty()
    }

    pub fn mode(&self) -> TrackerMode {
        self.read().mode
    }

    /// Destination ids of the live trackers, skipping those the SDK cannot name.
    pub fn tracking_ids(&self) -> Vec<String> {
        self.read()
            .trackers
            .iter()
            .filter_map(|tracker| tracker.tracking_id())
            .collect()
    }

    /// Replaces the live trackers with a single one.
    pub fn set_tracking_id(&self, id: &str) -> BridgeResult<()> {
        self.replace(TrackerMode::Single, &[id])
    }

    /// Replaces the live trackers with one per id, in order, and switches to per-tracker answers.
    pub fn set_tracking_ids<S: AsRef<str>>(&self, ids: &[S]) -> BridgeResult<()> {
        self.replace(TrackerMode::Multi, ids)
    }

    /// Creates the new trackers, swaps them in, then closes the previous ones.
    ///
    /// The first tracker becomes the uncaught-exception reporter; the SDK accepts only one. If
    /// the client fails to create a tracker, the ones created so far are closed, the previous
    /// trackers are closed as well and the registry is left empty.
    fn replace<S: AsRef<str>>(&self, mode: TrackerMode, ids: &[S]) -> BridgeResult<()> {
        let advertising = self.advertising_id_collection.load(Ordering::SeqCst);
        let mut created: Vec<Arc<dyn TrackerHandle>> = Vec::with_capacity(ids.len());
        for id in ids {
            match self.client.create_tracker(id.as_ref()) {
                Ok(tracker) => {
                    if advertising {
                        tracker.set_advertising_id_collection(true);
                    }
                    created.push(tracker);
                }
                Err(err) => {
                    for tracker in created {
                        self.client.close_tracker(tracker.as_ref());
                    }
                    self.release(self.swap(TrackerSet::default()));
                    return Err(err);
                }
            }
        }

        let first = created.first().cloned();
        let count = created.len();
        self.release(self.swap(TrackerSet { mode, trackers: created }));
        if self.report_uncaught_exceptions {
            if let Some(first) = first {
                first.set_exception_reporting(true);
            }
        }
        log::debug!("tracker registry now holds {count} tracker(s) in {mode:?} mode");
        Ok(())
    }

    /// A single value in single-tracker mode, `(id, value)` pairs in multi-tracker mode.
    pub fn get(&self, key: &str) -> BridgeResult<TrackerValue> {
        let (mode, trackers) = self.snapshot()?;
        if mode == TrackerMode::Single {
            return Ok(TrackerValue::Single(trackers[0].get(key)));
        }
        let pairs = trackers
            .iter()
            .filter_map(|tracker| tracker.tracking_id().map(|id| (id, tracker.get(key))))
            .collect();
        Ok(TrackerValue::PerTracker(pairs))
    }

    pub fn set(&self, key: &str, value: Option<&str>) -> BridgeResult<()> {
        let (_, trackers) = self.snapshot()?;
        for tracker in trackers {
            tracker.set(key, value);
        }
        Ok(())
    }

    /// Sends the hit through every tracker. All trackers are attempted; the first failure is
    /// returned.
    pub fn send(&self, hit: &StringMap) -> BridgeResult<()> {
        let (_, trackers) = self.snapshot()?;
        let mut first_error: Option<BridgeError> = None;
        for tracker in trackers {
            if let Err(err) = tracker.send(hit) {
                log::error!("tracker {:?} rejected hit: {err}", tracker.tracking_id());
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Detaches every tracker, flushes queued hits, then releases the handles.
    ///
    /// Handles are released even when the flush fails; the flush error is returned afterwards.
    pub async fn close(&self) -> BridgeResult<()> {
        let detached = {
            let mut set = self.write();
            if set.trackers.is_empty() {
                return Err(not_initialized(TRACKER_NOT_INITIALIZED));
            }
            std::mem::take(&mut *set)
        };

        let flushed = self.client.dispatch_local_hits().await;
        self.release(detached);
        flushed.map_err(|err| match err.code {
            BridgeErrorCode::ExternalSdkFailure => err,
            _ => external_failure(err.message()),
        })
    }

    pub fn set_log_level(&self, level: LogLevel) {
        self.client.set_log_level(level);
    }

    pub fn set_dispatch_interval(&self, interval: Duration) {
        self.client.set_dispatch_interval(interval);
    }

    /// Remembered for trackers created later.
    pub fn set_advertising_id_collection(&self, enabled: bool) {
        self.advertising_id_collection.store(enabled, Ordering::SeqCst);
        let trackers = self.read().trackers.clone();
        for tracker in trackers {
            tracker.set_advertising_id_collection(enabled);
        }
    }

    pub fn advertising_id_collection(&self) -> bool {
        self.advertising_id_collection.load(Ordering::SeqCst)
    }

    pub fn set_app_opt_out(&self, opt_out: bool) {
        self.client.set_app_opt_out(opt_out);
    }

    pub fn app_opt_out(&self) -> bool {
        self.client.app_opt_out()
    }

    fn snapshot(&self) -> BridgeResult<(TrackerMode, Vec<Arc<dyn TrackerHandle>>)> {
        let set = self.read();
        if set.trackers.is_empty() {
            return Err(not_initialized(TRACKER_NOT_INITIALIZED));
        }
        Ok((set.mode, set.trackers.clone()))
    }

    fn swap(&self, next: TrackerSet) -> TrackerSet {
        std::mem::replace(&mut *self.write(), next)
    }

    fn release(&self, previous: TrackerSet) {
        for tracker in previous.trackers {
            self.client.close_tracker(tracker.as_ref());
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TrackerSet> {
        self.trackers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TrackerSet> {
        self.trackers.write().unwrap_or_else(PoisonError::into_inner)
    }
}
