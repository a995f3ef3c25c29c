//! In-memory collaborators.
//!
//! These stand in for the native SDK on desktop builds and in tests. They keep everything they
//! receive so callers can inspect it afterwards.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use crate::codec::{NativeValue, StringMap, ValueMap};
use crate::container::{ContainerHandle, ContainerLoader};
use crate::data_layer::{DataLayerStore, EVENT_KEY};
use crate::error::{external_failure, BridgeResult};
use crate::logger::LogLevel;
use crate::tracker::fields;
use crate::tracker::{AnalyticsClient, TrackerHandle};

const BOOLEAN_TRUTHY_VALUES: [&str; 6] = ["1", "true", "t", "yes", "y", "on"];

/// A hit as the tracker queued it, after merging the tracker's own properties.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedHit {
    pub tracking_id: String,
    pub params: BTreeMap<String, String>,
    pub queued_at: DateTime<Utc>,
}

#[derive(Default)]
struct ClientState {
    created: Vec<String>,
    closed: Vec<String>,
    exception_reporters: Vec<String>,
    advertising: Vec<String>,
    queued: Vec<RecordedHit>,
    dispatched: Vec<RecordedHit>,
    rejected_ids: HashSet<String>,
    panicking_ids: HashSet<String>,
    fail_next_dispatch: Option<String>,
    log_level: Option<LogLevel>,
    dispatch_interval: Option<Duration>,
}

#[derive(Default)]
pub struct InMemoryAnalyticsClient {
    state: Arc<Mutex<ClientState>>,
    opt_out: Arc<AtomicBool>,
}

impl InMemoryAnalyticsClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `create_tracker` fail for `tracking_id`.
    pub fn reject_tracking_id(&self, tracking_id: impl Into<String>) {
        self.state.lock().unwrap().rejected_ids.insert(tracking_id.into());
    }

    /// Makes `create_tracker` panic for `tracking_id`, the way a misbehaving SDK would.
    pub fn panic_on_tracking_id(&self, tracking_id: impl Into<String>) {
        self.state.lock().unwrap().panicking_ids.insert(tracking_id.into());
    }

    /// Makes the next flush fail with `message`.
    pub fn fail_next_dispatch(&self, message: impl Into<String>) {
        self.state.lock().unwrap().fail_next_dispatch = Some(message.into());
    }

    pub fn created_trackers(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn closed_trackers(&self) -> Vec<String> {
        self.state.lock().unwrap().closed.clone()
    }

    pub fn exception_reporters(&self) -> Vec<String> {
        self.state.lock().unwrap().exception_reporters.clone()
    }

    pub fn advertising_trackers(&self) -> Vec<String> {
        self.state.lock().unwrap().advertising.clone()
    }

    pub fn queued_hits(&self) -> Vec<RecordedHit> {
        self.state.lock().unwrap().queued.clone()
    }

    pub fn dispatched_hits(&self) -> Vec<RecordedHit> {
        self.state.lock().unwrap().dispatched.clone()
    }

    pub fn log_level(&self) -> Option<LogLevel> {
        self.state.lock().unwrap().log_level
    }

    pub fn dispatch_interval(&self) -> Option<Duration> {
        self.state.lock().unwrap().dispatch_interval
    }
}

#[async_trait]
impl AnalyticsClient for InMemoryAnalyticsClient {
    fn create_tracker(&self, tracking_id: &str) -> BridgeResult<Arc<dyn TrackerHandle>> {
        if self.state.lock().unwrap().panicking_ids.contains(tracking_id) {
            panic!("tracker `{tracking_id}` could not be constructed");
        }
        let mut state = self.state.lock().unwrap();
        if tracking_id.trim().is_empty() || state.rejected_ids.contains(tracking_id) {
            return Err(external_failure(format!("invalid tracking id `{tracking_id}`")));
        }
        state.created.push(tracking_id.to_string());
        Ok(Arc::new(InMemoryTracker::new(
            tracking_id,
            self.state.clone(),
            self.opt_out.clone(),
        )))
    }

    fn close_tracker(&self, tracker: &dyn TrackerHandle) {
        let mut state = self.state.lock().unwrap();
        if let Some(id) = tracker.tracking_id() {
            state.exception_reporters.retain(|reporter| reporter != &id);
            state.closed.push(id);
        }
    }

    async fn dispatch_local_hits(&self) -> BridgeResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_next_dispatch.take() {
            return Err(external_failure(message));
        }
        let queued = std::mem::take(&mut state.queued);
        state.dispatched.extend(queued);
        Ok(())
    }

    fn set_dispatch_interval(&self, interval: Duration) {
        self.state.lock().unwrap().dispatch_interval = Some(interval);
    }

    fn set_log_level(&self, level: LogLevel) {
        self.state.lock().unwrap().log_level = Some(level);
    }

    fn set_app_opt_out(&self, opt_out: bool) {
        self.opt_out.store(opt_out, Ordering::SeqCst);
    }

    fn app_opt_out(&self) -> bool {
        self.opt_out.load(Ordering::SeqCst)
    }
}

/// Tracker created by [`InMemoryAnalyticsClient`]. Starts with `&tid` and a random `&cid`.
pub struct InMemoryTracker {
    tracking_id: String,
    properties: Mutex<BTreeMap<String, String>>,
    client: Arc<Mutex<ClientState>>,
    opt_out: Arc<AtomicBool>,
}

impl InMemoryTracker {
    fn new(tracking_id: &str, client: Arc<Mutex<ClientState>>, opt_out: Arc<AtomicBool>) -> Self {
        let properties = BTreeMap::from([
            (fields::TRACKING_ID.to_string(), tracking_id.to_string()),
            (fields::CLIENT_ID.to_string(), generate_client_id()),
        ]);
        Self {
            tracking_id: tracking_id.to_string(),
            properties: Mutex::new(properties),
            client,
            opt_out,
        }
    }
}

impl TrackerHandle for InMemoryTracker {
    fn tracking_id(&self) -> Option<String> {
        Some(self.tracking_id.clone())
    }

    fn get(&self, key: &str) -> Option<String> {
        self.properties.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: Option<&str>) {
        let mut properties = self.properties.lock().unwrap();
        match value {
            Some(value) => {
                properties.insert(key.to_string(), value.to_string());
            }
            None => {
                properties.remove(key);
            }
        }
    }

    fn send(&self, hit: &StringMap) -> BridgeResult<()> {
        if self.opt_out.load(Ordering::SeqCst) {
            log::debug!("app opted out; dropping hit for {}", self.tracking_id);
            return Ok(());
        }
        let mut params = self.properties.lock().unwrap().clone();
        for (key, value) in hit {
            match value {
                Some(value) => {
                    params.insert(key.clone(), value.clone());
                }
                None => {
                    params.remove(key);
                }
            }
        }
        self.client.lock().unwrap().queued.push(RecordedHit {
            tracking_id: self.tracking_id.clone(),
            params,
            queued_at: Utc::now(),
        });
        Ok(())
    }

    fn set_exception_reporting(&self, enabled: bool) {
        let mut state = self.client.lock().unwrap();
        state.exception_reporters.retain(|id| id != &self.tracking_id);
        if enabled {
            state.exception_reporters.push(self.tracking_id.clone());
        }
    }

    fn set_advertising_id_collection(&self, enabled: bool) {
        let mut state = self.client.lock().unwrap();
        state.advertising.retain(|id| id != &self.tracking_id);
        if enabled {
            state.advertising.push(self.tracking_id.clone());
        }
    }
}

fn generate_client_id() -> String {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .take(32)
        .collect()
}

/// Container served by [`InMemoryContainerLoader`].
pub struct InMemoryContainer {
    container_id: String,
    values: Mutex<ValueMap>,
    refreshes: AtomicUsize,
}

impl InMemoryContainer {
    pub fn new(container_id: impl Into<String>, values: ValueMap) -> Self {
        Self {
            container_id: container_id.into(),
            values: Mutex::new(values),
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    fn value(&self, key: &str) -> Option<NativeValue> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl ContainerHandle for InMemoryContainer {
    fn container_id(&self) -> String {
        self.container_id.clone()
    }

    fn get_string(&self, key: &str) -> String {
        match self.value(key) {
            None | Some(NativeValue::Null) => String::new(),
            Some(NativeValue::String(text)) | Some(NativeValue::Opaque(text)) => text,
            Some(other) => other.to_wire().to_string(),
        }
    }

    fn get_bool(&self, key: &str) -> bool {
        match self.value(key) {
            Some(NativeValue::Bool(flag)) => flag,
            Some(NativeValue::Int(number)) => number != 0,
            Some(NativeValue::String(text)) => BOOLEAN_TRUTHY_VALUES
                .iter()
                .any(|truthy| text.eq_ignore_ascii_case(truthy)),
            _ => false,
        }
    }

    fn get_long(&self, key: &str) -> i64 {
        match self.value(key) {
            Some(NativeValue::Int(number)) => number,
            Some(NativeValue::Double(number)) if number.is_finite() => number as i64,
            Some(NativeValue::String(text)) => text.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    fn get_double(&self, key: &str) -> f64 {
        match self.value(key) {
            Some(NativeValue::Double(number)) => number,
            Some(NativeValue::Int(number)) => number as f64,
            Some(NativeValue::String(text)) => text.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    async fn refresh(&self) -> BridgeResult<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Loads containers registered with [`InMemoryContainerLoader::insert_container`]; unknown ids
/// fail. Loads can be held back with [`pause`](Self::pause) or, per container, with
/// [`pause_container`](Self::pause_container) to observe the loading state.
#[derive(Default)]
pub struct InMemoryContainerLoader {
    templates: Mutex<HashMap<String, ValueMap>>,
    opened: Mutex<HashMap<String, Arc<InMemoryContainer>>>,
    paused: AtomicBool,
    held: Mutex<HashSet<String>>,
    resume: Notify,
}

impl InMemoryContainerLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_container(&self, container_id: impl Into<String>, values: ValueMap) {
        self.templates.lock().unwrap().insert(container_id.into(), values);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.resume.notify_waiters();
    }

    /// Holds back loads of one container only.
    pub fn pause_container(&self, container_id: impl Into<String>) {
        self.held.lock().unwrap().insert(container_id.into());
    }

    pub fn resume_container(&self, container_id: &str) {
        self.held.lock().unwrap().remove(container_id);
        self.resume.notify_waiters();
    }

    fn is_held(&self, container_id: &str) -> bool {
        self.paused.load(Ordering::SeqCst) || self.held.lock().unwrap().contains(container_id)
    }

    /// Refreshes seen by the most recently opened container with this id.
    pub fn refresh_count(&self, container_id: &str) -> usize {
        self.opened
            .lock()
            .unwrap()
            .get(container_id)
            .map(|container| container.refresh_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ContainerLoader for InMemoryContainerLoader {
    async fn open(&self, container_id: &str) -> BridgeResult<Arc<dyn ContainerHandle>> {
        loop {
            let resumed = self.resume.notified();
            if !self.is_held(container_id) {
                break;
            }
            resumed.await;
        }

        let values = self.templates.lock().unwrap().get(container_id).cloned();
        let Some(values) = values else {
            return Err(external_failure(format!("container `{container_id}` is not available")));
        };
        let container = Arc::new(InMemoryContainer::new(container_id, values));
        self.opened
            .lock()
            .unwrap()
            .insert(container_id.to_string(), container.clone());
        Ok(container)
    }
}

#[derive(Default)]
struct DataLayerState {
    values: ValueMap,
    events: Vec<String>,
}

/// Data layer with recursive merge: nested maps merge key by key, every other value replaces.
#[derive(Default)]
pub struct InMemoryDataLayer {
    state: Mutex<DataLayerState>,
}

impl InMemoryDataLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ValueMap {
        self.state.lock().unwrap().values.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }
}

impl DataLayerStore for InMemoryDataLayer {
    fn push(&self, update: ValueMap) -> BridgeResult<()> {
        merge_into(&mut self.state.lock().unwrap().values, update);
        Ok(())
    }

    fn push_event(&self, event: &str, update: ValueMap) -> BridgeResult<()> {
        let mut state = self.state.lock().unwrap();
        merge_into(&mut state.values, update);
        state
            .values
            .insert(EVENT_KEY.to_string(), NativeValue::String(event.to_string()));
        state.events.push(event.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Option<NativeValue> {
        self.state.lock().unwrap().values.get(key).cloned()
    }
}

fn merge_into(target: &mut ValueMap, update: ValueMap) {
    for (key, value) in update {
        let NativeValue::Map(incoming) = value else {
            target.insert(key, value);
            continue;
        };
        if let Some(NativeValue::Map(existing)) = target.get_mut(&key) {
            merge_into(existing, incoming);
            continue;
        }
        target.insert(key, NativeValue::Map(incoming));
    }
}
