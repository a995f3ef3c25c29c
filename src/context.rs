use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::container::{ContainerLoader, ContainerState};
use crate::data_layer::{DataLayerBridge, DataLayerStore};
use crate::error::BridgeResult;
use crate::logger::LogLevel;
use crate::memory::{InMemoryAnalyticsClient, InMemoryContainerLoader, InMemoryDataLayer};
use crate::settings::BridgeSettings;
use crate::tracker::{AnalyticsClient, TrackerRegistry};

/// Everything the dispatcher mutates: the tracker set, the container, and the data layer proxy.
///
/// The host creates one per process and hands it to the [`Dispatcher`](crate::Dispatcher).
pub struct BridgeContext {
    settings: Mutex<BridgeSettings>,
    trackers: TrackerRegistry,
    container: ContainerState,
    data_layer: DataLayerBridge,
}

impl fmt::Debug for BridgeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeContext")
            .field("settings", &self.settings())
            .field("trackers", &self.trackers)
            .field("container", &self.container)
            .finish()
    }
}

impl BridgeContext {
    /// Builds the context and applies the initial log level and dispatch interval to the client.
    pub fn new(
        client: Arc<dyn AnalyticsClient>,
        loader: Arc<dyn ContainerLoader>,
        store: Arc<dyn DataLayerStore>,
        settings: BridgeSettings,
    ) -> Self {
        client.set_log_level(settings.log_level());
        client.set_dispatch_interval(settings.dispatch_interval());
        log::debug!(
            "analytics bridge initialised for {} (log level {}, dispatch every {}s)",
            settings.platform().as_str(),
            settings.log_level(),
            settings.dispatch_interval_secs()
        );

        Self {
            trackers: TrackerRegistry::new(client, settings.report_uncaught_exceptions()),
            container: ContainerState::new(loader),
            data_layer: DataLayerBridge::new(store),
            settings: Mutex::new(settings),
        }
    }

    /// A context wired to the in-memory collaborators, for desktop runs.
    pub fn in_memory(settings: BridgeSettings) -> Self {
        Self::new(
            Arc::new(InMemoryAnalyticsClient::new()),
            Arc::new(InMemoryContainerLoader::new()),
            Arc::new(InMemoryDataLayer::new()),
            settings,
        )
    }

    pub fn settings(&self) -> BridgeSettings {
        self.lock_settings().clone()
    }

    pub fn trackers(&self) -> &TrackerRegistry {
        &self.trackers
    }

    pub fn container(&self) -> &ContainerState {
        &self.container
    }

    pub fn data_layer(&self) -> &DataLayerBridge {
        &self.data_layer
    }

    /// Maps a wire log-level code with the host platform's scale and applies it.
    pub fn set_log_level_code(&self, code: i64) -> LogLevel {
        let level = {
            let mut settings = self.lock_settings();
            let level = LogLevel::from_wire(code, settings.platform());
            settings.set_log_level(level);
            level
        };
        self.trackers.set_log_level(level);
        level
    }

    pub fn set_dispatch_interval_secs(&self, seconds: u64) -> BridgeResult<()> {
        let interval = {
            let mut settings = self.lock_settings();
            settings.set_dispatch_interval_secs(seconds)?;
            settings.dispatch_interval()
        };
        self.trackers.set_dispatch_interval(interval);
        Ok(())
    }

    fn lock_settings(&self) -> MutexGuard<'_, BridgeSettings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
