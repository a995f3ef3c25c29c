//! Remote configuration container state.
//!
//! A container moves `Empty -> Loading -> Loaded | Failed`. Reads are only served from a
//! `Loaded` container. Two loads started back to back race and the last one to complete wins;
//! completions that finish after a newer load was started are logged but still applied.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::codec::NativeValue;
use crate::error::{
    container_unavailable, external_failure, malformed_arguments, not_initialized, BridgeErrorCode, BridgeResult,
};

pub(crate) const CONTAINER_NOT_INITIALIZED: &str =
    "Container not initialized. Call containerOpen prior to using container.";

/// A loaded configuration bundle owned by the native SDK.
///
/// Missing keys read as the type's zero value, as the SDK does.
#[async_trait]
pub trait ContainerHandle: Send + Sync {
    fn container_id(&self) -> String;
    fn get_string(&self, key: &str) -> String;
    fn get_bool(&self, key: &str) -> bool;
    fn get_long(&self, key: &str) -> i64;
    fn get_double(&self, key: &str) -> f64;
    /// Pulls the latest values from the server.
    async fn refresh(&self) -> BridgeResult<()>;
}

/// Asynchronous loader for containers. An `Err` means the load happened and was rejected.
#[async_trait]
pub trait ContainerLoader: Send + Sync {
    async fn open(&self, container_id: &str) -> BridgeResult<Arc<dyn ContainerHandle>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContainerStatus {
    Empty,
    Loading,
    Loaded,
    Failed,
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Empty => "empty",
            ContainerStatus::Loading => "loading",
            ContainerStatus::Loaded => "loaded",
            ContainerStatus::Failed => "failed",
        }
    }
}

/// Typed lookups a container supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContainerValueKind {
    String,
    Bool,
    Long,
    Double,
}

enum LoadState {
    Empty,
    Loading { container_id: String },
    Loaded(Arc<dyn ContainerHandle>),
    Failed { container_id: String, message: String },
}

impl LoadState {
    fn status(&self) -> ContainerStatus {
        match self {
            LoadState::Empty => ContainerStatus::Empty,
            LoadState::Loading { .. } => ContainerStatus::Loading,
            LoadState::Loaded(_) => ContainerStatus::Loaded,
            LoadState::Failed { .. } => ContainerStatus::Failed,
        }
    }
}

pub struct ContainerState {
    loader: Arc<dyn ContainerLoader>,
    state: Mutex<LoadState>,
    generation: AtomicU64,
}

impl fmt::Debug for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerState")
            .field("status", &self.status().as_str())
            .field("container_id", &self.container_id())
            .finish()
    }
}

impl ContainerState {
    pub fn new(loader: Arc<dyn ContainerLoader>) -> Self {
        Self {
            loader,
            state: Mutex::new(LoadState::Empty),
            generation: AtomicU64::new(0),
        }
    }

    pub fn status(&self) -> ContainerStatus {
        self.lock_state().status()
    }

    /// Id of the container currently loading, loaded, or last failed.
    pub fn container_id(&self) -> Option<String> {
        match &*self.lock_state() {
            LoadState::Empty => None,
            LoadState::Loading { container_id } | LoadState::Failed { container_id, .. } => {
                Some(container_id.clone())
            }
            LoadState::Loaded(handle) => Some(handle.container_id()),
        }
    }

    /// Loads `container_id` and, on success, replaces the current container and refreshes it.
    ///
    /// A failed refresh right after a successful load is logged; the container stays loaded.
    pub async fn load(&self, container_id: &str) -> BridgeResult<()> {
        if container_id.trim().is_empty() {
            return Err(malformed_arguments("container id must not be empty"));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.lock_state() = LoadState::Loading {
            container_id: container_id.to_string(),
        };
        log::debug!("loading container `{container_id}` (load #{generation})");

        let outcome = self.loader.open(container_id).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            log::warn!("container `{container_id}` finished after a newer load was started; keeping this result");
        }

        match outcome {
            Ok(handle) => {
                *self.lock_state() = LoadState::Loaded(handle.clone());
                if let Err(err) = handle.refresh().await {
                    log::warn!("refresh after loading container `{container_id}` failed: {err}");
                }
                Ok(())
            }
            Err(err) => {
                let err = match err.code {
                    BridgeErrorCode::ExternalSdkFailure => err,
                    _ => external_failure(err.message()),
                };
                *self.lock_state() = LoadState::Failed {
                    container_id: container_id.to_string(),
                    message: err.message().to_string(),
                };
                Err(err)
            }
        }
    }

    pub async fn refresh(&self) -> BridgeResult<()> {
        let handle = self.loaded()?;
        handle.refresh().await
    }

    pub fn get(&self, key: &str, kind: ContainerValueKind) -> BridgeResult<NativeValue> {
        let handle = self.loaded()?;
        Ok(match kind {
            ContainerValueKind::String => NativeValue::String(handle.get_string(key)),
            ContainerValueKind::Bool => NativeValue::Bool(handle.get_bool(key)),
            ContainerValueKind::Long => NativeValue::Int(handle.get_long(key)),
            ContainerValueKind::Double => NativeValue::Double(handle.get_double(key)),
        })
    }

    pub fn get_string(&self, key: &str) -> BridgeResult<String> {
        Ok(self.loaded()?.get_string(key))
    }

    pub fn get_bool(&self, key: &str) -> BridgeResult<bool> {
        Ok(self.loaded()?.get_bool(key))
    }

    pub fn get_long(&self, key: &str) -> BridgeResult<i64> {
        Ok(self.loaded()?.get_long(key))
    }

    pub fn get_double(&self, key: &str) -> BridgeResult<f64> {
        Ok(self.loaded()?.get_double(key))
    }

    fn lock_state(&self) -> MutexGuard<'_, LoadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn loaded(&self) -> BridgeResult<Arc<dyn ContainerHandle>> {
        match &*self.lock_state() {
            LoadState::Loaded(handle) => Ok(handle.clone()),
            LoadState::Failed { container_id, message } => Err(container_unavailable(format!(
                "Container `{container_id}` failed to load: {message}"
            ))),
            LoadState::Empty | LoadState::Loading { .. } => Err(not_initialized(CONTAINER_NOT_INITIALIZED)),
        }
    }
}
