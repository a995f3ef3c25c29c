//! Native side of a scripting-to-analytics bridge.
//!
//! Scripting code calls named actions (`setTrackingId`, `send`, `containerOpen`, ...) with a JSON
//! array of arguments. The [`Dispatcher`] decodes them, drives the tracking SDK, the tag-manager
//! container and the data layer through the traits in [`tracker`], [`container`] and
//! [`data_layer`], and answers through a [`ReplySink`].
//!
//! ```
//! use std::sync::Arc;
//! use analytics_bridge::{reply_channel, BridgeContext, BridgeSettings, DispatchOutcome, Dispatcher, Reply, WorkerPool};
//!
//! let context = Arc::new(BridgeContext::in_memory(BridgeSettings::default()));
//! let dispatcher = Dispatcher::new(context, WorkerPool::current());
//!
//! let (sink, mut receiver) = reply_channel();
//! assert_eq!(dispatcher.dispatch("setTrackingId", r#"["UA-1"]"#, sink), DispatchOutcome::Handled);
//! assert_eq!(receiver.try_recv(), Some(Reply::Success(None)));
//! ```

pub mod codec;
pub mod container;
pub mod context;
pub mod data_layer;
pub mod dispatcher;
pub mod error;
pub mod logger;
pub mod memory;
pub mod platform;
pub mod settings;
pub mod tracker;

pub use context::BridgeContext;
pub use dispatcher::{reply_channel, Action, DispatchOutcome, Dispatcher, Reply, ReplyReceiver, ReplySink};
pub use error::{BridgeError, BridgeErrorCode, BridgeResult};
pub use logger::LogLevel;
pub use platform::runtime::WorkerPool;
pub use settings::{BridgeSettings, BridgeSettingsUpdate, HostPlatform};
