//! Routes named actions from the scripting layer to the registry, the container and the data
//! layer, and writes the outcome back through a reply sink.

mod command;
mod reply;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value as JsonValue;

use crate::codec::{decode_args, WireValue};
use crate::context::BridgeContext;
use crate::error::{internal_error, unhandled_action, BridgeError, BridgeErrorCode, BridgeResult};
use crate::platform::runtime::WorkerPool;

pub use command::{Action, BackgroundCommand, Command, DataLayerUpdate, InlineCommand};
pub use reply::{reply_channel, Reply, ReplyReceiver, ReplySink};

/// Whether the dispatcher took ownership of a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The reply sink has been or will be answered exactly once.
    Handled,
    /// The action is unknown; the reply sink was dropped unanswered.
    Unhandled,
}

impl DispatchOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, DispatchOutcome::Handled)
    }

    /// Folds `Unhandled` into an `UnhandledAction` error for hosts that prefer a `Result`.
    pub fn into_result(self, action: &str) -> BridgeResult<()> {
        match self {
            DispatchOutcome::Handled => Ok(()),
            DispatchOutcome::Unhandled => Err(unhandled_action(action)),
        }
    }
}

type HandlerResult = BridgeResult<Option<WireValue>>;

#[derive(Clone, Debug)]
pub struct Dispatcher {
    context: Arc<BridgeContext>,
    pool: WorkerPool,
}

impl Dispatcher {
    pub fn new(context: Arc<BridgeContext>, pool: WorkerPool) -> Self {
        Self { context, pool }
    }

    pub fn context(&self) -> &Arc<BridgeContext> {
        &self.context
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Entry point for hosts that hand over the arguments as a JSON array string.
    pub fn dispatch(&self, action: &str, raw_args: &str, reply: Box<dyn ReplySink>) -> DispatchOutcome {
        let Some(resolved) = Action::from_name(action) else {
            log::warn!("analytics bridge does not handle action `{action}`");
            return DispatchOutcome::Unhandled;
        };
        match decode_args(raw_args) {
            Ok(values) => self.run(resolved, &values, reply),
            Err(err) => {
                respond(resolved, Err(err), reply);
                DispatchOutcome::Handled
            }
        }
    }

    /// Entry point for hosts that already hold parsed arguments.
    pub fn dispatch_values(&self, action: &str, values: &[WireValue], reply: Box<dyn ReplySink>) -> DispatchOutcome {
        let Some(resolved) = Action::from_name(action) else {
            log::warn!("analytics bridge does not handle action `{action}`");
            return DispatchOutcome::Unhandled;
        };
        self.run(resolved, values, reply)
    }

    fn run(&self, action: Action, values: &[WireValue], reply: Box<dyn ReplySink>) -> DispatchOutcome {
        log::debug!("dispatching `{}` with {} argument(s)", action.name(), values.len());
        let command = match action.decode(values) {
            Ok(command) => command,
            Err(err) => {
                respond(action, Err(err), reply);
                return DispatchOutcome::Handled;
            }
        };

        match command {
            Command::Inline(command) => {
                let context = &self.context;
                let result = panic::catch_unwind(AssertUnwindSafe(|| execute_inline(context, command)))
                    .unwrap_or_else(|_| Err(panicked(action)));
                respond(action, result, reply);
            }
            Command::Background(command) => {
                let context = Arc::clone(&self.context);
                let pool = self.pool.clone();
                let pending = PendingReply::new(action, reply);
                self.pool.spawn(async move {
                    let result = AssertUnwindSafe(execute_background(context, pool, command))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| Err(panicked(action)));
                    pending.respond(result);
                });
            }
        }
        DispatchOutcome::Handled
    }
}

fn execute_inline(context: &BridgeContext, command: InlineCommand) -> HandlerResult {
    let trackers = context.trackers();
    match command {
        InlineCommand::SetTrackingId(id) => trackers.set_tracking_id(&id)?,
        InlineCommand::SetTrackingIds(ids) => trackers.set_tracking_ids(ids.as_slice())?,
        InlineCommand::SetDispatchInterval(seconds) => context.set_dispatch_interval_secs(seconds)?,
        InlineCommand::SetLogLevel(code) => {
            context.set_log_level_code(code);
        }
        InlineCommand::SetAdvertisingIdCollection(enabled) => trackers.set_advertising_id_collection(enabled),
        InlineCommand::Get(key) => return Ok(Some(trackers.get(&key)?.to_wire())),
        InlineCommand::Set { key, value } => trackers.set(&key, value.as_deref())?,
        InlineCommand::SetAppOptOut(opt_out) => trackers.set_app_opt_out(opt_out),
        InlineCommand::GetAppOptOut => return Ok(Some(JsonValue::Bool(trackers.app_opt_out()))),
        InlineCommand::GetContainerValue { key, kind } => {
            return Ok(Some(context.container().get(&key, kind)?.to_wire()));
        }
    }
    Ok(None)
}

async fn execute_background(context: Arc<BridgeContext>, pool: WorkerPool, command: BackgroundCommand) -> HandlerResult {
    match command {
        BackgroundCommand::Send(hit) => {
            pool.run_blocking(move || context.trackers().send(&hit)).await?;
        }
        BackgroundCommand::Close => context.trackers().close().await?,
        BackgroundCommand::OpenContainer(container_id) => context.container().load(&container_id).await?,
        BackgroundCommand::RefreshContainer => context.container().refresh().await?,
        BackgroundCommand::DataLayerValue(key) => {
            let data_layer = context.data_layer().clone();
            let value = pool.run_blocking(move || Ok(data_layer.read_value(&key))).await?;
            return Ok(Some(value));
        }
        BackgroundCommand::DataLayerPush(update) => {
            let data_layer = context.data_layer().clone();
            pool.run_blocking(move || match update {
                DataLayerUpdate::Mapping(mapping) => data_layer.push_mapping(mapping),
                DataLayerUpdate::KeyValue(key, value) => data_layer.push_key_value(&key, value),
            })
            .await?;
        }
        BackgroundCommand::DataLayerPushEvent { name, updates } => {
            let data_layer = context.data_layer().clone();
            pool.run_blocking(move || data_layer.push_event(&name, updates)).await?;
        }
    }
    Ok(None)
}

/// Reply sink owned by a background task.
///
/// If the task is dropped before it answers, as happens when the worker runtime has shut down,
/// the sink is answered with an `Internal` error instead of being dropped silently.
struct PendingReply {
    action: Action,
    sink: Option<Box<dyn ReplySink>>,
}

impl PendingReply {
    fn new(action: Action, sink: Box<dyn ReplySink>) -> Self {
        Self {
            action,
            sink: Some(sink),
        }
    }

    fn respond(mut self, result: HandlerResult) {
        if let Some(sink) = self.sink.take() {
            respond(self.action, result, sink);
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            let err = internal_error(format!(
                "`{}` was dropped before it ran; the worker runtime is not running",
                self.action.name()
            ));
            respond(self.action, Err(err), sink);
        }
    }
}

fn panicked(action: Action) -> BridgeError {
    internal_error(format!("handler for `{}` panicked", action.name()))
}

fn respond(action: Action, result: HandlerResult, reply: Box<dyn ReplySink>) {
    match result {
        Ok(value) => reply.success(value),
        Err(err) => {
            match err.code {
                BridgeErrorCode::ExternalSdkFailure | BridgeErrorCode::Internal => {
                    log::error!("`{}` failed: {err}", action.name())
                }
                _ => log::warn!("`{}` failed: {err}", action.name()),
            }
            reply.error(err.message().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{NativeValue, ValueMap};
    use crate::memory::{InMemoryAnalyticsClient, InMemoryContainerLoader, InMemoryDataLayer};
    use crate::settings::BridgeSettings;
    use serde_json::json;

    struct Harness {
        client: Arc<InMemoryAnalyticsClient>,
        loader: Arc<InMemoryContainerLoader>,
        dispatcher: Dispatcher,
    }

    fn harness() -> Harness {
        let client = Arc::new(InMemoryAnalyticsClient::new());
        let loader = Arc::new(InMemoryContainerLoader::new());
        let context = BridgeContext::new(
            client.clone(),
            loader.clone(),
            Arc::new(InMemoryDataLayer::new()),
            BridgeSettings::default(),
        );
        Harness {
            client,
            loader,
            dispatcher: Dispatcher::new(Arc::new(context), WorkerPool::current()),
        }
    }

    async fn call(dispatcher: &Dispatcher, action: &str, args: WireValue) -> Reply {
        let (sink, receiver) = reply_channel();
        let outcome = dispatcher.dispatch(action, &args.to_string(), sink);
        assert_eq!(outcome, DispatchOutcome::Handled, "{action}");
        receiver.recv().await.expect("handled calls always answer")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_actions_are_unhandled_and_never_answer() {
        let harness = harness();
        let (sink, receiver) = reply_channel();
        let outcome = harness.dispatcher.dispatch("sendTiming", "[]", sink);
        assert_eq!(outcome, DispatchOutcome::Unhandled);
        assert_eq!(receiver.recv().await, None);
        assert_eq!(
            outcome.into_result("sendTiming").unwrap_err().code,
            BridgeErrorCode::UnhandledAction
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_arguments_reply_with_an_error() {
        let harness = harness();
        let reply = call(&harness.dispatcher, "get", json!([42, 1])).await;
        assert!(!reply.is_success());

        let (sink, receiver) = reply_channel();
        assert!(harness.dispatcher.dispatch("get", "not json", sink).is_handled());
        assert!(matches!(receiver.recv().await, Some(Reply::Error(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn inline_calls_answer_before_dispatch_returns() {
        let harness = harness();
        let (sink, mut receiver) = reply_channel();
        harness.dispatcher.dispatch("setTrackingId", r#"["UA-1"]"#, sink);
        assert_eq!(receiver.try_recv(), Some(Reply::Success(None)));
        assert_eq!(harness.client.created_trackers(), vec!["UA-1"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tracker_errors_carry_the_setup_hint() {
        let harness = harness();
        let reply = call(&harness.dispatcher, "set", json!(["userId", "42"])).await;
        assert_eq!(
            reply,
            Reply::Error("Tracker not initialized. Call setTrackingId prior to using tracker.".into())
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn send_runs_in_the_background_and_queues_the_hit() {
        let harness = harness();
        call(&harness.dispatcher, "setTrackingId", json!(["UA-1"])).await;
        let reply = call(&harness.dispatcher, "sendAppView", json!(["home"])).await;
        assert_eq!(reply, Reply::Success(None));

        let hits = harness.client.queued_hits();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].params.get("&cd").map(String::as_str), Some("home"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn container_reads_follow_load_state() {
        let harness = harness();
        let reply = call(&harness.dispatcher, "getContainerString", json!(["greeting"])).await;
        assert_eq!(
            reply,
            Reply::Error("Container not initialized. Call containerOpen prior to using container.".into())
        );

        let values = ValueMap::from([("greeting".to_string(), NativeValue::from("hi"))]);
        harness.loader.insert_container("GTM-1", values);
        assert_eq!(call(&harness.dispatcher, "openContainer", json!(["GTM-1"])).await, Reply::Success(None));
        assert_eq!(
            call(&harness.dispatcher, "getContainerString", json!(["greeting"])).await,
            Reply::Success(Some(json!("hi")))
        );

        let reply = call(&harness.dispatcher, "containerOpen", json!(["GTM-missing"])).await;
        assert!(!reply.is_success());
        let reply = call(&harness.dispatcher, "getContainerBoolean", json!(["greeting"])).await;
        assert!(matches!(reply, Reply::Error(message) if !message.contains("containerOpen prior")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn data_layer_round_trip() {
        let harness = harness();
        call(&harness.dispatcher, "dataLayerPush", json!([{"user": {"tier": "gold"}}])).await;
        call(&harness.dispatcher, "dataLayerPush", json!(["score", 12])).await;
        assert_eq!(
            call(&harness.dispatcher, "getDatalayer", json!(["score"])).await,
            Reply::Success(Some(json!(12)))
        );
        assert_eq!(
            call(&harness.dispatcher, "dataLayerValue", json!(["missing"])).await,
            Reply::Success(Some(json!(null)))
        );
        let reply = call(&harness.dispatcher, "dataLayerPushEvent", json!(["", {}])).await;
        assert!(!reply.is_success());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn app_opt_out_round_trip() {
        let harness = harness();
        call(&harness.dispatcher, "setAppOptOut", json!([true])).await;
        assert_eq!(
            call(&harness.dispatcher, "getAppOptOut", json!([])).await,
            Reply::Success(Some(json!(true)))
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn closure_sinks_receive_the_reply() {
        let harness = harness();
        let (tx, rx) = futures::channel::oneshot::channel();
        let sink = move |reply: Reply| {
            let _ = tx.send(reply);
        };
        harness.dispatcher.dispatch_values("getAppOptOut", &[], Box::new(sink));
        assert_eq!(rx.await.unwrap(), Reply::Success(Some(json!(false))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn a_panicking_sdk_call_does_not_disable_the_bridge() {
        let harness = harness();
        harness.client.panic_on_tracking_id("BOOM");

        assert_eq!(
            call(&harness.dispatcher, "setTrackingIds", json!([["A", "BOOM"]])).await,
            Reply::Error("handler for `setTrackingIds` panicked".into())
        );
        assert_eq!(
            call(&harness.dispatcher, "setTrackingId", json!(["UA-OK"])).await,
            Reply::Success(None)
        );
        assert_eq!(
            call(&harness.dispatcher, "get", json!(["&tid"])).await,
            Reply::Success(Some(json!("UA-OK")))
        );
    }

    #[test]
    fn background_calls_answer_when_the_runtime_is_gone() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let handle = runtime.handle().clone();
        drop(runtime);

        let context = BridgeContext::in_memory(BridgeSettings::default());
        let dispatcher = Dispatcher::new(Arc::new(context), WorkerPool::new(handle));
        let (sink, receiver) = reply_channel();
        assert!(dispatcher.dispatch("close", "[]", sink).is_handled());

        let reply = futures::executor::block_on(receiver.recv());
        assert!(
            matches!(&reply, Some(Reply::Error(message)) if message.contains("worker runtime")),
            "{reply:?}"
        );
    }
}
