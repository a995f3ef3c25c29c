use std::sync::Arc;
use std::time::Duration;

use analytics_bridge::codec::{NativeValue, ValueMap};
use analytics_bridge::container::ContainerStatus;
use analytics_bridge::memory::{InMemoryAnalyticsClient, InMemoryContainerLoader, InMemoryDataLayer};
use analytics_bridge::{reply_channel, BridgeContext, BridgeSettings, Dispatcher, Reply, WorkerPool};
use serde_json::{json, Value};

fn dispatcher(loader: Arc<InMemoryContainerLoader>) -> Dispatcher {
    let context = BridgeContext::new(
        Arc::new(InMemoryAnalyticsClient::new()),
        loader,
        Arc::new(InMemoryDataLayer::new()),
        BridgeSettings::default(),
    );
    Dispatcher::new(Arc::new(context), WorkerPool::current())
}

async fn call(dispatcher: &Dispatcher, action: &str, args: Value) -> Reply {
    let (sink, receiver) = reply_channel();
    assert!(dispatcher.dispatch(action, &args.to_string(), sink).is_handled());
    receiver.recv().await.expect("handled call must answer")
}

fn values() -> ValueMap {
    ValueMap::from([
        ("banner".to_string(), NativeValue::from("spring-sale")),
        ("showBanner".to_string(), NativeValue::from(true)),
        ("maxItems".to_string(), NativeValue::from(12_i64)),
        ("discount".to_string(), NativeValue::from(0.15)),
    ])
}

#[tokio::test(flavor = "multi_thread")]
async fn typed_reads_after_open() {
    let loader = Arc::new(InMemoryContainerLoader::new());
    loader.insert_container("GTM-1", values());
    let dispatcher = dispatcher(loader.clone());

    assert_eq!(call(&dispatcher, "containerOpen", json!(["GTM-1"])).await, Reply::Success(None));
    assert_eq!(loader.refresh_count("GTM-1"), 1);

    assert_eq!(
        call(&dispatcher, "getContainerString", json!(["banner"])).await,
        Reply::Success(Some(json!("spring-sale")))
    );
    assert_eq!(
        call(&dispatcher, "getContainerBool", json!(["showBanner"])).await,
        Reply::Success(Some(json!(true)))
    );
    assert_eq!(
        call(&dispatcher, "getContainerLong", json!(["maxItems"])).await,
        Reply::Success(Some(json!(12)))
    );
    assert_eq!(
        call(&dispatcher, "getContainerDouble", json!(["discount"])).await,
        Reply::Success(Some(json!(0.15)))
    );

    assert_eq!(call(&dispatcher, "containerRefresh", json!([])).await, Reply::Success(None));
    assert_eq!(loader.refresh_count("GTM-1"), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn reads_while_loading_are_not_initialized() {
    let loader = Arc::new(InMemoryContainerLoader::new());
    loader.insert_container("GTM-1", values());
    loader.pause();
    let dispatcher = dispatcher(loader.clone());

    let (sink, receiver) = reply_channel();
    assert!(dispatcher.dispatch("containerOpen", r#"["GTM-1"]"#, sink).is_handled());

    while dispatcher.context().container().status() != ContainerStatus::Loading {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let reply = call(&dispatcher, "getContainerString", json!(["banner"])).await;
    assert_eq!(
        reply,
        Reply::Error("Container not initialized. Call containerOpen prior to using container.".to_string())
    );

    loader.resume();
    assert_eq!(receiver.recv().await, Some(Reply::Success(None)));
    assert_eq!(dispatcher.context().container().status(), ContainerStatus::Loaded);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_load_is_reported_as_unavailable() {
    let loader = Arc::new(InMemoryContainerLoader::new());
    let dispatcher = dispatcher(loader);

    let reply = call(&dispatcher, "openContainer", json!(["GTM-404"])).await;
    assert_eq!(reply, Reply::Error("container `GTM-404` is not available".to_string()));

    let Reply::Error(message) = call(&dispatcher, "getContainerDouble", json!(["discount"])).await else {
        panic!("reads from a failed container must fail");
    };
    assert!(message.contains("GTM-404"));
    assert!(!message.contains("Call containerOpen"));
}
