#![allow(dead_code)]

use async_trait::async_trait;
use edge_router::{
    AsyncEndpointExecutorFactory, Checkpointer, CheckpointerFactory, Endpoint, EndpointExecutor,
    EndpointExecutorConfig, EndpointExecutorFactory, EndpointExecutorStatus, EndpointReference,
    MasterCheckpointer, Message, RetryPolicy, Route, RouteFactory, Router, RouterConfig,
    RoutingError,
};
use integration_test_utils::{RecordingCheckpointStore, TestEndpointFactory};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub(crate) const WAIT: Duration = Duration::from_secs(5);
pub(crate) const UPSTREAM: &str = "$upstream";
pub(crate) const SINK_INPUT: &str = "/modules/sink/inputs/in1";

pub(crate) struct Harness {
    pub(crate) endpoints: Arc<TestEndpointFactory>,
    pub(crate) routes: RouteFactory,
    pub(crate) store: Arc<RecordingCheckpointStore>,
    pub(crate) router: Arc<Router>,
}

impl Harness {
    pub(crate) fn route(&self, id: &str, text: &str) -> Route {
        self.routes
            .create(id, text)
            .expect("test route should compile")
    }

    pub(crate) fn master_offset(&self) -> i64 {
        self.router.dispatcher().checkpointer().offset()
    }
}

/// Short fixed retries so failure paths settle quickly.
pub(crate) fn fast_executor_config() -> EndpointExecutorConfig {
    EndpointExecutorConfig::default().with_retry_policy(RetryPolicy::FixedInterval {
        max_retries: 3,
        interval: Duration::from_millis(10),
    })
}

pub(crate) fn upstream(endpoints: &TestEndpointFactory) -> Endpoint {
    endpoints.endpoint(&EndpointReference::System(UPSTREAM.to_string()))
}

pub(crate) fn sink(endpoints: &TestEndpointFactory) -> Endpoint {
    endpoints.endpoint(&EndpointReference::Function {
        name: "BrokeredEndpoint".to_string(),
        parameter: SINK_INPUT.to_string(),
    })
}

pub(crate) async fn make_master(
    name: &str,
    store: Arc<RecordingCheckpointStore>,
) -> MasterCheckpointer {
    MasterCheckpointer::create(name, store)
        .await
        .expect("master checkpointer creation should succeed")
}

/// Router over `routes` (`(id, rule)` pairs) with recording endpoints.
pub(crate) async fn make_router(name: &str, routes: &[(&str, &str)]) -> Harness {
    make_router_with(name, routes, fast_executor_config()).await
}

pub(crate) async fn make_router_with(
    name: &str,
    routes: &[(&str, &str)],
    executor_config: EndpointExecutorConfig,
) -> Harness {
    integration_test_utils::init_logging();

    let endpoints = Arc::new(TestEndpointFactory::new());
    let route_factory = RouteFactory::new(endpoints.clone());
    let compiled: Vec<Route> = routes
        .iter()
        .map(|(id, text)| route_factory.create(id, text).expect("test route should compile"))
        .collect();
    let config = RouterConfig::new(compiled, None).expect("route ids are unique");
    let store = Arc::new(RecordingCheckpointStore::new());
    let router = Router::create(
        name,
        config,
        Arc::new(AsyncEndpointExecutorFactory::new(executor_config)),
        make_master(name, store.clone()).await,
    )
    .await
    .expect("router creation should succeed");

    Harness {
        endpoints,
        routes: route_factory,
        store,
        router: Arc::new(router),
    }
}

/// Executor factory that logs `create:<id>` and `close:<id>` calls in order.
/// With a gate, each creation waits for [`ObservedExecutorFactory::open_gate`].
pub(crate) struct ObservedExecutorFactory {
    inner: AsyncEndpointExecutorFactory,
    calls: Arc<Mutex<Vec<String>>>,
    gate: Option<Arc<Notify>>,
    entered: Arc<Notify>,
}

impl ObservedExecutorFactory {
    pub(crate) fn new() -> Self {
        Self {
            inner: AsyncEndpointExecutorFactory::new(fast_executor_config()),
            calls: Arc::new(Mutex::new(Vec::new())),
            gate: None,
            entered: Arc::new(Notify::new()),
        }
    }

    pub(crate) fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Notify::new())),
            ..Self::new()
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|logged| *logged == call).count()
    }

    pub(crate) fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    /// Resolves once a gated creation is waiting.
    pub(crate) async fn creation_started(&self) {
        self.entered.notified().await;
    }

    pub(crate) fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    fn log(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl EndpointExecutorFactory for ObservedExecutorFactory {
    async fn create(
        &self,
        endpoint: Endpoint,
        priorities: Vec<u32>,
        checkpointer_factory: Arc<dyn CheckpointerFactory>,
        cancel: CancellationToken,
    ) -> Result<Arc<dyn EndpointExecutor>, RoutingError> {
        let endpoint_id = endpoint.id().to_string();
        self.log(format!("create:{endpoint_id}"));
        if let Some(gate) = &self.gate {
            self.entered.notify_one();
            gate.notified().await;
        }
        let inner = self
            .inner
            .create(endpoint, priorities, checkpointer_factory, cancel)
            .await?;
        Ok(Arc::new(ObservedExecutor {
            endpoint_id,
            inner,
            calls: self.calls.clone(),
        }))
    }
}

struct ObservedExecutor {
    endpoint_id: String,
    inner: Arc<dyn EndpointExecutor>,
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl EndpointExecutor for ObservedExecutor {
    fn endpoint(&self) -> Arc<Endpoint> {
        self.inner.endpoint()
    }

    async fn invoke(
        &self,
        message: Message,
        priority: u32,
        time_to_live_secs: u32,
    ) -> Result<(), RoutingError> {
        self.inner.invoke(message, priority, time_to_live_secs).await
    }

    async fn set_endpoint(
        &self,
        endpoint: Endpoint,
        priorities: Vec<u32>,
    ) -> Result<(), RoutingError> {
        self.inner.set_endpoint(endpoint, priorities).await
    }

    async fn status(&self) -> EndpointExecutorStatus {
        self.inner.status().await
    }

    async fn close(&self) -> Result<(), RoutingError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("close:{}", self.endpoint_id));
        }
        self.inner.close().await
    }
}
