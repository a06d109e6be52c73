/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! # edge-router
//!
//! `edge-router` is the message-routing core of an edge gateway. Messages are
//! matched against `FROM ... [WHERE ...] INTO ...` routes and handed to one
//! executor per endpoint, which delivers them in priority order with retries
//! and tracks endpoint health. Delivery progress is checkpointed so a restart
//! resumes after the last message every endpoint has finished with.
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use edge_router::{
//!     AsyncEndpointExecutorFactory, DeliveryError, Endpoint, EndpointFactory, EndpointKind,
//!     EndpointProcessor, EndpointReference, ConfigurationError, InMemoryCheckpointStore,
//!     MasterCheckpointer, Message, MessageSource, RouteFactory, Router, RouterConfig, SinkResult,
//! };
//!
//! struct Upstream;
//!
//! #[async_trait]
//! impl EndpointProcessor for Upstream {
//!     async fn process(
//!         &self,
//!         messages: &[Message],
//!     ) -> Result<SinkResult<Message>, DeliveryError> {
//!         Ok(SinkResult::success(messages.to_vec()))
//!     }
//! }
//!
//! struct Endpoints;
//!
//! impl EndpointFactory for Endpoints {
//!     fn create_endpoint(
//!         &self,
//!         reference: &EndpointReference,
//!     ) -> Result<Endpoint, ConfigurationError> {
//!         let kind = EndpointKind::from_reference(reference)?;
//!         let id = reference.endpoint_id();
//!         Ok(Endpoint::new(&id, &id, kind, Arc::new(Upstream)))
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let routes = RouteFactory::new(Arc::new(Endpoints));
//! let config = RouterConfig::new(
//!     [routes.create("telemetry", "FROM /messages/* INTO $upstream").unwrap()],
//!     None,
//! )
//! .unwrap();
//!
//! let store = Arc::new(InMemoryCheckpointStore::new());
//! let checkpointer = MasterCheckpointer::create("router", store).await.unwrap();
//! let router = Router::create(
//!     "router",
//!     config,
//!     Arc::new(AsyncEndpointExecutorFactory::default()),
//!     checkpointer,
//! )
//! .await
//! .unwrap();
//!
//! let message = Message::builder(MessageSource::Telemetry).with_offset(1).build();
//! assert_eq!(router.route(&message).len(), 1);
//! router.route_async(&message).await.unwrap();
//! router.close().await.unwrap();
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - Routing: rule grammar, condition evaluation, route snapshots and the [`Router`]
//! - Control plane: the [`Dispatcher`] and its copy-on-write endpoint table
//! - Data plane: endpoint executors, retry policy and health tracking
//! - Checkpoint: per-lane checkpointers mirrored into one [`MasterCheckpointer`]
//! - Config: configuration documents and the [`ConfigUpdater`]
//! - Runtime: spawning of delivery loops
//!
//! ## Observability model
//!
//! The crate uses `tracing` for logs/events. Every event carries stable
//! `event` and `component` fields (see `observability::events`).
//! Library code emits events/spans and does not initialize a global
//! subscriber. Binaries and tests are responsible for one-time
//! `tracing_subscriber` initialization at process boundaries.

mod checkpoint;
pub use checkpoint::{
    checkpointer_id, CheckpointData, CheckpointStore, CheckpointStoreError, Checkpointer,
    CheckpointerFactory, InMemoryCheckpointStore, MasterCheckpointer, StoreCheckpointer,
    INVALID_OFFSET,
};

mod config;
pub use config::{
    parse_schema_version, ConfigListener, ConfigParser, ConfigSource, ConfigUpdater, MessageStore,
    ParsedConfig, RouteSpec, RouteSpecDetails, RoutingConfigDocument,
    StoreAndForwardConfiguration, SUPPORTED_SCHEMA_MAJOR,
};

mod control_plane;
pub use control_plane::dispatcher::Dispatcher;

mod data_plane;
pub use data_plane::async_executor::{AsyncEndpointExecutor, AsyncEndpointExecutorFactory};
pub use data_plane::endpoint_executor::{
    EndpointExecutor, EndpointExecutorConfig, EndpointExecutorFactory, EndpointExecutorStatus,
    ExecutorState,
};
pub use data_plane::health::{EndpointHealthStatus, HealthConfig};
pub use data_plane::retry::RetryPolicy;
pub use data_plane::sink_result::{
    FailureKind, InvalidDetails, MergingSinkResult, SendFailureDetails, SinkResult,
};

mod endpoint;
pub use endpoint::{
    DeliveryError, DeliveryErrorKind, Endpoint, EndpointFactory, EndpointKind, EndpointProcessor,
    EndpointReference, BROKERED_ENDPOINT_FUNCTION, UPSTREAM_ENDPOINT,
};

mod error;
pub use error::{ConfigurationError, RoutingError};

mod message;
pub use message::{system_properties, Message, MessageBuilder, MessageSource, UNASSIGNED_OFFSET};

#[doc(hidden)]
pub mod observability;

mod routing;
pub use routing::{
    parse_route, Builtin, ComparisonOp, Condition, Expr, ParsedRoute, Route, RouteFactory,
    RouteParseError, RouteResult, RouteSource, Router, RouterConfig, Truth, Value,
    DEFAULT_ROUTE_PRIORITY, DEFAULT_TIME_TO_LIVE_SECS,
};

mod runtime;
