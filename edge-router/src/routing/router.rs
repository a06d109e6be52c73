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

//! Route evaluation and route management on top of a [`Dispatcher`].

use crate::checkpoint::MasterCheckpointer;
use crate::control_plane::dispatcher::Dispatcher;
use crate::data_plane::endpoint_executor::{EndpointExecutorFactory, EndpointExecutorStatus};
use crate::data_plane::health::EndpointHealthStatus;
use crate::endpoint::Endpoint;
use crate::error::RoutingError;
use crate::message::Message;
use crate::observability::{events, fields};
use crate::routing::route::{Route, RouteResult};
use crate::routing::router_config::RouterConfig;
use arc_swap::ArcSwap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

const COMPONENT: &str = "router";

/// Matches messages against the current [`RouterConfig`] and dispatches them.
///
/// Route changes are serialized; matching always reads one consistent
/// configuration snapshot.
pub struct Router {
    id: String,
    config: ArcSwap<RouterConfig>,
    dispatcher: Dispatcher,
    sync: Mutex<()>,
}

impl Router {
    /// Creates the router and one executor per endpoint `config` references.
    pub async fn create(
        id: &str,
        config: RouterConfig,
        executor_factory: Arc<dyn EndpointExecutorFactory>,
        checkpointer: MasterCheckpointer,
    ) -> Result<Self, RoutingError> {
        let dispatcher = Dispatcher::create(
            id,
            config.endpoint_priorities(),
            executor_factory,
            checkpointer,
        )
        .await?;
        Ok(Self {
            id: id.to_string(),
            config: ArcSwap::from_pointee(config),
            dispatcher,
            sync: Mutex::new(()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> Arc<RouterConfig> {
        self.config.load_full()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Results of every matching route. The fallback route is only
    /// considered when no other route matched.
    pub fn route(&self, message: &Message) -> HashSet<RouteResult> {
        let config = self.config.load();
        let mut results: HashSet<RouteResult> = config
            .routes()
            .filter(|route| route.matches(message))
            .map(Route::to_result)
            .collect();
        if results.is_empty() {
            if let Some(fallback) = config.fallback().filter(|route| route.matches(message)) {
                debug!(
                    component = COMPONENT,
                    router_id = %self.id,
                    route_id = fallback.id(),
                    source = %fields::format_message_source(message),
                    "fallback route matched"
                );
                results.insert(fallback.to_result());
            }
        }
        results
    }

    /// Matches `message` and hands it to the dispatcher.
    pub async fn route_async(&self, message: &Message) -> Result<(), RoutingError> {
        let routes = self.route(message);
        self.dispatcher.dispatch(message, &routes).await
    }

    /// Adds `route`, or replaces the route with the same id.
    pub async fn set_route(&self, route: Route) -> Result<(), RoutingError> {
        let _guard = self.sync.lock().await;
        let current = self.config.load_full();
        let next = current.with_route(route.clone());

        self.dispatcher
            .set_endpoint(
                route.endpoint().clone(),
                next.priorities_for(route.endpoint().id()),
            )
            .await?;
        self.config.store(Arc::new(next.clone()));
        if let Some(previous) = current.route(route.id()) {
            if previous.endpoint().id() != route.endpoint().id() {
                self.reconcile_endpoint(&next, previous.endpoint()).await?;
            }
        }
        info!(
            event = events::ROUTE_SET,
            component = COMPONENT,
            router_id = %self.id,
            route_id = route.id(),
            endpoint_id = route.endpoint().id(),
            priority = route.priority(),
            "route set"
        );
        Ok(())
    }

    /// Removes route `id`. Its endpoint is removed too once no route targets it.
    pub async fn remove_route(&self, id: &str) -> Result<(), RoutingError> {
        let _guard = self.sync.lock().await;
        let current = self.config.load_full();
        let Some(route) = current.route(id) else {
            return Ok(());
        };
        let next = current.without_route(id);
        self.reconcile_endpoint(&next, route.endpoint()).await?;
        self.config.store(Arc::new(next));
        info!(
            event = events::ROUTE_REMOVE,
            component = COMPONENT,
            router_id = %self.id,
            route_id = id,
            endpoint_id = route.endpoint().id(),
            "route removed"
        );
        Ok(())
    }

    /// Swaps in a whole new configuration.
    pub async fn replace_routes(&self, config: RouterConfig) -> Result<(), RoutingError> {
        let _guard = self.sync.lock().await;
        self.dispatcher
            .replace_endpoints(config.endpoint_priorities())
            .await?;
        let count = config.routes().count();
        self.config.store(Arc::new(config));
        info!(
            event = events::ROUTES_REPLACED,
            component = COMPONENT,
            router_id = %self.id,
            count,
            "routes replaced"
        );
        Ok(())
    }

    pub async fn get_endpoint_health(&self) -> HashMap<String, EndpointHealthStatus> {
        self.dispatcher.get_endpoint_health().await
    }

    pub async fn get_endpoint_status(&self) -> Vec<EndpointExecutorStatus> {
        self.dispatcher.get_endpoint_status().await
    }

    pub async fn close(&self) -> Result<(), RoutingError> {
        self.dispatcher.close().await?;
        info!(
            event = events::ROUTER_CLOSED,
            component = COMPONENT,
            router_id = %self.id,
            "router closed"
        );
        Ok(())
    }

    /// Applies what `config` still needs of `endpoint`: updated priorities,
    /// or removal when nothing references it.
    async fn reconcile_endpoint(
        &self,
        config: &RouterConfig,
        endpoint: &Endpoint,
    ) -> Result<(), RoutingError> {
        let priorities = config.priorities_for(endpoint.id());
        if priorities.is_empty() {
            return self.dispatcher.remove_endpoint(endpoint.id()).await;
        }
        let current = config
            .routes()
            .chain(config.fallback())
            .find(|route| route.endpoint().id() == endpoint.id())
            .map(|route| route.endpoint().clone())
            .unwrap_or_else(|| endpoint.clone());
        self.dispatcher.set_endpoint(current, priorities).await
    }
}
