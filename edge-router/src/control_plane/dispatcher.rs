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

//! Fan-out of routed messages to endpoint executors.

use crate::checkpoint::{Checkpointer, CheckpointerFactory, MasterCheckpointer};
use crate::control_plane::endpoint_table::{EndpointTable, ExecutorMap};
use crate::data_plane::endpoint_executor::{
    EndpointExecutor, EndpointExecutorFactory, EndpointExecutorStatus,
};
use crate::data_plane::health::EndpointHealthStatus;
use crate::endpoint::Endpoint;
use crate::error::RoutingError;
use crate::message::Message;
use crate::observability::{events, fields};
use crate::routing::RouteResult;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const COMPONENT: &str = "dispatcher";

/// Owns the live endpoint→executor table for one device identity.
///
/// Reads of the table never lock. Structural changes are serialized through
/// one mutex and published with a compare-and-swap, so a writer that lost a
/// race fails with [`RoutingError::StructuralRace`] instead of overwriting.
pub struct Dispatcher {
    id: String,
    table: EndpointTable,
    executor_factory: Arc<dyn EndpointExecutorFactory>,
    checkpointer: MasterCheckpointer,
    sync: Mutex<()>,
    cancel: CancellationToken,
    closed: AtomicBool,
    unmatched: AtomicU64,
}

impl Dispatcher {
    /// Creates a dispatcher with one executor per endpoint in `endpoints`.
    pub async fn create(
        id: &str,
        endpoints: HashMap<Endpoint, Vec<u32>>,
        executor_factory: Arc<dyn EndpointExecutorFactory>,
        checkpointer: MasterCheckpointer,
    ) -> Result<Self, RoutingError> {
        let cancel = CancellationToken::new();
        let factory: Arc<dyn CheckpointerFactory> = Arc::new(checkpointer.clone());
        let mut executors = ExecutorMap::new();
        for (endpoint, priorities) in endpoints {
            let endpoint_id = endpoint.id().to_string();
            let executor = executor_factory
                .create(endpoint, priorities, factory.clone(), cancel.child_token())
                .await?;
            executors.insert(endpoint_id, executor);
        }
        info!(
            event = events::ENDPOINTS_REPLACED,
            component = COMPONENT,
            dispatcher_id = id,
            count = executors.len(),
            "dispatcher created"
        );
        Ok(Self {
            id: id.to_string(),
            table: EndpointTable::new(executors),
            executor_factory,
            checkpointer,
            sync: Mutex::new(()),
            cancel,
            closed: AtomicBool::new(false),
            unmatched: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn checkpointer(&self) -> &MasterCheckpointer {
        &self.checkpointer
    }

    /// Messages that matched no route since creation.
    pub fn unmatched_count(&self) -> u64 {
        self.unmatched.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Ids of the endpoints that currently have an executor, sorted.
    pub fn endpoint_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.table.snapshot().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn executor(&self, endpoint_id: &str) -> Option<Arc<dyn EndpointExecutor>> {
        self.table.get(endpoint_id)
    }

    fn ensure_open(&self) -> Result<(), RoutingError> {
        if self.is_closed() {
            Err(RoutingError::DispatcherClosed)
        } else {
            Ok(())
        }
    }

    async fn lock(&self) -> Result<MutexGuard<'_, ()>, RoutingError> {
        self.ensure_open()?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.ensure_open()?;
                Err(RoutingError::Cancelled)
            }
            guard = self.sync.lock() => {
                self.ensure_open()?;
                Ok(guard)
            }
        }
    }

    fn checkpointer_factory(&self) -> Arc<dyn CheckpointerFactory> {
        Arc::new(self.checkpointer.clone())
    }

    /// Runs one step of a structural operation. Once close() has started the
    /// step is abandoned and any error is reported as a closed dispatcher.
    async fn unless_closed<T>(
        &self,
        step: impl Future<Output = Result<T, RoutingError>>,
    ) -> Result<T, RoutingError> {
        let result = tokio::select! {
            biased;
            result = step => result,
            _ = self.cancel.cancelled() => Err(RoutingError::DispatcherClosed),
        };
        match result {
            Err(_) if self.is_closed() => Err(RoutingError::DispatcherClosed),
            other => other,
        }
    }

    async fn create_executor(
        &self,
        endpoint: Endpoint,
        priorities: Vec<u32>,
    ) -> Result<Arc<dyn EndpointExecutor>, RoutingError> {
        let endpoint_id = endpoint.id().to_string();
        let executor = self
            .unless_closed(self.executor_factory.create(
                endpoint,
                priorities,
                self.checkpointer_factory(),
                self.cancel.child_token(),
            ))
            .await?;
        if self.is_closed() {
            self.close_quietly(&endpoint_id, &executor).await;
            return Err(RoutingError::DispatcherClosed);
        }
        Ok(executor)
    }

    async fn close_all(&self, executors: &[(String, Arc<dyn EndpointExecutor>)]) {
        for (endpoint_id, executor) in executors {
            self.close_quietly(endpoint_id, executor).await;
        }
    }

    /// Hands `message` to the executor of every routed endpoint and waits
    /// until each accepted it. With no routes the message is committed as
    /// unmatched.
    pub async fn dispatch(
        &self,
        message: &Message,
        routes: &HashSet<RouteResult>,
    ) -> Result<(), RoutingError> {
        self.ensure_open()?;
        let enqueued = Some(message.enqueued_time());
        if routes.is_empty() {
            self.unmatched.fetch_add(1, Ordering::Relaxed);
            debug!(
                event = events::DISPATCH_UNMATCHED,
                component = COMPONENT,
                dispatcher_id = %self.id,
                msg_id = %fields::format_message_id(message),
                source = %fields::format_message_source(message),
                offset = message.offset(),
                "no route matched; committing message"
            );
            return self
                .checkpointer
                .commit(std::slice::from_ref(message), &[], enqueued, enqueued)
                .await;
        }

        // Held until every executor proposed the message, so the aggregate
        // watermark cannot pass it while the fan-out is still running.
        self.checkpointer.propose(message).await;
        let snapshot = self.table.snapshot();
        let deliveries = routes.iter().filter_map(|route| {
            let executor = snapshot.get(route.endpoint().id())?.clone();
            Some(async move {
                let result = executor
                    .invoke(message.clone(), route.priority(), route.time_to_live_secs())
                    .await;
                (route.endpoint().id(), result)
            })
        });
        let results = join_all(deliveries).await;
        let released = self
            .checkpointer
            .commit(std::slice::from_ref(message), &[], enqueued, enqueued)
            .await;

        let mut first_error = None;
        for (endpoint_id, result) in results {
            let Err(err) = result else {
                continue;
            };
            if err.is_ignorable_on_dispatch() {
                debug!(
                    event = events::DISPATCH_FAILED,
                    component = COMPONENT,
                    dispatcher_id = %self.id,
                    endpoint_id,
                    err = %err,
                    "executor went away during dispatch"
                );
                continue;
            }
            warn!(
                event = events::DISPATCH_FAILED,
                component = COMPONENT,
                dispatcher_id = %self.id,
                endpoint_id,
                err = %err,
                "dispatch to endpoint failed"
            );
            first_error.get_or_insert(err);
        }
        match first_error {
            Some(err) => Err(err),
            None => released,
        }
    }

    /// Creates the executor for `endpoint`, or retargets the existing one.
    pub async fn set_endpoint(
        &self,
        endpoint: Endpoint,
        priorities: Vec<u32>,
    ) -> Result<(), RoutingError> {
        let _guard = self.lock().await?;
        let snapshot = self.table.snapshot();
        let endpoint_id = endpoint.id().to_string();

        if let Some(executor) = snapshot.get(&endpoint_id) {
            self.unless_closed(executor.set_endpoint(endpoint, priorities.clone()))
                .await?;
            info!(
                event = events::ENDPOINT_UPDATE,
                component = COMPONENT,
                dispatcher_id = %self.id,
                endpoint_id = %endpoint_id,
                priorities = ?priorities,
                "endpoint updated"
            );
            return Ok(());
        }

        let executor = self.create_executor(endpoint, priorities.clone()).await?;
        let mut next = (*snapshot).clone();
        next.insert(endpoint_id.clone(), executor.clone());
        if !self.table.publish(&snapshot, next) {
            self.close_quietly(&endpoint_id, &executor).await;
            return Err(RoutingError::StructuralRace { endpoint_id });
        }
        info!(
            event = events::ENDPOINT_ADD,
            component = COMPONENT,
            dispatcher_id = %self.id,
            endpoint_id = %endpoint_id,
            priorities = ?priorities,
            "endpoint added"
        );
        Ok(())
    }

    /// Removes and closes the executor of `endpoint_id`. Unknown ids are a no-op.
    pub async fn remove_endpoint(&self, endpoint_id: &str) -> Result<(), RoutingError> {
        self.remove_endpoints(&[endpoint_id.to_string()]).await
    }

    pub async fn remove_endpoints(&self, endpoint_ids: &[String]) -> Result<(), RoutingError> {
        let _guard = self.lock().await?;
        self.remove_locked(endpoint_ids).await.map(|_| ())
    }

    /// Unpublishes and closes `endpoint_ids`. The caller holds the structural
    /// mutex. Returns how many executors were removed.
    async fn remove_locked(&self, endpoint_ids: &[String]) -> Result<usize, RoutingError> {
        let snapshot = self.table.snapshot();
        let mut next = (*snapshot).clone();
        let removed: Vec<(String, Arc<dyn EndpointExecutor>)> = endpoint_ids
            .iter()
            .filter_map(|id| next.remove(id).map(|executor| (id.clone(), executor)))
            .collect();
        if removed.is_empty() {
            return Ok(0);
        }
        if !self.table.publish(&snapshot, next) {
            return Err(RoutingError::StructuralRace {
                endpoint_id: removed[0].0.clone(),
            });
        }
        for (endpoint_id, executor) in &removed {
            info!(
                event = events::ENDPOINT_REMOVE,
                component = COMPONENT,
                dispatcher_id = %self.id,
                endpoint_id = %endpoint_id,
                "endpoint removed"
            );
            self.close_quietly(endpoint_id, executor).await;
        }
        Ok(removed.len())
    }

    /// Makes the table hold exactly `endpoints`. Endpoints no longer listed
    /// are removed and closed first. New executors are then created, and
    /// survivors are retargeted only once every creation succeeded.
    pub async fn replace_endpoints(
        &self,
        endpoints: HashMap<Endpoint, Vec<u32>>,
    ) -> Result<(), RoutingError> {
        let _guard = self.lock().await?;
        let stale: Vec<String> = self
            .table
            .snapshot()
            .keys()
            .filter(|id| !endpoints.keys().any(|endpoint| endpoint.id() == id.as_str()))
            .cloned()
            .collect();
        let removed = self.remove_locked(&stale).await?;

        let snapshot = self.table.snapshot();
        let (surviving, added): (Vec<_>, Vec<_>) = endpoints
            .into_iter()
            .partition(|(endpoint, _)| snapshot.contains_key(endpoint.id()));

        let mut created: Vec<(String, Arc<dyn EndpointExecutor>)> = Vec::new();
        for (endpoint, priorities) in added {
            let endpoint_id = endpoint.id().to_string();
            match self.create_executor(endpoint, priorities).await {
                Ok(executor) => created.push((endpoint_id, executor)),
                Err(err) => {
                    self.close_all(&created).await;
                    return Err(err);
                }
            }
        }

        for (endpoint, priorities) in surviving {
            let Some(executor) = snapshot.get(endpoint.id()) else {
                continue;
            };
            if let Err(err) = self
                .unless_closed(executor.set_endpoint(endpoint, priorities))
                .await
            {
                self.close_all(&created).await;
                return Err(err);
            }
        }

        let mut next = (*snapshot).clone();
        next.extend(created.iter().cloned());
        let count = next.len();
        if !self.table.publish(&snapshot, next) {
            self.close_all(&created).await;
            return Err(RoutingError::StructuralRace {
                endpoint_id: created
                    .first()
                    .map(|(id, _)| id.clone())
                    .unwrap_or_default(),
            });
        }
        info!(
            event = events::ENDPOINTS_REPLACED,
            component = COMPONENT,
            dispatcher_id = %self.id,
            count,
            added = created.len(),
            removed,
            "endpoints replaced"
        );
        Ok(())
    }

    /// Health of every live endpoint.
    pub async fn get_endpoint_health(&self) -> HashMap<String, EndpointHealthStatus> {
        self.get_endpoint_status()
            .await
            .into_iter()
            .map(|status| (status.endpoint_id, status.health))
            .collect()
    }

    pub async fn get_endpoint_status(&self) -> Vec<EndpointExecutorStatus> {
        let snapshot = self.table.snapshot();
        let mut statuses = join_all(snapshot.values().map(|executor| executor.status())).await;
        statuses.sort_by(|a, b| a.endpoint_id.cmp(&b.endpoint_id));
        statuses
    }

    /// Closes every executor, then the checkpointer. Later calls are no-ops;
    /// every other operation fails with [`RoutingError::DispatcherClosed`].
    pub async fn close(&self) -> Result<(), RoutingError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.cancel.cancel();
        // A structural operation in progress sees the cancellation and
        // unwinds. Its executors are either published or closed by then.
        let _guard = self.sync.lock().await;
        let executors = self.table.take();
        join_all(
            executors
                .iter()
                .map(|(id, executor)| self.close_quietly(id, executor)),
        )
        .await;
        self.checkpointer.close().await?;
        info!(
            event = events::DISPATCHER_CLOSED,
            component = COMPONENT,
            dispatcher_id = %self.id,
            executors = executors.len(),
            unmatched = self.unmatched_count(),
            offset = self.checkpointer.offset(),
            "dispatcher closed"
        );
        Ok(())
    }

    async fn close_quietly(&self, endpoint_id: &str, executor: &Arc<dyn EndpointExecutor>) {
        if let Err(err) = executor.close().await {
            warn!(
                event = events::ENDPOINT_REMOVE,
                component = COMPONENT,
                dispatcher_id = %self.id,
                endpoint_id,
                err = %err,
                "failed to close endpoint executor"
            );
        }
    }
}
