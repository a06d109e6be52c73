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

//! Executor contract between the dispatcher and per-endpoint delivery.

use crate::checkpoint::CheckpointerFactory;
use crate::data_plane::health::{EndpointHealthStatus, HealthConfig};
use crate::data_plane::retry::RetryPolicy;
use crate::endpoint::Endpoint;
use crate::error::RoutingError;
use crate::message::Message;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

/// Delivery state machine position.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ExecutorState {
    #[default]
    Idle,
    Sending,
    Backoff,
    Dead,
    Closed,
}

impl Display for ExecutorState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExecutorState::Idle => "idle",
            ExecutorState::Sending => "sending",
            ExecutorState::Backoff => "backoff",
            ExecutorState::Dead => "dead",
            ExecutorState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Executor tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct EndpointExecutorConfig {
    pub retry_policy: RetryPolicy,
    /// How long a dead endpoint drops messages before delivery is tried again.
    pub revive_period: Duration,
    /// Applied to messages routed with a time-to-live of zero.
    pub default_time_to_live: Duration,
    pub max_batch_size: usize,
    pub health: HealthConfig,
}

impl Default for EndpointExecutorConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            revive_period: Duration::from_secs(60 * 60),
            default_time_to_live: Duration::from_secs(7200),
            max_batch_size: 10,
            health: HealthConfig::default(),
        }
    }
}

impl EndpointExecutorConfig {
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_revive_period(mut self, revive_period: Duration) -> Self {
        self.revive_period = revive_period;
        self
    }

    pub fn with_default_time_to_live(mut self, default_time_to_live: Duration) -> Self {
        self.default_time_to_live = default_time_to_live;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    pub fn with_health(mut self, health: HealthConfig) -> Self {
        self.health = health;
        self
    }
}

/// Point-in-time view of one executor.
#[derive(Clone, Debug, PartialEq)]
pub struct EndpointExecutorStatus {
    pub endpoint_id: String,
    pub state: ExecutorState,
    pub health: EndpointHealthStatus,
    pub delivered: u64,
    pub failed: u64,
    pub expired: u64,
    pub retries: u64,
    pub unhealthy_since: Option<SystemTime>,
    pub last_failed_revival_time: Option<SystemTime>,
    /// Queued message count per priority lane.
    pub queue_lengths: BTreeMap<u32, usize>,
}

/// Delivers messages for one endpoint.
#[async_trait]
pub trait EndpointExecutor: Send + Sync {
    /// Endpoint currently targeted.
    fn endpoint(&self) -> Arc<Endpoint>;

    /// Accepts `message` for delivery on the `priority` lane. Returns once the
    /// message is queued, not once it is delivered. A `time_to_live_secs` of
    /// zero selects the configured default.
    async fn invoke(
        &self,
        message: Message,
        priority: u32,
        time_to_live_secs: u32,
    ) -> Result<(), RoutingError>;

    /// Retargets the executor without dropping queued work.
    async fn set_endpoint(&self, endpoint: Endpoint, priorities: Vec<u32>)
        -> Result<(), RoutingError>;

    async fn status(&self) -> EndpointExecutorStatus;

    /// Stops delivery. Undelivered messages stay uncommitted.
    async fn close(&self) -> Result<(), RoutingError>;
}

/// Creates executors for the dispatcher.
#[async_trait]
pub trait EndpointExecutorFactory: Send + Sync {
    async fn create(
        &self,
        endpoint: Endpoint,
        priorities: Vec<u32>,
        checkpointer_factory: Arc<dyn CheckpointerFactory>,
        cancel: CancellationToken,
    ) -> Result<Arc<dyn EndpointExecutor>, RoutingError>;
}
