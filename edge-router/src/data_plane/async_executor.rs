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

//! Queued endpoint executor.
//!
//! One delivery loop per endpoint drains priority lanes in ascending priority
//! value. Every lane owns a checkpointer; a message is proposed when queued and
//! committed once it is delivered, dropped, or expired. Messages still queued
//! when the executor shuts down stay uncommitted and are delivered again after
//! a restart.

use crate::checkpoint::{checkpointer_id, Checkpointer, CheckpointerFactory};
use crate::data_plane::endpoint_executor::{
    EndpointExecutor, EndpointExecutorConfig, EndpointExecutorFactory, EndpointExecutorStatus,
    ExecutorState,
};
use crate::data_plane::health::HealthTracker;
use crate::data_plane::retry::{retry, Attempt, RetryError};
use crate::data_plane::sink_result::{
    FailureKind, MergingSinkResult, SendFailureDetails, SinkResult,
};
use crate::endpoint::{DeliveryError, Endpoint};
use crate::error::RoutingError;
use crate::message::Message;
use crate::observability::{events, fields};
use crate::runtime::worker_runtime::{spawn_delivery_loop, DeliveryLoopHandle};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const COMPONENT: &str = "endpoint_executor";

struct QueuedMessage {
    message: Message,
    expires_at: Instant,
}

struct Lane {
    checkpointer: Arc<dyn Checkpointer>,
    queue: VecDeque<QueuedMessage>,
    /// A batch taken from this lane is being delivered.
    busy: bool,
    /// No longer configured; removed once drained.
    retired: bool,
}

impl Lane {
    async fn open(
        factory: &Arc<dyn CheckpointerFactory>,
        endpoint_id: &str,
        priority: u32,
    ) -> Result<Self, RoutingError> {
        Ok(Self {
            checkpointer: factory
                .create(&checkpointer_id(endpoint_id, priority))
                .await?,
            queue: VecDeque::new(),
            busy: false,
            retired: false,
        })
    }
}

struct Batch {
    priority: u32,
    checkpointer: Arc<dyn Checkpointer>,
    messages: Vec<QueuedMessage>,
}

struct BatchProgress {
    pending: Vec<Message>,
    outcome: MergingSinkResult<Message>,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    failed: AtomicU64,
    expired: AtomicU64,
    retries: AtomicU64,
}

fn encode_state(state: ExecutorState) -> u8 {
    match state {
        ExecutorState::Idle => 0,
        ExecutorState::Sending => 1,
        ExecutorState::Backoff => 2,
        ExecutorState::Dead => 3,
        ExecutorState::Closed => 4,
    }
}

fn decode_state(value: u8) -> ExecutorState {
    match value {
        1 => ExecutorState::Sending,
        2 => ExecutorState::Backoff,
        3 => ExecutorState::Dead,
        4 => ExecutorState::Closed,
        _ => ExecutorState::Idle,
    }
}

fn enqueue_bounds(messages: &[Message]) -> (Option<SystemTime>, Option<SystemTime>) {
    let times = messages.iter().map(Message::enqueued_time);
    (times.clone().min(), times.max())
}

struct ExecutorShared {
    endpoint: ArcSwap<Endpoint>,
    config: EndpointExecutorConfig,
    checkpointer_factory: Arc<dyn CheckpointerFactory>,
    lanes: Mutex<BTreeMap<u32, Lane>>,
    health: Mutex<HealthTracker>,
    state: AtomicU8,
    counters: Counters,
    wake: Notify,
    cancel: CancellationToken,
}

impl ExecutorShared {
    fn endpoint_id(&self) -> String {
        self.endpoint.load().id().to_string()
    }

    fn state(&self) -> ExecutorState {
        decode_state(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ExecutorState) {
        self.state.store(encode_state(state), Ordering::Release);
    }

    async fn run(self: Arc<Self>) {
        loop {
            let batch = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                batch = self.next_batch() => batch,
            };
            self.process_batch(batch).await;
        }
    }

    async fn next_batch(&self) -> Batch {
        loop {
            let notified = self.wake.notified();
            if let Some(batch) = self.take_batch().await {
                return batch;
            }
            if self.state() != ExecutorState::Dead {
                self.set_state(ExecutorState::Idle);
            }
            notified.await;
        }
    }

    async fn take_batch(&self) -> Option<Batch> {
        let mut lanes = self.lanes.lock().await;
        let (priority, lane) = lanes
            .iter_mut()
            .find(|(_, lane)| !lane.busy && !lane.queue.is_empty())?;
        let count = lane.queue.len().min(self.config.max_batch_size);
        lane.busy = true;
        Some(Batch {
            priority: *priority,
            checkpointer: lane.checkpointer.clone(),
            messages: lane.queue.drain(..count).collect(),
        })
    }

    async fn process_batch(&self, batch: Batch) {
        let Batch {
            priority,
            checkpointer,
            messages,
        } = batch;
        let now = Instant::now();
        let (live, expired): (Vec<QueuedMessage>, Vec<QueuedMessage>) =
            messages.into_iter().partition(|queued| queued.expires_at > now);
        let live: Vec<Message> = live.into_iter().map(|queued| queued.message).collect();
        let expired: Vec<Message> = expired.into_iter().map(|queued| queued.message).collect();

        if !expired.is_empty() {
            self.counters
                .expired
                .fetch_add(expired.len() as u64, Ordering::Relaxed);
            info!(
                event = events::EXECUTOR_MESSAGES_EXPIRED,
                component = COMPONENT,
                endpoint_id = %self.endpoint_id(),
                priority,
                count = expired.len(),
                offsets = %fields::format_offset_range(&expired),
                reason = fields::REASON_EXPIRED,
                "dropping expired messages"
            );
            self.commit(&checkpointer, &expired, &[]).await;
        }

        if !live.is_empty() {
            if self.drop_if_dead(now, priority, &checkpointer, &live).await {
                self.release_lane(priority).await;
                return;
            }
            self.deliver(priority, &checkpointer, live).await;
        }
        self.release_lane(priority).await;
    }

    /// Drops and checkpoints `messages` while the endpoint is dead. Starts a
    /// trial delivery once the revive period has passed.
    async fn drop_if_dead(
        &self,
        now: Instant,
        priority: u32,
        checkpointer: &Arc<dyn Checkpointer>,
        messages: &[Message],
    ) -> bool {
        {
            let mut health = self.health.lock().await;
            if !health.is_dead() {
                return false;
            }
            if health.revive_due(now, self.config.revive_period) {
                health.begin_revival();
                info!(
                    event = events::EXECUTOR_REVIVED,
                    component = COMPONENT,
                    endpoint_id = %self.endpoint_id(),
                    "revive period elapsed; attempting delivery"
                );
                return false;
            }
        }
        self.counters
            .failed
            .fetch_add(messages.len() as u64, Ordering::Relaxed);
        warn!(
            event = events::EXECUTOR_MESSAGES_DROPPED,
            component = COMPONENT,
            endpoint_id = %self.endpoint_id(),
            priority,
            count = messages.len(),
            reason = fields::REASON_DEAD,
            "endpoint is dead; dropping messages"
        );
        self.commit(checkpointer, messages, &[]).await;
        true
    }

    async fn deliver(
        &self,
        priority: u32,
        checkpointer: &Arc<dyn Checkpointer>,
        messages: Vec<Message>,
    ) {
        let progress = Arc::new(Mutex::new(BatchProgress {
            pending: messages,
            outcome: MergingSinkResult::new(),
        }));

        let result = retry(
            &self.config.retry_policy,
            &self.cancel,
            |attempt| self.attempt(progress.clone(), priority, attempt),
            |attempt, delay, err: &DeliveryError| {
                self.counters.retries.fetch_add(1, Ordering::Relaxed);
                self.set_state(ExecutorState::Backoff);
                debug!(
                    event = events::EXECUTOR_RETRY_SCHEDULED,
                    component = COMPONENT,
                    endpoint_id = %self.endpoint_id(),
                    priority,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    err = %err,
                    "retrying delivery"
                );
            },
        )
        .await;

        let (pending, outcome) = {
            let mut progress = progress.lock().await;
            (
                std::mem::take(&mut progress.pending),
                std::mem::take(&mut progress.outcome),
            )
        };
        let (succeeded, mut dropped, invalid, _) = outcome.into_sink_result().into_parts();
        dropped.extend(invalid.into_iter().map(|details| details.item));

        let now = Instant::now();
        match result {
            Err(_) if self.cancel.is_cancelled() => {
                // Delivered items are done; the rest is redelivered after restart.
                let mut done = succeeded;
                done.extend(dropped);
                self.commit(checkpointer, &done, &pending).await;
                return;
            }
            Ok(()) => {
                let mut health = self.health.lock().await;
                if dropped.is_empty() || !succeeded.is_empty() {
                    health.record_success();
                } else {
                    health.record_failure(now);
                }
            }
            Err(RetryError::Exhausted { last, attempts }) => {
                warn!(
                    event = events::EXECUTOR_SEND_FAILED,
                    component = COMPONENT,
                    endpoint_id = %self.endpoint_id(),
                    priority,
                    attempts,
                    count = pending.len(),
                    err = %last,
                    reason = fields::REASON_RETRIES_EXHAUSTED,
                    "delivery failed after retries; dropping messages"
                );
                dropped.extend(pending);
                self.health.lock().await.record_failure(now);
            }
            Err(RetryError::Fatal(err)) => {
                warn!(
                    event = events::EXECUTOR_DEAD,
                    component = COMPONENT,
                    endpoint_id = %self.endpoint_id(),
                    priority,
                    count = pending.len(),
                    err = %err,
                    "endpoint rejected delivery permanently"
                );
                dropped.extend(pending);
                self.health.lock().await.mark_dead(now);
            }
            Err(RetryError::Cancelled) => {
                self.commit(checkpointer, &succeeded, &pending).await;
                return;
            }
        }

        let dead = self.health.lock().await.is_dead();
        self.set_state(if dead {
            ExecutorState::Dead
        } else {
            ExecutorState::Idle
        });
        self.counters
            .delivered
            .fetch_add(succeeded.len() as u64, Ordering::Relaxed);
        self.counters
            .failed
            .fetch_add(dropped.len() as u64, Ordering::Relaxed);

        let mut done = succeeded;
        done.extend(dropped);
        self.commit(checkpointer, &done, &[]).await;
    }

    async fn attempt(
        &self,
        progress: Arc<Mutex<BatchProgress>>,
        priority: u32,
        attempt: u32,
    ) -> Attempt<(), DeliveryError> {
        let pending = progress.lock().await.pending.clone();
        if pending.is_empty() {
            return Attempt::Ok(());
        }
        self.set_state(ExecutorState::Sending);
        let endpoint = self.endpoint.load_full();
        debug!(
            event = events::EXECUTOR_SEND_ATTEMPT,
            component = COMPONENT,
            endpoint_id = endpoint.id(),
            priority,
            attempt,
            count = pending.len(),
            offsets = %fields::format_offset_range(&pending),
            "attempting delivery"
        );

        let processor = endpoint.processor();
        let result = tokio::select! {
            _ = self.cancel.cancelled() => {
                return Attempt::Retryable(DeliveryError::transient(fields::REASON_CANCELLED));
            }
            result = processor.process(&pending) => result,
        };

        let mut progress = progress.lock().await;
        match result {
            Ok(sink) => {
                let (succeeded, failed, invalid, send_failure) = sink.into_parts();
                let kind = send_failure
                    .as_ref()
                    .map(|details| details.kind)
                    .unwrap_or_default();
                let description = send_failure
                    .as_ref()
                    .map(|details| details.description.clone())
                    .unwrap_or_default();
                debug!(
                    event = events::EXECUTOR_SEND_OK,
                    component = COMPONENT,
                    endpoint_id = endpoint.id(),
                    priority,
                    succeeded = succeeded.len(),
                    failed = failed.len(),
                    invalid = invalid.len(),
                    "delivery attempt completed"
                );
                progress
                    .outcome
                    .merge(SinkResult::new(succeeded, Vec::new(), invalid, send_failure));

                if failed.is_empty() {
                    progress.pending.clear();
                    Attempt::Ok(())
                } else if kind == FailureKind::Transient {
                    progress.pending = failed;
                    Attempt::Retryable(DeliveryError::transient(description))
                } else {
                    debug!(
                        event = events::EXECUTOR_MESSAGES_DROPPED,
                        component = COMPONENT,
                        endpoint_id = endpoint.id(),
                        priority,
                        count = failed.len(),
                        reason = fields::REASON_NON_TRANSIENT,
                        "endpoint rejected messages"
                    );
                    progress
                        .outcome
                        .merge(SinkResult::new(Vec::new(), failed, Vec::new(), None));
                    progress.pending.clear();
                    Attempt::Ok(())
                }
            }
            Err(err) => {
                warn!(
                    event = events::EXECUTOR_SEND_FAILED,
                    component = COMPONENT,
                    endpoint_id = endpoint.id(),
                    priority,
                    attempt,
                    err = %err,
                    "delivery attempt failed"
                );
                if err.is_transient() {
                    progress
                        .outcome
                        .merge_failure(SendFailureDetails::transient(err.message.clone()));
                    Attempt::Retryable(err)
                } else {
                    progress
                        .outcome
                        .merge_failure(SendFailureDetails::non_transient(err.message.clone()));
                    Attempt::Fatal(err)
                }
            }
        }
    }

    async fn commit(
        &self,
        checkpointer: &Arc<dyn Checkpointer>,
        done: &[Message],
        held: &[Message],
    ) {
        if done.is_empty() && held.is_empty() {
            return;
        }
        let (min_enqueue_time, max_enqueue_time) = enqueue_bounds(done);
        if let Err(err) = checkpointer
            .commit(done, held, min_enqueue_time, max_enqueue_time)
            .await
        {
            warn!(
                event = events::CHECKPOINT_COMMIT_FAILED,
                component = COMPONENT,
                endpoint_id = %self.endpoint_id(),
                checkpointer_id = checkpointer.id(),
                err = %err,
                "failed to commit delivered messages"
            );
        }
    }

    /// Clears the busy mark and removes the lane if it is retired and drained.
    async fn release_lane(&self, priority: u32) {
        let retired = {
            let mut lanes = self.lanes.lock().await;
            let Some(lane) = lanes.get_mut(&priority) else {
                return;
            };
            lane.busy = false;
            if lane.retired && lane.queue.is_empty() {
                lanes.remove(&priority)
            } else {
                None
            }
        };
        if let Some(lane) = retired {
            self.close_checkpointer(&lane.checkpointer).await;
        }
    }

    async fn close_checkpointer(&self, checkpointer: &Arc<dyn Checkpointer>) {
        if let Err(err) = checkpointer.close().await {
            warn!(
                event = events::CHECKPOINTER_CLOSED,
                component = COMPONENT,
                checkpointer_id = checkpointer.id(),
                err = %err,
                "failed to close lane checkpointer"
            );
        }
    }
}

/// [`EndpointExecutor`] with per-priority queues and a background delivery loop.
pub struct AsyncEndpointExecutor {
    shared: Arc<ExecutorShared>,
    worker: Mutex<Option<DeliveryLoopHandle>>,
    closed: AtomicBool,
}

impl AsyncEndpointExecutor {
    /// Opens one lane per distinct priority and starts the delivery loop.
    pub async fn create(
        endpoint: Endpoint,
        priorities: Vec<u32>,
        config: EndpointExecutorConfig,
        checkpointer_factory: Arc<dyn CheckpointerFactory>,
        cancel: CancellationToken,
    ) -> Result<Self, RoutingError> {
        let mut lanes = BTreeMap::new();
        for priority in priorities.iter().copied().collect::<BTreeSet<u32>>() {
            lanes.insert(
                priority,
                Lane::open(&checkpointer_factory, endpoint.id(), priority).await?,
            );
        }
        let endpoint_id = endpoint.id().to_string();
        let shared = Arc::new(ExecutorShared {
            endpoint: ArcSwap::from_pointee(endpoint),
            health: Mutex::new(HealthTracker::new(config.health.clone())),
            config,
            checkpointer_factory,
            lanes: Mutex::new(lanes),
            state: AtomicU8::new(encode_state(ExecutorState::Idle)),
            counters: Counters::default(),
            wake: Notify::new(),
            cancel,
        });
        let worker = spawn_delivery_loop(&endpoint_id, shared.clone().run());
        info!(
            event = events::EXECUTOR_CREATED,
            component = COMPONENT,
            endpoint_id = %endpoint_id,
            worker_id = worker.worker_id(),
            priorities = ?priorities,
            "endpoint executor created"
        );
        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), RoutingError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RoutingError::ExecutorClosed);
        }
        if self.shared.cancel.is_cancelled() {
            return Err(RoutingError::Cancelled);
        }
        Ok(())
    }
}

#[async_trait]
impl EndpointExecutor for AsyncEndpointExecutor {
    fn endpoint(&self) -> Arc<Endpoint> {
        self.shared.endpoint.load_full()
    }

    async fn invoke(
        &self,
        message: Message,
        priority: u32,
        time_to_live_secs: u32,
    ) -> Result<(), RoutingError> {
        self.ensure_open()?;
        let time_to_live = if time_to_live_secs == 0 {
            self.shared.config.default_time_to_live
        } else {
            Duration::from_secs(u64::from(time_to_live_secs))
        };

        let mut lanes = self.shared.lanes.lock().await;
        // close() may have drained the lanes while this call waited.
        self.ensure_open()?;
        if !lanes.contains_key(&priority) {
            let lane = Lane::open(
                &self.shared.checkpointer_factory,
                &self.shared.endpoint_id(),
                priority,
            )
            .await?;
            lanes.insert(priority, lane);
        }
        let Some(lane) = lanes.get_mut(&priority) else {
            return Err(RoutingError::ExecutorClosed);
        };
        lane.checkpointer.propose(&message).await;
        lane.queue.push_back(QueuedMessage {
            message,
            expires_at: Instant::now() + time_to_live,
        });
        drop(lanes);
        self.shared.wake.notify_one();
        Ok(())
    }

    async fn set_endpoint(
        &self,
        endpoint: Endpoint,
        priorities: Vec<u32>,
    ) -> Result<(), RoutingError> {
        self.ensure_open()?;
        let endpoint_id = endpoint.id().to_string();
        self.shared.endpoint.store(Arc::new(endpoint));

        let wanted: BTreeSet<u32> = priorities.iter().copied().collect();
        let mut closing = Vec::new();
        {
            let mut lanes = self.shared.lanes.lock().await;
            self.ensure_open()?;
            for priority in &wanted {
                match lanes.get_mut(priority) {
                    Some(lane) => lane.retired = false,
                    None => {
                        let lane =
                            Lane::open(&self.shared.checkpointer_factory, &endpoint_id, *priority)
                                .await?;
                        lanes.insert(*priority, lane);
                    }
                }
            }
            lanes.retain(|priority, lane| {
                if wanted.contains(priority) {
                    return true;
                }
                if lane.queue.is_empty() && !lane.busy {
                    closing.push(lane.checkpointer.clone());
                    return false;
                }
                lane.retired = true;
                true
            });
        }
        for checkpointer in &closing {
            self.shared.close_checkpointer(checkpointer).await;
        }

        {
            let mut health = self.shared.health.lock().await;
            if health.is_dead() {
                health.reset();
                self.shared.set_state(ExecutorState::Idle);
                info!(
                    event = events::EXECUTOR_REVIVED,
                    component = COMPONENT,
                    endpoint_id = %endpoint_id,
                    "endpoint updated; leaving dead state"
                );
            }
        }
        info!(
            event = events::EXECUTOR_ENDPOINT_UPDATED,
            component = COMPONENT,
            endpoint_id = %endpoint_id,
            priorities = ?priorities,
            "endpoint executor updated"
        );
        self.shared.wake.notify_one();
        Ok(())
    }

    async fn status(&self) -> EndpointExecutorStatus {
        let (health, unhealthy_since, last_failed_revival_time) = {
            let health = self.shared.health.lock().await;
            (
                health.status(),
                health.unhealthy_since(),
                health.last_failed_revival_time(),
            )
        };
        let queue_lengths = self
            .shared
            .lanes
            .lock()
            .await
            .iter()
            .map(|(priority, lane)| (*priority, lane.queue.len()))
            .collect();
        let counters = &self.shared.counters;
        EndpointExecutorStatus {
            endpoint_id: self.shared.endpoint_id(),
            state: self.shared.state(),
            health,
            delivered: counters.delivered.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            expired: counters.expired.load(Ordering::Relaxed),
            retries: counters.retries.load(Ordering::Relaxed),
            unhealthy_since,
            last_failed_revival_time,
            queue_lengths,
        }
    }

    async fn close(&self) -> Result<(), RoutingError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // A cancelled parent means shutdown: lane checkpoints must keep their
        // undelivered messages.
        let shutting_down = self.shared.cancel.is_cancelled();
        self.shared.cancel.cancel();
        if let Some(worker) = self.worker.lock().await.take() {
            worker.join().await;
        }
        self.shared.set_state(ExecutorState::Closed);

        let lanes = std::mem::take(&mut *self.shared.lanes.lock().await);
        let abandoned: usize = lanes.values().map(|lane| lane.queue.len()).sum();
        if !shutting_down {
            for lane in lanes.values() {
                self.shared.close_checkpointer(&lane.checkpointer).await;
            }
        }
        self.shared.endpoint.load_full().processor().close().await;
        info!(
            event = events::EXECUTOR_CLOSED,
            component = COMPONENT,
            endpoint_id = %self.shared.endpoint_id(),
            abandoned,
            shutting_down,
            "endpoint executor closed"
        );
        Ok(())
    }
}

/// Builds [`AsyncEndpointExecutor`]s sharing one configuration.
#[derive(Clone, Debug, Default)]
pub struct AsyncEndpointExecutorFactory {
    config: EndpointExecutorConfig,
}

impl AsyncEndpointExecutorFactory {
    pub fn new(config: EndpointExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EndpointExecutorConfig {
        &self.config
    }
}

#[async_trait]
impl EndpointExecutorFactory for AsyncEndpointExecutorFactory {
    async fn create(
        &self,
        endpoint: Endpoint,
        priorities: Vec<u32>,
        checkpointer_factory: Arc<dyn CheckpointerFactory>,
        cancel: CancellationToken,
    ) -> Result<Arc<dyn EndpointExecutor>, RoutingError> {
        let executor = AsyncEndpointExecutor::create(
            endpoint,
            priorities,
            self.config.clone(),
            checkpointer_factory,
            cancel,
        )
        .await?;
        Ok(Arc::new(executor))
    }
}
