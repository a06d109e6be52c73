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

use crate::checkpoint::store::{CheckpointData, CheckpointStore};
use crate::checkpoint::INVALID_OFFSET;
use crate::error::RoutingError;
use crate::message::Message;
use crate::observability::events;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;
use tracing::debug;

const COMPONENT: &str = "checkpointer";

/// Tracks the delivery watermark of one message stream.
///
/// `offset()` only ever grows. It never passes an offset that was proposed
/// and is still in flight, or that was committed as failed.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    fn id(&self) -> &str;

    /// Last persisted watermark, or [`INVALID_OFFSET`].
    fn offset(&self) -> i64;

    /// Registers a message that is about to be delivered.
    async fn propose(&self, message: &Message);

    /// Marks `succeeded` as done and keeps `failed` in flight. Persists the
    /// watermark when it advances.
    async fn commit(
        &self,
        succeeded: &[Message],
        failed: &[Message],
        min_enqueue_time: Option<SystemTime>,
        max_enqueue_time: Option<SystemTime>,
    ) -> Result<(), RoutingError>;

    async fn close(&self) -> Result<(), RoutingError>;
}

/// Creates checkpointers by id.
#[async_trait]
pub trait CheckpointerFactory: Send + Sync {
    async fn create(&self, id: &str) -> Result<Arc<dyn Checkpointer>, RoutingError>;
}

/// Offset bookkeeping shared by the persistent and master checkpointers.
#[derive(Debug)]
pub(crate) struct CheckpointState {
    offset: i64,
    completed: i64,
    in_flight: BTreeMap<i64, usize>,
}

impl CheckpointState {
    pub(crate) fn new(offset: i64) -> Self {
        Self {
            offset,
            completed: offset,
            in_flight: BTreeMap::new(),
        }
    }

    pub(crate) fn offset(&self) -> i64 {
        self.offset
    }

    pub(crate) fn has_outstanding(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub(crate) fn outstanding(&self) -> Vec<i64> {
        self.in_flight
            .iter()
            .flat_map(|(offset, count)| std::iter::repeat(*offset).take(*count))
            .collect()
    }

    pub(crate) fn propose(&mut self, offset: i64) {
        if offset == INVALID_OFFSET {
            return;
        }
        *self.in_flight.entry(offset).or_insert(0) += 1;
    }

    /// Completes one reference to `offset`. Returns whether it was in flight.
    pub(crate) fn complete(&mut self, offset: i64) -> bool {
        if offset == INVALID_OFFSET {
            return false;
        }
        self.completed = self.completed.max(offset);
        let Some(count) = self.in_flight.get_mut(&offset) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.in_flight.remove(&offset);
        }
        true
    }

    /// Records a completion of an offset that was never proposed here.
    pub(crate) fn observe(&mut self, offset: i64) {
        if offset != INVALID_OFFSET {
            self.completed = self.completed.max(offset);
        }
    }

    /// Keeps `offset` holding the watermark back. Returns whether it was added.
    pub(crate) fn hold(&mut self, offset: i64) -> bool {
        if offset == INVALID_OFFSET || offset <= self.offset {
            return false;
        }
        if self.in_flight.contains_key(&offset) {
            return false;
        }
        self.in_flight.insert(offset, 1);
        true
    }

    /// Moves the watermark forward when possible and returns the new value.
    pub(crate) fn advance(&mut self) -> Option<i64> {
        let candidate = match self.in_flight.keys().next() {
            Some(lowest) => self.completed.min(lowest - 1),
            None => self.completed,
        };
        if candidate > self.offset {
            self.offset = candidate;
            Some(candidate)
        } else {
            None
        }
    }
}

/// Offsets of the messages that carry one.
pub(crate) fn offsets(messages: &[Message]) -> impl Iterator<Item = i64> + '_ {
    messages
        .iter()
        .map(Message::offset)
        .filter(|offset| *offset != INVALID_OFFSET)
}

/// Checkpointer persisting its watermark to a [`CheckpointStore`].
pub struct StoreCheckpointer {
    id: String,
    store: Arc<dyn CheckpointStore>,
    state: Mutex<CheckpointState>,
    offset: AtomicI64,
    closed: AtomicBool,
}

impl StoreCheckpointer {
    /// Loads the last persisted watermark for `id`.
    pub async fn create(id: &str, store: Arc<dyn CheckpointStore>) -> Result<Self, RoutingError> {
        let data = store.get_checkpoint_data(id).await?;
        debug!(
            event = events::CHECKPOINTER_CREATED,
            component = COMPONENT,
            checkpointer_id = id,
            offset = data.offset,
            "checkpointer created"
        );
        Ok(Self {
            id: id.to_string(),
            store,
            state: Mutex::new(CheckpointState::new(data.offset)),
            offset: AtomicI64::new(data.offset),
            closed: AtomicBool::new(false),
        })
    }

    pub async fn has_outstanding(&self) -> bool {
        self.state.lock().await.has_outstanding()
    }

    fn ensure_open(&self) -> Result<(), RoutingError> {
        if self.closed.load(Ordering::Acquire) {
            Err(RoutingError::CheckpointerClosed(self.id.clone()))
        } else {
            Ok(())
        }
    }

    /// Applies a commit and reports which offsets changed state, so a master
    /// checkpointer can mirror them.
    pub(crate) async fn commit_tracked(
        &self,
        succeeded: &[Message],
        failed: &[Message],
        min_enqueue_time: Option<SystemTime>,
        max_enqueue_time: Option<SystemTime>,
    ) -> Result<CommitDelta, RoutingError> {
        self.ensure_open()?;
        let mut delta = CommitDelta::default();
        let mut state = self.state.lock().await;
        for offset in offsets(failed) {
            if state.hold(offset) {
                delta.held.push(offset);
            }
        }
        for offset in offsets(succeeded) {
            if state.complete(offset) {
                delta.released.push(offset);
            } else {
                delta.observed.push(offset);
            }
        }
        if let Some(offset) = state.advance() {
            // Persisting under the state lock keeps store writes in watermark order.
            self.store
                .set_checkpoint_data(
                    &self.id,
                    CheckpointData {
                        offset,
                        min_enqueue_time,
                        max_enqueue_time,
                    },
                )
                .await?;
            self.offset.store(offset, Ordering::Release);
            debug!(
                event = events::CHECKPOINT_ADVANCED,
                component = COMPONENT,
                checkpointer_id = %self.id,
                offset,
                "checkpoint advanced"
            );
        }
        Ok(delta)
    }

    /// Marks the checkpointer closed and returns the offsets it still held.
    pub(crate) async fn close_tracked(&self) -> Option<Vec<i64>> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return None;
        }
        let state = self.state.lock().await;
        Some(state.outstanding())
    }
}

/// Offset transitions produced by one commit.
#[derive(Debug, Default)]
pub(crate) struct CommitDelta {
    /// Completed offsets that were in flight here.
    pub(crate) released: Vec<i64>,
    /// Completed offsets that were never proposed here.
    pub(crate) observed: Vec<i64>,
    /// Failed offsets newly holding the watermark.
    pub(crate) held: Vec<i64>,
}

#[async_trait]
impl Checkpointer for StoreCheckpointer {
    fn id(&self) -> &str {
        &self.id
    }

    fn offset(&self) -> i64 {
        self.offset.load(Ordering::Acquire)
    }

    async fn propose(&self, message: &Message) {
        self.state.lock().await.propose(message.offset());
    }

    async fn commit(
        &self,
        succeeded: &[Message],
        failed: &[Message],
        min_enqueue_time: Option<SystemTime>,
        max_enqueue_time: Option<SystemTime>,
    ) -> Result<(), RoutingError> {
        self.commit_tracked(succeeded, failed, min_enqueue_time, max_enqueue_time)
            .await
            .map(|_| ())
    }

    async fn close(&self) -> Result<(), RoutingError> {
        self.close_tracked().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CheckpointState, Checkpointer, StoreCheckpointer};
    use crate::checkpoint::{
        CheckpointData, CheckpointStore, InMemoryCheckpointStore, INVALID_OFFSET,
    };
    use crate::message::{Message, MessageSource};
    use crate::RoutingError;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn message(offset: i64) -> Message {
        Message::builder(MessageSource::Telemetry)
            .with_offset(offset)
            .build()
    }

    #[test]
    fn watermark_stops_below_lowest_in_flight_offset() {
        let mut state = CheckpointState::new(INVALID_OFFSET);
        for offset in 0..4 {
            state.propose(offset);
        }
        state.complete(0);
        state.complete(2);
        state.complete(3);

        assert_eq!(state.advance(), Some(0));
        assert_eq!(state.advance(), None);

        state.complete(1);
        assert_eq!(state.advance(), Some(3));
    }

    #[test]
    fn duplicate_proposals_are_reference_counted() {
        let mut state = CheckpointState::new(INVALID_OFFSET);
        state.propose(5);
        state.propose(5);
        state.complete(5);

        assert!(state.has_outstanding());
        assert_eq!(state.advance(), None);

        state.complete(5);
        assert_eq!(state.advance(), Some(5));
    }

    #[test]
    fn stale_completions_never_regress() {
        let mut state = CheckpointState::new(9);
        state.complete(4);

        assert_eq!(state.advance(), None);
        assert_eq!(state.offset(), 9);
    }

    #[tokio::test]
    async fn failed_messages_hold_the_persisted_watermark() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let checkpointer = StoreCheckpointer::create("ep", store.clone())
            .await
            .expect("store open");
        let batch: Vec<Message> = (10..14).map(message).collect();
        for msg in &batch {
            checkpointer.propose(msg).await;
        }

        checkpointer
            .commit(
                &[batch[0].clone(), batch[2].clone(), batch[3].clone()],
                &[batch[1].clone()],
                None,
                None,
            )
            .await
            .expect("commit");
        assert_eq!(checkpointer.offset(), 10);
        assert_eq!(
            store.get_checkpoint_data("ep").await.expect("store").offset,
            10
        );

        checkpointer
            .commit(&[batch[1].clone()], &[], None, None)
            .await
            .expect("commit");
        assert_eq!(checkpointer.offset(), 13);
        assert!(!checkpointer.has_outstanding().await);
    }

    #[tokio::test]
    async fn resumes_from_persisted_offset() {
        let store = Arc::new(InMemoryCheckpointStore::with_entries(HashMap::from([(
            "ep".to_string(),
            CheckpointData::new(41),
        )])));

        let checkpointer = StoreCheckpointer::create("ep", store)
            .await
            .expect("store open");

        assert_eq!(checkpointer.offset(), 41);
    }

    #[tokio::test]
    async fn commit_after_close_fails() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let checkpointer = StoreCheckpointer::create("ep", store)
            .await
            .expect("store open");
        checkpointer.close().await.expect("close");
        checkpointer.close().await.expect("close is idempotent");

        let result = checkpointer.commit(&[message(1)], &[], None, None).await;

        assert!(matches!(result, Err(RoutingError::CheckpointerClosed(id)) if id == "ep"));
    }
}
