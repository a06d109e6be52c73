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

//! Aggregate checkpointer for the whole message stream.
//!
//! Every child created through [`MasterCheckpointer`] mirrors its proposals and
//! completions into the master. The master watermark therefore only passes an
//! offset once no child still holds it and unmatched messages were committed
//! directly.

use crate::checkpoint::checkpointer::{
    offsets, CheckpointState, Checkpointer, CheckpointerFactory, StoreCheckpointer,
};
use crate::checkpoint::store::{CheckpointData, CheckpointStore};
use crate::error::RoutingError;
use crate::message::Message;
use crate::observability::events;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const COMPONENT: &str = "master_checkpointer";

struct MasterInner {
    id: String,
    store: Arc<dyn CheckpointStore>,
    state: Mutex<CheckpointState>,
    offset: AtomicI64,
    children: Mutex<HashMap<String, Arc<ChildCheckpointer>>>,
    closed: AtomicBool,
}

/// Owns the checkpoint store and the per-lane checkpointers built on it.
#[derive(Clone)]
pub struct MasterCheckpointer {
    inner: Arc<MasterInner>,
}

impl MasterCheckpointer {
    pub async fn create(id: &str, store: Arc<dyn CheckpointStore>) -> Result<Self, RoutingError> {
        let data = store.get_checkpoint_data(id).await?;
        info!(
            event = events::CHECKPOINTER_CREATED,
            component = COMPONENT,
            checkpointer_id = id,
            offset = data.offset,
            "master checkpointer created"
        );
        Ok(Self {
            inner: Arc::new(MasterInner {
                id: id.to_string(),
                store,
                state: Mutex::new(CheckpointState::new(data.offset)),
                offset: AtomicI64::new(data.offset),
                children: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Ids of the children that are still open.
    pub async fn child_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.children.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn has_outstanding(&self) -> bool {
        self.inner.state.lock().await.has_outstanding()
    }

    fn ensure_open(&self) -> Result<(), RoutingError> {
        self.inner.ensure_open()
    }
}

impl MasterInner {
    fn ensure_open(&self) -> Result<(), RoutingError> {
        if self.closed.load(Ordering::Acquire) {
            Err(RoutingError::CheckpointerClosed(self.id.clone()))
        } else {
            Ok(())
        }
    }

    async fn apply(
        &self,
        update: impl FnOnce(&mut CheckpointState),
        min_enqueue_time: Option<SystemTime>,
        max_enqueue_time: Option<SystemTime>,
    ) -> Result<(), RoutingError> {
        let mut state = self.state.lock().await;
        update(&mut state);
        let Some(offset) = state.advance() else {
            return Ok(());
        };
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
            "master checkpoint advanced"
        );
        Ok(())
    }
}

#[async_trait]
impl Checkpointer for MasterCheckpointer {
    fn id(&self) -> &str {
        &self.inner.id
    }

    fn offset(&self) -> i64 {
        self.inner.offset.load(Ordering::Acquire)
    }

    async fn propose(&self, message: &Message) {
        self.inner.state.lock().await.propose(message.offset());
    }

    /// Direct commit, used for messages no route matched.
    async fn commit(
        &self,
        succeeded: &[Message],
        failed: &[Message],
        min_enqueue_time: Option<SystemTime>,
        max_enqueue_time: Option<SystemTime>,
    ) -> Result<(), RoutingError> {
        self.ensure_open()?;
        self.inner
            .apply(
                |state| {
                    for offset in offsets(failed) {
                        state.hold(offset);
                    }
                    for offset in offsets(succeeded) {
                        state.complete(offset);
                    }
                },
                min_enqueue_time,
                max_enqueue_time,
            )
            .await
    }

    /// Closes every child, then the store. Later calls are no-ops.
    async fn close(&self) -> Result<(), RoutingError> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let children: Vec<Arc<ChildCheckpointer>> =
            self.inner.children.lock().await.drain().map(|(_, c)| c).collect();
        for child in children {
            child.own.close_tracked().await;
        }
        self.inner.store.close().await?;
        info!(
            event = events::CHECKPOINTER_CLOSED,
            component = COMPONENT,
            checkpointer_id = %self.inner.id,
            offset = self.offset(),
            "master checkpointer closed"
        );
        Ok(())
    }
}

#[async_trait]
impl CheckpointerFactory for MasterCheckpointer {
    async fn create(&self, id: &str) -> Result<Arc<dyn Checkpointer>, RoutingError> {
        self.ensure_open()?;
        let mut children = self.inner.children.lock().await;
        if let Some(existing) = children.get(id) {
            return Ok(existing.clone());
        }
        let child = Arc::new(ChildCheckpointer {
            own: StoreCheckpointer::create(id, self.inner.store.clone()).await?,
            master: self.inner.clone(),
        });
        children.insert(id.to_string(), child.clone());
        Ok(child)
    }
}

/// Per-lane checkpointer that mirrors its bookkeeping into the master.
struct ChildCheckpointer {
    own: StoreCheckpointer,
    master: Arc<MasterInner>,
}

#[async_trait]
impl Checkpointer for ChildCheckpointer {
    fn id(&self) -> &str {
        self.own.id()
    }

    fn offset(&self) -> i64 {
        self.own.offset()
    }

    async fn propose(&self, message: &Message) {
        self.own.propose(message).await;
        self.master.state.lock().await.propose(message.offset());
    }

    async fn commit(
        &self,
        succeeded: &[Message],
        failed: &[Message],
        min_enqueue_time: Option<SystemTime>,
        max_enqueue_time: Option<SystemTime>,
    ) -> Result<(), RoutingError> {
        let delta = self
            .own
            .commit_tracked(succeeded, failed, min_enqueue_time, max_enqueue_time)
            .await?;
        if self.master.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        self.master
            .apply(
                |state| {
                    for offset in &delta.held {
                        state.propose(*offset);
                    }
                    for offset in &delta.released {
                        state.complete(*offset);
                    }
                    for offset in &delta.observed {
                        state.observe(*offset);
                    }
                },
                min_enqueue_time,
                max_enqueue_time,
            )
            .await
    }

    /// Releases whatever this child still held so the master can advance.
    async fn close(&self) -> Result<(), RoutingError> {
        let Some(outstanding) = self.own.close_tracked().await else {
            return Ok(());
        };
        {
            let mut children = self.master.children.lock().await;
            if children
                .get(self.own.id())
                .is_some_and(|c| std::ptr::eq(Arc::as_ptr(c), self))
            {
                children.remove(self.own.id());
            }
        }
        if self.master.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        if !outstanding.is_empty() {
            warn!(
                event = events::CHECKPOINTER_CLOSED,
                component = COMPONENT,
                checkpointer_id = %self.own.id(),
                released = outstanding.len(),
                "checkpointer closed with undelivered messages"
            );
        }
        self.master
            .apply(
                |state| {
                    for offset in &outstanding {
                        state.complete(*offset);
                    }
                },
                None,
                None,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::MasterCheckpointer;
    use crate::checkpoint::{
        CheckpointStore, Checkpointer, CheckpointerFactory, InMemoryCheckpointStore, INVALID_OFFSET,
    };
    use crate::message::{Message, MessageSource};
    use std::sync::Arc;

    fn message(offset: i64) -> Message {
        Message::builder(MessageSource::Telemetry)
            .with_offset(offset)
            .build()
    }

    async fn master() -> (MasterCheckpointer, Arc<InMemoryCheckpointStore>) {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let master = MasterCheckpointer::create("$master", store.clone())
            .await
            .expect("store open");
        (master, store)
    }

    #[tokio::test]
    async fn master_waits_for_the_slowest_child() {
        let (master, _) = master().await;
        let fast = master.create("fast").await.expect("child");
        let slow = master.create("slow").await.expect("child");
        let batch: Vec<Message> = (0..3).map(message).collect();
        for msg in &batch {
            fast.propose(msg).await;
            slow.propose(msg).await;
        }

        fast.commit(&batch, &[], None, None).await.expect("commit");
        assert_eq!(fast.offset(), 2);
        assert_eq!(master.offset(), INVALID_OFFSET);

        slow.commit(&batch[..1], &[], None, None)
            .await
            .expect("commit");
        assert_eq!(master.offset(), 0);

        slow.commit(&batch[1..], &[], None, None)
            .await
            .expect("commit");
        assert_eq!(master.offset(), 2);
    }

    #[tokio::test]
    async fn unmatched_messages_advance_the_master_directly() {
        let (master, store) = master().await;

        master
            .commit(&[message(0), message(1)], &[], None, None)
            .await
            .expect("commit");

        assert_eq!(master.offset(), 1);
        assert_eq!(
            store
                .get_checkpoint_data("$master")
                .await
                .expect("store")
                .offset,
            1
        );
    }

    #[tokio::test]
    async fn closing_a_child_releases_its_messages() {
        let (master, _) = master().await;
        let child = master.create("ep").await.expect("child");
        child.propose(&message(0)).await;
        assert!(master.has_outstanding().await);

        child.close().await.expect("close");

        assert!(!master.has_outstanding().await);
        assert!(master.child_ids().await.is_empty());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_closes_the_store() {
        let (master, store) = master().await;
        master.create("ep").await.expect("child");

        master.close().await.expect("close");
        master.close().await.expect("second close");

        assert!(store.get_checkpoint_data("ep").await.is_err());
        assert!(master.create("other").await.is_err());
    }
}
