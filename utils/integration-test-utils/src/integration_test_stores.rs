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

use async_trait::async_trait;
use edge_router::{
    CheckpointData, CheckpointStore, CheckpointStoreError, ConfigListener, ConfigSource,
    ConfigurationError, InMemoryCheckpointStore, MessageStore, RoutingConfigDocument,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

/// Message store that only remembers its configured time-to-live.
#[derive(Default)]
pub struct InMemoryMessageStore {
    time_to_live: AsyncMutex<Option<Duration>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn time_to_live(&self) -> Option<Duration> {
        *self.time_to_live.lock().await
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn set_time_to_live(&self, time_to_live: Duration) {
        *self.time_to_live.lock().await = Some(time_to_live);
    }
}

/// Checkpoint store that keeps every write it receives, in order.
#[derive(Default)]
pub struct RecordingCheckpointStore {
    inner: InMemoryCheckpointStore,
    writes: AsyncMutex<Vec<(String, i64)>>,
    closes: AtomicUsize,
}

impl RecordingCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offsets written for `id`, oldest first.
    pub async fn offsets_written(&self, id: &str) -> Vec<i64> {
        self.writes
            .lock()
            .await
            .iter()
            .filter(|(written_id, _)| written_id == id)
            .map(|(_, offset)| *offset)
            .collect()
    }

    pub async fn write_count(&self) -> usize {
        self.writes.lock().await.len()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckpointStore for RecordingCheckpointStore {
    async fn get_checkpoint_data(&self, id: &str) -> Result<CheckpointData, CheckpointStoreError> {
        self.inner.get_checkpoint_data(id).await
    }

    async fn get_all_checkpoint_data(
        &self,
    ) -> Result<HashMap<String, CheckpointData>, CheckpointStoreError> {
        self.inner.get_all_checkpoint_data().await
    }

    async fn set_checkpoint_data(
        &self,
        id: &str,
        data: CheckpointData,
    ) -> Result<(), CheckpointStoreError> {
        self.writes.lock().await.push((id.to_string(), data.offset));
        self.inner.set_checkpoint_data(id, data).await
    }

    async fn close(&self) -> Result<(), CheckpointStoreError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await
    }
}

/// Configuration source fed by the test through [`InMemoryConfigSource::publish`].
#[derive(Default)]
pub struct InMemoryConfigSource {
    current: Mutex<Option<RoutingConfigDocument>>,
    listener: Mutex<Option<Arc<dyn ConfigListener>>>,
}

impl InMemoryConfigSource {
    pub fn new(initial: Option<RoutingConfigDocument>) -> Self {
        Self {
            current: Mutex::new(initial),
            listener: Mutex::new(None),
        }
    }

    pub fn has_listener(&self) -> bool {
        self.listener
            .lock()
            .map(|listener| listener.is_some())
            .unwrap_or(false)
    }

    /// Stores `document` and notifies the registered listener, if any.
    pub async fn publish(&self, document: RoutingConfigDocument) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(document.clone());
        }
        let listener = self
            .listener
            .lock()
            .ok()
            .and_then(|listener| listener.clone());
        if let Some(listener) = listener {
            listener.on_config_updated(document).await;
        }
    }
}

#[async_trait]
impl ConfigSource for InMemoryConfigSource {
    async fn get_config(&self) -> Result<Option<RoutingConfigDocument>, ConfigurationError> {
        Ok(self
            .current
            .lock()
            .ok()
            .and_then(|current| current.clone()))
    }

    fn set_config_listener(&self, listener: Arc<dyn ConfigListener>) {
        if let Ok(mut current) = self.listener.lock() {
            *current = Some(listener);
        }
    }
}
