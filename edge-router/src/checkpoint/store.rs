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

//! Durable checkpoint persistence contract and an in-memory implementation.

use crate::checkpoint::INVALID_OFFSET;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;
use thiserror::Error;
use tokio::sync::Mutex;

/// Persisted watermark of one checkpointer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointData {
    pub offset: i64,
    pub min_enqueue_time: Option<SystemTime>,
    pub max_enqueue_time: Option<SystemTime>,
}

impl CheckpointData {
    pub fn new(offset: i64) -> Self {
        Self {
            offset,
            min_enqueue_time: None,
            max_enqueue_time: None,
        }
    }

    /// Data for a checkpointer that never committed: deliver from the earliest message.
    pub fn unset() -> Self {
        Self::new(INVALID_OFFSET)
    }

    pub fn is_unset(&self) -> bool {
        self.offset == INVALID_OFFSET
    }
}

impl Default for CheckpointData {
    fn default() -> Self {
        Self::unset()
    }
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CheckpointStoreError {
    #[error("checkpoint store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt checkpoint data for '{id}': {reason}")]
    Corrupt { id: String, reason: String },
    #[error("checkpoint store is closed")]
    Closed,
}

/// Persists checkpoint data keyed by checkpointer id.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Returns [`CheckpointData::unset`] for ids that were never written.
    async fn get_checkpoint_data(&self, id: &str) -> Result<CheckpointData, CheckpointStoreError>;

    async fn get_all_checkpoint_data(
        &self,
    ) -> Result<HashMap<String, CheckpointData>, CheckpointStoreError>;

    async fn set_checkpoint_data(
        &self,
        id: &str,
        data: CheckpointData,
    ) -> Result<(), CheckpointStoreError>;

    async fn close(&self) -> Result<(), CheckpointStoreError>;
}

/// Process-local store, for tests and deployments without durable storage.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    entries: Mutex<HashMap<String, CheckpointData>>,
    closed: AtomicBool,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with existing checkpoints, as after a restart.
    pub fn with_entries(entries: HashMap<String, CheckpointData>) -> Self {
        Self {
            entries: Mutex::new(entries),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), CheckpointStoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(CheckpointStoreError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn get_checkpoint_data(&self, id: &str) -> Result<CheckpointData, CheckpointStoreError> {
        self.ensure_open()?;
        Ok(self
            .entries
            .lock()
            .await
            .get(id)
            .cloned()
            .unwrap_or_else(CheckpointData::unset))
    }

    async fn get_all_checkpoint_data(
        &self,
    ) -> Result<HashMap<String, CheckpointData>, CheckpointStoreError> {
        self.ensure_open()?;
        Ok(self.entries.lock().await.clone())
    }

    async fn set_checkpoint_data(
        &self,
        id: &str,
        data: CheckpointData,
    ) -> Result<(), CheckpointStoreError> {
        self.ensure_open()?;
        self.entries.lock().await.insert(id.to_string(), data);
        Ok(())
    }

    async fn close(&self) -> Result<(), CheckpointStoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CheckpointData, CheckpointStore, CheckpointStoreError, InMemoryCheckpointStore};

    #[tokio::test]
    async fn missing_entries_read_as_unset() {
        let store = InMemoryCheckpointStore::new();

        let data = store
            .get_checkpoint_data("$upstream")
            .await
            .expect("open store");
        assert!(data.is_unset());
        assert_ne!(data.offset, 0);
    }

    #[tokio::test]
    async fn closed_store_rejects_access() {
        let store = InMemoryCheckpointStore::new();
        store
            .set_checkpoint_data("ep", CheckpointData::new(4))
            .await
            .expect("open store");
        store.close().await.expect("close");

        assert_eq!(
            store.get_checkpoint_data("ep").await,
            Err(CheckpointStoreError::Closed)
        );
    }

    #[test]
    fn checkpoint_data_serializes_with_camel_case_keys() {
        let json = serde_json::to_value(CheckpointData::new(12)).expect("serializable");

        assert_eq!(json["offset"], 12);
        assert!(json.get("minEnqueueTime").is_some());
    }
}
