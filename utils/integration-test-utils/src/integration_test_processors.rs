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
    ConfigurationError, DeliveryError, Endpoint, EndpointFactory, EndpointKind,
    EndpointProcessor, EndpointReference, Message, SinkResult,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

/// Processor that records what it delivered and fails on demand.
#[derive(Default)]
pub struct RecordingProcessor {
    delivered: AsyncMutex<Vec<Message>>,
    transient_failures: AtomicUsize,
    permanent_failure: AtomicBool,
    calls: AtomicUsize,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` calls fail with a transient error.
    pub fn fail_next(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// While set, every call fails with a permanent error.
    pub fn set_permanent_failure(&self, enabled: bool) {
        self.permanent_failure.store(enabled, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn delivered(&self) -> Vec<Message> {
        self.delivered.lock().await.clone()
    }

    pub async fn delivered_offsets(&self) -> Vec<i64> {
        self.delivered
            .lock()
            .await
            .iter()
            .map(Message::offset)
            .collect()
    }
}

#[async_trait]
impl EndpointProcessor for RecordingProcessor {
    async fn process(&self, messages: &[Message]) -> Result<SinkResult<Message>, DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.permanent_failure.load(Ordering::SeqCst) {
            return Err(DeliveryError::permanent("recording processor rejects everything"));
        }
        let failing = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DeliveryError::transient("recording processor is unavailable"));
        }

        let mut delivered = self.delivered.lock().await;
        delivered.extend(messages.iter().cloned());
        debug!(count = messages.len(), total = delivered.len(), "recording processor delivered");
        Ok(SinkResult::success(messages.to_vec()))
    }
}

/// Resolves route references to endpoints backed by one shared
/// [`RecordingProcessor`] per endpoint id.
#[derive(Default)]
pub struct TestEndpointFactory {
    processors: Mutex<HashMap<String, Arc<RecordingProcessor>>>,
}

impl TestEndpointFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processor behind `endpoint_id`, created on first use.
    pub fn processor(&self, endpoint_id: &str) -> Arc<RecordingProcessor> {
        let mut processors = self
            .processors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        processors
            .entry(endpoint_id.to_string())
            .or_insert_with(|| Arc::new(RecordingProcessor::new()))
            .clone()
    }

    /// Builds an endpoint directly, bypassing rule parsing.
    pub fn endpoint(&self, reference: &EndpointReference) -> Endpoint {
        self.create_endpoint(reference)
            .expect("test endpoint reference should resolve")
    }
}

impl EndpointFactory for TestEndpointFactory {
    fn create_endpoint(
        &self,
        reference: &EndpointReference,
    ) -> Result<Endpoint, ConfigurationError> {
        let kind = EndpointKind::from_reference(reference)?;
        let id = reference.endpoint_id();
        Ok(Endpoint::new(&id, &id, kind, self.processor(&id)))
    }
}
