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

//! Delivery outcome model: per-item partitions plus a failure significance tag.

/// Retry-worthiness of a delivery failure, ordered by significance.
///
/// `Transient` is the most significant because it means another attempt is still
/// worthwhile; `None` never overrides anything.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum FailureKind {
    #[default]
    None,
    NonTransient,
    Transient,
}

/// Classification and description of a failed send.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SendFailureDetails {
    pub kind: FailureKind,
    pub description: String,
}

impl SendFailureDetails {
    pub fn new(kind: FailureKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    pub fn transient(description: impl Into<String>) -> Self {
        Self::new(FailureKind::Transient, description)
    }

    pub fn non_transient(description: impl Into<String>) -> Self {
        Self::new(FailureKind::NonTransient, description)
    }
}

/// An item the endpoint refused to accept, with the reason it gave.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvalidDetails<T> {
    pub item: T,
    pub reason: String,
}

impl<T> InvalidDetails<T> {
    pub fn new(item: T, reason: impl Into<String>) -> Self {
        Self {
            item,
            reason: reason.into(),
        }
    }
}

/// Outcome of one delivery attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkResult<T> {
    succeeded: Vec<T>,
    failed: Vec<T>,
    invalid: Vec<InvalidDetails<T>>,
    send_failure: Option<SendFailureDetails>,
}

impl<T> SinkResult<T> {
    pub fn new(
        succeeded: Vec<T>,
        failed: Vec<T>,
        invalid: Vec<InvalidDetails<T>>,
        send_failure: Option<SendFailureDetails>,
    ) -> Self {
        Self {
            succeeded,
            failed,
            invalid,
            send_failure,
        }
    }

    /// Every item was delivered.
    pub fn success(succeeded: Vec<T>) -> Self {
        Self::new(succeeded, Vec::new(), Vec::new(), None)
    }

    /// No item was delivered for the given reason.
    pub fn failure(failed: Vec<T>, details: SendFailureDetails) -> Self {
        Self::new(Vec::new(), failed, Vec::new(), Some(details))
    }

    pub fn succeeded(&self) -> &[T] {
        &self.succeeded
    }

    pub fn failed(&self) -> &[T] {
        &self.failed
    }

    pub fn invalid(&self) -> &[InvalidDetails<T>] {
        &self.invalid
    }

    pub fn send_failure(&self) -> Option<&SendFailureDetails> {
        self.send_failure.as_ref()
    }

    /// Kind of the attached failure, `FailureKind::None` when there is none.
    pub fn failure_kind(&self) -> FailureKind {
        self.send_failure
            .as_ref()
            .map(|details| details.kind)
            .unwrap_or_default()
    }

    pub fn is_successful(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn into_parts(
        self,
    ) -> (
        Vec<T>,
        Vec<T>,
        Vec<InvalidDetails<T>>,
        Option<SendFailureDetails>,
    ) {
        (self.succeeded, self.failed, self.invalid, self.send_failure)
    }
}

impl<T> Default for SinkResult<T> {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new(), None)
    }
}

/// Accumulates the outcomes of several attempts into a single [`SinkResult`].
#[derive(Debug)]
pub struct MergingSinkResult<T> {
    merged: SinkResult<T>,
}

impl<T> MergingSinkResult<T> {
    pub fn new() -> Self {
        Self {
            merged: SinkResult::default(),
        }
    }

    /// Concatenates item partitions and keeps the most significant failure.
    ///
    /// On equal significance the failure already held is kept.
    pub fn merge(&mut self, other: SinkResult<T>) {
        let (succeeded, failed, invalid, send_failure) = other.into_parts();
        self.merged.succeeded.extend(succeeded);
        self.merged.failed.extend(failed);
        self.merged.invalid.extend(invalid);

        if let Some(incoming) = send_failure {
            let replace = match &self.merged.send_failure {
                None => true,
                Some(current) => incoming.kind > current.kind,
            };
            if replace {
                self.merged.send_failure = Some(incoming);
            }
        }
    }

    /// Records a failure that is not tied to a particular set of items.
    pub fn merge_failure(&mut self, details: SendFailureDetails) {
        self.merge(SinkResult::new(Vec::new(), Vec::new(), Vec::new(), Some(details)));
    }

    pub fn succeeded(&self) -> &[T] {
        self.merged.succeeded()
    }

    pub fn failed(&self) -> &[T] {
        self.merged.failed()
    }

    pub fn invalid(&self) -> &[InvalidDetails<T>] {
        self.merged.invalid()
    }

    pub fn send_failure(&self) -> Option<&SendFailureDetails> {
        self.merged.send_failure()
    }

    pub fn failure_kind(&self) -> FailureKind {
        self.merged.failure_kind()
    }

    pub fn into_sink_result(self) -> SinkResult<T> {
        self.merged
    }
}

impl<T> Default for MergingSinkResult<T> {
    fn default() -> Self {
        Self::new()
    }
}
