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

//! Retry policies and the async retry loop used by endpoint executors.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Backoff schedule between delivery attempts.
#[derive(Clone, Debug, PartialEq)]
pub enum RetryPolicy {
    /// Randomized exponential backoff. The delay before retry `n` grows from
    /// `min_backoff` by roughly `delta_backoff * 2^n`, capped at `max_backoff`.
    Exponential {
        max_retries: u32,
        min_backoff: Duration,
        max_backoff: Duration,
        delta_backoff: Duration,
    },
    FixedInterval {
        max_retries: u32,
        interval: Duration,
    },
    NoRetry,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Exponential {
            max_retries: 20,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            delta_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn max_retries(&self) -> u32 {
        match self {
            RetryPolicy::Exponential { max_retries, .. }
            | RetryPolicy::FixedInterval { max_retries, .. } => *max_retries,
            RetryPolicy::NoRetry => 0,
        }
    }

    /// Delay before retry number `retry` (zero based), or `None` once retries are spent.
    pub fn backoff(&self, retry: u32) -> Option<Duration> {
        if retry >= self.max_retries() {
            return None;
        }
        match self {
            RetryPolicy::Exponential {
                min_backoff,
                max_backoff,
                delta_backoff,
                ..
            } => {
                let exponent = retry.min(30);
                let base = delta_backoff
                    .saturating_mul(1u32 << exponent)
                    .min(*max_backoff);
                // Jitter factor in [0.8, 1.2).
                let jitter = 0.8 + 0.4 * jitter_fraction();
                let delay = min_backoff.saturating_add(base.mul_f64(jitter));
                Some(delay.min(*max_backoff))
            }
            RetryPolicy::FixedInterval { interval, .. } => Some(*interval),
            RetryPolicy::NoRetry => None,
        }
    }
}

fn jitter_fraction() -> f64 {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    f64::from(u16::from_le_bytes([bytes[0], bytes[1]])) / f64::from(u16::MAX)
}

/// Outcome of one attempt inside [`retry`].
#[derive(Debug)]
pub enum Attempt<T, E> {
    Ok(T),
    /// Try again after the policy's backoff.
    Retryable(E),
    /// Stop immediately.
    Fatal(E),
}

/// Why [`retry`] gave up.
#[derive(Debug, PartialEq)]
pub enum RetryError<E> {
    Exhausted { last: E, attempts: u32 },
    Fatal(E),
    Cancelled,
}

/// Runs `attempt` until it succeeds, fails fatally, exhausts `policy`, or
/// `cancel` fires. `on_retry` observes each scheduled retry.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut attempt: F,
    mut on_retry: impl FnMut(u32, Duration, &E),
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T, E>>,
{
    let mut retries = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        let error = match attempt(retries).await {
            Attempt::Ok(value) => return Ok(value),
            Attempt::Fatal(error) => return Err(RetryError::Fatal(error)),
            Attempt::Retryable(error) => error,
        };
        let Some(delay) = policy.backoff(retries) else {
            return Err(RetryError::Exhausted {
                last: error,
                attempts: retries + 1,
            });
        };
        on_retry(retries, delay, &error);
        retries += 1;
        tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
