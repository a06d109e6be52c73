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

//! Endpoint health escalation.

use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant, SystemTime};

/// Ordered from best to worst. Combining two observations keeps the worse one.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum EndpointHealthStatus {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
    Dead,
}

impl EndpointHealthStatus {
    pub fn coalesce(self, other: EndpointHealthStatus) -> EndpointHealthStatus {
        self.max(other)
    }
}

impl Display for EndpointHealthStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EndpointHealthStatus::Unknown => "unknown",
            EndpointHealthStatus::Healthy => "healthy",
            EndpointHealthStatus::Unhealthy => "unhealthy",
            EndpointHealthStatus::Dead => "dead",
        };
        f.write_str(name)
    }
}

/// Consecutive-failure thresholds.
#[derive(Clone, Debug, PartialEq)]
pub struct HealthConfig {
    pub unhealthy_after_failures: u32,
    pub dead_after_failures: u32,
    /// Failures older than this no longer count toward the thresholds.
    pub failure_window: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            unhealthy_after_failures: 3,
            dead_after_failures: 10,
            failure_window: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug)]
pub(crate) struct HealthTracker {
    config: HealthConfig,
    status: EndpointHealthStatus,
    consecutive_failures: u32,
    window_start: Option<Instant>,
    dead_since: Option<Instant>,
    reviving: bool,
    unhealthy_since: Option<SystemTime>,
    last_failed_revival_time: Option<SystemTime>,
}

impl HealthTracker {
    pub(crate) fn new(config: HealthConfig) -> Self {
        Self {
            config,
            status: EndpointHealthStatus::Unknown,
            consecutive_failures: 0,
            window_start: None,
            dead_since: None,
            reviving: false,
            unhealthy_since: None,
            last_failed_revival_time: None,
        }
    }

    pub(crate) fn status(&self) -> EndpointHealthStatus {
        self.status
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.dead_since.is_some()
    }

    pub(crate) fn unhealthy_since(&self) -> Option<SystemTime> {
        self.unhealthy_since
    }

    pub(crate) fn last_failed_revival_time(&self) -> Option<SystemTime> {
        self.last_failed_revival_time
    }

    pub(crate) fn record_success(&mut self) {
        self.status = EndpointHealthStatus::Healthy;
        self.consecutive_failures = 0;
        self.window_start = None;
        self.dead_since = None;
        self.reviving = false;
        self.unhealthy_since = None;
    }

    /// Counts one failed batch and returns the escalated status.
    pub(crate) fn record_failure(&mut self, now: Instant) -> EndpointHealthStatus {
        let window_expired = self
            .window_start
            .is_some_and(|start| now.duration_since(start) > self.config.failure_window);
        if window_expired || self.window_start.is_none() {
            self.window_start = Some(now);
            self.consecutive_failures = 0;
            self.status = self.status.min(EndpointHealthStatus::Healthy);
            self.unhealthy_since = None;
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if self.reviving || self.consecutive_failures >= self.config.dead_after_failures {
            self.mark_dead(now);
        } else if self.consecutive_failures >= self.config.unhealthy_after_failures {
            self.escalate(EndpointHealthStatus::Unhealthy);
        }
        self.status
    }

    /// Permanent failures skip the thresholds.
    pub(crate) fn mark_dead(&mut self, now: Instant) {
        if self.reviving {
            self.last_failed_revival_time = Some(SystemTime::now());
        }
        self.reviving = false;
        self.dead_since = Some(now);
        self.escalate(EndpointHealthStatus::Dead);
    }

    pub(crate) fn revive_due(&self, now: Instant, revive_period: Duration) -> bool {
        self.dead_since
            .is_some_and(|since| now.duration_since(since) >= revive_period)
    }

    /// Leaves `Dead` for one trial delivery. A failure during the trial goes
    /// straight back to `Dead`.
    pub(crate) fn begin_revival(&mut self) {
        self.dead_since = None;
        self.reviving = true;
        self.status = EndpointHealthStatus::Unhealthy;
    }

    /// Forgets accumulated failures, as after the endpoint was reconfigured.
    pub(crate) fn reset(&mut self) {
        self.status = EndpointHealthStatus::Unknown;
        self.consecutive_failures = 0;
        self.window_start = None;
        self.dead_since = None;
        self.reviving = false;
    }

    fn escalate(&mut self, status: EndpointHealthStatus) {
        if status >= EndpointHealthStatus::Unhealthy && self.unhealthy_since.is_none() {
            self.unhealthy_since = Some(SystemTime::now());
        }
        self.status = self.status.coalesce(status);
    }
}
