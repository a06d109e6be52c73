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

use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls `condition` until it holds or `timeout` passes. Returns the last result.
pub async fn wait_for<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if Instant::now() >= deadline {
            debug!(?timeout, "condition not met before timeout");
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Panics unless `offsets` is strictly increasing.
pub fn check_offsets_in_order(offsets: &[i64]) {
    for pair in offsets.windows(2) {
        assert!(
            pair[0] < pair[1],
            "offsets out of order: {} delivered before {} in {offsets:?}",
            pair[0],
            pair[1]
        );
    }
}
