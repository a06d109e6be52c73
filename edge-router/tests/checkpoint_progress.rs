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

mod support;

use edge_router::{CheckpointStore, Checkpointer, RetryPolicy};
use integration_test_utils::{check_offsets_in_order, telemetry, wait_for};
use std::time::Duration;

const MESSAGES: i64 = 30;

#[tokio::test(flavor = "multi_thread")]
async fn master_checkpoint_only_moves_forward() {
    let harness = support::make_router(
        "monotonic",
        &[
            ("upstream", "FROM /messages/* INTO $upstream"),
            (
                "sink",
                "FROM /messages/* INTO BrokeredEndpoint(\"/modules/sink/inputs/in1\")",
            ),
        ],
    )
    .await;
    let sink = harness.endpoints.processor(support::SINK_INPUT);
    sink.fail_next(2);

    for offset in 1..=MESSAGES {
        harness
            .router
            .route_async(&telemetry(offset))
            .await
            .expect("routing succeeds");
    }

    assert!(wait_for(support::WAIT, || async { harness.master_offset() == MESSAGES }).await);

    let written = harness.store.offsets_written("monotonic").await;
    check_offsets_in_order(&written);
    assert_eq!(written.last().copied(), Some(MESSAGES));

    // Lane checkpointers persist under the endpoint id at the default priority.
    for lane in [support::UPSTREAM, support::SINK_INPUT] {
        let lane_offsets = harness.store.offsets_written(lane).await;
        check_offsets_in_order(&lane_offsets);
        assert_eq!(lane_offsets.last().copied(), Some(MESSAGES));
    }
    let persisted = harness
        .store
        .get_checkpoint_data("monotonic")
        .await
        .expect("store is open");
    assert_eq!(persisted.offset, MESSAGES);
    harness.router.close().await.expect("close succeeds");
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_endpoint_holds_the_master_checkpoint() {
    let harness = support::make_router_with(
        "held",
        &[
            ("upstream", "FROM /messages/* INTO $upstream"),
            (
                "sink",
                "FROM /messages/* INTO BrokeredEndpoint(\"/modules/sink/inputs/in1\")",
            ),
        ],
        support::fast_executor_config().with_retry_policy(RetryPolicy::FixedInterval {
            max_retries: 1_000,
            interval: Duration::from_millis(20),
        }),
    )
    .await;
    let upstream = harness.endpoints.processor(support::UPSTREAM);
    let sink = harness.endpoints.processor(support::SINK_INPUT);
    sink.fail_next(usize::MAX);

    harness
        .router
        .route_async(&telemetry(1))
        .await
        .expect("routing succeeds");
    assert!(
        wait_for(support::WAIT, || async {
            upstream.delivered_offsets().await == vec![1]
        })
        .await
    );

    let sink_executor = harness
        .router
        .dispatcher()
        .executor(support::SINK_INPUT)
        .expect("sink executor");
    assert!(wait_for(support::WAIT, || async { sink_executor.status().await.retries > 0 }).await);
    assert!(harness.master_offset() < 1);
    assert!(harness.router.dispatcher().checkpointer().offset() < 1);
    harness.router.close().await.expect("close succeeds");
}
