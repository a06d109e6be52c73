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

use edge_router::{RouteSource, RouterConfig, DEFAULT_ROUTE_PRIORITY};
use integration_test_utils::{json_telemetry, module_output, telemetry, twin_change, wait_for};
use serde_json::json;

#[tokio::test(flavor = "multi_thread")]
async fn default_route_targets_all_telemetry_upstream() {
    let harness =
        support::make_router("default_route", &[("r", "FROM /messages/* INTO $upstream")]).await;

    let route = harness.router.config().route("r").cloned().expect("route r");
    assert_eq!(route.source(), &RouteSource::AllTelemetry);
    assert_eq!(route.endpoint().id(), support::UPSTREAM);
    assert_eq!(route.priority(), DEFAULT_ROUTE_PRIORITY);
    assert_eq!(route.time_to_live_secs(), 0);

    assert_eq!(harness.router.route(&telemetry(1)).len(), 1);
    assert_eq!(harness.router.route(&module_output("m", "out", 2)).len(), 1);
    assert!(harness.router.route(&twin_change(3)).is_empty());
    harness.router.close().await.expect("close succeeds");
}

#[tokio::test(flavor = "multi_thread")]
async fn conditions_select_endpoints() {
    let harness = support::make_router(
        "conditions",
        &[
            ("all", "FROM /messages/* INTO $upstream"),
            (
                "hot",
                "FROM /messages/* WHERE $body.temperature > 50 INTO BrokeredEndpoint(\"/modules/sink/inputs/in1\")",
            ),
        ],
    )
    .await;

    let hot = json_telemetry(1, json!({ "temperature": 70 }));
    let cold = json_telemetry(2, json!({ "temperature": 20 }));
    let hot_routes = harness.router.route(&hot);
    assert_eq!(hot_routes.len(), 2);
    assert_eq!(harness.router.route(&cold).len(), 1);

    harness.router.route_async(&hot).await.expect("routing succeeds");
    harness.router.route_async(&cold).await.expect("routing succeeds");

    let upstream = harness.endpoints.processor(support::UPSTREAM);
    let sink = harness.endpoints.processor(support::SINK_INPUT);
    assert!(wait_for(support::WAIT, || async { harness.master_offset() == 2 }).await);
    assert_eq!(upstream.delivered_offsets().await, vec![1, 2]);
    assert_eq!(sink.delivered_offsets().await, vec![1]);
    harness.router.close().await.expect("close succeeds");
}

#[tokio::test(flavor = "multi_thread")]
async fn fallback_applies_only_when_nothing_matched() {
    let harness = support::make_router("fallback", &[]).await;
    let module_route = harness.route(
        "sensor",
        "FROM /messages/modules/sensor/* INTO BrokeredEndpoint(\"/modules/sink/inputs/in1\")",
    );
    let fallback = harness.route("fallback", "FROM /* INTO $upstream");
    harness
        .router
        .replace_routes(
            RouterConfig::new([module_route], Some(fallback)).expect("valid config"),
        )
        .await
        .expect("replace succeeds");

    let from_sensor = harness.router.route(&module_output("sensor", "out", 1));
    assert_eq!(from_sensor.len(), 1);
    assert!(from_sensor
        .iter()
        .all(|result| result.endpoint().id() == support::SINK_INPUT));

    let elsewhere = harness.router.route(&module_output("other", "out", 2));
    assert_eq!(elsewhere.len(), 1);
    assert!(elsewhere
        .iter()
        .all(|result| result.endpoint().id() == support::UPSTREAM));
    harness.router.close().await.expect("close succeeds");
}

#[tokio::test(flavor = "multi_thread")]
async fn routes_added_and_removed_manage_endpoints() {
    let harness = support::make_router(
        "set_remove_route",
        &[("all", "FROM /messages/* INTO $upstream")],
    )
    .await;

    harness
        .router
        .set_route(harness.route(
            "sink",
            "FROM /messages/modules/sensor/* INTO BrokeredEndpoint(\"/modules/sink/inputs/in1\")",
        ))
        .await
        .expect("set route succeeds");
    assert_eq!(
        harness.router.dispatcher().endpoint_ids(),
        vec![support::SINK_INPUT.to_string(), support::UPSTREAM.to_string()]
    );

    // Retargeting the only route of the sink retires the sink executor.
    harness
        .router
        .set_route(harness.route("sink", "FROM /messages/modules/sensor/* INTO $upstream"))
        .await
        .expect("retarget succeeds");
    assert_eq!(
        harness.router.dispatcher().endpoint_ids(),
        vec![support::UPSTREAM.to_string()]
    );

    harness.router.remove_route("all").await.expect("remove succeeds");
    assert_eq!(
        harness.router.dispatcher().endpoint_ids(),
        vec![support::UPSTREAM.to_string()]
    );
    harness.router.remove_route("sink").await.expect("remove succeeds");
    assert!(harness.router.dispatcher().endpoint_ids().is_empty());

    // Removing an unknown route is a no-op.
    harness.router.remove_route("missing").await.expect("no-op");

    let unrouted = telemetry(7);
    harness.router.route_async(&unrouted).await.expect("routing succeeds");
    assert_eq!(harness.router.dispatcher().unmatched_count(), 1);
    assert_eq!(harness.master_offset(), 7);
    harness.router.close().await.expect("close succeeds");
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_route_removal_keeps_the_route() {
    let harness =
        support::make_router("remove_fails", &[("all", "FROM /messages/* INTO $upstream")]).await;
    harness
        .router
        .dispatcher()
        .close()
        .await
        .expect("dispatcher closes");

    assert!(matches!(
        harness.router.remove_route("all").await,
        Err(edge_router::RoutingError::DispatcherClosed)
    ));
    assert!(harness.router.config().route("all").is_some());
}
