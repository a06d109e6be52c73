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

use edge_router::{
    AsyncEndpointExecutorFactory, Checkpointer, Dispatcher, Endpoint, EndpointExecutorFactory,
    RouteResult, RoutingError, DEFAULT_ROUTE_PRIORITY,
};
use integration_test_utils::{telemetry, wait_for, RecordingCheckpointStore, TestEndpointFactory};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use support::ObservedExecutorFactory;

async fn make_dispatcher(name: &str, endpoints: &TestEndpointFactory) -> Dispatcher {
    let factory = Arc::new(AsyncEndpointExecutorFactory::new(support::fast_executor_config()));
    let initial = HashMap::from([(support::upstream(endpoints), vec![DEFAULT_ROUTE_PRIORITY])]);
    make_dispatcher_with(name, factory, initial).await.0
}

async fn make_dispatcher_with(
    name: &str,
    factory: Arc<dyn EndpointExecutorFactory>,
    initial: HashMap<Endpoint, Vec<u32>>,
) -> (Dispatcher, Arc<RecordingCheckpointStore>) {
    integration_test_utils::init_logging();
    let store = Arc::new(RecordingCheckpointStore::new());
    let dispatcher = Dispatcher::create(
        name,
        initial,
        factory,
        support::make_master(name, store.clone()).await,
    )
    .await
    .expect("dispatcher creation should succeed");
    (dispatcher, store)
}

fn routed_to(endpoint: &edge_router::Endpoint) -> HashSet<RouteResult> {
    HashSet::from([RouteResult::new(endpoint.clone(), DEFAULT_ROUTE_PRIORITY, 0)])
}

#[tokio::test(flavor = "multi_thread")]
async fn unmatched_message_advances_the_checkpoint() {
    let endpoints = TestEndpointFactory::new();
    let factory = Arc::new(AsyncEndpointExecutorFactory::new(support::fast_executor_config()));
    let initial = HashMap::from([(support::upstream(&endpoints), vec![DEFAULT_ROUTE_PRIORITY])]);
    let (dispatcher, store) = make_dispatcher_with("unmatched", factory, initial).await;

    dispatcher
        .dispatch(&telemetry(4), &HashSet::new())
        .await
        .expect("unmatched dispatch succeeds");

    assert_eq!(dispatcher.unmatched_count(), 1);
    assert_eq!(dispatcher.checkpointer().offset(), 4);
    assert_eq!(store.offsets_written("unmatched").await, vec![4]);
    assert_eq!(store.write_count().await, 1);
    assert!(endpoints.processor(support::UPSTREAM).delivered().await.is_empty());
    dispatcher.close().await.expect("close succeeds");
}

#[tokio::test(flavor = "multi_thread")]
async fn dispatched_message_is_delivered_and_committed() {
    let endpoints = TestEndpointFactory::new();
    let dispatcher = make_dispatcher("deliver", &endpoints).await;
    let upstream = support::upstream(&endpoints);
    let processor = endpoints.processor(support::UPSTREAM);

    for offset in 1..=3 {
        dispatcher
            .dispatch(&telemetry(offset), &routed_to(&upstream))
            .await
            .expect("dispatch succeeds");
    }

    assert!(
        wait_for(support::WAIT, || async {
            dispatcher.checkpointer().offset() == 3
        })
        .await
    );
    assert_eq!(processor.delivered_offsets().await, vec![1, 2, 3]);
    dispatcher.close().await.expect("close succeeds");
}

#[tokio::test(flavor = "multi_thread")]
async fn set_then_remove_endpoint() {
    let endpoints = TestEndpointFactory::new();
    let dispatcher = make_dispatcher("set_remove", &endpoints).await;
    let sink = support::sink(&endpoints);

    dispatcher
        .set_endpoint(sink.clone(), vec![DEFAULT_ROUTE_PRIORITY])
        .await
        .expect("set succeeds");
    assert_eq!(
        dispatcher.endpoint_ids(),
        vec![support::SINK_INPUT.to_string(), support::UPSTREAM.to_string()]
    );

    dispatcher
        .remove_endpoint(support::SINK_INPUT)
        .await
        .expect("remove succeeds");
    assert_eq!(dispatcher.endpoint_ids(), vec![support::UPSTREAM.to_string()]);

    // A message routed to the removed endpoint is not an error.
    dispatcher
        .dispatch(&telemetry(1), &routed_to(&sink))
        .await
        .expect("dispatch to a removed endpoint is ignored");

    // Removing an unknown endpoint is a no-op.
    dispatcher
        .remove_endpoint("never-added")
        .await
        .expect("remove of unknown endpoint succeeds");
    dispatcher.close().await.expect("close succeeds");
}

#[tokio::test(flavor = "multi_thread")]
async fn replace_endpoints_keeps_only_the_new_set() {
    let endpoints = TestEndpointFactory::new();
    let dispatcher = make_dispatcher("replace", &endpoints).await;
    let sink = support::sink(&endpoints);

    dispatcher
        .replace_endpoints(HashMap::from([(sink.clone(), vec![0, DEFAULT_ROUTE_PRIORITY])]))
        .await
        .expect("replace succeeds");

    assert_eq!(dispatcher.endpoint_ids(), vec![support::SINK_INPUT.to_string()]);
    let status = dispatcher.get_endpoint_status().await;
    assert_eq!(status.len(), 1);
    assert_eq!(
        status[0].queue_lengths.keys().copied().collect::<Vec<_>>(),
        vec![0, DEFAULT_ROUTE_PRIORITY]
    );

    dispatcher
        .dispatch(
            &telemetry(1),
            &HashSet::from([RouteResult::new(sink.clone(), 0, 0)]),
        )
        .await
        .expect("dispatch succeeds");
    let processor = endpoints.processor(support::SINK_INPUT);
    assert!(
        wait_for(support::WAIT, || async {
            processor.delivered_offsets().await == vec![1]
        })
        .await
    );
    dispatcher.close().await.expect("close succeeds");
}

#[tokio::test(flavor = "multi_thread")]
async fn replace_endpoints_closes_removed_before_creating() {
    let endpoints = TestEndpointFactory::new();
    let factory = Arc::new(ObservedExecutorFactory::new());
    let initial = HashMap::from([(support::upstream(&endpoints), vec![DEFAULT_ROUTE_PRIORITY])]);
    let (dispatcher, _) = make_dispatcher_with("replace_order", factory.clone(), initial).await;
    factory.clear();

    dispatcher
        .replace_endpoints(HashMap::from([(
            support::sink(&endpoints),
            vec![DEFAULT_ROUTE_PRIORITY],
        )]))
        .await
        .expect("replace succeeds");

    assert_eq!(
        factory.calls(),
        vec![
            format!("close:{}", support::UPSTREAM),
            format!("create:{}", support::SINK_INPUT),
        ]
    );
    assert_eq!(dispatcher.endpoint_ids(), vec![support::SINK_INPUT.to_string()]);
    dispatcher.close().await.expect("close succeeds");
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_close_is_idempotent() {
    let endpoints = TestEndpointFactory::new();
    let factory = Arc::new(ObservedExecutorFactory::new());
    let initial = HashMap::from([
        (support::upstream(&endpoints), vec![DEFAULT_ROUTE_PRIORITY]),
        (support::sink(&endpoints), vec![DEFAULT_ROUTE_PRIORITY]),
    ]);
    let (dispatcher, store) = make_dispatcher_with("double_close", factory.clone(), initial).await;
    let dispatcher = Arc::new(dispatcher);

    let first = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.close().await }
    });
    let second = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.close().await }
    });

    assert!(first.await.expect("task completes").is_ok());
    assert!(second.await.expect("task completes").is_ok());
    assert!(dispatcher.is_closed());
    assert!(dispatcher.endpoint_ids().is_empty());
    assert_eq!(factory.count(&format!("close:{}", support::UPSTREAM)), 1);
    assert_eq!(factory.count(&format!("close:{}", support::SINK_INPUT)), 1);
    assert_eq!(store.close_count(), 1);

    let upstream = support::upstream(&endpoints);
    assert!(matches!(
        dispatcher.dispatch(&telemetry(1), &routed_to(&upstream)).await,
        Err(RoutingError::DispatcherClosed)
    ));
    assert!(matches!(
        dispatcher
            .set_endpoint(upstream, vec![DEFAULT_ROUTE_PRIORITY])
            .await,
        Err(RoutingError::DispatcherClosed)
    ));
    assert!(matches!(
        dispatcher.remove_endpoint(support::UPSTREAM).await,
        Err(RoutingError::DispatcherClosed)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn set_endpoint_racing_close_reports_closed() {
    let endpoints = TestEndpointFactory::new();
    let factory = Arc::new(ObservedExecutorFactory::gated());
    let (dispatcher, store) =
        make_dispatcher_with("set_vs_close", factory.clone(), HashMap::new()).await;
    let dispatcher = Arc::new(dispatcher);

    let set = tokio::spawn({
        let dispatcher = dispatcher.clone();
        let sink = support::sink(&endpoints);
        async move { dispatcher.set_endpoint(sink, vec![DEFAULT_ROUTE_PRIORITY]).await }
    });
    factory.creation_started().await;
    let close = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.close().await }
    });

    assert!(close.await.expect("task completes").is_ok());
    factory.open_gate();
    assert!(matches!(
        set.await.expect("task completes"),
        Err(RoutingError::DispatcherClosed)
    ));
    assert!(dispatcher.endpoint_ids().is_empty());
    assert_eq!(factory.count(&format!("close:{}", support::SINK_INPUT)), 0);
    assert_eq!(store.close_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn replace_endpoints_racing_close_reports_closed() {
    let endpoints = TestEndpointFactory::new();
    let factory = Arc::new(ObservedExecutorFactory::gated());
    let (dispatcher, _) =
        make_dispatcher_with("replace_vs_close", factory.clone(), HashMap::new()).await;
    let dispatcher = Arc::new(dispatcher);

    let replace = tokio::spawn({
        let dispatcher = dispatcher.clone();
        let wanted = HashMap::from([
            (support::upstream(&endpoints), vec![DEFAULT_ROUTE_PRIORITY]),
            (support::sink(&endpoints), vec![DEFAULT_ROUTE_PRIORITY]),
        ]);
        async move { dispatcher.replace_endpoints(wanted).await }
    });
    factory.creation_started().await;
    let close = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.close().await }
    });

    assert!(close.await.expect("task completes").is_ok());
    factory.open_gate();
    assert!(matches!(
        replace.await.expect("task completes"),
        Err(RoutingError::DispatcherClosed)
    ));
    assert!(dispatcher.endpoint_ids().is_empty());
    // The first creation was abandoned and nothing else was attempted.
    assert_eq!(factory.calls().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn structural_changes_interleaved_with_dispatch() {
    const MESSAGES: i64 = 50;
    const CYCLES: usize = 10;

    let endpoints = TestEndpointFactory::new();
    let factory = Arc::new(ObservedExecutorFactory::new());
    let initial = HashMap::from([(support::upstream(&endpoints), vec![DEFAULT_ROUTE_PRIORITY])]);
    let (dispatcher, _) = make_dispatcher_with("interleaved", factory.clone(), initial).await;
    let dispatcher = Arc::new(dispatcher);
    let upstream = support::upstream(&endpoints);
    let sink = support::sink(&endpoints);

    let dispatching = tokio::spawn({
        let dispatcher = dispatcher.clone();
        let routes = HashSet::from([
            RouteResult::new(upstream.clone(), DEFAULT_ROUTE_PRIORITY, 0),
            RouteResult::new(sink.clone(), DEFAULT_ROUTE_PRIORITY, 0),
        ]);
        async move {
            for offset in 1..=MESSAGES {
                dispatcher.dispatch(&telemetry(offset), &routes).await?;
                tokio::task::yield_now().await;
            }
            Ok::<(), RoutingError>(())
        }
    });
    for _ in 0..CYCLES {
        dispatcher
            .set_endpoint(sink.clone(), vec![DEFAULT_ROUTE_PRIORITY])
            .await
            .expect("set succeeds");
        tokio::task::yield_now().await;
        dispatcher
            .remove_endpoint(support::SINK_INPUT)
            .await
            .expect("remove succeeds");
    }

    dispatching
        .await
        .expect("task completes")
        .expect("dispatch ignores endpoints removed mid-flight");
    assert_eq!(dispatcher.endpoint_ids(), vec![support::UPSTREAM.to_string()]);
    let sink_created = factory.count(&format!("create:{}", support::SINK_INPUT));
    assert_eq!(sink_created, CYCLES);
    assert_eq!(factory.count(&format!("close:{}", support::SINK_INPUT)), sink_created);
    assert!(
        wait_for(support::WAIT, || async {
            dispatcher.checkpointer().offset() == MESSAGES
        })
        .await
    );
    dispatcher.close().await.expect("close succeeds");
}
