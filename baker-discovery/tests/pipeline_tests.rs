use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use baker_core::{Container, Endpoint, Fact, RoutingIndex};
use baker_discovery::{Pinger, Reconciler};
use baker_middleware::MiddlewareCache;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn s7_container_departure_flows_through_to_503_then_reinsertion_recovers() {
    let index = Arc::new(RoutingIndex::new());
    let cache = Arc::new(MiddlewareCache::new());
    let reconciler = Reconciler::new(Arc::clone(&index), Arc::clone(&cache));

    let (facts_tx, facts_rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let reconciler_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { reconciler.run(facts_rx, cancel).await }
    });

    let container = Container::new("c1", "10.0.0.1:9000".parse::<SocketAddr>().unwrap(), "/cfg");
    let endpoint = Endpoint { domain: "a.test".into(), path: "/x".into(), rules: vec![], ready: true };

    facts_tx.send(Fact::upsert(container.clone(), endpoint.clone())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(index.lookup("a.test", "/x").is_some());

    facts_tx.send(Fact::departure(container.clone(), endpoint.clone())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(index.lookup("a.test", "/x").is_none());

    facts_tx.send(Fact::upsert(container, endpoint)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(index.lookup("a.test", "/x").is_some());

    cancel.cancel();
    let _ = reconciler_task.await;
}

#[tokio::test]
async fn pinger_departure_evicts_tracked_container_without_a_live_server() {
    let pinger = Arc::new(Pinger::new(Duration::from_millis(50), Duration::from_secs(60), 4));
    let (containers_tx, containers_rx) = mpsc::channel(8);
    let (facts_tx, mut facts_rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();

    let pinger_task = tokio::spawn({
        let pinger = Arc::clone(&pinger);
        let cancel = cancel.clone();
        async move { pinger.run(containers_rx, facts_tx, cancel).await }
    });

    let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
    containers_tx.send(Container::new("c1", addr, "/cfg")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    containers_tx.send(Container::departed("c1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(facts_rx.try_recv().is_err(), "no endpoints were ever successfully polled, so no departure fact is owed");

    cancel.cancel();
    drop(containers_tx);
    let _ = pinger_task.await;
}
