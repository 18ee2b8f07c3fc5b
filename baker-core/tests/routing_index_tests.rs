use std::net::SocketAddr;

use baker_core::{Container, Endpoint, RoutingIndex};

fn container(id: &str) -> Container {
    Container::new(id, "10.0.0.1:9000".parse::<SocketAddr>().unwrap(), "/cfg")
}

fn endpoint(domain: &str, path: &str) -> Endpoint {
    Endpoint {
        domain: domain.into(),
        path: path.into(),
        rules: vec![],
        ready: true,
    }
}

#[test]
fn s7_departure_yields_503_and_reinsertion_recovers() {
    let idx = RoutingIndex::new();
    idx.add(container("c1"), endpoint("a.test", "/x"));
    assert!(idx.lookup("a.test", "/x").is_some());

    idx.remove(&container("c1"), &endpoint("a.test", "/x"));
    assert!(idx.lookup("a.test", "/x").is_none());

    idx.add(container("c1"), endpoint("a.test", "/x"));
    assert!(idx.lookup("a.test", "/x").is_some());
}

#[test]
fn distinct_domains_do_not_share_a_path_trie() {
    let idx = RoutingIndex::new();
    idx.add(container("c1"), endpoint("a.test", "/x"));
    assert!(idx.lookup("b.test", "/x").is_none());
}

#[test]
fn wildcard_path_resolves_through_index() {
    let idx = RoutingIndex::new();
    idx.add(container("c1"), endpoint("a.test", "/api*"));
    assert!(idx.lookup("a.test", "/api/anything/here").is_some());
    assert!(idx.lookup("a.test", "/other").is_none());
}

#[test]
fn concurrent_reconcile_and_lookup_never_panics_or_yields_empty_service() {
    use std::sync::Arc;
    use std::thread;

    let idx = Arc::new(RoutingIndex::new());
    let mut handles = Vec::new();

    for w in 0..4 {
        let idx = Arc::clone(&idx);
        handles.push(thread::spawn(move || {
            for i in 0..200 {
                let id = format!("w{w}-{i}");
                idx.add(container(&id), endpoint("a.test", "/a"));
                let _ = idx.lookup("a.test", "/a");
                idx.remove(&container(&id), &endpoint("a.test", "/a"));
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    assert!(idx.snapshot().iter().all(|(_, _, backends)| !backends.is_empty()));
}
