//! `domain → PathTrie<Service> → backends`, grounded on
//! `examples/original_source/store.go`'s `Domains`/`Paths`/`Endpoints`
//! three-level structure and `ando-core::router::Router`'s
//! hot-path-avoids-the-source-of-truth-map shape.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::model::{Backend, Container, Endpoint};
use crate::service::Service;
use crate::trie::PathTrie;

/// `domain → path-trie → service → backends`, guarded by a single
/// reader-writer lock (spec.md §5 permits either per-domain or index-level
/// locking; the index level is simpler and cross-domain writes are not
/// required to be ordered relative to each other, so a shared `RwLock` over
/// the whole domain map is sufficient here). Within a domain, `Service`'s
/// own copy-on-write vector makes `Lookup` lock-free against concurrent
/// `Add`/`Remove` on the same key.
pub struct RoutingIndex {
    domains: RwLock<HashMap<String, PathTrie<Arc<Service>>>>,
}

impl RoutingIndex {
    pub fn new() -> Self {
        Self {
            domains: RwLock::new(HashMap::new()),
        }
    }

    /// Obtains (or creates) the `Service` at `(endpoint.domain, endpoint.path)`
    /// and upserts the backend keyed by `container.id`. If `endpoint.ready`
    /// is false, removes instead.
    pub fn add(&self, container: Container, endpoint: Endpoint) {
        if !endpoint.ready {
            self.remove(&container, &endpoint);
            return;
        }

        let mut domains = self.domains.write().unwrap();
        let trie = domains
            .entry(endpoint.domain.clone())
            .or_insert_with(PathTrie::new);
        let svc = trie.get_or_insert_with(&endpoint.path, || Arc::new(Service::new()));
        svc.upsert(Backend::new(container, endpoint));
    }

    /// Removes the backend for `container.id` from `(endpoint.domain,
    /// endpoint.path)`. Returns the remaining backend count; callers use 0
    /// to evict dependent caches. Evicts the trie entry itself when the
    /// service becomes empty, so readers never observe a zero-backend
    /// service in the index.
    pub fn remove(&self, container: &Container, endpoint: &Endpoint) -> usize {
        let mut domains = self.domains.write().unwrap();
        let Some(trie) = domains.get_mut(&endpoint.domain) else {
            return 0;
        };

        let remaining = {
            match trie.get_exact(&endpoint.path) {
                Some(svc) => svc.remove(&container.id),
                None => return 0,
            }
        };

        if remaining == 0 {
            trie.delete(&endpoint.path);
        }

        remaining
    }

    /// Resolves `(host, path)` to a backend, random-picked uniformly among
    /// the service's current members.
    pub fn lookup(&self, host: &str, path: &str) -> Option<Backend> {
        let domains = self.domains.read().unwrap();
        let trie = domains.get(host)?;
        let svc = trie.get(path)?;
        svc.pick()
    }

    /// Snapshot of every `(domain, pattern) -> backend list` entry
    /// currently installed. Used only by the `/debug/routes` inspection
    /// endpoint, never on the request hot path.
    pub fn snapshot(&self) -> Vec<(String, String, Vec<Backend>)> {
        let domains = self.domains.read().unwrap();
        let mut out = Vec::new();
        for (domain, trie) in domains.iter() {
            for (pattern, svc) in trie.entries() {
                out.push((domain.clone(), pattern, svc.snapshot()));
            }
        }
        out
    }
}

impl Default for RoutingIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn container(id: &str) -> Container {
        Container::new(id, "127.0.0.1:9001".parse::<SocketAddr>().unwrap(), "/cfg")
    }

    fn endpoint(path: &str) -> Endpoint {
        Endpoint {
            domain: "example.com".into(),
            path: path.into(),
            rules: vec![],
            ready: true,
        }
    }

    #[test]
    fn invariant_lookup_never_returns_departed_container() {
        let idx = RoutingIndex::new();
        idx.add(container("c1"), endpoint("/a"));
        idx.remove(&container("c1"), &endpoint("/a"));
        assert!(idx.lookup("example.com", "/a").is_none());
    }

    #[test]
    fn s5_remove_one_of_two_backends_leaves_the_other() {
        let idx = RoutingIndex::new();
        idx.add(container("b1"), endpoint("/a"));
        idx.add(container("b2"), endpoint("/a"));
        idx.remove(&container("b1"), &endpoint("/a"));
        for _ in 0..20 {
            let backend = idx.lookup("example.com", "/a").unwrap();
            assert_eq!(backend.container.id, "b2");
        }
    }

    #[test]
    fn ready_false_acts_as_remove() {
        let idx = RoutingIndex::new();
        idx.add(container("c1"), endpoint("/a"));
        let mut not_ready = endpoint("/a");
        not_ready.ready = false;
        idx.add(container("c1"), not_ready);
        assert!(idx.lookup("example.com", "/a").is_none());
    }

    #[test]
    fn remove_to_zero_evicts_trie_entry() {
        let idx = RoutingIndex::new();
        idx.add(container("c1"), endpoint("/a"));
        let remaining = idx.remove(&container("c1"), &endpoint("/a"));
        assert_eq!(remaining, 0);
        assert!(idx.snapshot().is_empty());
    }
}
