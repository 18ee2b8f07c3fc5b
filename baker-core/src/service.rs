//! The set of currently-live backends for one `(Domain, Path)` key.
//!
//! Grounded on `ando-core::router::Router`'s `ArcSwap<CompiledRouter>`
//! pattern: reads take a lock-free snapshot of the backend vector, writes
//! build a new vector and swap it in, so `pick` never blocks on a writer and
//! never observes a partially-built member set.

use std::sync::Arc;

use arc_swap::ArcSwap;
use rand::seq::SliceRandom;

use crate::model::Backend;

pub struct Service {
    backends: ArcSwap<Vec<Backend>>,
}

impl Service {
    pub fn new() -> Self {
        Self {
            backends: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn single(backend: Backend) -> Self {
        Self {
            backends: ArcSwap::from_pointee(vec![backend]),
        }
    }

    /// Idempotent upsert by `Container.id`.
    pub fn upsert(&self, backend: Backend) {
        let current = self.backends.load();
        let mut next: Vec<Backend> = current
            .iter()
            .filter(|b| b.container.id != backend.container.id)
            .cloned()
            .collect();
        next.push(backend);
        self.backends.store(Arc::new(next));
    }

    /// Removes the backend for `container_id`. Returns the remaining count.
    pub fn remove(&self, container_id: &str) -> usize {
        let current = self.backends.load();
        let next: Vec<Backend> = current
            .iter()
            .filter(|b| b.container.id != container_id)
            .cloned()
            .collect();
        let remaining = next.len();
        self.backends.store(Arc::new(next));
        remaining
    }

    /// Uniform random pick across a consistent snapshot of current backends.
    pub fn pick(&self) -> Option<Backend> {
        let snapshot = self.backends.load();
        snapshot.choose(&mut rand::thread_rng()).cloned()
    }

    pub fn len(&self) -> usize {
        self.backends.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Backend> {
        self.backends.load().as_ref().clone()
    }
}

impl Default for Service {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Container, Endpoint};
    use std::net::SocketAddr;

    fn backend(id: &str) -> Backend {
        Backend::new(
            Container::new(id, "127.0.0.1:8080".parse::<SocketAddr>().unwrap(), "/cfg"),
            Endpoint {
                domain: "example.com".into(),
                path: "/a".into(),
                rules: vec![],
                ready: true,
            },
        )
    }

    #[test]
    fn remove_one_of_two_always_leaves_the_other() {
        let svc = Service::new();
        svc.upsert(backend("b1"));
        svc.upsert(backend("b2"));
        assert_eq!(svc.remove("b1"), 1);
        for _ in 0..20 {
            let picked = svc.pick().unwrap();
            assert_eq!(picked.container.id, "b2");
        }
    }

    #[test]
    fn upsert_same_id_replaces_not_duplicates() {
        let svc = Service::new();
        svc.upsert(backend("b1"));
        svc.upsert(backend("b1"));
        assert_eq!(svc.len(), 1);
    }
}
