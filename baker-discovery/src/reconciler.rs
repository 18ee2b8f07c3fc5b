//! Folds the `Fact` stream into the shared `RoutingIndex`, grounded on
//! `examples/original_source/store.go`'s `BaseStore` goroutine
//! (`pinger.Service()` → `domains.Add`/`domains.Remove`).

use std::sync::Arc;

use baker_core::RoutingIndex;
use baker_middleware::MiddlewareCache;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct Reconciler {
    index: Arc<RoutingIndex>,
    cache: Arc<MiddlewareCache>,
}

impl Reconciler {
    pub fn new(index: Arc<RoutingIndex>, cache: Arc<MiddlewareCache>) -> Self {
        Self { index, cache }
    }

    pub async fn run(self, mut facts_rx: mpsc::Receiver<baker_core::Fact>, cancel: CancellationToken) {
        loop {
            let fact = tokio::select! {
                _ = cancel.cancelled() => return,
                fact = facts_rx.recv() => match fact {
                    Some(f) => f,
                    None => return,
                },
            };
            self.apply(fact);
        }
    }

    fn apply(&self, fact: baker_core::Fact) {
        let key = fact.endpoint.cache_key();
        if fact.gone || !fact.endpoint.ready {
            debug!(id = %fact.container.id, domain = %fact.endpoint.domain, path = %fact.endpoint.path, "removing route");
            let remaining = self.index.remove(&fact.container, &fact.endpoint);
            if remaining == 0 {
                self.cache.evict(&key);
            }
        } else {
            debug!(id = %fact.container.id, domain = %fact.endpoint.domain, path = %fact.endpoint.path, "admitting route");
            self.index.add(fact.container, fact.endpoint);
        }
    }
}
