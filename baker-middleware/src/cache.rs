//! Per-endpoint cache of stateful middleware instances (spec.md §4.7),
//! grounded on `ando-store::cache::ConfigCache`'s `DashMap`-backed
//! per-key store, generalized from resource-type maps to a single
//! `(domain+path) -> Vec<Arc<dyn Middleware>>` map.

use std::sync::Arc;

use baker_core::{ConcurrentMap, RuleSpec};

use crate::error::MiddlewareError;
use crate::middleware::Middleware;
use crate::registry::MiddlewareRegistry;

pub struct MiddlewareCache {
    entries: ConcurrentMap<String, Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareCache {
    pub fn new() -> Self {
        Self { entries: ConcurrentMap::new() }
    }

    /// Resolves the middleware chain for one rule list under a single
    /// atomic get-or-update critical section (spec.md §5:
    /// `MiddlewareCache.GetAndUpdate(key, fn)` observes/installs exactly
    /// once per call).
    pub fn resolve(
        &self,
        key: &str,
        rules: &[RuleSpec],
        registry: &MiddlewareRegistry,
    ) -> Result<Vec<Arc<dyn Middleware>>, MiddlewareError> {
        let fresh: Vec<Arc<dyn Middleware>> =
            rules.iter().map(|r| registry.build(r)).collect::<Result<_, _>>()?;
        let fresh_for_hit = fresh.clone();

        let installed = self.entries.get_and_update(
            key.to_string(),
            move || fresh,
            move |cached: &Vec<Arc<dyn Middleware>>| {
                fresh_for_hit
                    .iter()
                    .enumerate()
                    .map(|(i, fresh_mw)| {
                        if !fresh_mw.is_cacheable() {
                            return Arc::clone(fresh_mw);
                        }
                        match cached.get(i) {
                            Some(existing) if existing.is_cacheable() && existing.update_from(fresh_mw) => {
                                Arc::clone(existing)
                            }
                            _ => {
                                fresh_mw.update_from(fresh_mw);
                                Arc::clone(fresh_mw)
                            }
                        }
                    })
                    .collect()
            },
        );

        Ok(installed)
    }

    /// Bulk-evicts every rule-slot for `key`. Called by the Reconciler when
    /// `(Domain, Path)` loses all backends.
    pub fn evict(&self, key: &str) {
        self.entries.remove(&key.to_string());
    }
}

impl Default for MiddlewareCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{BoxFuture, NextFn, ProxyRequest, ProxyResponse};
    use std::sync::{Arc, Mutex};

    struct CountingLimiter {
        limit: Mutex<u64>,
        hits: Mutex<u64>,
    }

    #[async_trait::async_trait]
    impl Middleware for CountingLimiter {
        async fn process(&self, req: ProxyRequest, next: NextFn) -> ProxyResponse {
            *self.hits.lock().unwrap() += 1;
            next(req).await
        }
        fn is_cacheable(&self) -> bool {
            true
        }
        fn update_from(&self, new_instance: &Arc<dyn Middleware>) -> bool {
            let Some(new) = new_instance.as_any().downcast_ref::<CountingLimiter>() else {
                return false;
            };
            *self.limit.lock().unwrap() = *new.limit.lock().unwrap();
            true
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    fn builder(limit: u64) -> Arc<dyn Fn(&serde_json::Value) -> Result<Arc<dyn Middleware>, MiddlewareError> + Send + Sync> {
        Arc::new(move |_args| {
            Ok(Arc::new(CountingLimiter { limit: Mutex::new(limit), hits: Mutex::new(0) }) as Arc<dyn Middleware>)
        })
    }

    fn noop_next() -> NextFn {
        Arc::new(|_req| Box::pin(async { ProxyResponse::new(bytes::Bytes::new()) }) as BoxFuture<'static, ProxyResponse>)
    }

    #[tokio::test]
    async fn invariant_3_reference_stable_across_identical_polls() {
        let mut registry = MiddlewareRegistry::new();
        registry.register("Limiter", builder(5)).unwrap();
        let cache = MiddlewareCache::new();
        let rules = vec![RuleSpec { kind: "Limiter".into(), args: serde_json::Value::Null }];

        let first = cache.resolve("d+p", &rules, &registry).unwrap();
        first[0].process(ProxyRequest::new(bytes::Bytes::new()), noop_next()).await;

        let second = cache.resolve("d+p", &rules, &registry).unwrap();
        assert!(Arc::ptr_eq(&first[0], &second[0]));

        let hits = second[0].as_any().downcast_ref::<CountingLimiter>().unwrap().hits.lock().unwrap();
        assert_eq!(*hits, 1, "runtime state must survive the re-poll");
    }

    #[tokio::test]
    async fn invariant_4_changed_args_preserve_state_but_apply_new_config() {
        let cache = MiddlewareCache::new();
        let mut registry_v1 = MiddlewareRegistry::new();
        registry_v1.register("Limiter", builder(5)).unwrap();
        let rules = vec![RuleSpec { kind: "Limiter".into(), args: serde_json::Value::Null }];

        let first = cache.resolve("d+p", &rules, &registry_v1).unwrap();
        first[0].process(ProxyRequest::new(bytes::Bytes::new()), noop_next()).await;

        let mut registry_v2 = MiddlewareRegistry::new();
        registry_v2.register("Limiter", builder(10)).unwrap();
        let second = cache.resolve("d+p", &rules, &registry_v2).unwrap();

        assert!(Arc::ptr_eq(&first[0], &second[0]), "instance must be reused, not replaced");
        let concrete = second[0].as_any().downcast_ref::<CountingLimiter>().unwrap();
        assert_eq!(*concrete.limit.lock().unwrap(), 10, "new args must be observed");
        assert_eq!(*concrete.hits.lock().unwrap(), 1, "runtime state must be preserved");
    }

    #[test]
    fn evict_clears_the_whole_slot_set() {
        let mut registry = MiddlewareRegistry::new();
        registry.register("Limiter", builder(1)).unwrap();
        let cache = MiddlewareCache::new();
        let rules = vec![RuleSpec { kind: "Limiter".into(), args: serde_json::Value::Null }];
        cache.resolve("d+p", &rules, &registry).unwrap();
        cache.evict("d+p");
        assert!(!cache.entries.contains_key(&"d+p".to_string()));
    }

    proptest::proptest! {
        /// Whatever sequence of limit values a container republishes across
        /// polls, `resolve` on the same key always returns the very same
        /// cacheable instance — the atomicity guarantee the Go original's
        /// `GetAndUpdate` provides, regardless of how many times config
        /// churns between polls.
        #[test]
        fn cacheable_instance_is_stable_across_any_sequence_of_limits(limits in proptest::collection::vec(1u64..100, 1..10)) {
            let cache = MiddlewareCache::new();
            let rules = vec![RuleSpec { kind: "Limiter".into(), args: serde_json::Value::Null }];

            let mut first: Option<Arc<dyn Middleware>> = None;
            for limit in limits {
                let mut registry = MiddlewareRegistry::new();
                registry.register("Limiter", builder(limit)).unwrap();
                let resolved = cache.resolve("d+p", &rules, &registry).unwrap();
                match &first {
                    None => first = Some(Arc::clone(&resolved[0])),
                    Some(f) => proptest::prop_assert!(Arc::ptr_eq(f, &resolved[0])),
                }
            }
        }
    }
}
