//! `Name -> Builder` table (spec.md §4.6), grounded on
//! `ando-plugin::registry::PluginRegistry`'s `HashMap<String, Arc<dyn
//! Plugin>>` shape, generalized to store builders rather than instances so
//! each request gets a fresh instance decoded from its own `Args`.
//!
//! Per spec.md §9's design note, this is NOT a process-wide `static` map:
//! it is built once by a `default_registry()`-style factory (in
//! `baker-middlewares`) and passed by `Arc` into the server/handler
//! construction path.

use std::collections::HashMap;
use std::sync::Arc;

use baker_core::RuleSpec;

use crate::error::MiddlewareError;
use crate::middleware::Middleware;

pub type Builder = Arc<dyn Fn(&serde_json::Value) -> Result<Arc<dyn Middleware>, MiddlewareError> + Send + Sync>;

pub struct MiddlewareRegistry {
    builders: HashMap<String, Builder>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self { builders: HashMap::new() }
    }

    /// Registration is additive at startup; duplicate names are rejected.
    pub fn register(&mut self, name: &str, builder: Builder) -> Result<(), MiddlewareError> {
        if self.builders.contains_key(name) {
            return Err(MiddlewareError::DuplicateName(name.to_string()));
        }
        self.builders.insert(name.to_string(), builder);
        Ok(())
    }

    /// Builds a fresh `Middleware` instance from a `RuleSpec`. Unknown
    /// types and decode failures both surface as `MiddlewareError`
    /// (500 at request time, per spec.md §7).
    pub fn build(&self, rule: &RuleSpec) -> Result<Arc<dyn Middleware>, MiddlewareError> {
        let builder = self
            .builders
            .get(&rule.kind)
            .ok_or_else(|| MiddlewareError::UnknownType(rule.kind.clone()))?;
        builder(&rule.args)
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

impl Default for MiddlewareRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{BoxFuture, NextFn, ProxyRequest, ProxyResponse};
    use bytes::Bytes;

    struct PassThrough;

    #[async_trait::async_trait]
    impl Middleware for PassThrough {
        async fn process(&self, req: ProxyRequest, next: NextFn) -> ProxyResponse {
            next(req).await
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    fn pass_through_builder() -> Builder {
        Arc::new(|_args| Ok(Arc::new(PassThrough) as Arc<dyn Middleware>))
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = MiddlewareRegistry::new();
        registry.register("PassThrough", pass_through_builder()).unwrap();
        let err = registry.register("PassThrough", pass_through_builder()).unwrap_err();
        assert!(matches!(err, MiddlewareError::DuplicateName(_)));
    }

    #[test]
    fn unknown_type_fails_build() {
        let registry = MiddlewareRegistry::new();
        let rule = RuleSpec { kind: "Nope".into(), args: serde_json::Value::Null };
        let err = registry.build(&rule).unwrap_err();
        assert!(matches!(err, MiddlewareError::UnknownType(_)));
    }

    #[tokio::test]
    async fn built_instance_forwards_to_next() {
        let mut registry = MiddlewareRegistry::new();
        registry.register("PassThrough", pass_through_builder()).unwrap();
        let rule = RuleSpec { kind: "PassThrough".into(), args: serde_json::Value::Null };
        let mw = registry.build(&rule).unwrap();

        let next: NextFn = Arc::new(|_req| {
            Box::pin(async { ProxyResponse::new(Bytes::from_static(b"ok")) }) as BoxFuture<'static, ProxyResponse>
        });
        let req = ProxyRequest::new(Bytes::new());
        let resp = mw.process(req, next).await;
        assert_eq!(resp.body(), &Bytes::from_static(b"ok"));
    }
}
