//! The `Middleware` contract: wraps a next-handler (spec.md §4.6), modelled
//! directly on `examples/original_source/rule/middleware.go`'s
//! `Process(next http.Handler) http.Handler`.

use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};

pub type ProxyRequest = Request<Bytes>;
pub type ProxyResponse = Response<Bytes>;
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The accepting socket's peer address, inserted into `req.extensions()` by
/// the proxy handler before the chain runs. Middlewares key per-client state
/// (e.g. `RateLimiter`) off this rather than trusting client-supplied
/// `X-Forwarded-For` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub SocketAddr);

/// The remaining chain (or the terminal reverse-proxy call), handed to a
/// `Middleware::process` so it can forward, transform, or short-circuit.
pub type NextFn = Arc<dyn Fn(ProxyRequest) -> BoxFuture<'static, ProxyResponse> + Send + Sync>;

/// A named request-processing step applied in declaration order around the
/// proxy.
#[async_trait::async_trait]
pub trait Middleware: Send + Sync {
    async fn process(&self, req: ProxyRequest, next: NextFn) -> ProxyResponse;

    /// Constant property controlling reuse semantics (§4.7). Default: not
    /// cacheable (a pure function of `next -> handler`).
    fn is_cacheable(&self) -> bool {
        false
    }

    /// For cacheable kinds only: merge `new_instance`'s declared
    /// configuration into `self`'s interior state, preserving runtime state
    /// (token buckets, counters). Returns `true` if the merge succeeded, in
    /// which case the caller keeps `self` installed; `false` if `self`
    /// cannot absorb `new_instance` (e.g. a mismatched concrete type, which
    /// should not normally happen since both come from the same builder),
    /// in which case the caller installs `new_instance` instead. Grounded
    /// on `examples/original_source/rule/ratelimiter.go`'s
    /// `UpdateMiddelware`, which always mutates and returns the same
    /// receiver.
    fn update_from(&self, new_instance: &Arc<dyn Middleware>) -> bool {
        let _ = new_instance;
        false
    }

    /// Downcast hook so `update_from` implementations can recover concrete
    /// configuration fields off the freshly-built instance.
    fn as_any(&self) -> &dyn Any;
}

/// Right-to-left fold: the first rule in the list becomes the outermost
/// handler. Grounded on `examples/original_source/baker.go`'s `apply`.
pub fn fold_chain(middlewares: &[Arc<dyn Middleware>], innermost: NextFn) -> NextFn {
    middlewares.iter().rev().fold(innermost, |next, mw| {
        let mw = Arc::clone(mw);
        let next = Arc::clone(&next);
        Arc::new(move |req: ProxyRequest| {
            let mw = Arc::clone(&mw);
            let next = Arc::clone(&next);
            Box::pin(async move { mw.process(req, next).await }) as BoxFuture<'static, ProxyResponse>
        })
    })
}
