//! The inbound request path (spec.md §4.8), grounded on the teacher's
//! `ando-proxy::proxy::ProxyWorker::handle_request` shape (route lookup →
//! plugin resolution → proxy), rebuilt around `hyper` instead of monoio's
//! manual HTTP parsing, and on `examples/original_source/baker.go`'s
//! `ReverseProxy` step (host/path lookup, `X-Forwarded-*`, the empty
//! explicit `User-Agent`).

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use baker_core::{BakerError, RoutingIndex};
use baker_middleware::{fold_chain, BoxFuture, ClientAddr, MiddlewareCache, MiddlewareRegistry, NextFn, ProxyRequest, ProxyResponse};
use baker_observability::metrics::MetricsCollector;
use baker_observability::AccessLogEntry;
use bytes::Bytes;
use http::{HeaderValue, Request, Response, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use tracing::{error, warn};

pub type HyperResponse = Response<Full<Bytes>>;

pub struct ProxyHandler {
    index: Arc<RoutingIndex>,
    registry: Arc<MiddlewareRegistry>,
    cache: Arc<MiddlewareCache>,
    collector: Arc<MetricsCollector>,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl ProxyHandler {
    pub fn new(
        index: Arc<RoutingIndex>,
        registry: Arc<MiddlewareRegistry>,
        cache: Arc<MiddlewareCache>,
        collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            index,
            registry,
            cache,
            collector,
            client: Client::builder(hyper_util::rt::TokioExecutor::new()).build_http(),
        }
    }

    pub async fn serve(self: Arc<Self>, req: Request<Incoming>, peer: SocketAddr) -> Result<HyperResponse, Infallible> {
        Ok(self.handle(req, peer).await)
    }

    async fn handle(&self, req: Request<Incoming>, peer: SocketAddr) -> HyperResponse {
        let started = Instant::now();
        let host = host_of(&req);
        let path = req.uri().path().to_string();
        let method = req.method().to_string();

        let (resp, upstream_addr) = self.dispatch(req, &host, &path, peer).await;
        let elapsed = started.elapsed();

        self.collector.record_request(&host, &method, resp.status().as_u16(), elapsed.as_secs_f64());

        AccessLogEntry {
            domain: host,
            path,
            client_ip: peer.ip().to_string(),
            method,
            status: resp.status().as_u16(),
            latency_ms: elapsed.as_secs_f64() * 1000.0,
            upstream_addr,
        }
        .log();

        resp
    }

    async fn dispatch(&self, req: Request<Incoming>, host: &str, path: &str, peer: SocketAddr) -> (HyperResponse, Option<String>) {
        let Some(backend) = self.index.lookup(host, path) else {
            return (error_response(&BakerError::NotFound), None);
        };

        let key = backend.endpoint.cache_key();
        let middlewares = match self.cache.resolve(&key, &backend.endpoint.rules, &self.registry) {
            Ok(mw) => mw,
            Err(err) => {
                error!(%err, domain = %host, path = %path, "middleware resolution failed");
                return (error_response(&BakerError::RuleResolution(err.to_string())), None);
            }
        };

        let Some(addr) = backend.container.addr else {
            return (error_response(&BakerError::NotFound), None);
        };

        let upstream_req = match rewrite(req, addr, peer).await {
            Ok(r) => r,
            Err(err) => {
                warn!(%err, "failed to buffer/rewrite inbound request");
                return (error_response(&BakerError::Transient(err.to_string())), None);
            }
        };

        let terminal = self.terminal(addr);
        let chain = fold_chain(&middlewares, terminal);
        let resp = chain(upstream_req).await;
        (to_hyper_response(resp), Some(addr.to_string()))
    }

    fn terminal(&self, addr: SocketAddr) -> NextFn {
        let client = self.client.clone();
        Arc::new(move |req: ProxyRequest| {
            let client = client.clone();
            Box::pin(async move {
                let (parts, body) = req.into_parts();
                let forward = Request::from_parts(parts, Full::new(body));
                match client.request(forward).await {
                    Ok(resp) => {
                        let (parts, body) = resp.into_parts();
                        let collected = body.collect().await.map(|c| c.to_bytes()).unwrap_or_default();
                        Response::from_parts(parts, collected)
                    }
                    Err(err) => {
                        warn!(%err, %addr, "upstream request failed");
                        error_response_body(&BakerError::Transient(err.to_string()))
                    }
                }
            }) as BoxFuture<'static, ProxyResponse>
        })
    }
}

fn host_of(req: &Request<Incoming>) -> String {
    req.headers()
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(':').next().unwrap_or(s).to_string())
        .or_else(|| req.uri().host().map(str::to_string))
        .unwrap_or_default()
}

/// Buffers the inbound body and rewrites the request target to point at
/// `addr`, stripping a single trailing `/` from the path (spec.md §8's
/// resolved Open Question: normalization happens at forward time, not at
/// lookup time) and attaching `X-Forwarded-*` plus `ClientAddr`.
async fn rewrite(req: Request<Incoming>, addr: SocketAddr, peer: SocketAddr) -> anyhow::Result<ProxyRequest> {
    let (mut parts, body) = req.into_parts();
    let bytes = body.collect().await?.to_bytes();

    let original_host = parts
        .headers
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let proto = "http";

    let path = parts.uri.path();
    let path = if path.len() > 1 { path.trim_end_matches('/') } else { path };
    let path_and_query = match parts.uri.query() {
        Some(q) => format!("{path}?{q}"),
        None => path.to_string(),
    };
    let new_uri: Uri = format!("http://{addr}{path_and_query}").parse()?;
    parts.uri = new_uri;
    parts.headers.insert(http::header::HOST, HeaderValue::from_str(&addr.to_string())?);

    parts.headers.insert("x-forwarded-for", HeaderValue::from_str(&peer.ip().to_string())?);
    parts.headers.insert("x-forwarded-proto", HeaderValue::from_static(proto));
    if !original_host.is_empty() {
        parts.headers.insert("x-forwarded-host", HeaderValue::from_str(&original_host)?);
    }
    if !parts.headers.contains_key(http::header::USER_AGENT) {
        parts.headers.insert(http::header::USER_AGENT, HeaderValue::from_static(""));
    }

    let mut req = Request::from_parts(parts, bytes);
    req.extensions_mut().insert(ClientAddr(peer));
    Ok(req)
}

fn to_hyper_response(resp: ProxyResponse) -> HyperResponse {
    let (parts, body) = resp.into_parts();
    Response::from_parts(parts, Full::new(body))
}

fn error_response(err: &BakerError) -> HyperResponse {
    to_hyper_response(error_response_body(err))
}

fn error_response_body(err: &BakerError) -> ProxyResponse {
    Response::builder()
        .status(StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Bytes::from(err.to_json_body()))
        .expect("static error response is well-formed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped_at_forward_time_not_lookup_time() {
        let stripped = "/a/b/".trim_end_matches('/');
        assert_eq!(stripped, "/a/b");
        let root = "/";
        let path = if root.len() > 1 { root.trim_end_matches('/') } else { root };
        assert_eq!(path, "/", "root path is never stripped to empty");
    }
}
