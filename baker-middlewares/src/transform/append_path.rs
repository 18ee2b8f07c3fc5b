//! `AppendPath` — wraps the request path with a fixed prefix/suffix.

use std::any::Any;
use std::sync::Arc;

use baker_middleware::{Middleware, NextFn, ProxyRequest, ProxyResponse};
use http::uri::{PathAndQuery, Uri};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Args {
    #[serde(default)]
    begin: String,
    #[serde(default)]
    end: String,
}

pub struct AppendPath {
    args: Args,
}

impl AppendPath {
    pub fn build(args: &serde_json::Value) -> anyhow::Result<Arc<dyn Middleware>> {
        let args: Args = serde_json::from_value(args.clone())?;
        Ok(Arc::new(Self { args }))
    }
}

#[async_trait::async_trait]
impl Middleware for AppendPath {
    async fn process(&self, mut req: ProxyRequest, next: NextFn) -> ProxyResponse {
        if let Some(uri) = wrap(req.uri(), &self.args.begin, &self.args.end) {
            *req.uri_mut() = uri;
        }
        next(req).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn wrap(uri: &Uri, begin: &str, end: &str) -> Option<Uri> {
    let new_path = format!("{begin}{}{end}", uri.path());
    let rebuilt = match uri.query() {
        Some(q) => format!("{new_path}?{q}"),
        None => new_path,
    };
    let pq: PathAndQuery = rebuilt.parse().ok()?;
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(pq);
    Uri::from_parts(parts).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn req(path: &str) -> ProxyRequest {
        http::Request::builder().uri(path).body(Bytes::new()).unwrap()
    }

    #[tokio::test]
    async fn prefixes_and_suffixes_the_path() {
        let mw = AppendPath::build(&serde_json::json!({"begin": "/v1", "end": ""})).unwrap();
        let next: NextFn = Arc::new(|r: ProxyRequest| {
            Box::pin(async move { http::Response::new(Bytes::from(r.uri().path().to_string())) })
                as baker_middleware::BoxFuture<'static, ProxyResponse>
        });
        let resp = mw.process(req("/b"), next).await;
        assert_eq!(resp.body(), &Bytes::from_static(b"/v1/b"));
    }

    #[test]
    fn preserves_query_string() {
        let out = wrap(&"/b?x=1".parse().unwrap(), "/v1", "").unwrap();
        assert_eq!(out.path_and_query().unwrap().as_str(), "/v1/b?x=1");
    }
}
