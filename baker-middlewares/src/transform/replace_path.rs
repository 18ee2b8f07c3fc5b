//! `ReplacePath` — rewrites the request path before it reaches the upstream,
//! grounded on `ando-plugins::transform::request_transformer`'s header
//! add/remove/rename shape, applied to the path instead of headers.

use std::any::Any;
use std::sync::Arc;

use baker_middleware::{Middleware, NextFn, ProxyRequest, ProxyResponse};
use http::uri::{PathAndQuery, Uri};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Args {
    search: String,
    replace: String,
    /// Maximum number of replacements. Omitted (Go's zero value for an
    /// `int` field) means no replacements at all, matching
    /// `path_replace.go`'s `strings.Replace(path, search, replace, Times)`.
    #[serde(default)]
    times: Option<usize>,
}

pub struct ReplacePath {
    args: Args,
}

impl ReplacePath {
    pub fn build(args: &serde_json::Value) -> anyhow::Result<Arc<dyn Middleware>> {
        let args: Args = serde_json::from_value(args.clone())?;
        Ok(Arc::new(Self { args }))
    }
}

#[async_trait::async_trait]
impl Middleware for ReplacePath {
    async fn process(&self, mut req: ProxyRequest, next: NextFn) -> ProxyResponse {
        let rewritten = rewrite(req.uri(), &self.args.search, &self.args.replace, self.args.times);
        if let Some(uri) = rewritten {
            *req.uri_mut() = uri;
        }
        next(req).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn rewrite(uri: &Uri, search: &str, replace: &str, times: Option<usize>) -> Option<Uri> {
    let path = uri.path();
    let new_path = path.replacen(search, replace, times?);
    if new_path == path {
        return None;
    }
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
    async fn strips_the_declared_prefix_once() {
        let mw = ReplacePath::build(&serde_json::json!({"search": "/a", "replace": "", "times": 1})).unwrap();
        let next: NextFn = Arc::new(|r: ProxyRequest| {
            Box::pin(async move { http::Response::new(Bytes::from(r.uri().path().to_string())) })
                as baker_middleware::BoxFuture<'static, ProxyResponse>
        });
        let resp = mw.process(req("/a/a/b"), next).await;
        assert_eq!(resp.body(), &Bytes::from_static(b"/a/b"));
    }

    #[test]
    fn no_match_leaves_uri_untouched() {
        assert!(rewrite(&"/x/y".parse().unwrap(), "/a", "", Some(1)).is_none());
    }

    #[test]
    fn omitted_times_is_a_no_op() {
        assert!(rewrite(&"/a/a/a".parse().unwrap(), "/a", "", None).is_none());
    }

    #[test]
    fn times_bounds_the_replacement_count() {
        let out = rewrite(&"/a/a/a".parse().unwrap(), "/a", "", Some(2)).unwrap();
        assert_eq!(out.path(), "/a");
    }

    #[tokio::test]
    async fn args_without_a_times_field_leave_the_path_untouched() {
        let mw = ReplacePath::build(&serde_json::json!({"search": "/a", "replace": ""})).unwrap();
        let next: NextFn = Arc::new(|r: ProxyRequest| {
            Box::pin(async move { http::Response::new(Bytes::from(r.uri().path().to_string())) })
                as baker_middleware::BoxFuture<'static, ProxyResponse>
        });
        let resp = mw.process(req("/a/a/b"), next).await;
        assert_eq!(resp.body(), &Bytes::from_static(b"/a/a/b"));
    }
}
