//! `RateLimiter` — fixed-window per-client-IP request limiter, grounded on
//! `examples/original_source/rule/ratelimiter.go`'s `RateLimiter`/
//! `UpdateMiddelware` (cacheable, in-place-updated-on-args-change) and the
//! teacher's `ando-plugins::traffic::rate_limiting`'s counter shape.
//!
//! Wire format diverges from the teacher's numeric-seconds convention:
//! `window_duration` is a `humantime` string (`"1s"`, `"500ms"`), matching
//! the Go original's `time.ParseDuration`-based `WindowDuration`.

use std::any::Any;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use baker_middleware::{ClientAddr, Middleware, NextFn, ProxyRequest, ProxyResponse};
use bytes::Bytes;
use http::{Response, StatusCode};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, PartialEq)]
struct Args {
    request_limit: u64,
    #[serde(deserialize_with = "deserialize_human_duration")]
    window_duration: Duration,
}

fn deserialize_human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

struct Window {
    count: u64,
    started_at: Instant,
}

pub struct RateLimiter {
    args: Mutex<Args>,
    counters: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn build(raw: &serde_json::Value) -> anyhow::Result<Arc<dyn Middleware>> {
        let args: Args = serde_json::from_value(raw.clone())?;
        Ok(Arc::new(Self {
            args: Mutex::new(args),
            counters: Mutex::new(HashMap::new()),
        }))
    }

    fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        let args = self.args.lock().unwrap().clone();
        let now = Instant::now();
        let mut counters = self.counters.lock().unwrap();
        let window = counters.entry(ip).or_insert_with(|| Window { count: 0, started_at: now });

        if now.duration_since(window.started_at) >= args.window_duration {
            window.count = 0;
            window.started_at = now;
        }

        window.count += 1;
        if window.count > args.request_limit {
            let elapsed = now.duration_since(window.started_at);
            return Err(args.window_duration.saturating_sub(elapsed));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Middleware for RateLimiter {
    async fn process(&self, req: ProxyRequest, next: NextFn) -> ProxyResponse {
        let ip = req.extensions().get::<ClientAddr>().map(|c| c.0.ip());
        let Some(ip) = ip else {
            return next(req).await;
        };

        match self.check(ip) {
            Ok(()) => next(req).await,
            Err(retry_after) => {
                let body = serde_json::json!({"error": "rate limit exceeded"}).to_string();
                Response::builder()
                    .status(StatusCode::TOO_MANY_REQUESTS)
                    .header("retry-after", retry_after.as_secs().max(1).to_string())
                    .body(Bytes::from(body))
                    .expect("static response is well-formed")
            }
        }
    }

    fn is_cacheable(&self) -> bool {
        true
    }

    /// Mirrors `ratelimiter.go`'s `UpdateMiddelware`: always keeps `self`
    /// (preserving in-flight windows), only swapping in the new declared
    /// args when they differ.
    fn update_from(&self, new_instance: &Arc<dyn Middleware>) -> bool {
        let Some(new) = new_instance.as_any().downcast_ref::<RateLimiter>() else {
            return false;
        };
        let new_args = new.args.lock().unwrap().clone();
        let mut args = self.args.lock().unwrap();
        if *args != new_args {
            *args = new_args;
        }
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
