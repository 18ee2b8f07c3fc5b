//! Structured access log entry, grounded on
//! `ando-observability::access_log::AccessLogEntry`, emitted as a `tracing`
//! event around the proxy's serve step rather than shipped to a separate
//! sink.

use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub domain: String,
    pub path: String,
    pub client_ip: String,
    pub method: String,
    pub status: u16,
    pub latency_ms: f64,
    pub upstream_addr: Option<String>,
}

impl AccessLogEntry {
    /// Emits this entry as a single structured `tracing` event at `info`.
    pub fn log(&self) {
        info!(
            domain = %self.domain,
            path = %self.path,
            client_ip = %self.client_ip,
            method = %self.method,
            status = self.status,
            latency_ms = self.latency_ms,
            upstream_addr = self.upstream_addr.as_deref().unwrap_or(""),
            "request"
        );
    }
}
