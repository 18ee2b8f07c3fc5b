//! Process configuration, grounded on `ando-core::config::AndoConfig`'s
//! figment-based YAML + environment-override loading.

use std::net::SocketAddr;
use std::time::Duration;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BakerConfig {
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub debug: DebugConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Client-facing HTTP listener.
    #[serde(default = "default_proxy_addr")]
    pub listen_addr: SocketAddr,

    /// Total timeout for a proxied request's upstream I/O.
    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConfig {
    /// `/debug/routes` + `/metrics` inspection listener.
    #[serde(default = "default_debug_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Base URL of the container host's unix-socket HTTP API (e.g. exposed
    /// over a local proxy as `http://localhost/`); the concrete transport is
    /// out of scope (spec.md §1) but the base URL is needed to construct
    /// requests against it.
    #[serde(default = "default_docker_base_url")]
    pub docker_base_url: String,

    /// Poll-tick interval for re-fetching each container's routing
    /// declaration.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Client timeout for the per-container configuration GET (spec.md §5:
    /// "a short total timeout and a short dial timeout").
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Bound on concurrent in-flight configuration GETs per tick.
    #[serde(default = "default_poll_fanout")]
    pub poll_fanout: usize,

    /// Capacity of the bounded fact channel between Pinger and Reconciler
    /// (spec.md §4.4's back-pressure policy).
    #[serde(default = "default_fact_channel_capacity")]
    pub fact_channel_capacity: usize,
}

impl ProxyConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}

impl DiscoveryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_proxy_addr(),
            upstream_timeout_ms: default_upstream_timeout_ms(),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_debug_addr(),
            enabled: true,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            docker_base_url: default_docker_base_url(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
            poll_fanout: default_poll_fanout(),
            fact_channel_capacity: default_fact_channel_capacity(),
        }
    }
}

impl Default for BakerConfig {
    fn default() -> Self {
        Self {
            proxy: ProxyConfig::default(),
            debug: DebugConfig::default(),
            discovery: DiscoveryConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl BakerConfig {
    /// Load configuration from an explicit YAML path, falling back to a
    /// handful of default locations, then apply `BAKER_`-prefixed
    /// environment overrides (e.g. `BAKER_PROXY__LISTEN_ADDR`).
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(figment::providers::Serialized::defaults(
            BakerConfig::default(),
        ));

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        } else {
            for default_path in &["baker.yaml", "/etc/baker/baker.yaml", "config/baker.yaml"] {
                if std::path::Path::new(default_path).exists() {
                    figment = figment.merge(Yaml::file(default_path));
                    break;
                }
            }
        }

        figment = figment.merge(Env::prefixed("BAKER_").split("__"));

        Ok(figment.extract()?)
    }
}

fn default_proxy_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_debug_addr() -> SocketAddr {
    "127.0.0.1:8081".parse().unwrap()
}

fn default_docker_base_url() -> String {
    "http://localhost".to_string()
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_poll_timeout_ms() -> u64 {
    5_000
}

fn default_poll_fanout() -> usize {
    16
}

fn default_fact_channel_capacity() -> usize {
    64
}

fn default_upstream_timeout_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
