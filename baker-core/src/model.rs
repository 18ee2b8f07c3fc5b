use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// A container discovered from the host, identified by a stable opaque ID.
///
/// `addr == None` represents "removed" — a container that departed or whose
/// address could not be parsed. Mutable fields (`addr`, `config_path`) are
/// only ever set by a `Watcher`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    pub addr: Option<SocketAddr>,
    pub config_path: String,
}

impl Container {
    pub fn new(id: impl Into<String>, addr: SocketAddr, config_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            addr: Some(addr),
            config_path: config_path.into(),
        }
    }

    /// A departure: same ID, address invalidated.
    pub fn departed(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            addr: None,
            config_path: String::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.addr.is_some()
    }
}

/// One ordered step of the middleware chain, as published by the container.
///
/// `kind` is serialized as `"type"` to match the wire format in the
/// container configuration payload; `kind` avoids colliding with the Rust
/// keyword.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// A routing declaration published by a container at its `config_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub domain: String,
    pub path: String,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    #[serde(default)]
    pub ready: bool,
}

impl Endpoint {
    /// `Domain + Path`, concatenated with no separator — the
    /// `MiddlewareCacheKey` and the key RoutingIndex uses internally.
    pub fn cache_key(&self) -> String {
        format!("{}{}", self.domain, self.path)
    }
}

/// The `(Container, Endpoint)` binding held inside a `Service`. Identity
/// within a `Service` set is by `Container.id`.
#[derive(Debug, Clone)]
pub struct Backend {
    pub container: Container,
    pub endpoint: Endpoint,
}

impl Backend {
    pub fn new(container: Container, endpoint: Endpoint) -> Self {
        Self { container, endpoint }
    }
}

/// A `(Container, Endpoint)` pair emitted by the Pinger for the Reconciler to
/// fold into the routing index. `gone == true` means the container departed
/// and every backend referencing it must be removed.
#[derive(Debug, Clone)]
pub struct Fact {
    pub container: Container,
    pub endpoint: Endpoint,
    pub gone: bool,
}

impl Fact {
    pub fn upsert(container: Container, endpoint: Endpoint) -> Self {
        Self { container, endpoint, gone: false }
    }

    pub fn departure(container: Container, endpoint: Endpoint) -> Self {
        Self { container, endpoint, gone: true }
    }
}
