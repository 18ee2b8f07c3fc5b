pub mod concurrent;
pub mod config;
pub mod error;
pub mod index;
pub mod model;
pub mod service;
pub mod trie;

pub use concurrent::{ConcurrentMap, ConcurrentSet};
pub use config::BakerConfig;
pub use error::BakerError;
pub use index::RoutingIndex;
pub use model::{Backend, Container, Endpoint, Fact, RuleSpec};
pub use service::Service;
pub use trie::PathTrie;
