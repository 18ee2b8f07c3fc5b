pub mod cache;
pub mod error;
pub mod middleware;
pub mod registry;

pub use cache::MiddlewareCache;
pub use error::MiddlewareError;
pub use middleware::{fold_chain, BoxFuture, ClientAddr, Middleware, NextFn, ProxyRequest, ProxyResponse};
pub use registry::{Builder, MiddlewareRegistry};
