pub mod debug;
pub mod handler;

pub use debug::router as debug_router;
pub use handler::{HyperResponse, ProxyHandler};
