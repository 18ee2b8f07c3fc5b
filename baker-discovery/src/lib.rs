pub mod pinger;
pub mod reconciler;
pub mod watcher;

pub use pinger::Pinger;
pub use reconciler::Reconciler;
pub use watcher::DockerWatcher;
