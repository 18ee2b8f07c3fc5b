pub mod access_log;
pub mod init;

#[cfg(feature = "prometheus")]
pub mod metrics;

#[cfg(feature = "prometheus")]
pub mod prometheus_exporter;

pub use access_log::AccessLogEntry;
pub use init::init_tracing;
