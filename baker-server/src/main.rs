// Dynamic container-discovery reverse proxy: config load, component
// wiring, and graceful shutdown. Grounded on `ando-server::main`'s
// CLI/tracing/config bootstrap, retargeted from monoio worker threads to
// a tokio task set coordinated by a `CancellationToken`.

use std::sync::Arc;

use baker_core::config::BakerConfig;
use baker_core::RoutingIndex;
use baker_discovery::{DockerWatcher, Pinger, Reconciler};
use baker_middleware::MiddlewareCache;
use baker_observability::init_tracing;
use baker_observability::metrics::MetricsCollector;
use baker_proxy::{debug_router, ProxyHandler};
use clap::Parser;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "baker", version, about = "Dynamic container-discovery HTTP reverse proxy")]
struct Cli {
    /// Path to a YAML configuration file. Falls back to a handful of
    /// default locations (see `BakerConfig::load`) when omitted.
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = BakerConfig::load(cli.config.as_deref())?;
    init_tracing(&config.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "baker starting");

    let registry = Arc::new(baker_middlewares::default_registry()?);
    info!(count = registry.len(), "middlewares registered");

    let index = Arc::new(RoutingIndex::new());
    let cache = Arc::new(MiddlewareCache::new());
    let collector = Arc::new(MetricsCollector::new()?);
    let cancel = CancellationToken::new();

    let (containers_tx, containers_rx) = tokio::sync::mpsc::channel(config.discovery.fact_channel_capacity);
    let (facts_tx, facts_rx) = tokio::sync::mpsc::channel(config.discovery.fact_channel_capacity);

    let watcher = DockerWatcher::new(config.discovery.docker_base_url.clone());
    let watcher_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { watcher.run(containers_tx, cancel).await }
    });

    let pinger = Arc::new(Pinger::new(
        config.discovery.poll_timeout(),
        config.discovery.poll_interval(),
        config.discovery.poll_fanout,
    ));
    let pinger_task = tokio::spawn({
        let pinger = Arc::clone(&pinger);
        let cancel = cancel.clone();
        async move { pinger.run(containers_rx, facts_tx, cancel).await }
    });

    let reconciler = Reconciler::new(Arc::clone(&index), Arc::clone(&cache));
    let reconciler_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { reconciler.run(facts_rx, cancel).await }
    });

    let debug_task = spawn_debug_server(&config, Arc::clone(&index), Arc::clone(&collector), cancel.clone());
    let proxy_task = spawn_proxy_server(&config, index, registry, cache, collector, cancel.clone());

    shutdown_signal().await;
    info!("shutdown signal received, stopping");
    cancel.cancel();

    for (name, task) in [
        ("watcher", watcher_task),
        ("pinger", pinger_task),
        ("reconciler", reconciler_task),
        ("debug", debug_task),
        ("proxy", proxy_task),
    ] {
        if let Err(err) = task.await {
            error!(%name, %err, "task panicked during shutdown");
        }
    }

    info!("baker stopped");
    Ok(())
}

fn spawn_debug_server(
    config: &BakerConfig,
    index: Arc<RoutingIndex>,
    collector: Arc<MetricsCollector>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let enabled = config.debug.enabled;
    let addr = config.debug.listen_addr;
    tokio::spawn(async move {
        if !enabled {
            return;
        }
        let router = debug_router(index, collector);
        let listener = match TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(err) => {
                error!(%addr, %err, "failed to bind debug listener");
                return;
            }
        };
        info!(%addr, "debug/metrics listener started");
        let serve = axum::serve(listener, router).with_graceful_shutdown(cancel.cancelled_owned());
        if let Err(err) = serve.await {
            error!(%err, "debug server terminated with an error");
        }
    })
}

fn spawn_proxy_server(
    config: &BakerConfig,
    index: Arc<RoutingIndex>,
    registry: Arc<baker_middleware::MiddlewareRegistry>,
    cache: Arc<MiddlewareCache>,
    collector: Arc<MetricsCollector>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let addr = config.proxy.listen_addr;
    tokio::spawn(async move {
        let handler = Arc::new(ProxyHandler::new(index, registry, cache, collector));
        let listener = match TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(err) => {
                error!(%addr, %err, "failed to bind proxy listener");
                return;
            }
        };
        info!(%addr, "proxy listener started");

        loop {
            let (stream, peer): (_, SocketAddr) = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        error!(%err, "accept failed");
                        continue;
                    }
                },
            };

            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = hyper::service::service_fn(move |req| {
                    let handler = Arc::clone(&handler);
                    async move { handler.serve(req, peer).await }
                });
                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::debug!(%peer, %err, "connection closed with an error");
                }
            });
        }
    })
}

/// Waits for SIGTERM (docker stop) or Ctrl-C, whichever fires first.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
