//! Periodic polling of each known container's `ConfigPath`, grounded on
//! `examples/original_source/pinger.go`'s `BasePinger` (`containersMap` +
//! `pumps`/`pings` loop), collapsed into a single bounded-fanout tick since
//! tokio gives us structured concurrency the Go original modelled with two
//! goroutines and three channels.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use baker_core::{Container, Endpoint, Fact};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Upper bound on how long a single fact send may block before the
/// back-pressure policy kicks in (spec.md §4.4: "a bounded wait, then drop
/// the oldest pending tick rather than block the event loop").
const FACT_SEND_BOUND: Duration = Duration::from_secs(1);

pub struct Pinger {
    client: reqwest::Client,
    poll_interval: Duration,
    fanout: Arc<Semaphore>,
    containers: Mutex<HashMap<String, Container>>,
    /// Last successfully-polled endpoint set per container, so a departure
    /// can be translated into the exact `Fact::departure`s the Reconciler
    /// needs to evict (the Go original re-derives this from `Endpoints`
    /// lists kept inside the `Store`; baker keeps it here instead since the
    /// Reconciler has no notion of "previous" state).
    last_endpoints: Mutex<HashMap<String, Vec<Endpoint>>>,
    /// Per-container generation counter, bumped on departure. A poll task
    /// in flight at the moment a departure is observed carries the epoch it
    /// saw when it was spawned; if that no longer matches by the time the
    /// poll completes, its results are stale and are dropped instead of
    /// being allowed to resurrect a backend that already left (spec.md §5's
    /// per-`Container.ID` ordering guarantee).
    epoch: Arc<Mutex<HashMap<String, u64>>>,
}

impl Pinger {
    pub fn new(poll_timeout: Duration, poll_interval: Duration, fanout: usize) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(poll_timeout)
                .build()
                .expect("static client config is valid"),
            poll_interval,
            fanout: Arc::new(Semaphore::new(fanout.max(1))),
            containers: Mutex::new(HashMap::new()),
            last_endpoints: Mutex::new(HashMap::new()),
            epoch: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Consumes the watcher's container feed, keeping `containers` current
    /// and translating departures into `Fact::departure`s, while a separate
    /// tick loop re-polls every known container on `poll_interval`.
    pub async fn run(
        self: Arc<Self>,
        mut containers_rx: mpsc::Receiver<Container>,
        facts_tx: mpsc::Sender<Fact>,
        cancel: CancellationToken,
    ) {
        let tick_handle = {
            let this = Arc::clone(&self);
            let facts_tx = facts_tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { this.tick_loop(facts_tx, cancel).await })
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe = containers_rx.recv() => {
                    match maybe {
                        Some(container) => self.observe(container, &facts_tx).await,
                        None => break,
                    }
                }
            }
        }
        tick_handle.abort();
    }

    async fn observe(&self, container: Container, facts_tx: &mpsc::Sender<Fact>) {
        if container.is_active() {
            debug!(id = %container.id, "observed container");
            self.containers.lock().unwrap().insert(container.id.clone(), container);
            return;
        }

        debug!(id = %container.id, "container departed");
        self.containers.lock().unwrap().remove(&container.id);
        *self.epoch.lock().unwrap().entry(container.id.clone()).or_insert(0) += 1;
        let stale = self.last_endpoints.lock().unwrap().remove(&container.id).unwrap_or_default();
        for endpoint in stale {
            let fact = Fact::departure(container.clone(), endpoint);
            if !emit(facts_tx, fact, &container.id).await {
                return;
            }
        }
    }

    async fn tick_loop(&self, facts_tx: mpsc::Sender<Fact>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            let snapshot: Vec<(Container, u64)> = {
                let containers = self.containers.lock().unwrap();
                let epoch = self.epoch.lock().unwrap();
                containers
                    .values()
                    .map(|c| (c.clone(), epoch.get(&c.id).copied().unwrap_or(0)))
                    .collect()
            };
            let mut handles = Vec::with_capacity(snapshot.len());
            for (container, expected_epoch) in snapshot {
                let permit = Arc::clone(&self.fanout);
                let client = self.client.clone();
                let facts_tx = facts_tx.clone();
                let epoch = Arc::clone(&self.epoch);
                handles.push(tokio::spawn(async move {
                    let _permit = permit.acquire_owned().await;
                    poll_one(&client, container, expected_epoch, &epoch, &facts_tx).await
                }));
            }
            let mut last_endpoints = HashMap::new();
            for h in handles {
                if let Ok(Some((id, endpoints))) = h.await {
                    last_endpoints.insert(id, endpoints);
                }
            }
            *self.last_endpoints.lock().unwrap() = last_endpoints;
        }
    }
}

/// Sends `fact` with a bounded wait; if the channel is still saturated after
/// `FACT_SEND_BOUND`, the fact is dropped rather than blocking the tick loop
/// (spec.md §4.4's documented back-pressure policy). Returns `false` only
/// when the Reconciler side has gone away and the caller should stop.
async fn emit(facts_tx: &mpsc::Sender<Fact>, fact: Fact, id: &str) -> bool {
    match tokio::time::timeout(FACT_SEND_BOUND, facts_tx.send(fact)).await {
        Ok(Ok(())) => true,
        Ok(Err(_)) => false,
        Err(_) => {
            warn!(id = %id, "fact channel saturated past the 1s bound, dropping this tick's fact");
            true
        }
    }
}

async fn poll_one(
    client: &reqwest::Client,
    container: Container,
    expected_epoch: u64,
    epoch: &Mutex<HashMap<String, u64>>,
    facts_tx: &mpsc::Sender<Fact>,
) -> Option<(String, Vec<Endpoint>)> {
    let addr = container.addr?;
    let url = format!("http://{addr}{}", container.config_path);

    let endpoints: Vec<Endpoint> = match client.get(&url).send().await {
        Ok(resp) => match resp.json().await {
            Ok(endpoints) => endpoints,
            Err(err) => {
                warn!(id = %container.id, %err, "malformed config payload, leaving prior endpoints installed");
                return None;
            }
        },
        Err(err) => {
            warn!(id = %container.id, %err, "transient poll failure, will retry next tick");
            return None;
        }
    };

    if epoch.lock().unwrap().get(&container.id).copied().unwrap_or(0) != expected_epoch {
        debug!(id = %container.id, "discarding poll result: container departed while the request was in flight");
        return None;
    }

    for endpoint in &endpoints {
        let fact = Fact::upsert(container.clone(), endpoint.clone());
        if !emit(facts_tx, fact, &container.id).await {
            return None;
        }
    }
    Some((container.id, endpoints))
}
