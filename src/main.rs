// ===============================
// src/main.rs
// ===============================
/*
 cd /home/kukuhtw/rust/signal_relay

 # kirim sinyal lewat stdin (JSONL)
echo '{"channel":"channel1","text":"🔼 CALL EUR/USD 14:05 martingale 1"}' | cargo run

# lihat agregat & log
curl -s localhost:8080/metrics
curl -s localhost:8080/logs
curl -s -X POST localhost:8080/reset
curl -s localhost:8080/prom | grep '^relay_'

*/
/*
=============================================================================
Project : signal_relay — async trading-signal relay & win/loss metrics in Rust
Module  : <module_name>.rs
Version : 0.1.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Parses free-text signals from chat channels, relays trade commands
          to the execution agent over a reconnecting WebSocket, aggregates
          trade results into daily/weekly/monthly/per-channel stats, and
          exposes them over a small HTTP API plus Prometheus metrics.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
mod api;
mod clock;
mod config;
mod domain;
mod extractor;
mod ingest;
mod logbook;
mod relay;
mod shutdown;
mod store;
mod telemetry;

use std::sync::Arc;

use tokio::{
    select,
    sync::{mpsc, watch},
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::domain::OutcomeEvent;
use crate::ingest::Ingestor;
use crate::logbook::Logbook;
use crate::store::MetricsStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ---- Load config ----
    let cfg = config::load()?;
    info!(
        relay = %cfg.relay_url,
        port = cfg.port,
        channels = ?cfg.channels,
        input = ?cfg.signal_input,
        "startup config"
    );

    // ---- Telemetry ----
    telemetry::init();

    // ---- Shared state (dibuat sekali, dioper lewat Arc) ----
    let logbook = Arc::new(Logbook::new());
    let store = Arc::new(MetricsStore::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ---- Outcome bus: relay -> store ----
    let (outcome_tx, outcome_rx) = mpsc::channel::<OutcomeEvent>(1024);
    tokio::spawn(store::run(outcome_rx, store.clone()));

    // ---- Relay (execution agent) ----
    let (relay, relay_handle) = relay::channel(
        cfg.relay_url.clone(),
        outcome_tx,
        logbook.clone(),
        shutdown_rx.clone(),
    );
    let relay_task = tokio::spawn(relay.run());

    // ---- Ingestion ----
    let ingestor = Ingestor::new(cfg.channels.clone(), relay_handle.clone(), logbook.clone());
    let input = ingest::open_input(cfg.signal_input.as_deref(), &logbook).await;
    tokio::spawn(ingestor.run(input, shutdown_rx.clone()));

    // ---- Query API ----
    let api_state = api::ApiState {
        store: store.clone(),
        logbook: logbook.clone(),
        relay: relay_handle.clone(),
    };
    let api_task = api::spawn(cfg.port, api_state, shutdown_rx.clone())?;
    logbook.system(format!("Server listening on {}", cfg.port));

    // ---- Heartbeat sampai Ctrl-C ----
    let mut beat = interval(Duration::from_secs(60));
    beat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            _ = beat.tick() => {
                let t = store.totals();
                info!(
                    trades = t.trades,
                    wins = t.wins,
                    losses = t.losses,
                    relay = relay_handle.state().as_str(),
                    "heartbeat"
                );
            }
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = relay_task.await;
    let _ = api_task.await;
    info!("bye");
    Ok(())
}
