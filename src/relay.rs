// ===============================
// src/relay.rs (execution agent link)
// ===============================
//
// Relay ke execution agent (WebSocket):
// - Satu task (`Relay::run`) memegang koneksi secara eksklusif.
// - State: Disconnected -> Connecting -> Connected -> Disconnected -> ...
// - Outbound: `RelayHandle::send` gagal cepat kalau belum Connected (tidak antre, tidak retry).
// - Inbound : frame `trade_result` -> mpsc -> store dispatcher; frame lain (tipe lain, binary,
//             JSON rusak) dihitung, dicatat sebagai error di activity log, lalu dibuang.
// - Reconnect: delay tetap RECONNECT_DELAY, tanpa batas percobaan, berhenti saat shutdown.
//
use std::sync::Arc;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::{
        mpsc::{self, error::TrySendError},
        watch,
    },
    time::{sleep, Duration},
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::{AgentEnvelope, OutcomeEvent, TradeCommand, TradeResult};
use crate::logbook::{LogEntry, Logbook};
use crate::shutdown::stopped;
use crate::telemetry::{
    COMMANDS_LOST, COMMANDS_SENT, FRAMES_REJECTED, OUTCOMES, RELAY_CONNECTED, RELAY_LAST_EVENT_TS,
    RELAY_RECONNECTS,
};

/// Constant backoff between connection attempts. Signals are human-paced, so a
/// fixed delay is the chosen reconnect policy (no exponential growth, no jitter).
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

const OUTBOUND_QUEUE: usize = 64;

type AgentSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

impl LinkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay not connected (state: {})", .0.as_str())]
    NotConnected(LinkState),
    #[error("relay outbound queue full")]
    QueueFull,
    #[error("encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unexpected frame type {0:?}")]
    UnexpectedType(Option<String>),
    #[error("trade_result missing `{0}`")]
    MissingField(&'static str),
}

/// Decode one inbound text frame into an outcome.
pub fn decode_frame(txt: &str) -> Result<OutcomeEvent, FrameError> {
    let env: AgentEnvelope = serde_json::from_str(txt)?;
    if env.kind.as_deref() != Some("trade_result") {
        return Err(FrameError::UnexpectedType(env.kind));
    }
    let source_id = env.channel.ok_or(FrameError::MissingField("channel"))?;
    let result = env.result.ok_or(FrameError::MissingField("result"))?;
    Ok(OutcomeEvent {
        source_id,
        result: TradeResult::from_wire(&result),
        instrument: env.currency,
        entry_time: env.entry_time,
        martingale_level: env.martingale_level,
    })
}

/// Cloneable sender side used by ingestion and the query API.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    state_rx: watch::Receiver<LinkState>,
    out_tx: mpsc::Sender<String>,
    logbook: Arc<Logbook>,
}

impl RelayHandle {
    pub fn state(&self) -> LinkState {
        *self.state_rx.borrow()
    }

    /// Fire-and-forget. Never blocks; a command sent while not connected is lost.
    pub fn send(&self, cmd: &TradeCommand) -> Result<(), RelayError> {
        let state = self.state();
        if state != LinkState::Connected {
            COMMANDS_LOST.with_label_values(&["not_connected"]).inc();
            self.logbook.error("WS not ready, cannot send.");
            return Err(RelayError::NotConnected(state));
        }
        let payload = serde_json::to_string(cmd)?;
        self.out_tx.try_send(payload).map_err(|e| {
            let (reason, err) = match e {
                TrySendError::Full(_) => ("queue_full", RelayError::QueueFull),
                TrySendError::Closed(_) => {
                    ("not_connected", RelayError::NotConnected(LinkState::Disconnected))
                }
            };
            COMMANDS_LOST.with_label_values(&[reason]).inc();
            self.logbook.error(format!("cannot send: {err}"));
            err
        })
    }
}

pub struct Relay {
    url: Url,
    state_tx: watch::Sender<LinkState>,
    out_rx: mpsc::Receiver<String>,
    outcome_tx: mpsc::Sender<OutcomeEvent>,
    logbook: Arc<Logbook>,
    shutdown: watch::Receiver<bool>,
}

pub fn channel(
    url: Url,
    outcome_tx: mpsc::Sender<OutcomeEvent>,
    logbook: Arc<Logbook>,
    shutdown: watch::Receiver<bool>,
) -> (Relay, RelayHandle) {
    let (state_tx, state_rx) = watch::channel(LinkState::Disconnected);
    let (out_tx, out_rx) = mpsc::channel(OUTBOUND_QUEUE);
    let handle = RelayHandle { state_rx, out_tx, logbook: logbook.clone() };
    let relay = Relay { url, state_tx, out_rx, outcome_tx, logbook, shutdown };
    (relay, handle)
}

impl Relay {
    fn set_state(&self, s: LinkState) {
        self.state_tx.send_replace(s);
        RELAY_CONNECTED.set(i64::from(s == LinkState::Connected));
    }

    pub async fn run(mut self) {
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            self.set_state(LinkState::Connecting);
            info!(url = %self.url, "connecting execution agent");
            let attempt = tokio::select! {
                res = connect_async(self.url.as_str()) => res,
                _ = stopped(&mut self.shutdown) => break,
            };
            let mut stop = false;
            match attempt {
                Ok((ws, _resp)) => {
                    // nothing accepted before this link may go out on it
                    self.drain_unsent();
                    self.set_state(LinkState::Connected);
                    self.logbook.system("WebSocket connected.");
                    stop = self.session(ws).await;
                }
                Err(e) => self.logbook.error(format!("WS error: {e}")),
            }

            self.set_state(LinkState::Disconnected);
            self.drain_unsent();
            if stop {
                break;
            }

            self.logbook.system("WebSocket disconnected. Reconnecting...");
            RELAY_RECONNECTS.inc();
            tokio::select! {
                _ = sleep(RECONNECT_DELAY) => {}
                _ = stopped(&mut self.shutdown) => break,
            }
        }
        self.set_state(LinkState::Disconnected);
        info!("relay stopped");
    }

    /// Returns true when the session ended because of shutdown.
    async fn session(&mut self, ws: AgentSocket) -> bool {
        let (mut sink, mut stream) = ws.split();
        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(txt))) => self.on_text(&txt).await,
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("agent closed the socket");
                        return false;
                    }
                    Some(Ok(Message::Binary(bin))) => {
                        FRAMES_REJECTED.inc();
                        self.logbook.error(format!("WS ignored binary frame ({} bytes)", bin.len()));
                    }
                    Some(Ok(_)) => {} // ping/pong
                    Some(Err(e)) => {
                        self.logbook.error(format!("WS error: {e}"));
                        return false;
                    }
                },
                Some(payload) = self.out_rx.recv() => {
                    if let Err(e) = sink.send(Message::Text(payload)).await {
                        COMMANDS_LOST.with_label_values(&["link_dropped"]).inc();
                        self.logbook.error(format!("WS send failed, command lost: {e}"));
                        return false;
                    }
                    COMMANDS_SENT.inc();
                }
                _ = stopped(&mut self.shutdown) => {
                    let _ = sink.send(Message::Close(None)).await;
                    return true;
                }
            }
        }
    }

    async fn on_text(&self, txt: &str) {
        RELAY_LAST_EVENT_TS.set(Utc::now().timestamp());
        match decode_frame(txt) {
            Ok(ev) => {
                OUTCOMES.with_label_values(&[ev.result.as_str()]).inc();
                self.logbook.push(LogEntry::Result(ev.clone()));
                if self.outcome_tx.send(ev).await.is_err() {
                    warn!("outcome dispatcher gone, result dropped");
                }
            }
            Err(e) => {
                FRAMES_REJECTED.inc();
                self.logbook.error(format!("WS frame rejected: {e}"));
            }
        }
    }

    // accepted while connected but never written: lost, not carried to the next link
    fn drain_unsent(&mut self) {
        while let Ok(payload) = self.out_rx.try_recv() {
            COMMANDS_LOST.with_label_values(&["link_dropped"]).inc();
            self.logbook.error(format!("link dropped before send, command lost: {payload}"));
        }
    }
}
