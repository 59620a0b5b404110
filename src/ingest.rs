// ===============================
// src/ingest.rs
// ===============================
//
// Ingestion adapter: sumber teks sinyal (JSONL) -> extractor -> relay.
//
// Format input per baris:
//   {"channel":"channel1","text":"🔼 BUY EUR/USD 14:05"}
//
// - Channel di luar daftar langganan diabaikan (daftar kosong = terima semua).
// - Pesan tanpa direction/instrument dibuang diam-diam (hanya debug log).
//
use std::{path::Path, sync::Arc};

use serde::Deserialize;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    sync::watch,
};
use tracing::{debug, info, warn};

use crate::domain::TradeCommand;
use crate::extractor::extract;
use crate::logbook::{LogEntry, Logbook};
use crate::relay::RelayHandle;
use crate::shutdown::stopped;
use crate::telemetry::{SIGNALS_BY, SIGNALS_DISCARDED};

pub type SignalReader = Box<dyn AsyncBufRead + Unpin + Send>;

/// `SIGNAL_INPUT` file kalau bisa dibuka, selain itu stdin.
pub async fn open_input(path: Option<&Path>, logbook: &Logbook) -> SignalReader {
    if let Some(path) = path {
        match tokio::fs::File::open(path).await {
            Ok(file) => return Box::new(BufReader::new(file)),
            Err(e) => logbook.error(format!(
                "cannot open signal input {}: {e}; reading stdin",
                path.display()
            )),
        }
    }
    Box::new(BufReader::new(tokio::io::stdin()))
}

#[derive(Debug, Deserialize)]
pub struct RawSignal {
    pub channel: String,
    pub text: String,
}

pub struct Ingestor {
    channels: Vec<String>,
    relay: RelayHandle,
    logbook: Arc<Logbook>,
}

impl Ingestor {
    pub fn new(channels: Vec<String>, relay: RelayHandle, logbook: Arc<Logbook>) -> Self {
        Self { channels, relay, logbook }
    }

    fn subscribed(&self, channel: &str) -> bool {
        self.channels.is_empty() || self.channels.iter().any(|c| c == channel)
    }

    /// Parse one message and forward it. Returns the command when one was extracted.
    pub fn handle(&self, text: &str, channel: &str) -> Option<TradeCommand> {
        if !self.subscribed(channel) {
            debug!(%channel, "not subscribed, skip");
            return None;
        }
        let Some(cmd) = extract(text, channel) else {
            SIGNALS_DISCARDED.inc();
            debug!(%channel, "no signal in message");
            return None;
        };
        SIGNALS_BY
            .with_label_values(&[channel, cmd.direction.as_str()])
            .inc();

        // send failures are already logged by the relay handle
        let _ = self.relay.send(&cmd);
        self.logbook.push(LogEntry::Signal(cmd.clone()));
        Some(cmd)
    }

    pub async fn run<R>(self, reader: R, mut shutdown: watch::Receiver<bool>)
    where
        R: AsyncBufRead + Unpin,
    {
        info!(channels = ?self.channels, "ingest: started");
        let mut lines = reader.lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<RawSignal>(line) {
                            Ok(raw) => {
                                self.handle(&raw.text, &raw.channel);
                            }
                            Err(e) => warn!(?e, "ingest: bad input line, skip"),
                        }
                    }
                    Ok(None) => {
                        info!("ingest: input closed");
                        break;
                    }
                    Err(e) => {
                        warn!(?e, "ingest: read failed");
                        break;
                    }
                },
                _ = stopped(&mut shutdown) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;
    use crate::relay;
    use tokio::sync::mpsc;
    use url::Url;

    fn ingestor(channels: &[&str]) -> (Ingestor, Arc<Logbook>, relay::Relay) {
        let logbook = Arc::new(Logbook::new());
        let (outcome_tx, _) = mpsc::channel(1);
        let (_, stop_rx) = watch::channel(false);
        let url = Url::parse("ws://127.0.0.1:9").unwrap();
        let (relay, handle) = relay::channel(url, outcome_tx, logbook.clone(), stop_rx);
        let channels = channels.iter().map(|c| c.to_string()).collect();
        (Ingestor::new(channels, handle, logbook.clone()), logbook, relay)
    }

    #[test]
    fn parsed_signal_is_logged_even_when_relay_is_down() {
        let (ing, logbook, _relay) = ingestor(&["channel1"]);
        let cmd = ing.handle("PUT GBP/USD 09:30", "channel1").unwrap();
        assert_eq!(cmd.direction, Direction::Sell);

        let v = serde_json::to_value(logbook.recent(2)).unwrap();
        assert_eq!(v[0]["type"], "signal");
        assert_eq!(v[0]["actionKey"], "/Sell1");
        assert_eq!(v[0]["currency"], "GBP/USD");
        assert_eq!(v[1]["type"], "error");
    }

    #[test]
    fn irrelevant_chatter_and_foreign_channels_are_dropped() {
        let (ing, logbook, _relay) = ingestor(&["channel1"]);
        assert!(ing.handle("good morning everyone", "channel1").is_none());
        assert!(ing.handle("BUY EUR/USD", "channel9").is_none());
        assert!(logbook.recent(10).is_empty());
    }

    #[test]
    fn empty_subscription_accepts_any_channel() {
        let (ing, _, _relay) = ingestor(&[]);
        assert!(ing.handle("BUY EUR/USD", "anything").is_some());
    }

    #[tokio::test]
    async fn run_reads_jsonl_until_eof() {
        let (ing, logbook, _relay) = ingestor(&["c1"]);
        let input: &[u8] = b"{\"channel\":\"c1\",\"text\":\"CALL AUD/JPY\"}\n\
            not json\n\
            \n\
            {\"channel\":\"c1\",\"text\":\"hello\"}\n\
            {\"channel\":\"c1\",\"text\":\"SELL EURUSD-OTC martingale 2\"}\n";
        let (_stop_tx, stop_rx) = watch::channel(false);
        ing.run(input, stop_rx).await;

        let signals: Vec<_> = logbook
            .recent(10)
            .into_iter()
            .filter_map(|r| match r.entry {
                LogEntry::Signal(cmd) => Some(cmd),
                _ => None,
            })
            .collect();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].instrument, "EURUSD-OTC");
        assert_eq!(signals[0].martingale_level, 2);
        assert_eq!(signals[1].instrument, "AUD/JPY");
    }

    #[tokio::test]
    async fn missing_input_file_is_logged_not_fatal() {
        let logbook = Logbook::new();
        let path = std::env::temp_dir().join("signal_relay_no_such_input.jsonl");
        let _ = std::fs::remove_file(&path);
        let _reader = open_input(Some(&path), &logbook).await;

        let v = serde_json::to_value(logbook.recent(1)).unwrap();
        assert_eq!(v[0]["type"], "error");
        assert!(v[0]["msg"].as_str().unwrap().contains("signal_relay_no_such_input"));
    }

    #[tokio::test]
    async fn input_file_feeds_the_ingestor() {
        let path = std::env::temp_dir().join(format!("signal_relay_input_{}.jsonl", std::process::id()));
        std::fs::write(&path, "{\"channel\":\"c1\",\"text\":\"BUY NZD/USD\"}\n").unwrap();

        let (ing, logbook, _relay) = ingestor(&["c1"]);
        let reader = open_input(Some(&path), &logbook).await;
        let (_stop_tx, stop_rx) = watch::channel(false);
        ing.run(reader, stop_rx).await;
        let _ = std::fs::remove_file(&path);

        let v = serde_json::to_value(logbook.recent(1)).unwrap();
        assert_eq!(v[0]["type"], "signal");
        assert_eq!(v[0]["currency"], "NZD/USD");
    }
}
