// ===============================
// src/config.rs
// ===============================
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
use std::path::PathBuf;

use clap::Parser;
use dotenvy::dotenv;
use thiserror::Error;
use url::Url;

const DEFAULT_CHANNELS: [&str; 5] = ["channel1", "channel2", "channel3", "channel4", "channel5"];

#[derive(Parser, Clone, Debug)]
#[command(name = "signal_relay", about = "Chat signal relay + trade result metrics")]
pub struct Args {
    /// Execution agent WebSocket (ws:// atau wss://)
    #[arg(long, env = "WS_URL", default_value = "ws://localhost:8888")]
    pub ws_url: String,

    /// HTTP port untuk query API
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Channel yang didengarkan, comma separated: CHANNELS=channel1,channel2
    #[arg(long, env = "CHANNELS")]
    pub channels: Option<String>,

    /// JSONL signal input ({"channel","text"} per baris); default stdin
    #[arg(long, env = "SIGNAL_INPUT")]
    pub signal_input: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid WS_URL {url:?}: {source}")]
    BadRelayUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("WS_URL must be ws:// or wss://, got {0}://")]
    BadScheme(String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub relay_url: Url,
    pub port: u16,
    pub channels: Vec<String>,
    pub signal_input: Option<PathBuf>,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let relay_url = Url::parse(&args.ws_url).map_err(|source| ConfigError::BadRelayUrl {
            url: args.ws_url.clone(),
            source,
        })?;
        if !matches!(relay_url.scheme(), "ws" | "wss") {
            return Err(ConfigError::BadScheme(relay_url.scheme().to_string()));
        }

        // CHANNELS kosong / tidak diset -> daftar default
        let channels: Vec<String> = args
            .channels
            .map(|s| {
                s.split(',')
                    .map(|x| x.trim())
                    .filter(|x| !x.is_empty())
                    .map(|x| x.to_string())
                    .collect()
            })
            .filter(|v: &Vec<String>| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect());

        Ok(Self {
            relay_url,
            port: args.port,
            channels,
            signal_input: args.signal_input,
        })
    }
}

pub fn load() -> Result<Config, ConfigError> {
    // Pastikan .env dibaca (agar WS_URL, PORT, CHANNELS ter-load)
    let _ = dotenv();
    Config::from_args(Args::parse())
}
