// ===============================
// src/telemetry.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Ingestion --------
pub static SIGNALS_BY: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "signals_total_by",
            "parsed signals by channel & direction (labels: channel, direction)",
        ),
        &["channel", "direction"],
    )
    .expect("signals_total_by opts")
});

pub static SIGNALS_DISCARDED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("signals_discarded_total", "messages without direction or instrument")
        .expect("signals_discarded_total opts")
});

// -------- Relay (execution agent link) --------
pub static COMMANDS_SENT: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("relay_commands_sent_total", "commands written to the agent socket")
        .expect("relay_commands_sent_total opts")
});

pub static COMMANDS_LOST: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("relay_commands_lost_total", "commands dropped (label: reason)"),
        &["reason"],
    )
    .expect("relay_commands_lost_total opts")
});

pub static OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("relay_outcomes_total", "trade_result frames received (label: result)"),
        &["result"],
    )
    .expect("relay_outcomes_total opts")
});

pub static FRAMES_REJECTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("relay_frames_rejected_total", "inbound frames dropped (malformed / other type / binary)")
        .expect("relay_frames_rejected_total opts")
});

pub static RELAY_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("relay_connected", "1 if the agent socket is connected, 0 otherwise")
        .expect("relay_connected opts")
});

pub static RELAY_RECONNECTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("relay_reconnects_total", "reconnect attempts to the agent socket")
        .expect("relay_reconnects_total opts")
});

pub static RELAY_LAST_EVENT_TS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("relay_last_event_ts", "Unix seconds of the last inbound agent frame")
        .expect("relay_last_event_ts opts")
});

pub fn init() {
    for m in [
        REGISTRY.register(Box::new(SIGNALS_BY.clone())),
        REGISTRY.register(Box::new(SIGNALS_DISCARDED.clone())),
        REGISTRY.register(Box::new(COMMANDS_SENT.clone())),
        REGISTRY.register(Box::new(COMMANDS_LOST.clone())),
        REGISTRY.register(Box::new(OUTCOMES.clone())),
        REGISTRY.register(Box::new(FRAMES_REJECTED.clone())),
        REGISTRY.register(Box::new(RELAY_CONNECTED.clone())),
        REGISTRY.register(Box::new(RELAY_RECONNECTS.clone())),
        REGISTRY.register(Box::new(RELAY_LAST_EVENT_TS.clone())),
    ] {
        // double registration (tests) is harmless
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
pub fn encode() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_families_are_exported() {
        init();
        SIGNALS_DISCARDED.inc();
        RELAY_CONNECTED.set(0);
        let text = String::from_utf8(encode()).unwrap();
        assert!(text.contains("signals_discarded_total"));
        assert!(text.contains("relay_connected"));
    }
}
