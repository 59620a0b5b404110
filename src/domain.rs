// ===============================
// src/domain.rs
// ===============================
use serde::{Deserialize, Serialize, Serializer};

/// Arah order yang diminta sinyal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    #[serde(rename = "/Buy1")]
    Buy,
    #[serde(rename = "/Sell1")]
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
        }
    }
}

/// Trade instruction extracted from a channel message.
///
/// Serializes directly to the command frame the execution agent expects:
/// `{actionKey, channel, currency, entryTime, martingale_level, otc}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeCommand {
    #[serde(rename = "actionKey")]
    pub direction: Direction,
    #[serde(rename = "channel")]
    pub source_id: String,
    #[serde(rename = "currency")]
    pub instrument: String,
    #[serde(rename = "entryTime", serialize_with = "empty_if_none")]
    pub entry_time: Option<String>,
    pub martingale_level: u32,
    #[serde(rename = "otc")]
    pub is_otc: bool,
}

// agent expects "" rather than null when no entry time was found
fn empty_if_none<S: Serializer>(v: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(v.as_deref().unwrap_or(""))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeResult {
    Win,
    Loss,
    Unknown,
}

impl TradeResult {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "win" => TradeResult::Win,
            "loss" => TradeResult::Loss,
            _ => TradeResult::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeResult::Win => "win",
            TradeResult::Loss => "loss",
            TradeResult::Unknown => "unknown",
        }
    }
}

/// Outcome reported back by the execution agent for one trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeEvent {
    #[serde(rename = "channel")]
    pub source_id: String,
    pub result: TradeResult,
    #[serde(rename = "currency")]
    pub instrument: String,
    pub entry_time: String,
    pub martingale_level: u32,
}

/// Raw inbound frame from the agent. Only `type == "trade_result"` carries an outcome.
#[derive(Debug, Deserialize)]
pub struct AgentEnvelope {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub channel: Option<String>,
    pub result: Option<String>,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub entry_time: String,
    #[serde(default)]
    pub martingale_level: u32,
}

/// trades / wins / losses. `wins + losses <= trades` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterTriple {
    pub trades: u64,
    pub wins: u64,
    pub losses: u64,
}

impl CounterTriple {
    pub fn apply(&mut self, result: TradeResult) {
        self.trades += 1;
        match result {
            TradeResult::Win => self.wins += 1,
            TradeResult::Loss => self.losses += 1,
            TradeResult::Unknown => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_serializes_to_agent_frame() {
        let cmd = TradeCommand {
            direction: Direction::Sell,
            source_id: "channel2".into(),
            instrument: "EURUSD-OTC".into(),
            entry_time: None,
            martingale_level: 2,
            is_otc: true,
        };
        let v = serde_json::to_value(&cmd).unwrap();
        assert_eq!(v["actionKey"], "/Sell1");
        assert_eq!(v["channel"], "channel2");
        assert_eq!(v["currency"], "EURUSD-OTC");
        assert_eq!(v["entryTime"], "");
        assert_eq!(v["martingale_level"], 2);
        assert_eq!(v["otc"], true);
    }

    #[test]
    fn unknown_result_counts_trade_only() {
        let mut c = CounterTriple::default();
        c.apply(TradeResult::Win);
        c.apply(TradeResult::Loss);
        c.apply(TradeResult::from_wire("refund"));
        assert_eq!(c, CounterTriple { trades: 3, wins: 1, losses: 1 });
    }
}
