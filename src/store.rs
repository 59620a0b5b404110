// ===============================
// src/store.rs (metrics aggregate: totals / per-channel / day / week / month)
// ===============================
//
// Satu-satunya pemilik state mutable. Semua operasi (record, snapshot, reset)
// lewat satu Mutex, jadi snapshot tidak pernah melihat record setengah jalan.
// Tidak ada I/O selama lock dipegang.
//
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use ahash::AHashMap as HashMap;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tokio::sync::mpsc;
use tracing::debug;

use crate::clock::BucketKeys;
use crate::domain::{CounterTriple, OutcomeEvent, TradeResult};

pub const HISTORY_CAP: usize = 500;
pub const SNAPSHOT_HISTORY: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HistoryEntry {
    pub timestamp: i64,
    #[serde(rename = "channel")]
    pub source_id: String,
    pub result: TradeResult,
    #[serde(rename = "currency")]
    pub instrument: String,
    pub entry_time: String,
    pub martingale_level: u32,
}

/// Per-source counters in first-seen order; serialized as a JSON object.
#[derive(Debug, Clone, Default)]
pub struct SourceTable(pub Vec<(String, CounterTriple)>);

impl SourceTable {
    #[cfg(test)]
    pub fn get(&self, source: &str) -> Option<&CounterTriple> {
        self.0.iter().find(|(k, _)| k == source).map(|(_, c)| c)
    }
}

impl Serialize for SourceTable {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub totals: CounterTriple,
    pub daily: BTreeMap<String, CounterTriple>,
    pub weekly: BTreeMap<String, CounterTriple>,
    pub monthly: BTreeMap<String, CounterTriple>,
    #[serde(rename = "channels")]
    pub by_source: SourceTable,
    #[serde(rename = "topChannel")]
    pub top_source: String,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Default)]
struct MetricsState {
    totals: CounterTriple,
    sources: Vec<(String, CounterTriple)>,
    source_idx: HashMap<String, usize>,
    daily: BTreeMap<String, CounterTriple>,
    weekly: BTreeMap<String, CounterTriple>,
    monthly: BTreeMap<String, CounterTriple>,
    history: VecDeque<HistoryEntry>,
}

impl MetricsState {
    fn source_mut(&mut self, source: &str) -> &mut CounterTriple {
        let idx = match self.source_idx.get(source) {
            Some(&i) => i,
            None => {
                self.sources.push((source.to_string(), CounterTriple::default()));
                self.source_idx.insert(source.to_string(), self.sources.len() - 1);
                self.sources.len() - 1
            }
        };
        &mut self.sources[idx].1
    }

    // most wins; ties go to the source seen first
    fn top_source(&self) -> String {
        let mut top: Option<&(String, CounterTriple)> = None;
        for entry in &self.sources {
            if top.map_or(true, |t| entry.1.wins > t.1.wins) {
                top = Some(entry);
            }
        }
        top.map(|(k, _)| k.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct MetricsStore {
    state: Mutex<MetricsState>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, ev: &OutcomeEvent) {
        self.record_at(Local::now(), ev);
    }

    /// Buckets come from `now`, never from `ev.entry_time`.
    pub fn record_at(&self, now: DateTime<Local>, ev: &OutcomeEvent) {
        let keys = BucketKeys::for_date(now.date_naive());
        let entry = HistoryEntry {
            timestamp: now.timestamp_millis(),
            source_id: ev.source_id.clone(),
            result: ev.result,
            instrument: ev.instrument.clone(),
            entry_time: ev.entry_time.clone(),
            martingale_level: ev.martingale_level,
        };

        let mut st = self.state.lock();
        st.totals.apply(ev.result);
        st.source_mut(&ev.source_id).apply(ev.result);
        st.daily.entry(keys.day).or_default().apply(ev.result);
        st.weekly.entry(keys.week).or_default().apply(ev.result);
        st.monthly.entry(keys.month).or_default().apply(ev.result);
        st.history.push_front(entry);
        st.history.truncate(HISTORY_CAP);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let st = self.state.lock();
        MetricsSnapshot {
            totals: st.totals,
            daily: st.daily.clone(),
            weekly: st.weekly.clone(),
            monthly: st.monthly.clone(),
            by_source: SourceTable(st.sources.clone()),
            top_source: st.top_source(),
            history: st.history.iter().take(SNAPSHOT_HISTORY).cloned().collect(),
        }
    }

    pub fn totals(&self) -> CounterTriple {
        self.state.lock().totals
    }

    #[cfg(test)]
    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.state.lock().history.iter().take(limit).cloned().collect()
    }

    /// Zero everything; known sources stay listed with zeroed counters.
    pub fn reset(&self) {
        let mut st = self.state.lock();
        st.totals = CounterTriple::default();
        st.daily.clear();
        st.weekly.clear();
        st.monthly.clear();
        st.history.clear();
        for (_, c) in st.sources.iter_mut() {
            *c = CounterTriple::default();
        }
    }
}

/// Outcome dispatcher: relay -> store.
pub async fn run(mut outcome_rx: mpsc::Receiver<OutcomeEvent>, store: Arc<MetricsStore>) {
    while let Some(ev) = outcome_rx.recv().await {
        debug!(channel = %ev.source_id, result = ev.result.as_str(), "record outcome");
        store.record(&ev);
    }
}
