// ===============================
// src/extractor.rs
// ===============================
//
// Signal extractor: teks bebas dari channel -> TradeCommand.
//
// Setiap field dievaluasi independen:
// - direction  : lexicon table, entry terakhir yang match menang (sell > buy)
// - instrument : "EUR/USD" dulu, kalau tidak ada "EURUSD-OTC"
// - entry time : "HH:MM" pertama
// - martingale : angka setelah "martingale" / "Protection" (baris yang sama)
// - otc        : ada "otc" di mana saja (case-insensitive)
//
// Direction + instrument wajib ada, kalau tidak -> None (pesan dibuang).
//
use crate::domain::{Direction, TradeCommand};

/// Ordered lexicon table. Later rows override earlier ones, so a message that
/// carries tokens from both rows resolves to `Sell`.
const DIRECTION_LEXICON: &[(&[&str], Direction)] = &[
    (&["buy", "call", "🟩", "🔼", "up"], Direction::Buy),
    (&["sell", "put", "🟥", "🔽", "down", "🔴"], Direction::Sell),
];

pub fn extract(raw: &str, source_id: &str) -> Option<TradeCommand> {
    // ASCII lowering keeps byte offsets aligned with `raw`
    let lower = raw.to_ascii_lowercase();

    let direction = direction(&lower)?;
    let instrument = slash_pair(raw).or_else(|| otc_symbol(raw))?;

    Some(TradeCommand {
        direction,
        source_id: source_id.to_string(),
        instrument: instrument.to_string(),
        entry_time: clock_time(raw).map(str::to_string),
        martingale_level: level_after(&lower, "martingale")
            .or_else(|| level_after(&lower, "protection"))
            .unwrap_or(0),
        is_otc: lower.contains("otc"),
    })
}

fn direction(lower: &str) -> Option<Direction> {
    DIRECTION_LEXICON
        .iter()
        .filter(|(tokens, _)| tokens.iter().any(|t| lower.contains(t)))
        .map(|(_, dir)| *dir)
        .last()
}

fn is_upper(b: &[u8]) -> bool {
    b.iter().all(u8::is_ascii_uppercase)
}

/// First `AAA/BBB`.
fn slash_pair(raw: &str) -> Option<&str> {
    raw.as_bytes()
        .windows(7)
        .position(|w| is_upper(&w[..3]) && w[3] == b'/' && is_upper(&w[4..]))
        .map(|i| &raw[i..i + 7])
}

/// First `AAAAAA-OTC`.
fn otc_symbol(raw: &str) -> Option<&str> {
    raw.as_bytes()
        .windows(10)
        .position(|w| is_upper(&w[..6]) && &w[6..] == b"-OTC")
        .map(|i| &raw[i..i + 10])
}

/// First `DD:DD`.
fn clock_time(raw: &str) -> Option<&str> {
    raw.as_bytes()
        .windows(5)
        .position(|w| {
            w[0].is_ascii_digit()
                && w[1].is_ascii_digit()
                && w[2] == b':'
                && w[3].is_ascii_digit()
                && w[4].is_ascii_digit()
        })
        .map(|i| &raw[i..i + 5])
}

/// First digit run following `keyword` on the same line.
fn level_after(lower: &str, keyword: &str) -> Option<u32> {
    lower.match_indices(keyword).find_map(|(at, _)| {
        let rest = &lower[at + keyword.len()..];
        let line = rest.split(['\n', '\r']).next().unwrap_or("");
        let start = line.find(|c: char| c.is_ascii_digit())?;
        let digits = &line[start..];
        let end = digits
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits.len());
        digits[..end].parse().ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUY_TOKENS: &[&str] = &["buy", "CALL", "🟩", "🔼", "Up"];
    const SELL_TOKENS: &[&str] = &["SELL", "put", "🟥", "🔽", "Down", "🔴"];

    #[test]
    fn full_buy_signal() {
        let cmd = extract("🔼 BUY EUR/USD at 14:05\nMartingale level 2", "channel1").unwrap();
        assert_eq!(cmd.direction, Direction::Buy);
        assert_eq!(cmd.source_id, "channel1");
        assert_eq!(cmd.instrument, "EUR/USD");
        assert_eq!(cmd.entry_time.as_deref(), Some("14:05"));
        assert_eq!(cmd.martingale_level, 2);
        assert!(!cmd.is_otc);
    }

    #[test]
    fn buy_token_alone_yields_buy() {
        for tok in BUY_TOKENS {
            for pair in ["GBP/JPY", "AUDCAD-OTC"] {
                let text = format!("{tok} {pair}");
                let cmd = extract(&text, "c").unwrap_or_else(|| panic!("no signal in {text:?}"));
                assert_eq!(cmd.direction, Direction::Buy, "{text:?}");
                assert_eq!(cmd.instrument, pair);
            }
        }
    }

    #[test]
    fn sell_wins_when_both_lexicons_match() {
        for b in BUY_TOKENS {
            for s in SELL_TOKENS {
                let text = format!("{b} / {s} on EUR/USD");
                let cmd = extract(&text, "c").unwrap();
                assert_eq!(cmd.direction, Direction::Sell, "{text:?}");
            }
        }
    }

    #[test]
    fn missing_direction_or_instrument_is_discarded() {
        assert!(extract("EUR/USD 10:00", "c").is_none());
        assert!(extract("BUY eur/usd now", "c").is_none());
        assert!(extract("SELL EURUSD OTC", "c").is_none());
        assert!(extract("", "c").is_none());
    }

    #[test]
    fn slash_pair_preferred_over_otc_symbol() {
        let cmd = extract("PUT EURUSD-OTC or EUR/GBP", "c").unwrap();
        assert_eq!(cmd.instrument, "EUR/GBP");
        assert!(cmd.is_otc);
    }

    #[test]
    fn otc_flag_is_independent_of_instrument() {
        let cmd = extract("CALL EUR/USD_otc", "c").unwrap();
        assert_eq!(cmd.instrument, "EUR/USD");
        assert!(cmd.is_otc);
    }

    #[test]
    fn martingale_and_protection_levels() {
        assert_eq!(extract("BUY EUR/USD Protection 3", "c").unwrap().martingale_level, 3);
        assert_eq!(
            extract("BUY EUR/USD martingale x1 then 5", "c").unwrap().martingale_level,
            1
        );
        // digits must be on the same line as the keyword
        assert_eq!(extract("BUY EUR/USD martingale\n7", "c").unwrap().martingale_level, 0);
        assert_eq!(extract("BUY EUR/USD", "c").unwrap().martingale_level, 0);
    }

    #[test]
    fn entry_time_is_optional() {
        let cmd = extract("SELL USD/CHF", "c").unwrap();
        assert_eq!(cmd.entry_time, None);
    }

    #[test]
    fn exact_length_inputs() {
        assert_eq!(slash_pair("EUR/USD"), Some("EUR/USD"));
        assert_eq!(otc_symbol("EURUSD-OTC"), Some("EURUSD-OTC"));
        assert_eq!(slash_pair("EUR/US"), None);
    }
}
