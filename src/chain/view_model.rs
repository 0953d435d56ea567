use std::collections::BTreeMap;

use serde::Serialize;

use super::config;
use super::contract_key::StrikeKey;
use super::models::{ContractRecord, OptionType, UnderlyingQuote};
use super::reconciler::{ChainSnapshot, SnapshotEntry};

/// Display-ready cells for one contract; absent values hold the placeholder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractCells {
    pub bid: String,
    pub ask: String,
    pub mid: String,
    pub delta: String,
    pub gamma: String,
    pub theta: String,
    pub vega: String,
    pub iv: String,
    pub pmp: String,
    pub pop: String,
    pub max_profit: String,
    pub max_loss: String,
    pub ev: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractRow {
    pub record: ContractRecord,
    pub cells: ContractCells,
}

/// One line of the grid: call and put sharing a strike
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrikeGroup {
    pub strike: f64,
    pub strike_label: String,
    pub call: Option<ContractRow>,
    pub put: Option<ContractRow>,
    pub is_atm: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnderlyingView {
    pub quote: UnderlyingQuote,
    pub bid: String,
    pub bid_size: String,
    pub ask: String,
    pub ask_size: String,
}

/// Read-only projection of a snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChainView {
    pub underlying: Option<UnderlyingView>,
    pub rows: Vec<StrikeGroup>,
    pub atm_strike: Option<f64>,
    pub contract_count: usize,
}

impl ChainView {
    /// Nothing received yet for this scope
    pub fn is_empty(&self) -> bool {
        self.underlying.is_none() && self.rows.is_empty()
    }
}

// -----------------------------------------------
// PROJECTION
// -----------------------------------------------

/// Group the snapshot by strike, pair calls with puts and sort ascending.
///
/// Pure: the same snapshot always yields the same view. When two records
/// share a strike and type, the later accepted one wins.
pub fn build_view(snapshot: &ChainSnapshot) -> ChainView {
    let mut by_strike: BTreeMap<StrikeKey, (Option<&SnapshotEntry>, Option<&SnapshotEntry>)> =
        BTreeMap::new();

    for entry in snapshot.entries() {
        // classifier only admits finite strikes
        let Some(key) = StrikeKey::new(entry.record.strike) else {
            continue;
        };
        let slot = by_strike.entry(key).or_default();
        let side = match entry.record.option_type {
            OptionType::Call => &mut slot.0,
            OptionType::Put => &mut slot.1,
        };
        if side.is_none_or(|current| current.seq < entry.seq) {
            *side = Some(entry);
        }
    }

    let strikes: Vec<f64> = by_strike.keys().map(StrikeKey::value).collect();
    let atm_strike = snapshot
        .underlying()
        .and_then(UnderlyingQuote::mid)
        .and_then(|mid| find_atm_strike(&strikes, mid));

    let rows = by_strike
        .into_iter()
        .map(|(key, (call, put))| StrikeGroup {
            strike: key.value(),
            strike_label: fmt_fixed(Some(key.value()), config::STRIKE_DECIMALS),
            call: call.map(|e| contract_row(&e.record)),
            put: put.map(|e| contract_row(&e.record)),
            is_atm: atm_strike == Some(key.value()),
        })
        .collect();

    ChainView {
        underlying: snapshot.underlying().map(underlying_view),
        rows,
        atm_strike,
        contract_count: snapshot.contract_count(),
    }
}

/// Strike closest to the underlying; ties go to the lower strike.
pub fn find_atm_strike(strikes: &[f64], underlying_value: f64) -> Option<f64> {
    let mut closest: Option<(f64, f64)> = None;

    for &strike in strikes {
        let distance = (strike - underlying_value).abs();
        closest = match closest {
            Some((best, best_distance))
                if best_distance < distance || (best_distance == distance && best <= strike) =>
            {
                Some((best, best_distance))
            }
            _ => Some((strike, distance)),
        };
    }

    closest.map(|(strike, _)| strike)
}

fn contract_row(record: &ContractRecord) -> ContractRow {
    let g = &record.greeks;
    let a = &record.analytics;
    ContractRow {
        cells: ContractCells {
            bid: fmt_price(record.quote.bid_price),
            ask: fmt_price(record.quote.ask_price),
            mid: fmt_price(a.mid_price),
            delta: fmt_greek(g.delta),
            gamma: fmt_greek(g.gamma),
            theta: fmt_greek(g.theta),
            vega: fmt_greek(g.vega),
            iv: fmt_iv(g.implied_volatility),
            pmp: fmt_probability(a.probability_max_profit),
            pop: fmt_probability(a.probability_of_profit),
            max_profit: fmt_price(a.max_profit),
            max_loss: fmt_price(a.max_loss),
            ev: fmt_price(a.expected_value),
        },
        record: record.clone(),
    }
}

fn underlying_view(quote: &UnderlyingQuote) -> UnderlyingView {
    UnderlyingView {
        bid: fmt_price(quote.bid_price),
        bid_size: fmt_size(quote.bid_size),
        ask: fmt_price(quote.ask_price),
        ask_size: fmt_size(quote.ask_size),
        quote: quote.clone(),
    }
}

// -----------------------------------------------
// NULL-SAFE FORMATTING
// -----------------------------------------------

pub fn fmt_fixed(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if v.is_nan() => config::NO_VALUE.to_string(),
        Some(v) if v == f64::INFINITY => "∞".to_string(),
        Some(v) if v == f64::NEG_INFINITY => "-∞".to_string(),
        Some(v) => format!("{:.*}", decimals, v),
        None => config::NO_VALUE.to_string(),
    }
}

pub fn fmt_price(value: Option<f64>) -> String {
    fmt_fixed(value, config::PRICE_DECIMALS)
}

pub fn fmt_greek(value: Option<f64>) -> String {
    fmt_fixed(value, config::GREEK_DECIMALS)
}

pub fn fmt_size(value: Option<f64>) -> String {
    fmt_fixed(value, config::SIZE_DECIMALS)
}

/// Probabilities arrive already scaled to percent
pub fn fmt_probability(value: Option<f64>) -> String {
    fmt_percent(value, config::PROBABILITY_DECIMALS)
}

/// Implied volatility is a fraction on the wire; shown as percent
pub fn fmt_iv(value: Option<f64>) -> String {
    fmt_percent(value.map(|v| v * 100.0), config::IV_DECIMALS)
}

fn fmt_percent(value: Option<f64>, decimals: usize) -> String {
    let text = fmt_fixed(value, decimals);
    if text == config::NO_VALUE {
        text
    } else {
        format!("{}%", text)
    }
}
