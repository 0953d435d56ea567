use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use serde::Serialize;

use super::config;
use super::models::{ContractRecord, OptionType};

/// Truncate a date or date-time string to its date part.
///
/// `"2024-06-21"`, `"2024-06-21T00:00:00Z"` and `"2024-06-21 16:00:00"` all
/// normalize to the same date. The time part is dropped, not converted.
pub fn normalize_expiry(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().split(['T', ' ']).next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Accepts `C`/`P` and `call`/`put` in any case.
pub fn parse_option_type(raw: &str) -> Option<OptionType> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "c" | "call" => Some(OptionType::Call),
        "p" | "put" => Some(OptionType::Put),
        _ => None,
    }
}

/// Totally ordered strike used for grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StrikeKey(OrderedFloat<f64>);

impl StrikeKey {
    /// `None` for strikes that are not finite at key resolution.
    pub fn new(strike: f64) -> Option<Self> {
        let scaled = strike * config::STRIKE_KEY_SCALE;
        if !scaled.is_finite() {
            return None;
        }
        let rounded = scaled.round() / config::STRIKE_KEY_SCALE;
        // fold -0.0 into 0.0
        Some(Self(OrderedFloat(rounded + 0.0)))
    }

    pub fn value(&self) -> f64 {
        self.0.into_inner()
    }
}

/// Strike/type/expiry identity of a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContractKey {
    pub strike: StrikeKey,
    pub option_type: OptionType,
    pub expiry: NaiveDate,
}

impl ContractKey {
    pub fn of(record: &ContractRecord) -> Option<Self> {
        Some(Self {
            strike: StrikeKey::new(record.strike)?,
            option_type: record.option_type,
            expiry: record.expiry,
        })
    }
}
