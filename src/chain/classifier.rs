use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use super::contract_key::{normalize_expiry, parse_option_type, StrikeKey};
use super::models::{Analytics, ContractQuote, ContractRecord, Greeks, UnderlyingQuote};
use crate::error::DecodeError;

// -----------------------------------------------
// WIRE ENVELOPE
// -----------------------------------------------

/// Inbound envelope, discriminated by `tt_type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "tt_type")]
pub enum Envelope {
    #[serde(rename = "underlying_quote")]
    UnderlyingQuote(UnderlyingQuoteWire),

    #[serde(rename = "grouped_option_data")]
    GroupedOptionData(ContractWire),

    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct UnderlyingQuoteWire {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bid_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bid_size: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ask_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ask_size: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ContractWire {
    pub symbol: String,

    #[serde(deserialize_with = "required_f64")]
    pub strike: f64,

    // Either name may appear, or both; the first of each pair is preferred.
    #[serde(default)]
    pub call_put: Option<String>,
    #[serde(default, rename = "type")]
    pub option_type: Option<String>,

    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,

    #[serde(default)]
    pub quote: Option<QuoteWire>,

    #[serde(default)]
    pub greeks: Option<GreeksWire>,

    #[serde(default)]
    pub calculations: Option<CalculationsWire>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteWire {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bid_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ask_price: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GreeksWire {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub delta: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub gamma: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub theta: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub vega: Option<f64>,
    #[serde(rename = "IV", alias = "iv", default, deserialize_with = "lenient_f64")]
    pub iv: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CalculationsWire {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub mid_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub pmp: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub pop: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_profit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_loss: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ev: Option<f64>,
}

/// Number, numeric string, or anything else as absent.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

fn required_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_as_f64(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {}", value)))
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

// -----------------------------------------------
// CLASSIFICATION
// -----------------------------------------------

/// Why a message did not touch the snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    UnknownType,
    ExpiryMismatch { expected: NaiveDate, received: NaiveDate },
    Malformed(DecodeError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    UnderlyingQuote(UnderlyingQuote),
    ContractUpdate(ContractRecord),
    Ignored(IgnoreReason),
}

impl Classified {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Classified::Ignored(_))
    }
}

/// Decode one raw frame and decide which path it takes.
///
/// Never fails: undecodable frames and contract updates for another expiry
/// come back as `Classified::Ignored`.
pub fn classify(raw: &str, scope_expiry: NaiveDate) -> Classified {
    let envelope = match serde_json::from_str::<Envelope>(raw) {
        Ok(envelope) => envelope,
        Err(_) if is_untagged(raw) => return Classified::Ignored(IgnoreReason::UnknownType),
        Err(e) => {
            warn!(error = %e, "dropping undecodable stream message");
            debug!(raw, "undecodable payload");
            return Classified::Ignored(IgnoreReason::Malformed(e.into()));
        }
    };

    match envelope {
        Envelope::Unknown => Classified::Ignored(IgnoreReason::UnknownType),
        Envelope::UnderlyingQuote(wire) => Classified::UnderlyingQuote(UnderlyingQuote {
            bid_price: wire.bid_price,
            bid_size: wire.bid_size,
            ask_price: wire.ask_price,
            ask_size: wire.ask_size,
        }),
        Envelope::GroupedOptionData(wire) => match contract_record(wire) {
            Ok(record) if record.expiry == scope_expiry => Classified::ContractUpdate(record),
            Ok(record) => {
                debug!(
                    symbol = %record.symbol,
                    expected = %scope_expiry,
                    received = %record.expiry,
                    "skipping contract update for another expiry"
                );
                Classified::Ignored(IgnoreReason::ExpiryMismatch {
                    expected: scope_expiry,
                    received: record.expiry,
                })
            }
            Err(e) => {
                warn!(error = %e, "dropping malformed contract update");
                Classified::Ignored(IgnoreReason::Malformed(e))
            }
        },
    }
}

/// JSON object without a `tt_type` field, e.g. a heartbeat
fn is_untagged(raw: &str) -> bool {
    serde_json::from_str::<Value>(raw)
        .map(|v| v.is_object() && v.get("tt_type").is_none())
        .unwrap_or(false)
}

fn contract_record(wire: ContractWire) -> Result<ContractRecord, DecodeError> {
    if StrikeKey::new(wire.strike).is_none() {
        return Err(DecodeError::InvalidStrike);
    }
    let raw_type = wire
        .call_put
        .or(wire.option_type)
        .ok_or(DecodeError::MissingField("call_put"))?;
    let option_type =
        parse_option_type(&raw_type).ok_or_else(|| DecodeError::InvalidOptionType(raw_type.clone()))?;
    let raw_expiry = wire
        .expiry
        .or(wire.expiry_date)
        .ok_or(DecodeError::MissingField("expiry"))?;
    let expiry =
        normalize_expiry(&raw_expiry).ok_or_else(|| DecodeError::InvalidExpiry(raw_expiry.clone()))?;

    let quote = wire.quote.unwrap_or_default();
    let greeks = wire.greeks.unwrap_or_default();
    let calc = wire.calculations.unwrap_or_default();

    Ok(ContractRecord {
        symbol: wire.symbol,
        strike: wire.strike,
        option_type,
        expiry,
        quote: ContractQuote {
            bid_price: quote.bid_price,
            ask_price: quote.ask_price,
        },
        greeks: Greeks {
            delta: greeks.delta,
            gamma: greeks.gamma,
            theta: greeks.theta,
            vega: greeks.vega,
            implied_volatility: greeks.iv,
        },
        analytics: Analytics {
            mid_price: calc.mid_price,
            probability_max_profit: calc.pmp,
            probability_of_profit: calc.pop,
            max_profit: calc.max_profit,
            max_loss: calc.max_loss,
            expected_value: calc.ev,
        },
    })
}
