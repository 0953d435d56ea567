use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Call or put
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::Call => "CALL",
            OptionType::Put => "PUT",
        }
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-of-book quote for the underlying
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnderlyingQuote {
    pub bid_price: Option<f64>,
    pub bid_size: Option<f64>,
    pub ask_price: Option<f64>,
    pub ask_size: Option<f64>,
}

impl UnderlyingQuote {
    /// Midpoint, only when both sides are known
    pub fn mid(&self) -> Option<f64> {
        match (self.bid_price, self.ask_price) {
            (Some(bid), Some(ask)) if bid.is_finite() && ask.is_finite() => Some((bid + ask) / 2.0),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractQuote {
    pub bid_price: Option<f64>,
    pub ask_price: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: Option<f64>,
    pub gamma: Option<f64>,
    pub theta: Option<f64>,
    pub vega: Option<f64>,
    /// Fraction, e.g. 0.25 for 25%
    pub implied_volatility: Option<f64>,
}

/// Pre-computed figures carried by the feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    pub mid_price: Option<f64>,
    pub probability_max_profit: Option<f64>,
    pub probability_of_profit: Option<f64>,
    pub max_profit: Option<f64>,
    pub max_loss: Option<f64>,
    pub expected_value: Option<f64>,
}

/// Latest known state of one option contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub symbol: String,
    pub strike: f64,
    pub option_type: OptionType,
    pub expiry: NaiveDate,
    pub quote: ContractQuote,
    pub greeks: Greeks,
    pub analytics: Analytics,
}

/// Identity of one active subscription
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionScope {
    pub symbol: String,
    pub expiry: String,
    pub contract_symbols: BTreeSet<String>,
}

impl SubscriptionScope {
    pub fn new<I, S>(symbol: impl Into<String>, expiry: impl Into<String>, contracts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbol: symbol.into(),
            expiry: expiry.into(),
            contract_symbols: contracts
                .into_iter()
                .map(|s| {
                    let s: String = s.into();
                    s.trim().to_string()
                })
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}
