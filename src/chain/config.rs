use std::time::Duration;

use super::models::SubscriptionScope;

// -----------------------------------------------
// STREAMING + LOOKUP ENDPOINTS
// -----------------------------------------------
pub const DEFAULT_STREAM_URL: &str = "ws://localhost:8000/ws/chain";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Connection address for one subscription scope.
///
/// Every query component is percent-encoded; contract symbols are encoded
/// one by one and then comma-joined.
pub fn chain_stream_url(base: &str, scope: &SubscriptionScope) -> String {
    let option_symbols = scope
        .contract_symbols
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::encode(s).into_owned())
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "{}?symbol={}&expiry={}&option_symbols={}",
        base.trim_end_matches('/'),
        urlencoding::encode(&scope.symbol),
        urlencoding::encode(&scope.expiry),
        option_symbols
    )
}

pub fn expiry_lookup_url(base: &str, symbol: &str) -> String {
    format!(
        "{}/options/expiries?symbol={}",
        base.trim_end_matches('/'),
        urlencoding::encode(symbol)
    )
}

// -----------------------------------------------
// HTTP CLIENT CONFIG
// -----------------------------------------------
pub const USER_AGENT: &str = concat!("option-chain-stream/", env!("CARGO_PKG_VERSION"));
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

// -----------------------------------------------
// RETRY CONFIG (lookup only, the stream never retries)
// -----------------------------------------------
pub const RETRY_BASE_DELAY_MS: u64 = 100;
pub const RETRY_FACTOR: u64 = 2;
pub const RETRY_MAX_DELAY_SECS: u64 = 3;
pub const RETRY_MAX_ATTEMPTS: usize = 3;

// -----------------------------------------------
// STREAM CONFIG
// -----------------------------------------------
pub const STREAM_CHANNEL_SIZE: usize = 1024;

// -----------------------------------------------
// VIEW FORMATTING
// -----------------------------------------------
pub const NO_VALUE: &str = "--";
pub const PRICE_DECIMALS: usize = 2;
pub const GREEK_DECIMALS: usize = 4;
pub const IV_DECIMALS: usize = 2;
pub const PROBABILITY_DECIMALS: usize = 2;
pub const SIZE_DECIMALS: usize = 0;
pub const STRIKE_DECIMALS: usize = 2;

/// Strikes are bucketed at this resolution before grouping.
pub const STRIKE_KEY_SCALE: f64 = 10_000.0;

// -----------------------------------------------
// RUNTIME CONFIGURATION
// -----------------------------------------------

/// Execution mode: `stream`, `expiries` or `server`
pub fn get_execution_mode() -> String {
    std::env::var("CHAIN_MODE").unwrap_or_else(|_| "stream".to_string())
}

pub fn get_symbol() -> String {
    std::env::var("CHAIN_SYMBOL").unwrap_or_else(|_| "AAPL".to_string())
}

/// Expiry to subscribe to. `None` selects the nearest listed expiry.
pub fn get_expiry() -> Option<String> {
    std::env::var("CHAIN_EXPIRY")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_stream_url() -> String {
    std::env::var("CHAIN_STREAM_URL").unwrap_or_else(|_| DEFAULT_STREAM_URL.to_string())
}

pub fn get_api_url() -> String {
    std::env::var("CHAIN_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string())
}

/// Stop after this many accepted updates (stream mode). Unset means run until closed.
pub fn get_max_updates() -> Option<usize> {
    std::env::var("CHAIN_MAX_UPDATES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
}
