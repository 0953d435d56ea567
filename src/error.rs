use thiserror::Error;

/// Connection-level failure. Reported to the consumer, never retried here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("connection dropped: {0}")]
    Dropped(String),

    #[error("connection closed by server")]
    ClosedByServer,
}

/// Inbound payload that could not be decoded into a known envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid JSON envelope: {0}")]
    Json(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("strike is not finite at key resolution")]
    InvalidStrike,

    #[error("unrecognised option type: {0}")]
    InvalidOptionType(String),

    #[error("unparsable expiry: {0}")]
    InvalidExpiry(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err.to_string())
    }
}

/// Scope that must not open a connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeValidationError {
    #[error("subscription scope has an empty symbol")]
    EmptySymbol,

    #[error("subscription scope has an empty expiry")]
    EmptyExpiry,

    #[error("subscription scope expiry is not a date: {0}")]
    InvalidExpiry(String),

    #[error("subscription scope has no contract symbols")]
    EmptyContracts,
}
