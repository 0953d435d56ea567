pub mod api_server;
pub mod classifier;
pub mod commands;
pub mod config;
pub mod contract_key;
pub mod lookup;
pub mod models;
pub mod reconciler;
pub mod render;
pub mod stream_client;
pub mod subscription;
pub mod view_model;

// Re-exports (public API)
pub use classifier::{classify, Classified, IgnoreReason};
pub use contract_key::{normalize_expiry, parse_option_type, ContractKey, StrikeKey};
pub use lookup::{ChainLookupClient, ExpiryContracts};
pub use models::{
    Analytics, ContractQuote, ContractRecord, Greeks, OptionType, SubscriptionScope,
    UnderlyingQuote,
};
pub use reconciler::{ChainSnapshot, SnapshotEntry};
pub use stream_client::WsConnector;
pub use subscription::{
    validate_scope, Connection, ConnectionStatus, ScopeChange, StreamConnector, StreamEvent,
    SubscriptionManager, Update,
};
pub use view_model::{build_view, find_atm_strike, ChainView, ContractRow, StrikeGroup};
