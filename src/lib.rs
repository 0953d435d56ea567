pub mod app_config;
pub mod chain;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use app_config::AppConfig;
pub use chain::{ChainSnapshot, ChainView, SubscriptionManager, SubscriptionScope, WsConnector};
pub use error::{DecodeError, ScopeValidationError, TransportError};
