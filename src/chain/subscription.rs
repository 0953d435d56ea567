use chrono::NaiveDate;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::classifier::{self, IgnoreReason};
use super::config;
use super::contract_key::normalize_expiry;
use super::models::SubscriptionScope;
use super::reconciler::ChainSnapshot;
use super::view_model::{self, ChainView};
use crate::error::{ScopeValidationError, TransportError};

// -----------------------------------------------
// CONNECTION HANDLE
// -----------------------------------------------

/// What the transport hands to the connection owner
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Opened,
    Frame(String),
    Error(TransportError),
    Closed,
}

/// One live streaming connection.
///
/// Dropping or closing it stops the transport task and discards every
/// frame that has not been received yet.
#[derive(Debug)]
pub struct Connection {
    events: mpsc::Receiver<StreamEvent>,
    task: Option<JoinHandle<()>>,
}

impl Connection {
    pub fn new(events: mpsc::Receiver<StreamEvent>, task: Option<JoinHandle<()>>) -> Self {
        Self { events, task }
    }

    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.events.close();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens a connection to an address without waiting for it to be established.
pub trait StreamConnector {
    fn open(&self, url: &str) -> Connection;
}

// -----------------------------------------------
// SUBSCRIPTION MANAGER
// -----------------------------------------------

/// Advisory stream health for the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Connected,
    Errored,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScopeChange {
    Unchanged,
    Subscribed { url: String },
    Rejected(ScopeValidationError),
}

/// Outcome of processing one transport event
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Connected,
    Changed,
    Ignored(IgnoreReason),
    TransportError(TransportError),
    Closed,
}

/// Owns the single connection and the snapshot for the active scope.
pub struct SubscriptionManager<C: StreamConnector> {
    connector: C,
    stream_base: String,
    scope: Option<SubscriptionScope>,
    scope_expiry: Option<NaiveDate>,
    connection: Option<Connection>,
    snapshot: ChainSnapshot,
    status: ConnectionStatus,
}

impl<C: StreamConnector> SubscriptionManager<C> {
    pub fn new(connector: C, stream_base: impl Into<String>) -> Self {
        Self {
            connector,
            stream_base: stream_base.into(),
            scope: None,
            scope_expiry: None,
            connection: None,
            snapshot: ChainSnapshot::new(),
            status: ConnectionStatus::Idle,
        }
    }

    /// Make `scope` the active one.
    ///
    /// A scope equal by value to the current one is a no-op while its
    /// connection is alive; re-applying it after the connection died opens
    /// a fresh one. Any other scope closes the old connection and clears the
    /// snapshot before a new connection is opened.
    pub fn set_scope(&mut self, scope: SubscriptionScope) -> ScopeChange {
        if self.scope.as_ref() == Some(&scope)
            && (self.connection.is_some() || self.scope_expiry.is_none())
        {
            return ScopeChange::Unchanged;
        }

        self.close_connection();
        self.snapshot.clear();

        match validate_scope(&scope) {
            Err(e) => {
                warn!("Not subscribing {} {}: {}", scope.symbol, scope.expiry, e);
                self.scope = Some(scope);
                self.scope_expiry = None;
                self.status = ConnectionStatus::Idle;
                ScopeChange::Rejected(e)
            }
            Ok(expiry) => {
                let url = config::chain_stream_url(&self.stream_base, &scope);
                info!(
                    "Subscribing {} {} ({} contracts)",
                    scope.symbol,
                    expiry,
                    scope.contract_symbols.len()
                );
                debug!("Stream address: {}", url);

                self.connection = Some(self.connector.open(&url));
                self.scope = Some(scope);
                self.scope_expiry = Some(expiry);
                self.status = ConnectionStatus::Connecting;
                ScopeChange::Subscribed { url }
            }
        }
    }

    /// Close the connection and forget all state.
    pub fn teardown(&mut self) {
        self.close_connection();
        self.snapshot.clear();
        self.scope = None;
        self.scope_expiry = None;
        self.status = ConnectionStatus::Idle;
    }

    /// Wait for the next transport event and fold it into the snapshot.
    ///
    /// `None` when no connection is open. Cancel safe.
    pub async fn next_update(&mut self) -> Option<Update> {
        let connection = self.connection.as_mut()?;
        let event = connection.recv().await;

        let update = match event {
            Some(StreamEvent::Opened) => {
                self.status = ConnectionStatus::Connected;
                Update::Connected
            }
            Some(StreamEvent::Frame(raw)) => {
                let expiry = self.scope_expiry?;
                let classified = classifier::classify(&raw, expiry);
                match classified {
                    classifier::Classified::Ignored(reason) => Update::Ignored(reason),
                    accepted => {
                        self.snapshot.apply(accepted);
                        Update::Changed
                    }
                }
            }
            Some(StreamEvent::Error(e)) => {
                error!("Option-chain stream error: {}", e);
                self.close_connection();
                self.status = ConnectionStatus::Errored;
                Update::TransportError(e)
            }
            Some(StreamEvent::Closed) | None => {
                info!("Option-chain stream closed");
                self.close_connection();
                self.status = ConnectionStatus::Closed;
                Update::Closed
            }
        };

        Some(update)
    }

    pub fn snapshot(&self) -> &ChainSnapshot {
        &self.snapshot
    }

    pub fn view(&self) -> ChainView {
        view_model::build_view(&self.snapshot)
    }

    pub fn scope(&self) -> Option<&SubscriptionScope> {
        self.scope.as_ref()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_subscribed(&self) -> bool {
        self.connection.is_some()
    }

    fn close_connection(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
    }
}

/// Reject scopes that must not open a connection; returns the scope's date.
pub fn validate_scope(scope: &SubscriptionScope) -> Result<NaiveDate, ScopeValidationError> {
    if scope.symbol.trim().is_empty() {
        return Err(ScopeValidationError::EmptySymbol);
    }
    if scope.expiry.trim().is_empty() {
        return Err(ScopeValidationError::EmptyExpiry);
    }
    let expiry = normalize_expiry(&scope.expiry)
        .ok_or_else(|| ScopeValidationError::InvalidExpiry(scope.expiry.clone()))?;
    if scope.contract_symbols.iter().all(|s| s.trim().is_empty()) {
        return Err(ScopeValidationError::EmptyContracts);
    }
    Ok(expiry)
}
