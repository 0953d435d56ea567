use option_chain_stream::chain::{
    Connection, ConnectionStatus, IgnoreReason, ScopeChange, StreamConnector, StreamEvent,
    SubscriptionManager, SubscriptionScope, Update,
};
use option_chain_stream::error::{ScopeValidationError, TransportError};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

const STREAM_BASE: &str = "ws://localhost:8000/ws/chain";
const CALL: &str = "AAPL240621C00190000";
const PUT: &str = "AAPL240621P00190000";

/// Hands out in-memory connections and remembers every address it was asked for
#[derive(Clone, Default)]
struct ChannelConnector {
    opened: Arc<Mutex<Vec<(String, mpsc::Sender<StreamEvent>)>>>,
}

impl ChannelConnector {
    fn opened_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    fn url(&self, index: usize) -> String {
        self.opened.lock().unwrap()[index].0.clone()
    }

    fn sender(&self, index: usize) -> mpsc::Sender<StreamEvent> {
        self.opened.lock().unwrap()[index].1.clone()
    }
}

impl StreamConnector for ChannelConnector {
    fn open(&self, url: &str) -> Connection {
        let (tx, rx) = mpsc::channel(64);
        self.opened.lock().unwrap().push((url.to_string(), tx));
        Connection::new(rx, None)
    }
}

fn aapl_scope() -> SubscriptionScope {
    SubscriptionScope::new("AAPL", "2024-06-21", [CALL, PUT])
}

fn contract_frame(symbol: &str, call_put: &str, expiry: &str, greeks: Value) -> String {
    json!({
        "tt_type": "grouped_option_data",
        "symbol": symbol,
        "strike": 190,
        "call_put": call_put,
        "expiry": expiry,
        "quote": { "bid_price": 5.10, "ask_price": 5.30 },
        "greeks": greeks,
    })
    .to_string()
}

fn underlying_frame(bid: f64, ask: f64) -> String {
    json!({
        "tt_type": "underlying_quote",
        "bid_price": bid,
        "bid_size": 100,
        "ask_price": ask,
        "ask_size": 200,
    })
    .to_string()
}

async fn push(tx: &mpsc::Sender<StreamEvent>, frame: String) {
    tx.send(StreamEvent::Frame(frame)).await.unwrap();
}

fn subscribed(manager: &mut SubscriptionManager<ChannelConnector>, scope: SubscriptionScope) {
    assert!(matches!(manager.set_scope(scope), ScopeChange::Subscribed { .. }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_aapl_end_to_end() {
        let connector = ChannelConnector::default();
        let mut manager = SubscriptionManager::new(connector.clone(), STREAM_BASE);

        let ScopeChange::Subscribed { url } = manager.set_scope(aapl_scope()) else {
            panic!("valid scope must subscribe");
        };
        assert_eq!(
            url,
            format!("{STREAM_BASE}?symbol=AAPL&expiry=2024-06-21&option_symbols={CALL},{PUT}")
        );
        assert_eq!(connector.url(0), url);
        assert_eq!(manager.status(), ConnectionStatus::Connecting);

        let tx = connector.sender(0);
        tx.send(StreamEvent::Opened).await.unwrap();
        push(&tx, contract_frame(CALL, "C", "2024-06-21", json!({ "delta": 0.55 }))).await;
        push(&tx, contract_frame(PUT, "P", "2024-06-21", json!({ "delta": -0.45 }))).await;
        push(&tx, underlying_frame(189.50, 189.55)).await;

        assert_eq!(manager.next_update().await, Some(Update::Connected));
        assert_eq!(manager.status(), ConnectionStatus::Connected);
        for _ in 0..3 {
            assert_eq!(manager.next_update().await, Some(Update::Changed));
        }

        let view = manager.view();
        assert_eq!(view.rows.len(), 1);
        let group = &view.rows[0];
        assert_eq!(group.strike, 190.0);
        assert_eq!(group.call.as_ref().unwrap().cells.delta, "0.5500");
        assert_eq!(group.put.as_ref().unwrap().cells.delta, "-0.4500");
        assert!(group.is_atm);

        let underlying = view.underlying.unwrap();
        assert_eq!(underlying.bid, "189.50");
        assert_eq!(underlying.ask, "189.55");
        assert_eq!(view.contract_count, 2);
    }

    #[tokio::test]
    async fn test_update_without_theta_shows_placeholder() {
        let connector = ChannelConnector::default();
        let mut manager = SubscriptionManager::new(connector.clone(), STREAM_BASE);
        subscribed(&mut manager, aapl_scope());

        let tx = connector.sender(0);
        push(&tx, contract_frame(CALL, "C", "2024-06-21", json!({ "delta": 0.55, "theta": -0.05 }))).await;
        assert_eq!(manager.next_update().await, Some(Update::Changed));
        let view = manager.view();
        assert_eq!(view.rows[0].call.as_ref().unwrap().cells.theta, "-0.0500");

        push(&tx, contract_frame(CALL, "C", "2024-06-21", json!({ "delta": 0.60 }))).await;
        assert_eq!(manager.next_update().await, Some(Update::Changed));

        let view = manager.view();
        let call = view.rows[0].call.as_ref().unwrap();
        assert_eq!(call.cells.delta, "0.6000");
        assert_eq!(call.cells.theta, "--");
        assert_eq!(manager.snapshot().contract_count(), 1);
    }

    #[tokio::test]
    async fn test_expiry_change_clears_snapshot_and_drops_pending_frames() {
        let connector = ChannelConnector::default();
        let mut manager = SubscriptionManager::new(connector.clone(), STREAM_BASE);
        subscribed(&mut manager, aapl_scope());

        let old_tx = connector.sender(0);
        push(&old_tx, contract_frame(CALL, "C", "2024-06-21", json!({ "delta": 0.55 }))).await;
        assert_eq!(manager.next_update().await, Some(Update::Changed));

        // still buffered when the scope moves on
        push(&old_tx, contract_frame(PUT, "P", "2024-06-21", json!({ "delta": -0.45 }))).await;

        let next_call = "AAPL240628C00190000";
        subscribed(&mut manager, SubscriptionScope::new("AAPL", "2024-06-28", [next_call]));

        assert!(manager.snapshot().is_empty());
        assert!(manager.view().is_empty());
        assert_eq!(connector.opened_count(), 2);
        assert!(old_tx.is_closed());

        let new_tx = connector.sender(1);
        push(&new_tx, contract_frame(next_call, "C", "2024-06-28", json!({ "delta": 0.5 }))).await;
        assert_eq!(manager.next_update().await, Some(Update::Changed));

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.contract_count(), 1);
        assert!(snapshot.contract(next_call).is_some());
        assert!(snapshot.contract(PUT).is_none());
    }

    #[tokio::test]
    async fn test_frames_for_other_expiry_are_ignored() {
        let connector = ChannelConnector::default();
        let mut manager = SubscriptionManager::new(connector.clone(), STREAM_BASE);
        subscribed(&mut manager, aapl_scope());

        let tx = connector.sender(0);
        push(&tx, contract_frame(CALL, "C", "2024-06-28", json!({}))).await;
        push(&tx, json!({ "tt_type": "heartbeat" }).to_string()).await;
        push(&tx, "not json".to_string()).await;

        assert!(matches!(
            manager.next_update().await,
            Some(Update::Ignored(IgnoreReason::ExpiryMismatch { .. }))
        ));
        assert_eq!(manager.next_update().await, Some(Update::Ignored(IgnoreReason::UnknownType)));
        assert!(matches!(
            manager.next_update().await,
            Some(Update::Ignored(IgnoreReason::Malformed(_)))
        ));
        assert!(manager.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let connector = ChannelConnector::default();
        let mut manager = SubscriptionManager::new(connector.clone(), STREAM_BASE);
        subscribed(&mut manager, aapl_scope());

        let tx = connector.sender(0);
        for delta in [0.50, 0.52, 0.48] {
            push(&tx, contract_frame(CALL, "C", "2024-06-21", json!({ "delta": delta }))).await;
            assert_eq!(manager.next_update().await, Some(Update::Changed));
        }
        push(&tx, underlying_frame(189.0, 189.2)).await;
        push(&tx, underlying_frame(190.0, 190.2)).await;
        manager.next_update().await;
        manager.next_update().await;

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.contract_count(), 1);
        assert_eq!(snapshot.contract(CALL).unwrap().greeks.delta, Some(0.48));
        assert_eq!(snapshot.underlying().unwrap().bid_price, Some(190.0));
    }

    #[tokio::test]
    async fn test_same_scope_is_a_no_op() {
        let connector = ChannelConnector::default();
        let mut manager = SubscriptionManager::new(connector.clone(), STREAM_BASE);
        subscribed(&mut manager, aapl_scope());

        // equal by value, listed in a different order
        let again = SubscriptionScope::new("AAPL", "2024-06-21", [PUT, CALL]);
        assert_eq!(manager.set_scope(again), ScopeChange::Unchanged);
        assert_eq!(connector.opened_count(), 1);
        assert!(!connector.sender(0).is_closed());
    }

    #[tokio::test]
    async fn test_invalid_scope_opens_no_connection() {
        let connector = ChannelConnector::default();
        let mut manager = SubscriptionManager::new(connector.clone(), STREAM_BASE);

        let empty = SubscriptionScope::new("AAPL", "2024-06-21", Vec::<String>::new());
        assert_eq!(
            manager.set_scope(empty.clone()),
            ScopeChange::Rejected(ScopeValidationError::EmptyContracts)
        );
        assert_eq!(manager.set_scope(empty), ScopeChange::Unchanged);

        let no_symbol = SubscriptionScope::new("", "2024-06-21", [CALL]);
        assert_eq!(
            manager.set_scope(no_symbol),
            ScopeChange::Rejected(ScopeValidationError::EmptySymbol)
        );

        assert_eq!(connector.opened_count(), 0);
        assert!(!manager.is_subscribed());
        assert_eq!(manager.status(), ConnectionStatus::Idle);
        assert_eq!(manager.next_update().await, None);
    }

    #[tokio::test]
    async fn test_invalid_scope_closes_previous_connection() {
        let connector = ChannelConnector::default();
        let mut manager = SubscriptionManager::new(connector.clone(), STREAM_BASE);
        subscribed(&mut manager, aapl_scope());

        let tx = connector.sender(0);
        push(&tx, contract_frame(CALL, "C", "2024-06-21", json!({ "delta": 0.55 }))).await;
        manager.next_update().await;

        let rejected = manager.set_scope(SubscriptionScope::new("AAPL", "", [CALL]));
        assert_eq!(rejected, ScopeChange::Rejected(ScopeValidationError::EmptyExpiry));
        assert!(tx.is_closed());
        assert!(manager.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_is_surfaced_without_reconnect() {
        let connector = ChannelConnector::default();
        let mut manager = SubscriptionManager::new(connector.clone(), STREAM_BASE);
        subscribed(&mut manager, aapl_scope());

        let tx = connector.sender(0);
        push(&tx, contract_frame(CALL, "C", "2024-06-21", json!({ "delta": 0.55 }))).await;
        let failure = TransportError::Dropped("connection reset".to_string());
        tx.send(StreamEvent::Error(failure.clone())).await.unwrap();

        assert_eq!(manager.next_update().await, Some(Update::Changed));
        assert_eq!(manager.next_update().await, Some(Update::TransportError(failure)));
        assert_eq!(manager.status(), ConnectionStatus::Errored);
        assert!(!manager.is_subscribed());
        assert_eq!(manager.next_update().await, None);
        assert_eq!(connector.opened_count(), 1);

        // last known data stays visible until the consumer acts
        assert_eq!(manager.snapshot().contract_count(), 1);

        // re-applying the same scope is the consumer's retry
        subscribed(&mut manager, aapl_scope());
        assert_eq!(connector.opened_count(), 2);
        assert!(manager.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_server_close_and_teardown() {
        let connector = ChannelConnector::default();
        let mut manager = SubscriptionManager::new(connector.clone(), STREAM_BASE);
        subscribed(&mut manager, aapl_scope());

        connector.sender(0).send(StreamEvent::Closed).await.unwrap();
        assert_eq!(manager.next_update().await, Some(Update::Closed));
        assert_eq!(manager.status(), ConnectionStatus::Closed);

        subscribed(&mut manager, aapl_scope());
        let tx = connector.sender(1);
        push(&tx, underlying_frame(189.50, 189.55)).await;
        manager.next_update().await;

        manager.teardown();
        assert!(tx.is_closed());
        assert!(manager.scope().is_none());
        assert!(manager.snapshot().is_empty());
        assert_eq!(manager.status(), ConnectionStatus::Idle);
        assert_eq!(manager.next_update().await, None);
    }
}
