use super::lookup::{ChainLookupClient, ExpiryContracts};
use super::models::SubscriptionScope;
use super::subscription::ConnectionStatus;
use super::view_model::ChainView;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::info;

// -----------------------------------------------
// API REQUEST/RESPONSE MODELS
// -----------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ExpiriesQuery {
    pub symbol: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub processing_time_ms: Option<u64>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T, start_time: Instant) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            processing_time_ms: Some(start_time.elapsed().as_millis() as u64),
        }
    }

    fn err(error: impl ToString, start_time: Instant) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            processing_time_ms: Some(start_time.elapsed().as_millis() as u64),
        }
    }
}

/// Latest view published by the stream loop
#[derive(Debug, Clone, Serialize)]
pub struct PublishedChain {
    pub scope: Option<SubscriptionScope>,
    pub status: ConnectionStatus,
    pub view: ChainView,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for PublishedChain {
    fn default() -> Self {
        Self {
            scope: None,
            status: ConnectionStatus::Idle,
            view: ChainView::default(),
            updated_at: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExpiriesResponse {
    pub symbol: String,
    pub expiries: ExpiryContracts,
}

// -----------------------------------------------
// APPLICATION STATE
// -----------------------------------------------

/// The server only reads published views; the snapshot stays with the
/// subscription manager.
#[derive(Clone)]
pub struct AppState {
    lookup: Arc<ChainLookupClient>,
    latest: Arc<RwLock<PublishedChain>>,
    cache: Arc<RwLock<HashMap<String, (ExpiryContracts, Instant)>>>,
}

const CACHE_DURATION: Duration = Duration::from_secs(300); // 5 minutes

impl AppState {
    pub fn new(lookup: ChainLookupClient) -> Self {
        Self {
            lookup: Arc::new(lookup),
            latest: Arc::new(RwLock::new(PublishedChain::default())),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Replace the published view
    pub async fn publish(&self, scope: Option<SubscriptionScope>, status: ConnectionStatus, view: ChainView) {
        let mut latest = self.latest.write().await;
        *latest = PublishedChain {
            scope,
            status,
            view,
            updated_at: Some(Utc::now()),
        };
    }
}

// -----------------------------------------------
// API HANDLERS
// -----------------------------------------------

/// GET /chain_health
async fn health() -> &'static str {
    "ok"
}

/// GET /api/chain - latest grouped call/put view
async fn get_chain(State(app_state): State<AppState>) -> Json<ApiResponse<PublishedChain>> {
    let start_time = Instant::now();
    let latest = app_state.latest.read().await.clone();
    Json(ApiResponse::ok(latest, start_time))
}

/// GET /api/expiries?symbol=AAPL - expiry → contract symbols
async fn get_expiries(
    Query(query): Query<ExpiriesQuery>,
    State(app_state): State<AppState>,
) -> Result<Json<ApiResponse<ExpiriesResponse>>, StatusCode> {
    let start_time = Instant::now();
    let symbol = query.symbol.trim().to_uppercase();

    if symbol.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Check cache first
    {
        let cache = app_state.cache.read().await;
        if let Some((expiries, cached_at)) = cache.get(&symbol) {
            if cached_at.elapsed() < CACHE_DURATION {
                return Ok(Json(ApiResponse::ok(
                    ExpiriesResponse { symbol, expiries: expiries.clone() },
                    start_time,
                )));
            }
        }
    }

    match app_state.lookup.fetch_expiries(&symbol).await {
        Ok(expiries) => {
            {
                let mut cache = app_state.cache.write().await;
                cache.insert(symbol.clone(), (expiries.clone(), Instant::now()));
            }
            Ok(Json(ApiResponse::ok(ExpiriesResponse { symbol, expiries }, start_time)))
        }
        Err(e) => Ok(Json(ApiResponse::err(e, start_time))),
    }
}

// -----------------------------------------------
// SERVER SETUP
// -----------------------------------------------

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/chain_health", get(health))
        .route("/api/chain", get(get_chain))
        .route("/api/expiries", get(get_expiries))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

pub async fn start_server(port: u16, app_state: AppState) -> Result<()> {
    let app = router(app_state);

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Option-chain API server running on http://{}", addr);
    println!("Available endpoints:");
    println!("   GET  /chain_health");
    println!("   GET  /api/chain");
    println!("   GET  /api/expiries?symbol=AAPL");
    println!();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down API server");
    }
}
