use super::api_server::{self, AppState};
use super::lookup::ChainLookupClient;
use super::models::SubscriptionScope;
use super::render;
use super::stream_client::WsConnector;
use super::subscription::{ScopeChange, StreamConnector, SubscriptionManager, Update};
use crate::app_config::AppConfig;

use anyhow::{bail, Result};
use colored::Colorize;
use std::io::IsTerminal;
use tracing::{info, warn};

/// Where accepted updates go
enum Sink<'a> {
    Terminal,
    Published(&'a AppState),
}

/// Command handler for the option-chain run modes
pub struct ChainCommands;

impl ChainCommands {
    /// Stream one scope and re-render the grid after every accepted update
    pub async fn run_stream(app: &AppConfig) -> Result<()> {
        Self::banner("Option Chain Stream");

        let lookup = ChainLookupClient::new(&app.api_url)?;
        let scope = lookup.resolve_scope(&app.symbol, app.expiry.as_deref()).await?;
        println!(
            "{} {} {} ({} contracts)",
            "✓".green(),
            scope.symbol.yellow(),
            scope.expiry.cyan(),
            scope.contract_symbols.len()
        );
        println!();

        let mut manager = SubscriptionManager::new(WsConnector::new(), app.stream_url.clone());
        let accepted = Self::pump(&mut manager, scope, Sink::Terminal, app.max_updates).await?;

        println!();
        println!("{} Accepted updates: {}", "ℹ".blue(), accepted);
        Ok(())
    }

    /// Print the lookup result for a symbol
    pub async fn run_expiries(app: &AppConfig) -> Result<()> {
        Self::banner("Option Chain Expiries");

        let lookup = ChainLookupClient::new(&app.api_url)?;
        let expiries = lookup.fetch_expiries(&app.symbol).await?;

        if expiries.is_empty() {
            println!("{} No expiries listed for {}", "ℹ".blue(), app.symbol.yellow());
            return Ok(());
        }

        for (expiry, contracts) in &expiries {
            println!("{} {:<24} {} contracts", "→".cyan(), expiry.yellow(), contracts.len());
        }
        Ok(())
    }

    /// Stream one scope in the background and serve the latest view over HTTP
    pub async fn run_server(app: &AppConfig) -> Result<()> {
        Self::banner("Option Chain API Server");

        let state = AppState::new(ChainLookupClient::new(&app.api_url)?);
        let lookup = ChainLookupClient::new(&app.api_url)?;

        let stream_state = state.clone();
        let symbol = app.symbol.clone();
        let expiry = app.expiry.clone();
        let stream_url = app.stream_url.clone();
        tokio::spawn(async move {
            let scope = match lookup.resolve_scope(&symbol, expiry.as_deref()).await {
                Ok(scope) => scope,
                Err(e) => {
                    warn!("No stream for {}: {:#}", symbol, e);
                    return;
                }
            };
            let mut manager = SubscriptionManager::new(WsConnector::new(), stream_url);
            if let Err(e) = Self::pump(&mut manager, scope, Sink::Published(&stream_state), None).await {
                warn!("Stream loop ended: {:#}", e);
            }
        });

        api_server::start_server(app.port, state).await
    }

    /// Drive one subscription until it closes, errors, hits `max_updates`
    /// or Ctrl-C. Returns the number of accepted updates.
    async fn pump<C: StreamConnector>(
        manager: &mut SubscriptionManager<C>,
        scope: SubscriptionScope,
        sink: Sink<'_>,
        max_updates: Option<usize>,
    ) -> Result<usize> {
        let symbol = scope.symbol.clone();
        let expiry = scope.expiry.clone();

        if let ScopeChange::Rejected(e) = manager.set_scope(scope) {
            bail!("Cannot subscribe: {}", e);
        }
        Self::emit(manager, &sink, &symbol, &expiry).await;

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let mut accepted = 0usize;
        loop {
            let update = tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Interrupted, tearing down subscription");
                    break;
                }
                update = manager.next_update() => update,
            };

            match update {
                None => break,
                Some(Update::Changed) => {
                    accepted += 1;
                    Self::emit(manager, &sink, &symbol, &expiry).await;
                    if max_updates.is_some_and(|max| accepted >= max) {
                        break;
                    }
                }
                Some(Update::Connected) => Self::emit(manager, &sink, &symbol, &expiry).await,
                Some(Update::Ignored(_)) => {}
                Some(Update::TransportError(e)) => {
                    Self::emit(manager, &sink, &symbol, &expiry).await;
                    manager.teardown();
                    bail!("Stream failed: {}", e);
                }
                Some(Update::Closed) => {
                    Self::emit(manager, &sink, &symbol, &expiry).await;
                    break;
                }
            }
        }

        manager.teardown();
        if let Sink::Published(state) = sink {
            state.publish(None, manager.status(), manager.view()).await;
        }
        Ok(accepted)
    }

    async fn emit<C: StreamConnector>(
        manager: &SubscriptionManager<C>,
        sink: &Sink<'_>,
        symbol: &str,
        expiry: &str,
    ) {
        let view = manager.view();
        match sink {
            Sink::Terminal => {
                if std::io::stdout().is_terminal() {
                    // clear screen, cursor home
                    print!("\x1B[2J\x1B[1;1H");
                }
                print!("{}", render::render_chain(symbol, expiry, &view, manager.status()));
            }
            Sink::Published(state) => {
                state
                    .publish(manager.scope().cloned(), manager.status(), view)
                    .await;
            }
        }
    }

    fn banner(title: &str) {
        println!("{}", "=".repeat(60).blue());
        println!("{}", title.green().bold());
        println!("{}", "=".repeat(60).blue());
        println!();
    }

    pub fn print_usage() {
        eprintln!("Set CHAIN_MODE environment variable to control execution mode");
        eprintln!("Examples:");
        eprintln!("  CHAIN_MODE=stream CHAIN_SYMBOL=AAPL cargo run                        # Nearest expiry");
        eprintln!("  CHAIN_MODE=stream CHAIN_SYMBOL=AAPL CHAIN_EXPIRY=2024-06-21 cargo run");
        eprintln!("  CHAIN_MODE=expiries CHAIN_SYMBOL=AAPL cargo run");
        eprintln!("  CHAIN_MODE=server CHAIN_PORT=3001 CHAIN_SYMBOL=AAPL cargo run");
        eprintln!("Endpoints: CHAIN_STREAM_URL (ws), CHAIN_API_URL (http)");
    }
}
