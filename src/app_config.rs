use crate::chain::config;
use anyhow::{bail, Result};
use colored::Colorize;

pub const MODES: &[&str] = &["stream", "expiries", "server"];

/// Application configuration handler
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: String,
    pub symbol: String,
    pub expiry: Option<String>,
    pub stream_url: String,
    pub api_url: String,
    pub port: u16,
    pub max_updates: Option<usize>,
}

impl AppConfig {
    /// Create new configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            mode: config::get_execution_mode(),
            symbol: config::get_symbol().trim().to_uppercase(),
            expiry: config::get_expiry(),
            stream_url: config::get_stream_url(),
            api_url: config::get_api_url(),
            port: Self::get_port(),
            max_updates: config::get_max_updates(),
        }
    }

    /// Print the effective configuration
    pub fn log_config(&self) {
        println!("{} Mode: {}", "→".cyan(), self.mode.yellow());
        println!("{} Symbol: {}", "→".cyan(), self.symbol.yellow());
        println!(
            "{} Expiry: {}",
            "→".cyan(),
            self.expiry.as_deref().unwrap_or("nearest").yellow()
        );
        println!("{} Stream: {}", "→".cyan(), self.stream_url);
        println!("{} Lookup: {}", "→".cyan(), self.api_url);
        println!();
    }

    /// Get port from environment or default
    fn get_port() -> u16 {
        std::env::var("CHAIN_PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .unwrap_or(3001)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !MODES.contains(&self.mode.as_str()) {
            bail!("Invalid mode '{}'. Use one of: {}", self.mode, MODES.join(", "));
        }
        if self.symbol.is_empty() {
            bail!("CHAIN_SYMBOL must not be empty");
        }
        if !(self.stream_url.starts_with("ws://") || self.stream_url.starts_with("wss://")) {
            bail!("CHAIN_STREAM_URL must be a ws:// or wss:// address: {}", self.stream_url);
        }
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            bail!("CHAIN_API_URL must be an http(s) address: {}", self.api_url);
        }
        Ok(())
    }
}
