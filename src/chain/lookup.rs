use super::config;
use super::contract_key::normalize_expiry;
use super::models::SubscriptionScope;
use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use reqwest::{header, Client, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use tracing::{debug, info, warn};

/// Expiry date string → contract symbols listed for it, in listing order
pub type ExpiryContracts = BTreeMap<String, Vec<String>>;

// -----------------------------------------------
// EXPIRY / CONTRACT LOOKUP CLIENT
// -----------------------------------------------
pub struct ChainLookupClient {
    client: Client,
    base_url: String,
}

impl ChainLookupClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.into(),
        })
    }

    /// Generic retry fetch; retries only 429 and 5xx
    async fn fetch_json(&self, url: &str) -> Result<String> {
        let backoff = ExponentialBackoff::from_millis(config::RETRY_BASE_DELAY_MS)
            .factor(config::RETRY_FACTOR)
            .max_delay(Duration::from_secs(config::RETRY_MAX_DELAY_SECS))
            .take(config::RETRY_MAX_ATTEMPTS);

        Retry::spawn(backoff, || async {
            let res = self
                .client
                .get(url)
                .send()
                .await
                .context("Request send failed")?;

            let status = res.status();
            debug!("GET {} -> {}", url, status.as_u16());

            if status.is_success() {
                let text = res.text().await.context("Failed to read body")?;

                let trimmed = text.trim();
                if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
                    let preview: String = text.chars().take(200).collect();
                    anyhow::bail!("Non-JSON response: {}", preview);
                }

                Ok(text)
            } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                warn!("Retryable status {} from {}", status, url);
                anyhow::bail!("Retryable error: {}", status)
            } else {
                let body = res.text().await.unwrap_or_default();
                let preview: String = body.chars().take(200).collect();
                anyhow::bail!("Client error {}: {}", status, preview)
            }
        })
        .await
    }

    /// Listed expiries for `symbol` with their contract symbols
    pub async fn fetch_expiries(&self, symbol: &str) -> Result<ExpiryContracts> {
        let url = config::expiry_lookup_url(&self.base_url, symbol);
        let text = self.fetch_json(&url).await?;
        let expiries = parse_expiry_contracts(&text)
            .with_context(|| format!("Failed to parse expiries for {}", symbol))?;

        info!("{}: {} expiries listed", symbol, expiries.len());
        Ok(expiries)
    }

    /// Subscription scope for `symbol`; picks the nearest expiry when none is given
    pub async fn resolve_scope(&self, symbol: &str, expiry: Option<&str>) -> Result<SubscriptionScope> {
        let expiries = self.fetch_expiries(symbol).await?;
        scope_from_expiries(symbol, &expiries, expiry, Local::now().date_naive())
    }
}

pub fn parse_expiry_contracts(text: &str) -> Result<ExpiryContracts> {
    let map: ExpiryContracts = serde_json::from_str(text)?;
    Ok(map)
}

/// Build the scope from a lookup result.
///
/// An explicit expiry may be date-only or date-time; it is matched on its
/// date part. Without one, the earliest expiry not before `today` is used.
pub fn scope_from_expiries(
    symbol: &str,
    expiries: &ExpiryContracts,
    expiry: Option<&str>,
    today: NaiveDate,
) -> Result<SubscriptionScope> {
    let (expiry_key, contracts) = match expiry {
        Some(wanted) => {
            let wanted_date =
                normalize_expiry(wanted).ok_or_else(|| anyhow!("Invalid expiry: {}", wanted))?;
            expiries
                .iter()
                .find(|(k, _)| normalize_expiry(k) == Some(wanted_date))
                .ok_or_else(|| anyhow!("No contracts listed for {} expiring {}", symbol, wanted))?
        }
        None => {
            let keys: Vec<&String> = expiries.keys().collect();
            let selected = select_expiry(&keys, today)?;
            expiries
                .get_key_value(selected.as_str())
                .ok_or_else(|| anyhow!("Selected expiry vanished: {}", selected))?
        }
    };

    Ok(SubscriptionScope::new(
        symbol,
        expiry_key.clone(),
        contracts.iter().cloned(),
    ))
}

/// Earliest expiry on or after `today`
pub fn select_expiry<'a>(expiry_dates: &[&'a String], today: NaiveDate) -> Result<&'a String> {
    if expiry_dates.is_empty() {
        return Err(anyhow!("No expiry dates found"));
    }

    let mut parsed: Vec<(NaiveDate, &'a String)> = Vec::new();
    for s in expiry_dates {
        match normalize_expiry(s) {
            Some(d) => parsed.push((d, *s)),
            None => warn!("Skipping unparsable expiry date: {}", s),
        }
    }

    parsed.sort_by_key(|(d, _)| *d);

    parsed
        .into_iter()
        .find(|(date, _)| *date >= today)
        .map(|(_, s)| s)
        .ok_or_else(|| anyhow!("No valid expiry found (all in the past)"))
}

// -----------------------------------------------
// HTTP CLIENT BUILDER
// -----------------------------------------------
fn build_client() -> Result<Client> {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

    Client::builder()
        .default_headers(headers)
        .user_agent(config::USER_AGENT)
        .timeout(config::HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}
