//! Binance REST client for public market data.
//!
//! Only the two unauthenticated endpoints the monitor needs are wrapped:
//! the depth snapshot and the last traded price.

use std::time::Duration;

use reqwest::Client;
use rust_decimal::Decimal;
use tracing::debug;

use crate::models::book::DepthSnapshot;
use crate::models::ticker::TickerPrice;
use crate::{DepthwatchError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("depthwatch/", env!("CARGO_PKG_VERSION"));

/// Binance REST API client.
#[derive(Debug, Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    /// Creates a client for the given base URL, e.g. `https://api.binance.com`.
    ///
    /// # Errors
    ///
    /// Returns [`DepthwatchError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Fetches up to `limit` levels per side via `GET /api/v3/depth`.
    ///
    /// # Errors
    ///
    /// Returns [`DepthwatchError::Http`] if the request fails or the server
    /// answers with a non-success status, or if the body is not a depth
    /// snapshot.
    pub async fn fetch_depth(&self, symbol: &str, limit: u16) -> Result<DepthSnapshot> {
        let limit = limit.to_string();
        let depth: DepthSnapshot = self
            .client
            .get(self.endpoint("/api/v3/depth"))
            .query(&[("symbol", symbol), ("limit", limit.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(
            symbol,
            last_update_id = depth.last_update_id,
            bids = depth.bids.len(),
            asks = depth.asks.len(),
            "Fetched depth snapshot"
        );
        Ok(depth)
    }

    /// Fetches the last traded price via `GET /api/v3/ticker/price`.
    ///
    /// # Errors
    ///
    /// Returns [`DepthwatchError::Http`] if the request fails, or
    /// [`DepthwatchError::MalformedMessage`] if the response is for a
    /// different symbol.
    pub async fn fetch_price(&self, symbol: &str) -> Result<Decimal> {
        let ticker: TickerPrice = self
            .client
            .get(self.endpoint("/api/v3/ticker/price"))
            .query(&[("symbol", symbol)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if ticker.symbol != symbol {
            return Err(DepthwatchError::MalformedMessage(format!(
                "requested price for {symbol}, got {}",
                ticker.symbol
            )));
        }

        debug!(symbol, price = %ticker.price, "Fetched last price");
        Ok(ticker.price)
    }
}
