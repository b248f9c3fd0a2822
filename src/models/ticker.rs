//! Last traded price model.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Response of `GET /api/v3/ticker/price` for a single symbol.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    pub price: Decimal,
}
