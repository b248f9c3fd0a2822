//! Order book models.
//!
//! [`PriceLevel`] and [`OrderBookSnapshot`] are the validated values the
//! analyzer consumes. [`DepthSnapshot`] and [`DepthUpdateEvent`] mirror the
//! Binance REST snapshot and diff-depth stream payloads, whose levels arrive
//! as `["price", "quantity"]` string pairs.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{DepthwatchError, Result};

/// A single price level in the order book.
///
/// The price is always positive and the quantity never negative. A zero
/// quantity is only meaningful in a diff update, where it removes the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceLevel {
    price: Decimal,
    qty: Decimal,
}

impl PriceLevel {
    /// Creates a validated price level.
    ///
    /// # Errors
    ///
    /// Returns [`DepthwatchError::MalformedLevel`] if `price` is not
    /// positive or `qty` is negative.
    pub fn new(price: Decimal, qty: Decimal) -> Result<Self> {
        if price <= Decimal::ZERO {
            return Err(DepthwatchError::MalformedLevel(format!(
                "price must be positive, got {price}"
            )));
        }
        if qty < Decimal::ZERO {
            return Err(DepthwatchError::MalformedLevel(format!(
                "quantity must not be negative, got {qty}"
            )));
        }

        Ok(Self { price, qty })
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn qty(&self) -> Decimal {
        self.qty
    }

    /// Value of the level in quote currency (`price * qty`), or `None` if
    /// the product exceeds the range of [`Decimal`].
    pub fn notional(&self) -> Option<Decimal> {
        self.price.checked_mul(self.qty)
    }
}

/// A raw `[price, quantity]` pair as sent by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawLevel(pub String, pub String);

impl RawLevel {
    /// Parses the pair into a validated [`PriceLevel`].
    ///
    /// # Errors
    ///
    /// Returns [`DepthwatchError::MalformedLevel`] if either field is not a
    /// decimal number or the resulting level is invalid.
    pub fn parse(&self) -> Result<PriceLevel> {
        let price = parse_field(&self.0, "price")?;
        let qty = parse_field(&self.1, "quantity")?;
        PriceLevel::new(price, qty)
    }
}

fn parse_field(raw: &str, field: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim()).map_err(|e| {
        DepthwatchError::MalformedLevel(format!("invalid {field} {raw:?}: {e}"))
    })
}

/// Parses every raw level, failing on the first malformed one.
fn parse_levels(raw: &[RawLevel]) -> Result<Vec<PriceLevel>> {
    raw.iter().map(RawLevel::parse).collect()
}

/// Point-in-time view of both sides of an order book.
///
/// Bids are expected in descending price order and asks in ascending price
/// order. Nothing here re-sorts or mutates them; a crossed or empty book is
/// representable and handled by consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBookSnapshot {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl OrderBookSnapshot {
    pub fn new(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        Self { bids, asks }
    }

    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Returns `true` if the best bid is at or above the best ask.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid.price() >= ask.price(),
            _ => false,
        }
    }

    /// Midpoint of the best bid and best ask.
    ///
    /// Returns `None` if either side is empty or the book is crossed.
    pub fn mid_price(&self) -> Option<Decimal> {
        if self.is_crossed() {
            return None;
        }
        let bid = self.best_bid()?.price();
        let ask = self.best_ask()?.price();
        Some(bid.checked_add(ask)? / Decimal::TWO)
    }

    /// Keeps only "wall" levels relative to `reference_price`: bids at or
    /// below it and asks at or above it.
    ///
    /// Apply this before analysis to measure resting liquidity on the
    /// expected side of the price only.
    pub fn walls(&self, reference_price: Decimal) -> Self {
        Self {
            bids: self
                .bids
                .iter()
                .filter(|level| level.price() <= reference_price)
                .copied()
                .collect(),
            asks: self
                .asks
                .iter()
                .filter(|level| level.price() >= reference_price)
                .copied()
                .collect(),
        }
    }
}

/// Response of `GET /api/v3/depth`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthSnapshot {
    pub last_update_id: u64,
    pub bids: Vec<RawLevel>,
    pub asks: Vec<RawLevel>,
}

impl DepthSnapshot {
    /// Converts the raw levels into a validated [`OrderBookSnapshot`].
    ///
    /// # Errors
    ///
    /// Returns [`DepthwatchError::MalformedLevel`] if any single level is
    /// malformed. No partial snapshot is produced.
    pub fn to_snapshot(&self) -> Result<OrderBookSnapshot> {
        Ok(OrderBookSnapshot {
            bids: parse_levels(&self.bids)?,
            asks: parse_levels(&self.asks)?,
        })
    }
}

/// An event from the `<symbol>@depth` diff stream.
#[derive(Debug, Clone, Deserialize)]
pub struct DepthUpdateEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    /// Event time in milliseconds since the Unix epoch.
    #[serde(rename = "E")]
    pub event_time: u64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "U")]
    pub first_update_id: u64,
    #[serde(rename = "u")]
    pub final_update_id: u64,
    #[serde(rename = "b")]
    pub bids: Vec<RawLevel>,
    #[serde(rename = "a")]
    pub asks: Vec<RawLevel>,
}

impl DepthUpdateEvent {
    /// Parses the bid and ask changes carried by this event.
    ///
    /// # Errors
    ///
    /// Returns [`DepthwatchError::MalformedLevel`] if any level is malformed.
    pub fn levels(&self) -> Result<(Vec<PriceLevel>, Vec<PriceLevel>)> {
        Ok((parse_levels(&self.bids)?, parse_levels(&self.asks)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw(price: &str, qty: &str) -> RawLevel {
        RawLevel(price.to_string(), qty.to_string())
    }

    fn level(price: Decimal, qty: Decimal) -> PriceLevel {
        PriceLevel::new(price, qty).unwrap()
    }

    #[test]
    fn parse_valid_level() {
        let parsed = raw("42150.50000000", "1.25000000").parse().unwrap();
        assert_eq!(parsed.price(), dec!(42150.5));
        assert_eq!(parsed.qty(), dec!(1.25));
        assert_eq!(parsed.notional(), Some(dec!(52688.125)));
    }

    #[test]
    fn zero_quantity_is_valid() {
        let parsed = raw("100", "0.00000000").parse().unwrap();
        assert!(parsed.qty().is_zero());
    }

    #[test]
    fn reject_non_numeric_price() {
        let err = raw("abc", "1").parse().unwrap_err();
        assert!(matches!(err, DepthwatchError::MalformedLevel(_)));
        assert!(err.to_string().contains("invalid price"));
    }

    #[test]
    fn reject_non_numeric_quantity() {
        let err = raw("100", "").parse().unwrap_err();
        assert!(err.to_string().contains("invalid quantity"));
    }

    #[test]
    fn reject_negative_quantity() {
        let err = raw("100", "-1").parse().unwrap_err();
        assert!(matches!(err, DepthwatchError::MalformedLevel(_)));
    }

    #[test]
    fn reject_zero_price() {
        assert!(PriceLevel::new(dec!(0), dec!(1)).is_err());
        assert!(PriceLevel::new(dec!(-5), dec!(1)).is_err());
    }

    #[test]
    fn one_bad_level_fails_whole_snapshot() {
        let depth = DepthSnapshot {
            last_update_id: 1,
            bids: vec![raw("100", "2"), raw("99", "oops")],
            asks: vec![raw("101", "3")],
        };
        assert!(matches!(
            depth.to_snapshot(),
            Err(DepthwatchError::MalformedLevel(_))
        ));
    }

    #[test]
    fn mid_price_of_normal_book() {
        let book = OrderBookSnapshot::new(
            vec![level(dec!(100), dec!(1))],
            vec![level(dec!(101), dec!(1))],
        );
        assert_eq!(book.mid_price(), Some(dec!(100.5)));
        assert!(!book.is_crossed());
    }

    #[test]
    fn mid_price_absent_for_crossed_or_one_sided_book() {
        let crossed = OrderBookSnapshot::new(
            vec![level(dec!(102), dec!(1))],
            vec![level(dec!(101), dec!(1))],
        );
        assert!(crossed.is_crossed());
        assert_eq!(crossed.mid_price(), None);

        let bids_only = OrderBookSnapshot::new(vec![level(dec!(100), dec!(1))], vec![]);
        assert_eq!(bids_only.mid_price(), None);
        assert_eq!(OrderBookSnapshot::default().mid_price(), None);
    }

    #[test]
    fn walls_drop_levels_on_wrong_side_of_price() {
        let crossed = OrderBookSnapshot::new(
            vec![level(dec!(101), dec!(4)), level(dec!(100), dec!(2))],
            vec![level(dec!(99), dec!(1)), level(dec!(102), dec!(3))],
        );
        let walls = crossed.walls(dec!(100.5));
        assert_eq!(walls.bids, vec![level(dec!(100), dec!(2))]);
        assert_eq!(walls.asks, vec![level(dec!(102), dec!(3))]);
    }

    #[test]
    fn walls_keep_levels_at_reference_price() {
        let book = OrderBookSnapshot::new(
            vec![level(dec!(100), dec!(1))],
            vec![level(dec!(100), dec!(1))],
        );
        let walls = book.walls(dec!(100));
        assert_eq!(walls.bids.len(), 1);
        assert_eq!(walls.asks.len(), 1);
    }
}
