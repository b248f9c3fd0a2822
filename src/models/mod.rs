//! Typed models for order book data.
//!
//! [`book`] holds the validated in-memory types the analyzer works on
//! together with the Binance depth wire formats they are ingested from;
//! [`ticker`] holds the last-price response used as the reference price.

pub mod book;
pub mod ticker;

pub use book::{DepthSnapshot, DepthUpdateEvent, OrderBookSnapshot, PriceLevel, RawLevel};
pub use ticker::TickerPrice;
