//! Order book depth monitor.
//!
//! Fetches order book snapshots from Binance (REST polling or a locally
//! maintained book fed by the diff-depth WebSocket stream), measures volume,
//! notional value, support/resistance and buyer/seller dominance inside
//! percentage bands around the current price, and publishes a text report
//! to Telegram.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod exchange;
pub mod local_book;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod report;
pub mod websocket;

pub use error::{DepthwatchError, Result};
