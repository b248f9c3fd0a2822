//! Async WebSocket client for the Binance diff-depth stream.
//!
//! This module is organized by concern:
//! - [`connection`] - Feed lifecycle: connect, seed, reconnect with backoff
//! - [`handler`] - Incoming message processing against the local book

mod connection;
mod handler;

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::info;
use tungstenite::Message;

use crate::Result;
use crate::local_book::LocalBook;

pub use connection::DepthFeed;
pub use handler::handle_text;

/// Write half of a Binance WebSocket connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of a Binance WebSocket connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Local book shared between the feed and its readers.
///
/// `None` while the feed is (re)synchronizing; readers must not publish
/// from a book that is not in sync.
pub type SharedBook = Arc<Mutex<Option<LocalBook>>>;

/// Builds the raw-stream URL for a symbol's diff-depth stream, e.g.
/// `wss://stream.binance.com:9443/ws/btcusdt@depth`.
pub fn depth_stream_url(base_url: &str, symbol: &str) -> String {
    format!(
        "{}/{}@depth",
        base_url.trim_end_matches('/'),
        symbol.to_lowercase()
    )
}

/// Establishes a WebSocket connection to the given URL.
///
/// # Errors
///
/// Returns a [`DepthwatchError`](crate::DepthwatchError) if the connection
/// or TLS handshake fails.
pub async fn connect(url: &str) -> Result<(WsWriter, WsReader)> {
    // Already installed on every call after the first
    let _ = rustls::crypto::ring::default_provider().install_default();

    let (ws_stream, _) = connect_async(url).await?;
    info!(url, "WebSocket handshake completed");

    Ok(ws_stream.split())
}
