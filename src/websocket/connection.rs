//! Depth feed lifecycle management.
//!
//! [`DepthFeed`] connects to the diff-depth stream, seeds the shared local
//! book from a REST snapshot, and applies every update to it. When the
//! reader stops the book is cleared. A sequence gap in a book that was
//! already live triggers an immediate resync; every other failure,
//! including a snapshot that never bridges the stream, reconnects with
//! exponential backoff.

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tracing::{error, info, warn};
use tungstenite::Message;

use super::{SharedBook, connect, depth_stream_url, handle_text};
use crate::DepthwatchError;
use crate::exchange::BinanceClient;
use crate::local_book::{ApplyOutcome, LocalBook};

/// Initial backoff duration between reconnection attempts.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Maximum backoff duration between reconnection attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Why the reader loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisconnectReason {
    /// The connection was lost, errored, or delivered garbage.
    ConnectionError,
    /// An update did not continue the local book's sequence.
    OutOfSync,
}

/// How a session with a seeded book ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SessionEnd {
    reason: DisconnectReason,
    /// At least one update was applied on top of the snapshot.
    bridged: bool,
}

/// Returns how long to wait before reconnecting and the backoff to carry
/// into the next attempt.
///
/// Only a gap in a book that had bridged its snapshot resyncs without
/// waiting. A bridged session resets the backoff; anything else doubles
/// it up to [`MAX_BACKOFF`].
fn next_backoff(end: SessionEnd, backoff: Duration) -> (Option<Duration>, Duration) {
    let backoff = if end.bridged { INITIAL_BACKOFF } else { backoff };
    match end {
        SessionEnd {
            reason: DisconnectReason::OutOfSync,
            bridged: true,
        } => (None, backoff),
        _ => (Some(backoff), (backoff * 2).min(MAX_BACKOFF)),
    }
}

/// Failures before a book was seeded never count as bridged.
const NOT_SEEDED: SessionEnd = SessionEnd {
    reason: DisconnectReason::ConnectionError,
    bridged: false,
};

/// Keeps a [`SharedBook`] synchronized with the exchange.
pub struct DepthFeed {
    client: BinanceClient,
    url: String,
    symbol: String,
    depth_limit: u16,
    book: SharedBook,
}

impl DepthFeed {
    /// Creates a feed for `symbol` that writes into `book`.
    #[must_use]
    pub fn new(
        client: BinanceClient,
        websocket_url: &str,
        symbol: &str,
        depth_limit: u16,
        book: SharedBook,
    ) -> Self {
        Self {
            client,
            url: depth_stream_url(websocket_url, symbol),
            symbol: symbol.to_string(),
            depth_limit,
            book,
        }
    }

    /// Runs the feed loop indefinitely.
    ///
    /// The stream is subscribed before the snapshot is fetched so that
    /// updates published in between queue up on the socket and bridge the
    /// snapshot once reading starts.
    pub async fn run(self) {
        let mut backoff = INITIAL_BACKOFF;

        loop {
            info!(url = %self.url, "Connecting to depth stream");
            let end = match connect(&self.url).await {
                Ok((_write, read)) => match self.seed().await {
                    Ok(()) => self.session(read).await,
                    Err(e) => {
                        warn!(symbol = %self.symbol, error = %e, "Failed to seed local book");
                        NOT_SEEDED
                    }
                },
                Err(e) => {
                    error!(error = %e, "Connection failed");
                    NOT_SEEDED
                }
            };

            let (delay, next) = next_backoff(end, backoff);
            backoff = next;
            match delay {
                None => info!(symbol = %self.symbol, "Resyncing local book"),
                Some(delay) => {
                    info!(
                        backoff_secs = delay.as_secs(),
                        reason = ?end.reason,
                        "Backing off before reconnect"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Reads until the stream stops, then clears the shared book.
    async fn session<S>(&self, read: S) -> SessionEnd
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        let end = self.read_loop(read).await;

        // Readers must not see a book that stopped receiving updates
        *self.book.lock().await = None;
        end
    }

    /// Fetches a REST snapshot and installs it as the shared book.
    async fn seed(&self) -> crate::Result<()> {
        let depth = self
            .client
            .fetch_depth(&self.symbol, self.depth_limit)
            .await?;
        let local = LocalBook::from_depth(&depth)?;
        info!(
            symbol = %self.symbol,
            last_update_id = local.last_update_id(),
            "Local book seeded"
        );
        *self.book.lock().await = Some(local);

        Ok(())
    }

    /// Applies messages until the stream fails or falls out of sequence.
    async fn read_loop<S>(&self, mut read: S) -> SessionEnd
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        let mut bridged = false;

        let reason = loop {
            let Some(msg) = read.next().await else {
                warn!("Depth stream ended");
                break DisconnectReason::ConnectionError;
            };
            match msg {
                Ok(Message::Text(text)) => {
                    let mut guard = self.book.lock().await;
                    match handle_text(&text, &mut guard) {
                        Ok(ApplyOutcome::Applied) => bridged = true,
                        Ok(ApplyOutcome::Stale) => {}
                        Err(DepthwatchError::OutOfSync(reason)) => {
                            warn!(symbol = %self.symbol, %reason, "Depth stream out of sync");
                            break DisconnectReason::OutOfSync;
                        }
                        Err(e) => {
                            warn!(symbol = %self.symbol, error = %e, "Bad depth message");
                            break DisconnectReason::ConnectionError;
                        }
                    }
                }
                Ok(Message::Close(frame)) => {
                    info!(?frame, "Depth stream closed by server");
                    break DisconnectReason::ConnectionError;
                }
                Ok(_) => {} // Binary/Ping/Pong frames
                Err(e) => {
                    warn!(error = %e, "WebSocket error");
                    break DisconnectReason::ConnectionError;
                }
            }
        };

        SessionEnd { reason, bridged }
    }
}
