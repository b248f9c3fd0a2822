//! Polling and streaming host loops.
//!
//! Each cycle obtains a snapshot and reference price, runs the analyzer,
//! renders the report and hands it to the [`Publisher`]. A failed cycle is
//! logged and skipped; only a one-shot run returns its error.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::analyzer::{analyze, summarize};
use crate::config::{BinanceConfig, FeedSource, MonitorConfig};
use crate::exchange::BinanceClient;
use crate::models::book::OrderBookSnapshot;
use crate::notify::Publisher;
use crate::report::render_report;
use crate::websocket::{DepthFeed, SharedBook};
use crate::{DepthwatchError, Result};

/// How often a one-shot streaming run checks whether the book is ready.
const STREAM_READY_POLL: Duration = Duration::from_secs(1);

/// Drives analysis cycles and publishes their reports.
pub struct Monitor<P> {
    client: BinanceClient,
    binance: BinanceConfig,
    config: MonitorConfig,
    publisher: P,
}

impl<P: Publisher> Monitor<P> {
    pub fn new(
        client: BinanceClient,
        binance: BinanceConfig,
        config: MonitorConfig,
        publisher: P,
    ) -> Self {
        Self {
            client,
            binance,
            config,
            publisher,
        }
    }

    /// Runs until Ctrl-C, or for a single successful cycle when no interval
    /// is configured.
    ///
    /// # Errors
    ///
    /// Only a one-shot REST run returns an error, namely that of its cycle.
    /// Repeating runs log failed cycles and continue.
    pub async fn run(&self) -> Result<()> {
        match self.config.feed {
            FeedSource::Rest => self.run_polling().await,
            FeedSource::Stream => self.run_streaming().await,
        }
    }

    async fn run_polling(&self) -> Result<()> {
        let Some(period) = self.config.interval else {
            return self.poll_cycle().await.map(|_| ());
        };

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_cycle().await {
                        warn!(error = %e, "Skipping publish cycle");
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutting down");
                    return Ok(());
                }
            }
        }
    }

    async fn run_streaming(&self) -> Result<()> {
        let book: SharedBook = Arc::new(Mutex::new(None));
        let feed = DepthFeed::new(
            self.client.clone(),
            &self.binance.websocket_url,
            &self.binance.pair.symbol(),
            self.binance.depth_limit,
            book.clone(),
        );
        let feed_task = tokio::spawn(feed.run());

        let one_shot = self.config.interval.is_none();
        let mut ticker = tokio::time::interval(self.config.interval.unwrap_or(STREAM_READY_POLL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.stream_cycle(&book).await {
                        Ok(_) if one_shot => break,
                        Ok(_) => {}
                        Err(e) if one_shot => debug!(error = %e, "Waiting for local book"),
                        Err(e) => warn!(error = %e, "Skipping publish cycle"),
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutting down");
                    break;
                }
            }
        }

        feed_task.abort();
        Ok(())
    }

    /// Fetches a REST snapshot and last price, then analyzes and publishes.
    ///
    /// # Errors
    ///
    /// Returns the first error from fetching, ingestion, analysis or
    /// publishing.
    pub async fn poll_cycle(&self) -> Result<String> {
        let symbol = self.binance.pair.symbol();
        let (depth, price) = tokio::try_join!(
            self.client.fetch_depth(&symbol, self.binance.depth_limit),
            self.client.fetch_price(&symbol),
        )?;
        let snapshot = depth.to_snapshot()?;

        self.publish_analysis(&snapshot, price).await
    }

    /// Analyzes the shared local book at its mid price and publishes.
    ///
    /// # Errors
    ///
    /// Returns [`DepthwatchError::OutOfSync`] if the book is not
    /// synchronized, [`DepthwatchError::InvalidInput`] if it has no valid
    /// mid price, or the first analysis or publishing error.
    pub async fn stream_cycle(&self, book: &SharedBook) -> Result<String> {
        let (snapshot, mid) = {
            let guard = book.lock().await;
            let local = guard.as_ref().ok_or_else(|| {
                DepthwatchError::OutOfSync("local book is not synchronized yet".to_string())
            })?;
            let mid = local.mid_price().ok_or_else(|| {
                DepthwatchError::InvalidInput("local book has no valid mid price".to_string())
            })?;
            (local.snapshot(), mid)
        };

        self.publish_analysis(&snapshot, mid).await
    }

    /// Runs the analyzer over `snapshot`, renders the report and publishes it.
    ///
    /// Returns the published report.
    ///
    /// # Errors
    ///
    /// Returns [`DepthwatchError::InvalidInput`] from the analyzer or any
    /// publishing error.
    pub async fn publish_analysis(
        &self,
        snapshot: &OrderBookSnapshot,
        reference_price: Decimal,
    ) -> Result<String> {
        let stats = analyze(snapshot, reference_price, &self.config.bands)?;
        let report = render_report(&self.binance.pair, reference_price, &stats);

        self.publisher.publish(&report).await?;
        info!(
            pair = %self.binance.pair,
            reference_price = %reference_price,
            bands = stats.len(),
            bias = ?summarize(&stats),
            "Published depth report"
        );

        Ok(report)
    }
}
