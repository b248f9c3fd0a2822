//! Locally maintained order book fed by the diff-depth stream.
//!
//! The book is seeded from a REST snapshot and then advanced by
//! [`DepthUpdateEvent`]s using the exchange's sequencing rules:
//!
//! 1. Events whose final update id is at or below the snapshot's
//!    `lastUpdateId` are stale and dropped.
//! 2. The first applied event must straddle `lastUpdateId + 1`.
//! 3. Every later event must start exactly one past the previous event's
//!    final update id.
//!
//! Any violation leaves the book untouched and returns
//! [`DepthwatchError::OutOfSync`]; the caller resyncs from a new snapshot.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::models::book::{DepthSnapshot, DepthUpdateEvent, OrderBookSnapshot, PriceLevel};
use crate::{DepthwatchError, Result};

/// What [`LocalBook::apply`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The event predates the book's state and was ignored.
    Stale,
}

/// Price-indexed bid and ask levels with update-id tracking.
#[derive(Debug, Clone)]
pub struct LocalBook {
    bids: BTreeMap<Decimal, PriceLevel>,
    asks: BTreeMap<Decimal, PriceLevel>,
    last_update_id: u64,
    /// `true` once the first event after the snapshot has been applied.
    bridged: bool,
}

impl LocalBook {
    /// Seeds a book from a validated snapshot taken at `last_update_id`.
    pub fn from_snapshot(last_update_id: u64, snapshot: &OrderBookSnapshot) -> Self {
        let side = |levels: &[PriceLevel]| -> BTreeMap<Decimal, PriceLevel> {
            levels
                .iter()
                .filter(|level| !level.qty().is_zero())
                .map(|level| (level.price(), *level))
                .collect()
        };

        Self {
            bids: side(&snapshot.bids),
            asks: side(&snapshot.asks),
            last_update_id,
            bridged: false,
        }
    }

    /// Seeds a book from a raw REST depth response.
    ///
    /// # Errors
    ///
    /// Returns [`DepthwatchError::MalformedLevel`] if any level is malformed.
    pub fn from_depth(depth: &DepthSnapshot) -> Result<Self> {
        Ok(Self::from_snapshot(depth.last_update_id, &depth.to_snapshot()?))
    }

    pub fn last_update_id(&self) -> u64 {
        self.last_update_id
    }

    /// Applies one diff event.
    ///
    /// Levels with zero quantity are removed; others replace whatever rests
    /// at that price.
    ///
    /// # Errors
    ///
    /// Returns [`DepthwatchError::OutOfSync`] if the event does not continue
    /// the update sequence, or [`DepthwatchError::MalformedLevel`] if it
    /// carries a malformed level. The book is unchanged in both cases.
    pub fn apply(&mut self, event: &DepthUpdateEvent) -> Result<ApplyOutcome> {
        if event.final_update_id <= self.last_update_id {
            return Ok(ApplyOutcome::Stale);
        }

        let expected = self.last_update_id + 1;
        let continues = if self.bridged {
            event.first_update_id == expected
        } else {
            event.first_update_id <= expected
        };
        if !continues {
            return Err(DepthwatchError::OutOfSync(format!(
                "expected update {expected}, event covers {}..={}",
                event.first_update_id, event.final_update_id
            )));
        }

        let (bids, asks) = event.levels()?;
        apply_side(&mut self.bids, &bids);
        apply_side(&mut self.asks, &asks);
        self.last_update_id = event.final_update_id;
        self.bridged = true;

        Ok(ApplyOutcome::Applied)
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.values().next_back().copied()
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.values().next().copied()
    }

    /// Materializes the book with bids descending and asks ascending.
    pub fn snapshot(&self) -> OrderBookSnapshot {
        OrderBookSnapshot {
            bids: self.bids.values().rev().copied().collect(),
            asks: self.asks.values().copied().collect(),
        }
    }

    /// Best bid/ask midpoint, if both sides exist and are not crossed.
    pub fn mid_price(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price();
        let ask = self.best_ask()?.price();
        if bid >= ask {
            return None;
        }
        Some(bid.checked_add(ask)? / Decimal::TWO)
    }
}

fn apply_side(side: &mut BTreeMap<Decimal, PriceLevel>, changes: &[PriceLevel]) {
    for change in changes {
        if change.qty().is_zero() {
            side.remove(&change.price());
        } else {
            side.insert(change.price(), *change);
        }
    }
}
