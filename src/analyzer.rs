//! Depth and dominance analysis over percentage bands.
//!
//! [`analyze`] partitions an order book snapshot into symmetric price bands
//! around a reference price and measures each band independently: resting
//! volume and notional per side, level counts, the heaviest bid (support)
//! and heaviest ask (resistance), and which side dominates by notional.
//! All arithmetic stays in [`Decimal`].

use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::book::{OrderBookSnapshot, PriceLevel};
use crate::{DepthwatchError, Result};

/// A price band expressed as `±fraction` around the reference price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandConfig {
    pub label: String,
    /// Half-width of the band, e.g. `0.02` for ±2%. Must be in `(0, 1]`.
    pub fraction: Decimal,
}

impl BandConfig {
    pub fn new(label: impl Into<String>, fraction: Decimal) -> Self {
        Self {
            label: label.into(),
            fraction,
        }
    }

    /// Creates a band labelled with its percentage, e.g. `±0.2%`.
    pub fn from_fraction(fraction: Decimal) -> Self {
        let pct = (fraction * Decimal::ONE_HUNDRED).normalize();
        Self::new(format!("±{pct}%"), fraction)
    }
}

/// Side holding more notional value inside a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DominantSide {
    Buy,
    Sell,
    Neutral,
}

impl fmt::Display for DominantSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Statistics for one band of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandStats {
    pub label: String,
    pub lower_bound: Decimal,
    pub upper_bound: Decimal,
    /// Sum of bid quantities in base units.
    pub bid_volume: Decimal,
    pub ask_volume: Decimal,
    /// Sum of `price * qty` over bids, in quote units.
    pub bid_notional: Decimal,
    pub ask_notional: Decimal,
    pub bid_level_count: usize,
    pub ask_level_count: usize,
    /// Bid level with the largest quantity; highest price wins ties.
    pub support: Option<PriceLevel>,
    /// Ask level with the largest quantity; lowest price wins ties.
    pub resistance: Option<PriceLevel>,
    pub dominant_side: DominantSide,
    /// Notional imbalance as a whole percentage in `[0, 100]`.
    pub dominance_pct: Decimal,
}

/// Analyzes `snapshot` for every band in `bands`, preserving band order.
///
/// Each band covers `[reference_price * (1 - f), reference_price * (1 + f)]`
/// inclusive, and both bids and asks inside that interval count toward it.
/// Empty sides yield zero volume, no support/resistance and, if both are
/// empty, a neutral band.
///
/// # Errors
///
/// Returns [`DepthwatchError::InvalidInput`] if `reference_price` is not
/// positive, `bands` is empty, or any band fraction lies outside `(0, 1]`.
/// Validation covers every band before any statistics are computed. The
/// same error is returned if a bound, notional or sum exceeds the range of
/// [`Decimal`].
pub fn analyze(
    snapshot: &OrderBookSnapshot,
    reference_price: Decimal,
    bands: &[BandConfig],
) -> Result<Vec<BandStats>> {
    if reference_price <= Decimal::ZERO {
        return Err(DepthwatchError::InvalidInput(format!(
            "reference price must be positive, got {reference_price}"
        )));
    }
    if bands.is_empty() {
        return Err(DepthwatchError::InvalidInput(
            "at least one band is required".to_string(),
        ));
    }
    if let Some(band) = bands
        .iter()
        .find(|band| band.fraction <= Decimal::ZERO || band.fraction > Decimal::ONE)
    {
        return Err(DepthwatchError::InvalidInput(format!(
            "band {} fraction must be in (0, 1], got {}",
            band.label, band.fraction
        )));
    }

    bands
        .iter()
        .map(|band| analyze_band(snapshot, reference_price, band))
        .collect()
}

fn analyze_band(
    snapshot: &OrderBookSnapshot,
    reference_price: Decimal,
    band: &BandConfig,
) -> Result<BandStats> {
    let lower_bound = reference_price
        .checked_mul(Decimal::ONE - band.fraction)
        .ok_or_else(|| overflow("lower bound", &band.label))?;
    let upper_bound = reference_price
        .checked_mul(Decimal::ONE + band.fraction)
        .ok_or_else(|| overflow("upper bound", &band.label))?;
    let in_band =
        |level: &&PriceLevel| lower_bound <= level.price() && level.price() <= upper_bound;

    let bids = SideTotals::collect(snapshot.bids.iter().filter(in_band))
        .ok_or_else(|| overflow("bid totals", &band.label))?;
    let asks = SideTotals::collect(snapshot.asks.iter().filter(in_band))
        .ok_or_else(|| overflow("ask totals", &band.label))?;

    let support = snapshot
        .bids
        .iter()
        .filter(in_band)
        .max_by(|a, b| a.qty().cmp(&b.qty()).then(a.price().cmp(&b.price())))
        .copied();
    let resistance = snapshot
        .asks
        .iter()
        .filter(in_band)
        .max_by(|a, b| a.qty().cmp(&b.qty()).then(b.price().cmp(&a.price())))
        .copied();

    let (dominant_side, dominance_pct) = dominance(bids.notional, asks.notional)
        .ok_or_else(|| overflow("total notional", &band.label))?;

    Ok(BandStats {
        label: band.label.clone(),
        lower_bound,
        upper_bound,
        bid_volume: bids.volume,
        ask_volume: asks.volume,
        bid_notional: bids.notional,
        ask_notional: asks.notional,
        bid_level_count: bids.count,
        ask_level_count: asks.count,
        support,
        resistance,
        dominant_side,
        dominance_pct,
    })
}

fn overflow(what: &str, band: &str) -> DepthwatchError {
    DepthwatchError::InvalidInput(format!("{what} of band {band} exceeds decimal range"))
}

/// Running totals for one side of a band.
#[derive(Default)]
struct SideTotals {
    volume: Decimal,
    notional: Decimal,
    count: usize,
}

impl SideTotals {
    /// Returns `None` if any notional or sum overflows.
    fn collect<'a>(mut levels: impl Iterator<Item = &'a PriceLevel>) -> Option<Self> {
        levels.try_fold(Self::default(), |acc, level| {
            Some(Self {
                volume: acc.volume.checked_add(level.qty())?,
                notional: acc.notional.checked_add(level.notional()?)?,
                count: acc.count + 1,
            })
        })
    }
}

/// Percentage imbalance between the two notionals, rounded half-to-even.
fn dominance(bid_notional: Decimal, ask_notional: Decimal) -> Option<(DominantSide, Decimal)> {
    let total = bid_notional.checked_add(ask_notional)?;
    if total.is_zero() {
        return Some((DominantSide::Neutral, Decimal::ZERO));
    }

    let pct = ((bid_notional - ask_notional).abs() / total * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
    let side = match bid_notional.cmp(&ask_notional) {
        std::cmp::Ordering::Greater => DominantSide::Buy,
        std::cmp::Ordering::Less => DominantSide::Sell,
        std::cmp::Ordering::Equal => DominantSide::Neutral,
    };

    Some((side, pct))
}

/// Overall direction implied by a set of bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketBias {
    Bullish,
    Bearish,
    Neutral,
}

/// Compares how many bands are buyer-dominated versus seller-dominated.
///
/// Neutral bands do not count toward either side.
pub fn summarize(stats: &[BandStats]) -> MarketBias {
    let buy = stats
        .iter()
        .filter(|s| s.dominant_side == DominantSide::Buy)
        .count();
    let sell = stats
        .iter()
        .filter(|s| s.dominant_side == DominantSide::Sell)
        .count();

    match buy.cmp(&sell) {
        std::cmp::Ordering::Greater => MarketBias::Bullish,
        std::cmp::Ordering::Less => MarketBias::Bearish,
        std::cmp::Ordering::Equal => MarketBias::Neutral,
    }
}
