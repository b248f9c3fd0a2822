//! Plain-text rendering of band statistics for publishing.

use std::fmt::Write;

use rust_decimal::Decimal;

use crate::analyzer::{BandStats, DominantSide, MarketBias, summarize};
use crate::config::TradingPair;
use crate::models::book::PriceLevel;

/// Renders a full report: header, one block per band, and a summary.
///
/// Prices, bounds and volumes are shown with two decimals; notional values
/// are rounded to whole quote units.
pub fn render_report(pair: &TradingPair, reference_price: Decimal, stats: &[BandStats]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "📊 {pair} order book");
    let _ = writeln!(out, "Price: {} {}", fixed(reference_price, 2), pair.quote);

    for band in stats {
        let _ = writeln!(out);
        render_band(&mut out, pair, band);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "🧭 Summary:");
    let _ = write!(out, "{}", bias_sentence(summarize(stats)));

    out
}

fn render_band(out: &mut String, pair: &TradingPair, band: &BandStats) {
    let _ = writeln!(out, "🔵 {}", band.label);
    let _ = writeln!(
        out,
        "📉 Resistance: {}",
        describe_level(band.resistance.as_ref(), pair)
    );
    let _ = writeln!(
        out,
        "📊 Support: {}",
        describe_level(band.support.as_ref(), pair)
    );
    let _ = writeln!(
        out,
        "📈 Range: {} - {}",
        fixed(band.lower_bound, 2),
        fixed(band.upper_bound, 2)
    );
    let _ = writeln!(
        out,
        "🟥 ask levels: {} | 🟩 bid levels: {}",
        band.ask_level_count, band.bid_level_count
    );
    let _ = writeln!(
        out,
        "💰 Volume: 🔻 {} {base} / {} {quote} | 🔺 {} {base} / {} {quote}",
        fixed(band.ask_volume, 2),
        fixed(band.ask_notional, 0),
        fixed(band.bid_volume, 2),
        fixed(band.bid_notional, 0),
        base = pair.base,
        quote = pair.quote,
    );
    let _ = writeln!(out, "{}", dominance_line(band));
}

fn describe_level(level: Option<&PriceLevel>, pair: &TradingPair) -> String {
    match level {
        Some(level) => format!(
            "{} {} ({} {})",
            fixed(level.price(), 2),
            pair.quote,
            fixed(level.qty(), 2),
            pair.base
        ),
        None => "-".to_string(),
    }
}

fn dominance_line(band: &BandStats) -> String {
    match band.dominant_side {
        DominantSide::Buy => format!("🟢 Buyers dominate by {}%", band.dominance_pct),
        DominantSide::Sell => format!("🔴 Sellers dominate by {}%", band.dominance_pct),
        DominantSide::Neutral => "⚪ Buyers and sellers are balanced".to_string(),
    }
}

/// One-sentence reading of the market bias.
pub fn bias_sentence(bias: MarketBias) -> &'static str {
    match bias {
        MarketBias::Bullish => {
            "Buy-side limit volume prevails in most bands, upside is possible."
        }
        MarketBias::Bearish => {
            "Sellers prevail at key levels, a pullback or decline is possible."
        }
        MarketBias::Neutral => "Buyers and sellers are balanced, the market is neutral.",
    }
}

/// Rounds half-to-even and pads to exactly `dp` decimals.
fn fixed(value: Decimal, dp: u32) -> String {
    format!("{:.*}", dp as usize, value.round_dp(dp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{BandConfig, analyze};
    use crate::models::book::OrderBookSnapshot;
    use rust_decimal_macros::dec;

    fn level(price: Decimal, qty: Decimal) -> PriceLevel {
        PriceLevel::new(price, qty).unwrap()
    }

    fn pair() -> TradingPair {
        TradingPair::new("BTC", "USDT")
    }

    fn book() -> OrderBookSnapshot {
        OrderBookSnapshot::new(
            vec![level(dec!(100), dec!(2)), level(dec!(99), dec!(5))],
            vec![level(dec!(101), dec!(3)), level(dec!(102), dec!(1))],
        )
    }

    #[test]
    fn renders_band_block() {
        let stats = analyze(&book(), dec!(100.5), &[BandConfig::from_fraction(dec!(0.02))]).unwrap();
        let report = render_report(&pair(), dec!(100.5), &stats);

        assert!(report.starts_with("📊 BTC/USDT order book\nPrice: 100.50 USDT\n"));
        assert!(report.contains("🔵 ±2%\n"));
        assert!(report.contains("📉 Resistance: 101.00 USDT (3.00 BTC)\n"));
        assert!(report.contains("📊 Support: 99.00 USDT (5.00 BTC)\n"));
        assert!(report.contains("📈 Range: 98.49 - 102.51\n"));
        assert!(report.contains("🟥 ask levels: 2 | 🟩 bid levels: 2\n"));
        assert!(report.contains("💰 Volume: 🔻 4.00 BTC / 405 USDT | 🔺 7.00 BTC / 695 USDT\n"));
        assert!(report.contains("🟢 Buyers dominate by 26%\n"));
        assert!(report.ends_with(bias_sentence(MarketBias::Bullish)));
    }

    #[test]
    fn missing_levels_render_as_dash() {
        let empty_asks = OrderBookSnapshot::new(book().bids, vec![]);
        let stats =
            analyze(&empty_asks, dec!(100.5), &[BandConfig::from_fraction(dec!(0.02))]).unwrap();
        let report = render_report(&pair(), dec!(100.5), &stats);

        assert!(report.contains("📉 Resistance: -\n"));
        assert!(report.contains("🟢 Buyers dominate by 100%\n"));
    }

    #[test]
    fn neutral_band_and_summary() {
        let stats = analyze(
            &OrderBookSnapshot::default(),
            dec!(100),
            &[BandConfig::from_fraction(dec!(0.01))],
        )
        .unwrap();
        let report = render_report(&pair(), dec!(100), &stats);

        assert!(report.contains("⚪ Buyers and sellers are balanced\n"));
        assert!(report.ends_with(bias_sentence(MarketBias::Neutral)));
    }

    #[test]
    fn bands_render_in_order() {
        let bands = [
            BandConfig::from_fraction(dec!(0.002)),
            BandConfig::from_fraction(dec!(0.1)),
        ];
        let stats = analyze(&book(), dec!(100.5), &bands).unwrap();
        let report = render_report(&pair(), dec!(100.5), &stats);

        let narrow = report.find("🔵 ±0.2%").unwrap();
        let wide = report.find("🔵 ±10%").unwrap();
        assert!(narrow < wide);
    }

    #[test]
    fn fixed_pads_and_rounds() {
        assert_eq!(fixed(dec!(98.49), 2), "98.49");
        assert_eq!(fixed(dec!(7), 2), "7.00");
        assert_eq!(fixed(dec!(695.5), 0), "696");
        assert_eq!(fixed(dec!(0.125), 2), "0.12");
    }
}
