//! Application configuration loaded from environment variables.
//!
//! Telegram delivery is enabled by providing both of:
//! - `TELEGRAM_BOT_TOKEN`: Bot API token
//! - `TELEGRAM_USER_ID`: chat the report is sent to
//!
//! Without them reports are only logged. Every other variable is optional:
//! `TELEGRAM_API_URL`, `BINANCE_REST_URL`, `BINANCE_WEBSOCKET_URL`,
//! `DEPTHWATCH_BASE_ASSET`, `DEPTHWATCH_QUOTE_ASSET`,
//! `DEPTHWATCH_DEPTH_LIMIT`, `DEPTHWATCH_INTERVAL_SECS`, `DEPTHWATCH_FEED`
//! and `DEPTHWATCH_BANDS`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use zeroize::Zeroizing;

use crate::DepthwatchError;
use crate::analyzer::BandConfig;

/// Default Binance REST endpoint.
const DEFAULT_REST_URL: &str = "https://api.binance.com";

/// Default Binance raw-stream WebSocket endpoint.
const DEFAULT_WEBSOCKET_URL: &str = "wss://stream.binance.com:9443/ws";

/// Default Telegram Bot API endpoint.
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

const DEFAULT_BASE_ASSET: &str = "BTC";
const DEFAULT_QUOTE_ASSET: &str = "USDT";

/// Binance accepts at most 5000 levels per side on `/api/v3/depth`.
const DEFAULT_DEPTH_LIMIT: u16 = 1000;
const MAX_DEPTH_LIMIT: u16 = 5000;

const DEFAULT_INTERVAL_SECS: u64 = 60;

/// ±0.2%, ±2%, ±4% and ±10%.
const DEFAULT_BANDS: &str = "0.002,0.02,0.04,0.10";

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub binance: BinanceConfig,
    pub telegram: Option<TelegramConfig>,
    pub monitor: MonitorConfig,
}

/// Exchange endpoints and the traded pair.
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub rest_url: String,
    pub websocket_url: String,
    pub pair: TradingPair,
    pub depth_limit: u16,
}

/// Base and quote asset of the monitored market, e.g. `BTC`/`USDT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingPair {
    pub base: String,
    pub quote: String,
}

impl TradingPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }

    /// Exchange symbol, e.g. `BTCUSDT`.
    pub fn symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Telegram Bot API delivery settings.
pub struct TelegramConfig {
    pub api_url: String,
    pub bot_token: Zeroizing<String>,
    pub chat_id: String,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_url", &self.api_url)
            .field("bot_token", &"***")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

/// Where order book snapshots come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    /// Fetch a fresh REST snapshot every cycle.
    Rest,
    /// Maintain a local book from the diff-depth WebSocket stream.
    Stream,
}

impl FromStr for FeedSource {
    type Err = DepthwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rest" => Ok(Self::Rest),
            "stream" => Ok(Self::Stream),
            other => Err(DepthwatchError::Config(format!(
                "DEPTHWATCH_FEED must be \"rest\" or \"stream\", got {other:?}"
            ))),
        }
    }
}

/// Scheduling and analysis settings.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between analysis cycles. `None` runs a single cycle.
    pub interval: Option<Duration>,
    pub feed: FeedSource,
    /// Bands ordered narrowest to widest.
    pub bands: Vec<BandConfig>,
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`DepthwatchError::Config`](crate::DepthwatchError::Config) if
/// only one of the two Telegram variables is set, or if any optional
/// variable holds a value that cannot be parsed.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let bot_token = non_empty_var("TELEGRAM_BOT_TOKEN");
    let chat_id = non_empty_var("TELEGRAM_USER_ID");

    let telegram = match (bot_token, chat_id) {
        (Some(bot_token), Some(chat_id)) => Some(TelegramConfig {
            api_url: non_empty_var("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            bot_token: Zeroizing::new(bot_token),
            chat_id,
        }),
        (Some(_), None) => {
            return Err(DepthwatchError::Config(
                "TELEGRAM_BOT_TOKEN is set but TELEGRAM_USER_ID is missing".to_string(),
            ));
        }
        (None, Some(_)) => {
            return Err(DepthwatchError::Config(
                "TELEGRAM_USER_ID is set but TELEGRAM_BOT_TOKEN is missing".to_string(),
            ));
        }
        (None, None) => None,
    };

    let pair = TradingPair::new(
        non_empty_var("DEPTHWATCH_BASE_ASSET").unwrap_or_else(|| DEFAULT_BASE_ASSET.to_string()),
        non_empty_var("DEPTHWATCH_QUOTE_ASSET").unwrap_or_else(|| DEFAULT_QUOTE_ASSET.to_string()),
    );

    let depth_limit = match non_empty_var("DEPTHWATCH_DEPTH_LIMIT") {
        Some(raw) => parse_depth_limit(&raw)?,
        None => DEFAULT_DEPTH_LIMIT,
    };

    let interval_secs = match non_empty_var("DEPTHWATCH_INTERVAL_SECS") {
        Some(raw) => raw.parse::<u64>().map_err(|e| {
            DepthwatchError::Config(format!("invalid DEPTHWATCH_INTERVAL_SECS {raw:?}: {e}"))
        })?,
        None => DEFAULT_INTERVAL_SECS,
    };

    let feed = match non_empty_var("DEPTHWATCH_FEED") {
        Some(raw) => raw.parse()?,
        None => FeedSource::Rest,
    };

    let bands = parse_bands(
        &non_empty_var("DEPTHWATCH_BANDS").unwrap_or_else(|| DEFAULT_BANDS.to_string()),
    )?;

    Ok(AppConfig {
        binance: BinanceConfig {
            rest_url: non_empty_var("BINANCE_REST_URL")
                .unwrap_or_else(|| DEFAULT_REST_URL.to_string()),
            websocket_url: non_empty_var("BINANCE_WEBSOCKET_URL")
                .unwrap_or_else(|| DEFAULT_WEBSOCKET_URL.to_string()),
            pair,
            depth_limit,
        },
        telegram,
        monitor: MonitorConfig {
            interval: (interval_secs > 0).then(|| Duration::from_secs(interval_secs)),
            feed,
            bands,
        },
    })
}

fn parse_depth_limit(raw: &str) -> crate::Result<u16> {
    let limit = raw.parse::<u16>().map_err(|e| {
        DepthwatchError::Config(format!("invalid DEPTHWATCH_DEPTH_LIMIT {raw:?}: {e}"))
    })?;
    if limit == 0 || limit > MAX_DEPTH_LIMIT {
        return Err(DepthwatchError::Config(format!(
            "DEPTHWATCH_DEPTH_LIMIT must be between 1 and {MAX_DEPTH_LIMIT}, got {limit}"
        )));
    }
    Ok(limit)
}

/// Parses a comma-separated list of band fractions.
///
/// Fractions must lie in `(0, 1]` and be unique. The result is sorted
/// narrowest to widest and labelled with its percentage.
pub fn parse_bands(raw: &str) -> crate::Result<Vec<BandConfig>> {
    let mut fractions = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let fraction = Decimal::from_str(part).map_err(|e| {
            DepthwatchError::Config(format!("invalid band fraction {part:?}: {e}"))
        })?;
        if fraction <= Decimal::ZERO || fraction > Decimal::ONE {
            return Err(DepthwatchError::Config(format!(
                "band fraction must be in (0, 1], got {part}"
            )));
        }
        if fractions.contains(&fraction) {
            return Err(DepthwatchError::Config(format!(
                "duplicate band fraction {part}"
            )));
        }
        fractions.push(fraction);
    }

    if fractions.is_empty() {
        return Err(DepthwatchError::Config(
            "DEPTHWATCH_BANDS must list at least one fraction".to_string(),
        ));
    }

    fractions.sort();
    Ok(fractions.into_iter().map(BandConfig::from_fraction).collect())
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ALL_VARS: [&str; 11] = [
        "TELEGRAM_BOT_TOKEN",
        "TELEGRAM_USER_ID",
        "TELEGRAM_API_URL",
        "BINANCE_REST_URL",
        "BINANCE_WEBSOCKET_URL",
        "DEPTHWATCH_BASE_ASSET",
        "DEPTHWATCH_QUOTE_ASSET",
        "DEPTHWATCH_DEPTH_LIMIT",
        "DEPTHWATCH_INTERVAL_SECS",
        "DEPTHWATCH_FEED",
        "DEPTHWATCH_BANDS",
    ];

    /// Serializes tests that touch the process environment.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    /// Helper that clears every config variable, applies `vars`, runs `f`,
    /// then restores the originals.
    fn with_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let originals: Vec<(&str, Option<String>)> = ALL_VARS
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();

        // SAFETY: every test touching these variables holds ENV_LOCK.
        unsafe {
            for k in ALL_VARS {
                std::env::remove_var(k);
            }
            for (k, v) in vars {
                std::env::set_var(k, v);
            }
        }

        f();

        for (k, original) in originals {
            // SAFETY: restoring original values under the same lock.
            unsafe {
                match original {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn defaults_without_env_vars() {
        with_env(&[], || {
            let config = fetch_config().unwrap();
            assert_eq!(config.binance.rest_url, DEFAULT_REST_URL);
            assert_eq!(config.binance.websocket_url, DEFAULT_WEBSOCKET_URL);
            assert_eq!(config.binance.pair.symbol(), "BTCUSDT");
            assert_eq!(config.binance.depth_limit, 1000);
            assert!(config.telegram.is_none());
            assert_eq!(config.monitor.interval, Some(Duration::from_secs(60)));
            assert_eq!(config.monitor.feed, FeedSource::Rest);

            let labels: Vec<_> = config.monitor.bands.iter().map(|b| b.label.as_str()).collect();
            assert_eq!(labels, ["±0.2%", "±2%", "±4%", "±10%"]);
        });
    }

    #[test]
    fn loads_telegram_settings() {
        with_env(
            &[("TELEGRAM_BOT_TOKEN", "123:abc"), ("TELEGRAM_USER_ID", "42")],
            || {
                let config = fetch_config().unwrap();
                let telegram = config.telegram.unwrap();
                assert_eq!(telegram.bot_token.as_str(), "123:abc");
                assert_eq!(telegram.chat_id, "42");
                assert_eq!(telegram.api_url, DEFAULT_TELEGRAM_API_URL);
            },
        );
    }

    #[test]
    fn debug_output_hides_bot_token() {
        with_env(
            &[("TELEGRAM_BOT_TOKEN", "123:secret"), ("TELEGRAM_USER_ID", "42")],
            || {
                let config = fetch_config().unwrap();
                let debug = format!("{config:?}");
                assert!(!debug.contains("123:secret"));
                assert!(debug.contains("***"));
            },
        );
    }

    #[test]
    fn rejects_token_without_chat() {
        with_env(&[("TELEGRAM_BOT_TOKEN", "123:abc")], || {
            let err = fetch_config().unwrap_err();
            assert!(err.to_string().contains("TELEGRAM_USER_ID is missing"));
        });
    }

    #[test]
    fn rejects_chat_without_token() {
        with_env(&[("TELEGRAM_USER_ID", "42")], || {
            let err = fetch_config().unwrap_err();
            assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN is missing"));
        });
    }

    #[test]
    fn empty_values_treated_as_absent() {
        with_env(
            &[
                ("TELEGRAM_BOT_TOKEN", ""),
                ("TELEGRAM_USER_ID", ""),
                ("BINANCE_REST_URL", ""),
                ("DEPTHWATCH_BANDS", ""),
            ],
            || {
                let config = fetch_config().unwrap();
                assert!(config.telegram.is_none());
                assert_eq!(config.binance.rest_url, DEFAULT_REST_URL);
                assert_eq!(config.monitor.bands.len(), 4);
            },
        );
    }

    #[test]
    fn custom_pair_and_feed() {
        with_env(
            &[
                ("DEPTHWATCH_BASE_ASSET", "eth"),
                ("DEPTHWATCH_QUOTE_ASSET", "usdc"),
                ("DEPTHWATCH_FEED", "Stream"),
                ("DEPTHWATCH_DEPTH_LIMIT", "500"),
            ],
            || {
                let config = fetch_config().unwrap();
                assert_eq!(config.binance.pair.symbol(), "ETHUSDC");
                assert_eq!(config.binance.pair.to_string(), "ETH/USDC");
                assert_eq!(config.binance.depth_limit, 500);
                assert_eq!(config.monitor.feed, FeedSource::Stream);
            },
        );
    }

    #[test]
    fn zero_interval_means_single_run() {
        with_env(&[("DEPTHWATCH_INTERVAL_SECS", "0")], || {
            let config = fetch_config().unwrap();
            assert_eq!(config.monitor.interval, None);
        });
    }

    #[test]
    fn rejects_unknown_feed() {
        with_env(&[("DEPTHWATCH_FEED", "carrier-pigeon")], || {
            let err = fetch_config().unwrap_err();
            assert!(err.to_string().contains("DEPTHWATCH_FEED"));
        });
    }

    #[test]
    fn rejects_out_of_range_depth_limit() {
        with_env(&[("DEPTHWATCH_DEPTH_LIMIT", "0")], || {
            assert!(fetch_config().is_err());
        });
        with_env(&[("DEPTHWATCH_DEPTH_LIMIT", "6000")], || {
            assert!(fetch_config().is_err());
        });
    }

    #[test]
    fn bands_are_sorted_and_labelled() {
        let bands = parse_bands("0.1, 0.002 ,0.04").unwrap();
        let fractions: Vec<_> = bands.iter().map(|b| b.fraction).collect();
        assert_eq!(fractions, [dec!(0.002), dec!(0.04), dec!(0.1)]);
        assert_eq!(bands[0].label, "±0.2%");
        assert_eq!(bands[2].label, "±10%");
    }

    #[test]
    fn bands_reject_duplicates() {
        let err = parse_bands("0.02,0.020").unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn bands_reject_out_of_range() {
        assert!(parse_bands("0").is_err());
        assert!(parse_bands("1.5").is_err());
        assert!(parse_bands("-0.1").is_err());
        assert!(parse_bands("1").is_ok());
    }

    #[test]
    fn bands_reject_garbage() {
        assert!(parse_bands("two percent").is_err());
        assert!(parse_bands(" , ").is_err());
    }
}
