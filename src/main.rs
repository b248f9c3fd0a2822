use depthwatch::DepthwatchError;
use depthwatch::config::fetch_config;
use depthwatch::exchange::BinanceClient;
use depthwatch::monitor::Monitor;
use depthwatch::notify::{LogPublisher, TelegramPublisher};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), DepthwatchError> {
    // Initialize tracing subscriber for logging output.
    tracing_subscriber::fmt::init();

    let app_config = fetch_config()?;
    let client = BinanceClient::new(&app_config.binance.rest_url)?;

    info!(
        pair = %app_config.binance.pair,
        feed = ?app_config.monitor.feed,
        bands = app_config.monitor.bands.len(),
        "Starting depth monitor"
    );

    match &app_config.telegram {
        Some(telegram) => {
            let publisher = TelegramPublisher::new(telegram)?;
            Monitor::new(client, app_config.binance, app_config.monitor, publisher)
                .run()
                .await
        }
        None => {
            warn!("Telegram is not configured, reports will only be logged");
            Monitor::new(client, app_config.binance, app_config.monitor, LogPublisher)
                .run()
                .await
        }
    }
}
