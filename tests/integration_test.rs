//! Real API integration tests against Binance.
//!
//! These tests call the live Binance REST and WebSocket APIs and require network access.
//! Run with: `cargo test --features integration-tests`

#![cfg(feature = "integration-tests")]

use futures_util::StreamExt;
use rust_decimal::Decimal;

use depthwatch::analyzer::analyze;
use depthwatch::config::parse_bands;
use depthwatch::exchange::BinanceClient;
use depthwatch::models::DepthUpdateEvent;
use depthwatch::websocket::{connect, depth_stream_url};

const BINANCE_REST_URL: &str = "https://api.binance.com";
const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/ws";
const SYMBOL: &str = "BTCUSDT";

#[tokio::test]
async fn test_fetch_depth() {
    let client = BinanceClient::new(BINANCE_REST_URL).expect("Failed to build client");
    let depth = client.fetch_depth(SYMBOL, 100).await.expect("Failed to fetch depth");

    assert!(depth.last_update_id > 0);
    let snapshot = depth.to_snapshot().expect("Failed to ingest depth");
    assert!(!snapshot.bids.is_empty());
    assert!(!snapshot.asks.is_empty());
    assert!(snapshot.bids.len() <= 100);
}

#[tokio::test]
async fn test_fetch_price_and_analyze() {
    let client = BinanceClient::new(BINANCE_REST_URL).expect("Failed to build client");
    let (depth, price) = tokio::try_join!(
        client.fetch_depth(SYMBOL, 500),
        client.fetch_price(SYMBOL),
    )
    .expect("Failed to fetch market data");

    assert!(price > Decimal::ZERO);
    let bands = parse_bands("0.002,0.02,0.04,0.10").unwrap();
    let stats = analyze(&depth.to_snapshot().unwrap(), price, &bands).expect("Analysis failed");
    assert_eq!(stats.len(), 4);
}

#[tokio::test]
async fn test_unknown_symbol_fails() {
    let client = BinanceClient::new(BINANCE_REST_URL).expect("Failed to build client");
    assert!(client.fetch_price("NOTAREALPAIR").await.is_err());
}

#[tokio::test]
async fn test_receive_depth_update() {
    let url = depth_stream_url(BINANCE_WS_URL, SYMBOL);
    let (_write, mut read) = connect(&url).await.expect("Failed to connect");

    let timeout = tokio::time::timeout(tokio::time::Duration::from_secs(10), async {
        while let Some(msg) = read.next().await {
            if let Ok(tungstenite::Message::Text(text)) = msg {
                return serde_json::from_str::<DepthUpdateEvent>(&text).ok();
            }
        }
        None
    });

    let event = timeout
        .await
        .expect("Timeout waiting for depth update")
        .expect("Did not receive a depth update");
    assert_eq!(event.symbol, SYMBOL);
    assert!(event.first_update_id <= event.final_update_id);
}
