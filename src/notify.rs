//! Report delivery.
//!
//! [`Publisher`] is the seam between the monitor and wherever reports end
//! up. [`TelegramPublisher`] sends them through the Telegram Bot API and
//! owns retry/backoff on delivery failure; [`LogPublisher`] only logs them.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::config::TelegramConfig;
use crate::{DepthwatchError, Result};

/// Attempts per message before giving up.
const MAX_ATTEMPTS: u32 = 3;

/// Delay before the second attempt; later attempts wait proportionally longer.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

/// Telegram rejects messages longer than this many UTF-16 code units.
const MAX_MESSAGE_UNITS: usize = 4096;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Destination for rendered reports.
pub trait Publisher {
    /// Delivers one report.
    fn publish(&self, text: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Publisher that writes reports to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    async fn publish(&self, text: &str) -> Result<()> {
        info!(report = text, "Depth report");
        Ok(())
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Publisher that sends reports to a Telegram chat.
pub struct TelegramPublisher {
    client: Client,
    /// Full `sendMessage` URL; contains the bot token.
    endpoint: Zeroizing<String>,
    chat_id: String,
}

impl std::fmt::Debug for TelegramPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramPublisher")
            .field("endpoint", &"***")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl TelegramPublisher {
    /// Creates a publisher for the configured bot and chat.
    ///
    /// # Errors
    ///
    /// Returns [`DepthwatchError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            endpoint: Zeroizing::new(format!(
                "{}/bot{}/sendMessage",
                config.api_url.trim_end_matches('/'),
                config.bot_token.as_str()
            )),
            chat_id: config.chat_id.clone(),
        })
    }

    /// Sends one message chunk, without retrying.
    async fn send_once(&self, text: &str) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            disable_web_page_preview: true,
        };

        // reqwest errors carry the request URL, which embeds the bot token
        let response = self
            .client
            .post(self.endpoint.as_str())
            .json(&request)
            .send()
            .await
            .map_err(|e| DepthwatchError::Http(e.without_url()))?;
        let status = response.status();
        let body: SendMessageResponse = response
            .json()
            .await
            .map_err(|e| DepthwatchError::Http(e.without_url()))?;

        if !body.ok {
            return Err(DepthwatchError::Publish(format!(
                "telegram rejected message ({status}): {}",
                body.description.as_deref().unwrap_or("no description")
            )));
        }

        Ok(())
    }

    /// Sends one chunk, retrying with linear backoff.
    async fn send_with_retry(&self, text: &str) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.send_once(text).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    let delay = RETRY_BASE_DELAY * attempt;
                    warn!(
                        attempt,
                        error = %e,
                        delay_secs = delay.as_secs(),
                        "Telegram delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Publisher for TelegramPublisher {
    async fn publish(&self, text: &str) -> Result<()> {
        let chunks = split_message(text, MAX_MESSAGE_UNITS);
        for chunk in &chunks {
            self.send_with_retry(chunk).await?;
        }
        info!(chat_id = %self.chat_id, chunks = chunks.len(), "Report sent to Telegram");
        Ok(())
    }
}

/// Splits `text` into chunks of at most `max_units` UTF-16 code units,
/// breaking at line boundaries where possible.
pub fn split_message(text: &str, max_units: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_units = 0;

    for line in text.split_inclusive('\n') {
        let line_units = utf16_len(line);

        if current_units + line_units > max_units && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_units = 0;
        }

        if line_units <= max_units {
            current.push_str(line);
            current_units += line_units;
            continue;
        }

        // A single line longer than the limit is hard-split between chars
        for c in line.chars() {
            let units = c.len_utf16();
            if current_units + units > max_units && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_units = 0;
            }
            current.push(c);
            current_units += units;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}
