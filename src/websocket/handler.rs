//! Incoming WebSocket message processing.

use tracing::trace;

use crate::local_book::{ApplyOutcome, LocalBook};
use crate::models::book::DepthUpdateEvent;
use crate::{DepthwatchError, Result};

/// Parses a text frame as a depth update and applies it to `book`.
///
/// # Errors
///
/// Returns [`DepthwatchError::MalformedMessage`] if the frame is not a
/// depth update, [`DepthwatchError::OutOfSync`] if the book is not seeded
/// or the event breaks the update sequence, and
/// [`DepthwatchError::MalformedLevel`] if the event carries a bad level.
pub fn handle_text(text: &str, book: &mut Option<LocalBook>) -> Result<ApplyOutcome> {
    let event: DepthUpdateEvent = serde_json::from_str(text)
        .map_err(|e| DepthwatchError::MalformedMessage(e.to_string()))?;

    let local = book
        .as_mut()
        .ok_or_else(|| DepthwatchError::OutOfSync("local book is not seeded".to_string()))?;
    let outcome = local.apply(&event)?;

    trace!(
        symbol = %event.symbol,
        first_update_id = event.first_update_id,
        final_update_id = event.final_update_id,
        ?outcome,
        "Processed depth update"
    );
    Ok(outcome)
}
