//! The inbound processing pipeline: normalize → extract → validate →
//! aggregate → notify.
//!
//! Everything short of a failed durable write resolves to "no actionable
//! event" — malformed JSON, non-donation chatter, and partial extractions
//! are all dropped silently, because the upstream bot resends nothing and
//! understands no semantic failure.  Note the flip side: the bot may also
//! deliver the same notice twice, and a resend double-counts.  That is the
//! known upstream gap, left visible rather than papered over.

use tracing::{debug, info};

use crate::notify::Notifier;
use crate::parse::{self, LabelPriority};
use crate::payload::InboundPayload;
use crate::store::AggregateStore;

/// Process one raw webhook body.  Returns whether a donation was logged;
/// the only error path is a failed persistence flush.
pub async fn handle_inbound_payload(
    store: &AggregateStore,
    notifier: &dyn Notifier,
    priority: LabelPriority,
    raw_body: &str,
) -> crate::errors::Result<bool> {
    let payload: InboundPayload = match serde_json::from_str(raw_body) {
        Ok(p) => p,
        Err(e) => {
            debug!("Ignored unparsable payload: {e}");
            return Ok(false);
        }
    };

    let text = payload.flatten();
    if text.is_empty() {
        debug!("Ignored payload with no text content");
        return Ok(false);
    }
    info!("Incoming webhook:\n{text}");

    let extracted = parse::extract(&text, priority);
    debug!("Extracted: {extracted:?}");

    let Some(event) = parse::validate(extracted) else {
        return Ok(false);
    };

    let totals = store
        .add_donation(&event.contributor_id, event.amount)
        .await?;
    info!(
        "Logged donation: {} added {} (week total {})",
        event.contributor_id, event.amount, totals.this_week
    );

    notifier.post_donation_summary(&event, &totals).await;
    Ok(true)
}

// ─────────────────────────────────────────────────────────
// End-to-end tests
// ─────────────────────────────────────────────────────────
