//! Outbound summary notifications.
//!
//! The tracker posts a summary embed to a Discord webhook after each
//! logged donation and a short message after each weekly rollover.  Both
//! are fire-and-forget: a failed or timed-out post is logged and dropped,
//! never retried, and never affects the already-committed aggregate state.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::errors::Result;
use crate::parse::DonationEvent;
use crate::store::ContributorAccount;

/// The messaging sink the core reports to.  A trait so tests can record
/// what would have been posted instead of hitting the network.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post_donation_summary(&self, event: &DonationEvent, totals: &ContributorAccount);
    async fn post_rollover_summary(&self);
}

/// Posts summaries to a Discord webhook URL.
///
/// When no webhook is configured (or the URL is not a Discord webhook),
/// posting is skipped with a warning — the tracker keeps aggregating
/// either way.
pub struct DiscordNotifier {
    client: Client,
    webhook_url: Option<String>,
}

const DISCORD_WEBHOOK_PREFIX: &str = "https://discord.com/api/webhooks/";
const EMBED_COLOR: u32 = 0x3498db;

impl DiscordNotifier {
    pub fn new(client: Client, webhook_url: Option<String>) -> Self {
        Self {
            client,
            webhook_url,
        }
    }

    fn target(&self) -> Option<&str> {
        match self.webhook_url.as_deref() {
            Some(url) if url.starts_with(DISCORD_WEBHOOK_PREFIX) => Some(url),
            Some(_) => {
                warn!("DISCORD_WEBHOOK is not a Discord webhook URL; skipping post");
                None
            }
            None => {
                warn!("DISCORD_WEBHOOK not set; skipping post");
                None
            }
        }
    }

    async fn post(&self, body: serde_json::Value) -> Result<()> {
        let Some(url) = self.target() else {
            return Ok(());
        };
        self.client
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn post_donation_summary(&self, event: &DonationEvent, totals: &ContributorAccount) {
        let embed = json!({
            "title": "📦 Material Donation Logged",
            "color": EMBED_COLOR,
            "fields": [
                { "name": "Clan", "value": event.clan.clone(), "inline": true },
                { "name": "User", "value": format!("<@{}>", event.contributor_id), "inline": true },
                { "name": "Donation", "value": event.amount.to_string(), "inline": true },
                { "name": "Total This Week", "value": totals.this_week.to_string(), "inline": true },
                { "name": "Previous Week", "value": totals.previous_week.to_string(), "inline": true },
            ],
            "footer": { "text": "Camp Tracker" },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        match self.post(json!({ "embeds": [embed] })).await {
            Ok(()) => info!("Sent donation summary for {}", event.contributor_id),
            Err(e) => warn!("Failed to send donation summary: {e}"),
        }
    }

    async fn post_rollover_summary(&self) {
        let body = json!({
            "content": "🟢 Weekly reset executed. Previous week totals are saved."
        });
        match self.post(body).await {
            Ok(()) => info!("Sent rollover summary"),
            Err(e) => warn!("Failed to send rollover summary: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier(url: Option<&str>) -> DiscordNotifier {
        DiscordNotifier::new(Client::new(), url.map(String::from))
    }

    #[test]
    fn target_accepts_only_discord_webhooks() {
        assert!(notifier(None).target().is_none());
        assert!(notifier(Some("https://example.com/hook")).target().is_none());
        assert!(notifier(Some("https://discord.com/api/webhooks/1/abc"))
            .target()
            .is_some());
    }

    #[tokio::test]
    async fn unconfigured_notifier_posts_nothing() {
        // No webhook configured: both posts are silent no-ops.
        let n = notifier(None);
        let event = DonationEvent {
            clan: "Alpha".to_string(),
            contributor_id: "123456789012345678".to_string(),
            amount: 1.25,
            item_id: None,
        };
        n.post_donation_summary(&event, &ContributorAccount::default())
            .await;
        n.post_rollover_summary().await;
    }
}
