//! Push-notification egress. Strictly fire-and-forget: delivery failures are
//! logged and never propagated to the request that triggered them.

use serde_json::json;
use tracing::{info, warn};

use crate::leaderboard::LeaderboardUpdate;

#[derive(Clone)]
pub struct Notifier {
    http: reqwest::Client,
    webhook: Option<String>,
}

impl Notifier {
    pub fn new(webhook: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook,
        }
    }

    /// Pushes a leaderboard update to the configured webhook, if any. Returns
    /// immediately; the send happens on a detached task.
    pub fn push_leaderboard(&self, update: &LeaderboardUpdate) {
        let Some(url) = self.webhook.clone() else {
            return;
        };
        let http = self.http.clone();
        let body = json!({
            "type": "leaderboard_update",
            "title": "EcoSage Leaderboard",
            "data": update,
        });

        tokio::spawn(async move {
            match http.post(&url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => warn!("Push notification rejected with status {}", resp.status()),
                Err(e) => warn!("Push notification delivery failed: {e}"),
            }
        });
    }

    /// Accepts a device push token. Tokens are currently only logged; pairing
    /// them with user records happens in the external notification service.
    pub fn register_token(&self, token: &str, user_email: &str) {
        let preview: String = token.chars().take(20).collect();
        info!("FCM token received for {user_email}: {preview}...");
    }
}
