use crate::store::{Alert, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gamecast_api::Game;
use log::{info, warn};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertPayload {
    pub alert_id: String,
    pub game_id: String,
    pub league: String,
    pub matchup: String,
    pub start_time: DateTime<Utc>,
    pub lead_minutes: u32,
    pub minutes_until_start: i64,
    pub message: String,
}

impl AlertPayload {
    pub fn new(alert: &Alert, game: &Game, now: DateTime<Utc>) -> Self {
        let minutes_until_start = (game.start_time - now).num_minutes().max(0);
        let matchup = game.matchup();
        Self {
            alert_id: alert.id.clone(),
            game_id: game.id.clone(),
            league: game.league.label().to_owned(),
            message: format!("{matchup} starts in {minutes_until_start} minute(s)"),
            matchup,
            start_time: game.start_time,
            lead_minutes: alert.lead_minutes,
            minutes_until_start,
        }
    }
}

/// `true` means the recipient has it. Failures are reported, not raised.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &User, payload: &AlertPayload) -> bool;
}

/// Used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &User, payload: &AlertPayload) -> bool {
        info!("alert {} for {}: {}", payload.alert_id, recipient.email, payload.message);
        true
    }
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    recipient: &'a str,
    user_id: &'a str,
    #[serde(flatten)]
    payload: &'a AlertPayload,
}

/// POSTs each alert as JSON; any 2xx counts as delivered.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .user_agent("gamecast/0.1 (alerts)")
                .build()
                .unwrap_or_default(),
            url: url.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, recipient: &User, payload: &AlertPayload) -> bool {
        let body = WebhookBody { recipient: &recipient.email, user_id: &recipient.id, payload };
        let result = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(_) => true,
            Err(e) => {
                warn!("webhook delivery of alert {} failed: {e}", payload.alert_id);
                false
            }
        }
    }
}

#[cfg(test)]
pub use recording::RecordingNotifier;


#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{at, game};
    use gamecast_api::League;

    fn payload() -> (User, AlertPayload) {
        let user = User { id: "u1".into(), email: "fan@example.com".into() };
        let alert = Alert::new("u1", "401", 15);
        let start = at(2026, 10, 16, 23, 30);
        let game = game("401", League::Basketball, start, "Boston Celtics", "New York Knicks");
        (user, AlertPayload::new(&alert, &game, at(2026, 10, 16, 23, 20)))
    }

    #[test]
    fn payload_counts_down_to_start() {
        let (_, payload) = payload();
        assert_eq!(payload.minutes_until_start, 10);
        assert_eq!(payload.league, "NBA");
        assert!(payload.message.ends_with("starts in 10 minute(s)"));
    }

    #[tokio::test]
    async fn webhook_posts_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hooks/alerts")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"recipient": "fan@example.com", "game_id": "401", "lead_minutes": 15}"#.into(),
            ))
            .with_status(204)
            .create_async()
            .await;

        let (user, payload) = payload();
        let notifier = WebhookNotifier::new(format!("{}/hooks/alerts", server.url()));
        assert!(notifier.send(&user, &payload).await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn webhook_error_status_is_a_failed_delivery() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/hooks/alerts").with_status(500).create_async().await;

        let (user, payload) = payload();
        let notifier = WebhookNotifier::new(format!("{}/hooks/alerts", server.url()));
        assert!(!notifier.send(&user, &payload).await);
    }
}
