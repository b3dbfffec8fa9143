//! Fire-and-forget webhook notification on successful upload.
//!
//! Delivery runs over an unbuffered `tokio::sync::mpsc` channel drained by a
//! short-lived notifier task, rather than a raw spawned thread per
//! notification, so shutdown can drain in-flight notifications instead of
//! abandoning them mid-flight.

use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// One completed-upload fact to report to the downstream webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotification {
    pub arquivo: String,
    pub url: String,
    pub captured_at: DateTime<Utc>,
}

/// Consumes notifications from an unbuffered channel and POSTs them
/// form-encoded. Errors are logged and never retried or surfaced back to the
/// journal — the upload itself already succeeded (SPEC_FULL.md §7).
pub struct WebhookNotifier {
    webhook_url: String,
    http: Client,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            http: Client::builder()
                .timeout(WEBHOOK_TIMEOUT)
                .build()
                .expect("reqwest client builds with static config"),
        }
    }

    /// Spawn the notifier task, returning the sender side of its channel.
    /// The task exits once the sender is dropped, draining anything still
    /// queued. Tokio's `mpsc` has no true zero-capacity channel, so capacity
    /// 1 is the closest "unbuffered" approximation: a send blocks until the
    /// previous notification has been taken off the channel.
    pub fn spawn(self) -> mpsc::Sender<WebhookNotification> {
        let (tx, mut rx) = mpsc::channel::<WebhookNotification>(1);
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                self.deliver(notification).await;
            }
            info!("Webhook notifier channel closed, draining complete");
        });
        tx
    }

    async fn deliver(&self, notification: WebhookNotification) {
        let data_hora = notification.captured_at.format("%Y-%m-%d %H:%M:%S").to_string();
        let form = [
            ("arquivo", notification.arquivo.as_str()),
            ("url", notification.url.as_str()),
            ("data_hora", data_hora.as_str()),
        ];

        let result = self.http.post(&self.webhook_url).form(&form).send().await;

        match result {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
                info!("Webhook delivered for {}", notification.arquivo);
            }
            Ok(resp) => {
                warn!(
                    "Webhook returned non-200 status {} for {}",
                    resp.status(),
                    notification.arquivo
                );
            }
            Err(e) => {
                warn!("Webhook delivery failed for {}: {}", notification.arquivo, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_hora_format() {
        let ts: DateTime<Utc> = "2026-07-28T12:34:56Z".parse().unwrap();
        assert_eq!(ts.format("%Y-%m-%d %H:%M:%S").to_string(), "2026-07-28 12:34:56");
    }
}
