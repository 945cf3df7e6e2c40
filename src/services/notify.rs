use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::models::NotificationKind;

/// Errors that can occur when dispatching a notification.
///
/// Never propagated past the engine: delivery is best-effort and failures
/// are logged only.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("notification endpoint returned error: {0}")]
    ApiError(String),
}

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn notify(&self, nickname: &str, kind: NotificationKind) -> Result<(), NotifyError>;
}

/// Notification gateway posting to the platform's notification webhook.
pub struct WebhookNotifier {
    endpoint: String,
    api_key: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(endpoint: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            endpoint,
            api_key,
            client,
        }
    }
}

#[async_trait]
impl NotificationGateway for WebhookNotifier {
    async fn notify(&self, nickname: &str, kind: NotificationKind) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "nickname": nickname,
            "kind": kind,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Api-Key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::ApiError(format!(
                "notification dispatch failed: {}",
                response.status()
            )));
        }

        tracing::debug!("Dispatched {:?} notification to {}", kind, nickname);

        Ok(())
    }
}

/// Discards every notification. For embedders that handle notification
/// delivery elsewhere.
#[derive(Debug, Default)]
pub struct NullNotifier;

#[async_trait]
impl NotificationGateway for NullNotifier {
    async fn notify(&self, _nickname: &str, _kind: NotificationKind) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Records notifications instead of sending them. Test double.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(String, NotificationKind)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, NotificationKind)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationGateway for RecordingNotifier {
    async fn notify(&self, nickname: &str, kind: NotificationKind) -> Result<(), NotifyError> {
        self.events
            .lock()
            .unwrap()
            .push((nickname.to_string(), kind));
        Ok(())
    }
}
