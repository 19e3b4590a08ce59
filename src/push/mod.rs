//! Push delivery: the payload, the sender port and the per-user fan-out.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::models::PushSubscription;
use crate::store::{ReminderStore, StoreError};

mod vapid;

pub use vapid::{VapidConfig, WebPushSender};

/// Notification shown by the service worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
}

impl PushPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            tag: None,
            action_url: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The push service reported the endpoint as gone or invalid.
    Expired,
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("push payload could not be encoded: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("push delivery to {endpoint} failed: {message}")]
    Delivery { endpoint: String, message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<DeliveryOutcome, PushError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub expired: usize,
}

/// Sends a payload to every subscription a user has registered.
#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn ReminderStore>,
    sender: Arc<dyn PushSender>,
}

impl Notifier {
    pub fn new(store: Arc<dyn ReminderStore>, sender: Arc<dyn PushSender>) -> Self {
        Self { store, sender }
    }

    /// Deliver `payload` to all of the user's subscriptions.
    ///
    /// Expired subscriptions are removed. Every subscription is attempted;
    /// if any delivery fails for another reason the last such error is
    /// returned after the loop.
    pub async fn notify_user(
        &self,
        user_id: Uuid,
        payload: &PushPayload,
    ) -> Result<DeliveryReport, PushError> {
        let subscriptions = self.store.push_subscriptions(user_id).await?;
        let mut report = DeliveryReport::default();
        let mut failure = None;

        for subscription in &subscriptions {
            match self.sender.send(subscription, payload).await {
                Ok(DeliveryOutcome::Delivered) => report.delivered += 1,
                Ok(DeliveryOutcome::Expired) => {
                    report.expired += 1;
                    tracing::info!(
                        %user_id,
                        endpoint = %subscription.endpoint,
                        "🧹 Removing expired push subscription"
                    );
                    if let Err(e) = self
                        .store
                        .remove_push_subscription(&subscription.endpoint)
                        .await
                    {
                        tracing::warn!(%user_id, "⚠️ Failed to remove expired subscription: {}", e);
                    }
                }
                Err(e) => {
                    tracing::error!(
                        %user_id,
                        subscription_id = %subscription.id,
                        "❌ Push delivery failed: {}",
                        e
                    );
                    failure = Some(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}
