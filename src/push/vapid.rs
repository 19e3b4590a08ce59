use async_trait::async_trait;
use web_push::{
    ContentEncoding, IsahcWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushError, WebPushMessageBuilder, URL_SAFE_NO_PAD,
};

use super::{DeliveryOutcome, PushError, PushPayload, PushSender};
use crate::models::PushSubscription;

/// Seconds a push service may hold an undelivered reminder.
const MESSAGE_TTL_SECS: u32 = 60 * 60;

/// VAPID credentials identifying this server to push services.
#[derive(Clone)]
pub struct VapidConfig {
    pub public_key: String,
    pub private_key: String,
    /// Contact URI, `mailto:` or `https:`.
    pub subject: String,
}

impl std::fmt::Debug for VapidConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidConfig")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("subject", &self.subject)
            .finish()
    }
}

/// [`PushSender`] backed by the Web Push protocol.
pub struct WebPushSender {
    client: IsahcWebPushClient,
    vapid: VapidConfig,
}

impl WebPushSender {
    pub fn new(vapid: VapidConfig) -> Result<Self, PushError> {
        let client = IsahcWebPushClient::new().map_err(|e| PushError::Delivery {
            endpoint: String::new(),
            message: format!("could not build push client: {e}"),
        })?;
        Ok(Self { client, vapid })
    }

    fn delivery_error(subscription: &PushSubscription, error: WebPushError) -> PushError {
        PushError::Delivery {
            endpoint: subscription.endpoint.clone(),
            message: error.to_string(),
        }
    }
}

fn is_gone(error: &WebPushError) -> bool {
    matches!(
        error,
        WebPushError::EndpointNotValid { .. } | WebPushError::EndpointNotFound { .. }
    )
}

#[async_trait]
impl PushSender for WebPushSender {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<DeliveryOutcome, PushError> {
        let content = serde_json::to_vec(payload)?;
        let info = SubscriptionInfo::new(
            subscription.endpoint.clone(),
            subscription.p256dh.clone(),
            subscription.auth.clone(),
        );

        let mut signature =
            VapidSignatureBuilder::from_base64(&self.vapid.private_key, URL_SAFE_NO_PAD, &info)
                .map_err(|e| Self::delivery_error(subscription, e))?;
        signature.add_claim("sub", self.vapid.subject.as_str());
        let signature = signature
            .build()
            .map_err(|e| Self::delivery_error(subscription, e))?;

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, &content);
        builder.set_ttl(MESSAGE_TTL_SECS);
        builder.set_vapid_signature(signature);
        let message = builder
            .build()
            .map_err(|e| Self::delivery_error(subscription, e))?;

        match self.client.send(message).await {
            Ok(()) => Ok(DeliveryOutcome::Delivered),
            Err(e) if is_gone(&e) => Ok(DeliveryOutcome::Expired),
            Err(e) => Err(Self::delivery_error(subscription, e)),
        }
    }
}
