use axum::{
    Router,
    routing::{get, post},
    extract::State,
    Json,
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::write_error;

#[derive(Clone)]
pub struct PushState {
    pool: PgPool,
    public_key: Option<String>,
}

/// Keys exactly as the browser's `PushSubscription.toJSON()` reports them.
#[derive(Debug, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub user_id: Uuid,
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

#[derive(Serialize)]
pub struct PublicKey {
    pub public_key: String,
}

pub fn routes(pool: PgPool, public_key: Option<String>) -> Router {
    Router::new()
        .route("/push/public-key", get(get_public_key))
        .route("/push/subscribe", post(subscribe).delete(unsubscribe))
        .with_state(PushState { pool, public_key })
}

async fn get_public_key(State(state): State<PushState>) -> Result<Json<PublicKey>, StatusCode> {
    state
        .public_key
        .map(|public_key| Json(PublicKey { public_key }))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn subscribe(
    State(state): State<PushState>,
    Json(body): Json<SubscribeRequest>,
) -> Result<StatusCode, StatusCode> {
    if !body.endpoint.starts_with("https://") {
        return Err(StatusCode::BAD_REQUEST);
    }

    sqlx::query(
        r#"
        INSERT INTO push_subscriptions (user_id, endpoint, p256dh, auth)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (endpoint) DO UPDATE
        SET user_id = EXCLUDED.user_id, p256dh = EXCLUDED.p256dh, auth = EXCLUDED.auth
        "#,
    )
    .bind(body.user_id)
    .bind(&body.endpoint)
    .bind(&body.keys.p256dh)
    .bind(&body.keys.auth)
    .execute(&state.pool)
    .await
    .map_err(write_error)?;

    tracing::info!(user_id = %body.user_id, "📬 Push subscription registered");
    Ok(StatusCode::CREATED)
}

async fn unsubscribe(
    State(state): State<PushState>,
    Json(payload): Json<UnsubscribeRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    let result = sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = $1")
        .bind(&payload.endpoint)
        .execute(&state.pool)
        .await;

    match result {
        Ok(r) if r.rows_affected() > 0 => Ok(StatusCode::NO_CONTENT),
        Ok(_) => Err((StatusCode::NOT_FOUND, "No subscription found".into())),
        Err(e) => {
            tracing::error!("❌ DB error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "DB error".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_request_accepts_browser_subscription_shape() {
        let body = serde_json::json!({
            "user_id": "6f1c2a1e-7c8f-4c55-9a55-0b6f1e7f2d10",
            "endpoint": "https://fcm.googleapis.com/fcm/send/abc",
            "expirationTime": null,
            "keys": { "p256dh": "BNc...", "auth": "tBH..." }
        });

        let request: SubscribeRequest = serde_json::from_value(body).expect("decode");

        assert_eq!(request.endpoint, "https://fcm.googleapis.com/fcm/send/abc");
        assert_eq!(request.keys.auth, "tBH...");
    }
}
