use axum::{
    Router,
    routing::get,
    extract::{State, Query},
    Json,
    http::StatusCode,
};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::preferences::NotificationPreferences;
use super::{read_error, write_error};

#[derive(Deserialize)]
struct UserQuery {
    user_id: Uuid,
}

#[derive(Deserialize)]
pub struct UpdatePreferences {
    pub user_id: Uuid,
    pub preferences: NotificationPreferences,
}

pub fn routes(pool: PgPool) -> Router {
    Router::new()
        .route(
            "/notification-preferences",
            get(get_preferences).put(put_preferences),
        )
        .with_state(pool)
}

async fn get_preferences(
    State(pool): State<PgPool>,
    Query(query): Query<UserQuery>,
) -> Result<Json<NotificationPreferences>, StatusCode> {
    let settings: Option<serde_json::Value> = sqlx::query_scalar(
        "SELECT settings FROM notification_preferences WHERE user_id = $1",
    )
    .bind(query.user_id)
    .fetch_optional(&pool)
    .await
    .map_err(read_error)?;

    let Some(settings) = settings else {
        return Ok(Json(NotificationPreferences::default()));
    };

    let preferences = serde_json::from_value(settings).map_err(|e| {
        tracing::error!(user_id = %query.user_id, "❌ Stored preferences are invalid: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(preferences))
}

/// The body is validated by deserializing into [`NotificationPreferences`];
/// malformed clock times or unknown keys are rejected before touching the
/// database.
async fn put_preferences(
    State(pool): State<PgPool>,
    Json(body): Json<UpdatePreferences>,
) -> Result<StatusCode, StatusCode> {
    let settings = serde_json::to_value(&body.preferences).map_err(|e| {
        tracing::error!("❌ Failed to encode preferences: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    sqlx::query(
        r#"
        INSERT INTO notification_preferences (user_id, settings)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE SET settings = EXCLUDED.settings, updated_at = now()
        "#,
    )
    .bind(body.user_id)
    .bind(settings)
    .execute(&pool)
    .await
    .map_err(write_error)?;

    Ok(StatusCode::NO_CONTENT)
}
