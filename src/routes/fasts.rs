use axum::{Router, routing::{get, post}, Json, extract::{State, Query}};
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ActiveFastSummary, FastSession};
use crate::scheduler::format_remaining;
use super::{read_error, write_error};

#[derive(Deserialize)]
pub struct UserQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct NewFast {
    pub user_id: Uuid,
    pub goal_hours: f64,
}

#[derive(Deserialize)]
pub struct EndFast {
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct FastCreated {
    pub id: Uuid,
}

#[derive(Serialize)]
pub struct FastEnded {
    pub id: Uuid,
    pub is_completed: bool,
}

pub fn routes(pool: PgPool) -> Router {
    Router::new()
        .route("/fast", post(start_fast))
        .route("/fast/active", get(get_active_fast))
        .route("/fast/end", post(end_fast))
        .with_state(pool)
}

async fn start_fast(
    State(pool): State<PgPool>,
    Json(body): Json<NewFast>,
) -> Result<(StatusCode, Json<FastCreated>), StatusCode> {
    if !(body.goal_hours > 0.0 && body.goal_hours <= 168.0) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let active: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM fasts WHERE user_id = $1 AND end_time IS NULL)",
    )
    .bind(body.user_id)
    .fetch_one(&pool)
    .await
    .map_err(read_error)?;

    if active {
        return Err(StatusCode::CONFLICT);
    }

    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO fasts (user_id, goal_hours) VALUES ($1, $2) RETURNING id",
    )
    .bind(body.user_id)
    .bind(body.goal_hours)
    .fetch_one(&pool)
    .await
    .map_err(write_error)?;

    tracing::info!(user_id = %body.user_id, fast_id = %id, "⏱️ Fast started");
    Ok((StatusCode::CREATED, Json(FastCreated { id })))
}

async fn get_active_fast(
    State(pool): State<PgPool>,
    Query(params): Query<UserQuery>,
) -> Result<Json<ActiveFastSummary>, StatusCode> {
    let Some(fast) = sqlx::query_as::<_, FastSession>(
        r#"
        SELECT id, user_id, start_time, end_time, goal_hours, is_completed,
               notified_80_percent, notified_complete
        FROM fasts
        WHERE user_id = $1 AND end_time IS NULL
        ORDER BY start_time DESC
        LIMIT 1
        "#,
    )
    .bind(params.user_id)
    .fetch_optional(&pool)
    .await
    .map_err(read_error)? else {
        return Err(StatusCode::NOT_FOUND);
    };

    let now = Utc::now();
    Ok(Json(ActiveFastSummary {
        id: fast.id,
        start_time: fast.start_time,
        goal_hours: fast.goal_hours,
        progress_pct: fast.progress_pct(now).unwrap_or(0.0),
        remaining: format_remaining(fast.remaining_hours(now)),
    }))
}

/// Close the user's open fast. A fast counts as completed when the goal
/// elapsed before it was ended.
async fn finish_active_fast(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<(Uuid, bool)>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE fasts
        SET end_time = now(),
            is_completed = now() - start_time >= goal_hours * interval '1 hour'
        WHERE user_id = $1 AND end_time IS NULL
        RETURNING id, is_completed
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

async fn end_fast(
    State(pool): State<PgPool>,
    Json(body): Json<EndFast>,
) -> Result<Json<FastEnded>, StatusCode> {
    let ended = finish_active_fast(&pool, body.user_id)
        .await
        .map_err(write_error)?;

    let Some((id, is_completed)) = ended else {
        return Err(StatusCode::NOT_FOUND);
    };

    tracing::info!(user_id = %body.user_id, fast_id = %id, is_completed, "🏁 Fast ended");
    Ok(Json(FastEnded { id, is_completed }))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fast_started_hours_ago(
        pool: &PgPool,
        user_id: Uuid,
        goal_hours: f64,
        hours_ago: i32,
    ) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO fasts (user_id, goal_hours, start_time) VALUES ($1, $2, now() - make_interval(hours => $3)) RETURNING id",
        )
        .bind(user_id)
        .bind(goal_hours)
        .bind(hours_ago)
        .fetch_one(pool)
        .await
        .expect("insert fast")
    }

    #[sqlx::test]
    async fn ending_after_the_goal_marks_completion(pool: PgPool) {
        let user_id = Uuid::new_v4();
        let id = fast_started_hours_ago(&pool, user_id, 8.0, 10).await;

        let ended = finish_active_fast(&pool, user_id).await.expect("end fast");

        assert_eq!(ended, Some((id, true)));
    }

    #[sqlx::test]
    async fn ending_early_leaves_the_fast_incomplete(pool: PgPool) {
        let user_id = Uuid::new_v4();
        let id = fast_started_hours_ago(&pool, user_id, 16.0, 10).await;

        let ended = finish_active_fast(&pool, user_id).await.expect("end fast");
        let again = finish_active_fast(&pool, user_id).await.expect("end fast");

        assert_eq!(ended, Some((id, false)));
        assert_eq!(again, None);
    }
}
