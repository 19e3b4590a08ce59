use axum::http::StatusCode;

pub mod fasts;
pub mod preferences;
pub mod push;

/// Log a failed write the way every handler does and pick a status for it.
pub(crate) fn write_error(e: sqlx::Error) -> StatusCode {
    if let Some(db_err) = e.as_database_error() {
        tracing::error!("❌ DB write failed: {}", db_err.message());

        if let Some(code) = db_err.code() {
            tracing::info!("ℹ️ SQLSTATE code: {}", code);
        }

        if let Some(constraint) = db_err.constraint() {
            tracing::info!("🔒 Constraint violated: {}", constraint);
        }
    } else {
        tracing::error!("❌ Unknown DB error: {}", e);
    }

    StatusCode::UNPROCESSABLE_ENTITY
}

pub(crate) fn read_error(e: sqlx::Error) -> StatusCode {
    tracing::error!("❌ DB error: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}
