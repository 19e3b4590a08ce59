use axum::{routing::get, Router};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::EnvFilter;
use anyhow::Result;

mod config;
mod models;
mod preferences;
mod push;
mod routes;
mod scheduler;
mod store;
#[cfg(test)]
mod test_support;

use config::Config;
use push::{PushSender, WebPushSender};
use store::PgReminderStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!().run(&pool).await?;

    let sender: Option<Arc<dyn PushSender>> = match config.vapid.clone() {
        Some(vapid) => match WebPushSender::new(vapid) {
            Ok(sender) => Some(Arc::new(sender)),
            Err(e) => {
                tracing::error!("❌ Push client unavailable, reminders disabled: {}", e);
                None
            }
        },
        None => None,
    };

    let mut reminders = scheduler::start_if_configured(
        &config.scheduler,
        Arc::new(PgReminderStore::new(pool.clone())),
        sender,
        Arc::new(mockable::DefaultClock),
    );

    let public_key = config.vapid.as_ref().map(|vapid| vapid.public_key.clone());
    let app = Router::new()
        .merge(routes::fasts::routes(pool.clone()))
        .merge(routes::preferences::routes(pool.clone()))
        .merge(routes::push::routes(pool.clone(), public_key))
        .route("/health", get(|| async { "✅ Backend up" }));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🧠 Server running at {}", addr);

    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(scheduler) = reminders.as_mut() {
        scheduler.stop().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("👋 Shutting down");
}
