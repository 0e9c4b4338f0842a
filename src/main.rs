use time::OffsetDateTime;

mod admin;
mod app;
mod auth;
mod config;
mod error;
mod payments;
mod replicate;
mod state;
mod storage;
mod subscriptions;
mod videos;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "veogen=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&app_state.db).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }

    // Generations still marked running from a previous process can never finish.
    let window = app_state.config.replicate.poll_window();
    let cutoff = time::Duration::try_from(window)
        .ok()
        .and_then(|w| OffsetDateTime::now_utc().checked_sub(w));
    match cutoff {
        Some(cutoff) => match videos::repo::fail_stale(&app_state.db, cutoff).await {
            Ok(0) => {}
            Ok(n) => tracing::warn!(count = n, "marked interrupted generations as failed"),
            Err(e) => tracing::warn!(error = %e, "stale generation sweep failed"),
        },
        None => tracing::warn!(?window, "poll window out of range; skipping stale sweep"),
    }

    app::serve(app::build_app(app_state)).await
}
