//! Video generation and the caller's generation history.

pub mod dto;
pub mod handlers;
pub mod ledger;
pub mod params;
pub mod progress;
pub mod prompt;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router() -> axum::Router<crate::state::AppState> {
    handlers::routes()
}
