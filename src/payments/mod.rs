//! Manual bank-transfer upgrades and their review.

pub mod banks;
pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router() -> axum::Router<crate::state::AppState> {
    handlers::routes()
}
