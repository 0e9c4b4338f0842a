//! Operator endpoints: password login and the payment review queue.

pub mod handlers;

pub fn router() -> axum::Router<crate::state::AppState> {
    handlers::routes()
}
