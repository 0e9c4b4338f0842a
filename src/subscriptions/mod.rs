//! Plan catalog, per-user subscription state and the generation quota.

pub mod handlers;
pub mod plans;
pub mod repo;
mod repo_types;
pub mod services;

pub use plans::{plan, PlanId, SubscriptionPlan};
pub use repo_types::{PaymentStatus, Subscription, SubscriptionStatus};
pub use services::GateBlock;

pub fn router() -> axum::Router<crate::state::AppState> {
    handlers::routes()
}
