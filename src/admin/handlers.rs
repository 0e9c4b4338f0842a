use axum::{
    extract::{FromRef, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{services::verify_password, AdminUser, JwtKeys},
    error::ApiError,
    payments::{
        dto::{PaymentDetail, ReviewFilter, ReviewQueue, ReviewRequest, ReviewStats},
        repo,
        repo_types::Payment,
        services::{review_payment, Decision},
    },
    state::AppState,
    subscriptions::plan,
};

const PROOF_URL_TTL_SECS: u64 = 600;

#[derive(Deserialize)]
pub struct AdminLoginRequest {
    pub password: String,
}

#[derive(Serialize)]
pub struct AdminToken {
    pub token: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(login))
        .route("/admin/payments", get(review_queue))
        .route("/admin/payments/:id", get(payment_detail))
        .route("/admin/payments/:id/verify", post(verify_payment))
        .route("/admin/payments/:id/reject", post(reject_payment))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<AdminLoginRequest>,
) -> Result<Json<AdminToken>, ApiError> {
    let Some(hash) = state.config.admin.password_hash.as_deref() else {
        warn!("admin login attempted but ADMIN_PASSWORD_HASH is unset");
        return Err(ApiError::forbidden("Admin login is not configured"));
    };
    if !verify_password(&payload.password, hash)? {
        warn!("admin login failed");
        return Err(ApiError::unauthorized("Invalid admin password"));
    }
    let token = JwtKeys::from_ref(&state).sign_admin()?;
    info!("admin logged in");
    Ok(Json(AdminToken { token }))
}

#[instrument(skip(state, _admin))]
pub async fn review_queue(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<ReviewFilter>,
) -> Result<Json<ReviewQueue>, ApiError> {
    let counts = repo::count_by_status(&state.db).await?;
    let payments = repo::list_for_review(&state.db, filter.status).await?;
    Ok(Json(ReviewQueue {
        stats: ReviewStats::from_counts(&counts),
        payments,
    }))
}

#[instrument(skip(state, _admin))]
pub async fn payment_detail(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentDetail>, ApiError> {
    let payment = repo::find_with_user(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment not found"))?;
    let proof_url = state
        .storage
        .presign_get(&payment.payment.proof_key, PROOF_URL_TTL_SECS)
        .await?;
    Ok(Json(PaymentDetail {
        plan_name: plan(payment.payment.plan_id).name,
        amount_matches: payment.payment.amount_matches(),
        proof_url,
        payment,
    }))
}

#[instrument(skip(state, _admin, body))]
pub async fn verify_payment(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ReviewRequest>>,
) -> Result<Json<Payment>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    Ok(Json(
        review_payment(&state, id, Decision::Verify, body.notes()).await?,
    ))
}

#[instrument(skip(state, _admin, body))]
pub async fn reject_payment(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ReviewRequest>>,
) -> Result<Json<Payment>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    Ok(Json(
        review_payment(&state, id, Decision::Reject, body.notes()).await?,
    ))
}
