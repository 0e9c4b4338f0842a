use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use super::banks::{BankAccount, BANK_ACCOUNTS};
use super::dto::{PaymentForm, MAX_PROOF_BYTES};
use super::repo;
use super::repo_types::Payment;
use super::services::submit_payment;
use crate::{auth::AuthUser, error::ApiError, state::AppState, storage::UploadedImage};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments/bank-accounts", get(bank_accounts))
        .route(
            "/payments",
            post(create_payment).layer(DefaultBodyLimit::max(MAX_PROOF_BYTES + 64 * 1024)),
        )
        .route("/me/payments", get(my_payments))
}

pub async fn bank_accounts() -> Json<&'static [BankAccount]> {
    Json(&BANK_ACCOUNTS[..])
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::bad_request(format!("invalid multipart body: {}", e))
}

async fn read_form(mut mp: Multipart) -> Result<PaymentForm, ApiError> {
    let mut form = PaymentForm::default();
    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "proof" {
            let content_type = field.content_type().unwrap_or_default().to_string();
            let body = field.bytes().await.map_err(bad_multipart)?;
            if !content_type.starts_with("image/") {
                return Err(ApiError::bad_request("Please select a valid image file"));
            }
            if body.len() > MAX_PROOF_BYTES {
                return Err(ApiError::PayloadTooLarge(
                    "File size must be less than 5MB".into(),
                ));
            }
            if !body.is_empty() {
                form.proof = Some(UploadedImage { body, content_type });
            }
            continue;
        }
        let value = field.text().await.map_err(bad_multipart)?;
        match name.as_str() {
            "plan_id" => form.plan_id = Some(value),
            "selected_bank" => form.selected_bank = Some(value),
            "transfer_amount" => form.transfer_amount = Some(value),
            "transfer_date" => form.transfer_date = Some(value),
            "sender_name" => form.sender_name = Some(value),
            _ => {}
        }
    }
    Ok(form)
}

#[instrument(skip(state, mp))]
pub async fn create_payment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Multipart,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    let valid = read_form(mp).await?.validate().map_err(|reason| {
        warn!(%user_id, %reason, "payment rejected");
        ApiError::BadRequest(reason)
    })?;
    let payment = submit_payment(&state, user_id, valid).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

#[instrument(skip(state))]
pub async fn my_payments(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Payment>>, ApiError> {
    Ok(Json(repo::list_by_user(&state.db, user_id).await?))
}
