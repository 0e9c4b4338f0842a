use anyhow::Context;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::ValidPayment;
use super::repo;
use super::repo_types::{Payment, ProofStatus};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::payment_proof_key;
use crate::subscriptions::{
    self, services::activated_subscription, PaymentStatus, SubscriptionStatus,
};

const PENDING_EXISTS: &str = "A payment is already awaiting review";

/// Store the proof and queue the payment for review. The subscription moves to
/// `pending` until an admin decides.
pub async fn submit_payment(
    state: &AppState,
    user_id: Uuid,
    form: ValidPayment,
) -> Result<Payment, ApiError> {
    if repo::has_pending(&state.db, user_id).await? {
        return Err(ApiError::conflict(PENDING_EXISTS));
    }

    let payment_id = Uuid::new_v4();
    let proof_key = payment_proof_key(user_id, payment_id, form.proof.ext());
    state
        .storage
        .put_object(&proof_key, form.proof.body.clone(), &form.proof.content_type)
        .await
        .with_context(|| format!("put_object {}", proof_key))?;

    let stored = record_submission(state, user_id, payment_id, &proof_key, &form).await;
    if stored.is_err() {
        if let Err(e) = state.storage.delete_object(&proof_key).await {
            warn!(key = %proof_key, error = %e, "orphaned payment proof");
        }
    }
    let payment = stored?;
    info!(
        %user_id,
        payment_id = %payment.id,
        plan = ?payment.plan_id,
        amount = payment.transfer_amount,
        "payment submitted"
    );
    Ok(payment)
}

async fn record_submission(
    state: &AppState,
    user_id: Uuid,
    payment_id: Uuid,
    proof_key: &str,
    form: &ValidPayment,
) -> Result<Payment, ApiError> {
    let mut tx = state.db.begin().await.context("begin tx")?;
    let sub = subscriptions::repo::find_by_user_tx(&mut tx, user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {} has no subscription", user_id))?;
    if repo::has_pending_tx(&mut tx, user_id).await? {
        return Err(ApiError::conflict(PENDING_EXISTS));
    }

    let payment = repo::insert_tx(
        &mut tx,
        &Payment {
            id: payment_id,
            user_id,
            subscription_id: sub.id,
            plan_id: form.plan.id,
            amount: form.plan.price,
            transfer_amount: form.transfer_amount,
            transfer_date: form.transfer_date,
            sender_name: form.sender_name.clone(),
            selected_bank: form.selected_bank.to_string(),
            proof_key: proof_key.to_string(),
            status: ProofStatus::Pending,
            admin_notes: None,
            submitted_at: OffsetDateTime::now_utc(),
            processed_at: None,
        },
    )
    .await?;
    subscriptions::repo::set_billing_tx(
        &mut tx,
        user_id,
        SubscriptionStatus::Pending,
        PaymentStatus::Pending,
    )
    .await?;
    tx.commit().await.context("commit tx")?;
    Ok(payment)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Verify,
    Reject,
}

/// Settle a pending payment. Verification activates the purchased plan;
/// rejection leaves the current plan usable and flags the billing as failed.
pub async fn review_payment(
    state: &AppState,
    payment_id: Uuid,
    decision: Decision,
    admin_notes: Option<&str>,
) -> Result<Payment, ApiError> {
    let mut tx = state.db.begin().await.context("begin tx")?;
    let payment = repo::lock_tx(&mut tx, payment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment not found"))?;
    if payment.status != ProofStatus::Pending {
        return Err(ApiError::conflict(format!(
            "Payment was already {}",
            match payment.status {
                ProofStatus::Verified => "verified",
                _ => "rejected",
            }
        )));
    }

    let sub = subscriptions::repo::find_by_user_tx(&mut tx, payment.user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {} has no subscription", payment.user_id))?;

    let updated = match decision {
        Decision::Verify => {
            let updated =
                repo::set_review_tx(&mut tx, payment.id, ProofStatus::Verified, admin_notes).await?;
            let next = activated_subscription(&sub, payment.plan_id, OffsetDateTime::now_utc());
            subscriptions::repo::replace_tx(&mut tx, &next).await?;
            updated
        }
        Decision::Reject => {
            let updated =
                repo::set_review_tx(&mut tx, payment.id, ProofStatus::Rejected, admin_notes).await?;
            subscriptions::repo::set_billing_tx(
                &mut tx,
                payment.user_id,
                SubscriptionStatus::Active,
                PaymentStatus::Failed,
            )
            .await?;
            updated
        }
    };
    tx.commit().await.context("commit tx")?;

    info!(
        payment_id = %updated.id,
        user_id = %updated.user_id,
        decision = ?decision,
        plan = ?updated.plan_id,
        "payment reviewed"
    );
    Ok(updated)
}
