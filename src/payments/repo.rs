use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{Payment, PaymentWithUser, ProofStatus};

const PAYMENT_COLUMNS: &str = "p.id, p.user_id, p.subscription_id, p.plan_id, p.amount, \
                               p.transfer_amount, p.transfer_date, p.sender_name, \
                               p.selected_bank, p.proof_key, p.status, p.admin_notes, \
                               p.submitted_at, p.processed_at";

pub async fn has_pending(db: &PgPool, user_id: Uuid) -> anyhow::Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM payments WHERE user_id = $1 AND status = $2)",
    )
    .bind(user_id)
    .bind(ProofStatus::Pending)
    .fetch_one(db)
    .await
    .context("check pending payment")?;
    Ok(exists)
}

pub async fn has_pending_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> anyhow::Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM payments WHERE user_id = $1 AND status = $2)",
    )
    .bind(user_id)
    .bind(ProofStatus::Pending)
    .fetch_one(&mut **tx)
    .await
    .context("check pending payment")?;
    Ok(exists)
}

pub async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    p: &Payment,
) -> anyhow::Result<Payment> {
    let row = sqlx::query_as::<_, Payment>(&format!(
        r#"
        INSERT INTO payments AS p
            (id, user_id, subscription_id, plan_id, amount, transfer_amount, transfer_date,
             sender_name, selected_bank, proof_key, status, submitted_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING {PAYMENT_COLUMNS}
        "#
    ))
    .bind(p.id)
    .bind(p.user_id)
    .bind(p.subscription_id)
    .bind(p.plan_id)
    .bind(p.amount)
    .bind(p.transfer_amount)
    .bind(p.transfer_date)
    .bind(&p.sender_name)
    .bind(&p.selected_bank)
    .bind(&p.proof_key)
    .bind(p.status)
    .bind(p.submitted_at)
    .fetch_one(&mut **tx)
    .await
    .context("insert payment")?;
    Ok(row)
}

pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Payment>> {
    let rows = sqlx::query_as::<_, Payment>(&format!(
        r#"
        SELECT {PAYMENT_COLUMNS}
          FROM payments p
         WHERE p.user_id = $1
         ORDER BY p.submitted_at DESC
        "#
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list payments by user")?;
    Ok(rows)
}

pub async fn list_for_review(
    db: &PgPool,
    status: Option<ProofStatus>,
) -> anyhow::Result<Vec<PaymentWithUser>> {
    let rows = sqlx::query_as::<_, PaymentWithUser>(&format!(
        r#"
        SELECT {PAYMENT_COLUMNS}, u.name AS user_name, u.email AS user_email
          FROM payments p
          JOIN users u ON u.id = p.user_id
         WHERE ($1::text IS NULL OR p.status = $1)
         ORDER BY p.submitted_at DESC
        "#
    ))
    .bind(status)
    .fetch_all(db)
    .await
    .context("list payments for review")?;
    Ok(rows)
}

pub async fn count_by_status(db: &PgPool) -> anyhow::Result<Vec<(ProofStatus, i64)>> {
    let rows = sqlx::query_as::<_, (ProofStatus, i64)>(
        "SELECT status, COUNT(*) FROM payments GROUP BY status",
    )
    .fetch_all(db)
    .await
    .context("count payments")?;
    Ok(rows)
}

pub async fn find_with_user(db: &PgPool, id: Uuid) -> anyhow::Result<Option<PaymentWithUser>> {
    let row = sqlx::query_as::<_, PaymentWithUser>(&format!(
        r#"
        SELECT {PAYMENT_COLUMNS}, u.name AS user_name, u.email AS user_email
          FROM payments p
          JOIN users u ON u.id = p.user_id
         WHERE p.id = $1
        "#
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .context("find payment")?;
    Ok(row)
}

pub async fn lock_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> anyhow::Result<Option<Payment>> {
    let row = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments p WHERE p.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
    .context("lock payment")?;
    Ok(row)
}

pub async fn set_review_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    status: ProofStatus,
    admin_notes: Option<&str>,
) -> anyhow::Result<Payment> {
    let row = sqlx::query_as::<_, Payment>(&format!(
        r#"
        UPDATE payments AS p
           SET status = $2, admin_notes = $3, processed_at = now()
         WHERE p.id = $1
        RETURNING {PAYMENT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(status)
    .bind(admin_notes)
    .fetch_one(&mut **tx)
    .await
    .context("review payment")?;
    Ok(row)
}
