use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{PaymentStatus, Subscription, SubscriptionStatus};

const SUB_COLUMNS: &str = "id, user_id, plan, status, payment_status, start_date, end_date, \
                           generations_used, generations_limit";

pub async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    sub: &Subscription,
) -> anyhow::Result<Subscription> {
    let row = sqlx::query_as::<_, Subscription>(&format!(
        r#"
        INSERT INTO subscriptions
            (id, user_id, plan, status, payment_status, start_date, end_date,
             generations_used, generations_limit)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {SUB_COLUMNS}
        "#
    ))
    .bind(sub.id)
    .bind(sub.user_id)
    .bind(sub.plan)
    .bind(sub.status)
    .bind(sub.payment_status)
    .bind(sub.start_date)
    .bind(sub.end_date)
    .bind(sub.generations_used)
    .bind(sub.generations_limit)
    .fetch_one(&mut **tx)
    .await
    .context("insert subscription")?;
    Ok(row)
}

pub async fn find_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<Subscription>> {
    let row = sqlx::query_as::<_, Subscription>(&format!(
        "SELECT {SUB_COLUMNS} FROM subscriptions WHERE user_id = $1"
    ))
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("find subscription")?;
    Ok(row)
}

pub async fn find_by_user_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> anyhow::Result<Option<Subscription>> {
    let row = sqlx::query_as::<_, Subscription>(&format!(
        "SELECT {SUB_COLUMNS} FROM subscriptions WHERE user_id = $1 FOR UPDATE"
    ))
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
    .context("lock subscription")?;
    Ok(row)
}

/// Claim one generation slot. Returns `false` when the quota is already used
/// up; the conditional UPDATE makes concurrent claims for the last slot race
/// safely.
pub async fn reserve_generation(db: &PgPool, user_id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        UPDATE subscriptions
           SET generations_used = generations_used + 1, updated_at = now()
         WHERE user_id = $1 AND generations_used < generations_limit
        "#,
    )
    .bind(user_id)
    .execute(db)
    .await
    .context("reserve generation")?;
    Ok(res.rows_affected() == 1)
}

/// Give back a slot claimed by [`reserve_generation`] for a generation that failed.
pub async fn release_generation(db: &PgPool, user_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE subscriptions
           SET generations_used = GREATEST(generations_used - 1, 0), updated_at = now()
         WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .execute(db)
    .await
    .context("release generation")?;
    Ok(())
}

pub async fn set_billing_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    status: SubscriptionStatus,
    payment_status: PaymentStatus,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE subscriptions
           SET status = $2, payment_status = $3, updated_at = now()
         WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .bind(status)
    .bind(payment_status)
    .execute(&mut **tx)
    .await
    .context("update subscription billing")?;
    Ok(())
}

/// Overwrite plan, window and counters with `next`.
pub async fn replace_tx(
    tx: &mut Transaction<'_, Postgres>,
    next: &Subscription,
) -> anyhow::Result<Subscription> {
    let row = sqlx::query_as::<_, Subscription>(&format!(
        r#"
        UPDATE subscriptions
           SET plan = $2, status = $3, payment_status = $4, start_date = $5, end_date = $6,
               generations_used = $7, generations_limit = $8, updated_at = now()
         WHERE id = $1
        RETURNING {SUB_COLUMNS}
        "#
    ))
    .bind(next.id)
    .bind(next.plan)
    .bind(next.status)
    .bind(next.payment_status)
    .bind(next.start_date)
    .bind(next.end_date)
    .bind(next.generations_used)
    .bind(next.generations_limit)
    .fetch_one(&mut **tx)
    .await
    .context("replace subscription")?;
    Ok(row)
}
