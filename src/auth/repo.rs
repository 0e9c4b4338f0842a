use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::subscriptions::{self, Subscription};

const USER_COLUMNS: &str = "id, email, name, password_hash, veo3_api_key, created_at";

/// Postgres `23505`, e.g. a concurrent registration with the same email.
fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user together with its free-trial subscription.
    /// Returns `None` when the email is already taken.
    pub async fn create_with_trial(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
        veo3_api_key: &str,
    ) -> anyhow::Result<Option<(User, Subscription)>> {
        let mut tx = db.begin().await.context("begin tx")?;
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, veo3_api_key)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(veo3_api_key)
        .fetch_one(&mut *tx)
        .await;
        let user = match user {
            Ok(user) => user,
            Err(e) if is_unique_violation(&e) => return Ok(None),
            Err(e) => return Err(anyhow::Error::new(e).context("insert user")),
        };

        let trial = subscriptions::services::trial_subscription(user.id, OffsetDateTime::now_utc());
        let sub = subscriptions::repo::insert_tx(&mut tx, &trial).await?;
        tx.commit().await.context("commit tx")?;
        Ok(Some((user, sub)))
    }

    pub async fn set_api_key(db: &PgPool, id: Uuid, api_key: &str) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE users SET veo3_api_key = $2 WHERE id = $1")
            .bind(id)
            .bind(api_key)
            .execute(db)
            .await
            .context("update api key")?;
        Ok(res.rows_affected() == 1)
    }
}
