use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::params::GenerationParams;
use super::repo;
use super::repo_types::GeneratedVideo;
use crate::auth::User;
use crate::subscriptions::{self, Subscription};

/// What a generation needs to know about its requester.
#[derive(Debug, Clone)]
pub struct Account {
    pub api_key: Option<String>,
    pub subscription: Subscription,
}

/// Persistence used by the generate flow: the quota slot and the video row.
#[async_trait]
pub trait GenerationLedger: Send + Sync {
    async fn account(&self, user_id: Uuid) -> anyhow::Result<Option<Account>>;
    /// Claims one generation; `false` when the quota is used up.
    async fn reserve_slot(&self, user_id: Uuid) -> anyhow::Result<bool>;
    async fn release_slot(&self, user_id: Uuid) -> anyhow::Result<()>;
    async fn insert_generating(
        &self,
        id: Uuid,
        user_id: Uuid,
        params: &GenerationParams,
    ) -> anyhow::Result<GeneratedVideo>;
    async fn set_source_image(&self, id: Uuid, key: &str) -> anyhow::Result<()>;
    async fn set_prediction_id(&self, id: Uuid, prediction_id: &str) -> anyhow::Result<()>;
    async fn mark_completed(&self, id: Uuid, url: &str) -> anyhow::Result<GeneratedVideo>;
    async fn mark_failed(&self, id: Uuid, error: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgLedger {
    db: PgPool,
}

impl PgLedger {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GenerationLedger for PgLedger {
    async fn account(&self, user_id: Uuid) -> anyhow::Result<Option<Account>> {
        let Some(user) = User::find_by_id(&self.db, user_id).await? else {
            return Ok(None);
        };
        let subscription = subscriptions::repo::find_by_user(&self.db, user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {} has no subscription", user_id))?;
        Ok(Some(Account {
            api_key: user.api_key().map(str::to_string),
            subscription,
        }))
    }

    async fn reserve_slot(&self, user_id: Uuid) -> anyhow::Result<bool> {
        subscriptions::repo::reserve_generation(&self.db, user_id).await
    }

    async fn release_slot(&self, user_id: Uuid) -> anyhow::Result<()> {
        subscriptions::repo::release_generation(&self.db, user_id).await
    }

    async fn insert_generating(
        &self,
        id: Uuid,
        user_id: Uuid,
        params: &GenerationParams,
    ) -> anyhow::Result<GeneratedVideo> {
        repo::insert_generating(&self.db, id, user_id, params).await
    }

    async fn set_source_image(&self, id: Uuid, key: &str) -> anyhow::Result<()> {
        repo::set_source_image(&self.db, id, key).await
    }

    async fn set_prediction_id(&self, id: Uuid, prediction_id: &str) -> anyhow::Result<()> {
        repo::set_prediction_id(&self.db, id, prediction_id).await
    }

    async fn mark_completed(&self, id: Uuid, url: &str) -> anyhow::Result<GeneratedVideo> {
        repo::mark_completed(&self.db, id, url).await
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> anyhow::Result<()> {
        repo::mark_failed(&self.db, id, error).await
    }
}
