use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::subscriptions::PlanId;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ProofStatus {
    Pending,
    Verified,
    Rejected,
}

/// A submitted bank-transfer proof.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub plan_id: PlanId,
    pub amount: i64,
    pub transfer_amount: i64,
    #[serde(with = "iso_date")]
    pub transfer_date: Date,
    pub sender_name: String,
    pub selected_bank: String,
    #[serde(skip_serializing)]
    pub proof_key: String,
    pub status: ProofStatus,
    pub admin_notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub processed_at: Option<OffsetDateTime>,
}

impl Payment {
    pub fn amount_matches(&self) -> bool {
        self.transfer_amount >= self.amount
    }
}

/// Payment joined with its submitter, for the review queue.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentWithUser {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub payment: Payment,
    pub user_name: String,
    pub user_email: String,
}
