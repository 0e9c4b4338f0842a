use serde::Serialize;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::plans::{plan, PlanId, SubscriptionPlan};
use super::repo_types::{PaymentStatus, Subscription, SubscriptionStatus};
use crate::videos::params::Quality;

/// Why a user may not start a generation right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateBlock {
    MissingApiKey,
    QuotaExhausted,
    Expired,
}

impl GateBlock {
    pub fn message(self) -> &'static str {
        match self {
            Self::MissingApiKey => "VEO-3 API key is required",
            Self::QuotaExhausted => "Generation quota exhausted, upgrade your plan to continue",
            Self::Expired => "Subscription has expired",
        }
    }
}

pub fn generation_gate(
    sub: &Subscription,
    has_api_key: bool,
    now: OffsetDateTime,
) -> Result<(), GateBlock> {
    if !has_api_key {
        return Err(GateBlock::MissingApiKey);
    }
    if sub.generations_used >= sub.generations_limit {
        return Err(GateBlock::QuotaExhausted);
    }
    if sub.status == SubscriptionStatus::Expired || sub.end_date <= now {
        return Err(GateBlock::Expired);
    }
    Ok(())
}

/// Checks a request against what the user's plan allows.
pub fn check_plan_limits(
    plan: &SubscriptionPlan,
    duration: u32,
    quality: Quality,
) -> Result<(), String> {
    if duration > plan.max_video_secs {
        return Err(format!(
            "{} allows videos up to {} seconds",
            plan.name, plan.max_video_secs
        ));
    }
    if !plan.qualities.contains(&quality) {
        return Err(format!("{} does not include {} quality", plan.name, quality));
    }
    Ok(())
}

fn subscription_for(
    user_id: Uuid,
    plan_id: PlanId,
    payment_status: PaymentStatus,
    now: OffsetDateTime,
) -> Subscription {
    let p = plan(plan_id);
    Subscription {
        id: Uuid::new_v4(),
        user_id,
        plan: plan_id,
        status: SubscriptionStatus::Active,
        payment_status,
        start_date: now,
        end_date: now + Duration::days(p.duration_days),
        generations_used: 0,
        generations_limit: p.generations,
    }
}

/// Every new account starts on the free trial.
pub fn trial_subscription(user_id: Uuid, now: OffsetDateTime) -> Subscription {
    subscription_for(user_id, PlanId::Free, PaymentStatus::Confirmed, now)
}

/// State a subscription takes once a transfer for `plan_id` is verified.
pub fn activated_subscription(
    current: &Subscription,
    plan_id: PlanId,
    now: OffsetDateTime,
) -> Subscription {
    Subscription {
        id: current.id,
        ..subscription_for(current.user_id, plan_id, PaymentStatus::Confirmed, now)
    }
}
