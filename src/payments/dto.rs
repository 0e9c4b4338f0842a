use serde::{Deserialize, Serialize};
use time::{macros::format_description, Date};

use super::banks::find_bank;
use super::repo_types::{PaymentWithUser, ProofStatus};
use crate::storage::UploadedImage;
use crate::subscriptions::{plan, PlanId, SubscriptionPlan};

pub const MAX_PROOF_BYTES: usize = 5 * 1024 * 1024;

/// Raw multipart fields of a transfer submission.
#[derive(Debug, Default)]
pub struct PaymentForm {
    pub plan_id: Option<String>,
    pub selected_bank: Option<String>,
    pub transfer_amount: Option<String>,
    pub transfer_date: Option<String>,
    pub sender_name: Option<String>,
    pub proof: Option<UploadedImage>,
}

#[derive(Debug)]
pub struct ValidPayment {
    pub plan: &'static SubscriptionPlan,
    pub selected_bank: &'static str,
    pub transfer_amount: i64,
    pub transfer_date: Date,
    pub sender_name: String,
    pub proof: UploadedImage,
}

fn required<'a>(v: &'a Option<String>, what: &str) -> Result<&'a str, String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("{} is required", what))
}

/// Whole rupiah; a decimal part is rounded away.
pub fn parse_amount(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))
}

impl PaymentForm {
    pub fn validate(self) -> Result<ValidPayment, String> {
        let plan_id: PlanId = required(&self.plan_id, "plan_id")?.parse()?;
        let plan = plan(plan_id);
        if !plan.is_paid() {
            return Err(format!("{} cannot be purchased", plan.name));
        }
        let bank = find_bank(required(&self.selected_bank, "selected_bank")?)
            .ok_or_else(|| "selected_bank is not one of the listed accounts".to_string())?;
        let transfer_amount = parse_amount(required(&self.transfer_amount, "transfer_amount")?)
            .filter(|a| *a > 0)
            .ok_or_else(|| "transfer_amount must be a positive number".to_string())?;
        let transfer_date = Date::parse(
            required(&self.transfer_date, "transfer_date")?,
            format_description!("[year]-[month]-[day]"),
        )
        .map_err(|_| "transfer_date must be YYYY-MM-DD".to_string())?;
        let sender_name = required(&self.sender_name, "sender_name")?.to_string();
        let proof = self.proof.ok_or_else(|| "proof is required".to_string())?;

        Ok(ValidPayment {
            plan,
            selected_bank: bank.bank,
            transfer_amount,
            transfer_date,
            sender_name,
            proof,
        })
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ReviewStats {
    pub pending: i64,
    pub verified: i64,
    pub rejected: i64,
}

impl ReviewStats {
    pub fn from_counts(counts: &[(ProofStatus, i64)]) -> Self {
        let mut stats = Self::default();
        for (status, n) in counts {
            match status {
                ProofStatus::Pending => stats.pending += n,
                ProofStatus::Verified => stats.verified += n,
                ProofStatus::Rejected => stats.rejected += n,
            }
        }
        stats
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewQueue {
    pub stats: ReviewStats,
    pub payments: Vec<PaymentWithUser>,
}

#[derive(Debug, Serialize)]
pub struct PaymentDetail {
    #[serde(flatten)]
    pub payment: PaymentWithUser,
    pub plan_name: &'static str,
    pub amount_matches: bool,
    pub proof_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    #[serde(default)]
    pub admin_notes: Option<String>,
}

impl ReviewRequest {
    pub fn notes(&self) -> Option<&str> {
        self.admin_notes.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewFilter {
    #[serde(default)]
    pub status: Option<ProofStatus>,
}
