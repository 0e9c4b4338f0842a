use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::videos::params::Quality;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum PlanId {
    Free,
    Basic,
    Premium,
}

impl FromStr for PlanId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "basic" => Ok(Self::Basic),
            "premium" => Ok(Self::Premium),
            other => Err(format!("unknown plan '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubscriptionPlan {
    pub id: PlanId,
    pub name: &'static str,
    /// Whole IDR.
    pub price: i64,
    pub currency: &'static str,
    pub generations: i32,
    pub duration_days: i64,
    pub max_video_secs: u32,
    pub qualities: &'static [Quality],
    pub features: &'static [&'static str],
}

impl SubscriptionPlan {
    pub fn is_paid(&self) -> bool {
        self.price > 0
    }
}

pub static PLANS: [SubscriptionPlan; 3] = [
    SubscriptionPlan {
        id: PlanId::Free,
        name: "Free Trial",
        price: 0,
        currency: "IDR",
        generations: 3,
        duration_days: 7,
        max_video_secs: 5,
        qualities: &[Quality::Hd],
        features: &[
            "3 video generations",
            "HD quality only",
            "Max 5 seconds duration",
            "Basic support",
        ],
    },
    SubscriptionPlan {
        id: PlanId::Basic,
        name: "Basic Plan",
        price: 99_000,
        currency: "IDR",
        generations: 50,
        duration_days: 30,
        max_video_secs: 10,
        qualities: &[Quality::Hd, Quality::Uhd4k],
        features: &[
            "50 video generations",
            "HD & 4K quality",
            "Up to 10 seconds duration",
            "Priority support",
            "Download without watermark",
        ],
    },
    SubscriptionPlan {
        id: PlanId::Premium,
        name: "Premium Plan",
        price: 299_000,
        currency: "IDR",
        generations: 200,
        duration_days: 30,
        max_video_secs: 10,
        qualities: &[Quality::Hd, Quality::Uhd4k],
        features: &[
            "200 video generations",
            "HD & 4K quality",
            "Up to 10 seconds duration",
            "Priority support",
            "Download without watermark",
            "Early access to new features",
            "API access",
        ],
    },
];

pub fn plan(id: PlanId) -> &'static SubscriptionPlan {
    match id {
        PlanId::Free => &PLANS[0],
        PlanId::Basic => &PLANS[1],
        PlanId::Premium => &PLANS[2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_matches_catalog_order() {
        for p in PLANS.iter() {
            assert_eq!(plan(p.id).id, p.id);
        }
        assert!(!plan(PlanId::Free).is_paid());
        assert!(plan(PlanId::Basic).is_paid());
        assert_eq!(plan(PlanId::Premium).generations, 200);
    }

    #[test]
    fn parses_plan_ids() {
        assert_eq!("Premium".parse::<PlanId>(), Ok(PlanId::Premium));
        assert!("gold".parse::<PlanId>().is_err());
    }

    #[test]
    fn catalog_serializes_qualities_as_labels() {
        let v = serde_json::to_value(plan(PlanId::Basic)).unwrap();
        assert_eq!(v["id"], "basic");
        assert_eq!(v["qualities"], serde_json::json!(["HD", "4K"]));
    }
}
