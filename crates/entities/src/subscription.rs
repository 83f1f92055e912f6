//! Subscription tiers and the plan catalog.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Subscription level, ordered by increasing privilege.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
    Enterprise,
    Business,
}

impl SubscriptionTier {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
            Self::Business => "business",
        }
    }

    /// Returns all tiers from least to most privileged.
    pub fn all() -> &'static [SubscriptionTier] {
        &[Self::Free, Self::Pro, Self::Enterprise, Self::Business]
    }

    /// Returns true if this tier grants access to features gated on `required`.
    pub fn satisfies(&self, required: SubscriptionTier) -> bool {
        *self >= required
    }

    /// Returns the catalog entry for this tier.
    pub fn plan(&self) -> &'static TierPlan {
        match self {
            Self::Free => &TIER_PLANS[0],
            Self::Pro => &TIER_PLANS[1],
            Self::Enterprise => &TIER_PLANS[2],
            Self::Business => &TIER_PLANS[3],
        }
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            "business" => Ok(Self::Business),
            _ => Err(format!("Unknown subscription tier: {}", s)),
        }
    }
}

impl TryFrom<&str> for SubscriptionTier {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A line item on a plan card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanFeature {
    pub name: &'static str,
    pub included: bool,
}

/// Pricing and feature summary for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierPlan {
    pub tier: SubscriptionTier,
    pub name: &'static str,
    pub monthly_price_usd: u32,
    pub description: &'static str,
    pub popular: bool,
    pub features: &'static [PlanFeature],
}

impl TierPlan {
    /// Returns the names of the features this plan includes.
    pub fn included_features(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.features.iter().filter(|f| f.included).map(|f| f.name)
    }
}

const fn feature(name: &'static str, included: bool) -> PlanFeature {
    PlanFeature { name, included }
}

static TIER_PLANS: [TierPlan; 4] = [
    TierPlan {
        tier: SubscriptionTier::Free,
        name: "Free",
        monthly_price_usd: 0,
        description: "Basic features for individuals getting started with product discovery.",
        popular: false,
        features: &[
            feature("3 analyses per month", true),
            feature("Basic AI insights", true),
            feature("Export to PDF only", true),
            feature("Community support", true),
            feature("DiscoveryAI branding", true),
            feature("Team collaboration", false),
            feature("Advanced AI insights", false),
            feature("Integration with tools", false),
        ],
    },
    TierPlan {
        tier: SubscriptionTier::Pro,
        name: "Pro",
        monthly_price_usd: 29,
        description: "Advanced features for professionals and small teams.",
        popular: true,
        features: &[
            feature("50 analyses per month", true),
            feature("Advanced AI insights with GPT-4", true),
            feature("All export formats", true),
            feature("Priority support", true),
            feature("Custom branding", true),
            feature("Team collaboration (up to 5)", true),
            feature("Integration with development tools", true),
            feature("White-label solution", false),
        ],
    },
    TierPlan {
        tier: SubscriptionTier::Enterprise,
        name: "Enterprise",
        monthly_price_usd: 99,
        description: "Complete solution for larger teams and organizations.",
        popular: false,
        features: &[
            feature("Unlimited analyses", true),
            feature("White-label solution", true),
            feature("Custom AI model training", true),
            feature("API access", true),
            feature("Advanced analytics dashboard", true),
            feature("Dedicated account manager", true),
            feature("Custom integrations", true),
            feature("SLA guarantees", true),
        ],
    },
    TierPlan {
        tier: SubscriptionTier::Business,
        name: "Business",
        monthly_price_usd: 199,
        description: "Enterprise-grade features with multi-company management.",
        popular: false,
        features: &[
            feature("Everything in Enterprise", true),
            feature("Multi-company management", true),
            feature("Advanced reporting", true),
            feature("Custom workflow automation", true),
            feature("Bulk analysis processing", true),
            feature("Data export APIs", true),
            feature("Advanced security features", true),
            feature("Custom consulting services", true),
        ],
    },
];

/// Returns the full plan catalog, cheapest first.
pub fn tier_plans() -> &'static [TierPlan] {
    &TIER_PLANS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_order() {
        assert!(SubscriptionTier::Free < SubscriptionTier::Pro);
        assert!(SubscriptionTier::Pro < SubscriptionTier::Enterprise);
        assert!(SubscriptionTier::Enterprise < SubscriptionTier::Business);

        assert!(SubscriptionTier::Business.satisfies(SubscriptionTier::Pro));
        assert!(SubscriptionTier::Pro.satisfies(SubscriptionTier::Pro));
        assert!(!SubscriptionTier::Free.satisfies(SubscriptionTier::Pro));
    }

    #[test]
    fn test_tier_from_string() {
        let tier: SubscriptionTier = "enterprise".parse().unwrap();
        assert_eq!(tier, SubscriptionTier::Enterprise);

        let result: Result<SubscriptionTier, _> = "Pro".try_into();
        assert!(result.is_err());
    }

    #[test]
    fn test_tier_serde_is_lowercase() {
        let json = serde_json::to_string(&SubscriptionTier::Business).unwrap();
        assert_eq!(json, "\"business\"");
        assert_eq!(SubscriptionTier::default(), SubscriptionTier::Free);
    }

    #[test]
    fn test_plan_catalog() {
        let plans = tier_plans();
        assert_eq!(plans.len(), SubscriptionTier::all().len());

        for tier in SubscriptionTier::all() {
            assert_eq!(tier.plan().tier, *tier);
        }

        let popular: Vec<_> = plans.iter().filter(|p| p.popular).collect();
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].tier, SubscriptionTier::Pro);

        assert_eq!(SubscriptionTier::Free.plan().included_features().count(), 5);
        assert!(
            plans
                .windows(2)
                .all(|w| w[0].monthly_price_usd < w[1].monthly_price_usd)
        );
    }
}
