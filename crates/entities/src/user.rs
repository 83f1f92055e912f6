//! User-related entity definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::SubscriptionTier;

/// Email of the account every directory starts with.
pub const DEMO_EMAIL: &str = "demo@discoveryai.com";

/// A user account. Identity and profile live in the same record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: String,
    /// Email address. Unique within a directory and used as the login key.
    pub email: String,
    /// Full name.
    pub full_name: String,
    /// Company name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    /// Subscription tier.
    pub subscription_tier: SubscriptionTier,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user on the free tier.
    pub fn new(email: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.into(),
            full_name: full_name.into(),
            company_name: None,
            subscription_tier: SubscriptionTier::Free,
            created_at: Utc::now(),
        }
    }

    /// The demo account seeded into every directory.
    pub fn demo() -> Self {
        Self {
            id: "1".to_string(),
            email: DEMO_EMAIL.to_string(),
            full_name: "Demo User".to_string(),
            company_name: Some("DiscoveryAI".to_string()),
            subscription_tier: SubscriptionTier::Pro,
            created_at: Utc::now(),
        }
    }

    /// Sets the company name.
    pub fn with_company_name(mut self, company_name: impl Into<String>) -> Self {
        self.company_name = Some(company_name.into());
        self
    }

    /// Sets the subscription tier.
    pub fn with_tier(mut self, tier: SubscriptionTier) -> Self {
        self.subscription_tier = tier;
        self
    }

    /// Returns the full name, falling back to the email when it is blank.
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.email
        } else {
            &self.full_name
        }
    }
}

/// Partial profile changes merged into the current user.
///
/// Fields left as `None` keep their previous value. `company_name` set to
/// `Some(None)` (JSON `null`) clears the company. `id`, `email` and
/// `created_at` are not part of a profile and cannot be changed this way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub company_name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_tier: Option<SubscriptionTier>,
}

/// Maps a present key to `Some`, keeping an explicit `null` as `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl ProfileUpdate {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the full name.
    pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Sets the company name.
    pub fn company_name(mut self, company_name: impl Into<String>) -> Self {
        self.company_name = Some(Some(company_name.into()));
        self
    }

    /// Removes the company name.
    pub fn clear_company_name(mut self) -> Self {
        self.company_name = Some(None);
        self
    }

    /// Sets the subscription tier.
    pub fn subscription_tier(mut self, tier: SubscriptionTier) -> Self {
        self.subscription_tier = Some(tier);
        self
    }

    /// Returns true if applying this update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.company_name.is_none() && self.subscription_tier.is_none()
    }

    /// Returns `user` with this update merged in.
    pub fn apply(&self, user: &User) -> User {
        let mut merged = user.clone();
        if let Some(full_name) = &self.full_name {
            merged.full_name = full_name.clone();
        }
        if let Some(company_name) = &self.company_name {
            merged.company_name = company_name.clone();
        }
        if let Some(tier) = self.subscription_tier {
            merged.subscription_tier = tier;
        }
        merged
    }
}
