//! Access decisions for protected views.

use entities::SubscriptionTier;
use serde::Serialize;

use crate::AuthSnapshot;

/// Outcome of checking a snapshot against a protected view's requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    /// Session state is not settled yet.
    Loading,
    /// Nobody is signed in.
    RedirectToHome,
    /// Signed in, but on a tier below the requirement.
    RedirectToUpgrade { required: SubscriptionTier },
    Granted,
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Decides whether the view can render for `snapshot`.
pub fn check_access(snapshot: &AuthSnapshot, required: Option<SubscriptionTier>) -> AccessDecision {
    if snapshot.loading {
        return AccessDecision::Loading;
    }

    let Some(user) = &snapshot.user else {
        return AccessDecision::RedirectToHome;
    };

    match required {
        Some(required) if !user.subscription_tier.satisfies(required) => {
            AccessDecision::RedirectToUpgrade { required }
        }
        _ => AccessDecision::Granted,
    }
}

#[cfg(test)]
mod tests {
    use entities::User;

    use super::*;

    fn snapshot(user: Option<User>, loading: bool) -> AuthSnapshot {
        AuthSnapshot { user, loading }
    }

    #[test]
    fn test_loading_wins() {
        let s = snapshot(Some(User::demo()), true);
        assert_eq!(check_access(&s, None), AccessDecision::Loading);
    }

    #[test]
    fn test_anonymous_redirects_home() {
        let s = snapshot(None, false);
        assert_eq!(check_access(&s, None), AccessDecision::RedirectToHome);
        assert_eq!(
            check_access(&s, Some(SubscriptionTier::Free)),
            AccessDecision::RedirectToHome
        );
    }

    #[test]
    fn test_tier_requirement() {
        let free = snapshot(Some(User::new("a@x.com", "A")), false);
        assert!(check_access(&free, None).is_granted());
        assert!(check_access(&free, Some(SubscriptionTier::Free)).is_granted());
        assert_eq!(
            check_access(&free, Some(SubscriptionTier::Enterprise)),
            AccessDecision::RedirectToUpgrade {
                required: SubscriptionTier::Enterprise
            }
        );

        let pro = snapshot(Some(User::demo()), false);
        assert!(check_access(&pro, Some(SubscriptionTier::Pro)).is_granted());
        assert!(!check_access(&pro, Some(SubscriptionTier::Business)).is_granted());
    }

    #[test]
    fn test_decision_serializes_with_tag() {
        let json = serde_json::to_value(AccessDecision::RedirectToUpgrade {
            required: SubscriptionTier::Pro,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "decision": "redirect_to_upgrade", "required": "pro" })
        );
    }
}
