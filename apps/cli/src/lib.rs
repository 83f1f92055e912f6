//! DiscoveryAI session console
//!
//! Wires a file-backed session store to a small set of subcommands. The
//! session survives between runs; the user directory does not.

pub mod config;

use std::sync::Arc;

use auth::{
    AuthContext, ErrorBody, FileSessionStorage, SessionStorage, SessionStore, check_access,
};
use clap::Subcommand;
use entities::{ProfileUpdate, SubscriptionTier, tier_plans};

use crate::config::Config;

/// Session commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create an account and sign in as it
    Signup {
        email: String,
        #[arg(long, default_value = "")]
        password: String,
        /// Full name
        #[arg(long)]
        name: String,
        /// Company name
        #[arg(long)]
        company: Option<String>,
    },
    /// Sign in to an existing account
    Signin {
        email: String,
        #[arg(long, default_value = "")]
        password: String,
    },
    /// Sign out of the current session
    Signout,
    /// Show the signed-in user
    Whoami,
    /// Change profile fields of the signed-in user
    UpdateProfile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        company: Option<String>,
        /// Remove the company name
        #[arg(long, conflicts_with = "company")]
        clear_company: bool,
        #[arg(long)]
        tier: Option<SubscriptionTier>,
    },
    /// List subscription plans
    Plans,
    /// Check whether the session may open a view gated on a tier
    Access {
        #[arg(long)]
        tier: Option<SubscriptionTier>,
    },
}

/// Initializes tracing with the given log level, writing to stderr.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Opens the file-backed store described by `config` and attaches a context.
pub fn open_context(config: &Config) -> anyhow::Result<AuthContext<FileSessionStorage>> {
    let storage = FileSessionStorage::new(&config.data_dir)?;
    let store = SessionStore::new(storage, config.store_config());
    Ok(AuthContext::attach(Arc::new(store)))
}

/// Runs one command and returns its printable output.
pub async fn execute<S: SessionStorage + 'static>(
    ctx: &AuthContext<S>,
    command: Command,
) -> Result<String, ErrorBody> {
    match command {
        Command::Signup {
            email,
            password,
            name,
            company,
        } => {
            let user = ctx
                .sign_up(&email, &password, &name, company.as_deref())
                .await?;
            to_json(&user)
        }
        Command::Signin { email, password } => {
            let user = ctx.sign_in(&email, &password).await?;
            to_json(&user)
        }
        Command::Signout => {
            ctx.sign_out().await?;
            Ok("Signed out".to_string())
        }
        Command::Whoami => match ctx.user() {
            Some(user) => to_json(&user),
            None => Ok("Not signed in".to_string()),
        },
        Command::UpdateProfile {
            name,
            company,
            clear_company,
            tier,
        } => {
            let company_name = if clear_company {
                Some(None)
            } else {
                company.map(Some)
            };
            let update = ProfileUpdate {
                full_name: name,
                company_name,
                subscription_tier: tier,
            };
            let user = ctx.update_profile(update).await?;
            to_json(&user)
        }
        Command::Plans => Ok(render_plans()),
        Command::Access { tier } => to_json(&check_access(&ctx.snapshot(), tier)),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ErrorBody> {
    serde_json::to_string_pretty(value).map_err(|e| {
        tracing::error!(error = %e, "Failed to render output");
        ErrorBody::unexpected()
    })
}

fn render_plans() -> String {
    let mut out = String::new();
    for plan in tier_plans() {
        let popular = if plan.popular { "  [popular]" } else { "" };
        out.push_str(&format!(
            "{} (${}/month){}\n  {}\n",
            plan.name, plan.monthly_price_usd, popular, plan.description
        ));
        for feature in plan.features {
            let mark = if feature.included { '+' } else { '-' };
            out.push_str(&format!("    {} {}\n", mark, feature.name));
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use auth::{MemorySessionStorage, StoreConfig};
    use entities::{DEMO_EMAIL, User};

    use super::*;

    fn context() -> AuthContext<MemorySessionStorage> {
        let store = SessionStore::new(
            MemorySessionStorage::new(),
            StoreConfig::new().with_latency(Duration::ZERO),
        );
        AuthContext::attach(Arc::new(store))
    }

    #[tokio::test]
    async fn test_signin_then_whoami() {
        let ctx = context();

        let out = execute(
            &ctx,
            Command::Signin {
                email: DEMO_EMAIL.to_string(),
                password: String::new(),
            },
        )
        .await
        .unwrap();
        let user: User = serde_json::from_str(&out).unwrap();
        assert_eq!(user.email, DEMO_EMAIL);

        let out = execute(&ctx, Command::Whoami).await.unwrap();
        let again: User = serde_json::from_str(&out).unwrap();
        assert_eq!(again, user);

        let out = execute(&ctx, Command::Signout).await.unwrap();
        assert_eq!(out, "Signed out");
        assert_eq!(
            execute(&ctx, Command::Whoami).await.unwrap(),
            "Not signed in"
        );
    }

    #[tokio::test]
    async fn test_update_profile_clears_company() {
        let ctx = context();
        execute(
            &ctx,
            Command::Signin {
                email: DEMO_EMAIL.to_string(),
                password: String::new(),
            },
        )
        .await
        .unwrap();
        assert!(ctx.user().unwrap().company_name.is_some());

        let out = execute(
            &ctx,
            Command::UpdateProfile {
                name: None,
                company: None,
                clear_company: true,
                tier: None,
            },
        )
        .await
        .unwrap();
        let user: User = serde_json::from_str(&out).unwrap();
        assert_eq!(user.company_name, None);
        assert_eq!(user.full_name, "Demo User");
        assert_eq!(ctx.user().unwrap().company_name, None);
    }

    #[tokio::test]
    async fn test_errors_are_messages() {
        let ctx = context();

        let err = execute(
            &ctx,
            Command::UpdateProfile {
                name: Some("X".to_string()),
                company: None,
                clear_company: false,
                tier: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.message, "No user logged in");
    }

    #[tokio::test]
    async fn test_access_command() {
        let ctx = context();
        let out = execute(&ctx, Command::Access { tier: None }).await.unwrap();
        assert!(out.contains("redirect_to_home"));

        execute(
            &ctx,
            Command::Signup {
                email: "a@x.com".to_string(),
                password: String::new(),
                name: "Alice".to_string(),
                company: None,
            },
        )
        .await
        .unwrap();

        let out = execute(
            &ctx,
            Command::Access {
                tier: Some(SubscriptionTier::Pro),
            },
        )
        .await
        .unwrap();
        assert!(out.contains("redirect_to_upgrade"));
    }

    #[test]
    fn test_render_plans() {
        let out = render_plans();
        assert!(out.starts_with("Free ($0/month)"));
        assert!(out.contains("Pro ($29/month)  [popular]"));
        assert!(out.contains("    - White-label solution"));
    }

    #[tokio::test]
    async fn test_session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            auth_latency: Duration::ZERO,
            session_slot: "auth_user".to_string(),
            log_level: "info".to_string(),
        };

        {
            let ctx = open_context(&config).unwrap();
            ctx.sign_in(DEMO_EMAIL, "pw").await.unwrap();
        }

        let ctx = open_context(&config).unwrap();
        assert_eq!(ctx.user().map(|u| u.email), Some(DEMO_EMAIL.to_string()));
    }
}
