//! Access token lookup
//!
//! Sign-in is handled outside reviewctl (az cli, a managed identity sidecar, a
//! scheduled task that refreshes the cache). This module only finds a usable token.

use crate::config::ConfigManager;
use crate::error::Result;

/// Environment variable consulted before the token cache
pub const TOKEN_ENV_VAR: &str = "REVIEWCTL_ACCESS_TOKEN";

/// Required Microsoft Graph application permissions
pub const REQUIRED_SCOPES: &[&str] = &[
    "RoleManagement.Read.Directory",
    "AccessReview.Read.All",
    "User.Read.All",
    "AuditLog.Read.All",
    "GroupMember.Read.All",
    "Mail.Send",
    "Sites.Selected",
];

/// Resolve the bearer token for a tenant
pub fn resolve_access_token(config: &ConfigManager, tenant_name: &str) -> Result<String> {
    resolve_with_env(config, tenant_name, std::env::var(TOKEN_ENV_VAR).ok())
}

fn resolve_with_env(
    config: &ConfigManager,
    tenant_name: &str,
    env_token: Option<String>,
) -> Result<String> {
    if let Some(token) = env_token.filter(|t| !t.trim().is_empty()) {
        tracing::debug!("Using access token from {}", TOKEN_ENV_VAR);
        return Ok(token.trim().to_string());
    }

    let cached = config.load_token(tenant_name)?;
    tracing::debug!(
        "Using cached token for {} (expires {})",
        tenant_name,
        cached.expires_at
    );
    Ok(cached.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenCache;
    use crate::error::ReviewError;

    #[test]
    fn test_env_token_wins() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigManager::with_dir(dir.path()).unwrap();
        let token = resolve_with_env(&config, "CONTOSO", Some(" abc ".into())).unwrap();
        assert_eq!(token, "abc");
    }

    #[test]
    fn test_falls_back_to_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigManager::with_dir(dir.path()).unwrap();
        config
            .save_token(
                "CONTOSO",
                &TokenCache {
                    access_token: "cached".into(),
                    expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
                    tenant_id: "tid".into(),
                },
            )
            .unwrap();

        assert_eq!(
            resolve_with_env(&config, "CONTOSO", Some(String::new())).unwrap(),
            "cached"
        );
    }

    #[test]
    fn test_missing_token() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigManager::with_dir(dir.path()).unwrap();
        assert!(matches!(
            resolve_with_env(&config, "CONTOSO", None),
            Err(ReviewError::TokenNotFound(_))
        ));
    }
}
