use crate::error::{ReviewError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure (`config.toml`)
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub current_tenant: Option<String>,

    /// Level for `reviewctl` logs when neither `-v` nor `RUST_LOG` is given
    #[serde(default)]
    pub log_level: String,

    #[serde(default)]
    pub review: ReviewSettings,
}

/// Where audit entries are appended
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditStoreKind {
    #[default]
    Jsonl,
    SharePoint,
}

/// `[review]` section: knobs for the access review run
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ReviewSettings {
    /// Records expiring within this many days are notified
    pub lookahead_days: i64,

    /// Records with this many days or fewer remaining are escalated
    pub escalation_threshold_days: i64,

    /// Guests without a sign-in for this long are considered stale
    pub stale_after_days: i64,

    /// Reviewer used when the identity provider names none
    pub default_reviewer: Option<String>,

    /// Mailbox that sends the notifications (users/{id}/sendMail)
    pub sender_mailbox: Option<String>,

    pub audit_store: AuditStoreKind,

    /// Override for the JSONL audit log location
    pub audit_log_path: Option<PathBuf>,

    pub sharepoint_site_id: Option<String>,
    pub sharepoint_list_id: Option<String>,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            lookahead_days: 30,
            escalation_threshold_days: 7,
            stale_after_days: 90,
            default_reviewer: None,
            sender_mailbox: None,
            audit_store: AuditStoreKind::Jsonl,
            audit_log_path: None,
            sharepoint_site_id: None,
            sharepoint_list_id: None,
        }
    }
}

impl ReviewSettings {
    pub fn validate(&self) -> Result<()> {
        if self.lookahead_days < 0 {
            return Err(ReviewError::ConfigError(
                "review.lookahead_days must not be negative".into(),
            ));
        }
        if self.escalation_threshold_days < 0 || self.escalation_threshold_days > self.lookahead_days
        {
            return Err(ReviewError::ConfigError(format!(
                "review.escalation_threshold_days must be between 0 and lookahead_days ({})",
                self.lookahead_days
            )));
        }
        if self.audit_store == AuditStoreKind::SharePoint
            && (self.sharepoint_site_id.is_none() || self.sharepoint_list_id.is_none())
        {
            return Err(ReviewError::ConfigError(
                "audit_store = \"sharepoint\" needs sharepoint_site_id and sharepoint_list_id"
                    .into(),
            ));
        }
        Ok(())
    }
}

/// Tenant-specific configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TenantConfig {
    pub name: String,
    pub tenant_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Token cache written by whatever tool performs the sign-in
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenCache {
    pub access_token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub tenant_id: String,
}

/// Configuration manager
#[derive(Clone, Debug)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("com", "reviewctl", "reviewctl").ok_or_else(|| {
            ReviewError::ConfigError("Failed to determine config directory".into())
        })?;

        Self::with_dir(project_dirs.config_dir())
    }

    /// Use an explicit directory instead of the platform default
    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let config_dir = dir.as_ref().to_path_buf();
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
        }
        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn tenants_file(&self) -> PathBuf {
        self.config_dir.join("tenants.toml")
    }

    pub fn token_cache_file(&self, tenant_name: &str) -> PathBuf {
        self.config_dir
            .join("cache")
            .join(format!("{}.token", tenant_name))
    }

    /// Default JSONL audit log, unless `review.audit_log_path` overrides it
    pub fn audit_log_file(&self, settings: &ReviewSettings) -> PathBuf {
        settings
            .audit_log_path
            .clone()
            .unwrap_or_else(|| self.config_dir.join("audit").join("access-review.jsonl"))
    }

    pub fn load_config(&self) -> Result<Config> {
        let config_path = self.config_file();

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&contents)?;
        config.review.validate()?;
        Ok(config)
    }

    pub fn save_config(&self, config: &Config) -> Result<()> {
        let contents = toml::to_string_pretty(config)
            .map_err(|e| ReviewError::ConfigError(format!("Failed to serialize config: {}", e)))?;
        fs::write(self.config_file(), contents)?;
        Ok(())
    }

    pub fn load_tenants(&self) -> Result<Vec<TenantConfig>> {
        let tenants_path = self.tenants_file();

        if !tenants_path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(tenants_path)?;

        #[derive(Deserialize)]
        struct TenantsFile {
            #[serde(default)]
            tenants: Vec<TenantConfig>,
        }

        let file: TenantsFile = toml::from_str(&contents)?;
        Ok(file.tenants)
    }

    pub fn save_tenants(&self, tenants: &[TenantConfig]) -> Result<()> {
        #[derive(Serialize)]
        struct TenantsFile<'a> {
            tenants: &'a [TenantConfig],
        }

        let contents = toml::to_string_pretty(&TenantsFile { tenants })
            .map_err(|e| ReviewError::ConfigError(format!("Failed to serialize tenants: {}", e)))?;
        fs::write(self.tenants_file(), contents)?;
        Ok(())
    }

    /// Add or replace a tenant by name
    pub fn add_tenant(&self, tenant: TenantConfig) -> Result<()> {
        let mut tenants = self.load_tenants()?;
        tenants.retain(|t| !t.name.eq_ignore_ascii_case(&tenant.name));
        tenants.push(tenant);
        self.save_tenants(&tenants)
    }

    pub fn get_tenant(&self, name: &str) -> Result<TenantConfig> {
        self.load_tenants()?
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ReviewError::TenantNotFound(name.to_string()))
    }

    pub fn get_active_tenant(&self) -> Result<Option<TenantConfig>> {
        match self.load_config()?.current_tenant {
            Some(tenant_name) => Ok(Some(self.get_tenant_or_env(&tenant_name)?)),
            None => Ok(None),
        }
    }

    pub fn set_active_tenant(&self, tenant_name: &str) -> Result<()> {
        let tenant = self.get_tenant_or_env(tenant_name)?;

        let mut config = self.load_config()?;
        config.current_tenant = Some(tenant.name);
        self.save_config(&config)
    }

    pub fn remove_tenant(&self, tenant_name: &str) -> Result<()> {
        let mut tenants = self.load_tenants()?;
        let original_len = tenants.len();
        tenants.retain(|t| !t.name.eq_ignore_ascii_case(tenant_name));

        if tenants.len() == original_len {
            return Err(ReviewError::TenantNotFound(tenant_name.to_string()));
        }

        self.save_tenants(&tenants)?;

        let token_path = self.token_cache_file(tenant_name);
        if token_path.exists() {
            fs::remove_file(token_path)?;
        }

        let mut config = self.load_config()?;
        if config
            .current_tenant
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(tenant_name))
        {
            config.current_tenant = None;
            self.save_config(&config)?;
        }

        Ok(())
    }

    pub fn save_token(&self, tenant_name: &str, token: &TokenCache) -> Result<()> {
        let cache_dir = self.config_dir.join("cache");
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
        }

        let contents = serde_json::to_string_pretty(token)?;
        fs::write(self.token_cache_file(tenant_name), contents)?;
        Ok(())
    }

    /// Load a cached token, rejecting expired ones
    pub fn load_token(&self, tenant_name: &str) -> Result<TokenCache> {
        let token_path = self.token_cache_file(tenant_name);

        if !token_path.exists() {
            return Err(ReviewError::TokenNotFound(tenant_name.to_string()));
        }

        let contents = fs::read_to_string(token_path)?;
        let token: TokenCache = serde_json::from_str(&contents)?;

        if token.expires_at < chrono::Utc::now() {
            return Err(ReviewError::TokenExpired(tenant_name.to_string()));
        }

        Ok(token)
    }

    /// Look up a tenant in tenants.toml, then in `{name}.env`
    ///
    /// A tenant found only in an env file is saved to tenants.toml.
    pub fn get_tenant_or_env(&self, name: &str) -> Result<TenantConfig> {
        if let Ok(tenant) = self.get_tenant(name) {
            return Ok(tenant);
        }

        let env_path = self.config_dir.join(format!("{}.env", name.to_lowercase()));
        if env_path.exists() {
            let vars = parse_env_file(&fs::read_to_string(&env_path)?);
            if let Some(tenant_id) = vars.get("TENANT_ID") {
                let tenant = TenantConfig {
                    name: name.to_uppercase(),
                    tenant_id: tenant_id.clone(),
                    client_id: vars.get("CLIENT_ID").cloned(),
                    description: vars.get("DESCRIPTION").cloned(),
                };
                self.add_tenant(tenant.clone())?;
                return Ok(tenant);
            }
        }

        Err(ReviewError::TenantNotFound(name.to_string()))
    }
}

/// Parse `KEY=VALUE` lines; keys are upper-cased, quotes stripped
fn parse_env_file(contents: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            let value = if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                &value[1..value.len() - 1]
            } else {
                value
            };
            vars.insert(key.trim().to_uppercase(), value.to_string());
        }
    }

    vars
}
