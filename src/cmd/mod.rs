pub mod audit;
pub mod diag;
pub mod groups;
pub mod progress;
pub mod review;
pub mod tenant;

use crate::config::{AuditStoreKind, ConfigManager, ReviewSettings, TenantConfig};
use crate::error::{ReviewError, Result};
use crate::graph::sharepoint::SharePointListAuditStore;
use crate::graph::GraphClient;
use crate::review::audit::{AuditStore, JsonlAuditStore};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

/// The tenant named on the command line, or the active one
pub(crate) fn resolve_tenant(config: &ConfigManager, name: Option<&str>) -> Result<TenantConfig> {
    match name {
        Some(name) => config.get_tenant_or_env(name),
        None => config.get_active_tenant()?.ok_or_else(|| {
            ReviewError::ConfigError(
                "No active tenant. Run 'reviewctl tenant add' or pass --tenant".into(),
            )
        }),
    }
}

/// Audit backend selected by `review.audit_store`
pub(crate) fn open_audit_store(
    config: &ConfigManager,
    settings: &ReviewSettings,
    tenant_name: &str,
) -> Result<Arc<dyn AuditStore>> {
    match settings.audit_store {
        AuditStoreKind::Jsonl => Ok(Arc::new(JsonlAuditStore::new(
            config.audit_log_file(settings),
        ))),
        AuditStoreKind::SharePoint => {
            let (Some(site_id), Some(list_id)) = (
                settings.sharepoint_site_id.as_deref(),
                settings.sharepoint_list_id.as_deref(),
            ) else {
                return Err(ReviewError::ConfigError(
                    "audit_store = \"sharepoint\" needs sharepoint_site_id and sharepoint_list_id"
                        .into(),
                ));
            };
            let client = GraphClient::from_config(config, tenant_name)?;
            Ok(Arc::new(SharePointListAuditStore::new(client, site_id, list_id)))
        }
    }
}

/// Write `content` to `path`, or print it when no path was given
pub(crate) fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, content)?;
            println!("\n{} Report saved to: {}", "✓".green(), path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
