use crate::config::{ConfigManager, TenantConfig};
use crate::error::Result;
use crate::graph::auth::{REQUIRED_SCOPES, TOKEN_ENV_VAR};
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct TenantAddArgs {
    /// Tenant name
    name: String,

    /// Tenant ID (Entra ID tenant ID)
    #[arg(long)]
    tenant_id: String,

    /// Client ID of the app registration holding the Graph permissions
    #[arg(long)]
    client_id: Option<String>,

    /// Tenant description
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
pub struct TenantListArgs {
    /// Show tenant ids and token status
    #[arg(short, long)]
    detailed: bool,
}

#[derive(Args, Debug)]
pub struct TenantSwitchArgs {
    /// Tenant name to switch to
    name: String,
}

#[derive(Args, Debug)]
pub struct TenantRemoveArgs {
    /// Tenant name to remove
    name: String,
}

pub async fn add(args: TenantAddArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;

    let tenant = TenantConfig {
        name: args.name.clone(),
        tenant_id: args.tenant_id,
        client_id: args.client_id,
        description: args.description,
    };

    config_manager.add_tenant(tenant)?;

    if config_manager.load_config()?.current_tenant.is_none() {
        config_manager.set_active_tenant(&args.name)?;
    }

    println!("{} Tenant '{}' added", "✓".green(), args.name);
    println!("\n{}", "Required Graph application permissions:".bold());
    for scope in REQUIRED_SCOPES {
        println!("  • {}", scope);
    }
    println!(
        "\n{} Provide a Graph token via {} or the token cache in {}",
        "→".cyan(),
        TOKEN_ENV_VAR.bold(),
        config_manager.config_dir().join("cache").display()
    );

    Ok(())
}

pub async fn list(args: TenantListArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let tenants = config_manager.load_tenants()?;
    let config = config_manager.load_config()?;

    if tenants.is_empty() {
        println!("{} No tenants configured", "!".yellow());
        println!(
            "\n{} Run {} to add a tenant",
            "→".cyan(),
            "reviewctl tenant add".bold()
        );
        return Ok(());
    }

    println!("\n{}", "Configured Tenants:".bold());
    println!("{}", "─".repeat(60));

    for tenant in &tenants {
        let is_current = config
            .current_tenant
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(&tenant.name));
        let marker = if is_current {
            "●".green()
        } else {
            "○".dimmed()
        };

        println!("\n{} {}", marker, tenant.name.bold());

        if args.detailed {
            println!("  Tenant ID:    {}", tenant.tenant_id);
            if let Some(client_id) = &tenant.client_id {
                println!("  Client ID:    {}", client_id);
            }
            if let Some(desc) = &tenant.description {
                println!("  Description:  {}", desc);
            }

            match config_manager.load_token(&tenant.name) {
                Ok(token) => {
                    println!(
                        "  Token:        {} (expires: {})",
                        "Cached".green(),
                        token.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                }
                Err(e) => {
                    println!("  Token:        {}", e.to_string().yellow());
                }
            }
        }
    }

    println!("\n{}", "─".repeat(60));
    println!("{} {} tenant(s) total", "→".cyan(), tenants.len());

    if let Some(current) = &config.current_tenant {
        println!("{} Active: {}", "→".cyan(), current.bold());
    }

    Ok(())
}

pub async fn switch(args: TenantSwitchArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    config_manager.set_active_tenant(&args.name)?;

    println!("{} Switched to tenant '{}'", "✓".green(), args.name);

    Ok(())
}

pub async fn remove(args: TenantRemoveArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    config_manager.remove_tenant(&args.name)?;

    println!("{} Tenant '{}' removed", "✓".green(), args.name);

    Ok(())
}
