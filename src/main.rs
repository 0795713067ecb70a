use clap::{Parser, Subcommand};
use colored::Colorize;
use reviewctl::config::ConfigManager;
use reviewctl::{cmd, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "reviewctl",
    about = "Access review notifications and membership audits for Microsoft Entra ID",
    version,
    long_about = "Evaluates PIM role assignments, guest accounts and access review instances,\n\
                  notifies reviewers before access lapses and keeps an append-only audit trail.\n\
                  Also audits nested group membership and helps triage network issues."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate expiring access and notify reviewers
    #[command(subcommand)]
    Review(ReviewCommands),

    /// Inspect the audit trail and record reviewer decisions
    #[command(subcommand)]
    Audit(AuditCommands),

    /// Group membership audits
    #[command(subcommand)]
    Groups(GroupCommands),

    /// Network diagnostics
    #[command(subcommand)]
    Diag(DiagCommands),

    /// Manage tenant configurations
    #[command(subcommand)]
    Tenant(TenantCommands),
}

#[derive(Subcommand, Debug)]
enum ReviewCommands {
    /// Run one evaluation and notification pass
    Run(cmd::review::RunArgs),
}

#[derive(Subcommand, Debug)]
enum AuditCommands {
    /// List audit entries
    Show(cmd::audit::ShowArgs),

    /// Record an approve or revoke decision
    Decide(cmd::audit::DecideArgs),
}

#[derive(Subcommand, Debug)]
enum GroupCommands {
    /// Expand nested membership and flag stale accounts
    Audit(cmd::groups::GroupAuditArgs),
}

#[derive(Subcommand, Debug)]
enum DiagCommands {
    /// Run platform network diagnostics and save the raw output
    Capture(cmd::diag::CaptureArgs),

    /// Analyze a network log and print a troubleshooting report
    Parse(cmd::diag::ParseArgs),
}

#[derive(Subcommand, Debug)]
enum TenantCommands {
    /// Add a new tenant
    Add(cmd::tenant::TenantAddArgs),

    /// List configured tenants
    List(cmd::tenant::TenantListArgs),

    /// Switch active tenant
    Switch(cmd::tenant::TenantSwitchArgs),

    /// Remove a tenant
    Remove(cmd::tenant::TenantRemoveArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> error::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("reviewctl=debug")
            .with_writer(std::io::stderr)
            .init();
    } else if let Ok(filter) = EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else if let Some(level) = configured_log_level() {
        tracing_subscriber::fmt()
            .with_env_filter(format!("reviewctl={}", level))
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Review(review_cmd) => match review_cmd {
            ReviewCommands::Run(args) => cmd::review::run(args).await?,
        },
        Commands::Audit(audit_cmd) => match audit_cmd {
            AuditCommands::Show(args) => cmd::audit::show(args).await?,
            AuditCommands::Decide(args) => cmd::audit::decide(args).await?,
        },
        Commands::Groups(group_cmd) => match group_cmd {
            GroupCommands::Audit(args) => cmd::groups::audit(args).await?,
        },
        Commands::Diag(diag_cmd) => match diag_cmd {
            DiagCommands::Capture(args) => cmd::diag::capture(args).await?,
            DiagCommands::Parse(args) => cmd::diag::parse(args).await?,
        },
        Commands::Tenant(tenant_cmd) => match tenant_cmd {
            TenantCommands::Add(args) => cmd::tenant::add(args).await?,
            TenantCommands::List(args) => cmd::tenant::list(args).await?,
            TenantCommands::Switch(args) => cmd::tenant::switch(args).await?,
            TenantCommands::Remove(args) => cmd::tenant::remove(args).await?,
        },
    }

    Ok(())
}

/// `log_level` from config.toml, if set
fn configured_log_level() -> Option<String> {
    ConfigManager::new()
        .and_then(|manager| manager.load_config())
        .ok()
        .map(|config| config.log_level)
        .filter(|level| !level.trim().is_empty())
}
