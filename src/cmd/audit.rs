use crate::cmd::{open_audit_store, resolve_tenant, write_output};
use crate::config::ConfigManager;
use crate::error::{ReviewError, Result};
use crate::review::audit::{
    latest_entries, ledger_states, overdue_pending, record_decision, AuditEntry,
};
use crate::review::record::DecisionStatus;
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Tenant name (defaults to the active tenant)
    #[arg(short, long)]
    pub tenant: Option<String>,

    /// Only entries for this subject id
    #[arg(long)]
    pub subject: Option<String>,

    /// Only entries written by this run
    #[arg(long)]
    pub run: Option<String>,

    /// Only the latest entry per subject and access
    #[arg(long)]
    pub latest: bool,

    /// Pending decisions whose access has already expired
    #[arg(long)]
    pub overdue: bool,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DecideArgs {
    /// Subject id the decision applies to
    pub subject: String,

    /// Access description exactly as shown by `audit show`
    #[arg(long)]
    pub access: String,

    /// Decision to record
    #[arg(long, value_enum)]
    pub status: DecisionStatus,

    /// Who made the decision (recorded as the entry's reviewer)
    #[arg(long)]
    pub by: String,

    /// Tenant name (defaults to the active tenant)
    #[arg(short, long)]
    pub tenant: Option<String>,
}

pub async fn show(args: ShowArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let settings = config_manager.load_config()?.review;
    let tenant = resolve_tenant(&config_manager, args.tenant.as_deref())?;
    let store = open_audit_store(&config_manager, &settings, &tenant.name)?;

    let entries = store.entries().await?;
    let now = Utc::now();

    // Current decision per key, shown instead of the entry's own status in --latest/--overdue
    let current: HashMap<(&str, &str), DecisionStatus> = ledger_states(&entries)
        .into_iter()
        .map(|s| {
            (
                (s.latest.subject_id.as_str(), s.latest.access_description.as_str()),
                s.status(),
            )
        })
        .collect();
    let summarize = args.latest || args.overdue;

    let mut selected: Vec<&AuditEntry> = if args.overdue {
        overdue_pending(&entries, now)
    } else if args.latest {
        latest_entries(&entries)
    } else {
        entries.iter().collect()
    };

    if let Some(subject) = &args.subject {
        selected.retain(|e| &e.subject_id == subject);
    }
    if let Some(run) = &args.run {
        selected.retain(|e| e.run_id.to_string() == *run);
    }

    if args.format == "json" {
        return write_output(args.output.as_deref(), &serde_json::to_string_pretty(&selected)?);
    }

    if selected.is_empty() {
        println!("{} No matching audit entries", "!".yellow());
        return Ok(());
    }

    let heading = if args.overdue {
        "Overdue Pending Reviews"
    } else {
        "Audit Entries"
    };
    println!("\n{}", heading.bold());
    println!("{}", "─".repeat(60));

    for entry in &selected {
        let decision = if summarize {
            current
                .get(&(entry.subject_id.as_str(), entry.access_description.as_str()))
                .copied()
                .unwrap_or(entry.decision_status)
        } else {
            entry.decision_status
        };
        let status = match decision {
            DecisionStatus::Pending if entry.expiration < now => "Pending (expired)".red(),
            DecisionStatus::Pending => "Pending".yellow(),
            DecisionStatus::Approved => "Approved".green(),
            DecisionStatus::Revoked => "Revoked".red(),
        };

        println!(
            "\n{} {} - {}",
            entry.timestamp.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            entry.subject_name.bold(),
            entry.access_description
        );
        println!(
            "  {} | {} | expires {} | {} | {}",
            entry.notification_kind,
            entry.reviewer_email,
            entry.expiration.format("%Y-%m-%d"),
            entry.dispatch,
            status
        );
        println!("  subject {} | run {}", entry.subject_id, entry.run_id.to_string().dimmed());
    }

    println!("\n{}", "─".repeat(60));
    println!("{} {} entr(ies)", "→".cyan(), selected.len());

    if args.overdue {
        println!(
            "{} Overdue entries are only flagged; revoke access through your normal process and record it with {}",
            "→".cyan(),
            "reviewctl audit decide".bold()
        );
    }

    Ok(())
}

pub async fn decide(args: DecideArgs) -> Result<()> {
    if args.status == DecisionStatus::Pending {
        return Err(ReviewError::InvalidTransition {
            from: "any".into(),
            to: DecisionStatus::Pending.to_string(),
        });
    }

    let config_manager = ConfigManager::new()?;
    let settings = config_manager.load_config()?.review;
    let tenant = resolve_tenant(&config_manager, args.tenant.as_deref())?;
    let store = open_audit_store(&config_manager, &settings, &tenant.name)?;

    let entry = record_decision(
        store.as_ref(),
        &args.subject,
        &args.access,
        args.status,
        &args.by,
        Utc::now(),
    )
    .await?;

    println!(
        "{} Recorded {} for {} - {}",
        "✓".green(),
        entry.decision_status.to_string().bold(),
        entry.subject_name,
        entry.access_description
    );

    Ok(())
}
