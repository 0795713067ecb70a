use crate::cmd::progress::{create_spinner, finish_spinner_error, finish_spinner_success};
use crate::cmd::{open_audit_store, resolve_tenant, write_output};
use crate::config::ConfigManager;
use crate::error::{ReviewError, Result};
use crate::graph::directory::GraphIdentitySource;
use crate::graph::mail::GraphMailer;
use crate::graph::GraphClient;
use crate::notify::{ConsoleMailer, Mailer, OutgoingMail};
use crate::review::audit::AuditRecorder;
use crate::review::pipeline::{Delivery, PipelineOptions, ReviewPipeline};
use crate::review::record::{DispatchOutcome, UrgencyTier};
use crate::review::summary::RunSummary;
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Tenant name (defaults to the active tenant)
    #[arg(short, long)]
    pub tenant: Option<String>,

    /// Classify and compose only; send nothing and write no audit entries
    #[arg(long)]
    pub dry_run: bool,

    /// Evaluate as of this instant (RFC 3339) instead of now
    #[arg(long)]
    pub now: Option<String>,

    /// Override review.lookahead_days
    #[arg(long)]
    pub lookahead_days: Option<i64>,

    /// Override review.escalation_threshold_days
    #[arg(long)]
    pub threshold_days: Option<i64>,

    /// Override review.default_reviewer
    #[arg(long)]
    pub default_reviewer: Option<String>,

    /// Print message bodies in dry-run mode
    #[arg(long)]
    pub show_body: bool,

    /// Output format (table, json, html)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

fn parse_now(value: Option<&str>) -> Result<DateTime<Utc>> {
    match value {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ReviewError::ConfigError(format!("Invalid --now '{}': {}", raw, e))),
        None => Ok(Utc::now()),
    }
}

pub async fn run(args: RunArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let config = config_manager.load_config()?;
    let tenant = resolve_tenant(&config_manager, args.tenant.as_deref())?;
    let now = parse_now(args.now.as_deref())?;

    let mut settings = config.review.clone();
    if let Some(days) = args.lookahead_days {
        settings.lookahead_days = days;
    }
    if let Some(days) = args.threshold_days {
        settings.escalation_threshold_days = days;
    }
    if let Some(reviewer) = args.default_reviewer.clone() {
        settings.default_reviewer = Some(reviewer);
    }
    settings.validate()?;

    println!(
        "{} access reviews for {}{}",
        "Evaluating".cyan().bold(),
        tenant.name.bold(),
        if args.dry_run { " (dry run)".yellow().to_string() } else { String::new() }
    );
    println!(
        "→ Window: {} days, escalation at {} days or fewer",
        settings.lookahead_days, settings.escalation_threshold_days
    );

    let client = GraphClient::from_config(&config_manager, &tenant.name)?;
    let source = Arc::new(GraphIdentitySource::new(client.clone()));

    let delivery = if args.dry_run {
        Delivery::DryRun
    } else {
        let sender = settings.sender_mailbox.clone().ok_or_else(|| {
            ReviewError::ConfigError(
                "review.sender_mailbox must be set to send notifications (or use --dry-run)".into(),
            )
        })?;
        Delivery::Live {
            mailer: Arc::new(GraphMailer::new(client, sender)),
            recorder: AuditRecorder::new(open_audit_store(&config_manager, &settings, &tenant.name)?),
        }
    };

    let pipeline = ReviewPipeline::new(source, delivery, PipelineOptions::from(&settings));

    let spinner = create_spinner("Querying role assignments, guests and access reviews...");
    let summary = match pipeline.run(now).await {
        Ok(summary) => {
            finish_spinner_success(
                &spinner,
                &format!("{} record(s) in window", summary.in_window),
            );
            summary
        }
        Err(e) => {
            finish_spinner_error(&spinner, "Identity queries failed");
            return Err(e);
        }
    };

    for kind in &summary.failed_kinds {
        println!("{} Could not query {}; those records were skipped", "!".yellow(), kind);
    }

    match args.format.as_str() {
        "json" => write_output(args.output.as_deref(), &serde_json::to_string_pretty(&summary)?)?,
        "html" => write_output(args.output.as_deref(), &summary.to_html(&tenant.name))?,
        _ => {
            print_summary(&summary);
            if let Some(path) = &args.output {
                write_output(Some(path.as_path()), &serde_json::to_string_pretty(&summary)?)?;
            }
        }
    }

    if args.dry_run && args.show_body {
        let preview = ConsoleMailer { show_body: true };
        for message in summary.outcomes.iter().filter_map(|o| o.message.clone()) {
            println!();
            preview.send(&OutgoingMail::from(message)).await?;
        }
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\n{}", "Access Review Run".bold());
    println!("{}", "─".repeat(60));
    println!("Run ID: {}", summary.run_id.to_string().dimmed());

    for outcome in &summary.outcomes {
        let (glyph, status) = match (&outcome.dispatch, &outcome.error) {
            (Some(DispatchOutcome::Sent), None) => ("✓".green(), "sent".green()),
            (Some(DispatchOutcome::Sent), Some(_)) => ("!".yellow(), "sent, not audited".yellow()),
            (Some(DispatchOutcome::Failed(reason)), _) => {
                ("✗".red(), format!("failed: {}", reason).red())
            }
            (Some(DispatchOutcome::Skipped), _) => ("○".dimmed(), "dry run".dimmed()),
            (None, Some(error)) => ("✗".red(), error.clone().red()),
            (None, None) => ("○".dimmed(), "-".dimmed()),
        };

        let tier = match outcome.tier {
            Some(UrgencyTier::Escalation) => "ESCALATION".red().bold(),
            Some(UrgencyTier::Standard) => "standard".normal(),
            None => "-".dimmed(),
        };

        println!(
            "\n{} {} - {}",
            glyph,
            outcome.subject_name.bold(),
            outcome.access_description
        );
        println!(
            "  {} | {} day(s) left | {} | reviewer {} | {}",
            outcome.assignment_kind.label(),
            outcome.days_remaining,
            tier,
            outcome.reviewer_email,
            status
        );
    }

    println!("\n{}", "─".repeat(60));
    for (label, value) in summary.counters() {
        println!("  {:<16} {}", format!("{}:", label), value);
    }

    if summary.audit_failures() > 0 {
        println!(
            "\n{} {} notification(s) could not be written to the audit store",
            "!".yellow(),
            summary.audit_failures()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_now() {
        let parsed = parse_now(Some("2026-10-18T06:00:00+02:00")).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-10-18T04:00:00+00:00");
        assert!(parse_now(Some("yesterday")).is_err());
        assert!(parse_now(None).is_ok());
    }
}
