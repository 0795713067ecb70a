use crate::cmd::progress::{create_spinner, finish_spinner_error, finish_spinner_success};
use crate::cmd::{resolve_tenant, write_output};
use crate::config::ConfigManager;
use crate::error::{ReviewError, Result};
use crate::graph::groups::GraphGroupDirectory;
use crate::graph::mail::GraphMailer;
use crate::graph::GraphClient;
use crate::membership::{
    expand_membership, render_csv, render_html, MembershipRow, DEFAULT_STALE_DAYS,
};
use crate::notify::{MailAttachment, Mailer, OutgoingMail};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct GroupAuditArgs {
    /// Group object id to audit (repeatable)
    #[arg(short, long = "group", required = true)]
    pub groups: Vec<String>,

    /// Days without sign-in before a member is flagged stale
    #[arg(long, default_value_t = DEFAULT_STALE_DAYS)]
    pub stale_days: i64,

    /// Tenant name (defaults to the active tenant)
    #[arg(short, long)]
    pub tenant: Option<String>,

    /// Output format (table, csv, html)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Mail the HTML report, with the CSV attached, to this address (repeatable)
    #[arg(long)]
    pub email_to: Vec<String>,
}

pub async fn audit(args: GroupAuditArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let config = config_manager.load_config()?;
    let tenant = resolve_tenant(&config_manager, args.tenant.as_deref())?;
    let client = GraphClient::from_config(&config_manager, &tenant.name)?;
    let directory = GraphGroupDirectory::new(client.clone());
    let now = Utc::now();

    println!(
        "{} membership of {} group(s) in {}",
        "Auditing".cyan().bold(),
        args.groups.len(),
        tenant.name.bold()
    );

    let spinner = create_spinner("Expanding nested membership...");
    let rows = match expand_membership(&directory, &args.groups, args.stale_days, now).await {
        Ok(rows) => {
            finish_spinner_success(&spinner, &format!("{} member row(s)", rows.len()));
            rows
        }
        Err(e) => {
            finish_spinner_error(&spinner, "Membership lookup failed");
            return Err(e);
        }
    };

    match args.format.as_str() {
        "csv" => write_output(args.output.as_deref(), &render_csv(&rows)?)?,
        "html" => write_output(args.output.as_deref(), &render_html(&rows, &tenant.name, now))?,
        _ => {
            print_rows(&rows, args.stale_days);
            if let Some(path) = &args.output {
                write_output(Some(path.as_path()), &render_csv(&rows)?)?;
            }
        }
    }

    if !args.email_to.is_empty() {
        let sender = config.review.sender_mailbox.clone().ok_or_else(|| {
            ReviewError::ConfigError("review.sender_mailbox must be set to email the report".into())
        })?;
        let mailer = GraphMailer::new(client, sender);
        let mail = OutgoingMail {
            to: args.email_to.clone(),
            cc: Vec::new(),
            subject: format!(
                "Group membership audit - {} ({})",
                tenant.name,
                now.format("%Y-%m-%d")
            ),
            html_body: render_html(&rows, &tenant.name, now),
            attachments: vec![MailAttachment {
                file_name: format!("group-membership-{}.csv", now.format("%Y%m%d")),
                content_type: "text/csv".to_string(),
                content: render_csv(&rows)?.into_bytes(),
            }],
        };
        mailer.send(&mail).await?;
        println!("{} Report sent to {}", "✓".green(), args.email_to.join(", "));
    }

    Ok(())
}

fn print_rows(rows: &[MembershipRow], stale_days: i64) {
    println!("\n{}", "Group Membership".bold());
    println!("{}", "─".repeat(60));

    let mut current_group: Option<&str> = None;
    for row in rows {
        if current_group != Some(row.group.as_str()) {
            println!("\n{}", row.group.bold());
            current_group = Some(row.group.as_str());
        }

        let marker = if !row.enabled {
            "✗".red()
        } else if row.stale {
            "!".yellow()
        } else {
            "✓".green()
        };
        println!(
            "  {} {} <{}> [{}] last sign-in {} ({})",
            marker,
            row.user_display_name,
            row.user_principal_name,
            row.user_type,
            row.last_sign_in_display(),
            row.membership().dimmed()
        );
    }

    let stale = rows.iter().filter(|r| r.stale).count();
    let disabled = rows.iter().filter(|r| !r.enabled).count();
    println!("\n{}", "─".repeat(60));
    println!("{} {} member row(s)", "→".cyan(), rows.len());
    println!(
        "{} {} without sign-in in {} days, {} disabled",
        "→".cyan(),
        stale,
        stale_days,
        disabled
    );
}
