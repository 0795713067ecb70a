//! Notification composer
//!
//! Produces an abstract message payload per record and tier. Delivery is someone
//! else's problem (see [`crate::notify::Mailer`]).

use crate::report::html_escape;
use crate::review::record::{ReviewableRecord, UrgencyTier};
use crate::review::urgency::days_remaining;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Deadline format used in every template
pub const DEADLINE_FORMAT: &str = "%A, %B %-d, %Y at %H:%M UTC";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationMessage {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

pub fn format_deadline(expiration: DateTime<Utc>) -> String {
    expiration.format(DEADLINE_FORMAT).to_string()
}

/// Render the message for `record` at tier `tier`
///
/// Days remaining are computed here from `now`, so a delayed composition never
/// reports a stale count.
pub fn compose(
    record: &ReviewableRecord,
    tier: UrgencyTier,
    now: DateTime<Utc>,
) -> NotificationMessage {
    let days = days_remaining(record.expiration, now).max(0);
    let deadline = format_deadline(record.expiration);
    let day_word = if days == 1 { "day" } else { "days" };

    let to = vec![record.reviewer_email.clone()];

    match tier {
        UrgencyTier::Standard => NotificationMessage {
            to,
            cc: Vec::new(),
            subject: format!(
                "Access review due: {} - {}",
                record.subject_display_name, record.access_description
            ),
            html_body: render_body(record, &deadline, days, day_word, None),
        },
        UrgencyTier::Escalation => {
            let cc = record
                .manager_email
                .iter()
                .filter(|m| !m.trim().is_empty() && **m != record.reviewer_email)
                .cloned()
                .collect();

            let banner = format!(
                r#"<p style="background:#fee2e2;border-left:4px solid #dc2626;padding:12px;color:#991b1b;font-weight:600;">&#9888; URGENT: only {days} {day_word} left to complete this review.</p>"#
            );

            NotificationMessage {
                to,
                cc,
                subject: format!(
                    "[ACTION REQUIRED] Access review expires in {} {}: {} - {}",
                    days, day_word, record.subject_display_name, record.access_description
                ),
                html_body: render_body(record, &deadline, days, day_word, Some(&banner)),
            }
        }
    }
}

fn render_body(
    record: &ReviewableRecord,
    deadline: &str,
    days: i64,
    day_word: &str,
    urgency_banner: Option<&str>,
) -> String {
    let subject_line = if record.subject_email.is_empty() {
        html_escape(&record.subject_display_name)
    } else {
        format!(
            "{} &lt;{}&gt;",
            html_escape(&record.subject_display_name),
            html_escape(&record.subject_email)
        )
    };

    let closing = if urgency_banner.is_some() {
        "<p><strong>If no decision is recorded before the deadline, this access will lapse automatically and must be requested again.</strong></p>"
    } else {
        "<p>Please confirm whether this access is still required before the deadline.</p>"
    };

    format!(
        r#"<html>
<body style="font-family:'Segoe UI',system-ui,sans-serif;color:#1e293b;">
{banner}<p>Hello,</p>
<p>The following access is due for review:</p>
<table style="border-collapse:collapse;">
<tr><td style="padding:4px 12px 4px 0;"><strong>Subject</strong></td><td>{subject}</td></tr>
<tr><td style="padding:4px 12px 4px 0;"><strong>Access</strong></td><td>{access}</td></tr>
<tr><td style="padding:4px 12px 4px 0;"><strong>Type</strong></td><td>{kind}</td></tr>
<tr><td style="padding:4px 12px 4px 0;"><strong>Deadline</strong></td><td>{deadline}</td></tr>
<tr><td style="padding:4px 12px 4px 0;"><strong>Days remaining</strong></td><td>{days} {day_word}</td></tr>
</table>
{closing}
<p>Reply with <em>Approve</em> or <em>Revoke</em> to record your decision.</p>
</body>
</html>"#,
        banner = urgency_banner.map(|b| format!("{}\n", b)).unwrap_or_default(),
        subject = subject_line,
        access = html_escape(&record.access_description),
        kind = record.assignment_kind.label(),
        deadline = deadline,
        days = days,
        day_word = day_word,
        closing = closing,
    )
}
