//! Run summary: the immutable result of one review run
//!
//! Built once by the pipeline, then rendered (JSON, HTML, terminal) at the end.

use crate::report::{generate_html_report, HtmlTable, ReportMetadata};
use crate::review::compose::NotificationMessage;
use crate::review::record::{AssignmentKind, DispatchOutcome, UrgencyTier};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// What happened to one in-window record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub subject_id: String,
    pub subject_name: String,
    pub access_description: String,
    pub assignment_kind: AssignmentKind,
    pub expiration: DateTime<Utc>,
    pub reviewer_email: String,
    pub days_remaining: i64,
    pub tier: Option<UrgencyTier>,
    pub message: Option<NotificationMessage>,
    pub dispatch: Option<DispatchOutcome>,
    pub audited: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub evaluated_at: DateTime<Utc>,
    pub dry_run: bool,
    /// Entity kinds whose query failed this run
    pub failed_kinds: Vec<String>,
    pub fetched: usize,
    pub normalized: usize,
    pub in_window: usize,
    pub outcomes: Vec<RunOutcome>,
}

impl RunSummary {
    fn count(&self, pred: impl Fn(&RunOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }

    pub fn sent(&self) -> usize {
        self.count(|o| matches!(o.dispatch, Some(DispatchOutcome::Sent)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o.dispatch, Some(DispatchOutcome::Failed(_))))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o.dispatch, Some(DispatchOutcome::Skipped)))
    }

    pub fn escalations(&self) -> usize {
        self.count(|o| o.tier == Some(UrgencyTier::Escalation))
    }

    /// Records rejected before composition (already expired)
    pub fn rejected(&self) -> usize {
        self.count(|o| o.tier.is_none())
    }

    /// Dispatched records whose audit entry could not be written
    pub fn audit_failures(&self) -> usize {
        self.count(|o| {
            matches!(
                o.dispatch,
                Some(DispatchOutcome::Sent) | Some(DispatchOutcome::Failed(_))
            ) && !o.audited
        })
    }

    pub fn counters(&self) -> Vec<(String, String)> {
        vec![
            ("Fetched".to_string(), self.fetched.to_string()),
            ("Normalized".to_string(), self.normalized.to_string()),
            ("In window".to_string(), self.in_window.to_string()),
            ("Escalations".to_string(), self.escalations().to_string()),
            ("Sent".to_string(), self.sent().to_string()),
            ("Failed".to_string(), self.failed().to_string()),
            ("Skipped".to_string(), self.skipped().to_string()),
            ("Audit failures".to_string(), self.audit_failures().to_string()),
        ]
    }

    pub fn to_html(&self, tenant_name: &str) -> String {
        let mut table = HtmlTable::new(
            "Notifications",
            &[
                "Subject",
                "Access",
                "Kind",
                "Expires",
                "Days",
                "Tier",
                "Reviewer",
                "Dispatch",
                "Audited",
            ],
        );

        for outcome in &self.outcomes {
            let tier = outcome
                .tier
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string());
            let dispatch = match (&outcome.dispatch, &outcome.error) {
                (Some(dispatch), _) => dispatch.to_string(),
                (None, Some(error)) => error.clone(),
                (None, None) => "-".to_string(),
            };
            table.push_text_row(&[
                &outcome.subject_name,
                &outcome.access_description,
                outcome.assignment_kind.label(),
                &outcome.expiration.format("%Y-%m-%d %H:%M").to_string(),
                &outcome.days_remaining.to_string(),
                &tier,
                &outcome.reviewer_email,
                &dispatch,
                if outcome.audited { "Yes" } else { "No" },
            ]);
        }

        let title = if self.dry_run {
            "Access Review Run (dry run)"
        } else {
            "Access Review Run"
        };

        generate_html_report(
            &ReportMetadata {
                title: title.to_string(),
                tenant_name: tenant_name.to_string(),
                generated_at: self.evaluated_at,
            },
            &self.counters(),
            &[table],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn outcome(dispatch: Option<DispatchOutcome>, audited: bool) -> RunOutcome {
        RunOutcome {
            subject_id: "u1".into(),
            subject_name: "Adele Vance".into(),
            access_description: "Global Reader".into(),
            assignment_kind: AssignmentKind::Permanent,
            expiration: Utc.with_ymd_and_hms(2026, 10, 23, 6, 0, 0).unwrap(),
            reviewer_email: "iam@contoso.com".into(),
            days_remaining: 5,
            tier: dispatch.as_ref().map(|_| UrgencyTier::Escalation),
            message: None,
            dispatch,
            audited,
            error: None,
        }
    }

    fn summary(outcomes: Vec<RunOutcome>) -> RunSummary {
        RunSummary {
            run_id: Uuid::new_v4(),
            evaluated_at: Utc.with_ymd_and_hms(2026, 10, 18, 6, 0, 0).unwrap(),
            dry_run: false,
            failed_kinds: Vec::new(),
            fetched: 4,
            normalized: 4,
            in_window: outcomes.len(),
            outcomes,
        }
    }

    #[test]
    fn test_counters() {
        let summary = summary(vec![
            outcome(Some(DispatchOutcome::Sent), true),
            outcome(Some(DispatchOutcome::Failed("550".into())), true),
            outcome(Some(DispatchOutcome::Sent), false),
            outcome(None, false),
        ]);

        assert_eq!(summary.sent(), 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.audit_failures(), 1);
        assert_eq!(summary.rejected(), 1);
        assert_eq!(summary.escalations(), 3);
    }

    #[test]
    fn test_html_lists_outcomes() {
        let html = summary(vec![outcome(Some(DispatchOutcome::Sent), true)]).to_html("CONTOSO");
        assert!(html.contains("Access Review Run - CONTOSO"));
        assert!(html.contains("Adele Vance"));
        assert!(html.contains("<td>sent</td>"));
    }
}
