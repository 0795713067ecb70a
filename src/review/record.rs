//! Core access review types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the subject holds the access under review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentKind {
    /// Active directory role assignment
    Permanent,
    /// PIM eligible role assignment
    Eligible,
    /// Guest (B2B) account
    Guest,
    /// Membership under an access review (group or app scope)
    GroupMembership,
}

impl AssignmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentKind::Permanent => "permanent",
            AssignmentKind::Eligible => "eligible",
            AssignmentKind::Guest => "guest",
            AssignmentKind::GroupMembership => "group-membership",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AssignmentKind::Permanent => "Active role assignment",
            AssignmentKind::Eligible => "Eligible role assignment",
            AssignmentKind::Guest => "Guest account",
            AssignmentKind::GroupMembership => "Access review",
        }
    }
}

impl fmt::Display for AssignmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending access decision, normalized from whatever the identity provider returned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewableRecord {
    pub subject_id: String,
    pub subject_display_name: String,
    pub subject_email: String,
    pub access_description: String,
    pub assignment_kind: AssignmentKind,
    pub expiration: DateTime<Utc>,
    pub reviewer_email: String,
    pub manager_email: Option<String>,
}

/// Urgency tier; always derived from the expiration and the evaluation instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UrgencyTier {
    Standard,
    Escalation,
}

impl UrgencyTier {
    pub fn notification_kind(&self) -> NotificationKind {
        match self {
            UrgencyTier::Standard => NotificationKind::Initial,
            UrgencyTier::Escalation => NotificationKind::Escalation,
        }
    }
}

impl fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrgencyTier::Standard => write!(f, "standard"),
            UrgencyTier::Escalation => write!(f, "escalation"),
        }
    }
}

/// Notification kind as written to the audit store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    Initial,
    Escalation,
    /// Entry written by a reviewer decision rather than a notification
    Decision,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Initial => write!(f, "Initial"),
            NotificationKind::Escalation => write!(f, "Escalation"),
            NotificationKind::Decision => write!(f, "Decision"),
        }
    }
}

/// Reviewer decision. Pending is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum DecisionStatus {
    Pending,
    Approved,
    Revoked,
}

impl DecisionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DecisionStatus::Pending)
    }

    pub fn can_transition_to(&self, next: DecisionStatus) -> bool {
        matches!(
            (self, next),
            (DecisionStatus::Pending, DecisionStatus::Approved)
                | (DecisionStatus::Pending, DecisionStatus::Revoked)
        )
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionStatus::Pending => write!(f, "Pending"),
            DecisionStatus::Approved => write!(f, "Approved"),
            DecisionStatus::Revoked => write!(f, "Revoked"),
        }
    }
}

/// Result of handing a message to the mail collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum DispatchOutcome {
    Sent,
    Failed(String),
    /// Dry run, or an entry not tied to a send
    Skipped,
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent)
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Sent => write!(f, "sent"),
            DispatchOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            DispatchOutcome::Skipped => write!(f, "skipped"),
        }
    }
}
