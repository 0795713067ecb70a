//! One access review run
//!
//! fetch -> normalize -> window -> (per record) classify -> compose -> send -> audit
//!
//! Records are processed one at a time and independently: a failure on one record is
//! recorded in its outcome and the run moves on.

use crate::config::ReviewSettings;
use crate::error::{ReviewError, Result};
use crate::notify::{Mailer, OutgoingMail};
use crate::review::audit::AuditRecorder;
use crate::review::compose::compose;
use crate::review::normalize::{normalize, NormalizeOptions};
use crate::review::record::{DispatchOutcome, ReviewableRecord};
use crate::review::source::{EntityKind, IdentitySource};
use crate::review::summary::{RunOutcome, RunSummary};
use crate::review::urgency::{days_remaining, UrgencyClassifier};
use crate::review::window::{filter_window, DEFAULT_LOOKAHEAD_DAYS};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Where composed notifications go
pub enum Delivery {
    /// Send each message and audit the attempt
    Live {
        mailer: Arc<dyn Mailer>,
        recorder: AuditRecorder,
    },
    /// Classify and compose only; nothing is sent or audited
    DryRun,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub lookahead_days: i64,
    pub escalation_threshold_days: i64,
    pub normalize: NormalizeOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
            escalation_threshold_days: crate::review::urgency::DEFAULT_ESCALATION_THRESHOLD_DAYS,
            normalize: NormalizeOptions::default(),
        }
    }
}

impl From<&ReviewSettings> for PipelineOptions {
    fn from(settings: &ReviewSettings) -> Self {
        Self {
            lookahead_days: settings.lookahead_days,
            escalation_threshold_days: settings.escalation_threshold_days,
            normalize: NormalizeOptions {
                default_reviewer: settings.default_reviewer.clone(),
                stale_after_days: settings.stale_after_days,
            },
        }
    }
}

pub struct ReviewPipeline {
    source: Arc<dyn IdentitySource>,
    delivery: Delivery,
    options: PipelineOptions,
}

impl ReviewPipeline {
    pub fn new(source: Arc<dyn IdentitySource>, delivery: Delivery, options: PipelineOptions) -> Self {
        Self {
            source,
            delivery,
            options,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self.delivery, Delivery::DryRun)
    }

    /// Execute one run evaluated at `now`
    ///
    /// Fails only when no entity kind could be queried at all; in that case nothing
    /// has been sent.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        tracing::info!("Review run {} evaluated at {}", run_id, now);

        let mut raw = Vec::new();
        let mut failed_kinds = Vec::new();
        for kind in EntityKind::ALL {
            match self.source.fetch(kind).await {
                Ok(mut records) => {
                    tracing::debug!("Fetched {} {}", records.len(), kind);
                    raw.append(&mut records);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", kind, e);
                    failed_kinds.push(kind.to_string());
                }
            }
        }

        if failed_kinds.len() == EntityKind::ALL.len() {
            return Err(ReviewError::IdentityUnavailable);
        }

        let fetched = raw.len();
        let normalized = normalize(raw, &self.options.normalize);
        let normalized_count = normalized.len();
        let in_window = filter_window(normalized, self.options.lookahead_days, now);
        tracing::debug!(
            "{} fetched, {} normalized, {} in window",
            fetched,
            normalized_count,
            in_window.len()
        );

        let classifier = UrgencyClassifier::new(self.options.escalation_threshold_days);
        let mut outcomes = Vec::with_capacity(in_window.len());
        for record in &in_window {
            outcomes.push(self.process(record, &classifier, run_id, now).await);
        }

        Ok(RunSummary {
            run_id,
            evaluated_at: now,
            dry_run: self.is_dry_run(),
            failed_kinds,
            fetched,
            normalized: normalized_count,
            in_window: in_window.len(),
            outcomes,
        })
    }

    async fn process(
        &self,
        record: &ReviewableRecord,
        classifier: &UrgencyClassifier,
        run_id: Uuid,
        now: DateTime<Utc>,
    ) -> RunOutcome {
        let mut outcome = RunOutcome {
            subject_id: record.subject_id.clone(),
            subject_name: record.subject_display_name.clone(),
            access_description: record.access_description.clone(),
            assignment_kind: record.assignment_kind,
            expiration: record.expiration,
            reviewer_email: record.reviewer_email.clone(),
            days_remaining: days_remaining(record.expiration, now),
            tier: None,
            message: None,
            dispatch: None,
            audited: false,
            error: None,
        };

        let tier = match classifier.classify(record, now) {
            Ok(tier) => tier,
            Err(e) => {
                tracing::warn!("Not notifying {}: {}", record.subject_id, e);
                outcome.error = Some(e.to_string());
                return outcome;
            }
        };
        outcome.tier = Some(tier);

        let message = compose(record, tier, now);

        match &self.delivery {
            Delivery::DryRun => {
                outcome.dispatch = Some(DispatchOutcome::Skipped);
            }
            Delivery::Live { mailer, recorder } => {
                let dispatch = match mailer.send(&OutgoingMail::from(message.clone())).await {
                    Ok(()) => DispatchOutcome::Sent,
                    Err(e) => {
                        tracing::warn!("Send to {} failed: {}", record.reviewer_email, e);
                        DispatchOutcome::Failed(e.to_string())
                    }
                };

                match recorder
                    .record(record, tier, dispatch.clone(), run_id, Utc::now())
                    .await
                {
                    Ok(_) => outcome.audited = true,
                    Err(e) => outcome.error = Some(e.to_string()),
                }
                outcome.dispatch = Some(dispatch);
            }
        }

        outcome.message = Some(message);
        outcome
    }
}
