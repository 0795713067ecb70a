//! Audit trail for access review notifications
//!
//! Append-only: every notification attempt writes one [`AuditEntry`], and reviewer
//! decisions are recorded as further entries rather than edits. The current decision
//! for a subject is whatever its latest entry says.
//!
//! Backends implement [`AuditStore`]:
//! - [`JsonlAuditStore`] - one JSON document per line in a local file
//! - [`InMemoryAuditStore`] - for tests
//! - [`crate::graph::sharepoint::SharePointListAuditStore`] - SharePoint list items

use crate::error::{ReviewError, Result};
use crate::review::record::{
    DecisionStatus, DispatchOutcome, NotificationKind, ReviewableRecord, UrgencyTier,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One immutable audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub subject_id: String,
    pub subject_name: String,
    pub access_description: String,
    pub expiration: DateTime<Utc>,
    pub notification_kind: NotificationKind,
    pub reviewer_email: String,
    pub decision_status: DecisionStatus,
    pub dispatch: DispatchOutcome,
    pub run_id: Uuid,
}

impl AuditEntry {
    /// Entry for a notification attempt; decisions always start out Pending
    pub fn for_notification(
        record: &ReviewableRecord,
        tier: UrgencyTier,
        dispatch: DispatchOutcome,
        run_id: Uuid,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: at,
            subject_id: record.subject_id.clone(),
            subject_name: record.subject_display_name.clone(),
            access_description: record.access_description.clone(),
            expiration: record.expiration,
            notification_kind: tier.notification_kind(),
            reviewer_email: record.reviewer_email.clone(),
            decision_status: DecisionStatus::Pending,
            dispatch,
            run_id,
        }
    }

    fn key(&self) -> (&str, &str) {
        (&self.subject_id, &self.access_description)
    }
}

/// Trait for audit storage backends
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append one entry. Existing entries are never touched.
    async fn append(&self, entry: &AuditEntry) -> Result<()>;

    /// All entries in append order
    async fn entries(&self) -> Result<Vec<AuditEntry>>;
}

/// In-memory audit store for testing
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditStore {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<AuditEntry>> {
        Ok(self.entries.read().await.clone())
    }
}

/// Append-only JSON Lines file
#[derive(Debug, Clone)]
pub struct JsonlAuditStore {
    path: PathBuf,
}

impl JsonlAuditStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl AuditStore for JsonlAuditStore {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<AuditEntry>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }

        let contents = tokio::fs::read_to_string(&self.path).await?;
        let mut entries = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(
                    "Skipping unreadable audit line {} in {}: {}",
                    line_no + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(entries)
    }
}

/// Writes one entry per notification attempt; store failures are logged, not raised
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Record a notification attempt regardless of whether the send succeeded
    ///
    /// Returns the entry when it was stored, or the write error for the caller's tally.
    pub async fn record(
        &self,
        record: &ReviewableRecord,
        tier: UrgencyTier,
        dispatch: DispatchOutcome,
        run_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<AuditEntry> {
        let entry = AuditEntry::for_notification(record, tier, dispatch, run_id, at);

        match self.store.append(&entry).await {
            Ok(()) => {
                tracing::debug!(
                    "Audit entry {} for {} ({})",
                    entry.id,
                    entry.subject_id,
                    entry.notification_kind
                );
                Ok(entry)
            }
            Err(e) => {
                tracing::warn!(
                    "Audit write failed for {} / {}: {}",
                    entry.subject_id,
                    entry.access_description,
                    e
                );
                Err(ReviewError::AuditWriteFailure(e.to_string()))
            }
        }
    }
}

/// Ledger view of one (subject, access) key
#[derive(Debug, Clone, Copy)]
pub struct LedgerState<'a> {
    /// Most recent entry of any kind
    pub latest: &'a AuditEntry,
    /// Most recent reviewer decision, if any
    pub decision: Option<&'a AuditEntry>,
}

impl LedgerState<'_> {
    /// Current decision: the latest decision entry, Pending when there is none
    ///
    /// Notification entries always carry Pending and never reopen a decision.
    pub fn status(&self) -> DecisionStatus {
        self.decision
            .map_or(DecisionStatus::Pending, |d| d.decision_status)
    }
}

/// Fold entries into one state per (subject, access), in first-seen order
///
/// Later timestamps win; equal timestamps go to append order.
pub fn ledger_states(entries: &[AuditEntry]) -> Vec<LedgerState<'_>> {
    let mut states: HashMap<(&str, &str), LedgerState<'_>> = HashMap::new();
    let mut order: Vec<(&str, &str)> = Vec::new();

    for entry in entries {
        let key = entry.key();
        let is_decision = entry.notification_kind == NotificationKind::Decision;
        match states.get_mut(&key) {
            Some(state) => {
                if entry.timestamp >= state.latest.timestamp {
                    state.latest = entry;
                }
                if is_decision
                    && state
                        .decision
                        .map_or(true, |d| entry.timestamp >= d.timestamp)
                {
                    state.decision = Some(entry);
                }
            }
            None => {
                order.push(key);
                states.insert(
                    key,
                    LedgerState {
                        latest: entry,
                        decision: is_decision.then_some(entry),
                    },
                );
            }
        }
    }

    order.into_iter().filter_map(|key| states.get(&key).copied()).collect()
}

/// Latest entry per (subject, access)
pub fn latest_entries(entries: &[AuditEntry]) -> Vec<&AuditEntry> {
    ledger_states(entries).into_iter().map(|s| s.latest).collect()
}

/// Undecided access whose latest known expiration has already passed
///
/// Nothing is revoked automatically; these are only surfaced for follow-up.
pub fn overdue_pending(entries: &[AuditEntry], now: DateTime<Utc>) -> Vec<&AuditEntry> {
    ledger_states(entries)
        .into_iter()
        .filter(|s| s.status() == DecisionStatus::Pending && s.latest.expiration < now)
        .map(|s| s.latest)
        .collect()
}

/// Append a reviewer decision for `(subject_id, access_description)`
///
/// The transition is checked against the current decision, not the latest entry.
pub async fn record_decision(
    store: &dyn AuditStore,
    subject_id: &str,
    access_description: &str,
    decision: DecisionStatus,
    decided_by: &str,
    at: DateTime<Utc>,
) -> Result<AuditEntry> {
    let entries = store.entries().await?;
    let state = ledger_states(&entries)
        .into_iter()
        .find(|s| {
            s.latest.subject_id == subject_id && s.latest.access_description == access_description
        })
        .ok_or_else(|| ReviewError::InvalidTransition {
            from: "no recorded notification".into(),
            to: decision.to_string(),
        })?;

    let current = state.status();
    if !current.can_transition_to(decision) {
        return Err(ReviewError::InvalidTransition {
            from: current.to_string(),
            to: decision.to_string(),
        });
    }

    let entry = AuditEntry {
        id: Uuid::new_v4(),
        timestamp: at,
        notification_kind: NotificationKind::Decision,
        reviewer_email: decided_by.to_string(),
        decision_status: decision,
        dispatch: DispatchOutcome::Skipped,
        ..state.latest.clone()
    };

    store.append(&entry).await?;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::record::AssignmentKind;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 6, 0, 0).unwrap()
    }

    fn record(id: &str, days: i64) -> ReviewableRecord {
        ReviewableRecord {
            subject_id: id.into(),
            subject_display_name: format!("User {}", id),
            subject_email: format!("{}@contoso.com", id),
            access_description: "Global Reader".into(),
            assignment_kind: AssignmentKind::Permanent,
            expiration: now() + Duration::days(days),
            reviewer_email: "iam@contoso.com".into(),
            manager_email: None,
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl AuditStore for BrokenStore {
        async fn append(&self, _entry: &AuditEntry) -> Result<()> {
            Err(ReviewError::GraphApiError("HTTP 503".into()))
        }

        async fn entries(&self) -> Result<Vec<AuditEntry>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_recorder_writes_pending_entry() {
        let store = Arc::new(InMemoryAuditStore::new());
        let recorder = AuditRecorder::new(store.clone());
        let run_id = Uuid::new_v4();

        let entry = recorder
            .record(
                &record("u1", 5),
                UrgencyTier::Escalation,
                DispatchOutcome::Failed("550 mailbox unavailable".into()),
                run_id,
                now(),
            )
            .await
            .unwrap();

        assert_eq!(entry.decision_status, DecisionStatus::Pending);
        assert_eq!(entry.notification_kind, NotificationKind::Escalation);
        assert_eq!(entry.run_id, run_id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_recorder_reports_store_failure() {
        let recorder = AuditRecorder::new(Arc::new(BrokenStore));
        let result = recorder
            .record(
                &record("u1", 5),
                UrgencyTier::Standard,
                DispatchOutcome::Sent,
                Uuid::new_v4(),
                now(),
            )
            .await;
        assert!(matches!(result, Err(ReviewError::AuditWriteFailure(_))));
    }

    #[tokio::test]
    async fn test_jsonl_store_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlAuditStore::new(dir.path().join("audit").join("log.jsonl"));
        let run_id = Uuid::new_v4();

        for id in ["u1", "u2"] {
            let entry = AuditEntry::for_notification(
                &record(id, 10),
                UrgencyTier::Standard,
                DispatchOutcome::Sent,
                run_id,
                now(),
            );
            store.append(&entry).await.unwrap();
        }

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw.lines().count(), 2);

        let entries = store.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].subject_id, "u2");
        assert_eq!(entries[0].dispatch, DispatchOutcome::Sent);
    }

    #[tokio::test]
    async fn test_jsonl_store_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let entry = AuditEntry::for_notification(
            &record("u1", 10),
            UrgencyTier::Standard,
            DispatchOutcome::Sent,
            Uuid::new_v4(),
            now(),
        );
        std::fs::write(
            &path,
            format!("{}\nnot json\n\n", serde_json::to_string(&entry).unwrap()),
        )
        .unwrap();

        let entries = JsonlAuditStore::new(&path).entries().await.unwrap();
        assert_eq!(entries, vec![entry]);
    }

    #[tokio::test]
    async fn test_missing_jsonl_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlAuditStore::new(dir.path().join("none.jsonl"));
        assert!(store.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decision_appends_new_entry() {
        let store = InMemoryAuditStore::new();
        let original = AuditEntry::for_notification(
            &record("u1", 5),
            UrgencyTier::Escalation,
            DispatchOutcome::Sent,
            Uuid::new_v4(),
            now(),
        );
        store.append(&original).await.unwrap();

        let decided = record_decision(
            &store,
            "u1",
            "Global Reader",
            DecisionStatus::Approved,
            "owner@contoso.com",
            now() + Duration::hours(2),
        )
        .await
        .unwrap();

        assert_eq!(decided.decision_status, DecisionStatus::Approved);
        assert_eq!(decided.notification_kind, NotificationKind::Decision);
        assert_eq!(decided.run_id, original.run_id);

        let entries = store.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        // the original entry is untouched
        assert_eq!(entries[0], original);
    }

    #[tokio::test]
    async fn test_terminal_decision_cannot_change() {
        let store = InMemoryAuditStore::new();
        store
            .append(&AuditEntry::for_notification(
                &record("u1", 5),
                UrgencyTier::Escalation,
                DispatchOutcome::Sent,
                Uuid::new_v4(),
                now(),
            ))
            .await
            .unwrap();

        record_decision(&store, "u1", "Global Reader", DecisionStatus::Revoked, "a", now())
            .await
            .unwrap();
        let err = record_decision(
            &store,
            "u1",
            "Global Reader",
            DecisionStatus::Approved,
            "a",
            now() + Duration::minutes(1),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ReviewError::InvalidTransition { .. }));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_decision_for_unknown_subject_rejected() {
        let store = InMemoryAuditStore::new();
        let err = record_decision(&store, "ghost", "x", DecisionStatus::Approved, "a", now())
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidTransition { .. }));
    }

    #[test]
    fn test_overdue_pending_only_flags_latest_pending() {
        let run_id = Uuid::new_v4();
        let expired_pending = AuditEntry::for_notification(
            &record("u1", -1),
            UrgencyTier::Escalation,
            DispatchOutcome::Sent,
            run_id,
            now() - Duration::days(3),
        );
        let expired_then_approved = AuditEntry::for_notification(
            &record("u2", -1),
            UrgencyTier::Escalation,
            DispatchOutcome::Sent,
            run_id,
            now() - Duration::days(3),
        );
        let approval = AuditEntry {
            id: Uuid::new_v4(),
            timestamp: now() - Duration::days(2),
            decision_status: DecisionStatus::Approved,
            notification_kind: NotificationKind::Decision,
            ..expired_then_approved.clone()
        };
        let future_pending = AuditEntry::for_notification(
            &record("u3", 4),
            UrgencyTier::Escalation,
            DispatchOutcome::Sent,
            run_id,
            now(),
        );

        let entries = vec![expired_pending, expired_then_approved, approval, future_pending];
        let overdue = overdue_pending(&entries, now());
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].subject_id, "u1");
    }

    fn notification(id: &str, days: i64, at: DateTime<Utc>) -> AuditEntry {
        AuditEntry::for_notification(
            &record(id, days),
            UrgencyTier::Escalation,
            DispatchOutcome::Sent,
            Uuid::new_v4(),
            at,
        )
    }

    #[tokio::test]
    async fn test_renotification_does_not_reopen_decision() {
        let store = InMemoryAuditStore::new();
        store.append(&notification("u1", 5, now())).await.unwrap();
        record_decision(
            &store,
            "u1",
            "Global Reader",
            DecisionStatus::Approved,
            "owner@contoso.com",
            now() + Duration::hours(1),
        )
        .await
        .unwrap();

        // next day's run notifies the same access again
        store
            .append(&notification("u1", 4, now() + Duration::days(1)))
            .await
            .unwrap();

        let err = record_decision(
            &store,
            "u1",
            "Global Reader",
            DecisionStatus::Revoked,
            "owner@contoso.com",
            now() + Duration::days(1) + Duration::hours(1),
        )
        .await
        .unwrap_err();

        match err {
            ReviewError::InvalidTransition { from, to } => {
                assert_eq!(from, "Approved");
                assert_eq!(to, "Revoked");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(store.len().await, 3);

        let entries = store.entries().await.unwrap();
        let states = ledger_states(&entries);
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].status(), DecisionStatus::Approved);
        assert_eq!(states[0].latest.notification_kind, NotificationKind::Escalation);
    }

    #[tokio::test]
    async fn test_decision_after_renotification_of_pending() {
        let store = InMemoryAuditStore::new();
        store.append(&notification("u1", 5, now())).await.unwrap();
        store
            .append(&notification("u1", 4, now() + Duration::days(1)))
            .await
            .unwrap();

        let decided = record_decision(
            &store,
            "u1",
            "Global Reader",
            DecisionStatus::Revoked,
            "owner@contoso.com",
            now() + Duration::days(1) + Duration::hours(1),
        )
        .await
        .unwrap();
        assert_eq!(decided.decision_status, DecisionStatus::Revoked);
    }

    #[test]
    fn test_approved_then_renotified_is_not_overdue() {
        let first = notification("u1", -1, now() - Duration::days(3));
        let approval = AuditEntry {
            id: Uuid::new_v4(),
            timestamp: now() - Duration::days(2) - Duration::hours(12),
            decision_status: DecisionStatus::Approved,
            notification_kind: NotificationKind::Decision,
            dispatch: DispatchOutcome::Skipped,
            ..first.clone()
        };
        let renotified = AuditEntry {
            id: Uuid::new_v4(),
            timestamp: now() - Duration::days(2),
            ..first.clone()
        };

        let entries = vec![first, approval, renotified];
        assert!(overdue_pending(&entries, now()).is_empty());
        assert_eq!(latest_entries(&entries)[0].notification_kind, NotificationKind::Escalation);
    }
}
