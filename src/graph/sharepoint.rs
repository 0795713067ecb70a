//! SharePoint list as the durable audit store
//!
//! Each audit entry becomes one list item. Expected list columns (all single line
//! of text except where noted):
//! Title (subject id), SubjectName, AccessDescription, Expiration (date/time),
//! NotificationKind, ReviewerEmail, DecisionStatus, DispatchStatus, DispatchError,
//! RunId, EntryId, EntryTimestamp (date/time).
//!
//! Required permissions:
//! - Sites.Selected with write access granted on the target site

use crate::error::Result;
use crate::graph::GraphClient;
use crate::review::audit::{AuditEntry, AuditStore};
use crate::review::record::{DecisionStatus, DispatchOutcome, NotificationKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuditFields {
    title: String,
    subject_name: String,
    access_description: String,
    expiration: DateTime<Utc>,
    notification_kind: NotificationKind,
    reviewer_email: String,
    decision_status: DecisionStatus,
    dispatch_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dispatch_error: Option<String>,
    run_id: Uuid,
    entry_id: Uuid,
    entry_timestamp: DateTime<Utc>,
}

impl From<&AuditEntry> for AuditFields {
    fn from(entry: &AuditEntry) -> Self {
        let (dispatch_status, dispatch_error) = match &entry.dispatch {
            DispatchOutcome::Sent => ("Sent", None),
            DispatchOutcome::Failed(reason) => ("Failed", Some(reason.clone())),
            DispatchOutcome::Skipped => ("Skipped", None),
        };

        Self {
            title: entry.subject_id.clone(),
            subject_name: entry.subject_name.clone(),
            access_description: entry.access_description.clone(),
            expiration: entry.expiration,
            notification_kind: entry.notification_kind,
            reviewer_email: entry.reviewer_email.clone(),
            decision_status: entry.decision_status,
            dispatch_status: dispatch_status.to_string(),
            dispatch_error,
            run_id: entry.run_id,
            entry_id: entry.id,
            entry_timestamp: entry.timestamp,
        }
    }
}

impl From<AuditFields> for AuditEntry {
    fn from(fields: AuditFields) -> Self {
        let dispatch = match fields.dispatch_status.as_str() {
            "Sent" => DispatchOutcome::Sent,
            "Failed" => DispatchOutcome::Failed(fields.dispatch_error.unwrap_or_default()),
            _ => DispatchOutcome::Skipped,
        };

        Self {
            id: fields.entry_id,
            timestamp: fields.entry_timestamp,
            subject_id: fields.title,
            subject_name: fields.subject_name,
            access_description: fields.access_description,
            expiration: fields.expiration,
            notification_kind: fields.notification_kind,
            reviewer_email: fields.reviewer_email,
            decision_status: fields.decision_status,
            dispatch,
            run_id: fields.run_id,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateListItem {
    fields: AuditFields,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    id: String,
    fields: serde_json::Value,
}

/// Audit store writing list items via `POST /sites/{site}/lists/{list}/items`
pub struct SharePointListAuditStore {
    client: GraphClient,
    site_id: String,
    list_id: String,
}

impl SharePointListAuditStore {
    pub fn new(client: GraphClient, site_id: impl Into<String>, list_id: impl Into<String>) -> Self {
        Self {
            client,
            site_id: site_id.into(),
            list_id: list_id.into(),
        }
    }

    fn items_endpoint(&self) -> String {
        format!("sites/{}/lists/{}/items", self.site_id, self.list_id)
    }
}

#[async_trait]
impl AuditStore for SharePointListAuditStore {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        let body = CreateListItem {
            fields: AuditFields::from(entry),
        };
        let created: ListItem = self.client.post(&self.items_endpoint(), &body).await?;
        tracing::debug!("Audit list item {} created", created.id);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<AuditEntry>> {
        let items: Vec<ListItem> = self
            .client
            .get_all_pages(&format!("{}?$expand=fields", self.items_endpoint()))
            .await?;

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<AuditFields>(item.fields) {
                Ok(fields) => entries.push(AuditEntry::from(fields)),
                Err(e) => tracing::warn!("Skipping audit list item {}: {}", item.id, e),
            }
        }
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }
}
