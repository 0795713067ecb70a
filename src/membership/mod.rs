//! Group membership audit
//!
//! Expands nested group membership into one row per (root group, user) and flags
//! accounts that have gone stale. Rows are built first; CSV and HTML are rendered
//! from the finished rows.

use crate::error::Result;
use crate::report::{generate_html_report, HtmlTable, ReportMetadata};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

pub const DEFAULT_STALE_DAYS: i64 = 90;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberUser {
    pub id: String,
    pub display_name: String,
    pub user_principal_name: String,
    pub user_type: String,
    pub account_enabled: bool,
    pub last_sign_in: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupMember {
    User(MemberUser),
    Group(GroupInfo),
}

/// Directory lookups needed to walk group membership
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    async fn group(&self, group_id: &str) -> Result<GroupInfo>;

    /// Direct members only; nested groups come back as [`GroupMember::Group`]
    async fn members(&self, group_id: &str) -> Result<Vec<GroupMember>>;
}

/// One user reached from a root group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRow {
    pub group: String,
    /// Nested group path below the root, `None` for direct members
    pub via: Option<String>,
    pub user_display_name: String,
    pub user_principal_name: String,
    pub user_type: String,
    pub last_sign_in: Option<DateTime<Utc>>,
    pub stale: bool,
    pub enabled: bool,
}

impl MembershipRow {
    pub fn membership(&self) -> &str {
        self.via.as_deref().unwrap_or("Direct")
    }

    pub fn last_sign_in_display(&self) -> String {
        self.last_sign_in
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "Never".to_string())
    }
}

/// Never signed in, or not within `stale_days` of `now`
pub fn is_stale(last_sign_in: Option<DateTime<Utc>>, stale_days: i64, now: DateTime<Utc>) -> bool {
    match last_sign_in {
        Some(at) => at < now - Duration::days(stale_days),
        None => true,
    }
}

struct WorkItem {
    group_id: String,
    root: String,
    path: Vec<String>,
}

/// Walk membership of `root_ids` breadth-first
///
/// Every group id is visited at most once per call, so cyclic nesting terminates and
/// a group shared by two roots is only listed under the first one reaching it.
pub async fn expand_membership(
    directory: &dyn GroupDirectory,
    root_ids: &[String],
    stale_days: i64,
    now: DateTime<Utc>,
) -> Result<Vec<MembershipRow>> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut worklist: VecDeque<WorkItem> = VecDeque::new();
    let mut rows = Vec::new();

    for root_id in root_ids {
        if !visited.insert(root_id.clone()) {
            continue;
        }
        let root = directory.group(root_id).await?;
        worklist.push_back(WorkItem {
            group_id: root.id,
            root: root.display_name,
            path: Vec::new(),
        });

        while let Some(item) = worklist.pop_front() {
            tracing::debug!("Expanding group {} (depth {})", item.group_id, item.path.len());

            for member in directory.members(&item.group_id).await? {
                match member {
                    GroupMember::User(user) => rows.push(MembershipRow {
                        group: item.root.clone(),
                        via: (!item.path.is_empty()).then(|| item.path.join(" > ")),
                        stale: is_stale(user.last_sign_in, stale_days, now),
                        enabled: user.account_enabled,
                        user_display_name: user.display_name,
                        user_principal_name: user.user_principal_name,
                        user_type: user.user_type,
                        last_sign_in: user.last_sign_in,
                    }),
                    GroupMember::Group(nested) => {
                        if !visited.insert(nested.id.clone()) {
                            tracing::debug!("Group {} already visited", nested.id);
                            continue;
                        }
                        let mut path = item.path.clone();
                        path.push(nested.display_name);
                        worklist.push_back(WorkItem {
                            group_id: nested.id,
                            root: item.root.clone(),
                            path,
                        });
                    }
                }
            }
        }
    }

    Ok(rows)
}

#[derive(Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Group")]
    group: &'a str,
    #[serde(rename = "Membership")]
    membership: &'a str,
    #[serde(rename = "DisplayName")]
    display_name: &'a str,
    #[serde(rename = "UserPrincipalName")]
    user_principal_name: &'a str,
    #[serde(rename = "UserType")]
    user_type: &'a str,
    #[serde(rename = "LastSignIn")]
    last_sign_in: String,
    #[serde(rename = "Stale")]
    stale: bool,
    #[serde(rename = "Enabled")]
    enabled: bool,
}

pub fn render_csv(rows: &[MembershipRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(CsvRow {
            group: &row.group,
            membership: row.membership(),
            display_name: &row.user_display_name,
            user_principal_name: &row.user_principal_name,
            user_type: &row.user_type,
            last_sign_in: row
                .last_sign_in
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            stale: row.stale,
            enabled: row.enabled,
        })?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| crate::error::ReviewError::IoError(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn render_html(rows: &[MembershipRow], tenant_name: &str, now: DateTime<Utc>) -> String {
    let stale = rows.iter().filter(|r| r.stale).count();
    let disabled = rows.iter().filter(|r| !r.enabled).count();
    let guests = rows.iter().filter(|r| r.user_type == "Guest").count();

    let mut table = HtmlTable::new(
        "Members",
        &[
            "Group",
            "Membership",
            "User",
            "UPN",
            "Type",
            "Last sign-in",
            "Stale",
            "Enabled",
        ],
    );
    for row in rows {
        table.push_text_row(&[
            &row.group,
            row.membership(),
            &row.user_display_name,
            &row.user_principal_name,
            &row.user_type,
            &row.last_sign_in_display(),
            if row.stale { "Yes" } else { "No" },
            if row.enabled { "Yes" } else { "No" },
        ]);
    }

    generate_html_report(
        &ReportMetadata {
            title: "Group Membership Audit".to_string(),
            tenant_name: tenant_name.to_string(),
            generated_at: now,
        },
        &[
            ("Members".to_string(), rows.len().to_string()),
            ("Stale".to_string(), stale.to_string()),
            ("Disabled".to_string(), disabled.to_string()),
            ("Guests".to_string(), guests.to_string()),
        ],
        &[table],
    )
}
