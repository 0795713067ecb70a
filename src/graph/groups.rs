//! Group membership lookups for the membership audit
//!
//! Required permissions:
//! - GroupMember.Read.All
//! - User.Read.All, AuditLog.Read.All (signInActivity)

use crate::error::Result;
use crate::graph::directory::DirectoryUser;
use crate::graph::GraphClient;
use crate::membership::{GroupDirectory, GroupInfo, GroupMember, MemberUser};
use crate::review::normalize::parse_instant;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::Mutex;

const MEMBER_SELECT: &str = "id,displayName,mail,userPrincipalName,userType,accountEnabled";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupRef {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// Latest of interactive and non-interactive sign-in
fn last_sign_in(user: &DirectoryUser) -> Option<DateTime<Utc>> {
    let activity = user.sign_in_activity.as_ref()?;
    [
        activity.last_sign_in_date_time.as_deref(),
        activity.last_non_interactive_sign_in_date_time.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter_map(parse_instant)
    .max()
}

/// Group directory backed by Microsoft Graph
///
/// `signInActivity` is not selectable on `/groups/{id}/members`, so it is looked up
/// per user and cached for the lifetime of this value.
pub struct GraphGroupDirectory {
    client: GraphClient,
    sign_ins: Mutex<HashMap<String, Option<DateTime<Utc>>>>,
}

impl GraphGroupDirectory {
    pub fn new(client: GraphClient) -> Self {
        Self {
            client,
            sign_ins: Mutex::new(HashMap::new()),
        }
    }

    async fn sign_in_for(&self, user_id: &str) -> Option<DateTime<Utc>> {
        if let Some(cached) = self.sign_ins.lock().await.get(user_id) {
            return *cached;
        }

        let found = match self
            .client
            .get::<DirectoryUser>(&format!("users/{}?$select=id,signInActivity", user_id))
            .await
        {
            Ok(user) => last_sign_in(&user),
            Err(e) => {
                tracing::debug!("No sign-in activity for {}: {}", user_id, e);
                None
            }
        };

        self.sign_ins.lock().await.insert(user_id.to_string(), found);
        found
    }
}

#[async_trait]
impl GroupDirectory for GraphGroupDirectory {
    async fn group(&self, group_id: &str) -> Result<GroupInfo> {
        let group: GroupRef = self
            .client
            .get(&format!("groups/{}?$select=id,displayName", group_id))
            .await?;
        Ok(GroupInfo {
            display_name: group.display_name.unwrap_or_else(|| group.id.clone()),
            id: group.id,
        })
    }

    async fn members(&self, group_id: &str) -> Result<Vec<GroupMember>> {
        let objects: Vec<DirectoryUser> = self
            .client
            .get_all_pages(&format!("groups/{}/members?$select={}", group_id, MEMBER_SELECT))
            .await?;

        let mut members = Vec::with_capacity(objects.len());
        for object in objects {
            match object.odata_type.as_deref() {
                Some("#microsoft.graph.group") => members.push(GroupMember::Group(GroupInfo {
                    display_name: object.display_name.unwrap_or_else(|| object.id.clone()),
                    id: object.id,
                })),
                _ if object.is_user() => {
                    let last_sign_in = self.sign_in_for(&object.id).await;
                    members.push(GroupMember::User(MemberUser {
                        display_name: object.display_name.clone().unwrap_or_default(),
                        user_principal_name: object.user_principal_name.clone().unwrap_or_default(),
                        user_type: object.user_type.clone().unwrap_or_else(|| "Member".into()),
                        account_enabled: object.account_enabled.unwrap_or(true),
                        last_sign_in,
                        id: object.id,
                    }))
                }
                other => tracing::debug!(
                    "Skipping member {} of type {}",
                    object.id,
                    other.unwrap_or("unknown")
                ),
            }
        }

        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::directory::SignInActivity;

    #[test]
    fn test_last_sign_in_takes_latest() {
        let user = DirectoryUser {
            id: "u1".into(),
            sign_in_activity: Some(SignInActivity {
                last_sign_in_date_time: Some("2026-06-01T10:00:00Z".into()),
                last_non_interactive_sign_in_date_time: Some("2026-09-01T10:00:00Z".into()),
            }),
            ..Default::default()
        };
        assert_eq!(
            last_sign_in(&user).unwrap().to_rfc3339(),
            "2026-09-01T10:00:00+00:00"
        );
    }

    #[test]
    fn test_last_sign_in_ignores_placeholder_dates() {
        let user = DirectoryUser {
            id: "u1".into(),
            sign_in_activity: Some(SignInActivity {
                last_sign_in_date_time: Some("0001-01-01T00:00:00Z".into()),
                last_non_interactive_sign_in_date_time: None,
            }),
            ..Default::default()
        };
        assert!(last_sign_in(&user).is_none());
    }
}
