//! Entra ID directory queries used by the access review run
//!
//! Covers:
//! - PIM role assignment and eligibility schedule instances
//! - Guest users with sign-in activity
//! - Access review definitions, in-progress instances and contacted reviewers
//!
//! Timestamps are kept as strings here; the normalizer decides what is usable.
//!
//! Required permissions:
//! - RoleManagement.Read.Directory
//! - User.Read.All, AuditLog.Read.All (signInActivity)
//! - AccessReview.Read.All

use crate::error::{ReviewError, Result};
use crate::graph::GraphClient;
use crate::review::source::{EntityKind, IdentitySource, RawRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// User (or any directory object expanded as one)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    pub id: String,
    #[serde(rename = "@odata.type", default)]
    pub odata_type: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub account_enabled: Option<bool>,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub sign_in_activity: Option<SignInActivity>,
    #[serde(default)]
    pub manager: Option<ManagerRef>,
}

impl DirectoryUser {
    /// Mail address, falling back to the UPN
    pub fn email(&self) -> Option<&str> {
        self.mail
            .as_deref()
            .or(self.user_principal_name.as_deref())
            .filter(|m| !m.trim().is_empty())
    }

    pub fn is_user(&self) -> bool {
        self.odata_type
            .as_deref()
            .map_or(true, |t| t == "#microsoft.graph.user")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInActivity {
    #[serde(default)]
    pub last_sign_in_date_time: Option<String>,
    #[serde(default)]
    pub last_non_interactive_sign_in_date_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
}

impl ManagerRef {
    pub fn email(&self) -> Option<String> {
        self.mail
            .clone()
            .or_else(|| self.user_principal_name.clone())
            .filter(|m| !m.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinitionRef {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// roleAssignmentScheduleInstance / roleEligibilityScheduleInstance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleScheduleInstance {
    pub id: String,
    #[serde(default)]
    pub principal_id: Option<String>,
    #[serde(default)]
    pub role_definition_id: Option<String>,
    #[serde(default)]
    pub directory_scope_id: Option<String>,
    #[serde(default)]
    pub start_date_time: Option<String>,
    #[serde(default)]
    pub end_date_time: Option<String>,
    #[serde(default)]
    pub member_type: Option<String>,
    #[serde(default)]
    pub principal: Option<DirectoryUser>,
    #[serde(default)]
    pub role_definition: Option<RoleDefinitionRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessReviewDefinition {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessReviewInstance {
    pub id: String,
    #[serde(default)]
    pub start_date_time: Option<String>,
    #[serde(default)]
    pub end_date_time: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactedReviewer {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
}

const GUEST_SELECT: &str =
    "id,displayName,mail,userPrincipalName,userType,accountEnabled,createdDateTime,signInActivity";

/// Identity source backed by Microsoft Graph
pub struct GraphIdentitySource {
    client: GraphClient,
}

impl GraphIdentitySource {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    async fn role_instances(&self, endpoint: &str, eligible: bool) -> Result<Vec<RawRecord>> {
        let instances: Vec<RoleScheduleInstance> = self
            .client
            .get_all_pages(&format!("{}?$expand=principal,roleDefinition", endpoint))
            .await?;

        // One manager lookup per principal per run
        let mut managers: HashMap<String, Option<String>> = HashMap::new();
        let mut records = Vec::with_capacity(instances.len());

        for instance in instances {
            let manager_email = match instance.principal.as_ref().filter(|p| p.is_user()) {
                Some(principal) => {
                    if !managers.contains_key(&principal.id) {
                        let found = self.manager_email(&principal.id).await;
                        managers.insert(principal.id.clone(), found);
                    }
                    managers.get(&principal.id).cloned().flatten()
                }
                None => None,
            };

            records.push(RawRecord::RoleAssignment {
                instance,
                eligible,
                manager_email,
            });
        }

        Ok(records)
    }

    /// Manager lookup; a user without a manager answers 404, which is not an error here
    async fn manager_email(&self, user_id: &str) -> Option<String> {
        match self
            .client
            .get::<ManagerRef>(&format!(
                "users/{}/manager?$select=id,mail,userPrincipalName",
                user_id
            ))
            .await
        {
            Ok(manager) => manager.email(),
            Err(e) => {
                tracing::debug!("No manager for {}: {}", user_id, e);
                None
            }
        }
    }

    async fn guests(&self) -> Result<Vec<RawRecord>> {
        let endpoint = format!(
            "users?$filter={}&$select={}&$expand=manager($select=id,mail,userPrincipalName)",
            urlencoding::encode("userType eq 'Guest'"),
            GUEST_SELECT
        );
        let users: Vec<DirectoryUser> = self.client.get_all_pages(&endpoint).await?;
        Ok(users.into_iter().map(RawRecord::Guest).collect())
    }

    async fn review_instances(&self) -> Result<Vec<RawRecord>> {
        let definitions: Vec<AccessReviewDefinition> = self
            .client
            .get_all_pages("identityGovernance/accessReviews/definitions?$select=id,displayName,status")
            .await?;

        let mut records = Vec::new();
        for definition in definitions {
            let instances: Vec<AccessReviewInstance> = self
                .client
                .get_all_pages(&format!(
                    "identityGovernance/accessReviews/definitions/{}/instances?$filter={}",
                    definition.id,
                    urlencoding::encode("status eq 'InProgress'")
                ))
                .await?;

            for instance in instances {
                let reviewers: Vec<ContactedReviewer> = self
                    .client
                    .get_all_pages(&format!(
                        "identityGovernance/accessReviews/definitions/{}/instances/{}/contactedReviewers",
                        definition.id, instance.id
                    ))
                    .await?;

                records.push(RawRecord::ReviewInstance {
                    definition: definition.clone(),
                    instance,
                    reviewers,
                });
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl IdentitySource for GraphIdentitySource {
    async fn fetch(&self, kind: EntityKind) -> Result<Vec<RawRecord>> {
        let result = match kind {
            EntityKind::RoleAssignments => {
                let mut records = self
                    .role_instances("roleManagement/directory/roleAssignmentScheduleInstances", false)
                    .await?;
                records.extend(
                    self.role_instances(
                        "roleManagement/directory/roleEligibilityScheduleInstances",
                        true,
                    )
                    .await?,
                );
                Ok(records)
            }
            EntityKind::GuestUsers => self.guests().await,
            EntityKind::ReviewInstances => self.review_instances().await,
        };

        result.map_err(|e| ReviewError::QueryFailure {
            kind: kind.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_instance_deserializes_with_expansions() {
        let json = serde_json::json!({
            "id": "inst-1",
            "principalId": "u1",
            "roleDefinitionId": "r1",
            "endDateTime": "2026-11-01T00:00:00Z",
            "memberType": "Direct",
            "principal": {
                "@odata.type": "#microsoft.graph.user",
                "id": "u1",
                "displayName": "Adele Vance",
                "userPrincipalName": "adele@contoso.com"
            },
            "roleDefinition": { "id": "r1", "displayName": "Global Administrator" }
        });

        let instance: RoleScheduleInstance = serde_json::from_value(json).unwrap();
        let principal = instance.principal.unwrap();
        assert!(principal.is_user());
        assert_eq!(principal.email(), Some("adele@contoso.com"));
        assert_eq!(
            instance.role_definition.unwrap().display_name.as_deref(),
            Some("Global Administrator")
        );
    }

    #[test]
    fn test_group_principal_is_not_user() {
        let principal = DirectoryUser {
            id: "g1".into(),
            odata_type: Some("#microsoft.graph.group".into()),
            ..Default::default()
        };
        assert!(!principal.is_user());
    }

    #[test]
    fn test_blank_mail_is_ignored() {
        let manager = ManagerRef {
            mail: Some(" ".into()),
            ..Default::default()
        };
        assert_eq!(manager.email(), None);
    }
}
