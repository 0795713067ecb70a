//! Record normalizer
//!
//! Maps the three raw shapes (role schedule instances, guest users, access review
//! instances) onto [`ReviewableRecord`]. The deadline is the only mandatory field:
//! anything without a usable one is dropped, quietly, since it is not yet up for review.

use crate::graph::directory::{DirectoryUser, RoleScheduleInstance};
use crate::review::record::{AssignmentKind, ReviewableRecord};
use crate::review::source::RawRecord;
use chrono::{DateTime, Datelike, Duration, NaiveDateTime, Utc};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Reviewer for records where the provider names none
    pub default_reviewer: Option<String>,
    /// Guest accounts fall due this many days after their last sign-in
    pub stale_after_days: i64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            default_reviewer: None,
            stale_after_days: 90,
        }
    }
}

/// Parse a Graph timestamp as a UTC instant
///
/// Offsets are honoured; naive timestamps are taken as UTC. Graph's
/// `0001-01-01T00:00:00Z` placeholder counts as absent.
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let parsed = DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })?;

    (parsed.year() > 1).then_some(parsed)
}

pub fn normalize(raw: Vec<RawRecord>, options: &NormalizeOptions) -> Vec<ReviewableRecord> {
    let mut records = Vec::with_capacity(raw.len());

    for item in raw {
        match item {
            RawRecord::RoleAssignment {
                instance,
                eligible,
                manager_email,
            } => {
                if let Some(record) = from_role(instance, eligible, manager_email, options) {
                    records.push(record);
                }
            }
            RawRecord::Guest(user) => {
                if let Some(record) = from_guest(user, options) {
                    records.push(record);
                }
            }
            RawRecord::ReviewInstance {
                definition,
                instance,
                reviewers,
            } => {
                let Some(expiration) = instance.end_date_time.as_deref().and_then(parse_instant)
                else {
                    tracing::debug!("Review instance {} has no end date, skipped", instance.id);
                    continue;
                };

                let review_name = definition
                    .display_name
                    .clone()
                    .unwrap_or_else(|| definition.id.clone());

                let mut seen = HashSet::new();
                let mut reviewer_emails: Vec<String> = reviewers
                    .iter()
                    .filter_map(|r| r.user_principal_name.clone())
                    .filter(|upn| !upn.trim().is_empty())
                    .filter(|upn| seen.insert(upn.to_lowercase()))
                    .collect();

                if reviewer_emails.is_empty() {
                    match &options.default_reviewer {
                        Some(fallback) => reviewer_emails.push(fallback.clone()),
                        None => {
                            tracing::warn!(
                                "Review '{}' ({}) has no contacted reviewers and no default reviewer is configured, skipped",
                                review_name,
                                instance.id
                            );
                            continue;
                        }
                    }
                }

                // One ledger key per (instance, reviewer): each reviewer decides independently
                for reviewer_email in reviewer_emails {
                    records.push(ReviewableRecord {
                        subject_id: format!("{}:{}", instance.id, reviewer_email),
                        subject_display_name: review_name.clone(),
                        subject_email: String::new(),
                        access_description: review_name.clone(),
                        assignment_kind: AssignmentKind::GroupMembership,
                        expiration,
                        reviewer_email,
                        manager_email: None,
                    });
                }
            }
        }
    }

    records
}

fn from_role(
    instance: RoleScheduleInstance,
    eligible: bool,
    manager_email: Option<String>,
    options: &NormalizeOptions,
) -> Option<ReviewableRecord> {
    let Some(expiration) = instance.end_date_time.as_deref().and_then(parse_instant) else {
        tracing::debug!("Role instance {} has no end date, skipped", instance.id);
        return None;
    };

    let reviewer_email = reviewer_or_warn(options, &instance.id)?;

    let principal = instance.principal.unwrap_or_default();
    let subject_id = if principal.id.is_empty() {
        instance
            .principal_id
            .clone()
            .unwrap_or_else(|| instance.id.clone())
    } else {
        principal.id.clone()
    };

    let role_name = instance
        .role_definition
        .as_ref()
        .and_then(|r| r.display_name.clone())
        .or_else(|| instance.role_definition_id.clone())
        .unwrap_or_else(|| "Unknown role".to_string());

    let access_description = match instance.directory_scope_id.as_deref() {
        Some(scope) if scope != "/" && !scope.is_empty() => {
            format!("{} (scope {})", role_name, scope)
        }
        _ => role_name,
    };

    Some(ReviewableRecord {
        subject_display_name: principal
            .display_name
            .clone()
            .unwrap_or_else(|| subject_id.clone()),
        subject_email: principal.email().unwrap_or_default().to_string(),
        subject_id,
        access_description,
        assignment_kind: if eligible {
            AssignmentKind::Eligible
        } else {
            AssignmentKind::Permanent
        },
        expiration,
        reviewer_email,
        manager_email,
    })
}

fn from_guest(user: DirectoryUser, options: &NormalizeOptions) -> Option<ReviewableRecord> {
    let last_sign_in = user.sign_in_activity.as_ref().and_then(|activity| {
        let interactive = activity
            .last_sign_in_date_time
            .as_deref()
            .and_then(parse_instant);
        let background = activity
            .last_non_interactive_sign_in_date_time
            .as_deref()
            .and_then(parse_instant);
        interactive.max(background)
    });

    let basis = last_sign_in.or_else(|| user.created_date_time.as_deref().and_then(parse_instant));
    let Some(basis) = basis else {
        tracing::debug!("Guest {} has no sign-in or creation date, skipped", user.id);
        return None;
    };
    let expiration = basis + Duration::days(options.stale_after_days);

    let reviewer_email = reviewer_or_warn(options, &user.id)?;

    let access_description = match last_sign_in {
        Some(at) => format!("Guest access (last sign-in {})", at.format("%Y-%m-%d")),
        None => "Guest access (never signed in)".to_string(),
    };

    Some(ReviewableRecord {
        subject_display_name: user.display_name.clone().unwrap_or_else(|| user.id.clone()),
        subject_email: user.email().unwrap_or_default().to_string(),
        manager_email: user.manager.as_ref().and_then(|m| m.email()),
        subject_id: user.id,
        access_description,
        assignment_kind: AssignmentKind::Guest,
        expiration,
        reviewer_email,
    })
}

fn reviewer_or_warn(options: &NormalizeOptions, id: &str) -> Option<String> {
    if options.default_reviewer.is_none() {
        tracing::warn!(
            "No reviewer for {} (set review.default_reviewer), skipped",
            id
        );
    }
    options.default_reviewer.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::directory::{
        AccessReviewDefinition, AccessReviewInstance, ContactedReviewer, ManagerRef,
        RoleDefinitionRef, SignInActivity,
    };
    use chrono::TimeZone;

    fn options() -> NormalizeOptions {
        NormalizeOptions {
            default_reviewer: Some("iam@contoso.com".into()),
            stale_after_days: 90,
        }
    }

    fn role(end: Option<&str>) -> RoleScheduleInstance {
        RoleScheduleInstance {
            id: "inst-1".into(),
            principal_id: Some("u1".into()),
            end_date_time: end.map(String::from),
            directory_scope_id: Some("/".into()),
            principal: Some(DirectoryUser {
                id: "u1".into(),
                display_name: Some("Adele Vance".into()),
                mail: Some("adele@contoso.com".into()),
                ..Default::default()
            }),
            role_definition: Some(RoleDefinitionRef {
                id: "r1".into(),
                display_name: Some("User Administrator".into()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_instant_variants() {
        let expected = Utc.with_ymd_and_hms(2026, 11, 1, 8, 0, 0).unwrap();
        assert_eq!(parse_instant("2026-11-01T08:00:00Z"), Some(expected));
        assert_eq!(parse_instant("2026-11-01T10:00:00+02:00"), Some(expected));
        assert_eq!(parse_instant("2026-11-01T08:00:00.000"), Some(expected));
        assert_eq!(parse_instant("0001-01-01T00:00:00Z"), None);
        assert_eq!(parse_instant("not a date"), None);
        assert_eq!(parse_instant(""), None);
    }

    #[test]
    fn test_role_assignment_normalized() {
        let raw = vec![RawRecord::RoleAssignment {
            instance: role(Some("2026-11-01T00:00:00Z")),
            eligible: true,
            manager_email: Some("boss@contoso.com".into()),
        }];

        let records = normalize(raw, &options());
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.subject_id, "u1");
        assert_eq!(record.subject_email, "adele@contoso.com");
        assert_eq!(record.access_description, "User Administrator");
        assert_eq!(record.assignment_kind, AssignmentKind::Eligible);
        assert_eq!(record.reviewer_email, "iam@contoso.com");
        assert_eq!(record.manager_email.as_deref(), Some("boss@contoso.com"));
    }

    #[test]
    fn test_scoped_role_mentions_scope() {
        let mut instance = role(Some("2026-11-01T00:00:00Z"));
        instance.directory_scope_id = Some("/administrativeUnits/au-1".into());
        let records = normalize(
            vec![RawRecord::RoleAssignment {
                instance,
                eligible: false,
                manager_email: None,
            }],
            &options(),
        );
        assert_eq!(
            records[0].access_description,
            "User Administrator (scope /administrativeUnits/au-1)"
        );
        assert_eq!(records[0].assignment_kind, AssignmentKind::Permanent);
    }

    #[test]
    fn test_missing_or_malformed_deadline_dropped() {
        let raw = vec![
            RawRecord::RoleAssignment {
                instance: role(None),
                eligible: false,
                manager_email: None,
            },
            RawRecord::RoleAssignment {
                instance: role(Some("soon")),
                eligible: false,
                manager_email: None,
            },
        ];
        assert!(normalize(raw, &options()).is_empty());
    }

    #[test]
    fn test_no_reviewer_drops_role_record() {
        let raw = vec![RawRecord::RoleAssignment {
            instance: role(Some("2026-11-01T00:00:00Z")),
            eligible: false,
            manager_email: None,
        }];
        assert!(normalize(raw, &NormalizeOptions::default()).is_empty());
    }

    #[test]
    fn test_guest_deadline_from_latest_sign_in() {
        let guest = DirectoryUser {
            id: "g1".into(),
            display_name: Some("Partner".into()),
            user_principal_name: Some("partner_fabrikam.com#EXT#@contoso.com".into()),
            created_date_time: Some("2025-01-01T00:00:00Z".into()),
            sign_in_activity: Some(SignInActivity {
                last_sign_in_date_time: Some("2026-08-01T00:00:00Z".into()),
                last_non_interactive_sign_in_date_time: Some("2026-08-10T00:00:00Z".into()),
            }),
            manager: Some(ManagerRef {
                mail: Some("sponsor@contoso.com".into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let records = normalize(vec![RawRecord::Guest(guest)], &options());
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].expiration,
            Utc.with_ymd_and_hms(2026, 11, 8, 0, 0, 0).unwrap()
        );
        assert_eq!(records[0].assignment_kind, AssignmentKind::Guest);
        assert_eq!(records[0].manager_email.as_deref(), Some("sponsor@contoso.com"));
        assert!(records[0].access_description.contains("2026-08-10"));
    }

    #[test]
    fn test_guest_never_signed_in_uses_creation_date() {
        let guest = DirectoryUser {
            id: "g2".into(),
            created_date_time: Some("2026-09-01T12:00:00Z".into()),
            ..Default::default()
        };
        let records = normalize(vec![RawRecord::Guest(guest)], &options());
        assert_eq!(
            records[0].expiration,
            Utc.with_ymd_and_hms(2026, 11, 30, 12, 0, 0).unwrap()
        );
        assert_eq!(records[0].access_description, "Guest access (never signed in)");
        assert_eq!(records[0].subject_display_name, "g2");
    }

    #[test]
    fn test_guest_without_any_timestamp_dropped() {
        let guest = DirectoryUser {
            id: "g3".into(),
            ..Default::default()
        };
        assert!(normalize(vec![RawRecord::Guest(guest)], &options()).is_empty());
    }

    #[test]
    fn test_review_instance_one_record_per_reviewer() {
        let raw = vec![RawRecord::ReviewInstance {
            definition: AccessReviewDefinition {
                id: "def-1".into(),
                display_name: Some("Finance group quarterly review".into()),
                status: Some("InProgress".into()),
            },
            instance: AccessReviewInstance {
                id: "ri-1".into(),
                end_date_time: Some("2026-10-30T00:00:00Z".into()),
                ..Default::default()
            },
            reviewers: vec![
                ContactedReviewer {
                    id: "a".into(),
                    user_principal_name: Some("owner1@contoso.com".into()),
                    ..Default::default()
                },
                ContactedReviewer {
                    id: "b".into(),
                    user_principal_name: Some("owner2@contoso.com".into()),
                    ..Default::default()
                },
            ],
        }];

        let records = normalize(raw, &NormalizeOptions::default());
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.assignment_kind == AssignmentKind::GroupMembership));
        assert_eq!(records[0].subject_id, "ri-1:owner1@contoso.com");
        assert_eq!(records[1].subject_id, "ri-1:owner2@contoso.com");
        assert_eq!(records[1].reviewer_email, "owner2@contoso.com");
    }

    #[test]
    fn test_review_instance_reviewers_deduplicated() {
        let reviewer = |id: &str, upn: &str| ContactedReviewer {
            id: id.into(),
            user_principal_name: Some(upn.into()),
            ..Default::default()
        };
        let raw = vec![RawRecord::ReviewInstance {
            definition: AccessReviewDefinition {
                id: "def-3".into(),
                display_name: Some("Payroll app access".into()),
                status: Some("InProgress".into()),
            },
            instance: AccessReviewInstance {
                id: "ri-3".into(),
                end_date_time: Some("2026-10-30T00:00:00Z".into()),
                ..Default::default()
            },
            reviewers: vec![
                reviewer("a", "owner1@contoso.com"),
                reviewer("b", "owner2@contoso.com"),
                reviewer("c", "Owner1@contoso.com"),
            ],
        }];

        let records = normalize(raw, &NormalizeOptions::default());
        let emails: Vec<&str> = records.iter().map(|r| r.reviewer_email.as_str()).collect();
        assert_eq!(emails, vec!["owner1@contoso.com", "owner2@contoso.com"]);
    }

    #[test]
    fn test_review_instance_falls_back_to_default_reviewer() {
        let raw = vec![RawRecord::ReviewInstance {
            definition: AccessReviewDefinition {
                id: "def-2".into(),
                ..Default::default()
            },
            instance: AccessReviewInstance {
                id: "ri-2".into(),
                end_date_time: Some("2026-10-30T00:00:00Z".into()),
                ..Default::default()
            },
            reviewers: vec![],
        }];

        let records = normalize(raw, &options());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reviewer_email, "iam@contoso.com");
        assert_eq!(records[0].access_description, "def-2");
    }
}
