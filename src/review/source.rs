//! Identity provider query seam

use crate::error::Result;
use crate::graph::directory::{
    AccessReviewDefinition, AccessReviewInstance, ContactedReviewer, DirectoryUser,
    RoleScheduleInstance,
};
use async_trait::async_trait;
use std::fmt;

/// Entity kinds queried on every run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    RoleAssignments,
    GuestUsers,
    ReviewInstances,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::RoleAssignments,
        EntityKind::GuestUsers,
        EntityKind::ReviewInstances,
    ];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::RoleAssignments => write!(f, "role assignments"),
            EntityKind::GuestUsers => write!(f, "guest users"),
            EntityKind::ReviewInstances => write!(f, "access review instances"),
        }
    }
}

/// A record as the identity provider returned it
#[derive(Debug, Clone)]
pub enum RawRecord {
    RoleAssignment {
        instance: RoleScheduleInstance,
        eligible: bool,
        manager_email: Option<String>,
    },
    Guest(DirectoryUser),
    ReviewInstance {
        definition: AccessReviewDefinition,
        instance: AccessReviewInstance,
        reviewers: Vec<ContactedReviewer>,
    },
}

/// Read-only identity query interface
#[async_trait]
pub trait IdentitySource: Send + Sync {
    async fn fetch(&self, kind: EntityKind) -> Result<Vec<RawRecord>>;
}
