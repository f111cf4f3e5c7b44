//! Membership Types
//!
//! Polymorphic references to members and groups, the membership row, and the
//! `Member` / `Group` capability traits implemented by concrete entity types.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{MembershipError, Result};

/// Declares a `(kind, id)` reference type.
macro_rules! entity_ref {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name {
            /// Kind tag naming the concrete entity type (e.g. `"user"`).
            pub kind: String,
            /// Entity ID within its kind.
            pub id: Uuid,
        }

        impl $name {
            pub fn new(kind: impl Into<String>, id: Uuid) -> Self {
                Self {
                    kind: kind.into(),
                    id,
                }
            }

            /// Reject references that cannot name a stored entity.
            pub fn validate(&self) -> Result<()> {
                if self.kind.trim().is_empty() {
                    return Err(MembershipError::invalid(concat!($what, " kind must not be empty")));
                }
                if self.id.is_nil() {
                    return Err(MembershipError::invalid(concat!($what, " id must not be nil")));
                }
                Ok(())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", self.kind, self.id)
            }
        }
    };
}

entity_ref!(
    /// Reference to any entity capable of belonging to groups.
    MemberRef,
    "member"
);

entity_ref!(
    /// Reference to any entity capable of having members.
    GroupRef,
    "group"
);

/// Capability implemented by entity types that can join groups.
pub trait Member {
    fn member_ref(&self) -> MemberRef;
}

/// Capability implemented by entity types that can have members.
pub trait Group {
    fn group_ref(&self) -> GroupRef;
}

impl Member for MemberRef {
    fn member_ref(&self) -> MemberRef {
        self.clone()
    }
}

impl Group for GroupRef {
    fn group_ref(&self) -> GroupRef {
        self.clone()
    }
}

/// Group membership row: the single source of truth for member/group links.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Membership {
    pub id: Uuid,
    pub member_type: String,
    pub member_id: Uuid,
    pub group_type: String,
    pub group_id: Uuid,
    /// Optional role qualifier; `None` means unscoped.
    pub membership_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Membership {
    pub fn member(&self) -> MemberRef {
        MemberRef::new(self.member_type.clone(), self.member_id)
    }

    pub fn group(&self) -> GroupRef {
        GroupRef::new(self.group_type.clone(), self.group_id)
    }
}

/// Input for creating a membership row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMembership {
    pub member: MemberRef,
    pub group: GroupRef,
    pub membership_type: Option<String>,
}

impl NewMembership {
    pub fn validate(&self) -> Result<()> {
        self.member.validate()?;
        self.group.validate()?;
        crate::role::validate_role(self.membership_type.as_deref())
    }
}

/// Validate and de-duplicate a group list. Order and duplicates are irrelevant
/// to every group-set operation, so the result is sorted.
pub fn distinct_groups<G: Group>(groups: &[G]) -> Result<Vec<GroupRef>> {
    let mut set = BTreeSet::new();
    for group in groups {
        let group = group.group_ref();
        group.validate()?;
        set.insert(group);
    }
    Ok(set.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_validation() {
        assert!(MemberRef::new("user", Uuid::new_v4()).validate().is_ok());

        let err = MemberRef::new("", Uuid::new_v4()).validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid argument: member kind must not be empty");

        let err = GroupRef::new("team", Uuid::nil()).validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid argument: group id must not be nil");
    }

    #[test]
    fn test_distinct_groups_dedupes() {
        let a = GroupRef::new("team", Uuid::new_v4());
        let b = GroupRef::new("project", Uuid::new_v4());

        let groups = distinct_groups(&[a.clone(), b.clone(), a.clone()]).unwrap();
        assert_eq!(groups.len(), 2);
        assert!(groups.contains(&a));
        assert!(groups.contains(&b));
    }

    #[test]
    fn test_same_id_different_kind_is_distinct() {
        let id = Uuid::new_v4();
        let groups =
            distinct_groups(&[GroupRef::new("team", id), GroupRef::new("project", id)]).unwrap();
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_membership_refs_and_serialization() {
        let row = Membership {
            id: Uuid::new_v4(),
            member_type: "user".into(),
            member_id: Uuid::new_v4(),
            group_type: "team".into(),
            group_id: Uuid::new_v4(),
            membership_type: Some("admin".into()),
            created_at: Utc::now(),
        };

        assert_eq!(row.member(), MemberRef::new("user", row.member_id));
        assert_eq!(row.group(), GroupRef::new("team", row.group_id));

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["membership_type"], "admin");
        assert_eq!(json["group_type"], "team");
    }
}
