//! Role-Qualified View
//!
//! Narrows any membership query to rows whose `membership_type` equals a given
//! role. An absent role leaves the wrapped query unchanged, so every predicate
//! gets a role-qualified variant without a second code path.

use sqlx::{Postgres, QueryBuilder};

use crate::error::{MembershipError, Result};

/// Role restriction applied to a membership query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum RoleScope {
    /// Any role, including unscoped memberships.
    #[default]
    Any,
    /// Only memberships whose role equals this label exactly.
    Only(String),
}

impl RoleScope {
    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Self::Any => None,
            Self::Only(role) => Some(role),
        }
    }

    /// Whether a row with the given `membership_type` passes this scope.
    pub fn matches(&self, membership_type: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Only(role) => membership_type == Some(role.as_str()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_role(self.as_deref())
    }

    /// Append `AND <column> = $n` when a role is set.
    pub(crate) fn push_condition(&self, builder: &mut QueryBuilder<'_, Postgres>, column: &str) {
        if let Self::Only(role) = self {
            builder
                .push(" AND ")
                .push(column)
                .push(" = ")
                .push_bind(role.clone());
        }
    }
}

impl From<Option<&str>> for RoleScope {
    fn from(role: Option<&str>) -> Self {
        role.map_or(Self::Any, |r| Self::Only(r.to_owned()))
    }
}

/// Roles are free-form, exact-match labels but must not be empty.
pub fn validate_role(role: Option<&str>) -> Result<()> {
    match role {
        Some(r) if r.is_empty() => Err(MembershipError::invalid(
            "membership type must not be empty",
        )),
        _ => Ok(()),
    }
}

/// A query value that can be narrowed to a single role.
pub trait RoleQualified: Sized {
    fn role_scope_mut(&mut self) -> &mut RoleScope;

    /// Restrict to `role`; `None` passes the query through unchanged.
    #[must_use]
    fn as_role(mut self, role: Option<&str>) -> Self {
        if let Some(role) = role {
            *self.role_scope_mut() = RoleScope::Only(role.to_owned());
        }
        self
    }
}
