//! Group-Set Query Builder
//!
//! Collection-level filters answering "which of these members belong to
//! group G / any of / all of / only these groups". A [`GroupSetQuery`] is a
//! plain value: it is narrowed by the role view, then handed to a
//! [`MembershipStore`] and executed once, either as a single grouped SQL
//! statement ([`GroupSetQuery::to_sql`]) or by [`GroupSetQuery::evaluate`]
//! over in-memory rows.
//!
//! Empty group lists and empty member selections short-circuit to the empty
//! result without touching the store.

mod eval;
mod sql;

use uuid::Uuid;

pub(crate) use sql::{push_group_set, MEMBERSHIP_COLUMNS};

use crate::error::{MembershipError, Result};
use crate::role::{validate_role, RoleQualified, RoleScope};
use crate::store::MembershipStore;
use crate::types::{distinct_groups, Group, GroupRef, Member, MemberRef};

/// The collection of members a query filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberScope {
    /// Every member of this kind that has at least one membership.
    Kind(String),
    /// An explicit member set (may mix kinds).
    Members(Vec<MemberRef>),
}

impl MemberScope {
    pub fn kind(kind: impl Into<String>) -> Self {
        Self::Kind(kind.into())
    }

    /// Scope over explicit members, de-duplicated by identity.
    pub fn of<M: Member>(members: &[M]) -> Result<Self> {
        let mut refs: Vec<MemberRef> = members.iter().map(Member::member_ref).collect();
        for member in &refs {
            member.validate()?;
        }
        refs.sort();
        refs.dedup();
        Ok(Self::Members(refs))
    }

    pub fn contains(&self, member: &MemberRef) -> bool {
        match self {
            Self::Kind(kind) => member.kind == *kind,
            Self::Members(refs) => refs.binary_search(member).is_ok(),
        }
    }

    pub fn is_empty_selection(&self) -> bool {
        matches!(self, Self::Members(refs) if refs.is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Kind(kind) if kind.trim().is_empty() => {
                Err(MembershipError::invalid("member kind must not be empty"))
            }
            Self::Kind(_) => Ok(()),
            Self::Members(refs) => refs.iter().try_for_each(MemberRef::validate),
        }
    }

    /// Split explicit members into parallel kind/id arrays for `UNNEST`.
    pub(crate) fn unzip(refs: &[MemberRef]) -> (Vec<String>, Vec<Uuid>) {
        refs.iter().map(|m| (m.kind.clone(), m.id)).unzip()
    }
}

/// The set of groups a predicate is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupSet {
    /// A distinct, sorted list of groups.
    Explicit(Vec<GroupRef>),
    /// Every group held (under any role) by members of another scope.
    HeldBy(MemberScope),
}

impl GroupSet {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Explicit(groups) => groups.is_empty(),
            Self::HeldBy(scope) => scope.is_empty_selection(),
        }
    }
}

/// Group-set relationship a member must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupPredicate {
    /// At least one membership to any group in the set.
    Any(GroupSet),
    /// Memberships cover every group in the list.
    All(Vec<GroupRef>),
    /// The member's distinct group set equals the list exactly.
    Only(Vec<GroupRef>),
    /// No group constraint: any membership passing the role scope.
    Unrestricted,
}

/// A collection-level group-set filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSetQuery {
    members: MemberScope,
    predicate: GroupPredicate,
    role: RoleScope,
}

impl GroupSetQuery {
    fn new(members: MemberScope, predicate: GroupPredicate) -> Result<Self> {
        members.validate()?;
        if let GroupPredicate::Any(GroupSet::HeldBy(other)) = &predicate {
            other.validate()?;
        }
        Ok(Self {
            members,
            predicate,
            role: RoleScope::Any,
        })
    }

    pub fn in_group<G: Group + ?Sized>(members: MemberScope, group: &G) -> Result<Self> {
        let group = group.group_ref();
        group.validate()?;
        Self::new(members, GroupPredicate::Any(GroupSet::Explicit(vec![group])))
    }

    pub fn in_any_group<G: Group>(members: MemberScope, groups: &[G]) -> Result<Self> {
        let groups = distinct_groups(groups)?;
        Self::new(members, GroupPredicate::Any(GroupSet::Explicit(groups)))
    }

    pub fn in_all_groups<G: Group>(members: MemberScope, groups: &[G]) -> Result<Self> {
        Self::new(members, GroupPredicate::All(distinct_groups(groups)?))
    }

    pub fn in_only_groups<G: Group>(members: MemberScope, groups: &[G]) -> Result<Self> {
        Self::new(members, GroupPredicate::Only(distinct_groups(groups)?))
    }

    /// Members of `members` sharing any group with members of `other`.
    pub fn shares_any_group(members: MemberScope, other: MemberScope) -> Result<Self> {
        Self::new(members, GroupPredicate::Any(GroupSet::HeldBy(other)))
    }

    /// Members holding at least one membership with `role`, in any group.
    pub fn holding_role(members: MemberScope, role: &str) -> Result<Self> {
        validate_role(Some(role))?;
        Ok(Self::new(members, GroupPredicate::Unrestricted)?.as_role(Some(role)))
    }

    pub const fn members(&self) -> &MemberScope {
        &self.members
    }

    pub const fn predicate(&self) -> &GroupPredicate {
        &self.predicate
    }

    pub const fn role(&self) -> &RoleScope {
        &self.role
    }

    /// Whether the result is known to be empty without consulting the store.
    pub fn is_trivially_empty(&self) -> bool {
        if self.members.is_empty_selection() {
            return true;
        }
        match &self.predicate {
            GroupPredicate::Any(set) => set.is_empty(),
            GroupPredicate::All(groups) | GroupPredicate::Only(groups) => groups.is_empty(),
            GroupPredicate::Unrestricted => false,
        }
    }
}

impl RoleQualified for GroupSetQuery {
    fn role_scope_mut(&mut self) -> &mut RoleScope {
        &mut self.role
    }
}

/// Fluent executor: pick a member scope, optionally narrow by role, then run
/// one group-set filter against the store.
///
/// ```ignore
/// let admins = memberships
///     .members(MemberScope::kind("user"))
///     .as_role(Some("admin"))
///     .in_all_groups(&[engineering, oncall])
///     .await?;
/// ```
pub struct MemberQuery<'a, S: ?Sized> {
    store: &'a S,
    scope: MemberScope,
    role: RoleScope,
}

impl<'a, S: MembershipStore + ?Sized> MemberQuery<'a, S> {
    pub const fn new(store: &'a S, scope: MemberScope) -> Self {
        Self {
            store,
            scope,
            role: RoleScope::Any,
        }
    }

    async fn run(self, query: GroupSetQuery) -> Result<Vec<MemberRef>> {
        let mut query = query;
        if let RoleScope::Only(role) = &self.role {
            validate_role(Some(role))?;
            query = query.as_role(Some(role));
        }
        self.store.filter_members(&query).await
    }

    pub async fn in_group<G: Group + ?Sized>(self, group: &G) -> Result<Vec<MemberRef>> {
        let query = GroupSetQuery::in_group(self.scope.clone(), group)?;
        self.run(query).await
    }

    pub async fn in_any_group<G: Group>(self, groups: &[G]) -> Result<Vec<MemberRef>> {
        let query = GroupSetQuery::in_any_group(self.scope.clone(), groups)?;
        self.run(query).await
    }

    pub async fn in_all_groups<G: Group>(self, groups: &[G]) -> Result<Vec<MemberRef>> {
        let query = GroupSetQuery::in_all_groups(self.scope.clone(), groups)?;
        self.run(query).await
    }

    pub async fn in_only_groups<G: Group>(self, groups: &[G]) -> Result<Vec<MemberRef>> {
        let query = GroupSetQuery::in_only_groups(self.scope.clone(), groups)?;
        self.run(query).await
    }

    pub async fn shares_any_group(self, other: MemberScope) -> Result<Vec<MemberRef>> {
        let query = GroupSetQuery::shares_any_group(self.scope.clone(), other)?;
        self.run(query).await
    }

    /// Members in scope with any membership passing the role scope.
    pub async fn fetch(self) -> Result<Vec<MemberRef>> {
        let query = GroupSetQuery::new(self.scope.clone(), GroupPredicate::Unrestricted)?;
        self.run(query).await
    }
}

impl<S: ?Sized> RoleQualified for MemberQuery<'_, S> {
    fn role_scope_mut(&mut self) -> &mut RoleScope {
        &mut self.role
    }
}
