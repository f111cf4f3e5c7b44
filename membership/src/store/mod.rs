//! Membership Store
//!
//! The durable `(member, group, membership_type)` table behind every
//! predicate. Reads are exact-match, set and aggregate queries; delete and
//! destroy are the only mutations and each executes as one statement.

mod memory;
mod postgres;

use async_trait::async_trait;

pub use memory::InMemoryStore;
pub use postgres::PgMembershipStore;

use crate::error::Result;
use crate::query::{GroupSetQuery, MemberScope};
use crate::role::{RoleQualified, RoleScope};
use crate::types::{distinct_groups, Group, GroupRef, Member, MemberRef, Membership, NewMembership};

/// Exact-match criteria for [`MembershipStore::exists`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipCriteria {
    pub member: MemberRef,
    pub group: GroupRef,
    pub role: RoleScope,
}

impl MembershipCriteria {
    pub fn new<M: Member + ?Sized, G: Group + ?Sized>(member: &M, group: &G) -> Result<Self> {
        let member = member.member_ref();
        let group = group.group_ref();
        member.validate()?;
        group.validate()?;
        Ok(Self {
            member,
            group,
            role: RoleScope::Any,
        })
    }
}

impl RoleQualified for MembershipCriteria {
    fn role_scope_mut(&mut self) -> &mut RoleScope {
        &mut self.role
    }
}

/// Removal of one member's memberships to a set of groups.
///
/// With a role, only memberships carrying that role are removed; without
/// one, memberships to the named groups are removed regardless of role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub member: MemberRef,
    pub groups: Vec<GroupRef>,
    pub role: RoleScope,
}

impl Removal {
    pub fn new<M: Member + ?Sized, G: Group>(member: &M, groups: &[G]) -> Result<Self> {
        let member = member.member_ref();
        member.validate()?;
        Ok(Self {
            member,
            groups: distinct_groups(groups)?,
            role: RoleScope::Any,
        })
    }
}

impl RoleQualified for Removal {
    fn role_scope_mut(&mut self) -> &mut RoleScope {
        &mut self.role
    }
}

/// Queryable membership persistence.
///
/// Implementations must treat duplicate rows as harmless: every read below
/// has set semantics.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Insert one membership row.
    async fn insert(&self, membership: &NewMembership) -> Result<Membership>;

    /// True iff at least one row matches member, group and role scope.
    async fn exists(&self, criteria: &MembershipCriteria) -> Result<bool>;

    /// Distinct groups the member belongs to under the role scope.
    async fn groups_of(&self, member: &MemberRef, role: &RoleScope) -> Result<Vec<GroupRef>>;

    /// Distinct members of a group under the role scope.
    async fn members_of(&self, group: &GroupRef, role: &RoleScope) -> Result<Vec<MemberRef>>;

    /// Every membership row owned by the member.
    async fn memberships_of(&self, member: &MemberRef) -> Result<Vec<Membership>>;

    /// Execute a group-set filter; returns distinct members.
    async fn filter_members(&self, query: &GroupSetQuery) -> Result<Vec<MemberRef>>;

    /// Remove matching rows without side effects; returns rows removed.
    async fn delete_memberships(&self, removal: &Removal) -> Result<u64>;

    /// Remove matching rows and return them so dependents can react.
    async fn destroy_memberships(&self, removal: &Removal) -> Result<Vec<Membership>>;

    /// Remove every membership of a member (cascade on member destroy).
    async fn destroy_member(&self, member: &MemberRef) -> Result<Vec<Membership>>;

    async fn filter_by_group(
        &self,
        members: &MemberScope,
        group: &GroupRef,
    ) -> Result<Vec<MemberRef>> {
        let query = GroupSetQuery::in_group(members.clone(), group)?;
        self.filter_members(&query).await
    }

    async fn filter_by_any_group(
        &self,
        members: &MemberScope,
        groups: &[GroupRef],
    ) -> Result<Vec<MemberRef>> {
        let query = GroupSetQuery::in_any_group(members.clone(), groups)?;
        self.filter_members(&query).await
    }

    async fn filter_by_all_groups(
        &self,
        members: &MemberScope,
        groups: &[GroupRef],
    ) -> Result<Vec<MemberRef>> {
        let query = GroupSetQuery::in_all_groups(members.clone(), groups)?;
        self.filter_members(&query).await
    }

    async fn filter_by_only_groups(
        &self,
        members: &MemberScope,
        groups: &[GroupRef],
    ) -> Result<Vec<MemberRef>> {
        let query = GroupSetQuery::in_only_groups(members.clone(), groups)?;
        self.filter_members(&query).await
    }
}
