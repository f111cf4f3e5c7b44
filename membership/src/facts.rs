//! Membership Fact API
//!
//! Boolean predicates over a single member's memberships. Every predicate
//! takes an optional role; `None` leaves the role unconstrained.
//!
//! Empty group lists:
//! - `in_any_group(m, [])` is `false`
//! - `in_all_groups(m, [])` is `true` (the empty set is a subset of anything)
//! - `in_only_groups(m, [])` is `true` iff the member holds no groups under the role

use std::collections::BTreeSet;

use crate::error::Result;
use crate::role::{validate_role, RoleQualified, RoleScope};
use crate::store::{MembershipCriteria, MembershipStore};
use crate::types::{distinct_groups, Group, GroupRef, Member, MemberRef};

/// Per-member predicates evaluated against a [`MembershipStore`].
pub struct MembershipFacts<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: MembershipStore + ?Sized> MembershipFacts<'a, S> {
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Distinct groups the member belongs to, optionally role-qualified.
    pub async fn groups<M: Member + ?Sized>(
        &self,
        member: &M,
        role: Option<&str>,
    ) -> Result<Vec<GroupRef>> {
        validate_role(role)?;
        let member = member.member_ref();
        member.validate()?;
        self.store.groups_of(&member, &RoleScope::from(role)).await
    }

    /// Distinct members of the group, optionally role-qualified.
    pub async fn members<G: Group + ?Sized>(
        &self,
        group: &G,
        role: Option<&str>,
    ) -> Result<Vec<MemberRef>> {
        validate_role(role)?;
        let group = group.group_ref();
        group.validate()?;
        self.store.members_of(&group, &RoleScope::from(role)).await
    }

    pub async fn in_group<M: Member + ?Sized, G: Group + ?Sized>(
        &self,
        member: &M,
        group: &G,
        role: Option<&str>,
    ) -> Result<bool> {
        validate_role(role)?;
        let criteria = MembershipCriteria::new(member, group)?.as_role(role);
        self.store.exists(&criteria).await
    }

    /// Logical OR over [`Self::in_group`], stopping at the first match.
    pub async fn in_any_group<M: Member + ?Sized, G: Group>(
        &self,
        member: &M,
        groups: &[G],
        role: Option<&str>,
    ) -> Result<bool> {
        validate_role(role)?;
        member.member_ref().validate()?;
        for group in distinct_groups(groups)? {
            if self.in_group(member, &group, role).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// `groups ⊆ member.groups(role)`.
    pub async fn in_all_groups<M: Member + ?Sized, G: Group>(
        &self,
        member: &M,
        groups: &[G],
        role: Option<&str>,
    ) -> Result<bool> {
        let wanted = distinct_groups(groups)?;
        let held: BTreeSet<GroupRef> = self.groups(member, role).await?.into_iter().collect();
        Ok(wanted.iter().all(|group| held.contains(group)))
    }

    /// `groups == member.groups(role)` as sets.
    pub async fn in_only_groups<M: Member + ?Sized, G: Group>(
        &self,
        member: &M,
        groups: &[G],
        role: Option<&str>,
    ) -> Result<bool> {
        let wanted: BTreeSet<GroupRef> = distinct_groups(groups)?.into_iter().collect();
        let held: BTreeSet<GroupRef> = self.groups(member, role).await?.into_iter().collect();
        Ok(wanted == held)
    }

    /// Whether `member` is in any group `other` belongs to.
    ///
    /// The role applies to `member`'s side only; `other`'s groups are taken
    /// under any role.
    pub async fn shares_any_group<M: Member + ?Sized, O: Member + ?Sized>(
        &self,
        member: &M,
        other: &O,
        role: Option<&str>,
    ) -> Result<bool> {
        let other_groups = self.groups(other, None).await?;
        self.in_any_group(member, &other_groups, role).await
    }
}
