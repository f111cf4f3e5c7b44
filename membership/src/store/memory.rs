//! In-memory membership store.
//!
//! Holds rows in a `Vec` behind a `tokio` `RwLock` and evaluates group-set
//! queries with the same semantics as the SQL rendering. Used by tests and by
//! embedders without a database.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{MembershipCriteria, MembershipStore, Removal};
use crate::error::Result;
use crate::query::GroupSetQuery;
use crate::role::RoleScope;
use crate::types::{GroupRef, MemberRef, Membership, NewMembership};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: RwLock<Vec<Membership>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, duplicates included.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn removal_matches(removal: &Removal, row: &Membership) -> bool {
        row.member() == removal.member
            && removal.groups.contains(&row.group())
            && removal.role.matches(row.membership_type.as_deref())
    }

    /// Remove matching rows under one write lock.
    async fn take_where(&self, pred: impl Fn(&Membership) -> bool + Send) -> Vec<Membership> {
        let mut rows = self.rows.write().await;
        let (removed, kept): (Vec<_>, Vec<_>) = rows.drain(..).partition(|row| pred(row));
        *rows = kept;
        removed
    }
}

#[async_trait]
impl MembershipStore for InMemoryStore {
    async fn insert(&self, membership: &NewMembership) -> Result<Membership> {
        membership.validate()?;
        let row = Membership {
            id: Uuid::now_v7(),
            member_type: membership.member.kind.clone(),
            member_id: membership.member.id,
            group_type: membership.group.kind.clone(),
            group_id: membership.group.id,
            membership_type: membership.membership_type.clone(),
            created_at: Utc::now(),
        };
        self.rows.write().await.push(row.clone());
        debug!(member = %membership.member, group = %membership.group, "Membership added");
        Ok(row)
    }

    async fn exists(&self, criteria: &MembershipCriteria) -> Result<bool> {
        let rows = self.rows.read().await;
        Ok(rows.iter().any(|row| {
            row.member() == criteria.member
                && row.group() == criteria.group
                && criteria.role.matches(row.membership_type.as_deref())
        }))
    }

    async fn groups_of(&self, member: &MemberRef, role: &RoleScope) -> Result<Vec<GroupRef>> {
        let rows = self.rows.read().await;
        let groups: BTreeSet<GroupRef> = rows
            .iter()
            .filter(|row| row.member() == *member && role.matches(row.membership_type.as_deref()))
            .map(Membership::group)
            .collect();
        Ok(groups.into_iter().collect())
    }

    async fn members_of(&self, group: &GroupRef, role: &RoleScope) -> Result<Vec<MemberRef>> {
        let rows = self.rows.read().await;
        let members: BTreeSet<MemberRef> = rows
            .iter()
            .filter(|row| row.group() == *group && role.matches(row.membership_type.as_deref()))
            .map(Membership::member)
            .collect();
        Ok(members.into_iter().collect())
    }

    async fn memberships_of(&self, member: &MemberRef) -> Result<Vec<Membership>> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|row| row.member() == *member).cloned().collect())
    }

    async fn filter_members(&self, query: &GroupSetQuery) -> Result<Vec<MemberRef>> {
        if query.is_trivially_empty() {
            return Ok(Vec::new());
        }
        let rows = self.rows.read().await;
        Ok(query.evaluate(&rows))
    }

    async fn delete_memberships(&self, removal: &Removal) -> Result<u64> {
        if removal.groups.is_empty() {
            return Ok(0);
        }
        let removed = self.take_where(|row| Self::removal_matches(removal, row)).await;
        Ok(removed.len() as u64)
    }

    async fn destroy_memberships(&self, removal: &Removal) -> Result<Vec<Membership>> {
        if removal.groups.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.take_where(|row| Self::removal_matches(removal, row)).await)
    }

    async fn destroy_member(&self, member: &MemberRef) -> Result<Vec<Membership>> {
        member.validate()?;
        Ok(self.take_where(|row| row.member() == *member).await)
    }
}
