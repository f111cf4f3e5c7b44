//! `PostgreSQL` membership store.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, error};
use uuid::Uuid;

use super::{MembershipCriteria, MembershipStore, Removal};
use crate::error::Result;
use crate::query::{push_group_set, GroupSetQuery, MEMBERSHIP_COLUMNS};
use crate::role::RoleScope;
use crate::types::{GroupRef, MemberRef, Membership, NewMembership};

/// Log and return a database error with context.
macro_rules! db_error {
    ($query:expr, $($field:tt)*) => {
        |e| {
            error!(query = $query, $($field)*, error = %e, "Database query failed");
            e
        }
    };
}

/// Membership store backed by the `group_memberships` table.
#[derive(Debug, Clone)]
pub struct PgMembershipStore {
    pool: PgPool,
}

impl PgMembershipStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// `DELETE ... WHERE member AND group IN set [AND role]` for a removal.
    fn removal_statement(removal: &Removal) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new("DELETE FROM group_memberships WHERE member_type = ");
        builder
            .push_bind(removal.member.kind.clone())
            .push(" AND member_id = ")
            .push_bind(removal.member.id)
            .push(" AND (group_type, group_id) IN ");
        push_group_set(&mut builder, &removal.groups);
        removal.role.push_condition(&mut builder, "membership_type");
        builder
    }
}

#[async_trait]
impl MembershipStore for PgMembershipStore {
    #[tracing::instrument(skip(self))]
    async fn insert(&self, membership: &NewMembership) -> Result<Membership> {
        membership.validate()?;
        let row = sqlx::query_as::<_, Membership>(
            r"
            INSERT INTO group_memberships (id, member_type, member_id, group_type, group_id, membership_type)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, member_type, member_id, group_type, group_id, membership_type, created_at
            ",
        )
        .bind(Uuid::now_v7())
        .bind(&membership.member.kind)
        .bind(membership.member.id)
        .bind(&membership.group.kind)
        .bind(membership.group.id)
        .bind(membership.membership_type.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error!("insert_membership", member = %membership.member, group = %membership.group))?;

        debug!(membership_id = %row.id, "Membership added");
        Ok(row)
    }

    #[tracing::instrument(skip(self))]
    async fn exists(&self, criteria: &MembershipCriteria) -> Result<bool> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT EXISTS(SELECT 1 FROM group_memberships WHERE member_type = ",
        );
        builder
            .push_bind(criteria.member.kind.clone())
            .push(" AND member_id = ")
            .push_bind(criteria.member.id)
            .push(" AND group_type = ")
            .push_bind(criteria.group.kind.clone())
            .push(" AND group_id = ")
            .push_bind(criteria.group.id);
        criteria.role.push_condition(&mut builder, "membership_type");
        builder.push(")");

        let found = builder
            .build_query_scalar::<bool>()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error!("membership_exists", member = %criteria.member, group = %criteria.group))?;
        Ok(found)
    }

    #[tracing::instrument(skip(self))]
    async fn groups_of(&self, member: &MemberRef, role: &RoleScope) -> Result<Vec<GroupRef>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT DISTINCT group_type, group_id FROM group_memberships WHERE member_type = ",
        );
        builder
            .push_bind(member.kind.clone())
            .push(" AND member_id = ")
            .push_bind(member.id);
        role.push_condition(&mut builder, "membership_type");
        builder.push(" ORDER BY group_type COLLATE \"C\", group_id");

        let rows: Vec<(String, Uuid)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error!("groups_of", member = %member))?;
        Ok(rows.into_iter().map(|(kind, id)| GroupRef::new(kind, id)).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn members_of(&self, group: &GroupRef, role: &RoleScope) -> Result<Vec<MemberRef>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT DISTINCT member_type, member_id FROM group_memberships WHERE group_type = ",
        );
        builder
            .push_bind(group.kind.clone())
            .push(" AND group_id = ")
            .push_bind(group.id);
        role.push_condition(&mut builder, "membership_type");
        builder.push(" ORDER BY member_type COLLATE \"C\", member_id");

        let rows: Vec<(String, Uuid)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error!("members_of", group = %group))?;
        Ok(rows.into_iter().map(|(kind, id)| MemberRef::new(kind, id)).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn memberships_of(&self, member: &MemberRef) -> Result<Vec<Membership>> {
        let rows = sqlx::query_as::<_, Membership>(
            r"
            SELECT id, member_type, member_id, group_type, group_id, membership_type, created_at
            FROM group_memberships
            WHERE member_type = $1
              AND member_id = $2
            ORDER BY created_at ASC
            ",
        )
        .bind(&member.kind)
        .bind(member.id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error!("memberships_of", member = %member))?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self))]
    async fn filter_members(&self, query: &GroupSetQuery) -> Result<Vec<MemberRef>> {
        if query.is_trivially_empty() {
            debug!("Group-set query short-circuited to empty result");
            return Ok(Vec::new());
        }

        let mut builder = query.to_sql();
        let rows: Vec<(String, Uuid)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error!("filter_members", predicate = ?query.predicate()))?;

        debug!(matched = rows.len(), "Group-set query executed");
        Ok(rows.into_iter().map(|(kind, id)| MemberRef::new(kind, id)).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_memberships(&self, removal: &Removal) -> Result<u64> {
        if removal.groups.is_empty() {
            return Ok(0);
        }

        let mut builder = Self::removal_statement(removal);
        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(db_error!("delete_memberships", member = %removal.member))?;

        debug!(removed = result.rows_affected(), "Memberships deleted");
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self))]
    async fn destroy_memberships(&self, removal: &Removal) -> Result<Vec<Membership>> {
        if removal.groups.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = Self::removal_statement(removal);
        builder.push(" RETURNING ").push(MEMBERSHIP_COLUMNS);
        let rows = builder
            .build_query_as::<Membership>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error!("destroy_memberships", member = %removal.member))?;

        debug!(removed = rows.len(), "Memberships destroyed");
        Ok(rows)
    }

    #[tracing::instrument(skip(self))]
    async fn destroy_member(&self, member: &MemberRef) -> Result<Vec<Membership>> {
        member.validate()?;
        let rows = sqlx::query_as::<_, Membership>(
            r"
            DELETE FROM group_memberships
            WHERE member_type = $1
              AND member_id = $2
            RETURNING id, member_type, member_id, group_type, group_id, membership_type, created_at
            ",
        )
        .bind(&member.kind)
        .bind(member.id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error!("destroy_member", member = %member))?;

        debug!(removed = rows.len(), "Member memberships destroyed");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::RoleQualified;

    #[test]
    fn test_removal_statement_unqualified() {
        let member = MemberRef::new("user", Uuid::new_v4());
        let removal = Removal::new(&member, &[GroupRef::new("team", Uuid::new_v4())]).unwrap();
        assert_eq!(
            PgMembershipStore::removal_statement(&removal).sql(),
            "DELETE FROM group_memberships WHERE member_type = $1 AND member_id = $2 \
             AND (group_type, group_id) IN (SELECT * FROM UNNEST($3::text[], $4::uuid[]))"
        );
    }

    #[test]
    fn test_removal_statement_role_qualified() {
        let member = MemberRef::new("user", Uuid::new_v4());
        let removal = Removal::new(&member, &[GroupRef::new("team", Uuid::new_v4())])
            .unwrap()
            .as_role(Some("admin"));
        assert_eq!(
            PgMembershipStore::removal_statement(&removal).sql(),
            "DELETE FROM group_memberships WHERE member_type = $1 AND member_id = $2 \
             AND (group_type, group_id) IN (SELECT * FROM UNNEST($3::text[], $4::uuid[])) \
             AND membership_type = $5"
        );
    }
}
