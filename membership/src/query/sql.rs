//! SQL rendering of group-set queries for `PostgreSQL`.
//!
//! Group and member sets are bound as parallel `text[]` / `uuid[]` arrays and
//! expanded with `UNNEST`, so every query uses a fixed number of parameters
//! regardless of set size.

use sqlx::{Postgres, QueryBuilder};

use super::{GroupPredicate, GroupSet, GroupSetQuery, MemberScope};
use crate::types::GroupRef;

/// Column list for `group_memberships` rows.
pub(crate) const MEMBERSHIP_COLUMNS: &str =
    "id, member_type, member_id, group_type, group_id, membership_type, created_at";

/// Push `(SELECT * FROM UNNEST($a::text[], $b::uuid[]))` for a group list.
pub(crate) fn push_group_set(builder: &mut QueryBuilder<'_, Postgres>, groups: &[GroupRef]) {
    let (kinds, ids): (Vec<String>, Vec<_>) = groups.iter().map(|g| (g.kind.clone(), g.id)).unzip();
    builder
        .push("(SELECT * FROM UNNEST(")
        .push_bind(kinds)
        .push("::text[], ")
        .push_bind(ids)
        .push("::uuid[]))");
}

/// Push the member-scope condition for table alias `alias`.
pub(crate) fn push_member_scope(
    builder: &mut QueryBuilder<'_, Postgres>,
    scope: &MemberScope,
    alias: &str,
) {
    match scope {
        MemberScope::Kind(kind) => {
            builder
                .push(alias)
                .push(".member_type = ")
                .push_bind(kind.clone());
        }
        MemberScope::Members(refs) => {
            let (kinds, ids) = MemberScope::unzip(refs);
            builder
                .push("(")
                .push(alias)
                .push(".member_type, ")
                .push(alias)
                .push(".member_id) IN (SELECT * FROM UNNEST(")
                .push_bind(kinds)
                .push("::text[], ")
                .push_bind(ids)
                .push("::uuid[]))");
        }
    }
}

impl GroupSetQuery {
    /// Render as a single statement returning distinct
    /// `(member_type, member_id)` pairs ordered bytewise by kind, then by id.
    ///
    /// Coverage predicates aggregate per member with `GROUP BY` / `HAVING`
    /// over distinct `(group_type, group_id)` pairs instead of loading rows.
    pub fn to_sql(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new("");

        if let GroupPredicate::Only(groups) = &self.predicate {
            // Exact set equality: total distinct groups = |groups| and every held group is requested.
            builder.push(
                "SELECT m.member_type, m.member_id FROM (\
                 SELECT gm.member_type, gm.member_id, gm.group_type, gm.group_id, \
                 (gm.group_type, gm.group_id) IN ",
            );
            push_group_set(&mut builder, groups);
            builder.push(" AS requested FROM group_memberships gm WHERE ");
            push_member_scope(&mut builder, &self.members, "gm");
            self.role.push_condition(&mut builder, "gm.membership_type");
            builder
                .push(
                    ") m GROUP BY m.member_type, m.member_id \
                     HAVING COUNT(DISTINCT (m.group_type, m.group_id)) = ",
                )
                .push_bind(groups.len() as i64)
                .push(" AND bool_and(m.requested) ORDER BY m.member_type COLLATE \"C\", m.member_id");
            return builder;
        }

        builder.push("SELECT gm.member_type, gm.member_id FROM group_memberships gm WHERE ");
        push_member_scope(&mut builder, &self.members, "gm");
        self.role.push_condition(&mut builder, "gm.membership_type");

        match &self.predicate {
            GroupPredicate::Any(GroupSet::Explicit(groups)) | GroupPredicate::All(groups) => {
                builder.push(" AND (gm.group_type, gm.group_id) IN ");
                push_group_set(&mut builder, groups);
            }
            GroupPredicate::Any(GroupSet::HeldBy(other)) => {
                builder.push(
                    " AND (gm.group_type, gm.group_id) IN \
                     (SELECT other.group_type, other.group_id FROM group_memberships other WHERE ",
                );
                push_member_scope(&mut builder, other, "other");
                builder.push(")");
            }
            GroupPredicate::Only(_) | GroupPredicate::Unrestricted => {}
        }

        builder.push(" GROUP BY gm.member_type, gm.member_id");
        if let GroupPredicate::All(groups) = &self.predicate {
            builder
                .push(" HAVING COUNT(DISTINCT (gm.group_type, gm.group_id)) = ")
                .push_bind(groups.len() as i64);
        }
        builder.push(" ORDER BY gm.member_type COLLATE \"C\", gm.member_id");
        builder
    }
}
