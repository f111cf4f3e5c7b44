//! In-memory evaluation of group-set queries.
//!
//! Mirrors the SQL rendering: rows are narrowed by member scope and role, then
//! grouped per member and compared on distinct group sets.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::{GroupPredicate, GroupSet, GroupSetQuery};
use crate::types::{GroupRef, MemberRef, Membership};

impl GroupSetQuery {
    /// Evaluate against a slice of membership rows.
    ///
    /// Returns distinct members sorted by `(kind, id)`.
    pub fn evaluate(&self, rows: &[Membership]) -> Vec<MemberRef> {
        if self.is_trivially_empty() {
            return Vec::new();
        }

        // member -> distinct groups it holds under the role scope
        let mut held: BTreeMap<MemberRef, BTreeSet<GroupRef>> = BTreeMap::new();
        for row in rows {
            let member = row.member();
            if !self.members.contains(&member) || !self.role.matches(row.membership_type.as_deref())
            {
                continue;
            }
            held.entry(member).or_default().insert(row.group());
        }

        match &self.predicate {
            GroupPredicate::Unrestricted => held.into_keys().collect(),
            GroupPredicate::Any(set) => {
                let wanted = resolve_group_set(set, rows);
                held.into_iter()
                    .filter(|(_, groups)| groups.iter().any(|g| wanted.contains(g)))
                    .map(|(member, _)| member)
                    .collect()
            }
            GroupPredicate::All(required) => held
                .into_iter()
                .filter(|(_, groups)| required.iter().all(|g| groups.contains(g)))
                .map(|(member, _)| member)
                .collect(),
            GroupPredicate::Only(required) => held
                .into_iter()
                .filter(|(_, groups)| {
                    groups.len() == required.len() && groups.iter().all(|g| required.contains(g))
                })
                .map(|(member, _)| member)
                .collect(),
        }
    }
}

fn resolve_group_set(set: &GroupSet, rows: &[Membership]) -> HashSet<GroupRef> {
    match set {
        GroupSet::Explicit(groups) => groups.iter().cloned().collect(),
        GroupSet::HeldBy(scope) => rows
            .iter()
            .filter(|row| scope.contains(&row.member()))
            .map(Membership::group)
            .collect(),
    }
}
