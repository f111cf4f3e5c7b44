//! Membership Service
//!
//! Entry point tying the store to the fact API and the group-set query
//! builder, plus the mutating operations: add, delete, destroy and the
//! member-destroy cascade.
//!
//! `delete` removes rows silently. `destroy` and `destroy_member` also notify
//! every registered [`MembershipObserver`] once per removed row.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::Result;
use crate::facts::MembershipFacts;
use crate::query::{MemberQuery, MemberScope};
use crate::role::{validate_role, RoleQualified};
use crate::store::{MembershipStore, Removal};
use crate::types::{Group, Member, Membership, NewMembership};

/// Dependent side effect run after a membership row is destroyed.
#[async_trait]
pub trait MembershipObserver: Send + Sync {
    async fn membership_destroyed(&self, membership: &Membership);
}

/// Membership operations over a shared store.
pub struct Memberships<S: ?Sized> {
    store: Arc<S>,
    observers: Vec<Arc<dyn MembershipObserver>>,
}

impl<S: ?Sized> Clone for Memberships<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            observers: self.observers.clone(),
        }
    }
}

impl<S: MembershipStore + ?Sized> Memberships<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            observers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn MembershipObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Per-member predicates.
    pub fn facts(&self) -> MembershipFacts<'_, S> {
        MembershipFacts::new(self.store.as_ref())
    }

    /// Collection-level filters over `scope`.
    pub fn members(&self, scope: MemberScope) -> MemberQuery<'_, S> {
        MemberQuery::new(self.store.as_ref(), scope)
    }

    /// Add `member` to `group`, optionally with a role.
    #[tracing::instrument(skip_all)]
    pub async fn add<M: Member + ?Sized, G: Group + ?Sized>(
        &self,
        member: &M,
        group: &G,
        role: Option<&str>,
    ) -> Result<Membership> {
        let membership = NewMembership {
            member: member.member_ref(),
            group: group.group_ref(),
            membership_type: role.map(str::to_owned),
        };
        membership.validate()?;
        self.store.insert(&membership).await
    }

    fn removal<M: Member + ?Sized, G: Group>(
        member: &M,
        groups: &[G],
        role: Option<&str>,
    ) -> Result<Removal> {
        validate_role(role)?;
        Ok(Removal::new(member, groups)?.as_role(role))
    }

    /// Remove memberships to `groups` without dependent side effects.
    ///
    /// With a role, only memberships of that role are removed.
    #[tracing::instrument(skip_all)]
    pub async fn delete<M: Member + ?Sized, G: Group>(
        &self,
        member: &M,
        groups: &[G],
        role: Option<&str>,
    ) -> Result<u64> {
        let removal = Self::removal(member, groups, role)?;
        let removed = self.store.delete_memberships(&removal).await?;
        debug!(member = %removal.member, removed, "Memberships deleted");
        Ok(removed)
    }

    /// Remove memberships to `groups` and notify observers for each row.
    ///
    /// With a role, only memberships of that role are removed.
    #[tracing::instrument(skip_all)]
    pub async fn destroy<M: Member + ?Sized, G: Group>(
        &self,
        member: &M,
        groups: &[G],
        role: Option<&str>,
    ) -> Result<u64> {
        let removal = Self::removal(member, groups, role)?;
        let destroyed = self.store.destroy_memberships(&removal).await?;
        self.notify_destroyed(&destroyed).await;
        debug!(member = %removal.member, removed = destroyed.len(), "Memberships destroyed");
        Ok(destroyed.len() as u64)
    }

    /// Cascade for a destroyed member: every one of its memberships goes.
    #[tracing::instrument(skip_all)]
    pub async fn destroy_member<M: Member + ?Sized>(&self, member: &M) -> Result<u64> {
        let member = member.member_ref();
        member.validate()?;
        let destroyed = self.store.destroy_member(&member).await?;
        self.notify_destroyed(&destroyed).await;
        info!(member = %member, removed = destroyed.len(), "Member memberships cascaded");
        Ok(destroyed.len() as u64)
    }

    async fn notify_destroyed(&self, rows: &[Membership]) {
        for row in rows {
            for observer in &self.observers {
                observer.membership_destroyed(row).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use uuid::Uuid;

    use super::*;
    use crate::store::InMemoryStore;
    use crate::types::{GroupRef, MemberRef};

    #[derive(Default)]
    struct Recorder {
        destroyed: Mutex<Vec<Membership>>,
    }

    #[async_trait]
    impl MembershipObserver for Recorder {
        async fn membership_destroyed(&self, membership: &Membership) {
            self.destroyed.lock().unwrap().push(membership.clone());
        }
    }

    fn setup() -> (Memberships<InMemoryStore>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let memberships =
            Memberships::new(Arc::new(InMemoryStore::new())).with_observer(recorder.clone());
        (memberships, recorder)
    }

    #[tokio::test]
    async fn test_add_then_delete_round_trip() {
        let (memberships, recorder) = setup();
        let user = MemberRef::new("user", Uuid::new_v4());
        let team = GroupRef::new("team", Uuid::new_v4());

        memberships.add(&user, &team, None).await.unwrap();
        assert!(memberships.facts().in_group(&user, &team, None).await.unwrap());

        assert_eq!(memberships.delete(&user, &[team.clone()], None).await.unwrap(), 1);
        assert!(!memberships.facts().in_group(&user, &team, None).await.unwrap());
        assert!(recorder.destroyed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_destroy_with_role_leaves_other_roles() {
        let (memberships, recorder) = setup();
        let user = MemberRef::new("user", Uuid::new_v4());
        let team = GroupRef::new("team", Uuid::new_v4());
        memberships.add(&user, &team, Some("member")).await.unwrap();
        memberships.add(&user, &team, Some("admin")).await.unwrap();

        let removed = memberships
            .destroy(&user, &[team.clone()], Some("admin"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(memberships.facts().in_group(&user, &team, Some("member")).await.unwrap());
        assert!(!memberships.facts().in_group(&user, &team, Some("admin")).await.unwrap());

        let destroyed = recorder.destroyed.lock().unwrap();
        assert_eq!(destroyed.len(), 1);
        assert_eq!(destroyed[0].membership_type.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_unqualified_destroy_removes_every_role() {
        let (memberships, recorder) = setup();
        let user = MemberRef::new("user", Uuid::new_v4());
        let team = GroupRef::new("team", Uuid::new_v4());
        memberships.add(&user, &team, Some("member")).await.unwrap();
        memberships.add(&user, &team, None).await.unwrap();

        assert_eq!(memberships.destroy(&user, &[team], None).await.unwrap(), 2);
        assert_eq!(recorder.destroyed.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_destroy_member_cascades_and_notifies() {
        let (memberships, recorder) = setup();
        let user = MemberRef::new("user", Uuid::new_v4());
        let a = GroupRef::new("team", Uuid::new_v4());
        let b = GroupRef::new("project", Uuid::new_v4());
        memberships.add(&user, &a, None).await.unwrap();
        memberships.add(&user, &b, Some("admin")).await.unwrap();

        assert_eq!(memberships.destroy_member(&user).await.unwrap(), 2);
        assert!(!memberships.facts().in_group(&user, &a, None).await.unwrap());
        assert!(memberships.facts().groups(&user, None).await.unwrap().is_empty());
        assert_eq!(recorder.destroyed.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_removal_with_no_groups_is_noop() {
        let (memberships, _) = setup();
        let user = MemberRef::new("user", Uuid::new_v4());
        memberships
            .add(&user, &GroupRef::new("team", Uuid::new_v4()), None)
            .await
            .unwrap();

        let none: [GroupRef; 0] = [];
        assert_eq!(memberships.delete(&user, &none, None).await.unwrap(), 0);
        assert_eq!(memberships.destroy(&user, &none, None).await.unwrap(), 0);
        assert_eq!(memberships.store().len().await, 1);
    }

    #[tokio::test]
    async fn test_add_rejects_blank_role() {
        let (memberships, _) = setup();
        let result = memberships
            .add(
                &MemberRef::new("user", Uuid::new_v4()),
                &GroupRef::new("team", Uuid::new_v4()),
                Some(""),
            )
            .await;
        assert!(result.is_err());
    }
}
