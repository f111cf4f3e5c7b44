//! Reusable fixtures for membership integration tests.
//!
//! Concrete entity types implementing the `Member` / `Group` capabilities, and
//! a builder that seeds memberships through the service.
#![allow(dead_code)]

use std::sync::Arc;

use gl_membership::{Group, GroupRef, Member, MemberRef, MembershipStore, Memberships};
use uuid::Uuid;

/// A user entity that can join groups.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

impl User {
    pub fn new(username: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
        }
    }
}

impl Member for User {
    fn member_ref(&self) -> MemberRef {
        MemberRef::new("user", self.id)
    }
}

/// A team: one concrete group kind.
#[derive(Debug, Clone)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
}

impl Team {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
        }
    }
}

impl Group for Team {
    fn group_ref(&self) -> GroupRef {
        GroupRef::new("team", self.id)
    }
}

/// A project: a second group kind, to exercise polymorphic group refs.
#[derive(Debug, Clone)]
pub struct Project {
    pub id: Uuid,
}

impl Project {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

impl Group for Project {
    fn group_ref(&self) -> GroupRef {
        GroupRef::new("project", self.id)
    }
}

/// Refs for a mixed list of groups.
pub fn refs(groups: &[&dyn GroupLike]) -> Vec<GroupRef> {
    groups.iter().map(|g| g.as_group_ref()).collect()
}

/// Object-safe view over `Group` for building mixed-kind lists in tests.
pub trait GroupLike {
    fn as_group_ref(&self) -> GroupRef;
}

impl<T: Group> GroupLike for T {
    fn as_group_ref(&self) -> GroupRef {
        self.group_ref()
    }
}

/// Seed memberships for a user.
pub async fn join<S: MembershipStore + ?Sized, G: Group>(
    memberships: &Memberships<S>,
    user: &User,
    groups: &[G],
    role: Option<&str>,
) {
    for group in groups {
        memberships
            .add(user, group, role)
            .await
            .expect("Failed to add membership");
    }
}

pub fn service<S: MembershipStore + 'static>(store: S) -> Memberships<S> {
    Memberships::new(Arc::new(store))
}

/// Initialise a test subscriber once so `RUST_LOG` surfaces store logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gl_membership=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
