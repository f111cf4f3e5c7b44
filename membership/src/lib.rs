//! Grouplink Membership
//!
//! Many-to-many membership between arbitrary member and group kinds, with an
//! optional role qualifier on each membership. Answers set-relationship
//! questions ("in group G as role R?", "in all of / only these groups?",
//! "share any group?") per member and per member collection, pushing the
//! collection filters down to the store as grouped aggregate queries.

pub mod config;
pub mod db;
pub mod error;
pub mod facts;
pub mod query;
pub mod registry;
pub mod role;
pub mod service;
pub mod store;
pub mod types;

pub use error::{MembershipError, Result};
pub use facts::MembershipFacts;
pub use query::{GroupPredicate, GroupSet, GroupSetQuery, MemberQuery, MemberScope};
pub use registry::{EntityLoader, KindRegistry};
pub use role::{RoleQualified, RoleScope};
pub use service::{MembershipObserver, Memberships};
pub use store::{InMemoryStore, MembershipCriteria, MembershipStore, PgMembershipStore, Removal};
pub use types::{Group, GroupRef, Member, MemberRef, Membership, NewMembership};
