//! Membership Error Types

/// Result alias used throughout the membership crate.
pub type Result<T> = std::result::Result<T, MembershipError>;

/// Errors surfaced by membership predicates, filters and removals.
///
/// "No match" is never an error: predicates return `false` and filters
/// return an empty set.
#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    /// Malformed input (empty kind, nil id, empty role string).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing store was unreachable or rejected the query.
    #[error("Store failure: {0}")]
    Store(#[from] sqlx::Error),
}

impl MembershipError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Whether this error came from the store rather than from caller input.
    pub const fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
