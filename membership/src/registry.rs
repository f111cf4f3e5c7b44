//! Kind Registry
//!
//! Resolves polymorphic `(kind, id)` references into concrete entities by
//! dispatching each kind tag to a registered loader. References are grouped
//! by kind so each loader is called once per batch.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{MembershipError, Result};
use crate::types::{GroupRef, MemberRef};

/// Batch loader for one entity kind.
///
/// Ids with no matching entity are skipped rather than reported.
#[async_trait]
pub trait EntityLoader<T>: Send + Sync {
    async fn load(&self, ids: &[Uuid]) -> Result<Vec<T>>;
}

/// Maps kind tags to loaders producing `T`.
pub struct KindRegistry<T> {
    loaders: HashMap<String, Arc<dyn EntityLoader<T>>>,
}

impl<T> Default for KindRegistry<T> {
    fn default() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }
}

impl<T> std::fmt::Debug for KindRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.loaders.keys().collect();
        kinds.sort();
        f.debug_struct("KindRegistry").field("kinds", &kinds).finish()
    }
}

impl<T: Send + 'static> KindRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the loader for `kind`.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        loader: Arc<dyn EntityLoader<T>>,
    ) -> Result<&mut Self> {
        let kind = kind.into();
        if kind.trim().is_empty() {
            return Err(MembershipError::invalid("registered kind must not be empty"));
        }
        self.loaders.insert(kind, loader);
        Ok(self)
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.loaders.contains_key(kind)
    }

    /// Load entities for `(kind, id)` pairs. Fails if any kind has no loader.
    pub async fn resolve<'r>(
        &self,
        refs: impl IntoIterator<Item = (&'r str, Uuid)> + Send,
    ) -> Result<Vec<T>> {
        let mut by_kind: BTreeMap<&str, Vec<Uuid>> = BTreeMap::new();
        for (kind, id) in refs {
            by_kind.entry(kind).or_default().push(id);
        }

        let mut resolved = Vec::new();
        for (kind, mut ids) in by_kind {
            let loader = self.loaders.get(kind).ok_or_else(|| {
                MembershipError::InvalidArgument(format!("no loader registered for kind '{kind}'"))
            })?;
            ids.sort_unstable();
            ids.dedup();
            resolved.extend(loader.load(&ids).await?);
        }
        Ok(resolved)
    }

    pub async fn resolve_groups(&self, groups: &[GroupRef]) -> Result<Vec<T>> {
        self.resolve(groups.iter().map(|g| (g.kind.as_str(), g.id)))
            .await
    }

    pub async fn resolve_members(&self, members: &[MemberRef]) -> Result<Vec<T>> {
        self.resolve(members.iter().map(|m| (m.kind.as_str(), m.id)))
            .await
    }
}
