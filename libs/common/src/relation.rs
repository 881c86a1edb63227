//! Many-to-many relation sets
//!
//! A relation set maps the textual form of a foreign identifier to the
//! identifier itself. The key always equals `value.to_string()`, which keeps
//! the set free of duplicates and gives constant-ish membership tests.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::identifier::EntityId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSet<I: EntityId> {
    entries: BTreeMap<String, I>,
}

impl<I: EntityId> Default for RelationSet<I> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<I: EntityId> RelationSet<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the id was already present
    pub fn add(&mut self, id: I) -> bool {
        self.entries.insert(id.to_string(), id).is_none()
    }

    pub fn remove(&mut self, id: &I) -> bool {
        self.entries.remove(&id.to_string()).is_some()
    }

    pub fn contains(&self, id: &I) -> bool {
        self.entries.contains_key(&id.to_string())
    }

    /// Replace the whole set with the given ids
    pub fn sync(&mut self, ids: impl IntoIterator<Item = I>) {
        self.entries = ids.into_iter().map(|id| (id.to_string(), id)).collect();
    }

    pub fn intersects(&self, ids: &[I]) -> bool {
        ids.iter().any(|id| self.contains(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = &I> + '_ {
        self.entries.values()
    }

    pub fn to_vec(&self) -> Vec<I> {
        self.entries.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<I: EntityId> FromIterator<I> for RelationSet<I> {
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        let mut set = Self::new();
        set.sync(iter);
        set
    }
}

impl<I: EntityId> Serialize for RelationSet<I> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.keys())
    }
}
