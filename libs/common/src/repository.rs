//! Searchable repository contract
//!
//! Every aggregate repository implements [`SearchableRepository`]. The
//! in-memory backend ([`crate::memory::InMemoryRepository`]) drives its
//! filtering and sorting through the entity's [`Searchable`] implementation;
//! relational backends translate the same rules into SQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RepositoryResult;
use crate::identifier::EntityId;
use crate::search::{SearchFilter, SearchParams, SearchResult};

/// An aggregate root
pub trait Entity: Clone + Send + Sync + 'static {
    type Id: EntityId;

    /// Display name used in error messages, e.g. `Category`
    const NAME: &'static str;

    fn entity_id(&self) -> &Self::Id;

    fn created_at(&self) -> DateTime<Utc>;

    /// Copy the attributes a generic `update` is allowed to change
    fn apply_update(&mut self, incoming: &Self) {
        *self = incoming.clone();
    }
}

/// Value an entity exposes for one of its sortable fields
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
    Integer(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// Search rules of an aggregate
pub trait Searchable: Entity {
    type Filter: SearchFilter;

    /// Fields accepted as `sort`; anything else falls back to `created_at DESC`
    const SORTABLE_FIELDS: &'static [&'static str];

    /// Whether the entity satisfies every dimension of the filter
    fn matches(&self, filter: &Self::Filter) -> bool;

    fn sort_value(&self, field: &str) -> Option<SortValue>;
}

/// Result of a batch existence check, both lists in input order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistsResult<I> {
    pub exists: Vec<I>,
    pub not_exists: Vec<I>,
}

impl<I> Default for ExistsResult<I> {
    fn default() -> Self {
        Self {
            exists: Vec::new(),
            not_exists: Vec::new(),
        }
    }
}

/// Case-insensitive substring containment shared by every text filter
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub type FilterOf<E> = <E as Searchable>::Filter;

#[async_trait]
pub trait SearchableRepository: Send + Sync {
    type Entity: Searchable;

    /// Persist a new aggregate and its relation rows
    async fn insert(&self, entity: &Self::Entity) -> RepositoryResult<()>;

    /// Persist several new aggregates as one batch
    async fn bulk_insert(&self, entities: &[Self::Entity]) -> RepositoryResult<()>;

    /// Replace scalar attributes and resynchronize relation sets
    ///
    /// Fails with `NotFound` when no row carries the entity's id.
    async fn update(&self, entity: &Self::Entity) -> RepositoryResult<()>;

    /// Fails with `NotFound` when no row carries the id
    async fn delete(&self, id: &<Self::Entity as Entity>::Id) -> RepositoryResult<()>;

    async fn find_by_id(
        &self,
        id: &<Self::Entity as Entity>::Id,
    ) -> RepositoryResult<Option<Self::Entity>>;

    async fn find_all(&self) -> RepositoryResult<Vec<Self::Entity>>;

    async fn find_by_ids(
        &self,
        ids: &[<Self::Entity as Entity>::Id],
    ) -> RepositoryResult<Vec<Self::Entity>>;

    async fn exists_by_id(
        &self,
        ids: &[<Self::Entity as Entity>::Id],
    ) -> RepositoryResult<ExistsResult<<Self::Entity as Entity>::Id>>;

    /// Filter, then sort, then paginate
    async fn search(
        &self,
        params: &SearchParams<FilterOf<Self::Entity>>,
    ) -> RepositoryResult<SearchResult<Self::Entity>>;

    fn sortable_fields(&self) -> &'static [&'static str] {
        <Self::Entity as Searchable>::SORTABLE_FIELDS
    }
}
