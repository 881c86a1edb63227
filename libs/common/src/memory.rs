//! In-memory repository backend
//!
//! Rows live in an [`InMemoryStore`] owned by one repository instance. The
//! store can be checkpointed by an
//! [`InMemoryUnitOfWork`](crate::unit_of_work::InMemoryUnitOfWork) so that a
//! rollback restores the rows as they were when the transaction started.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{NotFoundError, RepositoryError, RepositoryResult};
use crate::repository::{Entity, ExistsResult, FilterOf, Searchable, SearchableRepository};
use crate::search::{SearchParams, SearchResult, SortDirection};

/// Participant of an in-memory transaction
#[async_trait]
pub trait Checkpoint: Send + Sync {
    /// Remember the current rows
    async fn checkpoint(&self);

    /// Put back the remembered rows
    async fn restore(&self);

    /// Forget the remembered rows
    async fn release(&self);
}

#[derive(Debug)]
struct StoreState<E> {
    items: Vec<E>,
    saved: Option<Vec<E>>,
}

/// Shared, insertion-ordered row storage
#[derive(Debug)]
pub struct InMemoryStore<E> {
    state: Arc<Mutex<StoreState<E>>>,
}

impl<E> Clone for InMemoryStore<E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<E> Default for InMemoryStore<E> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState {
                items: Vec::new(),
                saved: None,
            })),
        }
    }
}

impl<E: Entity> InMemoryStore<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every row, in insertion order
    pub async fn items(&self) -> Vec<E> {
        self.state.lock().await.items.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn push(&self, entities: &[E]) {
        self.state.lock().await.items.extend_from_slice(entities);
    }

    /// Append `entities` unless one of their ids is already taken
    ///
    /// Ids are checked against the stored rows and within the batch. On
    /// error nothing is appended.
    pub async fn insert_new(&self, entities: &[E]) -> RepositoryResult<()> {
        let mut state = self.state.lock().await;
        let mut seen: HashSet<&E::Id> =
            state.items.iter().map(|item| item.entity_id()).collect();
        if let Some(taken) = entities
            .iter()
            .find(|entity| !seen.insert(entity.entity_id()))
        {
            return Err(RepositoryError::AlreadyExists {
                entity: E::NAME,
                id: taken.entity_id().to_string(),
            });
        }
        state.items.extend_from_slice(entities);
        Ok(())
    }

    pub async fn get(&self, id: &E::Id) -> Option<E> {
        let state = self.state.lock().await;
        state
            .items
            .iter()
            .find(|item| item.entity_id() == id)
            .cloned()
    }

    /// Mutate the row carrying `id` in place
    pub async fn modify(&self, id: &E::Id, f: impl FnOnce(&mut E)) -> RepositoryResult<()> {
        let mut state = self.state.lock().await;
        let item = state
            .items
            .iter_mut()
            .find(|item| item.entity_id() == id)
            .ok_or_else(|| NotFoundError::new(id, E::NAME))?;
        f(item);
        Ok(())
    }

    /// Mutate every row in place
    pub async fn modify_all(&self, mut f: impl FnMut(&mut E) + Send) {
        let mut state = self.state.lock().await;
        state.items.iter_mut().for_each(|item| f(item));
    }

    pub async fn remove(&self, id: &E::Id) -> RepositoryResult<()> {
        let mut state = self.state.lock().await;
        let position = state
            .items
            .iter()
            .position(|item| item.entity_id() == id)
            .ok_or_else(|| NotFoundError::new(id, E::NAME))?;
        state.items.remove(position);
        Ok(())
    }
}

#[async_trait]
impl<E: Entity> Checkpoint for InMemoryStore<E> {
    async fn checkpoint(&self) {
        let mut state = self.state.lock().await;
        state.saved = Some(state.items.clone());
    }

    async fn restore(&self) {
        let mut state = self.state.lock().await;
        if let Some(saved) = state.saved.take() {
            state.items = saved;
        }
    }

    async fn release(&self) {
        self.state.lock().await.saved = None;
    }
}

/// Order entities the way every backend must: the requested allowlisted
/// field, else `created_at DESC`; ties by `created_at ASC` then id.
pub fn sort_entities<E: Searchable>(
    items: &mut [E],
    sort: Option<&str>,
    sort_dir: Option<SortDirection>,
) {
    let field = sort.filter(|field| E::SORTABLE_FIELDS.contains(field));
    let direction = sort_dir.unwrap_or_default();

    items.sort_by(|a, b| {
        let primary = match field {
            Some(field) => {
                let ordering = a.sort_value(field).cmp(&b.sort_value(field));
                match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            }
            None => b.created_at().cmp(&a.created_at()),
        };
        primary
            .then_with(|| a.created_at().cmp(&b.created_at()))
            .then_with(|| a.entity_id().cmp(b.entity_id()))
    });
}

/// Filter, sort and paginate a set of entities
pub fn search_entities<E: Searchable>(
    items: Vec<E>,
    params: &SearchParams<FilterOf<E>>,
) -> SearchResult<E> {
    let mut matching: Vec<E> = match params.filter() {
        Some(filter) => items.into_iter().filter(|item| item.matches(filter)).collect(),
        None => items,
    };
    sort_entities(&mut matching, params.sort(), params.sort_dir());

    let total = matching.len() as u64;
    let offset = usize::try_from(params.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(params.limit()).unwrap_or(usize::MAX);
    let page: Vec<E> = matching.into_iter().skip(offset).take(limit).collect();

    SearchResult::new(page, total, params.page(), params.per_page())
}

/// Follow-up run after a row is deleted, the in-memory stand-in for
/// `ON DELETE CASCADE`
#[async_trait]
pub trait DeleteCascade<Id>: Send + Sync {
    async fn on_delete(&self, id: &Id);
}

/// Strip a deleted id from every row of another store
struct Detach<D, F> {
    store: InMemoryStore<D>,
    detach: F,
}

#[async_trait]
impl<D, Id, F> DeleteCascade<Id> for Detach<D, F>
where
    D: Entity,
    Id: Sync,
    F: Fn(&mut D, &Id) + Send + Sync,
{
    async fn on_delete(&self, id: &Id) {
        self.store.modify_all(|row| (self.detach)(row, id)).await;
    }
}

/// Generic in-memory implementation of [`SearchableRepository`]
pub struct InMemoryRepository<E: Entity> {
    store: InMemoryStore<E>,
    cascades: Vec<Arc<dyn DeleteCascade<E::Id>>>,
}

impl<E: Entity + fmt::Debug> fmt::Debug for InMemoryRepository<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRepository")
            .field("store", &self.store)
            .field("cascades", &self.cascades.len())
            .finish()
    }
}

impl<E: Entity> Clone for InMemoryRepository<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cascades: self.cascades.clone(),
        }
    }
}

impl<E: Searchable> Default for InMemoryRepository<E> {
    fn default() -> Self {
        Self {
            store: InMemoryStore::new(),
            cascades: Vec::new(),
        }
    }
}

impl<E: Searchable> InMemoryRepository<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on the underlying rows, e.g. to register with a unit of work
    pub fn store(&self) -> InMemoryStore<E> {
        self.store.clone()
    }

    /// After a delete, call `detach` with the deleted id on every row of
    /// `store`
    pub fn on_delete_detach<D, F>(mut self, store: InMemoryStore<D>, detach: F) -> Self
    where
        D: Entity,
        F: Fn(&mut D, &E::Id) + Send + Sync + 'static,
    {
        self.cascades.push(Arc::new(Detach { store, detach }));
        self
    }
}

#[async_trait]
impl<E: Searchable> SearchableRepository for InMemoryRepository<E> {
    type Entity = E;

    async fn insert(&self, entity: &E) -> RepositoryResult<()> {
        debug!(entity = E::NAME, id = %entity.entity_id(), "insert");
        self.store.insert_new(std::slice::from_ref(entity)).await
    }

    async fn bulk_insert(&self, entities: &[E]) -> RepositoryResult<()> {
        debug!(entity = E::NAME, count = entities.len(), "bulk insert");
        self.store.insert_new(entities).await
    }

    async fn update(&self, entity: &E) -> RepositoryResult<()> {
        self.store
            .modify(entity.entity_id(), |stored| stored.apply_update(entity))
            .await
    }

    async fn delete(&self, id: &E::Id) -> RepositoryResult<()> {
        self.store.remove(id).await?;
        for cascade in &self.cascades {
            cascade.on_delete(id).await;
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &E::Id) -> RepositoryResult<Option<E>> {
        Ok(self.store.get(id).await)
    }

    async fn find_all(&self) -> RepositoryResult<Vec<E>> {
        Ok(self.store.items().await)
    }

    async fn find_by_ids(&self, ids: &[E::Id]) -> RepositoryResult<Vec<E>> {
        let items = self.store.items().await;
        Ok(items
            .into_iter()
            .filter(|item| ids.contains(item.entity_id()))
            .collect())
    }

    async fn exists_by_id(&self, ids: &[E::Id]) -> RepositoryResult<ExistsResult<E::Id>> {
        let items = self.store.items().await;
        let mut result = ExistsResult::default();
        for id in ids {
            if items.iter().any(|item| item.entity_id() == id) {
                result.exists.push(*id);
            } else {
                result.not_exists.push(*id);
            }
        }
        Ok(result)
    }

    async fn search(
        &self,
        params: &SearchParams<FilterOf<E>>,
    ) -> RepositoryResult<SearchResult<E>> {
        let items = self.store.items().await;
        Ok(search_entities(items, params))
    }
}
