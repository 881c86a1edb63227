//! Relation-existence validation
//!
//! Before an aggregate referencing other aggregates is written, the
//! referenced ids are checked against their own repository. Validation runs
//! outside the write transaction; the junction tables' foreign keys catch a
//! row disappearing in between.

use std::sync::Arc;

use common::{Entity, EntityId, NotFoundError, Notification, RepositoryResult, SearchableRepository};
use tracing::debug;

type IdOf<R> = <<R as SearchableRepository>::Entity as Entity>::Id;

/// Either every id exists, or the errors for those that do not
pub type RelationOutcome<I> = Result<Vec<I>, Vec<NotFoundError>>;

/// Checks that a list of raw ids all name stored aggregates of one type
pub struct RelationValidator<R: ?Sized> {
    repository: Arc<R>,
}

impl<R: ?Sized> Clone for RelationValidator<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: SearchableRepository + ?Sized> RelationValidator<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Parse and look up every id in a single batch
    ///
    /// Duplicates are collapsed. Malformed and missing ids both yield a
    /// `NotFoundError`, in input order. The outer result only carries backend
    /// failures.
    pub async fn validate(&self, raw_ids: &[String]) -> RepositoryResult<RelationOutcome<IdOf<R>>> {
        let entity = <R::Entity as Entity>::NAME;

        let mut seen: Vec<&str> = Vec::with_capacity(raw_ids.len());
        let mut slots: Vec<Result<IdOf<R>, &str>> = Vec::with_capacity(raw_ids.len());
        for raw in raw_ids {
            if seen.contains(&raw.as_str()) {
                continue;
            }
            seen.push(raw);
            slots.push(raw.parse::<IdOf<R>>().map_err(|_| raw.as_str()));
        }

        let parsed: Vec<IdOf<R>> = slots.iter().filter_map(|slot| slot.ok()).collect();
        let existence = self.repository.exists_by_id(&parsed).await?;

        let errors: Vec<NotFoundError> = slots
            .iter()
            .filter_map(|slot| match slot {
                Ok(id) if existence.not_exists.contains(id) => Some(NotFoundError::new(id, entity)),
                Ok(_) => None,
                Err(raw) => Some(NotFoundError::new(raw, entity)),
            })
            .collect();

        if errors.is_empty() {
            Ok(Ok(existence.exists))
        } else {
            debug!(entity, missing = errors.len(), "Referenced aggregates not found");
            Ok(Err(errors))
        }
    }
}

/// Record the errors of an outcome under `field`, returning the valid ids
pub fn merge_outcome<I: EntityId>(
    notification: &mut Notification,
    field: &str,
    outcome: RelationOutcome<I>,
) -> Vec<I> {
    match outcome {
        Ok(ids) => ids,
        Err(errors) => {
            notification.set_error(field, errors.iter().map(ToString::to_string).collect());
            Vec::new()
        }
    }
}
