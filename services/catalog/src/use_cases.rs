//! Application operations of the catalog
//!
//! Every write goes through [`UnitOfWorkExt::run`](common::UnitOfWorkExt::run):
//! validation happens first and a failure never opens a transaction.

use common::{EntityId, SearchResult};
use serde::Serialize;

use crate::error::CatalogResult;

pub mod cast_member;
pub mod category;
pub mod genre;
pub mod video;

pub use cast_member::{CastMemberOutput, CastMemberUseCases, UpdateCastMemberInput};
pub use category::{CategoryOutput, CategoryUseCases, UpdateCategoryInput};
pub use genre::{CreateGenreInput, GenreOutput, GenreUseCases, UpdateGenreInput};
pub use video::{
    CreateVideoInput, ProcessAudioVideoMediaInput, ReplaceAudioVideoMediaInput,
    ReplaceImageMediaInput, ReplaceMediaOutput, UpdateVideoInput, VideoOutput, VideoUseCases,
};

/// One page of presented items
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListOutput<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub current_page: u64,
    pub per_page: u64,
    pub last_page: u64,
}

impl<T> ListOutput<T> {
    pub fn present<E>(result: SearchResult<E>, present: impl FnMut(E) -> T) -> Self {
        let result = result.map(present);
        Self {
            total: result.total(),
            current_page: result.current_page(),
            per_page: result.per_page(),
            last_page: result.last_page(),
            items: result.into_items(),
        }
    }
}

pub(crate) fn parse_id<I: EntityId>(raw: &str) -> CatalogResult<I> {
    Ok(raw.parse::<I>()?)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use common::{InMemoryUnitOfWork, UnitOfWork, UnitOfWorkError};

    /// In-memory unit of work that counts the transactions it opened
    #[derive(Default)]
    pub struct CountingUnitOfWork {
        inner: InMemoryUnitOfWork,
        starts: AtomicUsize,
    }

    impl CountingUnitOfWork {
        pub fn new(inner: InMemoryUnitOfWork) -> Self {
            Self {
                inner,
                starts: AtomicUsize::new(0),
            }
        }

        pub fn starts(&self) -> usize {
            self.starts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UnitOfWork for CountingUnitOfWork {
        async fn start(&self) -> Result<(), UnitOfWorkError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.inner.start().await
        }

        async fn commit(&self) -> Result<(), UnitOfWorkError> {
            self.inner.commit().await
        }

        async fn rollback(&self) -> Result<(), UnitOfWorkError> {
            self.inner.rollback().await
        }

        async fn is_active(&self) -> bool {
            self.inner.is_active().await
        }
    }
}
