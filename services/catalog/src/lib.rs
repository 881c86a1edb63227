//! Video catalog backend
//!
//! Categories, cast members, genres and videos, each with a searchable
//! repository (in memory or PostgreSQL), relation validation for the
//! aggregates that reference others, and use cases that run their writes in
//! a unit of work.

use std::sync::Arc;

use common::{InMemoryUnitOfWork, PgUnitOfWork};
use sqlx::PgPool;

use models::{Genre, Video};

pub mod database;
pub mod error;
pub mod models;
pub mod repositories;
pub mod use_cases;
pub mod validation;

pub use error::{CatalogError, CatalogResult, ErrorKind};

use repositories::{
    InMemoryCastMemberRepository, InMemoryCategoryRepository, InMemoryGenreRepository,
    InMemoryVideoRepository, PgCastMemberRepository, PgCategoryRepository, PgGenreRepository,
    PgVideoRepository,
};
use use_cases::{CastMemberUseCases, CategoryUseCases, GenreUseCases, VideoUseCases};

/// Every use case of the catalog, sharing one unit of work
#[derive(Clone)]
pub struct Catalog {
    pub categories: CategoryUseCases,
    pub cast_members: CastMemberUseCases,
    pub genres: GenreUseCases,
    pub videos: VideoUseCases,
}

impl Catalog {
    /// Wire the PostgreSQL repositories to a fresh unit of work
    ///
    /// Build one per request: the unit of work holds at most one transaction.
    pub fn postgres(pool: PgPool) -> Self {
        let uow = PgUnitOfWork::new(pool);
        let categories = Arc::new(PgCategoryRepository::new(uow.clone()));
        let cast_members = Arc::new(PgCastMemberRepository::new(uow.clone()));
        let genres = Arc::new(PgGenreRepository::new(uow.clone()));
        let videos = Arc::new(PgVideoRepository::new(uow.clone()));
        let uow = Arc::new(uow);

        Self {
            categories: CategoryUseCases::new(categories.clone(), uow.clone()),
            cast_members: CastMemberUseCases::new(cast_members.clone(), uow.clone()),
            genres: GenreUseCases::new(genres.clone(), categories.clone(), uow.clone()),
            videos: VideoUseCases::new(videos, categories, genres, cast_members, uow),
        }
    }

    /// Wire fresh in-memory repositories, all checkpointed by one unit of work
    ///
    /// Deleting a category, genre or cast member also drops its id from the
    /// genres and videos that reference it, like the junction tables'
    /// `ON DELETE CASCADE` does in PostgreSQL.
    pub fn in_memory() -> Self {
        let videos = InMemoryVideoRepository::new();
        let genres = InMemoryGenreRepository::new()
            .on_delete_detach(videos.store(), |video: &mut Video, id| video.remove_genre_id(id));
        let categories = InMemoryCategoryRepository::new()
            .on_delete_detach(genres.store(), |genre: &mut Genre, id| genre.remove_category_id(id))
            .on_delete_detach(videos.store(), |video: &mut Video, id| {
                video.remove_category_id(id)
            });
        let cast_members = InMemoryCastMemberRepository::new()
            .on_delete_detach(videos.store(), |video: &mut Video, id| {
                video.remove_cast_member_id(id)
            });
        let uow = Arc::new(
            InMemoryUnitOfWork::new()
                .with_store(categories.store())
                .with_store(cast_members.store())
                .with_store(genres.store())
                .with_store(videos.store()),
        );
        let categories = Arc::new(categories);
        let cast_members = Arc::new(cast_members);
        let genres = Arc::new(genres);

        Self {
            categories: CategoryUseCases::new(categories.clone(), uow.clone()),
            cast_members: CastMemberUseCases::new(cast_members.clone(), uow.clone()),
            genres: GenreUseCases::new(genres.clone(), categories.clone(), uow.clone()),
            videos: VideoUseCases::new(Arc::new(videos), categories, genres, cast_members, uow),
        }
    }
}
