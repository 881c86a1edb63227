//! Repositories for the catalog aggregates
//!
//! Each aggregate has a repository port with two backends: the generic
//! [`InMemoryRepository`] and a PostgreSQL repository that runs its
//! statements on the connection handed out by a [`common::PgUnitOfWork`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use common::memory::InMemoryRepository;
use common::{ExistsResult, RepositoryResult, SearchableRepository, SortDirection};
use sqlx::{PgConnection, Postgres, QueryBuilder, Row};
use tracing::debug;
use uuid::Uuid;

use crate::models::{CastMember, Category, Genre, Video};

pub mod cast_member;
pub mod category;
pub mod genre;
pub mod video;

pub use cast_member::PgCastMemberRepository;
pub use category::PgCategoryRepository;
pub use genre::PgGenreRepository;
pub use video::PgVideoRepository;

pub trait CategoryRepository: SearchableRepository<Entity = Category> {}

impl<T: SearchableRepository<Entity = Category>> CategoryRepository for T {}

pub trait CastMemberRepository: SearchableRepository<Entity = CastMember> {}

impl<T: SearchableRepository<Entity = CastMember>> CastMemberRepository for T {}

pub trait GenreRepository: SearchableRepository<Entity = Genre> {}

impl<T: SearchableRepository<Entity = Genre>> GenreRepository for T {}

#[async_trait]
pub trait VideoRepository: SearchableRepository<Entity = Video> {
    /// Persist the media slots and the publication flag of a stored video
    ///
    /// Fails with `NotFound` when the video does not exist.
    async fn update_media(&self, video: &Video) -> RepositoryResult<()>;
}

pub type InMemoryCategoryRepository = InMemoryRepository<Category>;
pub type InMemoryCastMemberRepository = InMemoryRepository<CastMember>;
pub type InMemoryGenreRepository = InMemoryRepository<Genre>;
pub type InMemoryVideoRepository = InMemoryRepository<Video>;

#[async_trait]
impl VideoRepository for InMemoryRepository<Video> {
    async fn update_media(&self, video: &Video) -> RepositoryResult<()> {
        debug!(id = %video.video_id(), "update media");
        self.store()
            .modify(&video.video_id, |stored| {
                stored.banner = video.banner.clone();
                stored.thumbnail = video.thumbnail.clone();
                stored.thumbnail_half = video.thumbnail_half.clone();
                stored.trailer = video.trailer.clone();
                stored.video = video.video.clone();
                stored.is_published = video.is_published;
            })
            .await
    }
}

/// `ILIKE` pattern matching `term` anywhere, with wildcards escaped
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Append the `ORDER BY` clause shared by every search
///
/// `columns` maps each sortable field to its SQL expression; text columns use
/// `COLLATE "C"` so the order is byte-wise. Unknown fields fall back to
/// `created_at DESC`.
pub(crate) fn push_order_by(
    builder: &mut QueryBuilder<'_, Postgres>,
    columns: &[(&str, &str)],
    sort: Option<&str>,
    sort_dir: Option<SortDirection>,
    id_column: &str,
) {
    let sorted = sort.and_then(|field| {
        columns
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, expression)| *expression)
    });

    builder.push(" ORDER BY ");
    match sorted {
        Some(expression) => {
            builder.push(expression);
            builder.push(" ");
            builder.push(sort_dir.unwrap_or_default().as_sql());
        }
        None => {
            builder.push("created_at DESC");
        }
    }
    builder.push(", created_at ASC, ");
    builder.push(id_column);
    builder.push(" ASC");
}

/// Append `LIMIT` and `OFFSET` for a page
pub(crate) fn push_page(builder: &mut QueryBuilder<'_, Postgres>, limit: u64, offset: u64) {
    builder.push(" LIMIT ");
    builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    builder.push(" OFFSET ");
    builder.push_bind(i64::try_from(offset).unwrap_or(i64::MAX));
}

/// Description of a junction table
#[derive(Debug, Clone, Copy)]
pub(crate) struct Junction {
    pub table: &'static str,
    pub owner_column: &'static str,
    pub related_column: &'static str,
}

impl Junction {
    /// Related ids of each owner, for hydrating a batch of aggregates
    pub async fn load(
        &self,
        conn: &mut PgConnection,
        owners: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Uuid>>, sqlx::Error> {
        let mut related: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        if owners.is_empty() {
            return Ok(related);
        }

        let sql = format!(
            "SELECT {owner} AS owner_id, {related} AS related_id FROM {table} WHERE {owner} = ANY($1)",
            owner = self.owner_column,
            related = self.related_column,
            table = self.table,
        );
        let rows = sqlx::query(&sql).bind(owners).fetch_all(conn).await?;
        for row in rows {
            related
                .entry(row.try_get("owner_id")?)
                .or_default()
                .push(row.try_get("related_id")?);
        }
        Ok(related)
    }

    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        owner: Uuid,
        related: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        if related.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "INSERT INTO {table} ({owner}, {related}) SELECT $1, UNNEST($2::uuid[]) ON CONFLICT DO NOTHING",
            table = self.table,
            owner = self.owner_column,
            related = self.related_column,
        );
        sqlx::query(&sql)
            .bind(owner)
            .bind(related)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Delete rows no longer related and add the new ones, leaving the
    /// unchanged rows in place
    pub async fn sync(
        &self,
        conn: &mut PgConnection,
        owner: Uuid,
        related: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        let sql = format!(
            "DELETE FROM {table} WHERE {owner} = $1 AND NOT ({related} = ANY($2))",
            table = self.table,
            owner = self.owner_column,
            related = self.related_column,
        );
        sqlx::query(&sql)
            .bind(owner)
            .bind(related)
            .execute(&mut *conn)
            .await?;

        self.insert(conn, owner, related).await
    }

    /// Restrict a query to owners related to at least one of `related`
    pub fn push_intersects(
        &self,
        builder: &mut QueryBuilder<'_, Postgres>,
        owner_expression: &str,
        related: &[Uuid],
    ) {
        builder.push(format!(
            " AND {owner_expression} IN (SELECT {owner} FROM {table} WHERE {related} = ANY(",
            owner = self.owner_column,
            table = self.table,
            related = self.related_column,
        ));
        builder.push_bind(related.to_vec());
        builder.push("))");
    }
}

/// Split `ids` into existing and missing, preserving input order
pub(crate) async fn exists_in<I: common::EntityId>(
    conn: &mut PgConnection,
    table: &str,
    id_column: &str,
    ids: &[I],
) -> Result<ExistsResult<I>, sqlx::Error> {
    let mut result = ExistsResult::default();
    if ids.is_empty() {
        return Ok(result);
    }

    let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
    let sql = format!("SELECT {id_column} AS id FROM {table} WHERE {id_column} = ANY($1)");
    let found: HashSet<Uuid> = sqlx::query(&sql)
        .bind(&uuids)
        .fetch_all(conn)
        .await?
        .into_iter()
        .map(|row| row.try_get("id"))
        .collect::<Result<_, _>>()?;

    for id in ids {
        if found.contains(&id.as_uuid()) {
            result.exists.push(*id);
        } else {
            result.not_exists.push(*id);
        }
    }
    Ok(result)
}

/// Convert stored UUIDs back into typed identifiers
pub(crate) fn typed_ids<I: common::EntityId>(uuids: Option<&Vec<Uuid>>) -> Vec<I> {
    uuids
        .map(|uuids| uuids.iter().copied().map(I::from_uuid).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AudioVideoMedia, ImageMedia, Rating, VideoCreateCommand};

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("abc"), "%abc%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn test_order_by_known_field() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM categories");
        push_order_by(
            &mut builder,
            &[("name", "name COLLATE \"C\""), ("created_at", "created_at")],
            Some("name"),
            Some(SortDirection::Desc),
            "category_id",
        );
        assert_eq!(
            builder.sql(),
            "SELECT * FROM categories ORDER BY name COLLATE \"C\" DESC, created_at ASC, category_id ASC"
        );
    }

    #[test]
    fn test_order_by_unknown_field_falls_back() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM categories");
        push_order_by(
            &mut builder,
            &[("name", "name COLLATE \"C\"")],
            Some("description; DROP TABLE categories"),
            Some(SortDirection::Asc),
            "category_id",
        );
        assert_eq!(
            builder.sql(),
            "SELECT * FROM categories ORDER BY created_at DESC, created_at ASC, category_id ASC"
        );
    }

    #[tokio::test]
    async fn test_in_memory_update_media_only_touches_media() {
        let repository = InMemoryVideoRepository::new();
        let mut video = Video::create(VideoCreateCommand {
            title: "Movie".to_string(),
            description: "desc".to_string(),
            year_launched: 2001,
            duration: 120,
            rating: Rating::R14,
            is_opened: true,
            categories_id: vec![],
            genres_id: vec![],
            cast_members_id: vec![],
        });
        repository.insert(&video).await.unwrap();

        video.change_title("Not persisted");
        video.replace_banner(ImageMedia::new("banner.png", "images/banner.png"));
        video.replace_trailer(AudioVideoMedia::new("trailer.mp4", "raw/trailer.mp4"));
        repository.update_media(&video).await.unwrap();

        let stored = repository
            .find_by_id(&video.video_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.title(), "Movie");
        assert!(stored.image(crate::models::ImageField::Banner).is_some());
        assert!(
            stored
                .audio_video(crate::models::AudioVideoField::Trailer)
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_in_memory_update_media_of_unknown_video() {
        let repository = InMemoryVideoRepository::new();
        let video = Video::create(VideoCreateCommand {
            title: "Movie".to_string(),
            description: "desc".to_string(),
            year_launched: 2001,
            duration: 120,
            rating: Rating::RL,
            is_opened: false,
            categories_id: vec![],
            genres_id: vec![],
            cast_members_id: vec![],
        });

        let error = repository.update_media(&video).await.unwrap_err();
        assert_eq!(
            error.to_string(),
            format!("Video Not Found using ID {}", video.video_id())
        );
    }
}
