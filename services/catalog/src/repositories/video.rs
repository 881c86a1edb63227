//! PostgreSQL video repository
//!
//! A video spans the `videos` root row, three junction tables and the
//! `image_medias` / `audio_video_medias` tables holding its media slots.
//! The generic `update` never writes media rows; [`VideoRepository::update_media`]
//! is the only path that does.

use std::collections::HashMap;

use async_trait::async_trait;
use common::repository::FilterOf;
use common::{
    Entity, EntityId, ExistsResult, NotFoundError, PgUnitOfWork, RepositoryError,
    RepositoryResult, SearchParams, SearchResult, SearchableRepository,
};
use sqlx::postgres::PgRow;
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{
    Junction, VideoRepository, exists_in, like_pattern, push_order_by, push_page, typed_ids,
};
use crate::models::{
    AudioVideoField, AudioVideoMedia, AudioVideoMediaStatus, CastMemberId, CategoryId, GenreId,
    ImageField, ImageMedia, Rating, Video, VideoFilter, VideoId,
};

const SORT_COLUMNS: &[(&str, &str)] = &[
    ("title", "title COLLATE \"C\""),
    ("created_at", "created_at"),
];

const SELECT_VIDEO: &str = "SELECT video_id, title, description, year_launched, duration, rating, \
     is_opened, is_published, created_at FROM videos";

const VIDEO_CATEGORIES: Junction = Junction {
    table: "video_categories",
    owner_column: "video_id",
    related_column: "category_id",
};

const VIDEO_GENRES: Junction = Junction {
    table: "video_genres",
    owner_column: "video_id",
    related_column: "genre_id",
};

const VIDEO_CAST_MEMBERS: Junction = Junction {
    table: "video_cast_members",
    owner_column: "video_id",
    related_column: "cast_member_id",
};

fn corrupted(table: &'static str) -> impl FnOnce(String) -> RepositoryError {
    move |reason| RepositoryError::Corrupted { table, reason }
}

/// Media rows of a batch of videos, keyed by video then slot
#[derive(Default)]
struct MediaRows {
    images: HashMap<Uuid, HashMap<ImageField, ImageMedia>>,
    audio_videos: HashMap<Uuid, HashMap<AudioVideoField, AudioVideoMedia>>,
}

#[derive(Clone)]
pub struct PgVideoRepository {
    uow: PgUnitOfWork,
}

impl PgVideoRepository {
    pub fn new(uow: PgUnitOfWork) -> Self {
        Self { uow }
    }

    async fn load_media(conn: &mut PgConnection, owners: &[Uuid]) -> RepositoryResult<MediaRows> {
        let mut media = MediaRows::default();
        if owners.is_empty() {
            return Ok(media);
        }

        let rows = sqlx::query(
            "SELECT video_id, video_related_field, name, location FROM image_medias WHERE video_id = ANY($1)",
        )
        .bind(owners)
        .fetch_all(&mut *conn)
        .await?;
        for row in rows {
            let field: String = row.try_get("video_related_field")?;
            let field: ImageField = field.parse().map_err(corrupted("image_medias"))?;
            media
                .images
                .entry(row.try_get("video_id")?)
                .or_default()
                .insert(
                    field,
                    ImageMedia::new(
                        row.try_get::<String, _>("name")?,
                        row.try_get::<String, _>("location")?,
                    ),
                );
        }

        let rows = sqlx::query(
            r#"
            SELECT video_id, video_related_field, name, raw_location, encoded_location, status
            FROM audio_video_medias
            WHERE video_id = ANY($1)
            "#,
        )
        .bind(owners)
        .fetch_all(&mut *conn)
        .await?;
        for row in rows {
            let field: String = row.try_get("video_related_field")?;
            let status: String = row.try_get("status")?;
            let field: AudioVideoField = field.parse().map_err(corrupted("audio_video_medias"))?;
            let audio_video = AudioVideoMedia {
                name: row.try_get("name")?,
                raw_location: row.try_get("raw_location")?,
                encoded_location: row.try_get("encoded_location")?,
                status: status
                    .parse::<AudioVideoMediaStatus>()
                    .map_err(corrupted("audio_video_medias"))?,
            };
            media
                .audio_videos
                .entry(row.try_get("video_id")?)
                .or_default()
                .insert(field, audio_video);
        }

        Ok(media)
    }

    /// Turn root rows into videos with their relations and media
    async fn hydrate(conn: &mut PgConnection, rows: Vec<PgRow>) -> RepositoryResult<Vec<Video>> {
        let owners = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("video_id"))
            .collect::<Result<Vec<_>, _>>()?;
        let categories = VIDEO_CATEGORIES.load(&mut *conn, &owners).await?;
        let genres = VIDEO_GENRES.load(&mut *conn, &owners).await?;
        let cast_members = VIDEO_CAST_MEMBERS.load(&mut *conn, &owners).await?;
        let mut media = Self::load_media(conn, &owners).await?;

        let mut videos = Vec::with_capacity(rows.len());
        for (row, video_id) in rows.iter().zip(&owners) {
            let rating: String = row.try_get("rating")?;
            let mut images = media.images.remove(video_id).unwrap_or_default();
            let mut audio_videos = media.audio_videos.remove(video_id).unwrap_or_default();

            videos.push(Video {
                video_id: VideoId::from_uuid(*video_id),
                title: row.try_get("title")?,
                description: row.try_get("description")?,
                year_launched: row.try_get("year_launched")?,
                duration: row.try_get("duration")?,
                rating: rating.parse::<Rating>().map_err(corrupted("videos"))?,
                is_opened: row.try_get("is_opened")?,
                is_published: row.try_get("is_published")?,
                banner: images.remove(&ImageField::Banner),
                thumbnail: images.remove(&ImageField::Thumbnail),
                thumbnail_half: images.remove(&ImageField::ThumbnailHalf),
                trailer: audio_videos.remove(&AudioVideoField::Trailer),
                video: audio_videos.remove(&AudioVideoField::Video),
                categories_id: typed_ids::<CategoryId>(categories.get(video_id))
                    .into_iter()
                    .collect(),
                genres_id: typed_ids::<GenreId>(genres.get(video_id))
                    .into_iter()
                    .collect(),
                cast_members_id: typed_ids::<CastMemberId>(cast_members.get(video_id))
                    .into_iter()
                    .collect(),
                created_at: row.try_get("created_at")?,
                events: Vec::new(),
                notification: Default::default(),
            });
        }
        Ok(videos)
    }

    /// Write the media slots of a video, replacing whatever was stored
    async fn write_media(conn: &mut PgConnection, video: &Video) -> Result<(), sqlx::Error> {
        let video_id = video.video_id.as_uuid();

        sqlx::query("DELETE FROM image_medias WHERE video_id = $1")
            .bind(video_id)
            .execute(&mut *conn)
            .await?;
        for field in ImageField::ALL {
            let Some(image) = video.image(field) else {
                continue;
            };
            sqlx::query(
                "INSERT INTO image_medias (video_id, video_related_field, name, location) VALUES ($1, $2, $3, $4)",
            )
            .bind(video_id)
            .bind(field.as_str())
            .bind(&image.name)
            .bind(&image.location)
            .execute(&mut *conn)
            .await?;
        }

        sqlx::query("DELETE FROM audio_video_medias WHERE video_id = $1")
            .bind(video_id)
            .execute(&mut *conn)
            .await?;
        for field in AudioVideoField::ALL {
            let Some(media) = video.audio_video(field) else {
                continue;
            };
            sqlx::query(
                r#"
                INSERT INTO audio_video_medias
                    (video_id, video_related_field, name, raw_location, encoded_location, status)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(video_id)
            .bind(field.as_str())
            .bind(&media.name)
            .bind(&media.raw_location)
            .bind(&media.encoded_location)
            .bind(media.status.as_str())
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    async fn write_relations(
        conn: &mut PgConnection,
        video: &Video,
        sync: bool,
    ) -> Result<(), sqlx::Error> {
        let video_id = video.video_id.as_uuid();
        let relations = [
            (
                VIDEO_CATEGORIES,
                video.categories_id.ids().map(EntityId::as_uuid).collect::<Vec<_>>(),
            ),
            (
                VIDEO_GENRES,
                video.genres_id.ids().map(EntityId::as_uuid).collect(),
            ),
            (
                VIDEO_CAST_MEMBERS,
                video.cast_members_id.ids().map(EntityId::as_uuid).collect(),
            ),
        ];

        for (junction, related) in relations {
            if sync {
                junction.sync(&mut *conn, video_id, &related).await?;
            } else {
                junction.insert(&mut *conn, video_id, &related).await?;
            }
        }
        Ok(())
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: Option<&VideoFilter>) {
        builder.push(" WHERE TRUE");
        let Some(filter) = filter else {
            return;
        };
        if let Some(title) = &filter.title {
            builder.push(" AND title ILIKE ");
            builder.push_bind(like_pattern(title));
        }
        if !filter.categories_id.is_empty() {
            let related: Vec<Uuid> = filter.categories_id.iter().map(EntityId::as_uuid).collect();
            VIDEO_CATEGORIES.push_intersects(builder, "video_id", &related);
        }
        if !filter.genres_id.is_empty() {
            let related: Vec<Uuid> = filter.genres_id.iter().map(EntityId::as_uuid).collect();
            VIDEO_GENRES.push_intersects(builder, "video_id", &related);
        }
        if !filter.cast_members_id.is_empty() {
            let related: Vec<Uuid> = filter.cast_members_id.iter().map(EntityId::as_uuid).collect();
            VIDEO_CAST_MEMBERS.push_intersects(builder, "video_id", &related);
        }
    }
}

#[async_trait]
impl SearchableRepository for PgVideoRepository {
    type Entity = Video;

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "insert"))]
    async fn insert(&self, entity: &Video) -> RepositoryResult<()> {
        self.bulk_insert(std::slice::from_ref(entity)).await
    }

    #[tracing::instrument(skip(self, entities), fields(db.table = "videos", db.operation = "insert", count = entities.len()))]
    async fn bulk_insert(&self, entities: &[Video]) -> RepositoryResult<()> {
        if entities.is_empty() {
            return Ok(());
        }

        let mut session = self.uow.session().await?;
        let mut tx = session.connection().begin().await?;

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO videos (video_id, title, description, year_launched, duration, rating, \
             is_opened, is_published, created_at) ",
        );
        builder.push_values(entities, |mut row, video| {
            row.push_bind(video.video_id.as_uuid())
                .push_bind(&video.title)
                .push_bind(&video.description)
                .push_bind(video.year_launched)
                .push_bind(video.duration)
                .push_bind(video.rating.as_str())
                .push_bind(video.is_opened)
                .push_bind(video.is_published)
                .push_bind(video.created_at);
        });
        builder.build().execute(&mut *tx).await?;

        for video in entities {
            Self::write_relations(&mut tx, video, false).await?;
            Self::write_media(&mut tx, video).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "update", db.record_id = %entity.video_id))]
    async fn update(&self, entity: &Video) -> RepositoryResult<()> {
        let mut session = self.uow.session().await?;
        let mut tx = session.connection().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE videos
            SET title = $2, description = $3, year_launched = $4, duration = $5,
                rating = $6, is_opened = $7
            WHERE video_id = $1
            "#,
        )
        .bind(entity.video_id.as_uuid())
        .bind(&entity.title)
        .bind(&entity.description)
        .bind(entity.year_launched)
        .bind(entity.duration)
        .bind(entity.rating.as_str())
        .bind(entity.is_opened)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(NotFoundError::new(entity.video_id, Video::NAME).into());
        }

        Self::write_relations(&mut tx, entity, true).await?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: &VideoId) -> RepositoryResult<()> {
        let mut session = self.uow.session().await?;
        let result = sqlx::query("DELETE FROM videos WHERE video_id = $1")
            .bind(id.as_uuid())
            .execute(session.connection())
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new(id, Video::NAME).into());
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "select", db.record_id = %id))]
    async fn find_by_id(&self, id: &VideoId) -> RepositoryResult<Option<Video>> {
        let mut session = self.uow.session().await?;
        let conn = session.connection();
        let rows = sqlx::query(&format!("{SELECT_VIDEO} WHERE video_id = $1"))
            .bind(id.as_uuid())
            .fetch_all(&mut *conn)
            .await?;

        Ok(Self::hydrate(conn, rows).await?.pop())
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "select"))]
    async fn find_all(&self) -> RepositoryResult<Vec<Video>> {
        let mut session = self.uow.session().await?;
        let conn = session.connection();
        let rows = sqlx::query(&format!("{SELECT_VIDEO} ORDER BY created_at ASC"))
            .fetch_all(&mut *conn)
            .await?;

        Self::hydrate(conn, rows).await
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "videos", db.operation = "select", count = ids.len()))]
    async fn find_by_ids(&self, ids: &[VideoId]) -> RepositoryResult<Vec<Video>> {
        let uuids: Vec<Uuid> = ids.iter().map(EntityId::as_uuid).collect();
        let mut session = self.uow.session().await?;
        let conn = session.connection();
        let rows = sqlx::query(&format!(
            "{SELECT_VIDEO} WHERE video_id = ANY($1) ORDER BY created_at ASC"
        ))
        .bind(&uuids)
        .fetch_all(&mut *conn)
        .await?;

        Self::hydrate(conn, rows).await
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "videos", db.operation = "select", count = ids.len()))]
    async fn exists_by_id(&self, ids: &[VideoId]) -> RepositoryResult<ExistsResult<VideoId>> {
        let mut session = self.uow.session().await?;
        Ok(exists_in(session.connection(), "videos", "video_id", ids).await?)
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "search"))]
    async fn search(
        &self,
        params: &SearchParams<FilterOf<Video>>,
    ) -> RepositoryResult<SearchResult<Video>> {
        let mut session = self.uow.session().await?;
        let conn = session.connection();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM videos");
        Self::push_filter(&mut count, params.filter());
        let total: i64 = count
            .build()
            .fetch_one(&mut *conn)
            .await?
            .try_get("total")?;

        let mut select = QueryBuilder::<Postgres>::new(SELECT_VIDEO);
        Self::push_filter(&mut select, params.filter());
        push_order_by(
            &mut select,
            SORT_COLUMNS,
            params.sort(),
            params.sort_dir(),
            "video_id",
        );
        push_page(&mut select, params.limit(), params.offset());
        let rows = select.build().fetch_all(&mut *conn).await?;
        let items = Self::hydrate(conn, rows).await?;

        Ok(SearchResult::new(
            items,
            u64::try_from(total).unwrap_or_default(),
            params.page(),
            params.per_page(),
        ))
    }
}

#[async_trait]
impl VideoRepository for PgVideoRepository {
    #[tracing::instrument(skip(self, video), fields(db.table = "videos", db.operation = "update_media", db.record_id = %video.video_id))]
    async fn update_media(&self, video: &Video) -> RepositoryResult<()> {
        let mut session = self.uow.session().await?;
        let mut tx = session.connection().begin().await?;

        let result = sqlx::query("UPDATE videos SET is_published = $2 WHERE video_id = $1")
            .bind(video.video_id.as_uuid())
            .bind(video.is_published)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(NotFoundError::new(video.video_id, Video::NAME).into());
        }

        Self::write_media(&mut tx, video).await?;

        tx.commit().await?;
        Ok(())
    }
}
