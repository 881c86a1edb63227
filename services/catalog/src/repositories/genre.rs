//! PostgreSQL genre repository
//!
//! A genre is stored as one `genres` row plus one `genre_categories` row per
//! related category.

use std::collections::HashMap;

use async_trait::async_trait;
use common::repository::FilterOf;
use common::{
    Entity, EntityId, ExistsResult, NotFoundError, PgUnitOfWork, RepositoryResult, SearchParams,
    SearchResult, SearchableRepository,
};
use sqlx::postgres::PgRow;
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{Junction, exists_in, like_pattern, push_order_by, push_page, typed_ids};
use crate::models::{CategoryId, Genre, GenreFilter, GenreId};

const SORT_COLUMNS: &[(&str, &str)] = &[
    ("name", "name COLLATE \"C\""),
    ("created_at", "created_at"),
];

const SELECT_GENRE: &str = "SELECT genre_id, name, is_active, created_at FROM genres";

const GENRE_CATEGORIES: Junction = Junction {
    table: "genre_categories",
    owner_column: "genre_id",
    related_column: "category_id",
};

#[derive(Clone)]
pub struct PgGenreRepository {
    uow: PgUnitOfWork,
}

impl PgGenreRepository {
    pub fn new(uow: PgUnitOfWork) -> Self {
        Self { uow }
    }

    /// Turn root rows into genres, loading their categories in one query
    async fn hydrate(conn: &mut PgConnection, rows: Vec<PgRow>) -> RepositoryResult<Vec<Genre>> {
        let owners = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("genre_id"))
            .collect::<Result<Vec<_>, _>>()?;
        let categories: HashMap<Uuid, Vec<Uuid>> = GENRE_CATEGORIES.load(conn, &owners).await?;

        rows.iter()
            .zip(&owners)
            .map(|(row, genre_id)| -> RepositoryResult<Genre> {
                Ok(Genre::restore(
                    GenreId::from_uuid(*genre_id),
                    row.try_get("name")?,
                    typed_ids::<CategoryId>(categories.get(genre_id)).into_iter().collect(),
                    row.try_get("is_active")?,
                    row.try_get("created_at")?,
                ))
            })
            .collect()
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: Option<&GenreFilter>) {
        builder.push(" WHERE TRUE");
        let Some(filter) = filter else {
            return;
        };
        if let Some(name) = &filter.name {
            builder.push(" AND name ILIKE ");
            builder.push_bind(like_pattern(name));
        }
        if !filter.categories_id.is_empty() {
            let related: Vec<Uuid> = filter.categories_id.iter().map(EntityId::as_uuid).collect();
            GENRE_CATEGORIES.push_intersects(builder, "genre_id", &related);
        }
    }
}

#[async_trait]
impl SearchableRepository for PgGenreRepository {
    type Entity = Genre;

    #[tracing::instrument(skip(self), fields(db.table = "genres", db.operation = "insert"))]
    async fn insert(&self, entity: &Genre) -> RepositoryResult<()> {
        self.bulk_insert(std::slice::from_ref(entity)).await
    }

    #[tracing::instrument(skip(self, entities), fields(db.table = "genres", db.operation = "insert", count = entities.len()))]
    async fn bulk_insert(&self, entities: &[Genre]) -> RepositoryResult<()> {
        if entities.is_empty() {
            return Ok(());
        }

        let mut session = self.uow.session().await?;
        let mut tx = session.connection().begin().await?;

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO genres (genre_id, name, is_active, created_at) ",
        );
        builder.push_values(entities, |mut row, genre| {
            row.push_bind(genre.genre_id.as_uuid())
                .push_bind(&genre.name)
                .push_bind(genre.is_active)
                .push_bind(genre.created_at);
        });
        builder.build().execute(&mut *tx).await?;

        for genre in entities {
            let related: Vec<Uuid> = genre.categories_id.ids().map(EntityId::as_uuid).collect();
            GENRE_CATEGORIES
                .insert(&mut tx, genre.genre_id.as_uuid(), &related)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "genres", db.operation = "update", db.record_id = %entity.genre_id))]
    async fn update(&self, entity: &Genre) -> RepositoryResult<()> {
        let mut session = self.uow.session().await?;
        let mut tx = session.connection().begin().await?;

        let result =
            sqlx::query("UPDATE genres SET name = $2, is_active = $3 WHERE genre_id = $1")
                .bind(entity.genre_id.as_uuid())
                .bind(&entity.name)
                .bind(entity.is_active)
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(NotFoundError::new(entity.genre_id, Genre::NAME).into());
        }

        let related: Vec<Uuid> = entity.categories_id.ids().map(EntityId::as_uuid).collect();
        GENRE_CATEGORIES
            .sync(&mut tx, entity.genre_id.as_uuid(), &related)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "genres", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: &GenreId) -> RepositoryResult<()> {
        let mut session = self.uow.session().await?;
        let result = sqlx::query("DELETE FROM genres WHERE genre_id = $1")
            .bind(id.as_uuid())
            .execute(session.connection())
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new(id, Genre::NAME).into());
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "genres", db.operation = "select", db.record_id = %id))]
    async fn find_by_id(&self, id: &GenreId) -> RepositoryResult<Option<Genre>> {
        let mut session = self.uow.session().await?;
        let conn = session.connection();
        let rows = sqlx::query(&format!("{SELECT_GENRE} WHERE genre_id = $1"))
            .bind(id.as_uuid())
            .fetch_all(&mut *conn)
            .await?;

        Ok(Self::hydrate(conn, rows).await?.pop())
    }

    #[tracing::instrument(skip(self), fields(db.table = "genres", db.operation = "select"))]
    async fn find_all(&self) -> RepositoryResult<Vec<Genre>> {
        let mut session = self.uow.session().await?;
        let conn = session.connection();
        let rows = sqlx::query(&format!("{SELECT_GENRE} ORDER BY created_at ASC"))
            .fetch_all(&mut *conn)
            .await?;

        Self::hydrate(conn, rows).await
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "genres", db.operation = "select", count = ids.len()))]
    async fn find_by_ids(&self, ids: &[GenreId]) -> RepositoryResult<Vec<Genre>> {
        let uuids: Vec<Uuid> = ids.iter().map(EntityId::as_uuid).collect();
        let mut session = self.uow.session().await?;
        let conn = session.connection();
        let rows = sqlx::query(&format!(
            "{SELECT_GENRE} WHERE genre_id = ANY($1) ORDER BY created_at ASC"
        ))
        .bind(&uuids)
        .fetch_all(&mut *conn)
        .await?;

        Self::hydrate(conn, rows).await
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "genres", db.operation = "select", count = ids.len()))]
    async fn exists_by_id(&self, ids: &[GenreId]) -> RepositoryResult<ExistsResult<GenreId>> {
        let mut session = self.uow.session().await?;
        Ok(exists_in(session.connection(), "genres", "genre_id", ids).await?)
    }

    #[tracing::instrument(skip(self), fields(db.table = "genres", db.operation = "search"))]
    async fn search(
        &self,
        params: &SearchParams<FilterOf<Genre>>,
    ) -> RepositoryResult<SearchResult<Genre>> {
        let mut session = self.uow.session().await?;
        let conn = session.connection();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM genres");
        Self::push_filter(&mut count, params.filter());
        let total: i64 = count
            .build()
            .fetch_one(&mut *conn)
            .await?
            .try_get("total")?;

        let mut select = QueryBuilder::<Postgres>::new(SELECT_GENRE);
        Self::push_filter(&mut select, params.filter());
        push_order_by(
            &mut select,
            SORT_COLUMNS,
            params.sort(),
            params.sort_dir(),
            "genre_id",
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
