//! PostgreSQL category repository

use async_trait::async_trait;
use common::repository::FilterOf;
use common::{
    Entity, EntityId, ExistsResult, NotFoundError, PgUnitOfWork, RepositoryResult, SearchParams,
    SearchResult, SearchableRepository,
};
use sqlx::postgres::PgRow;
use sqlx::{Connection, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{exists_in, like_pattern, push_order_by, push_page};
use crate::models::{Category, CategoryFilter, CategoryId};

const SORT_COLUMNS: &[(&str, &str)] = &[
    ("name", "name COLLATE \"C\""),
    ("created_at", "created_at"),
];

const SELECT_CATEGORY: &str =
    "SELECT category_id, name, description, is_active, created_at FROM categories";

#[derive(Clone)]
pub struct PgCategoryRepository {
    uow: PgUnitOfWork,
}

impl PgCategoryRepository {
    pub fn new(uow: PgUnitOfWork) -> Self {
        Self { uow }
    }

    fn from_row(row: &PgRow) -> Result<Category, sqlx::Error> {
        Ok(Category::restore(
            CategoryId::from_uuid(row.try_get("category_id")?),
            row.try_get("name")?,
            row.try_get("description")?,
            row.try_get("is_active")?,
            row.try_get("created_at")?,
        ))
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: Option<&CategoryFilter>) {
        builder.push(" WHERE TRUE");
        if let Some(filter) = filter {
            builder.push(" AND name ILIKE ");
            builder.push_bind(like_pattern(&filter.name));
        }
    }
}

#[async_trait]
impl SearchableRepository for PgCategoryRepository {
    type Entity = Category;

    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "insert"))]
    async fn insert(&self, entity: &Category) -> RepositoryResult<()> {
        self.bulk_insert(std::slice::from_ref(entity)).await
    }

    #[tracing::instrument(skip(self, entities), fields(db.table = "categories", db.operation = "insert", count = entities.len()))]
    async fn bulk_insert(&self, entities: &[Category]) -> RepositoryResult<()> {
        if entities.is_empty() {
            return Ok(());
        }

        let mut session = self.uow.session().await?;
        let mut tx = session.connection().begin().await?;

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO categories (category_id, name, description, is_active, created_at) ",
        );
        builder.push_values(entities, |mut row, category| {
            row.push_bind(category.category_id.as_uuid())
                .push_bind(&category.name)
                .push_bind(&category.description)
                .push_bind(category.is_active)
                .push_bind(category.created_at);
        });
        builder.build().execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "update", db.record_id = %entity.category_id))]
    async fn update(&self, entity: &Category) -> RepositoryResult<()> {
        let mut session = self.uow.session().await?;
        let result = sqlx::query(
            r#"
            UPDATE categories
            SET name = $2, description = $3, is_active = $4
            WHERE category_id = $1
            "#,
        )
        .bind(entity.category_id.as_uuid())
        .bind(&entity.name)
        .bind(&entity.description)
        .bind(entity.is_active)
        .execute(session.connection())
        .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new(entity.category_id, Category::NAME).into());
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: &CategoryId) -> RepositoryResult<()> {
        let mut session = self.uow.session().await?;
        let result = sqlx::query("DELETE FROM categories WHERE category_id = $1")
            .bind(id.as_uuid())
            .execute(session.connection())
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new(id, Category::NAME).into());
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "select", db.record_id = %id))]
    async fn find_by_id(&self, id: &CategoryId) -> RepositoryResult<Option<Category>> {
        let mut session = self.uow.session().await?;
        let row = sqlx::query(&format!("{SELECT_CATEGORY} WHERE category_id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(session.connection())
            .await?;

        Ok(row.as_ref().map(Self::from_row).transpose()?)
    }

    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "select"))]
    async fn find_all(&self) -> RepositoryResult<Vec<Category>> {
        let mut session = self.uow.session().await?;
        let rows = sqlx::query(&format!("{SELECT_CATEGORY} ORDER BY created_at ASC"))
            .fetch_all(session.connection())
            .await?;

        Ok(rows.iter().map(Self::from_row).collect::<Result<_, _>>()?)
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "categories", db.operation = "select", count = ids.len()))]
    async fn find_by_ids(&self, ids: &[CategoryId]) -> RepositoryResult<Vec<Category>> {
        let uuids: Vec<Uuid> = ids.iter().map(EntityId::as_uuid).collect();
        let mut session = self.uow.session().await?;
        let rows = sqlx::query(&format!(
            "{SELECT_CATEGORY} WHERE category_id = ANY($1) ORDER BY created_at ASC"
        ))
        .bind(&uuids)
        .fetch_all(session.connection())
        .await?;

        Ok(rows.iter().map(Self::from_row).collect::<Result<_, _>>()?)
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "categories", db.operation = "select", count = ids.len()))]
    async fn exists_by_id(&self, ids: &[CategoryId]) -> RepositoryResult<ExistsResult<CategoryId>> {
        let mut session = self.uow.session().await?;
        Ok(exists_in(session.connection(), "categories", "category_id", ids).await?)
    }

    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "search"))]
    async fn search(
        &self,
        params: &SearchParams<FilterOf<Category>>,
    ) -> RepositoryResult<SearchResult<Category>> {
        let mut session = self.uow.session().await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM categories");
        Self::push_filter(&mut count, params.filter());
        let total: i64 = count
            .build()
            .fetch_one(session.connection())
            .await?
            .try_get("total")?;

        let mut select = QueryBuilder::<Postgres>::new(SELECT_CATEGORY);
        Self::push_filter(&mut select, params.filter());
        push_order_by(
            &mut select,
            SORT_COLUMNS,
            params.sort(),
            params.sort_dir(),
            "category_id",
        );
        push_page(&mut select, params.limit(), params.offset());
        let rows = select.build().fetch_all(session.connection()).await?;
        let items: Vec<Category> = rows.iter().map(Self::from_row).collect::<Result<_, _>>()?;

        Ok(SearchResult::new(
            items,
            u64::try_from(total).unwrap_or_default(),
            params.page(),
            params.per_page(),
        ))
    }
}
