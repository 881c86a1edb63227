//! PostgreSQL cast member repository

use async_trait::async_trait;
use common::repository::FilterOf;
use common::{
    Entity, EntityId, ExistsResult, NotFoundError, PgUnitOfWork, RepositoryError,
    RepositoryResult, SearchParams, SearchResult, SearchableRepository,
};
use sqlx::postgres::PgRow;
use sqlx::{Connection, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{exists_in, like_pattern, push_order_by, push_page};
use crate::models::{CastMember, CastMemberFilter, CastMemberId, CastMemberType};

const SORT_COLUMNS: &[(&str, &str)] = &[
    ("name", "name COLLATE \"C\""),
    ("created_at", "created_at"),
];

const SELECT_CAST_MEMBER: &str =
    "SELECT cast_member_id, name, cast_member_type, created_at FROM cast_members";

#[derive(Clone)]
pub struct PgCastMemberRepository {
    uow: PgUnitOfWork,
}

impl PgCastMemberRepository {
    pub fn new(uow: PgUnitOfWork) -> Self {
        Self { uow }
    }

    fn from_row(row: &PgRow) -> RepositoryResult<CastMember> {
        let code: i16 = row.try_get("cast_member_type")?;
        let cast_member_type =
            CastMemberType::from_code(code.into()).map_err(|reason| RepositoryError::Corrupted {
                table: "cast_members",
                reason,
            })?;

        Ok(CastMember::restore(
            CastMemberId::from_uuid(row.try_get("cast_member_id")?),
            row.try_get("name")?,
            cast_member_type,
            row.try_get("created_at")?,
        ))
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: Option<&CastMemberFilter>) {
        builder.push(" WHERE TRUE");
        let Some(filter) = filter else {
            return;
        };
        if let Some(name) = &filter.name {
            builder.push(" AND name ILIKE ");
            builder.push_bind(like_pattern(name));
        }
        if let Some(cast_member_type) = filter.cast_member_type {
            builder.push(" AND cast_member_type = ");
            builder.push_bind(cast_member_type.code());
        }
    }
}

#[async_trait]
impl SearchableRepository for PgCastMemberRepository {
    type Entity = CastMember;

    #[tracing::instrument(skip(self), fields(db.table = "cast_members", db.operation = "insert"))]
    async fn insert(&self, entity: &CastMember) -> RepositoryResult<()> {
        self.bulk_insert(std::slice::from_ref(entity)).await
    }

    #[tracing::instrument(skip(self, entities), fields(db.table = "cast_members", db.operation = "insert", count = entities.len()))]
    async fn bulk_insert(&self, entities: &[CastMember]) -> RepositoryResult<()> {
        if entities.is_empty() {
            return Ok(());
        }

        let mut session = self.uow.session().await?;
        let mut tx = session.connection().begin().await?;

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO cast_members (cast_member_id, name, cast_member_type, created_at) ",
        );
        builder.push_values(entities, |mut row, cast_member| {
            row.push_bind(cast_member.cast_member_id.as_uuid())
                .push_bind(&cast_member.name)
                .push_bind(cast_member.cast_member_type.code())
                .push_bind(cast_member.created_at);
        });
        builder.build().execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "cast_members", db.operation = "update", db.record_id = %entity.cast_member_id))]
    async fn update(&self, entity: &CastMember) -> RepositoryResult<()> {
        let mut session = self.uow.session().await?;
        let result = sqlx::query(
            "UPDATE cast_members SET name = $2, cast_member_type = $3 WHERE cast_member_id = $1",
        )
        .bind(entity.cast_member_id.as_uuid())
        .bind(&entity.name)
        .bind(entity.cast_member_type.code())
        .execute(session.connection())
        .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new(entity.cast_member_id, CastMember::NAME).into());
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "cast_members", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: &CastMemberId) -> RepositoryResult<()> {
        let mut session = self.uow.session().await?;
        let result = sqlx::query("DELETE FROM cast_members WHERE cast_member_id = $1")
            .bind(id.as_uuid())
            .execute(session.connection())
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new(id, CastMember::NAME).into());
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "cast_members", db.operation = "select", db.record_id = %id))]
    async fn find_by_id(&self, id: &CastMemberId) -> RepositoryResult<Option<CastMember>> {
        let mut session = self.uow.session().await?;
        let row = sqlx::query(&format!("{SELECT_CAST_MEMBER} WHERE cast_member_id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(session.connection())
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "cast_members", db.operation = "select"))]
    async fn find_all(&self) -> RepositoryResult<Vec<CastMember>> {
        let mut session = self.uow.session().await?;
        let rows = sqlx::query(&format!("{SELECT_CAST_MEMBER} ORDER BY created_at ASC"))
            .fetch_all(session.connection())
            .await?;

        rows.iter().map(Self::from_row).collect()
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "cast_members", db.operation = "select", count = ids.len()))]
    async fn find_by_ids(&self, ids: &[CastMemberId]) -> RepositoryResult<Vec<CastMember>> {
        let uuids: Vec<Uuid> = ids.iter().map(EntityId::as_uuid).collect();
        let mut session = self.uow.session().await?;
        let rows = sqlx::query(&format!(
            "{SELECT_CAST_MEMBER} WHERE cast_member_id = ANY($1) ORDER BY created_at ASC"
        ))
        .bind(&uuids)
        .fetch_all(session.connection())
        .await?;

        rows.iter().map(Self::from_row).collect()
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "cast_members", db.operation = "select", count = ids.len()))]
    async fn exists_by_id(
        &self,
        ids: &[CastMemberId],
    ) -> RepositoryResult<ExistsResult<CastMemberId>> {
        let mut session = self.uow.session().await?;
        Ok(exists_in(session.connection(), "cast_members", "cast_member_id", ids).await?)
    }

    #[tracing::instrument(skip(self), fields(db.table = "cast_members", db.operation = "search"))]
    async fn search(
        &self,
        params: &SearchParams<FilterOf<CastMember>>,
    ) -> RepositoryResult<SearchResult<CastMember>> {
        let mut session = self.uow.session().await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM cast_members");
        Self::push_filter(&mut count, params.filter());
        let total: i64 = count
            .build()
            .fetch_one(session.connection())
            .await?
            .try_get("total")?;

        let mut select = QueryBuilder::<Postgres>::new(SELECT_CAST_MEMBER);
        Self::push_filter(&mut select, params.filter());
        push_order_by(
            &mut select,
            SORT_COLUMNS,
            params.sort(),
            params.sort_dir(),
            "cast_member_id",
        );
        push_page(&mut select, params.limit(), params.offset());
        let rows = select.build().fetch_all(session.connection()).await?;
        let items = rows
            .iter()
            .map(Self::from_row)
            .collect::<RepositoryResult<Vec<_>>>()?;

        Ok(SearchResult::new(
            items,
            u64::try_from(total).unwrap_or_default(),
            params.page(),
            params.per_page(),
        ))
    }
}
