use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{Entity, NotFoundError, SearchParams, UnitOfWork, UnitOfWorkExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ListOutput, parse_id};
use crate::error::{CatalogError, CatalogResult};
use crate::models::{CastMember, CastMemberCreateCommand, CastMemberId, CastMemberType};
use crate::repositories::CastMemberRepository;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CastMemberOutput {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub cast_member_type: CastMemberType,
    pub created_at: DateTime<Utc>,
}

impl From<&CastMember> for CastMemberOutput {
    fn from(cast_member: &CastMember) -> Self {
        Self {
            id: cast_member.cast_member_id().to_string(),
            name: cast_member.name().to_string(),
            cast_member_type: cast_member.cast_member_type(),
            created_at: cast_member.created_at(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCastMemberInput {
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub cast_member_type: Option<CastMemberType>,
}

#[derive(Clone)]
pub struct CastMemberUseCases {
    repository: Arc<dyn CastMemberRepository>,
    uow: Arc<dyn UnitOfWork>,
}

impl CastMemberUseCases {
    pub fn new(repository: Arc<dyn CastMemberRepository>, uow: Arc<dyn UnitOfWork>) -> Self {
        Self { repository, uow }
    }

    pub async fn create(&self, input: CastMemberCreateCommand) -> CatalogResult<CastMemberOutput> {
        let cast_member = CastMember::create(input);
        if cast_member.notification().has_errors() {
            return Err(cast_member.notification().to_validation_error().into());
        }

        self.uow
            .run(async { Ok::<_, CatalogError>(self.repository.insert(&cast_member).await?) })
            .await?;
        Ok(CastMemberOutput::from(&cast_member))
    }

    pub async fn update(&self, input: UpdateCastMemberInput) -> CatalogResult<CastMemberOutput> {
        let id: CastMemberId = parse_id(&input.id)?;
        let mut cast_member = self
            .repository
            .find_by_id(&id)
            .await?
            .ok_or_else(|| NotFoundError::new(id, CastMember::NAME))?;

        if let Some(name) = input.name {
            cast_member.change_name(name);
        }
        if let Some(cast_member_type) = input.cast_member_type {
            cast_member.change_type(cast_member_type);
        }
        if cast_member.notification().has_errors() {
            return Err(cast_member.notification().to_validation_error().into());
        }

        self.uow
            .run(async { Ok::<_, CatalogError>(self.repository.update(&cast_member).await?) })
            .await?;
        Ok(CastMemberOutput::from(&cast_member))
    }

    pub async fn delete(&self, id: &str) -> CatalogResult<()> {
        let id: CastMemberId = parse_id(id)?;
        self.uow
            .run(async { Ok::<_, CatalogError>(self.repository.delete(&id).await?) })
            .await
    }

    pub async fn get(&self, id: &str) -> CatalogResult<CastMemberOutput> {
        let id: CastMemberId = parse_id(id)?;
        let cast_member = self
            .repository
            .find_by_id(&id)
            .await?
            .ok_or_else(|| NotFoundError::new(id, CastMember::NAME))?;
        Ok(CastMemberOutput::from(&cast_member))
    }

    pub async fn list(&self, raw: &Value) -> CatalogResult<ListOutput<CastMemberOutput>> {
        let params = SearchParams::create(raw)?;
        let result = self.repository.search(&params).await?;
        Ok(ListOutput::present(result, |cast_member| {
            CastMemberOutput::from(&cast_member)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::repositories::InMemoryCastMemberRepository;
    use common::InMemoryUnitOfWork;
    use serde_json::json;

    fn setup() -> CastMemberUseCases {
        let repository = InMemoryCastMemberRepository::new();
        let uow = InMemoryUnitOfWork::new().with_store(repository.store());
        CastMemberUseCases::new(Arc::new(repository), Arc::new(uow))
    }

    fn command(name: &str, cast_member_type: CastMemberType) -> CastMemberCreateCommand {
        CastMemberCreateCommand {
            name: name.to_string(),
            cast_member_type,
        }
    }

    #[tokio::test]
    async fn test_create_and_update_type() {
        let use_cases = setup();
        let created = use_cases
            .create(command("Jane", CastMemberType::Actor))
            .await
            .unwrap();

        let updated = use_cases
            .update(UpdateCastMemberInput {
                id: created.id.clone(),
                cast_member_type: Some(CastMemberType::Director),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.name, "Jane");
        assert_eq!(updated.cast_member_type, CastMemberType::Director);

        let json = serde_json::to_value(&updated).unwrap();
        assert_eq!(json["type"], json!(1));
    }

    #[tokio::test]
    async fn test_list_filters_by_type() {
        let use_cases = setup();
        use_cases.create(command("Jane", CastMemberType::Actor)).await.unwrap();
        use_cases.create(command("John", CastMemberType::Director)).await.unwrap();
        use_cases.create(command("Joe", CastMemberType::Actor)).await.unwrap();

        let output = use_cases
            .list(&json!({ "filter": { "type": "2" }, "sort": "name", "sort_dir": "desc" }))
            .await
            .unwrap();
        let names: Vec<&str> = output.items.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["Joe", "Jane"]);
    }

    #[tokio::test]
    async fn test_list_rejects_invalid_type_before_searching() {
        let use_cases = setup();
        let error = use_cases
            .list(&json!({ "filter": { "type": "a" } }))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_update_unknown_cast_member() {
        let use_cases = setup();
        let error = use_cases
            .update(UpdateCastMemberInput {
                id: CastMemberId::new().to_string(),
                name: Some("Nobody".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }
}
