use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{Entity, NotFoundError, SearchParams, UnitOfWork, UnitOfWorkExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{ListOutput, parse_id};
use crate::error::{CatalogError, CatalogResult};
use crate::models::{Category, CategoryCreateCommand, CategoryId};
use crate::repositories::CategoryRepository;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryOutput {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Category> for CategoryOutput {
    fn from(category: &Category) -> Self {
        Self {
            id: category.category_id().to_string(),
            name: category.name().to_string(),
            description: category.description().map(str::to_string),
            is_active: category.is_active(),
            created_at: category.created_at(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct CategoryUseCases {
    repository: Arc<dyn CategoryRepository>,
    uow: Arc<dyn UnitOfWork>,
}

impl CategoryUseCases {
    pub fn new(repository: Arc<dyn CategoryRepository>, uow: Arc<dyn UnitOfWork>) -> Self {
        Self { repository, uow }
    }

    pub async fn create(&self, input: CategoryCreateCommand) -> CatalogResult<CategoryOutput> {
        let category = Category::create(input);
        if category.notification().has_errors() {
            return Err(category.notification().to_validation_error().into());
        }

        self.uow
            .run(async { Ok::<_, CatalogError>(self.repository.insert(&category).await?) })
            .await?;
        info!(id = %category.category_id(), "Category created");
        Ok(CategoryOutput::from(&category))
    }

    pub async fn update(&self, input: UpdateCategoryInput) -> CatalogResult<CategoryOutput> {
        let id: CategoryId = parse_id(&input.id)?;
        let mut category = self
            .repository
            .find_by_id(&id)
            .await?
            .ok_or_else(|| NotFoundError::new(id, Category::NAME))?;

        if let Some(name) = input.name {
            category.change_name(name);
        }
        if input.description.is_some() {
            category.change_description(input.description);
        }
        match input.is_active {
            Some(true) => category.activate(),
            Some(false) => category.deactivate(),
            None => {}
        }
        if category.notification().has_errors() {
            return Err(category.notification().to_validation_error().into());
        }

        self.uow
            .run(async { Ok::<_, CatalogError>(self.repository.update(&category).await?) })
            .await?;
        Ok(CategoryOutput::from(&category))
    }

    pub async fn delete(&self, id: &str) -> CatalogResult<()> {
        let id: CategoryId = parse_id(id)?;
        self.uow
            .run(async { Ok::<_, CatalogError>(self.repository.delete(&id).await?) })
            .await
    }

    pub async fn get(&self, id: &str) -> CatalogResult<CategoryOutput> {
        let id: CategoryId = parse_id(id)?;
        let category = self
            .repository
            .find_by_id(&id)
            .await?
            .ok_or_else(|| NotFoundError::new(id, Category::NAME))?;
        Ok(CategoryOutput::from(&category))
    }

    /// Search with raw, untrusted parameters
    pub async fn list(&self, raw: &Value) -> CatalogResult<ListOutput<CategoryOutput>> {
        let params = SearchParams::create(raw)?;
        let result = self.repository.search(&params).await?;
        Ok(ListOutput::present(result, |category| {
            CategoryOutput::from(&category)
        }))
    }
}
