use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{Entity, NotFoundError, SearchParams, UnitOfWork, UnitOfWorkExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ListOutput, parse_id};
use crate::error::{CatalogError, CatalogResult};
use crate::models::{Genre, GenreCreateCommand, GenreId};
use crate::repositories::{CategoryRepository, GenreRepository};
use crate::validation::{RelationValidator, merge_outcome};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreOutput {
    pub id: String,
    pub name: String,
    pub categories_id: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Genre> for GenreOutput {
    fn from(genre: &Genre) -> Self {
        Self {
            id: genre.genre_id().to_string(),
            name: genre.name().to_string(),
            categories_id: genre.categories_id().ids().map(ToString::to_string).collect(),
            is_active: genre.is_active(),
            created_at: genre.created_at(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateGenreInput {
    pub name: String,
    #[serde(default)]
    pub categories_id: Vec<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGenreInput {
    pub id: String,
    pub name: Option<String>,
    pub categories_id: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct GenreUseCases {
    repository: Arc<dyn GenreRepository>,
    categories: RelationValidator<dyn CategoryRepository>,
    uow: Arc<dyn UnitOfWork>,
}

impl GenreUseCases {
    pub fn new(
        repository: Arc<dyn GenreRepository>,
        categories: Arc<dyn CategoryRepository>,
        uow: Arc<dyn UnitOfWork>,
    ) -> Self {
        Self {
            repository,
            categories: RelationValidator::new(categories),
            uow,
        }
    }

    pub async fn create(&self, input: CreateGenreInput) -> CatalogResult<GenreOutput> {
        let outcome = self.categories.validate(&input.categories_id).await?;

        let mut genre = Genre::create(GenreCreateCommand {
            name: input.name,
            categories_id: Vec::new(),
            is_active: input.is_active,
        });
        let categories_id = merge_outcome(genre.notification_mut(), "categories_id", outcome);
        genre.sync_categories_id(categories_id);
        if genre.notification().has_errors() {
            return Err(genre.notification().to_validation_error().into());
        }

        self.uow
            .run(async { Ok::<_, CatalogError>(self.repository.insert(&genre).await?) })
            .await?;
        Ok(GenreOutput::from(&genre))
    }

    pub async fn update(&self, input: UpdateGenreInput) -> CatalogResult<GenreOutput> {
        let id: GenreId = parse_id(&input.id)?;
        let mut genre = self
            .repository
            .find_by_id(&id)
            .await?
            .ok_or_else(|| NotFoundError::new(id, Genre::NAME))?;

        if let Some(name) = input.name {
            genre.change_name(name);
        }
        match input.is_active {
            Some(true) => genre.activate(),
            Some(false) => genre.deactivate(),
            None => {}
        }
        if let Some(raw_ids) = &input.categories_id {
            let outcome = self.categories.validate(raw_ids).await?;
            let categories_id = merge_outcome(genre.notification_mut(), "categories_id", outcome);
            genre.sync_categories_id(categories_id);
        }
        if genre.notification().has_errors() {
            return Err(genre.notification().to_validation_error().into());
        }

        self.uow
            .run(async { Ok::<_, CatalogError>(self.repository.update(&genre).await?) })
            .await?;
        Ok(GenreOutput::from(&genre))
    }

    pub async fn delete(&self, id: &str) -> CatalogResult<()> {
        let id: GenreId = parse_id(id)?;
        self.uow
            .run(async { Ok::<_, CatalogError>(self.repository.delete(&id).await?) })
            .await
    }

    pub async fn get(&self, id: &str) -> CatalogResult<GenreOutput> {
        let id: GenreId = parse_id(id)?;
        let genre = self
            .repository
            .find_by_id(&id)
            .await?
            .ok_or_else(|| NotFoundError::new(id, Genre::NAME))?;
        Ok(GenreOutput::from(&genre))
    }

    pub async fn list(&self, raw: &Value) -> CatalogResult<ListOutput<GenreOutput>> {
        let params = SearchParams::create(raw)?;
        let result = self.repository.search(&params).await?;
        Ok(ListOutput::present(result, |genre| GenreOutput::from(&genre)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{Category, CategoryCreateCommand, CategoryId};
    use crate::repositories::{InMemoryCategoryRepository, InMemoryGenreRepository};
    use crate::use_cases::testing::CountingUnitOfWork;
    use common::memory::InMemoryStore;
    use common::{InMemoryUnitOfWork, SearchableRepository};
    use serde_json::json;

    struct Fixture {
        use_cases: GenreUseCases,
        genres: InMemoryStore<Genre>,
        uow: Arc<CountingUnitOfWork>,
        category: Category,
    }

    async fn setup() -> Fixture {
        let categories = InMemoryCategoryRepository::new();
        let category = Category::create(CategoryCreateCommand {
            name: "Movie".to_string(),
            ..Default::default()
        });
        categories.insert(&category).await.unwrap();

        let genres = InMemoryGenreRepository::new();
        let store = genres.store();
        let uow = Arc::new(CountingUnitOfWork::new(
            InMemoryUnitOfWork::new().with_store(store.clone()),
        ));

        Fixture {
            use_cases: GenreUseCases::new(Arc::new(genres), Arc::new(categories), uow.clone()),
            genres: store,
            uow,
            category,
        }
    }

    #[tokio::test]
    async fn test_create_with_existing_category() {
        let fixture = setup().await;
        let category_id = fixture.category.category_id().to_string();

        let output = fixture
            .use_cases
            .create(CreateGenreInput {
                name: "Action".to_string(),
                categories_id: vec![category_id.clone()],
                is_active: None,
            })
            .await
            .unwrap();

        assert_eq!(output.categories_id, vec![category_id]);
        assert!(output.is_active);
        assert_eq!(fixture.genres.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_with_missing_category_writes_nothing() {
        let fixture = setup().await;
        let missing = CategoryId::new();

        let error = fixture
            .use_cases
            .create(CreateGenreInput {
                name: "Action".to_string(),
                categories_id: vec![missing.to_string()],
                is_active: None,
            })
            .await
            .unwrap_err();

        let CatalogError::Validation(validation) = &error else {
            panic!("expected a validation error, got {error:?}");
        };
        assert_eq!(
            validation.field("categories_id"),
            Some(&[format!("Category Not Found using ID {missing}")][..])
        );
        assert!(fixture.genres.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_resyncs_categories_only_when_given() {
        let fixture = setup().await;
        let created = fixture
            .use_cases
            .create(CreateGenreInput {
                name: "Action".to_string(),
                categories_id: vec![fixture.category.category_id().to_string()],
                is_active: None,
            })
            .await
            .unwrap();

        let renamed = fixture
            .use_cases
            .update(UpdateGenreInput {
                id: created.id.clone(),
                name: Some("Adventure".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(renamed.categories_id, created.categories_id);

        let cleared = fixture
            .use_cases
            .update(UpdateGenreInput {
                id: created.id.clone(),
                categories_id: Some(vec![]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(cleared.categories_id.is_empty());
        assert_eq!(cleared.name, "Adventure");
    }

    #[tokio::test]
    async fn test_update_with_missing_category_keeps_stored_genre() {
        let fixture = setup().await;
        let created = fixture
            .use_cases
            .create(CreateGenreInput {
                name: "Action".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let error = fixture
            .use_cases
            .update(UpdateGenreInput {
                id: created.id.clone(),
                name: Some("Other".to_string()),
                categories_id: Some(vec![CategoryId::new().to_string()]),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);

        let stored = fixture.use_cases.get(&created.id).await.unwrap();
        assert_eq!(stored.name, "Action");
    }

    #[tokio::test]
    async fn test_missing_category_never_opens_a_transaction() {
        let fixture = setup().await;
        let missing = CategoryId::new().to_string();

        let error = fixture
            .use_cases
            .create(CreateGenreInput {
                name: "Action".to_string(),
                categories_id: vec![missing.clone()],
                is_active: None,
            })
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert_eq!(fixture.uow.starts(), 0);

        let created = fixture
            .use_cases
            .create(CreateGenreInput {
                name: "Action".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(fixture.uow.starts(), 1);

        let error = fixture
            .use_cases
            .update(UpdateGenreInput {
                id: created.id,
                categories_id: Some(vec![missing]),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert_eq!(fixture.uow.starts(), 1);
        assert!(!fixture.uow.is_active().await);
    }

    #[tokio::test]
    async fn test_list_by_category() {
        let fixture = setup().await;
        let category_id = fixture.category.category_id().to_string();
        for (name, categories_id) in [("Action", vec![category_id.clone()]), ("Drama", vec![])] {
            fixture
                .use_cases
                .create(CreateGenreInput {
                    name: name.to_string(),
                    categories_id,
                    is_active: None,
                })
                .await
                .unwrap();
        }

        let output = fixture
            .use_cases
            .list(&json!({ "filter": { "categories_id": [category_id] } }))
            .await
            .unwrap();
        assert_eq!(output.total, 1);
        assert_eq!(output.items[0].name, "Action");
    }
}
