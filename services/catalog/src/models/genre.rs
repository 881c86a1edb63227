//! Genre aggregate, related to many categories

use chrono::{DateTime, Utc};
use common::repository::contains_ignore_case;
use common::search::{filter_ids, filter_object, filter_text};
use common::{
    Entity, EntityValidationError, Notification, RelationSet, SearchFilter, Searchable, SortValue,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::category::CategoryId;
use super::{MAX_NAME_LENGTH, check_max_length, now};

common::entity_id!(
    /// Identity of a genre
    GenreId
);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Genre {
    pub(crate) genre_id: GenreId,
    pub(crate) name: String,
    pub(crate) categories_id: RelationSet<CategoryId>,
    pub(crate) is_active: bool,
    pub(crate) created_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) notification: Notification,
}

/// Input for [`Genre::create`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenreCreateCommand {
    pub name: String,
    pub categories_id: Vec<CategoryId>,
    pub is_active: Option<bool>,
}

impl Genre {
    pub fn create(command: GenreCreateCommand) -> Self {
        let mut genre = Self {
            genre_id: GenreId::new(),
            name: command.name,
            categories_id: command.categories_id.into_iter().collect(),
            is_active: command.is_active.unwrap_or(true),
            created_at: now(),
            notification: Notification::new(),
        };
        genre.validate();
        genre
    }

    pub(crate) fn restore(
        genre_id: GenreId,
        name: String,
        categories_id: RelationSet<CategoryId>,
        is_active: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            genre_id,
            name,
            categories_id,
            is_active,
            created_at,
            notification: Notification::new(),
        }
    }

    pub fn genre_id(&self) -> GenreId {
        self.genre_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn categories_id(&self) -> &RelationSet<CategoryId> {
        &self.categories_id
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn notification(&self) -> &Notification {
        &self.notification
    }

    pub(crate) fn notification_mut(&mut self) -> &mut Notification {
        &mut self.notification
    }

    pub fn change_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.validate();
    }

    pub fn add_category_id(&mut self, category_id: CategoryId) {
        self.categories_id.add(category_id);
    }

    pub fn remove_category_id(&mut self, category_id: &CategoryId) {
        self.categories_id.remove(category_id);
    }

    pub fn sync_categories_id(&mut self, categories_id: impl IntoIterator<Item = CategoryId>) {
        self.categories_id.sync(categories_id);
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn validate(&mut self) -> bool {
        self.notification.clear_fields(&["name"]);
        check_max_length(&mut self.notification, "name", &self.name, MAX_NAME_LENGTH);
        !self.notification.has_errors()
    }
}

impl Entity for Genre {
    type Id = GenreId;
    const NAME: &'static str = "Genre";

    fn entity_id(&self) -> &GenreId {
        &self.genre_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenreFilter {
    pub name: Option<String>,
    pub categories_id: Vec<CategoryId>,
}

impl SearchFilter for GenreFilter {
    fn from_raw(raw: &Value) -> Result<Option<Self>, EntityValidationError> {
        let Some(object) = filter_object(raw) else {
            return Ok(None);
        };

        let filter = Self {
            name: filter_text(object, "name"),
            categories_id: filter_ids(object, "categories_id")?,
        };
        if filter.name.is_none() && filter.categories_id.is_empty() {
            return Ok(None);
        }
        Ok(Some(filter))
    }
}

impl Searchable for Genre {
    type Filter = GenreFilter;
    const SORTABLE_FIELDS: &'static [&'static str] = &["name", "created_at"];

    fn matches(&self, filter: &GenreFilter) -> bool {
        let name_matches = filter
            .name
            .as_deref()
            .is_none_or(|name| contains_ignore_case(&self.name, name));
        let categories_match =
            filter.categories_id.is_empty() || self.categories_id.intersects(&filter.categories_id);
        name_matches && categories_match
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "name" => Some(SortValue::Text(self.name.clone())),
            "created_at" => Some(SortValue::Timestamp(self.created_at)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_with_categories() {
        let category_id = CategoryId::new();
        let genre = Genre::create(GenreCreateCommand {
            name: "Action".to_string(),
            categories_id: vec![category_id, category_id],
            ..Default::default()
        });

        assert_eq!(genre.categories_id().len(), 1);
        assert!(genre.categories_id().contains(&category_id));
        assert!(genre.is_active());
    }

    #[test]
    fn test_category_relation_changes() {
        let (first, second) = (CategoryId::new(), CategoryId::new());
        let mut genre = Genre::create(GenreCreateCommand {
            name: "Action".to_string(),
            categories_id: vec![first],
            ..Default::default()
        });

        genre.add_category_id(second);
        genre.remove_category_id(&first);
        assert_eq!(genre.categories_id().to_vec(), vec![second]);

        genre.sync_categories_id([first]);
        assert_eq!(genre.categories_id().to_vec(), vec![first]);
    }

    #[test]
    fn test_filter_from_raw() {
        let category_id = CategoryId::new();
        let filter = GenreFilter::from_raw(&json!({
            "name": "act",
            "categories_id": [category_id.to_string()],
        }))
        .unwrap();
        assert_eq!(
            filter,
            Some(GenreFilter {
                name: Some("act".to_string()),
                categories_id: vec![category_id],
            })
        );

        let filter = GenreFilter::from_raw(&json!({ "categories_id": category_id.to_string() }))
            .unwrap()
            .unwrap();
        assert_eq!(filter.categories_id, vec![category_id]);

        assert_eq!(GenreFilter::from_raw(&json!({ "categories_id": [] })).unwrap(), None);
    }

    #[test]
    fn test_filter_rejects_malformed_category_ids() {
        let error = GenreFilter::from_raw(&json!({ "categories_id": ["fake"] })).unwrap_err();
        assert_eq!(
            error.field("categories_id"),
            Some(&["ID must be a valid UUID: fake".to_string()][..])
        );
    }

    #[test]
    fn test_matches_categories_by_intersection() {
        let (first, second) = (CategoryId::new(), CategoryId::new());
        let genre = Genre::create(GenreCreateCommand {
            name: "Drama".to_string(),
            categories_id: vec![first],
            ..Default::default()
        });

        let filter = GenreFilter {
            name: None,
            categories_id: vec![second, first],
        };
        assert!(genre.matches(&filter));

        let filter = GenreFilter {
            name: Some("dra".to_string()),
            categories_id: vec![second],
        };
        assert!(!genre.matches(&filter));
    }
}
