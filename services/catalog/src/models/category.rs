//! Category aggregate

use chrono::{DateTime, Utc};
use common::repository::contains_ignore_case;
use common::search::{filter_object, filter_text};
use common::{Entity, EntityValidationError, Notification, SearchFilter, Searchable, SortValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{MAX_NAME_LENGTH, check_max_length, now};

common::entity_id!(
    /// Identity of a category
    CategoryId
);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub(crate) category_id: CategoryId,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) created_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) notification: Notification,
}

/// Input for [`Category::create`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryCreateCommand {
    pub name: String,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl Category {
    pub fn create(command: CategoryCreateCommand) -> Self {
        let mut category = Self {
            category_id: CategoryId::new(),
            name: command.name,
            description: command.description,
            is_active: command.is_active.unwrap_or(true),
            created_at: now(),
            notification: Notification::new(),
        };
        category.validate();
        category
    }

    pub(crate) fn restore(
        category_id: CategoryId,
        name: String,
        description: Option<String>,
        is_active: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            category_id,
            name,
            description,
            is_active,
            created_at,
            notification: Notification::new(),
        }
    }

    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
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

    pub fn change_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.validate();
    }

    pub fn change_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Re-check the rules and return whether the category is valid
    pub fn validate(&mut self) -> bool {
        self.notification.clear_fields(&["name"]);
        check_max_length(&mut self.notification, "name", &self.name, MAX_NAME_LENGTH);
        !self.notification.has_errors()
    }
}

impl Entity for Category {
    type Id = CategoryId;
    const NAME: &'static str = "Category";

    fn entity_id(&self) -> &CategoryId {
        &self.category_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Case-insensitive name containment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFilter {
    pub name: String,
}

impl CategoryFilter {
    pub fn name(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl SearchFilter for CategoryFilter {
    fn from_raw(raw: &Value) -> Result<Option<Self>, EntityValidationError> {
        let name = match raw {
            Value::String(name) if !name.is_empty() => Some(name.clone()),
            other => filter_object(other).and_then(|object| filter_text(object, "name")),
        };
        Ok(name.map(|name| Self { name }))
    }
}

impl Searchable for Category {
    type Filter = CategoryFilter;
    const SORTABLE_FIELDS: &'static [&'static str] = &["name", "created_at"];

    fn matches(&self, filter: &CategoryFilter) -> bool {
        contains_ignore_case(&self.name, &filter.name)
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
    fn test_create_defaults() {
        let category = Category::create(CategoryCreateCommand {
            name: "Movie".to_string(),
            ..Default::default()
        });

        assert_eq!(category.name(), "Movie");
        assert_eq!(category.description(), None);
        assert!(category.is_active());
        assert!(!category.notification().has_errors());
    }

    #[test]
    fn test_name_too_long_is_reported() {
        let mut category = Category::create(CategoryCreateCommand {
            name: "a".repeat(256),
            ..Default::default()
        });
        assert!(category.notification().has_errors());

        category.change_name("Short");
        assert!(!category.notification().has_errors());
    }

    #[test]
    fn test_state_changes() {
        let mut category = Category::create(CategoryCreateCommand {
            name: "Movie".to_string(),
            description: Some("some".to_string()),
            is_active: Some(false),
        });
        assert!(!category.is_active());

        category.activate();
        category.change_description(None);
        assert!(category.is_active());
        assert_eq!(category.description(), None);
    }

    #[test]
    fn test_filter_from_raw() {
        assert_eq!(
            CategoryFilter::from_raw(&json!("test")).unwrap(),
            Some(CategoryFilter::name("test"))
        );
        assert_eq!(
            CategoryFilter::from_raw(&json!({ "name": "test" })).unwrap(),
            Some(CategoryFilter::name("test"))
        );
        assert_eq!(CategoryFilter::from_raw(&json!({})).unwrap(), None);
        assert_eq!(CategoryFilter::from_raw(&json!({ "other": 1 })).unwrap(), None);
        assert_eq!(CategoryFilter::from_raw(&json!([1, 2])).unwrap(), None);
    }

    #[test]
    fn test_matches_ignores_case() {
        let category = Category::create(CategoryCreateCommand {
            name: "Documentary".to_string(),
            ..Default::default()
        });
        assert!(category.matches(&CategoryFilter::name("DOC")));
        assert!(!category.matches(&CategoryFilter::name("drama")));
    }
}
