//! Search parameters and results
//!
//! [`SearchParams::create`] turns untrusted query input into a normalized
//! request: malformed paging and sorting values fall back to defaults instead
//! of failing. Only the aggregate-specific filter may reject its input.
//! [`SearchResult`] carries one page and derives the last page number.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::EntityValidationError;
use crate::identifier::EntityId;
use crate::repository::Entity;

/// Page used when the input is missing or invalid
pub const DEFAULT_PAGE: u64 = 1;

/// Page size used when the input is missing or invalid
pub const DEFAULT_PER_PAGE: u64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("asc"),
            SortDirection::Desc => f.write_str("desc"),
        }
    }
}

impl FromStr for SortDirection {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(()),
        }
    }
}

/// Aggregate-specific search filter
pub trait SearchFilter: Sized + Clone + fmt::Debug + Send + Sync + 'static {
    /// Normalize raw input. `Ok(None)` means "no filtering".
    fn from_raw(raw: &Value) -> Result<Option<Self>, EntityValidationError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams<F> {
    page: u64,
    per_page: u64,
    sort: Option<String>,
    sort_dir: Option<SortDirection>,
    filter: Option<F>,
}

impl<F> Default for SearchParams<F> {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
            sort: None,
            sort_dir: None,
            filter: None,
        }
    }
}

impl<F> SearchParams<F> {
    /// Build parameters from already typed values, applying the same defaults
    pub fn new(
        page: u64,
        per_page: u64,
        sort: Option<String>,
        sort_dir: Option<SortDirection>,
        filter: Option<F>,
    ) -> Self {
        let sort = sort.filter(|value| !value.is_empty());
        let sort_dir = sort.as_ref().map(|_| sort_dir.unwrap_or_default());
        Self {
            page: if page == 0 { DEFAULT_PAGE } else { page },
            per_page: if per_page == 0 { DEFAULT_PER_PAGE } else { per_page },
            sort,
            sort_dir,
            filter,
        }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    pub fn sort(&self) -> Option<&str> {
        self.sort.as_deref()
    }

    pub fn sort_dir(&self) -> Option<SortDirection> {
        self.sort_dir
    }

    pub fn filter(&self) -> Option<&F> {
        self.filter.as_ref()
    }

    /// Zero-based offset of the first item of the page
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        self.per_page
    }

    pub fn with_page(mut self, page: u64) -> Self {
        self.page = if page == 0 { DEFAULT_PAGE } else { page };
        self
    }

    pub fn with_per_page(mut self, per_page: u64) -> Self {
        self.per_page = if per_page == 0 {
            DEFAULT_PER_PAGE
        } else {
            per_page
        };
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>, sort_dir: SortDirection) -> Self {
        let sort = sort.into();
        if sort.is_empty() {
            self.sort = None;
            self.sort_dir = None;
        } else {
            self.sort = Some(sort);
            self.sort_dir = Some(sort_dir);
        }
        self
    }

    pub fn with_filter(mut self, filter: F) -> Self {
        self.filter = Some(filter);
        self
    }
}

impl<F: SearchFilter> SearchParams<F> {
    /// Normalize raw, untrusted search input
    ///
    /// Accepts an object with optional `page`, `per_page`, `sort`, `sort_dir`
    /// and `filter` keys. Anything else normalizes to the defaults.
    pub fn create(raw: &Value) -> Result<Self, EntityValidationError> {
        let empty = Map::new();
        let input = raw.as_object().unwrap_or(&empty);

        let page = positive_integer(input.get("page")).unwrap_or(DEFAULT_PAGE);
        let per_page = positive_integer(input.get("per_page")).unwrap_or(DEFAULT_PER_PAGE);
        let sort = input.get("sort").and_then(text_value);
        let sort_dir = sort.as_ref().map(|_| {
            input
                .get("sort_dir")
                .and_then(text_value)
                .and_then(|value| value.parse().ok())
                .unwrap_or_default()
        });
        let filter = match input.get("filter") {
            None | Some(Value::Null) => None,
            Some(Value::String(value)) if value.is_empty() => None,
            Some(value) => F::from_raw(value)?,
        };

        Ok(Self {
            page,
            per_page,
            sort,
            sort_dir,
            filter,
        })
    }
}

/// Accept integers and numeric strings greater than zero
fn positive_integer(value: Option<&Value>) -> Option<u64> {
    let number = match value? {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if number.is_finite() && number >= 1.0 && number.fract() == 0.0 && number <= u64::MAX as f64
    {
        Some(number as u64)
    } else {
        None
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Object form of a raw filter, or `None` for anything that is not an object
pub fn filter_object(raw: &Value) -> Option<&Map<String, Value>> {
    raw.as_object().filter(|object| !object.is_empty())
}

/// Non-empty string member of a raw filter object
pub fn filter_text(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key) {
        Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}

/// Identifier list member of a raw filter object
///
/// Accepts an array of strings or a single comma-separated string. Malformed
/// ids are reported under `key`.
pub fn filter_ids<I: EntityId>(
    object: &Map<String, Value>,
    key: &str,
) -> Result<Vec<I>, EntityValidationError> {
    let raw: Vec<String> = match object.get(key) {
        Some(Value::Array(values)) => values
            .iter()
            .map(|value| match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(text)) if !text.is_empty() => {
            text.split(',').map(|part| part.trim().to_string()).collect()
        }
        _ => return Ok(Vec::new()),
    };

    let mut ids = Vec::with_capacity(raw.len());
    let mut messages = Vec::new();
    for value in raw {
        match value.parse::<I>() {
            Ok(id) if !ids.contains(&id) => ids.push(id),
            Ok(_) => {}
            Err(error) => messages.push(error.to_string()),
        }
    }

    if messages.is_empty() {
        Ok(ids)
    } else {
        let mut error = EntityValidationError::default();
        error.errors.insert(key.to_string(), messages);
        Err(error)
    }
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult<T> {
    items: Vec<T>,
    total: u64,
    current_page: u64,
    per_page: u64,
    last_page: u64,
}

impl<T> SearchResult<T> {
    pub fn new(items: Vec<T>, total: u64, current_page: u64, per_page: u64) -> Self {
        let per_page = per_page.max(1);
        Self {
            items,
            total,
            current_page,
            per_page,
            last_page: total.div_ceil(per_page).max(1),
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    pub fn last_page(&self) -> u64 {
        self.last_page
    }

    /// Convert the items while keeping the page metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> SearchResult<U> {
        SearchResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            current_page: self.current_page,
            per_page: self.per_page,
            last_page: self.last_page,
        }
    }
}

impl<T: Entity + Serialize> SearchResult<T> {
    /// Plain-data projection: item ids when `deep` is false, full items otherwise
    pub fn to_json(&self, deep: bool) -> Value {
        let items: Vec<Value> = if deep {
            self.items
                .iter()
                .map(|item| serde_json::to_value(item).unwrap_or(Value::Null))
                .collect()
        } else {
            self.items
                .iter()
                .map(|item| Value::String(item.entity_id().to_string()))
                .collect()
        };
        json!({
            "items": items,
            "total": self.total,
            "current_page": self.current_page,
            "per_page": self.per_page,
            "last_page": self.last_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct NameFilter(String);

    impl SearchFilter for NameFilter {
        fn from_raw(raw: &Value) -> Result<Option<Self>, EntityValidationError> {
            match raw {
                Value::String(name) => Ok(Some(NameFilter(name.clone()))),
                Value::Bool(_) => Err(EntityValidationError::single("filter", "bad filter")),
                _ => Ok(None),
            }
        }
    }

    type Params = SearchParams<NameFilter>;

    #[test]
    fn test_defaults_for_empty_input() {
        let params = Params::create(&json!({})).unwrap();
        assert_eq!(params, Params::default());
        assert_eq!(params.page(), 1);
        assert_eq!(params.per_page(), 15);
        assert_eq!(params.sort(), None);
        assert_eq!(params.sort_dir(), None);
        assert!(params.filter().is_none());

        assert_eq!(Params::create(&Value::Null).unwrap(), Params::default());
        assert_eq!(Params::create(&json!("page=2")).unwrap(), Params::default());
    }

    #[test]
    fn test_page_normalization() {
        let cases = [
            (json!(null), 1),
            (json!(""), 1),
            (json!("fake"), 1),
            (json!(0), 1),
            (json!(-1), 1),
            (json!(5.5), 1),
            (json!(true), 1),
            (json!({}), 1),
            (json!(1), 1),
            (json!(2), 2),
            (json!("3"), 3),
        ];
        for (page, expected) in cases {
            let params = Params::create(&json!({ "page": page })).unwrap();
            assert_eq!(params.page(), expected, "page input {page}");
        }
    }

    #[test]
    fn test_per_page_normalization() {
        let cases = [
            (json!(null), 15),
            (json!("fake"), 15),
            (json!(0), 15),
            (json!(-1), 15),
            (json!(5.5), 15),
            (json!(false), 15),
            (json!(1), 1),
            (json!(10), 10),
            (json!("20"), 20),
        ];
        for (per_page, expected) in cases {
            let params = Params::create(&json!({ "per_page": per_page })).unwrap();
            assert_eq!(params.per_page(), expected, "per_page input {per_page}");
        }
    }

    #[test]
    fn test_sort_normalization() {
        let cases = [
            (json!(null), None),
            (json!(""), None),
            (json!("field"), Some("field".to_string())),
            (json!(0), Some("0".to_string())),
            (json!(false), Some("false".to_string())),
        ];
        for (sort, expected) in cases {
            let params = Params::create(&json!({ "sort": sort })).unwrap();
            assert_eq!(params.sort().map(str::to_string), expected);
        }
    }

    #[test]
    fn test_sort_dir_normalization() {
        let params = Params::create(&json!({ "sort_dir": "desc" })).unwrap();
        assert_eq!(params.sort_dir(), None);

        let cases = [
            (json!(null), SortDirection::Asc),
            (json!(""), SortDirection::Asc),
            (json!("fake"), SortDirection::Asc),
            (json!(0), SortDirection::Asc),
            (json!("asc"), SortDirection::Asc),
            (json!("ASC"), SortDirection::Asc),
            (json!("desc"), SortDirection::Desc),
            (json!("DeSc"), SortDirection::Desc),
        ];
        for (sort_dir, expected) in cases {
            let params =
                Params::create(&json!({ "sort": "name", "sort_dir": sort_dir })).unwrap();
            assert_eq!(params.sort_dir(), Some(expected), "sort_dir input {sort_dir}");
        }
    }

    #[test]
    fn test_filter_normalization() {
        assert!(Params::create(&json!({ "filter": null })).unwrap().filter().is_none());
        assert!(Params::create(&json!({ "filter": "" })).unwrap().filter().is_none());
        assert!(Params::create(&json!({ "filter": 5 })).unwrap().filter().is_none());
        assert_eq!(
            Params::create(&json!({ "filter": "abc" })).unwrap().filter(),
            Some(&NameFilter("abc".to_string()))
        );
        assert!(Params::create(&json!({ "filter": true })).is_err());
    }

    #[test]
    fn test_offset_and_limit() {
        let params = Params::default().with_page(3).with_per_page(10);
        assert_eq!(params.offset(), 20);
        assert_eq!(params.limit(), 10);
    }

    #[test]
    fn test_typed_constructor_applies_defaults() {
        let params = Params::new(0, 0, Some(String::new()), Some(SortDirection::Desc), None);
        assert_eq!(params, Params::default());

        let params = Params::new(2, 5, Some("name".into()), None, None);
        assert_eq!(params.sort_dir(), Some(SortDirection::Asc));
    }

    #[test]
    fn test_last_page_formula() {
        let cases = [
            (0, 15, 1),
            (1, 15, 1),
            (15, 15, 1),
            (16, 15, 2),
            (4, 2, 2),
            (5, 2, 3),
            (101, 10, 11),
        ];
        for (total, per_page, last_page) in cases {
            let result = SearchResult::<u8>::new(vec![], total, 1, per_page);
            assert_eq!(result.last_page(), last_page, "total {total} per_page {per_page}");
        }
    }

    #[test]
    fn test_empty_result() {
        let result = SearchResult::<u8>::new(vec![], 0, 1, 15);
        assert!(result.items().is_empty());
        assert_eq!(result.total(), 0);
        assert_eq!(result.last_page(), 1);
    }

    #[test]
    fn test_map_keeps_metadata() {
        let result = SearchResult::new(vec![1, 2], 4, 1, 2).map(|item| item * 10);
        assert_eq!(result.items(), &[10, 20]);
        assert_eq!(result.total(), 4);
        assert_eq!(result.last_page(), 2);
    }
}
