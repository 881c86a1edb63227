//! Cast member aggregate

use std::fmt;

use chrono::{DateTime, Utc};
use common::repository::contains_ignore_case;
use common::search::{filter_object, filter_text};
use common::{Entity, EntityValidationError, Notification, SearchFilter, Searchable, SortValue};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::{MAX_NAME_LENGTH, check_max_length, now};

common::entity_id!(
    /// Identity of a cast member
    CastMemberId
);

/// Role of a cast member, stored as its numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastMemberType {
    Director = 1,
    Actor = 2,
}

/// Message used whenever a type code is rejected
fn invalid_type_message(value: impl fmt::Display) -> String {
    format!("Invalid cast member type: {value}")
}

impl CastMemberType {
    pub fn code(&self) -> i16 {
        *self as i16
    }

    pub fn from_code(code: i64) -> Result<Self, String> {
        match code {
            1 => Ok(CastMemberType::Director),
            2 => Ok(CastMemberType::Actor),
            other => Err(invalid_type_message(other)),
        }
    }

    /// Accept `1`, `2`, `"1"` and `"2"`
    pub fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Number(number) => number
                .as_i64()
                .ok_or_else(|| invalid_type_message(number))
                .and_then(Self::from_code),
            Value::String(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| invalid_type_message(text))
                .and_then(Self::from_code),
            other => Err(invalid_type_message(other)),
        }
    }
}

impl Serialize for CastMemberType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i16(self.code())
    }
}

impl<'de> Deserialize<'de> for CastMemberType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CastMember {
    pub(crate) cast_member_id: CastMemberId,
    pub(crate) name: String,
    #[serde(rename = "type")]
    pub(crate) cast_member_type: CastMemberType,
    pub(crate) created_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) notification: Notification,
}

/// Input for [`CastMember::create`]
#[derive(Debug, Clone, Deserialize)]
pub struct CastMemberCreateCommand {
    pub name: String,
    #[serde(rename = "type")]
    pub cast_member_type: CastMemberType,
}

impl CastMember {
    pub fn create(command: CastMemberCreateCommand) -> Self {
        let mut cast_member = Self {
            cast_member_id: CastMemberId::new(),
            name: command.name,
            cast_member_type: command.cast_member_type,
            created_at: now(),
            notification: Notification::new(),
        };
        cast_member.validate();
        cast_member
    }

    pub(crate) fn restore(
        cast_member_id: CastMemberId,
        name: String,
        cast_member_type: CastMemberType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            cast_member_id,
            name,
            cast_member_type,
            created_at,
            notification: Notification::new(),
        }
    }

    pub fn cast_member_id(&self) -> CastMemberId {
        self.cast_member_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cast_member_type(&self) -> CastMemberType {
        self.cast_member_type
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

    pub fn change_type(&mut self, cast_member_type: CastMemberType) {
        self.cast_member_type = cast_member_type;
    }

    pub fn validate(&mut self) -> bool {
        self.notification.clear_fields(&["name"]);
        check_max_length(&mut self.notification, "name", &self.name, MAX_NAME_LENGTH);
        !self.notification.has_errors()
    }
}

impl Entity for CastMember {
    type Id = CastMemberId;
    const NAME: &'static str = "CastMember";

    fn entity_id(&self) -> &CastMemberId {
        &self.cast_member_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CastMemberFilter {
    pub name: Option<String>,
    pub cast_member_type: Option<CastMemberType>,
}

impl SearchFilter for CastMemberFilter {
    fn from_raw(raw: &Value) -> Result<Option<Self>, EntityValidationError> {
        let Some(object) = filter_object(raw) else {
            return Ok(None);
        };

        let name = filter_text(object, "name");
        let cast_member_type = match object.get("type") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) if text.is_empty() => None,
            Some(value) => Some(
                CastMemberType::from_value(value)
                    .map_err(|message| EntityValidationError::single("type", message))?,
            ),
        };

        if name.is_none() && cast_member_type.is_none() {
            return Ok(None);
        }
        Ok(Some(Self {
            name,
            cast_member_type,
        }))
    }
}

impl Searchable for CastMember {
    type Filter = CastMemberFilter;
    const SORTABLE_FIELDS: &'static [&'static str] = &["name", "created_at"];

    fn matches(&self, filter: &CastMemberFilter) -> bool {
        let name_matches = filter
            .name
            .as_deref()
            .is_none_or(|name| contains_ignore_case(&self.name, name));
        let type_matches = filter
            .cast_member_type
            .is_none_or(|cast_member_type| self.cast_member_type == cast_member_type);
        name_matches && type_matches
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "name" => Some(SortValue::Text(self.name.clone())),
            "created_at" => Some(SortValue::Timestamp(self.created_at)),
            _ => None,
        }
    }
}
