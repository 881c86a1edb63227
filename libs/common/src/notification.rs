//! Validation notification
//!
//! Aggregates collect their rule violations here instead of failing on the
//! first one, so that a caller can add relation errors and report everything
//! in a single [`EntityValidationError`].

use std::collections::BTreeMap;

use crate::error::EntityValidationError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    errors: BTreeMap<String, Vec<String>>,
}

impl Notification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to a field, ignoring exact duplicates
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let message = message.into();
        let messages = self.errors.entry(field.into()).or_default();
        if !messages.contains(&message) {
            messages.push(message);
        }
    }

    /// Replace every message of a field
    pub fn set_error(&mut self, field: impl Into<String>, messages: Vec<String>) {
        if messages.is_empty() {
            return;
        }
        self.errors.insert(field.into(), messages);
    }

    /// Drop the messages of the given fields, used before re-validating them
    pub fn clear_fields(&mut self, fields: &[&str]) {
        for field in fields {
            self.errors.remove(*field);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    pub fn copy_errors(&mut self, other: &Notification) {
        for (field, messages) in &other.errors {
            for message in messages {
                self.add_error(field.clone(), message.clone());
            }
        }
    }

    pub fn to_validation_error(&self) -> EntityValidationError {
        EntityValidationError::new(self.errors.clone())
    }
}
