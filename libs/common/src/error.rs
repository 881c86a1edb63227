//! Custom error types for the common library
//!
//! This module defines the error types shared by every aggregate: identifier
//! parsing, lookups that miss, accumulated validation failures, transaction
//! management and storage access.

use std::collections::BTreeMap;
use std::fmt;

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// A textual identifier that is not a hyphenated UUID
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("ID must be a valid UUID: {0}")]
pub struct InvalidIdentifierError(pub String);

/// No aggregate of the given kind exists under the given identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{entity} Not Found using ID {id}")]
pub struct NotFoundError {
    pub id: String,
    pub entity: &'static str,
}

impl NotFoundError {
    pub fn new(id: impl fmt::Display, entity: &'static str) -> Self {
        Self {
            id: id.to_string(),
            entity,
        }
    }
}

/// Field-keyed validation messages, reported together
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("Entity Validation Error")]
pub struct EntityValidationError {
    pub errors: BTreeMap<String, Vec<String>>,
}

impl EntityValidationError {
    pub fn new(errors: BTreeMap<String, Vec<String>>) -> Self {
        Self { errors }
    }

    /// Shortcut for a single message on a single field
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.into(), vec![message.into()]);
        Self { errors }
    }

    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }
}

/// Misuse of the unit-of-work lifecycle or a failure of the transaction itself
#[derive(Error, Debug)]
pub enum UnitOfWorkError {
    #[error("Transaction already started")]
    AlreadyStarted,

    #[error("No transaction started")]
    NotStarted,

    #[error("Transaction error: {0}")]
    Database(#[source] SqlxError),
}

/// Errors returned by repository operations
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    UnitOfWork(#[from] UnitOfWorkError),

    /// An insert reused the id of a stored row or repeated one within a batch
    #[error("{entity} already exists with ID {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// A stored row could not be turned back into an aggregate
    #[error("Corrupted row in {table}: {reason}")]
    Corrupted { table: &'static str, reason: String },
}

impl From<SqlxError> for RepositoryError {
    fn from(error: SqlxError) -> Self {
        RepositoryError::Database(DatabaseError::Query(error))
    }
}

/// Type alias for repository results
pub type RepositoryResult<T> = Result<T, RepositoryError>;
