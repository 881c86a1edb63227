//! Common library for the catalog backend
//!
//! This crate provides the building blocks shared by every catalog
//! aggregate: identifier values, search parameters and results, the
//! searchable repository contract with its in-memory backend, the unit of
//! work, database connectivity, settings and error handling.

pub mod database;
pub mod error;
pub mod identifier;
pub mod memory;
pub mod notification;
pub mod relation;
pub mod repository;
pub mod search;
pub mod settings;
pub mod unit_of_work;

pub use error::{
    DatabaseError, EntityValidationError, InvalidIdentifierError, NotFoundError, RepositoryError,
    RepositoryResult, UnitOfWorkError,
};
pub use identifier::EntityId;
pub use notification::Notification;
pub use relation::RelationSet;
pub use repository::{Entity, ExistsResult, Searchable, SearchableRepository, SortValue};
pub use search::{SearchFilter, SearchParams, SearchResult, SortDirection};
pub use unit_of_work::{InMemoryUnitOfWork, PgUnitOfWork, UnitOfWork, UnitOfWorkExt};
