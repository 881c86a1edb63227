//! Error type of the catalog use cases

use common::{
    EntityValidationError, InvalidIdentifierError, NotFoundError, RepositoryError,
    UnitOfWorkError,
};
use thiserror::Error;

/// Coarse classification a caller can map to a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Internal,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] EntityValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifierError),

    #[error("Repository error: {0}")]
    Repository(#[source] RepositoryError),

    #[error(transparent)]
    UnitOfWork(#[from] UnitOfWorkError),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::Validation(_) | CatalogError::InvalidIdentifier(_) => {
                ErrorKind::Validation
            }
            CatalogError::NotFound(_) => ErrorKind::NotFound,
            CatalogError::Repository(_) | CatalogError::UnitOfWork(_) => ErrorKind::Internal,
        }
    }
}

impl From<RepositoryError> for CatalogError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(not_found) => CatalogError::NotFound(not_found),
            RepositoryError::UnitOfWork(uow) => CatalogError::UnitOfWork(uow),
            other => CatalogError::Repository(other),
        }
    }
}

/// Type alias for use-case results
pub type CatalogResult<T> = Result<T, CatalogError>;
