//! # Service Error Type
//!
//! The single error a unit of work returns.
//!
//! ```text
//! CoreError ──┐
//!             ├──► ServiceError ──► kind() ──► NotFound | Conflict | InvalidInput | Storage
//! DbError ────┘
//! ```
//!
//! The request layer maps [`ErrorKind`] onto its own status codes; the
//! message is safe to show to the caller.

use storefront_core::{CoreError, ErrorKind, ValidationError};
use storefront_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// A business rule rejected the request.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The store failed.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Core(err) => err.kind(),
            ServiceError::Db(err) => err.kind(),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Core(err.into())
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Db(err.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_passes_through() {
        let err: ServiceError = CoreError::GrantNotFound(4).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Donor group grant not found: 4");

        let err: ServiceError = DbError::PoolExhausted.into();
        assert_eq!(err.kind(), ErrorKind::Storage);

        let err: ServiceError = ValidationError::MustBePositive {
            field: "amount".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
