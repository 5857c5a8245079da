//! Application-level error folding domain and storage failures.

use thiserror::Error;

use agrolog_core::DomainError;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("too many attempts; retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

impl ServiceError {
    pub fn not_found() -> Self {
        Self::Domain(DomainError::NotFound)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::Domain(DomainError::NotFound) | ServiceError::Store(StoreError::NotFound)
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ServiceError::Domain(DomainError::Conflict(_)) | ServiceError::Store(StoreError::Conflict(_))
        )
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
