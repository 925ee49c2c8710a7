use thiserror::Error;

use crate::cache::{CacheError, SingleFlightError};
use crate::domain::DomainError;
use crate::infra::error::InfraError;

use super::sources::SourceError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

impl From<SingleFlightError<SourceError>> for AppError {
    fn from(err: SingleFlightError<SourceError>) -> Self {
        match err {
            SingleFlightError::Worker(source) => Self::Source(source),
            SingleFlightError::Cache(cache) => Self::Cache(cache),
        }
    }
}
