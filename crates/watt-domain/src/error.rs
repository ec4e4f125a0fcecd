use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("invalid usage sample: {0}")]
    InvalidSample(String),

    #[error("usage store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;
