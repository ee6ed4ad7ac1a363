use thiserror::Error;
use watch_core::WatchError;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    Duplicate(String),
}

impl From<StoreError> for WatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => WatchError::NotFound { kind: "record", id },
            StoreError::Duplicate(id) => WatchError::Conflict(format!("duplicate record {id}")),
        }
    }
}
