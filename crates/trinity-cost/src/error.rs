use thiserror::Error;

#[derive(Error, Debug)]
pub enum CostError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for CostError {
    fn from(err: rusqlite::Error) -> Self {
        CostError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CostError {
    fn from(err: serde_json::Error) -> Self {
        CostError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CostError>;
