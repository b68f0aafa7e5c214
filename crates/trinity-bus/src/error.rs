use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("bus closed")]
    Closed,
}

impl From<rusqlite::Error> for BusError {
    fn from(err: rusqlite::Error) -> Self {
        BusError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        BusError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BusError>;
