use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Load error: {0}")]
    Load(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Cannot sample {requested} rows from a table of {available}")]
    SampleTooLarge { requested: usize, available: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sink error: {0}")]
    Sqlite(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for PrepError {
    fn from(err: polars::error::PolarsError) -> Self {
        PrepError::Polars(err.to_string())
    }
}

impl From<rusqlite::Error> for PrepError {
    fn from(err: rusqlite::Error) -> Self {
        PrepError::Sqlite(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PrepError>;
