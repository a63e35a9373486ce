//! Error types for loading and ranking.

use thiserror::Error;

/// Errors raised by the dataset loader and the ranking pipeline
#[derive(Error, Debug)]
pub enum DiversityError {
    /// A required column is absent from the source table. Fatal for the load.
    #[error("Schema error: missing required column `{column}`")]
    Schema { column: String },

    /// A cell could not be decoded. Fatal for the load.
    #[error("Parse error at row {row}, column `{column}`: {message}")]
    Parse {
        row: usize,
        column: String,
        message: String,
    },

    #[error("Metric not found: {0}")]
    MetricNotFound(String),

    #[error("Institution not found in current selection: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl DiversityError {
    pub(crate) fn parse(row: usize, column: &str, message: impl Into<String>) -> Self {
        Self::Parse {
            row,
            column: column.to_string(),
            message: message.into(),
        }
    }

    /// Load failures end the session; everything else is scoped to one selection.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::MetricNotFound(_) | Self::NotFound(_) | Self::Config(_)
        )
    }
}

/// Result type for diversity ranking operations
pub type Result<T> = std::result::Result<T, DiversityError>;
