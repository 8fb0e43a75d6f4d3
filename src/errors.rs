//! Error types for the lifecycle report pipeline.
//!
//! The report pipeline distinguishes three terminal failure classes:
//! configuration (no usable stages, unusable settings), validation
//! (malformed request input) and storage (the database is unreachable or a
//! query fails). Data inconsistencies such as relation edges pointing
//! outside the stage set are tolerated upstream and never surface here.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors raised while building a lifecycle report.
#[derive(Error, Debug)]
pub enum ReportError {
    /// Stage resolution produced an empty sequence.
    #[error("no active stages are configured")]
    NoActiveStages,

    /// The settings file is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request input is malformed and must be corrected by the caller.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A database query failed.
    #[error("storage error: {0}")]
    Storage(#[from] sea_orm::DbErr),
}

impl ReportError {
    /// HTTP status for this error: request/config problems map to 4xx,
    /// storage failures to 5xx.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReportError::NoActiveStages => StatusCode::UNPROCESSABLE_ENTITY,
            ReportError::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ReportError::Validation(_) => StatusCode::BAD_REQUEST,
            ReportError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SettingsError> for ReportError {
    fn from(err: SettingsError) -> Self {
        ReportError::Configuration(err.to_string())
    }
}

/// Errors raised while reading or writing the settings file.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Result type alias for report operations.
pub type ReportResult<T> = Result<T, ReportError>;

/// Result type alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
