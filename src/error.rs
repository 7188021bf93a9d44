use std::io;

#[cfg(feature = "service")]
use sqlx::{migrate::MigrateError, Error as SqlxError};

use http::status::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use url::ParseError as UrlParseError;

/// Errors reported to the caller of a page mutation or query.
///
/// Only hard failures live here. Reference tokens that do not resolve and media URLs that do not
/// normalize are not errors; the derivation passes drop them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum PageweaveError {
    #[error("Cache/Database error: {0}")]
    Cache(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    #[error("Structural conflict: {0}")]
    StructuralConflict(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl PageweaveError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PageweaveError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PageweaveError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PageweaveError::NotFound(_) => StatusCode::NOT_FOUND,
            PageweaveError::InvariantViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PageweaveError::StructuralConflict(_) => StatusCode::CONFLICT,
            PageweaveError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn page_not_found(slug: &str) -> Self {
        PageweaveError::NotFound(format!("page '{slug}'"))
    }
}

impl From<toml::de::Error> for PageweaveError {
    fn from(src: toml::de::Error) -> PageweaveError {
        PageweaveError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for PageweaveError {
    fn from(src: toml::ser::Error) -> PageweaveError {
        PageweaveError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for PageweaveError {
    fn from(src: JsonError) -> PageweaveError {
        PageweaveError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<UrlParseError> for PageweaveError {
    fn from(src: UrlParseError) -> PageweaveError {
        PageweaveError::Serialization(format!("Invalid URL: {src}"))
    }
}

impl From<io::Error> for PageweaveError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => PageweaveError::NotFound(format!("{x}")),
            _ => PageweaveError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

#[cfg(feature = "service")]
impl From<SqlxError> for PageweaveError {
    fn from(db_error: SqlxError) -> Self {
        match &db_error {
            SqlxError::Database(e) if e.is_unique_violation() => {
                PageweaveError::InvariantViolation(format!("duplicate row: {}", e.message()))
            }
            _ => PageweaveError::Cache(format!("database error: {db_error:?}")),
        }
    }
}

#[cfg(feature = "service")]
impl From<MigrateError> for PageweaveError {
    fn from(migrate_error: MigrateError) -> Self {
        PageweaveError::Cache(format!("migration error: {migrate_error}"))
    }
}
