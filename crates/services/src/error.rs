//! Shared error types for the services crate.

use std::path::PathBuf;

use thiserror::Error;

use storage::sqlite::SqliteInitError;

/// Errors emitted while loading lesson definitions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LessonLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} has no usable file name for a lesson id")]
    InvalidFileName { path: PathBuf },
    #[error("lesson file {path} declares id {found}, expected {expected}")]
    IdMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
    #[error("invalid lesson in {path}: {source}")]
    Lesson {
        path: PathBuf,
        #[source]
        source: learn_core::Error,
    },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
