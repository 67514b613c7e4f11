//! Error types
//!
//! Page derivations never surface these to their callers: an unavailable
//! source or a failed decode collapses to an absent result. The catalog and
//! configuration layers return them normally.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::{GroupId, PageId, SessionId};

/// Why a page's bytes could not be obtained
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("page has neither an archive index nor an image path")]
    NoSource,

    #[error("group {0:?} is not registered")]
    GroupUnavailable(GroupId),

    #[error("page has an archive index but no owning group")]
    MissingGroup,

    #[error("group has no entry at index {0}")]
    IndexOutOfRange(i64),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the SQLite catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare catalog location {path}: {source}")]
    Location {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("page {0:?} not found")]
    PageNotFound(PageId),

    #[error("session {0:?} not found")]
    SessionNotFound(SessionId),
}

/// Failures while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures while loading an outline font for text pages
#[derive(Debug, Error)]
pub enum FontError {
    #[error("failed to read font {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a usable font: {0}")]
    Parse(&'static str),
}
