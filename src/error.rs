// Error types for the data source and the loader boundary.
//
// SourceError is what a connector returns. LoadError is what the loader
// reports next to its (empty) fallback result; nothing past the loader
// ever sees a raw SourceError.

use serde::Serialize;
use thiserror::Error;

use crate::scope::{QueryKind, Selection};

/// Failure raised by a `DataSource`
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SourceError {
    /// The store could not be reached or opened
    #[error("connection error: {0}")]
    Connection(String),

    /// The store rejected the query (unknown table/column, bad parameter, ...)
    #[error("query error: {0}")]
    Query(String),
}

impl SourceError {
    pub fn is_connection(&self) -> bool {
        matches!(self, SourceError::Connection(_))
    }
}

impl From<rusqlite::Error> for SourceError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::CannotOpen
                        | rusqlite::ErrorCode::NotADatabase
                        | rusqlite::ErrorCode::PermissionDenied
                        | rusqlite::ErrorCode::DatabaseBusy
                        | rusqlite::ErrorCode::DatabaseLocked
                        | rusqlite::ErrorCode::SystemIoFailure
                ) =>
            {
                SourceError::Connection(err.to_string())
            }
            rusqlite::Error::InvalidPath(_) => SourceError::Connection(err.to_string()),
            _ => SourceError::Query(err.to_string()),
        }
    }
}

/// Error reported by the loader alongside its empty fallback result
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("failed to load {kind} for {selection}: {source}")]
pub struct LoadError {
    pub selection: Selection,
    pub kind: QueryKind,
    pub source: SourceError,
}

impl LoadError {
    pub fn new(selection: Selection, kind: QueryKind, source: SourceError) -> Self {
        Self {
            selection,
            kind,
            source,
        }
    }

    /// Message suitable for showing to the operator
    pub fn user_message(&self) -> String {
        match self.kind {
            QueryKind::FranchiseList => format!("Error loading franchises: {}", self.source),
            QueryKind::EntityBatch => match self.selection {
                Selection::AllFranchises => {
                    format!("Error loading data for all franchises: {}", self.source)
                }
                Selection::Franchise(_) => {
                    format!("Error loading franchise data: {}", self.source)
                }
            },
        }
    }
}
