use std::path::PathBuf;

/// Errors raised by catalog ingestion, storage and the query session
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(
        "Failed to match the catalog header in {}: no supplier part column in `{header}`",
        path.display()
    )]
    IngestSchema { path: PathBuf, header: String },

    #[error("Catalog ingestion did not complete, previous catalog kept: {reason}")]
    IngestIncomplete { reason: String },

    #[error("Unknown catalog field `{0}`")]
    InvalidField(String),

    #[error("{fields} fields but {widths} column widths; both lists must be the same length")]
    FieldWidthMismatch { fields: usize, widths: usize },

    #[error("Invalid column width `{0}`")]
    InvalidWidth(String),

    #[error("Invalid row count `{0}`")]
    InvalidCount(String),

    #[error("Unknown command `{0}` (enter ? for help)")]
    UnknownCommand(String),

    #[error("Failed to download the parts dump from {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Catalog database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;
