use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("invalid dataset id: {0}")]
    InvalidDatasetId(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("unexpected catalog response: {0}")]
    CatalogResponse(String),

    #[error("invalid catalog table: {0}")]
    InvalidCatalog(String),

    #[error("Enrichr request failed: {0}")]
    EnrichrHttp(String),

    #[error("Enrichr returned status {status}: {message}")]
    EnrichrStatus { status: u16, message: String },

    #[error("unexpected Enrichr response: {0}")]
    EnrichrResponse(String),

    #[error("Enrichr rejected gene {gene}: {message}")]
    EnrichmentRejected { gene: String, message: String },

    #[error("table {table} has no column {column}")]
    MissingColumn { table: String, column: String },

    #[error("table error: {0}")]
    Table(String),

    #[error("columnar conversion failed: {0}")]
    Columnar(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("manifest not found: {0}")]
    MissingManifest(PathBuf),

    #[error(
        "number of temposeq datasets and {manifest} files do not match: \
         datasets={expected}, {manifest} files={actual}"
    )]
    CountMismatch {
        manifest: String,
        expected: usize,
        actual: usize,
    },

    #[error("verification marker not found at {0}; stop building because verification failed")]
    VerificationMissing(PathBuf),
}
