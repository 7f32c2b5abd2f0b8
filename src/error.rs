use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum BiaError {
    #[error("malformed accession: {0}")]
    MalformedAccession(String),

    #[error("no file found for {relpath} (tried {} candidates)", candidates.len())]
    NotFound {
        relpath: String,
        candidates: Vec<PathBuf>,
    },

    #[error("zip archive unavailable: {0}")]
    ZipUnavailable(String),

    #[error("catalogue request failed: {0}")]
    CatalogueFetch(String),

    #[error("catalogue returned status {status}: {message}")]
    CatalogueStatus { status: u16, message: String },

    #[error("failed to parse catalogue response: {0}")]
    CatalogueParse(String),

    #[error("study not found in store: {0}")]
    StudyNotFound(String),

    #[error("archive file {file_id} not found in study {accession}")]
    ArchiveFileNotFound { accession: String, file_id: String },

    #[error("image {image_id} not found in study {accession}")]
    ImageNotFound { accession: String, image_id: String },

    #[error("{0} has no representations")]
    MissingRepresentation(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to parse summary report: {0}")]
    ReportParse(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP request returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
