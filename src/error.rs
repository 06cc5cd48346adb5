// ⚠️ Error taxonomy for the expense pipeline
//
// Only InputNotFound, MalformedInput and I/O during load/persist abort a run.
// Everything raised inside the enrichment boundary is folded into
// `Enrichment::Degraded` before it reaches the driver.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("ledger not found; searched: {}", display_paths(.candidates))]
    InputNotFound { candidates: Vec<PathBuf> },

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("required columns not found: {}", .0.join(", "))]
    SchemaResolution(Vec<&'static str>),

    #[error("registry fetch failed: {0}")]
    RegistryFetch(String),

    #[error("invalid page request: {0}")]
    InvalidPage(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::RegistryFetch(err.to_string())
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, PipelineError>;
