use thiserror::Error;

/// Unified error type for the assay pipeline.
///
/// Ingestion and enrichment steps return the granular variants
/// (`DownloadFailed`, `ParseFailed`, `ColumnMissing`, `ScoringDefaulted`)
/// so callers can log and degrade instead of aborting a run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Could not parse {file}: {reason}")]
    ParseFailed { file: String, reason: String },

    #[error("Column missing: {0}")]
    ColumnMissing(String),

    #[error("Row {row} could not be scored, neutral tier applied")]
    ScoringDefaulted { row: usize },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("External API error: {0}")]
    External(String),

    #[error("HTTP status error: {0}")]
    HttpStatus(String),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// True for errors the outbound retry policy should re-attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Request(e) => e.is_timeout() || e.is_connect(),
            Error::HttpStatus(_) | Error::External(_) => true,
            _ => false,
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
