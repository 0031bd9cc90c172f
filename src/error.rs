use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("File too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Open Finance rejected the access token")]
    Unauthorized,

    #[error("User {0} has no Open Finance connection")]
    NotConnected(i64),

    #[error("Duplicate transaction key")]
    DuplicateKey,

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl LedgerError {
    /// Whether a caller may retry the same request without changing its input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
