use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk file parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid chunk record at position {position}: {reason}")]
    InvalidRecord { position: usize, reason: String },
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("backend not available: {0}")]
    NotReady(String),

    #[error("{stage} timed out after {millis} ms")]
    Timeout { stage: &'static str, millis: u128 },
}

impl SearchError {
    pub(crate) fn backend(backend: &str, details: impl Into<String>) -> Self {
        Self::BackendResponse {
            backend: backend.to_string(),
            details: details.into(),
        }
    }
}

pub type Result<T, E = SearchError> = std::result::Result<T, E>;
