use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Analytics API error: {0}")]
    Status(u16),

    #[error("invalid endpoint: {0}")]
    Endpoint(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0} storage not available")]
    Unavailable(&'static str),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}
