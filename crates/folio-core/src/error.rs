use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("properties must be an object, got {0}")]
    NotAnObject(&'static str),
}
