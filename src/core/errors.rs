use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReorderError {
    #[error("I/O error: {0}")]
    Io(Box<std::io::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HJson error: {0}")]
    HJson(#[from] serde_hjson::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Cache error: {0}")]
    Cache(String),

    /// Bad target definition, missing language directory, unknown factor, invalid query.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Nothing to work on (no cards in scope, empty corpus).
    #[error("Data error: {0}")]
    Data(String),

    #[error("Compute error: {0}")]
    Compute(String),

    /// The collection refused a write.
    #[error("Commit error: {0}")]
    Commit(String),

    #[error("ReorderError: {0}")]
    Custom(String),
}

impl ReorderError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, ReorderError::Configuration(_))
    }

    pub fn is_data(&self) -> bool {
        matches!(self, ReorderError::Data(_))
    }
}

impl From<std::io::Error> for ReorderError {
    fn from(error: std::io::Error) -> Self {
        ReorderError::Io(Box::new(error))
    }
}

impl From<bincode::error::EncodeError> for ReorderError {
    fn from(error: bincode::error::EncodeError) -> Self {
        ReorderError::Cache(error.to_string())
    }
}

impl From<bincode::error::DecodeError> for ReorderError {
    fn from(error: bincode::error::DecodeError) -> Self {
        ReorderError::Cache(error.to_string())
    }
}
