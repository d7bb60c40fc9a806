use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecordError>;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Record source returned status {status} for '{source_name}'")]
    BadStatus { status: u16, source_name: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid record at row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },

    #[error("{0}")]
    Other(String),
}
