use thiserror::Error;

/// Result type for geo operations
pub type Result<T> = std::result::Result<T, GeoError>;

/// Errors raised at the boundaries of the geo crate (files, network).
///
/// Lookups themselves never fail: a code without geography is a miss, not an error.
#[derive(Error, Debug)]
pub enum GeoError {
    /// IO error while reading a reference table
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed CSV document
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Transport-level failure talking to the geocoder
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The geocoder answered with a non-success status
    #[error("Geocoder returned status {status}: {body}")]
    BadStatus { status: u16, body: String },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl GeoError {
    pub fn bad_status(status: u16, body: impl Into<String>) -> Self {
        Self::BadStatus {
            status,
            body: body.into(),
        }
    }
}
