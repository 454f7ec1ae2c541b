use thiserror::Error;

/// Request-fatal failures of the forecast pipeline. None of these are
/// retryable: every input is static once the service is loaded.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("invalid date '{input}': {reason}")]
    InvalidDate { input: String, reason: String },
    #[error("no trip distance for origin zone {origin} to destination zone {destination}")]
    MissingDistance { origin: u32, destination: u32 },
    #[error(
        "zone pair (origin {origin}, destination {destination}) is outside the distance table ({rows} rows x {cols} columns)"
    )]
    ZoneOutOfRange {
        origin: u32,
        destination: u32,
        rows: usize,
        cols: usize,
    },
    #[error("model rejected the aligned feature vector: {0}")]
    SchemaMismatch(String),
    #[error("model variant {0} has no configured artifact")]
    UnsupportedModelVariant(u32),
    #[error("hour {0} is outside 0..=23")]
    HourOutOfRange(u32),
}

impl ForecastError {
    /// True when the failure points at the deployed artifacts rather than at
    /// the caller's input.
    pub fn is_internal(&self) -> bool {
        matches!(self, ForecastError::SchemaMismatch(_))
    }
}
