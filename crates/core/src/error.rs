//! Error types for GeoLocus

use thiserror::Error;

/// Main error type for GeoLocus operations
///
/// Every variant here is fatal for the run that produced it. Per-location
/// conditions (isolates, rank deficiency, non-convergence) are not errors;
/// they are recorded on the local results and counted in run summaries.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed dataset: {0}")]
    Format(String),

    #[error("Column not found: {name}")]
    MissingColumn { name: String },

    #[error("Column '{name}' is not numeric (row {row}: {found})")]
    NonNumericColumn {
        name: String,
        row: usize,
        found: String,
    },

    #[error("Column '{name}' has {missing} missing value(s) out of {total}")]
    MissingValues {
        name: String,
        missing: usize,
        total: usize,
    },

    #[error("Column length mismatch for '{name}': expected {expected}, got {actual}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Bandwidth search failed: {0}")]
    BandwidthSearchFailed(String),

    #[error("{analysis} produced no valid result for any of {total} observations")]
    NoValidResults { analysis: &'static str, total: usize },

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`].
    pub fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for GeoLocus operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_message() {
        let e = Error::invalid("significance", 1.5, "must be in (0, 1]");
        assert_eq!(
            e.to_string(),
            "Invalid parameter: significance = 1.5 (must be in (0, 1])"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let e: Error = io.into();
        assert!(matches!(e, Error::Io(_)));
    }
}
