/// Error types for the NWIS library
use thiserror::Error;

/// Main error type for NWIS operations
#[derive(Error, Debug)]
pub enum NwisError {
    /// HTTP request failed
    #[cfg(feature = "api")]
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The service answered with a non-success status after all retries
    #[error("NWIS returned status {status} for {url}")]
    Status { url: String, status: u16 },

    /// Failed to parse CSV data
    #[error("Failed to parse CSV: {0}")]
    CsvParse(#[from] csv::Error),

    /// Failed to read or write a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// RDB response was not in the expected layout
    #[error("Failed to parse RDB response: {0}")]
    RdbParse(String),

    /// A single row could not be turned into an observation or site
    #[error("Invalid record at line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },
}

/// Type alias for Results using NwisError
pub type Result<T> = std::result::Result<T, NwisError>;
