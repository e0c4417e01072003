/// Error types for period assignment, aggregation and trend fitting
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemporalError {
    /// Too few usable periods to fit a trend
    #[error("Insufficient data: need at least {needed} usable periods, found {found}")]
    InsufficientData { needed: usize, found: usize },

    /// A single-site operation was given records from several sites
    #[error("Records span more than one site: {first} and {other}")]
    MixedSites { first: String, other: String },

    /// Aggregation scheme parameters are inconsistent
    #[error("Invalid aggregation scheme: {0}")]
    InvalidScheme(String),

    /// Name that is not a known statistic, scheme or frequency
    #[error("Unknown {kind}: {value:?}")]
    UnknownName { kind: &'static str, value: String },
}

/// Type alias for Results using TemporalError
pub type Result<T> = std::result::Result<T, TemporalError>;
