/// Error types for spatial resolution
use thiserror::Error;

/// Main error type for spatial resolution and site filtering
#[derive(Error, Debug)]
pub enum SpatialError {
    /// Zip code or state code not present in the reference tables
    #[error("Unresolvable location: {0}")]
    UnresolvableLocation(String),

    /// Geometry input has no usable features or a malformed one
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Coordinate reference system cannot be reprojected to the canonical one
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    /// Filtering left no sites
    #[error("No sites found {0}")]
    NoSitesFound(String),

    /// The upstream site catalog held no sites at all
    #[error("Site catalog is empty")]
    EmptyCatalog,

    /// Failed to read an input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a reference table
    #[error("Failed to parse CSV: {0}")]
    CsvParse(#[from] csv::Error),

    /// GeoJSON text was not valid JSON
    #[error("Failed to parse GeoJSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Site catalog could not be read
    #[error("Site catalog error: {0}")]
    Catalog(#[from] gwr_nwis::NwisError),

    /// Shapefile parsing error
    #[error("Shapefile error: {0}")]
    Shapefile(String),
}

impl From<shapefile::Error> for SpatialError {
    fn from(e: shapefile::Error) -> Self {
        SpatialError::Shapefile(e.to_string())
    }
}

/// Type alias for Results using SpatialError
pub type Result<T> = std::result::Result<T, SpatialError>;
