//! USGS NWIS groundwater-level types and parsing.
//!
//! `observation` and `site` hold the plain data every other crate consumes;
//! `rdb` reads the service's tab-delimited responses. The HTTP client lives in
//! `client` and is only compiled with the `api` feature.

#[cfg(feature = "api")]
pub mod client;
pub mod error;
pub mod observation;
pub mod rdb;
pub mod site;

pub use error::{NwisError, Result};
pub use observation::{DataSource, Observation, QualityFlag};
pub use site::{Site, SiteLocation};
