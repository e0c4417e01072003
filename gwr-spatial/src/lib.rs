//! Spatial side of the groundwater retrieval core.
//!
//! A [`SpatialQuery`] (zip code buffer, polygon file, state, or explicit site
//! list) is resolved into a [`ResolvedGeometry`] in a canonical geographic
//! CRS, and [`filter_sites`] reduces a [`SiteCatalog`] to the [`SiteSet`] the
//! query covers.

pub mod crs;
pub mod error;
pub mod filter;
pub mod gazetteer;
pub mod geometry;
pub mod resolver;
pub mod shapes;
pub mod states;

pub use crs::Crs;
pub use error::{Result, SpatialError};
pub use filter::{filter_sites, SiteCatalog, SiteSet};
pub use gazetteer::{Gazetteer, ZipGazetteer};
pub use geometry::{BoundingBox, QueryScope, ResolvedGeometry};
pub use resolver::{resolve, MissingCrsPolicy, ResolverOptions, SpatialQuery};
pub use shapes::{CrsDeclaration, FeatureSet};
pub use states::State;
