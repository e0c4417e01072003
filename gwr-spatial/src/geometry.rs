use crate::crs::Crs;
use geo::{BoundingRect, Coord, MultiPolygon, Rect};
use serde::{Deserialize, Serialize};

/// Axis-aligned geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum longitude (western edge) in degrees
    pub min_lon: f64,
    /// Minimum latitude (southern edge) in degrees
    pub min_lat: f64,
    /// Maximum longitude (eastern edge) in degrees
    pub max_lon: f64,
    /// Maximum latitude (northern edge) in degrees
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Smallest box around a geometry, `None` when it has no coordinates.
    pub fn of(geometry: &MultiPolygon<f64>) -> Option<Self> {
        geometry.bounding_rect().map(Self::from)
    }

    /// True when the box crosses the antimeridian, i.e. its western edge lies
    /// east of its eastern edge.
    pub fn crosses_antimeridian(&self) -> bool {
        self.min_lon > self.max_lon
    }

    /// Check if a point is within this bounding box, edges included.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let in_lon = if self.crosses_antimeridian() {
            lon >= self.min_lon || lon <= self.max_lon
        } else {
            lon >= self.min_lon && lon <= self.max_lon
        };
        in_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    /// (min_lon, min_lat, max_lon, max_lat), the order NWIS expects for `bBox`.
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.min_lon, self.min_lat, self.max_lon, self.max_lat)
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        let min: Coord<f64> = rect.min();
        let max: Coord<f64> = rect.max();
        Self::new(min.x, min.y, max.x, max.y)
    }
}

/// What a resolved query restricts sites by.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryScope {
    /// Point-in-geometry filtering (zip buffers and polygon files)
    Spatial,
    /// Administrative restriction by state, then the state's bounding box
    State { code: String, fips: String },
    /// Explicit site ids, returned as given
    SiteList(Vec<String>),
}

/// Output of the geometry resolver, always expressed in `crs`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGeometry {
    /// Areal geometry to filter by; `None` for state and site-list queries
    pub geometry: Option<MultiPolygon<f64>>,
    /// Box fully containing `geometry`; `None` only for site-list queries
    pub bbox: Option<BoundingBox>,
    /// Canonical geographic CRS the geometry is expressed in
    pub crs: Crs,
    pub scope: QueryScope,
}
