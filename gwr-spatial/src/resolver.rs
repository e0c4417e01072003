//! Turns a spatial query into a geometry in the canonical CRS.

use crate::crs::{AzimuthalEquidistantProjection, CoordinateProjection, Crs, EARTH_MEAN_RADIUS_M};
use crate::error::{Result, SpatialError};
use crate::gazetteer::Gazetteer;
use crate::geometry::{BoundingBox, QueryScope, ResolvedGeometry};
use crate::shapes::FeatureSet;
use crate::states::State;
use geo::{BooleanOps, Coord, CoordsIter, LineString, MultiPolygon, Polygon};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Number of vertices used to approximate a buffer circle.
pub const BUFFER_VERTICES: usize = 64;

/// One spatial input, exactly one kind per query.
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialQuery {
    /// Circle of `radius_miles` around the centroid of a zip code
    ZipCodeBuffer { zip: String, radius_miles: f64 },
    GeoJsonShape { geometry: FeatureSet },
    ShapefileShape { geometry: FeatureSet },
    /// Two-letter state code or FIPS code
    StateCode { code: String },
    /// Explicit site numbers, used as given
    SiteList { ids: Vec<String> },
}

impl SpatialQuery {
    pub fn zip_code(zip: impl Into<String>, radius_miles: f64) -> SpatialQuery {
        SpatialQuery::ZipCodeBuffer {
            zip: zip.into(),
            radius_miles,
        }
    }

    pub fn state(code: impl Into<String>) -> SpatialQuery {
        SpatialQuery::StateCode { code: code.into() }
    }

    pub fn site_list<I, S>(ids: I) -> SpatialQuery
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SpatialQuery::SiteList {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// What to do with a geometry file that declares no CRS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingCrsPolicy {
    /// Treat coordinates as already canonical, with a warning
    #[default]
    AssumeCanonical,
    /// Fail with `UnsupportedCrs`
    Reject,
}

impl FromStr for MissingCrsPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "assume_canonical" | "assume" => Ok(MissingCrsPolicy::AssumeCanonical),
            "reject" => Ok(MissingCrsPolicy::Reject),
            other => Err(format!("unknown missing-CRS policy {:?}", other)),
        }
    }
}

impl fmt::Display for MissingCrsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingCrsPolicy::AssumeCanonical => write!(f, "assume_canonical"),
            MissingCrsPolicy::Reject => write!(f, "reject"),
        }
    }
}

/// Options threaded through every resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverOptions {
    /// Geographic CRS all output geometry is expressed in
    pub canonical_crs: Crs,
    pub missing_crs: MissingCrsPolicy,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        ResolverOptions {
            canonical_crs: Crs::Wgs84,
            missing_crs: MissingCrsPolicy::AssumeCanonical,
        }
    }
}

/// Resolve a query into a geometry, its bounding box and its filtering scope.
pub fn resolve(
    query: &SpatialQuery,
    gazetteer: &dyn Gazetteer,
    options: &ResolverOptions,
) -> Result<ResolvedGeometry> {
    if !options.canonical_crs.is_geographic() {
        return Err(SpatialError::UnsupportedCrs(format!(
            "canonical CRS must be geographic, got {}",
            options.canonical_crs
        )));
    }
    match query {
        SpatialQuery::ZipCodeBuffer { zip, radius_miles } => {
            resolve_zip_buffer(zip, *radius_miles, gazetteer, options)
        }
        SpatialQuery::GeoJsonShape { geometry } => resolve_features(geometry, "GeoJSON", options),
        SpatialQuery::ShapefileShape { geometry } => {
            resolve_features(geometry, "shapefile", options)
        }
        SpatialQuery::StateCode { code } => {
            let state = State::lookup(code)?;
            debug!("Resolved state {} ({}) to {:?}", state.code, state.name, state.bbox);
            Ok(ResolvedGeometry {
                geometry: None,
                bbox: Some(state.bbox),
                crs: options.canonical_crs,
                scope: QueryScope::State {
                    code: state.code,
                    fips: state.fips,
                },
            })
        }
        SpatialQuery::SiteList { ids } => Ok(ResolvedGeometry {
            geometry: None,
            bbox: None,
            crs: options.canonical_crs,
            scope: QueryScope::SiteList(ids.clone()),
        }),
    }
}

fn resolve_zip_buffer(
    zip: &str,
    radius_miles: f64,
    gazetteer: &dyn Gazetteer,
    options: &ResolverOptions,
) -> Result<ResolvedGeometry> {
    if !radius_miles.is_finite() || radius_miles <= 0.0 {
        return Err(SpatialError::InvalidGeometry(format!(
            "buffer radius must be a positive number of miles, got {}",
            radius_miles
        )));
    }
    let (lon, lat) = gazetteer.lookup_zip(zip)?;
    let working_crs = Crs::AzimuthalEquidistant {
        lon_0: lon,
        lat_0: lat,
    };
    let radius = working_crs.linear_unit().from_miles(radius_miles)?;
    let ring = buffer_ring(lon, lat, radius)?;
    let buffer = MultiPolygon::new(vec![Polygon::new(ring, vec![])]);
    let geometry = Crs::Wgs84.reproject(&options.canonical_crs, &buffer);
    let bbox = bbox_of(&geometry)?;
    info!(
        "Zip code {} centroid ({:.4}, {:.4}), {} mile buffer spans {:?}",
        zip, lon, lat, radius_miles, bbox
    );
    Ok(ResolvedGeometry {
        geometry: Some(geometry),
        bbox: Some(bbox),
        crs: options.canonical_crs,
        scope: QueryScope::Spatial,
    })
}

/// Circle of `radius_m` metres around (lon, lat), drawn in an azimuthal
/// equidistant projection centred on the point and returned as lon/lat.
fn buffer_ring(lon: f64, lat: f64, radius_m: f64) -> Result<LineString<f64>> {
    let pole_distance = EARTH_MEAN_RADIUS_M * (90.0 - lat.abs()).to_radians();
    if radius_m >= pole_distance {
        return Err(SpatialError::InvalidGeometry(format!(
            "a {:.0} m buffer around ({lon}, {lat}) would enclose a pole",
            radius_m
        )));
    }
    let projection = AzimuthalEquidistantProjection::new(lon, lat);
    let coords: Vec<Coord<f64>> = (0..BUFFER_VERTICES)
        .map(|i| {
            let theta = 2.0 * PI * i as f64 / BUFFER_VERTICES as f64;
            projection.to_geographic(Coord {
                x: radius_m * theta.cos(),
                y: radius_m * theta.sin(),
            })
        })
        .collect();
    let crosses_antimeridian = coords
        .iter()
        .zip(coords.iter().cycle().skip(1))
        .any(|(a, b)| (a.x - b.x).abs() > 180.0);
    if crosses_antimeridian {
        return Err(SpatialError::InvalidGeometry(format!(
            "buffer around ({lon}, {lat}) crosses the antimeridian"
        )));
    }
    Ok(LineString::from(coords))
}

fn resolve_features(
    features: &FeatureSet,
    format: &str,
    options: &ResolverOptions,
) -> Result<ResolvedGeometry> {
    if features.polygons.is_empty() {
        return Err(SpatialError::InvalidGeometry(format!(
            "{} input has no polygon features",
            format
        )));
    }
    let source_crs = match &features.declared_crs {
        Some(declaration) => declaration.to_crs()?,
        None => match options.missing_crs {
            MissingCrsPolicy::AssumeCanonical => {
                warn!(
                    "{} input declares no CRS, assuming {}",
                    format, options.canonical_crs
                );
                options.canonical_crs
            }
            MissingCrsPolicy::Reject => {
                return Err(SpatialError::UnsupportedCrs(format!(
                    "{} input declares no CRS",
                    format
                )))
            }
        },
    };

    let source = MultiPolygon::new(features.polygons.clone());
    let reprojected = source_crs.reproject(&options.canonical_crs, &source);
    if reprojected
        .coords_iter()
        .any(|c| !c.x.is_finite() || !c.y.is_finite())
    {
        return Err(SpatialError::InvalidGeometry(format!(
            "{} coordinates are out of range for {}",
            format, source_crs
        )));
    }

    let mut polygons = reprojected.into_iter();
    let first = polygons
        .next()
        .map(|p| MultiPolygon::new(vec![p]))
        .ok_or_else(|| SpatialError::InvalidGeometry(format!("{} input is empty", format)))?;
    let geometry = polygons.fold(first, |acc, p| acc.union(&MultiPolygon::new(vec![p])));
    if geometry.0.is_empty() {
        return Err(SpatialError::InvalidGeometry(format!(
            "{} polygons have no area",
            format
        )));
    }
    let bbox = bbox_of(&geometry)?;
    info!(
        "Resolved {} {} polygons from {} into {} parts spanning {:?}",
        features.polygons.len(),
        format,
        source_crs,
        geometry.0.len(),
        bbox
    );
    Ok(ResolvedGeometry {
        geometry: Some(geometry),
        bbox: Some(bbox),
        crs: options.canonical_crs,
        scope: QueryScope::Spatial,
    })
}

fn bbox_of(geometry: &MultiPolygon<f64>) -> Result<BoundingBox> {
    BoundingBox::of(geometry)
        .ok_or_else(|| SpatialError::InvalidGeometry("geometry has no coordinates".into()))
}
