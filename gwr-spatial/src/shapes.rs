//! Areal features loaded from GeoJSON and ESRI shapefiles.
//!
//! Loading only extracts polygons and the declared CRS; reprojection and
//! union happen in the resolver. Point and line features are skipped with a
//! warning, a file with no polygon at all is an `InvalidGeometry` error.

use crate::crs::Crs;
use crate::error::{Result, SpatialError};
use geo::{Coord, LineString, Polygon};
use log::{debug, warn};
use serde_json::Value;
use shapefile::{PolygonRing, Reader, Shape};
use std::fs;
use std::path::Path;

/// CRS as declared by an input file, before it is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum CrsDeclaration {
    /// GeoJSON `crs.properties.name`, e.g. `urn:ogc:def:crs:EPSG::3857`
    Name(String),
    /// Shapefile `.prj` contents
    Wkt(String),
}

impl CrsDeclaration {
    pub fn to_crs(&self) -> Result<Crs> {
        match self {
            CrsDeclaration::Name(name) => Crs::parse(name),
            CrsDeclaration::Wkt(wkt) => Crs::from_wkt(wkt),
        }
    }
}

/// Polygons read from one geometry file, in the file's own CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub polygons: Vec<Polygon<f64>>,
    /// `None` when the file does not say which CRS it uses
    pub declared_crs: Option<CrsDeclaration>,
}

impl FeatureSet {
    pub fn new(polygons: Vec<Polygon<f64>>, declared_crs: Option<CrsDeclaration>) -> FeatureSet {
        FeatureSet {
            polygons,
            declared_crs,
        }
    }

    /// Parse a GeoJSON document: a FeatureCollection, a Feature or a bare geometry.
    pub fn from_geojson_str(text: &str) -> Result<FeatureSet> {
        let document: Value = serde_json::from_str(text)?;
        let declared_crs = document
            .get("crs")
            .and_then(|crs| crs.get("properties"))
            .and_then(|props| props.get("name"))
            .and_then(Value::as_str)
            .map(|name| CrsDeclaration::Name(name.to_string()));

        let mut polygons = Vec::new();
        match document.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => {
                let features = document
                    .get("features")
                    .and_then(Value::as_array)
                    .ok_or_else(|| invalid("FeatureCollection without a features array"))?;
                for (i, feature) in features.iter().enumerate() {
                    match feature.get("geometry") {
                        Some(Value::Null) | None => {
                            warn!("Skipping feature {} without geometry", i);
                        }
                        Some(geometry) => collect_geojson_geometry(geometry, &mut polygons)?,
                    }
                }
            }
            Some("Feature") => match document.get("geometry") {
                Some(Value::Null) | None => {}
                Some(geometry) => collect_geojson_geometry(geometry, &mut polygons)?,
            },
            Some(_) => collect_geojson_geometry(&document, &mut polygons)?,
            None => return Err(invalid("GeoJSON object has no type")),
        }

        if polygons.is_empty() {
            return Err(invalid("GeoJSON contains no Polygon or MultiPolygon features"));
        }
        debug!("Read {} polygons from GeoJSON", polygons.len());
        Ok(FeatureSet::new(polygons, declared_crs))
    }

    pub fn from_geojson_path<P: AsRef<Path>>(path: P) -> Result<FeatureSet> {
        let text = fs::read_to_string(path.as_ref())?;
        FeatureSet::from_geojson_str(&text)
    }

    /// Read every polygon of a shapefile and the WKT of its sibling `.prj`, if any.
    pub fn from_shapefile_path<P: AsRef<Path>>(path: P) -> Result<FeatureSet> {
        let path = path.as_ref();
        let mut reader = Reader::from_path(path)?;
        let mut polygons = Vec::new();

        for result in reader.iter_shapes_and_records() {
            let (shape, _record) = result?;
            match shape {
                Shape::NullShape => {}
                Shape::Polygon(polygon) => {
                    assemble_rings(polygon.rings(), |p| Coord { x: p.x, y: p.y }, &mut polygons)?
                }
                Shape::PolygonM(polygon) => {
                    assemble_rings(polygon.rings(), |p| Coord { x: p.x, y: p.y }, &mut polygons)?
                }
                Shape::PolygonZ(polygon) => {
                    assemble_rings(polygon.rings(), |p| Coord { x: p.x, y: p.y }, &mut polygons)?
                }
                other => warn!("Skipping non-polygon shape {:?}", other.shapetype()),
            }
        }

        if polygons.is_empty() {
            return Err(invalid("shapefile contains no polygon shapes"));
        }

        let prj = path.with_extension("prj");
        let declared_crs = if prj.exists() {
            Some(CrsDeclaration::Wkt(fs::read_to_string(&prj)?.trim().to_string()))
        } else {
            None
        };
        debug!("Read {} polygons from {}", polygons.len(), path.display());
        Ok(FeatureSet::new(polygons, declared_crs))
    }
}

fn invalid(reason: &str) -> SpatialError {
    SpatialError::InvalidGeometry(reason.to_string())
}

/// Group shapefile rings into polygons: each outer ring opens a polygon,
/// inner rings are holes of the outer ring before them.
fn assemble_rings<P>(
    rings: &[PolygonRing<P>],
    xy: impl Fn(&P) -> Coord<f64>,
    polygons: &mut Vec<Polygon<f64>>,
) -> Result<()> {
    let mut current: Option<(LineString<f64>, Vec<LineString<f64>>)> = None;
    for ring in rings {
        let coords: Vec<Coord<f64>> = ring.points().iter().map(&xy).collect();
        let line = checked_ring(coords)?;
        match ring {
            PolygonRing::Outer(_) => {
                if let Some((exterior, interiors)) = current.take() {
                    polygons.push(Polygon::new(exterior, interiors));
                }
                current = Some((line, Vec::new()));
            }
            PolygonRing::Inner(_) => match current.as_mut() {
                Some((_, interiors)) => interiors.push(line),
                None => return Err(invalid("shapefile hole ring precedes any outer ring")),
            },
        }
    }
    if let Some((exterior, interiors)) = current {
        polygons.push(Polygon::new(exterior, interiors));
    }
    Ok(())
}

fn collect_geojson_geometry(geometry: &Value, polygons: &mut Vec<Polygon<f64>>) -> Result<()> {
    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("geometry has no type"))?;
    match kind {
        "Polygon" => {
            polygons.push(geojson_polygon(coordinates(geometry)?)?);
        }
        "MultiPolygon" => {
            let parts = coordinates(geometry)?
                .as_array()
                .ok_or_else(|| invalid("MultiPolygon coordinates are not an array"))?;
            for part in parts {
                polygons.push(geojson_polygon(part)?);
            }
        }
        "GeometryCollection" => {
            let members = geometry
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid("GeometryCollection without geometries"))?;
            for member in members {
                collect_geojson_geometry(member, polygons)?;
            }
        }
        "Point" | "MultiPoint" | "LineString" | "MultiLineString" => {
            warn!("Skipping non-areal {} feature", kind);
        }
        other => return Err(invalid(&format!("unknown geometry type {:?}", other))),
    }
    Ok(())
}

fn coordinates(geometry: &Value) -> Result<&Value> {
    geometry
        .get("coordinates")
        .ok_or_else(|| invalid("geometry has no coordinates"))
}

fn geojson_polygon(rings: &Value) -> Result<Polygon<f64>> {
    let rings = rings
        .as_array()
        .ok_or_else(|| invalid("Polygon coordinates are not an array of rings"))?;
    let mut lines = rings
        .iter()
        .map(geojson_ring)
        .collect::<Result<Vec<LineString<f64>>>>()?
        .into_iter();
    let exterior = lines
        .next()
        .ok_or_else(|| invalid("Polygon has no exterior ring"))?;
    Ok(Polygon::new(exterior, lines.collect()))
}

fn geojson_ring(ring: &Value) -> Result<LineString<f64>> {
    let positions = ring
        .as_array()
        .ok_or_else(|| invalid("ring is not an array of positions"))?;
    let coords = positions
        .iter()
        .map(|position| {
            let pair = position.as_array().filter(|p| p.len() >= 2);
            match pair.map(|p| (p[0].as_f64(), p[1].as_f64())) {
                Some((Some(x), Some(y))) => Ok(Coord { x, y }),
                _ => Err(invalid("position is not a [x, y] number pair")),
            }
        })
        .collect::<Result<Vec<Coord<f64>>>>()?;
    checked_ring(coords)
}

/// A ring needs three distinct finite vertices; geo closes it if the file did not.
fn checked_ring(mut coords: Vec<Coord<f64>>) -> Result<LineString<f64>> {
    if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(invalid("ring has a non-finite coordinate"));
    }
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    if coords.len() < 3 {
        return Err(invalid("ring has fewer than three distinct vertices"));
    }
    Ok(LineString::from(coords))
}
