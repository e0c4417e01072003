//! Coordinate reference systems and the projections between them.
//!
//! Every CRS knows how to carry a coordinate to and from geographic WGS84
//! (lon/lat degrees). Reprojecting between two CRSs goes through WGS84.
//!
//! # Supported systems
//!
//! - **Wgs84** (EPSG:4326, OGC CRS84) and **Nad83** (EPSG:4269): geographic.
//!   NAD83 and WGS84 differ by about a metre in the conterminous U.S., which
//!   is below the precision of site coordinates, so they convert as identity.
//! - **WebMercator** (EPSG:3857)
//! - **Utm** zones on WGS84 (EPSG:326xx north, 327xx south) and NAD83 (EPSG:269xx)
//! - **AzimuthalEquidistant**: working CRS for distance buffers, centred on a point

use crate::error::{Result, SpatialError};
use geo::{Coord, MapCoords, MultiPolygon};
use std::f64::consts::PI;
use std::fmt;

/// Mean Earth radius in metres, used by the spherical projections.
pub const EARTH_MEAN_RADIUS_M: f64 = 6_371_008.8;

/// Metres in one international mile.
pub const METERS_PER_MILE: f64 = 1_609.344;

/// Unit of a CRS's coordinate axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearUnit {
    Degrees,
    Meters,
}

impl LinearUnit {
    /// Convert a distance in miles into this unit.
    ///
    /// Angular units have no fixed length, so buffering in them is refused
    /// rather than approximated.
    pub fn from_miles(&self, miles: f64) -> Result<f64> {
        match self {
            LinearUnit::Meters => Ok(miles * METERS_PER_MILE),
            LinearUnit::Degrees => Err(SpatialError::InvalidGeometry(
                "cannot express a linear distance in degrees; buffer in a projected CRS".into(),
            )),
        }
    }
}

/// Geodetic datum of a UTM zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datum {
    Wgs84,
    Nad83,
}

/// A coordinate reference system this crate can reproject.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Crs {
    Wgs84,
    Nad83,
    WebMercator,
    Utm { zone: u8, north: bool, datum: Datum },
    AzimuthalEquidistant { lon_0: f64, lat_0: f64 },
}

impl Crs {
    /// Look up a CRS by EPSG code.
    pub fn from_epsg(code: u32) -> Option<Crs> {
        match code {
            4326 => Some(Crs::Wgs84),
            4269 => Some(Crs::Nad83),
            3857 | 900913 | 3785 | 102100 => Some(Crs::WebMercator),
            32601..=32660 => Some(Crs::Utm {
                zone: (code - 32600) as u8,
                north: true,
                datum: Datum::Wgs84,
            }),
            32701..=32760 => Some(Crs::Utm {
                zone: (code - 32700) as u8,
                north: false,
                datum: Datum::Wgs84,
            }),
            26901..=26923 => Some(Crs::Utm {
                zone: (code - 26900) as u8,
                north: true,
                datum: Datum::Nad83,
            }),
            _ => None,
        }
    }

    /// EPSG code, when the CRS has one.
    pub fn epsg(&self) -> Option<u32> {
        match self {
            Crs::Wgs84 => Some(4326),
            Crs::Nad83 => Some(4269),
            Crs::WebMercator => Some(3857),
            Crs::Utm {
                zone,
                north: true,
                datum: Datum::Wgs84,
            } => Some(32600 + *zone as u32),
            Crs::Utm {
                zone,
                north: false,
                datum: Datum::Wgs84,
            } => Some(32700 + *zone as u32),
            Crs::Utm {
                zone,
                north: true,
                datum: Datum::Nad83,
            } => Some(26900 + *zone as u32),
            Crs::Utm { .. } | Crs::AzimuthalEquidistant { .. } => None,
        }
    }

    /// Parse a CRS identifier such as `EPSG:4326`, `urn:ogc:def:crs:EPSG::3857`
    /// or `urn:ogc:def:crs:OGC:1.3:CRS84`.
    pub fn parse(identifier: &str) -> Result<Crs> {
        let id = identifier.trim();
        let upper = id.to_uppercase();
        if upper.ends_with("CRS84") || upper.ends_with("CRS:84") {
            return Ok(Crs::Wgs84);
        }
        if upper.contains("EPSG") {
            if let Some(code) = upper
                .rsplit(':')
                .find(|part| !part.is_empty())
                .and_then(|part| part.trim().parse::<u32>().ok())
            {
                return Crs::from_epsg(code).ok_or_else(|| {
                    SpatialError::UnsupportedCrs(format!("EPSG:{code} ({id})"))
                });
            }
        }
        Err(SpatialError::UnsupportedCrs(id.to_string()))
    }

    /// Recognise a CRS from the WKT of a shapefile `.prj`.
    pub fn from_wkt(wkt: &str) -> Result<Crs> {
        if let Some(code) = outer_authority_code(wkt) {
            if let Some(crs) = Crs::from_epsg(code) {
                return Ok(crs);
            }
        }
        let normalized = wkt.to_uppercase().replace([' ', '-'], "_");
        let is_nad83 =
            normalized.contains("NAD83") || normalized.contains("NORTH_AMERICAN_DATUM_1983") || normalized.contains("NORTH_AMERICAN_1983");
        if normalized.starts_with("PROJCS") {
            if normalized.contains("WEB_MERCATOR")
                || normalized.contains("MERCATOR_AUXILIARY_SPHERE")
                || normalized.contains("PSEUDO_MERCATOR")
            {
                return Ok(Crs::WebMercator);
            }
            if let Some((zone, north)) = utm_zone(&normalized) {
                let datum = if is_nad83 { Datum::Nad83 } else { Datum::Wgs84 };
                return Ok(Crs::Utm { zone, north, datum });
            }
        } else if normalized.starts_with("GEOGCS") {
            if normalized.contains("WGS_1984") || normalized.contains("WGS_84") || normalized.contains("WGS84") {
                return Ok(Crs::Wgs84);
            }
            if is_nad83 {
                return Ok(Crs::Nad83);
            }
        }
        let head: String = wkt.chars().take(80).collect();
        Err(SpatialError::UnsupportedCrs(head))
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Wgs84 | Crs::Nad83)
    }

    pub fn linear_unit(&self) -> LinearUnit {
        if self.is_geographic() {
            LinearUnit::Degrees
        } else {
            LinearUnit::Meters
        }
    }

    /// Carry a coordinate of this CRS to WGS84 lon/lat.
    pub fn to_wgs84(&self, c: Coord<f64>) -> Coord<f64> {
        match self {
            Crs::Wgs84 | Crs::Nad83 => c,
            Crs::WebMercator => WebMercatorProjection.to_geographic(c),
            Crs::Utm { zone, north, .. } => UtmProjection::new(*zone, *north).to_geographic(c),
            Crs::AzimuthalEquidistant { lon_0, lat_0 } => {
                AzimuthalEquidistantProjection::new(*lon_0, *lat_0).to_geographic(c)
            }
        }
    }

    /// Carry a WGS84 lon/lat coordinate into this CRS.
    pub fn from_wgs84(&self, c: Coord<f64>) -> Coord<f64> {
        match self {
            Crs::Wgs84 | Crs::Nad83 => c,
            Crs::WebMercator => WebMercatorProjection.to_projected(c),
            Crs::Utm { zone, north, .. } => UtmProjection::new(*zone, *north).to_projected(c),
            Crs::AzimuthalEquidistant { lon_0, lat_0 } => {
                AzimuthalEquidistantProjection::new(*lon_0, *lat_0).to_projected(c)
            }
        }
    }

    /// Transform a coordinate from this CRS into `target`.
    pub fn transform(&self, target: &Crs, c: Coord<f64>) -> Coord<f64> {
        if self == target {
            return c;
        }
        target.from_wgs84(self.to_wgs84(c))
    }

    /// Reproject a multi-polygon from this CRS into `target`.
    pub fn reproject(&self, target: &Crs, geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        if self == target {
            return geometry.clone();
        }
        geometry.map_coords(|c| self.transform(target, c))
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.epsg()) {
            (_, Some(code)) => write!(f, "EPSG:{code}"),
            (Crs::AzimuthalEquidistant { lon_0, lat_0 }, None) => {
                write!(f, "AEQD({lon_0:.4}, {lat_0:.4})")
            }
            (Crs::Utm { zone, north, .. }, None) => {
                write!(f, "UTM {zone}{}", if *north { 'N' } else { 'S' })
            }
            _ => write!(f, "{self:?}"),
        }
    }
}

/// EPSG code of the `AUTHORITY["EPSG","nnnn"]` that belongs to the root node.
///
/// Authorities of nested nodes (the GEOGCS inside a PROJCS, a DATUM) are
/// ignored, so a PROJCS without its own authority yields `None`.
fn outer_authority_code(wkt: &str) -> Option<u32> {
    const KEY: &str = "AUTHORITY[\"EPSG\"";
    let upper = wkt.to_uppercase();
    let mut depth = 0usize;
    let mut in_quotes = false;
    for (i, ch) in upper.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '[' | '(' if !in_quotes => depth += 1,
            ']' | ')' if !in_quotes => depth = depth.saturating_sub(1),
            'A' if !in_quotes && depth == 1 && upper[i..].starts_with(KEY) => {
                return upper[i..]
                    .split('"')
                    .nth(3)
                    .and_then(|code| code.trim().parse().ok());
            }
            _ => {}
        }
    }
    None
}

/// Zone number and hemisphere from names like `UTM_Zone_16N` or `UTM zone 16N`.
fn utm_zone(normalized_wkt: &str) -> Option<(u8, bool)> {
    let start = normalized_wkt.find("UTM_ZONE_")? + "UTM_ZONE_".len();
    let rest = &normalized_wkt[start..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let zone: u8 = digits.parse().ok()?;
    if !(1..=60).contains(&zone) {
        return None;
    }
    let north = !matches!(rest[digits.len()..].chars().next(), Some('S'));
    Some((zone, north))
}

/// Trait for coordinate projections between geographic lon/lat and planar metres.
pub trait CoordinateProjection {
    /// Convert geographic coordinates (x = lon, y = lat) to projected (x, y) in metres.
    fn to_projected(&self, c: Coord<f64>) -> Coord<f64>;

    /// Convert projected coordinates back to geographic (x = lon, y = lat).
    fn to_geographic(&self, c: Coord<f64>) -> Coord<f64>;
}

/// Spherical ("pseudo") Mercator used by web maps.
#[derive(Debug, Clone, Copy)]
pub struct WebMercatorProjection;

impl WebMercatorProjection {
    /// WGS84 equatorial radius in meters
    const A: f64 = 6_378_137.0;
}

impl CoordinateProjection for WebMercatorProjection {
    fn to_projected(&self, c: Coord<f64>) -> Coord<f64> {
        let lon = c.x.to_radians();
        let lat = c.y.to_radians();
        Coord {
            x: Self::A * lon,
            y: Self::A * (PI / 4.0 + lat / 2.0).tan().ln(),
        }
    }

    fn to_geographic(&self, c: Coord<f64>) -> Coord<f64> {
        Coord {
            x: (c.x / Self::A).to_degrees(),
            y: (2.0 * (c.y / Self::A).exp().atan() - PI / 2.0).to_degrees(),
        }
    }
}

/// Azimuthal equidistant projection on a sphere.
///
/// Distances and bearings from the centre are true, so a circle of radius r
/// metres around the centre is a geodesic circle of radius r on the ground.
#[derive(Debug, Clone, Copy)]
pub struct AzimuthalEquidistantProjection {
    lon_0: f64,
    lat_0: f64,
    sin_lat_0: f64,
    cos_lat_0: f64,
}

impl AzimuthalEquidistantProjection {
    pub fn new(lon_0: f64, lat_0: f64) -> Self {
        let lat_rad = lat_0.to_radians();
        Self {
            lon_0,
            lat_0,
            sin_lat_0: lat_rad.sin(),
            cos_lat_0: lat_rad.cos(),
        }
    }

    pub fn center(&self) -> Coord<f64> {
        Coord {
            x: self.lon_0,
            y: self.lat_0,
        }
    }
}

impl CoordinateProjection for AzimuthalEquidistantProjection {
    fn to_projected(&self, c: Coord<f64>) -> Coord<f64> {
        let lat = c.y.to_radians();
        let d_lon = (c.x - self.lon_0).to_radians();
        let cos_c = (self.sin_lat_0 * lat.sin() + self.cos_lat_0 * lat.cos() * d_lon.cos())
            .clamp(-1.0, 1.0);
        let angle = cos_c.acos();
        let k = if angle.abs() < 1e-12 {
            1.0
        } else {
            angle / angle.sin()
        };
        Coord {
            x: EARTH_MEAN_RADIUS_M * k * lat.cos() * d_lon.sin(),
            y: EARTH_MEAN_RADIUS_M
                * k
                * (self.cos_lat_0 * lat.sin() - self.sin_lat_0 * lat.cos() * d_lon.cos()),
        }
    }

    fn to_geographic(&self, c: Coord<f64>) -> Coord<f64> {
        let rho = (c.x * c.x + c.y * c.y).sqrt();
        if rho < 1e-9 {
            return self.center();
        }
        let angle = rho / EARTH_MEAN_RADIUS_M;
        let (sin_c, cos_c) = angle.sin_cos();
        let lat = (cos_c * self.sin_lat_0 + c.y * sin_c * self.cos_lat_0 / rho)
            .clamp(-1.0, 1.0)
            .asin();
        let lon = self.lon_0.to_radians()
            + (c.x * sin_c).atan2(rho * self.cos_lat_0 * cos_c - c.y * self.sin_lat_0 * sin_c);
        Coord {
            x: normalize_longitude(lon.to_degrees()),
            y: lat.to_degrees(),
        }
    }
}

fn normalize_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// UTM projection for a specific zone.
///
/// Universal Transverse Mercator on the WGS84 ellipsoid (GRS80 for NAD83
/// zones differs only in the ninth significant digit of the flattening).
#[derive(Debug, Clone, Copy)]
pub struct UtmProjection {
    /// Central meridian in degrees
    central_meridian: f64,
    /// Scale factor at central meridian (0.9996 for UTM)
    scale_factor: f64,
    /// False easting in meters (500,000 for UTM)
    false_easting: f64,
    /// False northing in meters (0 for northern hemisphere, 10,000,000 for southern)
    false_northing: f64,
}

impl UtmProjection {
    /// WGS84 equatorial radius in meters
    const A: f64 = 6_378_137.0;
    /// WGS84 flattening
    const F: f64 = 1.0 / 298.257_223_563;

    /// Create a UTM projection for a given zone (1-60) and hemisphere.
    pub fn new(zone: u8, northern: bool) -> Self {
        let zone = zone.clamp(1, 60);
        let central_meridian = (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0;

        Self {
            central_meridian,
            scale_factor: 0.9996,
            false_easting: 500_000.0,
            false_northing: if northern { 0.0 } else { 10_000_000.0 },
        }
    }
}

impl CoordinateProjection for UtmProjection {
    fn to_projected(&self, c: Coord<f64>) -> Coord<f64> {
        let lat_rad = c.y.to_radians();
        let lon_rad = c.x.to_radians();
        let lon0_rad = self.central_meridian.to_radians();

        let e2 = 2.0 * Self::F - Self::F * Self::F;
        let e_prime2 = e2 / (1.0 - e2);

        let n = Self::A / (1.0 - e2 * lat_rad.sin().powi(2)).sqrt();
        let t = lat_rad.tan().powi(2);
        let cc = e_prime2 * lat_rad.cos().powi(2);
        let a_coef = (lon_rad - lon0_rad) * lat_rad.cos();

        // Meridian arc length
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let m = Self::A
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat_rad
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat_rad).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat_rad).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * lat_rad).sin());

        let x = self.scale_factor
            * n
            * (a_coef
                + (1.0 - t + cc) * a_coef.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * cc - 58.0 * e_prime2) * a_coef.powi(5)
                    / 120.0)
            + self.false_easting;

        let y = self.scale_factor
            * (m + n
                * lat_rad.tan()
                * (a_coef.powi(2) / 2.0
                    + (5.0 - t + 9.0 * cc + 4.0 * cc * cc) * a_coef.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * cc - 330.0 * e_prime2)
                        * a_coef.powi(6)
                        / 720.0))
            + self.false_northing;

        Coord { x, y }
    }

    fn to_geographic(&self, c: Coord<f64>) -> Coord<f64> {
        let x = c.x - self.false_easting;
        let y = c.y - self.false_northing;

        let e2 = 2.0 * Self::F - Self::F * Self::F;
        let e_prime2 = e2 / (1.0 - e2);
        let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

        let m = y / self.scale_factor;
        let mu = m / (Self::A * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0));

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let n1 = Self::A / (1.0 - e2 * phi1.sin().powi(2)).sqrt();
        let t1 = phi1.tan().powi(2);
        let c1 = e_prime2 * phi1.cos().powi(2);
        let r1 = Self::A * (1.0 - e2) / (1.0 - e2 * phi1.sin().powi(2)).powf(1.5);
        let d = x / (n1 * self.scale_factor);

        let lat = phi1
            - (n1 * phi1.tan() / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * e_prime2) * d.powi(4)
                        / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                        - 252.0 * e_prime2
                        - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);

        let lon = self.central_meridian.to_radians()
            + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * e_prime2 + 24.0 * t1 * t1)
                    * d.powi(5)
                    / 120.0)
                / phi1.cos();

        Coord {
            x: lon.to_degrees(),
            y: lat.to_degrees(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-6;

    fn assert_close(a: Coord<f64>, b: Coord<f64>, tol: f64) {
        assert!(
            (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol,
            "{a:?} != {b:?} (tol {tol})"
        );
    }

    #[test]
    fn test_parse_identifiers() {
        assert_eq!(Crs::parse("EPSG:4326").unwrap(), Crs::Wgs84);
        assert_eq!(Crs::parse("urn:ogc:def:crs:OGC:1.3:CRS84").unwrap(), Crs::Wgs84);
        assert_eq!(Crs::parse("urn:ogc:def:crs:EPSG::3857").unwrap(), Crs::WebMercator);
        assert_eq!(Crs::parse("urn:ogc:def:crs:EPSG:6.6:4269").unwrap(), Crs::Nad83);
        assert_eq!(
            Crs::parse("EPSG:32616").unwrap(),
            Crs::Utm {
                zone: 16,
                north: true,
                datum: Datum::Wgs84
            }
        );
        assert!(matches!(
            Crs::parse("EPSG:27700"),
            Err(SpatialError::UnsupportedCrs(_))
        ));
        assert!(Crs::parse("LOCAL_CS").is_err());
    }

    #[test]
    fn test_from_wkt() {
        let wgs84 = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
        assert_eq!(Crs::from_wkt(wgs84).unwrap(), Crs::Wgs84);

        let nad83 = r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
        assert_eq!(Crs::from_wkt(nad83).unwrap(), Crs::Nad83);

        let utm = r#"PROJCS["NAD_1983_UTM_Zone_16N",GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]]],PROJECTION["Transverse_Mercator"],UNIT["Meter",1.0]]"#;
        assert_eq!(
            Crs::from_wkt(utm).unwrap(),
            Crs::Utm {
                zone: 16,
                north: true,
                datum: Datum::Nad83
            }
        );

        let mercator = r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]]],PROJECTION["Mercator_Auxiliary_Sphere"]]"#;
        assert_eq!(Crs::from_wkt(mercator).unwrap(), Crs::WebMercator);

        let with_authority = r#"PROJCS["WGS 84 / UTM zone 10N",GEOGCS["WGS 84",AUTHORITY["EPSG","4326"]],AUTHORITY["EPSG","32610"]]"#;
        assert_eq!(
            Crs::from_wkt(with_authority).unwrap(),
            Crs::Utm {
                zone: 10,
                north: true,
                datum: Datum::Wgs84
            }
        );

        // only the GEOGCS carries an authority
        let nested_authority = r#"PROJCS["WGS 84 / UTM zone 16N",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4326"]],PROJECTION["Transverse_Mercator"],PARAMETER["central_meridian",-87],UNIT["metre",1]]"#;
        assert_eq!(
            Crs::from_wkt(nested_authority).unwrap(),
            Crs::Utm {
                zone: 16,
                north: true,
                datum: Datum::Wgs84
            }
        );
        let geographic = r#"GEOGCS["NAD83",DATUM["North_American_Datum_1983",AUTHORITY["EPSG","6269"]],AUTHORITY["EPSG","4269"]]"#;
        assert_eq!(Crs::from_wkt(geographic).unwrap(), Crs::Nad83);

        let nad27 = r#"GEOGCS["GCS_North_American_1927",DATUM["D_North_American_1927"]]"#;
        assert!(Crs::from_wkt(nad27).is_err());
    }

    #[test]
    fn test_web_mercator_roundtrip() {
        let chicago = Coord {
            x: -87.6298,
            y: 41.8781,
        };
        let projected = Crs::WebMercator.from_wgs84(chicago);
        assert!((projected.x - -9_754_904.0).abs() < 100.0, "{projected:?}");
        assert_close(Crs::WebMercator.to_wgs84(projected), chicago, TOL);
    }

    #[test]
    fn test_utm_roundtrip() {
        let crs = Crs::Utm {
            zone: 16,
            north: true,
            datum: Datum::Wgs84,
        };
        let chicago = Coord {
            x: -87.6298,
            y: 41.8781,
        };
        let projected = crs.from_wgs84(chicago);
        // Chicago sits ~448 km east of the zone 16 false origin
        assert!((projected.x - 448_000.0).abs() < 2_000.0, "{projected:?}");
        assert!((projected.y - 4_636_000.0).abs() < 5_000.0, "{projected:?}");
        assert_close(crs.to_wgs84(projected), chicago, 1e-5);
    }

    #[test]
    fn test_azimuthal_equidistant_preserves_distance() {
        let proj = AzimuthalEquidistantProjection::new(-87.6298, 41.8781);
        let east = proj.to_geographic(Coord {
            x: 100_000.0,
            y: 0.0,
        });
        let back = proj.to_projected(east);
        assert_close(
            back,
            Coord {
                x: 100_000.0,
                y: 0.0,
            },
            1e-3,
        );
        let north = proj.to_geographic(Coord {
            x: 0.0,
            y: 111_195.0,
        });
        // one degree of arc on the mean sphere
        assert!((north.y - 42.8781).abs() < 1e-3, "{north:?}");
        assert_close(proj.to_geographic(Coord { x: 0.0, y: 0.0 }), proj.center(), TOL);
    }

    #[test]
    fn test_linear_units() {
        assert_eq!(Crs::Wgs84.linear_unit(), LinearUnit::Degrees);
        assert_eq!(Crs::WebMercator.linear_unit(), LinearUnit::Meters);
        assert!((LinearUnit::Meters.from_miles(1.0).unwrap() - 1609.344).abs() < 1e-9);
        assert!(LinearUnit::Degrees.from_miles(1.0).is_err());
    }
}
