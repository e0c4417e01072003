use crate::error::{Result, SpatialError};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::io;

static ZIP_CENTROIDS_CSV: &str = include_str!("../../fixtures/zip_centroids.csv");

/// Looks up the centroid of a postal code.
pub trait Gazetteer {
    /// Centroid of `zip` as (lon, lat) in WGS84 degrees.
    fn lookup_zip(&self, zip: &str) -> Result<(f64, f64)>;
}

#[derive(Debug, Deserialize)]
struct ZipRow {
    zip: String,
    latitude: f64,
    longitude: f64,
}

/// In-memory gazetteer keyed by normalized 5-digit zip code.
#[derive(Debug, Clone, Default)]
pub struct ZipGazetteer {
    centroids: HashMap<String, (f64, f64)>,
}

impl ZipGazetteer {
    /// Gazetteer of the zip centroids bundled with the crate.
    pub fn embedded() -> Result<ZipGazetteer> {
        ZipGazetteer::from_csv(ZIP_CENTROIDS_CSV.as_bytes())
    }

    /// Read a gazetteer from CSV with `zip`, `latitude` and `longitude` columns.
    pub fn from_csv<R: io::Read>(reader: R) -> Result<ZipGazetteer> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let mut centroids = HashMap::new();
        for row in rdr.deserialize::<ZipRow>() {
            let row = row?;
            if let Some(zip) = normalize_zip(&row.zip) {
                centroids.insert(zip, (row.longitude, row.latitude));
            }
        }
        Ok(ZipGazetteer { centroids })
    }

    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    /// Every zip code in the gazetteer, sorted.
    pub fn zip_codes(&self) -> Vec<String> {
        let mut zips: Vec<String> = self.centroids.keys().cloned().collect();
        zips.sort();
        zips
    }
}

impl Gazetteer for ZipGazetteer {
    fn lookup_zip(&self, zip: &str) -> Result<(f64, f64)> {
        normalize_zip(zip)
            .and_then(|z| self.centroids.get(&z).copied())
            .ok_or_else(|| SpatialError::UnresolvableLocation(format!("zip code {:?}", zip)))
    }
}

/// Normalize a zip code to its 5-digit form.
///
/// Drops a ZIP+4 suffix and restores leading zeros lost to spreadsheets
/// ("501" becomes "00501"). Returns `None` for anything that is not 1-5 digits.
pub fn normalize_zip(zip: &str) -> Option<String> {
    let zip = zip.trim();
    let base = zip.split('-').next().unwrap_or(zip).trim();
    // "60601.0" from a float-typed spreadsheet column
    let base = base.strip_suffix(".0").unwrap_or(base);
    if base.is_empty() || base.len() > 5 || !base.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{:0>5}", base))
}

#[cfg(test)]
mod tests {
    use super::{normalize_zip, Gazetteer, ZipGazetteer};
    use crate::error::SpatialError;

    #[test]
    fn test_normalize_zip() {
        assert_eq!(normalize_zip("60601").as_deref(), Some("60601"));
        assert_eq!(normalize_zip(" 60601-1234 ").as_deref(), Some("60601"));
        assert_eq!(normalize_zip("501").as_deref(), Some("00501"));
        assert_eq!(normalize_zip("60601.0").as_deref(), Some("60601"));
        assert_eq!(normalize_zip("ABCDE"), None);
        assert_eq!(normalize_zip("606011"), None);
        assert_eq!(normalize_zip(""), None);
    }

    #[test]
    fn test_embedded_gazetteer() {
        let gazetteer = ZipGazetteer::embedded().unwrap();
        assert!(gazetteer.len() > 40);
        let (lon, lat) = gazetteer.lookup_zip("60601").unwrap();
        assert!((lon - -87.6181).abs() < 1e-9);
        assert!((lat - 41.8858).abs() < 1e-9);
        assert!(gazetteer.lookup_zip("501").is_ok());
    }

    #[test]
    fn test_unknown_zip() {
        let gazetteer = ZipGazetteer::embedded().unwrap();
        assert!(matches!(
            gazetteer.lookup_zip("99999"),
            Err(SpatialError::UnresolvableLocation(_))
        ));
        assert!(matches!(
            gazetteer.lookup_zip("not-a-zip"),
            Err(SpatialError::UnresolvableLocation(_))
        ));
    }

    #[test]
    fn test_custom_gazetteer() {
        let csv_data = "zip,latitude,longitude\n1234,42.0,-71.0\n";
        let gazetteer = ZipGazetteer::from_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(gazetteer.zip_codes(), vec!["01234".to_string()]);
        assert_eq!(gazetteer.lookup_zip("01234").unwrap(), (-71.0, 42.0));
    }
}
