use crate::error::{Result, SpatialError};
use crate::geometry::{BoundingBox, QueryScope, ResolvedGeometry};
use crate::states::State;
use geo::{Intersects, MultiPolygon, Point};
use gwr_nwis::Site;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;

/// Candidate monitoring sites, as listed by an upstream catalog.
#[derive(Debug, Clone, Default)]
pub struct SiteCatalog {
    sites: Vec<Site>,
    index: HashMap<String, usize>,
}

impl SiteCatalog {
    pub fn new(sites: Vec<Site>) -> SiteCatalog {
        let mut index = HashMap::with_capacity(sites.len());
        for (i, site) in sites.iter().enumerate() {
            index.entry(site.site_id.clone()).or_insert(i);
        }
        SiteCatalog { sites, index }
    }

    /// Load a catalog from site CSV (see `Site::parse_site_csv`).
    pub fn from_csv<R: io::Read>(reader: R) -> Result<SiteCatalog> {
        Ok(SiteCatalog::new(Site::parse_site_csv(reader)?))
    }

    /// All sites, or only those whose state code names `state_code`.
    pub fn all_sites(&self, state_code: Option<&str>) -> Vec<Site> {
        match state_code {
            None => self.sites.clone(),
            Some(code) => {
                let state = State::lookup(code).ok();
                self.sites
                    .iter()
                    .filter(|site| match (&site.state_code, &state) {
                        (Some(site_state), Some(state)) => state.matches(site_state),
                        (Some(site_state), None) => site_state.eq_ignore_ascii_case(code.trim()),
                        (None, _) => false,
                    })
                    .cloned()
                    .collect()
            }
        }
    }

    pub fn get(&self, site_id: &str) -> Option<&Site> {
        self.index.get(site_id).map(|&i| &self.sites[i])
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// Ordered sites selected by a query, without duplicate ids.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SiteSet {
    sites: Vec<Site>,
}

impl SiteSet {
    pub fn ids(&self) -> Vec<String> {
        self.sites.iter().map(|s| s.site_id.clone()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Site> {
        self.sites.iter()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn as_slice(&self) -> &[Site] {
        &self.sites
    }

    pub fn into_vec(self) -> Vec<Site> {
        self.sites
    }
}

impl<'a> IntoIterator for &'a SiteSet {
    type Item = &'a Site;
    type IntoIter = std::slice::Iter<'a, Site>;

    fn into_iter(self) -> Self::IntoIter {
        self.sites.iter()
    }
}

/// Select the sites a resolved query covers.
///
/// Explicit site lists come back verbatim in input order with catalog
/// metadata attached where known. Every other scope keeps catalog sites whose
/// location is inside or on the boundary of the geometry, sorted by site id.
pub fn filter_sites(resolved: &ResolvedGeometry, catalog: &SiteCatalog) -> Result<SiteSet> {
    if let QueryScope::SiteList(ids) = &resolved.scope {
        return explicit_sites(ids, catalog);
    }
    if catalog.is_empty() {
        return Err(SpatialError::EmptyCatalog);
    }

    let mut selected: BTreeMap<&str, &Site> = BTreeMap::new();
    let mut unlocated = 0usize;
    for site in &catalog.sites {
        if let QueryScope::State { code, fips } = &resolved.scope {
            if !in_state(site, code, fips) {
                continue;
            }
        }
        let Some(location) = site.location else {
            unlocated += 1;
            continue;
        };
        if within(
            location.longitude,
            location.latitude,
            resolved.bbox.as_ref(),
            resolved.geometry.as_ref(),
        ) {
            selected.entry(site.site_id.as_str()).or_insert(site);
        }
    }
    if unlocated > 0 {
        debug!("Skipped {} catalog sites without coordinates", unlocated);
    }

    if selected.is_empty() {
        let described = match &resolved.scope {
            QueryScope::State { code, .. } => format!("in state {}", code),
            _ => match &resolved.bbox {
                Some(bbox) => format!("within {:?}", bbox),
                None => "within the query geometry".to_string(),
            },
        };
        return Err(SpatialError::NoSitesFound(described));
    }
    info!(
        "Selected {} of {} catalog sites",
        selected.len(),
        catalog.len()
    );
    Ok(SiteSet {
        sites: selected.into_values().cloned().collect(),
    })
}

fn explicit_sites(ids: &[String], catalog: &SiteCatalog) -> Result<SiteSet> {
    if ids.is_empty() {
        return Err(SpatialError::NoSitesFound("in an empty site list".into()));
    }
    let mut seen = HashSet::with_capacity(ids.len());
    let mut sites = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            warn!("Site {} listed more than once, keeping the first", id);
            continue;
        }
        sites.push(
            catalog
                .get(id)
                .cloned()
                .unwrap_or_else(|| Site::from_id(id.clone())),
        );
    }
    Ok(SiteSet { sites })
}

/// A site whose record names another state is out; one without a state code
/// is left to the bounding box.
fn in_state(site: &Site, code: &str, fips: &str) -> bool {
    match site.state_code.as_deref().map(str::trim) {
        None => true,
        Some(site_state) => {
            site_state.eq_ignore_ascii_case(code)
                || matches!(
                    (site_state.parse::<u32>(), fips.parse::<u32>()),
                    (Ok(a), Ok(b)) if a == b
                )
        }
    }
}

fn within(
    lon: f64,
    lat: f64,
    bbox: Option<&BoundingBox>,
    geometry: Option<&MultiPolygon<f64>>,
) -> bool {
    if let Some(bbox) = bbox {
        if !bbox.contains(lon, lat) {
            return false;
        }
    }
    match geometry {
        Some(geometry) => geometry.intersects(&Point::new(lon, lat)),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::{filter_sites, SiteCatalog};
    use crate::crs::Crs;
    use crate::error::SpatialError;
    use crate::gazetteer::ZipGazetteer;
    use crate::geometry::{BoundingBox, QueryScope, ResolvedGeometry};
    use crate::resolver::{resolve, ResolverOptions, SpatialQuery};
    use crate::shapes::FeatureSet;
    use geo::{polygon, MultiPolygon};
    use gwr_nwis::Site;

    fn catalog() -> SiteCatalog {
        let mut loop_site = Site::at("414501087362001", -87.6200, 41.8800);
        loop_site.state_code = Some("17".into());
        let mut suburb = Site::at("415203087475601", -87.7989, 41.8675);
        suburb.state_code = Some("IL".into());
        let mut indiana = Site::at("413600087310001", -87.5200, 41.6000);
        indiana.state_code = Some("18".into());
        let peoria = Site::at("404200089350001", -89.5890, 40.6936);
        let unlocated = Site::from_id("000000000000001");
        SiteCatalog::new(vec![suburb, loop_site, indiana, peoria, unlocated])
    }

    fn unit_square() -> ResolvedGeometry {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ];
        ResolvedGeometry {
            geometry: Some(MultiPolygon::new(vec![square])),
            bbox: Some(BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
            crs: Crs::Wgs84,
            scope: QueryScope::Spatial,
        }
    }

    #[test]
    fn test_site_list_is_verbatim() {
        let catalog = catalog();
        let gazetteer = ZipGazetteer::default();
        let ids = ["404200089350001", "X-NOT-IN-CATALOG", "414501087362001"];
        let resolved = resolve(
            &SpatialQuery::site_list(ids),
            &gazetteer,
            &ResolverOptions::default(),
        )
        .unwrap();
        let sites = filter_sites(&resolved, &catalog).unwrap();
        assert_eq!(sites.ids(), ids.to_vec());
        assert!(sites.as_slice()[0].location.is_some());
        assert!(sites.as_slice()[1].location.is_none());

        // geometry is ignored for site lists
        let mut with_geometry = unit_square();
        with_geometry.scope = QueryScope::SiteList(ids.iter().map(|s| s.to_string()).collect());
        let sites = filter_sites(&with_geometry, &SiteCatalog::default()).unwrap();
        assert_eq!(sites.ids(), ids.to_vec());
    }

    #[test]
    fn test_site_list_duplicates_and_empty() {
        let mut resolved = unit_square();
        resolved.scope = QueryScope::SiteList(vec!["B".into(), "A".into(), "B".into()]);
        let sites = filter_sites(&resolved, &catalog()).unwrap();
        assert_eq!(sites.ids(), vec!["B".to_string(), "A".to_string()]);

        resolved.scope = QueryScope::SiteList(vec![]);
        assert!(matches!(
            filter_sites(&resolved, &catalog()),
            Err(SpatialError::NoSitesFound(_))
        ));
    }

    #[test]
    fn test_zip_buffer_filter() {
        let gazetteer = ZipGazetteer::embedded().unwrap();
        let resolved = resolve(
            &SpatialQuery::zip_code("60601", 15.0),
            &gazetteer,
            &ResolverOptions::default(),
        )
        .unwrap();
        let sites = filter_sites(&resolved, &catalog()).unwrap();
        // sorted by id; the Indiana line site, Peoria and the unlocated site are out
        assert_eq!(
            sites.ids(),
            vec!["414501087362001".to_string(), "415203087475601".to_string()]
        );
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let catalog = SiteCatalog::new(vec![
            Site::at("edge", 1.0, 0.5),
            Site::at("corner", 0.0, 0.0),
            Site::at("inside", 0.5, 0.5),
            Site::at("outside", 1.0001, 0.5),
        ]);
        let sites = filter_sites(&unit_square(), &catalog).unwrap();
        assert_eq!(
            sites.ids(),
            vec!["corner".to_string(), "edge".to_string(), "inside".to_string()]
        );
    }

    #[test]
    fn test_state_filter() {
        let gazetteer = ZipGazetteer::default();
        let resolved = resolve(
            &SpatialQuery::state("IL"),
            &gazetteer,
            &ResolverOptions::default(),
        )
        .unwrap();
        let sites = filter_sites(&resolved, &catalog()).unwrap();
        // Indiana's site is excluded by code even though it is inside the IL box;
        // Peoria has no state code and is kept by the box
        assert_eq!(
            sites.ids(),
            vec![
                "404200089350001".to_string(),
                "414501087362001".to_string(),
                "415203087475601".to_string()
            ]
        );
    }

    #[test]
    fn test_geojson_features_are_unioned() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]] } },
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "Polygon", "coordinates": [[[1,1],[3,1],[3,3],[1,3],[1,1]]] } },
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "Polygon", "coordinates": [[[10,10],[11,10],[11,11],[10,11],[10,10]]] } }
            ]
        }"#;
        let features = FeatureSet::from_geojson_str(text).unwrap();
        let resolved = resolve(
            &SpatialQuery::GeoJsonShape { geometry: features },
            &ZipGazetteer::default(),
            &ResolverOptions::default(),
        )
        .unwrap();
        let catalog = SiteCatalog::new(vec![
            Site::at("first-only", 0.5, 0.5),
            Site::at("overlap", 1.5, 1.5),
            Site::at("second-only", 2.5, 2.5),
            Site::at("notch", 2.5, 0.5),
            Site::at("island", 10.5, 10.5),
            Site::at("gap", 6.0, 6.0),
        ]);
        let sites = filter_sites(&resolved, &catalog).unwrap();
        assert_eq!(
            sites.ids(),
            vec![
                "first-only".to_string(),
                "island".to_string(),
                "overlap".to_string(),
                "second-only".to_string(),
            ]
        );
    }

    #[test]
    fn test_alaska_keeps_aleutian_sites() {
        let resolved = resolve(
            &SpatialQuery::state("AK"),
            &ZipGazetteer::default(),
            &ResolverOptions::default(),
        )
        .unwrap();
        let alaska = |id: &str, lon: f64, lat: f64| Site {
            state_code: Some("02".into()),
            ..Site::at(id, lon, lat)
        };
        let catalog = SiteCatalog::new(vec![
            alaska("anchorage", -149.88, 61.22),
            alaska("attu", 173.2, 52.9),
            alaska("adak", -176.65, 51.88),
            alaska("miscoded", 10.0, 60.0),
        ]);
        let sites = filter_sites(&resolved, &catalog).unwrap();
        assert_eq!(
            sites.ids(),
            vec!["adak".to_string(), "anchorage".to_string(), "attu".to_string()]
        );
    }

    #[test]
    fn test_no_sites_and_empty_catalog() {
        assert!(matches!(
            filter_sites(&unit_square(), &catalog()),
            Err(SpatialError::NoSitesFound(_))
        ));
        assert!(matches!(
            filter_sites(&unit_square(), &SiteCatalog::default()),
            Err(SpatialError::EmptyCatalog)
        ));
    }

    #[test]
    fn test_catalog_all_sites_by_state() {
        let catalog = catalog();
        assert_eq!(catalog.all_sites(None).len(), 5);
        let illinois = catalog.all_sites(Some("il"));
        assert_eq!(illinois.len(), 2);
        assert_eq!(catalog.all_sites(Some("18")).len(), 1);
        assert!(catalog.get("404200089350001").is_some());
    }

    #[test]
    fn test_catalog_from_csv() {
        let csv_data = "site_no,station_nm,dec_lat_va,dec_long_va,state_cd\nA,Well A,0.5,0.5,IL\n";
        let catalog = SiteCatalog::from_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 1);
        let sites = filter_sites(&unit_square(), &catalog).unwrap();
        assert_eq!(sites.as_slice()[0].name.as_deref(), Some("Well A"));
    }
}
