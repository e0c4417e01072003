//! Resolve a spatial query and select the monitoring sites it covers.

use crate::config::{PipelineConfig, SAMPLE_GAZETTEER_HINT};
use crate::export;
use anyhow::Context;
use clap::Args;
use gwr_nwis::client::NwisClient;
use gwr_nwis::Site;
use gwr_spatial::{
    filter_sites, resolve, FeatureSet, MissingCrsPolicy, QueryScope, ResolvedGeometry, SiteCatalog,
    SiteSet, SpatialError, SpatialQuery,
};
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Exactly one spatial input per run.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct SpatialInput {
    /// Zip code whose centroid is buffered by the search radius. Without a
    /// `gazetteer` CSV in the config file only a bundled sample of about 50
    /// zip codes resolves.
    #[arg(long)]
    pub zip: Option<String>,

    /// GeoJSON file with polygon features
    #[arg(long)]
    pub geojson: Option<PathBuf>,

    /// ESRI shapefile (.shp) with polygon features
    #[arg(long)]
    pub shapefile: Option<PathBuf>,

    /// Two-letter state code or FIPS code
    #[arg(long)]
    pub state: Option<String>,

    /// Comma-separated NWIS site numbers, used as given
    #[arg(long, value_delimiter = ',')]
    pub sites: Vec<String>,

    /// CSV with a site_no column, used as given
    #[arg(long)]
    pub sites_file: Option<PathBuf>,
}

/// Options shared by every command that selects sites.
#[derive(Args, Debug, Clone, Default)]
pub struct QueryOptions {
    /// Search radius around a zip code, in miles
    #[arg(long)]
    pub radius_miles: Option<f64>,

    /// What to do with a geometry file that declares no CRS
    #[arg(long)]
    pub missing_crs: Option<MissingCrsPolicy>,

    /// Site catalog CSV to filter instead of querying NWIS
    #[arg(long)]
    pub catalog: Option<PathBuf>,
}

impl SpatialInput {
    pub fn to_query(&self, radius_miles: f64) -> anyhow::Result<SpatialQuery> {
        if let Some(zip) = &self.zip {
            return Ok(SpatialQuery::zip_code(zip.as_str(), radius_miles));
        }
        if let Some(path) = &self.geojson {
            let geometry = FeatureSet::from_geojson_path(path)
                .with_context(|| format!("reading {}", path.display()))?;
            return Ok(SpatialQuery::GeoJsonShape { geometry });
        }
        if let Some(path) = &self.shapefile {
            let geometry = FeatureSet::from_shapefile_path(path)
                .with_context(|| format!("reading {}", path.display()))?;
            return Ok(SpatialQuery::ShapefileShape { geometry });
        }
        if let Some(code) = &self.state {
            return Ok(SpatialQuery::state(code.as_str()));
        }
        if let Some(path) = &self.sites_file {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            let ids = Site::parse_site_csv(file)?.into_iter().map(|site| site.site_id);
            return Ok(SpatialQuery::site_list(ids));
        }
        Ok(SpatialQuery::site_list(self.sites.iter().cloned()))
    }
}

/// Catalog the resolved geometry is filtered against.
///
/// A catalog file wins; otherwise NWIS is asked for the sites of the state or
/// the geometry's bounding box. Site lists need no catalog.
pub async fn load_catalog(
    resolved: &ResolvedGeometry,
    catalog_path: Option<&Path>,
) -> anyhow::Result<SiteCatalog> {
    if let Some(path) = catalog_path {
        let file = File::open(path).with_context(|| format!("opening catalog {}", path.display()))?;
        let catalog = SiteCatalog::from_csv(file)?;
        info!("Loaded {} sites from {}", catalog.len(), path.display());
        return Ok(catalog);
    }
    let sites = match (&resolved.scope, &resolved.bbox) {
        (QueryScope::SiteList(_), _) => Vec::new(),
        (QueryScope::State { code, .. }, _) => NwisClient::new()?.all_sites(Some(code.as_str())).await?,
        (QueryScope::Spatial, Some(bbox)) => NwisClient::new()?.sites_in_bbox(bbox.as_tuple()).await?,
        (QueryScope::Spatial, None) => anyhow::bail!("spatial query resolved without a bounding box"),
    };
    Ok(SiteCatalog::new(sites))
}

/// Resolve `query` and filter the catalog it calls for.
pub async fn select_sites(
    query: &SpatialQuery,
    options: &QueryOptions,
    config: &PipelineConfig,
) -> anyhow::Result<SiteSet> {
    let gazetteer = config.gazetteer()?;
    let resolved = match resolve(
        query,
        &gazetteer,
        &config.resolver_options(options.missing_crs),
    ) {
        Err(e @ SpatialError::UnresolvableLocation(_))
            if matches!(query, SpatialQuery::ZipCodeBuffer { .. })
                && config.uses_sample_gazetteer() =>
        {
            return Err(anyhow::Error::new(e).context(SAMPLE_GAZETTEER_HINT));
        }
        resolved => resolved?,
    };
    let catalog = load_catalog(&resolved, options.catalog.as_deref()).await?;
    Ok(filter_sites(&resolved, &catalog)?)
}

pub async fn run_sites(
    input: &SpatialInput,
    options: &QueryOptions,
    output: Option<&Path>,
    sites_geojson: Option<&Path>,
    config: &PipelineConfig,
) -> anyhow::Result<()> {
    let query = input.to_query(options.radius_miles.unwrap_or(config.radius_miles))?;
    let sites = select_sites(&query, options, config).await?;
    info!("{} sites selected", sites.len());

    Site::write_site_csv(export::output(output)?, sites.as_slice())?;
    if let Some(path) = sites_geojson {
        export::write_sites_geojson(File::create(path)?, sites.as_slice(), None)?;
        info!("Wrote site points to {}", path.display());
    }
    Ok(())
}
