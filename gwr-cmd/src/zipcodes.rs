//! Batch site selection for a list of zip codes.
//!
//! Each zip code is buffered and filtered on its own, and every selected
//! site is tagged with the zip code that selected it. A site near several
//! zip codes appears once per zip code, and so do its observations when
//! levels are fetched for the zip codes.

use crate::config::{PipelineConfig, SAMPLE_GAZETTEER_HINT};
use crate::export;
use crate::fetch::fetch_observations;
use crate::sites::{load_catalog, QueryOptions};
use anyhow::Context;
use gwr_nwis::{DataSource, Observation, Site};
use gwr_spatial::gazetteer::normalize_zip;
use gwr_spatial::{filter_sites, resolve, SiteCatalog, SpatialError, SpatialQuery};
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Column name of the zip code tag in the output.
pub const SOURCE_ZIPCODE: &str = "source_zipcode";

/// File name prefix of the per-zip observation files.
const PER_ZIP_PREFIX: &str = "gw_data";

/// Read one column of zip codes from a CSV with headers.
///
/// Values are normalized to 5 digits; blank cells are skipped and values
/// that are not zip codes are kept as given so the lookup reports them.
pub fn read_zip_column<R: io::Read>(reader: R, column: &str) -> anyhow::Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let index = rdr
        .headers()?
        .iter()
        .position(|h| h.eq_ignore_ascii_case(column))
        .with_context(|| format!("no {:?} column in zip code file", column))?;

    let mut zips = Vec::new();
    for record in rdr.records() {
        let record = record?;
        match record.get(index).map(str::trim) {
            None | Some("") => continue,
            Some(value) => zips.push(normalize_zip(value).unwrap_or_else(|| value.to_string())),
        }
    }
    Ok(zips)
}

/// Sites within `radius_miles` of each zip code, tagged with that zip code.
///
/// Unknown zip codes and zip codes without sites are logged and skipped.
pub async fn sites_for_zips(
    zips: &[String],
    radius_miles: f64,
    options: &QueryOptions,
    config: &PipelineConfig,
) -> anyhow::Result<Vec<(Site, String)>> {
    let gazetteer = config.gazetteer()?;
    let resolver_options = config.resolver_options(options.missing_crs);
    // a catalog file is shared by every zip code; NWIS is asked per buffer
    let shared_catalog = match &options.catalog {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("opening catalog {}", path.display()))?;
            Some(SiteCatalog::from_csv(file)?)
        }
        None => None,
    };

    let mut tagged = Vec::new();
    let mut unknown = 0usize;
    for zip in zips {
        let resolved = match resolve(
            &SpatialQuery::zip_code(zip.as_str(), radius_miles),
            &gazetteer,
            &resolver_options,
        ) {
            Ok(resolved) => resolved,
            Err(SpatialError::UnresolvableLocation(what)) => {
                warn!("Skipping {}: not in the gazetteer", what);
                unknown += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let fetched;
        let catalog = match &shared_catalog {
            Some(catalog) => catalog,
            None => {
                fetched = load_catalog(&resolved, None).await?;
                &fetched
            }
        };
        match filter_sites(&resolved, catalog) {
            Ok(sites) => {
                info!("{} sites within {} miles of {}", sites.len(), radius_miles, zip);
                tagged.extend(sites.into_vec().into_iter().map(|site| (site, zip.clone())));
            }
            Err(SpatialError::NoSitesFound(_)) | Err(SpatialError::EmptyCatalog) => {
                info!("No sites within {} miles of {}", radius_miles, zip);
            }
            Err(e) => return Err(e.into()),
        }
    }
    if unknown > 0 && config.uses_sample_gazetteer() {
        warn!("{} zip codes not found: {}", unknown, SAMPLE_GAZETTEER_HINT);
    }
    Ok(tagged)
}

pub async fn run_zipcodes(
    zip_csv: &Path,
    column: &str,
    options: &QueryOptions,
    output: Option<&Path>,
    sites_geojson: Option<&Path>,
    config: &PipelineConfig,
) -> anyhow::Result<()> {
    let file = File::open(zip_csv).with_context(|| format!("opening {}", zip_csv.display()))?;
    let zips = read_zip_column(file, column)?;
    let radius_miles = options.radius_miles.unwrap_or(config.radius_miles);
    info!("Processing {} zip codes with a {} mile radius", zips.len(), radius_miles);

    let tagged = sites_for_zips(&zips, radius_miles, options, config).await?;
    info!("{} site selections across {} zip codes", tagged.len(), zips.len());

    Site::write_tagged_site_csv(export::output(output)?, SOURCE_ZIPCODE, &tagged)?;
    if let Some(path) = sites_geojson {
        let (sites, tags): (Vec<Site>, Vec<String>) = tagged.into_iter().unzip();
        export::write_sites_geojson(File::create(path)?, &sites, Some((SOURCE_ZIPCODE, &tags)))?;
        info!("Wrote site points to {}", path.display());
    }
    Ok(())
}

/// Pair each zip code with the observations of the sites it selected.
///
/// Output follows the order of `tagged_sites`, then observation order.
pub fn tag_observations(
    tagged_sites: &[(Site, String)],
    observations: &[Observation],
) -> Vec<(Observation, String)> {
    let mut by_site: HashMap<&str, Vec<&Observation>> = HashMap::new();
    for obs in observations {
        by_site.entry(obs.site_id.as_str()).or_default().push(obs);
    }
    tagged_sites
        .iter()
        .flat_map(|(site, zip)| {
            by_site
                .get(site.site_id.as_str())
                .into_iter()
                .flatten()
                .map(move |obs| ((*obs).clone(), zip.clone()))
        })
        .collect()
}

/// Write one tagged observation file per zip code into `dir`, named
/// `gw_data_<zip>.csv`. Zip codes without observations get no file.
pub fn write_per_zip(
    dir: &Path,
    tagged: &[(Observation, String)],
) -> anyhow::Result<BTreeMap<String, PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut groups: BTreeMap<&str, Vec<(Observation, String)>> = BTreeMap::new();
    for (obs, zip) in tagged {
        groups
            .entry(zip.as_str())
            .or_default()
            .push((obs.clone(), zip.clone()));
    }

    let mut written = BTreeMap::new();
    for (zip, rows) in groups {
        let path = dir.join(format!("{}_{}.csv", PER_ZIP_PREFIX, zip));
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        Observation::write_tagged_observation_csv(file, SOURCE_ZIPCODE, &rows)?;
        info!("{}: {} observations to {}", zip, rows.len(), path.display());
        written.insert(zip.to_string(), path);
    }
    Ok(written)
}

#[allow(clippy::too_many_arguments)]
pub async fn run_fetch_zipcodes(
    zip_csv: &Path,
    column: &str,
    options: &QueryOptions,
    start_date: Option<&str>,
    end_date: Option<&str>,
    sources: &[DataSource],
    output: Option<&Path>,
    per_zip_dir: Option<&Path>,
    config: &PipelineConfig,
) -> anyhow::Result<()> {
    let file = File::open(zip_csv).with_context(|| format!("opening {}", zip_csv.display()))?;
    let zips = read_zip_column(file, column)?;
    let radius_miles = options.radius_miles.unwrap_or(config.radius_miles);
    info!("Processing {} zip codes with a {} mile radius", zips.len(), radius_miles);

    let tagged_sites = sites_for_zips(&zips, radius_miles, options, config).await?;
    if tagged_sites.is_empty() {
        anyhow::bail!("no monitoring sites near any of the {} zip codes", zips.len());
    }
    // a site shared by several buffers is downloaded once
    let site_ids: Vec<String> = tagged_sites
        .iter()
        .map(|(site, _)| site.site_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let observations = fetch_observations(&site_ids, start_date, end_date, sources, config).await?;

    let tagged = tag_observations(&tagged_sites, &observations);
    let with_data: BTreeSet<&str> = tagged.iter().map(|(_, zip)| zip.as_str()).collect();
    info!("{} tagged observations for {} zip codes", tagged.len(), with_data.len());

    Observation::write_tagged_observation_csv(export::output(output)?, SOURCE_ZIPCODE, &tagged)?;
    if let Some(dir) = per_zip_dir {
        let written = write_per_zip(dir, &tagged)?;
        info!("Wrote {} per-zip files to {}", written.len(), dir.display());
    }
    Ok(())
}
