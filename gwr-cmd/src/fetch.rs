//! Select sites and download their groundwater levels from NWIS.

use crate::config::PipelineConfig;
use crate::export;
use crate::sites::{select_sites, QueryOptions, SpatialInput};
use gwr_nwis::client::NwisClient;
use gwr_nwis::{DataSource, Observation};
use log::{info, warn};
use std::collections::BTreeSet;
use std::path::Path;

/// Download observations for `site_ids`, with dates and services defaulting
/// to the config when not given.
pub async fn fetch_observations(
    site_ids: &[String],
    start_date: Option<&str>,
    end_date: Option<&str>,
    sources: &[DataSource],
    config: &PipelineConfig,
) -> anyhow::Result<Vec<Observation>> {
    let (start_date, end_date) = config.date_range(start_date, end_date)?;
    let sources = if sources.is_empty() {
        config.data_sources()?
    } else {
        sources.to_vec()
    };

    let labels: Vec<&str> = sources.iter().map(DataSource::code).collect();
    info!(
        "Fetching {} sites from {} to {} ({})",
        site_ids.len(),
        start_date,
        end_date,
        labels.join(", ")
    );
    let client = NwisClient::new()?;
    let observations = client
        .fetch_from_sources(site_ids, &start_date, &end_date, &sources)
        .await?;
    if observations.is_empty() {
        warn!("NWIS returned no observations for the selected sites");
    } else {
        let with_data: BTreeSet<&str> =
            observations.iter().map(|o| o.site_id.as_str()).collect();
        info!(
            "Fetched {} observations at {} of {} sites",
            observations.len(),
            with_data.len(),
            site_ids.len()
        );
    }
    Ok(observations)
}

pub async fn run_fetch(
    input: &SpatialInput,
    options: &QueryOptions,
    start_date: Option<&str>,
    end_date: Option<&str>,
    sources: &[DataSource],
    output: Option<&Path>,
    config: &PipelineConfig,
) -> anyhow::Result<()> {
    let query = input.to_query(options.radius_miles.unwrap_or(config.radius_miles))?;
    let sites = select_sites(&query, options, config).await?;
    let observations =
        fetch_observations(&sites.ids(), start_date, end_date, sources, config).await?;
    Observation::write_observation_csv(export::output(output)?, &observations)?;
    Ok(())
}
