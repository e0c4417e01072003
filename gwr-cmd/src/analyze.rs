//! Offline summaries of an observations CSV: per-period aggregates, trends,
//! and whole-record site statistics.

use crate::config::PipelineConfig;
use crate::export;
use anyhow::Context;
use clap::Args;
use gwr_nwis::Observation;
use gwr_temporal::{aggregate, fit_trends, site_statistics, AggregatedRecord, AggregationConfig};
use log::{info, warn};
use std::fs::File;
use std::path::Path;

/// Aggregation overrides; anything left unset comes from the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct AggregationArgs {
    /// monthly, annual, water_year, growing_season, custom or weekly
    #[arg(long)]
    pub scheme: Option<String>,

    /// Expected sampling frequency, e.g. daily, weekly or 3d
    #[arg(long)]
    pub frequency: Option<String>,

    /// Drop periods whose coverage ratio is below this value (0-1)
    #[arg(long)]
    pub min_coverage: Option<f64>,
}

impl AggregationArgs {
    pub fn to_config(&self, config: &PipelineConfig) -> anyhow::Result<AggregationConfig> {
        config.aggregation_config(
            self.scheme.as_deref(),
            self.frequency.as_deref(),
            self.min_coverage,
        )
    }
}

/// Read an observations CSV written by `fetch`.
pub fn read_observations(path: &Path) -> anyhow::Result<Vec<Observation>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let observations = Observation::parse_observation_csv(file)
        .with_context(|| format!("parsing {}", path.display()))?;
    info!("Read {} observations from {}", observations.len(), path.display());
    Ok(observations)
}

fn aggregate_observations(
    observations: &[Observation],
    aggregation: &AggregationConfig,
) -> Vec<AggregatedRecord> {
    let records = aggregate(observations, aggregation);
    info!(
        "{} {} records from {} observations",
        records.len(),
        aggregation.scheme.name(),
        observations.len()
    );
    records
}

pub fn run_aggregate(
    observations_csv: &Path,
    args: &AggregationArgs,
    output: Option<&Path>,
    config: &PipelineConfig,
) -> anyhow::Result<()> {
    let observations = read_observations(observations_csv)?;
    let records = aggregate_observations(&observations, &args.to_config(config)?);
    export::write_aggregates(export::output(output)?, &records)
}

pub fn run_trend(
    observations_csv: &Path,
    args: &AggregationArgs,
    statistic: Option<&str>,
    value_unit: Option<&str>,
    output: Option<&Path>,
    config: &PipelineConfig,
) -> anyhow::Result<()> {
    let statistic = config.statistic(statistic)?;
    let value_unit = value_unit.unwrap_or(&config.value_unit);
    let observations = read_observations(observations_csv)?;
    let records = aggregate_observations(&observations, &args.to_config(config)?);

    let trends = fit_trends(&records, statistic, value_unit);
    if trends.is_empty() {
        warn!("No site has two or more usable periods; no trends fitted");
    } else {
        info!("Fitted {} {} trends", trends.len(), statistic);
    }
    export::write_trends(export::output(output)?, &trends)
}

pub fn run_stats(
    observations_csv: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let observations = read_observations(observations_csv)?;
    let statistics = site_statistics(&observations);
    info!("Summarized {} sites", statistics.len());
    export::write_site_statistics(export::output(output)?, &statistics)
}
