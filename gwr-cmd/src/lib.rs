//! Command implementations for GWR CLI.
//!
//! Sites are selected by zip code buffer, polygon file, state or explicit
//! list; their groundwater levels are fetched from NWIS; observation files are
//! summarized per period, per site, and as trends.

use clap::Subcommand;
use gwr_nwis::DataSource;
use std::path::PathBuf;

pub mod analyze;
pub mod config;
pub mod export;
pub mod fetch;
pub mod sites;
pub mod zipcodes;

pub use config::PipelineConfig;

use analyze::AggregationArgs;
use sites::{QueryOptions, SpatialInput};

#[derive(Subcommand)]
pub enum Command {
    /// List the monitoring sites a spatial query covers
    Sites {
        #[command(flatten)]
        input: SpatialInput,

        #[command(flatten)]
        options: QueryOptions,

        /// Output path for the sites CSV (stdout when omitted)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Also write the sites as GeoJSON points
        #[arg(long)]
        sites_geojson: Option<PathBuf>,
    },

    /// List the sites near each zip code in a CSV column, tagged by zip code.
    /// Zip codes missing from the gazetteer are skipped; set `gazetteer` in the
    /// config file for coverage beyond the bundled sample.
    Zipcodes {
        /// CSV file with a header row
        zip_csv: PathBuf,

        /// Column holding the zip codes
        #[arg(long, default_value = "zipcode")]
        column: String,

        #[command(flatten)]
        options: QueryOptions,

        /// Output path for the tagged sites CSV (stdout when omitted)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Also write the tagged sites as GeoJSON points
        #[arg(long)]
        sites_geojson: Option<PathBuf>,
    },

    /// Select sites and download their groundwater levels from NWIS
    Fetch {
        #[command(flatten)]
        input: SpatialInput,

        #[command(flatten)]
        options: QueryOptions,

        /// First date to request, YYYY-MM-DD
        #[arg(long)]
        start_date: Option<String>,

        /// Last date to request, YYYY-MM-DD (today when omitted)
        #[arg(long)]
        end_date: Option<String>,

        /// NWIS services to query: gwlevels, dv, iv
        #[arg(long = "source", value_delimiter = ',')]
        sources: Vec<DataSource>,

        /// Output path for the observations CSV (stdout when omitted)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Download groundwater levels for the sites near each zip code in a CSV
    /// column, tagging every observation with its zip code. Zip codes missing
    /// from the gazetteer are skipped.
    FetchZipcodes {
        /// CSV file with a header row
        zip_csv: PathBuf,

        /// Column holding the zip codes
        #[arg(long, default_value = "zipcode")]
        column: String,

        #[command(flatten)]
        options: QueryOptions,

        /// First date to request, YYYY-MM-DD
        #[arg(long)]
        start_date: Option<String>,

        /// Last date to request, YYYY-MM-DD (today when omitted)
        #[arg(long)]
        end_date: Option<String>,

        /// NWIS services to query: gwlevels, dv, iv
        #[arg(long = "source", value_delimiter = ',')]
        sources: Vec<DataSource>,

        /// Output path for the combined observations CSV (stdout when omitted)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Also write one observations CSV per zip code into this directory
        #[arg(long)]
        per_zip_dir: Option<PathBuf>,
    },

    /// Aggregate an observations CSV into per-site, per-period statistics
    Aggregate {
        /// Observations CSV written by `fetch`
        observations: PathBuf,

        #[command(flatten)]
        aggregation: AggregationArgs,

        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Fit a linear trend per site over aggregated periods
    Trend {
        /// Observations CSV written by `fetch`
        observations: PathBuf,

        #[command(flatten)]
        aggregation: AggregationArgs,

        /// Period statistic to fit: mean, median, min, max, count or std
        #[arg(long)]
        statistic: Option<String>,

        /// Unit of the observation values, e.g. ft or m
        #[arg(long)]
        value_unit: Option<String>,

        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Whole-record statistics per site
    Stats {
        /// Observations CSV written by `fetch`
        observations: PathBuf,

        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

pub async fn run(command: Command, config: &PipelineConfig) -> anyhow::Result<()> {
    match command {
        Command::Sites {
            input,
            options,
            output,
            sites_geojson,
        } => {
            sites::run_sites(
                &input,
                &options,
                output.as_deref(),
                sites_geojson.as_deref(),
                config,
            )
            .await
        }
        Command::Zipcodes {
            zip_csv,
            column,
            options,
            output,
            sites_geojson,
        } => {
            zipcodes::run_zipcodes(
                &zip_csv,
                &column,
                &options,
                output.as_deref(),
                sites_geojson.as_deref(),
                config,
            )
            .await
        }
        Command::Fetch {
            input,
            options,
            start_date,
            end_date,
            sources,
            output,
        } => {
            fetch::run_fetch(
                &input,
                &options,
                start_date.as_deref(),
                end_date.as_deref(),
                &sources,
                output.as_deref(),
                config,
            )
            .await
        }
        Command::FetchZipcodes {
            zip_csv,
            column,
            options,
            start_date,
            end_date,
            sources,
            output,
            per_zip_dir,
        } => {
            zipcodes::run_fetch_zipcodes(
                &zip_csv,
                &column,
                &options,
                start_date.as_deref(),
                end_date.as_deref(),
                &sources,
                output.as_deref(),
                per_zip_dir.as_deref(),
                config,
            )
            .await
        }
        Command::Aggregate {
            observations,
            aggregation,
            output,
        } => analyze::run_aggregate(&observations, &aggregation, output.as_deref(), config),
        Command::Trend {
            observations,
            aggregation,
            statistic,
            value_unit,
            output,
        } => analyze::run_trend(
            &observations,
            &aggregation,
            statistic.as_deref(),
            value_unit.as_deref(),
            output.as_deref(),
            config,
        ),
        Command::Stats {
            observations,
            output,
        } => analyze::run_stats(&observations, output.as_deref()),
    }
}
