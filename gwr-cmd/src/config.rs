//! Pipeline defaults read from an optional TOML file.
//!
//! Every field has a default, so an empty file (or no file) is valid.
//! Command-line flags override what the file says.
//!
//! ```toml
//! scheme = "water_year"
//! frequency = "monthly"
//! min_coverage = 0.5
//! radius_miles = 10.0
//! missing_crs = "reject"
//! data_sources = ["gwlevels", "dv"]
//! start_date = "1990-01-01"
//!
//! [growing_season]
//! start = "05-01"
//! end = "08-31"
//!
//! [[custom_ranges]]
//! start = "2012-01-01"
//! end = "2012-12-31"
//! ```

use anyhow::Context;
use chrono::{Local, NaiveDate};
use gwr_nwis::DataSource;
use gwr_spatial::{MissingCrsPolicy, ResolverOptions, ZipGazetteer};
use gwr_temporal::{
    AggregationConfig, AggregationScheme, DateSpan, GrowingSeason, SamplingFrequency, Statistic,
};
use gwr_utils::dates::parse_date;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default first date requested from NWIS.
pub const DEFAULT_START_DATE: &str = "1900-01-01";

/// Attached to zip codes the bundled gazetteer does not know.
pub const SAMPLE_GAZETTEER_HINT: &str = "the bundled gazetteer only holds a sample of zip \
codes; set `gazetteer` in the config file to a CSV of zip, latitude, longitude";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// monthly, annual, water_year, growing_season, custom or weekly
    pub scheme: String,
    /// Month-day bounds of the growing season, April through September by default
    pub growing_season: DayRange,
    /// Date ranges for the custom scheme, matched in order
    pub custom_ranges: Vec<DayRange>,
    /// Expected sampling frequency, e.g. "daily" or "3d"; coverage is null without it
    pub frequency: Option<String>,
    pub min_coverage: Option<f64>,
    /// Statistic the trend is fitted on
    pub statistic: String,
    /// Unit of observation values, used in trend slope units
    pub value_unit: String,
    /// Buffer radius around a zip code centroid
    pub radius_miles: f64,
    pub missing_crs: MissingCrsPolicy,
    /// CSV with zip, latitude, longitude columns covering the zip codes you
    /// query. Without it only the small bundled sample of zip centroids is
    /// available, and other zip codes fail to resolve.
    pub gazetteer: Option<PathBuf>,
    pub data_sources: Vec<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Inclusive `start`..`end` pair: month-days ("MM-DD") for the growing
/// season, full dates for custom ranges.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DayRange {
    pub start: String,
    pub end: String,
}

impl DayRange {
    pub fn new(start: &str, end: &str) -> DayRange {
        DayRange {
            start: start.to_string(),
            end: end.to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            scheme: "monthly".to_string(),
            growing_season: DayRange::new("04-01", "09-30"),
            custom_ranges: Vec::new(),
            frequency: None,
            min_coverage: None,
            statistic: "mean".to_string(),
            value_unit: gwr_temporal::DEFAULT_VALUE_UNIT.to_string(),
            radius_miles: 5.0,
            missing_crs: MissingCrsPolicy::default(),
            gazetteer: None,
            data_sources: vec![DataSource::GwLevels.code().to_string()],
            start_date: None,
            end_date: None,
        }
    }
}

impl PipelineConfig {
    /// Read the config file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
        match path {
            None => Ok(PipelineConfig::default()),
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                PipelineConfig::from_toml(&text)
                    .with_context(|| format!("parsing config {}", path.display()))
            }
        }
    }

    pub fn from_toml(text: &str) -> anyhow::Result<PipelineConfig> {
        Ok(toml::from_str(text)?)
    }

    /// Aggregation scheme named by `name`, or by the config when `None`.
    pub fn aggregation_scheme(&self, name: Option<&str>) -> anyhow::Result<AggregationScheme> {
        let name = name.unwrap_or(&self.scheme);
        let normalized = name.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "growing_season" | "gs" => Ok(AggregationScheme::GrowingSeason(GrowingSeason::parse(
                &self.growing_season.start,
                &self.growing_season.end,
            )?)),
            "custom" => {
                let spans = self
                    .custom_ranges
                    .iter()
                    .map(|range| Ok(DateSpan::new(parse_date(&range.start)?, parse_date(&range.end)?)?))
                    .collect::<anyhow::Result<Vec<DateSpan>>>()?;
                Ok(AggregationScheme::custom(spans)?)
            }
            _ => Ok(name.parse::<AggregationScheme>()?),
        }
    }

    /// Aggregation settings with command-line overrides applied.
    pub fn aggregation_config(
        &self,
        scheme: Option<&str>,
        frequency: Option<&str>,
        min_coverage: Option<f64>,
    ) -> anyhow::Result<AggregationConfig> {
        let mut config = AggregationConfig::new(self.aggregation_scheme(scheme)?);
        if let Some(frequency) = frequency.or(self.frequency.as_deref()) {
            config = config.with_frequency(frequency.parse::<SamplingFrequency>()?);
        }
        if let Some(min_coverage) = min_coverage.or(self.min_coverage) {
            anyhow::ensure!(
                (0.0..=1.0).contains(&min_coverage),
                "min_coverage must be between 0 and 1, got {}",
                min_coverage
            );
            config = config.with_min_coverage(min_coverage);
        }
        Ok(config)
    }

    pub fn statistic(&self, name: Option<&str>) -> anyhow::Result<Statistic> {
        Ok(name.unwrap_or(&self.statistic).parse::<Statistic>()?)
    }

    pub fn resolver_options(&self, missing_crs: Option<MissingCrsPolicy>) -> ResolverOptions {
        ResolverOptions {
            missing_crs: missing_crs.unwrap_or(self.missing_crs),
            ..ResolverOptions::default()
        }
    }

    /// True when zip codes resolve against the bundled sample only.
    pub fn uses_sample_gazetteer(&self) -> bool {
        self.gazetteer.is_none()
    }

    pub fn gazetteer(&self) -> anyhow::Result<ZipGazetteer> {
        match &self.gazetteer {
            None => Ok(ZipGazetteer::embedded()?),
            Some(path) => {
                let file = fs::File::open(path)
                    .with_context(|| format!("opening gazetteer {}", path.display()))?;
                Ok(ZipGazetteer::from_csv(file)?)
            }
        }
    }

    pub fn data_sources(&self) -> anyhow::Result<Vec<DataSource>> {
        self.data_sources
            .iter()
            .map(|code| Ok(code.parse::<DataSource>()?))
            .collect()
    }

    /// Inclusive request window; flags override the file, which overrides
    /// the defaults (1900-01-01 through today).
    pub fn date_range(
        &self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> anyhow::Result<(NaiveDate, NaiveDate)> {
        let start_date = parse_date(
            start
                .or(self.start_date.as_deref())
                .unwrap_or(DEFAULT_START_DATE),
        )?;
        let end_date = match end.or(self.end_date.as_deref()) {
            Some(end) => parse_date(end)?,
            None => Local::now().naive_local().date(),
        };
        anyhow::ensure!(
            start_date <= end_date,
            "start date {} is after end date {}",
            start_date,
            end_date
        );
        Ok((start_date, end_date))
    }
}
