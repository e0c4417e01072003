use crate::error::{Result, TemporalError};
use crate::period::{assign_period, AggregationScheme, PeriodKey};
use crate::stats::{max, mean, median, min, sample_std};
use gwr_nwis::Observation;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const DAYS_PER_YEAR: f64 = 365.25;

/// How often a site is expected to be sampled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingFrequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annual,
    /// One observation every n days
    EveryDays(f64),
}

impl SamplingFrequency {
    /// Nominal days between two observations.
    pub fn interval_days(&self) -> f64 {
        match self {
            SamplingFrequency::Hourly => 1.0 / 24.0,
            SamplingFrequency::Daily => 1.0,
            SamplingFrequency::Weekly => 7.0,
            SamplingFrequency::Monthly => DAYS_PER_YEAR / 12.0,
            SamplingFrequency::Quarterly => DAYS_PER_YEAR / 4.0,
            SamplingFrequency::Annual => DAYS_PER_YEAR,
            SamplingFrequency::EveryDays(days) => *days,
        }
    }

    /// Observations expected in a period of `days` days.
    pub fn expected_count(&self, days: i64) -> f64 {
        days as f64 / self.interval_days()
    }
}

impl FromStr for SamplingFrequency {
    type Err = TemporalError;

    /// Named frequencies, or a custom interval such as `3d`.
    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_lowercase();
        match name.as_str() {
            "hourly" | "h" => Ok(SamplingFrequency::Hourly),
            "daily" | "d" => Ok(SamplingFrequency::Daily),
            "weekly" | "w" => Ok(SamplingFrequency::Weekly),
            "monthly" | "m" => Ok(SamplingFrequency::Monthly),
            "quarterly" | "q" => Ok(SamplingFrequency::Quarterly),
            "annual" | "yearly" | "a" => Ok(SamplingFrequency::Annual),
            other => other
                .strip_suffix('d')
                .and_then(|days| days.parse::<f64>().ok())
                .filter(|days| days.is_finite() && *days > 0.0)
                .map(SamplingFrequency::EveryDays)
                .ok_or_else(|| TemporalError::UnknownName {
                    kind: "sampling frequency",
                    value: s.to_string(),
                }),
        }
    }
}

/// One named statistic of a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Mean,
    Median,
    Min,
    Max,
    Count,
    Std,
}

impl Statistic {
    pub fn name(&self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Median => "median",
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::Count => "count",
            Statistic::Std => "std",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Statistic {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mean" => Ok(Statistic::Mean),
            "median" => Ok(Statistic::Median),
            "min" => Ok(Statistic::Min),
            "max" => Ok(Statistic::Max),
            "count" => Ok(Statistic::Count),
            "std" => Ok(Statistic::Std),
            other => Err(TemporalError::UnknownName {
                kind: "statistic",
                value: other.to_string(),
            }),
        }
    }
}

/// Statistics of the valid values in one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation, null for a single value
    pub std: Option<f64>,
}

impl PeriodStatistics {
    /// Statistics of a non-empty set of values.
    fn of(values: &[f64]) -> PeriodStatistics {
        PeriodStatistics {
            count: values.len(),
            mean: mean(values),
            median: median(values),
            min: min(values),
            max: max(values),
            std: sample_std(values),
        }
    }

    pub fn get(&self, statistic: Statistic) -> Option<f64> {
        match statistic {
            Statistic::Mean => Some(self.mean),
            Statistic::Median => Some(self.median),
            Statistic::Min => Some(self.min),
            Statistic::Max => Some(self.max),
            Statistic::Count => Some(self.count as f64),
            Statistic::Std => self.std,
        }
    }
}

/// Statistics of one site over one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRecord {
    pub site_id: String,
    pub period: PeriodKey,
    pub statistics: PeriodStatistics,
    /// Valid observations over expected observations, capped at 1;
    /// null when no sampling frequency is known
    pub coverage_ratio: Option<f64>,
}

/// Scheme and policies for one aggregation run.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationConfig {
    pub scheme: AggregationScheme,
    /// Expected sampling frequency; coverage stays null without it
    pub frequency: Option<SamplingFrequency>,
    /// Drop periods with known coverage below this ratio
    pub min_coverage: Option<f64>,
}

impl AggregationConfig {
    pub fn new(scheme: AggregationScheme) -> AggregationConfig {
        AggregationConfig {
            scheme,
            frequency: None,
            min_coverage: None,
        }
    }

    pub fn with_frequency(mut self, frequency: SamplingFrequency) -> AggregationConfig {
        self.frequency = Some(frequency);
        self
    }

    pub fn with_min_coverage(mut self, min_coverage: f64) -> AggregationConfig {
        self.min_coverage = Some(min_coverage);
        self
    }

    fn coverage(&self, period: &PeriodKey, count: usize) -> Option<f64> {
        let expected = self.frequency?.expected_count(period.length_days());
        if expected <= 0.0 || !expected.is_finite() {
            return None;
        }
        Some((count as f64 / expected).min(1.0))
    }
}

/// Group observations by site and period and summarize each group.
///
/// Invalid observations are ignored and periods left without a valid value
/// are omitted. Output is sorted by site id, then chronologically by period.
pub fn aggregate(observations: &[Observation], config: &AggregationConfig) -> Vec<AggregatedRecord> {
    let mut groups: BTreeMap<(&str, PeriodKey), Vec<f64>> = BTreeMap::new();
    let mut invalid = 0usize;
    let mut excluded = 0usize;
    for observation in observations {
        if !observation.is_valid() {
            invalid += 1;
            continue;
        }
        match assign_period(&observation.timestamp, &config.scheme) {
            Some(period) => groups
                .entry((observation.site_id.as_str(), period))
                .or_default()
                .push(observation.value),
            None => excluded += 1,
        }
    }
    debug!(
        "Aggregating {} observations by {}: {} invalid, {} outside the scheme, {} groups",
        observations.len(),
        config.scheme.name(),
        invalid,
        excluded,
        groups.len()
    );

    let mut dropped = 0usize;
    let records: Vec<AggregatedRecord> = groups
        .into_iter()
        .filter_map(|((site_id, period), values)| {
            let coverage_ratio = config.coverage(&period, values.len());
            if let (Some(threshold), Some(coverage)) = (config.min_coverage, coverage_ratio) {
                if coverage < threshold {
                    dropped += 1;
                    return None;
                }
            }
            Some(AggregatedRecord {
                site_id: site_id.to_string(),
                period,
                statistics: PeriodStatistics::of(&values),
                coverage_ratio,
            })
        })
        .collect();
    if dropped > 0 {
        debug!("Dropped {} periods below minimum coverage", dropped);
    }
    records
}
