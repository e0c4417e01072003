//! Summary statistics over observation values.

use chrono::NaiveDateTime;
use gwr_nwis::Observation;
use serde::Serialize;
use std::collections::BTreeMap;

/// Calculate the mean of a slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n-1 denominator), `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

/// Calculate the median of a slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

pub fn min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Whole-record summary of one site's valid observations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteStatistics {
    pub site_id: String,
    pub count: usize,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
}

/// Per-site statistics over every valid observation, sorted by site id.
///
/// Sites with no valid observation are left out.
pub fn site_statistics(observations: &[Observation]) -> Vec<SiteStatistics> {
    let mut by_site: BTreeMap<&str, Vec<&Observation>> = BTreeMap::new();
    for observation in observations.iter().filter(|o| o.is_valid()) {
        by_site
            .entry(observation.site_id.as_str())
            .or_default()
            .push(observation);
    }

    by_site
        .into_iter()
        .filter_map(|(site_id, observations)| {
            let values: Vec<f64> = observations.iter().map(|o| o.value).collect();
            let first = observations.iter().map(|o| o.timestamp).min()?;
            let last = observations.iter().map(|o| o.timestamp).max()?;
            Some(SiteStatistics {
                site_id: site_id.to_string(),
                count: values.len(),
                mean: mean(&values),
                std: sample_std(&values),
                min: min(&values),
                max: max(&values),
                first,
                last,
            })
        })
        .collect()
}
