//! Linear trend of an aggregated series over time.
//!
//! The chosen statistic is regressed by ordinary least squares against the
//! elapsed time in years between period midpoints, the first usable period
//! sitting at x = 0. Significance is the two-sided t-test on the slope with
//! n - 2 degrees of freedom.

use crate::aggregate::{AggregatedRecord, Statistic};
use crate::error::{Result, TemporalError};
use crate::period::PeriodKey;
use log::debug;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::collections::BTreeMap;
use std::fmt;

/// Unit of groundwater levels reported by NWIS (feet below land surface).
pub const DEFAULT_VALUE_UNIT: &str = "ft";

/// Significance level for calling a trend increasing or decreasing.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

const SECONDS_PER_YEAR: f64 = 365.25 * 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    NoTrend,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::NoTrend => write!(f, "no_trend"),
        }
    }
}

/// Fitted trend of one statistic at one site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    pub site_id: String,
    pub statistic: Statistic,
    /// Change of the statistic per year
    pub slope: f64,
    /// Units of `slope`, e.g. "ft/yr"
    pub slope_units_per_year: String,
    /// Fitted value at the midpoint of the first usable period
    pub intercept: f64,
    pub r_squared: f64,
    pub n_periods_used: usize,
    pub first_period: PeriodKey,
    pub last_period: PeriodKey,
    /// Standard error of the slope, null with only two periods
    pub stderr: Option<f64>,
    pub p_value: Option<f64>,
    pub ci_low: Option<f64>,
    pub ci_high: Option<f64>,
    pub direction: TrendDirection,
}

/// Fit a trend over one site's records, with values in feet.
pub fn fit_trend(records: &[AggregatedRecord], statistic: Statistic) -> Result<TrendResult> {
    fit_trend_in_units(records, statistic, DEFAULT_VALUE_UNIT)
}

/// Fit a trend over one site's records whose values are in `value_unit`.
///
/// Records may come in any order; periods where the statistic is null are
/// skipped. Needs at least two usable periods.
pub fn fit_trend_in_units(
    records: &[AggregatedRecord],
    statistic: Statistic,
    value_unit: &str,
) -> Result<TrendResult> {
    let site_id = match records.first() {
        Some(record) => record.site_id.clone(),
        None => return Err(TemporalError::InsufficientData { needed: 2, found: 0 }),
    };
    if let Some(other) = records.iter().find(|r| r.site_id != site_id) {
        return Err(TemporalError::MixedSites {
            first: site_id,
            other: other.site_id.clone(),
        });
    }

    let mut points: Vec<(PeriodKey, f64)> = records
        .iter()
        .filter_map(|r| {
            r.statistics
                .get(statistic)
                .filter(|v| v.is_finite())
                .map(|v| (r.period, v))
        })
        .collect();
    if points.len() < 2 {
        return Err(TemporalError::InsufficientData {
            needed: 2,
            found: points.len(),
        });
    }
    points.sort_by(|a, b| a.0.cmp(&b.0));

    let origin = points[0].0.midpoint();
    let xs: Vec<f64> = points
        .iter()
        .map(|(period, _)| (period.midpoint() - origin).num_seconds() as f64 / SECONDS_PER_YEAR)
        .collect();
    let ys: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
    let fit = least_squares(&xs, &ys);

    let (p_value, ci_low, ci_high) = match fit.stderr {
        Some(stderr) if stderr > 0.0 => match slope_t_test(fit.slope, stderr, points.len() - 2) {
            Some((p, low, high)) => (Some(p), Some(low), Some(high)),
            None => (None, None, None),
        },
        // residuals vanish: a perfect fit on a varying series
        Some(_) if fit.slope != 0.0 => (Some(0.0), Some(fit.slope), Some(fit.slope)),
        Some(_) => (Some(1.0), Some(0.0), Some(0.0)),
        None => (None, None, None),
    };
    let direction = match p_value {
        Some(p) if p < SIGNIFICANCE_LEVEL && fit.slope > 0.0 => TrendDirection::Increasing,
        Some(p) if p < SIGNIFICANCE_LEVEL && fit.slope < 0.0 => TrendDirection::Decreasing,
        _ => TrendDirection::NoTrend,
    };
    let unit = match statistic {
        Statistic::Count => "count",
        _ => value_unit,
    };

    Ok(TrendResult {
        site_id,
        statistic,
        slope: fit.slope,
        slope_units_per_year: format!("{}/yr", unit),
        intercept: fit.intercept,
        r_squared: fit.r_squared,
        n_periods_used: points.len(),
        first_period: points[0].0,
        last_period: points[points.len() - 1].0,
        stderr: fit.stderr,
        p_value,
        ci_low,
        ci_high,
        direction,
    })
}

/// Fit a trend per site over a multi-site record sequence, sorted by site id.
///
/// Sites with fewer than two usable periods are skipped.
pub fn fit_trends(
    records: &[AggregatedRecord],
    statistic: Statistic,
    value_unit: &str,
) -> Vec<TrendResult> {
    let mut by_site: BTreeMap<&str, Vec<AggregatedRecord>> = BTreeMap::new();
    for record in records {
        by_site
            .entry(record.site_id.as_str())
            .or_default()
            .push(record.clone());
    }
    by_site
        .into_iter()
        .filter_map(
            |(site_id, site_records)| match fit_trend_in_units(&site_records, statistic, value_unit) {
                Ok(trend) => Some(trend),
                Err(e) => {
                    debug!("Skipping trend for site {}: {}", site_id, e);
                    None
                }
            },
        )
        .collect()
}

struct LinearFit {
    slope: f64,
    intercept: f64,
    r_squared: f64,
    stderr: Option<f64>,
}

fn least_squares(xs: &[f64], ys: &[f64]) -> LinearFit {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut ss_xx = 0.0;
    let mut ss_xy = 0.0;
    let mut ss_yy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        ss_xx += dx * dx;
        ss_xy += dx * dy;
        ss_yy += dy * dy;
    }

    // all periods share a midpoint
    if ss_xx < 1e-10 {
        return LinearFit {
            slope: 0.0,
            intercept: mean_y,
            r_squared: 0.0,
            stderr: None,
        };
    }

    let dof = xs.len().saturating_sub(2);
    if ss_yy < 1e-12 {
        return LinearFit {
            slope: 0.0,
            intercept: mean_y,
            r_squared: 1.0,
            stderr: (dof > 0).then_some(0.0),
        };
    }

    let slope = ss_xy / ss_xx;
    let intercept = mean_y - slope * mean_x;
    let ss_res: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
        .sum();
    let r_squared = (1.0 - ss_res / ss_yy).clamp(0.0, 1.0);
    let stderr = (dof > 0).then(|| (ss_res / dof as f64 / ss_xx).sqrt());

    LinearFit {
        slope,
        intercept,
        r_squared,
        stderr,
    }
}

/// Two-sided p-value and 95% confidence interval of a slope under Student's t.
fn slope_t_test(slope: f64, stderr: f64, dof: usize) -> Option<(f64, f64, f64)> {
    let t_dist = StudentsT::new(0.0, 1.0, dof as f64).ok()?;
    let t = slope / stderr;
    let p_value = (2.0 * (1.0 - t_dist.cdf(t.abs()))).clamp(0.0, 1.0);
    let t_crit = t_dist.inverse_cdf(0.975);
    Some((p_value, slope - t_crit * stderr, slope + t_crit * stderr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::PeriodStatistics;

    fn record(site: &str, period: PeriodKey, mean: f64) -> AggregatedRecord {
        AggregatedRecord {
            site_id: site.to_string(),
            period,
            statistics: PeriodStatistics {
                count: 1,
                mean,
                median: mean,
                min: mean,
                max: mean,
                std: None,
            },
            coverage_ratio: None,
        }
    }

    fn yearly(site: &str, values: &[(i32, f64)]) -> Vec<AggregatedRecord> {
        values
            .iter()
            .map(|(year, v)| record(site, PeriodKey::year(*year).unwrap(), *v))
            .collect()
    }

    #[test]
    fn test_one_period_is_insufficient() {
        let records = yearly("A", &[(2020, 10.0)]);
        assert_eq!(
            fit_trend(&records, Statistic::Mean),
            Err(TemporalError::InsufficientData { needed: 2, found: 1 })
        );
        assert_eq!(
            fit_trend(&[], Statistic::Mean),
            Err(TemporalError::InsufficientData { needed: 2, found: 0 })
        );
    }

    #[test]
    fn test_null_statistic_is_not_usable() {
        // std is null for single-value periods
        let records = yearly("A", &[(2020, 10.0), (2021, 11.0)]);
        assert!(matches!(
            fit_trend(&records, Statistic::Std),
            Err(TemporalError::InsufficientData { found: 0, .. })
        ));
    }

    #[test]
    fn test_two_identical_periods() {
        let records = yearly("A", &[(2020, 10.0), (2021, 10.0)]);
        let trend = fit_trend(&records, Statistic::Mean).unwrap();
        assert_eq!(trend.slope, 0.0);
        assert_eq!(trend.intercept, 10.0);
        assert_eq!(trend.r_squared, 1.0);
        assert_eq!(trend.n_periods_used, 2);
        assert_eq!(trend.stderr, None);
        assert_eq!(trend.direction, TrendDirection::NoTrend);
    }

    #[test]
    fn test_degenerate_x_has_zero_r_squared() {
        let period = PeriodKey::month(2021, 5).unwrap();
        let records = vec![record("A", period, 4.0), record("A", period, 8.0)];
        let trend = fit_trend(&records, Statistic::Mean).unwrap();
        assert_eq!(trend.slope, 0.0);
        assert_eq!(trend.r_squared, 0.0);
        assert_eq!(trend.intercept, 6.0);
    }

    #[test]
    fn test_linear_series() {
        // 0.5 ft deeper every water year, given out of order
        let mut records: Vec<AggregatedRecord> = (2010..2020)
            .map(|wy| {
                record(
                    "A",
                    PeriodKey::water_year(wy).unwrap(),
                    20.0 + 0.5 * (wy - 2010) as f64,
                )
            })
            .collect();
        records.reverse();
        let trend = fit_trend(&records, Statistic::Mean).unwrap();
        // water years alternate 365 and 366 days, so slope is ~0.5 ft/yr
        assert!((trend.slope - 0.5).abs() < 0.005, "{}", trend.slope);
        assert!((trend.intercept - 20.0).abs() < 0.01, "{}", trend.intercept);
        assert!(trend.r_squared > 0.999);
        assert_eq!(trend.slope_units_per_year, "ft/yr");
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert_eq!(trend.first_period.to_string(), "WY2010");
        assert_eq!(trend.last_period.to_string(), "WY2019");
        let (low, high) = (trend.ci_low.unwrap(), trend.ci_high.unwrap());
        assert!(low <= trend.slope && trend.slope <= high);
    }

    #[test]
    fn test_noisy_flat_series_has_no_trend() {
        let records = yearly(
            "A",
            &[(2010, 10.0), (2011, 12.0), (2012, 9.0), (2013, 11.5), (2014, 10.5), (2015, 9.5)],
        );
        let trend = fit_trend(&records, Statistic::Mean).unwrap();
        assert!(trend.p_value.unwrap() > SIGNIFICANCE_LEVEL);
        assert_eq!(trend.direction, TrendDirection::NoTrend);
        assert!(trend.r_squared < 0.5);
    }

    #[test]
    fn test_decreasing_trend_and_units() {
        let records = yearly(
            "A",
            &[(2015, 30.0), (2016, 28.1), (2017, 25.9), (2018, 24.0), (2019, 22.1)],
        );
        let trend = fit_trend_in_units(&records, Statistic::Mean, "m").unwrap();
        assert!(trend.slope < -1.8);
        assert_eq!(trend.direction, TrendDirection::Decreasing);
        assert_eq!(trend.slope_units_per_year, "m/yr");
        let count = fit_trend_in_units(&records, Statistic::Count, "m").unwrap();
        assert_eq!(count.slope_units_per_year, "count/yr");
    }

    #[test]
    fn test_mixed_sites() {
        let mut records = yearly("A", &[(2020, 1.0), (2021, 2.0)]);
        records.extend(yearly("B", &[(2020, 1.0)]));
        assert!(matches!(
            fit_trend(&records, Statistic::Mean),
            Err(TemporalError::MixedSites { .. })
        ));
    }

    #[test]
    fn test_fit_trends_skips_short_sites() {
        let mut records = yearly("B", &[(2020, 1.0), (2021, 2.0), (2022, 3.0)]);
        records.extend(yearly("C", &[(2020, 1.0)]));
        records.extend(yearly("A", &[(2020, 5.0), (2021, 4.0)]));
        let trends = fit_trends(&records, Statistic::Mean, DEFAULT_VALUE_UNIT);
        let sites: Vec<&str> = trends.iter().map(|t| t.site_id.as_str()).collect();
        assert_eq!(sites, vec!["A", "B"]);
    }

    #[test]
    fn test_three_periods_use_t_distribution() {
        // one degree of freedom: t = 5.2 is not significant
        let records: Vec<AggregatedRecord> = [(2010, 10.0), (2011, 11.0), (2012, 13.0)]
            .iter()
            .map(|(wy, v)| record("A", PeriodKey::water_year(*wy).unwrap(), *v))
            .collect();
        let trend = fit_trend(&records, Statistic::Mean).unwrap();
        assert!((trend.slope - 1.5).abs() < 0.01, "{}", trend.slope);
        let p = trend.p_value.unwrap();
        assert!((p - 0.12).abs() < 0.01, "{}", p);
        assert_eq!(trend.direction, TrendDirection::NoTrend);
        assert!(trend.ci_low.unwrap() < 0.0 && trend.ci_high.unwrap() > 3.0);
    }

    #[test]
    fn test_slope_t_test() {
        let (p, low, high) = slope_t_test(1.0, 0.5, 30).unwrap();
        // t = 2 on 30 degrees of freedom
        assert!((p - 0.0546).abs() < 1e-3, "{}", p);
        assert!((high - 1.0 - 0.5 * 2.042).abs() < 1e-2, "{}", high);
        assert!((1.0 - low - 0.5 * 2.042).abs() < 1e-2, "{}", low);
    }
}
