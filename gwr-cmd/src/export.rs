//! CSV and GeoJSON writers for pipeline outputs.

use gwr_nwis::Site;
use gwr_temporal::{AggregatedRecord, SiteStatistics, TrendResult};
use gwr_utils::dates::{format_date, format_timestamp};
use serde::Serialize;
use serde_json::json;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
struct AggregateRow<'a> {
    site_no: &'a str,
    period: String,
    period_start: String,
    count: usize,
    mean: f64,
    median: f64,
    min: f64,
    max: f64,
    std: Option<f64>,
    coverage_ratio: Option<f64>,
}

#[derive(Debug, Serialize)]
struct TrendRow<'a> {
    site_no: &'a str,
    statistic: &'static str,
    slope: f64,
    units: &'a str,
    intercept: f64,
    r_squared: f64,
    n_periods: usize,
    first_period: String,
    last_period: String,
    stderr: Option<f64>,
    p_value: Option<f64>,
    ci_low: Option<f64>,
    ci_high: Option<f64>,
    direction: String,
}

#[derive(Debug, Serialize)]
struct StatisticsRow<'a> {
    site_no: &'a str,
    count: usize,
    mean: f64,
    std: Option<f64>,
    min: f64,
    max: f64,
    first: String,
    last: String,
}

/// Open `path` for writing, or stdout when no path is given.
pub fn output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    match path {
        Some(path) => Ok(Box::new(File::create(path)?)),
        None => Ok(Box::new(io::stdout().lock())),
    }
}

pub fn write_aggregates<W: Write>(writer: W, records: &[AggregatedRecord]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        let stats = &record.statistics;
        wtr.serialize(AggregateRow {
            site_no: &record.site_id,
            period: record.period.to_string(),
            period_start: format_date(&record.period.start()),
            count: stats.count,
            mean: stats.mean,
            median: stats.median,
            min: stats.min,
            max: stats.max,
            std: stats.std,
            coverage_ratio: record.coverage_ratio,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_trends<W: Write>(writer: W, trends: &[TrendResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for trend in trends {
        wtr.serialize(TrendRow {
            site_no: &trend.site_id,
            statistic: trend.statistic.name(),
            slope: trend.slope,
            units: &trend.slope_units_per_year,
            intercept: trend.intercept,
            r_squared: trend.r_squared,
            n_periods: trend.n_periods_used,
            first_period: trend.first_period.to_string(),
            last_period: trend.last_period.to_string(),
            stderr: trend.stderr,
            p_value: trend.p_value,
            ci_low: trend.ci_low,
            ci_high: trend.ci_high,
            direction: trend.direction.to_string(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_site_statistics<W: Write>(
    writer: W,
    statistics: &[SiteStatistics],
) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for stats in statistics {
        wtr.serialize(StatisticsRow {
            site_no: &stats.site_id,
            count: stats.count,
            mean: stats.mean,
            std: stats.std,
            min: stats.min,
            max: stats.max,
            first: format_timestamp(&stats.first),
            last: format_timestamp(&stats.last),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write located sites as a GeoJSON FeatureCollection of points.
///
/// Sites without a location are left out. `tag` names an extra property
/// and holds its value per site, e.g. the zip code that selected it.
pub fn write_sites_geojson<W: Write>(
    mut writer: W,
    sites: &[Site],
    tag: Option<(&str, &[String])>,
) -> anyhow::Result<()> {
    let features: Vec<serde_json::Value> = sites
        .iter()
        .enumerate()
        .filter_map(|(i, site)| {
            let location = site.location?;
            let mut properties = json!({
                "site_no": site.site_id,
                "station_nm": site.name,
                "state_cd": site.state_code,
                "site_tp_cd": site.site_type,
            });
            if let Some((column, values)) = tag {
                properties[column] = json!(values.get(i));
            }
            Some(json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [location.longitude, location.latitude],
                },
                "properties": properties,
            }))
        })
        .collect();
    let collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    serde_json::to_writer_pretty(&mut writer, &collection)?;
    writeln!(writer)?;
    Ok(())
}
