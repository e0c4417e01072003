use crate::error::{NwisError, Result};
use crate::rdb::{field, RdbTable};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use gwr_utils::dates::{format_timestamp, parse_timestamp};
use log::debug;
use serde::{Deserialize, Serialize};
use std::{fmt, io, str::FromStr};

/// Date format used for NWIS query parameters: "YYYY-MM-DD"
pub const YEAR_FORMAT: &str = "%Y-%m-%d";

/// NWIS parameter code for depth to water level, feet below land surface.
pub const PARAM_DEPTH_TO_WATER: &str = "72019";

/// NWIS statistic code for a daily mean.
pub const STAT_DAILY_MEAN: &str = "00003";

/// Water-level status codes that mean the reading does not describe a static
/// water level: dry, discontinued, obstructed, foreign substance, destroyed.
pub const INVALID_STATUS_CODES: [&str; 5] = ["D", "N", "O", "V", "W"];

/// Which NWIS service an observation came from.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataSource {
    /// Discrete field measurements (steel tape, electric tape, ...)
    GwLevels,
    /// Daily values computed from continuous sensors
    Daily,
    /// Instantaneous sensor readings, typically 15-60 minute spacing
    Instantaneous,
}

impl DataSource {
    /// Service path segment and CSV label.
    pub fn code(&self) -> &'static str {
        match self {
            DataSource::GwLevels => "gwlevels",
            DataSource::Daily => "dv",
            DataSource::Instantaneous => "iv",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DataSource {
    type Err = NwisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gwlevels" => Ok(DataSource::GwLevels),
            "dv" => Ok(DataSource::Daily),
            "iv" => Ok(DataSource::Instantaneous),
            other => Err(NwisError::RdbParse(format!("unknown data source {other:?}"))),
        }
    }
}

/// Quality of a single reading.
/// - `Approved`: reviewed and accepted by USGS
/// - `Provisional`: subject to revision, still usable
/// - `Estimated`: filled in by the agency, still usable
/// - `Rejected`: present in the record but not a valid water level
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum QualityFlag {
    Approved,
    Provisional,
    Estimated,
    Rejected,
}

impl QualityFlag {
    pub fn is_valid(&self) -> bool {
        !matches!(self, QualityFlag::Rejected)
    }

    pub fn code(&self) -> &'static str {
        match self {
            QualityFlag::Approved => "A",
            QualityFlag::Provisional => "P",
            QualityFlag::Estimated => "e",
            QualityFlag::Rejected => "X",
        }
    }

    /// Map an NWIS time-series qualifier string (e.g. `A`, `P`, `A:e`) to a flag.
    pub fn from_qualifiers(qualifiers: &str) -> QualityFlag {
        let parts: Vec<&str> = qualifiers.split(':').map(str::trim).collect();
        if parts.iter().any(|q| q.eq_ignore_ascii_case("e")) {
            QualityFlag::Estimated
        } else if parts.contains(&"P") {
            QualityFlag::Provisional
        } else {
            QualityFlag::Approved
        }
    }
}

impl FromStr for QualityFlag {
    type Err = NwisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "A" | "a" => Ok(QualityFlag::Approved),
            "P" | "p" => Ok(QualityFlag::Provisional),
            "e" | "E" => Ok(QualityFlag::Estimated),
            "X" | "x" | "R" | "r" => Ok(QualityFlag::Rejected),
            other => Err(NwisError::RdbParse(format!("unknown quality flag {other:?}"))),
        }
    }
}

/// A single groundwater-level reading at a monitoring site.
///
/// `value` is depth to water in feet below land surface for NWIS data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub site_id: String,
    pub timestamp: NaiveDateTime,
    pub value: f64,
    pub quality: QualityFlag,
    pub source: DataSource,
}

/// Flat CSV row used for observation import/export.
#[derive(Debug, Serialize, Deserialize)]
struct ObservationRow {
    site_no: String,
    timestamp: String,
    value: f64,
    #[serde(default)]
    quality: String,
    #[serde(default)]
    source: String,
}

impl Observation {
    /// True when the reading can take part in aggregation.
    pub fn is_valid(&self) -> bool {
        self.quality.is_valid() && self.value.is_finite()
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Parse observations from the interchange CSV (`site_no,timestamp,value,quality,source`).
    pub fn parse_observation_csv<R: io::Read>(reader: R) -> Result<Vec<Observation>> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut observations = Vec::new();
        for row in rdr.deserialize::<ObservationRow>() {
            let row = row?;
            let timestamp = parse_timestamp(&row.timestamp).map_err(|e| {
                NwisError::RdbParse(format!("bad timestamp {:?}: {e}", row.timestamp))
            })?;
            let source = if row.source.is_empty() {
                DataSource::GwLevels
            } else {
                row.source.parse()?
            };
            observations.push(Observation {
                site_id: row.site_no,
                timestamp,
                value: row.value,
                quality: row.quality.parse()?,
                source,
            });
        }
        Ok(observations)
    }

    /// Write observations in the interchange CSV layout.
    pub fn write_observation_csv<W: io::Write>(writer: W, observations: &[Observation]) -> Result<()> {
        let mut wtr = WriterBuilder::new().from_writer(writer);
        for obs in observations {
            wtr.serialize(ObservationRow {
                site_no: obs.site_id.clone(),
                timestamp: format_timestamp(&obs.timestamp),
                value: obs.value,
                quality: obs.quality.code().to_string(),
                source: obs.source.code().to_string(),
            })?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write observations in the interchange CSV layout with an extra `column`
    /// holding each observation's tag, e.g. the zip code whose buffer selected
    /// the site. Readers of the plain layout ignore the extra column.
    pub fn write_tagged_observation_csv<W: io::Write>(
        writer: W,
        column: &str,
        tagged: &[(Observation, String)],
    ) -> Result<()> {
        let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
        wtr.write_record(["site_no", "timestamp", "value", "quality", "source", column])?;
        for (obs, tag) in tagged {
            wtr.serialize((
                &obs.site_id,
                format_timestamp(&obs.timestamp),
                obs.value,
                obs.quality.code(),
                obs.source.code(),
                tag,
            ))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Convert an NWIS `gwlevels` RDB table into observations.
    ///
    /// Rows without a level value are skipped; rows whose status code marks the
    /// reading as non-static are kept but flagged `Rejected`.
    pub fn from_gwlevels_rdb(table: &RdbTable) -> Result<Vec<Observation>> {
        if table.is_empty() {
            return Ok(Vec::new());
        }
        let site_no = Some(table.require_column("site_no")?);
        let lev_dt = Some(table.require_column("lev_dt")?);
        let lev_va = Some(table.require_column("lev_va")?);
        let lev_tm = table.column("lev_tm");
        let lev_status_cd = table.column("lev_status_cd");
        let lev_age_cd = table.column("lev_age_cd");

        let mut observations = Vec::new();
        for record in &table.rows {
            let (Some(site_id), Some(date)) = (field(record, site_no), field(record, lev_dt)) else {
                continue;
            };
            let Some(value) = field(record, lev_va).and_then(|v| v.parse::<f64>().ok()) else {
                debug!("Skipping gwlevels row without a level for {site_id} on {date}");
                continue;
            };
            let timestamp = gwlevels_timestamp(date, field(record, lev_tm), record)?;
            let status = field(record, lev_status_cd).unwrap_or("");
            let quality = if INVALID_STATUS_CODES.contains(&status) {
                QualityFlag::Rejected
            } else {
                match field(record, lev_age_cd) {
                    Some("P") => QualityFlag::Provisional,
                    _ => QualityFlag::Approved,
                }
            };
            observations.push(Observation {
                site_id: site_id.to_string(),
                timestamp,
                value,
                quality,
                source: DataSource::GwLevels,
            });
        }
        Ok(observations)
    }

    /// Convert an NWIS `dv` or `iv` RDB table into observations.
    ///
    /// The value column is the first one carrying the depth-to-water parameter
    /// code; its `_cd` sibling holds the qualifiers. Non-numeric cells such as
    /// `Eqp`, `Ice` or `Dry` are service outages and are skipped.
    pub fn from_timeseries_rdb(table: &RdbTable, source: DataSource) -> Result<Vec<Observation>> {
        if table.is_empty() {
            return Ok(Vec::new());
        }
        let site_no = Some(table.require_column("site_no")?);
        let datetime = Some(table.require_column("datetime")?);
        let value_column = table
            .find_column(|h| is_value_column(h, source))
            .ok_or_else(|| {
                NwisError::RdbParse(format!(
                    "no {PARAM_DEPTH_TO_WATER} value column in {source} response"
                ))
            })?;
        let value_name = table.headers[value_column].to_string();
        let qualifier_column = table.column(&format!("{value_name}_cd"));

        let mut observations = Vec::new();
        for record in &table.rows {
            let (Some(site_id), Some(stamp)) = (field(record, site_no), field(record, datetime)) else {
                continue;
            };
            let Some(value) = field(record, Some(value_column)).and_then(|v| v.parse::<f64>().ok()) else {
                continue;
            };
            let timestamp = parse_timestamp(stamp).map_err(|e| NwisError::InvalidRecord {
                line: record_line(record),
                reason: format!("bad datetime {stamp:?}: {e}"),
            })?;
            let quality = QualityFlag::from_qualifiers(field(record, qualifier_column).unwrap_or(""));
            observations.push(Observation {
                site_id: site_id.to_string(),
                timestamp,
                value,
                quality,
                source,
            });
        }
        Ok(observations)
    }
}

fn is_value_column(header: &str, source: DataSource) -> bool {
    if header.ends_with("_cd") {
        return false;
    }
    match source {
        DataSource::Daily => header.ends_with(&format!("_{PARAM_DEPTH_TO_WATER}_{STAT_DAILY_MEAN}")),
        _ => header.ends_with(&format!("_{PARAM_DEPTH_TO_WATER}")),
    }
}

fn record_line(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or_default()
}

/// gwlevels dates may be partial (`1975-06` or `1975`) for historic readings;
/// those are pinned to the first day of the month or year.
fn gwlevels_timestamp(date: &str, time: Option<&str>, record: &StringRecord) -> Result<NaiveDateTime> {
    let day = match date.len() {
        4 => format!("{date}-01-01"),
        7 => format!("{date}-01"),
        _ => date.to_string(),
    };
    let day = NaiveDate::parse_from_str(&day, YEAR_FORMAT).map_err(|e| NwisError::InvalidRecord {
        line: record_line(record),
        reason: format!("bad lev_dt {date:?}: {e}"),
    })?;
    let time = time
        .and_then(|t| NaiveTime::parse_from_str(t, "%H:%M").ok())
        .unwrap_or(NaiveTime::MIN);
    Ok(day.and_time(time))
}

#[cfg(test)]
mod test {
    use super::{DataSource, Observation, QualityFlag};
    use crate::rdb::RdbTable;
    use chrono::NaiveDate;

    // https://waterservices.usgs.gov/nwis/gwlevels/?format=rdb&sites=414501087362001&startDT=2020-01-01&endDT=2020-12-31
    const GWLEVELS_RDB: &str = "# ---------------------------------- WARNING ----------------------------------------
# Some of the data that you have obtained from this U.S. Geological Survey database
#
agency_cd\tsite_no\tsite_tp_cd\tlev_dt\tlev_tm\tlev_tz_cd\tlev_va\tsl_lev_va\tsl_datum_cd\tlev_status_cd\tlev_agency_cd\tlev_dt_acy_cd\tlev_acy_cd\tlev_src_cd\tlev_meth_cd\tlev_age_cd
5s\t15s\t6s\t10d\t5d\t5s\t12s\t12s\t10s\t1s\t5s\t1s\t1s\t1s\t1s\t1s
USGS\t414501087362001\tGW\t2020-03-12\t10:15\tUTC\t25.41\t\t\t1\tUSGS\tm\t\tS\tS\tA
USGS\t414501087362001\tGW\t2020-06-10\t\tUTC\t26.02\t\t\t\tUSGS\tD\t\tS\tS\tP
USGS\t414501087362001\tGW\t2020-09-02\t09:40\tUTC\t\t\t\tD\tUSGS\tm\t\tS\tS\tA
USGS\t414501087362001\tGW\t2020-11-18\t11:05\tUTC\t27.30\t\t\tO\tUSGS\tm\t\tS\tS\tA
USGS\t414501087362001\tGW\t1975-06\t\t\t31.5\t\t\t\tUSGS\tM\t\tS\tS\tA
";

    const DV_RDB: &str = "#
agency_cd\tsite_no\tdatetime\t150436_72019_00003\t150436_72019_00003_cd
5s\t15s\t20d\t14n\t10s
USGS\t414501087362001\t2021-01-01\t12.50\tA
USGS\t414501087362001\t2021-01-02\t12.61\tP
USGS\t414501087362001\t2021-01-03\tEqp\tP
USGS\t414501087362001\t2021-01-04\t12.40\tA:e
";

    #[test]
    fn test_gwlevels_rdb_to_observations() {
        let table = RdbTable::parse(GWLEVELS_RDB).unwrap();
        let observations = Observation::from_gwlevels_rdb(&table).unwrap();
        // the dry reading has no lev_va and is dropped
        assert_eq!(observations.len(), 4);
        assert_eq!(observations[0].site_id, "414501087362001");
        assert_eq!(observations[0].value, 25.41);
        assert_eq!(observations[0].quality, QualityFlag::Approved);
        assert_eq!(
            observations[0].timestamp,
            NaiveDate::from_ymd_opt(2020, 3, 12).unwrap().and_hms_opt(10, 15, 0).unwrap()
        );
        assert_eq!(observations[1].quality, QualityFlag::Provisional);
        assert_eq!(observations[2].quality, QualityFlag::Rejected);
        assert!(!observations[2].is_valid());
        assert_eq!(
            observations[3].date(),
            NaiveDate::from_ymd_opt(1975, 6, 1).unwrap()
        );
    }

    #[test]
    fn test_daily_values_rdb_to_observations() {
        let table = RdbTable::parse(DV_RDB).unwrap();
        let observations = Observation::from_timeseries_rdb(&table, DataSource::Daily).unwrap();
        assert_eq!(observations.len(), 3);
        assert_eq!(observations[1].quality, QualityFlag::Provisional);
        assert_eq!(observations[2].quality, QualityFlag::Estimated);
        assert!(observations.iter().all(|o| o.source == DataSource::Daily));
    }

    #[test]
    fn test_observation_csv_round_trip() {
        let csv_data = "\
site_no,timestamp,value,quality,source
414501087362001,2021-01-01,12.5,A,dv
414501087362001,2021-01-02 08:30,12.7,P,iv
415203087475601,2021-02-01,30.1,X,gwlevels
";
        let observations = Observation::parse_observation_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(observations.len(), 3);
        assert_eq!(observations[1].source, DataSource::Instantaneous);
        assert!(!observations[2].is_valid());

        let mut out = Vec::new();
        Observation::write_observation_csv(&mut out, &observations).unwrap();
        let written = String::from_utf8(out).unwrap();
        assert_eq!(written, csv_data);
    }

    #[test]
    fn test_tagged_observation_csv() {
        let csv_data = "\
site_no,timestamp,value,quality,source
414501087362001,2021-01-01,12.5,A,dv
414501087362001,2021-01-02 08:30,12.7,P,iv
";
        let observations = Observation::parse_observation_csv(csv_data.as_bytes()).unwrap();
        let tagged: Vec<(Observation, String)> = observations
            .iter()
            .cloned()
            .zip(["60601".to_string(), "60614".to_string()])
            .collect();

        let mut out = Vec::new();
        Observation::write_tagged_observation_csv(&mut out, "source_zipcode", &tagged).unwrap();
        let written = String::from_utf8(out).unwrap();
        assert_eq!(
            written,
            "site_no,timestamp,value,quality,source,source_zipcode\n\
             414501087362001,2021-01-01,12.5,A,dv,60601\n\
             414501087362001,2021-01-02 08:30,12.7,P,iv,60614\n"
        );
        // the tag column does not get in the way of reading the file back
        assert_eq!(
            Observation::parse_observation_csv(written.as_bytes()).unwrap(),
            observations
        );
    }

    #[test]
    fn test_quality_from_qualifiers() {
        assert_eq!(QualityFlag::from_qualifiers("A"), QualityFlag::Approved);
        assert_eq!(QualityFlag::from_qualifiers("P"), QualityFlag::Provisional);
        assert_eq!(QualityFlag::from_qualifiers("A:e"), QualityFlag::Estimated);
    }
}
