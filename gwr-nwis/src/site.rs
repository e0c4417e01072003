use crate::error::Result;
use crate::rdb::{field, RdbTable};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::io;

/// WGS84 point location of a monitoring site.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct SiteLocation {
    pub longitude: f64,
    pub latitude: f64,
}

/// Represents a USGS groundwater monitoring site (well) and its NWIS metadata.
///
/// See: <https://waterservices.usgs.gov/docs/site-service/>
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Site {
    /// NWIS site number (usually 15 digits for wells, e.g. "414501087362001")
    pub site_id: String,
    /// Station name as published by NWIS
    pub name: Option<String>,
    /// Decimal degrees; absent for sites listed without coordinates
    pub location: Option<SiteLocation>,
    /// State the site is in, either the two-letter code or the FIPS code NWIS reports
    pub state_code: Option<String>,
    /// NWIS site type code ("GW" for wells)
    pub site_type: Option<String>,
}

/// CSV row shared by the site catalog import and the site export.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SiteRow {
    site_no: String,
    #[serde(default)]
    station_nm: Option<String>,
    #[serde(default)]
    dec_lat_va: Option<f64>,
    #[serde(default)]
    dec_long_va: Option<f64>,
    #[serde(default)]
    state_cd: Option<String>,
    #[serde(default)]
    site_tp_cd: Option<String>,
}

impl From<SiteRow> for Site {
    fn from(row: SiteRow) -> Self {
        let location = match (row.dec_long_va, row.dec_lat_va) {
            (Some(longitude), Some(latitude)) => Some(SiteLocation {
                longitude,
                latitude,
            }),
            _ => None,
        };
        Site {
            site_id: row.site_no,
            name: row.station_nm.filter(|s| !s.is_empty()),
            location,
            state_code: row.state_cd.filter(|s| !s.is_empty()),
            site_type: row.site_tp_cd.filter(|s| !s.is_empty()),
        }
    }
}

impl From<&Site> for SiteRow {
    fn from(site: &Site) -> Self {
        SiteRow {
            site_no: site.site_id.clone(),
            station_nm: site.name.clone(),
            dec_lat_va: site.location.map(|l| l.latitude),
            dec_long_va: site.location.map(|l| l.longitude),
            state_cd: site.state_code.clone(),
            site_tp_cd: site.site_type.clone(),
        }
    }
}

impl Site {
    /// A site known only by its identifier, as given in an explicit site list.
    pub fn from_id(site_id: impl Into<String>) -> Site {
        Site {
            site_id: site_id.into(),
            name: None,
            location: None,
            state_code: None,
            site_type: None,
        }
    }

    /// A site with a location and nothing else.
    pub fn at(site_id: impl Into<String>, longitude: f64, latitude: f64) -> Site {
        Site {
            location: Some(SiteLocation {
                longitude,
                latitude,
            }),
            ..Site::from_id(site_id)
        }
    }

    /// Parse a CSV string of site data into a vector of Sites.
    ///
    /// Expected CSV columns (by header name): site_no, station_nm, dec_lat_va,
    /// dec_long_va, state_cd, site_tp_cd. Only site_no is required.
    pub fn parse_site_csv<R: io::Read>(reader: R) -> Result<Vec<Site>> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b',')
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut site_list: Vec<Site> = Vec::new();
        for row in rdr.deserialize::<SiteRow>() {
            site_list.push(row?.into());
        }
        Ok(site_list)
    }

    /// Write sites as CSV.
    pub fn write_site_csv<W: io::Write>(writer: W, sites: &[Site]) -> Result<()> {
        let rows: Vec<(&Site, Option<&str>)> = sites.iter().map(|site| (site, None)).collect();
        write_rows(writer, None, &rows)
    }

    /// Write sites as CSV with an extra `column` holding each site's tag,
    /// e.g. the zip code whose buffer selected it.
    pub fn write_tagged_site_csv<W: io::Write>(
        writer: W,
        column: &str,
        tagged: &[(Site, String)],
    ) -> Result<()> {
        let rows: Vec<(&Site, Option<&str>)> = tagged
            .iter()
            .map(|(site, tag)| (site, Some(tag.as_str())))
            .collect();
        write_rows(writer, Some(column), &rows)
    }

    /// Convert an NWIS site-service RDB table into sites.
    pub fn from_site_rdb(table: &RdbTable) -> Result<Vec<Site>> {
        if table.is_empty() {
            return Ok(Vec::new());
        }
        let site_no = Some(table.require_column("site_no")?);
        let station_nm = table.column("station_nm");
        let dec_lat_va = table.column("dec_lat_va");
        let dec_long_va = table.column("dec_long_va");
        let state_cd = table.column("state_cd");
        let site_tp_cd = table.column("site_tp_cd");

        let sites = table
            .rows
            .iter()
            .filter_map(|record| {
                let site_no = field(record, site_no)?.to_string();
                Some(Site::from(SiteRow {
                    site_no,
                    station_nm: field(record, station_nm).map(String::from),
                    dec_lat_va: field(record, dec_lat_va).and_then(|v| v.parse().ok()),
                    dec_long_va: field(record, dec_long_va).and_then(|v| v.parse().ok()),
                    state_cd: field(record, state_cd).map(String::from),
                    site_tp_cd: field(record, site_tp_cd).map(String::from),
                }))
            })
            .collect();
        Ok(sites)
    }
}

fn write_rows<W: io::Write>(
    writer: W,
    tag_column: Option<&str>,
    rows: &[(&Site, Option<&str>)],
) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    let mut header = vec![
        "site_no",
        "station_nm",
        "dec_lat_va",
        "dec_long_va",
        "state_cd",
        "site_tp_cd",
    ];
    if let Some(column) = tag_column {
        header.push(column);
    }
    wtr.write_record(&header)?;
    for (site, tag) in rows {
        let row = SiteRow::from(*site);
        let mut record = vec![
            row.site_no,
            row.station_nm.unwrap_or_default(),
            row.dec_lat_va.map(|v| v.to_string()).unwrap_or_default(),
            row.dec_long_va.map(|v| v.to_string()).unwrap_or_default(),
            row.state_cd.unwrap_or_default(),
            row.site_tp_cd.unwrap_or_default(),
        ];
        if tag_column.is_some() {
            record.push(tag.unwrap_or_default().to_string());
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Site, SiteLocation};
    use crate::rdb::RdbTable;

    #[test]
    fn test_parse_site_csv() {
        let csv_data = "\
site_no,station_nm,dec_lat_va,dec_long_va,state_cd
414501087362001,CK-01 Cook County,41.7503,-87.6006,IL
415203087475601,CK-02 Cook County,41.8675,-87.7989,17
";
        let sites = Site::parse_site_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].site_id, "414501087362001");
        assert_eq!(sites[0].name.as_deref(), Some("CK-01 Cook County"));
        assert_eq!(
            sites[0].location,
            Some(SiteLocation {
                longitude: -87.6006,
                latitude: 41.7503
            })
        );
        assert_eq!(sites[1].state_code.as_deref(), Some("17"));
        assert_eq!(sites[1].site_type, None);
    }

    #[test]
    fn test_parse_site_csv_without_coordinates() {
        let csv_data = "site_no,station_nm,dec_lat_va,dec_long_va\n0001,Nowhere,,\n";
        let sites = Site::parse_site_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(sites[0].location, None);
    }

    #[test]
    fn test_parse_empty_csv() {
        let csv_data = "site_no,station_nm,dec_lat_va,dec_long_va,state_cd\n";
        let sites = Site::parse_site_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(sites.len(), 0);
    }

    #[test]
    fn test_write_site_csv_with_tag() {
        let tagged = vec![
            (Site::at("A1", -87.5, 41.5), "60601".to_string()),
            (Site::from_id("B2"), "60602".to_string()),
        ];
        let mut out = Vec::new();
        Site::write_tagged_site_csv(&mut out, "source_zipcode", &tagged).unwrap();
        let written = String::from_utf8(out).unwrap();
        assert_eq!(
            written,
            "site_no,station_nm,dec_lat_va,dec_long_va,state_cd,site_tp_cd,source_zipcode\nA1,,41.5,-87.5,,,60601\nB2,,,,,,60602\n"
        );
    }

    #[test]
    fn test_site_csv_round_trip_keeps_metadata() {
        let mut site = Site::at("414501087362001", -87.6006, 41.7503);
        site.name = Some("CK-01, Cook County".into());
        site.state_code = Some("17".into());
        let mut out = Vec::new();
        Site::write_site_csv(&mut out, &[site.clone()]).unwrap();
        let parsed = Site::parse_site_csv(out.as_slice()).unwrap();
        assert_eq!(parsed, vec![site]);
    }

    #[test]
    fn test_site_rdb() {
        let body = "#\nagency_cd\tsite_no\tstation_nm\tsite_tp_cd\tdec_lat_va\tdec_long_va\tstate_cd\n5s\t15s\t50s\t7s\t16s\t16s\t2s\nUSGS\t414501087362001\tCK-01\tGW\t41.7503\t-87.6006\t17\n";
        let table = RdbTable::parse(body).unwrap();
        let sites = Site::from_site_rdb(&table).unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].site_type.as_deref(), Some("GW"));
        assert_eq!(sites[0].state_code.as_deref(), Some("17"));
        assert!(sites[0].location.is_some());
    }
}
