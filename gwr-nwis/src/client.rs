//! Async client for the USGS NWIS water services.
//!
//! Requests are sent in batches of site numbers, one batch at a time, with a
//! short pause between batches. A failed request is retried with exponential
//! backoff; once the retries are exhausted the last error is returned to the
//! caller unchanged.

use crate::{
    error::{NwisError, Result},
    observation::{DataSource, Observation, PARAM_DEPTH_TO_WATER, STAT_DAILY_MEAN, YEAR_FORMAT},
    rdb::RdbTable,
    site::Site,
};
use chrono::NaiveDate;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Base URL of the NWIS water services.
pub const NWIS_BASE_URL: &str = "https://waterservices.usgs.gov/nwis";

/// Maximum number of site numbers per request.
pub const SITES_PER_REQUEST: usize = 100;

/// Bounding box for a site-service query: (min_lon, min_lat, max_lon, max_lat).
pub type BoundingBoxQuery = (f64, f64, f64, f64);

/// Client for the NWIS `gwlevels`, `dv`, `iv` and `site` services.
#[derive(Debug, Clone)]
pub struct NwisClient {
    client: Client,
    base_url: String,
    max_tries: u32,
    initial_backoff: Duration,
    pause_between_batches: Duration,
}

impl NwisClient {
    pub fn new() -> Result<NwisClient> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(NwisClient {
            client,
            base_url: NWIS_BASE_URL.to_string(),
            max_tries: 3,
            initial_backoff: Duration::from_millis(1000),
            pause_between_batches: Duration::from_millis(500),
        })
    }

    /// Point the client at another host, e.g. a local mirror.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> NwisClient {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retries(mut self, max_tries: u32, initial_backoff: Duration) -> NwisClient {
        self.max_tries = max_tries.max(1);
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn with_pause(mut self, pause_between_batches: Duration) -> NwisClient {
        self.pause_between_batches = pause_between_batches;
        self
    }

    /// Fetch all observations for the given sites and inclusive date range from one service.
    pub async fn fetch_observations(
        &self,
        site_ids: &[String],
        start_date: &NaiveDate,
        end_date: &NaiveDate,
        source: DataSource,
    ) -> Result<Vec<Observation>> {
        let mut observations = Vec::new();
        let batches: Vec<&[String]> = site_ids.chunks(SITES_PER_REQUEST).collect();
        for (i, batch) in batches.iter().enumerate() {
            let url = self.observation_url(batch, start_date, end_date, source);
            info!(
                "Fetching {} batch {}/{} ({} sites)",
                source,
                i + 1,
                batches.len(),
                batch.len()
            );
            let body = self.get_with_retry(&url).await?;
            let table = RdbTable::parse(&body)?;
            let mut batch_observations = match source {
                DataSource::GwLevels => Observation::from_gwlevels_rdb(&table)?,
                DataSource::Daily | DataSource::Instantaneous => {
                    Observation::from_timeseries_rdb(&table, source)?
                }
            };
            debug!("  {} observations in batch {}", batch_observations.len(), i + 1);
            observations.append(&mut batch_observations);

            if i + 1 < batches.len() {
                tokio::time::sleep(self.pause_between_batches).await;
            }
        }
        Ok(observations)
    }

    /// Fetch observations from several services and concatenate them.
    pub async fn fetch_from_sources(
        &self,
        site_ids: &[String],
        start_date: &NaiveDate,
        end_date: &NaiveDate,
        sources: &[DataSource],
    ) -> Result<Vec<Observation>> {
        let mut observations = Vec::new();
        for source in sources {
            let mut fetched = self
                .fetch_observations(site_ids, start_date, end_date, *source)
                .await?;
            observations.append(&mut fetched);
        }
        Ok(observations)
    }

    /// All groundwater sites, optionally restricted to one state (two-letter code).
    pub async fn all_sites(&self, state_code: Option<&str>) -> Result<Vec<Site>> {
        let mut url = format!(
            "{}/site/?format=rdb&siteType=GW&siteOutput=expanded&siteStatus=all",
            self.base_url
        );
        if let Some(state) = state_code {
            url.push_str(&format!("&stateCd={}", state.trim().to_lowercase()));
        }
        let body = self.get_with_retry(&url).await?;
        Site::from_site_rdb(&RdbTable::parse(&body)?)
    }

    /// Groundwater sites inside a lon/lat bounding box.
    pub async fn sites_in_bbox(&self, bbox: BoundingBoxQuery) -> Result<Vec<Site>> {
        let (min_lon, min_lat, max_lon, max_lat) = bbox;
        let url = format!(
            "{}/site/?format=rdb&siteType=GW&siteOutput=expanded&siteStatus=all&bBox={:.6},{:.6},{:.6},{:.6}",
            self.base_url, min_lon, min_lat, max_lon, max_lat
        );
        let body = self.get_with_retry(&url).await?;
        Site::from_site_rdb(&RdbTable::parse(&body)?)
    }

    fn observation_url(
        &self,
        site_ids: &[String],
        start_date: &NaiveDate,
        end_date: &NaiveDate,
        source: DataSource,
    ) -> String {
        let mut url = format!(
            "{}/{}/?format=rdb&sites={}&startDT={}&endDT={}&siteStatus=all",
            self.base_url,
            source.code(),
            site_ids.join(","),
            start_date.format(YEAR_FORMAT),
            end_date.format(YEAR_FORMAT)
        );
        match source {
            DataSource::GwLevels => {}
            DataSource::Daily => url.push_str(&format!(
                "&parameterCd={PARAM_DEPTH_TO_WATER}&statCd={STAT_DAILY_MEAN}"
            )),
            DataSource::Instantaneous => {
                url.push_str(&format!("&parameterCd={PARAM_DEPTH_TO_WATER}"))
            }
        }
        url
    }

    async fn get_with_retry(&self, url: &str) -> Result<String> {
        let mut sleep_duration = self.initial_backoff;
        let mut last_error = None;

        for attempt in 1..=self.max_tries {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    // NWIS answers 404 when nothing matches the query
                    if status == StatusCode::NOT_FOUND {
                        return Ok(String::new());
                    }
                    if status.is_success() {
                        match response.text().await {
                            Ok(body) => return Ok(body),
                            Err(e) => {
                                warn!(
                                    "Attempt {}/{}: Failed to read response body for {}: {}",
                                    attempt, self.max_tries, url, e
                                );
                                last_error = Some(NwisError::from(e));
                            }
                        }
                    } else {
                        warn!(
                            "Attempt {}/{}: Bad response status for {}: {}",
                            attempt, self.max_tries, url, status
                        );
                        last_error = Some(NwisError::Status {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        "Attempt {}/{}: Request failed for {}: {}",
                        attempt, self.max_tries, url, e
                    );
                    last_error = Some(NwisError::from(e));
                }
            }

            if attempt < self.max_tries {
                info!(
                    "Sleeping for {} milliseconds before retry",
                    sleep_duration.as_millis()
                );
                tokio::time::sleep(sleep_duration).await;
                sleep_duration *= 2;
            }
        }

        warn!("All attempts failed for {}", url);
        Err(last_error.unwrap_or_else(|| NwisError::Status {
            url: url.to_string(),
            status: 0,
        }))
    }
}
