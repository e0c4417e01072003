//! Assignment of observation timestamps to aggregation periods.
//!
//! A [`PeriodKey`] is fully determined by the timestamp and the scheme
//! (with its parameters). Keys order chronologically by the period they
//! cover, then by scheme, so keys from any scheme can be sorted together.

use crate::error::{Result, TemporalError};
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta, Weekday};
use gwr_utils::dates::{parse_month_day, water_year_for_date, water_year_start};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A fixed month/day window repeated every calendar year, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GrowingSeason {
    start: (u32, u32),
    end: (u32, u32),
}

impl Default for GrowingSeason {
    /// April 1 through September 30.
    fn default() -> Self {
        GrowingSeason {
            start: (4, 1),
            end: (9, 30),
        }
    }
}

impl GrowingSeason {
    /// Season from `start` to `end` as (month, day) pairs.
    ///
    /// The season may not wrap the calendar year; model a winter window as
    /// custom ranges instead.
    pub fn new(start: (u32, u32), end: (u32, u32)) -> Result<GrowingSeason> {
        for (month, day) in [start, end] {
            // 2000 is a leap year, so Feb 29 is accepted here
            if NaiveDate::from_ymd_opt(2000, month, day).is_none() {
                return Err(TemporalError::InvalidScheme(format!(
                    "invalid growing season day {:02}-{:02}",
                    month, day
                )));
            }
        }
        if start > end {
            return Err(TemporalError::InvalidScheme(format!(
                "growing season {:02}-{:02} to {:02}-{:02} wraps the calendar year",
                start.0, start.1, end.0, end.1
            )));
        }
        Ok(GrowingSeason { start, end })
    }

    /// Parse "MM-DD" bounds, e.g. `GrowingSeason::parse("04-01", "09-30")`.
    pub fn parse(start: &str, end: &str) -> Result<GrowingSeason> {
        let start = parse_month_day(start).map_err(|e| TemporalError::InvalidScheme(e.to_string()))?;
        let end = parse_month_day(end).map_err(|e| TemporalError::InvalidScheme(e.to_string()))?;
        GrowingSeason::new(start, end)
    }

    /// First and last day of the season in `year`. Feb 29 bounds fall back to
    /// Mar 1 (start) or Feb 28 (end) outside leap years.
    pub fn span_in(&self, year: i32) -> Option<(NaiveDate, NaiveDate)> {
        let start = NaiveDate::from_ymd_opt(year, self.start.0, self.start.1)
            .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))?;
        let end = NaiveDate::from_ymd_opt(year, self.end.0, self.end.1)
            .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))?;
        Some((start, end))
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        self.span_in(date.year())
            .map(|(start, end)| *date >= start && *date <= end)
            .unwrap_or(false)
    }
}

impl fmt::Display for GrowingSeason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}-{:02}..{:02}-{:02}",
            self.start.0, self.start.1, self.end.0, self.end.1
        )
    }
}

/// Inclusive date range used by the custom scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<DateSpan> {
        if start > end {
            return Err(TemporalError::InvalidScheme(format!(
                "range starts {} after it ends {}",
                start, end
            )));
        }
        Ok(DateSpan { start, end })
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        *date >= self.start && *date <= self.end
    }
}

/// How timestamps are bucketed into periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationScheme {
    /// Calendar month
    Monthly,
    /// Calendar year
    Annual,
    /// U.S. water year, Oct 1 to Sep 30
    WaterYear,
    /// Same window each year; timestamps outside it are excluded
    GrowingSeason(GrowingSeason),
    /// Caller-supplied ranges; the first range containing a timestamp wins
    Custom(Vec<DateSpan>),
    /// ISO 8601 week
    Weekly,
}

impl AggregationScheme {
    /// Custom scheme over at least one range.
    pub fn custom(spans: Vec<DateSpan>) -> Result<AggregationScheme> {
        if spans.is_empty() {
            return Err(TemporalError::InvalidScheme(
                "custom scheme needs at least one date range".into(),
            ));
        }
        Ok(AggregationScheme::Custom(spans))
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregationScheme::Monthly => "monthly",
            AggregationScheme::Annual => "annual",
            AggregationScheme::WaterYear => "water_year",
            AggregationScheme::GrowingSeason(_) => "growing_season",
            AggregationScheme::Custom(_) => "custom",
            AggregationScheme::Weekly => "weekly",
        }
    }
}

impl FromStr for AggregationScheme {
    type Err = TemporalError;

    /// Parse a scheme name. The growing season gets its default window;
    /// custom schemes carry ranges and cannot be named alone.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "monthly" | "month" => Ok(AggregationScheme::Monthly),
            "annual" | "yearly" | "year" => Ok(AggregationScheme::Annual),
            "water_year" | "wy" => Ok(AggregationScheme::WaterYear),
            "growing_season" | "gs" => Ok(AggregationScheme::GrowingSeason(GrowingSeason::default())),
            "weekly" | "week" => Ok(AggregationScheme::Weekly),
            other => Err(TemporalError::UnknownName {
                kind: "aggregation scheme",
                value: other.to_string(),
            }),
        }
    }
}

/// Which period a key stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Month { year: i32, month: u32 },
    Year(i32),
    WaterYear(i32),
    GrowingSeason(i32),
    /// Index of the matching range in caller order
    Custom(usize),
    Week { iso_year: i32, week: u32 },
}

impl PeriodKind {
    fn rank(&self) -> u8 {
        match self {
            PeriodKind::Month { .. } => 0,
            PeriodKind::Year(_) => 1,
            PeriodKind::WaterYear(_) => 2,
            PeriodKind::GrowingSeason(_) => 3,
            PeriodKind::Custom(_) => 4,
            PeriodKind::Week { .. } => 5,
        }
    }

    fn custom_index(&self) -> usize {
        match self {
            PeriodKind::Custom(i) => *i,
            _ => 0,
        }
    }
}

/// Label of one aggregation period together with the days it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PeriodKey {
    kind: PeriodKind,
    start: NaiveDate,
    end_exclusive: NaiveDate,
}

impl PeriodKey {
    fn spanning(kind: PeriodKind, start: NaiveDate, end_exclusive: NaiveDate) -> PeriodKey {
        PeriodKey {
            kind,
            start,
            end_exclusive,
        }
    }

    pub fn month(year: i32, month: u32) -> Option<PeriodKey> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = start.checked_add_months(Months::new(1))?;
        Some(PeriodKey::spanning(PeriodKind::Month { year, month }, start, end))
    }

    pub fn year(year: i32) -> Option<PeriodKey> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
        Some(PeriodKey::spanning(PeriodKind::Year(year), start, end))
    }

    pub fn water_year(water_year: i32) -> Option<PeriodKey> {
        let start = water_year_start(water_year)?;
        let end = NaiveDate::from_ymd_opt(water_year, 10, 1)?;
        Some(PeriodKey::spanning(PeriodKind::WaterYear(water_year), start, end))
    }

    pub fn growing_season(year: i32, season: &GrowingSeason) -> Option<PeriodKey> {
        let (start, last) = season.span_in(year)?;
        let end = last.succ_opt()?;
        Some(PeriodKey::spanning(PeriodKind::GrowingSeason(year), start, end))
    }

    pub fn custom(index: usize, span: &DateSpan) -> Option<PeriodKey> {
        let end = span.end.succ_opt()?;
        Some(PeriodKey::spanning(PeriodKind::Custom(index), span.start, end))
    }

    pub fn week(iso_year: i32, week: u32) -> Option<PeriodKey> {
        let start = NaiveDate::from_isoywd_opt(iso_year, week, Weekday::Mon)?;
        let end = start.checked_add_signed(TimeDelta::try_days(7)?)?;
        Some(PeriodKey::spanning(PeriodKind::Week { iso_year, week }, start, end))
    }

    pub fn kind(&self) -> PeriodKind {
        self.kind
    }

    /// First day of the period.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Day after the last day of the period.
    pub fn end_exclusive(&self) -> NaiveDate {
        self.end_exclusive
    }

    pub fn length_days(&self) -> i64 {
        (self.end_exclusive - self.start).num_days()
    }

    /// Instant halfway through the period, used as its position on a time axis.
    pub fn midpoint(&self) -> NaiveDateTime {
        let start = self.start.and_time(chrono::NaiveTime::MIN);
        let end = self.end_exclusive.and_time(chrono::NaiveTime::MIN);
        start + (end - start) / 2
    }
}

impl Ord for PeriodKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start
            .cmp(&other.start)
            .then(self.end_exclusive.cmp(&other.end_exclusive))
            .then(self.kind.rank().cmp(&other.kind.rank()))
            .then(self.kind.custom_index().cmp(&other.kind.custom_index()))
    }
}

impl PartialOrd for PeriodKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PeriodKind::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
            PeriodKind::Year(year) => write!(f, "{:04}", year),
            PeriodKind::WaterYear(year) => write!(f, "WY{:04}", year),
            PeriodKind::GrowingSeason(year) => write!(f, "GS{:04}", year),
            PeriodKind::Custom(index) => write!(f, "R{}", index),
            PeriodKind::Week { iso_year, week } => write!(f, "{:04}-W{:02}", iso_year, week),
        }
    }
}

/// Map a timestamp to its period under `scheme`, or `None` when the scheme
/// excludes it (outside the growing season or every custom range).
pub fn assign_period(timestamp: &NaiveDateTime, scheme: &AggregationScheme) -> Option<PeriodKey> {
    let date = timestamp.date();
    match scheme {
        AggregationScheme::Monthly => PeriodKey::month(date.year(), date.month()),
        AggregationScheme::Annual => PeriodKey::year(date.year()),
        AggregationScheme::WaterYear => PeriodKey::water_year(water_year_for_date(&date)),
        AggregationScheme::GrowingSeason(season) => {
            if season.contains(&date) {
                PeriodKey::growing_season(date.year(), season)
            } else {
                None
            }
        }
        AggregationScheme::Custom(spans) => spans
            .iter()
            .position(|span| span.contains(&date))
            .and_then(|index| PeriodKey::custom(index, &spans[index])),
        AggregationScheme::Weekly => {
            let week = date.iso_week();
            PeriodKey::week(week.year(), week.week())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_water_year_boundaries() {
        let scheme = AggregationScheme::WaterYear;
        let october = assign_period(&at(2021, 10, 15), &scheme).unwrap();
        let march = assign_period(&at(2022, 3, 1), &scheme).unwrap();
        let september = assign_period(&at(2021, 9, 30), &scheme).unwrap();
        assert_eq!(october, march);
        assert_eq!(october.kind(), PeriodKind::WaterYear(2022));
        assert_eq!(september.kind(), PeriodKind::WaterYear(2021));
        assert_eq!(october.start(), date(2021, 10, 1));
        assert_eq!(october.end_exclusive(), date(2022, 10, 1));
        assert_eq!(october.length_days(), 365);
        assert_eq!(october.to_string(), "WY2022");
    }

    #[test]
    fn test_monthly_and_annual() {
        let key = assign_period(&at(2024, 2, 29), &AggregationScheme::Monthly).unwrap();
        assert_eq!(key.kind(), PeriodKind::Month { year: 2024, month: 2 });
        assert_eq!(key.length_days(), 29);
        assert_eq!(key.to_string(), "2024-02");

        let december = PeriodKey::month(2021, 12).unwrap();
        assert_eq!(december.end_exclusive(), date(2022, 1, 1));

        let year = assign_period(&at(2021, 12, 31), &AggregationScheme::Annual).unwrap();
        assert_eq!(year, PeriodKey::year(2021).unwrap());
        assert_eq!(year.length_days(), 365);
        assert_eq!(year.to_string(), "2021");
    }

    #[test]
    fn test_weekly_iso_year_boundary() {
        let key = assign_period(&at(2021, 1, 3), &AggregationScheme::Weekly).unwrap();
        assert_eq!(
            key.kind(),
            PeriodKind::Week {
                iso_year: 2020,
                week: 53
            }
        );
        assert_eq!(key.start(), date(2020, 12, 28));
        assert_eq!(key.to_string(), "2020-W53");

        let monday = assign_period(&at(2021, 1, 4), &AggregationScheme::Weekly).unwrap();
        assert_eq!(monday.to_string(), "2021-W01");
        assert_eq!(monday.length_days(), 7);
        assert!(key < monday);
    }

    #[test]
    fn test_growing_season_exclusion() {
        let scheme = AggregationScheme::GrowingSeason(GrowingSeason::default());
        assert!(assign_period(&at(2021, 3, 31), &scheme).is_none());
        assert!(assign_period(&at(2021, 10, 1), &scheme).is_none());
        let april = assign_period(&at(2021, 4, 1), &scheme).unwrap();
        let september = assign_period(&at(2021, 9, 30), &scheme).unwrap();
        assert_eq!(april, september);
        assert_eq!(april.to_string(), "GS2021");
        assert_eq!(april.length_days(), 183);
    }

    #[test]
    fn test_growing_season_validation() {
        assert!(matches!(
            GrowingSeason::new((11, 1), (3, 31)),
            Err(TemporalError::InvalidScheme(_))
        ));
        assert!(GrowingSeason::new((2, 30), (3, 31)).is_err());
        let season = GrowingSeason::parse("05-15", "08-31").unwrap();
        assert!(season.contains(&date(2021, 5, 15)));
        assert!(!season.contains(&date(2021, 5, 14)));
        assert!(GrowingSeason::parse("11-01", "03-31").is_err());
        assert!(GrowingSeason::parse("spring", "03-31").is_err());
    }

    #[test]
    fn test_growing_season_leap_day_bounds() {
        let season = GrowingSeason::new((2, 29), (6, 30)).unwrap();
        assert_eq!(season.span_in(2021).unwrap().0, date(2021, 3, 1));
        assert_eq!(season.span_in(2024).unwrap().0, date(2024, 2, 29));
    }

    #[test]
    fn test_custom_first_match_wins() {
        let scheme = AggregationScheme::custom(vec![
            DateSpan::new(date(2021, 1, 1), date(2021, 6, 30)).unwrap(),
            DateSpan::new(date(2021, 4, 1), date(2021, 12, 31)).unwrap(),
        ])
        .unwrap();
        let june = assign_period(&at(2021, 6, 15), &scheme).unwrap();
        assert_eq!(june.kind(), PeriodKind::Custom(0));
        assert_eq!(june.to_string(), "R0");
        let july = assign_period(&at(2021, 7, 1), &scheme).unwrap();
        assert_eq!(july.kind(), PeriodKind::Custom(1));
        assert!(assign_period(&at(2022, 1, 1), &scheme).is_none());
        assert_eq!(june.length_days(), 181);
    }

    #[test]
    fn test_custom_scheme_validation() {
        assert!(AggregationScheme::custom(vec![]).is_err());
        assert!(DateSpan::new(date(2021, 2, 1), date(2021, 1, 1)).is_err());
    }

    #[test]
    fn test_chronological_order_not_tag_order() {
        // a later month sorts after an earlier week, whatever the tag
        let mut keys = vec![
            PeriodKey::month(2021, 3).unwrap(),
            PeriodKey::week(2021, 2).unwrap(),
            PeriodKey::water_year(2021).unwrap(),
            PeriodKey::month(2021, 1).unwrap(),
        ];
        keys.sort();
        let labels: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(labels, vec!["WY2021", "2021-01", "2021-W02", "2021-03"]);
    }

    #[test]
    fn test_midpoint() {
        let key = PeriodKey::month(2021, 4).unwrap();
        assert_eq!(key.midpoint(), date(2021, 4, 16).and_hms_opt(0, 0, 0).unwrap());
        let february = PeriodKey::month(2021, 2).unwrap();
        assert_eq!(february.midpoint(), date(2021, 2, 15).and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn test_scheme_names() {
        assert_eq!("monthly".parse::<AggregationScheme>().unwrap(), AggregationScheme::Monthly);
        assert_eq!(
            "water-year".parse::<AggregationScheme>().unwrap(),
            AggregationScheme::WaterYear
        );
        assert_eq!(
            "growing_season".parse::<AggregationScheme>().unwrap(),
            AggregationScheme::GrowingSeason(GrowingSeason::default())
        );
        assert!("custom".parse::<AggregationScheme>().is_err());
        assert_eq!(AggregationScheme::Weekly.name(), "weekly");
    }
}
