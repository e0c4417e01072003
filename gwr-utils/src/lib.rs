//! Shared utility functions for GWR crates.

/// Date utility functions
pub mod dates {
    use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

    /// Format a NaiveDate as "YYYY-MM-DD"
    pub fn format_date(date: &NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    /// Format a NaiveDateTime as "YYYY-MM-DD HH:MM", dropping the time when it is midnight.
    pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
        if timestamp.time() == NaiveTime::MIN {
            format_date(&timestamp.date())
        } else {
            timestamp.format("%Y-%m-%d %H:%M").to_string()
        }
    }

    /// Parse a date string in "YYYY-MM-DD" format
    pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")?)
    }

    /// Parse a timestamp written either as a bare date or as a date with a time of day.
    ///
    /// Accepted forms: `YYYY-MM-DD`, `YYYY-MM-DD HH:MM`, `YYYY-MM-DD HH:MM:SS`
    /// and the `T`-separated variants of the last two.
    pub fn parse_timestamp(s: &str) -> anyhow::Result<NaiveDateTime> {
        let s = s.trim();
        for format in [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%Y-%m-%dT%H:%M",
        ] {
            if let Ok(timestamp) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(timestamp);
            }
        }
        Ok(parse_date(s)?.and_time(NaiveTime::MIN))
    }

    /// Parse a "MM-DD" month/day pair, validated against a leap year so "02-29" is accepted.
    pub fn parse_month_day(s: &str) -> anyhow::Result<(u32, u32)> {
        let (month, day) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("expected MM-DD, got {s:?}"))?;
        let month: u32 = month.parse()?;
        let day: u32 = day.parse()?;
        if NaiveDate::from_ymd_opt(2000, month, day).is_none() {
            anyhow::bail!("invalid month/day: {s:?}");
        }
        Ok((month, day))
    }

    /// Get the U.S. water year for a given date.
    /// Water year runs Oct 1 to Sep 30 and is labeled by the calendar year it ends in.
    /// e.g., Oct 1 2021 -> water year 2022, Sep 30 2022 -> water year 2022
    pub fn water_year_for_date(date: &NaiveDate) -> i32 {
        let month = date.month();
        let year = date.year();
        if month >= 10 {
            year + 1
        } else {
            year
        }
    }

    /// First day (Oct 1 of the previous calendar year) of a water year.
    pub fn water_year_start(water_year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(water_year - 1, 10, 1)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::NaiveDate;

        #[test]
        fn test_water_year_for_date() {
            let oct15 = NaiveDate::from_ymd_opt(2021, 10, 15).unwrap();
            assert_eq!(water_year_for_date(&oct15), 2022);

            let mar1 = NaiveDate::from_ymd_opt(2022, 3, 1).unwrap();
            assert_eq!(water_year_for_date(&mar1), 2022);

            let sep30 = NaiveDate::from_ymd_opt(2021, 9, 30).unwrap();
            assert_eq!(water_year_for_date(&sep30), 2021);
        }

        #[test]
        fn test_water_year_bounds() {
            assert_eq!(
                water_year_start(2022),
                NaiveDate::from_ymd_opt(2021, 10, 1)
            );
        }

        #[test]
        fn test_format_and_parse() {
            let date = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
            let formatted = format_date(&date);
            assert_eq!(formatted, "2023-06-15");
            let parsed = parse_date(&formatted).unwrap();
            assert_eq!(parsed, date);
        }

        #[test]
        fn test_parse_timestamp_forms() {
            let midnight = parse_timestamp("2023-06-15").unwrap();
            assert_eq!(format_timestamp(&midnight), "2023-06-15");

            let with_time = parse_timestamp("2023-06-15 08:30").unwrap();
            assert_eq!(format_timestamp(&with_time), "2023-06-15 08:30");

            let iso = parse_timestamp("2023-06-15T08:30:00").unwrap();
            assert_eq!(iso, with_time);

            assert!(parse_timestamp("15/06/2023").is_err());
        }

        #[test]
        fn test_parse_month_day() {
            assert_eq!(parse_month_day("04-01").unwrap(), (4, 1));
            assert_eq!(parse_month_day("02-29").unwrap(), (2, 29));
            assert!(parse_month_day("13-01").is_err());
            assert!(parse_month_day("0401").is_err());
        }
    }
}
