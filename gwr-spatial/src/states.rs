use crate::error::{Result, SpatialError};
use crate::geometry::BoundingBox;
use csv::ReaderBuilder;
use serde::Deserialize;

/// Embedded table of U.S. states: code, FIPS code, name and bounding box.
pub static STATES_CSV: &str = include_str!("../../fixtures/states.csv");

/// A U.S. state (or DC / Puerto Rico) with its published bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    /// Two-letter postal code, upper case
    pub code: String,
    /// Two-digit FIPS code, zero padded
    pub fips: String,
    pub name: String,
    pub bbox: BoundingBox,
}

#[derive(Debug, Deserialize)]
struct StateRow {
    code: String,
    fips: String,
    name: String,
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

impl State {
    /// True when `code` names this state, as a postal code or FIPS code.
    ///
    /// NWIS reports `state_cd` as FIPS, user input is usually the postal
    /// code, so both are accepted; FIPS codes may have lost their leading zero.
    pub fn matches(&self, code: &str) -> bool {
        let code = code.trim();
        if code.eq_ignore_ascii_case(&self.code) {
            return true;
        }
        code.parse::<u32>()
            .ok()
            .zip(self.fips.parse::<u32>().ok())
            .map(|(a, b)| a == b)
            .unwrap_or(false)
    }

    /// Every state in the embedded table.
    pub fn get_state_vector() -> Result<Vec<State>> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(STATES_CSV.as_bytes());
        let mut states = Vec::new();
        for row in rdr.deserialize::<StateRow>() {
            let row = row?;
            states.push(State {
                code: row.code.to_uppercase(),
                fips: format!("{:0>2}", row.fips),
                name: row.name,
                bbox: BoundingBox::new(row.min_lon, row.min_lat, row.max_lon, row.max_lat),
            });
        }
        Ok(states)
    }

    /// Find a state by postal code or FIPS code, case-insensitively.
    pub fn lookup(code: &str) -> Result<State> {
        State::get_state_vector()?
            .into_iter()
            .find(|s| s.matches(code))
            .ok_or_else(|| SpatialError::UnresolvableLocation(format!("state code {:?}", code)))
    }
}

#[cfg(test)]
mod tests {
    use super::State;
    use crate::error::SpatialError;

    #[test]
    fn test_state_table() {
        let states = State::get_state_vector().unwrap();
        assert_eq!(states.len(), 52);
        for state in &states {
            assert_eq!(state.code.len(), 2);
            assert_eq!(state.fips.len(), 2);
            // only Alaska reaches across the antimeridian
            assert_eq!(state.bbox.crosses_antimeridian(), state.code == "AK", "{}", state.code);
            assert!(state.bbox.min_lat < state.bbox.max_lat, "{}", state.code);
        }
    }

    #[test]
    fn test_lookup_by_code_or_fips() {
        let illinois = State::lookup("il").unwrap();
        assert_eq!(illinois.name, "Illinois");
        assert_eq!(illinois.fips, "17");
        assert_eq!(State::lookup("17").unwrap(), illinois);

        let alabama = State::lookup("1").unwrap();
        assert_eq!(alabama.code, "AL");
        assert!(alabama.matches("01"));
    }

    #[test]
    fn test_unknown_state() {
        assert!(matches!(
            State::lookup("XX"),
            Err(SpatialError::UnresolvableLocation(_))
        ));
        assert!(State::lookup("99").is_err());
    }
}
