//! Ephemeris file header.

use std::str::FromStr;

use crate::{errors::ParsingError, time::jdate_to_unix};

/// Header fields of an ephemeris text file. Only the scenario epoch is
/// mandatory: every boundary and sample time in the file is an offset
/// from it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Header {
    /// Scenario epoch as a Julian date
    pub scenario_epoch_jd: f64,

    /// Scenario epoch as Unix seconds
    pub scenario_epoch_unix_s: f64,

    /// Declared coordinate system, stored verbatim ("J2000", "Fixed", ..)
    pub coordinate_system: Option<String>,

    /// Declared number of state vector rows, when present
    pub number_of_points: Option<usize>,
}

impl Header {
    /// Parses the `Epoch in JDate format:` line.
    pub(crate) fn parse_scenario_epoch(&mut self, line: &str) -> Result<(), ParsingError> {
        let value = line
            .split(':')
            .nth(1)
            .map(str::trim)
            .ok_or_else(|| ParsingError::MalformedScenarioEpoch(line.to_string()))?;

        let jdate = f64::from_str(value)
            .or(Err(ParsingError::MalformedScenarioEpoch(line.to_string())))?;

        self.scenario_epoch_jd = jdate;
        self.scenario_epoch_unix_s = jdate_to_unix(jdate);
        Ok(())
    }

    /// Parses the `CoordinateSystem` line; the declared frame is kept
    /// verbatim for the caller to interpret.
    pub(crate) fn parse_coordinate_system(&mut self, line: &str) {
        if let Some(value) = line.split_whitespace().nth(1) {
            self.coordinate_system = Some(value.to_string());
        }
    }

    /// Parses the `NumberOfEphemerisPoints` line.
    pub(crate) fn parse_number_of_points(&mut self, line: &str) {
        self.number_of_points = line
            .split_whitespace()
            .nth(1)
            .and_then(|value| usize::from_str(value).ok());
    }
}

pub(crate) fn is_scenario_epoch(line: &str) -> bool {
    line.contains("Epoch in JDate format:")
}

pub(crate) fn is_coordinate_system(line: &str) -> bool {
    line.starts_with("CoordinateSystem")
}

pub(crate) fn is_number_of_points(line: &str) -> bool {
    line.starts_with("NumberOfEphemerisPoints")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scenario_epoch() {
        let mut header = Header::default();
        header
            .parse_scenario_epoch("Epoch in JDate format:    2458119.50000000000000")
            .unwrap();

        assert_eq!(header.scenario_epoch_jd, 2458119.5);
        assert!((header.scenario_epoch_unix_s - 1514764800.0).abs() < 1e-3);

        assert!(header
            .parse_scenario_epoch("Epoch in JDate format:    not-a-number")
            .is_err());
    }

    #[test]
    fn coordinate_system() {
        let mut header = Header::default();
        header.parse_coordinate_system("CoordinateSystem          J2000");
        assert_eq!(header.coordinate_system.as_deref(), Some("J2000"));
    }

    #[test]
    fn number_of_points() {
        let mut header = Header::default();
        header.parse_number_of_points("NumberOfEphemerisPoints 1441");
        assert_eq!(header.number_of_points, Some(1441));
    }
}
