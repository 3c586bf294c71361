//! UTC and Julian date conversions.

use hifitime::Epoch;

use crate::errors::InputError;

/// Parses a `YYYYMMDDTHH:MM:SS.sss` UTC timestamp into Unix seconds.
/// Fractional digits are accepted but truncated: the epoch representation
/// is whole seconds, as in the rest of the pipeline.
///
/// Timestamps before 1970-01-01 are rejected with
/// [InputError::TimestampBeforeEpoch].
pub fn utc_to_unix(timestamp: &str) -> Result<f64, InputError> {
    let malformed = || InputError::MalformedTimestamp(timestamp.to_string());

    let (date, clock) = timestamp.split_once('T').ok_or_else(malformed)?;

    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    let year = date[0..4].parse::<i32>().or(Err(malformed()))?;
    let month = date[4..6].parse::<u8>().or(Err(malformed()))?;
    let day = date[6..8].parse::<u8>().or(Err(malformed()))?;

    let mut fields = clock.split(':');
    let hour = fields
        .next()
        .and_then(|v| v.parse::<u8>().ok())
        .ok_or_else(malformed)?;
    let minute = fields
        .next()
        .and_then(|v| v.parse::<u8>().ok())
        .ok_or_else(malformed)?;
    let second = fields
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(malformed)?;

    if fields.next().is_some() || !(0.0..60.0).contains(&second) {
        return Err(malformed());
    }

    let epoch =
        Epoch::maybe_from_gregorian_utc(year, month, day, hour, minute, second as u8, 0)
            .or(Err(malformed()))?;

    let unix_s = epoch.to_unix_seconds();
    if unix_s < 0.0 {
        return Err(InputError::TimestampBeforeEpoch(timestamp.to_string()));
    }

    Ok(unix_s)
}

/// Converts a Julian date (days since -4712-01-01 noon) to Unix seconds.
pub fn jdate_to_unix(jdate: f64) -> f64 {
    Epoch::from_jde_utc(jdate).to_unix_seconds()
}

/// Formats Unix seconds as a `YYYYMMDDTHH:MM:SS.sss` UTC timestamp,
/// the inverse of [utc_to_unix] at millisecond resolution.
pub fn unix_to_utc(unix_s: f64) -> String {
    let (y, m, d, hh, mm, ss, nanos) = Epoch::from_unix_seconds(unix_s).to_gregorian_utc();
    format!(
        "{:04}{:02}{:02}T{:02}:{:02}:{:02}.{:03}",
        y,
        m,
        d,
        hh,
        mm,
        ss,
        nanos / 1_000_000,
    )
}
