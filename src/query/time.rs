//! Query time bounds
//!
//! Range queries only accept instants that carry an offset. A
//! [`Timestamp`] can still hold a naive value so that callers get a
//! validation error instead of a silently assumed timezone.

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Zoned(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl Timestamp {
    /// Return the instant in UTC, rejecting naive values
    pub fn require_zoned(&self, name: &str) -> Result<DateTime<Utc>> {
        match self {
            Timestamp::Zoned(dt) => Ok(dt.with_timezone(&Utc)),
            Timestamp::Naive(naive) => Err(Error::Validation(format!(
                "datetimes must be timezone aware: {} = {} has no offset",
                name, naive
            ))),
        }
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Timestamp {
    fn from(dt: DateTime<Tz>) -> Self {
        Timestamp::Zoned(dt.fixed_offset())
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(naive: NaiveDateTime) -> Self {
        Timestamp::Naive(naive)
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    /// RFC 3339 with an offset parses as zoned; the same shape without one
    /// parses as naive.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Timestamp::Zoned(dt));
        }

        const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .map(Timestamp::Naive)
            .ok_or_else(|| Error::Validation(format!("unrecognised timestamp: '{}'", s)))
    }
}

/// Format an instant the way Flux `range()` expects it
pub fn flux_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::NaiveDate;

    #[test]
    fn test_zoned_is_normalised_to_utc() {
        let ts: Timestamp = "2026-01-01T02:00:00+02:00".parse().unwrap();
        let utc = ts.require_zoned("start").unwrap();
        assert_eq!(flux_time(&utc), "2026-01-01T00:00:00Z");
    }

    #[test]
    fn test_naive_is_rejected() {
        let naive = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let err = Timestamp::from(naive).require_zoned("start").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("timezone aware"));
    }

    #[test]
    fn test_parse_naive_text() {
        let ts: Timestamp = "2026-01-01T00:00:00".parse().unwrap();
        assert!(matches!(ts, Timestamp::Naive(_)));

        let ts: Timestamp = "2026-01-01 12:30:00.5".parse().unwrap();
        assert!(matches!(ts, Timestamp::Naive(_)));

        assert!("yesterday".parse::<Timestamp>().is_err());
    }

    #[test]
    fn test_flux_time_keeps_subseconds() {
        let dt = DateTime::parse_from_rfc3339("2026-03-04T05:06:07.123456Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(flux_time(&dt), "2026-03-04T05:06:07.123456Z");
    }
}
