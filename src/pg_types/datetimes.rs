use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::SqlCaddyError;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

#[must_use]
pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

#[must_use]
pub fn local_now() -> DateTime<Local> {
    Local::now()
}

/// Drop the zone, keeping the wall-clock reading.
#[must_use]
pub fn naive<Tz: TimeZone>(dt: &DateTime<Tz>) -> NaiveDateTime {
    dt.naive_local()
}

/// The same instant expressed in UTC.
#[must_use]
pub fn vanilla<Tz: TimeZone>(dt: &DateTime<Tz>) -> DateTime<Utc> {
    dt.with_timezone(&Utc)
}

/// Time of day from either a bare time (`12:34:56`) or a full timestamp.
///
/// # Errors
/// Returns `SqlCaddyError::ParameterError` when no known format matches.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime, SqlCaddyError> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.time())
        .or_else(|| {
            TIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
        })
        .ok_or_else(|| SqlCaddyError::ParameterError(format!("cannot parse time of day {s:?}")))
}

/// Interpret `date` + `time` as a wall-clock reading in `tz`.
///
/// Ambiguous readings (clocks turned back) resolve to the earlier instant;
/// readings inside a skipped hour yield `None`.
#[must_use]
pub fn combine_date_and_time<Tz: TimeZone>(
    date: NaiveDate,
    time: NaiveTime,
    tz: &Tz,
) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&date.and_time(time)).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike};

    #[test]
    fn time_of_day_from_timestamp() {
        let tod = parse_time_of_day("2015-01-01 12:34:56").unwrap();
        assert_eq!(tod.to_string(), "12:34:56");
        let tod = parse_time_of_day("07:08").unwrap();
        assert_eq!((tod.hour(), tod.minute()), (7, 8));
        assert!(parse_time_of_day("noon").is_err());
    }

    #[test]
    fn combine_in_utc() {
        let date = NaiveDate::from_ymd_opt(2017, 1, 1).unwrap();
        let tod = parse_time_of_day("12:34:56").unwrap();
        let dt = combine_date_and_time(date, tod, &Utc).unwrap();
        assert_eq!(dt.to_string(), "2017-01-01 12:34:56 UTC");
    }

    #[test]
    fn naive_and_vanilla() {
        let melbourne = FixedOffset::east_opt(11 * 3600).unwrap();
        let date = NaiveDate::from_ymd_opt(2017, 12, 31).unwrap();
        let time = NaiveTime::from_hms_opt(23, 34, 45).unwrap();
        let dt = combine_date_and_time(date, time, &melbourne).unwrap();

        assert_eq!(naive(&dt), date.and_time(time));
        let utc = vanilla(&dt);
        assert_eq!(utc.hour(), 12);
        assert_eq!(utc, dt);
    }

    #[test]
    fn now_helpers_agree() {
        let utc = utc_now();
        let local = local_now();
        assert!((vanilla(&local) - utc).num_seconds().abs() < 5);
    }
}
