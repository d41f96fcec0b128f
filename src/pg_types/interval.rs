use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes::{self, BufMut};

use crate::error::SqlCaddyError;

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;

/// A calendar interval, field by field.
///
/// Fields are independent until [`Interval::normalized`] carries overflow
/// upward (microseconds into seconds, ..., hours into days, months into
/// years). Days are never folded into months since month length varies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub years: i64,
    pub months: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub microseconds: i64,
}

impl Interval {
    #[must_use]
    pub fn with_years(mut self, years: i64) -> Self {
        self.years += years;
        self
    }

    #[must_use]
    pub fn with_months(mut self, months: i64) -> Self {
        self.months += months;
        self
    }

    #[must_use]
    pub fn with_weeks(mut self, weeks: i64) -> Self {
        self.days += weeks * 7;
        self
    }

    #[must_use]
    pub fn with_days(mut self, days: i64) -> Self {
        self.days += days;
        self
    }

    #[must_use]
    pub fn with_hours(mut self, hours: i64) -> Self {
        self.hours += hours;
        self
    }

    #[must_use]
    pub fn with_minutes(mut self, minutes: i64) -> Self {
        self.minutes += minutes;
        self
    }

    #[must_use]
    pub fn with_seconds(mut self, seconds: i64) -> Self {
        self.seconds += seconds;
        self
    }

    #[must_use]
    pub fn with_microseconds(mut self, microseconds: i64) -> Self {
        self.microseconds += microseconds;
        self
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Interval::default()
    }

    /// Carry overflowing fields into the next larger unit, truncating toward
    /// zero so each field keeps the sign of its input.
    #[must_use]
    pub fn normalized(self) -> Self {
        let mut out = self;
        carry(&mut out.microseconds, &mut out.seconds, MICROS_PER_SECOND);
        carry(&mut out.seconds, &mut out.minutes, 60);
        carry(&mut out.minutes, &mut out.hours, 60);
        carry(&mut out.hours, &mut out.days, 24);
        carry(&mut out.months, &mut out.years, 12);
        out
    }

    /// Total clock time in microseconds (hours and below).
    fn clock_micros(&self) -> i64 {
        self.hours * MICROS_PER_HOUR
            + self.minutes * MICROS_PER_MINUTE
            + self.seconds * MICROS_PER_SECOND
            + self.microseconds
    }

    fn from_wire(months: i32, days: i32, micros: i64) -> Self {
        let months = i64::from(months);
        Interval {
            years: months / 12,
            months: months % 12,
            days: i64::from(days),
            hours: micros / MICROS_PER_HOUR,
            minutes: (micros % MICROS_PER_HOUR) / MICROS_PER_MINUTE,
            seconds: (micros % MICROS_PER_MINUTE) / MICROS_PER_SECOND,
            microseconds: micros % MICROS_PER_SECOND,
        }
    }
}

fn carry(value: &mut i64, next: &mut i64, limit: i64) {
    if value.abs() >= limit {
        *next += *value / limit;
        *value %= limit;
    }
}

impl fmt::Display for Interval {
    /// `N unit` pairs for every non-zero field, e.g. `7 months 47 days`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            (self.years, "years"),
            (self.months, "months"),
            (self.days, "days"),
            (self.hours, "hours"),
            (self.minutes, "minutes"),
            (self.seconds, "seconds"),
            (self.microseconds, "microseconds"),
        ];
        let mut first = true;
        for (value, unit) in fields.into_iter().filter(|(v, _)| *v != 0) {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{value} {unit}")?;
            first = false;
        }
        if first {
            f.write_str("0 seconds")?;
        }
        Ok(())
    }
}

impl FromStr for Interval {
    type Err = SqlCaddyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_interval(s)
    }
}

/// Parse `PostgreSQL`'s default (`IntervalStyle = postgres`) text output.
///
/// Accepts `<n> <unit>` pairs and one clock token such as `-04:05:06.2`.
/// A sign on the clock token applies to all of its fields.
///
/// # Errors
/// Returns `SqlCaddyError::ParameterError` for unknown units, stray numbers
/// or malformed clock tokens.
pub fn parse_interval(s: &str) -> Result<Interval, SqlCaddyError> {
    let mut out = Interval::default();
    let mut tokens = s.split_whitespace();

    while let Some(token) = tokens.next() {
        if token.contains(':') {
            let clock = parse_clock(token)?;
            out.hours += clock.hours;
            out.minutes += clock.minutes;
            out.seconds += clock.seconds;
            out.microseconds += clock.microseconds;
            continue;
        }

        let amount: i64 = token
            .parse()
            .map_err(|_| bad_interval(s, &format!("expected a number, found {token:?}")))?;
        let unit = tokens
            .next()
            .ok_or_else(|| bad_interval(s, &format!("missing unit after {token}")))?;
        match unit.to_ascii_lowercase().trim_end_matches('s') {
            "year" => out.years += amount,
            "mon" | "month" => out.months += amount,
            "week" => out.days += amount * 7,
            "day" => out.days += amount,
            "hour" => out.hours += amount,
            "min" | "minute" => out.minutes += amount,
            "sec" | "second" => out.seconds += amount,
            "microsecond" => out.microseconds += amount,
            other => return Err(bad_interval(s, &format!("unknown unit {other:?}"))),
        }
    }

    Ok(out)
}

fn parse_clock(token: &str) -> Result<Interval, SqlCaddyError> {
    let (negative, body) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };

    let mut parts = body.split(':');
    let hours = parse_clock_part(parts.next(), token)?;
    let minutes = parse_clock_part(parts.next(), token)?;
    let (seconds, microseconds) = match parts.next() {
        Some(sec) => parse_seconds(sec, token)?,
        None => (0, 0),
    };
    if parts.next().is_some() {
        return Err(bad_interval(token, "too many clock fields"));
    }

    let sign = if negative { -1 } else { 1 };
    Ok(Interval {
        hours: hours * sign,
        minutes: minutes * sign,
        seconds: seconds * sign,
        microseconds: microseconds * sign,
        ..Interval::default()
    })
}

fn parse_clock_part(part: Option<&str>, token: &str) -> Result<i64, SqlCaddyError> {
    part.filter(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| bad_interval(token, "malformed clock"))
}

fn parse_seconds(sec: &str, token: &str) -> Result<(i64, i64), SqlCaddyError> {
    let (whole, frac) = sec.split_once('.').unwrap_or((sec, ""));
    let seconds = parse_clock_part(Some(whole), token)?;
    if frac.is_empty() {
        return Ok((seconds, 0));
    }
    if frac.len() > 6 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad_interval(token, "malformed fractional seconds"));
    }
    let padded = format!("{frac:0<6}");
    let micros = padded
        .parse()
        .map_err(|_| bad_interval(token, "malformed fractional seconds"))?;
    Ok((seconds, micros))
}

fn bad_interval(input: &str, why: &str) -> SqlCaddyError {
    SqlCaddyError::ParameterError(format!("cannot parse interval {input:?}: {why}"))
}

impl ToSql for Interval {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        let months = i32::try_from(self.years * 12 + self.months)?;
        let days = i32::try_from(self.days)?;
        out.put_i64(self.clock_micros());
        out.put_i32(days);
        out.put_i32(months);
        Ok(IsNull::No)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::INTERVAL
    }

    to_sql_checked!();
}

impl<'a> FromSql<'a> for Interval {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        if raw.len() != 16 {
            return Err(format!("invalid interval length {}", raw.len()).into());
        }
        let micros = i64::from_be_bytes(raw[0..8].try_into()?);
        let days = i32::from_be_bytes(raw[8..12].try_into()?);
        let months = i32::from_be_bytes(raw[12..16].try_into()?);
        Ok(Interval::from_wire(months, days, micros))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::INTERVAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_output() {
        assert_eq!(
            parse_interval("1 years 2 mons").unwrap(),
            Interval::default().with_years(1).with_months(2)
        );
        assert_eq!(
            parse_interval("3 days 04:05:06").unwrap(),
            Interval::default()
                .with_days(3)
                .with_hours(4)
                .with_minutes(5)
                .with_seconds(6)
        );
        assert_eq!(parse_interval("1 day").unwrap(), Interval::default().with_days(1));
    }

    #[test]
    fn negative_clock_negates_every_field() {
        let parsed = parse_interval("-1 year -2 mons +3 days -04:05:06.2").unwrap();
        assert_eq!(
            parsed,
            Interval {
                years: -1,
                months: -2,
                days: 3,
                hours: -4,
                minutes: -5,
                seconds: -6,
                microseconds: -200_000,
            }
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_interval("3 fortnights").is_err());
        assert!(parse_interval("3").is_err());
        assert!(parse_interval("1:2:3:4").is_err());
        assert!(parse_interval("04:05:06.1234567").is_err());
    }

    #[test]
    fn display_skips_zero_fields() {
        let i = Interval::default().with_days(5).with_weeks(6).with_months(7);
        assert_eq!(i.to_string(), "7 months 47 days");
        assert_eq!(Interval::default().to_string(), "0 seconds");
    }

    #[test]
    fn normalization_carries_toward_zero() {
        let i = Interval::default()
            .with_days(1)
            .with_seconds(200)
            .with_microseconds(99)
            .normalized();
        assert_eq!(
            i,
            Interval::default()
                .with_days(1)
                .with_minutes(3)
                .with_seconds(20)
                .with_microseconds(99)
        );

        let i = Interval::default().with_months(-14).with_hours(-25).normalized();
        assert_eq!(i.years, -1);
        assert_eq!(i.months, -2);
        assert_eq!(i.days, -1);
        assert_eq!(i.hours, -1);
    }

    #[test]
    fn wire_format_matches_normalized_value() {
        let original = Interval::default()
            .with_years(1)
            .with_months(3)
            .with_days(1)
            .with_seconds(200)
            .with_microseconds(99);
        let mut buf = bytes::BytesMut::new();
        original.to_sql(&Type::INTERVAL, &mut buf).unwrap();
        assert_eq!(buf.len(), 16);
        let decoded = Interval::from_sql(&Type::INTERVAL, &buf).unwrap();
        assert_eq!(decoded, original.normalized());
    }
}
