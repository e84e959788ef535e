//! RFC 3339 timestamps.
//!
//! A [`Timestamp`] stores the UTC instant as microseconds since the Unix epoch
//! together with the UTC offset (in minutes) the value was written with, so that
//! formatting reproduces the original local time.

use std::fmt;

use thiserror::Error;

const MICROSECONDS_PER_SECOND: i64 = 1_000_000;
const MICROSECONDS_PER_MINUTE: i64 = 60 * MICROSECONDS_PER_SECOND;
const MICROSECONDS_PER_HOUR: i64 = 60 * MICROSECONDS_PER_MINUTE;
const MICROSECONDS_PER_DAY: i64 = 24 * MICROSECONDS_PER_HOUR;

/// Error type for RFC 3339 parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {component} in timestamp: {input}")]
pub struct TimestampParseError {
    pub component: &'static str,
    pub input: String,
}

fn invalid(component: &'static str, input: &str) -> TimestampParseError {
    TimestampParseError {
        component,
        input: input.to_string(),
    }
}

/// A point in time with the UTC offset it was expressed in.
///
/// Equality and ordering compare the instant only; `2024-03-15T14:30:00+05:30`
/// equals `2024-03-15T09:00:00Z`.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    /// Microseconds since 1970-01-01T00:00:00Z.
    pub epoch_micros: i64,
    /// Signed UTC offset in minutes (e.g., +330 for +05:30).
    pub offset_min: i16,
}

impl Timestamp {
    /// Creates a UTC timestamp from microseconds since the epoch.
    pub fn from_epoch_micros(epoch_micros: i64) -> Self {
        Self {
            epoch_micros,
            offset_min: 0,
        }
    }

    /// Creates a UTC timestamp from whole seconds since the epoch.
    ///
    /// Returns `None` when the value does not fit the microsecond range.
    pub fn from_unix_seconds(seconds: i64) -> Option<Self> {
        seconds
            .checked_mul(MICROSECONDS_PER_SECOND)
            .map(Self::from_epoch_micros)
    }

    /// Returns whole seconds since the epoch, rounding towards negative infinity.
    pub fn unix_seconds(&self) -> i64 {
        self.epoch_micros.div_euclid(MICROSECONDS_PER_SECOND)
    }

    /// Parses an RFC 3339 datetime (`YYYY-MM-DDTHH:MM:SS[.frac][Z|±HH:MM]`).
    ///
    /// A space is accepted in place of the `T` separator and a missing offset
    /// means UTC.
    pub fn parse_rfc3339(input: &str) -> Result<Self, TimestampParseError> {
        // Minimum length is 19 (YYYY-MM-DDTHH:MM:SS)
        if input.len() < 19 || !input.is_ascii() {
            return Err(invalid("format", input));
        }
        let bytes = input.as_bytes();
        if bytes[10] != b'T' && bytes[10] != b't' && bytes[10] != b' ' {
            return Err(invalid("separator", input));
        }
        if bytes[4] != b'-' || bytes[7] != b'-' || bytes[13] != b':' || bytes[16] != b':' {
            return Err(invalid("format", input));
        }

        let year = digits(&input[..4]).ok_or_else(|| invalid("year", input))? as i32;
        let month = digits(&input[5..7]).ok_or_else(|| invalid("month", input))?;
        let day = digits(&input[8..10]).ok_or_else(|| invalid("day", input))?;
        if !(1..=12).contains(&month) {
            return Err(invalid("month", input));
        }
        if day < 1 || day > days_in_month(year, month) {
            return Err(invalid("day", input));
        }

        let hours = digits(&input[11..13]).ok_or_else(|| invalid("hours", input))?;
        let minutes = digits(&input[14..16]).ok_or_else(|| invalid("minutes", input))?;
        let seconds = digits(&input[17..19]).ok_or_else(|| invalid("seconds", input))?;
        if hours > 23 {
            return Err(invalid("hours", input));
        }
        if minutes > 59 {
            return Err(invalid("minutes", input));
        }
        if seconds > 59 {
            return Err(invalid("seconds", input));
        }

        let rest = &input[19..];
        let (fraction, offset) = match rest.strip_prefix('.') {
            Some(frac) => {
                let end = frac
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(frac.len());
                if end == 0 {
                    return Err(invalid("fraction", input));
                }
                (&frac[..end], &frac[end..])
            }
            None => ("", rest),
        };

        let offset_min = if offset.is_empty() {
            0
        } else {
            parse_offset(offset).ok_or_else(|| invalid("offset", input))?
        };

        let local_micros = date_to_days(year, month, day) as i64 * MICROSECONDS_PER_DAY
            + i64::from(hours) * MICROSECONDS_PER_HOUR
            + i64::from(minutes) * MICROSECONDS_PER_MINUTE
            + i64::from(seconds) * MICROSECONDS_PER_SECOND
            + fraction_micros(fraction);

        // local time = UTC + offset, so UTC = local - offset
        Ok(Self {
            epoch_micros: local_micros - offset_min as i64 * MICROSECONDS_PER_MINUTE,
            offset_min,
        })
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.epoch_micros == other.epoch_micros
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.epoch_micros.cmp(&other.epoch_micros)
    }
}

impl fmt::Display for Timestamp {
    /// Formats as RFC 3339 in the original offset, omitting a zero fraction.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let local = self.epoch_micros + self.offset_min as i64 * MICROSECONDS_PER_MINUTE;
        let days = local.div_euclid(MICROSECONDS_PER_DAY) as i32;
        let time = local.rem_euclid(MICROSECONDS_PER_DAY);
        let (year, month, day) = days_to_date(days);

        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            year,
            month,
            day,
            time / MICROSECONDS_PER_HOUR,
            time % MICROSECONDS_PER_HOUR / MICROSECONDS_PER_MINUTE,
            time % MICROSECONDS_PER_MINUTE / MICROSECONDS_PER_SECOND,
        )?;

        let micros = time % MICROSECONDS_PER_SECOND;
        if micros != 0 {
            let digits = format!("{micros:06}");
            write!(f, ".{}", digits.trim_end_matches('0'))?;
        }

        if self.offset_min == 0 {
            return f.write_str("Z");
        }
        let sign = if self.offset_min > 0 { '+' } else { '-' };
        let abs = self.offset_min.unsigned_abs();
        write!(f, "{}{:02}:{:02}", sign, abs / 60, abs % 60)
    }
}

/// Parses `Z`, `+HH:MM` or `-HH:MM` into minutes, limited to ±24:00.
fn parse_offset(offset: &str) -> Option<i16> {
    if offset == "Z" || offset == "z" {
        return Some(0);
    }
    let bytes = offset.as_bytes();
    if bytes.len() != 6 || bytes[3] != b':' {
        return None;
    }
    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let hours = digits(&offset[1..3])? as i16;
    let minutes = digits(&offset[4..6])? as i16;
    if minutes > 59 || hours > 24 || (hours == 24 && minutes != 0) {
        return None;
    }
    Some(sign * (hours * 60 + minutes))
}

/// Parses a fixed-width field of ASCII digits. Signs and spaces are rejected.
fn digits(field: &str) -> Option<u32> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Converts fractional second digits to microseconds, truncating past six digits.
fn fraction_micros(digits: &str) -> i64 {
    let mut micros = 0i64;
    for (i, c) in digits.bytes().take(6).enumerate() {
        micros += (c - b'0') as i64 * 10i64.pow(5 - i as u32);
    }
    micros
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Days since the Unix epoch for a civil date (Howard Hinnant's algorithm).
fn date_to_days(year: i32, month: u32, day: u32) -> i32 {
    let y = if month <= 2 { year - 1 } else { year } as i64;
    let m = if month <= 2 { month + 9 } else { month - 3 } as i64;

    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let doy = (153 * m + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;

    (era * 146_097 + doe - 719_468) as i32
}

/// Civil date for a day count since the Unix epoch.
fn days_to_date(days: i32) -> (i32, u32, u32) {
    let z = days as i64 + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;

    let y = yoe + era * 400;
    let year = if m <= 2 { y + 1 } else { y } as i32;
    (year, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let ts = Timestamp::parse_rfc3339("1970-01-01T00:00:00Z").unwrap();
        assert_eq!(ts.epoch_micros, 0);
        assert_eq!(ts.offset_min, 0);

        let ts = Timestamp::parse_rfc3339("2024-03-15T14:30:00Z").unwrap();
        assert_eq!(ts.epoch_micros, 1_710_513_000_000_000);

        let ts = Timestamp::parse_rfc3339("2024-03-15T14:30:00.123456Z").unwrap();
        assert_eq!(ts.epoch_micros, 1_710_513_000_123_456);

        let ts = Timestamp::parse_rfc3339("2024-03-15 14:30:00").unwrap();
        assert_eq!(ts.epoch_micros, 1_710_513_000_000_000);
    }

    #[test]
    fn test_format() {
        assert_eq!(Timestamp::from_epoch_micros(0).to_string(), "1970-01-01T00:00:00Z");
        assert_eq!(
            Timestamp::from_epoch_micros(1_710_513_000_500_000).to_string(),
            "2024-03-15T14:30:00.5Z"
        );
    }

    #[test]
    fn test_offset_preserved_and_instant_compared() {
        let local = Timestamp::parse_rfc3339("2024-03-15T14:30:00+05:30").unwrap();
        let utc = Timestamp::parse_rfc3339("2024-03-15T09:00:00Z").unwrap();
        assert_eq!(local.offset_min, 330);
        assert_eq!(local, utc);
        assert_eq!(local.to_string(), "2024-03-15T14:30:00+05:30");
        assert_eq!(utc.to_string(), "2024-03-15T09:00:00Z");
    }

    #[test]
    fn test_before_epoch() {
        let ts = Timestamp::parse_rfc3339("1969-12-31T23:59:59Z").unwrap();
        assert_eq!(ts.epoch_micros, -1_000_000);
        assert_eq!(ts.unix_seconds(), -1);
        assert_eq!(ts.to_string(), "1969-12-31T23:59:59Z");
    }

    #[test]
    fn test_unix_seconds() {
        let ts = Timestamp::from_unix_seconds(1_710_513_000).unwrap();
        assert_eq!(ts.to_string(), "2024-03-15T14:30:00Z");
        assert_eq!(ts.unix_seconds(), 1_710_513_000);
        assert!(Timestamp::from_unix_seconds(i64::MAX).is_none());
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(Timestamp::parse_rfc3339("2024-13-01T00:00:00Z").is_err());
        assert!(Timestamp::parse_rfc3339("2023-02-29T00:00:00Z").is_err());
        assert!(Timestamp::parse_rfc3339("2024-03-15T24:00:00Z").is_err());
        assert!(Timestamp::parse_rfc3339("2024-03-15T14:60:00Z").is_err());
        assert!(Timestamp::parse_rfc3339("2024-03-15T14:30:00+24:01").is_err());
        assert!(Timestamp::parse_rfc3339("2024-03-15T14:30:00.Z").is_err());
        assert!(Timestamp::parse_rfc3339("not a timestamp").is_err());

        let err = Timestamp::parse_rfc3339("2024-02-30T00:00:00Z").unwrap_err();
        assert_eq!(err.component, "day");
    }

    #[test]
    fn test_signed_fields_rejected() {
        let cases = [
            ("2024-03-15T-1:30:00Z", "hours"),
            ("2024-03-15T10:-5:00Z", "minutes"),
            ("2024-03-15T10:30:+5Z", "seconds"),
            ("+024-03-15T10:30:00Z", "year"),
            ("2024-+3-15T10:30:00Z", "month"),
            ("2024-03-+5T10:30:00Z", "day"),
            ("2024-03-15T 1:30:00Z", "hours"),
            ("2024-03-15T10:30:00+-1:00", "offset"),
        ];
        for (input, component) in cases {
            let err = Timestamp::parse_rfc3339(input).unwrap_err();
            assert_eq!(err.component, component, "input {input}");
        }
    }
}
