//! Timestamps, durations and their text forms.
//!
//! Both types store whole seconds plus a nanosecond part. Arithmetic goes
//! through `i128` nanosecond totals so intermediate results cannot overflow;
//! range checks happen once the result is normalized.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, Offset, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// 0001-01-01T00:00:00Z
const MIN_TIMESTAMP_SECONDS: i64 = -62_135_596_800;
/// 9999-12-31T23:59:59Z
const MAX_TIMESTAMP_SECONDS: i64 = 253_402_300_799;
/// Roughly 10000 years.
const MAX_DURATION_SECONDS: i64 = 315_576_000_000;

/// A point in time, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    /// Seconds since Unix epoch.
    pub seconds: i64,
    /// Nanoseconds (0..999_999_999).
    pub nanos: i32,
}

impl Timestamp {
    /// Create a new timestamp.
    pub fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }

    /// Create a timestamp from seconds since Unix epoch.
    pub fn from_seconds(seconds: i64) -> Self {
        Self { seconds, nanos: 0 }
    }

    /// Build a timestamp from nanoseconds since the epoch.
    ///
    /// Returns `None` outside years 0001..=9999.
    pub fn from_total_nanos(total: i128) -> Option<Self> {
        let seconds = i64::try_from(total.div_euclid(NANOS_PER_SECOND)).ok()?;
        let nanos = total.rem_euclid(NANOS_PER_SECOND) as i32;
        let ts = Self { seconds, nanos };
        ts.is_valid().then_some(ts)
    }

    pub fn total_nanos(&self) -> i128 {
        self.seconds as i128 * NANOS_PER_SECOND + self.nanos as i128
    }

    /// Returns true when the timestamp lies within years 0001..=9999.
    pub fn is_valid(&self) -> bool {
        (MIN_TIMESTAMP_SECONDS..=MAX_TIMESTAMP_SECONDS).contains(&self.seconds)
            && (0..1_000_000_000).contains(&self.nanos)
    }

    /// Convert to a chrono UTC datetime.
    pub fn to_datetime_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.seconds, u32::try_from(self.nanos).ok()?)
    }

    /// Shift by a duration.
    pub fn checked_add(&self, d: &Duration) -> Option<Timestamp> {
        Timestamp::from_total_nanos(self.total_nanos() + d.total_nanos())
    }

    pub fn checked_sub(&self, d: &Duration) -> Option<Timestamp> {
        Timestamp::from_total_nanos(self.total_nanos() - d.total_nanos())
    }

    /// Span between two timestamps.
    pub fn checked_since(&self, earlier: &Timestamp) -> Option<Duration> {
        Duration::from_total_nanos(self.total_nanos() - earlier.total_nanos())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.seconds, self.nanos).cmp(&(other.seconds, other.nanos))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_timestamp(self))
    }
}

/// A signed span of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Duration {
    /// Seconds component.
    pub seconds: i64,
    /// Nanoseconds component, with the same sign as `seconds`.
    pub nanos: i32,
}

impl Duration {
    /// Create a new duration.
    pub fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }

    /// Create a duration from seconds.
    pub fn from_seconds(seconds: i64) -> Self {
        Self { seconds, nanos: 0 }
    }

    /// Build a duration from a nanosecond total.
    ///
    /// Returns `None` beyond roughly 10000 years in either direction.
    pub fn from_total_nanos(total: i128) -> Option<Self> {
        let seconds = i64::try_from(total / NANOS_PER_SECOND).ok()?;
        let nanos = (total % NANOS_PER_SECOND) as i32;
        let d = Self { seconds, nanos };
        d.is_valid().then_some(d)
    }

    pub fn total_nanos(&self) -> i128 {
        self.seconds as i128 * NANOS_PER_SECOND + self.nanos as i128
    }

    /// Returns true when the duration is within the supported range.
    pub fn is_valid(&self) -> bool {
        (-MAX_DURATION_SECONDS..=MAX_DURATION_SECONDS).contains(&self.seconds)
    }

    /// Returns true if this duration is negative.
    pub fn is_negative(&self) -> bool {
        self.seconds < 0 || (self.seconds == 0 && self.nanos < 0)
    }

    pub fn checked_add(&self, other: &Duration) -> Option<Duration> {
        Duration::from_total_nanos(self.total_nanos() + other.total_nanos())
    }

    pub fn checked_sub(&self, other: &Duration) -> Option<Duration> {
        Duration::from_total_nanos(self.total_nanos() - other.total_nanos())
    }

    pub fn checked_neg(&self) -> Option<Duration> {
        Duration::from_total_nanos(-self.total_nanos())
    }

    /// Whole hours in the span.
    pub fn total_hours(&self) -> i64 {
        self.seconds / 3600
    }

    /// Whole minutes in the span.
    pub fn total_minutes(&self) -> i64 {
        self.seconds / 60
    }

    /// Whole milliseconds in the span.
    pub fn total_milliseconds(&self) -> i64 {
        (self.total_nanos() / 1_000_000) as i64
    }
}

impl PartialOrd for Duration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Duration {
    fn cmp(&self, other: &Self) -> Ordering {
        self.total_nanos().cmp(&other.total_nanos())
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_duration(self))
    }
}

/// Parse an RFC 3339 timestamp string.
///
/// Supports formats like:
/// - "2009-02-13T23:31:30Z"
/// - "2009-02-13T23:31:30.123456789Z"
/// - "2009-02-13T23:31:30+01:00"
pub fn parse_timestamp(s: &str) -> Result<Timestamp, String> {
    let dt = DateTime::parse_from_rfc3339(s)
        .map_err(|e| format!("invalid timestamp format: {}", e))?;

    let ts = Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    };

    if !ts.is_valid() {
        return Err("timestamp out of range: must be between year 0001 and 9999".to_string());
    }

    Ok(ts)
}

/// Parse a duration string such as `"1h30m"`, `"1.5s"` or `"-250ms"`.
///
/// Units: `h`, `m`, `s`, `ms`, `us` (or `µs`), `ns`. Each component may carry
/// a fractional part.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    if s.is_empty() {
        return Err("invalid duration: no value".to_string());
    }

    let mut total_nanos: i128 = 0;
    let mut remaining = s;

    while !remaining.is_empty() {
        let num_end = remaining
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(remaining.len());

        if num_end == 0 {
            return Err(format!(
                "invalid duration format: expected number at '{}'",
                remaining
            ));
        }

        let num_str = &remaining[..num_end];
        remaining = &remaining[num_end..];

        let unit_end = remaining
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(remaining.len());

        if unit_end == 0 {
            return Err(format!("invalid duration: missing unit after '{}'", num_str));
        }

        let unit = &remaining[..unit_end];
        remaining = &remaining[unit_end..];

        let multiplier: i128 = match unit {
            "h" => 3_600_000_000_000,
            "m" => 60_000_000_000,
            "s" => 1_000_000_000,
            "ms" => 1_000_000,
            "us" | "\u{00b5}s" => 1_000,
            "ns" => 1,
            _ => return Err(format!("invalid duration unit: '{}'", unit)),
        };

        let component = match num_str.split_once('.') {
            Some((whole, frac)) => {
                let whole: i128 = if whole.is_empty() {
                    0
                } else {
                    whole
                        .parse()
                        .map_err(|_| format!("invalid number in duration: '{}'", num_str))?
                };
                let frac_value = parse_fraction(frac, multiplier)
                    .ok_or_else(|| format!("invalid number in duration: '{}'", num_str))?;
                whole
                    .checked_mul(multiplier)
                    .and_then(|w| w.checked_add(frac_value))
            }
            None => num_str
                .parse::<i128>()
                .map_err(|_| format!("invalid number in duration: '{}'", num_str))?
                .checked_mul(multiplier),
        };

        total_nanos = component
            .and_then(|c| total_nanos.checked_add(c))
            .ok_or_else(|| "duration out of range".to_string())?;
    }

    if negative {
        total_nanos = -total_nanos;
    }

    Duration::from_total_nanos(total_nanos).ok_or_else(|| {
        "duration out of range: must be within approximately 10000 years".to_string()
    })
}

/// Scale the digits after a decimal point by `multiplier`, truncating below
/// one nanosecond.
fn parse_fraction(frac: &str, multiplier: i128) -> Option<i128> {
    if frac.is_empty() {
        return Some(0);
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Beyond 18 digits nothing is left at nanosecond resolution.
    let digits = &frac[..frac.len().min(18)];
    let numerator: i128 = digits.parse().ok()?;
    let denominator = 10i128.pow(digits.len() as u32);
    Some(numerator * multiplier / denominator)
}

/// Format a timestamp as RFC 3339, with as many fractional digits as needed.
///
/// Examples:
/// - "2009-02-13T23:31:30Z" (no fractional seconds)
/// - "2009-02-13T23:31:30.123456789Z" (with nanoseconds)
pub fn format_timestamp(ts: &Timestamp) -> String {
    match ts.to_datetime_utc() {
        Some(dt) if ts.nanos == 0 => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        Some(dt) => {
            let nanos_str = format!("{:09}", ts.nanos);
            let trimmed = nanos_str.trim_end_matches('0');
            format!("{}.{}Z", dt.format("%Y-%m-%dT%H:%M:%S"), trimmed)
        }
        None => format!("{}s", ts.seconds),
    }
}

/// Format a duration as seconds: `"90s"`, `"1.5s"`, `"-0.25s"`.
pub fn format_duration(d: &Duration) -> String {
    let total = d.total_nanos();
    let sign = if total < 0 { "-" } else { "" };
    let abs = total.abs();
    let secs = abs / NANOS_PER_SECOND;
    let frac = abs % NANOS_PER_SECOND;

    if frac == 0 {
        format!("{}{}s", sign, secs)
    } else {
        let frac_str = format!("{:09}", frac);
        format!("{}{}.{}s", sign, secs, frac_str.trim_end_matches('0'))
    }
}

/// Reads one calendar or clock field of a wall time.
pub type CalendarField = fn(&DateTime<FixedOffset>) -> i64;

/// Timestamp accessors by CEL name. Months, `getDayOfMonth` and
/// `getDayOfYear` count from zero; `getDate` counts from one; weeks start on
/// Sunday.
pub const CALENDAR_FIELDS: [(&str, CalendarField); 10] = [
    ("getFullYear", |dt| i64::from(dt.year())),
    ("getMonth", |dt| i64::from(dt.month0())),
    ("getDate", |dt| i64::from(dt.day())),
    ("getDayOfMonth", |dt| i64::from(dt.day0())),
    ("getDayOfWeek", |dt| i64::from(dt.weekday().num_days_from_sunday())),
    ("getDayOfYear", |dt| i64::from(dt.ordinal0())),
    ("getHours", |dt| i64::from(dt.hour())),
    ("getMinutes", |dt| i64::from(dt.minute())),
    ("getSeconds", |dt| i64::from(dt.second())),
    ("getMilliseconds", |dt| i64::from(dt.nanosecond() / 1_000_000)),
];

/// UTC offset of `zone` at the instant `at`.
///
/// `zone` is an IANA name (`"Europe/Paris"`) or an offset `[+|-]HH:MM`; a
/// missing sign means east of UTC.
pub fn zone_offset(zone: &str, at: &DateTime<Utc>) -> Result<FixedOffset, String> {
    match zone.parse::<Tz>() {
        Ok(tz) => Ok(tz.offset_from_utc_datetime(&at.naive_utc()).fix()),
        Err(_) => offset_from_text(zone.trim()).ok_or_else(|| format!("unknown timezone '{}'", zone)),
    }
}

fn offset_from_text(text: &str) -> Option<FixedOffset> {
    let (sign, unsigned) = match text.as_bytes().first()? {
        b'-' => (-1, &text[1..]),
        b'+' => (1, &text[1..]),
        _ => (1, text),
    };
    let (hours, minutes) = unsigned.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok().filter(|m| (0..60).contains(m))?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
