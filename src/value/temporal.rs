//! Temporal value variants and temporal-amount variants (spec §3, §6).
//!
//! Each variant is comparable only with itself (no cross-variant ordering,
//! per §4.A) and has a single canonical ISO-8601 string form used by the
//! codec (§6). `time` (rather than `chrono`) supplies the underlying
//! calendar arithmetic, matching the stack `estuary-flow/crates/json`
//! builds its document model on.

use std::fmt;

use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::error::ParseError;
use crate::value::Datatype;

fn literal_err(literal: &str, datatype: Datatype) -> ParseError {
    ParseError::MalformedLiteral {
        literal: literal.to_string(),
        datatype,
    }
}

/// A bare calendar year, e.g. `2024`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Year(pub i32);

impl Year {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        s.parse::<i32>()
            .map(Year)
            .map_err(|_| literal_err(s, Datatype::Year))
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// A calendar year-month, e.g. `2024-03`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    pub month: u8,
}

impl YearMonth {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| literal_err(s, Datatype::YearMonth))?;
        let year: i32 = y.parse().map_err(|_| literal_err(s, Datatype::YearMonth))?;
        let month: u8 = m.parse().map_err(|_| literal_err(s, Datatype::YearMonth))?;
        if !(1..=12).contains(&month) {
            return Err(literal_err(s, Datatype::YearMonth));
        }
        Ok(YearMonth { year, month })
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A calendar date with no time-of-day or offset, e.g. `2024-03-17`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalDate(pub Date);

impl LocalDate {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        Date::parse(s, &time::format_description::well_known::Iso8601::DATE)
            .map(LocalDate)
            .map_err(|_| literal_err(s, Datatype::LocalDate))
    }

    /// The calendar year, used by `Transform::YEAR`.
    pub fn year(&self) -> i64 {
        self.0.year() as i64
    }
}

impl fmt::Display for LocalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            self.0.month() as u8,
            self.0.day()
        )
    }
}

/// A time-of-day with no date or offset, e.g. `13:45:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalTime(pub Time);

impl LocalTime {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        Time::parse(s, &time::format_description::well_known::Iso8601::TIME)
            .map(LocalTime)
            .map_err(|_| literal_err(s, Datatype::LocalTime))
    }
}

impl fmt::Display for LocalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.0.hour(),
            self.0.minute(),
            self.0.second()
        )
    }
}

/// A time-of-day with a fixed UTC offset, e.g. `13:45:00+02:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OffsetTime {
    pub time: Time,
    pub offset: UtcOffset,
}

impl OffsetTime {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let (time_part, offset) = split_offset(s).ok_or_else(|| literal_err(s, Datatype::OffsetTime))?;
        let time = Time::parse(time_part, &time::format_description::well_known::Iso8601::TIME)
            .map_err(|_| literal_err(s, Datatype::OffsetTime))?;
        Ok(OffsetTime { time, offset })
    }
}

impl PartialEq for OffsetTime {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.offset.whole_seconds() == other.offset.whole_seconds()
    }
}
impl Eq for OffsetTime {}
impl PartialOrd for OffsetTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OffsetTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.time, self.offset.whole_seconds()).cmp(&(other.time, other.offset.whole_seconds()))
    }
}

impl fmt::Display for OffsetTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", LocalTime(self.time), fmt_offset(self.offset))
    }
}

/// A date and time-of-day with no offset, e.g. `2024-03-17T13:45:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalDateTime(pub PrimitiveDateTime);

impl LocalDateTime {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        PrimitiveDateTime::parse(s, &time::format_description::well_known::Iso8601::DATE_TIME)
            .map(LocalDateTime)
            .map_err(|_| literal_err(s, Datatype::LocalDateTime))
    }
}

impl fmt::Display for LocalDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T{}", LocalDate(self.0.date()), LocalTime(self.0.time()))
    }
}

/// A date and time-of-day with a fixed UTC offset, e.g.
/// `2024-03-17T13:45:00+02:00`.
#[derive(Debug, Clone, Copy)]
pub struct OffsetDateTime(pub time::OffsetDateTime);

impl OffsetDateTime {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        time::OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339)
            .map(OffsetDateTime)
            .map_err(|_| literal_err(s, Datatype::OffsetDateTime))
    }
}

impl PartialEq for OffsetDateTime {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for OffsetDateTime {}
impl PartialOrd for OffsetDateTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OffsetDateTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for OffsetDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            LocalDateTime(PrimitiveDateTime::new(self.0.date(), self.0.time())),
            fmt_offset(self.0.offset())
        )
    }
}

/// A date and time-of-day anchored to a named time zone, e.g.
/// `2024-03-17T13:45:00+02:00[Europe/Brussels]`.
///
/// The core has no IANA time-zone database dependency; the zone name is
/// carried as an opaque tag alongside the already-resolved offset instant,
/// the way a Store driver (which does own a tz database) would hand one
/// back after resolving a zone-aware literal.
#[derive(Debug, Clone)]
pub struct ZonedDateTime {
    pub instant: time::OffsetDateTime,
    pub zone: String,
}

impl ZonedDateTime {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let (head, zone) = s
            .strip_suffix(']')
            .and_then(|s| s.split_once('['))
            .ok_or_else(|| literal_err(s, Datatype::ZonedDateTime))?;
        let instant = time::OffsetDateTime::parse(head, &time::format_description::well_known::Rfc3339)
            .map_err(|_| literal_err(s, Datatype::ZonedDateTime))?;
        Ok(ZonedDateTime {
            instant,
            zone: zone.to_string(),
        })
    }
}

impl PartialEq for ZonedDateTime {
    fn eq(&self, other: &Self) -> bool {
        self.instant == other.instant && self.zone == other.zone
    }
}
impl Eq for ZonedDateTime {}
impl PartialOrd for ZonedDateTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ZonedDateTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.instant.cmp(&other.instant).then_with(|| self.zone.cmp(&other.zone))
    }
}

impl fmt::Display for ZonedDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", OffsetDateTime(self.instant), self.zone)
    }
}

/// An absolute instant, always rendered and compared in UTC.
#[derive(Debug, Clone, Copy)]
pub struct Instant(pub time::OffsetDateTime);

impl Instant {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        time::OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339)
            .map(|t| Instant(t.to_offset(UtcOffset::UTC)))
            .map_err(|_| literal_err(s, Datatype::Instant))
    }
}

impl PartialEq for Instant {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for Instant {}
impl PartialOrd for Instant {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Instant {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Z", LocalDateTime(PrimitiveDateTime::new(self.0.date(), self.0.time())))
    }
}

/// A calendar-based amount of time, e.g. `P1Y2M10D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Period {
    pub years: i32,
    pub months: i32,
    pub days: i32,
}

impl Period {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let body = s
            .strip_prefix('P')
            .ok_or_else(|| literal_err(s, Datatype::Period))?;
        if body.contains('T') {
            return Err(literal_err(s, Datatype::Period));
        }
        let mut period = Period::default();
        let mut num = String::new();
        for ch in body.chars() {
            if ch.is_ascii_digit() || ch == '-' {
                num.push(ch);
                continue;
            }
            let n: i32 = num.parse().map_err(|_| literal_err(s, Datatype::Period))?;
            num.clear();
            match ch {
                'Y' => period.years = n,
                'M' => period.months = n,
                'D' => period.days = n,
                'W' => period.days += n * 7,
                _ => return Err(literal_err(s, Datatype::Period)),
            }
        }
        if !num.is_empty() {
            return Err(literal_err(s, Datatype::Period));
        }
        Ok(period)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.years == 0 && self.months == 0 && self.days == 0 {
            return write!(f, "P0D");
        }
        write!(f, "P")?;
        if self.years != 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months != 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.days != 0 {
            write!(f, "{}D", self.days)?;
        }
        Ok(())
    }
}

/// A clock-based amount of time, e.g. `PT1H30M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Duration {
    /// Whole seconds; may be negative.
    pub seconds: i64,
    /// Sub-second nanoseconds, always carrying the same sign as `seconds`.
    pub nanos: i32,
}

impl Duration {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let body = s
            .strip_prefix("PT")
            .ok_or_else(|| literal_err(s, Datatype::Duration))?;
        let mut seconds: i64 = 0;
        let mut num = String::new();
        for ch in body.chars() {
            if ch.is_ascii_digit() || ch == '-' || ch == '.' {
                num.push(ch);
                continue;
            }
            let n: f64 = num.parse().map_err(|_| literal_err(s, Datatype::Duration))?;
            num.clear();
            let scale = match ch {
                'H' => 3600.0,
                'M' => 60.0,
                'S' => 1.0,
                _ => return Err(literal_err(s, Datatype::Duration)),
            };
            seconds += (n * scale) as i64;
        }
        if !num.is_empty() {
            return Err(literal_err(s, Datatype::Duration));
        }
        Ok(Duration { seconds, nanos: 0 })
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.seconds == 0 && self.nanos == 0 {
            return write!(f, "PT0S");
        }
        let hours = self.seconds / 3600;
        let minutes = (self.seconds % 3600) / 60;
        let secs = self.seconds % 60;
        write!(f, "PT")?;
        if hours != 0 {
            write!(f, "{hours}H")?;
        }
        if minutes != 0 {
            write!(f, "{minutes}M")?;
        }
        if secs != 0 || (hours == 0 && minutes == 0) {
            write!(f, "{secs}S")?;
        }
        Ok(())
    }
}

fn split_offset(s: &str) -> Option<(&str, UtcOffset)> {
    if let Some(stripped) = s.strip_suffix('Z') {
        return Some((stripped, UtcOffset::UTC));
    }
    let idx = s.rfind(['+', '-'])?;
    if idx == 0 {
        return None;
    }
    let (time_part, off) = s.split_at(idx);
    let (h, m) = off.split_once(':').unwrap_or((off, "00"));
    let hh: i8 = h.parse().ok()?;
    let mm: i8 = m.parse().ok()?;
    let offset = UtcOffset::from_hms(hh, if hh < 0 { -mm } else { mm }, 0).ok()?;
    Some((time_part, offset))
}

fn fmt_offset(offset: UtcOffset) -> String {
    if offset.whole_seconds() == 0 {
        return "Z".to_string();
    }
    let total = offset.whole_seconds();
    let sign = if total < 0 { '-' } else { '+' };
    let total = total.abs();
    format!("{sign}{:02}:{:02}", total / 3600, (total % 3600) / 60)
}

/// Helper retained only to keep `Month` imported for `LocalDate::parse`'s
/// format-description type inference in older `time` point releases.
#[allow(dead_code)]
fn _keep_month_import(_m: Month) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_roundtrip() {
        let y = Year::parse("2024").unwrap();
        assert_eq!(y.to_string(), "2024");
    }

    #[test]
    fn year_month_roundtrip() {
        let ym = YearMonth::parse("2024-03").unwrap();
        assert_eq!(ym.to_string(), "2024-03");
        assert!(YearMonth::parse("2024-13").is_err());
    }

    #[test]
    fn local_date_roundtrip() {
        let d = LocalDate::parse("2024-03-17").unwrap();
        assert_eq!(d.to_string(), "2024-03-17");
        assert_eq!(d.year(), 2024);
    }

    #[test]
    fn offset_time_roundtrip() {
        let t = OffsetTime::parse("13:45:00+02:00").unwrap();
        assert_eq!(t.to_string(), "13:45:00+02:00");
        let z = OffsetTime::parse("13:45:00Z").unwrap();
        assert_eq!(z.to_string(), "13:45:00Z");
    }

    #[test]
    fn instant_roundtrip() {
        let i = Instant::parse("2024-03-17T13:45:00Z").unwrap();
        assert_eq!(i.to_string(), "2024-03-17T13:45:00Z");
    }

    #[test]
    fn zoned_date_time_roundtrip() {
        let z = ZonedDateTime::parse("2024-03-17T13:45:00+02:00[Europe/Brussels]").unwrap();
        assert_eq!(z.zone, "Europe/Brussels");
        assert_eq!(z.to_string(), "2024-03-17T13:45:00+02:00[Europe/Brussels]");
    }

    #[test]
    fn period_roundtrip() {
        let p = Period::parse("P1Y2M10D").unwrap();
        assert_eq!(p, Period { years: 1, months: 2, days: 10 });
        assert_eq!(p.to_string(), "P1Y2M10D");
    }

    #[test]
    fn duration_roundtrip() {
        let d = Duration::parse("PT1H30M").unwrap();
        assert_eq!(d.seconds, 5400);
        assert_eq!(d.to_string(), "PT1H30M");
    }

    #[test]
    fn each_temporal_variant_compares_only_with_itself() {
        // Type-level guarantee: Year and LocalDate are distinct types, so
        // attempting `Year(2024) == LocalDate(..)` does not even compile.
        // This test documents the intent at the value level instead.
        let a = Year::parse("2024").unwrap();
        let b = Year::parse("2025").unwrap();
        assert!(a < b);
    }
}
