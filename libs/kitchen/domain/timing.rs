//! Time & urgency engine
//!
//! Scheduled times are restaurant-local wall clock strings without an offset.
//! They are compared against "now" rendered into the restaurant's zone, which
//! is carried by an explicit [`TimeContext`] rather than process-wide state.
//!
//! Comparisons across calendar days collapse to a `±9999` sentinel: a ticket
//! scheduled tomorrow is "far away" and one from yesterday is "long overdue".

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minutes reported when the scheduled date differs from today
pub const DIFFERENT_DAY_MINUTES: i64 = 9999;

/// Width of a scheduling slot in minutes
pub const SLOT_MINUTES: u32 = 30;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// Calendar fields of an instant rendered into a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hours: u32,
    pub minutes: u32,
}

impl WallClock {
    /// `YYYY-MM-DD`
    pub fn date_key(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    fn date(&self) -> (i32, u32, u32) {
        (self.year, self.month, self.day)
    }

    fn minute_of_day(&self) -> i64 {
        (self.hours * 60 + self.minutes) as i64
    }
}

/// A parsed `YYYY-MM-DD[T| ]HH:MM` wall clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScheduledTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hours: u32,
    pub minutes: u32,
}

impl ScheduledTime {
    fn date(&self) -> (i32, u32, u32) {
        (self.year, self.month, self.day)
    }

    fn minute_of_day(&self) -> i64 {
        (self.hours * 60 + self.minutes) as i64
    }

    /// Start of the 30-minute slot containing this time, as `HH:MM`
    pub fn slot_key(&self) -> String {
        format!("{:02}:{:02}", self.hours, self.minutes - self.minutes % SLOT_MINUTES)
    }
}

fn digits(raw: &[u8]) -> Option<u32> {
    if raw.is_empty() || !raw.iter().all(u8::is_ascii_digit) {
        return None;
    }
    raw.iter()
        .try_fold(0u32, |acc, &d| acc.checked_mul(10)?.checked_add((d - b'0') as u32))
}

/// Parse the leading `YYYY-MM-DD[T| ]HH:MM` of a scheduled timestamp
///
/// Anything after the minutes (seconds, fractions, offsets) is ignored; the
/// value is taken as restaurant-local wall clock.
pub fn parse_scheduled_time(raw: &str) -> Option<ScheduledTime> {
    let bytes = raw.trim().as_bytes();
    if bytes.len() < 16 {
        return None;
    }
    if bytes[4] != b'-' || bytes[7] != b'-' || !matches!(bytes[10], b'T' | b' ') || bytes[13] != b':' {
        return None;
    }

    let parsed = ScheduledTime {
        year: digits(&bytes[0..4])? as i32,
        month: digits(&bytes[5..7])?,
        day: digits(&bytes[8..10])?,
        hours: digits(&bytes[11..13])?,
        minutes: digits(&bytes[14..16])?,
    };

    let valid = (1..=12).contains(&parsed.month)
        && (1..=31).contains(&parsed.day)
        && parsed.hours < 24
        && parsed.minutes < 60;
    valid.then_some(parsed)
}

/// `HH:MM` label of the 30-minute slot a scheduled timestamp falls in
pub fn time_slot_key(raw: &str) -> Option<String> {
    parse_scheduled_time(raw).map(|t| t.slot_key())
}

/// Thresholds for escalating a scheduled ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencyPolicy {
    /// At or below this many minutes remaining the ticket is a warning
    pub warning_minutes: i64,
    /// Below this many minutes remaining the ticket is overdue
    pub overdue_minutes: i64,
}

impl Default for UrgencyPolicy {
    fn default() -> Self {
        Self {
            warning_minutes: 15,
            overdue_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Normal,
    Warning,
    Overdue,
}

impl UrgencyPolicy {
    /// Level for a `minutes_until` value
    pub fn level(&self, minutes_until: i64) -> UrgencyLevel {
        if minutes_until >= DIFFERENT_DAY_MINUTES {
            UrgencyLevel::Normal
        } else if minutes_until <= -DIFFERENT_DAY_MINUTES || minutes_until < self.overdue_minutes {
            UrgencyLevel::Overdue
        } else if minutes_until <= self.warning_minutes {
            UrgencyLevel::Warning
        } else {
            UrgencyLevel::Normal
        }
    }
}

/// Restaurant timezone handed to every time computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeContext {
    tz: Tz,
}

impl Default for TimeContext {
    fn default() -> Self {
        Self { tz: Tz::UTC }
    }
}

impl TimeContext {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Build from an IANA name such as `Europe/Madrid`
    pub fn from_name(name: &str) -> Result<Self, TimeError> {
        let tz = name
            .trim()
            .parse::<Tz>()
            .map_err(|_| TimeError::UnknownTimezone(name.to_string()))?;
        Ok(Self { tz })
    }

    pub fn set_timezone(&mut self, name: &str) -> Result<(), TimeError> {
        *self = Self::from_name(name)?;
        Ok(())
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn now(&self) -> WallClock {
        self.wall_clock_at(Utc::now())
    }

    pub fn wall_clock_at(&self, instant: DateTime<Utc>) -> WallClock {
        let local = instant.with_timezone(&self.tz);
        WallClock {
            year: local.year(),
            month: local.month(),
            day: local.day(),
            hours: local.hour(),
            minutes: local.minute(),
        }
    }

    /// Today's date in the zone, `YYYY-MM-DD`
    pub fn today(&self) -> String {
        self.now().date_key()
    }

    pub fn minutes_until(&self, scheduled: &str) -> Option<i64> {
        self.minutes_until_at(scheduled, Utc::now())
    }

    /// Minutes from `now` until `scheduled`, or `±9999` on another day
    ///
    /// Returns `None` when `scheduled` does not parse.
    pub fn minutes_until_at(&self, scheduled: &str, now: DateTime<Utc>) -> Option<i64> {
        let scheduled = parse_scheduled_time(scheduled)?;
        let now = self.wall_clock_at(now);

        let minutes = match scheduled.date().cmp(&now.date()) {
            std::cmp::Ordering::Equal => scheduled.minute_of_day() - now.minute_of_day(),
            std::cmp::Ordering::Greater => DIFFERENT_DAY_MINUTES,
            std::cmp::Ordering::Less => -DIFFERENT_DAY_MINUTES,
        };
        Some(minutes)
    }

    pub fn urgency(&self, scheduled: &str, policy: &UrgencyPolicy) -> UrgencyLevel {
        self.urgency_at(scheduled, policy, Utc::now())
    }

    /// Unparseable times are never urgent
    pub fn urgency_at(&self, scheduled: &str, policy: &UrgencyPolicy, now: DateTime<Utc>) -> UrgencyLevel {
        self.minutes_until_at(scheduled, now)
            .map_or(UrgencyLevel::Normal, |minutes| policy.level(minutes))
    }

    pub fn elapsed_minutes(&self, since: &str) -> Option<i64> {
        self.elapsed_minutes_at(since, Utc::now())
    }

    /// Whole minutes between `since` and `now`, never negative
    ///
    /// `since` is RFC 3339; an offset-less timestamp is read as wall clock in
    /// this zone.
    pub fn elapsed_minutes_at(&self, since: &str, now: DateTime<Utc>) -> Option<i64> {
        let started = self.parse_instant(since)?;
        Some((now - started).num_minutes().max(0))
    }

    fn parse_instant(&self, raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
            return Some(instant.with_timezone(&Utc));
        }

        ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .and_then(|naive| self.tz.from_local_datetime(&naive).earliest())
            .map(|local| local.with_timezone(&Utc))
    }
}
