//! Clock times, long dates and "N mins ago" labels, always rendered in one
//! fixed civil timezone no matter where the viewer sits.

use chrono::{Offset, TimeZone};
use chrono_tz::Tz;
use time::{macros::format_description, OffsetDateTime, UtcOffset};

mod clock;

pub use clock::{Clock, ManualClock, NowTicker, SystemClock};

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::New_York;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedTime {
    pub clock_time: String,
    pub long_date: String,
    pub relative: String,
}

#[derive(Debug, Clone, Copy)]
pub struct TimeFormatter {
    zone: Tz,
}

impl Default for TimeFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

impl TimeFormatter {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    pub fn format(&self, instant: OffsetDateTime, now: OffsetDateTime) -> FormattedTime {
        FormattedTime {
            clock_time: self.clock_time(instant),
            long_date: self.long_date(instant),
            relative: relative_label(instant, now),
        }
    }

    /// `3:05 PM`
    pub fn clock_time(&self, instant: OffsetDateTime) -> String {
        let local = self.to_local(instant);
        local
            .format(&format_description!(
                "[hour repr:12 padding:none]:[minute] [period]"
            ))
            .unwrap_or_else(|_| local.time().to_string())
    }

    /// `Tuesday, June 3rd`
    pub fn long_date(&self, instant: OffsetDateTime) -> String {
        let local = self.to_local(instant);
        let day = local.day();
        format!(
            "{}, {} {}{}",
            local.weekday(),
            local.month(),
            day,
            ordinal_suffix(day)
        )
    }

    /// Wall-clock view of `instant` in the configured zone, DST included.
    pub fn to_local(&self, instant: OffsetDateTime) -> OffsetDateTime {
        let offset = chrono::DateTime::<chrono::Utc>::from_timestamp(instant.unix_timestamp(), 0)
            .map(|utc| {
                self.zone
                    .offset_from_utc_datetime(&utc.naive_utc())
                    .fix()
                    .local_minus_utc()
            })
            .and_then(|seconds| UtcOffset::from_whole_seconds(seconds).ok())
            .unwrap_or(UtcOffset::UTC);
        instant.to_offset(offset)
    }
}

pub fn parse_timezone(name: &str) -> Option<Tz> {
    name.trim().parse::<Tz>().ok()
}

pub fn ordinal_suffix(day: u8) -> &'static str {
    if (11..=13).contains(&(day % 100)) {
        return "th";
    }
    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

pub fn relative_label(instant: OffsetDateTime, now: OffsetDateTime) -> String {
    let minutes = (now - instant).whole_minutes();
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return format!("{} ago", count(minutes, "min"));
    }
    let hours = minutes / 60;
    let remainder = minutes % 60;
    if hours < 24 {
        return if remainder == 0 {
            format!("{} ago", count(hours, "hr"))
        } else {
            format!("{} {} ago", count(hours, "hr"), count(remainder, "min"))
        };
    }
    format!("{} ago", count(hours / 24, "day"))
}

fn count(value: i64, unit: &str) -> String {
    if value == 1 {
        format!("{value} {unit}")
    } else {
        format!("{value} {unit}s")
    }
}
