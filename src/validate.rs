//! Input predicates. Each answers `bool`; callers turn `false` into a field error.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::limits::*;
use crate::model::{DateFilter, RoomId};

pub fn is_valid_room_id(room_id: &str) -> bool {
    room_id.parse::<RoomId>().is_ok()
}

/// `YYYY-MM-DD` shape and a real calendar date.
pub fn is_valid_date(date: &str) -> bool {
    parse_date(date).is_some()
}

pub fn parse_date(date: &str) -> Option<NaiveDate> {
    if !has_shape(date, "dddd-dd-dd") {
        return None;
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// `YYYY-MM` with a month in 1..=12.
pub fn parse_month(month: &str) -> Option<(i32, u32)> {
    if !has_shape(month, "dddd-dd") {
        return None;
    }
    let year: i32 = month[..4].parse().ok()?;
    let m: u32 = month[5..].parse().ok()?;
    (1..=12).contains(&m).then_some((year, m))
}

/// `YYYY-MM-DD` selects one day, `YYYY-MM` a month, nothing selects everything.
pub fn parse_date_filter(date: Option<&str>) -> Option<DateFilter> {
    match date {
        None | Some("") => Some(DateFilter::Any),
        Some(d) if d.len() == 10 => parse_date(d).map(DateFilter::Day),
        Some(d) if d.len() == 7 => parse_month(d).map(|(year, month)| DateFilter::Month { year, month }),
        Some(_) => None,
    }
}

/// `HH:MM-HH:MM`, start before end, inside the business window.
pub fn is_valid_time_slot(slot: &str) -> bool {
    let Some((start, end)) = slot_minutes(slot) else {
        return false;
    };
    start < end && start >= DAY_OPENS_MIN && end <= DAY_CLOSES_MIN
}

/// Start and end of a slot in minutes since midnight.
pub fn slot_minutes(slot: &str) -> Option<(u32, u32)> {
    if !has_shape(slot, "dd:dd-dd:dd") {
        return None;
    }
    Some((clock_minutes(&slot[..5])?, clock_minutes(&slot[6..])?))
}

fn clock_minutes(hhmm: &str) -> Option<u32> {
    let h: u32 = hhmm[..2].parse().ok()?;
    let m: u32 = hhmm[3..].parse().ok()?;
    (h <= 24 && m < 60).then_some(h * 60 + m)
}

pub fn is_valid_booker(booker: &str) -> bool {
    let len = booker.trim().chars().count();
    (MIN_BOOKER_LEN..=MAX_BOOKER_LEN).contains(&len)
}

/// 3 to 5 ASCII digits.
pub fn is_valid_extension(extension: &str) -> bool {
    (MIN_EXTENSION_DIGITS..=MAX_EXTENSION_DIGITS).contains(&extension.len())
        && extension.bytes().all(|b| b.is_ascii_digit())
}

pub fn is_valid_title(title: &str) -> bool {
    title.trim().chars().count() <= MAX_TITLE_LEN
}

/// `d` matches an ASCII digit, anything else matches itself.
fn has_shape(s: &str, pattern: &str) -> bool {
    s.len() == pattern.len()
        && s.bytes().zip(pattern.bytes()).all(|(c, p)| match p {
            b'd' => c.is_ascii_digit(),
            other => c == other,
        })
}

/// Site policy on top of the format check. Empty allow-list admits every well-formed extension.
#[derive(Debug, Clone, Default)]
pub struct ExtensionPolicy {
    allowed: HashSet<String>,
}

impl ExtensionPolicy {
    pub fn allow_any() -> Self {
        Self::default()
    }

    pub fn allow_list<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: extensions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn permits(&self, extension: &str) -> bool {
        is_valid_extension(extension) && (self.allowed.is_empty() || self.allowed.contains(extension))
    }
}
