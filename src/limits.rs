/// Business window, in minutes since midnight.
pub const DAY_OPENS_MIN: u32 = 8 * 60;
pub const DAY_CLOSES_MIN: u32 = 18 * 60;

pub const MIN_BOOKER_LEN: usize = 2;
pub const MAX_BOOKER_LEN: usize = 20;

pub const MIN_EXTENSION_DIGITS: usize = 3;
pub const MAX_EXTENSION_DIGITS: usize = 5;

pub const MAX_TITLE_LEN: usize = 100;

/// A daily series spanning a full leap year fits.
pub const MAX_SERIES_OCCURRENCES: usize = 366;

/// Per room per date, across all slots.
pub const MAX_BOOKINGS_PER_DAY: usize = 1024;

pub const MAX_GROUP_ID_LEN: usize = 64;
