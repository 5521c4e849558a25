use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type BookingId = u64;

/// The two rooms. Closed set: a new room is a code change, not data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoomId {
    A,
    B,
}

impl RoomId {
    pub const ALL: [RoomId; 2] = [RoomId::A, RoomId::B];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomId::A => "A",
            RoomId::B => "B",
        }
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(RoomId::A),
            "B" => Ok(RoomId::B),
            _ => Err(()),
        }
    }
}

/// A stored reservation. Field order matters for the log encoding; append only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub room_id: RoomId,
    pub date: NaiveDate,
    /// `HH:MM-HH:MM`, compared as an opaque string.
    pub time_slot: String,
    pub booker: String,
    pub extension: String,
    pub title: Option<String>,
    pub order_index: u32,
    pub recurring_group_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn day_key(&self) -> DayKey {
        DayKey::new(self.room_id, self.date)
    }
}

/// Everything the caller decides about a booking; the repository fills in the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub room_id: RoomId,
    pub date: NaiveDate,
    pub time_slot: String,
    pub booker: String,
    pub extension: String,
    pub title: Option<String>,
    pub recurring_group_id: Option<String>,
}

impl NewBooking {
    pub fn day_key(&self) -> DayKey {
        DayKey::new(self.room_id, self.date)
    }
}

/// One room on one date. The unit of locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayKey {
    pub room_id: RoomId,
    pub date: NaiveDate,
}

impl DayKey {
    pub fn new(room_id: RoomId, date: NaiveDate) -> Self {
        Self { room_id, date }
    }
}

/// All bookings of one room on one date.
#[derive(Debug, Clone)]
pub struct DaySheet {
    pub key: DayKey,
    /// Sorted by `(time_slot, order_index)`.
    pub bookings: Vec<Booking>,
}

impl DaySheet {
    pub fn new(key: DayKey) -> Self {
        Self {
            key,
            bookings: Vec::new(),
        }
    }

    /// Insert keeping `(time_slot, order_index)` order.
    pub fn insert(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by(|b| {
                (b.time_slot.as_str(), b.order_index)
                    .cmp(&(booking.time_slot.as_str(), booking.order_index))
            })
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn remove(&mut self, id: BookingId) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn get(&self, id: BookingId) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    /// Bookings whose slot string equals `slot` exactly.
    pub fn in_slot<'a>(&'a self, slot: &'a str) -> impl Iterator<Item = &'a Booking> {
        self.bookings.iter().filter(move |b| b.time_slot == slot)
    }

    /// `max(order_index) + 1` within the slot, or 1 for an empty slot.
    /// Gaps left by deletions are kept.
    pub fn next_order_index(&self, slot: &str) -> u32 {
        self.in_slot(slot)
            .map(|b| b.order_index)
            .max()
            .map_or(1, |max| max + 1)
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }
}

/// Which dates a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    Any,
    Day(NaiveDate),
    Month { year: i32, month: u32 },
}

impl DateFilter {
    pub fn matches(&self, date: NaiveDate) -> bool {
        match *self {
            DateFilter::Any => true,
            DateFilter::Day(d) => d == date,
            DateFilter::Month { year, month } => date.year() == year && date.month() == month,
        }
    }
}

/// Log record. Flat, like the rows it rebuilds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Written first by compaction so ids keep increasing after the highest one is deleted.
    Checkpoint { next_id: BookingId },
    BookingCreated(Booking),
    BookingsDeleted { ids: Vec<BookingId> },
    BookingsCleared,
}

/// Local calendar date used by the past-date guards.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
