use chrono::NaiveDate;

use crate::model::*;

use super::Engine;

impl Engine {
    pub async fn get_booking(&self, id: BookingId) -> Option<Booking> {
        let key = self.day_of(id)?;
        let sheet = self.existing_sheet(&key)?;
        let guard = sheet.read().await;
        guard.get(id).cloned()
    }

    /// One room's bookings on one date, ordered by slot then order index.
    pub async fn day_bookings(&self, room_id: RoomId, date: NaiveDate) -> Vec<Booking> {
        match self.existing_sheet(&DayKey::new(room_id, date)) {
            Some(sheet) => sheet.read().await.bookings.clone(),
            None => Vec::new(),
        }
    }

    /// One room's bookings on the dates `filter` selects, ordered by date, slot, order index.
    pub async fn list_bookings(&self, room_id: RoomId, filter: DateFilter) -> Vec<Booking> {
        let mut keys: Vec<DayKey> = self
            .days
            .iter()
            .map(|e| *e.key())
            .filter(|k| k.room_id == room_id && filter.matches(k.date))
            .collect();
        keys.sort();

        let mut out = Vec::new();
        for key in keys {
            if let Some(sheet) = self.existing_sheet(&key) {
                out.extend(sheet.read().await.bookings.iter().cloned());
            }
        }
        out
    }

    pub fn group_member_ids(&self, group_id: &str) -> Vec<BookingId> {
        self.groups
            .get(group_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// Members of a recurring group dated on or after `from`.
    pub fn count_group_from(&self, group_id: &str, from: NaiveDate) -> usize {
        self.group_member_ids(group_id)
            .into_iter()
            .filter(|id| self.day_of(*id).is_some_and(|key| key.date >= from))
            .count()
    }

    pub fn booking_count(&self) -> usize {
        self.by_id.len()
    }
}
