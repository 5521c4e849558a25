use std::path::Path;
use std::sync::atomic::Ordering;

use chrono::{NaiveDate, Utc};
use tokio::sync::oneshot;

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError, WalCommand};

impl Engine {
    /// Persist a booking with the next id and the next order index of its slot.
    ///
    /// The day's write lock is held from reading the slot's highest order index
    /// until the booking is applied, so concurrent inserts into one slot queue up.
    pub async fn insert_booking(&self, new: NewBooking) -> Result<Booking, EngineError> {
        let _gate = self.commit_gate.read().await;
        let sheet = self.sheet(new.day_key());
        let mut guard = sheet.write().await;
        if guard.len() >= MAX_BOOKINGS_PER_DAY {
            return Err(EngineError::LimitExceeded("this room is fully booked on this date"));
        }

        let order_index = guard.next_order_index(&new.time_slot);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let booking = Booking {
            id,
            room_id: new.room_id,
            date: new.date,
            time_slot: new.time_slot,
            booker: new.booker,
            extension: new.extension,
            title: new.title,
            order_index,
            recurring_group_id: new.recurring_group_id,
            created_at: Utc::now(),
        };

        let event = Event::BookingCreated(booking.clone());
        self.wal_append(&event).await?;
        self.apply(&mut guard, &event);
        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        tracing::debug!(
            "booking {id} created: room {} {} {} #{order_index}",
            booking.room_id,
            booking.date,
            booking.time_slot
        );
        Ok(booking)
    }

    /// Remove every listed booking that still exists, as one log record.
    /// Ids that are unknown (or removed concurrently) are skipped.
    pub async fn remove_bookings(&self, ids: &[BookingId]) -> Result<Vec<Booking>, EngineError> {
        let _gate = self.commit_gate.read().await;

        // Acquire write locks in sorted order to prevent deadlocks.
        let mut keys: Vec<DayKey> = ids.iter().filter_map(|id| self.day_of(*id)).collect();
        keys.sort();
        keys.dedup();
        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(sheet) = self.existing_sheet(key) {
                guards.push(sheet.write_owned().await);
            }
        }

        let mut live: Vec<BookingId> = ids
            .iter()
            .copied()
            .filter(|id| guards.iter().any(|g| g.get(*id).is_some()))
            .collect();
        live.sort_unstable();
        live.dedup();
        if live.is_empty() {
            return Ok(Vec::new());
        }

        self.wal_append(&Event::BookingsDeleted { ids: live.clone() })
            .await?;

        let mut removed = Vec::with_capacity(live.len());
        for id in live {
            for guard in guards.iter_mut() {
                if let Some(b) = self.apply_delete(guard, id) {
                    removed.push(b);
                    break;
                }
            }
        }
        metrics::counter!(crate::observability::BOOKINGS_DELETED_TOTAL)
            .increment(removed.len() as u64);
        Ok(removed)
    }

    /// Remove one booking. `Ok(false)` if it does not exist.
    pub async fn remove_booking(&self, id: BookingId) -> Result<bool, EngineError> {
        Ok(!self.remove_bookings(&[id]).await?.is_empty())
    }

    /// Remove the members of a recurring group dated on or after `from`.
    pub async fn remove_group_from(&self, group_id: &str, from: NaiveDate) -> Result<usize, EngineError> {
        let ids: Vec<BookingId> = self
            .group_member_ids(group_id)
            .into_iter()
            .filter(|id| self.day_of(*id).is_some_and(|key| key.date >= from))
            .collect();
        Ok(self.remove_bookings(&ids).await?.len())
    }

    /// Remove every booking. Returns how many were removed.
    pub async fn clear_all(&self) -> Result<usize, EngineError> {
        let _gate = self.commit_gate.write().await;
        let count = self.by_id.len();
        if count == 0 {
            return Ok(0);
        }
        self.wal_append(&Event::BookingsCleared).await?;

        let sheets: Vec<_> = self.days.iter().map(|e| e.value().clone()).collect();
        for sheet in sheets {
            sheet.write().await.bookings.clear();
        }
        self.by_id.clear();
        self.groups.clear();
        metrics::counter!(crate::observability::BOOKINGS_DELETED_TOTAL).increment(count as u64);
        tracing::warn!("cleared all {count} bookings");
        Ok(count)
    }

    /// Rewrite the WAL as a checkpoint plus one creation record per live booking.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.commit_gate.write().await;

        let mut keys: Vec<DayKey> = self.days.iter().map(|e| *e.key()).collect();
        keys.sort();

        let mut events = vec![Event::Checkpoint {
            next_id: self.next_id.load(Ordering::Relaxed),
        }];
        for key in keys {
            let Some(sheet) = self.existing_sheet(&key) else { continue };
            let guard = sheet.read().await;
            let mut bookings: Vec<&Booking> = guard.bookings.iter().collect();
            bookings.sort_by_key(|b| b.id);
            events.extend(bookings.into_iter().cloned().map(Event::BookingCreated));
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Copy the WAL to `dest` between commit batches. Returns the bytes written.
    pub async fn snapshot_to(&self, dest: &Path) -> Result<u64, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Snapshot {
                dest: dest.to_path_buf(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }
}
