mod error;
mod mutations;
mod queries;

pub use error::EngineError;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::model::*;
use crate::wal::Wal;

pub type SharedDaySheet = Arc<RwLock<DaySheet>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    Snapshot {
        dest: PathBuf,
        response: oneshot::Sender<io::Result<u64>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

/// All or nothing: a failed append or flush leaves no trace of the batch in the log.
fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    for (event, _) in batch {
        wal.append_buffered(event)?;
    }
    wal.flush_sync()
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::Snapshot { dest, response } => {
            let _ = response.send(wal.snapshot_to(&dest));
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The booking store: day sheets in memory, every change logged before it is applied.
pub struct Engine {
    /// Sheets are created on demand and never removed, so an `Arc` handed out
    /// under one lookup stays the live sheet for that day.
    pub(super) days: DashMap<DayKey, SharedDaySheet>,
    /// Reverse lookup: booking id → day.
    pub(super) by_id: DashMap<BookingId, DayKey>,
    /// Recurring group id → member ids.
    pub(super) groups: DashMap<String, Vec<BookingId>>,
    pub(super) next_id: AtomicU64,
    /// Mutations hold it shared across log append + apply; compaction and
    /// clear take it exclusively so nothing commits behind their snapshot.
    pub(super) commit_gate: RwLock<()>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    wal_path: PathBuf,
}

impl Engine {
    /// Replay the log at `wal_path` and start the writer task. Needs a Tokio runtime.
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let replay = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            days: DashMap::new(),
            by_id: DashMap::new(),
            groups: DashMap::new(),
            next_id: AtomicU64::new(1),
            commit_gate: RwLock::new(()),
            wal_tx,
            wal_path,
        };

        // Sole owner of every sheet here: try_write never contends. Never
        // blocking_write, this may run inside an async context.
        for event in &replay.events {
            match event {
                Event::Checkpoint { next_id } => {
                    engine.next_id.fetch_max(*next_id, Ordering::Relaxed);
                }
                Event::BookingCreated(b) => {
                    let sheet = engine.sheet(b.day_key());
                    let mut guard = sheet.try_write().expect("replay: uncontended write");
                    engine.apply(&mut guard, event);
                }
                Event::BookingsDeleted { ids } => {
                    for id in ids {
                        let Some(key) = engine.day_of(*id) else { continue };
                        let sheet = engine.sheet(key);
                        let mut guard = sheet.try_write().expect("replay: uncontended write");
                        engine.apply_delete(&mut guard, *id);
                    }
                }
                Event::BookingsCleared => {
                    for entry in engine.days.iter() {
                        let mut guard = entry.value().try_write().expect("replay: uncontended write");
                        guard.bookings.clear();
                    }
                    engine.by_id.clear();
                    engine.groups.clear();
                }
            }
        }

        tracing::info!(
            "replayed {} events from {}: {} bookings",
            replay.events.len(),
            engine.wal_path.display(),
            engine.by_id.len()
        );
        Ok(engine)
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    /// Live sheet for a day, created empty on first use.
    pub(super) fn sheet(&self, key: DayKey) -> SharedDaySheet {
        self.days
            .entry(key)
            .or_insert_with(|| Arc::new(RwLock::new(DaySheet::new(key))))
            .value()
            .clone()
    }

    pub(super) fn existing_sheet(&self, key: &DayKey) -> Option<SharedDaySheet> {
        self.days.get(key).map(|e| e.value().clone())
    }

    pub(super) fn day_of(&self, id: BookingId) -> Option<DayKey> {
        self.by_id.get(&id).map(|e| *e.value())
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// Apply a creation to its (locked) sheet and the indexes.
    pub(super) fn apply(&self, sheet: &mut DaySheet, event: &Event) {
        if let Event::BookingCreated(b) = event {
            self.next_id.fetch_max(b.id + 1, Ordering::Relaxed);
            self.by_id.insert(b.id, b.day_key());
            if let Some(group) = &b.recurring_group_id {
                self.groups.entry(group.clone()).or_default().push(b.id);
            }
            sheet.insert(b.clone());
        }
    }

    /// Remove one booking from its (locked) sheet and the indexes.
    pub(super) fn apply_delete(&self, sheet: &mut DaySheet, id: BookingId) -> Option<Booking> {
        let removed = sheet.remove(id)?;
        self.by_id.remove(&id);
        if let Some(group) = &removed.recurring_group_id {
            let now_empty = self.groups.get_mut(group).is_some_and(|mut members| {
                members.retain(|m| *m != id);
                members.is_empty()
            });
            if now_empty {
                self.groups.remove_if(group, |_, members| members.is_empty());
            }
        }
        Some(removed)
    }
}
