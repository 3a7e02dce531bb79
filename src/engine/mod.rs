//! In-memory booking store backed by an append-only journal.
//!
//! Each court lives behind its own `RwLock`. Mutations take the write guard,
//! validate against the locked state, journal one record, apply it, and only
//! then release the guard: the write guard is the row lock that serializes
//! concurrent booking attempts on a court.

mod conflict;
mod error;
mod mutations;
mod queries;

pub use conflict::find_conflict;
pub use error::BookingError;
pub use mutations::{BookingPatch, NewCourt};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::journal::Journal;
use crate::model::*;

pub type SharedCourtState = Arc<RwLock<CourtState>>;

pub(super) enum JournalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Owns the journal file. Appends that arrive while a flush is being
/// prepared are folded into the same fsync (group commit).
async fn journal_writer_loop(mut journal: Journal, mut rx: mpsc::Receiver<JournalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let JournalCommand::Append { event, response } = cmd else {
            handle_control(&mut journal, cmd);
            continue;
        };
        let mut batch: Vec<PendingAppend> = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(JournalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        metrics::histogram!(crate::observability::JOURNAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let started = std::time::Instant::now();
        let result = flush_batch(&mut journal, &batch);
        metrics::histogram!(crate::observability::JOURNAL_FLUSH_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        for (_, tx) in batch {
            let reply = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = tx.send(reply);
        }

        if let Some(cmd) = deferred {
            handle_control(&mut journal, cmd);
        }
    }
}

fn flush_batch(journal: &mut Journal, batch: &[PendingAppend]) -> io::Result<()> {
    journal.commit(batch.iter().map(|(event, _)| event))
}

fn handle_control(journal: &mut Journal, cmd: JournalCommand) {
    match cmd {
        JournalCommand::Compact { events, response } => {
            let result = Journal::write_snapshot(journal.path(), &events)
                .and_then(|()| journal.install_snapshot());
            let _ = response.send(result);
        }
        JournalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(journal.appends_since_compact());
        }
        JournalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

pub struct Engine {
    pub(super) courts: DashMap<Ulid, SharedCourtState>,
    /// Reverse lookup: booking id → court id.
    pub(super) booking_to_court: DashMap<Ulid, Ulid>,
    pub(super) journal_tx: mpsc::Sender<JournalCommand>,
    /// Held across court registration and compaction: the court map only
    /// grows under it.
    pub(super) registry: Mutex<()>,
}

/// Apply a journaled event to a court the caller has already locked.
fn apply_to_court(cs: &mut CourtState, event: &Event, index: &DashMap<Ulid, Ulid>) {
    match event {
        Event::PriceSlotsReplaced { slots, .. } => cs.price_slots = slots.clone(),
        Event::CourtStatusChanged { status, .. } => cs.court.status = *status,
        Event::CourtRetired { at, .. } => {
            cs.court.is_deleted = true;
            cs.court.deleted_at = Some(*at);
        }
        Event::BookingsCreated { bookings, .. } | Event::BookingsUpdated { bookings, .. } => {
            for b in bookings {
                index.insert(b.id, b.court_id);
                cs.upsert_booking(b.clone());
            }
        }
        // Registration happens at the map level, not inside a court.
        Event::CourtRegistered { .. } => {}
    }
}

impl Engine {
    /// Replay the journal at `path` and start its background writer.
    /// Must be called from inside a tokio runtime.
    pub fn new(path: PathBuf) -> io::Result<Self> {
        let (events, journal) = Journal::recover(&path)?;
        let (journal_tx, journal_rx) = mpsc::channel(4096);
        tokio::spawn(journal_writer_loop(journal, journal_rx));

        let engine = Self {
            courts: DashMap::new(),
            booking_to_court: DashMap::new(),
            journal_tx,
            registry: Mutex::new(()),
        };

        // Sole owner during replay: try_write never contends, and blocking
        // locks are off-limits inside an async context.
        for event in &events {
            match event {
                Event::CourtRegistered { court } => {
                    engine
                        .courts
                        .insert(court.id, Arc::new(RwLock::new(CourtState::new(court.clone()))));
                }
                other => {
                    let Some(entry) = engine.courts.get(&other.court_id()) else {
                        tracing::warn!("journal record for unknown court {}", other.court_id());
                        continue;
                    };
                    let shared = entry.clone();
                    drop(entry);
                    let Ok(mut guard) = shared.try_write() else {
                        return Err(io::Error::other("court locked during replay"));
                    };
                    apply_to_court(&mut guard, other, &engine.booking_to_court);
                }
            }
        }
        tracing::info!(
            "journal replayed: {} records, {} courts, {} bookings",
            events.len(),
            engine.courts.len(),
            engine.booking_to_court.len()
        );

        Ok(engine)
    }

    async fn journal_append(&self, event: &Event) -> Result<(), BookingError> {
        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| BookingError::Storage("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::Storage("journal writer dropped response".into()))?
            .map_err(|e| BookingError::Storage(e.to_string()))
    }

    /// Journal, then apply. The caller holds the court's write guard, so the
    /// record becomes visible to readers only once it is durable.
    pub(super) async fn persist_and_apply(
        &self,
        cs: &mut CourtState,
        event: &Event,
    ) -> Result<(), BookingError> {
        self.journal_append(event).await?;
        apply_to_court(cs, event, &self.booking_to_court);
        Ok(())
    }

    pub fn get_court(&self, id: &Ulid) -> Option<SharedCourtState> {
        self.courts.get(id).map(|e| e.value().clone())
    }

    pub fn court_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_court.get(booking_id).map(|e| *e.value())
    }

    /// Resolve booking → court and take that court's write lock.
    pub(super) async fn lock_court_of(
        &self,
        booking_id: &Ulid,
    ) -> Result<OwnedRwLockWriteGuard<CourtState>, BookingError> {
        let court_id = self
            .court_for_booking(booking_id)
            .ok_or(BookingError::BookingNotFound(*booking_id))?;
        let cs = self
            .get_court(&court_id)
            .ok_or(BookingError::BookingNotFound(*booking_id))?;
        Ok(cs.write_owned().await)
    }

    /// Rewrite the journal as a snapshot of the current state. Read guards on
    /// every court are held until the snapshot is installed, so no mutation
    /// can land between taking the snapshot and swapping it in.
    pub async fn compact_journal(&self) -> Result<(), BookingError> {
        let _registry = self.registry.lock().await;
        let shared: Vec<SharedCourtState> = self.courts.iter().map(|e| e.value().clone()).collect();
        let mut guards = Vec::with_capacity(shared.len());
        for cs in shared {
            guards.push(cs.read_owned().await);
        }
        let events = snapshot_events(guards.iter().map(|g| &**g));

        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| BookingError::Storage("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::Storage("journal writer dropped response".into()))?
            .map_err(|e| BookingError::Storage(e.to_string()))
    }

    pub async fn journal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .journal_tx
            .send(JournalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

/// Minimal record list that recreates the given courts.
fn snapshot_events<'a>(courts: impl Iterator<Item = &'a CourtState>) -> Vec<Event> {
    let mut events = Vec::new();
    for cs in courts {
        events.push(Event::CourtRegistered { court: cs.court.clone() });
        if !cs.price_slots.is_empty() {
            events.push(Event::PriceSlotsReplaced {
                court_id: cs.court.id,
                slots: cs.price_slots.clone(),
            });
        }
        if !cs.bookings.is_empty() {
            events.push(Event::BookingsCreated {
                court_id: cs.court.id,
                bookings: cs.bookings.clone(),
            });
        }
    }
    events
}
