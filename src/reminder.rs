use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Utc};
use tracing::info;

use crate::engine::Engine;
use crate::model::Timestamp;
use crate::notify::{self, Notification, NotificationKind, Notifier};

/// Claims due bookings and notifies their renters. Shared by the periodic
/// task and tests.
pub struct ReminderSweep {
    engine: Arc<Engine>,
    notifier: Arc<dyn Notifier>,
    venue: FixedOffset,
    lead: chrono::Duration,
}

impl ReminderSweep {
    pub fn new(
        engine: Arc<Engine>,
        notifier: Arc<dyn Notifier>,
        venue: FixedOffset,
        lead: chrono::Duration,
    ) -> Self {
        Self { engine, notifier, venue, lead }
    }

    /// One pass over bookings starting in `[now, now + lead]`. Each booking
    /// is claimed (journaled) before its reminder goes out, so a reminder is
    /// sent at most once even across restarts. Returns the number claimed.
    pub async fn sweep_once(&self, now: Timestamp) -> usize {
        let due = self.engine.due_reminders(now, now + self.lead).await;
        let mut sent = 0;
        for (court, booking) in due {
            match self.engine.claim_reminder(booking.id).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!("reminder claim for booking {} failed: {e}", booking.id);
                    continue;
                }
            }
            let minutes = (booking.start_datetime - now).num_minutes().max(0);
            notify::dispatch(
                &self.notifier,
                Notification {
                    user_id: booking.user_id,
                    kind: NotificationKind::Reminder,
                    title: "Upcoming booking".into(),
                    message: format!(
                        "{} starts at {} (in {} minutes)",
                        court.name,
                        booking.start_datetime.with_timezone(&self.venue).format("%H:%M"),
                        minutes
                    ),
                    booking_id: booking.id,
                },
            );
            metrics::counter!(crate::observability::REMINDERS_SENT_TOTAL).increment(1);
            sent += 1;
        }
        sent
    }
}

/// Background task that sends start reminders every `every`.
pub async fn run_reminder_sweep(sweep: ReminderSweep, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let sent = sweep.sweep_once(Utc::now()).await;
        if sent > 0 {
            info!("sent {sent} booking reminder(s)");
        }
    }
}

/// Background task that rewrites the journal once enough records piled up
/// since the last compaction.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let appends = engine.journal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_journal().await {
            Ok(()) => {
                metrics::counter!(crate::observability::JOURNAL_COMPACTIONS_TOTAL).increment(1);
                info!("journal compacted after {appends} appends");
            }
            Err(e) => tracing::error!("journal compaction failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use ulid::Ulid;

    use super::*;
    use crate::engine::{BookingPatch, NewCourt};
    use crate::model::fixtures::at;
    use crate::model::*;
    use crate::notify::NotifyError;

    fn test_journal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("courtside_test_reminder");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    struct Recorder(mpsc::UnboundedSender<Notification>);

    #[async_trait]
    impl Notifier for Recorder {
        async fn notify(&self, n: Notification) -> Result<(), NotifyError> {
            let _ = self.0.send(n);
            Ok(())
        }
    }

    async fn court_with(engine: &Engine) -> Court {
        engine
            .register_court(NewCourt {
                id: Ulid::new(),
                name: "Court B".into(),
                location: "District 3".into(),
                status: CourtStatus::Active,
                slot_duration: 60,
                owner_id: Ulid::new(),
            })
            .await
            .unwrap()
    }

    async fn book(engine: &Engine, court: &Court, start: Timestamp, confirmed: bool) -> Booking {
        let b = fixtures::booking(court.id, start, start + chrono::Duration::hours(1));
        let id = b.id;
        engine.insert_bookings(court.id, vec![b]).await.unwrap();
        if confirmed {
            engine.confirm_booking(id, |_, _| Ok(())).await.unwrap();
        }
        engine.get_booking(id).await.unwrap().booking
    }

    fn sweep(engine: Arc<Engine>, tx: mpsc::UnboundedSender<Notification>) -> ReminderSweep {
        ReminderSweep::new(
            engine,
            Arc::new(Recorder(tx)),
            FixedOffset::east_opt(0).unwrap(),
            chrono::Duration::minutes(30),
        )
    }

    #[tokio::test]
    async fn reminds_confirmed_bookings_in_window_once() {
        let engine = Arc::new(Engine::new(test_journal_path("remind_once.journal")).unwrap());
        let court = court_with(&engine).await;
        let now = at(2025, 6, 1, 18, 40);

        let due = book(&engine, &court, at(2025, 6, 1, 19, 0), true).await;
        book(&engine, &court, at(2025, 6, 1, 20, 0), true).await; // outside the lead
        book(&engine, &court, at(2025, 6, 1, 17, 0), true).await; // already started
        let other = court_with(&engine).await;
        let pending = book(&engine, &other, at(2025, 6, 1, 19, 0), false).await;
        assert_eq!(pending.status, BookingStatus::Pending);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sweep = sweep(engine.clone(), tx);
        assert_eq!(sweep.sweep_once(now).await, 1);

        let n = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n.booking_id, due.id);
        assert_eq!(n.user_id, due.user_id);
        assert_eq!(n.kind, NotificationKind::Reminder);
        assert!(n.message.contains("19:00"), "{}", n.message);

        assert!(engine.get_booking(due.id).await.unwrap().booking.reminder_sent);
        assert_eq!(sweep.sweep_once(now).await, 0, "never reminded twice");
    }

    #[tokio::test]
    async fn cancelled_bookings_are_skipped() {
        let engine = Arc::new(Engine::new(test_journal_path("remind_cancelled.journal")).unwrap());
        let court = court_with(&engine).await;
        let b = book(&engine, &court, at(2025, 6, 1, 19, 0), true).await;
        engine
            .update_booking(
                b.id,
                BookingPatch { status: Some(BookingStatus::Cancelled), ..Default::default() },
                |_, _| Ok(()),
            )
            .await
            .unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        assert_eq!(sweep(engine, tx).sweep_once(at(2025, 6, 1, 18, 45)).await, 0);
    }

    #[tokio::test]
    async fn claim_survives_restart() {
        let path = test_journal_path("remind_restart.journal");
        let id = {
            let engine = Arc::new(Engine::new(path.clone()).unwrap());
            let court = court_with(&engine).await;
            let b = book(&engine, &court, at(2025, 6, 1, 19, 0), true).await;
            let (tx, _rx) = mpsc::unbounded_channel();
            assert_eq!(sweep(engine, tx).sweep_once(at(2025, 6, 1, 18, 45)).await, 1);
            b.id
        };

        let engine = Arc::new(Engine::new(path).unwrap());
        assert!(engine.get_booking(id).await.unwrap().booking.reminder_sent);
        let (tx, _rx) = mpsc::unbounded_channel();
        assert_eq!(sweep(engine, tx).sweep_once(at(2025, 6, 1, 18, 50)).await, 0);
    }
}
