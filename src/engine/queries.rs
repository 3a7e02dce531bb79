use ulid::Ulid;

use crate::model::*;

use super::{BookingError, Engine, SharedCourtState};

impl Engine {
    fn court_handles(&self) -> Vec<SharedCourtState> {
        self.courts.iter().map(|e| e.value().clone()).collect()
    }

    pub fn court_count(&self) -> usize {
        self.courts.len()
    }

    pub async fn get_court_info(&self, court_id: &Ulid) -> Option<Court> {
        let cs = self.get_court(court_id)?;
        let guard = cs.read().await;
        Some(guard.court.clone())
    }

    /// Court and its price tiers, provided the court accepts bookings.
    pub async fn bookable_court(&self, court_id: Ulid) -> Result<(Court, Vec<PriceSlot>), BookingError> {
        let cs = self
            .get_court(&court_id)
            .ok_or(BookingError::CourtNotFound(court_id))?;
        let guard = cs.read().await;
        if !guard.court.accepts_bookings() {
            return Err(BookingError::CourtNotFound(court_id));
        }
        Ok((guard.court.clone(), guard.price_slots.clone()))
    }

    /// A live booking with its court and children (all children, any status).
    pub async fn get_booking(&self, id: Ulid) -> Result<BookingRecord, BookingError> {
        let court_id = self
            .court_for_booking(&id)
            .ok_or(BookingError::BookingNotFound(id))?;
        let cs = self
            .get_court(&court_id)
            .ok_or(BookingError::BookingNotFound(id))?;
        let guard = cs.read().await;
        let booking = guard
            .booking(&id)
            .filter(|b| !b.is_deleted)
            .cloned()
            .ok_or(BookingError::BookingNotFound(id))?;
        Ok(BookingRecord {
            court: guard.court.clone(),
            children: guard.children_of(&id).cloned().collect(),
            booking,
        })
    }

    /// Top-level live bookings matching `keep`, newest start first. Each
    /// court is read under its own lock, so a series is seen whole or not at all.
    pub async fn list_bookings<F>(&self, keep: F) -> Vec<BookingRecord>
    where
        F: Fn(&Court, &Booking) -> bool,
    {
        let mut records = Vec::new();
        for cs in self.court_handles() {
            let guard = cs.read().await;
            for booking in guard.bookings.iter().filter(|b| b.is_listed()) {
                if !keep(&guard.court, booking) {
                    continue;
                }
                records.push(BookingRecord {
                    court: guard.court.clone(),
                    booking: booking.clone(),
                    children: guard.children_of(&booking.id).cloned().collect(),
                });
            }
        }
        records.sort_by(|a, b| {
            b.booking
                .start_datetime
                .cmp(&a.booking.start_datetime)
                .then(b.booking.id.cmp(&a.booking.id))
        });
        records
    }

    /// Confirmed, occupying, not-yet-reminded bookings starting in `[from, until]`.
    pub async fn due_reminders(&self, from: Timestamp, until: Timestamp) -> Vec<(Court, Booking)> {
        let mut due = Vec::new();
        for cs in self.court_handles() {
            let guard = cs.read().await;
            for b in guard.bookings.iter() {
                if b.status == BookingStatus::Confirmed
                    && b.is_occupying()
                    && !b.reminder_sent
                    && b.start_datetime >= from
                    && b.start_datetime <= until
                {
                    due.push((guard.court.clone(), b.clone()));
                }
            }
        }
        due
    }

    /// Occupying bookings on one court overlapping `window`, earliest first.
    #[cfg(test)]
    pub(crate) async fn occupancy(&self, court_id: Ulid, window: Span) -> Result<Vec<Booking>, BookingError> {
        let cs = self
            .get_court(&court_id)
            .ok_or(BookingError::CourtNotFound(court_id))?;
        let guard = cs.read().await;
        Ok(guard
            .overlapping(&window)
            .filter(|b| b.is_occupying())
            .cloned()
            .collect())
    }
}
