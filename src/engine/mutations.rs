use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::timeutil::end_from_start;

use super::conflict::check_candidates;
use super::{Engine, BookingError};

/// Court provisioning input. Court CRUD proper lives outside this crate;
/// this is the boundary it (and the seed loader) calls.
#[derive(Debug, Clone)]
pub struct NewCourt {
    pub id: Ulid,
    pub name: String,
    pub location: String,
    pub status: CourtStatus,
    pub slot_duration: u32,
    pub owner_id: Ulid,
}

/// Partial update of one booking. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingPatch {
    pub status: Option<BookingStatus>,
    pub note: Option<String>,
    pub start_datetime: Option<Timestamp>,
}

impl BookingPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.note.is_none() && self.start_datetime.is_none()
    }
}

/// Live (non-deleted) booking or `BookingNotFound`.
fn live_booking(cs: &CourtState, id: Ulid) -> Result<Booking, BookingError> {
    cs.booking(&id)
        .filter(|b| !b.is_deleted)
        .cloned()
        .ok_or(BookingError::BookingNotFound(id))
}

impl Engine {
    pub async fn register_court(&self, new: NewCourt) -> Result<Court, BookingError> {
        if new.slot_duration == 0 || new.slot_duration > MAX_SLOT_DURATION_MINUTES {
            return Err(BookingError::Validation("slot duration out of range"));
        }
        if new.name.len() > MAX_NAME_LEN || new.location.len() > MAX_NAME_LEN {
            return Err(BookingError::Validation("court name or location too long"));
        }
        let _registry = self.registry.lock().await;
        if self.courts.contains_key(&new.id) {
            return Err(BookingError::AlreadyExists(new.id));
        }
        let court = Court {
            id: new.id,
            name: new.name,
            location: new.location,
            status: new.status,
            slot_duration: new.slot_duration,
            owner_id: new.owner_id,
            is_deleted: false,
            deleted_at: None,
        };
        self.journal_append(&Event::CourtRegistered { court: court.clone() })
            .await?;
        self.courts
            .insert(court.id, Arc::new(RwLock::new(CourtState::new(court.clone()))));
        Ok(court)
    }

    /// Replace a court's price tiers. Order is kept: it decides which of two
    /// overlapping tiers applies.
    pub async fn replace_price_slots(
        &self,
        court_id: Ulid,
        slots: Vec<PriceSlot>,
    ) -> Result<(), BookingError> {
        if slots.len() > MAX_PRICE_SLOTS_PER_COURT {
            return Err(BookingError::Validation("too many price slots"));
        }
        if slots.iter().any(|s| s.start_time >= s.end_time) {
            return Err(BookingError::Validation("price slot must start before it ends"));
        }
        if slots.iter().any(|s| s.price < 0) {
            return Err(BookingError::Validation("price must not be negative"));
        }
        let cs = self
            .get_court(&court_id)
            .ok_or(BookingError::CourtNotFound(court_id))?;
        let mut guard = cs.write().await;
        self.persist_and_apply(&mut guard, &Event::PriceSlotsReplaced { court_id, slots })
            .await
    }

    pub async fn set_court_status(&self, court_id: Ulid, status: CourtStatus) -> Result<(), BookingError> {
        let cs = self
            .get_court(&court_id)
            .ok_or(BookingError::CourtNotFound(court_id))?;
        let mut guard = cs.write().await;
        self.persist_and_apply(&mut guard, &Event::CourtStatusChanged { court_id, status })
            .await
    }

    /// Soft-delete a court. Existing bookings are kept as they are.
    pub async fn retire_court(&self, court_id: Ulid, at: Timestamp) -> Result<(), BookingError> {
        let cs = self
            .get_court(&court_id)
            .ok_or(BookingError::CourtNotFound(court_id))?;
        let mut guard = cs.write().await;
        if guard.court.is_deleted {
            return Err(BookingError::CourtNotFound(court_id));
        }
        self.persist_and_apply(&mut guard, &Event::CourtRetired { court_id, at })
            .await
    }

    /// Insert a set of rows atomically: one single booking, or a series
    /// parent with all its children.
    ///
    /// The court's write guard is taken before the conflict check and held
    /// until the rows are journaled and applied. Any conflict aborts the
    /// whole set before anything is written.
    pub async fn insert_bookings(
        &self,
        court_id: Ulid,
        rows: Vec<Booking>,
    ) -> Result<Vec<Booking>, BookingError> {
        if rows.is_empty() {
            return Err(BookingError::Validation("nothing to book"));
        }
        let cs = self
            .get_court(&court_id)
            .ok_or(BookingError::CourtNotFound(court_id))?;
        let mut guard = cs.write().await;
        if !guard.court.accepts_bookings() {
            return Err(BookingError::CourtNotFound(court_id));
        }

        let candidates: Vec<Span> = rows
            .iter()
            .filter(|b| b.is_occupying())
            .map(Booking::span)
            .collect();
        if let Err(e) = check_candidates(&guard, &candidates, &[]) {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }

        let event = Event::BookingsCreated { court_id, bookings: rows.clone() };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(rows)
    }

    /// Soft-delete a booking and, for a series parent, every child, in one
    /// record. Allowed from any status.
    pub async fn cancel_booking<F>(&self, id: Ulid, authorize: F) -> Result<Vec<Booking>, BookingError>
    where
        F: FnOnce(&Court, &Booking) -> Result<(), BookingError>,
    {
        let mut guard = self.lock_court_of(&id).await?;
        let target = live_booking(&guard, id)?;
        authorize(&guard.court, &target)?;

        let mut rows = vec![target];
        rows.extend(guard.children_of(&id).cloned());
        for row in rows.iter_mut() {
            row.status = BookingStatus::Cancelled;
            row.is_deleted = true;
        }

        let event = Event::BookingsUpdated { court_id: guard.court.id, bookings: rows.clone() };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(rows)
    }

    /// pending → confirmed, cascading to the pending children of a series.
    /// Anything not pending reads as `BookingNotFound`.
    pub async fn confirm_booking<F>(&self, id: Ulid, authorize: F) -> Result<Vec<Booking>, BookingError>
    where
        F: FnOnce(&Court, &Booking) -> Result<(), BookingError>,
    {
        let mut guard = self.lock_court_of(&id).await?;
        let target = live_booking(&guard, id)?;
        if target.status != BookingStatus::Pending {
            return Err(BookingError::BookingNotFound(id));
        }
        authorize(&guard.court, &target)?;

        let mut rows = vec![target];
        rows.extend(
            guard
                .children_of(&id)
                .filter(|c| !c.is_deleted && c.status == BookingStatus::Pending)
                .cloned(),
        );
        for row in rows.iter_mut() {
            row.status = BookingStatus::Confirmed;
        }

        let event = Event::BookingsUpdated { court_id: guard.court.id, bookings: rows.clone() };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(rows)
    }

    /// Apply a patch under the court lock. A new start moves the end along
    /// with the court's slot duration; any row that (re)gains occupancy or
    /// moves is conflict-checked against everything but the rows being
    /// changed. Status changes on a series parent cascade to live children.
    pub async fn update_booking<F>(
        &self,
        id: Ulid,
        patch: BookingPatch,
        authorize: F,
    ) -> Result<Vec<Booking>, BookingError>
    where
        F: FnOnce(&Court, &Booking) -> Result<(), BookingError>,
    {
        if patch.is_empty() {
            return Err(BookingError::NoChanges);
        }
        if patch.note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_LEN) {
            return Err(BookingError::Validation("note too long"));
        }

        let mut guard = self.lock_court_of(&id).await?;
        let original = live_booking(&guard, id)?;
        authorize(&guard.court, &original)?;
        if original.is_series_parent() && patch.start_datetime.is_some() {
            return Err(BookingError::Validation(
                "a recurring series is rescheduled one occurrence at a time",
            ));
        }

        let mut updated = original.clone();
        if let Some(note) = patch.note {
            updated.note = Some(note);
        }
        if let Some(start) = patch.start_datetime {
            updated.start_datetime = start;
            updated.end_datetime = end_from_start(start, guard.court.slot_duration)
                .ok_or(BookingError::Validation("start_datetime out of range"))?;
        }
        if let Some(status) = patch.status {
            updated.status = status;
        }

        let mut rows = vec![(original, updated)];
        if let (Some(status), true) = (patch.status, rows[0].0.is_series_parent()) {
            for child in guard.children_of(&id).filter(|c| !c.is_deleted) {
                let mut changed = child.clone();
                changed.status = status;
                rows.push((child.clone(), changed));
            }
        }

        let exclude: Vec<Ulid> = rows.iter().map(|(before, _)| before.id).collect();
        let candidates: Vec<Span> = rows
            .iter()
            .filter(|(before, after)| {
                after.is_occupying() && (!before.is_occupying() || before.span() != after.span())
            })
            .map(|(_, after)| after.span())
            .collect();
        if let Err(e) = check_candidates(&guard, &candidates, &exclude) {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }

        let bookings: Vec<Booking> = rows.into_iter().map(|(_, after)| after).collect();
        let event = Event::BookingsUpdated { court_id: guard.court.id, bookings: bookings.clone() };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(bookings)
    }

    /// Claim a booking for its start reminder. Returns `false` when it no
    /// longer qualifies (already reminded, cancelled, or not confirmed), so
    /// each booking is claimed at most once.
    pub async fn claim_reminder(&self, id: Ulid) -> Result<bool, BookingError> {
        let mut guard = self.lock_court_of(&id).await?;
        let Some(booking) = guard.booking(&id) else {
            return Ok(false);
        };
        if booking.reminder_sent
            || booking.status != BookingStatus::Confirmed
            || !booking.is_occupying()
        {
            return Ok(false);
        }
        let mut claimed = booking.clone();
        claimed.reminder_sent = true;
        let event = Event::BookingsUpdated { court_id: guard.court.id, bookings: vec![claimed] };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(true)
    }
}
