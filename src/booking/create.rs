use std::num::NonZeroU32;

use chrono::Utc;
use ulid::Ulid;

use crate::engine::BookingError;
use crate::limits::*;
use crate::model::*;
use crate::notify::NotificationKind;
use crate::pricing::resolve_price;
use crate::timeutil::{end_from_start, weekly_occurrences};

use super::{BookingService, BookingView, Caller};

#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub court_id: Ulid,
    pub start_datetime: Timestamp,
    pub booking_type: BookingType,
    /// Occurrences of a recurring series; ignored for single bookings.
    pub repeat_count: Option<u32>,
    pub note: Option<String>,
}

impl CreateBooking {
    fn occurrence_count(&self) -> Result<NonZeroU32, BookingError> {
        match self.booking_type {
            BookingType::Single => Ok(NonZeroU32::MIN),
            BookingType::Recurring => {
                let n = self.repeat_count.unwrap_or(DEFAULT_REPEAT_COUNT);
                if n > MAX_REPEAT_COUNT {
                    return Err(BookingError::Validation("repeat_count must be between 1 and 52"));
                }
                NonZeroU32::new(n)
                    .ok_or(BookingError::Validation("repeat_count must be between 1 and 52"))
            }
        }
    }
}

const OUT_OF_RANGE: BookingError = BookingError::Validation("start_datetime out of range");

fn pending_row(
    court: &Court,
    user_id: Ulid,
    start: Timestamp,
    price: Amount,
    note: Option<String>,
    now: Timestamp,
) -> Result<Booking, BookingError> {
    let end = end_from_start(start, court.slot_duration).ok_or(OUT_OF_RANGE)?;
    Ok(Booking {
        id: Ulid::new(),
        court_id: court.id,
        user_id,
        start_datetime: start,
        end_datetime: end,
        total_price: price,
        status: BookingStatus::Pending,
        booking_type: BookingType::Single,
        parent_booking_id: None,
        note,
        is_deleted: false,
        reminder_sent: false,
        created_at: now,
    })
}

/// Parent first, then one child per weekly start. The parent spans the first
/// occurrence and carries the series total; every child is priced from the
/// first occurrence's tier.
fn series_rows(
    court: &Court,
    user_id: Ulid,
    starts: &[Timestamp],
    unit_price: Amount,
    note: Option<String>,
    now: Timestamp,
) -> Result<Vec<Booking>, BookingError> {
    let mut parent = pending_row(court, user_id, starts[0], unit_price, note.clone(), now)?;
    parent.booking_type = BookingType::Recurring;
    parent.total_price = unit_price.saturating_mul(starts.len() as Amount);

    let mut rows = Vec::with_capacity(starts.len() + 1);
    for &start in starts {
        let mut child = pending_row(court, user_id, start, unit_price, note.clone(), now)?;
        child.parent_booking_id = Some(parent.id);
        rows.push(child);
    }
    rows.insert(0, parent);
    Ok(rows)
}

impl BookingService {
    /// Create a single booking or a whole weekly series. Either every row is
    /// committed or none is.
    pub async fn create_booking(
        &self,
        caller: &Caller,
        req: CreateBooking,
    ) -> Result<BookingView, BookingError> {
        if req.note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_LEN) {
            return Err(BookingError::Validation("note too long"));
        }
        let count = req.occurrence_count()?;

        let (court, slots) = self.engine.bookable_court(req.court_id).await?;
        let unit_price = resolve_price(&slots, req.start_datetime, self.venue);
        let now = Utc::now();

        let rows = match req.booking_type {
            BookingType::Single => vec![pending_row(
                &court,
                caller.id,
                req.start_datetime,
                unit_price,
                req.note,
                now,
            )?],
            BookingType::Recurring => {
                let starts = weekly_occurrences(req.start_datetime, count).ok_or(OUT_OF_RANGE)?;
                series_rows(&court, caller.id, &starts, unit_price, req.note, now)?
            }
        };

        let mut rows = self.engine.insert_bookings(court.id, rows).await?;
        let head = rows.remove(0);
        metrics::counter!(
            crate::observability::BOOKINGS_CREATED_TOTAL,
            "type" => if head.is_series_parent() { "recurring" } else { "single" }
        )
        .increment(1);
        tracing::info!(
            "booking {} created on court {} by {} ({} occurrence(s))",
            head.id,
            court.id,
            caller.id,
            count
        );

        let when = self.local_label(head.start_datetime);
        let message = if head.is_series_parent() {
            format!("{} booked weekly from {} ({} sessions)", court.name, when, count)
        } else {
            format!("{} booked for {}", court.name, when)
        };
        self.send(
            court.owner_id,
            NotificationKind::BookingCreated,
            "New booking",
            message,
            head.id,
        );

        Ok(BookingView::new(&court, &head, &rows))
    }
}
