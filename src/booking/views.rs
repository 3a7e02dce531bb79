use serde::Serialize;
use ulid::Ulid;

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourtSummary {
    pub id: Ulid,
    pub name: String,
    pub location: String,
    pub owner_id: Ulid,
}

impl From<&Court> for CourtSummary {
    fn from(court: &Court) -> Self {
        Self {
            id: court.id,
            name: court.name.clone(),
            location: court.location.clone(),
            owner_id: court.owner_id,
        }
    }
}

/// One occurrence of a recurring series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildView {
    pub id: Ulid,
    pub start_datetime: Timestamp,
    pub end_datetime: Timestamp,
    pub total_price: Amount,
    pub status: BookingStatus,
    pub is_deleted: bool,
}

impl From<&Booking> for ChildView {
    fn from(b: &Booking) -> Self {
        Self {
            id: b.id,
            start_datetime: b.start_datetime,
            end_datetime: b.end_datetime,
            total_price: b.total_price,
            status: b.status,
            is_deleted: b.is_deleted,
        }
    }
}

/// Response shape for a top-level booking. `child_bookings` is present only
/// for series parents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingView {
    pub id: Ulid,
    pub court: CourtSummary,
    pub user_id: Ulid,
    pub start_datetime: Timestamp,
    pub end_datetime: Timestamp,
    pub total_price: Amount,
    pub status: BookingStatus,
    pub booking_type: BookingType,
    pub parent_booking_id: Option<Ulid>,
    pub note: Option<String>,
    pub reminder_sent: bool,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_bookings: Option<Vec<ChildView>>,
}

impl BookingView {
    pub fn new(court: &Court, booking: &Booking, children: &[Booking]) -> Self {
        Self {
            id: booking.id,
            court: CourtSummary::from(court),
            user_id: booking.user_id,
            start_datetime: booking.start_datetime,
            end_datetime: booking.end_datetime,
            total_price: booking.total_price,
            status: booking.status,
            booking_type: booking.booking_type,
            parent_booking_id: booking.parent_booking_id,
            note: booking.note.clone(),
            reminder_sent: booking.reminder_sent,
            created_at: booking.created_at,
            child_bookings: booking
                .is_series_parent()
                .then(|| children.iter().map(ChildView::from).collect()),
        }
    }
}

impl From<&BookingRecord> for BookingView {
    fn from(record: &BookingRecord) -> Self {
        Self::new(&record.court, &record.booking, &record.children)
    }
}
