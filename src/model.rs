use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Absolute instant; every stored timestamp is UTC.
pub type Timestamp = DateTime<Utc>;

/// Whole currency units (the schema stores DECIMAL(19,0)).
pub type Amount = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Span {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Back-to-back spans (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Manager,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourtStatus {
    Active,
    Inactive,
    Maintenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Court {
    pub id: Ulid,
    pub name: String,
    pub location: String,
    pub status: CourtStatus,
    /// Length of one bookable unit, in minutes. Always > 0.
    pub slot_duration: u32,
    pub owner_id: Ulid,
    pub is_deleted: bool,
    pub deleted_at: Option<Timestamp>,
}

impl Court {
    /// Only active, non-deleted courts accept bookings.
    pub fn accepts_bookings(&self) -> bool {
        !self.is_deleted && self.status == CourtStatus::Active
    }
}

/// Time-of-day price tier. Tiers may overlap; the first one in stored order wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSlot {
    pub id: Ulid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub price: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingType {
    #[default]
    Single,
    Recurring,
}

/// One booking row. A recurring series is a parent (`booking_type = Recurring`)
/// plus `Single` children pointing at it through `parent_booking_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub court_id: Ulid,
    pub user_id: Ulid,
    pub start_datetime: Timestamp,
    pub end_datetime: Timestamp,
    pub total_price: Amount,
    pub status: BookingStatus,
    pub booking_type: BookingType,
    pub parent_booking_id: Option<Ulid>,
    pub note: Option<String>,
    pub is_deleted: bool,
    pub reminder_sent: bool,
    pub created_at: Timestamp,
}

impl Booking {
    pub fn span(&self) -> Span {
        Span::new(self.start_datetime, self.end_datetime)
    }

    pub fn is_series_parent(&self) -> bool {
        self.booking_type == BookingType::Recurring
    }

    /// The one predicate deciding whether a booking holds its time range.
    /// Series parents never occupy time themselves; their children do.
    pub fn is_occupying(&self) -> bool {
        !self.is_deleted
            && matches!(self.status, BookingStatus::Pending | BookingStatus::Confirmed)
            && !self.is_series_parent()
    }

    /// Listed in "mine"/"court"/"all" views: live and not a child occurrence.
    pub fn is_listed(&self) -> bool {
        !self.is_deleted && self.parent_booking_id.is_none()
    }
}

/// Everything the store knows about one court. Guarded by a per-court lock.
#[derive(Debug, Clone)]
pub struct CourtState {
    pub court: Court,
    pub price_slots: Vec<PriceSlot>,
    /// All bookings on the court, sorted by `start_datetime`.
    pub bookings: Vec<Booking>,
}

impl CourtState {
    pub fn new(court: Court) -> Self {
        Self {
            court,
            price_slots: Vec::new(),
            bookings: Vec::new(),
        }
    }

    /// Insert or replace a booking, keeping start order.
    pub fn upsert_booking(&mut self, booking: Booking) {
        self.remove_booking(booking.id);
        let pos = self
            .bookings
            .partition_point(|b| b.start_datetime <= booking.start_datetime);
        self.bookings.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn booking(&self, id: &Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == *id)
    }

    pub fn children_of<'a>(&'a self, parent_id: &'a Ulid) -> impl Iterator<Item = &'a Booking> {
        self.bookings
            .iter()
            .filter(move |b| b.parent_booking_id.as_ref() == Some(parent_id))
    }

    /// Bookings whose span overlaps the query window, any status.
    /// Binary search skips everything starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.start_datetime < query.end);
        let start = query.start;
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.end_datetime > start)
    }
}

/// A top-level booking joined with its court and, for a series parent, its
/// child occurrences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRecord {
    pub court: Court,
    pub booking: Booking,
    pub children: Vec<Booking>,
}

/// Journal record. One record per committed operation, so a recurring
/// series (parent + children) is durable or absent as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    CourtRegistered {
        court: Court,
    },
    PriceSlotsReplaced {
        court_id: Ulid,
        slots: Vec<PriceSlot>,
    },
    CourtStatusChanged {
        court_id: Ulid,
        status: CourtStatus,
    },
    CourtRetired {
        court_id: Ulid,
        at: Timestamp,
    },
    BookingsCreated {
        court_id: Ulid,
        bookings: Vec<Booking>,
    },
    /// Full replacement rows for bookings that changed together.
    BookingsUpdated {
        court_id: Ulid,
        bookings: Vec<Booking>,
    },
}

impl Event {
    pub fn court_id(&self) -> Ulid {
        match self {
            Event::CourtRegistered { court } => court.id,
            Event::PriceSlotsReplaced { court_id, .. }
            | Event::CourtStatusChanged { court_id, .. }
            | Event::CourtRetired { court_id, .. }
            | Event::BookingsCreated { court_id, .. }
            | Event::BookingsUpdated { court_id, .. } => *court_id,
        }
    }
}
