//! Booking orchestration and lifecycle on top of the store.
//!
//! `BookingService` is built once per process with its store and notifier
//! injected, then shared with the HTTP handlers and the reminder sweep.

mod create;
mod lifecycle;
mod queries;
mod views;

pub use create::CreateBooking;
pub use views::{BookingView, ChildView, CourtSummary};

use std::sync::Arc;

use chrono::FixedOffset;
use ulid::Ulid;

use crate::engine::Engine;
use crate::model::*;
use crate::notify::{self, Notification, NotificationKind, Notifier};

/// Authenticated caller, as injected by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Ulid,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Renter, owner of the booked court, or admin.
    pub(crate) fn is_party_to(&self, court: &Court, booking: &Booking) -> bool {
        self.is_admin() || self.id == booking.user_id || self.id == court.owner_id
    }
}

pub struct BookingService {
    engine: Arc<Engine>,
    notifier: Arc<dyn Notifier>,
    /// Wall clock of the venues; price tiers and messages use it.
    venue: FixedOffset,
}

impl BookingService {
    pub fn new(engine: Arc<Engine>, notifier: Arc<dyn Notifier>, venue: FixedOffset) -> Self {
        Self { engine, notifier, venue }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn venue(&self) -> FixedOffset {
        self.venue
    }

    pub(crate) fn local_label(&self, at: Timestamp) -> String {
        at.with_timezone(&self.venue).format("%H:%M %d/%m/%Y").to_string()
    }

    pub(crate) fn send(
        &self,
        user_id: Ulid,
        kind: NotificationKind,
        title: &str,
        message: String,
        booking_id: Ulid,
    ) {
        notify::dispatch(
            &self.notifier,
            Notification {
                user_id,
                kind,
                title: title.to_string(),
                message,
                booking_id,
            },
        );
    }
}
