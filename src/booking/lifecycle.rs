use ulid::Ulid;

use crate::engine::{BookingError, BookingPatch};
use crate::model::*;
use crate::notify::NotificationKind;

use super::{BookingService, BookingView, Caller};

/// Split the head row (the one addressed by id) from the rows that changed
/// with it.
fn head_and_rest(mut rows: Vec<Booking>) -> Result<(Booking, Vec<Booking>), BookingError> {
    if rows.is_empty() {
        return Err(BookingError::Storage("mutation returned no rows".into()));
    }
    let head = rows.remove(0);
    Ok((head, rows))
}

impl BookingService {
    pub async fn get_booking(&self, caller: &Caller, id: Ulid) -> Result<BookingView, BookingError> {
        let record = self.engine.get_booking(id).await?;
        if !caller.is_party_to(&record.court, &record.booking) {
            return Err(BookingError::PermissionDenied);
        }
        Ok(BookingView::from(&record))
    }

    /// Soft-delete a booking (and its series) from any status. Renter, court
    /// owner or admin.
    pub async fn cancel_booking(&self, caller: &Caller, id: Ulid) -> Result<(), BookingError> {
        let who = *caller;
        let rows = self
            .engine
            .cancel_booking(id, |court, booking| {
                if who.is_party_to(court, booking) {
                    Ok(())
                } else {
                    Err(BookingError::PermissionDenied)
                }
            })
            .await?;
        let (head, rest) = head_and_rest(rows)?;
        tracing::info!("booking {} cancelled by {} ({} dependent rows)", id, caller.id, rest.len());

        let Some(court) = self.engine.get_court_info(&head.court_id).await else {
            return Ok(());
        };
        let recipient = if caller.id == head.user_id { court.owner_id } else { head.user_id };
        self.send(
            recipient,
            NotificationKind::BookingCancelled,
            "Booking cancelled",
            format!("{} on {} was cancelled", court.name, self.local_label(head.start_datetime)),
            head.id,
        );
        Ok(())
    }

    /// Renter or admin. Only an admin may change the status; a renter's
    /// status field is dropped before the change set is checked.
    pub async fn update_booking(
        &self,
        caller: &Caller,
        id: Ulid,
        mut patch: BookingPatch,
    ) -> Result<BookingView, BookingError> {
        if !caller.is_admin() {
            patch.status = None;
        }
        if patch.is_empty() {
            return Err(BookingError::NoChanges);
        }
        let who = *caller;
        let rows = self
            .engine
            .update_booking(id, patch, |_, booking| {
                if who.is_admin() || who.id == booking.user_id {
                    Ok(())
                } else {
                    Err(BookingError::PermissionDenied)
                }
            })
            .await?;
        let (head, _) = head_and_rest(rows)?;
        tracing::info!("booking {} updated by {}", head.id, caller.id);

        let record = self.engine.get_booking(head.id).await?;
        Ok(BookingView::from(&record))
    }

    /// pending → confirmed by the owner of the booked court.
    pub async fn confirm_booking(&self, caller: &Caller, id: Ulid) -> Result<BookingView, BookingError> {
        let owner = caller.id;
        self.confirm(id, move |court, _| {
            if court.owner_id == owner {
                Ok(())
            } else {
                Err(BookingError::PermissionDenied)
            }
        })
        .await
    }

    /// Payment-success hook: the same transition, with no caller to check.
    pub async fn confirm_paid(&self, id: Ulid) -> Result<BookingView, BookingError> {
        self.confirm(id, |_, _| Ok(())).await
    }

    async fn confirm<F>(&self, id: Ulid, authorize: F) -> Result<BookingView, BookingError>
    where
        F: FnOnce(&Court, &Booking) -> Result<(), BookingError>,
    {
        let rows = self.engine.confirm_booking(id, authorize).await?;
        let (head, rest) = head_and_rest(rows)?;
        tracing::info!("booking {} confirmed ({} occurrence(s) cascaded)", head.id, rest.len());

        let record = self.engine.get_booking(head.id).await?;
        self.send(
            head.user_id,
            NotificationKind::BookingConfirmed,
            "Booking confirmed",
            format!(
                "{} on {} is confirmed",
                record.court.name,
                self.local_label(head.start_datetime)
            ),
            head.id,
        );
        Ok(BookingView::from(&record))
    }
}
