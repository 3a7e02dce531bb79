use crate::engine::BookingError;
use crate::model::Role;

use super::{BookingService, BookingView, Caller};

impl BookingService {
    /// The caller's own top-level bookings, newest start first.
    pub async fn list_mine(&self, caller: &Caller) -> Vec<BookingView> {
        let me = caller.id;
        self.engine
            .list_bookings(|_, b| b.user_id == me)
            .await
            .iter()
            .map(BookingView::from)
            .collect()
    }

    /// Bookings on courts the caller owns. Managers and admins only.
    pub async fn list_for_owner(&self, caller: &Caller) -> Result<Vec<BookingView>, BookingError> {
        if caller.role == Role::Customer {
            return Err(BookingError::PermissionDenied);
        }
        let owner = caller.id;
        Ok(self
            .engine
            .list_bookings(|court, _| court.owner_id == owner)
            .await
            .iter()
            .map(BookingView::from)
            .collect())
    }

    pub async fn list_all(&self, caller: &Caller) -> Result<Vec<BookingView>, BookingError> {
        if !caller.is_admin() {
            return Err(BookingError::PermissionDenied);
        }
        Ok(self
            .engine
            .list_bookings(|_, _| true)
            .await
            .iter()
            .map(BookingView::from)
            .collect())
    }
}
