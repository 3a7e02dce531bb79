use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Court missing, soft-deleted, or not active.
    CourtNotFound(Ulid),
    /// Booking missing or filtered out by the caller's status/visibility filter.
    BookingNotFound(Ulid),
    /// Requested range overlaps this occupying booking.
    Conflict(Ulid),
    PermissionDenied,
    NoChanges,
    Validation(&'static str),
    AlreadyExists(Ulid),
    Storage(String),
}

impl BookingError {
    /// Stable machine-readable code; clients branch on this, never on the message.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::CourtNotFound(_) => "COURT_NOT_FOUND",
            BookingError::BookingNotFound(_) => "BOOKING_NOT_FOUND",
            BookingError::Conflict(_) => "BOOKING_CONFLICT",
            BookingError::PermissionDenied => "PERMISSION_DENIED",
            BookingError::NoChanges => "NO_CHANGES",
            BookingError::Validation(_) => "VALIDATION_FAILED",
            BookingError::AlreadyExists(_) => "ALREADY_EXISTS",
            BookingError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            BookingError::CourtNotFound(_) | BookingError::BookingNotFound(_) => 404,
            BookingError::Conflict(_) | BookingError::AlreadyExists(_) => 409,
            BookingError::PermissionDenied => 403,
            BookingError::NoChanges | BookingError::Validation(_) => 400,
            BookingError::Storage(_) => 500,
        }
    }
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::CourtNotFound(id) => write!(f, "court not found: {id}"),
            BookingError::BookingNotFound(id) => write!(f, "booking not found: {id}"),
            BookingError::Conflict(id) => {
                write!(f, "time slot already taken by booking {id}")
            }
            BookingError::PermissionDenied => {
                write!(f, "you are not allowed to perform this action")
            }
            BookingError::NoChanges => write!(f, "no changes to apply"),
            BookingError::Validation(msg) => write!(f, "invalid request: {msg}"),
            BookingError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            BookingError::Storage(e) => write!(f, "journal error: {e}"),
        }
    }
}

impl std::error::Error for BookingError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_statuses_are_stable() {
        let id = Ulid::new();
        let cases = [
            (BookingError::CourtNotFound(id), "COURT_NOT_FOUND", 404),
            (BookingError::BookingNotFound(id), "BOOKING_NOT_FOUND", 404),
            (BookingError::Conflict(id), "BOOKING_CONFLICT", 409),
            (BookingError::PermissionDenied, "PERMISSION_DENIED", 403),
            (BookingError::NoChanges, "NO_CHANGES", 400),
            (BookingError::Validation("note too long"), "VALIDATION_FAILED", 400),
            (BookingError::Storage("disk full".into()), "STORAGE_ERROR", 500),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.http_status(), status);
        }
    }
}
