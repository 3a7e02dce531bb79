//! Hard limits and defaults applied to every request.

/// Weekly occurrences created when a recurring request omits `repeat_count`.
pub const DEFAULT_REPEAT_COUNT: u32 = 4;

/// Upper bound on a recurring series (one year of weekly slots).
pub const MAX_REPEAT_COUNT: u32 = 52;

pub const MAX_NOTE_LEN: usize = 500;

pub const MAX_NAME_LEN: usize = 255;

/// Slot duration used when a court is provisioned without one.
pub const DEFAULT_SLOT_DURATION_MINUTES: u32 = 60;

/// A single slot can never exceed one day.
pub const MAX_SLOT_DURATION_MINUTES: u32 = 24 * 60;

pub const MAX_PRICE_SLOTS_PER_COURT: usize = 48;

/// Largest request body accepted by the HTTP layer.
pub const MAX_BODY_BYTES: usize = 64 * 1024;
