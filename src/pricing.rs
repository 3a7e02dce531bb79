use chrono::FixedOffset;

use crate::model::{Amount, PriceSlot, Timestamp};
use crate::timeutil::time_of_day;

/// First tier, in stored order, whose `[start_time, end_time)` holds the
/// start's time of day.
pub fn matching_tier(slots: &[PriceSlot], start: Timestamp, venue: FixedOffset) -> Option<&PriceSlot> {
    let t = time_of_day(start, venue);
    slots
        .iter()
        .find(|slot| slot.start_time <= t && t < slot.end_time)
}

/// Price of one slot starting at `start`. Falls back to 0 (a free booking)
/// when no tier matches or the court has none configured.
pub fn resolve_price(slots: &[PriceSlot], start: Timestamp, venue: FixedOffset) -> Amount {
    matching_tier(slots, start, venue).map_or(0, |slot| slot.price)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;
    use ulid::Ulid;

    use super::*;
    use crate::model::fixtures::at;

    fn tier(start: (u32, u32), end: (u32, u32), price: Amount) -> PriceSlot {
        PriceSlot {
            id: Ulid::new(),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            price,
        }
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn evening_tier_applies() {
        let slots = vec![tier((18, 0), (22, 0), 200_000)];
        assert_eq!(resolve_price(&slots, at(2025, 6, 1, 19, 0), utc()), 200_000);
    }

    #[test]
    fn tier_bounds_are_half_open() {
        let slots = vec![tier((18, 0), (22, 0), 200_000)];
        assert_eq!(resolve_price(&slots, at(2025, 6, 1, 18, 0), utc()), 200_000);
        assert_eq!(resolve_price(&slots, at(2025, 6, 1, 22, 0), utc()), 0);
    }

    #[test]
    fn no_tiers_means_free() {
        assert_eq!(resolve_price(&[], at(2025, 6, 1, 19, 0), utc()), 0);
        let slots = vec![tier((6, 0), (10, 0), 80_000)];
        assert_eq!(resolve_price(&slots, at(2025, 6, 1, 12, 0), utc()), 0);
    }

    #[test]
    fn first_match_wins_on_overlap() {
        let slots = vec![tier((17, 0), (21, 0), 150_000), tier((18, 0), (22, 0), 200_000)];
        assert_eq!(resolve_price(&slots, at(2025, 6, 1, 19, 0), utc()), 150_000);
        assert_eq!(resolve_price(&slots, at(2025, 6, 1, 21, 0), utc()), 200_000);

        let reversed: Vec<_> = slots.into_iter().rev().collect();
        assert_eq!(resolve_price(&reversed, at(2025, 6, 1, 19, 0), utc()), 200_000);
    }

    #[test]
    fn resolution_is_deterministic() {
        let slots = vec![tier((5, 0), (12, 0), 90_000), tier((12, 0), (23, 0), 120_000)];
        let start = at(2025, 6, 3, 11, 59);
        let first = resolve_price(&slots, start, utc());
        for _ in 0..10 {
            assert_eq!(resolve_price(&slots, start, utc()), first);
        }
    }

    #[test]
    fn venue_offset_shifts_tier() {
        let slots = vec![tier((18, 0), (22, 0), 200_000)];
        let venue = FixedOffset::east_opt(7 * 3600).unwrap();
        // 12:00 UTC = 19:00 local
        assert_eq!(resolve_price(&slots, at(2025, 6, 1, 12, 0), venue), 200_000);
        assert_eq!(resolve_price(&slots, at(2025, 6, 1, 19, 0), venue), 0);
    }
}
