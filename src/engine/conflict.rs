use ulid::Ulid;

use crate::model::*;

use super::BookingError;

/// First occupying booking on the court overlapping any candidate, ignoring
/// the ids in `exclude`. Caller must hold the court's write lock so the
/// answer stays true until its own rows are applied.
pub fn find_conflict(cs: &CourtState, candidates: &[Span], exclude: &[Ulid]) -> Option<Ulid> {
    candidates.iter().find_map(|span| {
        cs.overlapping(span)
            .find(|b| b.is_occupying() && !exclude.contains(&b.id))
            .map(|b| b.id)
    })
}

/// Candidates of one request must not overlap each other either.
fn first_self_overlap(candidates: &[Span]) -> Option<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by_key(|&i| candidates[i].start);
    order
        .windows(2)
        .find(|w| candidates[w[0]].overlaps(&candidates[w[1]]))
        .map(|w| w[1])
}

/// Validate a whole candidate set in one pass. Either every range is free or
/// the request fails with the first conflict found.
pub(crate) fn check_candidates(
    cs: &CourtState,
    candidates: &[Span],
    exclude: &[Ulid],
) -> Result<(), BookingError> {
    if let Some(existing) = find_conflict(cs, candidates, exclude) {
        return Err(BookingError::Conflict(existing));
    }
    if first_self_overlap(candidates).is_some() {
        return Err(BookingError::Validation("requested ranges overlap each other"));
    }
    Ok(())
}
