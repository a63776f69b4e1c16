use core_types::{Candidate, PositionHit, TRACKED_POSITIONS};

/// Position hits for the leading candidates of an activity list, in the order
/// the activity filter produced them. Only the first ten positions are tracked.
pub fn position_hits(active: &[Candidate]) -> Vec<PositionHit> {
    active
        .iter()
        .take(TRACKED_POSITIONS)
        .enumerate()
        .map(|(position, candidate)| PositionHit {
            symbol: candidate.symbol.clone(),
            position,
        })
        .collect()
}
