use crate::models::race::RaceResult;
use std::cmp::Ordering;

const POINTS_TABLE: [u32; 10] = [25, 18, 15, 12, 10, 8, 6, 4, 2, 1];

pub fn points_for(position: u32) -> u32 {
    match position {
        0 => 0,
        p => POINTS_TABLE.get(p as usize - 1).copied().unwrap_or(0),
    }
}

/// Faster time first; on equal times the earlier submission wins. The
/// participant id only breaks ties that the store itself could not produce.
fn race_order(a: &RaceResult, b: &RaceResult) -> Ordering {
    a.elapsed_time
        .total_cmp(&b.elapsed_time)
        .then(a.submitted_at.cmp(&b.submitted_at))
        .then_with(|| a.participant_id.cmp(&b.participant_id))
}

/// Orders results and assigns dense 1-based positions and points from
/// scratch. Any previously stored position or points are ignored.
pub fn rank(mut results: Vec<RaceResult>) -> Vec<RaceResult> {
    results.sort_by(race_order);
    for (i, result) in results.iter_mut().enumerate() {
        result.position = i as u32 + 1;
        result.points = points_for(result.position);
    }
    results
}
