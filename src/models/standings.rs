use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const RECENT_RACES_CAPACITY: usize = 10;

/// Aggregate for one participant inside one window (season or month).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standing {
    pub participant_id: String,
    pub display_name: String,
    pub total_points: u32,
    pub races_played: u32,
    pub wins: u32,
    pub podium_count: u32,
    pub positions_history: Vec<u32>,
}

#[derive(Debug, Serialize)]
pub struct MonthStandings {
    pub month_key: String,
    pub standings: Vec<Standing>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentRace {
    pub day_key: String,
    pub position: u32,
    pub points: u32,
    pub elapsed_time: f64,
    pub submitted_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerProfile {
    pub participant_id: String,
    pub display_name: String,
    pub races_participated: u32,
    pub races_won: u32,
    pub total_points: u32,
    pub podium_count: u32,
    pub best_position_ever: Option<u32>,
    /// Newest first.
    pub recent_races: VecDeque<RecentRace>,
}
