use crate::models::track::{DailyModifier, TrackDescription};
use serde::{Deserialize, Serialize};

/// Raw submission as it arrives from the client. Fields stay untyped JSON so
/// that a value of the wrong type is refused by
/// `validation::validate_submission` with a reason, in check order, instead of
/// failing body extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionPayload {
    pub participant_id: serde_json::Value,
    pub display_name: serde_json::Value,
    pub day_key: serde_json::Value,
    pub elapsed_time: serde_json::Value,
    pub checkpoint_splits: serde_json::Value,
    pub car_config: serde_json::Value,
    pub replay_fingerprint: serde_json::Value,
}

impl SubmissionPayload {
    /// Participant id for log lines, whatever shape it arrived in.
    pub fn participant_label(&self) -> &str {
        self.participant_id.as_str().unwrap_or("")
    }
}

pub const CAR_CONFIG_VERSION: u32 = 1;

fn car_config_version() -> u32 {
    CAR_CONFIG_VERSION
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TyreCompound {
    Soft,
    Medium,
    Hard,
}

/// Closed car setup record. Parsed once at the boundary and carried through
/// the pipeline without further interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CarConfig {
    #[serde(default = "car_config_version")]
    pub version: u32,
    pub downforce: f64,
    pub gear_bias: f64,
    pub tyres: TyreCompound,
}

/// A submission that passed structural validation.
#[derive(Debug, Clone)]
pub struct ValidatedSubmission {
    pub participant_id: String,
    pub display_name: String,
    pub day_key: String,
    pub elapsed_time: f64,
    pub checkpoint_splits: Vec<f64>,
    pub car_config: CarConfig,
    pub replay_fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceResult {
    pub participant_id: String,
    pub display_name: String,
    pub day_key: String,
    pub elapsed_time: f64,
    /// 0 until ranked.
    pub position: u32,
    /// 0 until ranked.
    pub points: u32,
    pub car_config: CarConfig,
    pub checkpoint_splits: Vec<f64>,
    pub replay_fingerprint: String,
    /// Epoch milliseconds.
    pub submitted_at: i64,
    /// Anti-cheat flags recorded on acceptance; operator-only.
    #[serde(skip)]
    pub flags: Vec<String>,
}

impl RaceResult {
    pub fn from_submission(sub: ValidatedSubmission, submitted_at: i64, flags: Vec<String>) -> Self {
        RaceResult {
            participant_id: sub.participant_id,
            display_name: sub.display_name,
            day_key: sub.day_key,
            elapsed_time: sub.elapsed_time,
            position: 0,
            points: 0,
            car_config: sub.car_config,
            checkpoint_splits: sub.checkpoint_splits,
            replay_fingerprint: sub.replay_fingerprint,
            submitted_at,
            flags,
        }
    }
}

/// Authoritative per-day container.
#[derive(Debug, Clone, Serialize)]
pub struct RaceLedger {
    pub day_key: String,
    pub track: TrackDescription,
    pub modifier: DailyModifier,
    pub frozen: bool,
    pub finalized: bool,
    pub results: Vec<RaceResult>,
}

#[derive(Debug, Serialize)]
pub struct RaceInfo {
    pub day_key: String,
    pub track: TrackDescription,
    pub modifier: DailyModifier,
    pub frozen: bool,
    pub finalized: bool,
    pub entrants: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct SubmitResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaderboard_top_n: Option<Vec<RaceResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Podium {
    pub first: Option<RaceResult>,
    pub second: Option<RaceResult>,
    pub third: Option<RaceResult>,
}

impl Podium {
    /// Takes the top three of an already ranked slice.
    pub fn from_ranked(ranked: &[RaceResult]) -> Self {
        let mut top = ranked.iter().take(3).cloned();
        Podium {
            first: top.next(),
            second: top.next(),
            third: top.next(),
        }
    }
}
