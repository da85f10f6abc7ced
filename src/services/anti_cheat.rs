use crate::models::race::ValidatedSubmission;
use crate::models::track::TrackDescription;

/// Thresholds for the plausibility heuristics. None of this is cryptographic;
/// the replay fingerprint is only checked for shape.
#[derive(Debug, Clone)]
pub struct AntiCheatConfig {
    /// 300 km/h.
    pub max_speed_mps: f64,
    pub min_time_fraction: f64,
    pub min_checkpoint_gap: f64,
    pub min_fingerprint_len: usize,
    /// Number of independent heuristics that must fire before a run is refused.
    pub reject_threshold: usize,
}

impl Default for AntiCheatConfig {
    fn default() -> Self {
        AntiCheatConfig {
            max_speed_mps: 83.33,
            min_time_fraction: 0.5,
            min_checkpoint_gap: 0.1,
            min_fingerprint_len: 32,
            reject_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub accepted: bool,
    pub flags: Vec<String>,
}

pub fn theoretical_min_time(track: &TrackDescription, config: &AntiCheatConfig) -> f64 {
    f64::from(track.length) * f64::from(track.laps_required) / config.max_speed_mps
}

pub fn check_physical_plausibility(
    elapsed_time: f64,
    track: &TrackDescription,
    config: &AntiCheatConfig,
) -> Option<String> {
    let floor = theoretical_min_time(track, config) * config.min_time_fraction;
    (elapsed_time < floor).then(|| {
        format!(
            "elapsed time {:.2}s is implausibly fast for {} x {}m (floor {:.2}s)",
            elapsed_time, track.laps_required, track.length, floor
        )
    })
}

pub fn check_checkpoint_integrity(splits: &[f64], config: &AntiCheatConfig) -> Option<String> {
    for (i, split) in splits.iter().enumerate() {
        if splits[..i].contains(split) {
            return Some("duplicate checkpoint splits detected".to_string());
        }
    }
    splits
        .windows(2)
        .any(|w| w[1] - w[0] < config.min_checkpoint_gap)
        .then(|| "checkpoints are too close together".to_string())
}

pub fn check_fingerprint(fingerprint: &str, config: &AntiCheatConfig) -> Option<String> {
    (fingerprint.chars().count() < config.min_fingerprint_len)
        .then(|| "replay fingerprint is malformed".to_string())
}

/// Runs every heuristic (no short-circuit). A single flag is kept for
/// visibility but does not block the run; `reject_threshold` flags do.
pub fn evaluate(
    sub: &ValidatedSubmission,
    track: &TrackDescription,
    config: &AntiCheatConfig,
) -> Verdict {
    let flags: Vec<String> = [
        check_physical_plausibility(sub.elapsed_time, track, config),
        check_checkpoint_integrity(&sub.checkpoint_splits, config),
        check_fingerprint(&sub.replay_fingerprint, config),
    ]
    .into_iter()
    .flatten()
    .collect();

    Verdict {
        accepted: flags.len() < config.reject_threshold,
        flags,
    }
}
