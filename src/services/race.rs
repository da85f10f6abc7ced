use crate::calendar;
use crate::config::Config;
use crate::db::Db;
use crate::error::{AppError, Rejection};
use crate::models::race::{Podium, RaceInfo, RaceResult, SubmissionPayload, SubmitResponse};
use crate::services::{anti_cheat, ledger, ranking, standings, track_generator};
use crate::validation;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
pub struct FreezeOutcome {
    pub day_key: String,
    pub frozen: bool,
    /// False when the race was already frozen.
    pub changed: bool,
}

fn rejected(participant_id: &str, rejection: Rejection) -> SubmitResponse {
    match &rejection {
        Rejection::AntiCheat { flags } => {
            warn!(participant_id, ?flags, "submission rejected by anti-cheat")
        }
        other => warn!(participant_id, kind = other.kind(), reason = %other, "submission rejected"),
    }
    SubmitResponse {
        accepted: false,
        error: Some(rejection.to_string()),
        error_kind: Some(rejection.kind()),
        ..Default::default()
    }
}

/// Entry point for a raw request body. A body that is not a JSON object is a
/// validation rejection like any other malformed field.
pub fn submit_body(
    db: &Db,
    config: &Config,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<SubmitResponse, AppError> {
    match serde_json::from_slice::<SubmissionPayload>(body) {
        Ok(payload) => submit_result(db, config, payload, now),
        Err(e) => Ok(rejected(
            "",
            Rejection::Validation(format!("submission must be a JSON object: {}", e)),
        )),
    }
}

/// Validate, anti-cheat, record, then rank. Every refusal comes back as an
/// `accepted: false` response; only store failures are errors.
pub fn submit_result(
    db: &Db,
    config: &Config,
    payload: SubmissionPayload,
    now: DateTime<Utc>,
) -> Result<SubmitResponse, AppError> {
    let sub = match validation::validate_submission(&payload, now) {
        Ok(sub) => sub,
        Err(rejection) => return Ok(rejected(payload.participant_label(), rejection)),
    };

    // Judged against the regenerated track, not whatever is stored.
    let track = track_generator::generate_track(&sub.day_key);
    let verdict = anti_cheat::evaluate(&sub, &track, &config.anti_cheat);
    if !verdict.accepted {
        return Ok(rejected(
            &sub.participant_id,
            Rejection::AntiCheat {
                flags: verdict.flags,
            },
        ));
    }
    if !verdict.flags.is_empty() {
        warn!(participant_id = %sub.participant_id, flags = ?verdict.flags, "accepted with anti-cheat flag");
    }

    ledger::get_or_create(db, &sub.day_key)?;
    let result = RaceResult::from_submission(sub, now.timestamp_millis(), verdict.flags);
    match ledger::submit(db, &result) {
        Ok(()) => {}
        Err(AppError::Rejected(rejection)) => {
            return Ok(rejected(&result.participant_id, rejection))
        }
        Err(e) => return Err(e),
    }

    let board = ranking::rank(ledger::results(db, &result.day_key)?);
    let position = board
        .iter()
        .find(|r| r.participant_id == result.participant_id)
        .map(|r| r.position);
    info!(
        day_key = %result.day_key,
        participant_id = %result.participant_id,
        elapsed_time = result.elapsed_time,
        ?position,
        "official run accepted"
    );

    Ok(SubmitResponse {
        accepted: true,
        position,
        elapsed_time: Some(result.elapsed_time),
        leaderboard_top_n: Some(board.into_iter().take(config.leaderboard_top_n).collect()),
        ..Default::default()
    })
}

/// Always a fresh ranking pass over what is stored.
pub fn get_leaderboard(db: &Db, day_key: &str) -> Result<Vec<RaceResult>, AppError> {
    calendar::require_day_key(day_key)?;
    Ok(ranking::rank(ledger::results(db, day_key)?))
}

/// Read-only: a day nobody has touched is described from the generator and
/// nothing is stored.
pub fn get_race(db: &Db, day_key: &str) -> Result<RaceInfo, AppError> {
    calendar::require_day_key(day_key)?;
    let info = match ledger::get(db, day_key)? {
        Some(ledger) => RaceInfo {
            day_key: ledger.day_key,
            track: ledger.track,
            modifier: ledger.modifier,
            frozen: ledger.frozen,
            finalized: ledger.finalized,
            entrants: ledger.results.len(),
        },
        None => RaceInfo {
            day_key: day_key.to_string(),
            track: track_generator::generate_track(day_key),
            modifier: track_generator::daily_modifier(day_key),
            frozen: false,
            finalized: false,
            entrants: 0,
        },
    };
    Ok(info)
}

pub fn get_podium(db: &Db, day_key: &str) -> Result<Podium, AppError> {
    Ok(Podium::from_ranked(&get_leaderboard(db, day_key)?))
}

pub fn freeze(db: &Db, day_key: &str) -> Result<FreezeOutcome, AppError> {
    calendar::require_day_key(day_key)?;
    let changed = ledger::freeze(db, day_key)?;
    Ok(FreezeOutcome {
        day_key: day_key.to_string(),
        frozen: true,
        changed,
    })
}

/// Ranks and persists positions and points without touching any aggregate.
pub fn recompute(db: &Db, day_key: &str) -> Result<Vec<RaceResult>, AppError> {
    calendar::require_day_key(day_key)?;
    if ledger::get(db, day_key)?.is_none() {
        return Err(AppError::NotFound(format!("Race {} not found", day_key)));
    }
    let ranked = ranking::rank(ledger::results(db, day_key)?);
    ledger::replace_results(db, day_key, &ranked)?;
    info!(day_key, entrants = ranked.len(), "results recomputed");
    Ok(ranked)
}

/// Open/Frozen -> Finalized. Freezes if needed, runs one ranking pass, fans
/// every result out once and caches the podium. Safe to call repeatedly and
/// to retry after a partial failure: each participant's fan-out is applied
/// at most once, and the finalized flag is only set after all of them.
pub fn finalize(db: &Db, day_key: &str) -> Result<Podium, AppError> {
    calendar::require_day_key(day_key)?;
    let current = ledger::get_or_create(db, day_key)?;
    if current.finalized {
        debug!(day_key, "race already finalized, returning cached podium");
        return Ok(Podium::from_ranked(&current.results));
    }

    ledger::freeze(db, day_key)?;
    // Re-read after freezing so a run that landed just before is included.
    let ranked = ranking::rank(ledger::results(db, day_key)?);
    ledger::replace_results(db, day_key, &ranked)?;

    let mut applied = 0;
    for result in &ranked {
        if standings::apply(db, result)? {
            applied += 1;
        }
    }
    ledger::mark_finalized(db, day_key)?;
    info!(day_key, entrants = ranked.len(), applied, "race finalized");

    Ok(Podium::from_ranked(&ranked))
}
