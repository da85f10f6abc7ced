use crate::db::{json_column, Db};
use crate::error::{AppError, Rejection};
use crate::models::race::{RaceLedger, RaceResult};
use crate::models::track::{DailyModifier, TrackDescription};
use crate::services::track_generator;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use tracing::{debug, info};

const RESULT_COLUMNS: &str = "participant_id, display_name, day_key, elapsed_time, position, \
     points, car_config, checkpoint_splits, replay_fingerprint, submitted_at, flags";

fn row_to_result(row: &rusqlite::Row<'_>) -> rusqlite::Result<RaceResult> {
    Ok(RaceResult {
        participant_id: row.get(0)?,
        display_name: row.get(1)?,
        day_key: row.get(2)?,
        elapsed_time: row.get(3)?,
        position: row.get(4)?,
        points: row.get(5)?,
        car_config: json_column(row, 6)?,
        checkpoint_splits: json_column(row, 7)?,
        replay_fingerprint: row.get(8)?,
        submitted_at: row.get(9)?,
        flags: json_column(row, 10)?,
    })
}

/// Results of a day in storage order (by stored position, then arrival).
pub fn stored_results(conn: &Connection, day_key: &str) -> Result<Vec<RaceResult>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM results WHERE day_key = ?1 ORDER BY position, submitted_at",
        RESULT_COLUMNS
    ))?;
    let results = stmt
        .query_map(params![day_key], row_to_result)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(results)
}

fn load(conn: &Connection, day_key: &str) -> Result<Option<RaceLedger>, AppError> {
    let header = conn
        .query_row(
            "SELECT track, modifier, frozen, finalized FROM races WHERE day_key = ?1",
            params![day_key],
            |row| {
                let modifier: String = row.get(1)?;
                let modifier = DailyModifier::parse(&modifier).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        Type::Text,
                        format!("unknown modifier {}", modifier).into(),
                    )
                })?;
                Ok((
                    json_column::<TrackDescription>(row, 0)?,
                    modifier,
                    row.get::<_, bool>(2)?,
                    row.get::<_, bool>(3)?,
                ))
            },
        )
        .optional()?;

    match header {
        Some((track, modifier, frozen, finalized)) => Ok(Some(RaceLedger {
            day_key: day_key.to_string(),
            track,
            modifier,
            frozen,
            finalized,
            results: stored_results(conn, day_key)?,
        })),
        None => Ok(None),
    }
}

pub fn get(db: &Db, day_key: &str) -> Result<Option<RaceLedger>, AppError> {
    db.with_conn(|conn| load(conn, day_key))
}

pub fn results(db: &Db, day_key: &str) -> Result<Vec<RaceResult>, AppError> {
    db.with_conn(|conn| stored_results(conn, day_key))
}

/// Returns the day's ledger, creating it from the generator on first touch.
/// Concurrent creators converge on one row through `INSERT OR IGNORE`.
pub fn get_or_create(db: &Db, day_key: &str) -> Result<RaceLedger, AppError> {
    if let Some(ledger) = get(db, day_key)? {
        return Ok(ledger);
    }

    let track = track_generator::generate_track(day_key);
    let modifier = track_generator::daily_modifier(day_key);
    let track_json = serde_json::to_string(&track)?;

    db.with_tx(|tx| {
        let created = tx.execute(
            "INSERT OR IGNORE INTO races (day_key, track, modifier) VALUES (?1, ?2, ?3)",
            params![day_key, track_json, modifier.as_str()],
        )?;
        if created > 0 {
            info!(day_key, length = track.length, laps = track.laps_required, "race day created");
        }
        load(tx, day_key)?
            .ok_or_else(|| AppError::StoreUnavailable(format!("race {} vanished", day_key)))
    })
}

/// Check-then-append as one transaction: an existing result wins over the
/// frozen check so a retried submission always reports `AlreadySubmitted`.
pub fn submit(db: &Db, result: &RaceResult) -> Result<(), AppError> {
    let car_config = serde_json::to_string(&result.car_config)?;
    let splits = serde_json::to_string(&result.checkpoint_splits)?;
    let flags = serde_json::to_string(&result.flags)?;

    db.with_tx(|tx| {
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM results WHERE day_key = ?1 AND participant_id = ?2)",
            params![result.day_key, result.participant_id],
            |row| row.get(0),
        )?;
        if exists {
            return Err(Rejection::AlreadySubmitted.into());
        }

        let frozen: Option<bool> = tx
            .query_row(
                "SELECT frozen FROM races WHERE day_key = ?1",
                params![result.day_key],
                |row| row.get(0),
            )
            .optional()?;
        match frozen {
            None => {
                return Err(AppError::NotFound(format!("Race {} not found", result.day_key)))
            }
            Some(true) => return Err(Rejection::RaceFrozen.into()),
            Some(false) => {}
        }

        // The primary key still guards the pair if anything bypasses the check.
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO results (participant_id, display_name, day_key, elapsed_time,
             position, points, car_config, checkpoint_splits, replay_fingerprint, submitted_at, flags)
             VALUES (?1, ?2, ?3, ?4, 0, 0, ?5, ?6, ?7, ?8, ?9)",
            params![
                result.participant_id,
                result.display_name,
                result.day_key,
                result.elapsed_time,
                car_config,
                splits,
                result.replay_fingerprint,
                result.submitted_at,
                flags,
            ],
        )?;
        if inserted == 0 {
            return Err(Rejection::AlreadySubmitted.into());
        }
        Ok(())
    })
}

/// Idempotent. Returns whether this call performed the Open -> Frozen step.
pub fn freeze(db: &Db, day_key: &str) -> Result<bool, AppError> {
    get_or_create(db, day_key)?;
    let changed = db.with_tx(|tx| {
        Ok(tx.execute(
            "UPDATE races SET frozen = 1 WHERE day_key = ?1 AND frozen = 0",
            params![day_key],
        )?)
    })?;
    if changed > 0 {
        info!(day_key, "race frozen");
    } else {
        debug!(day_key, "race already frozen");
    }
    Ok(changed > 0)
}

/// Persists recomputed positions and points. The participant set must match
/// what is stored exactly.
pub fn replace_results(db: &Db, day_key: &str, results: &[RaceResult]) -> Result<(), AppError> {
    db.with_tx(|tx| {
        let stored: HashSet<String> = {
            let mut stmt = tx.prepare("SELECT participant_id FROM results WHERE day_key = ?1")?;
            let ids = stmt
                .query_map(params![day_key], |row| row.get(0))?
                .collect::<Result<HashSet<String>, _>>()?;
            ids
        };
        let incoming: HashSet<String> = results.iter().map(|r| r.participant_id.clone()).collect();
        if stored != incoming || incoming.len() != results.len() {
            return Err(AppError::BadRequest(format!(
                "replacement for {} would change its participants",
                day_key
            )));
        }

        let mut stmt = tx.prepare(
            "UPDATE results SET position = ?1, points = ?2
             WHERE day_key = ?3 AND participant_id = ?4",
        )?;
        for result in results {
            stmt.execute(params![result.position, result.points, day_key, result.participant_id])?;
        }
        Ok(())
    })
}

pub fn mark_finalized(db: &Db, day_key: &str) -> Result<(), AppError> {
    db.with_tx(|tx| {
        tx.execute(
            "UPDATE races SET frozen = 1, finalized = 1 WHERE day_key = ?1",
            params![day_key],
        )?;
        Ok(())
    })
}
