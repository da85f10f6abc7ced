use crate::calendar;
use crate::db::{json_column, Db};
use crate::error::AppError;
use crate::models::race::RaceResult;
use crate::models::standings::{
    MonthStandings, PlayerProfile, RecentRace, Standing, RECENT_RACES_CAPACITY,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::VecDeque;
use tracing::debug;

const SEASON_SCOPE: &str = "season";

fn month_scope(month_key: &str) -> String {
    format!("month:{}", month_key)
}

fn row_to_standing(row: &rusqlite::Row<'_>) -> rusqlite::Result<Standing> {
    Ok(Standing {
        participant_id: row.get(0)?,
        display_name: row.get(1)?,
        total_points: row.get(2)?,
        races_played: row.get(3)?,
        wins: row.get(4)?,
        podium_count: row.get(5)?,
        positions_history: json_column(row, 6)?,
    })
}

const STANDING_COLUMNS: &str =
    "participant_id, display_name, total_points, races_played, wins, podium_count, positions";

fn load_standing(
    conn: &Connection,
    scope: &str,
    participant_id: &str,
) -> Result<Option<Standing>, AppError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {} FROM standings WHERE scope = ?1 AND participant_id = ?2",
                STANDING_COLUMNS
            ),
            params![scope, participant_id],
            row_to_standing,
        )
        .optional()?)
}

fn list_standings(conn: &Connection, scope: &str) -> Result<Vec<Standing>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM standings WHERE scope = ?1
         ORDER BY total_points DESC, podium_count DESC, wins DESC, participant_id ASC",
        STANDING_COLUMNS
    ))?;
    let standings = stmt
        .query_map(params![scope], row_to_standing)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(standings)
}

/// Adds one ranked result to a window aggregate.
pub fn record_standing(standing: Option<Standing>, result: &RaceResult) -> Standing {
    let mut standing = standing.unwrap_or_else(|| Standing {
        participant_id: result.participant_id.clone(),
        display_name: result.display_name.clone(),
        total_points: 0,
        races_played: 0,
        wins: 0,
        podium_count: 0,
        positions_history: Vec::new(),
    });
    standing.display_name = result.display_name.clone();
    standing.total_points += result.points;
    standing.races_played += 1;
    if result.position == 1 {
        standing.wins += 1;
    }
    if result.position <= 3 {
        standing.podium_count += 1;
    }
    standing.positions_history.push(result.position);
    standing
}

/// Adds one ranked result to a career record.
pub fn record_profile(profile: Option<PlayerProfile>, result: &RaceResult) -> PlayerProfile {
    let mut profile = profile.unwrap_or_else(|| PlayerProfile {
        participant_id: result.participant_id.clone(),
        display_name: result.display_name.clone(),
        races_participated: 0,
        races_won: 0,
        total_points: 0,
        podium_count: 0,
        best_position_ever: None,
        recent_races: VecDeque::with_capacity(RECENT_RACES_CAPACITY),
    });
    profile.display_name = result.display_name.clone();
    profile.races_participated += 1;
    if result.position == 1 {
        profile.races_won += 1;
    }
    if result.position <= 3 {
        profile.podium_count += 1;
    }
    profile.total_points += result.points;
    profile.best_position_ever = Some(
        profile
            .best_position_ever
            .map_or(result.position, |best| best.min(result.position)),
    );
    profile.recent_races.push_front(RecentRace {
        day_key: result.day_key.clone(),
        position: result.position,
        points: result.points,
        elapsed_time: result.elapsed_time,
        submitted_at: result.submitted_at,
    });
    profile.recent_races.truncate(RECENT_RACES_CAPACITY);
    profile
}

fn store_standing(conn: &Connection, scope: &str, standing: &Standing) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO standings (scope, participant_id, display_name, total_points,
         races_played, wins, podium_count, positions)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (scope, participant_id) DO UPDATE SET
            display_name = excluded.display_name,
            total_points = excluded.total_points,
            races_played = excluded.races_played,
            wins = excluded.wins,
            podium_count = excluded.podium_count,
            positions = excluded.positions",
        params![
            scope,
            standing.participant_id,
            standing.display_name,
            standing.total_points,
            standing.races_played,
            standing.wins,
            standing.podium_count,
            serde_json::to_string(&standing.positions_history)?,
        ],
    )?;
    Ok(())
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<PlayerProfile> {
    Ok(PlayerProfile {
        participant_id: row.get(0)?,
        display_name: row.get(1)?,
        races_participated: row.get(2)?,
        races_won: row.get(3)?,
        total_points: row.get(4)?,
        podium_count: row.get(5)?,
        best_position_ever: row.get(6)?,
        recent_races: json_column(row, 7)?,
    })
}

fn load_profile(conn: &Connection, participant_id: &str) -> Result<Option<PlayerProfile>, AppError> {
    Ok(conn
        .query_row(
            "SELECT participant_id, display_name, races_participated, races_won, total_points,
             podium_count, best_position, recent_races
             FROM profiles WHERE participant_id = ?1",
            params![participant_id],
            row_to_profile,
        )
        .optional()?)
}

fn store_profile(conn: &Connection, profile: &PlayerProfile) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO profiles (participant_id, display_name, races_participated, races_won,
         total_points, podium_count, best_position, recent_races)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (participant_id) DO UPDATE SET
            display_name = excluded.display_name,
            races_participated = excluded.races_participated,
            races_won = excluded.races_won,
            total_points = excluded.total_points,
            podium_count = excluded.podium_count,
            best_position = excluded.best_position,
            recent_races = excluded.recent_races",
        params![
            profile.participant_id,
            profile.display_name,
            profile.races_participated,
            profile.races_won,
            profile.total_points,
            profile.podium_count,
            profile.best_position_ever,
            serde_json::to_string(&profile.recent_races)?,
        ],
    )?;
    Ok(())
}

/// Fans one ranked result out into the season, month and profile aggregates.
/// The applied-marker, all three read-modify-writes and the commit are one
/// transaction, so a retry after any failure neither loses nor doubles a race.
/// Returns `false` if this (day, participant) pair was already applied.
pub fn apply(db: &Db, result: &RaceResult) -> Result<bool, AppError> {
    let month = month_scope(&calendar::month_key_of(&result.day_key));

    db.with_tx(|tx| {
        let fresh = tx.execute(
            "INSERT OR IGNORE INTO fanout_applied (day_key, participant_id) VALUES (?1, ?2)",
            params![result.day_key, result.participant_id],
        )?;
        if fresh == 0 {
            debug!(day_key = %result.day_key, participant_id = %result.participant_id, "fan-out already applied");
            return Ok(false);
        }

        for scope in [SEASON_SCOPE, month.as_str()] {
            let standing = load_standing(tx, scope, &result.participant_id)?;
            store_standing(tx, scope, &record_standing(standing, result))?;
        }
        let profile = load_profile(tx, &result.participant_id)?;
        store_profile(tx, &record_profile(profile, result))?;
        Ok(true)
    })
}

pub fn get_season_standings(db: &Db) -> Result<Vec<Standing>, AppError> {
    db.with_conn(|conn| list_standings(conn, SEASON_SCOPE))
}

pub fn get_month_standings(db: &Db, month_key: &str) -> Result<MonthStandings, AppError> {
    calendar::require_month_key(month_key)?;
    let standings = db.with_conn(|conn| list_standings(conn, &month_scope(month_key)))?;
    Ok(MonthStandings {
        month_key: month_key.to_string(),
        standings,
    })
}

pub fn get_player_profile(db: &Db, participant_id: &str) -> Result<PlayerProfile, AppError> {
    db.with_conn(|conn| load_profile(conn, participant_id))?
        .ok_or_else(|| AppError::NotFound(format!("No profile for {}", participant_id)))
}
