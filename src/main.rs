mod calendar;
mod config;
mod db;
mod error;
mod handlers;
mod jobs;
mod models;
mod services;
mod state;
mod validation;

use config::Config;
use ntex::web;
use ntex_cors::Cors;
use state::AppState;
use tracing::info;

#[ntex::main]
async fn main() -> std::io::Result<()> {
    config::init_tracing();
    let config = Config::load();
    let bind = format!("{}:{}", config.host, config.port);

    let state = AppState::new(config).map_err(|e| {
        tracing::error!(error = %e, "failed to open database");
        std::io::Error::new(std::io::ErrorKind::Other, e)
    })?;

    if state.config.finalize_schedule {
        ntex::rt::spawn(jobs::finalization_scheduler(state.clone()));
    }

    info!("Daily race server starting on {}", bind);

    web::HttpServer::new(move || {
        web::App::new()
            .state(state.clone())
            .wrap(
                Cors::new()
                    .allowed_origin("*")
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec!["Content-Type"])
                    .max_age(3600)
                    .finish(),
            )
            .route("/api/health", web::get().to(health))
            // Daily race
            .route("/api/race/submit", web::post().to(handlers::race::submit_result))
            .route("/api/race/{day_key}", web::get().to(handlers::race::get_race))
            .route("/api/race/{day_key}/leaderboard", web::get().to(handlers::race::get_leaderboard))
            .route("/api/race/{day_key}/podium", web::get().to(handlers::race::get_podium))
            // Standings
            .route("/api/standings/season", web::get().to(handlers::standings::get_season_standings))
            .route("/api/standings/month/{month_key}", web::get().to(handlers::standings::get_month_standings))
            .route("/api/profile/{participant_id}", web::get().to(handlers::standings::get_player_profile))
            // Administration
            .route("/api/admin/race/{day_key}/freeze", web::post().to(handlers::admin::freeze))
            .route("/api/admin/race/{day_key}/finalize", web::post().to(handlers::admin::finalize))
            .route("/api/admin/race/{day_key}/recompute", web::post().to(handlers::admin::recompute))
    })
    .bind(bind)?
    .run()
    .await
}

async fn health() -> web::HttpResponse {
    web::HttpResponse::Ok().json(&serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;
    use crate::error::{AppError, Rejection};
    use crate::models::race::{RaceResult, SubmissionPayload};
    use crate::services::{anti_cheat, ledger, race, ranking, standings, track_generator};
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn race_day() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 30, 16, 30, 0).unwrap()
    }

    fn entry(id: &str, elapsed_time: f64) -> SubmissionPayload {
        SubmissionPayload {
            participant_id: json!(id),
            display_name: json!(id.to_uppercase()),
            day_key: json!("20240930"),
            elapsed_time: json!(elapsed_time),
            checkpoint_splits: json!([100.0, 200.0, 300.0]),
            car_config: json!({ "version": 1, "downforce": 70, "gear_bias": 30, "tyres": "soft" }),
            replay_fingerprint: json!("ab".repeat(32)),
        }
    }

    #[test]
    fn test_db_open_in_memory() {
        let db = Db::open_in_memory().expect("Failed to open in-memory DB");
        db.with_conn(|conn| {
            for table in ["races", "results", "standings", "profiles", "fanout_applied"] {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )?;
                assert_eq!(count, 1, "missing table {}", table);
            }
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_generated_track_is_stable() {
        let track = track_generator::generate_track("20240930");
        assert_eq!(track, track_generator::generate_track("20240930"));
        let db = Db::open_in_memory().unwrap();
        assert_eq!(race::get_race(&db, "20240930").unwrap().track, track);
        assert_eq!(ledger::get_or_create(&db, "20240930").unwrap().track, track);
    }

    #[test]
    fn test_twenty_seconds_on_single_lap_five_km_is_flagged() {
        let mut track = track_generator::generate_track("20240930");
        track.length = 5000;
        track.laps_required = 1;
        let config = anti_cheat::AntiCheatConfig::default();
        let flag = anti_cheat::check_physical_plausibility(20.0, &track, &config);
        assert!(flag.unwrap().contains("implausibly fast"));
    }

    #[test]
    fn test_ranking_scenario() {
        let db = Db::open_in_memory().unwrap();
        ledger::get_or_create(&db, "20240930").unwrap();
        for (id, elapsed, at) in [("A", 100.0, 1000), ("B", 95.0, 2000), ("C", 100.0, 500)] {
            let mut payload = entry(id, elapsed);
            payload.checkpoint_splits = json!([]);
            let sub = validation::validate_submission(&payload, race_day()).unwrap();
            ledger::submit(&db, &RaceResult::from_submission(sub, at, vec![])).unwrap();
        }

        let board = race::get_leaderboard(&db, "20240930").unwrap();
        let summary: Vec<_> = board
            .iter()
            .map(|r| (r.participant_id.as_str(), r.position, r.points))
            .collect();
        assert_eq!(summary, [("B", 1, 25), ("C", 2, 18), ("A", 3, 15)]);
        assert_eq!(ranking::rank(board.clone()), board);
    }

    #[test]
    fn test_second_submission_same_day() {
        let db = Db::open_in_memory().unwrap();
        let config = Config::default();
        let first = race::submit_result(&db, &config, entry("p1", 420.0), race_day()).unwrap();
        assert!(first.accepted);
        let second = race::submit_result(&db, &config, entry("p1", 410.0), race_day()).unwrap();
        assert!(!second.accepted);
        assert_eq!(second.error_kind, Some(Rejection::AlreadySubmitted.kind()));
        assert_eq!(ledger::results(&db, "20240930").unwrap().len(), 1);
    }

    #[test]
    fn test_freeze_twice_then_submit() {
        let db = Db::open_in_memory().unwrap();
        let config = Config::default();
        assert!(race::freeze(&db, "20240930").unwrap().changed);
        assert!(!race::freeze(&db, "20240930").unwrap().changed);

        let response = race::submit_result(&db, &config, entry("late", 420.0), race_day()).unwrap();
        assert!(!response.accepted);
        assert_eq!(response.error_kind, Some("race_frozen"));
        assert!(race::get_leaderboard(&db, "20240930").unwrap().is_empty());
    }

    #[test]
    fn test_finalize_twice_fans_out_once() {
        let db = Db::open_in_memory().unwrap();
        let config = Config::default();
        for (id, t) in [("a", 430.0), ("b", 410.0), ("c", 420.0), ("d", 440.0)] {
            assert!(race::submit_result(&db, &config, entry(id, t), race_day()).unwrap().accepted);
        }

        let podium = race::finalize(&db, "20240930").unwrap();
        assert_eq!(podium.first.as_ref().map(|r| r.participant_id.as_str()), Some("b"));
        assert_eq!(podium.third.as_ref().map(|r| r.participant_id.as_str()), Some("a"));

        let again = race::finalize(&db, "20240930").unwrap();
        assert_eq!(again, podium);

        let season = standings::get_season_standings(&db).unwrap();
        assert_eq!(season.len(), 4);
        assert!(season.iter().all(|s| s.races_played == 1));
        assert_eq!(season[0].participant_id, "b");
        assert_eq!(season[0].total_points, 25);

        let month = standings::get_month_standings(&db, "202409").unwrap();
        assert_eq!(month.standings, season);

        let profile = standings::get_player_profile(&db, "d").unwrap();
        assert_eq!(profile.races_participated, 1);
        assert_eq!(profile.best_position_ever, Some(4));
        assert_eq!(profile.total_points, 12);

        // Still frozen for submissions.
        let late = race::submit_result(&db, &config, entry("e", 400.0), race_day()).unwrap();
        assert_eq!(late.error_kind, Some("race_frozen"));
    }

    #[test]
    fn test_finalize_retry_after_partial_fan_out() {
        let db = Db::open_in_memory().unwrap();
        let config = Config::default();
        for (id, t) in [("a", 430.0), ("b", 410.0)] {
            race::submit_result(&db, &config, entry(id, t), race_day()).unwrap();
        }
        // Simulate a crash after the first participant's fan-out.
        ledger::freeze(&db, "20240930").unwrap();
        let ranked = ranking::rank(ledger::results(&db, "20240930").unwrap());
        standings::apply(&db, &ranked[0]).unwrap();

        race::finalize(&db, "20240930").unwrap();
        let season = standings::get_season_standings(&db).unwrap();
        let points: Vec<_> = season.iter().map(|s| (s.participant_id.as_str(), s.total_points)).collect();
        assert_eq!(points, [("b", 25), ("a", 18)]);
    }

    #[test]
    fn test_concurrent_finalize_fans_out_once() {
        let db = Arc::new(Db::open_in_memory().unwrap());
        let config = Config::default();
        for (id, t) in [("a", 430.0), ("b", 410.0), ("c", 420.0)] {
            assert!(race::submit_result(&db, &config, entry(id, t), race_day()).unwrap().accepted);
        }

        let barrier = Arc::new(Barrier::new(6));
        let podiums: Vec<_> = (0..6)
            .map(|_| {
                let db = Arc::clone(&db);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    race::finalize(&db, "20240930")
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();

        assert!(podiums.windows(2).all(|w| w[0] == w[1]));
        let season = standings::get_season_standings(&db).unwrap();
        assert_eq!(season.len(), 3);
        assert!(season.iter().all(|s| s.races_played == 1), "{:?}", season);
        let points: Vec<_> = season.iter().map(|s| (s.participant_id.as_str(), s.total_points)).collect();
        assert_eq!(points, [("b", 25), ("c", 18), ("a", 15)]);
        assert!(ledger::get(&db, "20240930").unwrap().unwrap().finalized);
    }

    #[test]
    fn test_store_unavailable_is_not_a_rejection() {
        let err: AppError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
    }
}
