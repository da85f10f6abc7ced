use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

use crate::services::anti_cheat::AntiCheatConfig;

pub struct Config {
    pub database_path: String,
    pub host: String,
    pub port: u16,
    pub leaderboard_top_n: usize,
    pub finalize_schedule: bool,
    pub anti_cheat: AntiCheatConfig,
}

impl Config {
    pub fn load() -> Self {
        let defaults = AntiCheatConfig::default();
        Self {
            database_path: try_load("DATABASE_PATH", "daily-race.db".to_string()),
            host: try_load("HOST", "0.0.0.0".to_string()),
            port: try_load("PORT", 3001),
            leaderboard_top_n: try_load("LEADERBOARD_TOP_N", 10),
            finalize_schedule: try_load("FINALIZE_SCHEDULE", true),
            anti_cheat: AntiCheatConfig {
                max_speed_mps: try_load("ANTICHEAT_MAX_SPEED_MPS", defaults.max_speed_mps),
                min_time_fraction: try_load(
                    "ANTICHEAT_MIN_TIME_FRACTION",
                    defaults.min_time_fraction,
                ),
                min_checkpoint_gap: try_load(
                    "ANTICHEAT_MIN_CHECKPOINT_GAP",
                    defaults.min_checkpoint_gap,
                ),
                min_fingerprint_len: try_load(
                    "ANTICHEAT_MIN_FINGERPRINT_LEN",
                    defaults.min_fingerprint_len,
                ),
                reject_threshold: defaults.reject_threshold,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "daily-race.db".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3001,
            leaderboard_top_n: 10,
            finalize_schedule: true,
            anti_cheat: AntiCheatConfig::default(),
        }
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
