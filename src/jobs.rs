use crate::calendar;
use crate::db::Db;
use crate::error::AppError;
use crate::models::race::Podium;
use crate::services::race;
use crate::state::AppState;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Delay after UTC midnight so runs submitted in the final second still land.
const GRACE: Duration = Duration::from_secs(30);

/// Finalizes the UTC day before `now`.
pub fn run_daily_finalization(db: &Db, now: DateTime<Utc>) -> Result<Podium, AppError> {
    let day_key = calendar::previous_day_key(now);
    race::finalize(db, &day_key)
}

pub async fn finalization_scheduler(state: Arc<AppState>) {
    loop {
        let wait = calendar::until_next_day(Utc::now()) + GRACE;
        info!(seconds = wait.as_secs(), "next daily finalization scheduled");
        tokio::time::sleep(wait).await;

        match run_daily_finalization(&state.db, Utc::now()) {
            Ok(podium) => info!(
                winner = podium.first.as_ref().map(|r| r.participant_id.as_str()),
                "daily finalization completed"
            ),
            // Retried implicitly: finalize is idempotent and can also be
            // triggered through the admin endpoint.
            Err(e) => error!(error = %e, "daily finalization failed"),
        }
    }
}
