use crate::error::AppError;
use chrono::{DateTime, Duration, NaiveDate, Utc};

const DAY_KEY_FORMAT: &str = "%Y%m%d";

/// `YYYYMMDD` for the UTC calendar day containing `now`.
pub fn day_key(now: DateTime<Utc>) -> String {
    now.format(DAY_KEY_FORMAT).to_string()
}

pub fn previous_day_key(now: DateTime<Utc>) -> String {
    day_key(now - Duration::days(1))
}

pub fn parse_day_key(key: &str) -> Option<NaiveDate> {
    if key.len() != 8 || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(key, DAY_KEY_FORMAT).ok()
}

pub fn require_day_key(key: &str) -> Result<(), AppError> {
    parse_day_key(key)
        .map(|_| ())
        .ok_or_else(|| AppError::BadRequest(format!("Invalid day key: {}", key)))
}

/// `YYYYMM` of the month containing a day key. The caller has already checked
/// the day key.
pub fn month_key_of(day_key: &str) -> String {
    day_key.chars().take(6).collect()
}

pub fn require_month_key(key: &str) -> Result<(), AppError> {
    let valid = key.len() == 6
        && key.bytes().all(|b| b.is_ascii_digit())
        && parse_day_key(&format!("{}01", key)).is_some();
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Invalid month key: {}", key)))
    }
}

/// Time left until the next UTC midnight.
pub fn until_next_day(now: DateTime<Utc>) -> std::time::Duration {
    let tomorrow = now.date_naive() + Duration::days(1);
    let midnight = tomorrow.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
    midnight
        .and_then(|m| (m - now).to_std().ok())
        .unwrap_or(std::time::Duration::from_secs(60))
}
