use crate::calendar;
use crate::error::Rejection;
use crate::models::race::{CarConfig, SubmissionPayload, ValidatedSubmission, CAR_CONFIG_VERSION};
use chrono::{DateTime, Utc};
use serde_json::Value;

const MAX_DISPLAY_NAME_LEN: usize = 32;
pub const MIN_ELAPSED_TIME: f64 = 5.0;
pub const MAX_ELAPSED_TIME: f64 = 600.0;
const CAR_SETTING_RANGE: std::ops::RangeInclusive<f64> = 0.0..=100.0;

fn reject(reason: impl Into<String>) -> Rejection {
    Rejection::Validation(reason.into())
}

/// A string field, absent when missing or null.
fn text_field<'a>(value: &'a Value, field: &str) -> Result<Option<&'a str>, Rejection> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.as_str())),
        _ => Err(reject(format!("{} must be a string", field))),
    }
}

pub fn validate_identity<'a>(
    participant_id: &'a Value,
    display_name: &'a Value,
) -> Result<(&'a str, &'a str), Rejection> {
    let participant_id = text_field(participant_id, "participant_id")?.unwrap_or("");
    let display_name = text_field(display_name, "display_name")?.unwrap_or("");
    if participant_id.trim().is_empty() || display_name.trim().is_empty() {
        Err(reject("participant_id and display_name are required"))
    } else {
        Ok((participant_id, display_name))
    }
}

pub fn normalize_display_name(name: &str) -> String {
    name.trim().chars().take(MAX_DISPLAY_NAME_LEN).collect()
}

pub fn validate_day_key<'a>(day_key: &'a Value, now: DateTime<Utc>) -> Result<&'a str, Rejection> {
    let day_key = text_field(day_key, "day_key")?.unwrap_or("");
    if calendar::parse_day_key(day_key).is_none() {
        return Err(reject(format!("Invalid day key: {}", day_key)));
    }
    if day_key != calendar::day_key(now) {
        return Err(reject(format!("Day key {} is not the current race day", day_key)));
    }
    Ok(day_key)
}

pub fn validate_elapsed_time(elapsed: &Value) -> Result<f64, Rejection> {
    let elapsed = match elapsed {
        Value::Null => return Err(reject("elapsed_time is required")),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
    .ok_or_else(|| reject("elapsed_time must be a number"))?;

    if elapsed.is_finite() && (MIN_ELAPSED_TIME..=MAX_ELAPSED_TIME).contains(&elapsed) {
        Ok(elapsed)
    } else {
        Err(reject(format!(
            "elapsed_time must be between {} and {} seconds",
            MIN_ELAPSED_TIME, MAX_ELAPSED_TIME
        )))
    }
}

/// Missing splits are an empty list.
pub fn parse_checkpoint_splits(raw: &Value) -> Result<Vec<f64>, Rejection> {
    let items = match raw {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        _ => return Err(reject("checkpoint_splits must be an array of numbers")),
    };
    items
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| reject("checkpoint_splits must be an array of numbers"))
        })
        .collect()
}

pub fn validate_checkpoint_splits(splits: &[f64], elapsed: f64) -> Result<(), Rejection> {
    if splits.iter().any(|s| !s.is_finite() || *s < 0.0) {
        return Err(reject("checkpoint splits must be finite, non-negative seconds"));
    }
    if splits.windows(2).any(|w| w[1] <= w[0]) {
        return Err(reject("checkpoint splits must be strictly ascending"));
    }
    match splits.last() {
        Some(last) if *last > elapsed => {
            Err(reject("final checkpoint split exceeds elapsed_time"))
        }
        _ => Ok(()),
    }
}

pub fn validate_fingerprint(fingerprint: Option<&str>) -> Result<String, Rejection> {
    fingerprint
        .map(str::to_string)
        .ok_or_else(|| reject("replay_fingerprint is required"))
}

pub fn validate_car_config(raw: &Value) -> Result<CarConfig, Rejection> {
    let config: CarConfig = serde_json::from_value(raw.clone())
        .map_err(|e| reject(format!("Invalid car_config: {}", e)))?;
    if config.version != CAR_CONFIG_VERSION {
        return Err(reject(format!(
            "Unsupported car_config version: {}",
            config.version
        )));
    }
    for (field, value) in [("downforce", config.downforce), ("gear_bias", config.gear_bias)] {
        if !value.is_finite() || !CAR_SETTING_RANGE.contains(&value) {
            return Err(reject(format!("{} must be a number between 0 and 100", field)));
        }
    }
    Ok(config)
}

/// Structural checks, in order, stopping at the first failure.
pub fn validate_submission(
    payload: &SubmissionPayload,
    now: DateTime<Utc>,
) -> Result<ValidatedSubmission, Rejection> {
    let (participant_id, display_name) =
        validate_identity(&payload.participant_id, &payload.display_name)?;
    let day_key = validate_day_key(&payload.day_key, now)?;
    let elapsed_time = validate_elapsed_time(&payload.elapsed_time)?;
    let checkpoint_splits = parse_checkpoint_splits(&payload.checkpoint_splits)?;
    validate_checkpoint_splits(&checkpoint_splits, elapsed_time)?;
    let replay_fingerprint = validate_fingerprint(text_field(
        &payload.replay_fingerprint,
        "replay_fingerprint",
    )?)?;
    let car_config = validate_car_config(&payload.car_config)?;

    Ok(ValidatedSubmission {
        participant_id: participant_id.trim().to_string(),
        display_name: normalize_display_name(display_name),
        day_key: day_key.to_string(),
        elapsed_time,
        checkpoint_splits,
        car_config,
        replay_fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 17, 18, 30, 0).unwrap()
    }

    fn payload() -> SubmissionPayload {
        SubmissionPayload {
            participant_id: json!("t2_abc"),
            display_name: json!("speedy"),
            day_key: json!("20240517"),
            elapsed_time: json!(240.5),
            checkpoint_splits: json!([60.0, 120.0, 180.0]),
            car_config: json!({ "downforce": 40, "gear_bias": 55, "tyres": "soft" }),
            replay_fingerprint: json!("f".repeat(40)),
        }
    }

    fn reason(result: Result<ValidatedSubmission, Rejection>) -> String {
        match result {
            Err(Rejection::Validation(reason)) => reason,
            other => panic!("expected validation rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_accepts_well_formed_payload() {
        let sub = validate_submission(&payload(), now()).unwrap();
        assert_eq!(sub.elapsed_time, 240.5);
        assert_eq!(sub.checkpoint_splits, vec![60.0, 120.0, 180.0]);
        assert_eq!(sub.car_config.version, CAR_CONFIG_VERSION);
    }

    #[test]
    fn test_accepts_body_parsed_from_json() {
        let p: SubmissionPayload = serde_json::from_value(json!({
            "participant_id": "t2_abc",
            "display_name": "speedy",
            "day_key": "20240517",
            "elapsed_time": 61,
            "car_config": { "downforce": 0, "gear_bias": 100, "tyres": "hard" },
            "replay_fingerprint": "abc",
        }))
        .unwrap();
        let sub = validate_submission(&p, now()).unwrap();
        assert_eq!(sub.elapsed_time, 61.0);
        assert!(sub.checkpoint_splits.is_empty());
    }

    #[test]
    fn test_rejects_missing_identity() {
        let mut p = payload();
        p.display_name = json!("   ");
        assert!(reason(validate_submission(&p, now())).contains("required"));
        p.display_name = Value::Null;
        assert!(reason(validate_submission(&p, now())).contains("required"));
    }

    #[test]
    fn test_rejects_stale_day_key() {
        let mut p = payload();
        p.day_key = json!("20240516");
        assert!(reason(validate_submission(&p, now())).contains("current race day"));
    }

    #[test]
    fn test_elapsed_time_bounds() {
        let mut p = payload();
        for bad in [4.99, 600.01, -1.0] {
            p.elapsed_time = json!(bad);
            assert!(validate_submission(&p, now()).is_err(), "{} accepted", bad);
        }
        p.elapsed_time = Value::Null;
        assert!(reason(validate_submission(&p, now())).contains("required"));
        for good in [5.0, 600.0] {
            p.elapsed_time = json!(good);
            p.checkpoint_splits = json!([]);
            assert!(validate_submission(&p, now()).is_ok());
        }
    }

    #[test]
    fn test_wrongly_typed_fields_are_rejected_with_reason() {
        let cases = [
            ("participant_id", json!(7), "participant_id must be a string"),
            ("day_key", json!(20240517), "day_key must be a string"),
            ("elapsed_time", json!("fast"), "elapsed_time must be a number"),
            ("checkpoint_splits", json!([60.0, null]), "checkpoint_splits must be an array"),
            ("checkpoint_splits", json!("60,120"), "checkpoint_splits must be an array"),
            ("replay_fingerprint", json!(42), "replay_fingerprint must be a string"),
        ];
        for (field, value, expected) in cases {
            let mut raw = serde_json::to_value(payload()).unwrap();
            raw[field] = value;
            let p: SubmissionPayload = serde_json::from_value(raw).unwrap();
            let got = reason(validate_submission(&p, now()));
            assert!(got.contains(expected), "{}: {}", field, got);
        }
    }

    #[test]
    fn test_type_errors_keep_check_order() {
        // A bad fingerprint type must not hide an earlier failure.
        let mut p = payload();
        p.day_key = json!("20240516");
        p.replay_fingerprint = json!(42);
        assert!(reason(validate_submission(&p, now())).contains("current race day"));
    }

    #[test]
    fn test_checkpoint_ordering() {
        let mut p = payload();
        p.checkpoint_splits = json!([60.0, 60.0]);
        assert!(reason(validate_submission(&p, now())).contains("strictly ascending"));

        p.checkpoint_splits = json!([60.0, 250.0]);
        assert!(reason(validate_submission(&p, now())).contains("exceeds"));

        p.checkpoint_splits = json!([-1.0, 10.0]);
        assert!(reason(validate_submission(&p, now())).contains("non-negative"));

        p.checkpoint_splits = json!([]);
        assert!(validate_submission(&p, now()).is_ok());
    }

    #[test]
    fn test_fingerprint_must_be_present() {
        let mut p = payload();
        p.replay_fingerprint = Value::Null;
        assert!(reason(validate_submission(&p, now())).contains("replay_fingerprint"));
        assert_eq!(validate_fingerprint(Some("ab")).unwrap(), "ab");
    }

    #[test]
    fn test_car_config_ranges_and_enums() {
        let mut p = payload();
        p.car_config = json!({ "downforce": 140, "gear_bias": 55, "tyres": "soft" });
        assert!(reason(validate_submission(&p, now())).contains("downforce"));

        p.car_config = json!({ "downforce": 40, "gear_bias": 55, "tyres": "slick" });
        assert!(validate_submission(&p, now()).is_err());

        p.car_config = json!({ "downforce": 40, "gear_bias": 55, "tyres": "hard", "nitro": 1 });
        assert!(validate_submission(&p, now()).is_err());

        p.car_config = json!({ "version": 2, "downforce": 40, "gear_bias": 55, "tyres": "hard" });
        assert!(reason(validate_submission(&p, now())).contains("version"));

        p.car_config = Value::Null;
        assert!(reason(validate_submission(&p, now())).contains("car_config"));
    }

    #[test]
    fn test_short_circuits_in_order() {
        let mut p = payload();
        p.participant_id = json!("");
        p.elapsed_time = json!(1.0);
        assert!(reason(validate_submission(&p, now())).contains("participant_id"));
    }

    #[test]
    fn test_display_name_is_capped() {
        let mut p = payload();
        p.display_name = json!(format!("  {}  ", "x".repeat(50)));
        let sub = validate_submission(&p, now()).unwrap();
        assert_eq!(sub.display_name.len(), MAX_DISPLAY_NAME_LEN);
    }
}
