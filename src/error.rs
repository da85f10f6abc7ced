use ntex::http::StatusCode;
use ntex::web::{HttpResponse, WebResponseError};
use thiserror::Error;

/// Expected, typed refusals of a submission. None of them mutate state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("{0}")]
    Validation(String),
    #[error("submission failed anti-cheat checks")]
    AntiCheat { flags: Vec<String> },
    #[error("already submitted for this race")]
    AlreadySubmitted,
    #[error("race is frozen, submissions are closed")]
    RaceFrozen,
}

impl Rejection {
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::Validation(_) => "validation_error",
            Rejection::AntiCheat { .. } => "anti_cheat_reject",
            Rejection::AlreadySubmitted => "already_submitted",
            Rejection::RaceFrozen => "race_frozen",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Rejected(#[from] Rejection),
}

impl WebResponseError for AppError {
    fn error_response(&self, _: &ntex::web::HttpRequest) -> HttpResponse {
        let (status, message) = match self {
            AppError::StoreUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Store unavailable".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Rejected(Rejection::AlreadySubmitted | Rejection::RaceFrozen) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            AppError::Rejected(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
        };
        HttpResponse::build(status).json(&serde_json::json!({ "error": message }))
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::StoreUnavailable(e.to_string())
    }
}

// Stored JSON columns are written by this service only; failing to decode one
// means the store is not serving what we wrote.
impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::StoreUnavailable(format!("corrupt stored record: {}", e))
    }
}
