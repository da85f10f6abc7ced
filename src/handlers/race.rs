use crate::error::AppError;
use crate::services::race as service;
use crate::state::AppState;
use chrono::Utc;
use ntex::util::Bytes;
use ntex::web::{self, HttpResponse};
use std::sync::Arc;

pub async fn submit_result(
    state: web::types::State<Arc<AppState>>,
    body: Bytes,
) -> Result<HttpResponse, AppError> {
    // Raw bytes: field types are checked by the validator, not the extractor.
    let result = service::submit_body(&state.db, &state.config, &body, Utc::now())?;
    Ok(HttpResponse::Ok().json(&result))
}

pub async fn get_race(
    state: web::types::State<Arc<AppState>>,
    path: web::types::Path<String>,
) -> Result<HttpResponse, AppError> {
    let info = service::get_race(&state.db, &path.into_inner())?;
    Ok(HttpResponse::Ok().json(&info))
}

pub async fn get_leaderboard(
    state: web::types::State<Arc<AppState>>,
    path: web::types::Path<String>,
) -> Result<HttpResponse, AppError> {
    let results = service::get_leaderboard(&state.db, &path.into_inner())?;
    Ok(HttpResponse::Ok().json(&results))
}

pub async fn get_podium(
    state: web::types::State<Arc<AppState>>,
    path: web::types::Path<String>,
) -> Result<HttpResponse, AppError> {
    let podium = service::get_podium(&state.db, &path.into_inner())?;
    Ok(HttpResponse::Ok().json(&podium))
}
