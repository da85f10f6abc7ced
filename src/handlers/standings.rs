use crate::error::AppError;
use crate::services::standings as service;
use crate::state::AppState;
use ntex::web::{self, HttpResponse};
use std::sync::Arc;

pub async fn get_season_standings(
    state: web::types::State<Arc<AppState>>,
) -> Result<HttpResponse, AppError> {
    let standings = service::get_season_standings(&state.db)?;
    Ok(HttpResponse::Ok().json(&standings))
}

pub async fn get_month_standings(
    state: web::types::State<Arc<AppState>>,
    path: web::types::Path<String>,
) -> Result<HttpResponse, AppError> {
    let standings = service::get_month_standings(&state.db, &path.into_inner())?;
    Ok(HttpResponse::Ok().json(&standings))
}

pub async fn get_player_profile(
    state: web::types::State<Arc<AppState>>,
    path: web::types::Path<String>,
) -> Result<HttpResponse, AppError> {
    let profile = service::get_player_profile(&state.db, &path.into_inner())?;
    Ok(HttpResponse::Ok().json(&profile))
}
