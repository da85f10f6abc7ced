use crate::error::AppError;
use crate::services::race as service;
use crate::state::AppState;
use ntex::web::{self, HttpResponse};
use std::sync::Arc;

// Authorization is enforced in front of this service.

pub async fn freeze(
    state: web::types::State<Arc<AppState>>,
    path: web::types::Path<String>,
) -> Result<HttpResponse, AppError> {
    let outcome = service::freeze(&state.db, &path.into_inner())?;
    Ok(HttpResponse::Ok().json(&outcome))
}

pub async fn finalize(
    state: web::types::State<Arc<AppState>>,
    path: web::types::Path<String>,
) -> Result<HttpResponse, AppError> {
    let podium = service::finalize(&state.db, &path.into_inner())?;
    Ok(HttpResponse::Ok().json(&podium))
}

pub async fn recompute(
    state: web::types::State<Arc<AppState>>,
    path: web::types::Path<String>,
) -> Result<HttpResponse, AppError> {
    let results = service::recompute(&state.db, &path.into_inner())?;
    Ok(HttpResponse::Ok().json(&results))
}
