//! # Admin Service
//!
//! Hidden operator endpoints under `/__admin__`. Every request must carry
//! `?key=<ADMIN_SECRET_KEY>`; a missing or wrong key gets the same `404` as
//! an unknown path so the routes do not reveal themselves.
//!
//! The provided routes are:
//! - `GET /__admin__/templates`: the template catalog.
//! - `GET /__admin__/certificates`: every issuance record, oldest first.
//! - `GET /__admin__/retention`: retention settings and the last sweep report.

use crate::db::certificates::list_certificates;
use crate::db::templates::list_templates;
use crate::error::ServiceError;
use crate::AppState;
use actix_web::web::{get, scope};
use actix_web::{web, HttpResponse, Scope};
use common::jobs::RetentionStatus;
use common::requests::AdminQuery;

const API_PATH: &str = "/__admin__";

fn authorize(state: &AppState, query: &AdminQuery) -> Result<(), ServiceError> {
    match query.key.as_deref() {
        Some(key) if key == state.config.admin_key => Ok(()),
        _ => Err(ServiceError::NotFound("page".into())),
    }
}

async fn templates(
    state: web::Data<AppState>,
    query: web::Query<AdminQuery>,
) -> Result<HttpResponse, ServiceError> {
    authorize(&state, &query)?;
    let state = state.into_inner();
    let templates = web::block(move || {
        let conn = state.connect()?;
        list_templates(&conn)
    })
    .await??;
    Ok(HttpResponse::Ok().json(templates))
}

async fn certificates(
    state: web::Data<AppState>,
    query: web::Query<AdminQuery>,
) -> Result<HttpResponse, ServiceError> {
    authorize(&state, &query)?;
    let state = state.into_inner();
    let certificates = web::block(move || -> Result<_, ServiceError> {
        let conn = state.connect()?;
        Ok(list_certificates(&conn)?)
    })
    .await??;
    Ok(HttpResponse::Ok().json(certificates))
}

async fn retention(
    state: web::Data<AppState>,
    query: web::Query<AdminQuery>,
) -> Result<HttpResponse, ServiceError> {
    authorize(&state, &query)?;
    Ok(HttpResponse::Ok().json(RetentionStatus {
        retention_secs: state.config.retention.as_secs(),
        sweep_interval_secs: state.config.sweep_interval.as_secs(),
        last_sweep: state.sweeps.latest().await,
    }))
}

/// Configures and returns the Actix scope for the admin routes.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/templates", get().to(templates))
        .route("/certificates", get().to(certificates))
        .route("/retention", get().to(retention))
}
