//! # Verification Service
//!
//! Public lookup of issued certificates by `cert_id` or serial. The QR code on
//! every certificate points at the HTML page; the JSON variant returns the
//! same report for programmatic checks.
//!
//! A key is `Valid` exactly when an issuance row matches it. The stored
//! fingerprint is reported as-is and not recomputed, and a certificate stays
//! valid after the retention sweeper deleted its PDF (`file_available` turns
//! false).

mod page;

use crate::db::certificates::find_for_verification;
use crate::error::ServiceError;
use crate::AppState;
use actix_web::web::{get, scope};
use actix_web::{web, HttpResponse, Scope};
use common::model::certificate::{VerificationReport, VerificationStatus};
use std::path::Path;

/// Looks `key` up and assembles the report.
pub fn lookup(state: &AppState, key: &str) -> Result<VerificationReport, ServiceError> {
    let conn = state.connect()?;
    let report = match find_for_verification(&conn, key)? {
        Some((certificate, template_name)) => VerificationReport {
            key: key.to_string(),
            status: VerificationStatus::Valid,
            file_available: Path::new(&certificate.file_path).is_file(),
            certificate: Some(certificate),
            template_name: Some(template_name),
        },
        None => VerificationReport {
            key: key.to_string(),
            status: VerificationStatus::Invalid,
            certificate: None,
            template_name: None,
            file_available: false,
        },
    };
    log::info!("Verification of '{}': {}", key, report.status.as_str());
    Ok(report)
}

async fn report_for(
    state: web::Data<AppState>,
    key: web::Path<String>,
) -> Result<VerificationReport, ServiceError> {
    let state = state.into_inner();
    let key = key.into_inner();
    Ok(web::block(move || lookup(&state, &key)).await??)
}

/// `GET /api/verify/{key}`
async fn api(
    state: web::Data<AppState>,
    key: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(report_for(state, key).await?))
}

/// `GET /verify/{key}`
async fn html(
    state: web::Data<AppState>,
    key: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let report = report_for(state, key).await?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(page::render(&report)))
}

pub fn configure_api_routes() -> Scope {
    scope("/api/verify").route("/{key}", get().to(api))
}

/// The status page the QR codes link to.
pub fn configure_page_routes() -> Scope {
    scope("/verify").route("/{key}", get().to(html))
}
