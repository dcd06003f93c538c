//! # Template Retrieval Service
//!
//! Backs `GET /api/templates/{template_id}`. The stored layout JSON is decoded
//! into a `TemplateConfig` before it is returned, so a template whose layout
//! no longer parses is reported as a server error instead of being passed on.

use crate::db::templates::require_template;
use crate::error::ServiceError;
use crate::AppState;
use actix_web::{web, HttpResponse};

/// Actix web handler for the `GET /api/templates/{template_id}` endpoint.
///
/// # Returns
/// - `200 OK` with the `Template` as JSON.
/// - `404 Not Found` when no template has this id.
pub async fn process(
    state: web::Data<AppState>,
    template_id: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let state = state.into_inner();
    let template_id = template_id.into_inner();
    let template = web::block(move || {
        let conn = state.connect()?;
        require_template(&conn, template_id)
    })
    .await??;
    Ok(HttpResponse::Ok().json(template))
}
