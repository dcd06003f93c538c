use crate::db::templates::list_templates;
use crate::error::ServiceError;
use crate::AppState;
use actix_web::{web, HttpResponse};

/// Actix web handler for `GET /api/templates`.
pub async fn process(state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    let state = state.into_inner();
    let templates = web::block(move || {
        let conn = state.connect()?;
        list_templates(&conn)
    })
    .await??;
    Ok(HttpResponse::Ok().json(templates))
}
