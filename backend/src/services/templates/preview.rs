use crate::error::ServiceError;
use crate::services::certificates::form::SubmittedForm;
use crate::services::certificates::workflow;
use crate::storage::PREVIEW_FILE_NAME;
use crate::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use common::requests::PreviewResponse;

/// Actix web handler for `POST /api/templates/{template_id}/preview`.
pub async fn process(
    state: web::Data<AppState>,
    template_id: web::Path<i64>,
    req: HttpRequest,
    payload: Multipart,
) -> Result<HttpResponse, ServiceError> {
    let template_id = template_id.into_inner();
    let form = SubmittedForm::read(payload).await?;
    let ctx = state.issue_context(&req);
    let storage = ctx.storage.clone();

    let preview = web::block(move || workflow::preview(&ctx, template_id, form)).await??;

    let reference = |path: Option<std::path::PathBuf>| {
        path.and_then(|p| storage.upload_reference(&p))
    };
    Ok(HttpResponse::Ok().json(PreviewResponse {
        preview_url: format!("/static/output/{}", PREVIEW_FILE_NAME),
        serial: preview.serial,
        existing_logo: reference(preview.logo),
        existing_signature: reference(preview.signature),
        warnings: preview.warnings,
    }))
}
