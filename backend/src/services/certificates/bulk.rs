use super::form::SubmittedForm;
use super::workflow;
use crate::error::ServiceError;
use crate::AppState;
use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};

const ARCHIVE_NAME: &str = "certificates.zip";

/// Actix web handler for `POST /api/certificates/{template_id}/bulk`.
///
/// Rows without a name are skipped. The archive holds one
/// `<recipient>_<serial>.pdf` per issued certificate and the count is echoed
/// in `X-Certificates-Issued`.
pub async fn process(
    state: web::Data<AppState>,
    template_id: web::Path<i64>,
    req: HttpRequest,
    payload: Multipart,
) -> Result<HttpResponse, ServiceError> {
    let template_id = template_id.into_inner();
    let form = SubmittedForm::read(payload).await?;
    let ctx = state.issue_context(&req);

    let outcome = web::block(move || workflow::issue_batch(&ctx, template_id, form)).await??;
    for warning in &outcome.warnings {
        log::warn!("Bulk issuance on template {}: {}", template_id, warning);
    }

    Ok(HttpResponse::Ok()
        .content_type("application/zip")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(ARCHIVE_NAME.to_string())],
        })
        .insert_header(("X-Certificates-Issued", outcome.issued.len().to_string()))
        .body(outcome.archive))
}
