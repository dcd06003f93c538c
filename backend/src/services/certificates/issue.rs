use super::form::SubmittedForm;
use super::workflow;
use crate::error::ServiceError;
use crate::AppState;
use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};

/// Actix web handler for `POST /api/certificates/{template_id}`.
///
/// # Returns
/// - `200 OK` with the PDF as an attachment and the `X-Certificate-Id` /
///   `X-Certificate-Serial` headers.
/// - `400 Bad Request` for a missing field or an undecodable image.
/// - `404 Not Found` for an unknown template.
pub async fn process(
    state: web::Data<AppState>,
    template_id: web::Path<i64>,
    req: HttpRequest,
    payload: Multipart,
) -> Result<HttpResponse, ServiceError> {
    let template_id = template_id.into_inner();
    let form = SubmittedForm::read(payload).await?;
    let ctx = state.issue_context(&req);

    let (issued, bytes) = web::block(move || workflow::issue(&ctx, template_id, form)).await??;
    let certificate = issued.certificate;

    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(format!(
                "{}.pdf",
                certificate.serial
            ))],
        })
        .insert_header(("X-Certificate-Id", certificate.cert_id))
        .insert_header(("X-Certificate-Serial", certificate.serial))
        .body(bytes))
}
