//! # Certificate Issuance Service
//!
//! Issues certificates from a catalog template and returns the rendered
//! documents. Both routes take `multipart/form-data`.
//!
//! The provided routes are:
//! - `POST /api/certificates/{template_id}`: one certificate. Text fields
//!   `recipient`, `course`, `title`, `date` and `issuer` are required; `logo`
//!   and `signature` may be uploaded as files or referenced through
//!   `existing_logo` / `existing_signature` from an earlier preview. Responds
//!   with the PDF as an attachment.
//!
//! - `POST /api/certificates/{template_id}/bulk`: one certificate per row of
//!   the uploaded `csv` roster (columns `name`, `course`, `date`) with shared
//!   `title`, `issuer`, `logo` and `signature`. Responds with
//!   `certificates.zip`.
//!
//! The work itself lives in [`workflow`] and runs on the blocking pool.

mod bulk;
pub mod form;
mod issue;
pub mod workflow;

use actix_web::web::{post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/certificates";

/// Configures and returns the Actix scope for certificate issuance.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/{template_id}", post().to(issue::process))
        .route("/{template_id}/bulk", post().to(bulk::process))
}
