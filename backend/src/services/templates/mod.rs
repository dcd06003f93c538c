//! # Template Service Module
//!
//! Read access to the template catalog plus the live preview, all under
//! `/api/templates`.
//!
//! ## Sub-modules:
//! - `list`: Every catalog template with its layout.
//! - `get`: A single template by id.
//! - `preview`: Renders the shared preview file from a certificate form.

mod get;
mod list;
mod preview;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

/// The base path for all template-related API endpoints.
const API_PATH: &str = "/api/templates";

/// Configures and returns the Actix `Scope` for all template-related routes.
///
/// # Registered Routes:
///
/// *   **`GET /`**:
///     - **Handler**: `list::process`
///     - **Description**: Returns the whole catalog as a JSON array, ordered by id.
///
/// *   **`GET /{template_id}`**:
///     - **Handler**: `get::process`
///     - **Description**: Returns one template with its decoded layout, or `404`
///       when the id is unknown.
///
/// *   **`POST /{template_id}/preview`**:
///     - **Handler**: `preview::process`
///     - **Description**: Accepts the same multipart form as single issuance and
///       renders it into `output/preview.pdf` with the serial the next issuance
///       would receive. Nothing is recorded. Uploaded logo and signature are
///       stored and their references returned so they can be re-submitted.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", get().to(list::process))
        .route("/{template_id}", get().to(get::process))
        .route("/{template_id}/preview", post().to(preview::process))
}
