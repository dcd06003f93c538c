//! Certificate rendering: a template layout plus certificate values become a
//! one-page PDF. [`plan::plan`] decides what goes where, [`painter::paint`]
//! turns that into PDF bytes.

pub mod color;
pub mod fonts;
pub mod painter;
pub mod plan;
pub mod qr;
pub mod raster;

use crate::storage::Storage;
use painter::RasterCache;
use common::model::template::Template;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid layout: {0}")]
    Layout(String),

    #[error("image could not be decoded: {0}")]
    Image(#[from] image::ImageError),

    /// A logo or signature sent with the request is not a readable image.
    #[error("uploaded {role} could not be decoded: {source}")]
    UnreadableUpload {
        role: &'static str,
        source: image::ImageError,
    },

    #[error("qr encoding failed: {0}")]
    Qr(#[from] qrcode::types::QrError),

    #[error("pdf generation failed: {0}")]
    Pdf(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything printed on one certificate.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateValues {
    pub cert_id: String,
    pub serial: String,
    pub recipient: String,
    pub title: String,
    pub course: String,
    pub date: String,
    pub issuer: String,
    pub logo: Option<PathBuf>,
    pub signature: Option<PathBuf>,
    /// Encoded into the QR code.
    pub verify_url: String,
}

#[derive(Debug)]
pub struct RenderOutcome {
    pub path: PathBuf,
    pub warnings: Vec<String>,
}

/// Public verification link for a certificate. `base_url` must end with `/`.
pub fn verification_url(base_url: &str, cert_id: &str) -> String {
    format!("{}verify/{}", base_url, cert_id)
}

/// Renders `values` onto `template` and writes the PDF to `output`. Image
/// files are decoded through `cache`, which callers may share across pages.
pub fn render_certificate(
    template: &Template,
    values: &CertificateValues,
    storage: &Storage,
    output: &Path,
    cache: &mut RasterCache,
) -> Result<RenderOutcome, RenderError> {
    let plan = plan::plan(template, values, storage);
    let painted = painter::paint(&plan, &format!("Certificate {}", values.serial), cache)?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, &painted.bytes)?;

    let mut warnings = plan.warnings;
    warnings.extend(painted.warnings);
    for warning in &warnings {
        log::warn!("[{}] {}", values.serial, warning);
    }
    log::debug!(
        "Rendered {} ({} bytes) to {}",
        values.serial,
        painted.bytes.len(),
        output.display()
    );

    Ok(RenderOutcome {
        path: output.to_path_buf(),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::layout::TemplateConfig;
    use common::model::template::Orientation;

    #[test]
    fn verification_url_joins_base_and_id() {
        assert_eq!(
            verification_url("https://certs.example.org/", "abc"),
            "https://certs.example.org/verify/abc"
        );
    }

    #[test]
    fn writes_a_pdf_to_the_requested_path() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        storage.ensure_layout().unwrap();
        let template = Template {
            id: 1,
            name: "Education Template 1".into(),
            category: "EDUCATION".into(),
            orientation: Orientation::Landscape,
            background: Some("missing.png".into()),
            config: TemplateConfig::default(),
        };
        let values = CertificateValues {
            cert_id: "abc".into(),
            serial: "CERT-2024-000001".into(),
            recipient: "Jane Doe".into(),
            title: "Certificate of Completion".into(),
            course: String::new(),
            date: "2024-01-01".into(),
            issuer: "Acme".into(),
            logo: None,
            signature: None,
            verify_url: verification_url("http://localhost/", "abc"),
        };
        let out = storage.certificate_path("abc");

        let mut cache = RasterCache::new();
        let outcome = render_certificate(&template, &values, &storage, &out, &mut cache).unwrap();

        assert_eq!(outcome.path, out);
        let bytes = fs::read(&out).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        // the background file does not exist
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("background"));
    }
}
