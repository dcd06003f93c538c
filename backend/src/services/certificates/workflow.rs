//! Issuance workflow shared by the single, bulk and preview endpoints.
//!
//! Everything here is synchronous and is meant to run on the blocking pool
//! (`web::block`). Issuing a certificate happens inside one IMMEDIATE
//! transaction:
//!
//! 1. allocate the next serial from `serial_sequence`,
//! 2. compute the fingerprint,
//! 3. render `output/<cert_id>.pdf`,
//! 4. insert the issuance row,
//! 5. commit.
//!
//! Concurrent issuers queue on SQLite's write lock, so two requests can never
//! see the same counter value. When rendering or the insert fails the
//! transaction is dropped (rolled back, the serial is not consumed) and any
//! file written for it is removed again.
//!
//! A bulk roster runs the same steps once per row, so the lock is never held
//! for more than one certificate. A failing row withdraws the rows already
//! committed for the batch.

use super::form::SubmittedForm;
use crate::db;
use crate::db::certificates::{self, NewCertificate};
use crate::db::templates::require_template;
use crate::error::ServiceError;
use crate::fingerprint::fingerprint;
use crate::render::painter::RasterCache;
use crate::render::{render_certificate, verification_url, CertificateValues};
use crate::storage::{Storage, UploadKind};
use chrono::Datelike;
use common::model::certificate::Certificate;
use common::model::template::Template;
use rusqlite::{Connection, TransactionBehavior};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// What a workflow needs from the application, detached from the request so
/// it can be moved onto the blocking pool.
#[derive(Debug, Clone)]
pub struct IssueContext {
    pub database: PathBuf,
    pub storage: Storage,
    /// Ends with `/`; verification links are `<base_url>verify/<cert_id>`.
    pub base_url: String,
}

/// Printed values of one certificate, before a serial is assigned.
#[derive(Debug, Clone, Default)]
pub struct CertificateDetails {
    pub recipient: String,
    pub title: String,
    pub course: String,
    pub date: String,
    pub issuer: String,
    pub logo: Option<PathBuf>,
    pub signature: Option<PathBuf>,
}

impl CertificateDetails {
    fn values(&self, cert_id: &str, serial: &str, verify_url: String) -> CertificateValues {
        CertificateValues {
            cert_id: cert_id.to_string(),
            serial: serial.to_string(),
            recipient: self.recipient.clone(),
            title: self.title.clone(),
            course: self.course.clone(),
            date: self.date.clone(),
            issuer: self.issuer.clone(),
            logo: self.logo.clone(),
            signature: self.signature.clone(),
            verify_url,
        }
    }
}

#[derive(Debug)]
pub struct Issued {
    pub certificate: Certificate,
    /// Counter value behind the serial.
    pub number: i64,
    pub path: PathBuf,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub struct Preview {
    pub serial: String,
    pub logo: Option<PathBuf>,
    pub signature: Option<PathBuf>,
    pub warnings: Vec<String>,
}

/// Logo and signature chosen for a submission.
#[derive(Debug, Default)]
struct Assets {
    logo: Option<PathBuf>,
    signature: Option<PathBuf>,
    warnings: Vec<String>,
}

pub fn new_cert_id() -> String {
    Uuid::new_v4().to_string()
}

fn current_year() -> i32 {
    chrono::Local::now().year()
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}

/// Stores uploaded files under `<prefix>_<name>`, otherwise falls back to
/// `existing_*` references from an earlier preview.
fn store_assets(storage: &Storage, form: &mut SubmittedForm, prefix: &str) -> Result<Assets, ServiceError> {
    let mut assets = Assets::default();
    for (kind, field, existing) in [
        (UploadKind::Logo, "logo", &["existing_logo"][..]),
        (UploadKind::Signature, "signature", &["existing_signature", "existing_sig"][..]),
    ] {
        let path = match form.take_file(field) {
            Some(upload) => Some(storage.save_upload(kind, prefix, &upload.file_name, &upload.bytes)?),
            None => match existing.iter().find_map(|name| form.text(name)) {
                Some(reference) => {
                    let resolved = storage.resolve_upload(kind, reference);
                    if resolved.is_none() {
                        assets
                            .warnings
                            .push(format!("stored {} '{}' not found, ignored", field, reference));
                    }
                    resolved
                }
                None => None,
            },
        };
        match kind {
            UploadKind::Logo => assets.logo = path,
            UploadKind::Signature => assets.signature = path,
        }
    }
    Ok(assets)
}

fn single_details(form: &SubmittedForm) -> Result<CertificateDetails, ServiceError> {
    Ok(CertificateDetails {
        recipient: form.required("recipient")?,
        title: form.required("title")?,
        course: form.required("course")?,
        date: form.required("date")?,
        issuer: form.required("issuer")?,
        logo: None,
        signature: None,
    })
}

/// Allocates a serial, renders and records one certificate on `conn`, which
/// must already be inside a write transaction.
fn issue_in(
    conn: &Connection,
    ctx: &IssueContext,
    template: &Template,
    cert_id: &str,
    details: &CertificateDetails,
    cache: &mut RasterCache,
) -> Result<Issued, ServiceError> {
    let number = certificates::allocate_serial_number(conn)?;
    let serial = certificates::format_serial(current_year(), number);
    let hash = fingerprint(&serial, &details.recipient, &details.date);
    let path = ctx.storage.certificate_path(cert_id);

    let values = details.values(cert_id, &serial, verification_url(&ctx.base_url, cert_id));
    let outcome = match render_certificate(template, &values, &ctx.storage, &path, cache) {
        Ok(outcome) => outcome,
        Err(e) => {
            remove_quietly(&path);
            return Err(e.into());
        }
    };

    let file_path = path.to_string_lossy().replace('\\', "/");
    let record = NewCertificate {
        cert_id,
        serial: &serial,
        template_id: template.id,
        recipient: &details.recipient,
        course: &details.course,
        issuer: &details.issuer,
        file_path: &file_path,
        hash: &hash,
    };
    match certificates::insert_certificate(conn, &record) {
        Ok(certificate) => Ok(Issued {
            certificate,
            number,
            path,
            warnings: outcome.warnings,
        }),
        Err(e) => {
            remove_quietly(&path);
            Err(e.into())
        }
    }
}

/// One certificate in its own IMMEDIATE transaction. The write lock is held
/// for this certificate only.
fn issue_one(
    conn: &mut Connection,
    ctx: &IssueContext,
    template: &Template,
    cert_id: &str,
    details: &CertificateDetails,
    cache: &mut RasterCache,
) -> Result<Issued, ServiceError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let issued = issue_in(&tx, ctx, template, cert_id, details, cache)?;
    if let Err(e) = tx.commit() {
        remove_quietly(&issued.path);
        return Err(e.into());
    }
    Ok(issued)
}

/// Issues one certificate and returns it with the rendered PDF bytes.
pub fn issue(
    ctx: &IssueContext,
    template_id: i64,
    mut form: SubmittedForm,
) -> Result<(Issued, Vec<u8>), ServiceError> {
    let mut conn = db::open(&ctx.database)?;
    let template = require_template(&conn, template_id)?;
    let cert_id = new_cert_id();
    let mut details = single_details(&form)?;
    let assets = store_assets(&ctx.storage, &mut form, &cert_id)?;
    details.logo = assets.logo.clone();
    details.signature = assets.signature.clone();

    let mut cache = RasterCache::new();
    let mut issued = issue_one(&mut conn, ctx, &template, &cert_id, &details, &mut cache)?;
    let bytes = fs::read(&issued.path)?;

    let mut warnings = assets.warnings;
    warnings.append(&mut issued.warnings);
    issued.warnings = warnings;
    log::info!(
        "Issued {} ({}) on template {}",
        issued.certificate.serial,
        issued.certificate.cert_id,
        template_id
    );
    Ok((issued, bytes))
}

/// Renders the shared preview file with the serial the next issuance would
/// get. Nothing is persisted.
pub fn preview(
    ctx: &IssueContext,
    template_id: i64,
    mut form: SubmittedForm,
) -> Result<Preview, ServiceError> {
    let conn = db::open(&ctx.database)?;
    let template = require_template(&conn, template_id)?;
    let cert_id = new_cert_id();
    let mut details = single_details(&form)?;
    let assets = store_assets(&ctx.storage, &mut form, &cert_id)?;
    details.logo = assets.logo.clone();
    details.signature = assets.signature.clone();

    let number = certificates::peek_next_serial_number(&conn)?;
    let serial = certificates::format_serial(current_year(), number);
    let values = details.values(&cert_id, &serial, verification_url(&ctx.base_url, &cert_id));
    let output = ctx.storage.preview_path();
    let outcome = render_certificate(&template, &values, &ctx.storage, &output, &mut RasterCache::new())?;

    let mut warnings = assets.warnings;
    warnings.extend(outcome.warnings);
    Ok(Preview {
        serial,
        logo: assets.logo,
        signature: assets.signature,
        warnings,
    })
}

/// One usable line of a bulk roster.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterRow {
    /// 1-based line in the uploaded file, header included.
    pub line: usize,
    pub name: String,
    pub course: String,
    pub date: String,
}

#[derive(Debug, Default)]
pub struct Roster {
    pub rows: Vec<RosterRow>,
    pub warnings: Vec<String>,
}

/// Picks the candidate that occurs most often in the header line, `,` on ties.
fn detect_delimiter(header: &str) -> u8 {
    [b'|', b'\t', b';', b',']
        .into_iter()
        .max_by_key(|d| header.bytes().filter(|b| b == d).count())
        .unwrap_or(b',')
}

/// Parses an uploaded roster. The header must contain a `name` column;
/// `course` and `date` are optional. Rows without a name are skipped.
pub fn parse_roster(bytes: &[u8]) -> Result<Roster, ServiceError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| ServiceError::BadRequest("roster is not valid UTF-8".into()))?;
    let text = text.trim_start_matches('\u{feff}');
    let header_line = text.lines().next().unwrap_or_default();
    if header_line.trim().is_empty() {
        return Err(ServiceError::BadRequest("roster has no header row".into()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(header_line))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ServiceError::BadRequest(format!("unreadable roster header: {}", e)))?
        .clone();
    let column = |wanted: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(wanted));
    let name_col = column("name")
        .ok_or_else(|| ServiceError::BadRequest("roster has no 'name' column".into()))?;
    let course_col = column("course");
    let date_col = column("date");

    let mut roster = Roster::default();
    for (index, record) in reader.records().enumerate() {
        let line = index + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                roster.warnings.push(format!("row {} skipped: {}", line, e));
                continue;
            }
        };
        let cell = |col: Option<usize>| {
            col.and_then(|c| record.get(c))
                .unwrap_or_default()
                .to_string()
        };
        let name = cell(Some(name_col));
        if name.is_empty() {
            log::debug!("Roster row {} has no name, skipped", line);
            continue;
        }
        roster.rows.push(RosterRow {
            line,
            name,
            course: cell(course_col),
            date: cell(date_col),
        });
    }
    Ok(roster)
}

/// Zip entry for one certificate: `<recipient>_<serial>.pdf`, with path
/// separators in the recipient replaced.
pub fn archive_entry_name(recipient: &str, serial: &str) -> String {
    format!("{}_{}.pdf", recipient.replace(['/', '\\'], "_"), serial)
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub archive: Vec<u8>,
    pub issued: Vec<Certificate>,
    pub warnings: Vec<String>,
}

/// Issues one certificate per row, each committed on its own, and hands
/// every result to `sink`. When a row or the sink fails, the certificates
/// issued so far are withdrawn and their files removed, so a batch lands
/// completely or not at all.
fn issue_rows<F>(
    conn: &mut Connection,
    ctx: &IssueContext,
    template: &Template,
    rows: impl IntoIterator<Item = (usize, CertificateDetails)>,
    mut sink: F,
) -> Result<Vec<Issued>, ServiceError>
where
    F: FnMut(usize, &Issued) -> Result<(), ServiceError>,
{
    // Shared logo and signature are decoded once for the whole batch.
    let mut cache = RasterCache::new();
    let mut issued: Vec<Issued> = Vec::new();

    let mut failure = None;
    for (line, details) in rows {
        let step = issue_one(conn, ctx, template, &new_cert_id(), &details, &mut cache).and_then(|cert| {
            let sunk = sink(line, &cert);
            issued.push(cert);
            sunk
        });
        if let Err(e) = step {
            failure = Some(e);
            break;
        }
    }

    if let Some(e) = failure {
        if let (Some(first), Some(last)) = (issued.first(), issued.last()) {
            let ids: Vec<&str> = issued.iter().map(|c| c.certificate.cert_id.as_str()).collect();
            if let Err(undo) = certificates::withdraw_certificates(conn, &ids, first.number, last.number) {
                log::error!("Could not withdraw {} certificates of a failed batch: {}", ids.len(), undo);
            }
        }
        issued.iter().for_each(|cert| remove_quietly(&cert.path));
        return Err(e);
    }
    Ok(issued)
}

/// Issues one certificate per roster row and packs them into a zip.
pub fn issue_batch(
    ctx: &IssueContext,
    template_id: i64,
    mut form: SubmittedForm,
) -> Result<BatchOutcome, ServiceError> {
    let mut conn = db::open(&ctx.database)?;
    let template = require_template(&conn, template_id)?;

    let csv_file = form
        .take_file("csv")
        .ok_or_else(|| ServiceError::BadRequest("missing file 'csv'".into()))?;
    let title = form.required("title")?;
    let issuer = form.required("issuer")?;
    let roster = parse_roster(&csv_file.bytes)?;

    let batch_id = Uuid::new_v4().simple().to_string();
    let assets = store_assets(&ctx.storage, &mut form, &format!("bulk_{}", batch_id))?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut warnings = roster.warnings;
    warnings.extend(assets.warnings.iter().cloned());

    let rows = roster.rows.iter().map(|row| {
        let details = CertificateDetails {
            recipient: row.name.clone(),
            title: title.clone(),
            course: row.course.clone(),
            date: row.date.clone(),
            issuer: issuer.clone(),
            logo: assets.logo.clone(),
            signature: assets.signature.clone(),
        };
        (row.line, details)
    });
    let issued = issue_rows(&mut conn, ctx, &template, rows, |line, cert| {
        warnings.extend(cert.warnings.iter().map(|w| format!("row {}: {}", line, w)));
        zip.start_file(
            archive_entry_name(&cert.certificate.recipient, &cert.certificate.serial),
            options,
        )?;
        zip.write_all(&fs::read(&cert.path)?)?;
        Ok(())
    })?;

    let archive = zip.finish()?.into_inner();
    log::info!(
        "Issued batch of {} certificates on template {}",
        issued.len(),
        template_id
    );
    Ok(BatchOutcome {
        archive,
        issued: issued.into_iter().map(|cert| cert.certificate).collect(),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderError;
    use crate::services::certificates::form::UploadedFile;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Read;
    use std::time::Duration;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbaImage::from_pixel(width, height, Rgba([20, 40, 160, 255]))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn form_with(extra: &[(&str, &str)], files: Vec<(&str, UploadedFile)>) -> SubmittedForm {
        let mut fields = vec![
            ("recipient", "Jane Doe"),
            ("course", "Intro to Testing"),
            ("title", "Certificate of Completion"),
            ("date", "2024-01-01"),
            ("issuer", "Acme Corp"),
        ];
        fields.extend_from_slice(extra);
        SubmittedForm::from_parts(&fields, files)
    }

    fn roster_rows(names: &[&str]) -> Vec<(usize, CertificateDetails)> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let details = CertificateDetails {
                    recipient: name.to_string(),
                    title: "Attendance".into(),
                    date: "2024-01-01".into(),
                    issuer: "Acme".into(),
                    ..CertificateDetails::default()
                };
                (i + 2, details)
            })
            .collect()
    }

    fn context(dir: &Path) -> IssueContext {
        let database = dir.join("test.db");
        let conn = db::open(&database).unwrap();
        db::initialize(&conn).unwrap();
        let storage = Storage::new(dir.join("static"));
        storage.ensure_layout().unwrap();
        IssueContext {
            database,
            storage,
            base_url: "http://localhost:8080/".into(),
        }
    }

    fn single_form() -> SubmittedForm {
        SubmittedForm::from_parts(
            &[
                ("recipient", "Jane Doe"),
                ("course", "Intro to Testing"),
                ("title", "Certificate of Completion"),
                ("date", "2024-01-01"),
                ("issuer", "Acme Corp"),
            ],
            vec![],
        )
    }

    #[test]
    fn issue_records_the_serial_and_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        let (issued, bytes) = issue(&ctx, 1, single_form()).unwrap();

        let serial = format!("CERT-{}-000001", current_year());
        assert_eq!(issued.certificate.serial, serial);
        assert_eq!(issued.certificate.hash, fingerprint(&serial, "Jane Doe", "2024-01-01"));
        assert!(bytes.starts_with(b"%PDF"));
        assert!(issued.path.is_file());
        assert!(issued.path.ends_with(format!("{}.pdf", issued.certificate.cert_id)));
    }

    #[test]
    fn serials_increase_across_issues() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let (a, _) = issue(&ctx, 1, single_form()).unwrap();
        let (b, _) = issue(&ctx, 2, single_form()).unwrap();
        assert!(a.certificate.serial < b.certificate.serial);
        assert!(b.certificate.serial.ends_with("000002"));
    }

    #[test]
    fn unknown_template_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        assert!(matches!(issue(&ctx, 999, single_form()), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn failed_render_consumes_no_serial_and_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let form = SubmittedForm::from_parts(
            &[
                ("recipient", "Jane Doe"),
                ("course", "Intro"),
                ("title", "Completion"),
                ("date", "2024-01-01"),
                ("issuer", "Acme"),
            ],
            vec![(
                "logo",
                UploadedFile {
                    file_name: "logo.png".into(),
                    bytes: b"not an image".to_vec(),
                },
            )],
        );

        let err = issue(&ctx, 1, form).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Render(RenderError::UnreadableUpload { role: "logo", .. })
        ));

        let leftovers: Vec<_> = fs::read_dir(ctx.storage.output_dir()).unwrap().collect();
        assert!(leftovers.is_empty());
        let (next, _) = issue(&ctx, 1, single_form()).unwrap();
        assert!(next.certificate.serial.ends_with("000001"));
    }

    #[test]
    fn preview_peeks_without_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let preview = preview(&ctx, 1, single_form()).unwrap();
        assert!(preview.serial.ends_with("000001"));
        assert!(ctx.storage.preview_path().is_file());

        let conn = db::open(&ctx.database).unwrap();
        assert!(certificates::list_certificates(&conn).unwrap().is_empty());
    }

    #[test]
    fn roster_requires_a_name_column() {
        assert!(matches!(
            parse_roster(b"recipient,course\nJane,Intro\n"),
            Err(ServiceError::BadRequest(_))
        ));
        assert!(matches!(parse_roster(b""), Err(ServiceError::BadRequest(_))));
        assert!(matches!(parse_roster(&[0xff, 0xfe, 0x00]), Err(ServiceError::BadRequest(_))));
    }

    #[test]
    fn roster_skips_nameless_rows_and_defaults_optional_columns() {
        let roster = parse_roster(b"Name;Date\nJane Doe;2024-01-01\n;2024-01-02\nJohn Roe\n").unwrap();
        assert_eq!(
            roster.rows,
            vec![
                RosterRow {
                    line: 2,
                    name: "Jane Doe".into(),
                    course: String::new(),
                    date: "2024-01-01".into(),
                },
                RosterRow {
                    line: 4,
                    name: "John Roe".into(),
                    course: String::new(),
                    date: String::new(),
                },
            ]
        );
    }

    #[test]
    fn entry_names_cannot_create_directories() {
        assert_eq!(
            archive_entry_name("a/b\\c", "CERT-2024-000001"),
            "a_b_c_CERT-2024-000001.pdf"
        );
    }

    #[test]
    fn batch_packs_one_pdf_per_named_row() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let form = SubmittedForm::from_parts(
            &[("title", "Certificate of Attendance"), ("issuer", "Acme")],
            vec![(
                "csv",
                UploadedFile {
                    file_name: "roster.csv".into(),
                    bytes: b"name,course,date\nJane,Intro,2024-01-01\n,,\nJohn,Intro,2024-01-02\n"
                        .to_vec(),
                },
            )],
        );

        let outcome = issue_batch(&ctx, 3, form).unwrap();
        assert_eq!(outcome.issued.len(), 2);

        let mut archive = zip::ZipArchive::new(Cursor::new(outcome.archive)).unwrap();
        assert_eq!(archive.len(), 2);
        let year = current_year();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                format!("Jane_CERT-{}-000001.pdf", year),
                format!("John_CERT-{}-000002.pdf", year),
            ]
        );
        let mut first = archive.by_index(0).unwrap();
        let mut bytes = Vec::new();
        first.read_to_end(&mut bytes).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn uploaded_logo_is_stored_and_placed() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let form = form_with(
            &[],
            vec![(
                "logo",
                UploadedFile {
                    file_name: "Acme Logo.png".into(),
                    bytes: png(600, 300),
                },
            )],
        );

        let (issued, bytes) = issue(&ctx, 1, form).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(issued.warnings.is_empty(), "{:?}", issued.warnings);
        let stored = ctx
            .storage
            .upload_dir(UploadKind::Logo)
            .join(format!("{}_Acme Logo.png", issued.certificate.cert_id));
        assert!(stored.is_file());
    }

    #[test]
    fn preview_uploads_are_reused_by_reference() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let files = vec![
            ("logo", UploadedFile { file_name: "logo.png".into(), bytes: png(200, 200) }),
            ("signature", UploadedFile { file_name: "sig.png".into(), bytes: png(300, 100) }),
        ];
        let shown = preview(&ctx, 1, form_with(&[], files)).unwrap();
        let logo = ctx.storage.upload_reference(&shown.logo.unwrap()).unwrap();
        let signature = ctx.storage.upload_reference(&shown.signature.unwrap()).unwrap();

        // The older field name for the signature reference is still honoured.
        let form = form_with(&[("existing_logo", logo.as_str()), ("existing_sig", signature.as_str())], vec![]);
        let (issued, _) = issue(&ctx, 1, form).unwrap();
        assert!(issued.warnings.is_empty(), "{:?}", issued.warnings);
        assert_eq!(issued.certificate.serial, shown.serial);

        let uploads = fs::read_dir(ctx.storage.upload_dir(UploadKind::Logo)).unwrap().count();
        assert_eq!(uploads, 1);
    }

    #[test]
    fn references_outside_the_upload_directory_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let form = form_with(
            &[("existing_logo", "../test.db"), ("existing_signature", "signatures/gone.png")],
            vec![],
        );
        let (issued, _) = issue(&ctx, 1, form).unwrap();
        assert_eq!(issued.warnings.len(), 2);
        assert!(issued.warnings[0].contains("logo '../test.db'"));
        assert!(issued.warnings[1].contains("signature 'signatures/gone.png'"));
    }

    #[test]
    fn batch_rows_release_the_write_lock_between_certificates() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let mut conn = db::open(&ctx.database).unwrap();
        let template = require_template(&conn, 1).unwrap();

        let mut lines = Vec::new();
        let issued = issue_rows(&mut conn, &ctx, &template, roster_rows(&["Ada", "Grace"]), |line, _| {
            // Another writer gets the lock at once while the batch is running.
            let mut other = db::open(&ctx.database)?;
            other.busy_timeout(Duration::ZERO)?;
            other.transaction_with_behavior(TransactionBehavior::Immediate)?.commit()?;
            lines.push(line);
            Ok(())
        })
        .unwrap();

        assert_eq!(lines, vec![2, 3]);
        assert_eq!(issued.len(), 2);
        assert_eq!(issued[1].number, issued[0].number + 1);
    }

    #[test]
    fn single_issue_goes_through_while_a_batch_is_running() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let mut conn = db::open(&ctx.database).unwrap();
        let template = require_template(&conn, 1).unwrap();

        let mut interleaved = Vec::new();
        issue_rows(&mut conn, &ctx, &template, roster_rows(&["Ada", "Grace"]), |line, _| {
            if line == 2 {
                let (cert, _) = issue(&ctx, 1, single_form())?;
                interleaved.push(cert.certificate.serial);
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(interleaved.len(), 1);
        assert!(interleaved[0].ends_with("000002"));
    }

    #[test]
    fn failed_row_withdraws_the_whole_batch() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let mut conn = db::open(&ctx.database).unwrap();
        let template = require_template(&conn, 1).unwrap();

        let err = issue_rows(&mut conn, &ctx, &template, roster_rows(&["Ada", "Grace", "Linus"]), |line, _| {
            if line == 4 {
                return Err(ServiceError::Internal("zip full".into()));
            }
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));

        assert!(certificates::list_certificates(&conn).unwrap().is_empty());
        let leftovers = fs::read_dir(ctx.storage.output_dir()).unwrap().count();
        assert_eq!(leftovers, 0);
        let (next, _) = issue(&ctx, 1, single_form()).unwrap();
        assert!(next.certificate.serial.ends_with("000001"));
    }
}
