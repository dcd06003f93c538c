use common::model::certificate::{VerificationReport, VerificationStatus};
use maud::{html, Markup, PreEscaped, DOCTYPE};

const STYLE: &str = "body { font-family: Helvetica, Arial, sans-serif; margin: 3em auto; max-width: 40em; }
.valid { color: #1b7f3b; }
.invalid { color: #b3261e; }
th { text-align: left; padding-right: 1em; }";

fn details(report: &VerificationReport) -> Markup {
    let Some(cert) = &report.certificate else {
        return html! {
            p { "No certificate was issued under " code { (report.key) } "." }
        };
    };
    let document = if report.file_available { "available" } else { "expired" };
    let rows = [
        ("Recipient", cert.recipient.as_str()),
        ("Course", cert.course.as_str()),
        ("Issuer", cert.issuer.as_str()),
        ("Serial", cert.serial.as_str()),
        ("Certificate ID", cert.cert_id.as_str()),
        ("Template", report.template_name.as_deref().unwrap_or_default()),
        ("Issued", cert.created_at.as_str()),
        ("Fingerprint", cert.hash.as_str()),
        ("Document", document),
    ];
    html! {
        table {
            @for (label, value) in rows {
                tr { th { (label) } td { (value) } }
            }
        }
    }
}

/// Status page for a verification report.
pub fn render(report: &VerificationReport) -> String {
    let (heading, class) = match report.status {
        VerificationStatus::Valid => ("Certificate is valid", "valid"),
        VerificationStatus::Invalid => ("Certificate not found", "invalid"),
    };

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { "Certificate verification" }
                style { (PreEscaped(STYLE)) }
            }
            body {
                h1 class=(class) { (heading) }
                p { "Status: " strong class=(class) { (report.status.as_str()) } }
                (details(report))
            }
        }
    }
    .into_string()
}
