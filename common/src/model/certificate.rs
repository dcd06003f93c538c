use serde::{Deserialize, Serialize};

/// A persisted issuance record. Never updated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub cert_id: String,
    pub serial: String,
    pub template_id: i64,
    pub recipient: String,
    pub course: String,
    pub issuer: String,
    pub file_path: String,
    /// Hex SHA-256 of `serial + recipient + date` at issuance time.
    pub hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    Valid,
    Invalid,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Valid => "Valid",
            VerificationStatus::Invalid => "Invalid",
        }
    }
}

/// Outcome of looking a certificate up by id or serial.
///
/// `Valid` only means a matching issuance row exists; the fingerprint is
/// reported as stored and is not recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub key: String,
    pub status: VerificationStatus,
    pub certificate: Option<Certificate>,
    pub template_name: Option<String>,
    /// Whether the rendered PDF is still on disk (it may have been swept).
    pub file_available: bool,
}
