use serde::{Deserialize, Serialize};

/// Query string of the administrative endpoints.
#[derive(Deserialize)]
pub struct AdminQuery {
    pub key: Option<String>,
}

/// Returned by the live preview endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub preview_url: String,
    pub serial: String,
    /// Stored upload references that can be sent back as `existing_logo` /
    /// `existing_signature` when issuing for real.
    pub existing_logo: Option<String>,
    pub existing_signature: Option<String>,
    pub warnings: Vec<String>,
}
