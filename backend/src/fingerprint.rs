use sha2::{Digest, Sha256};

/// Content digest stored with every issued certificate: hex SHA-256 over the
/// serial, recipient and date concatenated without separators.
pub fn fingerprint(serial: &str, recipient: &str, date: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serial.as_bytes());
    hasher.update(recipient.as_bytes());
    hasher.update(date.as_bytes());
    hex::encode(hasher.finalize())
}
