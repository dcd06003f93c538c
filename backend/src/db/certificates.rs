use common::model::certificate::Certificate;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

const SEQUENCE_NAME: &str = "certificate";

/// Seeds the serial counter with the number of certificates already issued,
/// so databases created before the counter existed keep their numbering.
pub fn prime_serial_sequence(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO serial_sequence (name, value)
         SELECT ?1, COUNT(*) FROM certificates",
        params![SEQUENCE_NAME],
    )?;
    Ok(())
}

/// Advances the counter and returns the new value. Call inside the same
/// transaction as the matching [`insert_certificate`] so a failed issuance
/// does not burn a number.
pub fn allocate_serial_number(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "UPDATE serial_sequence SET value = value + 1 WHERE name = ?1 RETURNING value",
        params![SEQUENCE_NAME],
        |row| row.get(0),
    )
}

/// The number the next allocation would return, without reserving it.
pub fn peek_next_serial_number(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT value + 1 FROM serial_sequence WHERE name = ?1",
        params![SEQUENCE_NAME],
        |row| row.get(0),
    )
}

/// `CERT-<year>-<counter>`, the counter zero-padded to six digits.
pub fn format_serial(year: i32, number: i64) -> String {
    format!("CERT-{}-{:06}", year, number)
}

/// Fields of a certificate known before insertion.
#[derive(Debug, Clone)]
pub struct NewCertificate<'a> {
    pub cert_id: &'a str,
    pub serial: &'a str,
    pub template_id: i64,
    pub recipient: &'a str,
    pub course: &'a str,
    pub issuer: &'a str,
    pub file_path: &'a str,
    pub hash: &'a str,
}

const SELECT_CERTIFICATE: &str = "SELECT c.cert_id, c.serial, c.template_id, c.recipient, c.course, \
     c.issuer, c.file_path, c.hash, c.created_at FROM certificates c";

fn certificate_from_row(row: &Row<'_>) -> rusqlite::Result<Certificate> {
    Ok(Certificate {
        cert_id: row.get(0)?,
        serial: row.get(1)?,
        template_id: row.get(2)?,
        recipient: row.get(3)?,
        course: row.get(4)?,
        issuer: row.get(5)?,
        file_path: row.get(6)?,
        hash: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub fn insert_certificate(conn: &Connection, new: &NewCertificate<'_>) -> rusqlite::Result<Certificate> {
    conn.execute(
        "INSERT INTO certificates (cert_id, serial, template_id, recipient, course, issuer, file_path, hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            new.cert_id,
            new.serial,
            new.template_id,
            new.recipient,
            new.course,
            new.issuer,
            new.file_path,
            new.hash
        ],
    )?;
    conn.query_row(
        &format!("{} WHERE c.cert_id = ?1", SELECT_CERTIFICATE),
        params![new.cert_id],
        certificate_from_row,
    )
}

/// Looks a certificate up by id or serial and joins the template name.
pub fn find_for_verification(
    conn: &Connection,
    key: &str,
) -> rusqlite::Result<Option<(Certificate, String)>> {
    conn.query_row(
        "SELECT c.cert_id, c.serial, c.template_id, c.recipient, c.course, c.issuer, \
                c.file_path, c.hash, c.created_at, t.name \
         FROM certificates c JOIN templates t ON c.template_id = t.id \
         WHERE c.cert_id = ?1 OR c.serial = ?1",
        params![key],
        |row| Ok((certificate_from_row(row)?, row.get::<_, String>(9)?)),
    )
    .optional()
}

/// Deletes certificates of an aborted batch. If the counter still stands at
/// `last`, nothing else was issued meanwhile and it is rewound to `first - 1`
/// so the numbers are handed out again.
pub fn withdraw_certificates(
    conn: &mut Connection,
    cert_ids: &[&str],
    first: i64,
    last: i64,
) -> rusqlite::Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for cert_id in cert_ids {
        tx.execute("DELETE FROM certificates WHERE cert_id = ?1", params![cert_id])?;
    }
    tx.execute(
        "UPDATE serial_sequence SET value = ?2 WHERE name = ?1 AND value = ?3",
        params![SEQUENCE_NAME, first - 1, last],
    )?;
    tx.commit()
}

pub fn list_certificates(conn: &Connection) -> rusqlite::Result<Vec<Certificate>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY c.id", SELECT_CERTIFICATE))?;
    let rows = stmt.query_map([], certificate_from_row)?;
    rows.collect()
}
