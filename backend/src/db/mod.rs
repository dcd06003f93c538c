//! SQLite persistence. Every operation opens its own connection with [`open`];
//! nothing holds a connection across requests.

pub mod certificates;
pub mod seed;
pub mod templates;

use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS templates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    orientation TEXT NOT NULL,
    background TEXT,
    config_json TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS certificates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cert_id TEXT NOT NULL UNIQUE,
    serial TEXT NOT NULL UNIQUE,
    template_id INTEGER NOT NULL REFERENCES templates(id),
    recipient TEXT NOT NULL,
    course TEXT NOT NULL,
    issuer TEXT NOT NULL,
    file_path TEXT NOT NULL,
    hash TEXT NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS serial_sequence (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
";

/// Opens a connection to the database file, waiting on a locked database
/// instead of failing immediately.
pub fn open(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

/// Creates the tables, primes the serial counter and seeds the template
/// catalog on first start.
pub fn initialize(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)?;
    certificates::prime_serial_sequence(conn)?;
    let seeded = seed::seed_templates(conn)?;
    if seeded > 0 {
        log::info!("Seeded {} catalog templates", seeded);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use rusqlite::Connection;

    pub fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        super::initialize(&conn).unwrap();
        conn
    }
}
