use common::model::layout::TemplateConfig;
use common::model::template::Orientation;
use rusqlite::{params, Connection};

/// Catalog categories and how many templates each one gets.
const CATALOG: [(&str, usize); 4] = [
    ("EDUCATION", 5),
    ("CHURCH & RELIGIOUS", 5),
    ("EVENTS & COMMUNITY", 5),
    ("BUSINESS & TRAINING", 5),
];

/// Inserts the fixed template catalog when the table is empty. Returns the
/// number of templates inserted (zero when the catalog already exists).
pub fn seed_templates(conn: &Connection) -> rusqlite::Result<usize> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM templates", [], |row| row.get(0))?;
    if existing > 0 {
        return Ok(0);
    }

    let config_json = serde_json::to_string(&TemplateConfig::default())
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    let mut stmt = conn.prepare(
        "INSERT INTO templates (name, category, orientation, background, config_json)
         VALUES (?1, ?2, ?3, NULL, ?4)",
    )?;
    let mut inserted = 0;
    for (category, count) in CATALOG {
        for i in 1..=count {
            let orientation = if i % 2 == 0 {
                Orientation::Landscape
            } else {
                Orientation::Portrait
            };
            let name = format!("{} Template {}", capitalize(category), i);
            stmt.execute(params![name, category, orientation.as_str(), config_json])?;
            inserted += 1;
        }
    }
    Ok(inserted)
}

/// Upper-cases the first character and lower-cases the rest.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_db;

    #[test]
    fn catalog_is_seeded_once() {
        let conn = memory_db();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM templates", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 20);
        assert_eq!(seed_templates(&conn).unwrap(), 0);
    }

    #[test]
    fn names_and_orientations_follow_the_catalog() {
        let conn = memory_db();
        let (name, orientation): (String, String) = conn
            .query_row(
                "SELECT name, orientation FROM templates WHERE id = 7",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(name, "Church & religious Template 2");
        assert_eq!(orientation, "landscape");
    }

    #[test]
    fn capitalize_lowers_the_tail() {
        assert_eq!(capitalize("EVENTS & COMMUNITY"), "Events & community");
        assert_eq!(capitalize(""), "");
    }
}
