use crate::error::ServiceError;
use common::model::layout::TemplateConfig;
use common::model::template::{Orientation, Template};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// A template row before its orientation and layout JSON are decoded.
struct TemplateRow {
    id: i64,
    name: String,
    category: String,
    orientation: String,
    background: Option<String>,
    config_json: String,
}

impl TemplateRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            orientation: row.get(3)?,
            background: row.get(4)?,
            config_json: row.get(5)?,
        })
    }

    fn decode(self) -> Result<Template, ServiceError> {
        let orientation: Orientation = self
            .orientation
            .parse()
            .map_err(|reason| ServiceError::CorruptTemplate { id: self.id, reason })?;
        let config: TemplateConfig =
            serde_json::from_str(&self.config_json).map_err(|e| ServiceError::CorruptTemplate {
                id: self.id,
                reason: e.to_string(),
            })?;
        Ok(Template {
            id: self.id,
            name: self.name,
            category: self.category,
            orientation,
            background: self.background.filter(|b| !b.trim().is_empty()),
            config,
        })
    }
}

const SELECT_TEMPLATE: &str =
    "SELECT id, name, category, orientation, background, config_json FROM templates";

pub fn list_templates(conn: &Connection) -> Result<Vec<Template>, ServiceError> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_TEMPLATE))?;
    let rows = stmt
        .query_map([], TemplateRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(TemplateRow::decode).collect()
}

/// Returns `Ok(None)` when no template has this id.
pub fn get_template(conn: &Connection, id: i64) -> Result<Option<Template>, ServiceError> {
    let row = conn
        .query_row(
            &format!("{} WHERE id = ?1", SELECT_TEMPLATE),
            params![id],
            TemplateRow::from_row,
        )
        .optional()?;
    row.map(TemplateRow::decode).transpose()
}

/// Like [`get_template`] but a missing template is a `NotFound` error.
pub fn require_template(conn: &Connection, id: i64) -> Result<Template, ServiceError> {
    get_template(conn, id)?.ok_or_else(|| ServiceError::NotFound(format!("template {}", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_db;

    #[test]
    fn lists_the_whole_catalog_in_id_order() {
        let conn = memory_db();
        let templates = list_templates(&conn).unwrap();
        assert_eq!(templates.len(), 20);
        assert!(templates.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(templates[0].name, "Education Template 1");
        assert_eq!(templates[0].orientation, Orientation::Portrait);
        assert_eq!(templates[1].orientation, Orientation::Landscape);
        assert_eq!(templates[0].config, TemplateConfig::default());
    }

    #[test]
    fn missing_template_is_none_or_not_found() {
        let conn = memory_db();
        assert!(get_template(&conn, 999).unwrap().is_none());
        assert!(matches!(
            require_template(&conn, 999),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn corrupt_layout_is_reported() {
        let conn = memory_db();
        conn.execute("UPDATE templates SET config_json = '{' WHERE id = 3", [])
            .unwrap();
        assert!(matches!(
            get_template(&conn, 3),
            Err(ServiceError::CorruptTemplate { id: 3, .. })
        ));
    }
}
