//! Collaborator cache reads and writes.

use super::{Database, now_ms};
use crate::types::{CachedCollaborator, Collaborator, first_name, name_color};
use anyhow::Result;
use rusqlite::{Row, params};

fn parse_collaborator_row(row: &Row) -> rusqlite::Result<CachedCollaborator> {
    Ok(CachedCollaborator {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        first_name: row.get("first_name")?,
        hex_color: row.get("hex_color")?,
        updated_at: row.get("updated_at")?,
    })
}

impl Database {
    /// Persist a collaborator, deriving the first name and the stable
    /// display color from the name.
    pub fn save_collaborator(&self, collaborator: &Collaborator) -> Result<()> {
        let now = now_ms();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO collaborators (id, name, email, first_name, hex_color, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    email = excluded.email,
                    first_name = excluded.first_name,
                    hex_color = excluded.hex_color,
                    updated_at = excluded.updated_at",
                params![
                    collaborator.id,
                    collaborator.name,
                    collaborator.email,
                    first_name(&collaborator.name),
                    name_color(&collaborator.name),
                    now,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_collaborator(&self, id: &str) -> Result<Option<CachedCollaborator>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM collaborators WHERE id = ?1")?;
            match stmt.query_row(params![id], parse_collaborator_row) {
                Ok(row) => Ok(Some(row)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn list_collaborators(&self) -> Result<Vec<CachedCollaborator>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM collaborators ORDER BY name")?;
            let rows = stmt
                .query_map([], parse_collaborator_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
