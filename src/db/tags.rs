//! Tag lookup and task-tag junction maintenance.

use super::{now_ms, Database};
use crate::types::Tag;
use anyhow::Result;
use rusqlite::{params, Connection};

/// Find a tag by name, creating it if missing. Returns the tag id.
pub(crate) fn find_or_create_tag(conn: &Connection, name: &str) -> Result<i64> {
    let existing = conn.query_row(
        "SELECT id FROM tags WHERE name = ?1",
        params![name],
        |row| row.get::<_, i64>(0),
    );

    match existing {
        Ok(id) => Ok(id),
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            conn.execute(
                "INSERT INTO tags (name, created_at) VALUES (?1, ?2)",
                params![name, now_ms()],
            )?;
            Ok(conn.last_insert_rowid())
        }
        Err(e) => Err(e.into()),
    }
}

/// Replace the task's tag set with the given names.
pub(crate) fn set_task_tags(conn: &Connection, task_id: i64, names: &[String]) -> Result<()> {
    conn.execute("DELETE FROM task_tags WHERE task_id = ?1", params![task_id])?;
    for name in names {
        let tag_id = find_or_create_tag(conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?1, ?2)",
            params![task_id, tag_id],
        )?;
    }
    Ok(())
}

/// Load the tags linked to a task.
pub(crate) fn load_task_tags(conn: &Connection, task_id: i64) -> Result<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.color, t.created_at
         FROM task_tags tt
         JOIN tags t ON tt.tag_id = t.id
         WHERE tt.task_id = ?1
         ORDER BY t.name",
    )?;

    let tags = stmt
        .query_map(params![task_id], |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
                color: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(tags)
}

/// Duplicate all tag links from one task onto another. The source keeps its
/// links.
pub(crate) fn copy_tags(conn: &Connection, from_id: i64, to_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO task_tags (task_id, tag_id)
         SELECT ?2, tag_id FROM task_tags WHERE task_id = ?1",
        params![from_id, to_id],
    )?;
    Ok(())
}

impl Database {
    /// List all tags, ordered by name.
    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, color, created_at FROM tags ORDER BY name ASC")?;

            let tags = stmt
                .query_map([], |row| {
                    Ok(Tag {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        color: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(tags)
        })
    }

    /// Duplicate tag links from one task to another.
    pub fn copy_tags(&self, from_id: i64, to_id: i64) -> Result<()> {
        self.with_conn(|conn| copy_tags(conn, from_id, to_id))
    }
}
