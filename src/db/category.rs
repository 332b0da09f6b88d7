//! Category inheritance: tasks without their own category borrow the
//! nearest ancestor's.

use super::tasks::get_task_internal;
use super::Database;
use crate::error::StoreError;
use crate::types::Task;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use tracing::warn;

/// Walk the ancestor chain starting at `ancestor_id` and return the first
/// category found.
///
/// A revisited id means the hierarchy is corrupted; the walk stops and the
/// task is treated as uncategorized instead of looping.
pub(crate) fn inherited_category(
    conn: &Connection,
    mut ancestor_id: Option<i64>,
) -> Result<Option<i64>> {
    let mut seen = HashSet::new();

    while let Some(id) = ancestor_id {
        if !seen.insert(id) {
            warn!(task_id = id, "cycle in ancestor chain during category walk");
            return Ok(None);
        }

        let row: Option<(Option<i64>, Option<i64>)> = conn
            .query_row(
                "SELECT category_id, parent_id FROM tasks WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((Some(category_id), _)) => return Ok(Some(category_id)),
            Some((None, parent_id)) => ancestor_id = parent_id,
            None => return Ok(None),
        }
    }

    Ok(None)
}

/// Effective category for a task row: its own when set, otherwise the
/// nearest ancestor's.
pub(crate) fn resolve_category_for(conn: &Connection, task: &Task) -> Result<Option<i64>> {
    match task.category_id {
        Some(category_id) => Ok(Some(category_id)),
        None => inherited_category(conn, task.parent_id),
    }
}

impl Database {
    /// Effective category for a task: its own, or the nearest ancestor's.
    pub fn resolve_category(&self, task_id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let task = get_task_internal(conn, task_id)?
                .ok_or_else(|| StoreError::task_not_found(task_id))?;
            resolve_category_for(conn, &task)
        })
    }

    /// Ancestors of a task, nearest first. Stops early on corrupted
    /// hierarchies rather than looping.
    pub fn ancestor_chain(&self, task_id: i64) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let task = get_task_internal(conn, task_id)?
                .ok_or_else(|| StoreError::task_not_found(task_id))?;

            let mut chain = Vec::new();
            let mut seen = HashSet::from([task.id]);
            let mut next = task.parent_id;

            while let Some(id) = next {
                if !seen.insert(id) {
                    warn!(task_id = id, "cycle in ancestor chain");
                    break;
                }
                match get_task_internal(conn, id)? {
                    Some(ancestor) => {
                        next = ancestor.parent_id;
                        chain.push(ancestor);
                    }
                    None => break,
                }
            }

            Ok(chain)
        })
    }
}
