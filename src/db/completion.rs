//! Completion-transition engine: deferred recurrence, occurrence spawning,
//! and subtree cascade.
//!
//! All functions here run inside the caller's transaction; a failure rolls
//! back the whole completion transition.

use super::category::resolve_category_for;
use super::tags::copy_tags;
use super::tasks::{get_children_internal, max_sibling_position};
use super::now_ms;
use crate::recurrence::next_occurrence_ms;
use crate::types::Task;
use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use tracing::debug;

/// Apply the side effects of a `completed` flag change.
///
/// `task` is the row as loaded before the update was applied, so the spawn
/// procedure sees the pre-transition due date and parent. Callers only
/// invoke this on an actual transition; equal old/new flags never reach the
/// engine.
pub(crate) fn apply_transition(conn: &Connection, task: &Task, now_completed: bool) -> Result<()> {
    if now_completed {
        complete(conn, task)
    } else {
        reopen(conn, task)
    }
}

fn complete(conn: &Connection, task: &Task) -> Result<()> {
    if task.parent_id.is_some() && task.recurrence.is_recurring() {
        // Recurring subtask: the next occurrence waits until the whole
        // parent checklist is done. No spawn, no cascade.
        debug!(
            task_id = task.id,
            rule = task.recurrence.as_str(),
            "deferring recurrence until parent completes"
        );
        conn.execute(
            "UPDATE tasks SET pending_parent_completion = 1 WHERE id = ?1",
            params![task.id],
        )?;
        return Ok(());
    }

    if task.recurrence.is_recurring() {
        spawn_next_occurrence(conn, task)?;
    }

    // Unchecked recurring children are implicitly deferred so the cascade
    // below does not silently drop their recurrence.
    conn.execute(
        "UPDATE tasks SET pending_parent_completion = 1
         WHERE parent_id = ?1 AND completed = 0 AND recurrence != 'none'",
        params![task.id],
    )?;

    cascade_complete(conn, task.id)
}

fn reopen(conn: &Connection, task: &Task) -> Result<()> {
    // Reopening voids any deferred spawn. No cascade in this direction.
    if task.pending_parent_completion {
        debug!(task_id = task.id, "reopened; voiding deferred recurrence");
    }
    conn.execute(
        "UPDATE tasks SET pending_parent_completion = 0 WHERE id = ?1",
        params![task.id],
    )?;
    Ok(())
}

/// Depth-first walk over the subtree below `root_id`, marking every
/// descendant completed. A descendant's deferred recurrence is always
/// resolved before that descendant is marked completed.
///
/// Explicit worklist instead of recursion; the visited set stops the walk on
/// corrupted hierarchies.
fn cascade_complete(conn: &Connection, root_id: i64) -> Result<()> {
    let now = now_ms();
    let mut stack = vec![root_id];
    let mut seen = HashSet::from([root_id]);

    while let Some(parent_id) = stack.pop() {
        for child in get_children_internal(conn, parent_id)? {
            if !seen.insert(child.id) {
                continue;
            }

            if child.pending_parent_completion {
                spawn_next_occurrence(conn, &child)?;
                conn.execute(
                    "UPDATE tasks SET pending_parent_completion = 0 WHERE id = ?1",
                    params![child.id],
                )?;
            }

            conn.execute(
                "UPDATE tasks SET completed = 1, updated_at = ?1 WHERE id = ?2",
                params![now, child.id],
            )?;

            stack.push(child.id);
        }
    }

    Ok(())
}

/// Insert the next occurrence of a recurring task as a new root-level task.
///
/// The new row copies title, description, priority, and recurrence; the due
/// date advances by one unit; the category falls back to the nearest
/// ancestor's; tag links are duplicated. The source row is not touched.
fn spawn_next_occurrence(conn: &Connection, task: &Task) -> Result<()> {
    let next_due = next_occurrence_ms(task.recurrence, task.due_date, Utc::now());
    let position = max_sibling_position(conn, None)? + 1;
    let category_id = resolve_category_for(conn, task)?;
    let now = now_ms();

    conn.execute(
        "INSERT INTO tasks (title, description, priority, category_id, parent_id,
                            position, depth, due_date, recurrence, completed,
                            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, NULL, ?5, 0, ?6, ?7, 0, ?8, ?8)",
        params![
            task.title,
            task.description,
            task.priority.as_str(),
            category_id,
            position,
            next_due,
            task.recurrence.as_str(),
            now,
        ],
    )?;
    let new_id = conn.last_insert_rowid();

    copy_tags(conn, task.id, new_id)?;

    debug!(
        source = task.id,
        spawned = new_id,
        due = next_due,
        "spawned next occurrence"
    );

    Ok(())
}
