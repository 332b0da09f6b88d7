//! Sibling ordering and subtree depth maintenance for task moves.

use super::tasks::get_task_internal;
use super::{now_ms, Database};
use crate::error::StoreError;
use anyhow::Result;
use rusqlite::params;
use std::collections::HashSet;
use tracing::debug;

impl Database {
    /// Reparent and/or reorder a task.
    ///
    /// Positions in the source group close over the vacated slot and the
    /// destination group opens one at `new_position`; a move within the same
    /// group shifts only the range between the old and new position. Depths
    /// of the moved task and its whole subtree are recomputed. Everything
    /// happens in one transaction.
    pub fn move_task(
        &self,
        task_id: i64,
        new_parent_id: Option<i64>,
        new_position: i64,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let task = get_task_internal(&tx, task_id)?
                .ok_or_else(|| StoreError::task_not_found(task_id))?;

            let new_depth = match new_parent_id {
                Some(parent_id) => {
                    if parent_id == task_id {
                        return Err(StoreError::invalid_value(
                            "parent_id",
                            "task cannot be its own parent",
                        )
                        .into());
                    }
                    let parent = get_task_internal(&tx, parent_id)?
                        .ok_or_else(|| StoreError::task_not_found(parent_id))?;

                    // Reparenting under the task's own subtree would detach
                    // it from the tree entirely.
                    let mut seen = HashSet::from([parent_id]);
                    let mut ancestor = parent.parent_id;
                    while let Some(id) = ancestor {
                        if id == task_id {
                            return Err(StoreError::invalid_value(
                                "parent_id",
                                "target parent is a descendant of the task",
                            )
                            .into());
                        }
                        if !seen.insert(id) {
                            break;
                        }
                        ancestor = get_task_internal(&tx, id)?.and_then(|t| t.parent_id);
                    }

                    parent.depth + 1
                }
                None => 0,
            };

            if task.parent_id == new_parent_id {
                // Same sibling group: shift only the affected range.
                if task.position < new_position {
                    tx.execute(
                        "UPDATE tasks SET position = position - 1
                         WHERE parent_id IS ?1 AND position > ?2 AND position <= ?3",
                        params![new_parent_id, task.position, new_position],
                    )?;
                } else if task.position > new_position {
                    tx.execute(
                        "UPDATE tasks SET position = position + 1
                         WHERE parent_id IS ?1 AND position >= ?2 AND position < ?3",
                        params![new_parent_id, new_position, task.position],
                    )?;
                }
            } else {
                tx.execute(
                    "UPDATE tasks SET position = position - 1
                     WHERE parent_id IS ?1 AND position > ?2",
                    params![task.parent_id, task.position],
                )?;
                tx.execute(
                    "UPDATE tasks SET position = position + 1
                     WHERE parent_id IS ?1 AND position >= ?2",
                    params![new_parent_id, new_position],
                )?;
            }

            tx.execute(
                "UPDATE tasks SET parent_id = ?1, position = ?2, depth = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![new_parent_id, new_position, new_depth, now_ms(), task_id],
            )?;

            // Recompute depth for the whole moved subtree.
            let mut stack = vec![(task_id, new_depth)];
            let mut seen = HashSet::from([task_id]);
            while let Some((parent_id, parent_depth)) = stack.pop() {
                let child_ids: Vec<i64> = {
                    let mut stmt =
                        tx.prepare("SELECT id FROM tasks WHERE parent_id = ?1")?;
                    let ids = stmt
                        .query_map(params![parent_id], |row| row.get(0))?
                        .collect::<Result<Vec<i64>, _>>()?;
                    ids
                };
                for child_id in child_ids {
                    if !seen.insert(child_id) {
                        continue;
                    }
                    tx.execute(
                        "UPDATE tasks SET depth = ?1 WHERE id = ?2",
                        params![parent_depth + 1, child_id],
                    )?;
                    stack.push((child_id, parent_depth + 1));
                }
            }

            tx.commit()?;

            debug!(
                task_id,
                parent = ?new_parent_id,
                position = new_position,
                depth = new_depth,
                "moved task"
            );

            Ok(())
        })
    }
}
