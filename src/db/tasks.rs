//! Task CRUD, tree assembly, and search.

use super::{completion, now_ms, tags, Database};
use crate::error::StoreError;
use crate::types::{NewTask, Tag, Task, TaskPatch, TaskTree};
use anyhow::Result;
use rusqlite::{params, Connection, Row};
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        completed: row.get("completed")?,
        priority: row
            .get::<_, String>("priority")?
            .parse()
            .unwrap_or_default(),
        category_id: row.get("category_id")?,
        parent_id: row.get("parent_id")?,
        position: row.get("position")?,
        depth: row.get("depth")?,
        due_date: row.get("due_date")?,
        recurrence: row
            .get::<_, String>("recurrence")?
            .parse()
            .unwrap_or_default(),
        pending_parent_completion: row.get("pending_parent_completion")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        tags: Vec::new(),
    })
}

/// Internal helper to get a task using an existing connection.
pub(crate) fn get_task_internal(conn: &Connection, task_id: i64) -> Result<Option<Task>> {
    let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;

    let result = stmt.query_row(params![task_id], parse_task_row);

    match result {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Internal helper to get direct children, ordered by position.
pub(crate) fn get_children_internal(conn: &Connection, parent_id: i64) -> Result<Vec<Task>> {
    let mut stmt =
        conn.prepare("SELECT * FROM tasks WHERE parent_id = ?1 ORDER BY position ASC")?;

    let tasks = stmt
        .query_map(params![parent_id], parse_task_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(tasks)
}

/// Highest position in a sibling group (`None` = the root group). Zero when
/// the group is empty.
pub(crate) fn max_sibling_position(conn: &Connection, parent_id: Option<i64>) -> Result<i64> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(position) FROM tasks WHERE parent_id IS ?1",
        params![parent_id],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0))
}

/// Apply a typed partial update. Each present field becomes its own UPDATE;
/// `updated_at` is touched once at the end.
fn apply_patch(conn: &Connection, task_id: i64, patch: &TaskPatch) -> Result<()> {
    if let Some(ref title) = patch.title {
        conn.execute(
            "UPDATE tasks SET title = ?1 WHERE id = ?2",
            params![title, task_id],
        )?;
    }
    if let Some(ref description) = patch.description {
        conn.execute(
            "UPDATE tasks SET description = ?1 WHERE id = ?2",
            params![description, task_id],
        )?;
    }
    if let Some(completed) = patch.completed {
        conn.execute(
            "UPDATE tasks SET completed = ?1 WHERE id = ?2",
            params![completed, task_id],
        )?;
    }
    if let Some(priority) = patch.priority {
        conn.execute(
            "UPDATE tasks SET priority = ?1 WHERE id = ?2",
            params![priority.as_str(), task_id],
        )?;
    }
    if let Some(category_id) = patch.category_id {
        conn.execute(
            "UPDATE tasks SET category_id = ?1 WHERE id = ?2",
            params![category_id, task_id],
        )?;
    }
    if let Some(due_date) = patch.due_date {
        conn.execute(
            "UPDATE tasks SET due_date = ?1 WHERE id = ?2",
            params![due_date, task_id],
        )?;
    }
    if let Some(recurrence) = patch.recurrence {
        conn.execute(
            "UPDATE tasks SET recurrence = ?1 WHERE id = ?2",
            params![recurrence.as_str(), task_id],
        )?;
    }

    conn.execute(
        "UPDATE tasks SET updated_at = ?1 WHERE id = ?2",
        params![now_ms(), task_id],
    )?;

    Ok(())
}

/// Batch-load tags for a set of tasks, keyed by task id.
fn load_tags_map(conn: &Connection, task_ids: &[i64]) -> Result<HashMap<i64, Vec<Tag>>> {
    let mut map: HashMap<i64, Vec<Tag>> = HashMap::new();
    if task_ids.is_empty() {
        return Ok(map);
    }

    let placeholders = task_ids
        .iter()
        .map(|_| "?")
        .collect::<Vec<_>>()
        .join(",");
    let sql = format!(
        "SELECT tt.task_id, t.id, t.name, t.color, t.created_at
         FROM task_tags tt
         JOIN tags t ON tt.tag_id = t.id
         WHERE tt.task_id IN ({})
         ORDER BY t.name",
        placeholders
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt.query_map(rusqlite::params_from_iter(task_ids.iter()), |row| {
        Ok((
            row.get::<_, i64>(0)?,
            Tag {
                id: row.get(1)?,
                name: row.get(2)?,
                color: row.get(3)?,
                created_at: row.get(4)?,
            },
        ))
    })?;

    for row in rows {
        let (task_id, tag) = row?;
        map.entry(task_id).or_default().push(tag);
    }

    Ok(map)
}

/// Assemble a forest from a flat, position-ordered task list. Tasks whose
/// parent is missing from the list are treated as roots.
fn build_forest(rows: Vec<Task>) -> Vec<TaskTree> {
    let ids: HashSet<i64> = rows.iter().map(|t| t.id).collect();

    let mut groups: HashMap<Option<i64>, Vec<Task>> = HashMap::new();
    for task in rows {
        let key = task.parent_id.filter(|p| ids.contains(p));
        groups.entry(key).or_default().push(task);
    }

    fn take_children(
        parent: Option<i64>,
        groups: &mut HashMap<Option<i64>, Vec<Task>>,
    ) -> Vec<TaskTree> {
        // Each group is removed as it is visited, so a corrupted parent
        // cycle terminates instead of recursing forever.
        groups
            .remove(&parent)
            .map(|tasks| {
                tasks
                    .into_iter()
                    .map(|task| {
                        let id = task.id;
                        TaskTree {
                            task,
                            children: take_children(Some(id), groups),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    take_children(None, &mut groups)
}

impl Database {
    /// Create a new task at the end of its sibling group.
    pub fn create_task(&self, new: NewTask) -> Result<Task> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let now = now_ms();

            let (depth, position) = match new.parent_id {
                Some(parent_id) => {
                    let parent = get_task_internal(&tx, parent_id)?
                        .ok_or_else(|| StoreError::task_not_found(parent_id))?;
                    (
                        parent.depth + 1,
                        max_sibling_position(&tx, Some(parent_id))? + 1,
                    )
                }
                None => (0, max_sibling_position(&tx, None)? + 1),
            };

            tx.execute(
                "INSERT INTO tasks (title, description, priority, category_id, parent_id,
                                    position, depth, due_date, recurrence, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                params![
                    new.title,
                    new.description,
                    new.priority.as_str(),
                    new.category_id,
                    new.parent_id,
                    position,
                    depth,
                    new.due_date,
                    new.recurrence.as_str(),
                    now,
                ],
            )?;
            let task_id = tx.last_insert_rowid();

            if !new.tags.is_empty() {
                tags::set_task_tags(&tx, task_id, &new.tags)?;
            }

            debug!(task_id, position, depth, "created task");

            let mut task = get_task_internal(&tx, task_id)?
                .ok_or_else(|| StoreError::task_not_found(task_id))?;
            task.tags = tags::load_task_tags(&tx, task_id)?;
            tx.commit()?;
            Ok(task)
        })
    }

    /// Get a task by id, with its tags.
    pub fn get_task(&self, task_id: i64) -> Result<Option<Task>> {
        self.with_conn(|conn| {
            let task = get_task_internal(conn, task_id)?;
            match task {
                None => Ok(None),
                Some(mut task) => {
                    task.tags = tags::load_task_tags(conn, task_id)?;
                    Ok(Some(task))
                }
            }
        })
    }

    /// Direct children of a task (or the root group for `None`), ordered by
    /// position.
    pub fn get_children(&self, parent_id: Option<i64>) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM tasks WHERE parent_id IS ?1 ORDER BY position ASC")?;

            let tasks = stmt
                .query_map(params![parent_id], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(tasks)
        })
    }

    /// All tasks as a forest, siblings ordered by position, tags attached.
    pub fn list_tree(&self) -> Result<Vec<TaskTree>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM tasks ORDER BY position ASC")?;
            let mut rows = stmt
                .query_map([], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;

            let ids: Vec<i64> = rows.iter().map(|t| t.id).collect();
            let mut tag_map = load_tags_map(conn, &ids)?;
            for task in &mut rows {
                if let Some(tags) = tag_map.remove(&task.id) {
                    task.tags = tags;
                }
            }

            Ok(build_forest(rows))
        })
    }

    /// Flat search over title, description, and tag names. A leading `#`
    /// is stripped for the tag comparison, matching the search-box
    /// convention.
    pub fn search_tasks(&self, term: &str) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let term = term.trim();
            let tag_term = term.strip_prefix('#').unwrap_or(term);
            let text_pattern = format!("%{}%", term);
            let tag_pattern = format!("%{}%", tag_term);

            let mut stmt = conn.prepare(
                "SELECT * FROM tasks
                 WHERE title LIKE ?1 OR description LIKE ?1 OR EXISTS (
                     SELECT 1 FROM task_tags tt
                     JOIN tags t ON tt.tag_id = t.id
                     WHERE tt.task_id = tasks.id AND t.name LIKE ?2
                 )
                 ORDER BY position ASC",
            )?;

            let mut tasks = stmt
                .query_map(params![text_pattern, tag_pattern], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;

            let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
            let mut tag_map = load_tags_map(conn, &ids)?;
            for task in &mut tasks {
                if let Some(tags) = tag_map.remove(&task.id) {
                    task.tags = tags;
                }
            }

            Ok(tasks)
        })
    }

    /// Apply a partial update to a task.
    ///
    /// A `completed` change triggers the completion engine inside the same
    /// transaction: deferral or spawn of recurring occurrences and the
    /// subtree cascade. Setting `completed` to its current value is a no-op
    /// for the engine.
    pub fn update_task(&self, task_id: i64, patch: TaskPatch) -> Result<Task> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let task = get_task_internal(&tx, task_id)?
                .ok_or_else(|| StoreError::task_not_found(task_id))?;

            if !patch.is_empty() {
                apply_patch(&tx, task_id, &patch)?;

                if let Some(ref names) = patch.tags {
                    tags::set_task_tags(&tx, task_id, names)?;
                }

                // The engine only runs on an actual transition and sees the
                // row as it was before this patch.
                if let Some(new_completed) = patch.completed {
                    if new_completed != task.completed {
                        completion::apply_transition(&tx, &task, new_completed)?;
                    }
                }
            }

            let mut updated = get_task_internal(&tx, task_id)?
                .ok_or_else(|| StoreError::task_not_found(task_id))?;
            updated.tags = tags::load_task_tags(&tx, task_id)?;
            tx.commit()?;
            Ok(updated)
        })
    }

    /// Delete a task. Descendants go with it via the parent foreign key.
    pub fn delete_task(&self, task_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let changes = conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            if changes == 0 {
                return Err(StoreError::task_not_found(task_id).into());
            }
            debug!(task_id, "deleted task");
            Ok(())
        })
    }
}
