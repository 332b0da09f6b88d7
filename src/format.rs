//! Output formatting for CLI commands.

use crate::types::{Task, TaskTree};
use chrono::{TimeZone, Utc};

/// Output format for list commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Format an epoch-milliseconds timestamp as a calendar date.
pub fn format_date(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn format_line(task: &Task) -> String {
    let mut line = String::new();

    line.push_str(if task.completed { "[x]" } else { "[ ]" });
    line.push_str(&format!(" #{} {}", task.id, task.title));

    if let Some(due) = task.due_date {
        line.push_str(&format!("  due {}", format_date(due)));
    }
    if task.recurrence.is_recurring() {
        line.push_str(&format!("  ({})", task.recurrence));
    }
    if task.pending_parent_completion {
        line.push_str("  [pending]");
    }
    if !task.tags.is_empty() {
        let names: Vec<String> = task.tags.iter().map(|t| format!("#{}", t.name)).collect();
        line.push_str(&format!("  {}", names.join(" ")));
    }

    line
}

/// Render a task forest as indented text.
pub fn format_tree_text(forest: &[TaskTree]) -> String {
    fn render(out: &mut String, node: &TaskTree, indent: usize) {
        out.push_str(&"  ".repeat(indent));
        out.push_str(&format_line(&node.task));
        out.push('\n');
        for child in &node.children {
            render(out, child, indent + 1);
        }
    }

    let mut out = String::new();
    for node in forest {
        render(&mut out, node, 0);
    }
    out
}

/// Render a flat task list (search results) as text.
pub fn format_tasks_text(tasks: &[Task]) -> String {
    let mut out = String::new();
    for task in tasks {
        out.push_str(&format_line(task));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Recurrence, Task};

    fn task(id: i64, title: &str) -> Task {
        Task {
            id,
            title: title.to_string(),
            description: None,
            completed: false,
            priority: Default::default(),
            category_id: None,
            parent_id: None,
            position: 1,
            depth: 0,
            due_date: None,
            recurrence: Recurrence::None,
            pending_parent_completion: false,
            created_at: 0,
            updated_at: 0,
            tags: Vec::new(),
        }
    }

    #[test]
    fn renders_checkbox_and_id() {
        let line = format_tasks_text(&[task(3, "water plants")]);
        assert!(line.contains("[ ] #3 water plants"));
    }

    #[test]
    fn renders_nested_children_indented() {
        let mut parent = task(1, "parent");
        parent.depth = 0;
        let child = task(2, "child");
        let forest = vec![TaskTree {
            task: parent,
            children: vec![TaskTree {
                task: child,
                children: vec![],
            }],
        }];

        let text = format_tree_text(&forest);
        assert!(text.contains("#1 parent"));
        assert!(text.contains("  [ ] #2 child"));
    }

    #[test]
    fn formats_dates_as_calendar_days() {
        let ms = Utc
            .with_ymd_and_hms(2024, 1, 10, 12, 30, 0)
            .unwrap()
            .timestamp_millis();
        assert_eq!(format_date(ms), "2024-01-10");
    }
}
