//! CLI command definitions and dispatch.
//!
//! The `Cli` struct is parsed in `main`; `run` executes one subcommand
//! against an open database.

use crate::db::Database;
use crate::error::StoreError;
use crate::format::{self, OutputFormat};
use crate::types::{NewTask, Priority, Recurrence, TaskPatch};
use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Hierarchical to-do manager with recurring tasks.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a task
    Add {
        title: String,

        /// Longer description
        #[arg(long)]
        description: Option<String>,

        /// Parent task id (makes this a subtask)
        #[arg(short, long)]
        parent: Option<i64>,

        /// Category id
        #[arg(long)]
        category: Option<i64>,

        /// Priority: low, medium, or high
        #[arg(long)]
        priority: Option<Priority>,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        /// Recurrence: none, daily, weekly, or monthly
        #[arg(long)]
        recur: Option<Recurrence>,

        /// Tag name (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List all tasks as a tree, or search with a term
    List {
        /// Search term; `#name` matches tags
        search: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show one task with its ancestors and children
    Show { id: i64 },

    /// Mark a task complete
    Done { id: i64 },

    /// Reopen a completed task
    Undone { id: i64 },

    /// Move a task to a new parent and/or position
    Move {
        id: i64,

        /// New parent id (omit to move to root level)
        #[arg(short, long)]
        parent: Option<i64>,

        /// Position within the destination sibling group
        #[arg(long)]
        position: i64,
    },

    /// Delete a task and its subtasks
    Rm { id: i64 },

    /// List all tags
    Tags,

    /// Manage categories
    Category {
        #[command(subcommand)]
        action: CategoryCommand,
    },

    /// Insert the default categories
    Seed,
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    /// List categories
    List,
    /// Add a category
    Add {
        name: String,
        #[arg(long, default_value = "#5e81ac")]
        color: String,
        #[arg(long)]
        icon: Option<String>,
    },
    /// Delete a category
    Rm { id: i64 },
}

/// Parse a YYYY-MM-DD due date into epoch milliseconds (midnight UTC).
fn parse_due(s: &str) -> Result<i64> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| StoreError::invalid_value("due", format!("{}: {}", s, e)))?;
    let dt = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| StoreError::invalid_value("due", s))?;
    Ok(dt.and_utc().timestamp_millis())
}

/// Execute a subcommand against the database.
pub fn run(command: Command, db: &Database) -> Result<()> {
    match command {
        Command::Add {
            title,
            description,
            parent,
            category,
            priority,
            due,
            recur,
            tags,
        } => {
            let due_date = due.as_deref().map(parse_due).transpose()?;
            let task = db.create_task(NewTask {
                title,
                description,
                priority: priority.unwrap_or_default(),
                category_id: category,
                parent_id: parent,
                due_date,
                recurrence: recur.unwrap_or_default(),
                tags,
            })?;
            println!("Created task #{}: {}", task.id, task.title);
        }

        Command::List { search, format } => match search {
            Some(term) => {
                let tasks = db.search_tasks(&term)?;
                match format {
                    OutputFormat::Text => print!("{}", format::format_tasks_text(&tasks)),
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tasks)?),
                }
            }
            None => {
                let forest = db.list_tree()?;
                match format {
                    OutputFormat::Text => print!("{}", format::format_tree_text(&forest)),
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&forest)?),
                }
            }
        },

        Command::Show { id } => {
            let task = db
                .get_task(id)?
                .ok_or_else(|| StoreError::task_not_found(id))?;

            let ancestors = db.ancestor_chain(id)?;
            if !ancestors.is_empty() {
                let breadcrumb: Vec<&str> =
                    ancestors.iter().rev().map(|t| t.title.as_str()).collect();
                println!("{} >", breadcrumb.join(" > "));
            }

            print!("{}", format::format_tasks_text(std::slice::from_ref(&task)));
            if let Some(ref description) = task.description {
                println!("    {}", description);
            }

            let children = db.get_children(Some(id))?;
            print!("{}", format::format_tasks_text(&children));
        }

        Command::Done { id } => {
            let task = db.update_task(id, TaskPatch::completed(true))?;
            println!("Completed task #{}: {}", task.id, task.title);
        }

        Command::Undone { id } => {
            let task = db.update_task(id, TaskPatch::completed(false))?;
            println!("Reopened task #{}: {}", task.id, task.title);
        }

        Command::Move {
            id,
            parent,
            position,
        } => {
            db.move_task(id, parent, position)?;
            println!("Moved task #{}", id);
        }

        Command::Rm { id } => {
            db.delete_task(id)?;
            println!("Deleted task #{}", id);
        }

        Command::Tags => {
            for tag in db.list_tags()? {
                println!("#{}", tag.name);
            }
        }

        Command::Category { action } => match action {
            CategoryCommand::List => {
                for category in db.list_categories()? {
                    println!("{} {} ({})", category.id, category.name, category.color);
                }
            }
            CategoryCommand::Add { name, color, icon } => {
                let category = db.create_category(&name, &color, icon.as_deref())?;
                println!("Created category #{}: {}", category.id, category.name);
            }
            CategoryCommand::Rm { id } => {
                db.delete_category(id)?;
                println!("Deleted category #{}", id);
            }
        },

        Command::Seed => {
            let inserted = db.seed_defaults()?;
            println!("Seeded {} categories", inserted);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_due_accepts_calendar_dates() {
        let ms = parse_due("2024-01-10").unwrap();
        assert_eq!(
            ms,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 10)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                .and_utc()
                .timestamp_millis()
        );
    }

    #[test]
    fn parse_due_rejects_garbage() {
        assert!(parse_due("next tuesday").is_err());
        assert!(parse_due("2024-13-40").is_err());
    }
}
