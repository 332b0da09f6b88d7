//! Hierarchical task manager with recurring tasks and cascading completion.
//!
//! The library owns the task store and its completion engine; the
//! `taskdeck` binary is a thin CLI over it.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod recurrence;
pub mod types;
