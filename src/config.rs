//! YAML configuration: database location and logging defaults.
//!
//! Lookup order: explicit `--config` path, then the `TASKDECK_CONFIG`
//! environment variable, then `./taskdeck.yaml`, then
//! `~/.taskdeck/config.yaml`. Missing files fall back to defaults; CLI flags
//! override whatever the file says.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "TASKDECK_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path to the SQLite database file.
    pub database: Option<PathBuf>,
    /// Logging output: "off", "stdout", "stderr", or a filename.
    pub log: Option<String>,
    /// Verbose logging by default.
    pub verbose: bool,
}

impl Config {
    /// Load configuration, walking the lookup order.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }

        let project = Path::new("taskdeck.yaml");
        if project.exists() {
            return Self::from_file(project);
        }

        if let Some(home) = dirs::home_dir() {
            let user = home.join(".taskdeck").join("config.yaml");
            if user.exists() {
                return Self::from_file(&user);
            }
        }

        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Database path after applying the default location.
    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(default_database_path)
    }
}

/// Default database location: `~/.taskdeck/tasks.db`, or the working
/// directory when no home is available.
pub fn default_database_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".taskdeck").join("tasks.db"))
        .unwrap_or_else(|| PathBuf::from("tasks.db"))
}
