//! Append-only log of executed commands.
//!
//! One command per line. The same file seeds the line editor so earlier
//! commands can be recalled with the arrow keys.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct CommandHistory {
    path: PathBuf,
}

impl CommandHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `command` as a new line, creating the file and its directory.
    pub fn append(&self, command: &str) -> Result<()> {
        let command = command.trim();
        if command.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open history file {}", self.path.display()))?;

        // embedded newlines would split one command over several entries
        writeln!(file, "{}", command.replace('\n', " "))
            .with_context(|| format!("Failed to write history file {}", self.path.display()))?;

        debug!("Saved to history: {}", command);
        Ok(())
    }

    /// Copy the history file of an older install when this one has none yet.
    ///
    /// Returns whether anything was imported.
    pub fn import_legacy(&self, legacy: &Path) -> Result<bool> {
        if self.path.exists() || !legacy.is_file() {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::copy(legacy, &self.path).with_context(|| {
            format!(
                "Failed to import history {} into {}",
                legacy.display(),
                self.path.display()
            )
        })?;

        info!("Imported legacy history from {}", legacy.display());
        Ok(true)
    }

    /// All recorded commands, oldest first. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read history file {}", self.path.display()))?;
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }
}
