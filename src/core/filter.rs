//! Filter facade: one document plus its history
//!
//! [`Filter`] is what the CLI and any other front end talk to. All edits go
//! through [`Filter::execute`] so that every change lands on the undo stack;
//! the rule tree itself is only handed out immutably.

use crate::codec;
use crate::command::{Command, CommandHistory};
use crate::core::catalog::ItemCatalog;
use crate::core::error::{Error, Result};
use crate::core::storage::{self, FilterStore, validate_filter_name};
use crate::core::tree::RuleTree;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current persisted document format
pub const FORMAT_VERSION: u32 = 1;

/// Extension of the filter text file read by the game client
pub const FILTER_FILE_EXTENSION: &str = "filter";

fn default_version() -> u32 {
    FORMAT_VERSION
}

/// One editable filter document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub last_updated: DateTime<Utc>,
    rules: RuleTree,
    #[serde(default)]
    history: CommandHistory,
    /// When the filter text was last written to the game directory.
    /// Persisted so the write debounce holds across processes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_written: Option<DateTime<Utc>>,
}

impl Filter {
    /// Creates an empty filter
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_tree(name, RuleTree::new())
    }

    /// Wraps an existing tree with a fresh history
    pub fn from_tree(name: impl Into<String>, mut rules: RuleTree) -> Self {
        rules.attach_parents();
        Self {
            name: name.into(),
            version: FORMAT_VERSION,
            last_updated: Utc::now(),
            rules,
            history: CommandHistory::default(),
            last_written: None,
        }
    }

    /// Builds a filter from filter text.
    ///
    /// Import never fails as a whole; lines it could not use are returned as
    /// diagnostics next to the new document.
    pub fn from_import(
        name: impl Into<String>,
        text: &str,
        catalog: &ItemCatalog,
    ) -> (Self, Vec<Error>) {
        let outcome = codec::import(text, catalog);
        (Self::from_tree(name, outcome.tree), outcome.diagnostics)
    }

    pub fn rules(&self) -> &RuleTree {
        &self.rules
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    /// Limits the undo depth (0 = unbounded)
    pub fn set_history_limit(&mut self, limit: usize) {
        self.history.set_max_history(limit);
    }

    /// Runs a command against the document and records it.
    ///
    /// Returns whether anything changed.
    pub fn execute(&mut self, command: &dyn Command) -> Result<bool> {
        self.history.execute(command, &mut self.rules)
    }

    pub fn undo(&mut self) -> Result<Option<String>> {
        self.history.undo(&mut self.rules)
    }

    pub fn redo(&mut self) -> Result<Option<String>> {
        self.history.redo(&mut self.rules)
    }

    /// Returns whether undo is available
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Returns whether redo is available
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_count(&self) -> usize {
        self.history.undo_count()
    }

    pub fn redo_count(&self) -> usize {
        self.history.redo_count()
    }

    /// Renders the document as filter text
    pub fn serialize(&self) -> String {
        codec::serialize(&self.rules)
    }

    /// Deep copy under a new name.
    ///
    /// The copy starts with an empty history; node ids are kept since the two
    /// documents never share state.
    pub fn copy(&self, new_name: impl Into<String>) -> Self {
        let mut rules = self.rules.clone();
        rules.attach_parents();
        Self::from_tree(new_name, rules)
    }

    /// Renames the document in memory. Use [`FilterStore::rename`] for a
    /// saved filter so the file follows.
    pub fn rename(&mut self, new_name: &str) -> Result<()> {
        validate_filter_name(new_name)?;
        new_name.clone_into(&mut self.name);
        Ok(())
    }

    /// When [`Filter::write_file`] last wrote the game file
    pub fn last_written(&self) -> Option<DateTime<Utc>> {
        self.last_written
    }

    /// Stamps `last_updated` and persists the document
    pub async fn save(&mut self, store: &FilterStore) -> Result<()> {
        self.last_updated = Utc::now();
        store.save(self).await?;
        Ok(())
    }

    /// Writes `<dir>/<name>.filter` for the game client.
    ///
    /// Calls that arrive within `debounce` of the previous write are skipped
    /// and return `Ok(None)`; the next call after the window writes the
    /// latest state. The write time is part of the saved document, so save
    /// the filter afterwards to carry the window over to the next load.
    pub async fn write_file(&mut self, dir: &Path, debounce: Duration) -> Result<Option<PathBuf>> {
        // a clock that went backwards never suppresses a write
        if let Some(last) = self.last_written
            && (Utc::now() - last).to_std().is_ok_and(|elapsed| elapsed < debounce)
        {
            tracing::debug!("Skipping write of '{}': within debounce window", self.name);
            return Ok(None);
        }

        validate_filter_name(&self.name)?;
        if !tokio::fs::try_exists(dir).await? {
            tokio::fs::create_dir_all(dir).await?;
        }
        let path = dir.join(format!("{}.{FILTER_FILE_EXTENSION}", self.name));
        storage::write_atomic(&path, &codec::serialize(&self.rules)).await?;
        self.last_written = Some(Utc::now());

        tracing::info!("Wrote filter '{}' to {}", self.name, path.display());
        Ok(Some(path))
    }
}
