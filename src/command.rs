//! Command engine: reversible edits with undo/redo
//!
//! Every modification to a rule tree is expressed as a [`Command`]. A command
//! only knows how to apply itself; it never implements its own undo. The
//! [`CommandHistory`] snapshots the persisted form of the tree around the
//! command, diffs the two snapshots into a [`PatchPair`] and keeps that pair on
//! a linear undo/redo stack.
//!
//! Built-in commands:
//! - [`SetEntryActive`]: enable/disable a node with propagation
//! - [`InsertEntry`] / [`RemoveEntry`]: add or delete rules and categories
//! - [`MoveEntry`] / [`MoveItem`]: reorder rules, categories and bases
//! - [`AddBase`] / [`RemoveBase`]: edit a rule's item bases
//! - [`Rename`]: rename any non-root node
//! - [`SetAction`] / [`SetCondition`] / [`SetBlock`] / [`SetContinue`]: rule settings
//! - [`FnCommand`]: ad-hoc closure
//!
//! Consecutive commands are never merged: two colour edits are two undo steps.
//!
//! # Example
//!
//! ```
//! use lootrule::command::{CommandHistory, SetEntryActive};
//! use lootrule::core::tree::{Item, Rule, RuleTree};
//!
//! let mut tree = RuleTree::new();
//! let mut rule = Rule::new("Belts");
//! rule.bases.push(Item::new("Leather Belt"));
//! let rule_id = rule.id;
//! tree.insert_rule(rule, tree.root().id).unwrap();
//!
//! let mut history = CommandHistory::default();
//! history.execute(&SetEntryActive::new(rule_id, false), &mut tree).unwrap();
//! assert!(!tree.rule(rule_id).unwrap().enabled);
//!
//! history.undo(&mut tree).unwrap();
//! assert!(tree.rule(rule_id).unwrap().enabled);
//! ```

use crate::codec::action::{AlertSound, Beam, DropSound, MinimapIcon, Rgba, SoundSource};
use crate::codec::condition::Condition;
use crate::core::error::Result;
use crate::core::patch::{self, Patch, PatchPair};
use crate::core::tree::{Block, Entry, Item, NodeId, RuleTree};
use crate::validators;
use serde::{Deserialize, Serialize};

/// One unit of work against a rule tree
///
/// `execute` must only touch the tree. An error aborts the command: nothing
/// is recorded, and the tree keeps whatever partial change was made, so
/// implementations validate before mutating.
pub trait Command: std::fmt::Debug {
    /// Applies the change
    fn execute(&self, tree: &mut RuleTree) -> Result<()>;

    /// Returns a human-readable description of this command
    fn description(&self) -> String;
}

/// Enables or disables a node; see [`RuleTree::set_enabled`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetEntryActive {
    pub id: NodeId,
    pub active: bool,
}

impl SetEntryActive {
    pub fn new(id: NodeId, active: bool) -> Self {
        Self { id, active }
    }
}

impl Command for SetEntryActive {
    fn execute(&self, tree: &mut RuleTree) -> Result<()> {
        tree.set_enabled(self.id, self.active)
    }

    fn description(&self) -> String {
        if self.active {
            "Enable entry".to_string()
        } else {
            "Disable entry".to_string()
        }
    }
}

/// Adds a rule or category under `parent`, appended unless `index` is given
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertEntry {
    pub parent: NodeId,
    pub entry: Entry,
    pub index: Option<usize>,
}

impl Command for InsertEntry {
    fn execute(&self, tree: &mut RuleTree) -> Result<()> {
        let id = self.entry.id();
        tree.insert_entry(self.entry.clone(), self.parent)?;
        if let Some(index) = self.index {
            tree.move_entry(id, self.parent, index)?;
        }
        Ok(())
    }

    fn description(&self) -> String {
        match &self.entry {
            Entry::Rule(rule) => format!("Add rule: {}", rule.name),
            Entry::Category(category) => format!("Add category: {}", category.name),
        }
    }
}

/// Deletes a rule or category (with its subtree)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveEntry {
    pub id: NodeId,
}

impl Command for RemoveEntry {
    fn execute(&self, tree: &mut RuleTree) -> Result<()> {
        tree.remove_entry(self.id).map(|_| ())
    }

    fn description(&self) -> String {
        "Delete entry".to_string()
    }
}

/// Moves a rule or category to a position under a (possibly new) parent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveEntry {
    pub id: NodeId,
    pub target_parent: NodeId,
    pub index: usize,
}

impl Command for MoveEntry {
    fn execute(&self, tree: &mut RuleTree) -> Result<()> {
        tree.move_entry(self.id, self.target_parent, self.index)
    }

    fn description(&self) -> String {
        format!("Move entry (position {})", self.index + 1)
    }
}

/// Moves an item base between (or within) rules.
///
/// An item that is not in `source_rule` leaves the tree untouched, so nothing
/// is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveItem {
    pub item_id: NodeId,
    pub index: usize,
    pub source_rule: NodeId,
    pub target_rule: NodeId,
}

impl Command for MoveItem {
    fn execute(&self, tree: &mut RuleTree) -> Result<()> {
        tree.move_item(self.item_id, self.index, self.source_rule, self.target_rule)
            .map(|_| ())
    }

    fn description(&self) -> String {
        "Move item".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddBase {
    pub rule_id: NodeId,
    pub item: Item,
}

impl Command for AddBase {
    fn execute(&self, tree: &mut RuleTree) -> Result<()> {
        tree.add_base(self.rule_id, self.item.clone())
    }

    fn description(&self) -> String {
        format!("Add base: {}", self.item.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveBase {
    pub item_id: NodeId,
}

impl Command for RemoveBase {
    fn execute(&self, tree: &mut RuleTree) -> Result<()> {
        tree.remove_base(self.item_id).map(|_| ())
    }

    fn description(&self) -> String {
        "Remove base".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rename {
    pub id: NodeId,
    pub name: String,
}

impl Command for Rename {
    fn execute(&self, tree: &mut RuleTree) -> Result<()> {
        tree.rename(self.id, self.name.clone())
    }

    fn description(&self) -> String {
        format!("Rename to: {}", self.name)
    }
}

/// One action field of a rule; `None` clears it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionUpdate {
    FontSize(Option<f64>),
    TextColor(Option<Rgba>),
    BorderColor(Option<Rgba>),
    BackgroundColor(Option<Rgba>),
    MinimapIcon(Option<MinimapIcon>),
    Beam(Option<Beam>),
    DropSound(Option<DropSound>),
    AlertSound(Option<AlertSound>),
}

impl ActionUpdate {
    /// Range checks, done before the tree is touched
    pub fn validate(&self) -> Result<()> {
        match self {
            ActionUpdate::FontSize(Some(size)) => validators::validate_font_size(*size),
            ActionUpdate::TextColor(Some(color))
            | ActionUpdate::BorderColor(Some(color))
            | ActionUpdate::BackgroundColor(Some(color)) => validators::validate_color(color),
            ActionUpdate::AlertSound(Some(sound)) => {
                validators::validate_volume(sound.volume)?;
                match &sound.source {
                    SoundSource::Builtin { id } => validators::validate_alert_sound_id(*id),
                    SoundSource::Custom { path } => validators::validate_sound_path(path),
                }
            }
            _ => Ok(()),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ActionUpdate::FontSize(_) => "font size",
            ActionUpdate::TextColor(_) => "text color",
            ActionUpdate::BorderColor(_) => "border color",
            ActionUpdate::BackgroundColor(_) => "background color",
            ActionUpdate::MinimapIcon(_) => "minimap icon",
            ActionUpdate::Beam(_) => "beam",
            ActionUpdate::DropSound(_) => "drop sound",
            ActionUpdate::AlertSound(_) => "alert sound",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAction {
    pub rule_id: NodeId,
    pub update: ActionUpdate,
}

impl Command for SetAction {
    fn execute(&self, tree: &mut RuleTree) -> Result<()> {
        self.update.validate()?;
        let actions = &mut tree.require_rule_mut(self.rule_id)?.actions;
        match self.update.clone() {
            ActionUpdate::FontSize(v) => actions.font_size = v,
            ActionUpdate::TextColor(v) => actions.text = v,
            ActionUpdate::BorderColor(v) => actions.border = v,
            ActionUpdate::BackgroundColor(v) => actions.background = v,
            ActionUpdate::MinimapIcon(v) => actions.icon = v,
            ActionUpdate::Beam(v) => actions.beam = v,
            ActionUpdate::DropSound(v) => actions.drop_sound = v,
            ActionUpdate::AlertSound(v) => actions.sound = v,
        }
        Ok(())
    }

    fn description(&self) -> String {
        format!("Set {}", self.update.label())
    }
}

/// Replaces every condition of one property; `None` removes the property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetCondition {
    pub rule_id: NodeId,
    pub name: String,
    pub condition: Option<Condition>,
}

impl Command for SetCondition {
    fn execute(&self, tree: &mut RuleTree) -> Result<()> {
        let rule = tree.require_rule_mut(self.rule_id)?;
        rule.conditions.set(self.name.clone(), self.condition.clone());
        Ok(())
    }

    fn description(&self) -> String {
        match self.condition {
            Some(_) => format!("Set condition: {}", self.name),
            None => format!("Remove condition: {}", self.name),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetBlock {
    pub rule_id: NodeId,
    pub block: Block,
}

impl Command for SetBlock {
    fn execute(&self, tree: &mut RuleTree) -> Result<()> {
        tree.require_rule_mut(self.rule_id)?.block = self.block;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Set block: {}", self.block)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetContinue {
    pub rule_id: NodeId,
    pub value: bool,
}

impl Command for SetContinue {
    fn execute(&self, tree: &mut RuleTree) -> Result<()> {
        tree.require_rule_mut(self.rule_id)?.continue_matching = self.value;
        Ok(())
    }

    fn description(&self) -> String {
        if self.value {
            "Enable continue".to_string()
        } else {
            "Disable continue".to_string()
        }
    }
}

/// Wraps a closure as a command, for edits without a dedicated type
pub struct FnCommand<F> {
    description: String,
    apply: F,
}

impl<F> FnCommand<F>
where
    F: Fn(&mut RuleTree) -> Result<()>,
{
    pub fn new(description: impl Into<String>, apply: F) -> Self {
        Self {
            description: description.into(),
            apply,
        }
    }
}

impl<F> std::fmt::Debug for FnCommand<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCommand")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<F> Command for FnCommand<F>
where
    F: Fn(&mut RuleTree) -> Result<()>,
{
    fn execute(&self, tree: &mut RuleTree) -> Result<()> {
        (self.apply)(tree)
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

/// One recorded command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub description: String,
    #[serde(flatten)]
    pub patches: PatchPair,
}

/// Manages the undo/redo history
///
/// Both stacks are serializable so history survives a save/load cycle.
/// `max_history` is a runtime setting and is not persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandHistory {
    #[serde(default)]
    undo_stack: Vec<HistoryEntry>,
    #[serde(default)]
    redo_stack: Vec<HistoryEntry>,
    /// 0 means unbounded
    #[serde(skip)]
    max_history: usize,
}

impl CommandHistory {
    /// Creates a history that keeps at most `max_history` undo steps (0 = unbounded)
    pub fn new(max_history: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_history,
        }
    }

    pub fn set_max_history(&mut self, max_history: usize) {
        self.max_history = max_history;
        self.trim();
    }

    fn trim(&mut self) {
        if self.max_history > 0 && self.undo_stack.len() > self.max_history {
            let excess = self.undo_stack.len() - self.max_history;
            self.undo_stack.drain(..excess);
        }
    }

    /// Runs a command and records its effect.
    ///
    /// Returns `Ok(false)` if the command changed nothing; no entry is
    /// recorded and the redo stack is kept. On error nothing is recorded and
    /// the tree is restored to its state before the command ran.
    pub fn execute(&mut self, command: &dyn Command, tree: &mut RuleTree) -> Result<bool> {
        let before = tree.to_value()?;
        if let Err(e) = command.execute(tree) {
            // roll back whatever the command changed before failing
            if let Err(restore) = tree.replace_from_value(before) {
                tracing::warn!("Could not roll back '{}': {restore}", command.description());
            }
            return Err(e);
        }
        tree.attach_parents();
        let after = tree.to_value()?;

        let patches = patch::diff(&before, &after);
        if patches.is_empty() {
            tracing::debug!("'{}' changed nothing, not recorded", command.description());
            return Ok(false);
        }

        tracing::debug!(
            "Executed '{}' ({} patch(es))",
            command.description(),
            patches.redo.len()
        );
        self.redo_stack.clear();
        self.undo_stack.push(HistoryEntry {
            description: command.description(),
            patches,
        });
        self.trim();
        Ok(true)
    }

    fn replay(tree: &mut RuleTree, patches: &[Patch]) -> Result<()> {
        let mut value = tree.to_value()?;
        patch::apply(&mut value, patches)?;
        tree.replace_from_value(value)
    }

    /// Undoes the last command, returning its description.
    ///
    /// `Ok(None)` when there is nothing to undo. A patch that no longer fits
    /// the tree is an error; the tree and both stacks are then left as they
    /// were.
    pub fn undo(&mut self, tree: &mut RuleTree) -> Result<Option<String>> {
        let Some(entry) = self.undo_stack.pop() else {
            return Ok(None);
        };
        if let Err(e) = Self::replay(tree, &entry.patches.undo) {
            tracing::error!("Undo of '{}' failed: {e}", entry.description);
            self.undo_stack.push(entry);
            return Err(e);
        }
        tracing::debug!("Undid: {}", entry.description);
        let description = entry.description.clone();
        self.redo_stack.push(entry);
        Ok(Some(description))
    }

    /// Redoes the last undone command, returning its description
    pub fn redo(&mut self, tree: &mut RuleTree) -> Result<Option<String>> {
        let Some(entry) = self.redo_stack.pop() else {
            return Ok(None);
        };
        if let Err(e) = Self::replay(tree, &entry.patches.redo) {
            tracing::error!("Redo of '{}' failed: {e}", entry.description);
            self.redo_stack.push(entry);
            return Err(e);
        }
        tracing::debug!("Redid: {}", entry.description);
        let description = entry.description.clone();
        self.undo_stack.push(entry);
        Ok(Some(description))
    }

    /// Returns whether undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Returns whether redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Returns the description of the next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|e| e.description.as_str())
    }

    /// Returns the description of the next redo operation
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|e| e.description.as_str())
    }

    /// Clears the entire history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Returns the number of operations in the undo stack
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Returns the number of operations in the redo stack
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}
