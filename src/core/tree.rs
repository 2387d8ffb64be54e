//! Rule tree: the in-memory filter document
//!
//! A filter is a hierarchy of categories and rules hanging off a single
//! [`Root`]. Rules own the item bases they match against, so the tree has
//! four node variants:
//!
//! - [`Root`]: the document root, never has a parent
//! - [`Category`]: groups rules and other categories
//! - [`Rule`]: one emitted filter block (conditions, actions, bases)
//! - [`Item`]: a leaf item-base reference owned by a rule
//!
//! Child order is match priority in the emitted filter text (first match wins).
//!
//! # Parent links
//!
//! Parent back-references are kept in a side index (`NodeId -> NodeId`) rather
//! than inside the nodes, so the persisted form is strictly a tree. The index is
//! rebuilt by [`RuleTree::attach_parents`] after deserialization or cloning and
//! is never serialized.
//!
//! # Example
//!
//! ```
//! use lootrule::core::tree::{Item, Rule, RuleTree};
//!
//! let mut tree = RuleTree::new();
//! let mut rule = Rule::new("Belts");
//! rule.bases.push(Item::new("Leather Belt"));
//! rule.bases.push(Item::new("Chain Belt"));
//! let rule_id = rule.id;
//! tree.insert_rule(rule, tree.root().id).unwrap();
//!
//! tree.set_enabled(rule_id, false).unwrap();
//! assert!(tree.rule(rule_id).unwrap().bases.iter().all(|b| !b.enabled));
//! ```

use crate::codec::action::Actions;
use crate::codec::condition::Conditions;
use crate::core::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use uuid::Uuid;

/// Node identifier. UUIDv7, so ids sort in creation order.
pub type NodeId = Uuid;

/// Generates a fresh, time-ordered node id
pub fn new_id() -> NodeId {
    Uuid::now_v7()
}

fn default_true() -> bool {
    true
}

/// Block keyword a rule is emitted with
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
pub enum Block {
    #[default]
    Show,
    Hide,
    Minimal,
}

/// Leaf item-base reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: NodeId,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Icon asset path, resolved by the UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Sort weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_class: Option<String>,
}

impl Item {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            enabled: true,
            icon: None,
            value: None,
            item_class: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: NodeId,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub block: Block,
    /// Emit a `Continue` marker so later blocks may also match
    #[serde(default, rename = "continue")]
    pub continue_matching: bool,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default)]
    pub actions: Actions,
    #[serde(default)]
    pub bases: Vec<Item>,
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            enabled: true,
            block: Block::Show,
            continue_matching: false,
            conditions: Conditions::default(),
            actions: Actions::default(),
            bases: Vec::new(),
        }
    }

    fn set_enabled_recursive(&mut self, value: bool) {
        self.enabled = value;
        for base in &mut self.bases {
            base.enabled = value;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: NodeId,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub children: Vec<Entry>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            enabled: true,
            icon: None,
            children: Vec::new(),
        }
    }
}

/// Child of the root or of a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entry {
    Category(Category),
    Rule(Rule),
}

impl Entry {
    pub fn id(&self) -> NodeId {
        match self {
            Entry::Category(c) => c.id,
            Entry::Rule(r) => r.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entry::Category(c) => &c.name,
            Entry::Rule(r) => &r.name,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            Entry::Category(c) => c.enabled,
            Entry::Rule(r) => r.enabled,
        }
    }

    fn set_enabled_recursive(&mut self, value: bool) {
        match self {
            Entry::Category(c) => {
                c.enabled = value;
                for child in &mut c.children {
                    child.set_enabled_recursive(value);
                }
            }
            Entry::Rule(r) => r.set_enabled_recursive(value),
        }
    }

    /// Whether `id` names this entry or anything below it
    fn contains(&self, id: NodeId) -> bool {
        if self.id() == id {
            return true;
        }
        match self {
            Entry::Category(c) => c.children.iter().any(|child| child.contains(id)),
            Entry::Rule(r) => r.bases.iter().any(|b| b.id == id),
        }
    }

    fn collect_ids(&self, out: &mut Vec<NodeId>) {
        out.push(self.id());
        match self {
            Entry::Category(c) => {
                for child in &c.children {
                    child.collect_ids(out);
                }
            }
            Entry::Rule(r) => out.extend(r.bases.iter().map(|b| b.id)),
        }
    }
}

impl From<Rule> for Entry {
    fn from(rule: Rule) -> Self {
        Entry::Rule(rule)
    }
}

impl From<Category> for Entry {
    fn from(category: Category) -> Self {
        Entry::Category(category)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Root {
    pub id: NodeId,
    #[serde(default)]
    pub children: Vec<Entry>,
}

impl Default for Root {
    fn default() -> Self {
        Self {
            id: new_id(),
            children: Vec::new(),
        }
    }
}

/// Node variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum NodeKind {
    Root,
    Category,
    Rule,
    Item,
}

/// Shared view of any node in the tree
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Root(&'a Root),
    Category(&'a Category),
    Rule(&'a Rule),
    Item(&'a Item),
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        match self {
            NodeRef::Root(n) => n.id,
            NodeRef::Category(n) => n.id,
            NodeRef::Rule(n) => n.id,
            NodeRef::Item(n) => n.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeRef::Root(_) => NodeKind::Root,
            NodeRef::Category(_) => NodeKind::Category,
            NodeRef::Rule(_) => NodeKind::Rule,
            NodeRef::Item(_) => NodeKind::Item,
        }
    }

    /// Display name; the root has none
    pub fn name(&self) -> &'a str {
        match self {
            NodeRef::Root(_) => "",
            NodeRef::Category(n) => &n.name,
            NodeRef::Rule(n) => &n.name,
            NodeRef::Item(n) => &n.name,
        }
    }

    /// The root is always considered enabled
    pub fn enabled(&self) -> bool {
        match self {
            NodeRef::Root(_) => true,
            NodeRef::Category(n) => n.enabled,
            NodeRef::Rule(n) => n.enabled,
            NodeRef::Item(n) => n.enabled,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, NodeRef::Item(_))
    }

    pub fn child_ids(&self) -> Vec<NodeId> {
        match self {
            NodeRef::Root(n) => n.children.iter().map(Entry::id).collect(),
            NodeRef::Category(n) => n.children.iter().map(Entry::id).collect(),
            NodeRef::Rule(n) => n.bases.iter().map(|b| b.id).collect(),
            NodeRef::Item(_) => Vec::new(),
        }
    }
}

/// Exclusive view of any node in the tree
#[derive(Debug)]
pub enum NodeMut<'a> {
    Root(&'a mut Root),
    Category(&'a mut Category),
    Rule(&'a mut Rule),
    Item(&'a mut Item),
}

fn find_in<'a>(entries: &'a [Entry], id: NodeId) -> Option<NodeRef<'a>> {
    for entry in entries {
        match entry {
            Entry::Category(c) => {
                if c.id == id {
                    return Some(NodeRef::Category(c));
                }
                if let Some(found) = find_in(&c.children, id) {
                    return Some(found);
                }
            }
            Entry::Rule(r) => {
                if r.id == id {
                    return Some(NodeRef::Rule(r));
                }
                if let Some(item) = r.bases.iter().find(|b| b.id == id) {
                    return Some(NodeRef::Item(item));
                }
            }
        }
    }
    None
}

fn find_in_mut<'a>(entries: &'a mut [Entry], id: NodeId) -> Option<NodeMut<'a>> {
    for entry in entries.iter_mut() {
        match entry {
            Entry::Category(c) => {
                if c.id == id {
                    return Some(NodeMut::Category(c));
                }
                if let Some(found) = find_in_mut(&mut c.children, id) {
                    return Some(found);
                }
            }
            Entry::Rule(r) => {
                if r.id == id {
                    return Some(NodeMut::Rule(r));
                }
                if let Some(item) = r.bases.iter_mut().find(|b| b.id == id) {
                    return Some(NodeMut::Item(item));
                }
            }
        }
    }
    None
}

fn index_parents(entries: &[Entry], parent: NodeId, parents: &mut HashMap<NodeId, NodeId>) {
    for entry in entries {
        parents.insert(entry.id(), parent);
        match entry {
            Entry::Category(c) => index_parents(&c.children, c.id, parents),
            Entry::Rule(r) => {
                for base in &r.bases {
                    parents.insert(base.id, r.id);
                }
            }
        }
    }
}

fn collect_rules<'a>(entries: &'a [Entry], out: &mut Vec<&'a Rule>) {
    for entry in entries {
        match entry {
            Entry::Category(c) => collect_rules(&c.children, out),
            Entry::Rule(r) => out.push(r),
        }
    }
}

fn walk_entries<'a>(entries: &'a [Entry], depth: usize, out: &mut Vec<(usize, NodeRef<'a>)>) {
    for entry in entries {
        match entry {
            Entry::Category(c) => {
                out.push((depth, NodeRef::Category(c)));
                walk_entries(&c.children, depth + 1, out);
            }
            Entry::Rule(r) => {
                out.push((depth, NodeRef::Rule(r)));
                for base in &r.bases {
                    out.push((depth + 1, NodeRef::Item(base)));
                }
            }
        }
    }
}

/// The filter document: a root plus a non-persisted parent index
#[derive(Debug, Clone, Default)]
pub struct RuleTree {
    root: Root,
    parents: HashMap<NodeId, NodeId>,
}

impl Serialize for RuleTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RuleTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Root::deserialize(deserializer).map(RuleTree::from_root)
    }
}

impl PartialEq for RuleTree {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl RuleTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a root and rebuilds parent links
    pub fn from_root(root: Root) -> Self {
        let mut tree = Self {
            root,
            parents: HashMap::new(),
        };
        tree.attach_parents();
        tree
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    /// Raw access to the root.
    ///
    /// Structural edits made through this bypass the parent index; call
    /// [`RuleTree::attach_parents`] afterwards. The command engine does this
    /// after every command.
    pub fn root_mut(&mut self) -> &mut Root {
        &mut self.root
    }

    pub fn into_root(self) -> Root {
        self.root
    }

    /// Rebuilds every parent link from the owned structure
    pub fn attach_parents(&mut self) {
        self.parents.clear();
        index_parents(&self.root.children, self.root.id, &mut self.parents);
    }

    /// Drops all parent links, leaving a purely owned tree
    pub fn detach_parents(&mut self) {
        self.parents.clear();
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    /// Ancestors of `id`, nearest first, ending at the root
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(ancestor) = current {
            out.push(ancestor);
            current = self.parent_of(ancestor);
        }
        out
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_>> {
        if id == self.root.id {
            return Some(NodeRef::Root(&self.root));
        }
        find_in(&self.root.children, id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<NodeMut<'_>> {
        if id == self.root.id {
            return Some(NodeMut::Root(&mut self.root));
        }
        find_in_mut(&mut self.root.children, id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn rule(&self, id: NodeId) -> Option<&Rule> {
        match self.get(id) {
            Some(NodeRef::Rule(rule)) => Some(rule),
            _ => None,
        }
    }

    pub fn rule_mut(&mut self, id: NodeId) -> Option<&mut Rule> {
        match self.get_mut(id) {
            Some(NodeMut::Rule(rule)) => Some(rule),
            _ => None,
        }
    }

    pub fn item(&self, id: NodeId) -> Option<&Item> {
        match self.get(id) {
            Some(NodeRef::Item(item)) => Some(item),
            _ => None,
        }
    }

    /// Like [`RuleTree::rule_mut`], but a missing or non-rule id is an error
    pub fn require_rule_mut(&mut self, id: NodeId) -> Result<&mut Rule> {
        self.rule_mut(id)
            .ok_or_else(|| Error::NotFound(format!("rule {id}")))
    }

    /// All rules in emission order (depth-first, child order)
    pub fn rules(&self) -> Vec<&Rule> {
        let mut out = Vec::new();
        collect_rules(&self.root.children, &mut out);
        out
    }

    /// Every non-root node in pre-order, paired with its depth below the root
    pub fn walk(&self) -> Vec<(usize, NodeRef<'_>)> {
        let mut out = Vec::new();
        walk_entries(&self.root.children, 0, &mut out);
        out
    }

    /// First node (pre-order) whose name matches, case-insensitively
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.walk()
            .into_iter()
            .find(|(_, node)| node.name().eq_ignore_ascii_case(name))
            .map(|(_, node)| node.id())
    }

    /// Sets `enabled` on a node and keeps the rest of the tree consistent.
    ///
    /// Descendants take the same value. Each ancestor below the root is then
    /// recomputed as "at least one child enabled".
    pub fn set_enabled(&mut self, id: NodeId, value: bool) -> Result<()> {
        match self.get_mut(id) {
            None => return Err(Error::NotFound(format!("node {id}"))),
            Some(NodeMut::Root(root)) => {
                for child in &mut root.children {
                    child.set_enabled_recursive(value);
                }
            }
            Some(NodeMut::Category(category)) => {
                category.enabled = value;
                for child in &mut category.children {
                    child.set_enabled_recursive(value);
                }
            }
            Some(NodeMut::Rule(rule)) => rule.set_enabled_recursive(value),
            Some(NodeMut::Item(item)) => item.enabled = value,
        }

        let root_id = self.root.id;
        for ancestor in self.ancestors(id) {
            if ancestor == root_id {
                break;
            }
            match self.get_mut(ancestor) {
                Some(NodeMut::Category(category)) => {
                    category.enabled = category.children.iter().any(Entry::enabled);
                }
                Some(NodeMut::Rule(rule)) => {
                    rule.enabled = rule.bases.iter().any(|b| b.enabled);
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn children_of_mut(&mut self, parent: NodeId) -> Result<&mut Vec<Entry>> {
        match self.get_mut(parent) {
            Some(NodeMut::Root(root)) => Ok(&mut root.children),
            Some(NodeMut::Category(category)) => Ok(&mut category.children),
            Some(_) => Err(Error::validation(
                "parent",
                format!("{parent} cannot hold rules or categories"),
            )),
            None => Err(Error::NotFound(format!("parent {parent}"))),
        }
    }

    /// Fails if any of `ids` is already in the document or repeats
    fn ensure_fresh_ids(&self, ids: &[NodeId]) -> Result<()> {
        let mut seen = std::collections::HashSet::with_capacity(ids.len());
        for &id in ids {
            if !seen.insert(id) || self.contains(id) {
                return Err(Error::DuplicateId(id));
            }
        }
        Ok(())
    }

    /// Appends a rule or category to `parent` (the root or a category).
    ///
    /// Every id in the incoming subtree must be new to this document.
    pub fn insert_entry(&mut self, entry: Entry, parent: NodeId) -> Result<()> {
        let mut ids = Vec::new();
        entry.collect_ids(&mut ids);
        self.ensure_fresh_ids(&ids)?;

        let entry_id = entry.id();
        self.children_of_mut(parent)?.push(entry);
        let mut parents = std::mem::take(&mut self.parents);
        if let Some(NodeRef::Category(c)) = self.get(entry_id) {
            index_parents(&c.children, c.id, &mut parents);
        }
        if let Some(NodeRef::Rule(r)) = self.get(entry_id) {
            for base in &r.bases {
                parents.insert(base.id, r.id);
            }
        }
        parents.insert(entry_id, parent);
        self.parents = parents;
        Ok(())
    }

    pub fn insert_rule(&mut self, rule: Rule, parent: NodeId) -> Result<()> {
        self.insert_entry(Entry::Rule(rule), parent)
    }

    /// Detaches a rule or category from its parent and returns it
    pub fn remove_entry(&mut self, id: NodeId) -> Result<Entry> {
        let parent = self
            .parent_of(id)
            .ok_or_else(|| Error::NotFound(format!("entry {id} is not attached")))?;
        let siblings = self.children_of_mut(parent)?;
        let index = siblings
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| Error::NotFound(format!("entry {id} under {parent}")))?;
        let removed = siblings.remove(index);
        // drops links of the whole detached subtree
        self.attach_parents();
        Ok(removed)
    }

    pub fn remove_rule(&mut self, id: NodeId) -> Result<Rule> {
        if self.rule(id).is_none() {
            return Err(Error::NotFound(format!("rule {id}")));
        }
        match self.remove_entry(id)? {
            Entry::Rule(rule) => Ok(rule),
            Entry::Category(_) => Err(Error::Internal(format!("{id} resolved to a category"))),
        }
    }

    /// Moves a rule or category to `index` under `target_parent`.
    ///
    /// A category cannot be moved into itself or one of its descendants.
    pub fn move_entry(&mut self, id: NodeId, target_parent: NodeId, index: usize) -> Result<()> {
        if let Some(NodeRef::Category(c)) = self.get(id)
            && (c.id == target_parent || c.children.iter().any(|e| e.contains(target_parent)))
        {
            return Err(Error::validation(
                "target",
                "cannot move a category into itself",
            ));
        }
        // validate the target before detaching anything
        self.children_of_mut(target_parent)?;
        let entry = self.remove_entry(id)?;
        let siblings = self.children_of_mut(target_parent)?;
        let index = index.min(siblings.len());
        siblings.insert(index, entry);
        self.attach_parents();
        Ok(())
    }

    /// Moves an item base from one rule into another at `index`.
    ///
    /// Returns `Ok(false)` without touching the tree if the item is not in
    /// `source_rule`. Missing rules are an error.
    pub fn move_item(
        &mut self,
        item_id: NodeId,
        index: usize,
        source_rule: NodeId,
        target_rule: NodeId,
    ) -> Result<bool> {
        if self.rule(target_rule).is_none() {
            return Err(Error::NotFound(format!("rule {target_rule}")));
        }
        let source = self.require_rule_mut(source_rule)?;
        let Some(position) = source.bases.iter().position(|b| b.id == item_id) else {
            return Ok(false);
        };
        let item = source.bases.remove(position);
        let target = self.require_rule_mut(target_rule)?;
        let index = index.min(target.bases.len());
        target.bases.insert(index, item);
        self.parents.insert(item_id, target_rule);
        Ok(true)
    }

    /// Appends an item base to a rule. The item id must be new to this document.
    pub fn add_base(&mut self, rule_id: NodeId, item: Item) -> Result<()> {
        let item_id = item.id;
        self.ensure_fresh_ids(&[item_id])?;
        self.require_rule_mut(rule_id)?.bases.push(item);
        self.parents.insert(item_id, rule_id);
        Ok(())
    }

    /// Removes an item base from whichever rule owns it
    pub fn remove_base(&mut self, item_id: NodeId) -> Result<Item> {
        let rule_id = self
            .parent_of(item_id)
            .ok_or_else(|| Error::NotFound(format!("item {item_id}")))?;
        let rule = self.require_rule_mut(rule_id)?;
        let position = rule
            .bases
            .iter()
            .position(|b| b.id == item_id)
            .ok_or_else(|| Error::NotFound(format!("item {item_id} in rule {rule_id}")))?;
        let item = rule.bases.remove(position);
        self.parents.remove(&item_id);
        Ok(item)
    }

    /// Renames any non-root node
    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        match self.get_mut(id) {
            Some(NodeMut::Category(c)) => c.name = name,
            Some(NodeMut::Rule(r)) => r.name = name,
            Some(NodeMut::Item(i)) => i.name = name,
            Some(NodeMut::Root(_)) => {
                return Err(Error::validation("id", "the root has no name"));
            }
            None => return Err(Error::NotFound(format!("node {id}"))),
        }
        Ok(())
    }

    /// Snapshot of the persisted form used for structural diffing
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.root)?)
    }

    /// Replaces the document with a persisted form and rebuilds parent links
    pub fn replace_from_value(&mut self, value: serde_json::Value) -> Result<()> {
        self.root = serde_json::from_value(value)?;
        self.attach_parents();
        Ok(())
    }

    /// Number of non-root nodes
    pub fn len(&self) -> usize {
        self.walk().len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_helpers::{belt_rule, sample_tree};

    #[test]
    fn test_attach_parents_links_every_node() {
        let (tree, ids) = sample_tree();
        assert_eq!(tree.parent_of(ids.category), Some(tree.root().id));
        assert_eq!(tree.parent_of(ids.belts), Some(ids.category));
        assert_eq!(tree.parent_of(ids.leather), Some(ids.belts));
        assert_eq!(tree.parent_of(tree.root().id), None);
    }

    #[test]
    fn test_detach_then_attach_restores_links() {
        let (mut tree, ids) = sample_tree();
        tree.detach_parents();
        assert_eq!(tree.parent_of(ids.leather), None);
        tree.attach_parents();
        assert_eq!(tree.parent_of(ids.leather), Some(ids.belts));
    }

    #[test]
    fn test_serialized_form_has_no_parent_field() {
        let (tree, _) = sample_tree();
        let json = serde_json::to_string(&tree).unwrap();
        assert!(!json.contains("parent"));

        let restored: RuleTree = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, tree);
        let belts = restored.rules()[0].id;
        let leather = restored.rules()[0].bases[0].id;
        assert_eq!(restored.parent_of(leather), Some(belts));
    }

    #[test]
    fn test_disable_rule_disables_bases() {
        let (mut tree, ids) = sample_tree();
        tree.set_enabled(ids.belts, false).unwrap();

        let rule = tree.rule(ids.belts).unwrap();
        assert!(!rule.enabled);
        assert!(rule.bases.iter().all(|b| !b.enabled));
    }

    #[test]
    fn test_enable_one_base_reenables_rule_and_category() {
        let (mut tree, ids) = sample_tree();
        tree.set_enabled(ids.category, false).unwrap();
        assert!(!tree.get(ids.category).unwrap().enabled());

        tree.set_enabled(ids.leather, true).unwrap();
        assert!(tree.rule(ids.belts).unwrap().enabled);
        assert!(tree.get(ids.category).unwrap().enabled());
        assert!(!tree.item(ids.chain).unwrap().enabled);
    }

    #[test]
    fn test_disable_all_bases_disables_rule() {
        let (mut tree, ids) = sample_tree();
        tree.set_enabled(ids.leather, false).unwrap();
        assert!(tree.rule(ids.belts).unwrap().enabled);
        tree.set_enabled(ids.chain, false).unwrap();
        assert!(!tree.rule(ids.belts).unwrap().enabled);
    }

    #[test]
    fn test_set_enabled_unknown_id() {
        let (mut tree, _) = sample_tree();
        let result = tree.set_enabled(new_id(), false);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_move_item_between_rules() {
        let (mut tree, ids) = sample_tree();
        let other = belt_rule("Other", &[]);
        let other_id = other.id;
        tree.insert_rule(other, ids.category).unwrap();

        assert!(tree.move_item(ids.chain, 0, ids.belts, other_id).unwrap());
        assert_eq!(tree.rule(ids.belts).unwrap().bases.len(), 1);
        assert_eq!(tree.rule(other_id).unwrap().bases[0].id, ids.chain);
        assert_eq!(tree.parent_of(ids.chain), Some(other_id));
    }

    #[test]
    fn test_move_item_missing_is_noop() {
        let (mut tree, ids) = sample_tree();
        let before = tree.clone();
        assert!(!tree.move_item(new_id(), 0, ids.belts, ids.belts).unwrap());
        assert_eq!(tree, before);
    }

    #[test]
    fn test_move_item_clamps_index() {
        let (mut tree, ids) = sample_tree();
        assert!(tree.move_item(ids.leather, 99, ids.belts, ids.belts).unwrap());
        let names: Vec<_> = tree.rule(ids.belts).unwrap().bases.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["Chain Belt", "Leather Belt"]);
    }

    #[test]
    fn test_insert_rule_appends() {
        let (mut tree, ids) = sample_tree();
        let rule = belt_rule("Late", &["Heavy Belt"]);
        let rule_id = rule.id;
        tree.insert_rule(rule, ids.category).unwrap();
        let rules = tree.rules();
        assert_eq!(rules.last().unwrap().id, rule_id);
        assert_eq!(tree.parent_of(rule_id), Some(ids.category));
    }

    #[test]
    fn test_insert_rule_under_rule_rejected() {
        let (mut tree, ids) = sample_tree();
        let result = tree.insert_rule(Rule::new("Nested"), ids.belts);
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_remove_rule_twice_is_not_found() {
        let (mut tree, ids) = sample_tree();
        let removed = tree.remove_rule(ids.belts).unwrap();
        assert_eq!(removed.name, "Belts");
        assert!(matches!(tree.remove_rule(ids.belts), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_move_entry_reorders() {
        let (mut tree, ids) = sample_tree();
        let second = belt_rule("Second", &[]);
        let second_id = second.id;
        tree.insert_rule(second, ids.category).unwrap();

        tree.move_entry(second_id, ids.category, 0).unwrap();
        let order: Vec<_> = tree.rules().iter().map(|r| r.id).collect();
        assert_eq!(order, [second_id, ids.belts]);
    }

    #[test]
    fn test_move_entry_keeps_descendant_links() {
        let (mut tree, ids) = sample_tree();
        let root = tree.root().id;
        tree.move_entry(ids.belts, root, 0).unwrap();
        assert_eq!(tree.parent_of(ids.belts), Some(root));
        assert_eq!(tree.parent_of(ids.leather), Some(ids.belts));
        assert_eq!(tree.parent_of(ids.chain), Some(ids.belts));

        tree.set_enabled(ids.leather, false).unwrap();
        tree.set_enabled(ids.chain, false).unwrap();
        assert!(!tree.rule(ids.belts).unwrap().enabled);
    }

    #[test]
    fn test_move_category_keeps_nested_links() {
        let (mut tree, ids) = sample_tree();
        let outer = Category::new("Outer");
        let outer_id = outer.id;
        tree.insert_entry(outer.into(), tree.root().id).unwrap();

        tree.move_entry(ids.category, outer_id, 0).unwrap();
        assert_eq!(
            tree.ancestors(ids.chain),
            [ids.belts, ids.category, outer_id, tree.root().id]
        );
    }

    #[test]
    fn test_add_base_rejects_existing_id() {
        let (mut tree, ids) = sample_tree();
        let other = belt_rule("Other", &[]);
        let other_id = other.id;
        tree.insert_rule(other, ids.category).unwrap();

        let duplicate = tree.item(ids.leather).unwrap().clone();
        let result = tree.add_base(other_id, duplicate);
        assert!(matches!(result, Err(Error::DuplicateId(id)) if id == ids.leather));
        assert!(tree.rule(other_id).unwrap().bases.is_empty());
        assert_eq!(tree.parent_of(ids.leather), Some(ids.belts));
    }

    #[test]
    fn test_insert_entry_rejects_existing_descendant_id() {
        let (mut tree, ids) = sample_tree();
        let before = tree.clone();

        let mut wrapper = Category::new("Wrapper");
        let mut copied = belt_rule("Copy", &[]);
        copied.bases.push(tree.item(ids.chain).unwrap().clone());
        wrapper.children.push(copied.into());
        let result = tree.insert_entry(wrapper.into(), tree.root().id);
        assert!(matches!(result, Err(Error::DuplicateId(id)) if id == ids.chain));
        assert_eq!(tree, before);
    }

    #[test]
    fn test_insert_entry_rejects_repeated_ids_within_subtree() {
        let mut tree = RuleTree::new();
        let mut rule = belt_rule("Twice", &["Heavy Belt"]);
        rule.bases.push(rule.bases[0].clone());
        let repeated = rule.bases[0].id;
        let result = tree.insert_rule(rule, tree.root().id);
        assert!(matches!(result, Err(Error::DuplicateId(id)) if id == repeated));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_move_category_into_itself_rejected() {
        let (mut tree, ids) = sample_tree();
        let result = tree.move_entry(ids.category, ids.category, 0);
        assert!(result.is_err());
        assert!(tree.contains(ids.category));
    }

    #[test]
    fn test_ids_sort_in_creation_order() {
        let a = new_id();
        let b = new_id();
        assert!(a < b);
    }

    #[test]
    fn test_walk_reports_depth() {
        let (tree, ids) = sample_tree();
        let walked = tree.walk();
        assert_eq!(walked[0].0, 0);
        assert_eq!(walked[0].1.id(), ids.category);
        assert_eq!(walked[1].1.kind(), NodeKind::Rule);
        assert_eq!(walked[2].0, 2);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_find_by_name_is_case_insensitive() {
        let (tree, ids) = sample_tree();
        assert_eq!(tree.find_by_name("leather belt"), Some(ids.leather));
        assert_eq!(tree.find_by_name("Missing"), None);
    }
}
