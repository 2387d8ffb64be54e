//! Tree to filter text
//!
//! Each enabled rule becomes one block:
//!
//! ```text
//! # Belts
//! Show
//!   BaseType == "Leather Belt" "Chain Belt"
//!   ItemLevel >= 82
//!   SetTextColor 255 0 0 1
//!   Continue
//!
//! ```
//!
//! Rules are visited depth-first in child order, which is match priority in
//! game. Disabled categories hide their whole subtree.

use crate::codec::condition::{BASE_TYPE, Condition, Operator};
use crate::codec::import::escape_rule_name;
use crate::core::catalog::PINNACLE_KEYS;
use crate::core::tree::{Entry, Rule, RuleTree};
use crate::validators::sanitize_comment;
use std::collections::HashSet;
use std::fmt::Write as _;

const INDENT: &str = "  ";

/// Renders the whole document. Pure; does not touch history.
pub fn serialize(tree: &RuleTree) -> String {
    let mut out = String::new();
    write_entries(&tree.root().children, &mut out);
    out
}

fn write_entries(entries: &[Entry], out: &mut String) {
    for entry in entries.iter().filter(|e| e.enabled()) {
        match entry {
            Entry::Category(category) => write_entries(&category.children, out),
            Entry::Rule(rule) => {
                if let Some(block) = rule_block(rule) {
                    out.push_str(&block);
                }
            }
        }
    }
}

/// `BaseType` condition for a rule's enabled bases.
///
/// `None` when nothing should be emitted: the rule has no enabled bases, or
/// one of its bases is a pinnacle key (those cannot be filtered by base).
pub fn base_type_condition(rule: &Rule) -> Option<Condition> {
    if rule
        .bases
        .iter()
        .any(|b| b.item_class.as_deref() == Some(PINNACLE_KEYS))
    {
        return None;
    }
    let mut seen = HashSet::new();
    let names: Vec<&str> = rule
        .bases
        .iter()
        .filter(|b| b.enabled && seen.insert(b.name.as_str()))
        .map(|b| b.name.as_str())
        .collect();
    if names.is_empty() {
        return None;
    }
    Some(Condition::list(Some(Operator::Exact), names))
}

/// Renders one rule as a text block, or `None` if it must not be emitted.
///
/// A disabled rule is skipped. So is a rule that has bases but none enabled:
/// without its `BaseType` line it would match every item.
pub fn rule_block(rule: &Rule) -> Option<String> {
    if !rule.enabled {
        return None;
    }
    if !rule.bases.is_empty() && rule.bases.iter().all(|b| !b.enabled) {
        return None;
    }

    let mut block = String::new();
    let _ = writeln!(block, "# {}", escape_rule_name(&sanitize_comment(&rule.name)));
    let _ = writeln!(block, "{}", rule.block);
    if let Some(bases) = base_type_condition(rule) {
        let _ = writeln!(block, "{INDENT}{}", bases.to_line(BASE_TYPE));
    }
    for line in rule.conditions.lines() {
        let _ = writeln!(block, "{INDENT}{line}");
    }
    for line in rule.actions.lines() {
        let _ = writeln!(block, "{INDENT}{line}");
    }
    if rule.continue_matching {
        let _ = writeln!(block, "{INDENT}Continue");
    }
    block.push('\n');
    Some(block)
}
