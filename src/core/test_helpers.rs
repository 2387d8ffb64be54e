//! Shared test utilities for core module tests
//!
//! Provides common test helpers to avoid duplication across test suites.
//! This module is only compiled in test mode.

use crate::core::catalog::ItemCatalog;
use crate::core::tree::{Category, Item, NodeId, Rule, RuleTree};

/// Ids of the nodes built by [`sample_tree`]
#[derive(Debug, Clone, Copy)]
pub struct SampleIds {
    pub category: NodeId,
    pub belts: NodeId,
    pub leather: NodeId,
    pub chain: NodeId,
}

/// Creates a rule with one enabled item per base name.
pub fn belt_rule(name: &str, bases: &[&str]) -> Rule {
    let mut rule = Rule::new(name);
    rule.bases = bases.iter().map(|b| Item::new(*b)).collect();
    rule
}

/// Creates the canonical test document:
///
/// ```text
/// root
/// └── Accessories (category)
///     └── Belts (rule)
///         ├── Leather Belt
///         └── Chain Belt
/// ```
///
/// Use this instead of building trees manually in tests.
pub fn sample_tree() -> (RuleTree, SampleIds) {
    let mut tree = RuleTree::new();
    let category = Category::new("Accessories");
    let category_id = category.id;
    tree.insert_entry(category.into(), tree.root().id)
        .expect("root accepts categories");

    let rule = belt_rule("Belts", &["Leather Belt", "Chain Belt"]);
    let ids = SampleIds {
        category: category_id,
        belts: rule.id,
        leather: rule.bases[0].id,
        chain: rule.bases[1].id,
    };
    tree.insert_rule(rule, category_id)
        .expect("category accepts rules");
    (tree, ids)
}

/// Small catalog covering the bases used across codec tests
pub fn test_catalog() -> ItemCatalog {
    ItemCatalog::from_json(
        r#"[
            {"name": "Leather Belt", "item_class": "Belts", "category": "Accessories"},
            {"name": "Chain Belt", "item_class": "Belts", "category": "Accessories"},
            {"name": "Heavy Belt", "item_class": "Belts", "category": "Accessories"},
            {"name": "Divine Orb", "item_class": "Stackable Currency", "category": "Currency", "value": 180.0},
            {"name": "Exalted Orb", "item_class": "Stackable Currency", "category": "Currency"},
            {"name": "Breachstone", "item_class": "Pinnacle Keys", "category": "Fragments"}
        ]"#,
    )
    .expect("test catalog is valid JSON")
}
