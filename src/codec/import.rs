//! Filter text to tree
//!
//! The importer is lenient. A line it cannot read is reported and skipped,
//! and an unknown `BaseType` name is reported and dropped. Neither aborts
//! the import. Every imported rule is placed directly under the root.
//!
//! Rule names come from, in order of preference:
//!
//! 1. the last section header (`# [[1200]] Currency`) seen so far
//! 2. the last free comment line before the block
//! 3. the trailing comment on the block keyword line (`Show # Divines`)
//! 4. `"Imported"`
//!
//! Once a section header has been seen, free comments no longer name rules.

use crate::codec::action::is_action_keyword;
use crate::codec::condition::{BASE_TYPE, Condition, ConditionValue};
use crate::codec::lexer::{split_comment, tokenize};
use crate::core::catalog::ItemCatalog;
use crate::core::error::Error;
use crate::core::tree::{Block, Entry, Item, Root, Rule, RuleTree};
use std::collections::HashSet;

/// Name given to rules that carry no comment at all
pub const DEFAULT_RULE_NAME: &str = "Imported";

/// Result of an import: the new document plus everything that was skipped
#[derive(Debug)]
pub struct ImportOutcome {
    pub tree: RuleTree,
    /// `Parse` and `UnknownItemBase` errors, in line order
    pub diagnostics: Vec<Error>,
}

impl ImportOutcome {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Legacy class names and the classes that replaced them
const CLASS_ALIASES: &[(&str, &[&str])] = &[
    ("Logbook", &["Expedition Logbooks"]),
    ("Jewel", &["Jewels"]),
    ("Currency", &["Stackable Currency"]),
    ("Flasks", &["Life Flasks", "Mana Flasks"]),
];

/// Parses `# [n] title` / `# [[n]] title` into `[n] title`
fn section_header(line: &str) -> Option<String> {
    let rest = line.strip_prefix('#')?.trim_start();
    let opened = rest.len() - rest.trim_start_matches('[').len();
    if !(1..=2).contains(&opened) {
        return None;
    }
    let rest = &rest[opened..];
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let (number, rest) = rest.split_at(digits);
    let closed = rest.len() - rest.trim_start_matches(']').len();
    if !(1..=2).contains(&closed) {
        return None;
    }
    let title = rest[closed..].trim();
    if title.is_empty() {
        return None;
    }
    Some(format!("[{number}] {title}"))
}

/// `# Show` and friends: a block that was commented out
fn is_commented_block(comment: &str) -> bool {
    comment
        .split_whitespace()
        .next()
        .is_some_and(|word| word.parse::<Block>().is_ok())
}

/// Marks a rule-name comment that would otherwise read as a section header
/// or a commented-out block
const NAME_ESCAPE: char = '\\';

/// Comment body naming a rule, escaped so import reads it back as that name
pub(crate) fn escape_rule_name(name: &str) -> String {
    if name.starts_with(NAME_ESCAPE)
        || is_commented_block(name)
        || section_header(&format!("#{name}")).is_some()
    {
        format!("{NAME_ESCAPE}{name}")
    } else {
        name.to_string()
    }
}

fn unescape_rule_name(comment: &str) -> &str {
    comment.strip_prefix(NAME_ESCAPE).unwrap_or(comment)
}

fn value_names(value: ConditionValue) -> Vec<String> {
    match value {
        ConditionValue::List(names) => names,
        ConditionValue::Text(text) => text.split_whitespace().map(str::to_string).collect(),
        ConditionValue::Number(n) => vec![n.to_string()],
        ConditionValue::Bool(b) => vec![if b { "True" } else { "False" }.to_string()],
    }
}

fn normalize_condition(name: &str, condition: &mut Condition) {
    match (name, &mut condition.value) {
        ("Class", ConditionValue::List(classes)) => {
            let mut normalized: Vec<String> = Vec::with_capacity(classes.len());
            for class in classes.drain(..) {
                match CLASS_ALIASES.iter().find(|(legacy, _)| *legacy == class) {
                    Some((_, replacements)) => {
                        normalized.extend(replacements.iter().map(|r| (*r).to_string()));
                    }
                    None => normalized.push(class),
                }
            }
            *classes = normalized;
        }
        ("Rarity", ConditionValue::List(rarities)) if rarities.len() == 1 => {
            let words: Vec<String> = rarities[0].split_whitespace().map(str::to_string).collect();
            *rarities = words;
        }
        _ => {}
    }
}

/// A block being read
struct PendingRule {
    rule: Rule,
    seen_bases: HashSet<String>,
}

impl PendingRule {
    fn new(name: String, block: Block) -> Self {
        let mut rule = Rule::new(name);
        rule.block = block;
        Self {
            rule,
            seen_bases: HashSet::new(),
        }
    }

    fn add_bases(&mut self, names: Vec<String>, catalog: &ItemCatalog, diagnostics: &mut Vec<Error>) {
        for name in names {
            match catalog.resolve(&name) {
                Some(entry) => {
                    if self.seen_bases.insert(entry.name.to_lowercase()) {
                        self.rule.bases.push(entry.to_item());
                    }
                }
                None => {
                    tracing::debug!("Dropping unknown item base '{name}' from '{}'", self.rule.name);
                    diagnostics.push(Error::UnknownItemBase(name));
                }
            }
        }
    }
}

/// Parses filter text into a fresh document.
///
/// Pure and re-entrant; the catalog is only read.
pub fn import(text: &str, catalog: &ItemCatalog) -> ImportOutcome {
    let mut diagnostics = Vec::new();
    let mut rules: Vec<Rule> = Vec::new();
    let mut current: Option<PendingRule> = None;
    let mut section: Option<String> = None;
    let mut comment: Option<String> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("#====") || line.starts_with("#----") {
            continue;
        }

        if let Some(header) = section_header(line) {
            section = Some(header);
            continue;
        }

        if let Some(body) = line.strip_prefix('#') {
            let body = body.trim();
            if !is_commented_block(body) && section.is_none() {
                comment = Some(unescape_rule_name(body).to_string());
            }
            continue;
        }

        let (content, trailing) = split_comment(line);

        if let Ok(block) = content.parse::<Block>() {
            if let Some(done) = current.take() {
                rules.push(done.rule);
            }
            let name = section
                .clone()
                .or_else(|| comment.take())
                .or_else(|| trailing.filter(|t| !t.is_empty()).map(str::to_string))
                .unwrap_or_else(|| DEFAULT_RULE_NAME.to_string());
            comment = None;
            current = Some(PendingRule::new(name, block));
            continue;
        }

        let Some(pending) = current.as_mut() else {
            tracing::warn!("Line {line_no}: '{content}' appears before any block, skipping");
            diagnostics.push(Error::parse(line_no, "line outside of a block"));
            continue;
        };

        if content == "Continue" {
            pending.rule.continue_matching = true;
            continue;
        }

        let tokens = match tokenize(content, line_no) {
            Ok(tokens) if !tokens.is_empty() => tokens,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!("Skipping line: {e}");
                diagnostics.push(e);
                continue;
            }
        };

        if is_action_keyword(tokens[0].text) {
            if let Err(e) = pending.rule.actions.apply_line(&tokens, line_no) {
                tracing::warn!("Skipping action: {e}");
                diagnostics.push(e);
            }
            continue;
        }

        match Condition::parse(&tokens, line_no) {
            Ok((name, condition)) if name == BASE_TYPE => {
                pending.add_bases(value_names(condition.value), catalog, &mut diagnostics);
            }
            Ok((name, mut condition)) => {
                normalize_condition(&name, &mut condition);
                pending.rule.conditions.push(name, condition);
            }
            Err(e) => {
                tracing::warn!("Skipping condition: {e}");
                diagnostics.push(e);
            }
        }
    }

    if let Some(done) = current.take() {
        rules.push(done.rule);
    }

    let unknown = diagnostics
        .iter()
        .filter(|e| matches!(e, Error::UnknownItemBase(_)))
        .count();
    if unknown > 0 {
        tracing::warn!("Import dropped {unknown} unknown item base(s)");
    }
    tracing::debug!("Imported {} rule(s), {} diagnostic(s)", rules.len(), diagnostics.len());

    let root = Root {
        children: rules.into_iter().map(Entry::Rule).collect(),
        ..Root::default()
    };
    ImportOutcome {
        tree: RuleTree::from_root(root),
        diagnostics,
    }
}

/// Resolves one base name, for callers building rules by hand
pub fn resolve_base(name: &str, catalog: &ItemCatalog) -> Option<Item> {
    catalog.resolve(name).map(|entry| entry.to_item())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::action::Rgba;
    use crate::codec::condition::Operator;
    use crate::core::test_helpers::test_catalog;

    fn run(text: &str) -> ImportOutcome {
        import(text, &test_catalog())
    }

    #[test]
    fn test_basic_block() {
        let outcome = run(
            "Show\n\
             \x20 BaseType == \"Leather Belt\" \"Chain Belt\"\n\
             \x20 ItemLevel >= 82\n\
             \x20 SetTextColor 255 0 0 1\n",
        );
        assert!(outcome.is_clean(), "{:?}", outcome.diagnostics);
        let rules = outcome.tree.rules();
        assert_eq!(rules.len(), 1);
        let rule = rules[0];
        assert_eq!(rule.name, DEFAULT_RULE_NAME);
        assert_eq!(rule.block, Block::Show);
        let names: Vec<_> = rule.bases.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["Leather Belt", "Chain Belt"]);
        assert_eq!(
            rule.conditions.first("ItemLevel"),
            Some(&Condition::number(Operator::Gte, 82.0))
        );
        assert_eq!(rule.actions.text, Some(Rgba::new(255.0, 0.0, 0.0, 255.0)));
        assert_eq!(outcome.tree.parent_of(rule.bases[0].id), Some(rule.id));
    }

    #[test]
    fn test_section_header_names_following_rules() {
        let outcome = run(
            "# [[0100]] Currency\n\
             Show\n\
             Hide\n\
             # [2] Belts\n\
             Minimal\n",
        );
        let names: Vec<_> = outcome.tree.rules().iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, ["[0100] Currency", "[0100] Currency", "[2] Belts"]);
        assert_eq!(outcome.tree.rules()[2].block, Block::Minimal);
    }

    #[test]
    fn test_escaped_names_are_not_headers() {
        assert_eq!(escape_rule_name("[1] A"), "\\[1] A");
        assert_eq!(escape_rule_name("Show me"), "\\Show me");
        assert_eq!(escape_rule_name("Belts"), "Belts");

        let outcome = run("# \\[1] A\nShow\n# B\nShow\n");
        let names: Vec<_> = outcome.tree.rules().iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, ["[1] A", "B"]);
    }

    #[test]
    fn test_comment_names_next_rule_only() {
        let outcome = run("# Divine Orbs\nShow\nShow # trailing name\nShow\n");
        let names: Vec<_> = outcome.tree.rules().iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, ["Divine Orbs", "trailing name", DEFAULT_RULE_NAME]);
    }

    #[test]
    fn test_dividers_and_commented_blocks_ignored() {
        let outcome = run(
            "#==========\n\
             #----------\n\
             # Show\n\
             # Hide # old\n\
             Show\n",
        );
        assert!(outcome.is_clean());
        assert_eq!(outcome.tree.rules()[0].name, DEFAULT_RULE_NAME);
    }

    #[test]
    fn test_continue_marker() {
        let outcome = run("Show\n  SetFontSize 40\n  Continue\n");
        let rule = outcome.tree.rules()[0];
        assert!(rule.continue_matching);
        assert_eq!(rule.actions.font_size, Some(40.0));
    }

    #[test]
    fn test_unknown_bases_dropped_and_reported() {
        let outcome = run("Show\n  BaseType \"Leather Belt\" \"Mystery Belt\"\n");
        let rule = outcome.tree.rules()[0];
        assert_eq!(rule.bases.len(), 1);
        assert!(matches!(
            outcome.diagnostics.as_slice(),
            [Error::UnknownItemBase(name)] if name == "Mystery Belt"
        ));
    }

    #[test]
    fn test_base_type_lines_merge_and_dedupe() {
        let outcome = run(
            "Show\n\
             \x20 BaseType \"Chain Belt\"\n\
             \x20 BaseType == \"chain belt\" \"Heavy Belt\"\n",
        );
        let names: Vec<_> = outcome.tree.rules()[0].bases.iter().map(|b| b.name.clone()).collect();
        assert_eq!(names, ["Chain Belt", "Heavy Belt"]);
    }

    #[test]
    fn test_bad_lines_skipped_import_continues() {
        let outcome = run(
            "Show\n\
             \x20 SetSparkles 1\n\
             \x20 BaseType \"Leather Belt\n\
             \x20 ItemLevel >=\n\
             \x20 SetFontSize 30\n",
        );
        assert_eq!(outcome.diagnostics.len(), 3);
        assert!(outcome.diagnostics.iter().all(|e| matches!(e, Error::Parse { .. })));
        assert_eq!(outcome.tree.rules()[0].actions.font_size, Some(30.0));
    }

    #[test]
    fn test_line_before_first_block() {
        let outcome = run("ItemLevel > 1\nShow\n");
        assert!(matches!(outcome.diagnostics[0], Error::Parse { line: 1, .. }));
        assert_eq!(outcome.tree.rules().len(), 1);
    }

    #[test]
    fn test_unknown_conditions_preserved() {
        let outcome = run("Show\n  ZanaMemory True\n  SocketGroup >= 5GGG\n");
        let rule = outcome.tree.rules()[0];
        assert_eq!(rule.conditions.first("ZanaMemory"), Some(&Condition::boolean(true)));
        assert_eq!(
            rule.conditions.first("SocketGroup").unwrap().to_line("SocketGroup"),
            "SocketGroup >= 5GGG"
        );
    }

    #[test]
    fn test_legacy_class_names_normalized() {
        let outcome = run("Show\n  Class \"Currency\" \"Flasks\" \"Belts\"\n");
        let class = outcome.tree.rules()[0].conditions.first("Class").unwrap();
        assert_eq!(
            class.value,
            ConditionValue::List(vec![
                "Stackable Currency".into(),
                "Life Flasks".into(),
                "Mana Flasks".into(),
                "Belts".into(),
            ])
        );
    }

    #[test]
    fn test_rarity_single_quoted_group_split() {
        let outcome = run("Show\n  Rarity \"Normal Magic\"\n");
        let rarity = outcome.tree.rules()[0].conditions.first("Rarity").unwrap();
        assert_eq!(
            rarity.value,
            ConditionValue::List(vec!["Normal".into(), "Magic".into()])
        );
    }

    #[test]
    fn test_crlf_and_indentation_tolerated() {
        let outcome = run("Show\r\n\t\tItemLevel >= 1\r\n");
        assert!(outcome.is_clean());
        assert!(outcome.tree.rules()[0].conditions.contains("ItemLevel"));
    }

    #[test]
    fn test_section_header_parsing() {
        assert_eq!(section_header("# [[1200]] Currency - Top"), Some("[1200] Currency - Top".into()));
        assert_eq!(section_header("#[3]Belts"), Some("[3] Belts".into()));
        assert_eq!(section_header("# [[[1]]] Too many"), None);
        assert_eq!(section_header("# [x] Not a number"), None);
        assert_eq!(section_header("# [1]"), None);
    }

    #[test]
    fn test_resolve_base() {
        let catalog = test_catalog();
        assert_eq!(resolve_base("heavy belt", &catalog).unwrap().name, "Heavy Belt");
        assert!(resolve_base("heavy", &catalog).is_none());
    }
}
