//! Filter conditions
//!
//! A condition line is `<Property> [<operator>] <value...>`. Known properties
//! are listed in [`ConditionKind`], which also fixes the order they are
//! emitted in. Properties the editor does not know are kept verbatim under
//! their own name and emitted after the known ones.

use crate::codec::lexer::Token;
use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use strum::IntoEnumIterator;

/// Comparison operator. The exact spelling read on import is kept.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
pub enum Operator {
    #[serde(rename = "==")]
    #[strum(serialize = "==")]
    Exact,
    #[serde(rename = "=")]
    #[strum(serialize = "=")]
    Eq,
    #[serde(rename = "!")]
    #[strum(serialize = "!")]
    Not,
    #[serde(rename = "!=")]
    #[strum(serialize = "!=")]
    NotEq,
    #[serde(rename = "<")]
    #[strum(serialize = "<")]
    Lt,
    #[serde(rename = "<=")]
    #[strum(serialize = "<=")]
    Lte,
    #[serde(rename = ">")]
    #[strum(serialize = ">")]
    Gt,
    #[serde(rename = ">=")]
    #[strum(serialize = ">=")]
    Gte,
}

/// Known condition properties, in emission order.
///
/// `BaseType` is absent on purpose: a rule's bases are emitted from its item
/// children, not from its condition map.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
pub enum ConditionKind {
    Class,
    Height,
    Width,
    AreaLevel,
    DropLevel,
    StackSize,
    Quality,
    GemLevel,
    MapTier,
    WaystoneTier,
    TransfiguredGem,
    AlternateQuality,
    ElderMap,
    ShapedMap,
    BlightedMap,
    UberBlightedMap,
    HasImplicitMod,
    Identified,
    Scourged,
    FracturedItem,
    Mirrored,
    Corrupted,
    SynthesisedItem,
    Replica,
    HasCruciblePassiveTree,
    ItemLevel,
    BaseDefencePercentile,
    BaseArmour,
    BaseEvasion,
    BaseEnergyShield,
    BaseWard,
    CorruptedMods,
    Rarity,
    AnyEnchantment,
    HasExplicitMod,
    HasEnchantment,
    ArchnemesisMod,
    EnchantmentPassiveNode,
    EnchantmentPassiveNum,
    HasSearingExarchImplicit,
    HasEaterOfWorldsImplicit,
    HasInfluence,
    LinkedSockets,
    SocketGroup,
    Sockets,
}

/// Name of the condition whose values become item children on import
pub const BASE_TYPE: &str = "BaseType";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Bool(bool),
    Number(f64),
    /// Unquoted text, emitted as-is (`Rarity Normal Magic`, `SocketGroup RGB`)
    Text(String),
    /// Quoted strings (`"Leather Belt" "Chain Belt"`)
    List(Vec<String>),
}

impl ConditionValue {
    /// Coerces raw value tokens.
    ///
    /// A single token reading `True`/`False` is a boolean and a single
    /// numeric token is a number, quoted or not. Otherwise any quoted token
    /// makes the value a list; all-bare tokens are kept as text.
    pub fn from_tokens(tokens: &[Token<'_>]) -> Self {
        if let [token] = tokens {
            match token.text {
                "True" => return Self::Bool(true),
                "False" => return Self::Bool(false),
                text => {
                    if let Ok(number) = text.parse::<f64>()
                        && number.is_finite()
                    {
                        return Self::Number(number);
                    }
                }
            }
        }
        if tokens.iter().any(|t| t.quoted) {
            Self::List(tokens.iter().map(|t| t.text.to_string()).collect())
        } else {
            Self::Text(
                tokens
                    .iter()
                    .map(|t| t.text)
                    .collect::<Vec<_>>()
                    .join(" "),
            )
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            Self::Bool(true) => out.push_str("True"),
            Self::Bool(false) => out.push_str("False"),
            Self::Number(n) => {
                let _ = write!(out, "{}", n.round() as i64);
            }
            Self::Text(text) => out.push_str(text),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    let _ = write!(out, "\"{item}\"");
                }
            }
        }
    }

    /// An empty list or text has nothing to match against and is not emitted
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Bool(_) | Self::Number(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,
    pub value: ConditionValue,
}

impl Condition {
    pub fn new(operator: Option<Operator>, value: ConditionValue) -> Self {
        Self { operator, value }
    }

    pub fn list<I, S>(operator: Option<Operator>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            operator,
            ConditionValue::List(items.into_iter().map(Into::into).collect()),
        )
    }

    pub fn number(operator: Operator, value: f64) -> Self {
        Self::new(Some(operator), ConditionValue::Number(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(None, ConditionValue::Bool(value))
    }

    /// Renders one condition line (without indentation)
    pub fn to_line(&self, name: &str) -> String {
        let mut line = String::from(name);
        if let Some(op) = self.operator {
            line.push(' ');
            line.push_str(op.as_ref());
        }
        line.push(' ');
        self.value.render(&mut line);
        line
    }

    /// Parses a tokenized condition line into its property name and value
    pub fn parse(tokens: &[Token<'_>], line_no: usize) -> Result<(String, Self)> {
        let Some((name, rest)) = tokens.split_first() else {
            return Err(Error::parse(line_no, "empty condition"));
        };
        if name.quoted {
            return Err(Error::parse(line_no, "condition name cannot be quoted"));
        }

        let (operator, values) = match rest.split_first() {
            Some((first, values)) if !first.quoted => match first.text.parse::<Operator>() {
                Ok(op) => (Some(op), values),
                Err(_) => (None, rest),
            },
            _ => (None, rest),
        };
        if values.is_empty() {
            return Err(Error::parse(
                line_no,
                format!("condition '{}' has no value", name.text),
            ));
        }

        Ok((
            name.text.to_string(),
            Self::new(operator, ConditionValue::from_tokens(values)),
        ))
    }
}

/// Rule conditions keyed by property name.
///
/// A property may appear more than once in a block (`ItemLevel >= 60` and
/// `ItemLevel < 75`), so each name maps to its conditions in insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conditions(BTreeMap<String, Vec<Condition>>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&[Condition]> {
        self.0.get(name).map(Vec::as_slice)
    }

    /// First condition for `name`
    pub fn first(&self, name: &str) -> Option<&Condition> {
        self.get(name).and_then(<[Condition]>::first)
    }

    /// Replaces every condition for `name`; `None` removes the property
    pub fn set(&mut self, name: impl Into<String>, condition: Option<Condition>) {
        let name = name.into();
        match condition {
            Some(condition) => {
                self.0.insert(name, vec![condition]);
            }
            None => {
                self.0.remove(&name);
            }
        }
    }

    /// Adds a condition after any existing ones for `name`
    pub fn push(&mut self, name: impl Into<String>, condition: Condition) {
        self.0.entry(name.into()).or_default().push(condition);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<Condition>> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.0
            .iter()
            .flat_map(|(name, list)| list.iter().map(move |c| (name.as_str(), c)))
    }

    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders every condition line in emission order.
    ///
    /// Known properties come first in [`ConditionKind`] order, then unknown
    /// ones alphabetically. `BaseType` entries and empty values are skipped.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut emit = |name: &str, list: &[Condition]| {
            for condition in list.iter().filter(|c| !c.value.is_empty()) {
                lines.push(condition.to_line(name));
            }
        };

        for kind in ConditionKind::iter() {
            if let Some(list) = self.0.get(kind.as_ref()) {
                emit(kind.as_ref(), list);
            }
        }
        for (name, list) in &self.0 {
            if name == BASE_TYPE || name.parse::<ConditionKind>().is_ok() {
                continue;
            }
            emit(name, list);
        }
        lines
    }
}
