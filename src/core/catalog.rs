//! Static item-base table
//!
//! The importer resolves every `BaseType` name against this table. Lookups
//! are exact but case-insensitive; there is no fuzzy matching. A default
//! table ships with the crate as `data/items.json`.

use crate::core::error::Result;
use crate::core::tree::Item;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

const BUILTIN_ITEMS: &str = include_str!("../../data/items.json");

/// Item class whose bases are never written to a `BaseType` line
pub const PINNACLE_KEYS: &str = "Pinnacle Keys";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    /// Underlying base, when `name` is a variant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    pub item_class: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl CatalogItem {
    /// Fresh tree item carrying this entry's display data
    pub fn to_item(&self) -> Item {
        let mut item = Item::new(self.name.clone());
        item.icon.clone_from(&self.icon);
        item.value = self.value;
        item.item_class = Some(self.item_class.clone());
        item
    }
}

#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    items: Vec<CatalogItem>,
    by_name: HashMap<String, usize>,
}

impl ItemCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        let mut by_name = HashMap::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            // first entry wins on duplicate names
            by_name.entry(item.name.to_lowercase()).or_insert(index);
        }
        Self { items, by_name }
    }

    /// Parses a JSON array of catalog entries
    pub fn from_json(json: &str) -> Result<Self> {
        let items: Vec<CatalogItem> = serde_json::from_str(json)?;
        Ok(Self::new(items))
    }

    /// The table bundled with the crate.
    ///
    /// Parsed once per process. A corrupt bundle yields an empty catalog
    /// (every imported base is then reported as unknown) rather than a panic.
    pub fn builtin() -> &'static ItemCatalog {
        static CATALOG: OnceLock<ItemCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| {
            Self::from_json(BUILTIN_ITEMS).unwrap_or_else(|e| {
                tracing::error!("Bundled item catalog is invalid: {e}");
                Self::default()
            })
        })
    }

    /// Case-insensitive exact lookup
    pub fn resolve(&self, name: &str) -> Option<&CatalogItem> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|&index| &self.items[index])
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
