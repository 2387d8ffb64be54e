//! lootrule - loot filter rule-tree editor core
//!
//! Edits item filters for a loot-filtering game client as a hierarchical rule
//! tree with full undo/redo, and converts between that tree and the client's
//! filter text format.
//!
//! # Architecture
//!
//! - [`core`] - Rule tree, patch model, filter facade, item catalog, storage
//! - [`command`] - Reversible commands and the undo/redo history
//! - [`codec`] - Filter text serializer and importer
//! - [`validators`] - Value range checks and comment sanitization
//! - [`config`] - Configuration persistence
//! - [`utils`] - Utility functions (XDG directories)
//!
//! # Example
//!
//! ```
//! use lootrule::command::SetEntryActive;
//! use lootrule::core::catalog::ItemCatalog;
//! use lootrule::Filter;
//!
//! let text = "# Belts\nShow\n  BaseType == \"Leather Belt\" \"Chain Belt\"\n";
//! let (mut filter, diagnostics) = Filter::from_import("belts", text, ItemCatalog::builtin());
//! assert!(diagnostics.is_empty());
//!
//! let rule_id = filter.rules().find_by_name("Belts").unwrap();
//! filter.execute(&SetEntryActive::new(rule_id, false)).unwrap();
//! assert_eq!(filter.serialize(), "");
//!
//! filter.undo().unwrap();
//! assert!(filter.serialize().contains("BaseType == \"Leather Belt\" \"Chain Belt\""));
//! ```

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]

pub mod codec;
pub mod command;
pub mod config;
pub mod core;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use core::error::{Error, Result};
pub use core::filter::Filter;
pub use core::tree::RuleTree;
