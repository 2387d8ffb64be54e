//! Document core
//!
//! This module contains the filter document and everything needed to edit
//! and persist it:
//!
//! - [`tree`]: rule tree (root, categories, rules, item bases) and its invariants
//! - [`patch`]: structural diff/patch model backing undo/redo
//! - [`filter`]: the [`filter::Filter`] facade (document + history)
//! - [`catalog`]: static item-base table used to resolve imported names
//! - [`storage`]: filter document persistence
//! - [`error`]: error types

pub mod catalog;
pub mod error;
pub mod filter;
pub mod patch;
pub mod storage;
pub mod tree;

#[cfg(test)]
pub mod test_helpers;

#[cfg(test)]
mod tests;
