//! Filter language codec
//!
//! - [`serialize`]: rule tree to filter text
//! - [`import`]: filter text to a fresh rule tree
//! - [`condition`] / [`action`]: the per-line grammar shared by both
//! - [`lexer`]: value tokenizer (quoted strings, trailing comments)
//!
//! Both directions are pure functions over their input and may run
//! concurrently on different documents.

pub mod action;
pub mod condition;
pub mod import;
pub mod lexer;
pub mod serialize;

pub use import::{ImportOutcome, import};
pub use serialize::serialize;
