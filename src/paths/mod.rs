//! Path identifiers: structured, textual addresses of attributes.
//!
//! - [`component`]: field, index and key accessors
//! - [`quote`]: the `<<...>>` quoted segment form and its escape primitive
//! - [`identifier`]: [`PathIdentifier`] with its total order, formatting and rename operations
//! - [`parse`]: reading the textual form
//! - [`resolve`]: resolution and canonicalization against an [`crate::model::AttributeHost`]

pub mod component;
pub mod identifier;
pub mod parse;
pub mod quote;
pub mod resolve;

pub use component::{Component, ComponentKind};
pub use identifier::{Name, PathIdentifier};
pub use parse::{parse_path, parse_path_prefix};
pub use quote::{
    escape, is_identifier, quote, quote_if_needed, unescape, QUOTE_CLOSE, QUOTE_OPEN,
};
pub use resolve::ResolvedPath;
