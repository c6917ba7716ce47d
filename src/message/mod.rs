//! IRC message types and parsing.

mod nom_parser;
mod parse;
mod serialize;
pub mod tags;
mod types;

pub use tags::{escape_tag_value, unescape_tag_value};
pub use types::{Message, Tag};

pub(crate) use serialize::needs_colon_prefix;
