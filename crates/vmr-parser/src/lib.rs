//! # vmr-parser
//!
//! Text-level syntax for VMR, shared by the vault, index and router crates:
//! - [`TagToken`]: tag names validated by a pest PEG grammar (`src/tag.pest`)
//! - Inline `#tag` scanning and rewriting ([`inline`])
//! - Frontmatter tag entries ([`frontmatter_tags`])
//! - Link rewriting after a rename ([`links`])
//! - [`extract_metadata`]: per-file tags and frontmatter

pub mod frontmatter_tags;
pub mod inline;
pub mod links;
pub mod metadata;
pub mod tag;

pub use inline::{inline_tags, rewrite_inline_tags, InlineEdit, InlineTag};
pub use links::rewrite_links;
pub use metadata::extract_metadata;
pub use tag::TagToken;
