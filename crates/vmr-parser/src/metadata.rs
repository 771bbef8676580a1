//! Derive [`FileMetadata`] from a file's text.

use vmr_core::frontmatter::{frontmatter_to_json, parse_frontmatter, split_frontmatter};
use vmr_core::{tag_key, FileMetadata};

use crate::frontmatter_tags::frontmatter_tags;
use crate::inline::inline_tags;

/// Parse frontmatter and inline tags out of `content`.
///
/// Malformed frontmatter yields `Null` frontmatter; inline tags in the body
/// are still collected.
pub fn extract_metadata(content: &str) -> FileMetadata {
    let (frontmatter, body) = match parse_frontmatter(content) {
        Ok((map, body)) => (map, body),
        Err(_) => (None, split_frontmatter(content).1),
    };

    let mut tags: Vec<String> = Vec::new();
    let mut push = |name: String| {
        if !tags.iter().any(|t| tag_key(t) == tag_key(&name)) {
            tags.push(name);
        }
    };

    if let Some(map) = &frontmatter {
        frontmatter_tags(map).into_iter().for_each(&mut push);
    }
    inline_tags(body)
        .into_iter()
        .map(|t| t.name)
        .for_each(&mut push);

    FileMetadata {
        tags,
        frontmatter: frontmatter
            .as_ref()
            .map(frontmatter_to_json)
            .unwrap_or(serde_json::Value::Null),
    }
}
