//! YAML frontmatter splitting, parsing and rendering.
//!
//! Handles the `---` delimited YAML block at the very top of a markdown
//! file. Files without such a block have no frontmatter; their whole
//! content is body.
//! ```markdown
//! ---
//! title: Alpha
//! tags:
//!   - project
//! ---
//! Body with an #inline tag.
//! ```

use serde_yaml::Mapping;

use crate::error::VmrError;

/// Split content into the raw YAML between the delimiters and the body.
///
/// Returns `(None, content)` when the file does not open with a `---` line
/// or the block is never closed.
pub fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, content);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }

    (None, content)
}

/// Parse the frontmatter of `content` into a YAML mapping.
///
/// An empty block parses to an empty mapping.
///
/// # Errors
///
/// Returns [`VmrError::Serialization`] if the block is not valid YAML or is
/// not a mapping.
pub fn parse_frontmatter(content: &str) -> Result<(Option<Mapping>, &str), VmrError> {
    let (yaml, body) = split_frontmatter(content);
    let Some(yaml) = yaml else {
        return Ok((None, body));
    };
    if yaml.trim().is_empty() {
        return Ok((Some(Mapping::new()), body));
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|e| VmrError::Serialization(e.to_string()))?;
    match value {
        serde_yaml::Value::Mapping(map) => Ok((Some(map), body)),
        serde_yaml::Value::Null => Ok((Some(Mapping::new()), body)),
        _ => Err(VmrError::Serialization(
            "frontmatter is not a key/value mapping".to_string(),
        )),
    }
}

/// Reassemble a file from frontmatter and body.
///
/// An absent or empty mapping produces no frontmatter block.
///
/// # Errors
///
/// Returns [`VmrError::Serialization`] if the mapping cannot be serialized.
pub fn render_frontmatter(frontmatter: Option<&Mapping>, body: &str) -> Result<String, VmrError> {
    let Some(map) = frontmatter.filter(|m| !m.is_empty()) else {
        return Ok(body.to_string());
    };

    let yaml = serde_yaml::to_string(map).map_err(|e| VmrError::Serialization(e.to_string()))?;
    let mut output = String::with_capacity(yaml.len() + body.len() + 8);
    output.push_str("---\n");
    output.push_str(&yaml);
    if !yaml.ends_with('\n') {
        output.push('\n');
    }
    output.push_str("---\n");
    output.push_str(body);
    Ok(output)
}

/// Convert a frontmatter mapping to JSON for metadata consumers.
pub fn frontmatter_to_json(map: &Mapping) -> serde_json::Value {
    serde_json::to_value(map).unwrap_or(serde_json::Value::Null)
}
