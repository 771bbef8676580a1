//! Tag entries in YAML frontmatter.
//!
//! Tags may live under `tags` or `tag`, either as a sequence or as a single
//! string separated by commas or whitespace. Entries may carry a leading `#`.
//! Edits touch only matching entries, leave a sequence behind and drop the
//! key once it is empty.

use serde_yaml::{Mapping, Value};

use vmr_core::tag_key;

use crate::tag::TagToken;

const TAG_KEYS: [&str; 2] = ["tags", "tag"];

/// All tag names listed in the frontmatter, markers stripped, in order.
pub fn frontmatter_tags(map: &Mapping) -> Vec<String> {
    TAG_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .flat_map(tag_values)
        .collect()
}

/// Whether the frontmatter lists `tag` (exact, case-insensitive).
pub fn has_frontmatter_tag(map: &Mapping, tag: &str) -> bool {
    let wanted = tag_key(tag);
    frontmatter_tags(map).iter().any(|t| tag_key(t) == wanted)
}

/// Append `tags` to the `tags` sequence, skipping ones already present.
/// Returns how many were added.
pub fn add_frontmatter_tags<'a>(
    map: &mut Mapping,
    tags: impl IntoIterator<Item = &'a TagToken>,
) -> usize {
    let mut values = map.get("tags").map(tag_values).unwrap_or_default();
    let before = values.len();
    for tag in tags {
        if !has_frontmatter_tag(map, tag.as_str())
            && !values.iter().any(|v| tag.matches(v))
        {
            values.push(tag.as_str().to_string());
        }
    }
    let added = values.len() - before;
    if added > 0 {
        map.insert(Value::String("tags".to_string()), to_sequence(&values));
    }
    added
}

/// Remove every entry equal to `tag`. Returns whether anything changed.
pub fn remove_frontmatter_tag(map: &mut Mapping, tag: &TagToken) -> bool {
    edit_matching(map, tag, None)
}

/// Rename every entry equal to `old` into `new`, dropping later entries
/// that already named `new`. Returns whether anything changed.
pub fn rename_frontmatter_tag(map: &mut Mapping, old: &TagToken, new: &TagToken) -> bool {
    edit_matching(map, old, Some(new))
}

/// Replace or drop the entries matching `old` under each tag key. Other
/// entries keep their exact form (markers, numbers, duplicates).
fn edit_matching(map: &mut Mapping, old: &TagToken, replacement: Option<&TagToken>) -> bool {
    let mut changed = false;
    for key in TAG_KEYS {
        let Some(value) = map.get_mut(key) else { continue };
        if !tag_values(value).iter().any(|name| old.matches(name)) {
            continue;
        }
        if let Value::String(_) = value {
            *value = to_sequence(&tag_values(value));
        }
        let Value::Sequence(items) = value else { continue };

        let mut edited: Vec<Value> = Vec::with_capacity(items.len());
        for item in items.drain(..) {
            let Some(name) = entry_name(&item) else {
                edited.push(item);
                continue;
            };
            if !old.matches(name) {
                edited.push(item);
                continue;
            }
            if let Some(new) = replacement {
                let marked = matches!(&item, Value::String(s) if s.trim_start().starts_with('#'));
                let marker = if marked { "#" } else { "" };
                edited.push(Value::String(format!("{marker}{}", new.as_str())));
            }
        }
        if let Some(new) = replacement {
            let mut seen = false;
            edited.retain(|item| match entry_name(item) {
                Some(name) if new.matches(name) => !std::mem::replace(&mut seen, true),
                _ => true,
            });
        }

        changed = true;
        if edited.is_empty() {
            map.remove(key);
        } else {
            *value = Value::Sequence(edited);
        }
    }
    changed
}

/// Tag name of a string entry, marker stripped.
fn entry_name(item: &Value) -> Option<&str> {
    match item {
        Value::String(s) => Some(s.trim().trim_start_matches('#')).filter(|n| !n.is_empty()),
        _ => None,
    }
}

fn tag_values(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Sequence(seq) => seq
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    raw.into_iter()
        .map(|s| s.trim().trim_start_matches('#').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn to_sequence(values: &[String]) -> Value {
    Value::Sequence(values.iter().cloned().map(Value::String).collect())
}
