//! Inline `#tag` occurrences in markdown bodies.
//!
//! Fenced code blocks and inline code spans are skipped. A `#` only starts
//! a tag at the beginning of a line or after whitespace or an opening
//! bracket, so headings (`# Title`), URL fragments and `a#b` never count.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::tag::TagToken;

fn inline_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|[\s(\[,;])#([\p{L}\p{N}_/-]+)").expect("inline tag pattern is valid")
    })
}

/// One inline tag occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineTag {
    /// Tag name without the marker.
    pub name: String,
    /// Byte range of `#name` in the scanned text.
    pub span: Range<usize>,
}

/// What to do with an inline occurrence while rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineEdit {
    Keep,
    Replace(String),
    Remove,
}

/// Find every valid inline tag in `body`, in document order.
pub fn inline_tags(body: &str) -> Vec<InlineTag> {
    let mut found = Vec::new();
    let mut in_fence = false;
    let mut offset = 0;

    for line in body.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        let code_spans = code_spans(line);
        for cap in inline_tag_re().captures_iter(line) {
            let Some(group) = cap.get(1) else { continue };
            let name = group.as_str().trim_end_matches('/');
            let hash = group.start() - 1;
            if code_spans.iter().any(|span| span.contains(&hash)) {
                continue;
            }
            if TagToken::parse(name, usize::MAX).is_err() {
                continue;
            }
            found.push(InlineTag {
                name: name.to_string(),
                span: line_start + hash..line_start + group.start() + name.len(),
            });
        }
    }

    found
}

/// Rewrite inline tags in `body`. `edit` is called once per occurrence with
/// the tag name. Returns the new text and the number of occurrences changed.
pub fn rewrite_inline_tags(
    body: &str,
    mut edit: impl FnMut(&str) -> InlineEdit,
) -> (String, usize) {
    let mut output = String::with_capacity(body.len());
    let mut cursor = 0;
    let mut changed = 0;

    for tag in inline_tags(body) {
        match edit(&tag.name) {
            InlineEdit::Keep => continue,
            InlineEdit::Replace(new_name) => {
                output.push_str(&body[cursor..tag.span.start]);
                output.push('#');
                output.push_str(&new_name);
                cursor = tag.span.end;
            }
            InlineEdit::Remove => {
                let mut start = tag.span.start;
                let mut end = tag.span.end;
                if start > cursor && body[..start].ends_with(' ') {
                    start -= 1;
                } else if body[end..].starts_with(' ') {
                    end += 1;
                }
                output.push_str(&body[cursor..start]);
                cursor = end;
            }
        }
        changed += 1;
    }

    output.push_str(&body[cursor..]);
    (output, changed)
}

/// Byte ranges of backtick code spans on a single line.
fn code_spans(line: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut open: Option<usize> = None;
    for (i, c) in line.char_indices() {
        if c == '`' {
            match open.take() {
                Some(start) => spans.push(start..i + 1),
                None => open = Some(i),
            }
        }
    }
    spans
}
