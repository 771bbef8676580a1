//! Tag tokens validated against the pest tag grammar.

use std::fmt;

use pest::Parser;
use pest_derive::Parser;

use vmr_core::error::VmrError;
use vmr_core::tag_key;

#[derive(Parser)]
#[grammar = "tag.pest"]
struct TagGrammar;

/// A validated tag name without the leading `#` marker.
///
/// Case is preserved as written; equality checks elsewhere go through
/// [`TagToken::key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagToken(String);

impl TagToken {
    /// Normalize and validate a raw tag.
    ///
    /// Surrounding whitespace and a single leading `#` are stripped before
    /// validation.
    ///
    /// # Errors
    ///
    /// Returns [`VmrError::InvalidTag`] if the tag is empty, longer than
    /// `max_len` characters, purely numeric, or does not match the grammar.
    pub fn parse(raw: &str, max_len: usize) -> Result<Self, VmrError> {
        let name = raw.trim();
        let name = name.strip_prefix('#').unwrap_or(name);
        let invalid = |reason: &str| VmrError::InvalidTag {
            tag: raw.trim().to_string(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("tag is empty"));
        }
        let len = name.chars().count();
        if len > max_len {
            return Err(invalid(&format!(
                "tag is {len} characters long, the limit is {max_len}"
            )));
        }

        TagGrammar::parse(Rule::tag, name).map_err(|_| {
            invalid("only letters, digits, '_', '-' and '/' between non-empty segments are allowed")
        })?;

        if name.chars().all(|c| c.is_numeric() || c == '/') {
            return Err(invalid("tag must contain at least one non-numeric character"));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison key.
    pub fn key(&self) -> String {
        tag_key(&self.0)
    }

    /// Exact, case-insensitive match against a raw tag (with or without `#`).
    /// Parent and child tags never match each other.
    pub fn matches(&self, other: &str) -> bool {
        self.key() == tag_key(other)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TagToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
