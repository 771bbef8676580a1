//! Raw mutation requests as they arrive from the outer surface.

/// Request verb. Deletes carry no `Operation` attribute of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestVerb {
    Patch,
    Delete,
}

/// Attributes, path and body of an incoming request, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    pub verb: RequestVerb,
    /// Vault path, or the old tag name for a vault-wide tag rename.
    pub path: String,
    headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawRequest {
    pub fn new(verb: RequestVerb, path: impl Into<String>) -> Self {
        Self {
            verb,
            path: path.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(RequestVerb::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(RequestVerb::Delete, path)
    }

    /// Add an attribute. Later values for the same name win.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Value of attribute `name`, matched case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(n, _)| n.trim().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive_and_last_wins() {
        let req = RawRequest::patch("a.md")
            .header("operation", "add")
            .header("OPERATION", "remove");
        assert_eq!(req.header_value("Operation"), Some("remove"));
        assert_eq!(req.header_value("Target"), None);
        assert_eq!(req.headers().count(), 2);
    }
}
