//! Rewriting internal links after a file changes path.
//!
//! Handles wikilinks (`[[path]]`, `[[path|alias]]`, `[[path#heading]]`,
//! `![[embed]]`) and markdown links with vault-absolute targets
//! (`[text](path/file.md)`, percent-encoded or not).

use std::sync::OnceLock;

use regex::{Captures, Regex};

use vmr_core::VaultPath;

fn wikilink_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(!?)\[\[([^\]\|#\n]+)((?:#[^\]\|\n]*)?)((?:\|[^\]\n]*)?)\]\]")
            .expect("wikilink pattern is valid")
    })
}

fn markdown_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\]\((/?)([^)\s#]+)((?:#[^)\s]*)?)\)").expect("markdown link pattern is valid")
    })
}

/// Rewrite every link in `content` that points at `from` so it points at
/// `to`. Returns `None` when nothing referenced `from`.
pub fn rewrite_links(content: &str, from: &VaultPath, to: &VaultPath) -> Option<String> {
    let from_full = from.as_str();
    let from_bare = strip_md(from_full);
    let to_full = to.as_str();
    let to_bare = strip_md(to_full);
    let stem_changed = from.file_stem() != to.file_stem();

    let mut changed = false;

    let after_wiki = wikilink_re().replace_all(content, |caps: &Captures<'_>| {
        let target = caps[2].trim();
        let replacement = if target == from_full {
            Some(to_full)
        } else if target == from_bare {
            Some(to_bare)
        } else if stem_changed && !target.contains('/') && target == from.file_stem() {
            Some(to.file_stem())
        } else {
            None
        };
        match replacement {
            Some(new_target) => {
                changed = true;
                format!("{}[[{}{}{}]]", &caps[1], new_target, &caps[3], &caps[4])
            }
            None => caps[0].to_string(),
        }
    });

    let after_md = markdown_link_re().replace_all(&after_wiki, |caps: &Captures<'_>| {
        let raw = &caps[2];
        let decoded = urlencoding::decode(raw).map_or_else(|_| raw.into(), |d| d.into_owned());
        if decoded == from_full {
            changed = true;
            let target = if decoded != raw {
                encode_path(to_full)
            } else {
                to_full.to_string()
            };
            format!("]({}{}{})", &caps[1], target, &caps[3])
        } else {
            caps[0].to_string()
        }
    });

    changed.then(|| after_md.into_owned())
}

/// Percent-encode each segment, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn strip_md(path: &str) -> &str {
    path.strip_suffix(".md").unwrap_or(path)
}
