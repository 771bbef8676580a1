//! Tag mutations: per-file batch add/remove and vault-wide rename.

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use tracing::debug;

use vmr_core::error::{Result, Status, VmrError};
use vmr_core::frontmatter::{parse_frontmatter, render_frontmatter};
use vmr_core::{
    tag_key, BatchAggregator, BatchItemResult, BatchOutcome, BatchSummary, ItemStatus,
    MutationInstruction, Operation, VaultPath,
};
use vmr_parser::frontmatter_tags::{
    add_frontmatter_tags, remove_frontmatter_tag, rename_frontmatter_tag,
};
use vmr_parser::{extract_metadata, rewrite_inline_tags, InlineEdit, TagToken};

use crate::engine::MutationEngine;
use crate::response::{mark_failed, to_body, MutationResponse};
use crate::route::HandlerFamily;
use crate::strategy::{AggregatingBatch, ItemOutcome};

/// JSON body of a batch tag request.
#[derive(Debug, Deserialize)]
struct TagListBody {
    #[serde(default)]
    tags: Vec<String>,
}

/// One entry of a per-file tag batch, keyed by `tag`.
#[derive(Debug, Serialize)]
struct TagItem {
    tag: String,
    status: ItemStatus,
    message: String,
}

#[derive(Debug, Serialize)]
struct TagBatchBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    summary: BatchSummary,
    results: Vec<TagItem>,
}

#[derive(Debug, Serialize)]
struct RenameError {
    file: String,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TagRenameBody {
    message: String,
    old_tag: String,
    new_tag: String,
    modified_count: usize,
    summary: BatchSummary,
    results: Vec<BatchItemResult>,
    errors: Vec<RenameError>,
}

/// Merge the legacy `Target` tag and the body's tag list, legacy first,
/// dropping case-insensitive duplicates.
fn requested_tags(instruction: &MutationInstruction) -> Result<Vec<String>> {
    let mut raw: Vec<String> = instruction.target_str().map(str::to_string).into_iter().collect();
    if instruction.has_body() {
        let body: TagListBody = serde_json::from_slice(&instruction.body)
            .map_err(|e| VmrError::InvalidBody(format!("expected {{\"tags\": [..]}}: {e}")))?;
        raw.extend(body.tags);
    }

    let mut seen: Vec<String> = Vec::with_capacity(raw.len());
    let mut tags = Vec::with_capacity(raw.len());
    for tag in raw {
        let key = tag_key(&tag);
        if !seen.contains(&key) {
            seen.push(key);
            tags.push(tag);
        }
    }

    if tags.is_empty() {
        return Err(VmrError::EmptyTagList);
    }
    Ok(tags)
}

/// Content after removing `tags` from the frontmatter and the body.
fn remove_tags(frontmatter: Option<Mapping>, body: &str, tags: &[TagToken]) -> Result<String> {
    let mut map = frontmatter;
    if let Some(map) = map.as_mut() {
        for tag in tags {
            remove_frontmatter_tag(map, tag);
        }
    }
    let (body, _) = rewrite_inline_tags(body, |name| {
        if tags.iter().any(|t| t.matches(name)) {
            InlineEdit::Remove
        } else {
            InlineEdit::Keep
        }
    });
    render_frontmatter(map.as_ref(), &body)
}

/// Content after renaming `old` to `new` everywhere in the file.
fn rename_in_content(content: &str, old: &TagToken, new: &TagToken) -> Result<String> {
    let (frontmatter, body) = parse_frontmatter(content)?;
    let mut map = frontmatter;
    let mut changed = false;
    if let Some(map) = map.as_mut() {
        changed |= rename_frontmatter_tag(map, old, new);
    }
    let (body, replaced) = rewrite_inline_tags(body, |name| {
        if old.matches(name) {
            InlineEdit::Replace(new.as_str().to_string())
        } else {
            InlineEdit::Keep
        }
    });
    if !changed && replaced == 0 {
        return Ok(content.to_string());
    }
    render_frontmatter(map.as_ref(), &body)
}

impl MutationEngine<'_> {
    /// Add or remove tags on one file with a single read and at most one
    /// write. Tag membership comes from the content just read.
    pub(crate) fn edit_file_tags(&self, instruction: &MutationInstruction) -> Result<MutationResponse> {
        let path = Self::source_path(instruction)?;
        let adding = instruction.operation == Operation::Add;
        let legacy = instruction.target_str().is_some() && !instruction.has_body();
        let requested = requested_tags(instruction)?;

        if path.is_root() || self.require_file(&path).is_err() {
            return Err(VmrError::TagTargetNotFound(path.to_string()));
        }
        let content = self.store.read_to_string(&path)?;
        let metadata = extract_metadata(&content);
        let stale = self.index.metadata(&path)?.as_ref() != Some(&metadata);
        if stale {
            debug!(path = %path, "index entry out of date, using file content");
        }

        let mut results = BatchAggregator::new();
        let mut changes: Vec<TagToken> = Vec::new();
        for raw in &requested {
            let token = match TagToken::parse(raw, self.config.max_tag_length) {
                Ok(token) => token,
                Err(e) => {
                    results.failed(raw.as_str(), e.to_string());
                    continue;
                }
            };
            let present = metadata.has_tag(token.as_str());
            match (adding, present) {
                (true, true) => results.skipped(token.as_str(), "Tag already present"),
                (false, false) => results.skipped(token.as_str(), "Tag not present"),
                (true, false) => {
                    results.success(token.as_str(), "Tag added");
                    changes.push(token);
                }
                (false, true) => {
                    results.success(token.as_str(), "Tag removed");
                    changes.push(token);
                }
            }
        }

        let mut write_failed = false;
        if changes.is_empty() && stale {
            self.index_refresh(&path, &content);
        }
        if !changes.is_empty() {
            let updated = parse_frontmatter(&content).and_then(|(frontmatter, body)| {
                if adding {
                    let mut map = frontmatter.unwrap_or_default();
                    add_frontmatter_tags(&mut map, &changes);
                    render_frontmatter(Some(&map), body)
                } else {
                    remove_tags(frontmatter, body, &changes)
                }
            });
            let written = updated.and_then(|text| {
                if text != content {
                    self.store.write(&path, text.as_bytes())?;
                    self.index_refresh(&path, &text);
                } else {
                    self.index_refresh(&path, &content);
                }
                Ok(())
            });
            if let Err(e) = written {
                write_failed = true;
                results.fail_successes(&format!("file was not updated: {e}"));
            }
        }

        let result = results.finish();
        let outcome = result.outcome();
        debug!(path = %path, summary = ?result.summary, "tag batch applied");

        let message = if legacy {
            result.results.first().map(|item| item.message.clone())
        } else {
            None
        };
        let mut body = to_body(&TagBatchBody {
            message,
            summary: result.summary,
            results: result
                .results
                .into_iter()
                .map(|item| TagItem {
                    tag: item.identifier,
                    status: item.status,
                    message: item.message,
                })
                .collect(),
        })?;

        let status = if outcome == BatchOutcome::TotalFailure {
            let (status, err) = if write_failed {
                (Status::InternalError, VmrError::BatchFailed(requested.len()))
            } else {
                (
                    Status::BadRequest,
                    VmrError::InvalidTag {
                        tag: requested.join(", "),
                        reason: "no valid tags supplied".to_string(),
                    },
                )
            };
            mark_failed(&mut body, &err);
            status
        } else {
            outcome.status(Status::InternalError)
        };
        Ok(MutationResponse::new(status, HandlerFamily::Tag, body))
    }

    /// Rename a tag in every file carrying it, best effort.
    pub(crate) fn rename_tag(&self, instruction: &MutationInstruction) -> Result<MutationResponse> {
        let max = self.config.max_tag_length;
        let old = TagToken::parse(instruction.source_path.trim_start_matches('/'), max)?;
        let target = instruction
            .target_str()
            .ok_or(VmrError::MissingAttribute(crate::normalize::attr::TARGET))?;
        let new = TagToken::parse(target, max)?;
        if old.as_str() == new.as_str() {
            return Err(VmrError::InvalidTag {
                tag: new.into_string(),
                reason: "new tag is identical to the old tag".to_string(),
            });
        }

        let files = self.index.files_with_tag(old.as_str())?;
        if files.is_empty() {
            return Err(VmrError::TagNotFound(old.into_string()));
        }

        let mut batch = AggregatingBatch::new("tag-rename");
        for file in &files {
            batch.run_item(file.as_str(), || self.rename_tag_in_file(file, &old, &new));
        }
        let result = batch.finish();
        let outcome = result.outcome();

        let modified_count = result.summary.succeeded;
        let errors: Vec<RenameError> = result
            .failures()
            .map(|item| RenameError {
                file: item.identifier.clone(),
                message: item.message.clone(),
            })
            .collect();
        let message = match outcome {
            BatchOutcome::FullSuccess => {
                format!("Renamed tag '{old}' to '{new}' in {modified_count} file(s)")
            }
            _ => format!(
                "Renamed tag '{old}' to '{new}' in {modified_count} of {} file(s)",
                files.len()
            ),
        };

        let mut body = to_body(&TagRenameBody {
            message,
            old_tag: old.as_str().to_string(),
            new_tag: new.as_str().to_string(),
            modified_count,
            summary: result.summary,
            results: result.results,
            errors,
        })?;
        let status = outcome.status(Status::InternalError);
        if outcome == BatchOutcome::TotalFailure {
            mark_failed(&mut body, &VmrError::BatchFailed(files.len()));
        }
        Ok(MutationResponse::new(status, HandlerFamily::Tag, body))
    }

    fn rename_tag_in_file(
        &self,
        file: &VaultPath,
        old: &TagToken,
        new: &TagToken,
    ) -> Result<ItemOutcome> {
        let content = self.store.read_to_string(file)?;
        let updated = rename_in_content(&content, old, new)?;
        if updated == content {
            self.index_refresh(file, &content);
            return Ok(ItemOutcome::Skipped(format!("tag '{old}' not found in file")));
        }
        self.store.write(file, updated.as_bytes())?;
        self.index_refresh(file, &updated);
        Ok(ItemOutcome::Done(format!("renamed to '{new}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruction(target: Option<&str>, body: &str) -> MutationInstruction {
        MutationInstruction {
            operation: Operation::Add,
            target_kind: vmr_core::TargetKind::Tag,
            target: target.map(str::to_string),
            delimiter: "::".into(),
            create_if_missing: false,
            apply_if_exists: false,
            trim_whitespace: false,
            permanent: false,
            body: body.as_bytes().to_vec(),
            declared_content_type: "application/json".into(),
            source_path: "a.md".into(),
        }
    }

    fn tag(name: &str) -> TagToken {
        TagToken::parse(name, 128).unwrap()
    }

    #[test]
    fn requested_tags_put_legacy_first_and_dedupe() {
        let tags = requested_tags(&instruction(Some("#Work"), r#"{"tags":["x","work","x","y"]}"#))
            .unwrap();
        assert_eq!(tags, vec!["#Work", "x", "y"]);
    }

    #[test]
    fn malformed_body_is_invalid() {
        let err = requested_tags(&instruction(None, "[1,2]")).unwrap_err();
        assert_eq!(err.error_code(), 40032);
        let err = requested_tags(&instruction(None, r#"{"tags":[]}"#)).unwrap_err();
        assert!(matches!(err, VmrError::EmptyTagList));
    }

    #[test]
    fn rename_in_content_is_exact() {
        let content = "---\ntags: [project, project/archived]\n---\n#project and #project/archived\n";
        let out = rename_in_content(content, &tag("project"), &tag("work")).unwrap();
        assert_eq!(
            out,
            "---\ntags:\n- work\n- project/archived\n---\n#work and #project/archived\n"
        );
    }

    #[test]
    fn rename_in_content_leaves_unrelated_files_alone() {
        let content = "---\ntitle: x\n---\nno tags\n";
        assert_eq!(
            rename_in_content(content, &tag("a"), &tag("b")).unwrap(),
            content
        );
    }

    #[test]
    fn remove_tags_strips_frontmatter_and_inline() {
        let (fm, body) = parse_frontmatter("---\ntags: [a, b]\n---\ntext #a end\n").unwrap();
        let out = remove_tags(fm, body, &[tag("A")]).unwrap();
        assert_eq!(out, "---\ntags:\n- b\n---\ntext end\n");
    }
}
