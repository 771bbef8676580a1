//! The routing table.
//!
//! Every `(TargetKind, Operation)` pair maps to exactly one handler family or
//! to [`VmrError::UnsupportedOperation`]. Routing is a pure function of the
//! instruction and always runs before any existence check.

use std::fmt;

use serde::Serialize;

use vmr_core::error::{Result, VmrError};
use vmr_core::{MutationInstruction, Operation, TargetKind};

/// Handler family selected for an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HandlerFamily {
    ContentPatch,
    Identity,
    Directory,
    Tag,
}

impl HandlerFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            HandlerFamily::ContentPatch => "content-patch",
            HandlerFamily::Identity => "identity",
            HandlerFamily::Directory => "directory",
            HandlerFamily::Tag => "tag",
        }
    }
}

impl fmt::Display for HandlerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look up the handler family for a pair.
///
/// # Errors
///
/// Returns [`VmrError::UnsupportedOperation`] for pairs with no handler.
pub fn route(kind: TargetKind, operation: Operation) -> Result<HandlerFamily> {
    use Operation as Op;
    use TargetKind as Kind;

    let family = match (kind, operation) {
        (Kind::Heading | Kind::Block | Kind::Frontmatter, Op::Append | Op::Prepend | Op::Replace) => {
            Some(HandlerFamily::ContentPatch)
        }
        (Kind::File, Op::Rename | Op::Move | Op::Delete) => Some(HandlerFamily::Identity),
        (Kind::Directory, Op::Move | Op::Copy | Op::Create | Op::Delete) => {
            Some(HandlerFamily::Directory)
        }
        (Kind::Tag, Op::Add | Op::Remove | Op::Rename) => Some(HandlerFamily::Tag),
        (
            Kind::Heading | Kind::Block | Kind::Frontmatter,
            Op::Rename | Op::Move | Op::Copy | Op::Add | Op::Remove | Op::Create | Op::Delete,
        )
        | (
            Kind::File,
            Op::Append | Op::Prepend | Op::Replace | Op::Copy | Op::Add | Op::Remove | Op::Create,
        )
        | (
            Kind::Directory,
            Op::Append | Op::Prepend | Op::Replace | Op::Rename | Op::Add | Op::Remove,
        )
        | (
            Kind::Tag,
            Op::Append
            | Op::Prepend
            | Op::Replace
            | Op::Move
            | Op::Copy
            | Op::Create
            | Op::Delete,
        ) => None,
    };

    family.ok_or_else(|| VmrError::UnsupportedOperation {
        kind: kind.to_string(),
        operation: operation.to_string(),
    })
}

/// Route `instruction` and run the family's attribute checks.
///
/// The checks look only at the instruction: a `Target` is required where
/// the family needs one, and a file rename needs a bare name.
///
/// # Errors
///
/// Returns the routing error, [`VmrError::MissingAttribute`] for an absent
/// `Target`, [`VmrError::InvalidDestination`] for a rename target containing
/// a separator, or [`VmrError::EmptyTagList`] for a tag edit with neither a
/// `Target` nor a body.
pub fn dispatch(instruction: &MutationInstruction) -> Result<HandlerFamily> {
    let family = route(instruction.target_kind, instruction.operation)?;
    let target = instruction.target_str();

    let needs_target = match family {
        HandlerFamily::ContentPatch => true,
        HandlerFamily::Identity => instruction.operation != Operation::Delete,
        HandlerFamily::Directory => {
            matches!(instruction.operation, Operation::Move | Operation::Copy)
        }
        HandlerFamily::Tag => instruction.operation == Operation::Rename,
    };
    if needs_target && target.is_none() {
        return Err(VmrError::MissingAttribute(crate::normalize::attr::TARGET));
    }

    if family == HandlerFamily::Identity && instruction.operation == Operation::Rename {
        if let Some(name) = target.filter(|t| t.contains(['/', '\\'])) {
            return Err(VmrError::InvalidDestination {
                path: name.to_string(),
                reason: "rename expects a bare file name; use move to change directories"
                    .to_string(),
            });
        }
    }

    if family == HandlerFamily::Tag
        && instruction.operation != Operation::Rename
        && target.is_none()
        && !instruction.has_body()
    {
        return Err(VmrError::EmptyTagList);
    }

    Ok(family)
}
