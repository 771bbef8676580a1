//! # vmr-router
//!
//! Polymorphic mutation router and batch-operation engine for VMR.
//!
//! A request flows through four stages:
//! 1. [`normalize`](normalize::normalize) turns raw attributes into a
//!    [`MutationInstruction`](vmr_core::MutationInstruction)
//! 2. [`dispatch`] picks a [`HandlerFamily`] from `(target kind, operation)`
//!    before anything touches the vault
//! 3. the family handler runs, single-entity or as a batch
//!    ([`AtomicBatch`] with rollback, [`AggregatingBatch`] best effort)
//! 4. the outcome becomes a [`MutationResponse`]
//!
//! [`MutationEngine`] wires the stages to the injected store, link renamer,
//! metadata index and [`StructuralPatcher`].

mod directory;
mod engine;
mod identity;
pub mod normalize;
pub mod patch;
pub mod request;
pub mod response;
pub mod route;
pub mod strategy;
mod tags;

pub use engine::MutationEngine;
pub use patch::{FrontmatterFieldPatcher, PatchError, PatchInstruction, StructuralPatcher};
pub use request::{RawRequest, RequestVerb};
pub use response::{EntityBody, MutationResponse};
pub use route::{dispatch, route, HandlerFamily};
pub use strategy::{AggregatingBatch, AtomicBatch, BatchPhase, ItemOutcome, Step, StepAction};
