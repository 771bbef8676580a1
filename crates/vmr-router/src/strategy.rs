//! Batch execution strategies.
//!
//! [`AtomicBatch`] applies ordered steps and undoes the completed ones in
//! reverse when a step fails. [`AggregatingBatch`] runs every item
//! independently and records each outcome. Both produce a
//! [`BatchOperationResult`].

use tracing::{debug, error, warn};

use vmr_core::error::{Result, VmrError};
use vmr_core::{BatchAggregator, BatchOperationResult, UnrestoredItem, VaultPath};

/// Lifecycle of an [`AtomicBatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Pending,
    Enumerating,
    /// Applying the step at this index.
    Applying(usize),
    Committed,
    /// Undoing the step at this index.
    RollingBack(usize),
    RolledBack,
    /// At least one undo failed.
    RollbackIncomplete,
}

/// The per-step action of an atomic batch and its compensation.
pub trait StepAction {
    /// Verb used in per-item messages ("moved", "copied").
    fn verb(&self) -> &'static str;

    fn apply(&self, from: &VaultPath, to: &VaultPath) -> Result<()>;

    /// Undo a successful [`StepAction::apply`] of the same pair.
    fn compensate(&self, from: &VaultPath, to: &VaultPath) -> Result<()>;
}

/// One `from -> to` step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub from: VaultPath,
    pub to: VaultPath,
}

/// All-or-nothing execution of ordered steps.
#[derive(Debug)]
pub struct AtomicBatch {
    label: &'static str,
    steps: Vec<Step>,
    phase: BatchPhase,
}

impl AtomicBatch {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            steps: Vec::new(),
            phase: BatchPhase::Pending,
        }
    }

    /// Record the steps to run, in execution order.
    pub fn enumerate(&mut self, steps: impl IntoIterator<Item = Step>) {
        self.transition(BatchPhase::Enumerating);
        self.steps.extend(steps);
    }

    pub fn phase(&self) -> BatchPhase {
        self.phase
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    fn transition(&mut self, next: BatchPhase) {
        debug!(batch = self.label, from = ?self.phase, to = ?next, "batch phase");
        self.phase = next;
    }

    /// Apply every step in order.
    ///
    /// # Errors
    ///
    /// When step `k` fails, steps `k-1..=0` are compensated in reverse. Returns
    /// [`VmrError::RolledBack`] if every compensation succeeded, otherwise
    /// [`VmrError::RollbackIncomplete`] listing each file left in place.
    pub fn run(&mut self, action: &dyn StepAction) -> Result<BatchOperationResult> {
        let mut results = BatchAggregator::new();

        for index in 0..self.steps.len() {
            self.transition(BatchPhase::Applying(index));
            let Step { from, to } = self.steps[index].clone();
            match action.apply(&from, &to) {
                Ok(()) => results.success(from.as_str(), format!("{} to {to}", action.verb())),
                Err(e) => {
                    warn!(batch = self.label, file = %from, error = %e, "step failed, rolling back");
                    return Err(self.roll_back(action, index, &from, e));
                }
            }
        }

        self.transition(BatchPhase::Committed);
        Ok(results.finish())
    }

    fn roll_back(
        &mut self,
        action: &dyn StepAction,
        failed_at: usize,
        failed: &VaultPath,
        cause: VmrError,
    ) -> VmrError {
        let mut unrestored = Vec::new();
        for index in (0..failed_at).rev() {
            self.transition(BatchPhase::RollingBack(index));
            let Step { from, to } = &self.steps[index];
            if let Err(e) = action.compensate(from, to) {
                error!(batch = self.label, file = %from, error = %e, "compensation failed");
                unrestored.push(UnrestoredItem {
                    original_path: from.to_string(),
                    current_path: to.to_string(),
                    message: e.to_string(),
                });
            }
        }

        if unrestored.is_empty() {
            self.transition(BatchPhase::RolledBack);
            VmrError::RolledBack {
                failed: failed.to_string(),
                reason: cause.to_string(),
            }
        } else {
            self.transition(BatchPhase::RollbackIncomplete);
            unrestored.reverse();
            VmrError::RollbackIncomplete {
                failed: failed.to_string(),
                reason: cause.to_string(),
                unrestored,
            }
        }
    }
}

/// What a successful aggregating item did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Done(String),
    Skipped(String),
}

/// Best-effort execution: every item runs, failures are recorded.
#[derive(Debug)]
pub struct AggregatingBatch {
    label: &'static str,
    results: BatchAggregator,
}

impl AggregatingBatch {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            results: BatchAggregator::new(),
        }
    }

    /// Run one item and record its outcome under `identifier`.
    pub fn run_item(
        &mut self,
        identifier: impl Into<String>,
        item: impl FnOnce() -> Result<ItemOutcome>,
    ) {
        let identifier = identifier.into();
        match item() {
            Ok(ItemOutcome::Done(message)) => {
                debug!(batch = self.label, item = %identifier, "item done");
                self.results.success(identifier, message);
            }
            Ok(ItemOutcome::Skipped(message)) => self.results.skipped(identifier, message),
            Err(e) => {
                warn!(batch = self.label, item = %identifier, error = %e, "item failed");
                self.results.failed(identifier, e.to_string());
            }
        }
    }

    pub fn finish(self) -> BatchOperationResult {
        self.results.finish()
    }
}
