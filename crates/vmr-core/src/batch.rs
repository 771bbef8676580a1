//! Batch result aggregation shared by the directory and tag handlers.
//!
//! A [`BatchAggregator`] collects one [`BatchItemResult`] per item in the
//! order items were processed, then produces a [`BatchOperationResult`]
//! whose [`BatchOutcome`] drives the response status.

use serde::{Deserialize, Serialize};

use crate::error::Status;

/// Outcome of a single batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Skipped,
    Failed,
}

/// Per-item entry of a batch response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub identifier: String,
    pub status: ItemStatus,
    pub message: String,
}

/// Summary counts of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub requested: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Overall classification of a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// No item failed (skipped items count as done).
    FullSuccess,
    /// Some items failed while others succeeded.
    PartialSuccess,
    /// Items failed and nothing succeeded.
    TotalFailure,
}

impl BatchOutcome {
    /// Response status for this outcome. `on_total_failure` lets the caller
    /// pick between a validation and an internal failure.
    pub fn status(self, on_total_failure: Status) -> Status {
        match self {
            BatchOutcome::FullSuccess => Status::Ok,
            BatchOutcome::PartialSuccess => Status::MultiStatus,
            BatchOutcome::TotalFailure => on_total_failure,
        }
    }
}

/// Result of a batch operation. Built during execution, serialized into the
/// response, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOperationResult {
    pub summary: BatchSummary,
    pub results: Vec<BatchItemResult>,
}

impl BatchOperationResult {
    pub fn outcome(&self) -> BatchOutcome {
        let s = &self.summary;
        if s.failed == 0 {
            BatchOutcome::FullSuccess
        } else if s.succeeded > 0 {
            BatchOutcome::PartialSuccess
        } else {
            BatchOutcome::TotalFailure
        }
    }

    /// Items that failed, in processing order.
    pub fn failures(&self) -> impl Iterator<Item = &BatchItemResult> {
        self.results
            .iter()
            .filter(|r| r.status == ItemStatus::Failed)
    }
}

/// Accumulates per-item outcomes.
#[derive(Debug, Default)]
pub struct BatchAggregator {
    results: Vec<BatchItemResult>,
}

impl BatchAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        identifier: impl Into<String>,
        status: ItemStatus,
        message: impl Into<String>,
    ) {
        self.results.push(BatchItemResult {
            identifier: identifier.into(),
            status,
            message: message.into(),
        });
    }

    pub fn success(&mut self, identifier: impl Into<String>, message: impl Into<String>) {
        self.record(identifier, ItemStatus::Success, message);
    }

    pub fn skipped(&mut self, identifier: impl Into<String>, message: impl Into<String>) {
        self.record(identifier, ItemStatus::Skipped, message);
    }

    pub fn failed(&mut self, identifier: impl Into<String>, message: impl Into<String>) {
        self.record(identifier, ItemStatus::Failed, message);
    }

    /// Downgrade every recorded success to a failure with `message`.
    ///
    /// Used when the single write backing a batch fails after the items were
    /// classified.
    pub fn fail_successes(&mut self, message: &str) {
        for item in &mut self.results {
            if item.status == ItemStatus::Success {
                item.status = ItemStatus::Failed;
                item.message = message.to_string();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn count(&self, status: ItemStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn finish(self) -> BatchOperationResult {
        let summary = BatchSummary {
            requested: self.results.len(),
            succeeded: self.count(ItemStatus::Success),
            skipped: self.count(ItemStatus::Skipped),
            failed: self.count(ItemStatus::Failed),
        };
        BatchOperationResult {
            summary,
            results: self.results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_each_status() {
        let mut agg = BatchAggregator::new();
        agg.success("a", "added");
        agg.skipped("b", "already present");
        agg.failed("c", "malformed");
        let result = agg.finish();
        assert_eq!(
            result.summary,
            BatchSummary {
                requested: 3,
                succeeded: 1,
                skipped: 1,
                failed: 1
            }
        );
        assert_eq!(result.failures().count(), 1);
    }

    #[test]
    fn outcome_classification() {
        let mut agg = BatchAggregator::new();
        agg.skipped("a", "noop");
        assert_eq!(agg.finish().outcome(), BatchOutcome::FullSuccess);

        let mut agg = BatchAggregator::new();
        agg.success("a", "ok");
        agg.failed("b", "bad");
        assert_eq!(agg.finish().outcome(), BatchOutcome::PartialSuccess);

        let mut agg = BatchAggregator::new();
        agg.skipped("a", "noop");
        agg.failed("b", "bad");
        assert_eq!(agg.finish().outcome(), BatchOutcome::TotalFailure);
    }

    #[test]
    fn outcome_maps_to_status() {
        assert_eq!(
            BatchOutcome::FullSuccess.status(Status::InternalError),
            Status::Ok
        );
        assert_eq!(
            BatchOutcome::PartialSuccess.status(Status::InternalError),
            Status::MultiStatus
        );
        assert_eq!(
            BatchOutcome::TotalFailure.status(Status::BadRequest),
            Status::BadRequest
        );
    }

    #[test]
    fn fail_successes_keeps_skips() {
        let mut agg = BatchAggregator::new();
        agg.success("a", "added");
        agg.skipped("b", "present");
        agg.fail_successes("write failed");
        let result = agg.finish();
        assert_eq!(result.summary.failed, 1);
        assert_eq!(result.summary.skipped, 1);
        assert_eq!(result.results[0].message, "write failed");
    }

    #[test]
    fn result_serializes_with_summary_and_results() {
        let mut agg = BatchAggregator::new();
        agg.success("x", "added");
        let json = serde_json::to_value(agg.finish()).unwrap();
        assert_eq!(json["summary"]["requested"], 1);
        assert_eq!(json["results"][0]["status"], "success");
        assert_eq!(json["results"][0]["identifier"], "x");
    }
}
