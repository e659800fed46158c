//! Records of failures absorbed during a run.

use crate::core::Criticality;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Record of a stage that produced nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stage name.
    pub stage: String,
    /// Criticality of the stage.
    pub criticality: Criticality,
    /// Error message or absence reason.
    pub error: String,
    /// Whether the stage failed (as opposed to reporting absence).
    pub failed: bool,
    /// Attempts made.
    pub attempts: usize,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
    /// Additional context.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl FailureRecord {
    /// Creates a new failure record.
    #[must_use]
    pub fn new(stage: impl Into<String>, criticality: Criticality, error: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            criticality,
            error: error.into(),
            failed: true,
            attempts: 1,
            timestamp: Utc::now(),
            context: HashMap::new(),
        }
    }

    /// Marks the record as an absence rather than a failure.
    #[must_use]
    pub fn absent(mut self) -> Self {
        self.failed = false;
        self
    }

    /// Sets the number of attempts made.
    #[must_use]
    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }

    /// Adds context.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// Collects failures during a run.
#[derive(Debug, Default)]
pub struct FailureCollector {
    records: Vec<FailureRecord>,
}

impl FailureCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure.
    pub fn record(&mut self, record: FailureRecord) {
        self.records.push(record);
    }

    /// Returns the recorded failures.
    #[must_use]
    pub fn records(&self) -> &[FailureRecord] {
        &self.records
    }

    /// Returns the stages that produced nothing, in run order.
    #[must_use]
    pub fn absent_stages(&self) -> Vec<String> {
        self.records.iter().map(|r| r.stage.clone()).collect()
    }

    /// Returns true if any failure was recorded.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.records.is_empty()
    }

    /// Consumes the collector.
    #[must_use]
    pub fn into_records(self) -> Vec<FailureRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_record_builder() {
        let record = FailureRecord::new("literature", Criticality::Optional, "judge said no")
            .absent()
            .with_attempts(5)
            .with_context("page", serde_json::json!(12));

        assert!(!record.failed);
        assert_eq!(record.attempts, 5);
        assert_eq!(record.context["page"], 12);
    }

    #[test]
    fn test_collector_order() {
        let mut collector = FailureCollector::new();
        assert!(!collector.has_failures());

        collector.record(FailureRecord::new("weather", Criticality::SemiCritical, "503"));
        collector.record(FailureRecord::new("album", Criticality::Optional, "offline"));

        assert!(collector.has_failures());
        assert_eq!(collector.absent_stages(), vec!["weather", "album"]);
        assert_eq!(collector.into_records().len(), 2);
    }
}
