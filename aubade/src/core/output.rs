//! Stage output type with factory methods.

use super::StageStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Named fields produced by a stage.
pub type StageData = HashMap<String, serde_json::Value>;

/// The output of a stage execution.
///
/// A stage either produces data, reports that it has nothing acceptable
/// (`Absent`), or fails. Absence is an expected outcome for validation-style
/// stages and never carries an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutput {
    /// The status of the stage execution.
    pub status: StageStatus,

    /// The output data (for successful executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<StageData>,

    /// Error message (for failed executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Why nothing was produced (for absent outputs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absent_reason: Option<String>,

    /// Whether the error is retryable.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl StageOutput {
    /// Creates a successful output with data.
    #[must_use]
    pub fn ok(data: StageData) -> Self {
        Self {
            status: StageStatus::Ok,
            data: Some(data),
            error: None,
            absent_reason: None,
            retryable: false,
        }
    }

    /// Creates a successful output with a single value.
    #[must_use]
    pub fn ok_value(key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut data = HashMap::new();
        data.insert(key.into(), value);
        Self::ok(data)
    }

    /// Creates an absent output with a reason.
    #[must_use]
    pub fn absent(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Absent,
            data: None,
            error: None,
            absent_reason: Some(reason.into()),
            retryable: false,
        }
    }

    /// Creates a failure output with an error message.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Fail,
            data: None,
            error: Some(error.into()),
            absent_reason: None,
            retryable: false,
        }
    }

    /// Creates a retryable failure output.
    #[must_use]
    pub fn fail_retryable(error: impl Into<String>) -> Self {
        Self {
            retryable: true,
            ..Self::fail(error)
        }
    }

    /// Adds a field to a successful output. No-op for other statuses.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        if let Some(data) = self.data.as_mut() {
            data.insert(key.into(), value);
        }
        self
    }

    /// Returns true if the stage produced data.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == StageStatus::Ok
    }

    /// Returns true if the stage failed.
    #[must_use]
    pub fn is_fail(&self) -> bool {
        self.status == StageStatus::Fail
    }

    /// Gets a field from the output data.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.as_ref().and_then(|d| d.get(key))
    }

    /// Describes why the stage produced nothing, if it did not.
    #[must_use]
    pub fn cause(&self) -> Option<&str> {
        self.error.as_deref().or(self.absent_reason.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_value() {
        let output = StageOutput::ok_value("greeting", json!("Good morning"));
        assert!(output.is_ok());
        assert_eq!(output.get("greeting"), Some(&json!("Good morning")));
        assert!(output.cause().is_none());
    }

    #[test]
    fn test_with_value_only_on_ok() {
        let output = StageOutput::ok_value("a", json!(1)).with_value("b", json!(2));
        assert_eq!(output.get("b"), Some(&json!(2)));

        let absent = StageOutput::absent("nothing").with_value("b", json!(2));
        assert!(absent.data.is_none());
    }

    #[test]
    fn test_absent() {
        let output = StageOutput::absent("no suitable excerpt");
        assert_eq!(output.status, StageStatus::Absent);
        assert!(!output.is_fail());
        assert_eq!(output.cause(), Some("no suitable excerpt"));
    }

    #[test]
    fn test_fail_retryable() {
        let output = StageOutput::fail_retryable("connection reset");
        assert!(output.is_fail());
        assert!(output.retryable);
        assert_eq!(output.cause(), Some("connection reset"));
        assert!(!StageOutput::fail("bad input").retryable);
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let json = serde_json::to_value(StageOutput::absent("none")).unwrap();
        assert_eq!(json, json!({"status": "absent", "absent_reason": "none"}));
    }
}
