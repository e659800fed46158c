//! Stage inputs with strictness enforcement.

use crate::core::StageData;
use crate::errors::UndeclaredDependencyError;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Read-only view of earlier stage outputs.
///
/// In strict mode, reading a stage that was not declared as a dependency is
/// an error. A declared dependency that produced nothing reads as `None`, so
/// stages can tell "absent" apart from "not allowed to look".
#[derive(Debug, Clone, Default)]
pub struct StageInputs {
    /// Outputs of earlier stages that produced data.
    outputs: HashMap<String, StageData>,
    /// The declared dependencies for this stage.
    declared_dependencies: HashSet<String>,
    /// The name of the current stage (for error messages).
    stage_name: String,
    /// Whether strict mode is enabled.
    strict: bool,
}

impl StageInputs {
    /// Creates new stage inputs.
    #[must_use]
    pub fn new(
        outputs: HashMap<String, StageData>,
        declared_dependencies: HashSet<String>,
        stage_name: impl Into<String>,
        strict: bool,
    ) -> Self {
        Self {
            outputs,
            declared_dependencies,
            stage_name: stage_name.into(),
            strict,
        }
    }

    /// Creates permissive stage inputs (no strictness).
    #[must_use]
    pub fn permissive(outputs: HashMap<String, StageData>, stage_name: impl Into<String>) -> Self {
        Self {
            declared_dependencies: outputs.keys().cloned().collect(),
            outputs,
            stage_name: stage_name.into(),
            strict: false,
        }
    }

    fn check(&self, stage: &str) -> Result<(), UndeclaredDependencyError> {
        if self.strict && !self.declared_dependencies.contains(stage) {
            return Err(UndeclaredDependencyError::new(&self.stage_name, stage));
        }
        Ok(())
    }

    /// Gets output from a specific stage.
    ///
    /// # Errors
    ///
    /// Returns `UndeclaredDependencyError` in strict mode if the stage
    /// is not a declared dependency.
    pub fn get(&self, stage: &str) -> Result<Option<&StageData>, UndeclaredDependencyError> {
        self.check(stage)?;
        Ok(self.outputs.get(stage))
    }

    /// Gets a specific value from a stage's output.
    pub fn get_value(
        &self,
        stage: &str,
        key: &str,
    ) -> Result<Option<&serde_json::Value>, UndeclaredDependencyError> {
        self.check(stage)?;
        Ok(self.outputs.get(stage).and_then(|o| o.get(key)))
    }

    /// Gets a string value from a stage's output.
    pub fn get_str(&self, stage: &str, key: &str) -> Result<Option<&str>, UndeclaredDependencyError> {
        Ok(self.get_value(stage, key)?.and_then(serde_json::Value::as_str))
    }

    /// Deserializes a value from a stage's output.
    ///
    /// A value that does not match `T` is logged and reads as absent.
    pub fn get_as<T: DeserializeOwned>(
        &self,
        stage: &str,
        key: &str,
    ) -> Result<Option<T>, UndeclaredDependencyError> {
        let Some(value) = self.get_value(stage, key)? else {
            return Ok(None);
        };
        match serde_json::from_value(value.clone()) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => {
                warn!(stage, key, error = %e, "Stage output has an unexpected shape, treating it as absent");
                Ok(None)
            }
        }
    }

    /// Checks if output exists for a stage.
    #[must_use]
    pub fn contains(&self, stage: &str) -> bool {
        self.outputs.contains_key(stage)
    }

    /// Returns the declared dependencies.
    #[must_use]
    pub fn declared_dependencies(&self) -> &HashSet<String> {
        &self.declared_dependencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_outputs() -> HashMap<String, StageData> {
        let mut outputs = HashMap::new();

        let mut weather = HashMap::new();
        weather.insert("summary".to_string(), json!("clear"));
        outputs.insert("weather".to_string(), weather);

        let mut album = HashMap::new();
        album.insert("year".to_string(), json!(1971));
        outputs.insert("album".to_string(), album);

        outputs
    }

    #[test]
    fn test_permissive_access() {
        let inputs = StageInputs::permissive(sample_outputs(), "synthesis");

        assert!(inputs.get("weather").unwrap().is_some());
        assert!(inputs.get("literature").unwrap().is_none());
    }

    #[test]
    fn test_strict_declared_dependency() {
        let deps: HashSet<String> = ["weather".to_string(), "literature".to_string()].into();
        let inputs = StageInputs::new(sample_outputs(), deps, "synthesis", true);

        assert!(inputs.get("weather").unwrap().is_some());
        // declared but absent
        assert!(inputs.get("literature").unwrap().is_none());

        let err = inputs.get("album").unwrap_err();
        assert_eq!(err.stage, "synthesis");
        assert_eq!(err.key, "album");
    }

    #[test]
    fn test_typed_access() {
        let inputs = StageInputs::permissive(sample_outputs(), "synthesis");

        assert_eq!(inputs.get_str("weather", "summary").unwrap(), Some("clear"));
        assert_eq!(inputs.get_as::<i32>("album", "year").unwrap(), Some(1971));
        assert_eq!(inputs.get_as::<String>("album", "year").unwrap(), None);
        assert!(inputs.contains("album"));
    }

    #[derive(Clone, Default)]
    struct CapturedLog(std::sync::Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_mis_shaped_value_is_logged() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let inputs = StageInputs::permissive(sample_outputs(), "synthesis");
        let value = tracing::subscriber::with_default(subscriber, || inputs.get_as::<Vec<String>>("album", "year"));

        assert_eq!(value.unwrap(), None);
        let output = String::from_utf8(log.0.lock().clone()).unwrap();
        assert!(output.contains("unexpected shape"), "{output}");
        assert!(output.contains("album"));
        assert!(output.contains("year"));
    }
}
