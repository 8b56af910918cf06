//! Results of a workbench run

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Discovered property value for a capability that is offered
pub const ENABLED: &str = "Enabled";
/// Discovered property value for a capability that is not offered
pub const DISABLED: &str = "Disabled";

/// One assertion that held
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionRecord {
    pub id: String,
    pub message: String,
}

/// Outcome of one executed test case
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCaseResult {
    pub test_case_id: String,
    pub test_case_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub successful_assertions: Vec<AssertionRecord>,
    /// The assertion that ended the case, if one failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_assertion: Option<AssertionRecord>,
    /// Repository error or panic that ended the case
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    /// Capabilities and statistics observed while running
    pub discovered_properties: BTreeMap<String, Value>,
}

impl TestCaseResult {
    pub fn passed(&self) -> bool {
        self.failed_assertion.is_none() && self.exception.is_none()
    }

    /// One-line reason for a failed case
    pub fn failure_reason(&self) -> Option<String> {
        match (&self.failed_assertion, &self.exception) {
            (Some(a), _) => Some(format!("{}: {}", a.id, a.message)),
            (None, Some(e)) => Some(e.clone()),
            (None, None) => None,
        }
    }
}

/// A test case that was planned but never executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCaseSummary {
    pub test_case_id: String,
    pub test_case_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub reason: String,
}

/// Everything a run produced, partitioned by outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkbenchResults {
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_collection_id: Option<String>,
    pub passed: Vec<TestCaseResult>,
    pub failed: Vec<TestCaseResult>,
    pub skipped: Vec<TestCaseSummary>,
}

impl WorkbenchResults {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, result: TestCaseResult) {
        if result.passed() {
            self.passed.push(result);
        } else {
            self.failed.push(result);
        }
    }

    pub fn skip(&mut self, summary: TestCaseSummary) {
        self.skipped.push(summary);
    }

    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len() + self.skipped.len()
    }

    /// True when at least one case ran and none failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.passed.is_empty()
    }

    /// Look up an executed case by id
    pub fn case(&self, test_case_id: &str) -> Option<&TestCaseResult> {
        self.passed
            .iter()
            .chain(self.failed.iter())
            .find(|r| r.test_case_id == test_case_id)
    }

    /// Discovered properties of every executed case, merged
    pub fn discovered_properties(&self) -> BTreeMap<String, Value> {
        self.passed
            .iter()
            .chain(self.failed.iter())
            .flat_map(|r| r.discovered_properties.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, failed: bool) -> TestCaseResult {
        TestCaseResult {
            test_case_id: id.to_string(),
            test_case_name: id.to_string(),
            type_name: None,
            successful_assertions: vec![],
            failed_assertion: failed.then(|| AssertionRecord {
                id: format!("{}-01", id),
                message: "version was not incremented".into(),
            }),
            exception: None,
            discovered_properties: BTreeMap::new(),
        }
    }

    #[test]
    fn results_are_partitioned() {
        let mut results = WorkbenchResults::new("run");
        results.record(result("a", false));
        results.record(result("b", true));
        results.skip(TestCaseSummary {
            test_case_id: "c".into(),
            test_case_name: "c".into(),
            type_name: None,
            reason: "no repository".into(),
        });

        assert_eq!(results.passed.len(), 1);
        assert_eq!(results.failed.len(), 1);
        assert_eq!(results.total(), 3);
        assert!(!results.is_success());
        assert_eq!(
            results.case("b").and_then(|r| r.failure_reason()).as_deref(),
            Some("b-01: version was not incremented")
        );
    }

    #[test]
    fn nothing_executed_is_not_success() {
        assert!(!WorkbenchResults::new("run").is_success());
    }
}
