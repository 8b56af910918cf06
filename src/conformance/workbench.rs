//! The repository conformance workbench

use super::cases::{plan, PlannedCase};
use super::context::{panic_payload_to_string, CaseFailure, TestCaseContext};
use super::generator::PropertyGenerator;
use super::results::{TestCaseSummary, WorkbenchResults};
use crate::model::TypeDef;
use crate::storage::MetadataCollection;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How the workbench runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbenchConfig {
    /// User id passed on every repository call
    pub user_id: String,
    /// Namespace for generated string values; a fresh one per run if unset
    pub run_prefix: Option<String>,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            user_id: "conformance-workbench".to_string(),
            run_prefix: None,
        }
    }
}

/// Drives a repository through every test case and gathers the results
///
/// Cases run one at a time. A failed assertion, repository error or panic
/// ends only the case it happens in.
pub struct ConformanceWorkbench {
    config: WorkbenchConfig,
    repository: Option<Arc<dyn MetadataCollection>>,
    expected_types: Vec<TypeDef>,
}

impl ConformanceWorkbench {
    pub fn new(config: WorkbenchConfig) -> Self {
        Self {
            config,
            repository: None,
            expected_types: Vec::new(),
        }
    }

    pub fn with_repository(mut self, repository: Arc<dyn MetadataCollection>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Types to plan cases for when no repository is available
    pub fn with_expected_types(mut self, types: Vec<TypeDef>) -> Self {
        self.expected_types = types;
        self
    }

    fn run_prefix(&self) -> String {
        self.config.run_prefix.clone().unwrap_or_else(|| {
            let id = uuid::Uuid::new_v4().simple().to_string();
            format!("omrs-{}", &id[..8])
        })
    }

    pub fn run(&self) -> WorkbenchResults {
        let run_id = self.run_prefix();
        let mut results = WorkbenchResults::new(run_id.clone());

        let Some(repository) = &self.repository else {
            let cases = plan(&self.expected_types);
            warn!(cases = cases.len(), "no repository available; skipping every case");
            for case in cases {
                results.skip(TestCaseSummary {
                    test_case_id: case.id(),
                    test_case_name: case.name(),
                    type_name: case.type_name().map(str::to_string),
                    reason: "no repository connector available".to_string(),
                });
            }
            return results;
        };
        results.metadata_collection_id = Some(repository.metadata_collection_id().to_string());

        let types = match repository.get_all_types() {
            Ok(gallery) => gallery.type_defs,
            Err(e) => {
                warn!(error = %e, "repository could not list its types");
                Vec::new()
            }
        };
        let cases = plan(&types);
        info!(
            run_id = %run_id,
            cases = cases.len(),
            types = types.len(),
            "starting conformance run"
        );

        let generator = PropertyGenerator::new(run_id);
        for case in &cases {
            self.run_case(repository.as_ref(), &generator, case, &mut results);
        }

        info!(
            passed = results.passed.len(),
            failed = results.failed.len(),
            skipped = results.skipped.len(),
            "conformance run finished"
        );
        results
    }

    fn run_case(
        &self,
        repository: &dyn MetadataCollection,
        generator: &PropertyGenerator,
        case: &PlannedCase,
        results: &mut WorkbenchResults,
    ) {
        let case_id = case.id();
        debug!(case = %case_id, "running test case");

        let mut ctx =
            TestCaseContext::new(case_id.clone(), repository, &self.config.user_id, generator);
        let mut outcome = match catch_unwind(AssertUnwindSafe(|| case.run(&mut ctx))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(CaseFailure::Panicked(panic_payload_to_string(payload.as_ref()))),
        };
        if let Some(message) = ctx.cleanup() {
            // the case's own failure, if any, stays the reported one
            if outcome.is_ok() {
                outcome = Err(CaseFailure::Panicked(format!("during cleanup: {}", message)));
            }
        }

        let result = ctx.finish(case.name(), case.type_name().map(str::to_string), outcome);
        match result.failure_reason() {
            None => info!(
                case = %case_id,
                assertions = result.successful_assertions.len(),
                "passed"
            ),
            Some(reason) => warn!(case = %case_id, reason = %reason, "failed"),
        }
        results.record(result);
    }
}
