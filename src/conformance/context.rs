//! Per-test-case state: assertions, discoveries and created instances

use super::generator::PropertyGenerator;
use super::results::{AssertionRecord, TestCaseResult};
use crate::model::{EntityDetail, Relationship, TypeRef};
use crate::storage::{MetadataCollection, RepositoryError, RepositoryResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;
use tracing::warn;

/// Why a test case stopped early
#[derive(Debug, Error)]
pub enum CaseFailure {
    #[error("assertion {id} failed: {message}")]
    Assertion { id: String, message: String },

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("test case panicked: {0}")]
    Panicked(String),
}

pub type CaseResult<T = ()> = Result<T, CaseFailure>;

/// Created instance that must be purged when the case ends
#[derive(Debug, Clone)]
struct CreatedInstance {
    guid: String,
    type_ref: TypeRef,
}

/// Everything a running test case can see and record
pub struct TestCaseContext<'a> {
    pub repository: &'a dyn MetadataCollection,
    pub user_id: &'a str,
    pub generator: &'a PropertyGenerator,
    case_id: String,
    successful: Vec<AssertionRecord>,
    discovered: BTreeMap<String, Value>,
    entities: Vec<CreatedInstance>,
    relationships: Vec<CreatedInstance>,
}

impl<'a> TestCaseContext<'a> {
    pub fn new(
        case_id: impl Into<String>,
        repository: &'a dyn MetadataCollection,
        user_id: &'a str,
        generator: &'a PropertyGenerator,
    ) -> Self {
        Self {
            repository,
            user_id,
            generator,
            case_id: case_id.into(),
            successful: Vec::new(),
            discovered: BTreeMap::new(),
            entities: Vec::new(),
            relationships: Vec::new(),
        }
    }

    fn assertion_id(&self, number: &str) -> String {
        format!("{}-{}", self.case_id, number)
    }

    /// Record an assertion; a false condition ends the case
    pub fn verify(
        &mut self,
        condition: bool,
        number: &str,
        message: impl Into<String>,
    ) -> CaseResult {
        let record = AssertionRecord {
            id: self.assertion_id(number),
            message: message.into(),
        };
        if condition {
            self.successful.push(record);
            Ok(())
        } else {
            Err(CaseFailure::Assertion {
                id: record.id,
                message: record.message,
            })
        }
    }

    /// Assert that a lookup reports the instance as not known
    pub fn verify_not_known<T>(
        &mut self,
        result: RepositoryResult<T>,
        number: &str,
        message: impl Into<String>,
    ) -> CaseResult {
        match result {
            Err(e) if e.is_not_known() => self.verify(true, number, message),
            Err(e) => Err(e.into()),
            Ok(_) => self.verify(false, number, message),
        }
    }

    pub fn discover(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.discovered.insert(name.into(), value.into());
    }

    pub fn track_entity(&mut self, entity: &EntityDetail) {
        self.entities.push(CreatedInstance {
            guid: entity.header.guid.clone(),
            type_ref: entity.header.type_ref.clone(),
        });
    }

    pub fn track_relationship(&mut self, relationship: &Relationship) {
        self.relationships.push(CreatedInstance {
            guid: relationship.header.guid.clone(),
            type_ref: relationship.header.type_ref.clone(),
        });
    }

    /// Forget an instance the case purged itself
    pub fn untrack(&mut self, guid: &str) {
        self.entities.retain(|i| i.guid != guid);
        self.relationships.retain(|i| i.guid != guid);
    }

    /// Purge everything the case created; instances already gone are ignored
    ///
    /// Every tracked instance gets a purge attempt even when an earlier one
    /// panics. Returns the first panic message, if any.
    pub fn cleanup(&mut self) -> Option<String> {
        let user_id = self.user_id;
        let repository = self.repository;
        let mut panics = Vec::new();

        for created in std::mem::take(&mut self.relationships) {
            let purge = || {
                let t = &created.type_ref;
                repository.purge_relationship(user_id, &t.guid, &t.name, &created.guid)
            };
            if let Some(message) = self.attempt_purge("relationship", &created, purge) {
                panics.push(message);
            }
        }
        for created in std::mem::take(&mut self.entities) {
            let purge = || {
                let t = &created.type_ref;
                repository.purge_entity(user_id, &t.guid, &t.name, &created.guid)
            };
            if let Some(message) = self.attempt_purge("entity", &created, purge) {
                panics.push(message);
            }
        }
        panics.into_iter().next()
    }

    fn attempt_purge(
        &self,
        kind: &str,
        created: &CreatedInstance,
        purge: impl FnOnce() -> RepositoryResult<()>,
    ) -> Option<String> {
        match catch_unwind(AssertUnwindSafe(purge)) {
            Ok(Ok(())) => None,
            Ok(Err(e)) if e.is_not_known() => None,
            Ok(Err(e)) => {
                warn!(
                    case = %self.case_id,
                    guid = %created.guid,
                    error = %e,
                    "failed to purge {}",
                    kind
                );
                None
            }
            Err(payload) => {
                let message = panic_payload_to_string(payload.as_ref());
                warn!(
                    case = %self.case_id,
                    guid = %created.guid,
                    panic = %message,
                    "purging {} panicked",
                    kind
                );
                Some(message)
            }
        }
    }

    /// Turn the recorded state into a result
    pub fn finish(
        self,
        test_case_name: impl Into<String>,
        type_name: Option<String>,
        outcome: CaseResult,
    ) -> TestCaseResult {
        let (failed_assertion, exception) = match outcome {
            Ok(()) => (None, None),
            Err(CaseFailure::Assertion { id, message }) => {
                (Some(AssertionRecord { id, message }), None)
            }
            Err(other) => (None, Some(other.to_string())),
        };
        TestCaseResult {
            test_case_id: self.case_id,
            test_case_name: test_case_name.into(),
            type_name,
            successful_assertions: self.successful,
            failed_assertion,
            exception,
            discovered_properties: self.discovered,
        }
    }
}

pub(super) fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
