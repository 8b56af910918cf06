//! Conformance workbench for metadata collections
//!
//! The workbench discovers the types a repository supports, synthesizes
//! instances of each, drives them through their lifecycle and records
//! every assertion. Results are partitioned into passed, failed and
//! skipped test cases, each with the properties discovered along the way.

mod cases;
mod context;
mod generator;
mod results;
mod workbench;

pub use cases::{plan, PlannedCase};
pub use context::{CaseFailure, CaseResult, TestCaseContext};
pub use generator::{inherited_attributes, CreationProfile, PropertyGenerator};
pub use results::{
    AssertionRecord, TestCaseResult, TestCaseSummary, WorkbenchResults, DISABLED, ENABLED,
};
pub use workbench::{ConformanceWorkbench, WorkbenchConfig};
