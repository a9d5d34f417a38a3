//! fleetcheck-core: the validation engine
//!
//! Loads a manifest of tasks, runs each validation through its module
//! (`remoteshell`, `localshell` or `apicall`) and aggregates the results
//! into a report.

pub mod condition;
pub mod error;
pub mod listing;
pub mod manifest;
pub mod module;
pub mod orchestrator;
pub mod render;
pub mod report;
pub mod result;
pub mod table;

pub use condition::{Condition, MatchRule};
pub use error::{ManifestError, ModuleError, ValidatorError};
pub use listing::{ListFormat, ValidationLister};
pub use manifest::{Host, Manifest, RunList, ServerGroup, Task, Validation};
pub use module::{DefaultModuleFactory, ModuleFactory, ModuleKind, ModuleParams, ValidatorModule};
pub use orchestrator::Validator;
pub use render::{Variables, render};
pub use report::{Report, ReportFile, ReportFormat, ResultRow, Stats};
pub use result::{ModuleResult, Status};
pub use table::Table;
