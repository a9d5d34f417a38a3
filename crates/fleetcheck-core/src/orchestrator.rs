//! Validation orchestrator
//!
//! Walks the manifest in order (tasks, then validations, then hosts for
//! `remoteshell`), runs one module per check and collects the result rows.
//! Everything runs sequentially; the first fatal error aborts the run and
//! no report is written.

use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, instrument, warn};

use crate::error::ValidatorError;
use crate::manifest::{Manifest, RunList, Task, Validation};
use crate::module::{
    ApiCallParams, DefaultModuleFactory, LocalShellParams, ModuleFactory, ModuleKind,
    ModuleParams, RemoteShellParams, ValidatorModule,
};
use crate::render::Variables;
use crate::report::{Report, ReportFile, ResultRow, Stats};
use crate::result::ModuleResult;

/// Host recorded for checks that do not fan out over a server group
const LOCALHOST: &str = "localhost";

/// Runs a manifest and produces its report
pub struct Validator {
    manifest: Manifest,
    report_file: Option<ReportFile>,
    factory: Arc<dyn ModuleFactory>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("manifest", &self.manifest.name)
            .field("report_file", &self.report_file)
            .finish_non_exhaustive()
    }
}

impl Validator {
    #[must_use]
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            report_file: None,
            factory: Arc::new(DefaultModuleFactory::default()),
        }
    }

    /// Load the manifest at `path`, substituting `vars`
    ///
    /// # Errors
    /// Returns `ValidatorError::Manifest` if the manifest cannot be read or is invalid.
    pub fn from_path(path: &Path, vars: &Variables) -> Result<Self, ValidatorError> {
        Ok(Self::new(Manifest::load(path, vars)?))
    }

    /// Override the manifest's `run` section; an empty list keeps the manifest's own
    #[must_use]
    pub fn with_run(mut self, run: RunList) -> Self {
        if run != RunList::Tasks(Vec::new()) {
            self.manifest.run = run;
        }
        self
    }

    #[must_use]
    pub fn with_report_file(mut self, report_file: ReportFile) -> Self {
        self.report_file = Some(report_file);
        self
    }

    #[must_use]
    pub fn with_factory(mut self, factory: Arc<dyn ModuleFactory>) -> Self {
        self.factory = factory;
        self
    }

    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Run every selected task, persist the report if requested and return
    /// the counters with the rendered report table
    ///
    /// # Errors
    /// Returns the first fatal error: unknown server group, invalid module
    /// parameters, a module that cannot connect or execute, or a report
    /// file that cannot be written.
    pub async fn validate(&self) -> Result<(Stats, String), ValidatorError> {
        let report = self.collect().await?;

        if let Some(file) = &self.report_file {
            report.write(file)?;
        }

        Ok((report.stats(), report.table().to_text()))
    }

    /// Run every selected task and return the collected report
    ///
    /// # Errors
    /// Same as [`Validator::validate`], minus report persistence.
    #[instrument(skip(self), fields(manifest = %self.manifest.name))]
    pub async fn collect(&self) -> Result<Report, ValidatorError> {
        let mut report = Report::new(report_title(&self.manifest.name));

        for task in &self.manifest.tasks {
            if !self.manifest.run.includes(&task.name) {
                debug!(task = %task.name, "task not selected, skipping");
                continue;
            }

            info!(task = %task.name, "running task");
            for validation in &task.validations {
                self.run_validation(task, validation, &mut report).await?;
            }
        }

        let stats = report.stats();
        info!(
            total = stats.total,
            passed = stats.passed,
            failed = stats.failed,
            "validation finished"
        );
        Ok(report)
    }

    async fn run_validation(
        &self,
        task: &Task,
        validation: &Validation,
        report: &mut Report,
    ) -> Result<(), ValidatorError> {
        let Some(kind) = ModuleKind::from_name(&validation.module) else {
            warn!(
                task = %task.name,
                module = %validation.module,
                "unknown module, validation ignored"
            );
            return Ok(());
        };

        match kind {
            ModuleKind::RemoteShell => {
                let params = RemoteShellParams::validate_schema(&validation.params)?;
                for name in &params.groups {
                    let group = self
                        .manifest
                        .server_group(name)
                        .ok_or_else(|| ValidatorError::UnknownServerGroup(name.clone()))?;

                    for host in group.hosts() {
                        let module = self.factory.remote_shell(host, params.clone()).await?;
                        let result = run_module(module.as_ref()).await;
                        module.close().await;
                        let row =
                            ResultRow::new(task, kind, Some(name.as_str()), &host.host, result?);
                        report.push(row);
                    }
                }
            }
            ModuleKind::LocalShell => {
                let params = LocalShellParams::validate_schema(&validation.params)?;
                let module = self.factory.local_shell(params).await?;
                let result = run_module(module.as_ref()).await?;
                report.push(ResultRow::new(task, kind, None, LOCALHOST, result));
            }
            ModuleKind::ApiCall => {
                let params = ApiCallParams::validate_schema(&validation.params)?;
                let module = self.factory.api_call(params).await?;
                let result = run_module(module.as_ref()).await?;
                report.push(ResultRow::new(task, kind, None, LOCALHOST, result));
            }
        }

        Ok(())
    }
}

async fn run_module(module: &dyn ValidatorModule) -> Result<ModuleResult, ValidatorError> {
    let result = module.run().await?;
    debug!(module = %module.kind(), status = %result.status, "check finished");
    Ok(result)
}

/// `<name> [YYYY-mm-dd HH:MM:SS tz]` in local time
fn report_title(name: &str) -> String {
    format!("{name} [{}]", Local::now().format("%Y-%m-%d %H:%M:%S %Z"))
}
