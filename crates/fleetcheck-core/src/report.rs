//! Result rows, run statistics and report persistence

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::info;

use crate::error::ValidatorError;
use crate::manifest::Task;
use crate::module::ModuleKind;
use crate::result::{ModuleResult, Status};
use crate::table::Table;

/// Report column headers
pub const REPORT_HEADERS: [&str; 8] = [
    "NAME",
    "DESCRIPTION",
    "MODULE",
    "SERVER GROUP",
    "HOST",
    "INFO",
    "REASON",
    "STATUS",
];

/// One executed check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub task: String,
    pub description: String,
    pub module: ModuleKind,
    pub group: Option<String>,
    pub host: String,
    pub info: Option<String>,
    pub reason: Option<String>,
    pub status: Status,
}

impl ResultRow {
    #[must_use]
    pub fn new(
        task: &Task,
        module: ModuleKind,
        group: Option<&str>,
        host: &str,
        result: ModuleResult,
    ) -> Self {
        Self {
            task: task.name.clone(),
            description: task.description.clone(),
            module,
            group: group.map(String::from),
            host: host.to_string(),
            info: result.info,
            reason: result.reason,
            status: result.status,
        }
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.task.clone(),
            self.description.clone(),
            self.module.name().to_string(),
            self.group.clone().unwrap_or_default(),
            self.host.clone(),
            self.info.clone().unwrap_or_default(),
            self.reason.clone().unwrap_or_default(),
            self.status.label().to_string(),
        ]
    }
}

/// Run-level counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl Stats {
    #[must_use]
    pub fn new(total: usize, passed: usize, failed: usize) -> Self {
        Self {
            total,
            passed,
            failed,
        }
    }

    pub fn record(&mut self, status: Status) {
        self.total += 1;
        match status {
            Status::Pass => self.passed += 1,
            Status::Fail => self.failed += 1,
        }
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Serialization format of a report file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Html,
    Json,
    Latex,
}

impl ReportFormat {
    #[must_use]
    pub fn render(self, table: &Table) -> String {
        match self {
            ReportFormat::Csv => table.to_csv(),
            ReportFormat::Html => table.to_html(),
            ReportFormat::Json => table.to_json(),
            ReportFormat::Latex => table.to_latex(),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "html" => Ok(ReportFormat::Html),
            "json" => Ok(ReportFormat::Json),
            "latex" => Ok(ReportFormat::Latex),
            other => Err(format!(
                "unknown report format `{other}` (expected csv, html, json or latex)"
            )),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Html => "html",
            ReportFormat::Json => "json",
            ReportFormat::Latex => "latex",
        })
    }
}

/// Where and how to persist the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFile {
    pub path: PathBuf,
    pub format: ReportFormat,
}

impl ReportFile {
    pub fn new(path: impl Into<PathBuf>, format: ReportFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }
}

/// Rows and counters collected during one run
#[derive(Debug, Clone)]
pub struct Report {
    title: String,
    rows: Vec<ResultRow>,
    stats: Stats,
}

impl Report {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            rows: Vec::new(),
            stats: Stats::default(),
        }
    }

    pub fn push(&mut self, row: ResultRow) {
        self.stats.record(row.status);
        self.rows.push(row);
    }

    #[must_use]
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    #[must_use]
    pub fn stats(&self) -> Stats {
        self.stats
    }

    #[must_use]
    pub fn table(&self) -> Table {
        let mut table = Table::new(REPORT_HEADERS).with_title(self.title.clone());
        for row in &self.rows {
            table.add_row(row.cells());
        }
        table
    }

    /// Serialize the report once and write it to `file`
    ///
    /// # Errors
    /// Returns `ValidatorError::ReportWrite` if the file cannot be written.
    pub fn write(&self, file: &ReportFile) -> Result<(), ValidatorError> {
        let content = file.format.render(&self.table());
        std::fs::write(&file.path, content).map_err(|source| ValidatorError::ReportWrite {
            path: file.path.clone(),
            source,
        })?;
        info!(path = %file.path.display(), format = %file.format, "report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task {
            name: "disk_check".into(),
            description: "Checks disk usage".into(),
            validations: vec![],
        }
    }

    fn result(status: Status) -> ModuleResult {
        ModuleResult {
            status,
            reason: None,
            info: Some("ok".into()),
        }
    }

    #[test]
    fn test_stats_invariant() {
        let mut stats = Stats::default();
        stats.record(Status::Pass);
        stats.record(Status::Fail);
        stats.record(Status::Pass);

        assert_eq!(stats, Stats::new(3, 2, 1));
        assert_eq!(stats.total, stats.passed + stats.failed);
        assert!(stats.has_failures());
        assert!(!Stats::new(1, 1, 0).has_failures());
    }

    #[test]
    fn test_report_rows_and_table() {
        let mut report = Report::new("m [now]");
        report.push(ResultRow::new(
            &task(),
            ModuleKind::RemoteShell,
            Some("ms"),
            "10.0.0.1",
            result(Status::Pass),
        ));
        report.push(ResultRow::new(
            &task(),
            ModuleKind::LocalShell,
            None,
            "localhost",
            result(Status::Fail),
        ));

        assert_eq!(report.stats(), Stats::new(2, 1, 1));
        let csv = report.table().to_csv();
        assert!(csv.starts_with("NAME,DESCRIPTION,MODULE,SERVER GROUP,HOST,INFO,REASON,STATUS\r\n"));
        assert!(csv.contains("disk_check,Checks disk usage,remoteshell,ms,10.0.0.1,ok,,PASS ✅"));
        assert!(csv.contains("disk_check,Checks disk usage,localshell,,localhost,ok,,FAIL ❌"));
    }

    #[test]
    fn test_write_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = Report::new("m");

        report
            .write(&ReportFile::new(&path, ReportFormat::Json))
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"NAME\""));
    }

    #[test]
    fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.csv");

        let err = Report::new("m")
            .write(&ReportFile::new(&path, ReportFormat::Csv))
            .unwrap_err();
        assert!(matches!(err, ValidatorError::ReportWrite { .. }));
    }

    #[test]
    fn test_report_format_parsing() {
        assert_eq!("HTML".parse::<ReportFormat>(), Ok(ReportFormat::Html));
        assert_eq!(ReportFormat::Latex.to_string(), "latex");
        assert!("pdf".parse::<ReportFormat>().is_err());
    }
}
