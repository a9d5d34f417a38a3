//! Inventory of the validations declared by a set of manifests

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::info;

use crate::error::ValidatorError;
use crate::manifest::{Manifest, Validation};
use crate::module::{ApiCallParams, ModuleKind};
use crate::table::Table;

/// File name written into the output directory
pub const LIST_FILE_NAME: &str = "validation_list.txt";

pub const LIST_HEADERS: [&str; 4] = ["VALIDATION NAME", "TASK NAME", "DESCRIPTION", "COMMAND"];

/// Output format of a validation listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFormat {
    #[default]
    Table,
    Csv,
    Html,
    Json,
}

impl FromStr for ListFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(ListFormat::Table),
            "csv" => Ok(ListFormat::Csv),
            "html" => Ok(ListFormat::Html),
            "json" => Ok(ListFormat::Json),
            other => Err(format!(
                "unknown list format `{other}` (expected table, csv, html or json)"
            )),
        }
    }
}

impl fmt::Display for ListFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ListFormat::Table => "table",
            ListFormat::Csv => "csv",
            ListFormat::Html => "html",
            ListFormat::Json => "json",
        })
    }
}

/// Lists every validation of every task, without running anything
#[derive(Debug, Clone, Default)]
pub struct ValidationLister {
    manifests: Vec<Manifest>,
}

impl ValidationLister {
    #[must_use]
    pub fn new(manifests: Vec<Manifest>) -> Self {
        Self { manifests }
    }

    #[must_use]
    pub fn table(&self) -> Table {
        let mut table = Table::new(LIST_HEADERS);
        for manifest in &self.manifests {
            for task in &manifest.tasks {
                for validation in &task.validations {
                    table.add_row(vec![
                        manifest.name.clone(),
                        task.name.clone(),
                        task.description.clone(),
                        command_of(validation),
                    ]);
                }
            }
        }
        table
    }

    #[must_use]
    pub fn render(&self, format: ListFormat) -> String {
        let table = self.table();
        match format {
            ListFormat::Table => table.to_text(),
            ListFormat::Csv => table.to_csv(),
            ListFormat::Html => table.to_html(),
            ListFormat::Json => table.to_json(),
        }
    }

    /// Render the listing and write it to `dir`/`validation_list.txt`,
    /// creating `dir` if needed. Returns the rendered text and the file path.
    ///
    /// # Errors
    /// Returns `ValidatorError::ReportWrite` if the directory or file cannot be written.
    pub fn export(&self, dir: &Path, format: ListFormat) -> Result<(String, PathBuf), ValidatorError> {
        let path = dir.join(LIST_FILE_NAME);
        let content = self.render(format);

        std::fs::create_dir_all(dir)
            .and_then(|()| std::fs::write(&path, &content))
            .map_err(|source| ValidatorError::ReportWrite {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), %format, "validation list exported");
        Ok((content, path))
    }
}

/// What a validation executes: the shell command, or `METHOD url` for HTTP probes
fn command_of(validation: &Validation) -> String {
    let field = |key: &str| {
        validation
            .params
            .get(key)
            .and_then(serde_yaml::Value::as_str)
            .map(String::from)
    };

    match ModuleKind::from_name(&validation.module) {
        Some(ModuleKind::RemoteShell | ModuleKind::LocalShell) => {
            field("command").unwrap_or_default()
        }
        Some(ModuleKind::ApiCall) => {
            match serde_yaml::from_value::<ApiCallParams>(validation.params.clone()) {
                Ok(params) => format!("{} {}", params.method.to_uppercase(), params.url()),
                Err(_) => field("host").unwrap_or_default(),
            }
        }
        None => String::new(),
    }
}
