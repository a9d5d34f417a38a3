//! fleetcheck CLI
//!
//! Runs validation manifests against a fleet and lists the checks they declare

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::Result;
use eyre::WrapErr;
use tracing::info;

use fleetcheck_core::{
    DefaultModuleFactory, ListFormat, Manifest, ReportFile, ReportFormat, RunList,
    Stats, ValidationLister, Validator, Variables,
};
use fleetcheck_core::listing::LIST_FILE_NAME;

mod config;
mod logging;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "fleetcheck", version)]
#[command(about = "Validate a fleet of servers against a manifest of checks", long_about = None)]
struct Cli {
    /// Configuration file (defaults to FLEETCHECK_CONFIG or the standard locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the validations of a manifest and print the report
    Validate(ValidateArgs),
    /// List the validations declared by one or more manifests
    List(ListArgs),
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Path to the validation manifest
    #[arg(short, long, env = "FLEETCHECK_MANIFEST")]
    manifest: PathBuf,

    /// File to write the report to
    #[arg(short, long)]
    report_file: Option<PathBuf>,

    /// Report file format: csv, html, json or latex
    #[arg(short = 'f', long, value_parser = parse_report_format)]
    report_format: Option<ReportFormat>,

    /// Comma-separated list of tasks to run, or `all`
    #[arg(short = 'l', long, value_parser = parse_run)]
    run: Option<RunList>,

    /// Variables for the manifest placeholders, as a JSON object
    #[arg(short, long, value_parser = parse_extra_vars)]
    extra_vars: Option<Variables>,

    /// SSH connect timeout in seconds
    #[arg(long, env = "FLEETCHECK_SSH_TIMEOUT")]
    ssh_timeout: Option<u64>,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Manifests to list
    #[arg(short, long = "manifest", required = true, num_args = 1..)]
    manifests: Vec<PathBuf>,

    /// Output format: table, csv, html or json
    #[arg(short, long, default_value = "table", value_parser = parse_list_format)]
    format: ListFormat,

    /// Directory to write validation_list.txt into
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Variables for the manifest placeholders, as a JSON object
    #[arg(short, long, value_parser = parse_extra_vars)]
    extra_vars: Option<Variables>,
}

fn parse_report_format(s: &str) -> Result<ReportFormat, String> {
    s.parse()
}

fn parse_list_format(s: &str) -> Result<ListFormat, String> {
    s.parse()
}

fn parse_run(s: &str) -> Result<RunList, String> {
    let run: RunList = s.parse().map_err(|_| format!("invalid run list `{s}`"))?;
    if run == RunList::Tasks(Vec::new()) {
        return Err("run list must name at least one task".to_string());
    }
    Ok(run)
}

fn parse_extra_vars(s: &str) -> Result<Variables, String> {
    serde_json::from_str(s).map_err(|e| format!("extra vars must be a JSON object: {e}"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    logging::init(&config.log_level, config.log_format);

    match cli.command {
        Commands::Validate(args) => validate(args, &config).await,
        Commands::List(args) => list(args),
    }
}

async fn validate(args: ValidateArgs, config: &Config) -> Result<ExitCode> {
    let vars = args.extra_vars.unwrap_or_default();
    let connect_timeout = args
        .ssh_timeout
        .map_or_else(|| config.ssh.connect_timeout(), Duration::from_secs);

    let mut validator = Validator::from_path(&args.manifest, &vars)
        .wrap_err_with(|| format!("failed to load manifest {}", args.manifest.display()))?
        .with_factory(Arc::new(DefaultModuleFactory::new(connect_timeout)));

    if let Some(run) = args.run {
        validator = validator.with_run(run);
    }
    if let Some(path) = args.report_file {
        let format = match args.report_format {
            Some(format) => format,
            None => config.report_format()?,
        };
        validator = validator.with_report_file(ReportFile::new(path, format));
    }

    let (stats, table) = validator.validate().await?;
    println!("{table}");

    info!(
        total = stats.total,
        passed = stats.passed,
        failed = stats.failed,
        "run complete"
    );

    Ok(exit_code(&stats))
}

/// 1 as soon as one check failed, 0 otherwise (an empty run passes)
fn exit_code(stats: &Stats) -> ExitCode {
    if stats.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn list(args: ListArgs) -> Result<ExitCode> {
    let vars = args.extra_vars.unwrap_or_default();
    let manifests = args
        .manifests
        .iter()
        .map(|path| {
            Manifest::load(path, &vars)
                .wrap_err_with(|| format!("failed to load manifest {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let lister = ValidationLister::new(manifests);
    match args.output {
        Some(dir) => {
            let (content, path) = lister.export(&dir, args.format)?;
            println!("{content}");
            eprintln!("{LIST_FILE_NAME} exported to {}", path.display());
        }
        None => println!("{}", lister.render(args.format)),
    }

    Ok(ExitCode::SUCCESS)
}
