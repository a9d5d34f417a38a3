use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use fleetcheck_core::module::{
    ApiCall, ApiCallParams, LocalShell, LocalShellParams, RemoteShell, RemoteShellParams,
};
use fleetcheck_core::*;
use fleetcheck_exec::{CommandExecutor, CommandResult, ExecError};

// Mock implementations
struct MockExecutor {
    host: String,
    status: i32,
}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        Ok(CommandResult {
            status: self.status,
            stdout: format!("{} ran {cmd}", self.host),
            stderr: if self.status == 0 {
                String::new()
            } else {
                "command failed".to_string()
            },
            duration: Duration::from_millis(1),
        })
    }

    fn executor_type(&self) -> &'static str {
        "mock"
    }
}

/// Remote shells get a mock executor; local and HTTP checks are real
#[derive(Default)]
struct MockFactory {
    status: i32,
    connected: Mutex<Vec<String>>,
}

#[async_trait]
impl ModuleFactory for MockFactory {
    async fn remote_shell(
        &self,
        host: &Host,
        params: RemoteShellParams,
    ) -> Result<Box<dyn ValidatorModule>, ModuleError> {
        self.connected.lock().unwrap().push(host.host.clone());
        let executor = MockExecutor {
            host: host.host.clone(),
            status: self.status,
        };
        Ok(Box::new(RemoteShell::with_executor(
            &host.host,
            params,
            Box::new(executor),
        )))
    }

    async fn local_shell(
        &self,
        params: LocalShellParams,
    ) -> Result<Box<dyn ValidatorModule>, ModuleError> {
        Ok(Box::new(LocalShell::new(params)))
    }

    async fn api_call(
        &self,
        params: ApiCallParams,
    ) -> Result<Box<dyn ValidatorModule>, ModuleError> {
        Ok(Box::new(ApiCall::new(params)?))
    }
}

fn validator(manifest: &str, factory: Arc<MockFactory>) -> Validator {
    let manifest: Manifest = manifest.parse().expect("manifest should parse");
    Validator::new(manifest).with_factory(factory)
}

const SERVER_GROUPS: &str = r"
server_groups:
  ms:
    ms1: {host: 10.0.0.1, user: apigee, private_key: /keys/ms}
    ms2: {host: 10.0.0.2, user: apigee, private_key: /keys/ms, port: 2222}
  pg:
    - {host: 10.0.1.1, user: postgres, private_key: /keys/pg}
";

#[tokio::test]
async fn test_local_echo_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local.yml");
    std::fs::write(
        &path,
        r"
name: local
tasks:
  - name: echo_check
    description: Echo works
    validations:
      - localshell:
          command: echo hello
          contains:
            strings: [hello]
",
    )
    .unwrap();

    let validator = Validator::from_path(&path, &Variables::new()).unwrap();
    let (stats, table) = validator.validate().await.unwrap();

    assert_eq!(stats, Stats::new(1, 1, 0));
    assert!(!stats.has_failures());
    assert!(table.contains("echo_check"));
    assert!(table.contains("PASS ✅"));
}

#[tokio::test]
async fn test_unknown_server_group_is_fatal() {
    let manifest = format!(
        r"
name: groups
{SERVER_GROUPS}
tasks:
  - name: db_check
    description: Database is up
    validations:
      - remoteshell:
          command: pg_isready
          groups: [db]
"
    );
    let factory = Arc::new(MockFactory::default());

    let err = validator(&manifest, factory.clone())
        .validate()
        .await
        .unwrap_err();

    assert!(matches!(err, ValidatorError::UnknownServerGroup(ref name) if name == "db"));
    assert!(err.to_string().contains("`db`"));
    assert!(factory.connected.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_run_list_selects_tasks() {
    let manifest = r"
name: selection
run: [taskB]
tasks:
  - name: taskA
    description: first
    validations:
      - localshell: {command: echo a}
  - name: taskB
    description: second
    validations:
      - localshell: {command: echo b}
      - localshell: {command: echo bb}
";

    let report = validator(manifest, Arc::new(MockFactory::default()))
        .collect()
        .await
        .unwrap();

    assert_eq!(report.rows().len(), 2);
    assert!(report.rows().iter().all(|row| row.task == "taskB"));
}

#[tokio::test]
async fn test_run_override_replaces_manifest_run() {
    let manifest = r"
name: selection
tasks:
  - name: taskA
    description: first
    validations:
      - localshell: {command: echo a}
  - name: taskB
    description: second
    validations:
      - localshell: {command: echo b}
";

    let report = validator(manifest, Arc::new(MockFactory::default()))
        .with_run("taskA".parse().unwrap())
        .collect()
        .await
        .unwrap();

    assert_eq!(report.rows().len(), 1);
    assert_eq!(report.rows()[0].task, "taskA");
}

#[tokio::test]
async fn test_remote_fan_out_over_groups() {
    let manifest = format!(
        r"
name: fleet
{SERVER_GROUPS}
tasks:
  - name: uptime
    description: Hosts are up
    validations:
      - remoteshell:
          command: uptime
          groups: [ms, pg]
          contains:
            strings: [ran uptime]
"
    );
    let factory = Arc::new(MockFactory::default());

    let report = validator(&manifest, factory.clone())
        .collect()
        .await
        .unwrap();

    let placements: Vec<(Option<&str>, &str)> = report
        .rows()
        .iter()
        .map(|row| (row.group.as_deref(), row.host.as_str()))
        .collect();
    assert_eq!(
        placements,
        [
            (Some("ms"), "10.0.0.1"),
            (Some("ms"), "10.0.0.2"),
            (Some("pg"), "10.0.1.1"),
        ]
    );
    assert_eq!(report.stats(), Stats::new(3, 3, 0));
    assert!(report.rows().iter().all(|row| row.module == ModuleKind::RemoteShell));
    assert_eq!(
        report.rows()[1].info.as_deref(),
        Some("10.0.0.2 ran uptime")
    );
    assert_eq!(
        *factory.connected.lock().unwrap(),
        ["10.0.0.1", "10.0.0.2", "10.0.1.1"]
    );
}

#[tokio::test]
async fn test_remote_nonzero_exit_fails() {
    let manifest = format!(
        r"
name: fleet
{SERVER_GROUPS}
tasks:
  - name: status
    description: Service is active
    validations:
      - remoteshell:
          command: systemctl is-active edge
          groups: [pg]
          contains:
            strings: [ran]
"
    );
    let factory = Arc::new(MockFactory {
        status: 3,
        ..MockFactory::default()
    });

    let (stats, _) = validator(&manifest, factory).validate().await.unwrap();

    assert_eq!(stats, Stats::new(1, 0, 1));
    assert!(stats.has_failures());
}

#[tokio::test]
async fn test_failures_are_recorded_and_run_continues() {
    let manifest = r"
name: mixed
tasks:
  - name: broken
    description: Fails
    validations:
      - localshell: {command: 'echo nope >&2; exit 1'}
      - localshell:
          command: echo present
          not_contains: {strings: [present, absent], condition: any}
  - name: healthy
    description: Passes
    validations:
      - localshell: {command: 'true'}
";

    let report = validator(manifest, Arc::new(MockFactory::default()))
        .collect()
        .await
        .unwrap();
    let rows = report.rows();

    assert_eq!(report.stats(), Stats::new(3, 1, 2));
    assert_eq!(rows[0].status, Status::Fail);
    assert_eq!(rows[0].reason.as_deref(), Some("nope\n"));
    assert_eq!(rows[0].host, "localhost");
    assert_eq!(rows[0].group, None);
    assert_eq!(
        rows[1].reason.as_deref(),
        Some("The following patterns were found in the command output: [\"present\"]")
    );
    assert_eq!(rows[2].status, Status::Pass);
}

#[tokio::test]
async fn test_unknown_module_is_ignored() {
    let manifest = r"
name: quirks
tasks:
  - name: files
    description: Unsupported module
    validations:
      - filecheck: {path: /etc/hosts}
      - localshell: {command: echo ok}
";

    let report = validator(manifest, Arc::new(MockFactory::default()))
        .collect()
        .await
        .unwrap();

    assert_eq!(report.rows().len(), 1);
    assert_eq!(report.rows()[0].module, ModuleKind::LocalShell);
}

#[tokio::test]
async fn test_invalid_module_params_are_fatal() {
    let manifest = r"
name: broken
tasks:
  - name: first
    description: Valid
    validations:
      - localshell: {command: echo ok}
  - name: second
    description: Missing command
    validations:
      - localshell: {stream: stdout}
";

    let err = validator(manifest, Arc::new(MockFactory::default()))
        .validate()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ValidatorError::Module(ModuleError::Schema {
            module: "localshell",
            ..
        })
    ));
}

#[tokio::test]
async fn test_report_file_written_once() {
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join("report.csv");
    let manifest = r"
name: reported
tasks:
  - name: echo_check
    description: Echo works
    validations:
      - localshell: {command: echo hello, contains: {strings: [hello]}}
";

    let (stats, _) = validator(manifest, Arc::new(MockFactory::default()))
        .with_report_file(ReportFile::new(&report_path, ReportFormat::Csv))
        .validate()
        .await
        .unwrap();

    assert_eq!(stats, Stats::new(1, 1, 0));
    let csv = std::fs::read_to_string(&report_path).unwrap();
    let mut lines = csv.split("\r\n");
    assert_eq!(
        lines.next(),
        Some("NAME,DESCRIPTION,MODULE,SERVER GROUP,HOST,INFO,REASON,STATUS")
    );
    assert_eq!(
        lines.next(),
        Some("echo_check,Echo works,localshell,,localhost,\"hello\n\",,PASS ✅")
    );
}

#[tokio::test]
async fn test_report_write_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join("missing").join("report.html");
    let manifest = r"
name: reported
tasks:
  - name: t
    description: d
    validations:
      - localshell: {command: 'true'}
";

    let err = validator(manifest, Arc::new(MockFactory::default()))
        .with_report_file(ReportFile::new(&report_path, ReportFormat::Html))
        .validate()
        .await
        .unwrap_err();

    assert!(matches!(err, ValidatorError::ReportWrite { .. }));
}

#[tokio::test]
async fn test_variables_are_substituted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vars.yml");
    std::fs::write(
        &path,
        r"
name: {{ name }}
tasks:
  - name: greeting
    description: Greets {{ who }}
    validations:
      - localshell:
          command: echo {{ greeting }}
          contains: {strings: ['{{ greeting }}']}
",
    )
    .unwrap();

    let mut vars = Variables::new();
    vars.insert("name".into(), "templated".into());
    vars.insert("who".into(), "ops".into());
    vars.insert("greeting".into(), "bonjour".into());

    let validator = Validator::from_path(&path, &vars).unwrap();
    assert_eq!(validator.manifest().name, "templated");

    let report = validator.collect().await.unwrap();
    assert_eq!(report.rows()[0].description, "Greets ops");
    assert_eq!(report.rows()[0].status, Status::Pass);
}

#[tokio::test]
async fn test_missing_manifest_file() {
    let err = Validator::from_path(
        std::path::Path::new("/nonexistent/fleetcheck/manifest.yml"),
        &Variables::new(),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        ValidatorError::Manifest(ManifestError::Read { .. })
    ));
}
