//! Manifest schema
//!
//! A manifest names a set of tasks, each an ordered list of validations, plus
//! optional server groups that `remoteshell` validations fan out over.
//! Parsing fills defaults and rejects unknown keys, so a `Manifest` value is
//! always schema-valid.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::error::ManifestError;
use crate::render::{Variables, render};

/// A parsed, schema-valid manifest
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Manifest name, shown in the report title
    pub name: String,
    /// Which tasks to execute
    #[serde(default)]
    pub run: RunList,
    /// Named host collections
    #[serde(default)]
    pub server_groups: Option<BTreeMap<String, ServerGroup>>,
    /// Tasks in execution order
    pub tasks: Vec<Task>,
}

impl Manifest {
    /// Read a manifest file, substitute `vars` and validate it
    ///
    /// # Errors
    /// Returns `ManifestError::Read` if the file cannot be read and
    /// `ManifestError::Schema` if the rendered text is not a valid manifest.
    pub fn load(path: &Path, vars: &Variables) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        render(&text, vars).parse()
    }

    /// Look up a server group by name
    #[must_use]
    pub fn server_group(&self, name: &str) -> Option<&ServerGroup> {
        self.server_groups.as_ref()?.get(name)
    }

    fn check(&self) -> Result<(), ManifestError> {
        if self.tasks.is_empty() {
            return Err(ManifestError::Schema(
                "'tasks' must contain at least one task".to_string(),
            ));
        }

        for task in &self.tasks {
            if task.name.is_empty() {
                return Err(ManifestError::Schema(
                    "'name' field is missing/contains invalid value".to_string(),
                ));
            }
            if task.name.chars().any(char::is_whitespace) {
                return Err(ManifestError::Schema(format!(
                    "'name' must not contain any spaces (use _ instead): `{}`",
                    task.name
                )));
            }
        }

        Ok(())
    }
}

impl FromStr for Manifest {
    type Err = ManifestError;

    /// Parse already-rendered manifest text
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let manifest: Manifest = serde_yaml::from_str(text)?;
        manifest.check()?;
        Ok(manifest)
    }
}

/// The `run` section: every task, or an explicit list of task names
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawRunList")]
pub enum RunList {
    #[default]
    All,
    Tasks(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRunList {
    Keyword(String),
    Tasks(Vec<String>),
}

impl TryFrom<RawRunList> for RunList {
    type Error = String;

    fn try_from(raw: RawRunList) -> Result<Self, Self::Error> {
        match raw {
            RawRunList::Keyword(keyword) if keyword == "all" => Ok(RunList::All),
            RawRunList::Keyword(other) => Err(format!(
                "'run' must be \"all\" or a list of task names, got `{other}`"
            )),
            RawRunList::Tasks(tasks) => Ok(RunList::Tasks(tasks)),
        }
    }
}

impl RunList {
    /// Whether the task with the given name should execute
    #[must_use]
    pub fn includes(&self, task: &str) -> bool {
        match self {
            RunList::All => true,
            RunList::Tasks(tasks) => tasks.iter().any(|t| t == task),
        }
    }
}

impl FromStr for RunList {
    type Err = std::convert::Infallible;

    /// Parse `all` or a comma-separated list of task names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == "all" {
            return Ok(RunList::All);
        }
        Ok(RunList::Tasks(
            s.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect(),
        ))
    }
}

/// SSH target of a server group
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Host {
    /// Host name or address
    pub host: String,
    /// SSH user
    pub user: String,
    /// Path to the SSH private key
    pub private_key: PathBuf,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    22
}

/// A server group, written either as a list of hosts or as a map of named hosts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerGroup {
    List(Vec<Host>),
    /// Named hosts, kept in declaration order
    Named(Vec<(String, Host)>),
}

impl ServerGroup {
    /// Hosts of the group in declaration order
    #[must_use]
    pub fn hosts(&self) -> Vec<&Host> {
        match self {
            ServerGroup::List(hosts) => hosts.iter().collect(),
            ServerGroup::Named(named) => named.iter().map(|(_, host)| host).collect(),
        }
    }
}

impl<'de> Deserialize<'de> for ServerGroup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ServerGroupVisitor;

        impl<'de> Visitor<'de> for ServerGroupVisitor {
            type Value = ServerGroup;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of hosts or a map of host name to host")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut hosts = Vec::new();
                while let Some(host) = seq.next_element::<Host>()? {
                    hosts.push(host);
                }
                Ok(ServerGroup::List(hosts))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut hosts = Vec::new();
                while let Some((name, host)) = map.next_entry::<String, Host>()? {
                    hosts.push((name, host));
                }
                Ok(ServerGroup::Named(hosts))
            }
        }

        deserializer.deserialize_any(ServerGroupVisitor)
    }
}

/// A named unit of work
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Task {
    pub name: String,
    pub description: String,
    pub validations: Vec<Validation>,
}

/// One module invocation: a single-entry map from module name to parameters.
///
/// Parameters stay untyped here; each module validates its own block.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "serde_yaml::Mapping")]
pub struct Validation {
    pub module: String,
    pub params: serde_yaml::Value,
}

impl TryFrom<serde_yaml::Mapping> for Validation {
    type Error = String;

    fn try_from(mapping: serde_yaml::Mapping) -> Result<Self, Self::Error> {
        if mapping.len() != 1 {
            return Err(format!(
                "each validation must map exactly one module name to its parameters, found {} keys",
                mapping.len()
            ));
        }

        let Some((key, params)) = mapping.into_iter().next() else {
            return Err("empty validation".to_string());
        };
        let serde_yaml::Value::String(module) = key else {
            return Err("validation module name must be a string".to_string());
        };

        Ok(Validation { module, params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r"
name: core-checks
server_groups:
  ms:
    - host: 10.0.0.1
      user: ops
      private_key: /etc/keys/priv
      port: 2222
    - host: 10.0.0.2
      user: ops
      private_key: /etc/keys/priv
  pg:
    pg_2:
      host: 10.0.1.2
      user: ops
      private_key: /etc/keys/priv
    pg_1:
      host: 10.0.1.1
      user: ops
      private_key: /etc/keys/priv
tasks:
  - name: echo_works
    description: Validates that echo works
    validations:
      - localshell:
          command: echo hello
";

    #[test]
    fn test_parse_fills_defaults() {
        let manifest: Manifest = MANIFEST.parse().unwrap();

        assert_eq!(manifest.name, "core-checks");
        assert_eq!(manifest.run, RunList::All);
        assert_eq!(manifest.tasks.len(), 1);
        assert_eq!(manifest.tasks[0].validations[0].module, "localshell");

        let ms = manifest.server_group("ms").unwrap().hosts();
        assert_eq!(ms.len(), 2);
        assert_eq!(ms[0].port, 2222);
        assert_eq!(ms[1].port, 22);
    }

    #[test]
    fn test_named_hosts_keep_declaration_order() {
        let manifest: Manifest = MANIFEST.parse().unwrap();
        let pg = manifest.server_group("pg").unwrap().hosts();

        let addrs: Vec<&str> = pg.iter().map(|h| h.host.as_str()).collect();
        assert_eq!(addrs, ["10.0.1.2", "10.0.1.1"]);
    }

    #[test]
    fn test_malformed_server_group_names_accepted_shapes() {
        let text = r"
name: m
server_groups:
  ms: 10.0.0.1
tasks:
  - name: t
    description: d
    validations: []
";
        let err = text.parse::<Manifest>().unwrap_err().to_string();
        assert!(err.contains("a list of hosts or a map of host name to host"), "{err}");
    }

    #[test]
    fn test_host_errors_surface_through_group() {
        let text = r"
name: m
server_groups:
  ms:
    - host: 10.0.0.1
      user: ops
tasks:
  - name: t
    description: d
    validations: []
";
        let err = text.parse::<Manifest>().unwrap_err().to_string();
        assert!(err.contains("private_key"), "{err}");
    }

    #[test]
    fn test_missing_group_lookup() {
        let manifest: Manifest = MANIFEST.parse().unwrap();
        assert!(manifest.server_group("db").is_none());
    }

    #[test]
    fn test_task_name_with_space_rejected() {
        let text = r"
name: m
tasks:
  - name: bad name
    description: d
    validations: []
";
        let err = text.parse::<Manifest>().unwrap_err();
        assert!(err.to_string().contains("must not contain any spaces"));
    }

    #[test]
    fn test_empty_or_tabbed_task_name_rejected() {
        let empty = "name: m\ntasks:\n  - name: ''\n    description: d\n    validations: []\n";
        let err = empty.parse::<Manifest>().unwrap_err();
        assert!(err.to_string().contains("'name' field is missing/contains invalid value"));

        let tabbed = "name: m\ntasks:\n  - name: \"a\\tb\"\n    description: d\n    validations: []\n";
        let err = tabbed.parse::<Manifest>().unwrap_err();
        assert!(err.to_string().contains("must not contain any spaces"));
    }

    #[test]
    fn test_empty_tasks_rejected() {
        let err = "name: m\ntasks: []\n".parse::<Manifest>().unwrap_err();
        assert!(err.to_string().contains("at least one task"));
    }

    #[test]
    fn test_missing_description_rejected() {
        let text = r"
name: m
tasks:
  - name: t
    validations: []
";
        assert!(text.parse::<Manifest>().is_err());
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let text = r"
name: m
extra: 1
tasks:
  - name: t
    description: d
    validations: []
";
        assert!(text.parse::<Manifest>().is_err());
    }

    #[test]
    fn test_run_list_parsing() {
        let text = r"
name: m
run: [taskB]
tasks:
  - name: taskA
    description: a
    validations: []
  - name: taskB
    description: b
    validations: []
";
        let manifest: Manifest = text.parse().unwrap();
        assert!(!manifest.run.includes("taskA"));
        assert!(manifest.run.includes("taskB"));

        let bad = text.replace("run: [taskB]", "run: some");
        assert!(bad.parse::<Manifest>().is_err());
    }

    #[test]
    fn test_validation_must_have_single_key() {
        let text = r"
name: m
tasks:
  - name: t
    description: d
    validations:
      - localshell: {command: ls}
        apicall: {host: x}
";
        let err = text.parse::<Manifest>().unwrap_err();
        assert!(err.to_string().contains("exactly one module name"));
    }

    #[test]
    fn test_run_list_from_str() {
        assert_eq!("all".parse::<RunList>().unwrap(), RunList::All);
        assert_eq!(
            "a, b,".parse::<RunList>().unwrap(),
            RunList::Tasks(vec!["a".into(), "b".into()])
        );
    }
}
