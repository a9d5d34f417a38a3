//! Shared evaluation for the shell modules

use fleetcheck_exec::CommandResult;
use serde::Deserialize;

use crate::condition::{MatchRule, apply_rules};
use crate::result::{ModuleResult, Verdict};

/// Output stream a shell check inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Stream {
    #[default]
    Stdout,
    Stderr,
}

impl TryFrom<String> for Stream {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "stdout" => Ok(Stream::Stdout),
            "stderr" => Ok(Stream::Stderr),
            _ => Err("'stream' must be one of 'stdout' or 'stderr'".to_string()),
        }
    }
}

impl Stream {
    #[must_use]
    pub fn select(self, result: &CommandResult) -> &str {
        match self {
            Stream::Stdout => &result.stdout,
            Stream::Stderr => &result.stderr,
        }
    }
}

/// Turn a finished command into a module result.
///
/// A non-zero exit fails the check with stderr as the reason. The selected
/// stream is then matched against the rules regardless, and becomes `info`.
#[must_use]
pub fn evaluate(
    result: &CommandResult,
    stream: Stream,
    contains: Option<&MatchRule>,
    not_contains: Option<&MatchRule>,
) -> ModuleResult {
    let mut verdict = Verdict::pass();

    if !result.success() {
        verdict.fail(result.stderr.clone());
    }

    let output = stream.select(result);
    apply_rules(&mut verdict, output, contains, not_contains, "command output");

    verdict.finish(Some(output.to_string()))
}
