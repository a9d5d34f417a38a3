//! Outcome types shared by every validator module

use std::fmt;

/// Outcome of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pass,
    Fail,
}

impl Status {
    /// Human-readable label used in reports
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Status::Pass => "PASS ✅",
            Status::Fail => "FAIL ❌",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result returned by [`ValidatorModule::run`](crate::module::ValidatorModule::run)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleResult {
    pub status: Status,
    pub reason: Option<String>,
    pub info: Option<String>,
}

impl ModuleResult {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == Status::Fail
    }
}

/// Accumulates the outcome of the rules applied to one check.
///
/// Starts as PASS. Every failing rule sets FAIL and replaces the reason;
/// nothing ever sets it back to PASS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    status: Status,
    reason: Option<String>,
}

impl Default for Verdict {
    fn default() -> Self {
        Self::pass()
    }
}

impl Verdict {
    #[must_use]
    pub fn pass() -> Self {
        Self {
            status: Status::Pass,
            reason: None,
        }
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = Status::Fail;
        self.reason = Some(reason.into());
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    #[must_use]
    pub fn finish(self, info: Option<String>) -> ModuleResult {
        ModuleResult {
            status: self.status,
            reason: self.reason,
            info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels() {
        assert_eq!(Status::Pass.to_string(), "PASS ✅");
        assert_eq!(Status::Fail.to_string(), "FAIL ❌");
        assert_ne!(Status::Pass, Status::Fail);
    }

    #[test]
    fn test_verdict_last_reason_wins_and_never_unfails() {
        let mut verdict = Verdict::pass();
        verdict.fail("exit status 1");
        verdict.fail("pattern missing");

        let result = verdict.finish(Some("out".into()));
        assert!(result.is_failure());
        assert_eq!(result.reason.as_deref(), Some("pattern missing"));
        assert_eq!(result.info.as_deref(), Some("out"));
    }
}
