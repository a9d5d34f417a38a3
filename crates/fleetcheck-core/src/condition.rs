//! Substring conditions (`contains` / `not_contains`)
//!
//! Patterns are literal substrings, never regular expressions.

use serde::Deserialize;

use crate::result::Verdict;

/// Matching policy for a list of patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Condition {
    /// At least one pattern must be present
    Any,
    /// Every pattern must be present
    #[default]
    All,
}

impl TryFrom<String> for Condition {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "any" => Ok(Condition::Any),
            "all" => Ok(Condition::All),
            _ => Err("'condition' must be one of 'any' or 'all'".to_string()),
        }
    }
}

/// Result of evaluating a condition.
///
/// `satisfied` and `not_found` are independent: under [`Condition::Any`] a
/// satisfied evaluation can still list patterns that were absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub satisfied: bool,
    pub not_found: Vec<String>,
}

impl Condition {
    #[must_use]
    pub fn evaluate(self, content: &str, patterns: &[String]) -> Evaluation {
        let not_found: Vec<String> = patterns
            .iter()
            .filter(|pattern| !content.contains(pattern.as_str()))
            .cloned()
            .collect();

        let satisfied = match self {
            Condition::All => not_found.is_empty(),
            Condition::Any => not_found.len() != patterns.len(),
        };

        Evaluation {
            satisfied,
            not_found,
        }
    }
}

/// A `contains` or `not_contains` block of a module's parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchRule {
    pub strings: Vec<String>,
    #[serde(default)]
    pub condition: Condition,
}

impl MatchRule {
    /// Passes when the condition is satisfied; otherwise returns the missing patterns.
    ///
    /// # Errors
    /// Returns the patterns that were not found.
    pub fn check_contains(&self, content: &str) -> Result<(), Vec<String>> {
        let eval = self.condition.evaluate(content, &self.strings);
        if eval.satisfied {
            Ok(())
        } else {
            Err(eval.not_found)
        }
    }

    /// Fails when the *same* condition is satisfied, so `all` only fails when
    /// every pattern is present.
    ///
    /// # Errors
    /// Returns the declared patterns that were found.
    pub fn check_not_contains(&self, content: &str) -> Result<(), Vec<String>> {
        let eval = self.condition.evaluate(content, &self.strings);
        if !eval.satisfied {
            return Ok(());
        }

        let mut found: Vec<String> = Vec::new();
        for pattern in &self.strings {
            if !eval.not_found.contains(pattern) && !found.contains(pattern) {
                found.push(pattern.clone());
            }
        }
        Err(found)
    }
}

/// Apply the optional `contains` and `not_contains` rules to `content`.
///
/// `subject` names what was searched in the failure reason
/// (e.g. "command output").
pub fn apply_rules(
    verdict: &mut Verdict,
    content: &str,
    contains: Option<&MatchRule>,
    not_contains: Option<&MatchRule>,
    subject: &str,
) {
    if let Some(rule) = contains {
        if let Err(missing) = rule.check_contains(content) {
            verdict.fail(format!(
                "The following patterns were not found in the {subject}: {missing:?}"
            ));
        }
    }

    if let Some(rule) = not_contains {
        if let Err(found) = rule.check_not_contains(content) {
            verdict.fail(format!(
                "The following patterns were found in the {subject}: {found:?}"
            ));
        }
    }
}
