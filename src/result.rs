//! Outcome envelope returned by remote operations.
//!
//! A [`CommandResult`] is recursive: a multi-step remote script reports one
//! nested result per step so failures can be traced to the step that caused
//! them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MISSING_DIAGNOSTICS: &str = "remote executor reported failure without diagnostics";

/// Result of a remote command or script.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    /// Whether the remote executor considers the operation successful.
    pub success: bool,
    /// Human-readable summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error text when the operation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Ordered results of the individual steps.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command_results: Vec<CommandResult>,
    /// Raw command output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Log lines captured while the operation ran.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogEntry>,
    /// Structured diagnostic payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// A single log line attached to a [`CommandResult`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LogEntry {
    /// When the line was emitted, if the executor reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Severity label such as `info` or `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Log text.
    pub message: String,
}

/// Raised when a failed result carries no diagnostics.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InvariantViolation;

impl CommandResult {
    /// Builds a successful result with a message.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Builds a failed result with an error.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Attaches step results.
    #[must_use]
    pub fn with_steps(mut self, steps: Vec<Self>) -> Self {
        self.command_results = steps;
        self
    }

    /// Attaches a structured details payload.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Checks that a failure is explained by `error` or a failed step.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation`] when `success` is false and neither
    /// an error text nor a failed nested step is present.
    pub fn check_invariant(&self) -> Result<(), InvariantViolation> {
        if self.success || self.has_error_text() || self.command_results.iter().any(|r| !r.success)
        {
            return Ok(());
        }
        Err(InvariantViolation)
    }

    /// Returns the result with the failure invariant restored.
    #[must_use]
    pub fn normalised(mut self) -> Self {
        if self.check_invariant().is_err() {
            self.error = Some(
                self.message
                    .clone()
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| MISSING_DIAGNOSTICS.to_owned()),
            );
        }
        self
    }

    /// Returns `true` when the top-level operation failed but at least one
    /// nested step succeeded, meaning the remote side may have changed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.success && self.command_results.iter().any(|step| step.success)
    }

    /// Failed leaf steps in depth-first order.
    #[must_use]
    pub fn failed_steps(&self) -> Vec<&Self> {
        let mut collected = Vec::new();
        self.collect_leaves(false, &mut collected);
        collected
    }

    /// Successful leaf steps in depth-first order.
    #[must_use]
    pub fn succeeded_steps(&self) -> Vec<&Self> {
        let mut collected = Vec::new();
        self.collect_leaves(true, &mut collected);
        collected
    }

    /// Best human-readable description of the outcome.
    #[must_use]
    pub fn summary(&self) -> String {
        self.error
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .or(self.message.as_deref())
            .map_or_else(
                || {
                    if self.success {
                        String::from("ok")
                    } else {
                        MISSING_DIAGNOSTICS.to_owned()
                    }
                },
                ToOwned::to_owned,
            )
    }

    fn has_error_text(&self) -> bool {
        self.error.as_deref().is_some_and(|text| !text.trim().is_empty())
    }

    fn collect_leaves<'a>(&'a self, success: bool, out: &mut Vec<&'a Self>) {
        for step in &self.command_results {
            if step.command_results.is_empty() {
                if step.success == success {
                    out.push(step);
                }
            } else {
                step.collect_leaves(success, out);
            }
        }
    }
}
