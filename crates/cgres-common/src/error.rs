//! Error types for the container resource detection subsystem.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for callers deciding whether to retry
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! Errors can be formatted for human consumption with headline, reason, and fix:
//! ```text
//! ✗ Cgroup Mount Not Found
//!   Reason: no cgroup2 mount found in /proc/self/mountinfo
//!   Fix: confirm the host mounts a cgroup filesystem before querying limits
//! ```
//!
//! These errors are internal to detection (factory init, file readers). The
//! public facade never surfaces them to callers: a failed read becomes
//! `MetricResult::Unavailable` instead of an `Err`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for detection-subsystem operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// `/proc` or cgroup filesystem discovery errors.
    Discovery,
    /// Reading or parsing a controller file.
    Controller,
    /// Platform compatibility errors (non-Linux, missing kernel features).
    Platform,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Discovery => write!(f, "discovery"),
            ErrorCategory::Controller => write!(f, "controller"),
            ErrorCategory::Platform => write!(f, "platform"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Suggested actions a caller can take in response to an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the operation (the file may be transiently unreadable).
    Retry,
    /// Treat the metric as unavailable and move on.
    TreatUnavailable,
    /// No action needed (informational).
    None,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::TreatUnavailable => write!(f, "treat_unavailable"),
            SuggestedAction::None => write!(f, "none"),
        }
    }
}

/// Unified error type for the detection subsystem.
///
/// These errors are used internally by the factory and controller readers.
/// They never cross the public facade boundary: `Controller` methods and
/// `ResourceLimits` queries convert every variant here into
/// `MetricResult::Unavailable` rather than propagating it.
#[derive(Error, Debug)]
pub enum Error {
    // Discovery errors (10-19)
    #[error("could not parse /proc/cgroups: {0}")]
    ProcCgroupsParse(String),

    #[error("could not parse /proc/{pid}/cgroup: {0}", pid = pid)]
    ProcSelfCgroupParse { pid: u32, source: String },

    #[error("no cgroup mount found for controller '{0}' in /proc/self/mountinfo")]
    MountNotFound(String),

    #[error("required controller '{0}' is disabled in this kernel")]
    KernelMisconfigured(String),

    // Controller errors (20-29)
    #[error("controller file missing: {0}")]
    FileMissing(String),

    #[error("controller path exceeds PATH_MAX: {0}")]
    PathTooLong(String),

    #[error("could not parse controller file {path}: {reason}")]
    ParseError { path: String, reason: String },

    // Platform errors (30-39)
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    // I/O errors (40-49)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Codes are stable and grouped by category:
    /// - 10-19: discovery
    /// - 20-29: controller
    /// - 30-39: platform
    /// - 40-49: I/O
    pub fn code(&self) -> u32 {
        match self {
            Error::ProcCgroupsParse(_) => 10,
            Error::ProcSelfCgroupParse { .. } => 11,
            Error::MountNotFound(_) => 12,
            Error::KernelMisconfigured(_) => 13,
            Error::FileMissing(_) => 20,
            Error::PathTooLong(_) => 21,
            Error::ParseError { .. } => 22,
            Error::UnsupportedPlatform(_) => 30,
            Error::Io(_) => 40,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ProcCgroupsParse(_)
            | Error::ProcSelfCgroupParse { .. }
            | Error::MountNotFound(_)
            | Error::KernelMisconfigured(_) => ErrorCategory::Discovery,

            Error::FileMissing(_) | Error::PathTooLong(_) | Error::ParseError { .. } => {
                ErrorCategory::Controller
            }

            Error::UnsupportedPlatform(_) => ErrorCategory::Platform,

            Error::Io(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable by retrying.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::ProcCgroupsParse(_) => false,
            Error::ProcSelfCgroupParse { .. } => false,
            Error::MountNotFound(_) => false,
            Error::KernelMisconfigured(_) => false,
            Error::FileMissing(_) => false,
            Error::PathTooLong(_) => false,
            Error::ParseError { .. } => false,
            Error::UnsupportedPlatform(_) => false,
            Error::Io(_) => true,
        }
    }

    /// Returns the suggested action for callers.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Io(_) => SuggestedAction::Retry,
            _ => SuggestedAction::TreatUnavailable,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::ProcCgroupsParse(_) => {
                "Confirm /proc/cgroups exists and has the expected 'name hierarchy num_cgroups enabled' columns."
            }
            Error::ProcSelfCgroupParse { .. } => {
                "Confirm /proc/<pid>/cgroup exists and the caller has permission to read it."
            }
            Error::MountNotFound(_) => {
                "Confirm the host mounts a cgroup (v1) or cgroup2 (v2) filesystem before querying limits."
            }
            Error::KernelMisconfigured(_) => {
                "The kernel has this controller compiled out or disabled at boot; limits for it are unavailable."
            }
            Error::FileMissing(_) => {
                "The controller file does not exist at this hierarchy level; the hierarchy adjuster will search upward."
            }
            Error::PathTooLong(_) => {
                "The constructed cgroup path exceeds PATH_MAX; this subsystem will not attempt to read it."
            }
            Error::ParseError { .. } => {
                "The controller file contents did not match the expected format for this kernel version."
            }
            Error::UnsupportedPlatform(_) => {
                "Container-aware resource detection is only implemented for Linux."
            }
            Error::Io(_) => "Transient I/O failure reading a controller file; safe to retry.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::ProcCgroupsParse(_) => "Cannot Parse /proc/cgroups",
            Error::ProcSelfCgroupParse { .. } => "Cannot Parse /proc/<pid>/cgroup",
            Error::MountNotFound(_) => "Cgroup Mount Not Found",
            Error::KernelMisconfigured(_) => "Controller Disabled",
            Error::FileMissing(_) => "Controller File Missing",
            Error::PathTooLong(_) => "Cgroup Path Too Long",
            Error::ParseError { .. } => "Controller File Parse Error",
            Error::UnsupportedPlatform(_) => "Unsupported Platform",
            Error::Io(_) => "I/O Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,
    /// Error category for grouping.
    pub category: ErrorCategory,
    /// Human-readable error message.
    pub message: String,
    /// Whether the error is potentially recoverable.
    pub recoverable: bool,
    /// Suggested action for the caller.
    pub suggested_action: SuggestedAction,
    /// Additional structured context (e.g., path, pid).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();
        if let Error::ProcSelfCgroupParse { pid, .. } = err {
            context.insert("pid".to_string(), serde_json::json!(pid));
        }
        if let Error::ParseError { path, .. } = err {
            context.insert("path".to_string(), serde_json::json!(path));
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code))
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(Error::MountNotFound("cpu".into()).code(), 12);
        assert_eq!(Error::FileMissing("memory.max".into()).code(), 20);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            Error::MountNotFound("cpu".into()).category(),
            ErrorCategory::Discovery
        );
        assert_eq!(
            Error::FileMissing("memory.max".into()).category(),
            ErrorCategory::Controller
        );
    }

    #[test]
    fn test_recoverable_only_io() {
        assert!(!Error::MountNotFound("cpu".into()).is_recoverable());
        assert!(Error::Io(std::io::Error::other("x")).is_recoverable());
    }

    #[test]
    fn test_structured_error_from_error() {
        let err = Error::ParseError {
            path: "/sys/fs/cgroup/memory/memory.limit_in_bytes".into(),
            reason: "not a number".into(),
        };
        let structured = StructuredError::from(&err);

        assert_eq!(structured.code, 22);
        assert_eq!(structured.category, ErrorCategory::Controller);
        assert!(!structured.recoverable);
        assert_eq!(
            structured.context.get("path").and_then(|v| v.as_str()),
            Some("/sys/fs/cgroup/memory/memory.limit_in_bytes")
        );
    }

    #[test]
    fn test_format_error_human() {
        let err = Error::MountNotFound("pids".into());
        let formatted = format_error_human(&err, false);

        assert!(formatted.contains("Cgroup Mount Not Found"));
        assert!(formatted.contains("no cgroup mount found for controller 'pids'"));
        assert!(formatted.contains("Fix:"));
    }
}
