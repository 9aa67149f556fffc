//! Error taxonomy and the error listener contract
//!
//! Non-fatal findings (violations, load warnings, policy load failures) flow
//! through [`ErrorListener`]; only I/O and parse failures on the inputs
//! themselves are surfaced as [`CheckError`] and abort the affected call
//! chain.

use std::error::Error;
use std::io;
use std::path::PathBuf;

use jfence_classfile::DecodeError;
use serde::Serialize;
use thiserror::Error as ThisError;

use crate::location::Location;

/// Fatal errors: the inputs themselves could not be read or parsed
#[derive(Debug, ThisError)]
pub enum CheckError {
    /// I/O failure on a file or classpath resource
    #[error("I/O error on {path}")]
    Io {
        /// The file or resource that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// A class file under inspection could not be parsed
    #[error("failed to parse class file {path}")]
    ClassFile {
        /// The offending file
        path: PathBuf,
        /// Underlying decode error
        #[source]
        source: DecodeError,
    },
}

/// Severity of a reported finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A restriction violation or load failure
    Error,
    /// A non-fatal condition, e.g. a missing index entry definition
    Warning,
}

/// A single reported finding, detached from the transient [`Location`]
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Error or warning
    pub severity: Severity,
    /// Rendered use-site, `class:line`, when one applies
    pub location: Option<String>,
    /// Human-readable message
    pub message: String,
    /// Rendered underlying cause, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

/// Where errors and warnings are sent.
///
/// Locations are only valid for the duration of the call; listeners that keep
/// findings render them into [`Report`]s immediately.
pub trait ErrorListener {
    /// Report an error: a violation, a policy that failed to load, or a
    /// failed secondary inspection.
    fn on_error(&mut self, cause: Option<&dyn Error>, location: Option<&Location<'_>>, message: &str);

    /// Report a non-fatal warning.
    fn on_warning(
        &mut self,
        cause: Option<&dyn Error>,
        location: Option<&Location<'_>>,
        message: &str,
    );
}

/// Listener that discards everything
#[derive(Debug, Default)]
pub struct NullListener;

impl ErrorListener for NullListener {
    fn on_error(&mut self, _: Option<&dyn Error>, _: Option<&Location<'_>>, _: &str) {}
    fn on_warning(&mut self, _: Option<&dyn Error>, _: Option<&Location<'_>>, _: &str) {}
}

/// Listener that accumulates findings in memory
#[derive(Debug, Default)]
pub struct CollectingListener {
    /// Everything reported so far, in arrival order
    pub reports: Vec<Report>,
}

impl CollectingListener {
    /// Create an empty listener
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any error (not warning) was reported
    pub fn has_errors(&self) -> bool {
        self.reports.iter().any(|r| r.severity == Severity::Error)
    }

    /// The error reports only
    pub fn errors(&self) -> impl Iterator<Item = &Report> {
        self.reports
            .iter()
            .filter(|r| r.severity == Severity::Error)
    }

    /// The warning reports only
    pub fn warnings(&self) -> impl Iterator<Item = &Report> {
        self.reports
            .iter()
            .filter(|r| r.severity == Severity::Warning)
    }

    fn push(
        &mut self,
        severity: Severity,
        cause: Option<&dyn Error>,
        location: Option<&Location<'_>>,
        message: &str,
    ) {
        self.reports.push(Report {
            severity,
            location: location.map(|l| l.to_string()),
            message: message.to_string(),
            cause: cause.map(|c| c.to_string()),
        });
    }
}

impl ErrorListener for CollectingListener {
    fn on_error(
        &mut self,
        cause: Option<&dyn Error>,
        location: Option<&Location<'_>>,
        message: &str,
    ) {
        self.push(Severity::Error, cause, location, message);
    }

    fn on_warning(
        &mut self,
        cause: Option<&dyn Error>,
        location: Option<&Location<'_>>,
        message: &str,
    ) {
        self.push(Severity::Warning, cause, location, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_listener_severities() {
        let mut listener = CollectingListener::new();
        listener.on_warning(None, None, "just noting");
        assert!(!listener.has_errors());
        listener.on_error(None, None, "broken");
        assert!(listener.has_errors());
        assert_eq!(listener.errors().count(), 1);
        assert_eq!(listener.warnings().count(), 1);
    }

    #[test]
    fn test_report_serialization_shape() {
        let report = Report {
            severity: Severity::Error,
            location: Some("a.B:12".to_string()),
            message: "m".to_string(),
            cause: None,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"severity\":\"error\""));
        assert!(!json.contains("cause"));
    }
}
