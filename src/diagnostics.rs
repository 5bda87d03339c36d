//! Diagnostics collected during an export run.
//!
//! Checks never fail: they append a [`Diagnostic`] and carry on, so a single
//! run reports every problem in the scene. The highest severity recorded
//! decides the [`ExportStatus`] of the run.

use std::collections::HashSet;
use std::fmt;

/// Severity of a diagnostic, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// Advisory only; never changes the run status.
    Info,
    /// Recoverable problem; the run status becomes at least `Warning`.
    Warning,
    /// Data integrity violation; the output is not written.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Overall outcome of an export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ExportStatus {
    #[default]
    Ok,
    Warning,
    Error,
}

impl ExportStatus {
    /// Whether the output document may be written.
    pub fn allows_output(self) -> bool {
        self != ExportStatus::Error
    }
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExportStatus::Ok => "OK",
            ExportStatus::Warning => "WARNING",
            ExportStatus::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<8} {}", format!("{}:", self.severity), self.message)
    }
}

/// Ordered, deduplicated list of diagnostics for one run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    seen: HashSet<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic unless an identical one was already recorded.
    ///
    /// Every new entry is mirrored to the `tracing` log at its level.
    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            severity,
            message: message.into(),
        };
        if self.seen.contains(&diagnostic) {
            return;
        }
        match severity {
            Severity::Info => tracing::info!("{}", diagnostic.message),
            Severity::Warning => tracing::warn!("{}", diagnostic.message),
            Severity::Error => tracing::error!("{}", diagnostic.message),
        }
        self.seen.insert(diagnostic.clone());
        self.entries.push(diagnostic);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    /// Status implied by the highest severity recorded so far.
    pub fn status(&self) -> ExportStatus {
        match self.entries.iter().map(|d| d.severity).max() {
            Some(Severity::Error) => ExportStatus::Error,
            Some(Severity::Warning) => ExportStatus::Warning,
            Some(Severity::Info) | None => ExportStatus::Ok,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Diagnostics of exactly the given severity.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.severity == severity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if any diagnostic of `severity` contains `needle`.
    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.with_severity(severity).any(|d| d.message.contains(needle))
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_highest_severity() {
        let mut diags = Diagnostics::new();
        assert_eq!(diags.status(), ExportStatus::Ok);

        diags.info("naming choice");
        assert_eq!(diags.status(), ExportStatus::Ok);

        diags.warning("dropped event");
        assert_eq!(diags.status(), ExportStatus::Warning);

        diags.error("missing material");
        diags.info("later info");
        assert_eq!(diags.status(), ExportStatus::Error);
        assert!(!diags.status().allows_output());
    }

    #[test]
    fn test_identical_diagnostics_are_recorded_once() {
        let mut diags = Diagnostics::new();
        diags.error("no UV-Layer for UV-Mapped Object \"a\"");
        diags.error("no UV-Layer for UV-Mapped Object \"a\"");
        diags.warning("no UV-Layer for UV-Mapped Object \"a\"");
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn test_display() {
        let d = Diagnostic {
            severity: Severity::Warning,
            message: "x".to_string(),
        };
        assert_eq!(d.to_string(), "WARNING: x");
    }
}
