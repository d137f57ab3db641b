//! Core domain models for convention diagnostics and lint results
//!
//! Architecture: Rich Domain Models - Diagnostics know their ordering, their display form
//! and whether they cross a severity threshold
//! - LintReport acts as the aggregate root for everything a run produced
//! - Engine faults travel as diagnostics so one bad file never aborts a run

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Rule identifier reserved for files that could not be read or parsed
pub const INGESTION_ERROR_RULE: &str = "ingestion-error";

/// Rule identifier reserved for matcher faults on a single unit
pub const MATCH_ERROR_RULE: &str = "match-error";

/// Severity levels for convention diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational notes about older-but-working patterns
    Info,
    /// Deprecated patterns that should be migrated
    Warning,
    /// Patterns that must not ship
    Error,
}

impl Severity {
    /// Convert to string for display
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Whether this severity meets or exceeds a threshold
    pub fn meets(self, threshold: Severity) -> bool {
        self >= threshold
    }
}

impl FromStr for Severity {
    type Err = LintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" | "note" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(LintError::config(format!(
                "Unknown severity '{other}'. Expected one of: info, warning, error"
            ))),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A convention diagnostic attached to one rule and one source unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Identifier of the rule (or reserved engine rule) that produced this diagnostic
    pub rule_id: String,
    /// Severity level of this diagnostic
    pub severity: Severity,
    /// File path of the source unit
    pub file_path: PathBuf,
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed, in characters)
    pub column: u32,
    /// Human-readable description
    pub message: String,
    /// Suggested replacement text
    pub suggestion: Option<String>,
    /// Trimmed source line containing the match
    pub context: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic positioned at the start of the file
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        file_path: PathBuf,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            file_path,
            line: 1,
            column: 1,
            message: message.into(),
            suggestion: None,
            context: None,
        }
    }

    /// Diagnostic for a unit that failed to read or parse
    pub fn ingestion_failure(file_path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(INGESTION_ERROR_RULE, Severity::Error, file_path, message)
    }

    /// Diagnostic for a matcher that faulted on a unit
    pub fn match_failure(file_path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(MATCH_ERROR_RULE, Severity::Error, file_path, message)
    }

    /// Set line and column position
    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    /// Add a suggested replacement
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add source line context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Whether this diagnostic was produced by the engine rather than a convention rule
    pub fn is_engine_fault(&self) -> bool {
        self.rule_id == INGESTION_ERROR_RULE || self.rule_id == MATCH_ERROR_RULE
    }
}

/// Count of diagnostics by severity level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticCounts {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
}

impl DiagnosticCounts {
    /// Total number of diagnostics across all severities
    pub fn total(&self) -> usize {
        self.error + self.warning + self.info
    }

    /// Add a diagnostic to the counts
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }
}

/// Summary statistics for a lint run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LintSummary {
    /// Files discovered after path filtering
    pub total_files: usize,
    /// Units that were parsed and matched
    pub units_linted: usize,
    /// Files skipped because no category applies
    pub units_unclassified: usize,
    /// Units that failed ingestion or matching
    pub units_failed: usize,
    /// Units never dispatched because the run deadline expired
    pub units_not_dispatched: usize,
    /// Whether the run deadline expired before every unit was dispatched
    pub timed_out: bool,
    /// Diagnostics by severity
    pub diagnostics_by_severity: DiagnosticCounts,
    /// Total execution time in milliseconds
    pub execution_time_ms: u64,
}

/// Complete result of a lint run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LintReport {
    /// All diagnostics produced by the run
    pub diagnostics: Vec<Diagnostic>,
    /// Summary statistics
    pub summary: LintSummary,
    /// Fingerprint of the rule set used for this run
    pub ruleset_fingerprint: Option<String>,
}

impl LintReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic to the report
    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.summary.diagnostics_by_severity.add(diagnostic.severity);
        self.diagnostics.push(diagnostic);
    }

    /// Whether the report contains any diagnostics
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Highest severity observed, if any diagnostic exists
    pub fn max_severity(&self) -> Option<Severity> {
        self.diagnostics.iter().map(|d| d.severity).max()
    }

    /// Process exit status for the given threshold: 1 when any diagnostic meets it, else 0
    pub fn exit_code(&self, threshold: Severity) -> i32 {
        match self.max_severity() {
            Some(max) if max.meets(threshold) => 1,
            _ => 0,
        }
    }

    /// Set the number of files discovered
    pub fn set_files_analyzed(&mut self, count: usize) {
        self.summary.total_files = count;
    }

    /// Set the execution time
    pub fn set_execution_time(&mut self, duration_ms: u64) {
        self.summary.execution_time_ms = duration_ms;
    }

    /// Set the rule-set fingerprint
    pub fn set_ruleset_fingerprint(&mut self, fingerprint: impl Into<String>) {
        self.ruleset_fingerprint = Some(fingerprint.into());
    }

    /// Sort diagnostics by (path, line, column, rule id) so output never depends on
    /// the order in which units finished
    pub fn sort_diagnostics(&mut self) {
        self.diagnostics.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then_with(|| a.line.cmp(&b.line))
                .then_with(|| a.column.cmp(&b.column))
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });
    }
}

/// Error types that can occur while linting
#[derive(Debug, thiserror::Error)]
pub enum LintError {
    /// Rule table row or header could not be turned into a rule
    #[error("Rule load error (row {row}, line {line}): {message}")]
    RuleLoad { row: usize, line: usize, message: String },

    /// Command line or configuration file is invalid
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A source unit could not be read or parsed
    #[error("Ingestion error in {file}: {message}")]
    Ingestion { file: String, message: String, offset: Option<usize> },

    /// A matcher faulted on a source unit
    #[error("Match error in {file}: {message}")]
    Match { file: String, message: String },

    /// I/O failure outside per-unit processing
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl LintError {
    /// Create a rule load error
    pub fn rule_load(row: usize, line: usize, message: impl Into<String>) -> Self {
        Self::RuleLoad { row, line, message: message.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create an ingestion error without a known location
    pub fn ingestion(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Ingestion { file: file.into(), message: message.into(), offset: None }
    }

    /// Create an ingestion error located at a byte offset in the file
    pub fn ingestion_at(file: impl Into<String>, offset: usize, message: impl Into<String>) -> Self {
        Self::Ingestion { file: file.into(), message: message.into(), offset: Some(offset) }
    }

    /// Create a match error
    pub fn matching(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Match { file: file.into(), message: message.into() }
    }

    /// Process exit status for an error that escaped the run
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Result type for lint operations
pub type LintResult<T> = Result<T, LintError>;
