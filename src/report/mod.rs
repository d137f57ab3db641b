//! Report generation with multiple output formats
//!
//! CDD Principle: Anti-Corruption Layer - Formatters translate domain objects to external formats
//! - Pattern matches become diagnostics here, and only here
//! - Each formatter encapsulates the rules for its specific output format
//! - Machine-readable formats carry no timestamps or timings, so identical runs are byte-identical

use crate::domain::{Diagnostic, LintError, LintReport, LintResult, Severity};
use crate::ingest::SourceUnit;
use crate::patterns::PatternMatch;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Longest snippet quoted in a diagnostic message
const SNIPPET_LIMIT: usize = 80;

/// Supported output formats for lint reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable format with colors and context
    #[default]
    Text,
    /// Ordered JSON array for programmatic consumption
    Json,
    /// GitHub Actions workflow annotations
    GitHub,
    /// SARIF 2.1.0 for code-scanning upload
    Sarif,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::GitHub => "github",
            Self::Sarif => "sarif",
        }
    }

    /// Get all available format names
    pub fn all_formats() -> &'static [&'static str] {
        &["text", "json", "github", "sarif"]
    }
}

impl FromStr for OutputFormat {
    type Err = LintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "human" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "github" => Ok(Self::GitHub),
            "sarif" => Ok(Self::Sarif),
            other => Err(LintError::config(format!(
                "Unknown output format '{}'. Expected one of: {}",
                other,
                Self::all_formats().join(", ")
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for customizing report output
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Whether to use colored output (text format)
    pub use_colors: bool,
    /// Whether to show the source line of each diagnostic
    pub show_context: bool,
    /// Whether to show suggested replacements
    pub show_suggestions: bool,
    /// Maximum number of diagnostics to include
    pub max_diagnostics: Option<usize>,
    /// Minimum severity level to include
    pub min_severity: Option<Severity>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            use_colors: true,
            show_context: true,
            show_suggestions: true,
            max_diagnostics: None,
            min_severity: None,
        }
    }
}

/// Convert resolved matches of one unit into diagnostics
pub fn diagnostics_from_matches(unit: &SourceUnit, matches: &[PatternMatch<'_>]) -> Vec<Diagnostic> {
    matches
        .iter()
        .map(|m| {
            let (line, column) = unit.location(m.span.start);
            let rule = m.rule;

            let mut message = format!("{} pattern `{}` is deprecated", rule.domain().label(), snippet(&m.captured));
            if let Some(rationale) = rule.rationale.as_deref().filter(|r| !r.is_empty()) {
                message.push_str(": ");
                message.push_str(rationale);
            }

            let mut diagnostic = Diagnostic::new(&rule.id, rule.severity, unit.path.clone(), message)
                .with_position(line, column)
                .with_suggestion(m.suggestion());

            let context = unit.line_text(line).trim();
            if !context.is_empty() {
                diagnostic = diagnostic.with_context(context);
            }
            diagnostic
        })
        .collect()
}

/// First line of the captured text, shortened for messages
fn snippet(captured: &str) -> String {
    let first_line = captured.lines().next().unwrap_or("").trim();
    let shortened: String = first_line.chars().take(SNIPPET_LIMIT).collect();
    if shortened.len() < first_line.len() || captured.trim().lines().nth(1).is_some() {
        format!("{shortened}...")
    } else {
        shortened
    }
}

/// One element of the JSON report array
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonDiagnostic<'a> {
    path: String,
    line: u32,
    column: u32,
    rule_id: &'a str,
    severity: Severity,
    message: &'a str,
    suggestion: Option<&'a str>,
}

/// Main report formatter that dispatches to specific formatters
pub struct ReportFormatter {
    options: ReportOptions,
}

impl ReportFormatter {
    /// Create a new report formatter with options
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    /// Format a lint report in the specified format
    pub fn format_report(&self, report: &LintReport, format: OutputFormat) -> LintResult<String> {
        let diagnostics = self.filter_diagnostics(&report.diagnostics);

        match format {
            OutputFormat::Text => Ok(self.format_text(report, &diagnostics)),
            OutputFormat::Json => self.format_json(&diagnostics),
            OutputFormat::GitHub => Ok(self.format_github(&diagnostics)),
            OutputFormat::Sarif => self.format_sarif(&diagnostics),
        }
    }

    /// Filter diagnostics based on report options
    fn filter_diagnostics<'a>(&self, diagnostics: &'a [Diagnostic]) -> Vec<&'a Diagnostic> {
        let mut filtered: Vec<&Diagnostic> = diagnostics
            .iter()
            .filter(|d| self.options.min_severity.map_or(true, |min| d.severity.meets(min)))
            .collect();

        if let Some(max) = self.options.max_diagnostics {
            filtered.truncate(max);
        }

        filtered
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.options.use_colors {
            paint(text, style)
        } else {
            text.to_string()
        }
    }

    /// Format report in human-readable form, grouped by file
    fn format_text(&self, report: &LintReport, diagnostics: &[&Diagnostic]) -> String {
        let mut output = String::new();

        if diagnostics.is_empty() {
            output.push_str(&self.paint("No convention diagnostics found", Style::Green));
            output.push_str("\n\n");
        } else {
            let mut by_file: BTreeMap<&Path, Vec<&Diagnostic>> = BTreeMap::new();
            for diagnostic in diagnostics {
                by_file.entry(&diagnostic.file_path).or_default().push(diagnostic);
            }

            for (file_path, file_diagnostics) in by_file {
                output.push_str(&self.paint(&display_path(file_path), Style::Bold));
                output.push('\n');

                for diagnostic in file_diagnostics {
                    let severity_style = match diagnostic.severity {
                        Severity::Error => Style::Red,
                        Severity::Warning => Style::Yellow,
                        Severity::Info => Style::Cyan,
                    };
                    output.push_str(&format!(
                        "  {} {} [{}] {}\n",
                        self.paint(&format!("{}:{}", diagnostic.line, diagnostic.column), Style::Dim),
                        self.paint(diagnostic.severity.as_str(), severity_style),
                        diagnostic.rule_id,
                        diagnostic.message
                    ));

                    if self.options.show_context {
                        if let Some(context) = &diagnostic.context {
                            output.push_str(&self.paint(&format!("    | {context}"), Style::Dim));
                            output.push('\n');
                        }
                    }

                    if self.options.show_suggestions {
                        if let Some(suggestion) = &diagnostic.suggestion {
                            output.push_str(&self.paint(&format!("    = use: {suggestion}"), Style::Green));
                            output.push('\n');
                        }
                    }
                }
                output.push('\n');
            }
        }

        output.push_str(&self.format_summary(report, diagnostics));
        output
    }

    /// Format the summary section
    fn format_summary(&self, report: &LintReport, diagnostics: &[&Diagnostic]) -> String {
        let summary = &report.summary;
        let execution_time = (summary.execution_time_ms as f64) / 1000.0;

        let mut counts = crate::domain::DiagnosticCounts::default();
        for diagnostic in diagnostics {
            counts.add(diagnostic.severity);
        }

        let mut parts = Vec::new();
        if counts.error > 0 {
            let text = format!("{} error{}", counts.error, plural(counts.error));
            parts.push(self.paint(&text, Style::Red));
        }
        if counts.warning > 0 {
            let text = format!("{} warning{}", counts.warning, plural(counts.warning));
            parts.push(self.paint(&text, Style::Yellow));
        }
        if counts.info > 0 {
            parts.push(self.paint(&format!("{} info", counts.info), Style::Cyan));
        }
        if counts.total() == 0 {
            parts.push(self.paint("0 diagnostics", Style::Green));
        }

        let mut line = format!(
            "{} {} in {} file{} ({:.1}s)\n",
            self.paint("Summary:", Style::Bold),
            parts.join(", "),
            summary.total_files,
            plural(summary.total_files),
            execution_time
        );

        if summary.units_failed > 0 {
            line.push_str(&format!("  {} file{} could not be processed\n", summary.units_failed, plural(summary.units_failed)));
        }
        if summary.timed_out {
            line.push_str(&self.paint(
                &format!(
                    "  Deadline expired: {} file{} not linted\n",
                    summary.units_not_dispatched,
                    plural(summary.units_not_dispatched)
                ),
                Style::Yellow,
            ));
        }

        line
    }

    /// Format report as an ordered JSON array
    fn format_json(&self, diagnostics: &[&Diagnostic]) -> LintResult<String> {
        let entries: Vec<JsonDiagnostic<'_>> = diagnostics
            .iter()
            .map(|d| JsonDiagnostic {
                path: display_path(&d.file_path),
                line: d.line,
                column: d.column,
                rule_id: &d.rule_id,
                severity: d.severity,
                message: &d.message,
                suggestion: d.suggestion.as_deref(),
            })
            .collect();

        let mut json = serde_json::to_string_pretty(&entries)
            .map_err(|e| LintError::config(format!("JSON serialization failed: {e}")))?;
        json.push('\n');
        Ok(json)
    }

    /// Format report in SARIF format
    ///
    /// Convention diagnostics become results; files the engine could not lint become
    /// tool execution notifications of the invocation.
    fn format_sarif(&self, diagnostics: &[&Diagnostic]) -> LintResult<String> {
        let (faults, findings): (Vec<&Diagnostic>, Vec<&Diagnostic>) =
            diagnostics.iter().copied().partition(|d| d.is_engine_fault());

        let results: Vec<JsonValue> = findings
            .iter()
            .map(|d| {
                let mut result = serde_json::json!({
                    "ruleId": d.rule_id,
                    "level": sarif_level(d.severity),
                    "message": { "text": d.message },
                    "locations": [sarif_location(d)]
                });
                if let Some(suggestion) = &d.suggestion {
                    result["properties"] = serde_json::json!({ "suggestion": suggestion });
                }
                result
            })
            .collect();

        let notifications: Vec<JsonValue> = faults
            .iter()
            .map(|d| {
                serde_json::json!({
                    "descriptor": { "id": d.rule_id },
                    "level": sarif_level(d.severity),
                    "message": { "text": d.message },
                    "locations": [sarif_location(d)]
                })
            })
            .collect();

        let mut rule_ids: Vec<&str> = findings.iter().map(|d| d.rule_id.as_str()).collect();
        rule_ids.sort_unstable();
        rule_ids.dedup();
        let rules: Vec<JsonValue> = rule_ids.into_iter().map(|id| serde_json::json!({ "id": id })).collect();

        let sarif = serde_json::json!({
            "version": "2.1.0",
            "$schema": "https://json.schemastore.org/sarif-2.1.0.json",
            "runs": [{
                "tool": {
                    "driver": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                        "rules": rules
                    }
                },
                "invocations": [{
                    "executionSuccessful": notifications.is_empty(),
                    "toolExecutionNotifications": notifications
                }],
                "results": results
            }]
        });

        let mut output = serde_json::to_string_pretty(&sarif)
            .map_err(|e| LintError::config(format!("SARIF serialization failed: {e}")))?;
        output.push('\n');
        Ok(output)
    }

    /// Format report for GitHub Actions
    fn format_github(&self, diagnostics: &[&Diagnostic]) -> String {
        let mut output = String::new();

        for d in diagnostics {
            let level = match d.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Info => "notice",
            };

            let mut message = d.message.clone();
            if let Some(suggestion) = &d.suggestion {
                message.push_str(&format!(" (use: {suggestion})"));
            }

            output.push_str(&format!(
                "::{} file={},line={},col={},title={}::{}\n",
                level,
                escape_property(&display_path(&d.file_path)),
                d.line,
                d.column,
                escape_property(&d.rule_id),
                escape_data(&message)
            ));
        }

        output
    }
}

fn sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "note",
    }
}

fn sarif_location(d: &Diagnostic) -> JsonValue {
    serde_json::json!({
        "physicalLocation": {
            "artifactLocation": { "uri": display_path(&d.file_path) },
            "region": { "startLine": d.line, "startColumn": d.column }
        }
    })
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(ReportOptions::default())
    }
}

#[derive(Debug, Clone, Copy)]
enum Style {
    Red,
    Yellow,
    Cyan,
    Green,
    Dim,
    Bold,
}

#[cfg(feature = "colors")]
fn paint(text: &str, style: Style) -> String {
    use colored::Colorize;
    match style {
        Style::Red => text.red().to_string(),
        Style::Yellow => text.yellow().to_string(),
        Style::Cyan => text.cyan().to_string(),
        Style::Green => text.green().to_string(),
        Style::Dim => text.dimmed().to_string(),
        Style::Bold => text.bold().to_string(),
    }
}

#[cfg(not(feature = "colors"))]
fn paint(text: &str, _style: Style) -> String {
    text.to_string()
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Forward-slash path so reports are identical across platforms
fn display_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

/// Workflow-command escaping for message data
fn escape_data(s: &str) -> String {
    s.replace('%', "%25").replace('\r', "%0D").replace('\n', "%0A")
}

/// Workflow-command escaping for properties
fn escape_property(s: &str) -> String {
    escape_data(s).replace(':', "%3A").replace(',', "%2C")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn create_test_report() -> LintReport {
        let mut report = LintReport::new();

        report.add_diagnostic(
            Diagnostic::new(
                "styling-tokens-07",
                Severity::Warning,
                PathBuf::from("src/Card.svelte"),
                "Styling token pattern `rounded-sm` is deprecated",
            )
            .with_position(4, 15)
            .with_suggestion("rounded-xs")
            .with_context("<div class=\"rounded-sm\">"),
        );
        report.add_diagnostic(
            Diagnostic::new(
                "build-config-01",
                Severity::Error,
                PathBuf::from("src/app.css"),
                "Build config pattern `@tailwind base` is deprecated",
            )
            .with_position(1, 1),
        );

        report.set_files_analyzed(3);
        report.set_execution_time(1200);
        report.sort_diagnostics();
        report
    }

    fn plain() -> ReportFormatter {
        ReportFormatter::new(ReportOptions { use_colors: false, ..Default::default() })
    }

    #[test]
    fn test_text_format() {
        let output = plain().format_report(&create_test_report(), OutputFormat::Text).unwrap();

        assert!(output.contains("src/Card.svelte\n  4:15 warning [styling-tokens-07]"));
        assert!(output.contains("    | <div class=\"rounded-sm\">"));
        assert!(output.contains("    = use: rounded-xs"));
        assert!(output.contains("Summary: 1 error, 1 warning in 3 files"));
    }

    #[test]
    fn test_json_format_shape() {
        let output = plain().format_report(&create_test_report(), OutputFormat::Json).unwrap();
        let json: JsonValue = serde_json::from_str(&output).unwrap();

        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["path"], "src/Card.svelte");
        assert_eq!(entries[0]["ruleId"], "styling-tokens-07");
        assert_eq!(entries[0]["severity"], "warning");
        assert_eq!(entries[0]["line"], 4);
        assert_eq!(entries[0]["suggestion"], "rounded-xs");
        assert!(entries[1]["suggestion"].is_null());

        let keys: Vec<_> = entries[0].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 7);
        assert!(!output.contains("execution"));
    }

    #[test]
    fn test_json_ignores_timing() {
        let first = create_test_report();
        let mut second = create_test_report();
        second.set_execution_time(99);

        let formatter = plain();
        assert_eq!(
            formatter.format_report(&first, OutputFormat::Json).unwrap(),
            formatter.format_report(&second, OutputFormat::Json).unwrap()
        );
    }

    #[test]
    fn test_github_format() {
        let output = plain().format_report(&create_test_report(), OutputFormat::GitHub).unwrap();

        assert!(output.contains("::warning file=src/Card.svelte,line=4,col=15,title=styling-tokens-07::"));
        assert!(output.contains("(use: rounded-xs)"));
        assert!(output.contains("::error file=src/app.css,line=1,col=1"));
    }

    #[test]
    fn test_sarif_format() {
        let output = plain().format_report(&create_test_report(), OutputFormat::Sarif).unwrap();
        let json: JsonValue = serde_json::from_str(&output).unwrap();

        assert_eq!(json["version"], "2.1.0");
        let results = json["runs"][0]["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1]["level"], "error");
        assert_eq!(json["runs"][0]["tool"]["driver"]["rules"].as_array().unwrap().len(), 2);
        assert_eq!(json["runs"][0]["invocations"][0]["executionSuccessful"], true);
    }

    #[test]
    fn test_sarif_reports_engine_faults_as_notifications() {
        let mut report = create_test_report();
        report.add_diagnostic(
            Diagnostic::ingestion_failure(PathBuf::from("src/Broken.svelte"), "unterminated <div> tag")
                .with_position(3, 1),
        );
        report.sort_diagnostics();

        let output = plain().format_report(&report, OutputFormat::Sarif).unwrap();
        let json: JsonValue = serde_json::from_str(&output).unwrap();
        let run = &json["runs"][0];

        assert_eq!(run["results"].as_array().unwrap().len(), 2);
        assert_eq!(run["tool"]["driver"]["rules"].as_array().unwrap().len(), 2);
        assert_eq!(run["invocations"][0]["executionSuccessful"], false);
        let notifications = run["invocations"][0]["toolExecutionNotifications"].as_array().unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0]["descriptor"]["id"], "ingestion-error");
        assert_eq!(notifications[0]["locations"][0]["physicalLocation"]["region"]["startLine"], 3);
    }

    #[test]
    fn test_empty_report() {
        let output = plain().format_report(&LintReport::new(), OutputFormat::Text).unwrap();
        assert!(output.contains("No convention diagnostics found"));
        assert!(output.contains("0 diagnostics in 0 files"));

        let json = plain().format_report(&LintReport::new(), OutputFormat::Json).unwrap();
        assert_eq!(json.trim(), "[]");
    }

    #[test]
    fn test_severity_filtering_and_limit() {
        let formatter = ReportFormatter::new(ReportOptions {
            min_severity: Some(Severity::Error),
            ..Default::default()
        });
        let output = formatter.format_report(&create_test_report(), OutputFormat::Json).unwrap();
        let json: JsonValue = serde_json::from_str(&output).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["ruleId"], "build-config-01");

        let limited = ReportFormatter::new(ReportOptions { max_diagnostics: Some(1), ..Default::default() });
        let output = limited.format_report(&create_test_report(), OutputFormat::Json).unwrap();
        assert_eq!(serde_json::from_str::<JsonValue>(&output).unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("github".parse::<OutputFormat>().unwrap(), OutputFormat::GitHub);
        assert!("junit".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_snippet_shortening() {
        assert_eq!(snippet("export let name;"), "export let name;");
        assert_eq!(snippet("$: {\n  run();\n}"), "$: {...");
        assert_eq!(snippet(&"a".repeat(100)).chars().count(), SNIPPET_LIMIT + 3);
    }
}
