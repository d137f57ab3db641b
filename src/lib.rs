//! Convention Guard - structural enforcement of approved-vs-deprecated convention tables
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Rule tables are compiled once into an immutable registry
//! - Source units are ingested, matched and reported without global state
//! - The binary is a thin shell over `ConventionGuard`

pub mod analyzer;
pub mod config;
pub mod domain;
pub mod ingest;
pub mod patterns;
pub mod report;
pub mod rules;

// Re-export main types for convenient access
pub use domain::{Diagnostic, DiagnosticCounts, LintError, LintReport, LintResult, LintSummary, Severity};

pub use config::{ConfigBuilder, LintConfig};

pub use analyzer::{AnalysisOptions, Analyzer};

pub use report::{OutputFormat, ReportFormatter, ReportOptions};

pub use rules::{Domain, Rule, RuleLoader, RuleRegistry, RulesetSelection};

use std::path::Path;

/// Main entry point tying configuration, analysis and reporting together
pub struct ConventionGuard {
    config: LintConfig,
    analyzer: Analyzer,
    report_formatter: ReportFormatter,
}

impl ConventionGuard {
    /// Create a linter from a validated configuration
    pub fn new_with_config(config: LintConfig) -> LintResult<Self> {
        config.validate()?;
        let analyzer = Analyzer::new(config.build_registry()?, config.path_filter()?);

        Ok(Self { config, analyzer, report_formatter: ReportFormatter::default() })
    }

    /// Create a linter with the built-in rules and default configuration
    pub fn new() -> LintResult<Self> {
        Self::new_with_config(LintConfig::default())
    }

    /// Create a linter loading configuration from file
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> LintResult<Self> {
        Self::new_with_config(LintConfig::load_from_file(path)?)
    }

    /// Set custom report formatter
    pub fn with_report_formatter(mut self, formatter: ReportFormatter) -> Self {
        self.report_formatter = formatter;
        self
    }

    pub fn config(&self) -> &LintConfig {
        &self.config
    }

    pub fn registry(&self) -> &RuleRegistry {
        self.analyzer.registry()
    }

    /// Analysis options derived from the `run` section of the configuration
    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            workers: self.config.run.workers,
            timeout: self.config.timeout(),
            max_files: self.config.run.max_files,
            ..Default::default()
        }
    }

    /// Lint files and directories with the configured run options
    pub fn lint_paths<P: AsRef<Path>>(&self, paths: &[P]) -> LintResult<LintReport> {
        self.lint_paths_with_options(paths, &self.analysis_options())
    }

    pub fn lint_paths_with_options<P: AsRef<Path>>(
        &self,
        paths: &[P],
        options: &AnalysisOptions,
    ) -> LintResult<LintReport> {
        self.analyzer.analyze_paths(paths, options)
    }

    /// Lint in-memory content; `path` decides the category and appears in diagnostics
    pub fn lint_source<P: AsRef<Path>>(&self, path: P, content: &str) -> Vec<Diagnostic> {
        let mut outcome = self.analyzer.lint_content(path.as_ref(), content);
        outcome.diagnostics.sort_by(|a, b| {
            (a.line, a.column, &a.rule_id).cmp(&(b.line, b.column, &b.rule_id))
        });
        outcome.diagnostics
    }

    /// Format a lint report for output
    pub fn format_report(&self, report: &LintReport, format: OutputFormat) -> LintResult<String> {
        self.report_formatter.format_report(report, format)
    }

    /// Exit status of a report against the configured minimum severity
    pub fn exit_code(&self, report: &LintReport) -> i32 {
        report.exit_code(self.config.run.severity_min)
    }
}

/// Convenience function to lint a directory with default settings
pub fn lint_directory<P: AsRef<Path>>(directory: P) -> LintResult<LintReport> {
    let guard = ConventionGuard::new()?;
    guard.lint_paths(&[directory.as_ref()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, path: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_legacy_component_yields_two_reactive_state_warnings() {
        let guard = ConventionGuard::new().unwrap();
        let diagnostics = guard.lint_source(
            "Counter.svelte",
            "<script>\n  export let name;\n  $: doubled = count * 2;\n</script>\n",
        );

        let found: Vec<_> = diagnostics
            .iter()
            .map(|d| (d.rule_id.as_str(), d.severity, d.line, d.column))
            .collect();
        assert_eq!(
            found,
            vec![
                ("reactive-state-01", Severity::Warning, 2, 3),
                ("reactive-state-02", Severity::Warning, 3, 3),
            ]
        );
        assert_eq!(diagnostics[0].suggestion.as_deref(), Some("let { name } = $props();"));
        assert_eq!(diagnostics[1].suggestion.as_deref(), Some("let doubled = $derived(count * 2);"));
    }

    #[test]
    fn test_small_radius_token_suggests_rounded_xs() {
        let guard = ConventionGuard::new().unwrap();
        let diagnostics = guard.lint_source("app.css", ".card {\n  @apply rounded-sm;\n}\n");

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].rule_id.starts_with("styling-tokens-"));
        assert_eq!(diagnostics[0].suggestion.as_deref(), Some("rounded-xs"));
        assert_eq!((diagnostics[0].line, diagnostics[0].column), (2, 10));
    }

    #[test]
    fn test_empty_tree_is_clean() {
        let dir = TempDir::new().unwrap();
        let guard = ConventionGuard::new().unwrap();

        let report = guard.lint_paths(&[dir.path()]).unwrap();
        assert!(!report.has_diagnostics());
        assert_eq!(guard.exit_code(&report), 0);
    }

    #[test]
    fn test_json_output_is_byte_identical_across_runs() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/App.svelte", "<script>\n  export let title;\n</script>\n<div class=\"shadow-sm\"><slot /></div>\n");
        write(&dir, "src/app.css", "@tailwind base;\n.x { @apply flex-grow; }\n");
        write(&dir, "package.json", "{ \"devDependencies\": { \"autoprefixer\": \"^10\" } }\n");

        let guard = ConventionGuard::new().unwrap();
        let first = guard.format_report(&guard.lint_paths(&[dir.path()]).unwrap(), OutputFormat::Json).unwrap();
        let second = guard.format_report(&guard.lint_paths(&[dir.path()]).unwrap(), OutputFormat::Json).unwrap();

        assert_eq!(first, second);
        assert!(first.contains("\"ruleId\": \"build-config-01\""));
    }

    #[test]
    fn test_parse_failure_does_not_stop_other_files() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a/Broken.svelte", "<script>\n  let = ;\n</script>\n");
        write(&dir, "b/ok.css", ".x { @apply rounded-sm; }\n");

        let guard = ConventionGuard::new().unwrap();
        let report = guard.lint_paths(&[dir.path()]).unwrap();

        let rules: Vec<_> = report.diagnostics.iter().map(|d| d.rule_id.as_str()).collect();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0], domain::INGESTION_ERROR_RULE);
        assert!(rules[1].starts_with("styling-tokens-"));
        assert_eq!(report.summary.units_failed, 1);
        assert_eq!(report.summary.units_linted, 1);
    }

    #[test]
    fn test_multibyte_class_expression_does_not_abort_the_run() {
        let dir = TempDir::new().unwrap();
        write(&dir, "A.svelte", "<div class={`${a ? `don't` : ''} ` + classé}>x</div>\n");
        write(&dir, "b.css", ".x { @apply rounded-sm; }\n");

        let guard = ConventionGuard::new().unwrap();
        let report = guard.lint_paths(&[dir.path()]).unwrap();

        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].rule_id.starts_with("styling-tokens-"));
        assert_eq!(report.summary.units_linted, 2);
        assert_eq!(report.summary.units_failed, 0);
    }

    #[test]
    fn test_tokens_in_nested_template_literals_are_matched() {
        let guard = ConventionGuard::new().unwrap();
        let diagnostics = guard.lint_source(
            "Card.svelte",
            "<div class={`p-2 ${big ? `rounded` : 'shadow-sm'}`}>x</div>\n",
        );

        let suggestions: Vec<_> = diagnostics.iter().map(|d| d.suggestion.as_deref()).collect();
        assert_eq!(suggestions, vec![Some("rounded-sm"), Some("shadow-xs")]);
    }

    #[test]
    fn test_markup_expression_diagnostics_point_into_the_file() {
        let guard = ConventionGuard::new().unwrap();
        let diagnostics = guard.lint_source(
            "Heading.svelte",
            "<h1>\n  {$$props.title}\n</h1>\n<div {...$$restProps}></div>\n",
        );

        let found: Vec<_> = diagnostics
            .iter()
            .map(|d| (d.line, d.column, d.suggestion.as_deref()))
            .collect();
        assert_eq!(
            found,
            vec![
                (2, 4, Some("let { ...props } = $props();")),
                (4, 10, Some("let { ...rest } = $props();")),
            ]
        );
    }

    #[test]
    fn test_ruleset_restriction() {
        let config = ConfigBuilder::new().rulesets(vec!["styling-tokens".to_string()]).build().unwrap();
        let guard = ConventionGuard::new_with_config(config).unwrap();

        let diagnostics = guard.lint_source(
            "Card.svelte",
            "<script>\n  export let name;\n</script>\n<div class=\"shadow-sm\"></div>\n",
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].rule_id.starts_with("styling-tokens-"));
    }

    #[test]
    fn test_row_missing_deprecated_pattern_is_fatal() {
        let dir = TempDir::new().unwrap();
        let table = write(
            &dir,
            "rules.md",
            "| Category | Approved | Deprecated |\n|---|---|---|\n| Styling | `shadow-xs` | |\n",
        );

        let config = ConfigBuilder::new().include_defaults(false).add_rule_table(table).build().unwrap();
        let error = ConventionGuard::new_with_config(config).err().unwrap();
        assert!(matches!(error, LintError::RuleLoad { row: 1, .. }));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_follows_severity_minimum() {
        let dir = TempDir::new().unwrap();
        write(&dir, "svelte.config.json", "{ \"preprocess\": { \"svelte-preprocess\": true } }\n");

        let lenient = ConventionGuard::new().unwrap();
        let report = lenient.lint_paths(&[dir.path()]).unwrap();
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].severity, Severity::Info);
        assert_eq!(lenient.exit_code(&report), 0);

        let strict = ConventionGuard::new_with_config(
            ConfigBuilder::new().severity_min(Severity::Info).build().unwrap(),
        )
        .unwrap();
        assert_eq!(strict.exit_code(&report), 1);
    }

    #[test]
    fn test_allowlisted_dynamic_classes_are_not_flagged() {
        let source = "<div class=\"grid-cols-{n} bg-{color}-500\"></div>\n";

        let flagged = ConventionGuard::new().unwrap().lint_source("Grid.svelte", source);
        assert_eq!(flagged.len(), 2);

        let config = ConfigBuilder::new().allow_dynamic("grid-cols-*").build().unwrap();
        let allowed = ConventionGuard::new_with_config(config).unwrap().lint_source("Grid.svelte", source);
        assert_eq!(allowed.len(), 1);
        assert_eq!(allowed[0].context.as_deref(), Some(source.trim()));
    }
}
