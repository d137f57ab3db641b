//! Main analysis orchestrator for Convention Guard
//!
//! CDD Principle: Domain Services - Analyzer orchestrates the lint workflow
//! - Coordinates discovery, ingestion, pattern matching and report assembly
//! - Each unit runs read, parse and match independently on a fixed worker pool
//! - Per-unit failures become diagnostics; a run deadline stops dispatch, not completed work

use crate::domain::{Diagnostic, LintError, LintReport, LintResult};
use crate::ingest::{self, SourceUnit, UnitCategory};
use crate::patterns::{match_unit, PathFilter, PatternMatch};
use crate::report::diagnostics_from_matches;
use crate::rules::RuleRegistry;
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Parse stage of the per-unit pipeline
type ParseStage = fn(&Path, &str, UnitCategory) -> LintResult<SourceUnit>;

/// Match stage of the per-unit pipeline
type MatchStage = for<'r> fn(&'r RuleRegistry, &SourceUnit) -> LintResult<Vec<PatternMatch<'r>>>;

/// Main analyzer that orchestrates the entire lint process
pub struct Analyzer {
    /// Immutable rules shared by every worker
    registry: RuleRegistry,
    /// Path filter for determining which files to lint
    path_filter: PathFilter,
    parse: ParseStage,
    matcher: MatchStage,
}

/// Options for customizing analysis behavior
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Whether to use the worker pool
    pub parallel: bool,
    /// Worker pool size; number of CPUs when unset
    pub workers: Option<usize>,
    /// Run deadline; units not started when it expires are not dispatched
    pub timeout: Option<Duration>,
    /// Maximum number of files to lint
    pub max_files: Option<usize>,
    /// Additional exclusion patterns for this run
    pub exclude_patterns: Vec<String>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self { parallel: true, workers: None, timeout: None, max_files: None, exclude_patterns: Vec::new() }
    }
}

/// Lifecycle states a unit passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Unclassified,
    Classified(UnitCategory),
    Parsed,
    /// Number of resolved matches
    Matched(usize),
    ParseFailure,
    MatchFailure,
    Reported,
    /// No category applies
    Skipped,
    /// The run deadline expired before the unit was picked up
    NotDispatched,
}

/// What happened to one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Linted,
    Unclassified,
    Failed,
    NotDispatched,
}

/// Result of processing one unit, with the states it went through
#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub path: PathBuf,
    pub trail: Vec<UnitState>,
    pub diagnostics: Vec<Diagnostic>,
}

impl UnitOutcome {
    fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf(), trail: vec![UnitState::Unclassified], diagnostics: Vec::new() }
    }

    fn not_dispatched(path: &Path) -> Self {
        let mut outcome = Self::new(path);
        outcome.trail.push(UnitState::NotDispatched);
        outcome
    }

    fn enter(&mut self, state: UnitState) {
        self.trail.push(state);
    }

    /// Record an engine fault and close the trail
    fn fail(mut self, state: UnitState, diagnostic: Diagnostic) -> Self {
        self.enter(state);
        self.diagnostics.push(diagnostic);
        self.enter(UnitState::Reported);
        self
    }

    pub fn disposition(&self) -> Disposition {
        if self.trail.contains(&UnitState::NotDispatched) {
            Disposition::NotDispatched
        } else if self.trail.contains(&UnitState::Skipped) {
            Disposition::Unclassified
        } else if self.trail.iter().any(|s| matches!(s, UnitState::ParseFailure | UnitState::MatchFailure)) {
            Disposition::Failed
        } else {
            Disposition::Linted
        }
    }
}

/// Files selected for a run plus discovery failures already turned into diagnostics
#[derive(Debug, Default)]
struct Selection {
    files: Vec<PathBuf>,
    failures: Vec<Diagnostic>,
}

impl Analyzer {
    pub fn new(registry: RuleRegistry, path_filter: PathFilter) -> Self {
        Self { registry, path_filter, parse: ingest::parse_unit, matcher: match_unit }
    }

    /// Replace the parse and match stages
    #[cfg(test)]
    fn with_stages(mut self, parse: ParseStage, matcher: MatchStage) -> Self {
        self.parse = parse;
        self.matcher = matcher;
        self
    }

    /// Analyzer with the built-in rules and default path filter
    pub fn with_defaults() -> LintResult<Self> {
        Ok(Self::new(RuleRegistry::with_defaults()?, PathFilter::with_defaults()?))
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Read, classify, parse and match one file
    pub fn lint_unit(&self, path: &Path) -> UnitOutcome {
        let mut outcome = UnitOutcome::new(path);

        let mut content = None;
        if ingest::needs_sniffing(path) {
            match ingest::read_for_sniffing(path) {
                Ok(Some(text)) => content = Some(text),
                Ok(None) => {
                    tracing::debug!("Skipping binary file {}", path.display());
                    outcome.enter(UnitState::Skipped);
                    return outcome;
                }
                Err(e) => return outcome.fail(UnitState::ParseFailure, self.failure(path, None, &e)),
            }
        }

        let category = ingest::classify(path, content.as_deref());
        if category == UnitCategory::Unclassified {
            tracing::debug!("Skipping unclassified file {}", path.display());
            outcome.enter(UnitState::Skipped);
            return outcome;
        }
        outcome.enter(UnitState::Classified(category));

        let content = match content {
            Some(text) => text,
            None => match ingest::read_source(path) {
                Ok(text) => text,
                Err(e) => return outcome.fail(UnitState::ParseFailure, self.failure(path, None, &e)),
            },
        };

        self.parse_and_match(outcome, path, &content, category)
    }

    /// Lint in-memory content as if it were read from `path`
    pub fn lint_content(&self, path: &Path, content: &str) -> UnitOutcome {
        let mut outcome = UnitOutcome::new(path);

        let category = ingest::classify(path, Some(content));
        if category == UnitCategory::Unclassified {
            outcome.enter(UnitState::Skipped);
            return outcome;
        }
        outcome.enter(UnitState::Classified(category));

        self.parse_and_match(outcome, path, content, category)
    }

    fn parse_and_match(&self, mut outcome: UnitOutcome, path: &Path, content: &str, category: UnitCategory) -> UnitOutcome {
        let unit = match self.parse_isolated(path, content, category) {
            Ok(unit) => unit,
            Err(e) => {
                tracing::warn!("{}", e);
                return outcome.fail(UnitState::ParseFailure, self.failure(path, Some(content), &e));
            }
        };
        outcome.enter(UnitState::Parsed);

        match self.match_isolated(&unit) {
            Ok(diagnostics) => {
                outcome.enter(UnitState::Matched(diagnostics.len()));
                outcome.diagnostics = diagnostics;
                outcome.enter(UnitState::Reported);
                outcome
            }
            Err(e) => {
                tracing::warn!("{}", e);
                outcome.fail(UnitState::MatchFailure, self.failure(path, Some(content), &e))
            }
        }
    }

    /// Parse one unit, turning a parser panic into an ingestion error
    fn parse_isolated(&self, path: &Path, content: &str, category: UnitCategory) -> LintResult<SourceUnit> {
        let parse = self.parse;
        panic::catch_unwind(AssertUnwindSafe(|| parse(path, content, category))).unwrap_or_else(|payload| {
            Err(LintError::ingestion(
                path.display().to_string(),
                format!("parser panicked: {}", panic_reason(&*payload)),
            ))
        })
    }

    /// Match one unit, turning matcher errors and panics into a match error
    fn match_isolated(&self, unit: &SourceUnit) -> LintResult<Vec<Diagnostic>> {
        let matcher = self.matcher;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            matcher(&self.registry, unit).map(|matches| diagnostics_from_matches(unit, &matches))
        }));

        result.unwrap_or_else(|payload| {
            Err(LintError::matching(
                unit.path.display().to_string(),
                format!("matcher panicked: {}", panic_reason(&*payload)),
            ))
        })
    }

    /// Diagnostic for a per-unit engine fault, positioned when the offset is known
    fn failure(&self, path: &Path, content: Option<&str>, error: &LintError) -> Diagnostic {
        let (diagnostic, offset) = match error {
            LintError::Ingestion { message, offset, .. } => {
                (Diagnostic::ingestion_failure(path.to_path_buf(), message.clone()), *offset)
            }
            LintError::Match { message, .. } => (Diagnostic::match_failure(path.to_path_buf(), message.clone()), None),
            other => (Diagnostic::ingestion_failure(path.to_path_buf(), other.to_string()), None),
        };

        match (content, offset) {
            (Some(content), Some(offset)) => {
                let lines = ingest::LineIndex::new(content);
                let (line, column) = lines.location(content, offset);
                let context = lines.line_text(content, line).trim();
                let diagnostic = diagnostic.with_position(line, column);
                if context.is_empty() {
                    diagnostic
                } else {
                    diagnostic.with_context(context)
                }
            }
            _ => diagnostic,
        }
    }

    /// Expand the requested paths into a sorted, de-duplicated file list
    fn discover<P: AsRef<Path>>(&self, paths: &[P], options: &AnalysisOptions) -> LintResult<Selection> {
        let mut filter = self.path_filter.clone();
        for pattern in &options.exclude_patterns {
            filter.add_pattern(pattern)?;
        }

        let mut selection = Selection::default();
        for path in paths {
            let path = path.as_ref();

            if path.is_file() {
                selection.files.push(path.to_path_buf());
            } else if path.is_dir() {
                let discovery = filter.find_files(path);
                selection.files.extend(discovery.files);
                selection.failures.extend(
                    discovery
                        .failures
                        .into_iter()
                        .map(|(path, message)| Diagnostic::ingestion_failure(path, message)),
                );
            } else {
                return Err(LintError::config(format!("Path does not exist: {}", path.display())));
            }
        }

        selection.files.sort();
        selection.files.dedup();

        if let Some(max_files) = options.max_files {
            selection.files.truncate(max_files);
        }

        Ok(selection)
    }

    /// Lint files and directories and return a complete report
    pub fn analyze_paths<P: AsRef<Path>>(&self, paths: &[P], options: &AnalysisOptions) -> LintResult<LintReport> {
        let start_time = Instant::now();
        // A deadline past the end of the clock never expires
        let deadline = options.timeout.and_then(|timeout| start_time.checked_add(timeout));
        let selection = self.discover(paths, options)?;

        tracing::info!("Linting {} files with {} rules", selection.files.len(), self.registry.len());

        let outcomes = if options.parallel && selection.files.len() > 1 {
            self.analyze_files_parallel(&selection.files, deadline, options)?
        } else {
            self.analyze_files_sequential(&selection.files, deadline)
        };

        let mut report = LintReport::new();
        for diagnostic in selection.failures {
            report.add_diagnostic(diagnostic);
        }

        for outcome in outcomes {
            match outcome.disposition() {
                Disposition::Linted => report.summary.units_linted += 1,
                Disposition::Unclassified => report.summary.units_unclassified += 1,
                Disposition::Failed => report.summary.units_failed += 1,
                Disposition::NotDispatched => report.summary.units_not_dispatched += 1,
            }
            for diagnostic in outcome.diagnostics {
                report.add_diagnostic(diagnostic);
            }
        }

        if report.summary.units_not_dispatched > 0 {
            report.summary.timed_out = true;
            tracing::warn!(
                "Deadline expired: {} of {} files were not linted",
                report.summary.units_not_dispatched,
                selection.files.len()
            );
        }

        report.set_files_analyzed(selection.files.len());
        report.set_ruleset_fingerprint(self.registry.fingerprint());
        report.set_execution_time(start_time.elapsed().as_millis() as u64);
        report.sort_diagnostics();

        Ok(report)
    }

    /// Lint one unit unless the deadline has passed
    fn dispatch(&self, path: &Path, deadline: Option<Instant>) -> UnitOutcome {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return UnitOutcome::not_dispatched(path);
        }
        self.lint_unit(path)
    }

    fn analyze_files_sequential(&self, files: &[PathBuf], deadline: Option<Instant>) -> Vec<UnitOutcome> {
        files.iter().map(|path| self.dispatch(path, deadline)).collect()
    }

    fn analyze_files_parallel(
        &self,
        files: &[PathBuf],
        deadline: Option<Instant>,
        options: &AnalysisOptions,
    ) -> LintResult<Vec<UnitOutcome>> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(workers) = options.workers {
            builder = builder.num_threads(workers);
        }
        let pool = builder
            .build()
            .map_err(|e| LintError::config(format!("Failed to start worker pool: {e}")))?;

        Ok(pool.install(|| files.par_iter().map(|path| self.dispatch(path, deadline)).collect()))
    }

    /// Lint a directory tree
    pub fn analyze_directory<P: AsRef<Path>>(&self, root: P, options: &AnalysisOptions) -> LintResult<LintReport> {
        self.analyze_paths(&[root.as_ref()], options)
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Severity, INGESTION_ERROR_RULE, MATCH_ERROR_RULE};
    use std::fs;
    use std::thread;
    use tempfile::TempDir;

    fn tree(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    fn file_name(diagnostic: &Diagnostic) -> &str {
        diagnostic.file_path.file_name().and_then(|n| n.to_str()).unwrap_or("")
    }

    fn faulty_matcher<'r>(registry: &'r RuleRegistry, unit: &SourceUnit) -> LintResult<Vec<PatternMatch<'r>>> {
        match unit.path.file_name().and_then(|n| n.to_str()) {
            Some("panics.css") => panic!("matcher bug"),
            Some("errors.css") => Err(LintError::matching("errors.css", "unsupported node")),
            _ => match_unit(registry, unit),
        }
    }

    fn panicking_parser(path: &Path, content: &str, category: UnitCategory) -> LintResult<SourceUnit> {
        if path.ends_with("bad.css") {
            panic!("parser bug");
        }
        ingest::parse_unit(path, content, category)
    }

    fn slow_matcher<'r>(registry: &'r RuleRegistry, unit: &SourceUnit) -> LintResult<Vec<PatternMatch<'r>>> {
        thread::sleep(Duration::from_millis(200));
        match_unit(registry, unit)
    }

    #[test]
    fn test_unit_trail_for_linted_file() {
        let dir = tree(&[("App.svelte", "<script>\n  export let name;\n</script>\n")]);
        let analyzer = Analyzer::with_defaults().unwrap();

        let outcome = analyzer.lint_unit(&dir.path().join("App.svelte"));
        assert_eq!(
            outcome.trail,
            vec![
                UnitState::Unclassified,
                UnitState::Classified(UnitCategory::ScriptMarkup),
                UnitState::Parsed,
                UnitState::Matched(1),
                UnitState::Reported,
            ]
        );
        assert_eq!(outcome.disposition(), Disposition::Linted);
        assert_eq!(outcome.diagnostics[0].rule_id, "reactive-state-01");
    }

    #[test]
    fn test_parse_failure_is_positioned_and_reported() {
        let dir = tree(&[("broken.css", ".a {\n  color: red;\n")]);
        let analyzer = Analyzer::with_defaults().unwrap();

        let outcome = analyzer.lint_unit(&dir.path().join("broken.css"));
        assert_eq!(
            outcome.trail,
            vec![
                UnitState::Unclassified,
                UnitState::Classified(UnitCategory::Styling),
                UnitState::ParseFailure,
                UnitState::Reported,
            ]
        );
        assert_eq!(outcome.disposition(), Disposition::Failed);
        let diagnostic = &outcome.diagnostics[0];
        assert_eq!(diagnostic.rule_id, INGESTION_ERROR_RULE);
        assert_eq!(diagnostic.severity, Severity::Error);
        assert_eq!(diagnostic.line, 1);
    }

    #[test]
    fn test_unclassified_files_are_skipped_silently() {
        let dir = tree(&[("README.md", "# hi"), ("LICENSE", "MIT License")]);
        let analyzer = Analyzer::with_defaults().unwrap();

        let report = analyzer.analyze_directory(dir.path(), &AnalysisOptions::default()).unwrap();
        assert!(!report.has_diagnostics());
        assert_eq!(report.summary.units_unclassified, 2);
        assert_eq!(report.summary.total_files, 2);
    }

    #[test]
    fn test_directory_analysis_respects_filters() {
        let dir = tree(&[
            ("src/app.css", "@tailwind base;\n"),
            ("node_modules/pkg/index.css", "@tailwind base;\n"),
            ("legacy/old.css", "@tailwind base;\n"),
        ]);
        let analyzer = Analyzer::with_defaults().unwrap();
        let options = AnalysisOptions { exclude_patterns: vec!["legacy/".to_string()], ..Default::default() };

        let report = analyzer.analyze_directory(dir.path(), &options).unwrap();
        assert_eq!(report.summary.total_files, 1);
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].file_path.ends_with("src/app.css"));
        assert!(report.ruleset_fingerprint.is_some());
    }

    #[test]
    fn test_expired_deadline_dispatches_nothing() {
        let dir = tree(&[("a.css", "@tailwind base;\n"), ("b.css", "@tailwind base;\n")]);
        let analyzer = Analyzer::with_defaults().unwrap();
        let options = AnalysisOptions { timeout: Some(Duration::ZERO), ..Default::default() };

        let report = analyzer.analyze_directory(dir.path(), &options).unwrap();
        assert!(report.summary.timed_out);
        assert_eq!(report.summary.units_not_dispatched, 2);
        assert!(!report.has_diagnostics());
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let dir = tree(&[
            ("a/One.svelte", "<script>\n  $: doubled = count * 2;\n</script>\n<div class=\"shadow-sm\"></div>\n"),
            ("b/two.css", ".x { @apply rounded-sm; }\n"),
            ("c/package.json", "{ \"devDependencies\": { \"autoprefixer\": \"^10\" } }\n"),
        ]);
        let analyzer = Analyzer::with_defaults().unwrap();

        let parallel = AnalysisOptions { workers: Some(2), ..Default::default() };
        let sequential = AnalysisOptions { parallel: false, ..Default::default() };
        let a = analyzer.analyze_directory(dir.path(), &parallel).unwrap();
        let b = analyzer.analyze_directory(dir.path(), &sequential).unwrap();

        assert_eq!(a.diagnostics, b.diagnostics);
        assert_eq!(a.diagnostics.len(), 4);
    }

    #[test]
    fn test_matcher_faults_are_isolated_per_unit() {
        let dir = tree(&[
            ("errors.css", "@tailwind base;\n"),
            ("ok.css", "@tailwind base;\n"),
            ("panics.css", "@tailwind base;\n"),
        ]);
        let analyzer = Analyzer::with_defaults().unwrap().with_stages(ingest::parse_unit, faulty_matcher);
        let options = AnalysisOptions { workers: Some(2), ..Default::default() };

        let report = analyzer.analyze_directory(dir.path(), &options).unwrap();
        let found: Vec<_> = report.diagnostics.iter().map(|d| (file_name(d), d.rule_id.as_str())).collect();
        assert_eq!(
            found,
            vec![("errors.css", MATCH_ERROR_RULE), ("ok.css", "build-config-01"), ("panics.css", MATCH_ERROR_RULE)]
        );
        assert_eq!(report.diagnostics[0].message, "unsupported node");
        assert_eq!(report.diagnostics[2].message, "matcher panicked: matcher bug");
        assert_eq!(report.summary.units_failed, 2);
        assert_eq!(report.summary.units_linted, 1);
    }

    #[test]
    fn test_parser_panic_becomes_ingestion_error() {
        let dir = tree(&[("bad.css", ".x {}\n"), ("good.css", "@tailwind base;\n")]);
        let analyzer = Analyzer::with_defaults().unwrap().with_stages(panicking_parser, match_unit);

        let outcome = analyzer.lint_unit(&dir.path().join("bad.css"));
        assert_eq!(outcome.trail[2], UnitState::ParseFailure);
        assert_eq!(outcome.diagnostics[0].rule_id, INGESTION_ERROR_RULE);
        assert_eq!(outcome.diagnostics[0].message, "parser panicked: parser bug");

        let report = analyzer.analyze_directory(dir.path(), &AnalysisOptions::default()).unwrap();
        let rules: Vec<_> = report.diagnostics.iter().map(|d| d.rule_id.as_str()).collect();
        assert_eq!(rules, vec![INGESTION_ERROR_RULE, "build-config-01"]);
    }

    #[test]
    fn test_deadline_mid_run_keeps_completed_units() {
        let files: Vec<_> = (0..5).map(|i| (format!("{i}.css"), "@tailwind base;\n")).collect();
        let files: Vec<_> = files.iter().map(|(path, content)| (path.as_str(), *content)).collect();
        let dir = tree(&files);
        let analyzer = Analyzer::with_defaults().unwrap().with_stages(ingest::parse_unit, slow_matcher);
        let options = AnalysisOptions {
            parallel: false,
            timeout: Some(Duration::from_millis(300)),
            ..Default::default()
        };

        let report = analyzer.analyze_directory(dir.path(), &options).unwrap();
        assert!(report.summary.timed_out);
        assert!(report.summary.units_linted >= 1);
        assert!(report.summary.units_not_dispatched >= 1);
        assert_eq!(report.summary.units_linted + report.summary.units_not_dispatched, 5);
        // Every completed unit still reports its diagnostic
        assert_eq!(report.diagnostics.len(), report.summary.units_linted);
    }

    #[test]
    fn test_unreadable_extensionless_file_is_reported() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blob"), [0xff, 0xfe, 0x00]).unwrap();
        let analyzer = Analyzer::with_defaults().unwrap();

        let binary = analyzer.lint_unit(&dir.path().join("blob"));
        assert_eq!(binary.disposition(), Disposition::Unclassified);
        assert!(binary.diagnostics.is_empty());

        let missing = analyzer.lint_unit(&dir.path().join("vanished"));
        assert_eq!(missing.disposition(), Disposition::Failed);
        assert_eq!(missing.diagnostics[0].rule_id, INGESTION_ERROR_RULE);
        assert!(missing.diagnostics[0].message.contains("cannot read file"));
    }

    #[test]
    fn test_missing_path_is_a_config_error() {
        let analyzer = Analyzer::with_defaults().unwrap();
        let result = analyzer.analyze_paths(&["/definitely/not/here"], &AnalysisOptions::default());
        assert!(matches!(result, Err(LintError::Config { .. })));
    }

    #[test]
    fn test_max_files_limits_selection() {
        let dir = tree(&[("a.css", ""), ("b.css", ""), ("c.css", "")]);
        let analyzer = Analyzer::with_defaults().unwrap();
        let options = AnalysisOptions { max_files: Some(1), ..Default::default() };

        let report = analyzer.analyze_directory(dir.path(), &options).unwrap();
        assert_eq!(report.summary.total_files, 1);
    }
}
