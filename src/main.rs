//! Convention Guard CLI - Command-line interface for convention enforcement
//!
//! CDD Principle: Application Layer - CLI coordinates user interactions with domain services
//! - Translates flags into configuration overrides and analysis options
//! - Handles external concerns like terminal output, logging setup and process exit codes
//! - Exit status: 0 clean, 1 diagnostics at or above the minimum severity, 2 fatal error

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use convention_guard::{
    ConfigBuilder, ConventionGuard, Domain, LintConfig, LintError, LintResult, OutputFormat, ReportFormatter,
    ReportOptions, RuleLoader, RulesetSelection, Severity,
};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

/// Convention Guard - approved-vs-deprecated convention linting
#[derive(Parser)]
#[command(name = "convention-guard")]
#[command(version)]
#[command(about = "Structural linter for framework convention tables")]
#[command(long_about = "Convention Guard loads approved-vs-deprecated pattern tables, walks a source tree and reports every deprecated Svelte, Tailwind or build-config pattern with its suggested replacement.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Lint files or directories
    Lint(LintArgs),

    /// List the loaded rules
    Rules {
        /// Only rules of these rulesets (comma-separated)
        #[arg(long)]
        ruleset: Option<String>,
    },

    /// Explain what a specific rule does
    Explain {
        /// Rule ID to explain
        rule_id: String,
    },

    /// Load rule tables without linting anything
    ValidateRules {
        /// Rule-table documents to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Args, Default)]
struct LintArgs {
    /// Paths to lint (files or directories)
    paths: Vec<PathBuf>,

    /// Rulesets to enable, comma-separated, or `all`
    #[arg(long)]
    ruleset: Option<String>,

    /// Minimum severity that is reported and fails the run
    #[arg(long, value_enum)]
    severity_min: Option<SeverityArg>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormatArg>,

    /// Run deadline in seconds; files not started by then are not linted
    #[arg(long)]
    timeout: Option<f64>,

    /// Additional rule-table documents
    #[arg(long = "rules", action = clap::ArgAction::Append)]
    rules: Vec<PathBuf>,

    /// Do not load the built-in convention table
    #[arg(long)]
    no_default_rules: bool,

    /// Worker threads
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Additional exclude patterns
    #[arg(long, action = clap::ArgAction::Append)]
    exclude: Vec<String>,

    /// Maximum number of diagnostics to print
    #[arg(long)]
    max_diagnostics: Option<usize>,

    /// Lint on the calling thread only
    #[arg(long)]
    no_parallel: bool,
}

#[derive(Copy, Clone, ValueEnum, PartialEq)]
enum OutputFormatArg {
    Text,
    Json,
    Github,
    Sarif,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Text => OutputFormat::Text,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Github => OutputFormat::GitHub,
            OutputFormatArg::Sarif => OutputFormat::Sarif,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum SeverityArg {
    Info,
    Warning,
    Error,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Info => Severity::Info,
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Error => Severity::Error,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);
    if cli.no_color {
        disable_colors();
    }

    let stdout = io::stdout();
    let result = run_command(cli, &mut stdout.lock());

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            let exit_code = e.downcast_ref::<LintError>().map_or(2, LintError::exit_code);
            process::exit(exit_code);
        }
    }
}

fn run_command(cli: Cli, out: &mut dyn Write) -> anyhow::Result<i32> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Lint(args) => run_lint(config_path, args, !cli.no_color, out),
        Commands::Rules { ruleset } => Ok(run_list_rules(config_path, ruleset.as_deref(), out)?),
        Commands::Explain { rule_id } => Ok(run_explain(config_path, &rule_id, out)?),
        Commands::ValidateRules { files } => Ok(run_validate_rules(&files, out)?),
    }
}

/// Configuration from `--config`, or discovered in the working directory
fn load_config(config_path: Option<&Path>) -> LintResult<LintConfig> {
    match config_path {
        Some(path) => LintConfig::load_from_file(path),
        None => LintConfig::discover(&std::env::current_dir()?),
    }
}

/// Apply command-line flags on top of the file configuration
fn apply_overrides(config: LintConfig, args: &LintArgs) -> LintResult<LintConfig> {
    let mut builder = ConfigBuilder::from_config(config);

    if let Some(ruleset) = &args.ruleset {
        RulesetSelection::parse(ruleset)?;
        builder = builder.rulesets(ruleset.split(',').map(|s| s.trim().to_string()).collect());
    }
    if let Some(severity) = args.severity_min {
        builder = builder.severity_min(severity.into());
    }
    if let Some(format) = args.format {
        builder = builder.format(format.into());
    }
    if let Some(timeout) = args.timeout {
        builder = builder.timeout_secs(timeout);
    }
    if let Some(jobs) = args.jobs {
        builder = builder.workers(jobs);
    }
    if args.no_default_rules {
        builder = builder.include_defaults(false);
    }

    let cwd = std::env::current_dir()?;
    for table in &args.rules {
        builder = builder.add_rule_table(cwd.join(table));
    }
    for pattern in &args.exclude {
        builder = builder.add_path_pattern(pattern.clone());
    }

    builder.build()
}

fn run_lint(config_path: Option<&Path>, args: LintArgs, use_colors: bool, out: &mut dyn Write) -> anyhow::Result<i32> {
    let config = apply_overrides(load_config(config_path)?, &args)?;
    let format = config.run.format;
    let severity_min = config.run.severity_min;

    let guard = ConventionGuard::new_with_config(config)?.with_report_formatter(ReportFormatter::new(ReportOptions {
        use_colors,
        max_diagnostics: args.max_diagnostics,
        min_severity: Some(severity_min),
        ..Default::default()
    }));

    let paths = if args.paths.is_empty() { vec![PathBuf::from(".")] } else { args.paths };

    let mut options = guard.analysis_options();
    options.parallel = !args.no_parallel;

    let report = guard.lint_paths_with_options(&paths, &options)?;
    let formatted = guard.format_report(&report, format)?;

    out.write_all(formatted.as_bytes()).context("failed to write report")?;
    out.flush().context("failed to write report")?;

    Ok(guard.exit_code(&report))
}

fn run_list_rules(config_path: Option<&Path>, ruleset: Option<&str>, out: &mut dyn Write) -> LintResult<i32> {
    let config = load_config(config_path)?;
    let mut registry = config.build_registry()?;
    if let Some(ruleset) = ruleset {
        registry = registry.restrict(&RulesetSelection::parse(ruleset)?);
    }

    writeln!(out, "Rules ({})\n", registry.fingerprint().get(..12).unwrap_or(""))?;

    for domain in Domain::ALL {
        let rules: Vec<_> = registry.rules_for(domain).collect();
        if rules.is_empty() {
            continue;
        }
        writeln!(out, "{} ({})", domain.as_str(), rules.len())?;
        for rule in rules {
            writeln!(
                out,
                "  {} [{}] {} -> {}",
                rule.id,
                rule.severity.as_str(),
                rule.deprecated,
                rule.replacement
            )?;
        }
        writeln!(out)?;
    }

    let stats = registry.statistics();
    writeln!(
        out,
        "{} rules: {} error, {} warning, {} info",
        stats.total_rules,
        stats.by_severity.get(&Severity::Error).unwrap_or(&0),
        stats.by_severity.get(&Severity::Warning).unwrap_or(&0),
        stats.by_severity.get(&Severity::Info).unwrap_or(&0)
    )?;

    Ok(0)
}

fn run_explain(config_path: Option<&Path>, rule_id: &str, out: &mut dyn Write) -> LintResult<i32> {
    let config = load_config(config_path)?;
    let registry = config.build_registry()?;

    let Some(rule) = registry.get(rule_id) else {
        let known: Vec<&str> = registry.rules().iter().map(|r| r.id.as_str()).collect();
        return Err(LintError::config(format!(
            "Rule '{}' not found. Available rules: {}",
            rule_id,
            known.join(", ")
        )));
    };

    writeln!(out, "Rule: {}", rule.id)?;
    writeln!(out, "Ruleset: {}", rule.domain())?;
    writeln!(out, "Severity: {}", rule.severity)?;
    writeln!(out, "Deprecated: {}", rule.deprecated)?;
    writeln!(out, "Approved: {}", rule.replacement)?;
    if let Some(rationale) = &rule.rationale {
        writeln!(out, "Rationale: {rationale}")?;
    }
    writeln!(out, "Defined in: {} line {}", rule.origin.source, rule.origin.line)?;

    Ok(0)
}

fn run_validate_rules(files: &[PathBuf], out: &mut dyn Write) -> LintResult<i32> {
    let mut sources = Vec::with_capacity(files.len());
    for file in files {
        match fs::read_to_string(file) {
            Ok(text) => sources.push((file.display().to_string(), text)),
            Err(e) => {
                eprintln!("Cannot read {}: {}", file.display(), e);
                return Ok(2);
            }
        }
    }

    match RuleLoader::new().load_sources(&sources) {
        Ok(rules) => {
            writeln!(out, "{} rules loaded from {} table file(s)", rules.len(), sources.len())?;
            Ok(0)
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(2)
        }
    }
}

/// Diagnostics go to stderr so stdout carries only the report
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(feature = "colors")]
fn disable_colors() {
    colored::control::set_override(false);
}

#[cfg(not(feature = "colors"))]
fn disable_colors() {}
