//! Configuration loading and management for Convention Guard
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML formats
//! - Raw YAML structures are converted to a registry, a path filter and run options
//! - Default configurations are embedded in code, not infrastructure
//! - Command-line flags are applied on top of the loaded file

use crate::domain::{LintError, LintResult, Severity};
use crate::patterns::path_filter::DEFAULT_IGNORE_FILE;
use crate::patterns::PathFilter;
use crate::report::OutputFormat;
use crate::rules::{defaults, RuleLoader, RuleRegistry, RulesetSelection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File names probed, in order, when no `--config` is given
pub const CONFIG_FILE_NAMES: [&str; 3] =
    ["convention-guard.yaml", "convention-guard.yml", ".convention-guard.yaml"];

const SUPPORTED_VERSIONS: [&str; 1] = ["1.0"];

/// Main configuration structure for Convention Guard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LintConfig {
    /// Configuration format version
    pub version: String,
    #[serde(default)]
    pub paths: PathConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub styling: StylingConfig,
    #[serde(default)]
    pub run: RunConfig,
    /// Directory relative table paths resolve against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Path filtering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathConfig {
    /// Include/exclude patterns (gitignore-style)
    #[serde(default = "PathFilter::default_patterns")]
    pub patterns: Vec<String>,
    /// Optional per-directory ignore file name
    #[serde(default = "default_ignore_file")]
    pub ignore_file: Option<String>,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self { patterns: PathFilter::default_patterns(), ignore_file: default_ignore_file() }
    }
}

/// Where rules come from and which of them run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesConfig {
    /// Load the built-in convention table
    #[serde(default = "default_true")]
    pub include_defaults: bool,
    /// Additional rule-table documents
    #[serde(default)]
    pub tables: Vec<PathBuf>,
    /// Enabled rulesets, or `all`
    #[serde(default = "default_rulesets")]
    pub rulesets: Vec<String>,
    /// Per-rule severity replacements
    #[serde(default)]
    pub severity_overrides: BTreeMap<String, Severity>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            include_defaults: true,
            tables: Vec::new(),
            rulesets: default_rulesets(),
            severity_overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StylingConfig {
    /// Globs of dynamic class compositions that are intentional
    #[serde(default)]
    pub dynamic_allowlist: Vec<String>,
}

/// Run options, each overridable from the command line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default = "default_severity_min")]
    pub severity_min: Severity,
    #[serde(default)]
    pub format: OutputFormat,
    /// Run deadline in seconds
    #[serde(default)]
    pub timeout_secs: Option<f64>,
    /// Worker pool size; number of CPUs when unset
    #[serde(default)]
    pub workers: Option<usize>,
    /// Stop discovery after this many files
    #[serde(default)]
    pub max_files: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            severity_min: default_severity_min(),
            format: OutputFormat::default(),
            timeout_secs: None,
            workers: None,
            max_files: None,
        }
    }
}

impl LintConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> LintResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            LintError::config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let mut config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            LintError::config(format!("Failed to parse config file '{}': {}", path.display(), e))
        })?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> LintResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| LintError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Find a configuration file in `dir`, falling back to defaults
    pub fn discover(dir: &Path) -> LintResult<Self> {
        match CONFIG_FILE_NAMES.iter().map(|name| dir.join(name)).find(|p| p.is_file()) {
            Some(path) => {
                tracing::debug!("Using configuration {}", path.display());
                Self::load_from_file(path)
            }
            None => Ok(Self::with_defaults()),
        }
    }

    /// Default configuration with the built-in convention table
    pub fn with_defaults() -> Self {
        Self {
            version: "1.0".to_string(),
            paths: PathConfig::default(),
            rules: RulesConfig::default(),
            styling: StylingConfig::default(),
            run: RunConfig::default(),
            base_dir: PathBuf::new(),
        }
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> LintResult<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            return Err(LintError::config(format!(
                "Unsupported configuration version: {}. Supported versions: {}",
                self.version,
                SUPPORTED_VERSIONS.join(", ")
            )));
        }

        PathFilter::new(self.paths.patterns.clone(), None)?;
        self.ruleset_selection()?;

        for pattern in &self.styling.dynamic_allowlist {
            glob::Pattern::new(pattern).map_err(|e| {
                LintError::config(format!("Invalid dynamic allowlist pattern '{pattern}': {e}"))
            })?;
        }

        if let Some(timeout) = self.run.timeout_secs {
            match Duration::try_from_secs_f64(timeout) {
                Ok(duration) if !duration.is_zero() => {}
                _ => {
                    return Err(LintError::config(format!(
                        "Timeout must be a positive, representable number of seconds, got {timeout}"
                    )))
                }
            }
        }
        if self.run.workers == Some(0) {
            return Err(LintError::config("Worker count must be at least 1"));
        }
        if self.run.max_files == Some(0) {
            return Err(LintError::config("max_files must be at least 1"));
        }

        Ok(())
    }

    /// Run deadline as a duration; values rejected by `validate` yield none
    pub fn timeout(&self) -> Option<Duration> {
        self.run
            .timeout_secs
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
    }

    /// Rulesets enabled by this configuration
    pub fn ruleset_selection(&self) -> LintResult<RulesetSelection> {
        RulesetSelection::from_names(&self.rules.rulesets)
    }

    /// Read every configured rule table, built-in first
    pub fn rule_sources(&self) -> LintResult<Vec<(String, String)>> {
        let mut sources = Vec::new();
        if self.rules.include_defaults {
            sources.push(defaults::source());
        }

        for table in &self.rules.tables {
            let path = if table.is_absolute() { table.clone() } else { self.base_dir.join(table) };
            let text = fs::read_to_string(&path).map_err(|e| {
                LintError::rule_load(0, 0, format!("cannot read rule table '{}': {}", path.display(), e))
            })?;
            sources.push((path.display().to_string(), text));
        }

        if sources.is_empty() {
            return Err(LintError::config("No rule tables: built-in rules are disabled and no tables are configured"));
        }
        Ok(sources)
    }

    /// Load, restrict and finalize the rule registry for a run
    pub fn build_registry(&self) -> LintResult<RuleRegistry> {
        let sources = self.rule_sources()?;
        let loader = RuleLoader::new().with_severity_overrides(self.rules.severity_overrides.clone());
        let registry = RuleRegistry::from_sources(&loader, &sources)?
            .with_dynamic_allowlist(&self.styling.dynamic_allowlist)?
            .restrict(&self.ruleset_selection()?);

        tracing::debug!("Registry {} holds {} rules", registry.fingerprint(), registry.len());
        Ok(registry)
    }

    /// Path filter from the configured patterns
    pub fn path_filter(&self) -> LintResult<PathFilter> {
        PathFilter::new(self.paths.patterns.clone(), self.paths.ignore_file.clone())
    }
}

impl Default for LintConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn default_true() -> bool {
    true
}

fn default_rulesets() -> Vec<String> {
    vec!["all".to_string()]
}

fn default_severity_min() -> Severity {
    Severity::Warning
}

fn default_ignore_file() -> Option<String> {
    Some(DEFAULT_IGNORE_FILE.to_string())
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: LintConfig,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self { config: LintConfig::default() }
    }

    /// Start from an existing configuration
    pub fn from_config(config: LintConfig) -> Self {
        Self { config }
    }

    /// Add a path pattern
    pub fn add_path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.paths.patterns.push(pattern.into());
        self
    }

    /// Set the ignore file name
    pub fn ignore_file(mut self, filename: impl Into<String>) -> Self {
        self.config.paths.ignore_file = Some(filename.into());
        self
    }

    /// Add a rule-table document
    pub fn add_rule_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.rules.tables.push(path.into());
        self
    }

    pub fn include_defaults(mut self, include: bool) -> Self {
        self.config.rules.include_defaults = include;
        self
    }

    /// Replace the enabled rulesets
    pub fn rulesets(mut self, names: Vec<String>) -> Self {
        self.config.rules.rulesets = names;
        self
    }

    pub fn severity_override(mut self, rule_id: impl Into<String>, severity: Severity) -> Self {
        self.config.rules.severity_overrides.insert(rule_id.into(), severity);
        self
    }

    pub fn allow_dynamic(mut self, pattern: impl Into<String>) -> Self {
        self.config.styling.dynamic_allowlist.push(pattern.into());
        self
    }

    pub fn severity_min(mut self, severity: Severity) -> Self {
        self.config.run.severity_min = severity;
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.run.format = format;
        self
    }

    pub fn timeout_secs(mut self, seconds: f64) -> Self {
        self.config.run.timeout_secs = Some(seconds);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.run.workers = Some(workers);
        self
    }

    pub fn max_files(mut self, max_files: usize) -> Self {
        self.config.run.max_files = Some(max_files);
        self
    }

    /// Build the final configuration
    pub fn build(self) -> LintResult<LintConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Domain;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = LintConfig::with_defaults();
        config.validate().unwrap();
        assert_eq!(config.run.severity_min, Severity::Warning);
        assert_eq!(config.ruleset_selection().unwrap(), RulesetSelection::All);

        let registry = config.build_registry().unwrap();
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = LintConfig::load_from_str(
            "version: \"1.0\"\nrules:\n  rulesets: [styling-tokens]\n  severity_overrides:\n    styling-tokens-01: error\nrun:\n  format: json\n",
        )
        .unwrap();

        assert!(config.rules.include_defaults);
        assert_eq!(config.run.format, OutputFormat::Json);
        assert_eq!(config.paths.ignore_file.as_deref(), Some(DEFAULT_IGNORE_FILE));

        let registry = config.build_registry().unwrap();
        assert!(registry.rules().iter().all(|r| r.domain() == Domain::StylingTokens));
        assert_eq!(registry.get("styling-tokens-01").unwrap().severity, Severity::Error);
    }

    #[test]
    fn test_invalid_configurations_are_rejected() {
        assert!(LintConfig::load_from_str("version: \"2.0\"\n").is_err());
        assert!(LintConfig::load_from_str("version: \"1.0\"\nunknown: 1\n").is_err());
        assert!(LintConfig::load_from_str("version: \"1.0\"\nrun:\n  timeout_secs: 0\n").is_err());
        assert!(LintConfig::load_from_str("version: \"1.0\"\nrun:\n  workers: 0\n").is_err());
        assert!(LintConfig::load_from_str("version: \"1.0\"\nrules:\n  rulesets: [widgets]\n").is_err());
        assert!(LintConfig::load_from_str("version: \"1.0\"\npaths:\n  patterns: [\"[\"]\n").is_err());
    }

    #[test]
    fn test_tables_resolve_against_config_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(
            dir.path().join("docs/conventions.md"),
            "| Category | Approved | Deprecated |\n|---|---|---|\n| Styling | `gap-2` | `space-x-2` |\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("convention-guard.yaml"),
            "version: \"1.0\"\nrules:\n  include_defaults: false\n  tables: [docs/conventions.md]\n",
        )
        .unwrap();

        let config = LintConfig::discover(dir.path()).unwrap();
        let registry = config.build_registry().unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.rules()[0].id, "styling-tokens-01");
    }

    #[test]
    fn test_missing_table_is_a_rule_load_error() {
        let config = ConfigBuilder::new().add_rule_table("/nonexistent/rules.md").build().unwrap();
        assert!(matches!(config.build_registry(), Err(LintError::RuleLoad { .. })));

        let empty = ConfigBuilder::new().include_defaults(false).build().unwrap();
        assert!(matches!(empty.build_registry(), Err(LintError::Config { .. })));
    }

    #[test]
    fn test_builder_collects_settings() {
        let config = ConfigBuilder::new()
            .add_path_pattern("**/legacy/**")
            .severity_min(Severity::Info)
            .allow_dynamic("grid-cols-*")
            .build()
            .unwrap();

        assert!(config.paths.patterns.contains(&"**/legacy/**".to_string()));
        assert_eq!(config.run.severity_min, Severity::Info);
        assert_eq!(config.styling.dynamic_allowlist, vec!["grid-cols-*".to_string()]);
        assert!(ConfigBuilder::new().timeout_secs(-1.0).build().is_err());
    }

    #[test]
    fn test_timeout_must_fit_a_duration() {
        for seconds in [1e20, f64::INFINITY, f64::NAN, 0.0, 1e-12] {
            let result = ConfigBuilder::new().timeout_secs(seconds).build();
            assert!(matches!(result, Err(LintError::Config { .. })), "{seconds} accepted");
        }

        let config = ConfigBuilder::new().timeout_secs(2.5).build().unwrap();
        assert_eq!(config.timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(LintConfig::default().timeout(), None);
    }
}
