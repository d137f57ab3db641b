//! Path filtering using .gitignore-style patterns
//!
//! Architectural Principle: Service Layer - PathFilter decides which files become source units
//! - Configured patterns apply in order; `!pattern` re-includes
//! - `.conventionignore` files are honored from the file's directory up to the root
//! - Walk failures are collected instead of aborting discovery

use crate::domain::{LintError, LintResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Default name of per-directory ignore files
pub const DEFAULT_IGNORE_FILE: &str = ".conventionignore";

/// Decides which files of a tree are linted
#[derive(Debug, Clone)]
pub struct PathFilter {
    patterns: Vec<FilterPattern>,
    ignore_filename: Option<String>,
}

#[derive(Debug, Clone)]
struct FilterPattern {
    pattern: glob::Pattern,
    /// `!pattern` re-includes what earlier patterns excluded
    is_include: bool,
    original: String,
}

impl FilterPattern {
    fn parse(raw: &str) -> Result<Self, glob::PatternError> {
        let (is_include, body) = match raw.strip_prefix('!') {
            Some(stripped) => (true, stripped),
            None => (false, raw),
        };
        let glob_body = body.trim_start_matches('/').trim_end_matches('/');
        Ok(Self { pattern: glob::Pattern::new(glob_body)?, is_include, original: body.to_string() })
    }

    /// Match against a path relative to the directory the pattern is anchored at
    fn matches(&self, relative: &Path) -> bool {
        let relative_str = relative.to_string_lossy().replace('\\', "/");

        if self.original.ends_with('/') {
            // Directory pattern: any ancestor directory of the file
            let anchored = self.original.trim_end_matches('/').contains('/');
            return relative.ancestors().skip(1).any(|dir| {
                if dir.as_os_str().is_empty() {
                    return false;
                }
                if anchored {
                    self.pattern.matches(&dir.to_string_lossy().replace('\\', "/"))
                } else {
                    dir.file_name().is_some_and(|name| self.pattern.matches(&name.to_string_lossy()))
                }
            });
        }

        if self.original.contains('/') {
            return self.pattern.matches(&relative_str);
        }

        relative
            .file_name()
            .is_some_and(|name| self.pattern.matches(&name.to_string_lossy()))
    }
}

/// Files found under a root, plus entries that could not be walked
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub files: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, String)>,
}

impl PathFilter {
    /// Create a path filter from ordered patterns
    pub fn new(patterns: Vec<String>, ignore_filename: Option<String>) -> LintResult<Self> {
        let patterns = patterns
            .iter()
            .map(|raw| {
                FilterPattern::parse(raw)
                    .map_err(|e| LintError::config(format!("Invalid path pattern '{raw}': {e}")))
            })
            .collect::<LintResult<Vec<_>>>()?;

        Ok(Self { patterns, ignore_filename })
    }

    /// Default exclusions for front-end projects
    pub fn default_patterns() -> Vec<String> {
        [
            "**/node_modules/**",
            "**/.git/**",
            "**/.svelte-kit/**",
            "**/dist/**",
            "**/build/**",
            "**/*.min.*",
            "**/package-lock.json",
            "**/pnpm-lock.yaml",
        ]
        .iter()
        .map(|p| p.to_string())
        .collect()
    }

    pub fn with_defaults() -> LintResult<Self> {
        Self::new(Self::default_patterns(), Some(DEFAULT_IGNORE_FILE.to_string()))
    }

    /// Append a pattern, evaluated after the existing ones
    pub fn add_pattern(&mut self, pattern: &str) -> LintResult<()> {
        let parsed = FilterPattern::parse(pattern)
            .map_err(|e| LintError::config(format!("Invalid path pattern '{pattern}': {e}")))?;
        self.patterns.push(parsed);
        Ok(())
    }

    /// Whether a file under `root` should be linted
    pub fn should_analyze(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);

        let mut include = true;
        for pattern in &self.patterns {
            if pattern.matches(relative) {
                include = pattern.is_include;
            }
        }

        include && !self.is_ignored_by_files(path)
    }

    /// Walk up from the file collecting verdicts of ignore files; nearer files win
    fn is_ignored_by_files(&self, path: &Path) -> bool {
        let Some(ignore_filename) = &self.ignore_filename else {
            return false;
        };

        let mut ignore_dirs: Vec<&Path> = path.ancestors().skip(1).collect();
        ignore_dirs.reverse();

        let mut ignored = false;
        for dir in ignore_dirs {
            let ignore_file = dir.join(ignore_filename);
            if !ignore_file.is_file() {
                continue;
            }
            let Ok(relative) = path.strip_prefix(dir) else { continue };
            for pattern in load_ignore_file(&ignore_file) {
                if pattern.matches(relative) {
                    ignored = !pattern.is_include;
                }
            }
        }

        ignored
    }

    /// All files under `root` that pass the filter, sorted by path
    pub fn find_files(&self, root: &Path) -> Discovery {
        let mut discovery = Discovery::default();

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    if self.should_analyze(root, entry.path()) {
                        discovery.files.push(entry.into_path());
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    tracing::warn!("Cannot walk {}: {}", path.display(), e);
                    discovery.failures.push((path, e.to_string()));
                }
            }
        }

        discovery.files.sort();
        discovery
    }
}

fn load_ignore_file(path: &Path) -> Vec<FilterPattern> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Failed to read ignore file '{}': {}", path.display(), e);
            return Vec::new();
        }
    };

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match FilterPattern::parse(line) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!("Invalid pattern '{}' in {}: {}", line, path.display(), e);
                None
            }
        })
        .collect()
}
