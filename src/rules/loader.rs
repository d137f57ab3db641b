//! Markdown pipe-table rule loader
//!
//! A rule table has a header row naming at least the `Category`, `Approved pattern` and
//! `Deprecated pattern` columns, a separator row, then one rule per row. Optional
//! `Rationale`, `Severity` and `Id` columns are honored. Tables whose header names none of
//! the rule columns are skipped, so tables can live inside ordinary documentation.

use super::compile::compile;
use super::{specificity, Domain, Rule, RuleOrigin};
use crate::domain::{LintError, LintResult, Severity, INGESTION_ERROR_RULE, MATCH_ERROR_RULE};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

lazy_static! {
    static ref SEPARATOR_ROW: Regex =
        Regex::new(r"^\s*\|?\s*:?-+:?\s*(\|\s*:?-+:?\s*)*\|?\s*$").unwrap();
    static ref RULE_ID: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap();
}

/// Column positions of a rule table
#[derive(Debug, Clone, Default)]
struct Columns {
    category: Option<usize>,
    approved: Option<usize>,
    deprecated: Option<usize>,
    rationale: Option<usize>,
    severity: Option<usize>,
    id: Option<usize>,
}

impl Columns {
    fn from_header(cells: &[String]) -> Self {
        let mut columns = Self::default();
        for (index, cell) in cells.iter().enumerate() {
            let key: String = cell
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect();
            let slot = match key.as_str() {
                "category" | "domain" | "area" => &mut columns.category,
                "approvedpattern" | "approved" | "recommended" | "recommendedpattern" | "use" | "preferred"
                | "replacement" => &mut columns.approved,
                "deprecatedpattern" | "deprecated" | "avoid" | "antipattern" | "legacy" | "legacypattern" => {
                    &mut columns.deprecated
                }
                "rationale" | "notes" | "note" | "why" | "reason" => &mut columns.rationale,
                "severity" | "level" => &mut columns.severity,
                "id" | "ruleid" => &mut columns.id,
                _ => continue,
            };
            slot.get_or_insert(index);
        }
        columns
    }

    fn is_rule_table(&self) -> bool {
        self.category.is_some() || self.approved.is_some() || self.deprecated.is_some()
    }

    fn missing(&self) -> Option<&'static str> {
        if self.category.is_none() {
            Some("Category")
        } else if self.approved.is_none() {
            Some("Approved pattern")
        } else if self.deprecated.is_none() {
            Some("Deprecated pattern")
        } else {
            None
        }
    }
}

/// Identifier bookkeeping shared across every table of one load
#[derive(Debug, Default)]
struct LoadState {
    rules: Vec<Rule>,
    ordinals: BTreeMap<Domain, usize>,
    ids: BTreeSet<String>,
}

/// Loads rule tables into compiled rules
#[derive(Debug, Clone, Default)]
pub struct RuleLoader {
    severity_overrides: BTreeMap<String, Severity>,
}

impl RuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the severity of specific rules after loading
    pub fn with_severity_overrides(mut self, overrides: BTreeMap<String, Severity>) -> Self {
        self.severity_overrides = overrides;
        self
    }

    /// Load a single table document
    pub fn load_str(&self, text: &str) -> LintResult<Vec<Rule>> {
        self.load_sources(&[("<inline>".to_string(), text.to_string())])
    }

    /// Load several `(name, text)` table documents; ids are unique across all of them
    pub fn load_sources(&self, sources: &[(String, String)]) -> LintResult<Vec<Rule>> {
        let mut state = LoadState::default();

        for (name, text) in sources {
            let before = state.rules.len();
            self.load_document(name, text, &mut state)?;
            debug!("Loaded {} rules from {}", state.rules.len() - before, name);
        }

        for (id, severity) in &self.severity_overrides {
            let rule = state
                .rules
                .iter_mut()
                .find(|r| &r.id == id)
                .ok_or_else(|| LintError::config(format!("Severity override names unknown rule '{id}'")))?;
            rule.severity = *severity;
        }

        Ok(state.rules)
    }

    fn load_document(&self, name: &str, text: &str, state: &mut LoadState) -> LintResult<()> {
        let lines: Vec<&str> = text.lines().collect();
        let mut tables = 0;
        let mut row = 0;
        let mut i = 0;

        while i < lines.len() {
            let is_header = lines[i].contains('|') && lines.get(i + 1).is_some_and(|l| SEPARATOR_ROW.is_match(l));
            if !is_header {
                i += 1;
                continue;
            }

            let header_line = i + 1;
            let columns = Columns::from_header(&split_cells(lines[i]));
            i += 2;

            if !columns.is_rule_table() {
                while i < lines.len() && is_table_row(lines[i]) {
                    i += 1;
                }
                continue;
            }
            if let Some(missing) = columns.missing() {
                return Err(LintError::rule_load(
                    0,
                    header_line,
                    format!("{name}: table header is missing the '{missing}' column"),
                ));
            }

            tables += 1;
            while i < lines.len() && is_table_row(lines[i]) {
                row += 1;
                let rule = self.compile_row(name, row, i + 1, &columns, &split_cells(lines[i]), state)?;
                state.ids.insert(rule.id.clone());
                state.rules.push(rule);
                i += 1;
            }
        }

        if tables == 0 {
            return Err(LintError::rule_load(
                0,
                0,
                format!("{name}: no rule table found (expected Category, Approved pattern and Deprecated pattern columns)"),
            ));
        }

        Ok(())
    }

    fn compile_row(
        &self,
        source: &str,
        row: usize,
        line: usize,
        columns: &Columns,
        cells: &[String],
        state: &mut LoadState,
    ) -> LintResult<Rule> {
        let fail = |message: String| LintError::rule_load(row, line, format!("{source}: {message}"));
        let cell = |index: Option<usize>| index.and_then(|i| cells.get(i)).map(String::as_str).unwrap_or("");

        let category = plain_text(cell(columns.category));
        if category.is_empty() {
            return Err(fail("missing category".to_string()));
        }
        let domain =
            Domain::from_category(&category).ok_or_else(|| fail(format!("unknown category '{category}'")))?;

        let deprecated = code_text(cell(columns.deprecated));
        if deprecated.is_empty() {
            return Err(fail("missing deprecated pattern".to_string()));
        }
        let approved = code_text(cell(columns.approved));
        if approved.is_empty() {
            return Err(fail("missing approved pattern".to_string()));
        }

        let rationale = Some(plain_text(cell(columns.rationale))).filter(|r| !r.is_empty());

        let severity = match plain_text(cell(columns.severity)) {
            text if text.is_empty() => Severity::Warning,
            text => text
                .parse::<Severity>()
                .map_err(|_| fail(format!("invalid severity '{text}'")))?,
        };

        let antipattern =
            compile(domain, &deprecated).map_err(|e| fail(format!("deprecated pattern `{deprecated}`: {e}")))?;

        let ordinal = state.ordinals.entry(domain).or_insert(0);
        *ordinal += 1;
        let id = match plain_text(cell(columns.id)) {
            explicit if explicit.is_empty() => format!("{}-{:02}", domain.as_str(), ordinal),
            explicit if explicit == INGESTION_ERROR_RULE || explicit == MATCH_ERROR_RULE => {
                return Err(fail(format!("rule id '{explicit}' is reserved")))
            }
            explicit if RULE_ID.is_match(&explicit) => explicit,
            explicit => return Err(fail(format!("invalid rule id '{explicit}'"))),
        };
        if state.ids.contains(&id) {
            return Err(fail(format!("duplicate rule id '{id}'")));
        }

        Ok(Rule {
            id,
            antipattern,
            specificity: specificity(&deprecated),
            deprecated,
            replacement: approved,
            rationale,
            severity,
            origin: RuleOrigin { source: source.to_string(), line },
        })
    }
}

fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.contains('|')
}

/// Split a table row into cells. Pipes inside code spans or escaped as `\|` do not split.
fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = match trimmed.strip_suffix('|') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => trimmed,
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut code_fence: Option<usize> = None;
    let mut chars = trimmed.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '`' => {
                let mut run = 1;
                while chars.peek() == Some(&'`') {
                    chars.next();
                    run += 1;
                }
                current.extend(std::iter::repeat('`').take(run));
                code_fence = match code_fence {
                    None => Some(run),
                    Some(open) if open == run => None,
                    other => other,
                };
            }
            '|' if code_fence.is_none() => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());

    cells
}

/// Text of the first code span in a cell, or the whole cell when it has none
fn code_text(cell: &str) -> String {
    let Some(open) = cell.find('`') else {
        return cell.trim().to_string();
    };
    let run = cell[open..].chars().take_while(|c| *c == '`').count();
    let body = &cell[open + run..];
    let fence = "`".repeat(run);

    match body.find(&fence) {
        Some(close) => body[..close].trim().to_string(),
        None => body.trim().to_string(),
    }
}

/// Cell text with code-span backticks removed
fn plain_text(cell: &str) -> String {
    cell.replace('`', "").trim().to_string()
}
