//! Immutable, shareable rule registry
//!
//! Architecture: Built once per run, then only read
//! - Rules are indexed by domain in priority order
//! - Restricting to rulesets yields a new registry, never mutates the shared one
//! - A SHA-256 fingerprint identifies the exact rule sources that built it

use super::{Domain, Rule, RuleLoader, RulesetSelection};
use crate::domain::{LintError, LintResult, Severity};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Rule counts for `rules` listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_rules: usize,
    pub by_domain: BTreeMap<Domain, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
}

/// The set of compiled rules for a run
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
    by_domain: BTreeMap<Domain, Vec<usize>>,
    dynamic_allowlist: Vec<glob::Pattern>,
    fingerprint: String,
}

impl RuleRegistry {
    /// Build a registry from compiled rules
    pub fn new(rules: Vec<Rule>, fingerprint: impl Into<String>) -> Self {
        let mut by_domain: BTreeMap<Domain, Vec<usize>> = BTreeMap::new();
        for (index, rule) in rules.iter().enumerate() {
            by_domain.entry(rule.domain()).or_default().push(index);
        }

        Self { rules, by_domain, dynamic_allowlist: Vec::new(), fingerprint: fingerprint.into() }
    }

    /// Load and fingerprint `(name, text)` table sources
    pub fn from_sources(loader: &RuleLoader, sources: &[(String, String)]) -> LintResult<Self> {
        let rules = loader.load_sources(sources)?;
        Ok(Self::new(rules, fingerprint_sources(sources)))
    }

    /// Registry from a single table document
    pub fn from_table(text: &str) -> LintResult<Self> {
        Self::from_sources(&RuleLoader::new(), &[("<inline>".to_string(), text.to_string())])
    }

    /// Registry holding only the built-in convention table
    pub fn with_defaults() -> LintResult<Self> {
        Self::from_sources(&RuleLoader::new(), &[super::defaults::source()])
    }

    /// Glob patterns exempting intentional dynamic class compositions
    pub fn with_dynamic_allowlist(mut self, patterns: &[String]) -> LintResult<Self> {
        self.dynamic_allowlist = patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p)
                    .map_err(|e| LintError::config(format!("Invalid dynamic allowlist pattern '{p}': {e}")))
            })
            .collect::<LintResult<_>>()?;
        Ok(self)
    }

    /// A registry with only the rules of the selected rulesets
    pub fn restrict(&self, selection: &RulesetSelection) -> Self {
        let rules = self
            .rules
            .iter()
            .filter(|r| selection.includes(r.domain()))
            .cloned()
            .collect();

        let mut restricted = Self::new(rules, self.fingerprint.clone());
        restricted.dynamic_allowlist = self.dynamic_allowlist.clone();
        restricted
    }

    /// Every rule in load order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules of one domain in load order
    pub fn rules_for(&self, domain: Domain) -> impl Iterator<Item = &Rule> {
        self.by_domain
            .get(&domain)
            .into_iter()
            .flatten()
            .map(move |&index| &self.rules[index])
    }

    /// Look up a rule by id
    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Whether a dynamic class composition is explicitly allowed
    pub fn is_allowlisted(&self, token: &str) -> bool {
        self.dynamic_allowlist.iter().any(|p| p.matches(token))
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn statistics(&self) -> RegistryStats {
        let mut stats = RegistryStats { total_rules: self.rules.len(), ..Default::default() };
        for rule in &self.rules {
            *stats.by_domain.entry(rule.domain()).or_insert(0) += 1;
            *stats.by_severity.entry(rule.severity).or_insert(0) += 1;
        }
        stats
    }
}

fn fingerprint_sources(sources: &[(String, String)]) -> String {
    let mut hasher = Sha256::new();
    for (name, text) in sources {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
