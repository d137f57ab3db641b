//! Convention rules compiled from approved-vs-deprecated pattern tables
//!
//! Architecture: Closed set of pattern shapes per domain
//! - Each rule's deprecated snippet is compiled once into a typed shape at load time
//! - Matchers dispatch exhaustively over the shape, so adding a domain is a compile error
//!   until every matcher handles it
//! - Replacement templates are rendered from the captures of a match

mod compile;
pub mod defaults;
pub mod loader;
pub mod registry;

pub use loader::RuleLoader;
pub use registry::{RegistryStats, RuleRegistry};

use crate::domain::{LintError, LintResult, Severity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Convention category a rule belongs to, declared in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Domain {
    ReactiveState,
    Props,
    Events,
    SlottedContent,
    StylingTokens,
    BuildConfig,
}

impl Domain {
    /// Every domain, highest tie-break priority first
    pub const ALL: [Domain; 6] = [
        Domain::ReactiveState,
        Domain::Props,
        Domain::Events,
        Domain::SlottedContent,
        Domain::StylingTokens,
        Domain::BuildConfig,
    ];

    /// Ruleset name used on the command line and in rule ids
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReactiveState => "reactive-state",
            Self::Props => "props",
            Self::Events => "events",
            Self::SlottedContent => "slotted-content",
            Self::StylingTokens => "styling-tokens",
            Self::BuildConfig => "build-config",
        }
    }

    /// Human-readable label used in messages
    pub fn label(self) -> &'static str {
        match self {
            Self::ReactiveState => "Reactive state",
            Self::Props => "Props",
            Self::Events => "Events",
            Self::SlottedContent => "Slotted content",
            Self::StylingTokens => "Styling token",
            Self::BuildConfig => "Build config",
        }
    }

    /// Position in the tie-break order (0 wins)
    pub fn priority(self) -> usize {
        self as usize
    }

    /// Map a table `Category` cell to a domain, accepting common spellings
    pub fn from_category(text: &str) -> Option<Self> {
        let normalized = normalize_category(text);
        let domain = match normalized.as_str() {
            "reactive-state" | "reactivity" | "state" | "runes" | "reactive-statements"
            | "derived-state" | "effects" => Self::ReactiveState,
            "props" | "component-props" | "properties" | "prop" => Self::Props,
            "events" | "event-handlers" | "event-handling" | "event" => Self::Events,
            "slotted-content" | "slots" | "slot" | "snippets" | "content" => Self::SlottedContent,
            "styling-tokens" | "styling" | "tailwind" | "utility-classes" | "utilities" | "classes"
            | "css" => Self::StylingTokens,
            "build-config" | "build" | "config" | "configuration" | "build-configuration"
            | "tooling" => Self::BuildConfig,
            other if other.contains("reactiv") => Self::ReactiveState,
            other if other.contains("prop") => Self::Props,
            other if other.contains("event") => Self::Events,
            other if other.contains("slot") || other.contains("snippet") => Self::SlottedContent,
            other if other.contains("styl") || other.contains("tailwind") || other.contains("class") => {
                Self::StylingTokens
            }
            other if other.contains("build") || other.contains("config") => Self::BuildConfig,
            _ => return None,
        };
        Some(domain)
    }
}

fn normalize_category(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    for c in text.trim().chars() {
        if c.is_alphanumeric() {
            normalized.extend(c.to_lowercase());
        } else if (c.is_whitespace() || c == '_' || c == '-' || c == '/') && !normalized.ends_with('-') {
            normalized.push('-');
        }
    }
    normalized.trim_matches('-').to_string()
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = LintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .into_iter()
            .find(|d| d.as_str() == s.trim())
            .ok_or_else(|| {
                LintError::config(format!(
                    "Unknown ruleset '{}'. Expected 'all' or one of: {}",
                    s.trim(),
                    Domain::ALL.map(|d| d.as_str()).join(", ")
                ))
            })
    }
}

/// Which rulesets a run enables
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulesetSelection {
    All,
    Only(BTreeSet<Domain>),
}

impl RulesetSelection {
    /// Parse a comma-separated ruleset list, or `all`
    pub fn parse(list: &str) -> LintResult<Self> {
        let names: Vec<String> = list.split(',').map(|s| s.trim().to_string()).collect();
        Self::from_names(&names)
    }

    /// Build a selection from individual ruleset names
    pub fn from_names(names: &[String]) -> LintResult<Self> {
        let names: Vec<&str> = names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()).collect();
        if names.is_empty() {
            return Err(LintError::config("Ruleset selection is empty"));
        }
        if names.iter().any(|n| *n == "all") {
            return Ok(Self::All);
        }
        let domains = names
            .into_iter()
            .map(Domain::from_str)
            .collect::<LintResult<BTreeSet<_>>>()?;
        Ok(Self::Only(domains))
    }

    pub fn includes(&self, domain: Domain) -> bool {
        match self {
            Self::All => true,
            Self::Only(domains) => domains.contains(&domain),
        }
    }
}

/// Script constructs a rule can target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptShape {
    /// `export let name` at the top level of a component instance script
    ExportedBinding,
    /// `$: name = expr`
    ReactiveAssignment,
    /// `$: statement` or `$: { block }`
    ReactiveStatement,
    /// Call of a bare identifier, e.g. `createEventDispatcher()`
    Call { callee: String },
    /// `import { name } from 'source'`
    Import { name: String, source: Option<String> },
    /// Any reference to an identifier, e.g. `$$props`
    Identifier { name: String },
}

impl ScriptShape {
    /// Whether the shape only has meaning inside a component instance script
    pub fn component_only(&self) -> bool {
        matches!(self, Self::ExportedBinding | Self::ReactiveAssignment | Self::ReactiveStatement)
    }
}

/// Markup constructs a rule can target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupShape {
    /// `namespace:name={...}` directives, e.g. `on:click`
    Directive { namespace: String },
    /// An element carrying at least the listed attributes
    Element { name: String, required_attributes: Vec<String> },
    /// An attribute on any element
    Attribute { name: String },
}

/// Component constructs: script or markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentShape {
    Script(ScriptShape),
    Markup(MarkupShape),
}

/// Utility-class constructs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenShape {
    /// One utility, matched regardless of variant prefixes
    Utility { token: String },
    /// Every utility starting with a prefix, written `prefix-*`
    UtilityFamily { prefix: String },
    /// Tokens composed at runtime by gluing text to an interpolation
    DynamicComposition,
}

/// Build-configuration constructs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigShape {
    /// A dotted key path, `*` matching one segment, optionally with a value glob
    KeyPath { path: Vec<String>, value: Option<glob::Pattern> },
    /// A stylesheet at-rule, optionally restricted by a parameter prefix
    AtRule { name: String, params: Option<String> },
}

/// Compiled anti-pattern, tagged by domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AntiPattern {
    ReactiveState(ScriptShape),
    Props(ScriptShape),
    Events(ComponentShape),
    SlottedContent(ComponentShape),
    StylingTokens(TokenShape),
    BuildConfig(ConfigShape),
}

impl AntiPattern {
    pub fn domain(&self) -> Domain {
        match self {
            Self::ReactiveState(_) => Domain::ReactiveState,
            Self::Props(_) => Domain::Props,
            Self::Events(_) => Domain::Events,
            Self::SlottedContent(_) => Domain::SlottedContent,
            Self::StylingTokens(_) => Domain::StylingTokens,
            Self::BuildConfig(_) => Domain::BuildConfig,
        }
    }
}

/// Named text captured by a match, used to render replacement templates
pub type Captures = BTreeMap<&'static str, String>;

/// A compiled convention rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Stable identifier, `<domain>-<NN>` unless the table names one
    pub id: String,
    pub antipattern: AntiPattern,
    /// Deprecated pattern as written in the table
    pub deprecated: String,
    /// Approved pattern, used as the replacement template
    pub replacement: String,
    pub rationale: Option<String>,
    pub severity: Severity,
    /// Tie-break weight: non-whitespace characters in the deprecated pattern
    pub specificity: usize,
    /// Table the rule came from and its 1-based line
    pub origin: RuleOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOrigin {
    pub source: String,
    pub line: usize,
}

impl Rule {
    pub fn domain(&self) -> Domain {
        self.antipattern.domain()
    }

    /// Render the replacement template for one match
    pub fn render_suggestion(&self, captures: &Captures) -> String {
        let rendered = render_template(&self.replacement, captures);

        // Utility renames keep the variant and important markers of the matched token
        if let AntiPattern::StylingTokens(TokenShape::Utility { .. } | TokenShape::UtilityFamily { .. }) =
            &self.antipattern
        {
            if !self.replacement.contains("{prefix}") && !rendered.contains(char::is_whitespace) {
                let prefix = captures.get("prefix").map(String::as_str).unwrap_or("");
                let suffix = captures.get("suffix").map(String::as_str).unwrap_or("");
                return format!("{prefix}{rendered}{suffix}");
            }
        }

        rendered
    }
}

/// Substitute `{name}` placeholders with captures; unknown placeholders stay verbatim
pub fn render_template(template: &str, captures: &Captures) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substituted = after.find('}').and_then(|close| {
            let name = &after[..close];
            let is_placeholder = !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '_');
            is_placeholder
                .then(|| captures.get(name))
                .flatten()
                .map(|value| (value, close))
        });

        match substituted {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    out
}

/// Count of non-whitespace characters, the specificity of a deprecated pattern
pub fn specificity(pattern: &str) -> usize {
    pattern.chars().filter(|c| !c.is_whitespace()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn captures(pairs: &[(&'static str, &str)]) -> Captures {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[rstest]
    #[case("Reactive state", Domain::ReactiveState)]
    #[case("reactive_state", Domain::ReactiveState)]
    #[case("Props", Domain::Props)]
    #[case("Event handlers", Domain::Events)]
    #[case("Slots / Snippets", Domain::SlottedContent)]
    #[case("Tailwind utilities", Domain::StylingTokens)]
    #[case("Styling tokens", Domain::StylingTokens)]
    #[case("Build config", Domain::BuildConfig)]
    fn test_category_aliases(#[case] cell: &str, #[case] expected: Domain) {
        assert_eq!(Domain::from_category(cell), Some(expected));
    }

    #[test]
    fn test_unknown_category() {
        assert_eq!(Domain::from_category("Accessibility"), None);
    }

    #[test]
    fn test_priority_follows_declaration_order() {
        let ranks: Vec<_> = Domain::ALL.iter().map(|d| d.priority()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3, 4, 5]);
        assert!(Domain::ReactiveState < Domain::BuildConfig);
    }

    #[test]
    fn test_ruleset_selection() {
        assert_eq!(RulesetSelection::parse("all").unwrap(), RulesetSelection::All);

        let selection = RulesetSelection::parse("props, events").unwrap();
        assert!(selection.includes(Domain::Props));
        assert!(selection.includes(Domain::Events));
        assert!(!selection.includes(Domain::StylingTokens));

        assert!(RulesetSelection::parse("props,nope").is_err());
        assert!(RulesetSelection::parse(" , ").is_err());
    }

    #[test]
    fn test_render_template_substitutes_known_placeholders() {
        let caps = captures(&[("name", "doubled"), ("expr", "count * 2")]);
        assert_eq!(
            render_template("let {name} = $derived({expr});", &caps),
            "let doubled = $derived(count * 2);"
        );
    }

    #[test]
    fn test_render_template_keeps_literal_braces() {
        let caps = captures(&[("name", "header"), ("binding", "title")]);
        assert_eq!(render_template("{@render {name}?.()}", &caps), "{@render header?.()}");
        assert_eq!(render_template("let { {binding} } = $props();", &caps), "let { title } = $props();");
        assert_eq!(render_template("{unknown} {", &caps), "{unknown} {");
    }

    #[test]
    fn test_utility_suggestion_keeps_variant_prefix() {
        let rule = Rule {
            id: "styling-tokens-01".to_string(),
            antipattern: AntiPattern::StylingTokens(TokenShape::Utility { token: "rounded-sm".to_string() }),
            deprecated: "rounded-sm".to_string(),
            replacement: "rounded-xs".to_string(),
            rationale: None,
            severity: Severity::Warning,
            specificity: specificity("rounded-sm"),
            origin: RuleOrigin { source: "test".to_string(), line: 1 },
        };

        let caps = captures(&[("prefix", "md:hover:"), ("suffix", "!")]);
        assert_eq!(rule.render_suggestion(&caps), "md:hover:rounded-xs!");
        assert_eq!(rule.render_suggestion(&Captures::new()), "rounded-xs");
    }

    #[test]
    fn test_specificity_ignores_whitespace() {
        assert_eq!(specificity("$: doubled = count * 2"), 17);
        assert_eq!(specificity(" <slot /> "), 6);
    }
}
