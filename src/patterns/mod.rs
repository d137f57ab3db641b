//! Pattern matching of compiled rules against parsed source units
//!
//! Architectural Principle: Service Layer - match_unit coordinates one matcher per construct family
//! - Dispatch is an exhaustive match over rule shapes, no string-typed lookups
//! - Matchers are pure functions of (registry, unit); they never touch the file system
//! - Overlapping candidates are resolved to exactly one match before reporting

pub mod path_filter;

mod config;
mod markup;
mod script;
mod tokens;

pub use path_filter::PathFilter;

use crate::domain::{LintError, LintResult};
use crate::ingest::SourceUnit;
use crate::rules::{AntiPattern, Captures, ComponentShape, Domain, Rule, RuleRegistry};

/// Half-open byte range in a unit's content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end: end.max(start) }
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A rule matched at a location in a unit
#[derive(Debug, Clone)]
pub struct PatternMatch<'r> {
    pub rule: &'r Rule,
    pub span: Span,
    /// Source text covered by the span
    pub captured: String,
    /// Named pieces of the match for the replacement template
    pub captures: Captures,
}

impl<'r> PatternMatch<'r> {
    /// Build a match, capturing the span text from the unit
    fn new(rule: &'r Rule, unit: &SourceUnit, span: Span, mut captures: Captures) -> LintResult<Self> {
        let captured = unit
            .content
            .get(span.start..span.end)
            .ok_or_else(|| {
                LintError::matching(
                    unit.path.display().to_string(),
                    format!("rule {} produced span {}..{} outside the unit", rule.id, span.start, span.end),
                )
            })?
            .to_string();
        captures.entry("match").or_insert_with(|| captured.clone());

        Ok(Self { rule, span, captured, captures })
    }

    /// Rendered replacement for this match
    pub fn suggestion(&self) -> String {
        self.rule.render_suggestion(&self.captures)
    }
}

/// Run every rule of the registry against a unit and resolve overlaps
pub fn match_unit<'r>(registry: &'r RuleRegistry, unit: &SourceUnit) -> LintResult<Vec<PatternMatch<'r>>> {
    let mut candidates = Vec::new();

    for domain in Domain::ALL {
        for rule in registry.rules_for(domain) {
            match &rule.antipattern {
                AntiPattern::ReactiveState(shape) | AntiPattern::Props(shape) => {
                    script::find(rule, shape, unit, &mut candidates)?
                }
                AntiPattern::Events(shape) | AntiPattern::SlottedContent(shape) => match shape {
                    ComponentShape::Script(shape) => script::find(rule, shape, unit, &mut candidates)?,
                    ComponentShape::Markup(shape) => markup::find(rule, shape, unit, &mut candidates)?,
                },
                AntiPattern::StylingTokens(shape) => tokens::find(rule, shape, registry, unit, &mut candidates)?,
                AntiPattern::BuildConfig(shape) => config::find(rule, shape, unit, &mut candidates)?,
            }
        }
    }

    tracing::trace!("{} candidate matches in {}", candidates.len(), unit.path.display());
    Ok(resolve_overlaps(candidates))
}

/// Keep one match per overlapping group: most specific pattern first, then domain priority,
/// then rule id. The survivors are returned in source order.
pub fn resolve_overlaps(mut candidates: Vec<PatternMatch<'_>>) -> Vec<PatternMatch<'_>> {
    candidates.sort_by(|a, b| {
        b.rule
            .specificity
            .cmp(&a.rule.specificity)
            .then_with(|| a.rule.domain().priority().cmp(&b.rule.domain().priority()))
            .then_with(|| a.rule.id.cmp(&b.rule.id))
            .then_with(|| a.span.start.cmp(&b.span.start))
    });

    let mut accepted: Vec<PatternMatch<'_>> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if accepted.iter().all(|m| !m.span.overlaps(&candidate.span)) {
            accepted.push(candidate);
        }
    }

    accepted.sort_by(|a, b| a.span.start.cmp(&b.span.start).then_with(|| a.rule.id.cmp(&b.rule.id)));
    accepted
}
