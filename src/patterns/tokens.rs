//! Utility-class token matching

use super::{PatternMatch, Span};
use crate::domain::LintResult;
use crate::ingest::classes::split_utility;
use crate::ingest::SourceUnit;
use crate::rules::{Captures, Rule, RuleRegistry, TokenShape};

pub(super) fn find<'r>(
    rule: &'r Rule,
    shape: &TokenShape,
    registry: &RuleRegistry,
    unit: &SourceUnit,
    out: &mut Vec<PatternMatch<'r>>,
) -> LintResult<()> {
    for token in unit.class_tokens() {
        let mut captures = Captures::new();

        match shape {
            TokenShape::Utility { token: wanted } => {
                if token.dynamic {
                    continue;
                }
                let parts = split_utility(&token.text);
                if parts.base != wanted {
                    continue;
                }
                captures.insert("prefix", parts.prefix.to_string());
                captures.insert("suffix", parts.suffix.to_string());
                captures.insert("token", parts.base.to_string());
            }
            TokenShape::UtilityFamily { prefix } => {
                if token.dynamic {
                    continue;
                }
                let parts = split_utility(&token.text);
                let Some(rest) = parts.base.strip_prefix(prefix.as_str()).filter(|r| !r.is_empty()) else {
                    continue;
                };
                captures.insert("prefix", parts.prefix.to_string());
                captures.insert("suffix", parts.suffix.to_string());
                captures.insert("token", parts.base.to_string());
                captures.insert("rest", rest.to_string());
            }
            TokenShape::DynamicComposition => {
                if !token.dynamic || registry.is_allowlisted(&token.text) {
                    continue;
                }
                captures.insert("token", token.text.clone());
            }
        }

        out.push(PatternMatch::new(rule, unit, Span::new(token.start, token.end), captures)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::patterns::match_unit;
    use crate::patterns::tests::unit;
    use crate::rules::RuleRegistry;

    const ROWS: &str = "| Category | Approved | Deprecated |\n|---|---|---|\n\
        | Styling | `rounded-xs` | `rounded-sm` |\n\
        | Styling | `bg-black/{rest}` | `bg-opacity-*` |\n\
        | Styling | `static class names` | `bg-{color}-500` |\n";

    fn found(registry: &RuleRegistry, path: &str, content: &str) -> Vec<(String, String)> {
        match_unit(registry, &unit(path, content))
            .unwrap()
            .into_iter()
            .map(|m| (m.captured.clone(), m.suggestion()))
            .collect()
    }

    #[test]
    fn test_utility_in_stylesheet_apply() {
        let registry = RuleRegistry::from_table(ROWS).unwrap();
        let found = found(&registry, "app.css", ".card {\n  @apply md:rounded-sm p-4;\n}\n");
        assert_eq!(found, vec![("md:rounded-sm".to_string(), "md:rounded-xs".to_string())]);
    }

    #[test]
    fn test_family_and_dynamic_tokens_in_markup() {
        let registry = RuleRegistry::from_table(ROWS).unwrap();
        let content = "<div class=\"bg-opacity-50 text-{size} rounded-smooth\">x</div>";
        let found = found(&registry, "C.svelte", content);
        assert_eq!(
            found,
            vec![
                ("bg-opacity-50".to_string(), "bg-black/50".to_string()),
                ("text-{size}".to_string(), "static class names".to_string()),
            ]
        );
    }

    #[test]
    fn test_allowlisted_dynamic_tokens_are_ignored() {
        let registry = RuleRegistry::from_table(ROWS)
            .unwrap()
            .with_dynamic_allowlist(&["text-*".to_string()])
            .unwrap();
        let found = found(&registry, "C.svelte", "<div class=\"text-{size}\">x</div>");
        assert!(found.is_empty());
    }
}
