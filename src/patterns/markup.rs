//! Markup shape matching over scanned component elements

use super::{PatternMatch, Span};
use crate::domain::LintResult;
use crate::ingest::SourceUnit;
use crate::rules::{Captures, MarkupShape, Rule};

/// Slot name captured for unnamed slots
const DEFAULT_SLOT: &str = "children";

pub(super) fn find<'r>(
    rule: &'r Rule,
    shape: &MarkupShape,
    unit: &SourceUnit,
    out: &mut Vec<PatternMatch<'r>>,
) -> LintResult<()> {
    for element in unit.elements() {
        match shape {
            MarkupShape::Directive { namespace } => {
                for attribute in &element.attributes {
                    let Some(directive) = attribute
                        .name
                        .strip_prefix(namespace.as_str())
                        .and_then(|rest| rest.strip_prefix(':'))
                    else {
                        continue;
                    };
                    let (event, modifiers) = directive.split_once('|').unwrap_or((directive, ""));

                    let mut captures = Captures::new();
                    captures.insert("event", event.to_string());
                    captures.insert("modifiers", modifiers.to_string());
                    captures.insert("value", attribute.value.as_ref().map(|v| v.raw.clone()).unwrap_or_default());
                    captures.insert("element", element.name.clone());
                    out.push(PatternMatch::new(rule, unit, Span::new(attribute.start, attribute.end), captures)?);
                }
            }
            MarkupShape::Element { name, required_attributes } => {
                if element.name != *name || !required_attributes.iter().all(|a| element.attribute(a).is_some()) {
                    continue;
                }
                let slot_name = element
                    .attribute("name")
                    .map(|a| a.inner_value())
                    .filter(|n| !n.is_empty())
                    .unwrap_or(DEFAULT_SLOT);

                let mut captures = Captures::new();
                captures.insert("name", slot_name.to_string());
                captures.insert("element", element.name.clone());
                out.push(PatternMatch::new(rule, unit, Span::new(element.start, element.end), captures)?);
            }
            MarkupShape::Attribute { name } => {
                for attribute in element.attributes.iter().filter(|a| a.name == *name) {
                    let mut captures = Captures::new();
                    captures.insert("value", attribute.inner_value().to_string());
                    captures.insert("element", element.name.clone());
                    out.push(PatternMatch::new(rule, unit, Span::new(attribute.start, attribute.end), captures)?);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::patterns::match_unit;
    use crate::patterns::tests::unit;
    use crate::rules::RuleRegistry;

    fn found(rows: &str, content: &str) -> Vec<(String, String)> {
        let table = format!("| Category | Approved | Deprecated |\n|---|---|---|\n{rows}");
        let registry = RuleRegistry::from_table(&table).unwrap();
        match_unit(&registry, &unit("C.svelte", content))
            .unwrap()
            .into_iter()
            .map(|m| (m.captured.clone(), m.suggestion()))
            .collect()
    }

    #[test]
    fn test_event_directive_rewrites() {
        let rows = "| Events | `on{event}={value}` | `on:click={handler}` |\n";
        let content = "<button on:click={save} on:keydown|preventDefault={key}>Save</button>\n<input bind:value={name} />";
        assert_eq!(
            found(rows, content),
            vec![
                ("on:click={save}".to_string(), "onclick={save}".to_string()),
                ("on:keydown|preventDefault={key}".to_string(), "onkeydown={key}".to_string()),
            ]
        );
    }

    #[test]
    fn test_named_slot_is_more_specific() {
        let rows = "| Slots | `{@render {name}?.()}` | `<slot />` |\n| Slots | `{@render {name}()}` | `<slot name=\"header\" />` |\n";
        let content = "<header><slot name=\"title\" /></header>\n<main><slot /></main>";
        assert_eq!(
            found(rows, content),
            vec![
                ("<slot name=\"title\" />".to_string(), "{@render title()}".to_string()),
                ("<slot />".to_string(), "{@render children?.()}".to_string()),
            ]
        );
    }

    #[test]
    fn test_slot_attribute() {
        let rows = "| Slots | `{#snippet {value}()}` | `slot=\"header\"` |\n";
        let content = "<Card><h2 slot=\"title\">Hi</h2></Card>";
        assert_eq!(found(rows, content), vec![("slot=\"title\"".to_string(), "{#snippet title()}".to_string())]);
    }
}
