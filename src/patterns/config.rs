//! Build-configuration matching: key paths in config documents, at-rules in stylesheets

use super::{PatternMatch, Span};
use crate::domain::LintResult;
use crate::ingest::config_tree::{locate_key, ConfigNode};
use crate::ingest::SourceUnit;
use crate::rules::{Captures, ConfigShape, Rule};

pub(super) fn find<'r>(
    rule: &'r Rule,
    shape: &ConfigShape,
    unit: &SourceUnit,
    out: &mut Vec<PatternMatch<'r>>,
) -> LintResult<()> {
    match shape {
        ConfigShape::KeyPath { path, value } => {
            let Some(tree) = unit.config() else { return Ok(()) };

            for (found_path, node) in tree.find(path) {
                let scalar = node.as_scalar();
                if let Some(pattern) = value {
                    if !scalar.is_some_and(|s| pattern.matches(s)) {
                        continue;
                    }
                }

                let key = found_path.last().cloned().unwrap_or_default();
                let span = match locate_key(&unit.content, &found_path) {
                    Some(offset) => Span::new(offset, offset + key_token_len(&unit.content[offset..], &key)),
                    None => Span::new(0, 0),
                };

                let mut captures = Captures::new();
                captures.insert("key", key);
                captures.insert("path", found_path.join("."));
                captures.insert("value", scalar.map(str::to_string).unwrap_or_else(|| describe(node)));
                out.push(PatternMatch::new(rule, unit, span, captures)?);
            }
        }
        ConfigShape::AtRule { name, params } => {
            for at_rule in unit.at_rules() {
                if at_rule.name != *name {
                    continue;
                }
                if params.as_ref().is_some_and(|p| !at_rule.params.starts_with(p.as_str())) {
                    continue;
                }

                let mut captures = Captures::new();
                captures.insert("name", at_rule.name.clone());
                captures.insert("params", at_rule.params.clone());
                out.push(PatternMatch::new(rule, unit, Span::new(at_rule.start, at_rule.end), captures)?);
            }
        }
    }

    Ok(())
}

/// Length of the key token at the start of `text`, including quotes
fn key_token_len(text: &str, key: &str) -> usize {
    match text.chars().next() {
        Some(quote @ ('"' | '\'')) if text[1..].starts_with(key) => key.len() + 2 * quote.len_utf8(),
        _ => key.len(),
    }
}

fn describe(node: &ConfigNode) -> String {
    match node {
        ConfigNode::Null => "null".to_string(),
        ConfigNode::Scalar(value) => value.clone(),
        ConfigNode::Sequence(items) => format!("[{} items]", items.len()),
        ConfigNode::Table(entries) => format!("{{{} keys}}", entries.len()),
    }
}
