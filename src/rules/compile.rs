//! Compile deprecated-pattern snippets into typed shapes
//!
//! Script snippets are parsed with the same grammar used for source units, so a rule
//! written as `export let name` targets exactly the syntax tree shape of that statement.

use super::{AntiPattern, ComponentShape, ConfigShape, Domain, MarkupShape, ScriptShape, TokenShape};
use crate::ingest::classes::split_utility;
use crate::ingest::markup::{self, MarkupOptions};
use crate::ingest::script::{descendants, named_children, parse_tree, ScriptLang};
use lazy_static::lazy_static;
use regex::Regex;
use tree_sitter::Node;

lazy_static! {
    static ref DIRECTIVE: Regex = Regex::new(r"^([A-Za-z][\w-]*):[\w-]+").unwrap();
    static ref BARE_ATTRIBUTE: Regex = Regex::new(r#"^([A-Za-z_][\w-]*)=["'{]"#).unwrap();
    static ref KEY_SEGMENT: Regex = Regex::new(r"^[^\s=]+$").unwrap();
}

/// Compile the deprecated pattern of a rule in `domain`
pub fn compile(domain: Domain, pattern: &str) -> Result<AntiPattern, String> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err("pattern is empty".to_string());
    }

    Ok(match domain {
        Domain::ReactiveState => AntiPattern::ReactiveState(script_shape(pattern)?),
        Domain::Props => AntiPattern::Props(script_shape(pattern)?),
        Domain::Events => AntiPattern::Events(component_shape(pattern)?),
        Domain::SlottedContent => AntiPattern::SlottedContent(component_shape(pattern)?),
        Domain::StylingTokens => AntiPattern::StylingTokens(token_shape(pattern)?),
        Domain::BuildConfig => AntiPattern::BuildConfig(config_shape(pattern)?),
    })
}

fn component_shape(pattern: &str) -> Result<ComponentShape, String> {
    if looks_like_markup(pattern) {
        markup_shape(pattern).map(ComponentShape::Markup)
    } else {
        script_shape(pattern).map(ComponentShape::Script)
    }
}

fn looks_like_markup(pattern: &str) -> bool {
    pattern.starts_with('<') || DIRECTIVE.is_match(pattern) || BARE_ATTRIBUTE.is_match(pattern)
}

fn markup_shape(pattern: &str) -> Result<MarkupShape, String> {
    if pattern.starts_with('<') {
        let doc = markup::scan(pattern, MarkupOptions::component()).map_err(|e| e.message)?;
        let element = doc
            .elements
            .into_iter()
            .next()
            .ok_or_else(|| "expected an element".to_string())?;

        if let Some(directive) = element
            .attributes
            .iter()
            .find(|a| !a.name.starts_with('{') && a.name.contains(':'))
        {
            let namespace = directive.name.split(':').next().unwrap_or_default();
            return Ok(MarkupShape::Directive { namespace: namespace.to_string() });
        }

        return Ok(MarkupShape::Element {
            name: element.name,
            required_attributes: element
                .attributes
                .into_iter()
                .filter(|a| !a.name.starts_with('{'))
                .map(|a| a.name)
                .collect(),
        });
    }

    if let Some(caps) = DIRECTIVE.captures(pattern) {
        return Ok(MarkupShape::Directive { namespace: caps[1].to_string() });
    }
    if let Some(caps) = BARE_ATTRIBUTE.captures(pattern) {
        return Ok(MarkupShape::Attribute { name: caps[1].to_string() });
    }

    Err("expected an element, directive or attribute".to_string())
}

/// Remove `...` placeholders that are not spread syntax
fn strip_placeholders(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(index) = rest.find("...") {
        out.push_str(&rest[..index]);
        let after = &rest[index + 3..];
        let spread = after
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$');
        if spread {
            out.push_str("...");
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

fn script_shape(pattern: &str) -> Result<ScriptShape, String> {
    let source = strip_placeholders(pattern);
    let tree = parse_tree(&source, ScriptLang::JavaScript)
        .or_else(|_| parse_tree(&source, ScriptLang::TypeScript))
        .map_err(|e| format!("not a valid script snippet ({})", e.message))?;

    let text = |node: Node<'_>| source.get(node.start_byte()..node.end_byte()).unwrap_or("").to_string();

    let statement = named_children(tree.root_node())
        .into_iter()
        .find(|n| n.kind() != "comment")
        .ok_or_else(|| "snippet contains no statement".to_string())?;

    match statement.kind() {
        "export_statement" => {
            let declaration = statement.child_by_field_name("declaration");
            let is_let = declaration.is_some_and(|d| match d.kind() {
                "lexical_declaration" => d.child_by_field_name("kind").is_some_and(|k| text(k) == "let"),
                "variable_declaration" => true,
                _ => false,
            });
            if is_let {
                return Ok(ScriptShape::ExportedBinding);
            }
        }
        "labeled_statement" => {
            let is_reactive = statement.child_by_field_name("label").is_some_and(|l| text(l) == "$");
            if is_reactive {
                let assigns = statement
                    .child_by_field_name("body")
                    .filter(|b| b.kind() == "expression_statement")
                    .and_then(|b| b.named_child(0))
                    .is_some_and(|e| e.kind() == "assignment_expression");
                return Ok(if assigns {
                    ScriptShape::ReactiveAssignment
                } else {
                    ScriptShape::ReactiveStatement
                });
            }
        }
        "import_statement" => {
            let source_text = statement
                .child_by_field_name("source")
                .map(|s| text(s).trim_matches(['"', '\'']).to_string());
            let specifier = descendants(statement)
                .into_iter()
                .find(|n| n.kind() == "import_specifier")
                .and_then(|n| n.child_by_field_name("name"))
                .ok_or_else(|| "import snippet needs a named specifier".to_string())?;
            return Ok(ScriptShape::Import { name: text(specifier), source: source_text });
        }
        "expression_statement" => {
            if let Some(expr) = statement.named_child(0) {
                if expr.kind() == "identifier" {
                    return Ok(ScriptShape::Identifier { name: text(expr) });
                }
                if expr.kind() == "member_expression" {
                    if let Some(object) = expr.child_by_field_name("object").filter(|o| o.kind() == "identifier") {
                        return Ok(ScriptShape::Identifier { name: text(object) });
                    }
                }
            }
        }
        _ => {}
    }

    descendants(statement)
        .into_iter()
        .find(|n| n.kind() == "call_expression")
        .and_then(|call| call.child_by_field_name("function"))
        .filter(|callee| callee.kind() == "identifier")
        .map(|callee| ScriptShape::Call { callee: text(callee) })
        .ok_or_else(|| format!("unsupported script construct '{}'", statement.kind()))
}

fn token_shape(pattern: &str) -> Result<TokenShape, String> {
    if pattern.contains('{') {
        return Ok(TokenShape::DynamicComposition);
    }
    if pattern.contains(char::is_whitespace) {
        return Err("expected a single utility token".to_string());
    }

    let base = split_utility(pattern).base;
    match base.strip_suffix('*') {
        Some(prefix) if !prefix.is_empty() && !prefix.contains('*') => {
            Ok(TokenShape::UtilityFamily { prefix: prefix.to_string() })
        }
        Some(_) => Err("wildcards are only supported at the end of a utility".to_string()),
        None if base.is_empty() => Err("utility token is empty".to_string()),
        None => Ok(TokenShape::Utility { token: base.to_string() }),
    }
}

fn config_shape(pattern: &str) -> Result<ConfigShape, String> {
    if let Some(at_rule) = pattern.strip_prefix('@') {
        let at_rule = at_rule.trim_end_matches(';').trim();
        let (name, params) = match at_rule.split_once(char::is_whitespace) {
            Some((name, params)) => (name, Some(params.trim().to_string())),
            None => (at_rule, None),
        };
        if name.is_empty() {
            return Err("at-rule name is empty".to_string());
        }
        return Ok(ConfigShape::AtRule { name: name.to_string(), params });
    }

    let (path, value) = match pattern.split_once('=') {
        Some((path, value)) => (path.trim(), Some(value.trim().trim_matches(['"', '\'']))),
        None => (pattern, None),
    };

    let segments: Vec<String> = path.split('.').map(|s| s.trim().to_string()).collect();
    if segments.iter().any(|s| s.is_empty() || !KEY_SEGMENT.is_match(s)) {
        return Err(format!("invalid key path '{path}'"));
    }

    let value = value
        .map(|v| glob::Pattern::new(v).map_err(|e| format!("invalid value pattern '{v}': {e}")))
        .transpose()?;

    Ok(ConfigShape::KeyPath { path: segments, value })
}
