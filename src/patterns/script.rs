//! Script shape matching over tree-sitter syntax trees

use super::{PatternMatch, Span};
use crate::domain::{LintError, LintResult};
use crate::ingest::script::{descendants, named_children, ScriptBlock, ScriptContext};
use crate::ingest::SourceUnit;
use crate::rules::{Captures, Rule, ScriptShape};
use tree_sitter::Node;

pub(super) fn find<'r>(
    rule: &'r Rule,
    shape: &ScriptShape,
    unit: &SourceUnit,
    out: &mut Vec<PatternMatch<'r>>,
) -> LintResult<()> {
    for block in unit.scripts().into_iter().chain(unit.expressions()) {
        if shape.component_only() && block.context != ScriptContext::Instance {
            continue;
        }

        for node in descendants(block.root()) {
            let Some(captures) = captures_for(shape, block, node)? else { continue };
            let span = Span::new(block.offset + node.start_byte(), block.offset + node.end_byte());
            out.push(PatternMatch::new(rule, unit, span, captures)?);
        }
    }

    Ok(())
}

fn captures_for(shape: &ScriptShape, block: &ScriptBlock, node: Node<'_>) -> LintResult<Option<Captures>> {
    let text = |node: Node<'_>| -> LintResult<String> {
        block
            .text(node)
            .map(str::to_string)
            .ok_or_else(|| LintError::matching("<script>", format!("node {} outside its block", node.kind())))
    };

    let mut captures = Captures::new();
    match shape {
        ScriptShape::ExportedBinding => {
            if node.kind() != "export_statement" || !is_top_level(node) {
                return Ok(None);
            }
            let Some(declaration) = node.child_by_field_name("declaration") else { return Ok(None) };
            let is_let = match declaration.kind() {
                "lexical_declaration" => match declaration.child_by_field_name("kind") {
                    Some(kind) => text(kind)? == "let",
                    None => false,
                },
                "variable_declaration" => true,
                _ => false,
            };
            if !is_let {
                return Ok(None);
            }

            let mut names = Vec::new();
            let mut bindings = Vec::new();
            let mut first_value = None;
            for declarator in named_children(declaration).into_iter().filter(|n| n.kind() == "variable_declarator") {
                let Some(name) = declarator.child_by_field_name("name") else { continue };
                let name = text(name)?;
                match declarator.child_by_field_name("value") {
                    Some(value) => {
                        let value = text(value)?;
                        bindings.push(format!("{name} = {value}"));
                        first_value.get_or_insert(value);
                    }
                    None => bindings.push(name.clone()),
                }
                names.push(name);
            }

            captures.insert("name", names.join(", "));
            captures.insert("binding", bindings.join(", "));
            captures.insert("value", first_value.unwrap_or_default());
        }
        ScriptShape::ReactiveAssignment => {
            let Some(body) = reactive_body(node, &text)? else { return Ok(None) };
            let assignment = Some(body)
                .filter(|b| b.kind() == "expression_statement")
                .and_then(|b| b.named_child(0))
                .filter(|e| e.kind() == "assignment_expression");
            let Some(assignment) = assignment else { return Ok(None) };
            let (Some(left), Some(right)) =
                (assignment.child_by_field_name("left"), assignment.child_by_field_name("right"))
            else {
                return Ok(None);
            };
            captures.insert("name", text(left)?);
            captures.insert("expr", text(right)?);
        }
        ScriptShape::ReactiveStatement => {
            let Some(body) = reactive_body(node, &text)? else { return Ok(None) };
            let body_text = text(body)?;
            captures.insert("body", body_text.trim_end_matches(';').trim().to_string());
        }
        ScriptShape::Call { callee } => {
            if node.kind() != "call_expression" {
                return Ok(None);
            }
            let Some(function) = node.child_by_field_name("function").filter(|f| f.kind() == "identifier")
            else {
                return Ok(None);
            };
            if text(function)? != *callee {
                return Ok(None);
            }
            let args = match node.child_by_field_name("arguments") {
                Some(arguments) => strip_parens(&text(arguments)?).to_string(),
                None => String::new(),
            };
            captures.insert("callee", callee.clone());
            captures.insert("args", args);
        }
        ScriptShape::Import { name, source } => {
            if node.kind() != "import_specifier" {
                return Ok(None);
            }
            let Some(imported) = node.child_by_field_name("name") else { return Ok(None) };
            if text(imported)? != *name {
                return Ok(None);
            }
            let module = enclosing_import_source(node).map(&text).transpose()?;
            let module = module.map(|m| m.trim_matches(['"', '\'']).to_string());
            if let Some(wanted) = source {
                if module.as_deref() != Some(wanted.as_str()) {
                    return Ok(None);
                }
            }
            captures.insert("name", name.clone());
            captures.insert("source", module.unwrap_or_default());
        }
        ScriptShape::Identifier { name } => {
            if node.kind() != "identifier" || text(node)? != *name {
                return Ok(None);
            }
            captures.insert("name", name.clone());
        }
    }

    Ok(Some(captures))
}

/// Body of a top-level `$:` labeled statement
fn reactive_body<'t>(
    node: Node<'t>,
    text: &impl Fn(Node<'_>) -> LintResult<String>,
) -> LintResult<Option<Node<'t>>> {
    if node.kind() != "labeled_statement" || !is_top_level(node) {
        return Ok(None);
    }
    match node.child_by_field_name("label") {
        Some(label) if text(label)? == "$" => Ok(node.child_by_field_name("body")),
        _ => Ok(None),
    }
}

fn is_top_level(node: Node<'_>) -> bool {
    node.parent().is_some_and(|p| p.kind() == "program")
}

fn enclosing_import_source(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node.parent();
    while let Some(ancestor) = current {
        if ancestor.kind() == "import_statement" {
            return ancestor.child_by_field_name("source");
        }
        current = ancestor.parent();
    }
    None
}

fn strip_parens(text: &str) -> &str {
    text.strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(text)
        .trim()
}
