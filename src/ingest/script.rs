//! Script block parsing backed by tree-sitter
//!
//! Component `<script>` blocks and standalone modules are parsed once into a syntax tree
//! that the script matchers walk by node shape.

use tree_sitter::{Language, Node, Parser, Tree};

/// Grammar used to parse a script block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLang {
    JavaScript,
    TypeScript,
}

impl ScriptLang {
    /// Grammar for a standalone script file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "js" | "mjs" | "cjs" | "jsx" => Some(Self::JavaScript),
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            _ => None,
        }
    }

    /// Grammar for a component `<script lang="...">` attribute
    pub fn from_lang_attribute(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "ts" || v == "typescript" => Self::TypeScript,
            _ => Self::JavaScript,
        }
    }

    fn language(self) -> Language {
        match self {
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        }
    }
}

/// Where a script block lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptContext {
    /// Component instance script, runs once per component instance
    Instance,
    /// Component `context="module"` script
    Module,
    /// Standalone `.js` / `.ts` file
    Standalone,
    /// Expression in component markup (`{expr}`, `{#if expr}`, `attr={expr}`)
    Markup,
}

/// Syntax error found while parsing a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    /// Absolute byte offset in the owning file
    pub offset: usize,
    pub message: String,
}

/// A parsed script block
#[derive(Debug)]
pub struct ScriptBlock {
    pub lang: ScriptLang,
    pub context: ScriptContext,
    /// Byte offset of `source` inside the owning file
    pub offset: usize,
    pub source: String,
    pub tree: Tree,
}

impl ScriptBlock {
    /// Parse a script block that starts at `offset` in its file
    pub fn parse(
        source: impl Into<String>,
        offset: usize,
        lang: ScriptLang,
        context: ScriptContext,
    ) -> Result<Self, ScriptError> {
        let source = source.into();
        let tree = parse_tree(&source, lang).map_err(|e| ScriptError {
            offset: offset + e.offset,
            message: e.message,
        })?;

        Ok(Self { lang, context, offset, source, tree })
    }

    /// Parse a template expression whose text starts at `offset`
    ///
    /// The expression is parenthesized so object literals and sequences parse as expressions;
    /// node offsets still map onto the owning file.
    pub fn parse_expression(expression: &str, offset: usize, lang: ScriptLang) -> Result<Self, ScriptError> {
        Self::parse(format!("({expression})"), offset.saturating_sub(1), lang, ScriptContext::Markup)
    }

    /// Root node of the syntax tree
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text covered by a node, if the node belongs to this block
    pub fn text(&self, node: Node<'_>) -> Option<&str> {
        self.source.get(node.start_byte()..node.end_byte())
    }
}

/// Parse source text into a syntax tree, rejecting trees with error nodes
pub fn parse_tree(source: &str, lang: ScriptLang) -> Result<Tree, ScriptError> {
    let mut parser = Parser::new();
    parser.set_language(&lang.language()).map_err(|e| ScriptError {
        offset: 0,
        message: format!("failed to load grammar: {e}"),
    })?;

    let tree = parser.parse(source, None).ok_or_else(|| ScriptError {
        offset: 0,
        message: "parser produced no syntax tree".to_string(),
    })?;

    if let Some(node) = first_error(tree.root_node()) {
        let message = if node.is_missing() {
            format!("syntax error: missing `{}`", node.kind())
        } else {
            let snippet: String = source
                .get(node.start_byte()..node.end_byte())
                .unwrap_or("")
                .chars()
                .take(40)
                .collect();
            format!("syntax error near `{}`", snippet.trim())
        };
        return Err(ScriptError { offset: node.start_byte(), message });
    }

    Ok(tree)
}

/// All nodes under `root` (inclusive) in pre-order
pub fn descendants(root: Node<'_>) -> Vec<Node<'_>> {
    let mut nodes = Vec::new();
    let mut cursor = root.walk();

    loop {
        nodes.push(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return nodes;
            }
        }
    }
}

/// Named children of a node
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    if !root.has_error() {
        return None;
    }
    descendants(root)
        .into_iter()
        .find(|node| node.is_error() || node.is_missing())
        .or(Some(root))
}
