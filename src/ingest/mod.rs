//! Source ingestion: classify files into units and parse them into structure
//!
//! Architecture: Each category has one parser producing a typed structure
//! - Components are split into markup, script blocks and style blocks
//! - Standalone scripts, stylesheets and build-config documents parse directly
//! - Every failure becomes an ingestion error carrying the byte offset of the problem

pub mod classes;
pub mod config_tree;
pub mod markup;
pub mod script;
pub mod stylesheet;

use crate::domain::{LintError, LintResult};
use classes::ClassToken;
use config_tree::{ConfigFormat, ConfigLocation, ConfigTree};
use markup::{Element, MarkupOptions, RawBlock};
use script::{ScriptBlock, ScriptContext, ScriptLang};
use std::path::{Path, PathBuf};
use stylesheet::{AtRule, Stylesheet};

/// Which parser family handles a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitCategory {
    /// Components (`.svelte`, `.html`) and standalone scripts
    ScriptMarkup,
    Styling,
    BuildConfig,
    /// No parser applies; the file is skipped
    Unclassified,
}

impl UnitCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ScriptMarkup => "script/markup",
            Self::Styling => "styling",
            Self::BuildConfig => "build-config",
            Self::Unclassified => "unclassified",
        }
    }
}

/// A component file: markup elements plus embedded script and style blocks
#[derive(Debug)]
pub struct Component {
    pub scripts: Vec<ScriptBlock>,
    /// Markup expressions that parse as JavaScript
    pub expressions: Vec<ScriptBlock>,
    pub elements: Vec<Element>,
    pub styles: Vec<Stylesheet>,
    /// Class tokens used in markup
    pub classes: Vec<ClassToken>,
}

/// Parsed structure of a unit
#[derive(Debug)]
pub enum Structure {
    Component(Component),
    Script(ScriptBlock),
    Stylesheet(Stylesheet),
    Config(ConfigTree),
}

/// Byte offset to 1-based line/column conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(content: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    /// 1-based line and character column of a byte offset
    pub fn location(&self, content: &str, offset: usize) -> (u32, u32) {
        let offset = offset.min(content.len());
        let line = match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.starts[line];
        let column = content
            .get(start..offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(offset - start);

        (line as u32 + 1, column as u32 + 1)
    }

    /// Byte offset of a 1-based line/column pair (column counted in bytes)
    pub fn offset_of(&self, line: usize, column: usize) -> usize {
        let start = self
            .starts
            .get(line.saturating_sub(1))
            .or(self.starts.last())
            .copied()
            .unwrap_or(0);
        start + column.saturating_sub(1)
    }

    /// Text of a 1-based line without its terminator
    pub fn line_text<'a>(&self, content: &'a str, line: u32) -> &'a str {
        let index = (line as usize).saturating_sub(1);
        let Some(&start) = self.starts.get(index) else { return "" };
        let end = self
            .starts
            .get(index + 1)
            .map(|next| next - 1)
            .unwrap_or(content.len());
        content.get(start..end).unwrap_or("").trim_end_matches('\r')
    }
}

/// A classified, parsed source file
#[derive(Debug)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub content: String,
    pub category: UnitCategory,
    pub structure: Structure,
    pub lines: LineIndex,
}

impl SourceUnit {
    /// Script blocks, component or standalone
    pub fn scripts(&self) -> Vec<&ScriptBlock> {
        match &self.structure {
            Structure::Component(component) => component.scripts.iter().collect(),
            Structure::Script(block) => vec![block],
            _ => Vec::new(),
        }
    }

    /// Parsed markup expressions of a component
    pub fn expressions(&self) -> &[ScriptBlock] {
        match &self.structure {
            Structure::Component(component) => &component.expressions,
            _ => &[],
        }
    }

    /// Markup elements of a component
    pub fn elements(&self) -> &[Element] {
        match &self.structure {
            Structure::Component(component) => &component.elements,
            _ => &[],
        }
    }

    /// Class tokens from markup and `@apply`
    pub fn class_tokens(&self) -> Vec<&ClassToken> {
        match &self.structure {
            Structure::Component(component) => component
                .classes
                .iter()
                .chain(component.styles.iter().flat_map(|s| s.tokens.iter()))
                .collect(),
            Structure::Stylesheet(sheet) => sheet.tokens.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// At-rules from stylesheets and component style blocks
    pub fn at_rules(&self) -> Vec<&AtRule> {
        match &self.structure {
            Structure::Component(component) => {
                component.styles.iter().flat_map(|s| s.at_rules.iter()).collect()
            }
            Structure::Stylesheet(sheet) => sheet.at_rules.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Configuration tree of a build-config unit
    pub fn config(&self) -> Option<&ConfigTree> {
        match &self.structure {
            Structure::Config(tree) => Some(tree),
            _ => None,
        }
    }

    /// 1-based line and column of a byte offset
    pub fn location(&self, offset: usize) -> (u32, u32) {
        self.lines.location(&self.content, offset)
    }

    /// Text of a 1-based line
    pub fn line_text(&self, line: u32) -> &str {
        self.lines.line_text(&self.content, line)
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Whether the category of `path` can only be decided from its content
pub fn needs_sniffing(path: &Path) -> bool {
    extension(path).is_none()
}

/// Classify a file by extension, falling back to content sniffing for extension-less files
pub fn classify(path: &Path, content: Option<&str>) -> UnitCategory {
    match extension(path).as_deref() {
        Some("svelte" | "html" | "htm") => UnitCategory::ScriptMarkup,
        Some(ext) if ScriptLang::from_extension(ext).is_some() => UnitCategory::ScriptMarkup,
        Some("css" | "pcss" | "postcss") => UnitCategory::Styling,
        Some(ext) if ConfigFormat::from_extension(ext).is_some() => UnitCategory::BuildConfig,
        Some(_) => UnitCategory::Unclassified,
        None => content.map(sniff).unwrap_or(UnitCategory::Unclassified),
    }
}

fn sniff(content: &str) -> UnitCategory {
    let trimmed = content.trim_start();
    if trimmed.starts_with("#!") && trimmed.lines().next().is_some_and(|l| l.contains("node")) {
        return UnitCategory::ScriptMarkup;
    }
    if trimmed.starts_with('{')
        && serde_json::from_str::<serde_json::Value>(content).is_ok_and(|v| v.is_object())
    {
        return UnitCategory::BuildConfig;
    }
    UnitCategory::Unclassified
}

/// Read a file as UTF-8 text
pub fn read_source(path: &Path) -> LintResult<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| LintError::ingestion(path.display().to_string(), format!("cannot read file: {e}")))?;
    String::from_utf8(bytes).map_err(|e| {
        LintError::ingestion_at(
            path.display().to_string(),
            e.utf8_error().valid_up_to(),
            "file is not valid UTF-8",
        )
    })
}

/// Read an extension-less file for content sniffing
///
/// Content that is not UTF-8 cannot belong to any category and gives `None`;
/// only I/O failures are errors.
pub fn read_for_sniffing(path: &Path) -> LintResult<Option<String>> {
    let bytes = std::fs::read(path)
        .map_err(|e| LintError::ingestion(path.display().to_string(), format!("cannot read file: {e}")))?;
    Ok(String::from_utf8(bytes).ok())
}

/// Parse classified content into a source unit
pub fn parse_unit(path: &Path, content: &str, category: UnitCategory) -> LintResult<SourceUnit> {
    let file = path.display().to_string();
    let lines = LineIndex::new(content);
    let ext = extension(path);

    let structure = match category {
        UnitCategory::ScriptMarkup => match ext.as_deref() {
            Some("svelte") => Structure::Component(parse_component(&file, content, MarkupOptions::component())?),
            Some("html" | "htm") => Structure::Component(parse_component(&file, content, MarkupOptions::html())?),
            other => {
                let lang = other
                    .and_then(ScriptLang::from_extension)
                    .unwrap_or(ScriptLang::JavaScript);
                let source = strip_shebang(content);
                let block = ScriptBlock::parse(source, 0, lang, ScriptContext::Standalone)
                    .map_err(|e| LintError::ingestion_at(&file, e.offset, e.message))?;
                Structure::Script(block)
            }
        },
        UnitCategory::Styling => Structure::Stylesheet(
            stylesheet::parse(content, 0).map_err(|e| LintError::ingestion_at(&file, e.offset, e.message))?,
        ),
        UnitCategory::BuildConfig => {
            let format = ext
                .as_deref()
                .and_then(ConfigFormat::from_extension)
                .unwrap_or(ConfigFormat::Json);
            let tree = ConfigTree::parse(content, format).map_err(|e| match e.location {
                ConfigLocation::Offset(offset) => LintError::ingestion_at(&file, offset, e.message),
                ConfigLocation::LineColumn(line, column) => {
                    LintError::ingestion_at(&file, lines.offset_of(line, column), e.message)
                }
                ConfigLocation::Unknown => LintError::ingestion(&file, e.message),
            })?;
            Structure::Config(tree)
        }
        UnitCategory::Unclassified => {
            return Err(LintError::ingestion(&file, "no parser applies to unclassified files"));
        }
    };

    Ok(SourceUnit {
        path: path.to_path_buf(),
        content: content.to_string(),
        category,
        structure,
        lines,
    })
}

/// Blank out a leading `#!` line so offsets stay aligned with the file
fn strip_shebang(content: &str) -> String {
    if !content.starts_with("#!") {
        return content.to_string();
    }
    let line_end = content.find('\n').unwrap_or(content.len());
    format!("{}{}", " ".repeat(line_end), &content[line_end..])
}

fn parse_component(file: &str, content: &str, options: MarkupOptions) -> LintResult<Component> {
    let doc = markup::scan(content, options).map_err(|e| LintError::ingestion_at(file, e.offset, e.message))?;

    let mut scripts = Vec::new();
    for block in doc.scripts.iter().filter(|b| is_javascript_block(b)) {
        let lang = ScriptLang::from_lang_attribute(block.attribute("lang").map(|a| a.inner_value()));
        let context = if is_module_context(block) {
            ScriptContext::Module
        } else {
            ScriptContext::Instance
        };
        let parsed = ScriptBlock::parse(block.content.as_str(), block.content_start, lang, context)
            .map_err(|e| LintError::ingestion_at(file, e.offset, format!("script block: {}", e.message)))?;
        scripts.push(parsed);
    }

    let mut styles = Vec::new();
    for block in &doc.styles {
        styles.push(
            stylesheet::parse(&block.content, block.content_start)
                .map_err(|e| LintError::ingestion_at(file, e.offset, format!("style block: {}", e.message)))?,
        );
    }

    let markup_lang = scripts
        .iter()
        .find(|s| s.context == ScriptContext::Instance)
        .map(|s| s.lang)
        .unwrap_or(ScriptLang::JavaScript);
    let expressions = doc
        .expressions
        .iter()
        .filter_map(|expression| expression.source())
        .filter_map(|(offset, source)| match ScriptBlock::parse_expression(source, offset, markup_lang) {
            Ok(block) => Some(block),
            Err(e) => {
                // Svelte-only syntax inside a tag (e.g. `{@const}` destructuring) is left to the compiler
                tracing::debug!("{file}: skipping markup expression at byte {}: {}", e.offset, e.message);
                None
            }
        })
        .collect();

    let classes = classes::from_elements(&doc.elements);

    Ok(Component { scripts, expressions, elements: doc.elements, styles, classes })
}

fn is_javascript_block(block: &RawBlock) -> bool {
    match block.attribute("type").map(|a| a.inner_value().trim().to_ascii_lowercase()) {
        None => true,
        Some(kind) => matches!(
            kind.as_str(),
            "module" | "text/javascript" | "application/javascript" | "text/typescript" | "ts"
        ),
    }
}

fn is_module_context(block: &RawBlock) -> bool {
    block.attribute("module").is_some()
        || block
            .attribute("context")
            .is_some_and(|a| a.inner_value() == "module")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("src/App.svelte", UnitCategory::ScriptMarkup)]
    #[case("index.HTML", UnitCategory::ScriptMarkup)]
    #[case("lib/store.ts", UnitCategory::ScriptMarkup)]
    #[case("app.pcss", UnitCategory::Styling)]
    #[case("package.json", UnitCategory::BuildConfig)]
    #[case("netlify.toml", UnitCategory::BuildConfig)]
    #[case("logo.png", UnitCategory::Unclassified)]
    fn test_classify_by_extension(#[case] path: &str, #[case] expected: UnitCategory) {
        assert_eq!(classify(Path::new(path), None), expected);
    }

    #[test]
    fn test_classify_by_sniffing() {
        let path = Path::new("bin/cli");
        assert_eq!(classify(path, Some("#!/usr/bin/env node\nconsole.log(1)")), UnitCategory::ScriptMarkup);
        assert_eq!(classify(Path::new(".prettierrc"), Some("{ \"semi\": false }")), UnitCategory::BuildConfig);
        assert_eq!(classify(path, Some("just text")), UnitCategory::Unclassified);
        assert!(needs_sniffing(path));
    }

    #[test]
    fn test_line_index_counts_characters() {
        let content = "ab\nçé x\n";
        let index = LineIndex::new(content);
        let offset = content.find('x').unwrap();
        assert_eq!(index.location(content, offset), (2, 4));
        assert_eq!(index.location(content, 0), (1, 1));
        assert_eq!(index.line_text(content, 2), "çé x");
        assert_eq!(index.offset_of(2, 1), 3);
    }

    #[test]
    fn test_parse_component_unit() {
        let content = "<script context=\"module\">export const x = 1;</script>\n<script lang=\"ts\">let a: number = 1;</script>\n<script type=\"application/ld+json\">{ not js</script>\n<div class=\"p-4\"></div>\n<style>.a { @apply shadow; }</style>\n";
        let unit = parse_unit(Path::new("C.svelte"), content, UnitCategory::ScriptMarkup).unwrap();

        let scripts = unit.scripts();
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[0].context, ScriptContext::Module);
        assert_eq!(scripts[1].lang, ScriptLang::TypeScript);

        let tokens: Vec<_> = unit.class_tokens().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(tokens, vec!["p-4", "shadow"]);
        assert_eq!(unit.at_rules().len(), 1);
    }

    #[test]
    fn test_script_errors_are_located_in_file() {
        let content = "<p>hi</p>\n<script>\nlet = ;\n</script>\n";
        let err = parse_unit(Path::new("Bad.svelte"), content, UnitCategory::ScriptMarkup).unwrap_err();
        match err {
            LintError::Ingestion { offset: Some(offset), message, .. } => {
                assert!(offset >= content.find("let").unwrap());
                assert!(message.starts_with("script block"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_config_error_offset_from_line_column() {
        let content = "{\n  \"a\": ,\n}";
        let err = parse_unit(Path::new("package.json"), content, UnitCategory::BuildConfig).unwrap_err();
        assert!(matches!(err, LintError::Ingestion { offset: Some(offset), .. } if offset >= 2));
    }

    #[test]
    fn test_shebang_script_parses() {
        let content = "#!/usr/bin/env node\nconst a = 1;\n";
        let unit = parse_unit(Path::new("bin/cli"), content, UnitCategory::ScriptMarkup).unwrap();
        assert_eq!(unit.scripts()[0].context, ScriptContext::Standalone);
    }
}
