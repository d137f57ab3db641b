//! Component markup scanner
//!
//! Architecture: Single forward pass over the component source
//! - Elements and attributes keep absolute byte spans for diagnostics
//! - `<script>` and `<style>` bodies are captured raw for their own parsers
//! - Brace expressions are recorded as balanced units, honoring string and template literals

/// Options controlling how markup is scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkupOptions {
    /// Treat `{...}` as template expressions (component files) rather than text (plain HTML)
    pub template_expressions: bool,
}

impl MarkupOptions {
    pub fn component() -> Self {
        Self { template_expressions: true }
    }

    pub fn html() -> Self {
        Self { template_expressions: false }
    }
}

/// How an attribute value was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `name="..."` or `name='...'`, may contain `{...}` interpolations
    Quoted,
    /// `name={...}`
    Expression,
    /// `name=value`
    Unquoted,
}

/// Value of an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValue {
    pub kind: ValueKind,
    /// Value as written, including quotes or braces
    pub raw: String,
    /// Value without quotes or braces
    pub inner: String,
    /// Absolute byte offset of `inner`
    pub inner_start: usize,
}

/// Attribute or directive on an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name, e.g. `class`, `on:click|preventDefault`, or `{...rest}` for spreads
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub value: Option<AttributeValue>,
}

impl Attribute {
    /// Value without quotes or braces, empty for bare attributes
    pub fn inner_value(&self) -> &str {
        self.value.as_ref().map(|v| v.inner.as_str()).unwrap_or("")
    }
}

/// Opening tag of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    /// Span of the opening tag
    pub start: usize,
    pub end: usize,
    pub attributes: Vec<Attribute>,
    pub self_closing: bool,
}

impl Element {
    /// First attribute with the given name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Raw `<script>` or `<style>` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub attributes: Vec<Attribute>,
    /// Absolute byte offset of `content`
    pub content_start: usize,
    pub content: String,
}

impl RawBlock {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Body of a `{...}` template tag, attribute expression or interpolation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateExpression {
    /// Absolute byte offset of `body`
    pub start: usize,
    /// Text between the braces
    pub body: String,
}

impl TemplateExpression {
    /// JavaScript part of the tag with its absolute offset
    pub fn source(&self) -> Option<(usize, &str)> {
        expression_source(&self.body).map(|(offset, source)| (self.start + offset, source))
    }
}

/// Everything the scanner extracted from a component file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupDocument {
    pub elements: Vec<Element>,
    pub scripts: Vec<RawBlock>,
    pub styles: Vec<RawBlock>,
    /// Template expressions in source order (component markup only)
    pub expressions: Vec<TemplateExpression>,
}

/// Structural error in markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupError {
    pub offset: usize,
    pub message: String,
}

/// Scan component or HTML markup
pub fn scan(source: &str, options: MarkupOptions) -> Result<MarkupDocument, MarkupError> {
    Scanner { src: source, bytes: source.as_bytes(), pos: 0, options, expressions: Vec::new() }.run()
}

/// Strip the Svelte tag syntax from a template tag body
///
/// `{#if a}` gives `a`, `{#each items as item}` gives `items`, `{...rest}` gives `rest`.
/// Closing tags and tags that only bind names (`{:then v}`, `{#snippet s()}`) give `None`.
pub fn expression_source(body: &str) -> Option<(usize, &str)> {
    let lead = body.len() - body.trim_start().len();
    let rest = &body[lead..];

    let (skip, expr) = match rest.as_bytes().first()? {
        b'/' => return None,
        b'#' | b':' | b'@' => {
            let keyword_end = rest.find(char::is_whitespace)?;
            let after = &rest[keyword_end..];
            let mut skip = keyword_end + (after.len() - after.trim_start().len());
            let mut expr = after.trim_start();

            match &rest[1..keyword_end] {
                "then" | "catch" | "snippet" => return None,
                "else" => {
                    let condition = expr.strip_prefix("if").filter(|e| e.starts_with(char::is_whitespace))?;
                    skip += 2 + (condition.len() - condition.trim_start().len());
                    expr = condition.trim_start();
                }
                "each" => expr = &expr[..expr.find(" as ").unwrap_or(expr.len())],
                "await" => {
                    let end = expr.find(" then ").or_else(|| expr.find(" catch ")).unwrap_or(expr.len());
                    expr = &expr[..end];
                }
                _ => {}
            }
            (skip, expr)
        }
        _ => match rest.strip_prefix("...") {
            Some(spread) => (3, spread),
            None => (0, rest),
        },
    };

    let expr = expr.trim_end();
    (!expr.is_empty()).then_some((lead + skip, expr))
}

/// Index just past the `}` matching the `{` at `open`
pub(crate) fn braces_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                i += 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            b'"' | b'\'' => i = string_end(bytes, i)?,
            b'`' => i = template_end(bytes, i)?,
            _ => i += 1,
        }
    }
    None
}

/// Index just past the closing quote of a string literal opened at `open`
pub(crate) fn string_end(bytes: &[u8], open: usize) -> Option<usize> {
    let quote = *bytes.get(open)?;
    let mut i = open + 1;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'\\' => i += 2,
            _ if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Index just past the closing backtick of a template literal opened at `open`
pub(crate) fn template_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut i = open + 1;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'\\' => i += 2,
            b'`' => return Some(i + 1),
            b'$' if bytes.get(i + 1) == Some(&b'{') => i = braces_end(bytes, i + 1)?,
            _ => i += 1,
        }
    }
    None
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    options: MarkupOptions,
    expressions: Vec<TemplateExpression>,
}

impl<'a> Scanner<'a> {
    fn run(mut self) -> Result<MarkupDocument, MarkupError> {
        let mut doc = MarkupDocument::default();

        while let Some(byte) = self.peek() {
            match byte {
                b'<' if self.starts_with("<!--") => {
                    let end = find(self.bytes, self.pos + 4, b"-->")
                        .ok_or_else(|| self.error(self.pos, "unterminated comment"))?;
                    self.pos = end + 3;
                }
                b'<' => match self.peek_at(1) {
                    Some(b'/') | Some(b'!') | Some(b'?') => {
                        let end = find(self.bytes, self.pos, b">")
                            .ok_or_else(|| self.error(self.pos, "unterminated tag"))?;
                        self.pos = end + 1;
                    }
                    Some(c) if c.is_ascii_alphabetic() => self.open_tag(&mut doc)?,
                    _ => self.pos += 1,
                },
                b'{' if self.options.template_expressions => {
                    let end = self.braces_end(self.pos)?;
                    self.record(self.pos, end);
                    self.pos = end;
                }
                _ => self.pos += 1,
            }
        }

        doc.expressions = self.expressions;
        Ok(doc)
    }

    /// Record the body of the brace expression spanning `open..end`
    fn record(&mut self, open: usize, end: usize) {
        self.expressions.push(TemplateExpression {
            start: open + 1,
            body: self.src[open + 1..end - 1].to_string(),
        });
    }

    /// Record every `{...}` interpolation inside a quoted attribute value
    fn record_interpolations(&mut self, from: usize, to: usize) -> Result<(), MarkupError> {
        let mut i = from;
        while i < to {
            if self.bytes[i] == b'{' {
                let end = self.braces_end(i)?;
                self.record(i, end);
                i = end;
            } else {
                i += 1;
            }
        }
        Ok(())
    }

    fn open_tag(&mut self, doc: &mut MarkupDocument) -> Result<(), MarkupError> {
        let start = self.pos;
        self.pos += 1;
        let name = self.read_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b':' | b'_' | b'.'));

        let mut attributes = Vec::new();
        let self_closing = loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error(start, format!("unterminated <{name}> tag"))),
                Some(b'>') => {
                    self.pos += 1;
                    break false;
                }
                Some(b'/') if self.peek_at(1) == Some(b'>') => {
                    self.pos += 2;
                    break true;
                }
                Some(b'/') => self.pos += 1,
                Some(b'{') if self.options.template_expressions => {
                    let attr_start = self.pos;
                    let end = self.braces_end(attr_start)?;
                    self.record(attr_start, end);
                    attributes.push(Attribute {
                        name: self.src[attr_start..end].to_string(),
                        start: attr_start,
                        end,
                        value: None,
                    });
                    self.pos = end;
                }
                Some(_) => attributes.push(self.attribute(start, &name)?),
            }
        };
        let end = self.pos;

        let lowered = name.to_ascii_lowercase();
        if (lowered == "script" || lowered == "style") && !self_closing {
            let closing = format!("</{lowered}");
            let close = find_ignore_case(self.bytes, self.pos, closing.as_bytes())
                .ok_or_else(|| self.error(start, format!("unterminated <{lowered}> block")))?;
            let block = RawBlock {
                attributes,
                content_start: self.pos,
                content: self.src[self.pos..close].to_string(),
            };
            let tag_end = find(self.bytes, close, b">")
                .ok_or_else(|| self.error(close, format!("unterminated </{lowered}> tag")))?;
            self.pos = tag_end + 1;

            if lowered == "script" {
                doc.scripts.push(block);
            } else {
                doc.styles.push(block);
            }
        } else if lowered != "script" && lowered != "style" {
            doc.elements.push(Element { name, start, end, attributes, self_closing });
        }

        Ok(())
    }

    fn attribute(&mut self, tag_start: usize, tag: &str) -> Result<Attribute, MarkupError> {
        let start = self.pos;
        let name = self.read_while(|b| !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/'));
        if name.is_empty() {
            return Err(self.error(start, format!("malformed attribute in <{tag}> tag")));
        }
        let name_end = self.pos;

        self.skip_whitespace();
        if self.peek() != Some(b'=') {
            self.pos = name_end;
            return Ok(Attribute { name, start, end: name_end, value: None });
        }
        self.pos += 1;
        self.skip_whitespace();

        let value_start = self.pos;
        let (kind, inner_start, inner_end, end) = match self.peek() {
            None => return Err(self.error(tag_start, format!("unterminated <{tag}> tag"))),
            Some(quote @ (b'"' | b'\'')) => {
                let close = self.quoted_end(value_start, quote)?;
                if self.options.template_expressions {
                    self.record_interpolations(value_start + 1, close)?;
                }
                (ValueKind::Quoted, value_start + 1, close, close + 1)
            }
            Some(b'{') if self.options.template_expressions => {
                let end = self.braces_end(value_start)?;
                self.record(value_start, end);
                (ValueKind::Expression, value_start + 1, end - 1, end)
            }
            Some(_) => {
                let mut end = value_start;
                while let Some(&b) = self.bytes.get(end) {
                    if b.is_ascii_whitespace() || b == b'>' || (b == b'/' && self.bytes.get(end + 1) == Some(&b'>')) {
                        break;
                    }
                    end += 1;
                }
                (ValueKind::Unquoted, value_start, end, end)
            }
        };
        self.pos = end;

        Ok(Attribute {
            name,
            start,
            end,
            value: Some(AttributeValue {
                kind,
                raw: self.src[value_start..end].to_string(),
                inner: self.src[inner_start..inner_end].to_string(),
                inner_start,
            }),
        })
    }

    /// Index of the closing quote of a quoted attribute value opened at `open`
    fn quoted_end(&self, open: usize, quote: u8) -> Result<usize, MarkupError> {
        let mut i = open + 1;
        while let Some(&b) = self.bytes.get(i) {
            if b == quote {
                return Ok(i);
            }
            if b == b'{' && self.options.template_expressions {
                i = self.braces_end(i)?;
            } else {
                i += 1;
            }
        }
        Err(self.error(open, "unterminated attribute value"))
    }

    fn braces_end(&self, open: usize) -> Result<usize, MarkupError> {
        braces_end(self.bytes, open).ok_or_else(|| self.error(open, "unterminated expression"))
    }

    fn read_while(&mut self, accept: impl Fn(u8) -> bool) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !accept(b) {
                break;
            }
            self.pos += 1;
        }
        self.src[start..self.pos].to_string()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn starts_with(&self, text: &str) -> bool {
        self.bytes[self.pos..].starts_with(text.as_bytes())
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> MarkupError {
        MarkupError { offset, message: message.into() }
    }
}

fn find(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn find_ignore_case(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|p| p + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scans_component_structure() {
        let source = r#"<script lang="ts">
  export let name: string;
</script>

<div class="card {active ? 'on' : 'off'}" on:click|once={() => (open = !open)}>
  <slot name="header" />
  {#if open}<p>{name}</p>{/if}
</div>

<style>.card { color: red; }</style>
"#;
        let doc = scan(source, MarkupOptions::component()).unwrap();

        assert_eq!(doc.scripts.len(), 1);
        assert_eq!(doc.scripts[0].attribute("lang").unwrap().inner_value(), "ts");
        assert!(doc.scripts[0].content.contains("export let name"));
        assert_eq!(doc.styles.len(), 1);

        let names: Vec<_> = doc.elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["div", "slot", "p"]);

        let div = &doc.elements[0];
        let class = div.attribute("class").unwrap();
        assert_eq!(class.inner_value(), "card {active ? 'on' : 'off'}");
        let click = div.attribute("on:click|once").unwrap();
        assert_eq!(click.value.as_ref().unwrap().kind, ValueKind::Expression);
        assert_eq!(&source[click.start..click.end], "on:click|once={() => (open = !open)}");

        let slot = &doc.elements[1];
        assert!(slot.self_closing);
        assert_eq!(slot.attribute("name").unwrap().inner_value(), "header");
    }

    #[test]
    fn test_spans_are_absolute() {
        let source = "<p>x</p>\n<button disabled>Go</button>";
        let doc = scan(source, MarkupOptions::component()).unwrap();
        let button = &doc.elements[1];
        assert_eq!(&source[button.start..button.end], "<button disabled>");
        let disabled = button.attribute("disabled").unwrap();
        assert_eq!(&source[disabled.start..disabled.end], "disabled");
        assert!(disabled.value.is_none());
    }

    #[test]
    fn test_nested_quotes_inside_interpolation() {
        let source = r#"<a class="x {y ? "b" : 'c'}" href=/home>t</a>"#;
        let doc = scan(source, MarkupOptions::component()).unwrap();
        let a = &doc.elements[0];
        assert_eq!(a.attribute("class").unwrap().inner_value(), r#"x {y ? "b" : 'c'}"#);
        let href = a.attribute("href").unwrap();
        assert_eq!(href.value.as_ref().unwrap().kind, ValueKind::Unquoted);
        assert_eq!(href.inner_value(), "/home");
    }

    #[test]
    fn test_plain_html_braces_are_text() {
        let source = "<p>{ not an expression</p>";
        assert!(scan(source, MarkupOptions::html()).is_ok());
        assert!(scan(source, MarkupOptions::component()).is_err());
    }

    #[test]
    fn test_unterminated_constructs_report_offsets() {
        let err = scan("<p>ok</p>\n<!-- open", MarkupOptions::component()).unwrap_err();
        assert_eq!(err.offset, 10);
        assert!(err.message.contains("comment"));

        let err = scan("<script>let a = 1;", MarkupOptions::component()).unwrap_err();
        assert!(err.message.contains("<script>"));

        let err = scan("<div class=\"open>", MarkupOptions::component()).unwrap_err();
        assert!(err.message.contains("attribute value"));
    }

    #[test]
    fn test_records_template_expressions() {
        let source = "<a {...rest} href={url} title=\"x {label}\">{#if open}{name}{/if}</a>";
        let doc = scan(source, MarkupOptions::component()).unwrap();

        let bodies: Vec<_> = doc.expressions.iter().map(|e| e.body.as_str()).collect();
        assert_eq!(bodies, vec!["...rest", "url", "label", "#if open", "name", "/if"]);
        for expression in &doc.expressions {
            assert_eq!(&source[expression.start..expression.start + expression.body.len()], expression.body);
        }
        assert!(scan(source, MarkupOptions::html()).unwrap().expressions.is_empty());
    }

    #[test]
    fn test_expression_source_strips_tag_syntax() {
        assert_eq!(expression_source("#if a > 1"), Some((4, "a > 1")));
        assert_eq!(expression_source(":else if  b"), Some((10, "b")));
        assert_eq!(expression_source("#each items as item, i (item.id)"), Some((6, "items")));
        assert_eq!(expression_source("#await load() then data"), Some((7, "load()")));
        assert_eq!(expression_source("@html raw "), Some((6, "raw")));
        assert_eq!(expression_source("...$$restProps"), Some((3, "$$restProps")));
        assert_eq!(expression_source(" count "), Some((1, "count")));
        assert_eq!(expression_source(":else"), None);
        assert_eq!(expression_source(":then value"), None);
        assert_eq!(expression_source("#snippet row(item)"), None);
        assert_eq!(expression_source("/each"), None);
    }

    #[test]
    fn test_multibyte_text_is_skipped_safely() {
        let source = "<p>héllo — 世界</p><span title=\"é\">x</span>";
        let doc = scan(source, MarkupOptions::component()).unwrap();
        assert_eq!(doc.elements[1].attribute("title").unwrap().inner_value(), "é");
    }
}
