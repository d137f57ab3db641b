//! Utility-class token extraction
//!
//! Tokens come from `class` attribute values, string and template literals inside
//! `class={...}` expressions, `class:token` directives and `@apply` parameters.
//! A token glued to an interpolation (`bg-{color}-500`, `` text-${size} ``) is marked dynamic.

use super::markup::{self, Element, ValueKind};

/// A single utility-class token with its absolute span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassToken {
    pub text: String,
    pub start: usize,
    pub end: usize,
    /// Token text is composed at runtime through an interpolation
    pub dynamic: bool,
}

/// A utility token split into its variant/modifier prefix, base utility and suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtilityParts<'a> {
    /// Variants plus leading `!`/`-` markers, e.g. `md:hover:!`
    pub prefix: &'a str,
    /// The utility itself, e.g. `rounded-sm`
    pub base: &'a str,
    /// Trailing important marker (`!`) if present
    pub suffix: &'a str,
}

/// Split `md:hover:!-mt-2` style tokens into prefix and base utility
pub fn split_utility(token: &str) -> UtilityParts<'_> {
    let mut depth = 0usize;
    let mut base_start = 0;
    for (i, c) in token.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => base_start = i + 1,
            _ => {}
        }
    }

    let rest = &token[base_start..];
    let markers = rest.len() - rest.trim_start_matches(['!', '-']).len();
    let base_start = base_start + markers;

    let (base, suffix) = match token[base_start..].strip_suffix('!') {
        Some(base) if !base.is_empty() => (base, "!"),
        _ => (&token[base_start..], ""),
    };

    UtilityParts { prefix: &token[..base_start], base, suffix }
}

/// Extract every class token used by a component's elements
pub fn from_elements(elements: &[Element]) -> Vec<ClassToken> {
    let mut tokens = Vec::new();

    for element in elements {
        for attribute in &element.attributes {
            if let Some(directive) = attribute.name.strip_prefix("class:") {
                if !directive.is_empty() {
                    let start = attribute.start + "class:".len();
                    tokens.push(ClassToken {
                        text: directive.to_string(),
                        start,
                        end: start + directive.len(),
                        dynamic: false,
                    });
                }
                continue;
            }

            if attribute.name != "class" {
                continue;
            }
            let Some(value) = &attribute.value else { continue };
            match value.kind {
                ValueKind::Quoted | ValueKind::Unquoted => {
                    tokens.extend(tokenize_interpolated(&value.inner, value.inner_start, Interpolation::Braces))
                }
                ValueKind::Expression => {
                    tokens.extend(tokenize_expression(&value.inner, value.inner_start))
                }
            }
        }
    }

    tokens
}

/// Whitespace-separated tokens with no interpolation syntax
pub fn tokenize_plain(text: &str, base: usize) -> Vec<ClassToken> {
    let mut tokens = Vec::new();
    let mut start = None;

    for (i, c) in text.char_indices().chain(std::iter::once((text.len(), ' '))) {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                tokens.push(ClassToken {
                    text: text[s..i].to_string(),
                    start: base + s,
                    end: base + i,
                    dynamic: false,
                });
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }

    tokens
}

/// String and template literals inside a `class={...}` expression, including literals nested in `${...}`
pub fn tokenize_expression(expr: &str, base: usize) -> Vec<ClassToken> {
    let bytes = expr.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                let (body_end, next) = literal_bounds(bytes, markup::string_end(bytes, i));
                tokens.extend(tokenize_plain(&expr[i + 1..body_end], base + i + 1));
                i = next;
            }
            b'`' => {
                let (body_end, next) = literal_bounds(bytes, markup::template_end(bytes, i));
                tokens.extend(tokenize_interpolated(
                    &expr[i + 1..body_end],
                    base + i + 1,
                    Interpolation::TemplateLiteral,
                ));
                i = next;
            }
            _ => i += 1,
        }
    }

    tokens
}

/// End of a literal's body and the index to resume at; unterminated literals run to the end
fn literal_bounds(bytes: &[u8], end: Option<usize>) -> (usize, usize) {
    match end {
        Some(end) => (end - 1, end),
        None => (bytes.len(), bytes.len()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interpolation {
    /// `{expr}` inside a quoted component attribute
    Braces,
    /// `${expr}` inside a template literal
    TemplateLiteral,
}

/// Tokens separated by whitespace outside interpolations
fn tokenize_interpolated(
    text: &str,
    base: usize,
    interpolation: Interpolation,
) -> Vec<ClassToken> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut nested = Vec::new();
    let mut start: Option<usize> = None;
    let mut interpolations = 0usize;
    let mut literal_chars = false;
    let mut i = 0;

    let mut flush = |start: &mut Option<usize>, end: usize, interpolations: usize, literal_chars: bool| {
        if let Some(s) = start.take() {
            // A token made only of interpolations is a pass-through expression
            if literal_chars {
                tokens.push(ClassToken {
                    text: text[s..end].to_string(),
                    start: base + s,
                    end: base + end,
                    dynamic: interpolations > 0,
                });
            }
        }
    };

    while i < bytes.len() {
        let opens = match interpolation {
            Interpolation::Braces => bytes[i] == b'{',
            Interpolation::TemplateLiteral => bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{'),
        };

        if opens {
            start.get_or_insert(i);
            let brace = if interpolation == Interpolation::Braces { i } else { i + 1 };
            let (body_end, next) = literal_bounds(bytes, markup::braces_end(bytes, brace));
            // Literals inside the interpolation are class tokens of their own
            nested.extend(tokenize_expression(&text[brace + 1..body_end], base + brace + 1));
            i = next;
            interpolations += 1;
        } else if bytes[i].is_ascii_whitespace() {
            flush(&mut start, i, interpolations, literal_chars);
            interpolations = 0;
            literal_chars = false;
            i += 1;
        } else {
            start.get_or_insert(i);
            literal_chars = true;
            i += 1;
        }
    }
    flush(&mut start, bytes.len(), interpolations, literal_chars);

    tokens.extend(nested);
    tokens.sort_by_key(|t| t.start);
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::markup::{scan, MarkupOptions};

    fn texts(tokens: &[ClassToken]) -> Vec<(&str, bool)> {
        tokens.iter().map(|t| (t.text.as_str(), t.dynamic)).collect()
    }

    #[test]
    fn test_split_utility_variants() {
        let parts = split_utility("md:hover:rounded-sm");
        assert_eq!((parts.prefix, parts.base, parts.suffix), ("md:hover:", "rounded-sm", ""));

        let parts = split_utility("!shadow-sm");
        assert_eq!((parts.prefix, parts.base), ("!", "shadow-sm"));

        let parts = split_utility("lg:-mt-2!");
        assert_eq!((parts.prefix, parts.base, parts.suffix), ("lg:-", "mt-2", "!"));

        let parts = split_utility("[&:hover]:blur-sm");
        assert_eq!((parts.prefix, parts.base), ("[&:hover]:", "blur-sm"));
    }

    #[test]
    fn test_quoted_class_with_interpolation() {
        let source = r#"<div class="p-4 bg-{color}-500 {extra} rounded-sm">x</div>"#;
        let doc = scan(source, MarkupOptions::component()).unwrap();
        let tokens = from_elements(&doc.elements);

        assert_eq!(
            texts(&tokens),
            vec![("p-4", false), ("bg-{color}-500", true), ("rounded-sm", false)]
        );
        let rounded = &tokens[2];
        assert_eq!(&source[rounded.start..rounded.end], "rounded-sm");
    }

    #[test]
    fn test_expression_class_literals() {
        let source = "<div class={active ? 'shadow-sm ring' : `text-${size} p-2`}>x</div>";
        let doc = scan(source, MarkupOptions::component()).unwrap();
        let tokens = from_elements(&doc.elements);

        assert_eq!(
            texts(&tokens),
            vec![("shadow-sm", false), ("ring", false), ("text-${size}", true), ("p-2", false)]
        );
        for token in &tokens {
            assert_eq!(&source[token.start..token.end], token.text);
        }
    }

    #[test]
    fn test_class_directive_tokens() {
        let source = "<li class:flex-grow={wide} class:active>x</li>";
        let doc = scan(source, MarkupOptions::component()).unwrap();
        let tokens = from_elements(&doc.elements);

        assert_eq!(texts(&tokens), vec![("flex-grow", false), ("active", false)]);
        assert_eq!(&source[tokens[0].start..tokens[0].end], "flex-grow");
    }

    #[test]
    fn test_literals_nested_in_template_interpolation() {
        let source = "<div class={`p-2 ${big ? `rounded` : 'shadow-sm'}`}>x</div>";
        let doc = scan(source, MarkupOptions::component()).unwrap();
        let tokens = from_elements(&doc.elements);

        assert_eq!(texts(&tokens), vec![("p-2", false), ("rounded", false), ("shadow-sm", false)]);
        for token in &tokens {
            assert_eq!(&source[token.start..token.end], token.text);
        }
    }

    #[test]
    fn test_literals_inside_quoted_attribute_interpolation() {
        let source = r#"<div class="p-4 {active ? 'shadow-sm' : ''}">x</div>"#;
        let doc = scan(source, MarkupOptions::component()).unwrap();
        assert_eq!(texts(&from_elements(&doc.elements)), vec![("p-4", false), ("shadow-sm", false)]);
    }

    #[test]
    fn test_apostrophe_in_nested_template_and_multibyte_tail() {
        let source = "<div class={`${a ? `don't` : ''} ` + classé}>x</div>";
        let doc = scan(source, MarkupOptions::component()).unwrap();
        let tokens = from_elements(&doc.elements);
        assert_eq!(texts(&tokens), vec![("don't", false)]);
    }

    #[test]
    fn test_unterminated_literals_stay_on_char_boundaries() {
        assert_eq!(texts(&tokenize_expression("'shadow é", 0)), vec![("shadow", false), ("é", false)]);
        assert_eq!(texts(&tokenize_expression("`ring ${x ? 'p-é", 0)), vec![("ring", false), ("p-é", false)]);
        assert!(tokenize_expression("a + é'", 0).is_empty());
    }

    #[test]
    fn test_tokenize_plain_offsets() {
        let tokens = tokenize_plain("  font-bold\tshadow ", 10);
        assert_eq!(texts(&tokens), vec![("font-bold", false), ("shadow", false)]);
        assert_eq!((tokens[0].start, tokens[0].end), (12, 21));
    }
}
