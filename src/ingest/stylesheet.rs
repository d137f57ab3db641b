//! Stylesheet scanning: at-rules, `@apply` tokens and block balance

use super::classes::{tokenize_plain, ClassToken};

/// An at-rule such as `@tailwind base;` or `@apply rounded-sm p-4;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtRule {
    /// Name without the `@`
    pub name: String,
    /// Parameters up to the terminating `;` or `{`, trimmed
    pub params: String,
    /// Absolute span of the at-rule prelude
    pub start: usize,
    pub end: usize,
}

/// Parsed stylesheet (a `.css` file or a component `<style>` block)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheet {
    pub offset: usize,
    pub at_rules: Vec<AtRule>,
    /// Utility tokens referenced through `@apply`
    pub tokens: Vec<ClassToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylesheetError {
    pub offset: usize,
    pub message: String,
}

/// Scan a stylesheet that starts at absolute offset `base`
pub fn parse(source: &str, base: usize) -> Result<Stylesheet, StylesheetError> {
    let bytes = source.as_bytes();
    let error = |offset: usize, message: &str| StylesheetError { offset: base + offset, message: message.to_string() };

    let mut sheet = Stylesheet { offset: base, ..Default::default() };
    let mut open_blocks: Vec<usize> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = comment_end(bytes, i).ok_or_else(|| error(i, "unterminated comment"))?;
            }
            b'"' | b'\'' => {
                i = string_end(bytes, i).ok_or_else(|| error(i, "unterminated string"))?;
            }
            b'{' => {
                open_blocks.push(i);
                i += 1;
            }
            b'}' => {
                if open_blocks.pop().is_none() {
                    return Err(error(i, "unexpected '}' without a matching '{'"));
                }
                i += 1;
            }
            b'@' => {
                let name_end = i + 1 + bytes[i + 1..]
                    .iter()
                    .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_'))
                    .count();
                if name_end == i + 1 {
                    i += 1;
                    continue;
                }

                let end = prelude_end(bytes, name_end).map_err(|offset| error(offset, "unterminated string"))?;
                let raw_params = &source[name_end..end];
                let params = raw_params.trim();
                let name = &source[i + 1..name_end];

                if name == "apply" {
                    let params_start = name_end + (raw_params.len() - raw_params.trim_start().len());
                    sheet.tokens.extend(
                        tokenize_plain(params, base + params_start)
                            .into_iter()
                            .filter(|t| t.text != "!important"),
                    );
                }

                sheet.at_rules.push(AtRule {
                    name: name.to_string(),
                    params: params.to_string(),
                    start: base + i,
                    end: base + end,
                });

                i = if bytes.get(end) == Some(&b';') { end + 1 } else { end };
            }
            _ => i += 1,
        }
    }

    if let Some(&open) = open_blocks.last() {
        return Err(error(open, "unclosed '{' block"));
    }

    Ok(sheet)
}

/// Index of the `;`, `{` or `}` ending an at-rule prelude, or an error offset
fn prelude_end(bytes: &[u8], from: usize) -> Result<usize, usize> {
    let mut parens = 0usize;
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = string_end(bytes, i).ok_or(i)?;
                continue;
            }
            b'(' => parens += 1,
            b')' => parens = parens.saturating_sub(1),
            b';' | b'{' | b'}' if parens == 0 => return Ok(i),
            _ => {}
        }
        i += 1;
    }
    Ok(bytes.len())
}

fn comment_end(bytes: &[u8], open: usize) -> Option<usize> {
    bytes[open + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map(|p| open + 2 + p + 2)
}

fn string_end(bytes: &[u8], open: usize) -> Option<usize> {
    let quote = bytes[open];
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return None,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}
