//! Build-configuration documents as a navigable key tree
//!
//! JSON, YAML and TOML files are normalized into one `ConfigNode` tree so key-path rules
//! are written once for every format.

use std::collections::BTreeMap;

/// A normalized configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    Null,
    Scalar(String),
    Sequence(Vec<ConfigNode>),
    Table(BTreeMap<String, ConfigNode>),
}

impl ConfigNode {
    /// Scalar text, if this node is a scalar
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

/// Source format of a configuration document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Parse failure with the best location the format reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    Offset(usize),
    LineColumn(usize, usize),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigParseError {
    pub location: ConfigLocation,
    pub message: String,
}

/// A parsed configuration document
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigTree {
    pub format: ConfigFormat,
    pub root: ConfigNode,
}

impl ConfigTree {
    /// Parse a document in the given format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigParseError> {
        let root = match format {
            ConfigFormat::Json => {
                let value: serde_json::Value = serde_json::from_str(content).map_err(|e| ConfigParseError {
                    location: ConfigLocation::LineColumn(e.line(), e.column()),
                    message: e.to_string(),
                })?;
                from_json(value)
            }
            ConfigFormat::Yaml => {
                let value: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| ConfigParseError {
                    location: e
                        .location()
                        .map(|l| ConfigLocation::Offset(l.index()))
                        .unwrap_or(ConfigLocation::Unknown),
                    message: e.to_string(),
                })?;
                from_yaml(value)
            }
            ConfigFormat::Toml => {
                let value: toml::Value = toml::from_str(content).map_err(|e| ConfigParseError {
                    location: e
                        .span()
                        .map(|span| ConfigLocation::Offset(span.start))
                        .unwrap_or(ConfigLocation::Unknown),
                    message: e.message().to_string(),
                })?;
                from_toml(value)
            }
        };

        Ok(Self { format, root })
    }

    /// Every node whose key path matches `pattern`; `*` matches any single segment.
    /// Results are ordered by key path.
    pub fn find(&self, pattern: &[String]) -> Vec<(Vec<String>, &ConfigNode)> {
        let mut found = Vec::new();
        collect(&self.root, pattern, &mut Vec::new(), &mut found);
        found
    }
}

fn collect<'a>(
    node: &'a ConfigNode,
    pattern: &[String],
    trail: &mut Vec<String>,
    found: &mut Vec<(Vec<String>, &'a ConfigNode)>,
) {
    let Some((head, rest)) = pattern.split_first() else {
        found.push((trail.clone(), node));
        return;
    };

    let mut descend = |key: String, child: &'a ConfigNode, found: &mut Vec<(Vec<String>, &'a ConfigNode)>| {
        if head == "*" || *head == key {
            trail.push(key);
            collect(child, rest, trail, found);
            trail.pop();
        }
    };

    match node {
        ConfigNode::Table(entries) => {
            for (key, child) in entries {
                descend(key.clone(), child, found);
            }
        }
        ConfigNode::Sequence(items) => {
            for (index, child) in items.iter().enumerate() {
                descend(index.to_string(), child, found);
            }
        }
        ConfigNode::Null | ConfigNode::Scalar(_) => {}
    }
}

fn from_json(value: serde_json::Value) -> ConfigNode {
    use serde_json::Value;
    match value {
        Value::Null => ConfigNode::Null,
        Value::Bool(b) => ConfigNode::Scalar(b.to_string()),
        Value::Number(n) => ConfigNode::Scalar(n.to_string()),
        Value::String(s) => ConfigNode::Scalar(s),
        Value::Array(items) => ConfigNode::Sequence(items.into_iter().map(from_json).collect()),
        Value::Object(entries) => {
            ConfigNode::Table(entries.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}

fn from_yaml(value: serde_yaml::Value) -> ConfigNode {
    use serde_yaml::Value;
    match value {
        Value::Null => ConfigNode::Null,
        Value::Bool(b) => ConfigNode::Scalar(b.to_string()),
        Value::Number(n) => ConfigNode::Scalar(n.to_string()),
        Value::String(s) => ConfigNode::Scalar(s),
        Value::Sequence(items) => ConfigNode::Sequence(items.into_iter().map(from_yaml).collect()),
        Value::Mapping(entries) => ConfigNode::Table(
            entries
                .into_iter()
                .map(|(k, v)| (yaml_key(k), from_yaml(v)))
                .collect(),
        ),
        Value::Tagged(tagged) => from_yaml(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

fn from_toml(value: toml::Value) -> ConfigNode {
    use toml::Value;
    match value {
        Value::String(s) => ConfigNode::Scalar(s),
        Value::Integer(i) => ConfigNode::Scalar(i.to_string()),
        Value::Float(f) => ConfigNode::Scalar(f.to_string()),
        Value::Boolean(b) => ConfigNode::Scalar(b.to_string()),
        Value::Datetime(d) => ConfigNode::Scalar(d.to_string()),
        Value::Array(items) => ConfigNode::Sequence(items.into_iter().map(from_toml).collect()),
        Value::Table(entries) => {
            ConfigNode::Table(entries.into_iter().map(|(k, v)| (k, from_toml(v))).collect())
        }
    }
}

/// Byte offset of the last key of `path` in the raw document text.
///
/// Keys are searched in order, each after the previous one, so nested keys resolve to
/// their occurrence under the right parent in ordinary documents. Sequence indices are
/// skipped. Falls back to the deepest key that was found.
pub fn locate_key(content: &str, path: &[String]) -> Option<usize> {
    let mut cursor = 0;
    let mut found = None;

    for segment in path {
        if segment.parse::<usize>().is_ok() {
            continue;
        }
        match find_key_token(content, cursor, segment) {
            Some(position) => {
                found = Some(position);
                cursor = position + segment.len();
            }
            None => break,
        }
    }

    found
}

fn find_key_token(content: &str, from: usize, key: &str) -> Option<usize> {
    let haystack = content.get(from..)?;

    for (relative, _) in haystack.match_indices(key) {
        let position = from + relative;
        let before = content[..position].chars().next_back();
        let after_key = &content[position + key.len()..];

        if let Some(quote @ ('"' | '\'')) = before {
            if let Some(rest) = after_key.strip_prefix(quote) {
                if starts_with_separator(rest) {
                    return Some(position - 1);
                }
            }
            continue;
        }

        let bare_boundary = before.map_or(true, |c| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '@' | '/')));
        if bare_boundary && (starts_with_separator(after_key) || before == Some('[') || before == Some('.')) {
            return Some(position);
        }
    }

    None
}

fn starts_with_separator(text: &str) -> bool {
    matches!(text.trim_start_matches([' ', '\t']).chars().next(), Some(':' | '=' | ']' | '.'))
}
