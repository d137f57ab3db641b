//! Built-in convention table (Svelte 5 runes, Tailwind CSS v4)

/// Source name reported for rules from the built-in table
pub const DEFAULT_SOURCE_NAME: &str = "<built-in>";

/// The built-in table document
pub const DEFAULT_RULES: &str = include_str!("default_rules.md");

/// `(name, text)` pair for the rule loader
pub fn source() -> (String, String) {
    (DEFAULT_SOURCE_NAME.to_string(), DEFAULT_RULES.to_string())
}
