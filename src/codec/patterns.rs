//! Line-level regex patterns for recognizing entities in fragment files.
//!
//! Patterns only locate candidate lines. Values are unquoted by
//! [`scan::parse_word`](super::scan::parse_word) and function bodies are
//! delimited by [`scan::BraceScanner`](super::scan::BraceScanner), since
//! the `regex` crate cannot balance quotes or braces.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `alias name=value`
    ///
    /// Captures:
    /// - Group 1: alias name (option flags like `-g` never match)
    /// - Group 2: raw value, still quoted
    pub static ref ALIAS_RE: Regex = Regex::new(
        r#"^\s*alias\s+([^\s=\-][^\s=]*)=(.*)$"#
    ).unwrap();

    /// `name() ...` or `function name() ...`
    ///
    /// Captures:
    /// - Group 1: function name
    /// - Group 2: remainder after `()`, usually `{`
    pub static ref FUNC_PAREN_RE: Regex = Regex::new(
        r#"^\s*(?:function\s+)?([^\s(){}=#]+)\s*\(\s*\)\s*(.*)$"#
    ).unwrap();

    /// `function name {` (no parentheses)
    ///
    /// Captures:
    /// - Group 1: function name
    /// - Group 2: remainder, must open the body
    pub static ref FUNC_KEYWORD_RE: Regex = Regex::new(
        r#"^\s*function\s+([^\s(){}=#]+)\s*(\{.*)?$"#
    ).unwrap();

    /// `plugins=( ... )` registry assignment, possibly spanning lines.
    ///
    /// Captures:
    /// - Group 1: leading indentation
    /// - Group 2: whitespace separated plugin identifiers
    pub static ref PLUGINS_RE: Regex = Regex::new(
        r#"(?m)^([ \t]*)plugins=\(([^)]*)\)"#
    ).unwrap();
}
