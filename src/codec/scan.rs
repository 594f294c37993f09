//! Small shell lexing helpers: word unquoting and brace balancing.

/// Parse a single shell word, optionally followed by whitespace and a
/// `# comment`.
///
/// Handles single quotes, double quotes (with `\"`, `\\`, `\$` and `` \` ``
/// escapes) and backslash escapes in unquoted text, concatenating adjacent
/// segments the way a shell does. Returns `None` for unterminated quotes or
/// trailing tokens that are not a comment.
pub fn parse_word(raw: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => loop {
                match chars.next()? {
                    '\'' => break,
                    other => out.push(other),
                }
            },
            '"' => loop {
                match chars.next()? {
                    '"' => break,
                    '\\' => match chars.next()? {
                        escaped @ ('"' | '\\' | '$' | '`') => out.push(escaped),
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    },
                    other => out.push(other),
                }
            },
            '\\' => out.push(chars.next()?),
            c if c.is_whitespace() => {
                let rest: String = chars.collect();
                let rest = rest.trim_start();
                return (rest.is_empty() || rest.starts_with('#')).then_some(out);
            }
            other => out.push(other),
        }
    }

    Some(out)
}

/// Quote a value so that [`parse_word`] returns it unchanged.
pub fn single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Tracks brace depth across lines, ignoring braces inside quotes, comments
/// and after a backslash.
#[derive(Debug, Clone)]
pub struct BraceScanner {
    depth: usize,
    quote: Option<char>,
    escaped: bool,
}

impl BraceScanner {
    /// Scanner positioned just after an opening `{`.
    pub fn opened() -> Self {
        Self {
            depth: 1,
            quote: None,
            escaped: false,
        }
    }

    /// Feed one line (without terminator). Returns the byte offset of the
    /// brace that closes the outermost block, if it is on this line.
    pub fn feed(&mut self, line: &str) -> Option<usize> {
        let mut prev: Option<char> = None;

        for (idx, c) in line.char_indices() {
            if self.escaped {
                self.escaped = false;
                prev = Some(c);
                continue;
            }

            match (self.quote, c) {
                (Some('\''), '\'') => self.quote = None,
                (Some('\''), _) => {}
                (Some(_), '\\') => self.escaped = true,
                (Some(_), '"') => self.quote = None,
                (Some(_), _) => {}
                (None, '\\') => self.escaped = true,
                (None, '\'' | '"') => self.quote = Some(c),
                (None, '#') if prev.map_or(true, |p| p.is_whitespace() || p == ';') => break,
                (None, '{') => self.depth += 1,
                (None, '}') => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return Some(idx);
                    }
                }
                (None, _) => {}
            }
            prev = Some(c);
        }

        // A trailing backslash continues the line; anything else ends it.
        None
    }

    /// True when every brace and quote opened so far has been closed,
    /// except the initial block brace.
    pub fn is_balanced_body(&self) -> bool {
        self.depth == 1 && self.quote.is_none() && !self.escaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("'ls -lah'", "ls -lah")]
    #[case("\"git status\"", "git status")]
    #[case("nvim", "nvim")]
    #[case("''", "")]
    #[case("", "")]
    #[case(r"'it'\''s'", "it's")]
    #[case(r#""say \"hi\"""#, "say \"hi\"")]
    #[case(r#""cost \$5""#, "cost $5")]
    #[case(r#""keep \n""#, r"keep \n")]
    #[case("'ls' # list files", "ls")]
    #[case(r"a\ b", "a b")]
    fn test_parse_word(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(parse_word(raw).as_deref(), Some(expected));
    }

    #[rstest]
    #[case("'unterminated")]
    #[case("\"open")]
    #[case("'a' extra")]
    #[case("trailing\\")]
    fn test_parse_word_rejects(#[case] raw: &str) {
        assert_eq!(parse_word(raw), None);
    }

    #[rstest]
    #[case("ls -lah")]
    #[case("echo 'quoted'")]
    #[case("it's")]
    #[case("")]
    #[case("a''b")]
    fn test_single_quote_round_trip(#[case] value: &str) {
        assert_eq!(parse_word(&single_quote(value)).as_deref(), Some(value));
    }

    #[test]
    fn test_brace_scanner_closes_on_same_line() {
        let mut scanner = BraceScanner::opened();
        assert_eq!(scanner.feed(" echo hi; }"), Some(10));
    }

    #[test]
    fn test_brace_scanner_ignores_quoted_and_commented_braces() {
        let mut scanner = BraceScanner::opened();
        assert_eq!(scanner.feed("  echo \"}\" '}' \\}"), None);
        assert_eq!(scanner.feed("  # closing } in a comment"), None);
        assert_eq!(scanner.feed("  echo ${HOME}"), None);
        assert_eq!(scanner.feed("  echo $# items"), None);
        assert_eq!(scanner.feed("}"), Some(0));
    }

    #[test]
    fn test_brace_scanner_tracks_nested_blocks() {
        let mut scanner = BraceScanner::opened();
        assert_eq!(scanner.feed("  if true; then {"), None);
        assert_eq!(scanner.feed("  }"), None);
        assert!(scanner.is_balanced_body());
        assert_eq!(scanner.feed("}"), Some(0));
    }

    #[test]
    fn test_brace_scanner_multiline_quote() {
        let mut scanner = BraceScanner::opened();
        assert_eq!(scanner.feed("  echo 'first"), None);
        assert!(!scanner.is_balanced_body());
        assert_eq!(scanner.feed("  } still quoted'"), None);
        assert!(scanner.is_balanced_body());
    }
}
