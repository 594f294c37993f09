use tracing::trace;

use super::patterns::{FUNC_KEYWORD_RE, FUNC_PAREN_RE};
use super::scan::BraceScanner;
use super::{strip_eol, Codec, Decoded};
use crate::error::{Error, Result};
use crate::model::{validate_name, EntityKind, ShellFunction};

const INDENT: &str = "  ";

/// `name() {` + two-space indented body + `}`.
pub struct FunctionCodec;

impl Codec for FunctionCodec {
    type Entity = ShellFunction;

    const KIND: EntityKind = EntityKind::Function;

    fn name(entity: &ShellFunction) -> &str {
        &entity.name
    }

    fn validate(entity: &ShellFunction) -> Result<()> {
        validate_name(&entity.name)?;
        let header = format!("{}() {{", entity.name);
        if declaration(&header).map(|(name, _)| name) != Some(entity.name.as_str()) {
            return Err(Error::InvalidIdentifier(entity.name.clone()));
        }

        let invalid = |reason: &str| Error::InvalidBody {
            name: entity.name.clone(),
            reason: reason.to_string(),
        };

        if entity.content.contains('\r') {
            return Err(invalid("carriage returns are not allowed in a body"));
        }

        let mut scanner = BraceScanner::opened();
        for line in entity.content.split('\n') {
            if scanner.feed(line).is_some() {
                return Err(invalid("body closes the function early"));
            }
        }
        if !scanner.is_balanced_body() {
            return Err(invalid("unbalanced braces or quotes in body"));
        }
        Ok(())
    }

    fn encode(entity: &ShellFunction) -> String {
        let mut out = format!("{}() {{\n", entity.name);
        for line in entity.content.split('\n') {
            if !line.is_empty() {
                out.push_str(INDENT);
                out.push_str(line);
            }
            out.push('\n');
        }
        out.push_str("}\n");
        out
    }

    fn decode_all(lines: &[&str]) -> Vec<Decoded<ShellFunction>> {
        let mut found = Vec::new();
        let mut idx = 0;

        while idx < lines.len() {
            match decode_at(lines, idx) {
                Some(decoded) => {
                    idx = decoded.span.end;
                    found.push(decoded);
                }
                None => idx += 1,
            }
        }

        found
    }
}

/// Try to decode a function whose declaration starts on line `start`.
fn decode_at(lines: &[&str], start: usize) -> Option<Decoded<ShellFunction>> {
    let header = strip_eol(lines[start]);
    let (name, rest) = declaration(header)?;

    // The opening brace is either on the declaration line or on the next
    // non-blank line.
    let (open_line, tail) = match rest.strip_prefix('{') {
        Some(tail) => (start, tail),
        None if rest.trim().is_empty() => {
            let next = (start + 1..lines.len()).find(|&i| !strip_eol(lines[i]).trim().is_empty())?;
            let tail = strip_eol(lines[next]).trim_start().strip_prefix('{')?;
            (next, tail)
        }
        None => return None,
    };

    let mut scanner = BraceScanner::opened();
    if let Some(close) = scanner.feed(tail) {
        return Some(Decoded {
            entity: ShellFunction::new(name, tail[..close].trim()),
            span: start..open_line + 1,
        });
    }

    let mut body: Vec<&str> = Vec::new();
    if !tail.trim().is_empty() {
        body.push(tail.trim());
    }

    for (offset, raw) in lines[open_line + 1..].iter().enumerate() {
        let line = strip_eol(raw);
        if let Some(close) = scanner.feed(line) {
            let head = &line[..close];
            if !head.trim().is_empty() {
                body.push(head.trim_end());
            }
            return Some(Decoded {
                entity: ShellFunction::new(name, dedent(&body)),
                span: start..open_line + offset + 2,
            });
        }
        body.push(line);
    }

    trace!(name, line = start, "unterminated function body, skipping");
    None
}

fn declaration(header: &str) -> Option<(&str, &str)> {
    let caps = FUNC_PAREN_RE
        .captures(header)
        .or_else(|| FUNC_KEYWORD_RE.captures(header))?;
    let name = caps.get(1)?.as_str();
    if name == "function" {
        return None;
    }
    let rest = caps.get(2).map_or("", |m| m.as_str());
    Some((name, rest))
}

/// Remove the block indentation. Bodies written by `encode` are stripped of
/// exactly two spaces; anything else loses its common leading whitespace.
fn dedent(body: &[&str]) -> String {
    let non_empty = || body.iter().filter(|line| !line.is_empty());

    let strip = if non_empty().all(|line| line.starts_with(INDENT)) {
        INDENT.len()
    } else {
        non_empty()
            .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
            .min()
            .unwrap_or(0)
    };

    body.iter()
        .map(|line| line.get(strip..).unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::split_lines;
    use rstest::rstest;

    fn decode(text: &str) -> Vec<Decoded<ShellFunction>> {
        FunctionCodec::decode_all(&split_lines(text))
    }

    #[rstest]
    #[case(ShellFunction::new("mkcd", "mkdir -p \"$1\" && cd \"$1\""))]
    #[case(ShellFunction::new("extract", "case \"$1\" in\n  *.tar.gz) tar xzf \"$1\" ;;\n  *) echo \"unknown\" ;;\nesac"))]
    #[case(ShellFunction::new("blank_lines", "echo one\n\necho two"))]
    #[case(ShellFunction::new("nested", "if true; then\n  { echo grouped; }\nfi"))]
    #[case(ShellFunction::new("braces_in_quotes", "echo '}' \"{\" ${HOME}"))]
    #[case(ShellFunction::new("commented", "# close } here\necho ok"))]
    #[case(ShellFunction::new("empty", ""))]
    #[case(ShellFunction::new("trailing_newline", "echo hi\n"))]
    #[case(ShellFunction::new("indented", "  already indented\n  twice"))]
    fn test_round_trip(#[case] function: ShellFunction) {
        FunctionCodec::validate(&function).unwrap();
        let text = FunctionCodec::encode(&function);
        let decoded = decode(&text);
        assert_eq!(decoded.len(), 1, "{text}");
        assert_eq!(decoded[0].entity, function);
        assert_eq!(decoded[0].span, 0..split_lines(&text).len());
    }

    #[test]
    fn test_encode_layout() {
        let text = FunctionCodec::encode(&ShellFunction::new("greet", "echo hi\n\necho bye"));
        assert_eq!(text, "greet() {\n  echo hi\n\n  echo bye\n}\n");
    }

    #[test]
    fn test_decode_keyword_forms() {
        let text = "\
function a() {
  echo a
}
function b {
  echo b
}
c()
{
  echo c
}
";
        let decoded = decode(text);
        let names: Vec<&str> = decoded.iter().map(|d| d.entity.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(decoded[2].span, 6..10);
        assert_eq!(decoded[2].entity.content, "echo c");
    }

    #[test]
    fn test_decode_one_liner() {
        let decoded = decode("up() { cd ..; }\n");
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].entity, ShellFunction::new("up", "cd ..;"));
        assert_eq!(decoded[0].span, 0..1);
    }

    #[test]
    fn test_decode_tab_indented_body() {
        let decoded = decode("t() {\n\tif x; then\n\t\ty\n\tfi\n}\n");
        assert_eq!(decoded[0].entity.content, "if x; then\n\ty\nfi");
    }

    #[test]
    fn test_decode_preserves_surroundings_in_spans() {
        let text = "# helpers\n\nfirst() {\n  echo 1\n}\n\n# second one\nsecond() {\n  echo 2\n}\n";
        let decoded = decode(text);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].span, 2..5);
        assert_eq!(decoded[1].span, 7..10);
    }

    #[test]
    fn test_decode_skips_unterminated() {
        let text = "broken() {\n  echo never closed\nok() {\n  echo fine\n";
        assert!(decode(text).is_empty());
    }

    #[test]
    fn test_nested_definitions_belong_to_outer() {
        let text = "outer() {\n  inner() {\n    echo in\n  }\n  inner\n}\n";
        let decoded = decode(text);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].entity.name, "outer");
    }

    #[rstest]
    #[case("echo }")]
    #[case("echo {")]
    #[case("echo 'open")]
    #[case("echo \\")]
    #[case("echo a\r\necho b")]
    #[case("echo a\r")]
    fn test_validate_rejects_unbalanced(#[case] content: &str) {
        let err = FunctionCodec::validate(&ShellFunction::new("bad", content)).unwrap_err();
        assert!(matches!(err, Error::InvalidBody { .. }));
    }

    #[rstest]
    #[case("function")]
    #[case("a#b")]
    #[case("x#")]
    fn test_validate_rejects_names_without_a_header(#[case] name: &str) {
        let err = FunctionCodec::validate(&ShellFunction::new(name, "true")).unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(n) if n == name));
    }

    #[rstest]
    #[case("functions")]
    #[case("my-func")]
    #[case("git.status")]
    #[case("..")]
    fn test_accepted_names_round_trip(#[case] name: &str) {
        let function = ShellFunction::new(name, "echo ok");
        FunctionCodec::validate(&function).unwrap();

        let decoded = decode(&FunctionCodec::encode(&function));
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].entity, function);
    }
}
