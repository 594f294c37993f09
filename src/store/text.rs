//! Line splicing used by the fragment store. Everything outside the edited
//! span is copied through byte for byte.

use std::ops::Range;

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Append `block` at the end of `text`, separated by a single blank line
/// when the text is non-empty.
pub fn append_block(text: &str, block: &str) -> String {
    if text.is_empty() {
        return block.to_string();
    }

    let mut out = String::with_capacity(text.len() + block.len() + 2);
    out.push_str(text);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    let last_line_blank = out
        .trim_end_matches('\n')
        .rsplit('\n')
        .next()
        .map_or(true, is_blank)
        || out.ends_with("\n\n");
    if !last_line_blank {
        out.push('\n');
    }
    out.push_str(block);
    out
}

/// Replace the lines in `span` with `block`.
pub fn replace_span(lines: &[&str], span: Range<usize>, block: &str) -> String {
    let mut out = lines[..span.start].concat();
    out.push_str(block);
    out.push_str(&lines[span.end..].concat());
    out
}

/// Remove the lines in `span` together with one adjacent blank line,
/// preferring the one before.
pub fn remove_span(lines: &[&str], span: Range<usize>) -> String {
    let range = if span.start > 0 && is_blank(lines[span.start - 1]) {
        span.start - 1..span.end
    } else if span.end < lines.len() && is_blank(lines[span.end]) {
        span.start..span.end + 1
    } else {
        span
    };

    let mut out = lines[..range.start].concat();
    out.push_str(&lines[range.end..].concat());
    out
}
