//! Terminal output for the command layer: labelled status lines, aligned
//! listings and conflict previews.

use anstyle::{AnsiColor, Style};
use is_terminal::IsTerminal;
use std::fmt::Display;
use std::io::{self, Write};

const LABEL_WIDTH: usize = 12;
const COLUMN_GAP: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Pending,
    Done,
    Note,
    Warn,
    Fail,
}

impl Tone {
    fn style(self) -> Style {
        let color = match self {
            Tone::Pending => AnsiColor::Cyan,
            Tone::Done => AnsiColor::Green,
            Tone::Note => AnsiColor::Blue,
            Tone::Warn => AnsiColor::Yellow,
            Tone::Fail => AnsiColor::Red,
        };
        Style::new().bold().fg_color(Some(color.into()))
    }

    /// Warnings and failures go to stderr so `--json` stdout stays parseable
    fn to_stderr(self) -> bool {
        matches!(self, Tone::Warn | Tone::Fail)
    }
}

fn colored(to_stderr: bool) -> bool {
    let tty = if to_stderr {
        io::stderr().is_terminal()
    } else {
        io::stdout().is_terminal()
    };
    tty && std::env::var_os("NO_COLOR").is_none()
}

/// Right-align `label` in the gutter and indent continuation lines under
/// the message. `paint` wraps the label when color is on.
fn label_line(label: &str, message: &str, paint: Option<Style>) -> String {
    let gutter = format!("{label:>LABEL_WIDTH$}");
    let gutter = match paint {
        Some(style) => format!("{}{gutter}{}", style.render(), style.render_reset()),
        None => gutter,
    };

    let mut out = String::new();
    for (idx, line) in message.split('\n').enumerate() {
        if idx == 0 {
            out.push_str(&format!("{gutter} {line}\n"));
        } else {
            out.push_str(&format!("{:LABEL_WIDTH$} {line}\n", ""));
        }
    }
    out
}

fn emit(tone: Tone, label: &str, message: &str) {
    let stderr = tone.to_stderr();
    let paint = colored(stderr).then(|| tone.style());
    let text = label_line(label, message, paint);
    let _ = if stderr {
        io::stderr().lock().write_all(text.as_bytes())
    } else {
        io::stdout().lock().write_all(text.as_bytes())
    };
}

pub fn status(label: &str, message: impl Display) {
    emit(Tone::Pending, label, &message.to_string());
}

pub fn info(message: impl Display) {
    emit(Tone::Note, "Info", &message.to_string());
}

pub fn warn(message: impl Display) {
    emit(Tone::Warn, "Warning", &message.to_string());
}

pub fn error(message: impl Display) {
    emit(Tone::Fail, "Error", &message.to_string());
}

pub fn success(label: &str, message: impl Display) {
    emit(Tone::Done, label, &message.to_string());
}

/// Announce a remote git operation, run it, then report how it ended.
/// `describe` turns the result into a short trailing detail.
pub fn remote<T, E: Display>(
    label: &str,
    target: &str,
    run: impl FnOnce() -> Result<T, E>,
    describe: impl FnOnce(&T) -> String,
) -> Result<T, E> {
    status(label, target);
    match run() {
        Ok(value) => {
            let detail = describe(&value);
            if detail.is_empty() {
                success("Done", target);
            } else {
                success("Done", format!("{target}: {detail}"));
            }
            Ok(value)
        }
        Err(err) => {
            emit(Tone::Fail, "Failed", &format!("{target}: {err}"));
            Err(err)
        }
    }
}

/// Left-align rows into columns separated by two spaces. The last column
/// is never padded and trailing blanks are dropped.
pub fn columns<R: AsRef<[String]>>(rows: &[R]) -> String {
    let mut widths: Vec<usize> = Vec::new();
    for row in rows {
        for (idx, cell) in row.as_ref().iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(idx) {
                Some(width) => *width = (*width).max(len),
                None => widths.push(len),
            }
        }
    }

    let mut out = String::new();
    for row in rows {
        let cells = row.as_ref();
        let mut line = String::new();
        for (idx, cell) in cells.iter().enumerate() {
            if idx > 0 {
                line.push_str(COLUMN_GAP);
            }
            if idx + 1 == cells.len() {
                line.push_str(cell);
            } else {
                line.push_str(&format!("{cell:<width$}", width = widths[idx]));
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Print rows as aligned columns on stdout
pub fn table<R: AsRef<[String]>>(rows: &[R]) {
    print!("{}", columns(rows));
}

/// Side-by-side preview of an import conflict on stderr
pub fn conflict(entry: impl Display, existing: &str, incoming: &str) {
    let paint = colored(true);
    let mut err = io::stderr().lock();
    let _ = writeln!(err);
    let _ = err.write_all(label_line("Conflict", &entry.to_string(), paint.then(|| Tone::Warn.style())).as_bytes());
    for (marker, text, tone) in [("-", existing, Tone::Fail), ("+", incoming, Tone::Done)] {
        for line in text.trim_end().lines() {
            let line = format!("{marker} {line}");
            if paint {
                let style = tone.style();
                let _ = writeln!(err, "{}{line}{}", style.render(), style.render_reset());
            } else {
                let _ = writeln!(err, "{line}");
            }
        }
    }
}

/// Whether interactive prompts can be shown
pub fn is_interactive() -> bool {
    io::stdin().is_terminal() && io::stderr().is_terminal()
}

/// Print a value as pretty JSON on stdout
pub fn json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[rstest]
    #[case("Added", "alias ll (shared)", "       Added alias ll (shared)\n")]
    #[case("", "plain", "             plain\n")]
    #[case("Modified", "a\nb", "    Modified a\n             b\n")]
    fn test_label_line(#[case] label: &str, #[case] message: &str, #[case] expected: &str) {
        assert_eq!(label_line(label, message, None), expected);
    }

    #[test]
    fn test_label_line_paints_only_the_gutter() {
        let style = Tone::Done.style();
        let line = label_line("Done", "ok", Some(style));
        assert!(line.starts_with(&style.render().to_string()));
        assert!(line.ends_with(&format!("{} ok\n", style.render_reset())));
    }

    #[test]
    fn test_columns_align_all_but_last() {
        let rows = vec![row(&["ll", "ls -lah"]), row(&["gst", "git status"])];
        assert_eq!(columns(&rows), "ll   ls -lah\ngst  git status\n");
    }

    #[test]
    fn test_columns_drop_trailing_blanks() {
        let rows = vec![
            row(&["git", "enabled", ""]),
            row(&["zsh-autosuggestions", "", "Fish-like suggestions"]),
        ];
        assert_eq!(
            columns(&rows),
            "git                  enabled\nzsh-autosuggestions           Fish-like suggestions\n"
        );
    }

    #[test]
    fn test_columns_empty() {
        assert_eq!(columns::<Vec<String>>(&[]), "");
    }

    #[test]
    fn test_remote_passes_through_result() {
        let ok: Result<u32, String> = remote("Pulling", "shared scope", || Ok(3), |n| format!("{n} commit(s)"));
        assert_eq!(ok, Ok(3));

        let err: Result<u32, String> =
            remote("Pushing", "shared scope", || Err("rejected".to_string()), |_| String::new());
        assert_eq!(err, Err("rejected".to_string()));
    }
}
