//! Status lines on stderr
//!
//! Kept apart from `log`: these are the messages a user of the CLI is meant
//! to read (run summaries, dry-run hints, fatal errors), so they carry no
//! timestamps or module paths. Colors follow the same rules as the result
//! formatter, checked against stderr.

use std::io;

use crossterm::tty::IsTty;
use owo_colors::OwoColorize;

/// Kind of status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warn,
    Error,
}

impl Tone {
    fn label(self) -> Option<&'static str> {
        match self {
            Tone::Warn => Some("warning"),
            Tone::Error => Some("error"),
            Tone::Info | Tone::Success => None,
        }
    }
}

/// Render one status line; problems get a `warning:`/`error:` label
pub fn render(tone: Tone, message: &str, colors: bool) -> String {
    let text = match tone.label() {
        Some(label) => format!("{}: {}", label, message),
        None => message.to_string(),
    };
    if !colors {
        return text;
    }
    match tone {
        Tone::Info => text,
        Tone::Success => text.green().to_string(),
        Tone::Warn => text.yellow().to_string(),
        Tone::Error => text.red().bold().to_string(),
    }
}

fn stderr_colors() -> bool {
    io::stderr().is_tty() && std::env::var_os("NO_COLOR").is_none()
}

fn emit(tone: Tone, message: &str) {
    eprintln!("{}", render(tone, message, stderr_colors()));
}

pub fn info(message: &str) {
    emit(Tone::Info, message);
}

pub fn success(message: &str) {
    emit(Tone::Success, message);
}

/// e.g. `output::warn("2 file(s) could not be searched.")`
pub fn warn(message: &str) {
    emit(Tone::Warn, message);
}

pub fn error(message: &str) {
    emit(Tone::Error, message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_rendering_labels_problems() {
        assert_eq!(render(Tone::Warn, "2 files skipped", false), "warning: 2 files skipped");
        assert_eq!(render(Tone::Error, "bad pattern", false), "error: bad pattern");
        assert_eq!(render(Tone::Info, "3 matches", false), "3 matches");
        assert_eq!(render(Tone::Success, "done", false), "done");
    }

    #[test]
    fn test_colored_rendering_keeps_text() {
        let colored = render(Tone::Error, "bad pattern", true);
        assert!(colored.contains("error: bad pattern"));
        assert_ne!(colored, "error: bad pattern");
        assert_eq!(render(Tone::Info, "3 matches", true), "3 matches");
    }
}
