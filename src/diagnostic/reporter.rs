//! Stderr presentation for the CLI: which wire format a diagnostic takes and
//! the writer that applies it.

use super::{ansi::AnsiRenderer, json, Diagnostic};

/// Wire format for diagnostics.
///
/// weft is routinely driven by other programs (build steps rendering
/// templates in bulk), so the piped default is machine-readable JSON rather
/// than plain text; interactive terminals get the caret-snippet layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFormat {
    /// Caret snippets with ANSI colour.
    Color,
    /// The same layout with no escape codes.
    Plain,
    /// One JSON object per diagnostic line.
    Json,
}

impl ErrorFormat {
    /// The format a command-line flag selects, if the argument is one.
    pub fn from_flag(arg: &str) -> Option<Self> {
        match arg {
            "--ansi" | "-a" => Some(ErrorFormat::Color),
            "--text" | "-t" => Some(ErrorFormat::Plain),
            "--json" | "-j" => Some(ErrorFormat::Json),
            _ => None,
        }
    }

    /// Pick a format for the current stderr. Anything that is not an
    /// interactive terminal gets JSON; terminals get colour unless NO_COLOR
    /// asks for plain output.
    pub fn detect() -> Self {
        // SAFETY: isatty(2) accepts any fd value and returns 0 on error or
        // when the fd is not a terminal.
        let interactive = unsafe { libc::isatty(libc::STDERR_FILENO) } != 0;
        if !interactive {
            ErrorFormat::Json
        } else if std::env::var_os("NO_COLOR").is_some() {
            ErrorFormat::Plain
        } else {
            ErrorFormat::Color
        }
    }
}

/// Writes diagnostics to stderr in one fixed format.
pub struct Reporter {
    format: ErrorFormat,
}

impl Reporter {
    pub fn new(format: ErrorFormat) -> Self {
        Reporter { format }
    }

    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        match self.format {
            ErrorFormat::Json => format!("{}\n", json::render(diagnostic)),
            text => AnsiRenderer {
                use_color: text == ErrorFormat::Color,
            }
            .render(diagnostic),
        }
    }

    pub fn report(&self, diagnostic: &Diagnostic) {
        eprint!("{}", self.render(diagnostic));
    }
}
