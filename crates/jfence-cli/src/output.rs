//! Colored terminal output for the checker CLI.
//!
//! Uses `termcolor` for cross-platform colored output. Respects the
//! `NO_COLOR` environment variable and the `--color` flag. Findings go to
//! stderr; the machine-readable report goes to stdout.

use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Resolve `ColorChoice` from CLI flag and environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > auto-detect TTY.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Styled output writer for terminal.
pub struct StyledOutput {
    stdout: StandardStream,
    stderr: StandardStream,
}

impl StyledOutput {
    /// Create a new styled output with the given color choice.
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            stdout: StandardStream::stdout(choice),
            stderr: StandardStream::stderr(choice),
        }
    }

    fn stderr_styled(&mut self, text: &str, color: Option<Color>, bold: bool) {
        let mut spec = ColorSpec::new();
        spec.set_fg(color).set_bold(bold);
        let _ = self.stderr.set_color(&spec);
        let _ = write!(self.stderr, "{}", text);
        let _ = self.stderr.reset();
    }

    /// Red bold "error" label on stderr.
    pub fn error_label(&mut self) {
        self.stderr_styled("error", Some(Color::Red), true);
    }

    /// Yellow bold "warning" label on stderr.
    pub fn warning_label(&mut self) {
        self.stderr_styled("warning", Some(Color::Yellow), true);
    }

    /// Bold location on stderr.
    pub fn location(&mut self, text: &str) {
        self.stderr_styled(text, None, true);
    }

    /// Plain stderr text.
    pub fn text(&mut self, text: &str) {
        let _ = write!(self.stderr, "{}", text);
    }

    /// Dim/gray stderr text, used for underlying causes.
    pub fn dim(&mut self, text: &str) {
        self.stderr_styled(text, Some(Color::White), false);
    }

    /// Stderr newline.
    pub fn newline(&mut self) {
        let _ = writeln!(self.stderr);
    }

    /// Green bold summary line on stderr.
    pub fn success(&mut self, text: &str) {
        self.stderr_styled(text, Some(Color::Green), true);
        let _ = writeln!(self.stderr);
    }

    /// Red bold summary line on stderr.
    pub fn failure(&mut self, text: &str) {
        self.stderr_styled(text, Some(Color::Red), true);
        let _ = writeln!(self.stderr);
    }

    /// Plain stdout line, for reports.
    pub fn stdout_line(&mut self, text: &str) {
        let _ = writeln!(self.stdout, "{}", text);
    }

    /// Flush both streams.
    pub fn flush(&mut self) {
        let _ = self.stderr.flush();
        let _ = self.stdout.flush();
    }
}
