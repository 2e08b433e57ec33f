//! Shared colored output utilities for CLI commands.
//!
//! Uses `termcolor` for cross-platform colored terminal output.
//! Respects `NO_COLOR` environment variable and `--color` flag.

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

    fn styled(stream: &mut StandardStream, text: &str, color: Option<Color>, bold: bool) {
        let mut spec = ColorSpec::new();
        spec.set_fg(color).set_bold(bold);
        let _ = stream.set_color(&spec);
        let _ = write!(stream, "{}", text);
        let _ = stream.reset();
    }

    // ── Status lines ─────────────────────────────────────────────────

    /// `✓ message` on stdout.
    pub fn success(&mut self, text: &str) {
        Self::styled(&mut self.stdout, "✓ ", Some(Color::Green), true);
        let _ = writeln!(self.stdout, "{}", text);
    }

    /// `ℹ message` on stdout.
    pub fn info(&mut self, text: &str) {
        Self::styled(&mut self.stdout, "ℹ ", Some(Color::Cyan), true);
        let _ = writeln!(self.stdout, "{}", text);
    }

    /// `⚠ message` on stderr.
    pub fn warning(&mut self, text: &str) {
        Self::styled(&mut self.stderr, "⚠ ", Some(Color::Yellow), true);
        let _ = writeln!(self.stderr, "{}", text);
    }

    /// `✗ message` on stderr.
    pub fn error(&mut self, text: &str) {
        Self::styled(&mut self.stderr, "✗ ", Some(Color::Red), true);
        let _ = writeln!(self.stderr, "{}", text);
    }

    // ── Plain writes ─────────────────────────────────────────────────

    /// Bold text.
    pub fn bold(&mut self, text: &str) {
        Self::styled(&mut self.stdout, text, None, true);
    }

    /// Dim/gray text.
    pub fn dim(&mut self, text: &str) {
        Self::styled(&mut self.stdout, text, Some(Color::White), false);
    }

    /// Plain text (no color).
    pub fn plain(&mut self, text: &str) {
        let _ = write!(self.stdout, "{}", text);
    }

    /// Newline.
    pub fn newline(&mut self) {
        let _ = writeln!(self.stdout);
    }

    /// Flush both streams.
    pub fn flush(&mut self) {
        let _ = self.stdout.flush();
        let _ = self.stderr.flush();
    }
}
