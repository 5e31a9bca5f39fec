//! Colour and glyph choices for terminal reports.

use colored::*;
use comfy_table::{Cell, Color};
use std::env;
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Colour when stdout is a terminal that is not `dumb`.
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn enabled(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => stdout_supports_color(),
        }
    }
}

fn stdout_supports_color() -> bool {
    let dumb = env::var("TERM").is_ok_and(|term| term == "dumb");
    !dumb && std::io::stdout().is_terminal()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormattingConfig {
    pub color: ColorMode,
    /// Box-drawing borders instead of `+-|`.
    pub unicode: bool,
}

impl Default for FormattingConfig {
    fn default() -> Self {
        Self {
            color: ColorMode::Auto,
            unicode: true,
        }
    }
}

impl FormattingConfig {
    /// Honours `NO_COLOR`, then `CLICOLOR=0`, with `CLICOLOR_FORCE=1` last.
    pub fn from_env() -> Self {
        let set_to = |name: &str, value: &str| env::var(name).is_ok_and(|v| v == value);

        let color = if set_to("CLICOLOR_FORCE", "1") {
            ColorMode::Always
        } else if env::var("NO_COLOR").is_ok() || set_to("CLICOLOR", "0") {
            ColorMode::Never
        } else {
            ColorMode::Auto
        };

        Self {
            color,
            ..Self::default()
        }
    }

    /// ASCII-only, no colours.
    pub fn plain() -> Self {
        Self {
            color: ColorMode::Never,
            unicode: false,
        }
    }
}

/// A [`FormattingConfig`] resolved against the current terminal.
#[derive(Debug, Clone, Copy)]
pub struct ReportStyle {
    color: bool,
    unicode: bool,
}

impl ReportStyle {
    pub fn new(config: FormattingConfig) -> Self {
        let color = config.color.enabled();
        colored::control::set_override(color);
        Self {
            color,
            unicode: config.unicode,
        }
    }

    pub fn color(&self) -> bool {
        self.color
    }

    pub fn unicode(&self) -> bool {
        self.unicode
    }

    pub fn header(&self, text: &str) -> String {
        if self.color {
            text.blue().bold().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn dim(&self, text: &str) -> String {
        if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }

    /// Table cell for `text`; criterion answers (`yes`/`no`) are
    /// coloured green or red.
    pub fn cell(&self, text: &str) -> Cell {
        let cell = Cell::new(text);
        if !self.color {
            return cell;
        }
        match text {
            "yes" => cell.fg(Color::Green),
            "no" => cell.fg(Color::Red),
            _ => cell,
        }
    }
}
