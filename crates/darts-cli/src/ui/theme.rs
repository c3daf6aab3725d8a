//! Badges and their colors.

use owo_colors::{OwoColorize, Style};

/// Badge types for status indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Ok,
    Warn,
    Err,
}

impl Badge {
    /// Get badge text (e.g., "[OK]")
    pub fn text(&self) -> &'static str {
        match self {
            Self::Ok => "[OK]",
            Self::Warn => "[WARN]",
            Self::Err => "[ERR]",
        }
    }

    /// Get badge with symbol for display.
    pub fn display(&self, unicode: bool) -> &'static str {
        if !unicode {
            return self.text();
        }
        match self {
            Self::Ok => "[\u{2713}]",
            Self::Warn => "[\u{26A0}]",
            Self::Err => "[\u{2717}]",
        }
    }

    pub fn style(&self) -> Style {
        match self {
            Self::Ok => Style::new().green().bold(),
            Self::Warn => Style::new().yellow().bold(),
            Self::Err => Style::new().red().bold(),
        }
    }
}

pub mod styles {
    use owo_colors::Style;

    pub fn dim() -> Style {
        Style::new().dimmed()
    }
}

/// Apply `style` to `text` when color is enabled.
pub fn styled(text: &str, style: Style, color: bool) -> String {
    if color {
        text.style(style).to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_text() {
        assert_eq!(Badge::Ok.text(), "[OK]");
        assert_eq!(Badge::Warn.text(), "[WARN]");
        assert_eq!(Badge::Err.text(), "[ERR]");
    }

    #[test]
    fn test_badge_display_unicode() {
        assert_eq!(Badge::Ok.display(true), "[\u{2713}]");
        assert_eq!(Badge::Ok.display(false), "[OK]");
    }

    #[test]
    fn test_styled_without_color_is_unchanged() {
        assert_eq!(styled("FAILED", Badge::Err.style(), false), "FAILED");
        assert_ne!(styled("FAILED", Badge::Err.style(), true), "FAILED");
    }
}
