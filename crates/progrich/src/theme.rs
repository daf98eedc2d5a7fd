//! Theme - Design system constants
//!
//! Colors, glyphs and widths shared by every widget. Centralizing them keeps
//! bars and spinners visually consistent when they share one live region.

use crossterm::style::Color;
use std::str::FromStr;

/// Default theme for progrich widgets
#[derive(Debug, Clone, Default)]
pub struct Theme {
    /// Colors for different widget parts
    pub colors: ColorScheme,
    /// Status glyphs
    pub icons: Icons,
    /// Widths and bar glyphs
    pub layout: Layout,
    /// Frames of the spinner animation
    pub spinner: SpinnerStyle,
}

/// Color scheme for widget parts
#[derive(Debug, Clone)]
pub struct ColorScheme {
    /// Description text
    pub description: Color,
    /// Filled part of a running bar
    pub bar_active: Color,
    /// Filled part of a finished bar
    pub bar_complete: Color,
    /// Unfilled remainder of a bar
    pub bar_remaining: Color,
    /// Percentages, counts, timings
    pub secondary: Color,
    /// Spinner frames
    pub spinner: Color,
    /// Success glyph
    pub success: Color,
    /// Failure glyph
    pub error: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            description: Color::Reset,
            bar_active: Color::Magenta,
            bar_complete: Color::Green,
            bar_remaining: Color::DarkGrey,
            secondary: Color::DarkGrey,
            spinner: Color::Green,
            success: Color::Green,
            error: Color::Red,
        }
    }
}

/// Status glyphs
#[derive(Debug, Clone)]
pub struct Icons {
    /// Success (✔)
    pub success: &'static str,
    /// Failure (✖)
    pub error: &'static str,
    /// Separator between bar columns (•)
    pub separator: &'static str,
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            success: "✔",
            error: "✖",
            separator: "•",
        }
    }
}

/// Widths and bar glyphs
#[derive(Debug, Clone)]
pub struct Layout {
    /// Number of cells the bar itself occupies
    pub bar_width: usize,
    /// Full cell of a bar
    pub bar_full: char,
    /// Half cell at the leading edge of a bar
    pub bar_half: char,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            bar_width: 30,
            bar_full: '━',
            bar_half: '╸',
        }
    }
}

/// Named spinner animations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpinnerStyle {
    /// Braille dots (⠋⠙⠹...)
    #[default]
    Dots,
    /// Rotating line (-\|/)
    Line,
    /// Arc segments (◜◠◝...)
    Arc,
    /// Growing dots (.  .. ...)
    Simple,
}

impl SpinnerStyle {
    /// Animation frames
    pub fn frames(self) -> &'static [&'static str] {
        match self {
            Self::Dots => &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"],
            Self::Line => &["-", "\\", "|", "/"],
            Self::Arc => &["◜", "◠", "◝", "◞", "◡", "◟"],
            Self::Simple => &[".  ", ".. ", "...", "   "],
        }
    }
}

impl FromStr for SpinnerStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dots" => Ok(Self::Dots),
            "line" => Ok(Self::Line),
            "arc" => Ok(Self::Arc),
            "simple" => Ok(Self::Simple),
            other => Err(format!(
                "unknown spinner '{other}' (expected dots, line, arc or simple)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_defaults() {
        let theme = Theme::default();
        assert_eq!(theme.icons.success, "✔");
        assert_eq!(theme.icons.error, "✖");
        assert_eq!(theme.layout.bar_width, 30);
        assert_eq!(theme.spinner, SpinnerStyle::Dots);
    }

    #[test]
    fn test_spinner_parsing() {
        assert_eq!("Arc".parse::<SpinnerStyle>().unwrap(), SpinnerStyle::Arc);
        assert!("bouncing".parse::<SpinnerStyle>().is_err());
        assert_eq!(SpinnerStyle::Line.frames().len(), 4);
    }
}
