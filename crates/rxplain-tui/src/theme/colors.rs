//! Catppuccin color palettes for the chat transcript.

use ratatui::style::Color;

/// Theme color palette.
#[derive(Debug, Clone)]
pub struct Theme {
    // Backgrounds
    pub surface: Color,

    // Foregrounds
    pub text: Color,
    pub subtext: Color,
    pub muted: Color,

    // Accents
    pub primary: Color,
    pub secondary: Color,

    // Semantic
    pub warning: Color,
    pub info: Color,

    // Speakers
    pub user: Color,
    pub assistant: Color,

    // Code tokens
    pub keyword: Color,
    pub string: Color,
    pub comment: Color,
    pub number: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::mocha()
    }
}

impl Theme {
    /// Catppuccin Mocha theme (default dark theme).
    pub fn mocha() -> Self {
        Self {
            surface: Color::Rgb(49, 50, 68), // #313244

            text: Color::Rgb(205, 214, 244),    // #cdd6f4
            subtext: Color::Rgb(166, 173, 200), // #a6adc8
            muted: Color::Rgb(108, 112, 134),   // #6c7086

            primary: Color::Rgb(180, 190, 254),   // #b4befe (lavender)
            secondary: Color::Rgb(148, 226, 213), // #94e2d5 (teal)

            warning: Color::Rgb(249, 226, 175), // #f9e2af (yellow)
            info: Color::Rgb(137, 180, 250),    // #89b4fa (blue)

            user: Color::Rgb(250, 179, 135),      // #fab387 (peach)
            assistant: Color::Rgb(137, 180, 250), // #89b4fa (blue)

            keyword: Color::Rgb(203, 166, 247), // #cba6f7 (mauve)
            string: Color::Rgb(166, 227, 161),  // #a6e3a1 (green)
            comment: Color::Rgb(127, 132, 156), // #7f849c (overlay1)
            number: Color::Rgb(250, 179, 135),  // #fab387 (peach)
        }
    }

    /// Catppuccin Latte theme (light theme).
    pub fn latte() -> Self {
        Self {
            surface: Color::Rgb(230, 233, 239), // #e6e9ef

            text: Color::Rgb(76, 79, 105),    // #4c4f69
            subtext: Color::Rgb(92, 95, 119), // #5c5f77
            muted: Color::Rgb(140, 143, 161), // #8c8fa1

            primary: Color::Rgb(114, 135, 253),  // #7287fd (lavender)
            secondary: Color::Rgb(23, 146, 153), // #179299 (teal)

            warning: Color::Rgb(223, 142, 29), // #df8e1d (yellow)
            info: Color::Rgb(30, 102, 245),    // #1e66f5 (blue)

            user: Color::Rgb(254, 100, 11),      // #fe640b (peach)
            assistant: Color::Rgb(30, 102, 245), // #1e66f5 (blue)

            keyword: Color::Rgb(136, 57, 239),  // #8839ef (mauve)
            string: Color::Rgb(64, 160, 43),    // #40a02b (green)
            comment: Color::Rgb(140, 143, 161), // #8c8fa1 (overlay1)
            number: Color::Rgb(254, 100, 11),   // #fe640b (peach)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mocha_theme_creates() {
        let theme = Theme::mocha();
        assert!(matches!(theme.text, Color::Rgb(205, 214, 244)));
    }

    #[test]
    fn test_latte_theme_creates() {
        let theme = Theme::latte();
        assert!(matches!(theme.text, Color::Rgb(76, 79, 105)));
    }

    #[test]
    fn test_default_is_mocha() {
        let default = Theme::default();
        assert!(matches!(default.surface, Color::Rgb(49, 50, 68)));
    }

    #[test]
    fn test_speakers_are_distinct() {
        for theme in [Theme::mocha(), Theme::latte()] {
            assert_ne!(theme.user, theme.assistant);
        }
    }
}
