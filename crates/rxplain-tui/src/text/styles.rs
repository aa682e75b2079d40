//! Markdown styling configuration.
//!
//! Provides [`MarkdownStyles`] which maps markdown elements and code tokens
//! to ratatui styles.

use ratatui::style::{Modifier, Style};

use crate::theme::Theme;

/// Styles for rendering markdown elements.
#[derive(Debug, Clone)]
pub struct MarkdownStyles {
    /// H1 header style.
    pub h1: Style,
    /// H2 header style.
    pub h2: Style,
    /// H3+ header style.
    pub h3: Style,
    /// Inline code style.
    pub code: Style,
    /// Code block line style.
    pub code_block: Style,
    /// Keyword inside a fenced code block.
    pub code_keyword: Style,
    /// String literal inside a fenced code block.
    pub code_string: Style,
    /// Comment inside a fenced code block.
    pub code_comment: Style,
    /// Number inside a fenced code block.
    pub code_number: Style,
    /// Emphasis (italic) style.
    pub emphasis: Style,
    /// Strong (bold) style.
    pub strong: Style,
    /// List marker (bullet/number) style.
    pub list_marker: Style,
    /// Link text style.
    pub link: Style,
    /// Blockquote style.
    pub blockquote: Style,
    /// Normal text style.
    pub text: Style,
    /// Strikethrough style.
    pub strikethrough: Style,
}

impl MarkdownStyles {
    /// Create styles from a theme.
    pub fn from_theme(theme: &Theme) -> Self {
        let code_block = Style::default().fg(theme.secondary).bg(theme.surface);
        Self {
            h1: Style::default()
                .fg(theme.primary)
                .add_modifier(Modifier::BOLD),
            h2: Style::default()
                .fg(theme.text)
                .add_modifier(Modifier::BOLD),
            h3: Style::default()
                .fg(theme.subtext)
                .add_modifier(Modifier::BOLD),
            code: Style::default()
                .fg(theme.secondary)
                .bg(theme.surface),
            code_block,
            code_keyword: code_block
                .fg(theme.keyword)
                .add_modifier(Modifier::BOLD),
            code_string: code_block.fg(theme.string),
            code_comment: code_block
                .fg(theme.comment)
                .add_modifier(Modifier::ITALIC),
            code_number: code_block.fg(theme.number),
            emphasis: Style::default()
                .add_modifier(Modifier::ITALIC),
            strong: Style::default()
                .add_modifier(Modifier::BOLD),
            list_marker: Style::default()
                .fg(theme.muted),
            link: Style::default()
                .fg(theme.info)
                .add_modifier(Modifier::UNDERLINED),
            blockquote: Style::default()
                .fg(theme.subtext)
                .add_modifier(Modifier::ITALIC),
            text: Style::default()
                .fg(theme.text),
            strikethrough: Style::default()
                .add_modifier(Modifier::CROSSED_OUT),
        }
    }
}

impl Default for MarkdownStyles {
    fn default() -> Self {
        Self::from_theme(&Theme::default())
    }
}
