//! Line output for plain terminals.
//!
//! [`write_lines`] prints styled lines with ANSI escapes through crossterm;
//! [`lines_to_plain`] drops styling for pipes and tests.

use std::io::{self, Write};

use crossterm::{
    queue,
    style::{
        Attribute, Color as TermColor, Print, ResetColor, SetAttribute, SetBackgroundColor,
        SetForegroundColor,
    },
};
use ratatui::{
    style::{Color, Modifier, Style},
    text::Line,
};

/// Write styled lines to `out`, one per row, resetting style after each span.
pub fn write_lines<W: Write>(out: &mut W, lines: &[Line<'_>]) -> io::Result<()> {
    for line in lines {
        for span in &line.spans {
            apply_style(out, span.style)?;
            queue!(out, Print(span.content.as_ref()))?;
            if span.style != Style::default() {
                queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;
            }
        }
        queue!(out, Print("\n"))?;
    }
    out.flush()
}

/// Current terminal width, or 80 columns when it cannot be queried.
pub fn terminal_width() -> usize {
    crossterm::terminal::size().map_or(80, |(cols, _)| usize::from(cols))
}

/// Flatten lines to plain text joined by newlines.
pub fn lines_to_plain(lines: &[Line<'_>]) -> String {
    lines
        .iter()
        .map(|line| {
            line.spans
                .iter()
                .map(|span| span.content.as_ref())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn apply_style<W: Write>(out: &mut W, style: Style) -> io::Result<()> {
    if let Some(fg) = style.fg {
        queue!(out, SetForegroundColor(to_term_color(fg)))?;
    }
    if let Some(bg) = style.bg {
        queue!(out, SetBackgroundColor(to_term_color(bg)))?;
    }
    let modifiers = [
        (Modifier::BOLD, Attribute::Bold),
        (Modifier::DIM, Attribute::Dim),
        (Modifier::ITALIC, Attribute::Italic),
        (Modifier::UNDERLINED, Attribute::Underlined),
        (Modifier::REVERSED, Attribute::Reverse),
        (Modifier::CROSSED_OUT, Attribute::CrossedOut),
    ];
    for (modifier, attribute) in modifiers {
        if style.add_modifier.contains(modifier) {
            queue!(out, SetAttribute(attribute))?;
        }
    }
    Ok(())
}

fn to_term_color(color: Color) -> TermColor {
    match color {
        Color::Reset => TermColor::Reset,
        Color::Black => TermColor::Black,
        Color::Red => TermColor::DarkRed,
        Color::Green => TermColor::DarkGreen,
        Color::Yellow => TermColor::DarkYellow,
        Color::Blue => TermColor::DarkBlue,
        Color::Magenta => TermColor::DarkMagenta,
        Color::Cyan => TermColor::DarkCyan,
        Color::Gray => TermColor::Grey,
        Color::DarkGray => TermColor::DarkGrey,
        Color::LightRed => TermColor::Red,
        Color::LightGreen => TermColor::Green,
        Color::LightYellow => TermColor::Yellow,
        Color::LightBlue => TermColor::Blue,
        Color::LightMagenta => TermColor::Magenta,
        Color::LightCyan => TermColor::Cyan,
        Color::White => TermColor::White,
        Color::Rgb(r, g, b) => TermColor::Rgb { r, g, b },
        Color::Indexed(i) => TermColor::AnsiValue(i),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::text::Span;

    #[test]
    fn test_lines_to_plain() {
        let lines = vec![
            Line::from(vec![Span::raw("You")]),
            Line::from(vec![Span::raw("  "), Span::styled("hi", Style::default().fg(Color::Red))]),
        ];
        assert_eq!(lines_to_plain(&lines), "You\n  hi");
    }

    #[test]
    fn test_write_unstyled_is_plain() {
        let mut out = Vec::new();
        write_lines(&mut out, &[Line::from("plain"), Line::from("")]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "plain\n\n");
    }

    #[test]
    fn test_write_styled_emits_escapes() {
        let style = Style::default()
            .fg(Color::Rgb(1, 2, 3))
            .add_modifier(Modifier::BOLD);
        let mut out = Vec::new();
        write_lines(&mut out, &[Line::from(Span::styled("dose", style))]).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("\u{1b}[38;2;1;2;3m"));
        assert!(text.contains("\u{1b}[1m"));
        assert!(text.contains("dose"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_color_mapping() {
        assert_eq!(to_term_color(Color::Indexed(42)), TermColor::AnsiValue(42));
        assert_eq!(to_term_color(Color::LightRed), TermColor::Red);
        assert_eq!(to_term_color(Color::Red), TermColor::DarkRed);
    }
}
