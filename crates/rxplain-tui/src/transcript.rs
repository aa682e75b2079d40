//! Transcript rendering.
//!
//! Turns the finalized message list into styled lines: a speaker label per
//! turn, the body indented beneath it, and a typing indicator while a
//! request is pending.

use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};
use rxplain_engine::{Attachment, Message};

use crate::text::{indent_lines, render_markdown, wrap_text};
use crate::theme::Theme;

/// Label for user turns.
pub const USER_LABEL: &str = "You";
/// Label for assistant turns.
pub const ASSISTANT_LABEL: &str = "Rxplain";
/// Shown under the assistant label while waiting for a reply.
pub const TYPING_INDICATOR: &str = "typing...";

const BODY_INDENT: &str = "  ";

/// Render the whole transcript.
///
/// User text is shown verbatim; assistant replies go through
/// [`render_markdown`]. Bodies are wrapped to `width` minus the indent.
pub fn render_transcript(
    messages: &[Message],
    pending: bool,
    width: usize,
    theme: &Theme,
) -> Vec<Line<'static>> {
    let body_width = width.saturating_sub(BODY_INDENT.len());
    let mut lines = Vec::new();

    for (idx, message) in messages.iter().enumerate() {
        if idx > 0 {
            lines.push(Line::from(""));
        }
        lines.extend(render_message(message, body_width, theme));
    }

    if pending {
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        lines.extend(render_typing(theme));
    }

    lines
}

/// The assistant label followed by the typing indicator.
pub fn render_typing(theme: &Theme) -> Vec<Line<'static>> {
    vec![
        label_line(ASSISTANT_LABEL, theme.assistant),
        Line::from(vec![
            Span::raw(BODY_INDENT),
            Span::styled(
                TYPING_INDICATOR,
                Style::default()
                    .fg(theme.muted)
                    .add_modifier(Modifier::ITALIC),
            ),
        ]),
    ]
}

/// Render one message: label line followed by the indented body.
pub fn render_message(message: &Message, width: usize, theme: &Theme) -> Vec<Line<'static>> {
    let (label, color) = if message.is_user {
        (USER_LABEL, theme.user)
    } else {
        (ASSISTANT_LABEL, theme.assistant)
    };

    let body = if message.is_user {
        let style = Style::default().fg(theme.text);
        wrap_text(&message.text, width)
            .into_iter()
            .map(|row| Line::from(Span::styled(row, style)))
            .collect()
    } else {
        render_markdown(&message.text, width, theme)
    };

    let mut lines = vec![label_line(label, color)];
    lines.extend(indent_lines(body, BODY_INDENT, Style::default()));
    lines
}

/// One-line summary of the staged attachment, if any.
pub fn render_attachment(attachment: Option<&Attachment>, theme: &Theme) -> Option<Line<'static>> {
    let attachment = attachment?;
    let file = &attachment.file;
    let preview = if attachment.preview_data_uri.is_some() {
        ""
    } else {
        ", preview pending"
    };
    Some(Line::from(vec![
        Span::styled("[image] ", Style::default().fg(theme.warning)),
        Span::styled(
            format!("{} ({}{preview})", file.name, format_size(file.size())),
            Style::default().fg(theme.subtext),
        ),
    ]))
}

fn label_line(label: &str, color: ratatui::style::Color) -> Line<'static> {
    Line::from(Span::styled(
        label.to_string(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
