//! Text wrapping for styled transcript lines.

use ratatui::{
    style::Style,
    text::{Line, Span},
};

/// Wrap plain text to `width` columns. `0` disables wrapping.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return text.lines().map(str::to_string).collect();
    }
    text.lines()
        .flat_map(|line| {
            if line.trim().is_empty() {
                return vec![String::new()];
            }
            textwrap::wrap(line, width)
                .into_iter()
                .map(std::borrow::Cow::into_owned)
                .collect()
        })
        .collect()
}

/// Wrap styled lines to `width`, keeping each character's style.
pub fn wrap_lines(lines: Vec<Line<'static>>, width: usize) -> Vec<Line<'static>> {
    if width == 0 {
        return lines;
    }
    lines
        .into_iter()
        .flat_map(|line| wrap_line(line, width))
        .collect()
}

/// Prefix every line with `prefix` rendered in `style`.
pub fn indent_lines(lines: Vec<Line<'static>>, prefix: &str, style: Style) -> Vec<Line<'static>> {
    lines
        .into_iter()
        .map(|line| {
            let mut spans = Vec::with_capacity(line.spans.len() + 1);
            spans.push(Span::styled(prefix.to_string(), style));
            spans.extend(line.spans);
            Line::from(spans)
        })
        .collect()
}

fn wrap_line(line: Line<'static>, width: usize) -> Vec<Line<'static>> {
    let styled: Vec<(char, Style)> = line
        .spans
        .iter()
        .flat_map(|span| span.content.chars().map(move |ch| (ch, span.style)))
        .collect();
    if styled.len() <= width {
        return vec![line];
    }

    let plain: String = styled.iter().map(|(ch, _)| *ch).collect();
    let mut cursor = 0;
    let mut result = Vec::new();

    for row in textwrap::wrap(&plain, width) {
        // textwrap drops the whitespace at each break
        while cursor < styled.len()
            && styled[cursor].0.is_whitespace()
            && !row.starts_with(styled[cursor].0)
        {
            cursor += 1;
        }

        let mut spans: Vec<Span<'static>> = Vec::new();
        for expected in row.chars() {
            let style = match styled.get(cursor) {
                Some((_, style)) => {
                    cursor += 1;
                    *style
                }
                None => Style::default(),
            };
            push_char(&mut spans, expected, style);
        }
        result.push(Line::from(spans));
    }

    if result.is_empty() {
        result.push(Line::from(""));
    }
    result
}

fn push_char(spans: &mut Vec<Span<'static>>, ch: char, style: Style) {
    if let Some(last) = spans.last_mut() {
        if last.style == style {
            last.content.to_mut().push(ch);
            return;
        }
    }
    spans.push(Span::styled(ch.to_string(), style));
}
