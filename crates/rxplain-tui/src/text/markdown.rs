//! Markdown rendering using pulldown-cmark.
//!
//! Provides [`render_markdown`] to convert assistant replies to styled
//! ratatui Lines. Fenced code blocks with a known language tag are
//! highlighted.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::Style,
    text::{Line, Span},
};

use crate::theme::Theme;

use super::highlight::{highlight_line, Language};
use super::styles::MarkdownStyles;
use super::wrap::wrap_lines;

/// Render markdown text to styled ratatui Lines.
///
/// # Arguments
/// * `input` - The markdown text to render
/// * `width` - Available width; prose is wrapped to it, `0` disables wrapping
/// * `theme` - Theme for styling
///
/// # Returns
/// A vector of styled Lines ready for rendering.
pub fn render_markdown(input: &str, width: usize, theme: &Theme) -> Vec<Line<'static>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(input, options);
    let styles = MarkdownStyles::from_theme(theme);

    let mut renderer = MarkdownRenderer::new(styles);
    renderer.run(parser);

    // Trailing blank line left by the last paragraph
    if renderer
        .lines
        .last()
        .is_some_and(|l| l.spans.iter().all(|s| s.content.is_empty()))
    {
        renderer.lines.pop();
        renderer.blocks.pop();
    }

    renderer
        .blocks
        .into_iter()
        .zip(renderer.lines)
        .flat_map(|(is_code, line)| {
            if is_code {
                vec![line]
            } else {
                wrap_lines(vec![line], width)
            }
        })
        .collect()
}

/// Internal renderer that processes pulldown-cmark events.
struct MarkdownRenderer {
    /// Accumulated output lines.
    lines: Vec<Line<'static>>,
    /// Parallel to `lines`: whether each line belongs to a code block.
    blocks: Vec<bool>,
    /// Style configuration.
    styles: MarkdownStyles,
    /// Stack of active styles for nested formatting.
    style_stack: Vec<Style>,
    /// Current line being built.
    current_spans: Vec<Span<'static>>,
    /// Current indentation level (for nested lists).
    indent_level: usize,
    /// Whether we're inside a code block.
    in_code_block: bool,
    /// Highlighting language of the current fenced block.
    code_language: Option<Language>,
    /// Next number for each open list; `None` for bullet lists.
    list_stack: Vec<Option<u64>>,
    /// Whether we're inside a blockquote.
    in_blockquote: bool,
    /// Pending list marker to prepend to next text.
    pending_list_marker: Option<String>,
    /// Task list checkbox state (Some(checked) if in task item).
    task_checkbox: Option<bool>,
}

impl MarkdownRenderer {
    fn new(styles: MarkdownStyles) -> Self {
        Self {
            lines: Vec::new(),
            blocks: Vec::new(),
            styles,
            style_stack: Vec::new(),
            current_spans: Vec::new(),
            indent_level: 0,
            in_code_block: false,
            code_language: None,
            list_stack: Vec::new(),
            in_blockquote: false,
            pending_list_marker: None,
            task_checkbox: None,
        }
    }

    fn run<'a>(&mut self, parser: impl Iterator<Item = Event<'a>>) {
        for event in parser {
            self.handle_event(event);
        }
        // Flush any remaining content
        self.flush_line();
    }

    #[allow(clippy::too_many_lines)]
    fn handle_event(&mut self, event: Event<'_>) {
        match event {
            // Headings
            Event::Start(Tag::Heading { level, .. }) => {
                self.flush_line();
                let style = self.heading_style(level);
                self.style_stack.push(style);
                // Text content will be styled by the style_stack
            }
            Event::End(TagEnd::Heading(_)) => {
                self.flush_line();
                self.style_stack.pop();
            }

            // Emphasis (italic)
            Event::Start(Tag::Emphasis) => {
                self.style_stack.push(self.styles.emphasis);
            }

            // Strong (bold)
            Event::Start(Tag::Strong) => {
                self.style_stack.push(self.styles.strong);
            }

            // Strikethrough
            Event::Start(Tag::Strikethrough) => {
                self.style_stack.push(self.styles.strikethrough);
            }

            // End inline formatting - all pop the style stack
            Event::End(TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link) => {
                self.style_stack.pop();
            }

            // Code blocks
            Event::Start(Tag::CodeBlock(kind)) => {
                self.flush_line();
                self.in_code_block = true;
                self.code_language = match kind {
                    CodeBlockKind::Fenced(tag) => Language::from_tag(&tag),
                    CodeBlockKind::Indented => None,
                };
            }
            Event::End(TagEnd::CodeBlock) => {
                self.flush_line();
                self.in_code_block = false;
                self.code_language = None;
                self.lines.push(Line::from(""));
                self.blocks.push(false);
            }

            // Lists
            Event::Start(Tag::List(start)) => {
                self.flush_line();
                self.indent_level += 1;
                self.list_stack.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                self.indent_level = self.indent_level.saturating_sub(1);
                self.list_stack.pop();
                if self.list_stack.is_empty() {
                    self.lines.push(Line::from(""));
                    self.blocks.push(false);
                }
            }

            // List items
            Event::Start(Tag::Item) => {
                self.flush_line();
                let indent = "  ".repeat(self.indent_level.saturating_sub(1));
                let marker = match self.list_stack.last_mut() {
                    Some(Some(next)) => {
                        let marker = format!("{indent}{next}. ");
                        *next += 1;
                        marker
                    }
                    _ => format!("{indent}• "),
                };
                self.pending_list_marker = Some(marker);
            }
            Event::End(TagEnd::Item) => {
                self.flush_line();
                self.pending_list_marker = None;
                self.task_checkbox = None;
            }

            // Task list markers
            Event::TaskListMarker(checked) => {
                self.task_checkbox = Some(checked);
            }

            // Blockquotes
            Event::Start(Tag::BlockQuote) => {
                self.flush_line();
                self.in_blockquote = true;
            }
            Event::End(TagEnd::BlockQuote) => {
                self.flush_line();
                self.in_blockquote = false;
            }

            // Links
            Event::Start(Tag::Link { .. }) => {
                self.style_stack.push(self.styles.link);
            }

            // Paragraphs
            Event::End(TagEnd::Paragraph) => {
                self.flush_line();
                // Blank line after top-level paragraphs only
                if self.list_stack.is_empty() {
                    self.lines.push(Line::from(""));
                    self.blocks.push(false);
                }
            }

            // Text content
            Event::Text(text) => {
                self.add_text(&text);
            }

            // Inline code
            Event::Code(code) => {
                self.begin_inline();
                let style = self.styles.code;
                self.current_spans.push(Span::styled(
                    format!("`{code}`"),
                    style,
                ));
            }

            // Line breaks
            Event::SoftBreak => {
                // Soft break = space
                self.add_text(" ");
            }
            Event::HardBreak => {
                self.flush_line();
            }

            // Events we don't handle specially (ignore)
            Event::Start(
                Tag::Paragraph
                | Tag::Image { .. }
                | Tag::Table(_)
                | Tag::TableHead
                | Tag::TableRow
                | Tag::TableCell
                | Tag::FootnoteDefinition(_)
                | Tag::MetadataBlock(_)
                | Tag::HtmlBlock,
            )
            | Event::End(
                TagEnd::Image
                | TagEnd::Table
                | TagEnd::TableHead
                | TagEnd::TableRow
                | TagEnd::TableCell
                | TagEnd::FootnoteDefinition
                | TagEnd::MetadataBlock(_)
                | TagEnd::HtmlBlock,
            )
            | Event::Html(_)
            | Event::InlineHtml(_)
            | Event::FootnoteReference(_)
            | Event::Rule => {}
        }
    }

    fn add_text(&mut self, text: &str) {
        if self.in_code_block {
            // In code block, render each line with code styling
            let indent = "  ".repeat(self.indent_level);
            for line in text.lines() {
                self.current_spans
                    .push(Span::styled(format!("{indent}  "), self.styles.code_block));
                match self.code_language {
                    Some(language) => self
                        .current_spans
                        .extend(highlight_line(line, language, &self.styles)),
                    None => self
                        .current_spans
                        .push(Span::styled(line.to_string(), self.styles.code_block)),
                }
                self.flush_line();
            }
            return;
        }

        self.begin_inline();

        // Compute current style from stack
        let style = self.current_style();
        self.current_spans.push(Span::styled(text.to_string(), style));
    }

    /// Emit the pending list marker, task checkbox and blockquote prefix
    /// ahead of the first inline content of a line.
    fn begin_inline(&mut self) {
        if let Some(marker) = self.pending_list_marker.take() {
            self.current_spans.push(Span::styled(
                marker,
                self.styles.list_marker,
            ));
            if let Some(checked) = self.task_checkbox.take() {
                let checkbox = if checked { "[x] " } else { "[ ] " };
                self.current_spans.push(Span::styled(
                    checkbox,
                    self.styles.list_marker,
                ));
            }
        }

        if self.in_blockquote && self.current_spans.is_empty() {
            self.current_spans.push(Span::styled(
                "> ".to_string(),
                self.styles.blockquote,
            ));
        }
    }

    fn current_style(&self) -> Style {
        // Combine all styles in the stack
        let mut style = self.styles.text;
        for s in &self.style_stack {
            style = style.patch(*s);
        }
        style
    }

    fn heading_style(&self, level: HeadingLevel) -> Style {
        match level {
            HeadingLevel::H1 => self.styles.h1,
            HeadingLevel::H2 => self.styles.h2,
            _ => self.styles.h3,
        }
    }

    fn flush_line(&mut self) {
        if !self.current_spans.is_empty() {
            let spans = std::mem::take(&mut self.current_spans);
            self.lines.push(Line::from(spans));
            self.blocks.push(self.in_code_block);
        }
    }
}
