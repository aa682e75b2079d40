//! Text rendering utilities.
//!
//! This module provides shared text rendering functionality:
//! - [`render_markdown`] - Render markdown to styled ratatui Lines
//! - [`MarkdownStyles`] - Style configuration for markdown elements
//! - [`Language`], [`highlight_line`] - Fenced code highlighting
//! - [`wrap_text`], [`wrap_lines`], [`indent_lines`] - Wrapping helpers

mod highlight;
mod markdown;
mod styles;
mod wrap;

pub use highlight::{highlight_line, tokenize_line, Language, TokenKind};
pub use markdown::render_markdown;
pub use styles::MarkdownStyles;
pub use wrap::{indent_lines, wrap_lines, wrap_text};
