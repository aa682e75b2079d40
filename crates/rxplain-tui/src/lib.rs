//! rxplain-tui: Terminal presentation for the Rxplain chat client
//!
//! This crate turns session state into styled terminal output:
//! - Transcript rendering with speaker labels and a typing indicator
//! - Markdown replies with highlighted fenced code blocks
//! - An observer-backed view that tracks the live session
//! - ANSI output for plain terminals

pub mod ansi;
pub mod text;
pub mod theme;
pub mod transcript;
pub mod view;

pub use ansi::{lines_to_plain, terminal_width, write_lines};
pub use ratatui;
pub use rxplain_engine;
pub use text::{render_markdown, MarkdownStyles};
pub use theme::Theme;
pub use transcript::{render_attachment, render_message, render_transcript, render_typing};
pub use view::TranscriptView;
