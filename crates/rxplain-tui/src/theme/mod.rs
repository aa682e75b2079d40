//! Theme components for the transcript renderer.
//!
//! This module provides:
//! - [`Theme`] - Color palette (Catppuccin Mocha/Latte)

mod colors;

pub use colors::Theme;
