//! Lightweight syntax highlighting for fenced code blocks.
//!
//! A single-line lexer that picks out keywords, string literals, comments
//! and numbers. Block comments and multi-line strings are not tracked
//! across lines.

use ratatui::{style::Style, text::Span};

use super::styles::MarkdownStyles;

/// Languages with highlighting support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    Json,
    Shell,
}

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while",
];

const PYTHON_KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "False", "finally", "for", "from", "global", "if", "import", "in", "is",
    "lambda", "None", "nonlocal", "not", "or", "pass", "raise", "return", "True", "try",
    "while", "with", "yield",
];

const JS_KEYWORDS: &[&str] = &[
    "async", "await", "break", "case", "catch", "class", "const", "continue", "default",
    "delete", "else", "export", "extends", "false", "finally", "for", "from", "function", "if",
    "import", "in", "instanceof", "interface", "let", "new", "null", "of", "return", "switch",
    "this", "throw", "true", "try", "type", "typeof", "undefined", "var", "void", "while",
    "yield",
];

const JSON_KEYWORDS: &[&str] = &["true", "false", "null"];

const SHELL_KEYWORDS: &[&str] = &[
    "case", "do", "done", "elif", "else", "esac", "export", "fi", "for", "function", "if", "in",
    "local", "return", "then", "until", "while",
];

impl Language {
    /// Resolve a fenced code block info string such as `rust` or `ts`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let name = tag.split([',', ' ']).next().unwrap_or("").trim();
        match name.to_ascii_lowercase().as_str() {
            "rust" | "rs" => Some(Self::Rust),
            "python" | "py" => Some(Self::Python),
            "javascript" | "js" | "jsx" | "typescript" | "ts" | "tsx" => Some(Self::JavaScript),
            "json" => Some(Self::Json),
            "sh" | "bash" | "shell" | "zsh" | "console" => Some(Self::Shell),
            _ => None,
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Rust => RUST_KEYWORDS,
            Self::Python => PYTHON_KEYWORDS,
            Self::JavaScript => JS_KEYWORDS,
            Self::Json => JSON_KEYWORDS,
            Self::Shell => SHELL_KEYWORDS,
        }
    }

    fn line_comment(self) -> Option<&'static str> {
        match self {
            Self::Rust | Self::JavaScript => Some("//"),
            Self::Python | Self::Shell => Some("#"),
            Self::Json => None,
        }
    }

    fn is_quote(self, ch: char) -> bool {
        match self {
            // Single quotes in Rust are lifetimes as often as char literals.
            Self::Rust | Self::Json => ch == '"',
            Self::JavaScript => matches!(ch, '"' | '\'' | '`'),
            Self::Python | Self::Shell => matches!(ch, '"' | '\''),
        }
    }
}

/// Token classes produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Plain,
    Keyword,
    String,
    Comment,
    Number,
}

/// Split one line of code into classified tokens.
///
/// Adjacent tokens of the same kind are merged; concatenating the token
/// text always reproduces the input line.
pub fn tokenize_line(line: &str, language: Language) -> Vec<(TokenKind, String)> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens: Vec<(TokenKind, String)> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let start = i;

        let kind = if starts_with_at(&chars, i, language.line_comment()) {
            i = chars.len();
            TokenKind::Comment
        } else if language.is_quote(ch) {
            i = scan_string(&chars, i);
            TokenKind::String
        } else if ch.is_ascii_digit() {
            i += 1;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '.' | '_')) {
                i += 1;
            }
            TokenKind::Number
        } else if is_ident_start(ch) {
            i += 1;
            while i < chars.len() && is_ident_continue(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if language.keywords().contains(&word.as_str()) {
                TokenKind::Keyword
            } else {
                TokenKind::Plain
            }
        } else {
            i += 1;
            TokenKind::Plain
        };

        let text: String = chars[start..i].iter().collect();
        match tokens.last_mut() {
            Some((last, buf)) if *last == kind => buf.push_str(&text),
            _ => tokens.push((kind, text)),
        }
    }

    tokens
}

/// Render one line of code as styled spans.
pub fn highlight_line(line: &str, language: Language, styles: &MarkdownStyles) -> Vec<Span<'static>> {
    tokenize_line(line, language)
        .into_iter()
        .map(|(kind, text)| Span::styled(text, token_style(kind, styles)))
        .collect()
}

fn token_style(kind: TokenKind, styles: &MarkdownStyles) -> Style {
    match kind {
        TokenKind::Plain => styles.code_block,
        TokenKind::Keyword => styles.code_keyword,
        TokenKind::String => styles.code_string,
        TokenKind::Comment => styles.code_comment,
        TokenKind::Number => styles.code_number,
    }
}

fn starts_with_at(chars: &[char], at: usize, prefix: Option<&str>) -> bool {
    let Some(prefix) = prefix else {
        return false;
    };
    let mut idx = at;
    for expected in prefix.chars() {
        if chars.get(idx) != Some(&expected) {
            return false;
        }
        idx += 1;
    }
    true
}

/// Return the index just past the closing quote, or the line end.
fn scan_string(chars: &[char], open: usize) -> usize {
    let quote = chars[open];
    let mut i = open + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}
