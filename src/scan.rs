//! Lexical mode scanner shared by every extraction and balance pass.
//!
//! A single forward pass classifies every byte of the input as code, line
//! comment, block comment, or string (tracking which quote construct opened
//! the string). The resulting [`ScanMap`] answers mode queries for arbitrary
//! offsets without re-scanning, which is what lets the block extractor and
//! the orphan-delimiter pass share one source of truth about where strings
//! and comments are.
//!
//! The scanner is deliberately not a tokenizer: it resolves no keywords and
//! parses no grammar. It only needs to know enough to keep delimiters inside
//! `"strings"` and `/* comments */` from being counted as structure.

/// Which quote construct opened the current string span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteKind {
    Single,
    Double,
    /// Backtick template literal (JS family).
    Template,
    /// `'''` (Python).
    TripleSingle,
    /// `"""` (Python, Java text blocks).
    TripleDouble,
}

impl QuoteKind {
    fn closing_token(self) -> &'static str {
        match self {
            QuoteKind::Single => "'",
            QuoteKind::Double => "\"",
            QuoteKind::Template => "`",
            QuoteKind::TripleSingle => "'''",
            QuoteKind::TripleDouble => "\"\"\"",
        }
    }
}

/// Lexical mode active at a given byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexMode {
    #[default]
    Code,
    LineComment,
    BlockComment,
    Str(QuoteKind),
}

impl LexMode {
    pub fn is_code(self) -> bool {
        matches!(self, LexMode::Code)
    }
}

/// Per-language lexical rules the scanner needs. Constructed by
/// [`crate::language::TargetLanguage::lexical_profile`].
#[derive(Debug, Clone, Copy)]
pub struct LexicalProfile {
    /// Token that opens a comment running to end of line (`//`, `#`).
    pub line_comment: &'static str,
    /// Open/close pair for block comments, if the language has them.
    pub block_comment: Option<(&'static str, &'static str)>,
    /// Whether backtick opens a template literal.
    pub template_strings: bool,
    /// Whether `'''` opens a string.
    pub triple_single: bool,
    /// Whether `"""` opens a string.
    pub triple_double: bool,
}

/// Memoized result of one scan: the lexical mode of every byte.
#[derive(Debug, Clone)]
pub struct ScanMap {
    modes: Vec<LexMode>,
    final_mode: LexMode,
}

impl ScanMap {
    /// Mode at a byte offset. Offsets at or past end-of-input report the
    /// mode the scan ended in.
    pub fn mode_at(&self, offset: usize) -> LexMode {
        self.modes.get(offset).copied().unwrap_or(self.final_mode)
    }

    pub fn is_code(&self, offset: usize) -> bool {
        self.mode_at(offset).is_code()
    }

    /// Mode the scan was in when input ran out. Anything other than
    /// [`LexMode::Code`] means a string or comment was left unterminated.
    pub fn final_mode(&self) -> LexMode {
        self.final_mode
    }

    pub fn ends_in_code(&self) -> bool {
        self.final_mode.is_code()
    }
}

/// Classify every byte of `text` in a single forward pass.
///
/// Pure function of its inputs; no side effects. An unterminated string or
/// comment is reported through [`ScanMap::final_mode`], never as an error:
/// callers decide whether a still-open span invalidates their candidate.
pub fn scan(text: &str, profile: &LexicalProfile) -> ScanMap {
    let bytes = text.as_bytes();
    let mut modes = vec![LexMode::Code; bytes.len()];
    let mut mode = LexMode::Code;
    let mut i = 0;

    while i < bytes.len() {
        match mode {
            LexMode::Code => {
                let block_open = profile
                    .block_comment
                    .map(|(open, _)| open)
                    .filter(|open| starts_with_at(bytes, i, open));
                if starts_with_at(bytes, i, profile.line_comment) {
                    mode = LexMode::LineComment;
                    i = mark(&mut modes, i, profile.line_comment.len(), mode);
                } else if let Some(open) = block_open {
                    mode = LexMode::BlockComment;
                    i = mark(&mut modes, i, open.len(), mode);
                } else if profile.triple_single && starts_with_at(bytes, i, "'''") {
                    mode = LexMode::Str(QuoteKind::TripleSingle);
                    i = mark(&mut modes, i, 3, mode);
                } else if profile.triple_double && starts_with_at(bytes, i, "\"\"\"") {
                    mode = LexMode::Str(QuoteKind::TripleDouble);
                    i = mark(&mut modes, i, 3, mode);
                } else if bytes[i] == b'\'' {
                    mode = LexMode::Str(QuoteKind::Single);
                    i = mark(&mut modes, i, 1, mode);
                } else if bytes[i] == b'"' {
                    mode = LexMode::Str(QuoteKind::Double);
                    i = mark(&mut modes, i, 1, mode);
                } else if profile.template_strings && bytes[i] == b'`' {
                    mode = LexMode::Str(QuoteKind::Template);
                    i = mark(&mut modes, i, 1, mode);
                } else {
                    modes[i] = LexMode::Code;
                    i += 1;
                }
            }
            LexMode::LineComment => {
                if bytes[i] == b'\n' {
                    // The newline itself terminates the comment.
                    mode = LexMode::Code;
                    modes[i] = LexMode::Code;
                } else {
                    modes[i] = LexMode::LineComment;
                }
                i += 1;
            }
            LexMode::BlockComment => {
                let close = profile
                    .block_comment
                    .map(|(_, close)| close)
                    .unwrap_or("*/");
                if starts_with_at(bytes, i, close) {
                    i = mark(&mut modes, i, close.len(), LexMode::BlockComment);
                    mode = LexMode::Code;
                } else {
                    modes[i] = LexMode::BlockComment;
                    i += 1;
                }
            }
            LexMode::Str(kind) => {
                let close = kind.closing_token();
                if starts_with_at(bytes, i, close) && !escaped_at(bytes, i) {
                    i = mark(&mut modes, i, close.len(), LexMode::Str(kind));
                    mode = LexMode::Code;
                } else {
                    modes[i] = LexMode::Str(kind);
                    i += 1;
                }
            }
        }
    }

    ScanMap {
        modes,
        final_mode: mode,
    }
}

/// Net `open`/`close` balance over code-mode bytes only. Delimiters inside
/// strings and comments are inert.
pub fn delimiter_balance(text: &str, map: &ScanMap, open: u8, close: u8) -> i64 {
    let mut balance = 0i64;
    for (i, &b) in text.as_bytes().iter().enumerate() {
        if !map.is_code(i) {
            continue;
        }
        if b == open {
            balance += 1;
        } else if b == close {
            balance -= 1;
        }
    }
    balance
}

fn starts_with_at(bytes: &[u8], i: usize, token: &str) -> bool {
    !token.is_empty() && bytes[i..].starts_with(token.as_bytes())
}

/// A quote is escaped when the run of consecutive backslashes immediately
/// before it has odd length.
fn escaped_at(bytes: &[u8], i: usize) -> bool {
    let mut backslashes = 0;
    let mut j = i;
    while j > 0 && bytes[j - 1] == b'\\' {
        backslashes += 1;
        j -= 1;
    }
    backslashes % 2 == 1
}

fn mark(modes: &mut [LexMode], start: usize, len: usize, mode: LexMode) -> usize {
    let end = (start + len).min(modes.len());
    for slot in &mut modes[start..end] {
        *slot = mode;
    }
    end
}
