//! Line and brace helpers shared by the class and member scanners
//!
//! Braces are only counted in code. Braces inside string literals, char
//! literals and comments are ignored. Obfuscated identifiers may contain `"`
//! and `'`, so a quote that continues an identifier stays code, and a literal
//! still open at the end of its line is rescanned as code from just after
//! its opening quote.

use std::iter::Peekable;

/// Which side of a block a brace is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Brace {
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexeme {
    Code,
    Str,
    Char,
    LineComment,
    BlockComment,
}

/// Iterator over the code braces of a text, yielding byte positions
pub(crate) struct CodeBraces<'a> {
    bytes: &'a [u8],
    pos: usize,
    lexeme: Lexeme,
    /// Opening quote of the current string or char literal
    literal_start: usize,
    /// The previous code byte belongs to an identifier
    in_word: bool,
}

impl<'a> CodeBraces<'a> {
    /// Start scanning at `pos`, which must be in code
    pub(crate) fn starting_at(text: &'a str, pos: usize) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos,
            lexeme: Lexeme::Code,
            literal_start: pos,
            in_word: false,
        }
    }

    fn open_literal(&mut self, lexeme: Lexeme, at: usize) {
        self.lexeme = lexeme;
        self.literal_start = at;
    }

    /// The open literal never closed on its line: its quote was part of the
    /// surrounding code.
    fn rewind_literal(&mut self) {
        self.pos = self.literal_start + 1;
        self.lexeme = Lexeme::Code;
        self.in_word = true;
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

impl Iterator for CodeBraces<'_> {
    type Item = (usize, Brace);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.pos >= self.bytes.len() {
                if matches!(self.lexeme, Lexeme::Str | Lexeme::Char) {
                    self.rewind_literal();
                    continue;
                }
                return None;
            }

            let i = self.pos;
            let b = self.bytes[i];
            let next = self.bytes.get(i + 1).copied();
            self.pos += 1;

            match self.lexeme {
                Lexeme::Code => {
                    let in_word = self.in_word;
                    self.in_word = is_word_byte(b) || (in_word && matches!(b, b'"' | b'\''));

                    match b {
                        b'{' => return Some((i, Brace::Open)),
                        b'}' => return Some((i, Brace::Close)),
                        b'"' | b'\'' if in_word => {}
                        b'"' => self.open_literal(Lexeme::Str, i),
                        b'\'' => self.open_literal(Lexeme::Char, i),
                        b'/' if next == Some(b'/') => {
                            self.lexeme = Lexeme::LineComment;
                            self.pos += 1;
                        }
                        b'/' if next == Some(b'*') => {
                            self.lexeme = Lexeme::BlockComment;
                            self.pos += 1;
                        }
                        _ => {}
                    }
                }
                Lexeme::Str | Lexeme::Char => {
                    let quote = if self.lexeme == Lexeme::Str { b'"' } else { b'\'' };
                    match b {
                        b'\n' => self.rewind_literal(),
                        b'\\' if next.is_some_and(|n| n != b'\n') => self.pos += 1,
                        _ if b == quote => self.lexeme = Lexeme::Code,
                        _ => {}
                    }
                }
                Lexeme::LineComment => {
                    if b == b'\n' {
                        self.lexeme = Lexeme::Code;
                    }
                }
                Lexeme::BlockComment => {
                    if b == b'*' && next == Some(b'/') {
                        self.lexeme = Lexeme::Code;
                        self.pos += 1;
                    }
                }
            }
        }
    }
}

/// Find the `}` closing the `{` at byte position `open`
///
/// Returns `None` when the block is still open at the end of `text`.
pub(crate) fn find_matching_brace(text: &str, open: usize) -> Option<usize> {
    debug_assert_eq!(text.as_bytes().get(open), Some(&b'{'));

    let mut depth = 0usize;
    for (pos, brace) in CodeBraces::starting_at(text, open) {
        match brace {
            Brace::Open => depth += 1,
            Brace::Close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(pos);
                }
            }
        }
    }

    None
}

/// Tracks the brace depth at the start of each line of a text
pub(crate) struct DepthTracker<'a> {
    braces: Peekable<CodeBraces<'a>>,
    depth: usize,
}

impl<'a> DepthTracker<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            braces: CodeBraces::starting_at(text, 0).peekable(),
            depth: 0,
        }
    }

    /// Depth in effect at byte position `pos`
    ///
    /// Positions must be queried in increasing order.
    pub(crate) fn depth_at(&mut self, pos: usize) -> usize {
        while let Some(&(at, brace)) = self.braces.peek() {
            if at >= pos {
                break;
            }
            self.depth = match brace {
                Brace::Open => self.depth + 1,
                Brace::Close => self.depth.saturating_sub(1),
            };
            self.braces.next();
        }
        self.depth
    }
}

/// A line of text with its byte bounds
#[derive(Debug, Clone, Copy)]
pub(crate) struct Line<'a> {
    pub start: usize,
    /// Start of the following line, or the text length
    pub next: usize,
    pub text: &'a str,
}

/// The line beginning at byte position `start`, without its terminator
pub(crate) fn line_at(source: &str, start: usize) -> Option<Line<'_>> {
    if start >= source.len() {
        return None;
    }

    let rest = &source[start..];
    let (len, next) = match rest.find('\n') {
        Some(nl) => (nl, start + nl + 1),
        None => (rest.len(), source.len()),
    };
    let text = rest[..len].strip_suffix('\r').unwrap_or(&rest[..len]);

    Some(Line { start, next, text })
}

/// Iterate the lines of `source` from byte position `start`
pub(crate) fn lines_from(source: &str, start: usize) -> impl Iterator<Item = Line<'_>> {
    std::iter::successors(line_at(source, start), move |line| line_at(source, line.next))
}

/// 1-based line number of a byte position
pub(crate) fn line_number(source: &str, pos: usize) -> usize {
    source.as_bytes()[..pos.min(source.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// Split a declaration fragment on whitespace, keeping `<...>` and `[...]`
/// groups together so `Dictionary<int, string>` stays one token.
pub(crate) fn split_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0i32;
    let mut start = None;

    for (i, c) in text.char_indices() {
        match c {
            '<' | '[' => depth += 1,
            '>' | ']' => depth = (depth - 1).max(0),
            _ => {}
        }

        if c.is_whitespace() && depth == 0 {
            if let Some(s) = start.take() {
                tokens.push(&text[s..i]);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }

    if let Some(s) = start {
        tokens.push(&text[s..]);
    }

    tokens
}
