//! ANSI-aware line folding
//!
//! Text coming out of a word-diff backend carries SGR color sequences and may
//! contain wide CJK glyphs. Folding cuts such text into display-width slices
//! without splitting escape sequences or grapheme clusters, and carries open
//! colors across each cut.

use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Sequence appended to a slice when colors are still open at the cut
pub const RESET: &str = "\x1b[m";

const ESC: char = '\x1b';

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FoldError {
    #[error("fold width must be at least 1")]
    ZeroWidth,
}

/// How East Asian ambiguous-width characters are measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguousWidth {
    #[default]
    Narrow,
    Wide,
}

/// Where a fold is allowed to end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boundary {
    /// Cut wherever the room runs out
    #[default]
    Any,
    /// Avoid cutting a word in two when the whole word fits on the next slice
    Word,
}

/// Result of one fold call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Folded {
    /// The slice, at most `width` cells wide (padded when requested)
    pub head: String,
    /// Everything that did not fit, prefixed with the still-open colors
    pub tail: String,
    /// Color-introduction sequences that were open at the cut
    pub styles: Vec<String>,
    /// Display width of `head`, not counting padding
    pub width: usize,
}

impl Folded {
    pub fn is_last(&self) -> bool {
        self.tail.is_empty()
    }
}

/// One slice yielded by [`Chunks`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Slice {
    pub head: String,
    /// Color-introduction sequences still open after this slice
    pub styles: Vec<String>,
    /// Display width of `head`, not counting padding
    pub width: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    /// `ESC ] ... ESC \` or `ESC ] ... BEL`
    Osc(&'a str),
    /// `ESC [ ... m` introducing a color or effect
    Sgr(&'a str),
    /// `ESC [ m` or `ESC [ 0 m`
    Reset(&'a str),
    /// Any other escape sequence, copied verbatim
    Escape(&'a str),
    /// Carriage return or form feed
    Break(&'a str),
    Text { grapheme: &'a str, width: usize },
}

impl<'a> Token<'a> {
    fn as_str(&self) -> &'a str {
        match *self {
            Token::Osc(s)
            | Token::Sgr(s)
            | Token::Reset(s)
            | Token::Escape(s)
            | Token::Break(s)
            | Token::Text { grapheme: s, .. } => s,
        }
    }

    fn width(&self) -> usize {
        match self {
            Token::Text { width, .. } => *width,
            _ => 0,
        }
    }

    fn is_zero_width_escape(&self) -> bool {
        matches!(self, Token::Osc(_) | Token::Sgr(_) | Token::Escape(_))
    }

    fn is_word(&self) -> bool {
        match self {
            Token::Text { grapheme, .. } => grapheme
                .chars()
                .next()
                .map(|c| c.is_alphanumeric() || c == '_')
                .unwrap_or(false),
            _ => false,
        }
    }
}

/// Display width of a grapheme under the given ambiguous-width policy
pub fn grapheme_width(grapheme: &str, ambiguous: AmbiguousWidth) -> usize {
    match ambiguous {
        AmbiguousWidth::Narrow => UnicodeWidthStr::width(grapheme),
        AmbiguousWidth::Wide => UnicodeWidthStr::width_cjk(grapheme),
    }
}

/// Display width of `text`, ignoring escape sequences
pub fn display_width(text: &str, ambiguous: AmbiguousWidth) -> usize {
    tokenize(text, ambiguous).iter().map(Token::width).sum()
}

/// Remove every escape sequence from `text`
pub fn strip_escapes(text: &str) -> String {
    tokenize(text, AmbiguousWidth::Narrow)
        .iter()
        .filter(|t| matches!(t, Token::Text { .. } | Token::Break(_)))
        .map(Token::as_str)
        .collect()
}

fn tokenize(text: &str, ambiguous: AmbiguousWidth) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let rest = &text[pos..];
        let len = if rest.starts_with(ESC) {
            let len = escape_len(rest);
            let seq = &rest[..len];
            tokens.push(classify_escape(seq));
            len
        } else if rest.starts_with('\r') || rest.starts_with('\x0c') {
            tokens.push(Token::Break(&rest[..1]));
            1
        } else {
            let len = rest
                .find([ESC, '\r', '\x0c'])
                .unwrap_or(rest.len());
            for grapheme in rest[..len].graphemes(true) {
                tokens.push(Token::Text {
                    grapheme,
                    width: grapheme_width(grapheme, ambiguous),
                });
            }
            len
        };
        pos += len;
    }

    tokens
}

/// Byte length of the escape sequence at the start of `s` (which starts with ESC)
fn escape_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    match bytes.get(1) {
        Some(b']') => {
            let mut i = 2;
            while i < bytes.len() {
                match bytes[i] {
                    0x07 => return i + 1,
                    0x1b if bytes.get(i + 1) == Some(&b'\\') => return i + 2,
                    _ => i += 1,
                }
            }
            bytes.len()
        }
        Some(b'[') => {
            let mut i = 2;
            while i < bytes.len() {
                if (0x40..=0x7e).contains(&bytes[i]) {
                    return i + 1;
                }
                i += 1;
            }
            bytes.len()
        }
        // Two-character escape; step over a whole char so we stay on a boundary
        Some(_) => 1 + s[1..].chars().next().map(char::len_utf8).unwrap_or(0),
        None => 1,
    }
}

fn classify_escape(seq: &str) -> Token<'_> {
    if seq.starts_with("\x1b]") {
        return Token::Osc(seq);
    }
    if let Some(params) = seq
        .strip_prefix("\x1b[")
        .and_then(|body| body.strip_suffix('m'))
    {
        if params.is_empty() || params.bytes().all(|b| b == b'0') {
            return Token::Reset(seq);
        }
        return Token::Sgr(seq);
    }
    Token::Escape(seq)
}

/// Replay the color sequences of `tokens` on top of `carried`
fn open_styles(carried: &[String], tokens: &[Token<'_>]) -> Vec<String> {
    let mut styles = carried.to_vec();
    for token in tokens {
        match token {
            Token::Sgr(seq) => styles.push(seq.to_string()),
            Token::Reset(_) => styles.clear(),
            _ => {}
        }
    }
    styles
}

/// Width of the last visual line in `tokens`
fn trailing_width(tokens: &[Token<'_>]) -> usize {
    let mut width = 0;
    for token in tokens {
        match token {
            Token::Break(_) => width = 0,
            other => width += other.width(),
        }
    }
    width
}

/// Fixed-width folding configuration
#[derive(Debug, Clone, Copy)]
pub struct Folder {
    width: usize,
    boundary: Boundary,
    pad: bool,
    ambiguous: AmbiguousWidth,
}

impl Folder {
    pub fn new(width: usize) -> Result<Self, FoldError> {
        if width < 1 {
            return Err(FoldError::ZeroWidth);
        }
        Ok(Self {
            width,
            boundary: Boundary::Any,
            pad: false,
            ambiguous: AmbiguousWidth::Narrow,
        })
    }

    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_padding(mut self, pad: bool) -> Self {
        self.pad = pad;
        self
    }

    pub fn with_ambiguous(mut self, ambiguous: AmbiguousWidth) -> Self {
        self.ambiguous = ambiguous;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Cut one display line off the front of `text`
    pub fn fold(&self, text: &str) -> Folded {
        let tokens = tokenize(text, self.ambiguous);
        let (slice, end) = self.cut(&[], &tokens);

        let mut tail = String::new();
        if end < tokens.len() {
            tail.extend(slice.styles.iter().map(String::as_str));
            tail.extend(tokens[end..].iter().map(Token::as_str));
        }

        Folded {
            head: slice.head,
            tail,
            styles: slice.styles,
            width: slice.width,
        }
    }

    /// Iterate over every slice of `text`; always yields at least one slice
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            folder: *self,
            tokens: tokenize(text, self.ambiguous),
            pos: 0,
            styles: Vec::new(),
            done: false,
        }
    }

    /// Build the slice that starts `tokens` with `carried` colors already open.
    /// Also returns how many tokens it consumed.
    fn cut(&self, carried: &[String], tokens: &[Token<'_>]) -> (Slice, usize) {
        let mut end = self.scan(tokens);
        if end < tokens.len() && self.boundary == Boundary::Word {
            if let Some(start) = self.word_start(tokens, end) {
                end = start;
            }
        }

        let head_tokens = &tokens[..end];
        let styles = if end < tokens.len() {
            open_styles(carried, head_tokens)
        } else {
            Vec::new()
        };

        let mut head: String = carried.concat();
        head.extend(head_tokens.iter().map(Token::as_str));
        let width = trailing_width(head_tokens);
        if !styles.is_empty() {
            head.push_str(RESET);
        }
        if self.pad && width < self.width {
            head.push_str(&" ".repeat(self.width - width));
        }

        (
            Slice {
                head,
                styles,
                width,
            },
            end,
        )
    }

    /// Index of the first token that does not fit
    fn scan(&self, tokens: &[Token<'_>]) -> usize {
        let mut room = self.width;
        let mut placed = false;

        for (i, token) in tokens.iter().enumerate() {
            match token {
                Token::Break(_) => room = self.width,
                Token::Text { width, .. } => {
                    if *width > room {
                        // A glyph wider than the whole column still has to go somewhere
                        if !placed && room == self.width {
                            room = 0;
                            placed = true;
                            continue;
                        }
                        return back_off(tokens, i);
                    }
                    room -= width;
                    placed |= *width > 0;
                }
                _ => {}
            }
        }

        tokens.len()
    }

    /// Where to cut instead of `cut` so a partial word moves to the next slice
    fn word_start(&self, tokens: &[Token<'_>], cut: usize) -> Option<usize> {
        let next = tokens[cut..].iter().find(|t| !t.is_zero_width_escape())?;
        if !next.is_word() {
            return None;
        }

        let mut start = cut;
        let mut seen_word = false;
        while start > 0 {
            let token = &tokens[start - 1];
            if token.is_word() {
                seen_word = true;
            } else if !matches!(token, Token::Reset(_)) && !token.is_zero_width_escape() {
                break;
            }
            start -= 1;
        }
        if !seen_word {
            return None;
        }
        if !tokens[..start].iter().any(|t| t.width() > 0) {
            return None;
        }

        let pulled: usize = tokens[start..cut].iter().map(Token::width).sum();
        let continued: usize = tokens[cut..]
            .iter()
            .take_while(|t| t.is_word() || matches!(t, Token::Reset(_)) || t.is_zero_width_escape())
            .map(Token::width)
            .sum();

        (pulled + continued <= self.width).then_some(start)
    }
}

/// Leave trailing color introductions for the next slice rather than
/// opening them at the very end of this one
fn back_off(tokens: &[Token<'_>], mut cut: usize) -> usize {
    while cut > 0 && tokens[cut - 1].is_zero_width_escape() {
        cut -= 1;
    }
    cut
}

/// Successive slices of one logical line, tokenized once
pub struct Chunks<'a> {
    folder: Folder,
    tokens: Vec<Token<'a>>,
    pos: usize,
    /// Colors open at `pos`
    styles: Vec<String>,
    done: bool,
}

impl Iterator for Chunks<'_> {
    type Item = Slice;

    fn next(&mut self) -> Option<Slice> {
        if self.done {
            return None;
        }
        let (slice, used) = self.folder.cut(&self.styles, &self.tokens[self.pos..]);
        self.pos += used;
        if self.pos >= self.tokens.len() {
            self.done = true;
        } else {
            self.styles.clone_from(&slice.styles);
        }
        Some(slice)
    }
}

/// Fold `text` once; the free-function form of [`Folder::fold`]
pub fn fold(text: &str, width: usize, boundary: Boundary, pad: bool) -> Result<Folded, FoldError> {
    Ok(Folder::new(width)?
        .with_boundary(boundary)
        .with_padding(pad)
        .fold(text))
}

/// Expand tabs to spaces, counting display columns and skipping escapes
pub fn expand_tabs(text: &str, tabstop: usize, ambiguous: AmbiguousWidth) -> String {
    if tabstop == 0 || !text.contains('\t') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut column = 0;
    for token in tokenize(text, ambiguous) {
        match token {
            Token::Text { grapheme: "\t", .. } => {
                let fill = tabstop - column % tabstop;
                out.push_str(&" ".repeat(fill));
                column += fill;
            }
            Token::Break(s) => {
                out.push_str(s);
                column = 0;
            }
            other => {
                out.push_str(other.as_str());
                column += other.width();
            }
        }
    }
    out
}
