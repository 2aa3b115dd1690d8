//! ANSI escape interpretation for block output.
//!
//! Only SGR styling is modelled. Every other escape (cursor motion, erase,
//! OSC titles and hyperlinks, DCS/PM/APC payloads, charset designations) is
//! recognised and dropped so that it never reaches the rendered text.

mod style;

pub use style::{AnsiStyle, PLAIN_TOKEN};

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSpan {
    pub text: String,
    pub style_token: String,
}

impl ParsedSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style_token: PLAIN_TOKEN.to_string(),
        }
    }

    pub fn is_plain(&self) -> bool {
        self.style_token == PLAIN_TOKEN
    }
}

/// Split `text` into styled spans. Always returns at least one span.
pub fn parse(text: &str) -> Vec<ParsedSpan> {
    let mut spans: Vec<ParsedSpan> = Vec::new();
    let mut style = AnsiStyle::default();
    let mut run = String::new();

    for token in Scanner::new(text) {
        match token {
            Token::Text(fragment) => run.push_str(fragment),
            Token::Sgr(params) => {
                let mut next = style;
                next.apply_sgr(params);
                if next != style {
                    push_run(&mut spans, &mut run, &style);
                    style = next;
                }
            }
            Token::Ignored => {}
        }
    }
    push_run(&mut spans, &mut run, &style);

    if spans.is_empty() {
        spans.push(ParsedSpan::plain(""));
    }
    spans
}

/// Remove every escape sequence, keeping only printable text.
pub fn strip(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for token in Scanner::new(text) {
        if let Token::Text(fragment) = token {
            out.push_str(fragment);
        }
    }
    out
}

fn push_run(spans: &mut Vec<ParsedSpan>, run: &mut String, style: &AnsiStyle) {
    if run.is_empty() {
        return;
    }
    spans.push(ParsedSpan {
        text: std::mem::take(run),
        style_token: style.token(),
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    Sgr(&'a str),
    Ignored,
}

/// Forward-only tokenizer. Sequence delimiters are all ASCII, so every slice
/// boundary it produces is a char boundary.
struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn skip_while(&mut self, range: std::ops::RangeInclusive<u8>) {
        while self.peek().is_some_and(|b| range.contains(&b)) {
            self.pos += 1;
        }
    }

    fn escape(&mut self) -> Token<'a> {
        // consume ESC
        self.pos += 1;
        match self.peek() {
            None => Token::Ignored,
            Some(b'[') => {
                self.pos += 1;
                self.control_sequence()
            }
            Some(b']' | b'P' | b'X' | b'^' | b'_') => {
                self.pos += 1;
                self.skip_string();
                Token::Ignored
            }
            Some(_) => {
                self.skip_while(0x20..=0x2f);
                if self.peek().is_some_and(|b| (0x30..=0x7e).contains(&b)) {
                    self.pos += 1;
                }
                Token::Ignored
            }
        }
    }

    fn control_sequence(&mut self) -> Token<'a> {
        let params_start = self.pos;
        self.skip_while(0x30..=0x3f);
        let params_end = self.pos;
        self.skip_while(0x20..=0x2f);
        let has_intermediates = self.pos != params_end;

        match self.peek() {
            Some(final_byte) if (0x40..=0x7e).contains(&final_byte) => {
                self.pos += 1;
                let params = &self.text[params_start..params_end];
                let is_sgr = final_byte == b'm'
                    && !has_intermediates
                    && params.bytes().all(|b| b.is_ascii_digit() || b == b';');
                if is_sgr {
                    Token::Sgr(params)
                } else {
                    Token::Ignored
                }
            }
            // Truncated or malformed: drop what was consumed, resume at this byte.
            _ => Token::Ignored,
        }
    }

    /// OSC/DCS/SOS/PM/APC payload, terminated by BEL or ST (`ESC \`). A bare
    /// ESC ends the string without being consumed.
    fn skip_string(&mut self) {
        let bytes = self.text.as_bytes();
        while let Some(&b) = bytes.get(self.pos) {
            match b {
                BEL => {
                    self.pos += 1;
                    return;
                }
                ESC => {
                    if bytes.get(self.pos + 1) == Some(&b'\\') {
                        self.pos += 2;
                    }
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let bytes = self.text.as_bytes();
        let start = self.pos;
        match *bytes.get(start)? {
            ESC => Some(self.escape()),
            BEL => {
                self.pos += 1;
                Some(Token::Ignored)
            }
            _ => {
                let end = bytes[start..]
                    .iter()
                    .position(|&b| b == ESC || b == BEL)
                    .map_or(bytes.len(), |offset| start + offset);
                self.pos = end;
                Some(Token::Text(&self.text[start..end]))
            }
        }
    }
}
