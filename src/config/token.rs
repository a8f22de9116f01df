//! Line-based tokenizer for the rewriting language.
//!
//! Grounded on `examples/original_source/src/core/settings/parser.{h,cpp}`:
//! the token kinds (`Token::Type`), the escape-sequence set, and the
//! prefix-table mechanism used to recognize `S-`, `M00-`, `=>` and similar
//! multi-character punctuation as single tokens.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TokenError {
    #[error("{line}: invalid UTF-8 sequence")]
    InvalidUtf8 { line: usize },
    #[error("{line}: unterminated string literal")]
    UnterminatedString { line: usize },
    #[error("{line}: unterminated regular expression")]
    UnterminatedRegexp { line: usize },
    #[error("{line}: unknown escape sequence '\\{ch}'")]
    UnknownEscape { line: usize, ch: char },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A bare or quoted symbol. `quoted` distinguishes `"foo"` from `foo`
    /// for contexts (like key names) that reject quoting.
    Str { value: String, quoted: bool },
    Number(i64),
    Regexp(String),
    OpenParen,
    CloseParen,
    Comma,
    /// One entry from the configurable prefix table (`S-`, `M00-`, `L0-`,
    /// `=>`, `!!!`, `!!`, `!`, `*`, `~`, ...), recognized as a single unit.
    Prefix(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

/// The default prefix table: modifier prefixes plus the reserved
/// punctuation forms from §6. Longest-match-first ordering matters so e.g.
/// `M00-` is tried before a bare `M` would ever be considered.
pub fn default_prefixes() -> Vec<String> {
    let mut v: Vec<String> = vec![
        "S-", "A-", "C-", "W-", "U-", "D-", "R-", "IL-", "IC-", "NL-", "CL-", "SL-", "KL-",
        "MAX-", "MIN-", "MMAX-", "MMIN-", "T-", "TS-", "=>", "!!!", "!!", "!", "*", "~",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    for i in 0..10 {
        v.push(format!("L{i}-"));
    }
    for i in 0..20 {
        v.push(format!("M{i:02}-"));
        v.push(format!("L{i:02}-"));
    }
    for i in 0x20..0x100u32 {
        v.push(format!("M{i:02X}-"));
    }
    v.sort_by_key(|s| std::cmp::Reverse(s.len()));
    v
}

pub struct Tokenizer<'a> {
    src: &'a str,
    prefixes: Vec<String>,
    line: usize,
    pos: usize,
    bytes: &'a [u8],
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str, prefixes: Vec<String>) -> Self {
        Tokenizer {
            src,
            prefixes,
            line: 1,
            pos: 0,
            bytes: src.as_bytes(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, off: usize) -> Option<u8> {
        self.bytes.get(self.pos + off).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
        }
        Some(b)
    }

    fn skip_line_continuation_and_ws(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.bump();
                }
                Some(b'\\') if self.peek_at(1) == Some(b'\n') => {
                    self.bump();
                    self.bump();
                }
                Some(b'#') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn try_prefix(&mut self) -> Option<String> {
        let rest = &self.src[self.pos..];
        for p in &self.prefixes {
            if rest.starts_with(p.as_str()) {
                let p = p.clone();
                self.pos += p.len();
                return Some(p);
            }
        }
        None
    }

    fn read_unquoted_symbol(&mut self) -> Result<String, TokenError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace()
                || matches!(b, b'(' | b')' | b',' | b'#')
                || self.try_prefix_peek()
            {
                break;
            }
            if b < 0x80 {
                self.bump();
            } else {
                let width = utf8_len(b).ok_or(TokenError::InvalidUtf8 { line: self.line })?;
                for _ in 0..width {
                    self.bump();
                }
            }
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn try_prefix_peek(&self) -> bool {
        let rest = &self.src[self.pos..];
        self.prefixes.iter().any(|p| rest.starts_with(p.as_str()))
    }

    fn read_quoted_string(&mut self) -> Result<String, TokenError> {
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => return Err(TokenError::UnterminatedString { line: self.line }),
                Some(b'"') => {
                    self.bump();
                    break;
                }
                Some(b'\\') => {
                    self.bump();
                    out.push(self.read_escape(false)?);
                }
                Some(_) => {
                    out.push(self.read_one_char()?);
                }
            }
        }
        Ok(out)
    }

    fn read_regexp(&mut self) -> Result<String, TokenError> {
        self.bump(); // opening '/'
        let mut out = String::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    return Err(TokenError::UnterminatedRegexp { line: self.line })
                }
                Some(b'/') => {
                    self.bump();
                    break;
                }
                Some(b'\\') => {
                    self.bump();
                    out.push(self.read_escape(true)?);
                }
                Some(_) => out.push(self.read_one_char()?),
            }
        }
        Ok(out)
    }

    fn read_one_char(&mut self) -> Result<char, TokenError> {
        let b = self.peek().unwrap();
        if b < 0x80 {
            self.bump();
            return Ok(b as char);
        }
        let width = utf8_len(b).ok_or(TokenError::InvalidUtf8 { line: self.line })?;
        let start = self.pos;
        for _ in 0..width {
            self.bump();
        }
        self.src[start..self.pos]
            .chars()
            .next()
            .ok_or(TokenError::InvalidUtf8 { line: self.line })
    }

    /// `in_regex` switches `\1`-`\9` to back-references (passed through
    /// verbatim to the regex engine) rather than octal escapes.
    fn read_escape(&mut self, in_regex: bool) -> Result<char, TokenError> {
        let line = self.line;
        let c = self.bump().ok_or(TokenError::UnterminatedString { line })? as char;
        Ok(match c {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'a' => '\u{07}',
            'e' => '\u{1b}',
            'f' => '\u{0c}',
            'v' => '\u{0b}',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            '/' => '/',
            'x' => self.read_hex_escape()?,
            'c' => {
                let ctl = self.bump().ok_or(TokenError::UnterminatedString { line })? as char;
                ((ctl.to_ascii_uppercase() as u8) & 0x1f) as char
            }
            '1'..='9' if in_regex => {
                // Back-reference: re-emit verbatim for the regex engine.
                return Ok(c);
            }
            '0'..='7' => {
                let mut val = c.to_digit(8).unwrap();
                for _ in 0..2 {
                    if let Some(b) = self.peek() {
                        if (b as char).is_digit(8) {
                            val = val * 8 + (b as char).to_digit(8).unwrap();
                            self.bump();
                            continue;
                        }
                    }
                    break;
                }
                char::from_u32(val).unwrap_or('\0')
            }
            other => return Err(TokenError::UnknownEscape { line, ch: other }),
        })
    }

    fn read_hex_escape(&mut self) -> Result<char, TokenError> {
        let line = self.line;
        if self.peek() == Some(b'{') {
            self.bump();
            let mut val: u32 = 0;
            while let Some(b) = self.peek() {
                if b == b'}' {
                    self.bump();
                    break;
                }
                val = val * 16 + (b as char).to_digit(16).unwrap_or(0);
                self.bump();
            }
            Ok(char::from_u32(val).unwrap_or('\0'))
        } else {
            let mut val: u32 = 0;
            for _ in 0..2 {
                if let Some(b) = self.peek() {
                    if (b as char).is_ascii_hexdigit() {
                        val = val * 16 + (b as char).to_digit(16).unwrap();
                        self.bump();
                        continue;
                    }
                }
                break;
            }
            let _ = line;
            Ok(char::from_u32(val).unwrap_or('\0'))
        }
    }

    pub fn tokenize_line(&mut self) -> Result<Vec<Token>, TokenError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_line_continuation_and_ws();
            let line = self.line;
            match self.peek() {
                None => break,
                Some(b'\n') => {
                    self.bump();
                    break;
                }
                Some(b'(') => {
                    self.bump();
                    tokens.push(Token {
                        kind: TokenKind::OpenParen,
                        line,
                    });
                }
                Some(b')') => {
                    self.bump();
                    tokens.push(Token {
                        kind: TokenKind::CloseParen,
                        line,
                    });
                }
                Some(b',') => {
                    self.bump();
                    tokens.push(Token {
                        kind: TokenKind::Comma,
                        line,
                    });
                }
                Some(b'"') => {
                    let s = self.read_quoted_string()?;
                    tokens.push(Token {
                        kind: TokenKind::Str {
                            value: s,
                            quoted: true,
                        },
                        line,
                    });
                }
                Some(b'/') => {
                    let s = self.read_regexp()?;
                    tokens.push(Token {
                        kind: TokenKind::Regexp(s),
                        line,
                    });
                }
                _ => {
                    if let Some(p) = self.try_prefix() {
                        tokens.push(Token {
                            kind: TokenKind::Prefix(p),
                            line,
                        });
                        continue;
                    }
                    let sym = self.read_unquoted_symbol()?;
                    if sym.is_empty() {
                        // Shouldn't happen once prefixes/punct are excluded,
                        // but avoid an infinite loop on unexpected input.
                        self.bump();
                        continue;
                    }
                    if let Ok(n) = sym.parse::<i64>() {
                        tokens.push(Token {
                            kind: TokenKind::Number(n),
                            line,
                        });
                    } else if let Some(n) = parse_hex(&sym) {
                        tokens.push(Token {
                            kind: TokenKind::Number(n),
                            line,
                        });
                    } else {
                        tokens.push(Token {
                            kind: TokenKind::Str {
                                value: sym,
                                quoted: false,
                            },
                            line,
                        });
                    }
                }
            }
        }
        Ok(tokens)
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

fn parse_hex(s: &str) -> Option<i64> {
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    i64::from_str_radix(s, 16).ok()
}

fn utf8_len(lead: u8) -> Option<u8> {
    if lead & 0x80 == 0 {
        Some(1)
    } else if lead & 0xe0 == 0xc0 {
        Some(2)
    } else if lead & 0xf0 == 0xe0 {
        Some(3)
    } else if lead & 0xf8 == 0xf0 {
        Some(4)
    } else {
        None
    }
}

/// Tokenizes an entire source, line by line, resynchronizing at the next
/// newline after an invalid-UTF-8 diagnostic rather than aborting (§4.1
/// tokenizer contract).
pub fn tokenize(src: &str) -> (Vec<Vec<Token>>, Vec<TokenError>) {
    let prefixes = default_prefixes();
    let mut lines = Vec::new();
    let mut errors = Vec::new();
    let mut tok = Tokenizer::new(src, prefixes);
    while !tok.at_end() {
        match tok.tokenize_line() {
            Ok(line_tokens) => lines.push(line_tokens),
            Err(e) => {
                errors.push(e);
                // resynchronize at next newline
                while let Some(b) = tok.peek() {
                    if b == b'\n' {
                        tok.bump();
                        break;
                    }
                    tok.bump();
                }
                lines.push(Vec::new());
            }
        }
    }
    (lines, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_simple_binding() {
        let (lines, errs) = tokenize("key A = B\n");
        assert!(errs.is_empty());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 4);
    }

    #[test]
    fn recognizes_modifier_prefix() {
        let (lines, errs) = tokenize("key S-A = C-X\n");
        assert!(errs.is_empty());
        assert!(matches!(lines[0][1].kind, TokenKind::Prefix(ref p) if p == "S-"));
    }

    #[test]
    fn escapes_decode_in_strings() {
        let (lines, errs) = tokenize("\"\\n\\t\"\n");
        assert!(errs.is_empty());
        match &lines[0][0].kind {
            TokenKind::Str { value, .. } => assert_eq!(value, "\n\t"),
            other => panic!("unexpected token {other:?}"),
        }
    }

    #[test]
    fn regex_backreferences_pass_through() {
        let (lines, errs) = tokenize("/(a)\\1/\n");
        assert!(errs.is_empty());
        match &lines[0][0].kind {
            TokenKind::Regexp(s) => assert_eq!(s, "(a)\\1"),
            other => panic!("unexpected token {other:?}"),
        }
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        let (lines, errs) = tokenize("key A = B # trailing comment\n");
        assert!(errs.is_empty());
        assert_eq!(lines[0].len(), 4);
    }

    #[test]
    fn trailing_backslash_continues_line() {
        let (lines, errs) = tokenize("key A \\\n= B\n");
        assert!(errs.is_empty());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 4);
    }

    #[test]
    fn hex_number_literal() {
        let (lines, errs) = tokenize("def key A = 0x1e\n");
        assert!(errs.is_empty());
        assert!(matches!(lines[0][4].kind, TokenKind::Number(0x1e)));
    }
}
