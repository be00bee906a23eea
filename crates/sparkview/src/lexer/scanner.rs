// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The scanner that produces tokens from source text.

use super::{Span, Token, TokenKind};
use crate::diagnostics::{Diagnostics, codes};

/// A scanner that tokenizes view-script source.
///
/// Malformed input never stops the scanner: it records a diagnostic and
/// keeps going so the parser sees the whole file.
pub struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    diagnostics: Diagnostics,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            current_pos: 0,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Returns the next token from the source.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start = self.current_pos;

        let Some((_pos, ch)) = self.advance() else {
            return Token::new(TokenKind::Eof, Span::new(start, start));
        };

        let kind = match ch {
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '?' => TokenKind::Question,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,

            '=' => self.either('=', TokenKind::EqualEqual, TokenKind::Equal),
            '!' => self.either('=', TokenKind::NotEqual, TokenKind::Bang),
            '<' => self.either('=', TokenKind::LessThanEqual, TokenKind::LessThan),
            '>' => self.either('=', TokenKind::GreaterThanEqual, TokenKind::GreaterThan),
            '&' => self.doubled('&', TokenKind::AmpersandAmpersand, start),
            '|' => self.doubled('|', TokenKind::PipePipe, start),

            '"' | '\'' => self.scan_string(ch, start),
            '0'..='9' => self.scan_number(ch),
            _ if is_id_start(ch) => self.scan_identifier(ch),

            _ => {
                self.unexpected(ch, start);
                TokenKind::Invalid(ch)
            }
        };

        Token::new(kind, Span::new(start, self.current_pos))
    }

    /// Consumes the scanner, returning the diagnostics it recorded.
    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = pos + ch.len_utf8();
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().map(|(_, ch)| ch)
    }

    fn either(&mut self, next: char, matched: TokenKind, single: TokenKind) -> TokenKind {
        if self.peek() == Some(next) {
            self.advance();
            matched
        } else {
            single
        }
    }

    fn doubled(&mut self, ch: char, kind: TokenKind, start: usize) -> TokenKind {
        if self.peek() == Some(ch) {
            self.advance();
            kind
        } else {
            self.unexpected(ch, start);
            TokenKind::Invalid(ch)
        }
    }

    fn unexpected(&mut self, ch: char, start: usize) {
        self.diagnostics.error(
            codes::UNEXPECTED_CHARACTER,
            format!("Unexpected character '{}'", ch.escape_default()),
            Span::new(start, self.current_pos),
        );
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        while let Some(ch) = self.peek() {
                            if ch == '\n' {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        self.advance();
                        self.advance();
                        let mut prev = ' ';
                        while let Some((_, ch)) = self.advance() {
                            if prev == '*' && ch == '/' {
                                break;
                            }
                            prev = ch;
                        }
                    }
                    _ => break,
                },
                _ => break,
            }
        }
    }

    fn scan_string(&mut self, quote: char, start: usize) -> TokenKind {
        let mut value = String::new();

        loop {
            match self.peek() {
                None => {
                    self.diagnostics.error(
                        codes::UNTERMINATED_STRING,
                        "Unterminated string literal",
                        Span::new(start, self.current_pos),
                    );
                    break;
                }
                Some('\n' | '\r') => {
                    // Stop at the line end so the next line still lexes.
                    self.diagnostics.error(
                        codes::NEWLINE_IN_CONSTANT,
                        "Newline in constant",
                        Span::new(start, self.current_pos),
                    );
                    break;
                }
                Some(ch) if ch == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    let escape_start = self.current_pos;
                    self.advance();
                    self.scan_escape(escape_start, &mut value);
                }
                Some(ch) => {
                    self.advance();
                    value.push(ch);
                }
            }
        }

        TokenKind::String(value)
    }

    fn scan_escape(&mut self, escape_start: usize, value: &mut String) {
        let escaped = match self.peek() {
            Some('n') => '\n',
            Some('r') => '\r',
            Some('t') => '\t',
            Some('0') => '\0',
            Some('\\') => '\\',
            Some('"') => '"',
            Some('\'') => '\'',
            Some('u') => {
                self.advance();
                match self.scan_unicode_escape() {
                    Some(ch) => value.push(ch),
                    None => self.bad_escape(escape_start),
                }
                return;
            }
            // The string scanner reports the missing terminator.
            None | Some('\n' | '\r') => return,
            Some(other) => {
                self.advance();
                self.bad_escape(escape_start);
                value.push(other);
                return;
            }
        };
        self.advance();
        value.push(escaped);
    }

    fn scan_unicode_escape(&mut self) -> Option<char> {
        if self.peek() != Some('{') {
            return None;
        }
        self.advance();
        let mut digits = String::new();
        while let Some(ch) = self.peek() {
            if ch == '}' {
                self.advance();
                return u32::from_str_radix(&digits, 16)
                    .ok()
                    .and_then(char::from_u32);
            }
            if !ch.is_ascii_hexdigit() || digits.len() == 6 {
                return None;
            }
            digits.push(ch);
            self.advance();
        }
        None
    }

    fn bad_escape(&mut self, escape_start: usize) {
        self.diagnostics.error(
            codes::BAD_ESCAPE,
            "Unrecognized escape sequence",
            Span::new(escape_start, self.current_pos),
        );
    }

    fn scan_number(&mut self, first: char) -> TokenKind {
        let mut text = String::from(first);

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if self.peek() == Some('.') && self.peek_next().is_some_and(|ch| ch.is_ascii_digit()) {
            text.push('.');
            self.advance();
            while let Some(ch) = self.peek() {
                if ch.is_ascii_digit() {
                    text.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        TokenKind::Number(text.parse().unwrap_or(f64::NAN))
    }

    fn scan_identifier(&mut self, first: char) -> TokenKind {
        let mut name = String::from(first);

        while let Some(ch) = self.peek() {
            if is_id_continue(ch) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        TokenKind::keyword(&name).unwrap_or(TokenKind::Identifier(name))
    }
}

/// Checks if a character can start an identifier.
fn is_id_start(ch: char) -> bool {
    ch == '_' || unicode_xid::UnicodeXID::is_xid_start(ch)
}

/// Checks if a character can continue an identifier.
fn is_id_continue(ch: char) -> bool {
    ch == '_' || unicode_xid::UnicodeXID::is_xid_continue(ch)
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}
