// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Token definitions for the view-script lexer.

use std::fmt;

/// A span in the source code, representing a range of characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns the smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Returns the length of this span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if this span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The span in the source code
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The different kinds of tokens in view script.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Numeric literal
    Number(f64),
    /// String literal, escapes already decoded
    String(String),
    /// true
    True,
    /// false
    False,
    /// null
    Null,

    /// Identifier
    Identifier(String),

    // Keywords
    View,
    Global,
    Render,
    Var,
    Foreach,
    In,
    As,
    Write,

    // Punctuation
    /// {
    LeftBrace,
    /// }
    RightBrace,
    /// (
    LeftParen,
    /// )
    RightParen,
    /// [
    LeftBracket,
    /// ]
    RightBracket,
    /// .
    Dot,
    /// ;
    Semicolon,
    /// ,
    Comma,
    /// :
    Colon,
    /// ?
    Question,

    // Operators
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// %
    Percent,
    /// =
    Equal,
    /// ==
    EqualEqual,
    /// !=
    NotEqual,
    /// !
    Bang,
    /// <
    LessThan,
    /// <=
    LessThanEqual,
    /// >
    GreaterThan,
    /// >=
    GreaterThanEqual,
    /// &&
    AmpersandAmpersand,
    /// ||
    PipePipe,

    /// A character that starts no token
    Invalid(char),
    /// End of input
    Eof,
}

impl TokenKind {
    /// Looks up the keyword spelled `word`.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "view" => TokenKind::View,
            "global" => TokenKind::Global,
            "render" => TokenKind::Render,
            "var" => TokenKind::Var,
            "foreach" => TokenKind::Foreach,
            "in" => TokenKind::In,
            "as" => TokenKind::As,
            "write" => TokenKind::Write,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Number(n) => return write!(f, "{}", n),
            TokenKind::String(s) => return write!(f, "{:?}", s),
            TokenKind::Identifier(name) => return f.write_str(name),
            TokenKind::Invalid(ch) => return write!(f, "{}", ch),
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::View => "view",
            TokenKind::Global => "global",
            TokenKind::Render => "render",
            TokenKind::Var => "var",
            TokenKind::Foreach => "foreach",
            TokenKind::In => "in",
            TokenKind::As => "as",
            TokenKind::Write => "write",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::Dot => ".",
            TokenKind::Semicolon => ";",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Question => "?",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Equal => "=",
            TokenKind::EqualEqual => "==",
            TokenKind::NotEqual => "!=",
            TokenKind::Bang => "!",
            TokenKind::LessThan => "<",
            TokenKind::LessThanEqual => "<=",
            TokenKind::GreaterThan => ">",
            TokenKind::GreaterThanEqual => ">=",
            TokenKind::AmpersandAmpersand => "&&",
            TokenKind::PipePipe => "||",
            TokenKind::Eof => "end of file",
        };
        f.write_str(text)
    }
}
