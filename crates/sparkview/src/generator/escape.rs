// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! String literal escaping for generated source.
//!
//! Decoding the output with the view-script lexer yields the input
//! unchanged, for every input.

use std::fmt::Write;

/// Escapes `text` for use between double quotes.
///
/// Printable ASCII other than `"` and `\` is copied as is. Tab, carriage
/// return, newline, NUL, `"` and `\` use their short escapes. Every other
/// character is written as `\u{HEX}`.
pub fn escape_literal(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + text.len() / 8);
    for ch in text.chars() {
        match ch {
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            '\n' => escaped.push_str("\\n"),
            '\0' => escaped.push_str("\\0"),
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            ' '..='~' => escaped.push(ch),
            _ => {
                let _ = write!(escaped, "\\u{{{:X}}}", ch as u32);
            }
        }
    }
    escaped
}

/// Escapes `text` and wraps it in double quotes.
pub fn string_literal(text: &str) -> String {
    format!("\"{}\"", escape_literal(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{Scanner, TokenKind};

    fn decode(literal: &str) -> String {
        let mut scanner = Scanner::new(literal);
        let token = scanner.next_token();
        assert_eq!(scanner.next_token().kind, TokenKind::Eof);
        assert!(scanner.into_diagnostics().is_empty(), "literal {} did not lex cleanly", literal);
        match token.kind {
            TokenKind::String(s) => s,
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn test_short_escapes() {
        assert_eq!(
            escape_literal("hello\t\r\n\"world"),
            "hello\\t\\r\\n\\\"world"
        );
        assert_eq!(escape_literal("a\\b\0"), "a\\\\b\\0");
    }

    #[test]
    fn test_printable_ascii_passes_through() {
        let text = "<a href='/x?y=1&z=2'>{ok}</a> ~!@#$%^*()";
        assert_eq!(escape_literal(text), text);
    }

    #[test]
    fn test_other_characters_use_unicode_escapes() {
        assert_eq!(escape_literal("é"), "\\u{E9}");
        assert_eq!(escape_literal("\u{7f}\u{1b}"), "\\u{7F}\\u{1B}");
        assert_eq!(escape_literal("🚀"), "\\u{1F680}");
        assert_eq!(escape_literal("\u{2028}"), "\\u{2028}");
    }

    #[test]
    fn test_lexer_decodes_what_was_escaped() {
        let samples = [
            "",
            "hello\t\r\n\"world",
            "back\\slash \\n not a newline",
            "quotes ' and \"",
            "naïve café 日本語 🚀",
            "\0\u{1}\u{7f}\u{85}\u{feff}",
            "\r\n\r\n",
        ];
        for sample in samples {
            assert_eq!(decode(&string_literal(sample)), sample);
        }
    }
}
