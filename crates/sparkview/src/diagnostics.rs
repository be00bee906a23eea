// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compiler diagnostics and source positions.

use std::fmt;

use crate::lexer::Span;

/// Diagnostic codes reported by the view compiler.
pub mod codes {
    /// A name does not exist in the current context.
    pub const UNKNOWN_NAME: &str = "SV0103";
    /// A local hides a global of the same name.
    pub const LOCAL_HIDES_GLOBAL: &str = "SV0108";
    /// A global is declared more than once.
    pub const DUPLICATE_GLOBAL: &str = "SV0102";
    /// A local is declared twice in the same scope.
    pub const DUPLICATE_LOCAL: &str = "SV0128";
    /// Call target is not a method.
    pub const METHOD_NAME_EXPECTED: &str = "SV0149";
    /// Global initializer references a variable.
    pub const INITIALIZER_REFERENCE: &str = "SV0236";
    /// Type name could not be found.
    pub const UNKNOWN_TYPE: &str = "SV0246";
    /// Left-hand side of an assignment is not a variable.
    pub const INVALID_ASSIGNMENT_TARGET: &str = "SV0131";
    /// Expression used as a statement.
    pub const NOT_A_STATEMENT: &str = "SV0201";
    /// Member is not defined on a record type.
    pub const UNKNOWN_MEMBER: &str = "SV1061";
    /// `;` expected.
    pub const SEMICOLON_EXPECTED: &str = "SV1002";
    /// Token expected.
    pub const TOKEN_EXPECTED: &str = "SV1003";
    /// Unrecognized escape sequence.
    pub const BAD_ESCAPE: &str = "SV1009";
    /// Newline in string constant.
    pub const NEWLINE_IN_CONSTANT: &str = "SV1010";
    /// Unterminated string.
    pub const UNTERMINATED_STRING: &str = "SV1039";
    /// Unexpected character.
    pub const UNEXPECTED_CHARACTER: &str = "SV1056";
    /// Invalid expression term.
    pub const INVALID_TERM: &str = "SV1525";
    /// Expression nesting is too deep to compile.
    pub const EXPRESSION_TOO_COMPLEX: &str = "SV8078";
    /// The view needs more constants, slots or instructions than bytecode
    /// operands can address.
    pub const VIEW_TOO_LARGE: &str = "SV8103";
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fails the compilation
    Error,
    /// Reported but does not fail the compilation
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// A single message from the underlying compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Stable code such as `SV0103`
    pub code: &'static str,
    /// Human readable message
    pub message: String,
    /// Byte range in the generated source
    pub span: Span,
    /// 1-based line in the generated source
    pub line: usize,
    /// 1-based column in the generated source
    pub column: usize,
    /// Index path of the chunk that produced the line, when known
    pub chunk: Option<Vec<usize>>,
}

impl Diagnostic {
    /// Creates an error diagnostic. Position fields are filled in later by
    /// [`Diagnostics::locate`].
    pub fn error(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            span,
            line: 0,
            column: 0,
            chunk: None,
        }
    }

    /// Creates a warning diagnostic.
    pub fn warning(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message, span)
        }
    }

    /// Returns true for error severity.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{}): {} {}: {}",
            self.line, self.column, self.severity, self.code, self.message
        )?;
        if let Some(path) = &self.chunk {
            let path: Vec<String> = path.iter().map(|i| i.to_string()).collect();
            write!(f, " [chunk {}]", path.join("."))?;
        }
        Ok(())
    }
}

/// Maps byte offsets to line and column numbers.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Indexes `source`.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .char_indices()
                .filter(|(_, ch)| *ch == '\n')
                .map(|(pos, _)| pos + 1),
        );
        Self { line_starts }
    }

    /// Returns the 1-based (line, column) of a byte offset. Columns count
    /// bytes.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        (line + 1, offset - self.line_starts[line] + 1)
    }
}

/// An ordered collection of diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Adds an error diagnostic.
    pub fn error(&mut self, code: &'static str, message: impl Into<String>, span: Span) {
        self.push(Diagnostic::error(code, message, span));
    }

    /// Moves all diagnostics from `other` into this collection.
    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Returns true if any diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    /// Number of error diagnostics.
    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    /// Returns true if there are no diagnostics.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Fills in line, column and chunk path for every diagnostic, then
    /// orders them by position.
    pub fn locate(&mut self, source: &str, chunk_at_line: impl Fn(usize) -> Option<Vec<usize>>) {
        let index = LineIndex::new(source);
        for diagnostic in &mut self.items {
            let (line, column) = index.position(diagnostic.span.start.min(source.len()));
            diagnostic.line = line;
            diagnostic.column = column;
            diagnostic.chunk = chunk_at_line(line);
        }
        self.items.sort_by_key(|d| (d.span.start, d.span.end));
    }

    /// Consumes the collection.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }

    /// Iterates over the diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index_positions() {
        let index = LineIndex::new("ab\ncd\n\nef");
        assert_eq!(index.position(0), (1, 1));
        assert_eq!(index.position(1), (1, 2));
        assert_eq!(index.position(3), (2, 1));
        assert_eq!(index.position(6), (3, 1));
        assert_eq!(index.position(8), (4, 2));
    }

    #[test]
    fn test_locate_sorts_and_fills_positions() {
        let source = "view {\n  x;\n  y;\n}";
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(codes::UNKNOWN_NAME, "y", Span::new(14, 15));
        diagnostics.error(codes::UNKNOWN_NAME, "x", Span::new(9, 10));
        diagnostics.locate(source, |line| Some(vec![line]));

        let items = diagnostics.into_vec();
        assert_eq!(items[0].message, "x");
        assert_eq!((items[0].line, items[0].column), (2, 3));
        assert_eq!(items[1].chunk, Some(vec![3]));
    }

    #[test]
    fn test_display_includes_code_and_chunk() {
        let mut diagnostic = Diagnostic::error(codes::UNKNOWN_NAME, "boom", Span::new(0, 1));
        diagnostic.line = 4;
        diagnostic.column = 9;
        diagnostic.chunk = Some(vec![2, 0]);
        assert_eq!(diagnostic.to_string(), "(4,9): error SV0103: boom [chunk 2.0]");
    }

    #[test]
    fn test_warnings_do_not_count_as_errors() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::warning(codes::UNKNOWN_NAME, "w", Span::new(0, 0)));
        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.error_count(), 0);
    }
}
