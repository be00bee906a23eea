// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Parser for view-script source.
//!
//! Transforms a stream of tokens into an Abstract Syntax Tree (AST),
//! recovering from syntax errors so that every error in a unit is reported
//! in one pass.
//!
//! ## Usage
//!
//! ```rust
//! use sparkview::parser;
//!
//! let (unit, diagnostics) = parser::parse("view { render { write(1 + 2); } }");
//! assert!(diagnostics.is_empty());
//! assert_eq!(unit.render.body.len(), 1);
//! ```

mod parser;

pub use parser::Parser;

use crate::ast::ViewUnit;
use crate::diagnostics::Diagnostics;

/// Parses a whole unit, returning the tree and all lexical and syntax
/// diagnostics.
pub fn parse(source: &str) -> (ViewUnit, Diagnostics) {
    let mut parser = Parser::new(source);
    let unit = parser.parse_unit();
    (unit, parser.finish())
}
