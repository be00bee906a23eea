// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The chunk instruction set consumed by the view compiler.
//!
//! A view arrives as an ordered sequence of [`Chunk`]s, produced by a markup
//! parser outside this crate. `ForEach` is the only chunk that nests another
//! sequence. Chunks carry expression fragments as plain strings; they are
//! passed through to the generated source untouched.

use serde::{Deserialize, Serialize};

/// One instruction node of a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Chunk {
    /// Emits `text` exactly as given.
    SendLiteral {
        /// The raw text
        text: String,
    },
    /// Emits the string form of evaluating `code`.
    SendExpression {
        /// Expression fragment
        code: String,
    },
    /// Declares a variable visible until the end of the enclosing block.
    LocalVariable {
        /// Variable name
        name: String,
        /// Initializer fragment
        value: String,
    },
    /// Declares an instance variable, initialized before rendering starts.
    GlobalVariable {
        /// Variable name
        name: String,
        /// Initializer fragment
        value: String,
    },
    /// Assigns to an already visible variable at this point in the sequence.
    AssignVariable {
        /// Target variable name
        name: String,
        /// Value fragment
        value: String,
    },
    /// Repeats `body` for every element of a sequence.
    ForEach {
        /// Loop fragment, such as `item in items` or `var item in items`
        code: String,
        /// Chunks executed once per element
        body: Vec<Chunk>,
    },
    /// Declares a local bound to the view data entry `name`.
    ViewData {
        /// Key in the view data bag, also the local's name
        name: String,
        /// Declared type of the entry
        #[serde(rename = "type")]
        type_name: String,
    },
    /// Declares the type of the view data's primary value.
    ViewDataModel {
        /// Declared type of the model
        model_type: String,
    },
}

impl Chunk {
    /// Creates a `SendLiteral` chunk.
    pub fn literal(text: impl Into<String>) -> Self {
        Chunk::SendLiteral { text: text.into() }
    }

    /// Creates a `SendExpression` chunk.
    pub fn expression(code: impl Into<String>) -> Self {
        Chunk::SendExpression { code: code.into() }
    }

    /// Creates a `LocalVariable` chunk.
    pub fn local(name: impl Into<String>, value: impl Into<String>) -> Self {
        Chunk::LocalVariable {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Creates a `GlobalVariable` chunk.
    pub fn global(name: impl Into<String>, value: impl Into<String>) -> Self {
        Chunk::GlobalVariable {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Creates an `AssignVariable` chunk.
    pub fn assign(name: impl Into<String>, value: impl Into<String>) -> Self {
        Chunk::AssignVariable {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Creates a `ForEach` chunk.
    pub fn for_each(code: impl Into<String>, body: Vec<Chunk>) -> Self {
        Chunk::ForEach {
            code: code.into(),
            body,
        }
    }

    /// Creates a `ViewData` chunk.
    pub fn view_data(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Chunk::ViewData {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    /// Creates a `ViewDataModel` chunk.
    pub fn view_data_model(model_type: impl Into<String>) -> Self {
        Chunk::ViewDataModel {
            model_type: model_type.into(),
        }
    }

    /// Returns the nested chunks of a `ForEach`, or an empty slice.
    pub fn children(&self) -> &[Chunk] {
        match self {
            Chunk::ForEach { body, .. } => body,
            _ => &[],
        }
    }

    /// Short name of the variant, used in generated comments and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Chunk::SendLiteral { .. } => "SendLiteral",
            Chunk::SendExpression { .. } => "SendExpression",
            Chunk::LocalVariable { .. } => "LocalVariable",
            Chunk::GlobalVariable { .. } => "GlobalVariable",
            Chunk::AssignVariable { .. } => "AssignVariable",
            Chunk::ForEach { .. } => "ForEach",
            Chunk::ViewData { .. } => "ViewData",
            Chunk::ViewDataModel { .. } => "ViewDataModel",
        }
    }
}

/// Counts every chunk in a tree, nested bodies included.
pub fn count_chunks(chunks: &[Chunk]) -> usize {
    chunks
        .iter()
        .map(|chunk| 1 + count_chunks(chunk.children()))
        .sum()
}

/// Parses a chunk tree from its JSON form.
pub fn chunks_from_json(json: &str) -> Result<Vec<Chunk>, serde_json::Error> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_nested_chunks() {
        let chunks = vec![
            Chunk::literal("<ul>"),
            Chunk::for_each(
                "item in items",
                vec![Chunk::literal("<li>"), Chunk::expression("item")],
            ),
            Chunk::literal("</ul>"),
        ];
        assert_eq!(count_chunks(&chunks), 5);
    }

    #[test]
    fn test_children_of_leaf_is_empty() {
        assert!(Chunk::literal("x").children().is_empty());
    }

    #[test]
    fn test_json_uses_kind_tag() {
        let json = r#"[
            {"kind": "view_data", "name": "Foo", "type": "string"},
            {"kind": "send_expression", "code": "Foo"}
        ]"#;
        let chunks = chunks_from_json(json).unwrap();
        assert_eq!(chunks[0], Chunk::view_data("Foo", "string"));
        assert_eq!(chunks[1], Chunk::expression("Foo"));
    }

    #[test]
    fn test_json_nested_for_each() {
        let chunks = vec![Chunk::for_each("x in xs", vec![Chunk::expression("x")])];
        let json = serde_json::to_string(&chunks).unwrap();
        assert!(json.contains(r#""kind":"for_each""#));
        assert_eq!(chunks_from_json(&json).unwrap(), chunks);
    }
}
