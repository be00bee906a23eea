// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for compiling and rendering views.

use std::fmt;

use thiserror::Error;

use crate::diagnostics::Diagnostic;

/// Result type for view operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure surfaced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The view failed to compile
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The view failed while rendering
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Options could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A chunk tree could not be decoded
    #[error("Invalid chunk tree: {0}")]
    Chunks(#[from] serde_json::Error),

    /// A chunk tree file could not be read
    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),

    /// A background compile or render task did not complete
    #[error("Background task failed: {0}")]
    Task(String),
}

/// Compilation failed. Carries every diagnostic the underlying compiler
/// produced and the generated source they refer to.
#[derive(Debug, Clone)]
pub struct CompileError {
    /// Name of the view being compiled
    pub view: String,
    /// All diagnostics, ordered by source position
    pub diagnostics: Vec<Diagnostic>,
    /// The generated source text
    pub generated: String,
}

impl CompileError {
    /// Error diagnostics only.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    /// Returns true if some diagnostic carries `code`.
    pub fn has_code(&self, code: &str) -> bool {
        self.diagnostics.iter().any(|d| d.code == code)
    }

    /// Renders the generated source with line numbers, for logs.
    pub fn source_listing(&self) -> String {
        let width = self.generated.lines().count().to_string().len();
        self.generated
            .lines()
            .enumerate()
            .map(|(i, line)| format!("{:>width$} | {}\n", i + 1, line, width = width))
            .collect()
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.errors().count();
        write!(
            f,
            "view '{}' failed to compile with {} error{}",
            self.view,
            count,
            if count == 1 { "" } else { "s" }
        )?;
        for diagnostic in &self.diagnostics {
            write!(f, "\n{}{}", self.view, diagnostic)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// A view data lookup failed at render time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    /// The data bag has no entry for the key
    #[error("view data has no entry '{key}'")]
    MissingKey {
        /// Requested key
        key: String,
    },

    /// The data bag has no primary value
    #[error("view data has no model")]
    MissingModel,

    /// The entry exists but does not conform to the declared type
    #[error("view data '{key}' is {found}, expected {expected}")]
    TypeMismatch {
        /// Requested key (`Model` for the primary value)
        key: String,
        /// Declared type
        expected: String,
        /// Runtime type of the entry
        found: String,
    },
}

/// A render failed. Renders never return partial output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// View data binding failed
    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),

    /// An ambient name the view was compiled against is not in the context
    #[error("render context does not provide '{0}'")]
    MissingAmbient(String),

    /// An operation was applied to values of the wrong type
    #[error("TypeError: {0}")]
    Type(String),

    /// A member was read from null
    #[error("NullReference: cannot read '{0}' of null")]
    NullReference(String),

    /// A member does not exist on a value
    #[error("'{type_name}' does not contain a definition for '{member}'")]
    UnknownMember {
        /// Runtime type of the receiver
        type_name: String,
        /// Requested member
        member: String,
    },

    /// A `foreach` source is not a sequence
    #[error("foreach cannot iterate over {0}")]
    NotIterable(String),

    /// A host object reported a failure
    #[error("{method} failed: {message}")]
    Host {
        /// Method name
        method: String,
        /// Host message
        message: String,
    },

    /// The instance already rendered and the policy forbids re-rendering
    #[error("view instance has already rendered")]
    InstanceConsumed,

    /// Inconsistent bytecode
    #[error("InternalError: {0}")]
    Internal(String),
}

/// Options could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON
    #[error("Invalid options: {0}")]
    Json(#[from] serde_json::Error),

    /// A key/value pair has an invalid value
    #[error("Invalid value '{value}' for option '{key}'")]
    InvalidValue {
        /// Option key
        key: String,
        /// Rejected value
        value: String,
    },

    /// Unknown option key
    #[error("Unknown option '{0}'")]
    UnknownKey(String),
}
