// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # sparkview
//!
//! A view compiler: turns a tree of view chunks into a compiled view that
//! renders text.
//!
//! ## Overview
//!
//! Compiling a view happens in two phases:
//! - **Generation** writes the chunk tree out as view-script source, with
//!   every global hoisted into the unit header and a source map back to the
//!   originating chunks
//! - **Building** scans, parses, binds and compiles that source to bytecode,
//!   reporting every problem at once as a [`CompileError`]
//!
//! A [`CompiledView`] is immutable and shareable across threads. Each
//! [`ViewInstance`] created from it runs the global initializers once and
//! renders against a [`RenderContext`] holding the view data bag and any
//! ambient helper objects.
//!
//! ## Quick Start
//!
//! ```rust
//! use sparkview::{Chunk, RenderContext, ViewCompiler};
//!
//! let compiler = ViewCompiler::new();
//! let view = compiler
//!     .compile(&[
//!         Chunk::literal("<ul>"),
//!         Chunk::for_each(
//!             "var item in [3, 4, 5]",
//!             vec![
//!                 Chunk::literal("<li>"),
//!                 Chunk::expression("item"),
//!                 Chunk::literal("</li>"),
//!             ],
//!         ),
//!         Chunk::literal("</ul>"),
//!     ])
//!     .unwrap();
//!
//! let output = view.render_once(&RenderContext::new()).unwrap();
//! assert_eq!(output, "<ul><li>3</li><li>4</li><li>5</li></ul>");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod chunk;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod generator;
pub mod lexer;
mod macros;
pub mod parser;
pub mod pipeline;
pub mod runtime;
pub mod scope;
pub mod view;
pub mod vm;

#[cfg(feature = "async")]
pub mod async_render;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, instrument};

// Re-exports for convenience
pub use chunk::Chunk;
pub use config::CompilerOptions;
pub use diagnostics::{Diagnostic, Severity};
pub use error::{BindingError, CompileError, ConfigError, Error, RenderError, Result};
pub use generator::GeneratedView;
pub use pipeline::{ScriptBuilder, ViewBuilder};
pub use runtime::{HostObject, Record, RenderContext, TypeDecl, Value, ValueType, ViewData};
pub use view::{CompiledView, RenderPolicy, ViewInstance};

#[cfg(feature = "async")]
pub use async_render::AsyncViewCompiler;

/// Compiles chunk trees into views.
///
/// The builder `B` performs the build phase; [`ScriptBuilder`] is the
/// default.
#[derive(Debug, Clone)]
pub struct ViewCompiler<B = ScriptBuilder> {
    options: CompilerOptions,
    builder: B,
}

impl ViewCompiler {
    /// Creates a compiler with default options.
    pub fn new() -> Self {
        Self::with_options(CompilerOptions::default())
    }

    /// Creates a compiler with the given options.
    pub fn with_options(options: CompilerOptions) -> Self {
        let builder = ScriptBuilder::new(&options);
        Self { options, builder }
    }
}

impl Default for ViewCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ViewBuilder> ViewCompiler<B> {
    /// Creates a compiler that builds with a custom builder.
    pub fn with_builder(options: CompilerOptions, builder: B) -> Self {
        Self { options, builder }
    }

    /// The options this compiler was created with.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Runs the generation phase only.
    pub fn generate(&self, chunks: &[Chunk]) -> GeneratedView {
        generator::generate(&self.options.view_name, chunks)
    }

    /// Compiles a chunk tree.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sparkview::{Chunk, ViewCompiler};
    ///
    /// let error = ViewCompiler::new()
    ///     .compile(&[Chunk::expression("missing")])
    ///     .unwrap_err();
    /// assert!(error.has_code("SV0103"));
    /// ```
    #[instrument(skip_all, fields(view = %self.options.view_name, chunks = chunk::count_chunks(chunks)))]
    pub fn compile(&self, chunks: &[Chunk]) -> std::result::Result<CompiledView, CompileError> {
        let generated = self.generate(chunks);
        debug!(
            bytes = generated.source.len(),
            globals = generated.globals.len(),
            "generated source"
        );
        self.builder.build(&generated)
    }

    /// Compiles a chunk tree given as JSON.
    pub fn compile_json(&self, json: &str) -> Result<CompiledView> {
        let chunks = chunk::chunks_from_json(json)?;
        Ok(self.compile(&chunks)?)
    }

    /// Compiles independent chunk trees in parallel. Results are in input
    /// order.
    #[cfg(feature = "parallel")]
    pub fn compile_many<T>(&self, trees: &[T]) -> Vec<std::result::Result<CompiledView, CompileError>>
    where
        T: AsRef<[Chunk]> + Sync,
    {
        trees
            .par_iter()
            .map(|tree| self.compile(tree.as_ref()))
            .collect()
    }
}
