// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Asynchronous compile and render APIs.
//!
//! Compiling and rendering are CPU-bound, so these wrappers move the work
//! onto tokio's blocking pool instead of stalling the async executor.
//!
//! # Example
//!
//! ```ignore
//! use sparkview::{AsyncViewCompiler, RenderContext};
//!
//! #[tokio::main]
//! async fn main() {
//!     let compiler = AsyncViewCompiler::default();
//!     let view = compiler.compile_file("views/index.json").await.unwrap();
//!     println!("{}", compiler.render(&view, RenderContext::new()).await.unwrap());
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tokio::task;
use tracing::debug;

use crate::chunk::{Chunk, chunks_from_json};
use crate::config::CompilerOptions;
use crate::error::{Error, Result};
use crate::runtime::RenderContext;
use crate::view::CompiledView;
use crate::ViewCompiler;

/// A view compiler for async callers.
#[derive(Debug, Clone)]
pub struct AsyncViewCompiler {
    compiler: Arc<ViewCompiler>,
}

impl AsyncViewCompiler {
    /// Creates an async compiler with the given options.
    pub fn new(options: CompilerOptions) -> Self {
        Self {
            compiler: Arc::new(ViewCompiler::with_options(options)),
        }
    }

    /// The underlying synchronous compiler.
    pub fn compiler(&self) -> &ViewCompiler {
        &self.compiler
    }

    /// Compiles a chunk tree on the blocking pool.
    pub async fn compile(&self, chunks: Vec<Chunk>) -> Result<CompiledView> {
        let compiler = self.compiler.clone();
        let view = task::spawn_blocking(move || compiler.compile(&chunks))
            .await
            .map_err(|e| Error::Task(e.to_string()))??;
        Ok(view)
    }

    /// Reads a JSON chunk tree from disk and compiles it.
    pub async fn compile_file(&self, path: impl AsRef<Path>) -> Result<CompiledView> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).await?;
        debug!(path = %path.display(), bytes = json.len(), "read chunk tree");
        self.compile(chunks_from_json(&json)?).await
    }

    /// Renders a fresh instance of `view` on the blocking pool.
    pub async fn render(&self, view: &CompiledView, context: RenderContext) -> Result<String> {
        let view = view.clone();
        let output = task::spawn_blocking(move || view.render_once(&context))
            .await
            .map_err(|e| Error::Task(e.to_string()))??;
        Ok(output)
    }

    /// Renders one instance per context concurrently. Results are in
    /// context order.
    pub async fn render_all(
        &self,
        view: &CompiledView,
        contexts: Vec<RenderContext>,
    ) -> Vec<Result<String>> {
        let renders: Vec<_> = contexts
            .into_iter()
            .map(|context| self.render(view, context))
            .collect();

        futures::future::join_all(renders).await
    }
}

impl Default for AsyncViewCompiler {
    fn default() -> Self {
        Self::new(CompilerOptions::default())
    }
}
