// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The build pipeline: generated source in, compiled view out.
//!
//! [`ScriptBuilder`] runs the scanner, parser and compiler over the
//! generated view script, collecting diagnostics from every stage. A build
//! either yields a [`CompiledView`] or fails with a single
//! [`CompileError`] carrying every diagnostic, located by line, column and
//! originating chunk.

use tracing::{debug, instrument};

use crate::compiler::Compiler;
use crate::config::CompilerOptions;
use crate::error::CompileError;
use crate::generator::GeneratedView;
use crate::parser::Parser;
use crate::runtime::TypeRegistry;
use crate::view::{CompiledView, RenderPolicy};

/// Turns generated source into a compiled view.
pub trait ViewBuilder: Send + Sync {
    /// Compiles `generated`. Never returns a partially compiled view.
    fn build(&self, generated: &GeneratedView) -> Result<CompiledView, CompileError>;
}

/// The view-script builder.
#[derive(Debug, Clone)]
pub struct ScriptBuilder {
    types: TypeRegistry,
    ambient: Vec<String>,
    policy: RenderPolicy,
    output_capacity: usize,
}

impl ScriptBuilder {
    /// Creates a builder configured by `options`.
    pub fn new(options: &CompilerOptions) -> Self {
        Self {
            types: options.type_registry(),
            ambient: options.ambient.clone(),
            policy: options.render_policy,
            output_capacity: options.output_capacity,
        }
    }
}

impl Default for ScriptBuilder {
    fn default() -> Self {
        Self::new(&CompilerOptions::default())
    }
}

impl ViewBuilder for ScriptBuilder {
    #[instrument(skip_all, fields(view = %generated.view_name))]
    fn build(&self, generated: &GeneratedView) -> Result<CompiledView, CompileError> {
        let source = generated.source.as_str();

        let mut parser = Parser::new(source);
        let unit = parser.parse_unit();
        let mut diagnostics = parser.finish();
        let syntax_errors = diagnostics.error_count();

        // Binding still runs after syntax errors so one build reports both.
        let (program, binding) = Compiler::new(&self.types, &self.ambient).compile(&unit);
        diagnostics.extend(binding);
        diagnostics.locate(source, |line| {
            generated.source_map.chunk_at(line).map(<[usize]>::to_vec)
        });

        debug!(
            syntax_errors,
            errors = diagnostics.error_count(),
            init = program.init.instructions.len(),
            render = program.render.instructions.len(),
            "built view"
        );

        if diagnostics.has_errors() {
            return Err(CompileError {
                view: generated.view_name.clone(),
                diagnostics: diagnostics.into_vec(),
                generated: generated.source.clone(),
            });
        }

        Ok(CompiledView::new(
            generated.clone(),
            program,
            diagnostics.into_vec(),
            self.policy,
            self.output_capacity,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::diagnostics::codes;
    use crate::generator::generate;
    use crate::runtime::RenderContext;

    fn build(chunks: &[Chunk]) -> Result<CompiledView, CompileError> {
        ScriptBuilder::default().build(&generate("test", chunks))
    }

    #[test]
    fn test_build_and_render() {
        let view = build(&[Chunk::literal("a"), Chunk::expression("1 + 1")]).unwrap();
        assert_eq!(view.render_once(&RenderContext::new()).unwrap(), "a2");
        assert!(view.warnings().is_empty());
    }

    #[test]
    fn test_errors_carry_chunk_path_and_position() {
        let error = build(&[
            Chunk::literal("<ul>"),
            Chunk::for_each("var x in items", vec![Chunk::expression("x")]),
        ])
        .unwrap_err();

        let diagnostic = error.errors().next().unwrap();
        assert_eq!(diagnostic.code, codes::UNKNOWN_NAME);
        assert!(diagnostic.message.contains("items"));
        assert_eq!(diagnostic.chunk, Some(vec![1]));
        assert!(diagnostic.line > 1);
        assert!(error.generated.contains("foreach (var x in items)"));
    }

    #[test]
    fn test_syntax_and_binding_errors_reported_together() {
        let error = build(&[Chunk::expression("1 +"), Chunk::expression("nope")]).unwrap_err();
        assert!(error.has_code(codes::INVALID_TERM));
        assert!(error.has_code(codes::UNKNOWN_NAME));
        assert_eq!(error.errors().count(), 2);
    }

    #[test]
    fn test_warnings_do_not_fail_the_build() {
        let view = build(&[
            Chunk::global("a", "1"),
            Chunk::for_each("var a in [2]", vec![Chunk::expression("a")]),
        ])
        .unwrap();
        assert_eq!(view.warnings().len(), 1);
        assert_eq!(view.warnings()[0].code, codes::LOCAL_HIDES_GLOBAL);
        assert_eq!(view.render_once(&RenderContext::new()).unwrap(), "2");
    }

    #[test]
    fn test_ambient_names_come_from_options() {
        let chunks = [Chunk::expression("Html")];
        assert!(build(&chunks).is_err());
        let options = CompilerOptions::default().with_ambient("Html");
        assert!(ScriptBuilder::new(&options).build(&generate("t", &chunks)).is_ok());
    }
}
