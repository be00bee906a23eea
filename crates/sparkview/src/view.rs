// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compiled views and the instances created from them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::compiler::Program;
use crate::diagnostics::Diagnostic;
use crate::error::RenderError;
use crate::generator::{GeneratedView, HoistedGlobal};
use crate::runtime::{RenderContext, Value};
use crate::vm::VM;

/// What a [`ViewInstance`] does when rendered more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPolicy {
    /// A second render fails with [`RenderError::InstanceConsumed`].
    #[default]
    SingleUse,
    /// Every render after the first re-runs the global initializers.
    Reinitialize,
}

impl std::str::FromStr for RenderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_use" | "single-use" => Ok(RenderPolicy::SingleUse),
            "reinitialize" => Ok(RenderPolicy::Reinitialize),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug)]
struct ViewInner {
    generated: GeneratedView,
    program: Program,
    warnings: Vec<Diagnostic>,
    policy: RenderPolicy,
    output_capacity: usize,
}

/// An immutable, successfully compiled view.
///
/// Cloning is cheap and clones share the compiled program, so a view can be
/// cached and instantiated from any number of threads.
#[derive(Debug, Clone)]
pub struct CompiledView {
    inner: Arc<ViewInner>,
}

impl CompiledView {
    pub(crate) fn new(
        generated: GeneratedView,
        program: Program,
        warnings: Vec<Diagnostic>,
        policy: RenderPolicy,
        output_capacity: usize,
    ) -> Self {
        Self {
            inner: Arc::new(ViewInner {
                generated,
                program,
                warnings,
                policy,
                output_capacity,
            }),
        }
    }

    /// The view's name.
    pub fn name(&self) -> &str {
        &self.inner.generated.view_name
    }

    /// The generated view-script source.
    pub fn source(&self) -> &str {
        &self.inner.generated.source
    }

    /// The hoisted globals, in the order they are initialized.
    pub fn globals(&self) -> &[HoistedGlobal] {
        &self.inner.generated.globals
    }

    /// Generation output, including the source map.
    pub fn generated(&self) -> &GeneratedView {
        &self.inner.generated
    }

    /// The compiled program.
    pub fn program(&self) -> &Program {
        &self.inner.program
    }

    /// Warnings reported while compiling.
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.inner.warnings
    }

    /// The re-render policy instances follow.
    pub fn render_policy(&self) -> RenderPolicy {
        self.inner.policy
    }

    /// Creates an instance, running every global initializer first.
    pub fn create_instance(&self) -> Result<ViewInstance, RenderError> {
        let globals = VM::new(&self.inner.program).initialize()?;
        trace!(view = self.name(), globals = globals.len(), "created instance");
        Ok(ViewInstance {
            view: self.clone(),
            globals,
            rendered: false,
        })
    }

    /// Creates an instance and renders it once.
    pub fn render_once(&self, context: &RenderContext) -> Result<String, RenderError> {
        self.create_instance()?.render(context)
    }
}

/// One renderable instance of a [`CompiledView`], owning its globals.
///
/// Rendering takes `&mut self`, so one instance never renders twice at the
/// same time. Separate instances are independent.
#[derive(Debug)]
pub struct ViewInstance {
    view: CompiledView,
    globals: Vec<Value>,
    rendered: bool,
}

impl ViewInstance {
    /// The view this instance was created from.
    pub fn view(&self) -> &CompiledView {
        &self.view
    }

    /// Current value of a global, by name.
    pub fn global(&self, name: &str) -> Option<&Value> {
        let index = self.view.program().globals.iter().position(|g| g == name)?;
        self.globals.get(index)
    }

    /// Renders the view. Returns the whole output, or an error and no
    /// output at all.
    pub fn render(&mut self, context: &RenderContext) -> Result<String, RenderError> {
        let inner = &self.view.inner;
        if self.rendered {
            match inner.policy {
                RenderPolicy::SingleUse => return Err(RenderError::InstanceConsumed),
                RenderPolicy::Reinitialize => {
                    self.globals = VM::new(&inner.program).initialize()?;
                }
            }
        }
        self.rendered = true;

        trace!(view = self.view.name(), "render started");
        let mut out = String::with_capacity(inner.output_capacity);
        VM::new(&inner.program).render(&mut self.globals, context, &mut out)?;
        trace!(view = self.view.name(), bytes = out.len(), "render finished");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::pipeline::{ScriptBuilder, ViewBuilder};
    use crate::config::CompilerOptions;
    use crate::generator::generate;

    fn compile(chunks: &[Chunk], policy: RenderPolicy) -> CompiledView {
        let options = CompilerOptions::default().with_render_policy(policy);
        ScriptBuilder::new(&options)
            .build(&generate("test", chunks))
            .unwrap()
    }

    fn counter() -> Vec<Chunk> {
        vec![
            Chunk::global("n", "1"),
            Chunk::assign("n", "n + 1"),
            Chunk::expression("n"),
        ]
    }

    #[test]
    fn test_single_use_instance_refuses_second_render() {
        let view = compile(&counter(), RenderPolicy::SingleUse);
        let mut instance = view.create_instance().unwrap();
        let context = RenderContext::new();
        assert_eq!(instance.render(&context).unwrap(), "2");
        assert_eq!(instance.render(&context), Err(RenderError::InstanceConsumed));
    }

    #[test]
    fn test_reinitialize_resets_globals() {
        let view = compile(&counter(), RenderPolicy::Reinitialize);
        let mut instance = view.create_instance().unwrap();
        let context = RenderContext::new();
        assert_eq!(instance.render(&context).unwrap(), "2");
        assert_eq!(instance.render(&context).unwrap(), "2");
    }

    #[test]
    fn test_globals_visible_after_create() {
        let view = compile(&counter(), RenderPolicy::SingleUse);
        let instance = view.create_instance().unwrap();
        assert_eq!(instance.global("n"), Some(&Value::Number(1.0)));
        assert_eq!(instance.global("missing"), None);
    }

    #[test]
    fn test_failed_render_consumes_instance() {
        let view = compile(
            &[Chunk::view_data("Foo", "string"), Chunk::expression("Foo")],
            RenderPolicy::SingleUse,
        );
        let mut instance = view.create_instance().unwrap();
        assert!(matches!(
            instance.render(&RenderContext::new()),
            Err(RenderError::Binding(_))
        ));
        assert_eq!(
            instance.render(&RenderContext::new()),
            Err(RenderError::InstanceConsumed)
        );
    }

    #[test]
    fn test_render_policy_from_str() {
        assert_eq!("single_use".parse(), Ok(RenderPolicy::SingleUse));
        assert_eq!("reinitialize".parse(), Ok(RenderPolicy::Reinitialize));
        assert!("twice".parse::<RenderPolicy>().is_err());
    }

    #[test]
    fn test_compiled_view_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CompiledView>();
        assert_send_sync::<ViewInstance>();
    }
}
