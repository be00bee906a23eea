// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Binding and code generation from AST to bytecode.
//!
//! The `Compiler` resolves every name in a parsed unit through a
//! [`ScopeTracker`] and emits two bytecode chunks: the global initializers
//! and the render body. Problems are collected as diagnostics rather than
//! returned early, so one compilation reports all of them.

mod expressions;

#[cfg(test)]
mod tests;

use tracing::trace;

use crate::ast::*;
use crate::compiler::bytecode::{Bytecode, Instruction, OpCode, Operand, Program, jump_target};
use crate::diagnostics::{Diagnostic, Diagnostics, codes};
use crate::lexer::Span;
use crate::runtime::context::VIEW_DATA;
use crate::runtime::{TypeRegistry, Value, ValueType};
use crate::scope::{Binding, ScopeError, ScopeTracker};

/// Compiles a view unit to a [`Program`].
pub struct Compiler<'a> {
    /// The bytecode being generated
    bytecode: Bytecode,
    /// Variable resolution
    scope: ScopeTracker,
    /// Named types available to `as`
    types: &'a TypeRegistry,
    /// Names resolved from the render context
    ambient: &'a [String],
    /// Type table shared by both chunks
    type_table: Vec<ValueType>,
    diagnostics: Diagnostics,
    /// Set while compiling a global initializer
    in_initializer: bool,
}

impl<'a> Compiler<'a> {
    /// Creates a compiler. `ambient` lists the context names expressions
    /// may reference besides `ViewData`.
    pub fn new(types: &'a TypeRegistry, ambient: &'a [String]) -> Self {
        Self {
            bytecode: Bytecode::new(),
            scope: ScopeTracker::new(),
            types,
            ambient,
            type_table: Vec::new(),
            diagnostics: Diagnostics::new(),
            in_initializer: false,
        }
    }

    // ========================================================================
    // Main Compilation Entry Point
    // ========================================================================

    /// Compiles a unit. The program is only meaningful when the returned
    /// diagnostics contain no errors.
    pub fn compile(mut self, unit: &ViewUnit) -> (Program, Diagnostics) {
        let init = self.compile_globals(&unit.globals);

        self.scope.push_frame();
        self.compile_block_body(&unit.render);
        self.scope.pop_frame();
        self.emit(Instruction::simple(OpCode::Halt));
        let render = std::mem::take(&mut self.bytecode);

        for chunk in [&init, &render] {
            if !chunk.is_addressable() {
                self.limit_exceeded("instructions", Span::default());
            }
        }

        let program = Program {
            init,
            render,
            globals: self.scope.globals().iter().map(|g| g.name.clone()).collect(),
            frame_size: self.scope.max_slots(),
            types: self.type_table,
        };
        (program, self.diagnostics)
    }

    /// Declares every global, then compiles the initializers in
    /// declaration order. Initializers may not reference any name.
    fn compile_globals(&mut self, globals: &[GlobalDeclaration]) -> Bytecode {
        let mut slots = Vec::with_capacity(globals.len());
        for global in globals {
            match self.scope.declare_global(&global.id.name, None) {
                Ok(index) => slots.push(Some(index)),
                Err(error) => {
                    self.scope_error(error, global.id.span);
                    slots.push(None);
                }
            }
        }

        self.in_initializer = true;
        for (global, slot) in globals.iter().zip(slots) {
            let Some(index) = slot else { continue };
            self.compile_expression(&global.init);
            let index = self.operand(index, "globals", global.id.span);
            self.emit(Instruction::with_operand(OpCode::StoreGlobal, Operand::Global(index)));
        }
        self.in_initializer = false;

        self.emit(Instruction::simple(OpCode::Halt));
        std::mem::take(&mut self.bytecode)
    }

    // ========================================================================
    // Statement Compilation
    // ========================================================================

    fn compile_block_body(&mut self, block: &Block) {
        for statement in &block.body {
            self.compile_statement(statement);
        }
    }

    fn compile_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::VariableDeclaration(decl) => self.compile_variable_declaration(decl),
            Statement::Assignment(assignment) => self.compile_assignment(assignment),
            Statement::Write(argument) => {
                self.compile_expression(argument);
                self.emit(Instruction::simple(OpCode::Write));
            }
            Statement::Foreach(foreach) => self.compile_foreach(foreach),
            Statement::Block(block) => {
                self.scope.push_frame();
                self.compile_block_body(block);
                self.scope.pop_frame();
            }
            Statement::Empty => {}
        }
    }

    fn compile_variable_declaration(&mut self, decl: &VariableDeclaration) {
        // The initializer is compiled before the name is in scope.
        self.compile_expression(&decl.init);
        let static_type = self.static_type_of(&decl.init);
        if let Some(slot) = self.declare_local(&decl.id, static_type) {
            let slot = self.operand(slot, "locals", decl.id.span);
            self.emit(Instruction::with_operand(OpCode::StoreLocal, Operand::Local(slot)));
        } else {
            self.emit(Instruction::simple(OpCode::Pop));
        }
    }

    fn compile_assignment(&mut self, assignment: &Assignment) {
        self.compile_expression(&assignment.value);
        let target = &assignment.target;

        let instruction = match self.scope.resolve(&target.name) {
            Some(Binding::Local(slot)) => {
                let slot = self.operand(slot, "locals", target.span);
                Instruction::with_operand(OpCode::StoreLocal, Operand::Local(slot))
            }
            Some(Binding::Global(index)) => {
                let index = self.operand(index, "globals", target.span);
                Instruction::with_operand(OpCode::StoreGlobal, Operand::Global(index))
            }
            None => {
                if self.is_ambient(&target.name) {
                    self.error(
                        codes::INVALID_ASSIGNMENT_TARGET,
                        format!("Property or indexer '{}' cannot be assigned to -- it is read only", target.name),
                        target.span,
                    );
                } else {
                    self.unknown_name(&target.name, target.span);
                }
                Instruction::simple(OpCode::Pop)
            }
        };
        self.emit(instruction);
    }

    /// Lowers `foreach (x in seq) { body }` to:
    ///
    /// ```text
    ///         <seq>
    ///         IterInit
    /// top:    IterNext end
    ///         StoreLocal x
    ///         <body>
    ///         Jump top
    /// end:
    /// ```
    fn compile_foreach(&mut self, foreach: &ForeachStatement) {
        self.compile_expression(&foreach.iterable);
        self.emit(Instruction::simple(OpCode::IterInit));

        let loop_start = self.bytecode.instructions.len();
        let next = self.emit(Instruction::with_operand(OpCode::IterNext, Operand::Jump(0)));

        // The loop variable and the body's own locals share one frame.
        self.scope.push_frame();
        match self.declare_local(&foreach.binding, None) {
            Some(slot) => {
                let slot = self.operand(slot, "locals", foreach.binding.span);
                self.emit(Instruction::with_operand(OpCode::StoreLocal, Operand::Local(slot)))
            }
            None => self.emit(Instruction::simple(OpCode::Pop)),
        };
        self.compile_block_body(&foreach.body);
        self.scope.pop_frame();

        self.emit(Instruction::with_operand(
            OpCode::Jump,
            Operand::Jump(jump_target(loop_start)),
        ));
        self.bytecode.patch_jump(next);
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn declare_local(&mut self, id: &Identifier, static_type: Option<ValueType>) -> Option<usize> {
        let shadows_global = self.scope.is_global(&id.name)
            && matches!(self.scope.resolve(&id.name), Some(Binding::Global(_)));

        match self.scope.declare_local(&id.name, static_type) {
            Ok(slot) => {
                if shadows_global {
                    self.diagnostics.push(Diagnostic::warning(
                        codes::LOCAL_HIDES_GLOBAL,
                        format!("Local '{}' hides the global of the same name", id.name),
                        id.span,
                    ));
                }
                trace!(name = id.name.as_str(), slot, "declared local");
                Some(slot)
            }
            Err(error) => {
                self.scope_error(error, id.span);
                None
            }
        }
    }

    fn scope_error(&mut self, error: ScopeError, span: Span) {
        let code = match error {
            ScopeError::DuplicateGlobal(_) => codes::DUPLICATE_GLOBAL,
            ScopeError::DuplicateLocal(_) | ScopeError::NoFrame(_) => codes::DUPLICATE_LOCAL,
        };
        self.error(code, error.to_string(), span);
    }

    fn is_ambient(&self, name: &str) -> bool {
        name == VIEW_DATA || self.ambient.iter().any(|ambient| ambient == name)
    }

    fn unknown_name(&mut self, name: &str, span: Span) {
        self.error(
            codes::UNKNOWN_NAME,
            format!("The name '{}' does not exist in the current context", name),
            span,
        );
    }

    /// Narrows an index to an operand, reporting an overflow.
    fn operand(&mut self, index: usize, what: &str, span: Span) -> u32 {
        u32::try_from(index).unwrap_or_else(|_| {
            self.limit_exceeded(what, span);
            0
        })
    }

    fn constant(&mut self, value: Value, span: Span) -> u32 {
        match self.bytecode.add_constant(value) {
            Some(index) => index,
            None => {
                self.limit_exceeded("constants", span);
                0
            }
        }
    }

    fn name(&mut self, name: &str, span: Span) -> u32 {
        match self.bytecode.add_name(name) {
            Some(index) => index,
            None => {
                self.limit_exceeded("constants", span);
                0
            }
        }
    }

    fn limit_exceeded(&mut self, what: &str, span: Span) {
        self.error(
            codes::VIEW_TOO_LARGE,
            format!("The view has too many {} to compile", what),
            span,
        );
    }

    fn error(&mut self, code: &'static str, message: String, span: Span) {
        self.diagnostics.error(code, message, span);
    }

    fn emit(&mut self, instruction: Instruction) -> usize {
        self.bytecode.emit(instruction)
    }
}
