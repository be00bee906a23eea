// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Expression compilation.
//!
//! Expressions compile to bytecode that leaves exactly one value on the
//! stack.
//!
//! | Expression | Key Operations | Stack Effect |
//! |------------|----------------|--------------|
//! | Literal | `LoadConst` | Push value |
//! | Identifier | `LoadLocal`/`LoadGlobal`/`LoadAmbient` | Push value |
//! | Binary | `Add`/`Sub`/etc | Pop 2, push 1 |
//! | Unary | `Neg`/`Not` | Pop 1, push 1 |
//! | Member | `GetMember` | Pop 1, push 1 |
//! | Index | `GetIndex` | Pop 2, push 1 |
//! | Call | `CallMethod` | Pop N+1, push result |
//! | Array | `NewList` | Pop N, push 1 |
//! | Conditional | `JumpIfFalse`, `Jump` | Pop 1, push 1 |
//! | `as` | `Convert`, `BindViewData`, `BindModel` | Pop 0 or 1, push 1 |
//!
//! `ViewData["key"] as T` and `ViewData.Model as T` are not compiled as a
//! read followed by a conversion: they lower to a single binding
//! instruction that performs the typed lookup and reports a missing or
//! mismatched entry as a binding error.

use super::Compiler;
use crate::ast::*;
use crate::compiler::bytecode::{Instruction, OpCode, Operand};
use crate::diagnostics::codes;
use crate::lexer::Span;
use crate::runtime::context::{MODEL, VIEW_DATA};
use crate::runtime::{Value, ValueType};
use crate::scope::Binding;

impl Compiler<'_> {
    pub(super) fn compile_expression(&mut self, expr: &Expression) {
        // Subtrees are never deeper than their root, so checking here bounds
        // the recursion below.
        if expr.depth() > MAX_EXPRESSION_DEPTH {
            self.error(
                codes::EXPRESSION_TOO_COMPLEX,
                "An expression is too long or complex to compile".to_string(),
                expr.span,
            );
            self.emit(Instruction::simple(OpCode::LoadNull));
            return;
        }

        match &expr.kind {
            ExpressionKind::Literal(literal) => self.compile_literal(literal, expr),
            ExpressionKind::Identifier(name) => self.compile_identifier(name, expr),
            ExpressionKind::Array(items) => {
                for item in items {
                    self.compile_expression(item);
                }
                let count = self.operand(items.len(), "list elements", expr.span);
                self.emit(Instruction::with_operand(OpCode::NewList, Operand::Count(count)));
            }
            ExpressionKind::Unary(unary) => {
                self.compile_expression(&unary.argument);
                let opcode = match unary.operator {
                    UnaryOperator::Minus => OpCode::Neg,
                    UnaryOperator::Not => OpCode::Not,
                };
                self.emit(Instruction::simple(opcode));
            }
            ExpressionKind::Binary(binary) => self.compile_binary(binary),
            ExpressionKind::Logical(logical) => self.compile_logical(logical),
            ExpressionKind::Conditional(conditional) => self.compile_conditional(conditional),
            ExpressionKind::Member(member) => {
                self.check_member(&member.object, &member.property);
                self.compile_expression(&member.object);
                let name = self.name(&member.property.name, member.property.span);
                self.emit(Instruction::with_operand(OpCode::GetMember, Operand::Constant(name)));
            }
            ExpressionKind::Index(index) => {
                self.compile_expression(&index.object);
                self.compile_expression(&index.index);
                self.emit(Instruction::simple(OpCode::GetIndex));
            }
            ExpressionKind::Call(call) => self.compile_call(call),
            ExpressionKind::As(conversion) => self.compile_as(conversion),
        }
    }

    fn compile_literal(&mut self, literal: &Literal, expr: &Expression) {
        let instruction = match literal {
            Literal::Number(n) => {
                let index = self.constant(Value::Number(*n), expr.span);
                Instruction::with_operand(OpCode::LoadConst, Operand::Constant(index))
            }
            Literal::String(s) => {
                let index = self.constant(Value::from(s.as_str()), expr.span);
                Instruction::with_operand(OpCode::LoadConst, Operand::Constant(index))
            }
            Literal::Boolean(true) => Instruction::simple(OpCode::LoadTrue),
            Literal::Boolean(false) => Instruction::simple(OpCode::LoadFalse),
            Literal::Null => Instruction::simple(OpCode::LoadNull),
        };
        self.emit(instruction);
    }

    fn compile_identifier(&mut self, name: &str, expr: &Expression) {
        if self.in_initializer {
            self.error(
                codes::INITIALIZER_REFERENCE,
                format!(
                    "A global initializer cannot reference the variable or member '{}'",
                    name
                ),
                expr.span,
            );
            self.emit(Instruction::simple(OpCode::LoadNull));
            return;
        }

        let instruction = match self.scope.resolve(name) {
            Some(Binding::Local(slot)) => {
                let slot = self.operand(slot, "locals", expr.span);
                Instruction::with_operand(OpCode::LoadLocal, Operand::Local(slot))
            }
            Some(Binding::Global(index)) => {
                let index = self.operand(index, "globals", expr.span);
                Instruction::with_operand(OpCode::LoadGlobal, Operand::Global(index))
            }
            None if self.is_ambient(name) => {
                let index = self.name(name, expr.span);
                Instruction::with_operand(OpCode::LoadAmbient, Operand::Constant(index))
            }
            None => {
                self.unknown_name(name, expr.span);
                Instruction::simple(OpCode::LoadNull)
            }
        };
        self.emit(instruction);
    }

    fn compile_binary(&mut self, binary: &BinaryExpression) {
        self.compile_expression(&binary.left);
        self.compile_expression(&binary.right);
        let opcode = match binary.operator {
            BinaryOperator::Add => OpCode::Add,
            BinaryOperator::Subtract => OpCode::Sub,
            BinaryOperator::Multiply => OpCode::Mul,
            BinaryOperator::Divide => OpCode::Div,
            BinaryOperator::Modulo => OpCode::Mod,
            BinaryOperator::Equal => OpCode::Eq,
            BinaryOperator::NotEqual => OpCode::Ne,
            BinaryOperator::LessThan => OpCode::Lt,
            BinaryOperator::LessThanEqual => OpCode::Le,
            BinaryOperator::GreaterThan => OpCode::Gt,
            BinaryOperator::GreaterThanEqual => OpCode::Ge,
        };
        self.emit(Instruction::simple(opcode));
    }

    /// `a && b` compiles to `a ? b : false` and `a || b` to `a ? true : b`,
    /// with `b` checked to be a boolean.
    fn compile_logical(&mut self, logical: &LogicalExpression) {
        self.compile_expression(&logical.left);
        let (short_jump, short_value) = match logical.operator {
            LogicalOperator::And => (OpCode::JumpIfFalse, OpCode::LoadFalse),
            LogicalOperator::Or => (OpCode::JumpIfTrue, OpCode::LoadTrue),
        };
        let short = self.emit(Instruction::with_operand(short_jump, Operand::Jump(0)));

        self.compile_expression(&logical.right);
        self.emit(Instruction::simple(OpCode::CheckBool));
        let end = self.emit(Instruction::with_operand(OpCode::Jump, Operand::Jump(0)));

        self.bytecode.patch_jump(short);
        self.emit(Instruction::simple(short_value));
        self.bytecode.patch_jump(end);
    }

    fn compile_conditional(&mut self, conditional: &ConditionalExpression) {
        self.compile_expression(&conditional.test);
        let to_alternate =
            self.emit(Instruction::with_operand(OpCode::JumpIfFalse, Operand::Jump(0)));

        self.compile_expression(&conditional.consequent);
        let to_end = self.emit(Instruction::with_operand(OpCode::Jump, Operand::Jump(0)));

        self.bytecode.patch_jump(to_alternate);
        self.compile_expression(&conditional.alternate);
        self.bytecode.patch_jump(to_end);
    }

    fn compile_call(&mut self, call: &CallExpression) {
        let ExpressionKind::Member(member) = &call.callee.kind else {
            self.error(
                codes::METHOD_NAME_EXPECTED,
                "Method name expected".to_string(),
                call.callee.span,
            );
            self.emit(Instruction::simple(OpCode::LoadNull));
            return;
        };

        self.check_member(&member.object, &member.property);
        self.compile_expression(&member.object);
        for argument in &call.arguments {
            self.compile_expression(argument);
        }
        let name = self.name(&member.property.name, member.property.span);
        let argc = self.operand(call.arguments.len(), "arguments", call.callee.span);
        self.emit(Instruction::with_operand(
            OpCode::CallMethod,
            Operand::Call { name, argc },
        ));
    }

    fn compile_as(&mut self, conversion: &AsExpression) {
        let Some(ty) = self.resolve_type(&conversion.type_name) else {
            self.compile_expression(&conversion.expression);
            return;
        };
        let ty = self.intern_type(ty, conversion.type_name.span);

        if !self.in_initializer && self.refers_to_view_data_bag(&conversion.expression) {
            match &conversion.expression.kind {
                ExpressionKind::Index(index) => {
                    if let ExpressionKind::Literal(Literal::String(key)) = &index.index.kind {
                        let key = self.name(key, index.index.span);
                        self.emit(Instruction::with_operand(
                            OpCode::BindViewData,
                            Operand::Binding { key, ty },
                        ));
                        return;
                    }
                }
                ExpressionKind::Member(member) if member.property.name == MODEL => {
                    self.emit(Instruction::with_operand(OpCode::BindModel, Operand::Type(ty)));
                    return;
                }
                _ => {}
            }
        }

        self.compile_expression(&conversion.expression);
        self.emit(Instruction::with_operand(OpCode::Convert, Operand::Type(ty)));
    }

    /// Returns true for `ViewData[..]` and `ViewData.x` where `ViewData`
    /// is the ambient bag rather than a variable shadowing it.
    fn refers_to_view_data_bag(&self, expr: &Expression) -> bool {
        let object = match &expr.kind {
            ExpressionKind::Index(index) => &index.object,
            ExpressionKind::Member(member) => &member.object,
            _ => return false,
        };
        matches!(&object.kind, ExpressionKind::Identifier(name) if name == VIEW_DATA)
            && self.scope.resolve(VIEW_DATA).is_none()
    }

    /// Reports `x.member` when `x` has a statically known record type that
    /// lacks the member.
    fn check_member(&mut self, object: &Expression, property: &Identifier) {
        let ExpressionKind::Identifier(name) = &object.kind else {
            return;
        };
        let Some(ValueType::Named(decl)) = self.scope.static_type(name) else {
            return;
        };
        if !decl.has_field(&property.name) {
            let message = format!(
                "'{}' does not contain a definition for '{}'",
                decl.name, property.name
            );
            self.error(codes::UNKNOWN_MEMBER, message, property.span);
        }
    }

    fn resolve_type(&mut self, type_name: &TypeName) -> Option<ValueType> {
        let resolved = self.types.resolve(&type_name.path);
        if resolved.is_none() {
            self.error(
                codes::UNKNOWN_TYPE,
                format!(
                    "The type or namespace name '{}' could not be found",
                    type_name.path
                ),
                type_name.span,
            );
        }
        resolved
    }

    fn intern_type(&mut self, ty: ValueType, span: Span) -> u32 {
        let index = match self.type_table.iter().position(|known| *known == ty) {
            Some(index) => index,
            None => {
                self.type_table.push(ty);
                self.type_table.len() - 1
            }
        };
        self.operand(index, "types", span)
    }

    /// The static type a declaration takes from its initializer.
    pub(super) fn static_type_of(&self, expr: &Expression) -> Option<ValueType> {
        match &expr.kind {
            ExpressionKind::As(conversion) => self.types.resolve(&conversion.type_name.path),
            ExpressionKind::Literal(Literal::String(_)) => Some(ValueType::String),
            ExpressionKind::Literal(Literal::Number(_)) => Some(ValueType::Number),
            ExpressionKind::Literal(Literal::Boolean(_)) => Some(ValueType::Boolean),
            _ => None,
        }
    }
}
