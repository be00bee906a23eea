// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode compiler for view script.
//!
//! Transforms a parsed [`ViewUnit`](crate::ast::ViewUnit) into a
//! [`Program`] that the VM can execute.
//!
//! # Module Structure
//!
//! - `bytecode`: Bytecode definitions and instructions
//! - `codegen`: Name binding and code generation from AST
//!   - `codegen::expressions`: Expression lowering, including typed view
//!     data bindings

pub mod bytecode;
pub mod codegen;

pub use bytecode::{Bytecode, Instruction, OpCode, Operand, Program};
pub use codegen::Compiler;
