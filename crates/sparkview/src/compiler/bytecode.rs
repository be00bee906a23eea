// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode definitions.

use std::fmt::Write;

use crate::runtime::{Value, ValueType};

/// A compiled bytecode chunk.
#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    /// The instructions
    pub instructions: Vec<Instruction>,
    /// The constant pool
    pub constants: Vec<Value>,
}

impl Bytecode {
    /// Creates a new empty bytecode chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instruction and returns its index.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    /// Adds a constant and returns its index, or `None` once the pool
    /// holds as many entries as an operand can address.
    pub fn add_constant(&mut self, value: Value) -> Option<u32> {
        let index = u32::try_from(self.constants.len()).ok()?;
        self.constants.push(value);
        Some(index)
    }

    /// Adds a string constant used as a name, reusing an existing entry.
    pub fn add_name(&mut self, name: &str) -> Option<u32> {
        match self
            .constants
            .iter()
            .position(|constant| constant.as_str() == Some(name))
        {
            Some(index) => u32::try_from(index).ok(),
            None => self.add_constant(Value::from(name)),
        }
    }

    /// Points the jump at `index` to the next instruction to be emitted.
    pub fn patch_jump(&mut self, index: usize) {
        let target = jump_target(self.instructions.len());
        self.instructions[index].operand = Some(Operand::Jump(target));
    }

    /// True when every instruction index fits in a jump operand.
    pub fn is_addressable(&self) -> bool {
        u32::try_from(self.instructions.len()).is_ok()
    }

    /// One line per instruction, for logs and tests.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (index, instruction) in self.instructions.iter().enumerate() {
            let _ = write!(out, "{:04} {:?}", index, instruction.opcode);
            match &instruction.operand {
                Some(Operand::Constant(c)) => {
                    let _ = write!(out, " {:?}", self.constants[*c as usize]);
                }
                Some(operand) => {
                    let _ = write!(out, " {:?}", operand);
                }
                None => {}
            }
            out.push('\n');
        }
        out
    }
}

/// Jump operand for an instruction index. Saturates; the compiler rejects
/// chunks that are not [`Bytecode::is_addressable`].
pub fn jump_target(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

/// A single bytecode instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The operation code
    pub opcode: OpCode,
    /// Optional operand
    pub operand: Option<Operand>,
}

impl Instruction {
    /// Creates a new instruction with no operand.
    pub fn simple(opcode: OpCode) -> Self {
        Self {
            opcode,
            operand: None,
        }
    }

    /// Creates a new instruction with an operand.
    pub fn with_operand(opcode: OpCode, operand: Operand) -> Self {
        Self {
            opcode,
            operand: Some(operand),
        }
    }
}

/// Instruction operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Constant pool index
    Constant(u32),
    /// Render frame slot
    Local(u32),
    /// Instance global index
    Global(u32),
    /// Absolute jump target
    Jump(u32),
    /// Index into the program's type table
    Type(u32),
    /// Element count
    Count(u32),
    /// Method name (constant index) and argument count
    Call {
        /// Constant index of the method name
        name: u32,
        /// Number of arguments on the stack
        argc: u32,
    },
    /// View data key (constant index) and declared type
    Binding {
        /// Constant index of the key
        key: u32,
        /// Type table index
        ty: u32,
    },
}

/// Operation codes for the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // Stack operations
    /// Push a constant onto the stack
    LoadConst,
    /// Push null
    LoadNull,
    /// Push true
    LoadTrue,
    /// Push false
    LoadFalse,
    /// Pop the top value
    Pop,

    // Arithmetic operations
    /// Add numbers, or concatenate when either side is a string
    Add,
    /// Subtract
    Sub,
    /// Multiply
    Mul,
    /// Divide
    Div,
    /// Modulo
    Mod,
    /// Negate (unary minus)
    Neg,

    // Comparison operations
    /// Equal (==)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,

    // Logical operations
    /// Logical NOT
    Not,
    /// Fail unless the top value is a boolean
    CheckBool,

    // Variable operations
    /// Load a local variable
    LoadLocal,
    /// Store to a local variable
    StoreLocal,
    /// Load an instance global
    LoadGlobal,
    /// Store to an instance global
    StoreGlobal,
    /// Load a name from the render context
    LoadAmbient,

    // Member operations
    /// Read a member
    GetMember,
    /// Read an indexed element
    GetIndex,
    /// Call a method on a receiver
    CallMethod,
    /// Build a list from the top elements
    NewList,

    // Control flow
    /// Unconditional jump
    Jump,
    /// Pop a boolean, jump if false
    JumpIfFalse,
    /// Pop a boolean, jump if true
    JumpIfTrue,

    // Iteration
    /// Pop a sequence and start iterating it
    IterInit,
    /// Push the next element, or finish the iteration and jump
    IterNext,

    // Output and binding
    /// Pop a value and append its display form to the output
    Write,
    /// Check the top value against a type
    Convert,
    /// Typed lookup of a view data entry
    BindViewData,
    /// Typed lookup of the view data model
    BindModel,

    /// Halt execution
    Halt,
}

/// A compiled view: global initialization code, render code and the
/// tables both share.
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Runs once per instance (and per render under the reinitialize
    /// policy) before the render body
    pub init: Bytecode,
    /// The render body
    pub render: Bytecode,
    /// Global names by storage index
    pub globals: Vec<String>,
    /// Number of local slots a render frame needs
    pub frame_size: usize,
    /// Types referenced by `Convert` and binding instructions
    pub types: Vec<ValueType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_name_reuses_constants() {
        let mut bytecode = Bytecode::new();
        let a = bytecode.add_name("Text");
        let b = bytecode.add_constant(Value::Number(1.0));
        let c = bytecode.add_name("Text");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(bytecode.constants.len(), 2);
    }

    #[test]
    fn test_patch_jump_targets_next_instruction() {
        let mut bytecode = Bytecode::new();
        let jump = bytecode.emit(Instruction::with_operand(OpCode::Jump, Operand::Jump(0)));
        bytecode.emit(Instruction::simple(OpCode::LoadNull));
        bytecode.patch_jump(jump);
        assert_eq!(bytecode.instructions[jump].operand, Some(Operand::Jump(2)));
    }

    #[test]
    fn test_disassemble_shows_constants() {
        let mut bytecode = Bytecode::new();
        let c = bytecode.add_constant(Value::from("hi")).unwrap();
        bytecode.emit(Instruction::with_operand(OpCode::LoadConst, Operand::Constant(c)));
        bytecode.emit(Instruction::simple(OpCode::Write));
        let text = bytecode.disassemble();
        assert!(text.starts_with("0000 LoadConst String(\"hi\")"));
        assert!(text.contains("0001 Write"));
    }

    #[test]
    fn test_constant_indices_pass_u16_range() {
        let mut bytecode = Bytecode::new();
        for i in 0..70_000 {
            bytecode.add_constant(Value::from(i as f64));
        }
        let last = bytecode.add_constant(Value::from("last")).unwrap();
        assert_eq!(last, 70_000);
        assert_eq!(bytecode.constants[last as usize], Value::from("last"));
        assert_eq!(bytecode.add_name("last"), Some(70_000));
    }
}
