// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The bytecode interpreter.

use std::fmt::Write;
use std::sync::Arc;

use crate::compiler::{Bytecode, OpCode, Operand, Program};
use crate::error::RenderError;
use crate::runtime::{RenderContext, Value, ValueType};

/// Executes the two chunks of a [`Program`].
///
/// A `VM` borrows its program and owns only scratch state, so one program
/// can be executed by any number of VMs at once.
pub struct VM<'p> {
    program: &'p Program,
    /// Operand stack
    stack: Vec<Value>,
    /// Render frame
    locals: Vec<Value>,
    /// Active `foreach` loops, innermost last
    iterators: Vec<std::vec::IntoIter<Value>>,
    /// Instruction pointer
    ip: usize,
}

impl<'p> VM<'p> {
    /// Creates a VM for `program`.
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            stack: Vec::with_capacity(16),
            locals: Vec::new(),
            iterators: Vec::new(),
            ip: 0,
        }
    }

    /// Runs the global initializers and returns the instance globals.
    pub fn initialize(&mut self) -> Result<Vec<Value>, RenderError> {
        let program = self.program;
        let mut globals = vec![Value::Null; program.globals.len()];
        self.execute(&program.init, &mut globals, None, &mut String::new())?;
        Ok(globals)
    }

    /// Runs the render body, appending output to `out`.
    pub fn render(
        &mut self,
        globals: &mut [Value],
        context: &RenderContext,
        out: &mut String,
    ) -> Result<(), RenderError> {
        let program = self.program;
        self.locals = vec![Value::Null; program.frame_size];
        self.execute(&program.render, globals, Some(context), out)
    }

    fn execute(
        &mut self,
        bytecode: &Bytecode,
        globals: &mut [Value],
        context: Option<&RenderContext>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        self.ip = 0;
        self.stack.clear();
        self.iterators.clear();

        loop {
            let Some(instruction) = bytecode.instructions.get(self.ip) else {
                break;
            };
            self.ip += 1;

            match instruction.opcode {
                OpCode::Halt => break,

                OpCode::LoadConst => {
                    let index = constant_operand(instruction.operand)?;
                    let value = constant(bytecode, index)?.clone();
                    self.stack.push(value);
                }
                OpCode::LoadNull => self.stack.push(Value::Null),
                OpCode::LoadTrue => self.stack.push(Value::Boolean(true)),
                OpCode::LoadFalse => self.stack.push(Value::Boolean(false)),
                OpCode::Pop => {
                    self.pop()?;
                }

                // Arithmetic
                OpCode::Add => self.binary_add()?,
                OpCode::Sub => self.binary_num_op("-", |a, b| a - b)?,
                OpCode::Mul => self.binary_num_op("*", |a, b| a * b)?,
                OpCode::Div => self.binary_num_op("/", |a, b| a / b)?,
                OpCode::Mod => self.binary_num_op("%", |a, b| a % b)?,
                OpCode::Neg => match self.pop()? {
                    Value::Number(n) => self.stack.push(Value::Number(-n)),
                    other => {
                        return Err(RenderError::Type(format!(
                            "operator '-' cannot be applied to {}",
                            other.type_name()
                        )));
                    }
                },

                // Comparison
                OpCode::Eq => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(Value::Boolean(a == b));
                }
                OpCode::Ne => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(Value::Boolean(a != b));
                }
                OpCode::Lt => self.compare_op("<", |o| o.is_lt())?,
                OpCode::Le => self.compare_op("<=", |o| o.is_le())?,
                OpCode::Gt => self.compare_op(">", |o| o.is_gt())?,
                OpCode::Ge => self.compare_op(">=", |o| o.is_ge())?,

                // Logic
                OpCode::Not => {
                    let value = self.pop_bool("!")?;
                    self.stack.push(Value::Boolean(!value));
                }
                OpCode::CheckBool => match self.stack.last() {
                    Some(Value::Boolean(_)) => {}
                    Some(other) => {
                        return Err(RenderError::Type(format!(
                            "expected bool, found {}",
                            other.type_name()
                        )));
                    }
                    None => return Err(underflow()),
                },

                // Variables
                OpCode::LoadLocal => {
                    let slot = slot_operand(instruction.operand)?;
                    let value = self
                        .locals
                        .get(slot)
                        .cloned()
                        .ok_or_else(|| internal("local slot out of range"))?;
                    self.stack.push(value);
                }
                OpCode::StoreLocal => {
                    let slot = slot_operand(instruction.operand)?;
                    let value = self.pop()?;
                    let target = self
                        .locals
                        .get_mut(slot)
                        .ok_or_else(|| internal("local slot out of range"))?;
                    *target = value;
                }
                OpCode::LoadGlobal => {
                    let index = global_operand(instruction.operand)?;
                    let value = globals
                        .get(index)
                        .cloned()
                        .ok_or_else(|| internal("global index out of range"))?;
                    self.stack.push(value);
                }
                OpCode::StoreGlobal => {
                    let index = global_operand(instruction.operand)?;
                    let value = self.pop()?;
                    let target = globals
                        .get_mut(index)
                        .ok_or_else(|| internal("global index out of range"))?;
                    *target = value;
                }
                OpCode::LoadAmbient => {
                    let name = name_constant(bytecode, instruction.operand)?;
                    let value = context
                        .and_then(|context| context.ambient(name))
                        .ok_or_else(|| RenderError::MissingAmbient(name.to_string()))?;
                    self.stack.push(value);
                }

                // Members and calls
                OpCode::GetMember => {
                    let name = name_constant(bytecode, instruction.operand)?;
                    let object = self.pop()?;
                    self.stack.push(get_member(&object, name)?);
                }
                OpCode::GetIndex => {
                    let key = self.pop()?;
                    let object = self.pop()?;
                    self.stack.push(get_index(&object, &key)?);
                }
                OpCode::CallMethod => {
                    let Some(Operand::Call { name, argc }) = instruction.operand else {
                        return Err(internal("CallMethod without call operand"));
                    };
                    let method = constant(bytecode, name)?
                        .as_str()
                        .ok_or_else(|| internal("method name is not a string"))?;
                    let args = self.pop_n(argc as usize)?;
                    let receiver = self.pop()?;
                    self.stack.push(call_method(&receiver, method, &args)?);
                }
                OpCode::NewList => {
                    let Some(Operand::Count(count)) = instruction.operand else {
                        return Err(internal("NewList without count"));
                    };
                    let items = self.pop_n(count as usize)?;
                    self.stack.push(Value::List(Arc::from(items)));
                }

                // Control flow
                OpCode::Jump => {
                    self.ip = jump_operand(instruction.operand)?;
                }
                OpCode::JumpIfFalse => {
                    let target = jump_operand(instruction.operand)?;
                    if !self.pop_bool("if")? {
                        self.ip = target;
                    }
                }
                OpCode::JumpIfTrue => {
                    let target = jump_operand(instruction.operand)?;
                    if self.pop_bool("if")? {
                        self.ip = target;
                    }
                }

                // Iteration
                OpCode::IterInit => {
                    let sequence = self.pop()?;
                    self.iterators.push(elements_of(sequence)?.into_iter());
                }
                OpCode::IterNext => {
                    let target = jump_operand(instruction.operand)?;
                    let iterator = self
                        .iterators
                        .last_mut()
                        .ok_or_else(|| internal("IterNext without an active loop"))?;
                    match iterator.next() {
                        Some(element) => self.stack.push(element),
                        None => {
                            self.iterators.pop();
                            self.ip = target;
                        }
                    }
                }

                // Output and binding
                OpCode::Write => {
                    let value = self.pop()?;
                    // Writing into a String cannot fail.
                    let _ = write!(out, "{}", value);
                }
                OpCode::Convert => {
                    let ty = self.type_operand(instruction.operand)?;
                    let value = self.pop()?;
                    let converted = ty.convert(value).map_err(|found| {
                        RenderError::Type(format!(
                            "cannot convert {} to {}",
                            found.type_name(),
                            ty
                        ))
                    })?;
                    self.stack.push(converted);
                }
                OpCode::BindViewData => {
                    let Some(Operand::Binding { key, ty }) = instruction.operand else {
                        return Err(internal("BindViewData without binding operand"));
                    };
                    let key = constant(bytecode, key)?
                        .as_str()
                        .ok_or_else(|| internal("view data key is not a string"))?;
                    let ty = self.lookup_type(ty)?;
                    let context = context.ok_or_else(|| internal("binding outside a render"))?;
                    let value = context.view_data().lookup(key, ty)?;
                    self.stack.push(value);
                }
                OpCode::BindModel => {
                    let ty = self.type_operand(instruction.operand)?;
                    let context = context.ok_or_else(|| internal("binding outside a render"))?;
                    let value = context.view_data().lookup_model(ty)?;
                    self.stack.push(value);
                }
            }
        }

        Ok(())
    }

    // ========================================================================
    // Stack helpers
    // ========================================================================

    fn pop(&mut self) -> Result<Value, RenderError> {
        self.stack.pop().ok_or_else(underflow)
    }

    /// Pops `n` values, returning them in push order.
    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, RenderError> {
        let start = self.stack.len().checked_sub(n).ok_or_else(underflow)?;
        Ok(self.stack.split_off(start))
    }

    fn pop_bool(&mut self, operator: &str) -> Result<bool, RenderError> {
        match self.pop()? {
            Value::Boolean(b) => Ok(b),
            other => Err(RenderError::Type(format!(
                "'{}' requires a bool, found {}",
                operator,
                other.type_name()
            ))),
        }
    }

    /// `+` adds numbers, or concatenates when either side is a string.
    fn binary_add(&mut self) -> Result<(), RenderError> {
        let b = self.pop()?;
        let a = self.pop()?;

        let result = match (&a, &b) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (Value::String(_), _) | (_, Value::String(_)) => Value::from(format!("{}{}", a, b)),
            _ => return Err(operator_error("+", &a, &b)),
        };

        self.stack.push(result);
        Ok(())
    }

    fn binary_num_op<F>(&mut self, operator: &str, op: F) -> Result<(), RenderError>
    where
        F: Fn(f64, f64) -> f64,
    {
        let b = self.pop()?;
        let a = self.pop()?;
        match (&a, &b) {
            (Value::Number(x), Value::Number(y)) => {
                self.stack.push(Value::Number(op(*x, *y)));
                Ok(())
            }
            _ => Err(operator_error(operator, &a, &b)),
        }
    }

    /// Numbers compare numerically and strings ordinally.
    fn compare_op<F>(&mut self, operator: &str, op: F) -> Result<(), RenderError>
    where
        F: Fn(std::cmp::Ordering) -> bool,
    {
        let b = self.pop()?;
        let a = self.pop()?;
        let ordering = match (&a, &b) {
            (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
            (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
            _ => return Err(operator_error(operator, &a, &b)),
        };
        // NaN compares false with everything.
        self.stack.push(Value::Boolean(ordering.is_some_and(op)));
        Ok(())
    }

    fn type_operand(&self, operand: Option<Operand>) -> Result<&'p ValueType, RenderError> {
        match operand {
            Some(Operand::Type(index)) => self.lookup_type(index),
            _ => Err(internal("missing type operand")),
        }
    }

    fn lookup_type(&self, index: u32) -> Result<&'p ValueType, RenderError> {
        self.program
            .types
            .get(index as usize)
            .ok_or_else(|| internal("type index out of range"))
    }
}

// ============================================================================
// Value operations
// ============================================================================

fn get_member(object: &Value, name: &str) -> Result<Value, RenderError> {
    let found = match object {
        Value::Null => return Err(RenderError::NullReference(name.to_string())),
        Value::Record(record) => record.get(name).cloned(),
        Value::List(items) if name == "Count" || name == "Length" => {
            Some(Value::from(items.len()))
        }
        Value::String(s) if name == "Length" => Some(Value::from(s.chars().count())),
        Value::Host(host) => host.member(name),
        _ => None,
    };
    found.ok_or_else(|| unknown_member(object, name))
}

fn get_index(object: &Value, key: &Value) -> Result<Value, RenderError> {
    match (object, key) {
        (Value::Null, _) => Err(RenderError::NullReference(format!("[{}]", key))),
        (Value::List(items), Value::Number(n)) => {
            if n.fract() != 0.0 || *n < 0.0 || *n >= items.len() as f64 {
                return Err(RenderError::Type(format!(
                    "index {} is out of range for a list of {}",
                    key,
                    items.len()
                )));
            }
            Ok(items[*n as usize].clone())
        }
        (Value::Record(record), Value::String(name)) => record
            .get(name)
            .cloned()
            .ok_or_else(|| unknown_member(object, name)),
        (Value::Host(host), _) => host
            .index(key)
            .ok_or_else(|| unknown_member(object, &format!("[{}]", key))),
        _ => Err(RenderError::Type(format!(
            "cannot index {} with {}",
            object.type_name(),
            key.type_name()
        ))),
    }
}

fn call_method(receiver: &Value, method: &str, args: &[Value]) -> Result<Value, RenderError> {
    match (receiver, method, args) {
        (Value::Null, _, _) => Err(RenderError::NullReference(method.to_string())),
        (Value::Host(host), _, _) => host.call(method, args).map_err(|message| RenderError::Host {
            method: method.to_string(),
            message,
        }),
        (_, "ToString", []) => Ok(Value::from(receiver.to_string())),
        (Value::String(s), "ToUpper", []) => Ok(Value::from(s.to_uppercase())),
        (Value::String(s), "ToLower", []) => Ok(Value::from(s.to_lowercase())),
        (Value::String(s), "Trim", []) => Ok(Value::from(s.trim())),
        (Value::List(items), "Contains", [item]) => {
            Ok(Value::Boolean(items.iter().any(|candidate| candidate == item)))
        }
        _ => Err(unknown_member(receiver, method)),
    }
}

/// Elements a `foreach` visits.
fn elements_of(sequence: Value) -> Result<Vec<Value>, RenderError> {
    match sequence {
        Value::List(items) => Ok(items.to_vec()),
        Value::String(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
        Value::Host(host) => host
            .iterate()
            .ok_or_else(|| RenderError::NotIterable(host.type_name().to_string())),
        other => Err(RenderError::NotIterable(other.type_name())),
    }
}

// ============================================================================
// Operand decoding
// ============================================================================

fn constant(bytecode: &Bytecode, index: u32) -> Result<&Value, RenderError> {
    bytecode
        .constants
        .get(index as usize)
        .ok_or_else(|| internal("constant index out of range"))
}

fn name_constant(bytecode: &Bytecode, operand: Option<Operand>) -> Result<&str, RenderError> {
    let index = constant_operand(operand)?;
    constant(bytecode, index)?
        .as_str()
        .ok_or_else(|| internal("name constant is not a string"))
}

fn constant_operand(operand: Option<Operand>) -> Result<u32, RenderError> {
    match operand {
        Some(Operand::Constant(index)) => Ok(index),
        _ => Err(internal("missing constant operand")),
    }
}

fn slot_operand(operand: Option<Operand>) -> Result<usize, RenderError> {
    match operand {
        Some(Operand::Local(slot)) => Ok(slot as usize),
        _ => Err(internal("missing local operand")),
    }
}

fn global_operand(operand: Option<Operand>) -> Result<usize, RenderError> {
    match operand {
        Some(Operand::Global(index)) => Ok(index as usize),
        _ => Err(internal("missing global operand")),
    }
}

fn jump_operand(operand: Option<Operand>) -> Result<usize, RenderError> {
    match operand {
        Some(Operand::Jump(target)) => Ok(target as usize),
        _ => Err(internal("missing jump operand")),
    }
}

// ============================================================================
// Errors
// ============================================================================

fn unknown_member(object: &Value, member: &str) -> RenderError {
    RenderError::UnknownMember {
        type_name: object.type_name(),
        member: member.to_string(),
    }
}

fn operator_error(operator: &str, a: &Value, b: &Value) -> RenderError {
    RenderError::Type(format!(
        "operator '{}' cannot be applied to {} and {}",
        operator,
        a.type_name(),
        b.type_name()
    ))
}

fn underflow() -> RenderError {
    internal("stack underflow")
}

fn internal(message: &str) -> RenderError {
    RenderError::Internal(message.to_string())
}
