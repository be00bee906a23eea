// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Two-tier variable scoping: instance globals and block locals.
//!
//! Globals live in a flat namespace for the whole unit. Locals live in a
//! stack of frames; each block pushes a frame and pops it on exit. Lookups
//! search the frames innermost-first, then the globals, so a local always
//! shadows a global of the same name.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::runtime::ValueType;

/// Where a resolved name lives at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Slot in the render frame
    Local(usize),
    /// Index into the instance's global storage
    Global(usize),
}

/// A declared global.
#[derive(Debug, Clone)]
pub struct GlobalVar {
    /// The variable name
    pub name: String,
    /// Storage index, in declaration order
    pub index: usize,
    /// Statically known type, when declared with one
    pub static_type: Option<ValueType>,
}

/// A declared local.
#[derive(Debug, Clone)]
pub struct Local {
    /// The variable name
    pub name: String,
    /// Frame slot
    pub slot: usize,
    /// Statically known type, when declared with one
    pub static_type: Option<ValueType>,
}

/// A declaration the tracker refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// The name is already a global
    #[error("The type already contains a definition for '{0}'")]
    DuplicateGlobal(String),

    /// The name is already declared in the innermost frame
    #[error("A local variable named '{0}' is already defined in this scope")]
    DuplicateLocal(String),

    /// A local was declared with no frame open
    #[error("Local '{0}' declared outside of any block")]
    NoFrame(String),
}

#[derive(Debug, Default)]
struct Frame {
    locals: Vec<Local>,
}

/// Tracks declarations while walking a unit.
#[derive(Debug, Default)]
pub struct ScopeTracker {
    globals: Vec<GlobalVar>,
    global_names: FxHashMap<String, usize>,
    frames: Vec<Frame>,
    next_slot: usize,
    max_slots: usize,
}

impl ScopeTracker {
    /// Creates an empty tracker with no frames open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a global, returning its storage index.
    pub fn declare_global(
        &mut self,
        name: &str,
        static_type: Option<ValueType>,
    ) -> Result<usize, ScopeError> {
        if self.global_names.contains_key(name) {
            return Err(ScopeError::DuplicateGlobal(name.to_string()));
        }

        let index = self.globals.len();
        self.globals.push(GlobalVar {
            name: name.to_string(),
            index,
            static_type,
        });
        self.global_names.insert(name.to_string(), index);
        Ok(index)
    }

    /// Opens a block frame.
    pub fn push_frame(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Closes the innermost frame and returns how many locals it held.
    /// Their slots become free for the next sibling block.
    pub fn pop_frame(&mut self) -> usize {
        let Some(frame) = self.frames.pop() else {
            return 0;
        };
        self.next_slot -= frame.locals.len();
        frame.locals.len()
    }

    /// Declares a local in the innermost frame, returning its slot.
    pub fn declare_local(
        &mut self,
        name: &str,
        static_type: Option<ValueType>,
    ) -> Result<usize, ScopeError> {
        let slot = self.next_slot;
        let Some(frame) = self.frames.last_mut() else {
            return Err(ScopeError::NoFrame(name.to_string()));
        };
        if frame.locals.iter().any(|local| local.name == name) {
            return Err(ScopeError::DuplicateLocal(name.to_string()));
        }

        frame.locals.push(Local {
            name: name.to_string(),
            slot,
            static_type,
        });
        self.next_slot += 1;
        self.max_slots = self.max_slots.max(self.next_slot);
        Ok(slot)
    }

    /// Resolves a name: locals innermost-first, then globals. Undeclared
    /// names resolve to `None`; reporting them is the caller's business.
    pub fn resolve(&self, name: &str) -> Option<Binding> {
        if let Some(local) = self.find_local(name) {
            return Some(Binding::Local(local.slot));
        }
        self.global_names.get(name).map(|&index| Binding::Global(index))
    }

    /// The statically known type of a name, if any.
    pub fn static_type(&self, name: &str) -> Option<&ValueType> {
        match self.find_local(name) {
            Some(local) => local.static_type.as_ref(),
            None => self
                .global_names
                .get(name)
                .and_then(|&index| self.globals[index].static_type.as_ref()),
        }
    }

    /// Returns true if `name` is a global that a new local would hide.
    pub fn is_global(&self, name: &str) -> bool {
        self.global_names.contains_key(name)
    }

    /// Declared globals, in declaration order.
    pub fn globals(&self) -> &[GlobalVar] {
        &self.globals
    }

    /// Number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The most locals ever live at once; the size of a render frame.
    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    fn find_local(&self, name: &str) -> Option<&Local> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.locals.iter().rev())
            .find(|local| local.name == name)
    }
}
