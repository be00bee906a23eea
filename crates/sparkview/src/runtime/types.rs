// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Declared types for view data binding and `as` conversions.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::value::Value;

/// A named record type known to the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    /// Type name, possibly dotted (`Models.Comment`)
    pub name: String,
    /// Declared fields. `None` means members are not checked at compile time.
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

impl TypeDecl {
    /// A record type with a fixed field list.
    pub fn record<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: Some(fields.into_iter().map(Into::into).collect()),
        }
    }

    /// A type whose members are only checked at render time.
    pub fn open(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: None,
        }
    }

    /// Last segment of the dotted name.
    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    /// Whether `field` is a member. Open types accept every name.
    pub fn has_field(&self, field: &str) -> bool {
        match &self.fields {
            Some(fields) => fields.iter().any(|f| f == field),
            None => true,
        }
    }
}

fn simple_name(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// A type that a value can be converted to.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    /// Any value
    Any,
    /// string
    String,
    /// number
    Number,
    /// A number with no fractional part (`int`, `long`)
    Integer,
    /// bool
    Boolean,
    /// list
    List,
    /// Any record or host object
    Object,
    /// A registered record type
    Named(Arc<TypeDecl>),
}

impl ValueType {
    /// Resolves a built-in type keyword.
    pub fn builtin(name: &str) -> Option<ValueType> {
        let ty = match name {
            "any" | "dynamic" => ValueType::Any,
            "object" => ValueType::Object,
            "string" | "String" => ValueType::String,
            "number" | "double" | "float" | "decimal" => ValueType::Number,
            "int" | "long" => ValueType::Integer,
            "bool" | "Boolean" => ValueType::Boolean,
            "list" | "array" => ValueType::List,
            _ => return None,
        };
        Some(ty)
    }

    /// The record declaration, for named types.
    pub fn declaration(&self) -> Option<&TypeDecl> {
        match self {
            ValueType::Named(decl) => Some(decl),
            _ => None,
        }
    }

    /// Checks `value` against this type, returning it unchanged when it
    /// conforms.
    ///
    /// `null` conforms to reference types (string, list, object, records)
    /// but not to `number`, `int` or `bool`.
    pub fn convert(&self, value: Value) -> Result<Value, Value> {
        let ok = match (self, &value) {
            (ValueType::Any, _) => true,
            (ValueType::Number | ValueType::Integer | ValueType::Boolean, Value::Null) => false,
            (_, Value::Null) => true,
            (ValueType::String, Value::String(_)) => true,
            (ValueType::Number, Value::Number(_)) => true,
            (ValueType::Integer, Value::Number(n)) => n.is_finite() && n.fract() == 0.0,
            (ValueType::Boolean, Value::Boolean(_)) => true,
            (ValueType::List, Value::List(_)) => true,
            (ValueType::Object, Value::Record(_) | Value::Host(_)) => true,
            (ValueType::Named(decl), Value::Record(record)) => match &record.type_name {
                None => true,
                Some(name) => {
                    name == &decl.name || simple_name(name) == decl.simple_name()
                }
            },
            (ValueType::Named(decl), Value::Host(host)) => {
                host.type_name() == decl.name || host.type_name() == decl.simple_name()
            }
            _ => false,
        };
        if ok { Ok(value) } else { Err(value) }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => f.write_str("any"),
            ValueType::String => f.write_str("string"),
            ValueType::Number => f.write_str("number"),
            ValueType::Integer => f.write_str("int"),
            ValueType::Boolean => f.write_str("bool"),
            ValueType::List => f.write_str("list"),
            ValueType::Object => f.write_str("object"),
            ValueType::Named(decl) => f.write_str(&decl.name),
        }
    }
}

/// Named types available to a compilation.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: FxHashMap<String, Arc<TypeDecl>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type under its full name and its simple name.
    pub fn register(&mut self, decl: TypeDecl) {
        let decl = Arc::new(decl);
        let simple = decl.simple_name().to_string();
        if simple != decl.name {
            self.types.entry(simple).or_insert_with(|| decl.clone());
        }
        self.types.insert(decl.name.clone(), decl);
    }

    /// Resolves a type path: built-ins first, then the full registered name,
    /// then the last path segment.
    pub fn resolve(&self, path: &str) -> Option<ValueType> {
        if let Some(builtin) = ValueType::builtin(path) {
            return Some(builtin);
        }
        self.types
            .get(path)
            .or_else(|| self.types.get(simple_name(path)))
            .map(|decl| ValueType::Named(decl.clone()))
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl FromIterator<TypeDecl> for TypeRegistry {
    fn from_iter<I: IntoIterator<Item = TypeDecl>>(iter: I) -> Self {
        let mut registry = TypeRegistry::new();
        for decl in iter {
            registry.register(decl);
        }
        registry
    }
}
