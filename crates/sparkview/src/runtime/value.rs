// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Runtime value representation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::host::HostObject;

/// A view-script value.
///
/// Values are cheap to clone and thread-safe, so constants in a compiled
/// view can be shared by instances rendering on different threads.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// null
    #[default]
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(Arc<str>),
    /// Immutable list
    List(Arc<[Value]>),
    /// Record with named fields
    Record(Arc<Record>),
    /// Object supplied by the host
    Host(Arc<dyn HostObject>),
}

/// A record: an optional type name plus ordered fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// The record's type name, if it was tagged with one
    pub type_name: Option<String>,
    /// Field values by name
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record tagged with `type_name`.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            fields: BTreeMap::new(),
        }
    }

    /// Creates an empty untagged record.
    pub fn untagged() -> Self {
        Self::default()
    }

    /// Adds a field, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Looks up a field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Host(a), Value::Host(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    /// Returns true if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the string slice if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the runtime type name used in error messages.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Boolean(_) => "bool".to_string(),
            Value::Number(_) => "number".to_string(),
            Value::String(_) => "string".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Record(record) => record
                .type_name
                .clone()
                .unwrap_or_else(|| "object".to_string()),
            Value::Host(host) => host.type_name().to_string(),
        }
    }

    /// Creates a list value.
    pub fn list<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Wraps a host object.
    pub fn host(object: impl HostObject + 'static) -> Self {
        Value::Host(Arc::new(object))
    }
}

/// Formats a number the way views print it: integral values without a
/// fractional part.
fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => format_number(*n, f),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Record(record) => match &record.type_name {
                Some(name) => f.write_str(name),
                None => f.write_str("object"),
            },
            Value::Host(host) => f.write_str(&host.display()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(Arc::new(record))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::list(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::list(items),
            serde_json::Value::Object(map) => {
                let mut record = Record::untagged();
                for (key, value) in map {
                    record.fields.insert(key, value.into());
                }
                Value::from(record)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_numbers_print_without_fraction() {
        assert_eq!(Value::Number(7.0).to_string(), "7");
        assert_eq!(Value::Number(-3.0).to_string(), "-3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn test_null_prints_nothing() {
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn test_list_display() {
        assert_eq!(Value::from(vec![3, 4, 5]).to_string(), "3,4,5");
    }

    #[test]
    fn test_from_json_object() {
        let value = Value::from(serde_json::json!({ "Text": "hi", "Count": 2 }));
        let Value::Record(record) = value else {
            panic!("expected record");
        };
        assert_eq!(record.type_name, None);
        assert_eq!(record.get("Text"), Some(&Value::from("hi")));
        assert_eq!(record.get("Count"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::from(Record::new("Comment")).type_name(), "Comment");
        assert_eq!(Value::from(Record::untagged()).type_name(), "object");
    }
}
