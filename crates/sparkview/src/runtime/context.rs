// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The render context handed in by the host.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::host::HostObject;
use super::types::ValueType;
use super::value::Value;
use crate::error::BindingError;

/// Name under which the view data bag is visible to expression fragments.
pub const VIEW_DATA: &str = "ViewData";

/// Name of the view data bag's primary value.
pub const MODEL: &str = "Model";

/// The untyped key/value bag a view binds its data from, plus an optional
/// primary value (the model).
#[derive(Debug, Clone, Default)]
pub struct ViewData {
    model: Option<Value>,
    entries: FxHashMap<String, Value>,
}

impl ViewData {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bag whose primary value is `model`.
    pub fn with_model(model: impl Into<Value>) -> Self {
        Self {
            model: Some(model.into()),
            entries: FxHashMap::default(),
        }
    }

    /// Creates a bag from the fields of a JSON object. Non-object JSON
    /// becomes the model.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Object(map) => Self {
                model: None,
                entries: map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            },
            other => Self::with_model(other),
        }
    }

    /// Adds an entry, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Sets the primary value.
    pub fn set_model(&mut self, model: impl Into<Value>) {
        self.model = Some(model.into());
    }

    /// Reads an entry without type checking.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Reads the primary value without type checking.
    pub fn model(&self) -> Option<&Value> {
        self.model.as_ref()
    }

    /// Typed lookup of an entry.
    pub fn lookup(&self, key: &str, expected: &ValueType) -> Result<Value, BindingError> {
        let value = self.entries.get(key).cloned().ok_or_else(|| BindingError::MissingKey {
            key: key.to_string(),
        })?;
        expected
            .convert(value)
            .map_err(|found| BindingError::TypeMismatch {
                key: key.to_string(),
                expected: expected.to_string(),
                found: found.type_name(),
            })
    }

    /// Typed lookup of the primary value.
    pub fn lookup_model(&self, expected: &ValueType) -> Result<Value, BindingError> {
        let value = self.model.clone().ok_or(BindingError::MissingModel)?;
        expected
            .convert(value)
            .map_err(|found| BindingError::TypeMismatch {
                key: MODEL.to_string(),
                expected: expected.to_string(),
                found: found.type_name(),
            })
    }
}

impl HostObject for ViewData {
    fn type_name(&self) -> &str {
        VIEW_DATA
    }

    fn member(&self, name: &str) -> Option<Value> {
        match name {
            MODEL => Some(self.model.clone().unwrap_or_default()),
            "Count" => Some(Value::from(self.entries.len())),
            _ => None,
        }
    }

    fn index(&self, key: &Value) -> Option<Value> {
        let key = key.as_str()?;
        Some(self.entries.get(key).cloned().unwrap_or_default())
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value, String> {
        match (method, args) {
            ("ContainsKey", [Value::String(key)]) => {
                Ok(Value::Boolean(self.entries.contains_key(key.as_ref())))
            }
            _ => Err(format!("'ViewData' does not contain a method named '{}'", method)),
        }
    }
}

/// Everything a render may read from its host: the view data bag and the
/// ambient helper objects referenced by name from expression fragments.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    view_data: Arc<ViewData>,
    ambient: FxHashMap<String, Value>,
}

impl RenderContext {
    /// Creates a context with an empty data bag and no helpers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the view data bag, builder style.
    pub fn with_view_data(mut self, view_data: ViewData) -> Self {
        self.view_data = Arc::new(view_data);
        self
    }

    /// Adds an ambient value, builder style.
    pub fn with_ambient(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ambient.insert(name.into(), value.into());
        self
    }

    /// Adds an ambient host object, builder style.
    pub fn with_helper(self, name: impl Into<String>, helper: impl HostObject + 'static) -> Self {
        self.with_ambient(name, Value::host(helper))
    }

    /// The view data bag.
    pub fn view_data(&self) -> &ViewData {
        &self.view_data
    }

    /// Resolves an ambient name. `ViewData` is always present.
    pub fn ambient(&self, name: &str) -> Option<Value> {
        if name == VIEW_DATA {
            let bag: Arc<dyn HostObject> = self.view_data.clone();
            return Some(Value::Host(bag));
        }
        self.ambient.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::types::TypeDecl;
    use crate::runtime::value::Record;

    #[test]
    fn test_lookup_string_entry() {
        let data = ViewData::new().with("Foo", "Hello World");
        assert_eq!(
            data.lookup("Foo", &ValueType::String),
            Ok(Value::from("Hello World"))
        );
    }

    #[test]
    fn test_lookup_missing_key() {
        let data = ViewData::new();
        assert_eq!(
            data.lookup("Foo", &ValueType::String),
            Err(BindingError::MissingKey { key: "Foo".into() })
        );
    }

    #[test]
    fn test_lookup_type_mismatch() {
        let data = ViewData::new().with("Count", "three");
        assert_eq!(
            data.lookup("Count", &ValueType::Number),
            Err(BindingError::TypeMismatch {
                key: "Count".into(),
                expected: "number".into(),
                found: "string".into(),
            })
        );
    }

    #[test]
    fn test_lookup_model_named_type() {
        let comment = ValueType::Named(Arc::new(TypeDecl::record("Comment", ["Text"])));
        let data = ViewData::with_model(Record::new("Comment").with("Text", "hi"));
        assert!(data.lookup_model(&comment).is_ok());
        assert_eq!(
            ViewData::new().lookup_model(&comment),
            Err(BindingError::MissingModel)
        );
    }

    #[test]
    fn test_view_data_is_always_ambient() {
        let context = RenderContext::new().with_view_data(ViewData::with_model(5));
        let Some(Value::Host(bag)) = context.ambient(VIEW_DATA) else {
            panic!("ViewData should resolve to a host object");
        };
        assert_eq!(bag.member(MODEL), Some(Value::Number(5.0)));
        assert_eq!(context.ambient("Html"), None);
    }

    #[test]
    fn test_from_json_object_fills_entries() {
        let data = ViewData::from_json(serde_json::json!({ "Foo": "bar", "N": 1 }));
        assert_eq!(data.get("Foo"), Some(&Value::from("bar")));
        assert_eq!(data.model(), None);
    }

    #[test]
    fn test_untyped_index_returns_null_for_missing_key() {
        let data = ViewData::new();
        assert_eq!(data.index(&Value::from("nope")), Some(Value::Null));
    }
}
