// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compiler configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::runtime::{TypeDecl, TypeRegistry};
use crate::view::RenderPolicy;

/// Prefix of the environment variables read by
/// [`load_from_env`](CompilerOptions::load_from_env).
pub const ENV_PREFIX: &str = "SPARKVIEW_";

/// Options for compiling views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Label used in generated headers and diagnostics
    pub view_name: String,

    /// Ambient names expression fragments may reference besides `ViewData`
    pub ambient: Vec<String>,

    /// Named record types available to `as` conversions
    pub types: Vec<TypeDecl>,

    /// What an instance does when rendered twice
    pub render_policy: RenderPolicy,

    /// Initial capacity of the output buffer
    pub output_capacity: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            view_name: "view".to_string(),
            ambient: Vec::new(),
            types: Vec::new(),
            render_policy: RenderPolicy::default(),
            output_capacity: 1024,
        }
    }
}

impl CompilerOptions {
    /// Parses options from JSON. Missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Applies `SPARKVIEW_*` environment variables on top of these options.
    pub fn load_from_env(&mut self) -> Result<(), ConfigError> {
        for (key, value) in std::env::vars() {
            if let Some(option) = key.strip_prefix(ENV_PREFIX) {
                self.set(&option.to_lowercase(), &value)?;
            }
        }
        Ok(())
    }

    /// Sets one option from its string form.
    ///
    /// `ambient` takes a comma separated list, `render_policy` takes
    /// `single_use` or `reinitialize`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "view_name" => self.view_name = value.to_string(),
            "ambient" => {
                self.ambient = value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "render_policy" => self.render_policy = value.parse().map_err(|_| invalid())?,
            "output_capacity" => self.output_capacity = value.parse().map_err(|_| invalid())?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Sets the view name, builder style.
    pub fn with_view_name(mut self, name: impl Into<String>) -> Self {
        self.view_name = name.into();
        self
    }

    /// Adds an ambient name, builder style.
    pub fn with_ambient(mut self, name: impl Into<String>) -> Self {
        self.ambient.push(name.into());
        self
    }

    /// Registers a record type, builder style.
    pub fn with_type(mut self, decl: TypeDecl) -> Self {
        self.types.push(decl);
        self
    }

    /// Sets the re-render policy, builder style.
    pub fn with_render_policy(mut self, policy: RenderPolicy) -> Self {
        self.render_policy = policy;
        self
    }

    /// Builds the type registry for a compilation.
    pub fn type_registry(&self) -> TypeRegistry {
        self.types.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CompilerOptions::default();
        assert_eq!(options.view_name, "view");
        assert_eq!(options.output_capacity, 1024);
        assert_eq!(options.render_policy, RenderPolicy::SingleUse);
        assert!(options.ambient.is_empty());
    }

    #[test]
    fn test_from_json_keeps_missing_defaults() {
        let options = CompilerOptions::from_json_str(
            r#"{
                "ambient": ["Html"],
                "render_policy": "reinitialize",
                "types": [{ "name": "Models.Comment", "fields": ["Text"] }]
            }"#,
        )
        .unwrap();
        assert_eq!(options.ambient, vec!["Html".to_string()]);
        assert_eq!(options.render_policy, RenderPolicy::Reinitialize);
        assert_eq!(options.view_name, "view");
        assert!(options.type_registry().resolve("Comment").is_some());
    }

    #[test]
    fn test_from_json_rejects_bad_policy() {
        assert!(matches!(
            CompilerOptions::from_json_str(r#"{ "render_policy": "twice" }"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_set_values() {
        let mut options = CompilerOptions::default();
        options.set("ambient", "Html, Url,").unwrap();
        options.set("output_capacity", "64").unwrap();
        options.set("render_policy", "reinitialize").unwrap();
        assert_eq!(options.ambient, vec!["Html".to_string(), "Url".to_string()]);
        assert_eq!(options.output_capacity, 64);
        assert_eq!(options.render_policy, RenderPolicy::Reinitialize);
    }

    #[test]
    fn test_set_errors() {
        let mut options = CompilerOptions::default();
        assert!(matches!(
            options.set("output_capacity", "lots"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            options.set("colour", "blue"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_builders() {
        let options = CompilerOptions::default()
            .with_view_name("index")
            .with_ambient("Html")
            .with_type(TypeDecl::open("Bag"))
            .with_render_policy(RenderPolicy::Reinitialize);
        assert_eq!(options.view_name, "index");
        assert_eq!(options.ambient, vec!["Html".to_string()]);
        assert_eq!(options.types.len(), 1);
        assert_eq!(options.render_policy, RenderPolicy::Reinitialize);
    }
}
