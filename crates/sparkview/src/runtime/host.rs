// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Objects supplied by the host environment.

use std::fmt;

use super::value::Value;

/// An object the host exposes to expression fragments, such as a link
/// helper or the view data bag.
///
/// Every method has a default so hosts implement only what they support.
/// `None` from [`member`](HostObject::member) is reported to the view as an
/// unknown member.
pub trait HostObject: Send + Sync + fmt::Debug {
    /// Name used in error messages and as the default display text.
    fn type_name(&self) -> &str;

    /// Reads a member (`obj.name`).
    fn member(&self, name: &str) -> Option<Value> {
        let _ = name;
        None
    }

    /// Reads an indexed element (`obj[key]`).
    fn index(&self, key: &Value) -> Option<Value> {
        let _ = key;
        None
    }

    /// Calls a method (`obj.method(args)`).
    fn call(&self, method: &str, args: &[Value]) -> Result<Value, String> {
        let _ = args;
        Err(format!(
            "'{}' does not contain a method named '{}'",
            self.type_name(),
            method
        ))
    }

    /// Elements to visit when the object is used as a `foreach` source.
    fn iterate(&self) -> Option<Vec<Value>> {
        None
    }

    /// Text written when the object itself is sent to the output.
    fn display(&self) -> String {
        self.type_name().to_string()
    }
}
