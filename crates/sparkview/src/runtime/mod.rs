// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Runtime values, types and the render context.

pub mod context;
pub mod host;
pub mod types;
pub mod value;

pub use context::{RenderContext, ViewData};
pub use host::HostObject;
pub use types::{TypeDecl, TypeRegistry, ValueType};
pub use value::{Record, Value};
