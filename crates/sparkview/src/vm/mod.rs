// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The bytecode virtual machine.
//!
//! A [`VM`] runs a [`Program`](crate::compiler::Program) in two phases:
//! [`initialize`](VM::initialize) evaluates the global initializers with no
//! render context, and [`render`](VM::render) executes the render body
//! against a context, appending to an output buffer.
//!
//! Values are strictly typed: conditions must be booleans, arithmetic
//! requires numbers (or a string operand for `+`), and a failed operation
//! aborts the whole render with a [`RenderError`](crate::RenderError).

mod interpreter;

pub use interpreter::VM;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{Compiler, Program};
    use crate::error::{BindingError, RenderError};
    use crate::parser::parse;
    use crate::runtime::{HostObject, Record, RenderContext, TypeDecl, TypeRegistry, Value, ViewData};

    fn program(src: &str) -> Program {
        let (unit, diagnostics) = parse(src);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics.into_vec());
        let types: TypeRegistry = [TypeDecl::record("Models.Comment", ["Text"])]
            .into_iter()
            .collect();
        let ambient = vec!["Html".to_string()];
        let (program, diagnostics) = Compiler::new(&types, &ambient).compile(&unit);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics.into_vec());
        program
    }

    fn run_with(src: &str, context: &RenderContext) -> Result<String, RenderError> {
        let program = program(src);
        let mut vm = VM::new(&program);
        let mut globals = vm.initialize()?;
        let mut out = String::new();
        vm.render(&mut globals, context, &mut out)?;
        Ok(out)
    }

    fn run(body: &str) -> Result<String, RenderError> {
        run_with(&format!("view {{ render {{ {} }} }}", body), &RenderContext::new())
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run("write(3 + 4);").unwrap(), "7");
        assert_eq!(run("write(10 - 4 * 2);").unwrap(), "2");
        assert_eq!(run("write(7 % 4);").unwrap(), "3");
        assert_eq!(run("write(1 / 4);").unwrap(), "0.25");
        assert_eq!(run("write(-(2));").unwrap(), "-2");
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(run(r#"write("a" + 1 + 2);"#).unwrap(), "a12");
        assert_eq!(run(r#"write(1 + 2 + "a");"#).unwrap(), "3a");
        assert_eq!(run(r#"write("x" + null);"#).unwrap(), "x");
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert_eq!(run("write(1 < 2 && 2 <= 2);").unwrap(), "true");
        assert_eq!(run(r#"write("a" == "a" || false);"#).unwrap(), "true");
        assert_eq!(run("write(!(1 > 2));").unwrap(), "true");
        assert_eq!(run(r#"write("b" > "a" ? "yes" : "no");"#).unwrap(), "yes");
    }

    #[test]
    fn test_short_circuit_skips_right_side() {
        // The right side would fail with a type error if it ran.
        assert_eq!(run("write(false && 1 < null);").unwrap(), "false");
        assert_eq!(run("write(true || 1 < null);").unwrap(), "true");
    }

    #[test]
    fn test_conditions_must_be_boolean() {
        assert!(matches!(run("write(1 ? 2 : 3);"), Err(RenderError::Type(_))));
        assert!(matches!(run("write(true && 1);"), Err(RenderError::Type(_))));
        assert!(matches!(run(r#"write(1 - "a");"#), Err(RenderError::Type(_))));
    }

    #[test]
    fn test_foreach_and_locals() {
        let out = run(
            r#"var total = 0; foreach (var n in [1, 2, 3]) { total = total + n; write(n); } write(":" + total);"#,
        )
        .unwrap();
        assert_eq!(out, "123:6");
    }

    #[test]
    fn test_nested_foreach() {
        let out = run("foreach (var a in [1, 2]) { foreach (var b in [3, 4]) { write(a * b); } }")
            .unwrap();
        assert_eq!(out, "3468");
    }

    #[test]
    fn test_foreach_over_non_sequence() {
        assert_eq!(
            run("foreach (var a in 5) { }"),
            Err(RenderError::NotIterable("number".into()))
        );
    }

    #[test]
    fn test_globals_initialized_before_render() {
        let out = run_with(
            r#"view { global title = "hi"; global n = 1; render { n = n + 1; write(title); write(n); } }"#,
            &RenderContext::new(),
        )
        .unwrap();
        assert_eq!(out, "hi2");
    }

    #[test]
    fn test_list_members_and_indexing() {
        assert_eq!(run("write([4, 5, 6].Count);").unwrap(), "3");
        assert_eq!(run("write([4, 5, 6][1]);").unwrap(), "5");
        assert!(matches!(run("write([4][3]);"), Err(RenderError::Type(_))));
        assert_eq!(run(r#"write("abc".ToUpper());"#).unwrap(), "ABC");
    }

    #[test]
    fn test_null_member_access() {
        assert_eq!(
            run("write(null.Text);"),
            Err(RenderError::NullReference("Text".into()))
        );
    }

    #[test]
    fn test_view_data_bindings() {
        let data = ViewData::with_model(Record::new("Comment").with("Text", "MyCommentText"))
            .with("Foo", "Hello World");
        let context = RenderContext::new().with_view_data(data);
        let out = run_with(
            r#"view { render {
                var Foo = ViewData["Foo"] as string;
                var Model = ViewData.Model as Models.Comment;
                write(Foo + "-" + Model.Text);
            } }"#,
            &context,
        )
        .unwrap();
        assert_eq!(out, "Hello World-MyCommentText");
    }

    #[test]
    fn test_binding_failures() {
        let src = r#"view { render { var Foo = ViewData["Foo"] as string; } }"#;
        assert_eq!(
            run_with(src, &RenderContext::new()),
            Err(RenderError::Binding(BindingError::MissingKey { key: "Foo".into() }))
        );
        let context = RenderContext::new().with_view_data(ViewData::new().with("Foo", 3));
        assert!(matches!(
            run_with(src, &context),
            Err(RenderError::Binding(BindingError::TypeMismatch { .. }))
        ));
    }

    #[test]
    fn test_untyped_view_data_access() {
        let context =
            RenderContext::new().with_view_data(ViewData::new().with("Foo", "bar"));
        let out = run_with(
            r#"view { render { write(ViewData["Foo"]); write(ViewData["Nope"]); write(ViewData.ContainsKey("Foo")); } }"#,
            &context,
        )
        .unwrap();
        assert_eq!(out, "bartrue");
    }

    #[derive(Debug)]
    struct Html;

    impl HostObject for Html {
        fn type_name(&self) -> &str {
            "HtmlHelper"
        }

        fn call(&self, method: &str, args: &[Value]) -> Result<Value, String> {
            match (method, args) {
                ("ActionLink", [text, action]) => Ok(Value::from(format!(
                    "<a href=\"/Home/{}\">{}</a>",
                    action, text
                ))),
                _ => Err(format!("no method {}", method)),
            }
        }
    }

    #[test]
    fn test_host_helper_call() {
        let context = RenderContext::new().with_helper("Html", Html);
        let out = run_with(
            r#"view { render { write(Html.ActionLink("Click me", "Reboot")); } }"#,
            &context,
        )
        .unwrap();
        assert_eq!(out, r#"<a href="/Home/Reboot">Click me</a>"#);
    }

    #[test]
    fn test_host_failure_and_missing_ambient() {
        let src = r#"view { render { write(Html.Nope()); } }"#;
        assert_eq!(
            run_with(src, &RenderContext::new()),
            Err(RenderError::MissingAmbient("Html".into()))
        );
        let context = RenderContext::new().with_helper("Html", Html);
        assert!(matches!(
            run_with(src, &context),
            Err(RenderError::Host { .. })
        ));
    }

    #[test]
    fn test_unknown_member_at_runtime() {
        let context = RenderContext::new().with_helper("Html", Html);
        assert_eq!(
            run_with(r#"view { render { write(Html.Title); } }"#, &context),
            Err(RenderError::UnknownMember {
                type_name: "HtmlHelper".into(),
                member: "Title".into(),
            })
        );
    }
}
