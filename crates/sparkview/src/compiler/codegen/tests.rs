//! Tests for the bytecode compiler.

use super::*;
use crate::parser::parse;
use crate::runtime::TypeDecl;

fn types() -> TypeRegistry {
    [TypeDecl::record("Models.Comment", ["Text"])]
        .into_iter()
        .collect()
}

fn compile_with(src: &str, ambient: &[String]) -> (Program, Diagnostics) {
    let (unit, parse_diagnostics) = parse(src);
    assert!(
        !parse_diagnostics.has_errors(),
        "parse errors: {:?}",
        parse_diagnostics.into_vec()
    );
    let types = types();
    Compiler::new(&types, ambient).compile(&unit)
}

fn compile_source(src: &str) -> (Program, Diagnostics) {
    compile_with(src, &[])
}

fn compile_ok(src: &str) -> Program {
    let (program, diagnostics) = compile_source(src);
    assert!(
        !diagnostics.has_errors(),
        "unexpected errors: {:?}",
        diagnostics.into_vec()
    );
    program
}

fn codes_of(src: &str) -> Vec<&'static str> {
    compile_source(src).1.iter().map(|d| d.code).collect()
}

fn opcodes(bytecode: &Bytecode) -> Vec<OpCode> {
    bytecode.instructions.iter().map(|i| i.opcode).collect()
}

#[test]
fn test_compiler_new() {
    let types = TypeRegistry::new();
    let compiler = Compiler::new(&types, &[]);
    assert!(compiler.bytecode.instructions.is_empty());
    assert!(!compiler.in_initializer);
}

#[test]
fn test_compile_empty_view() {
    let program = compile_ok("view { render { } }");
    assert_eq!(opcodes(&program.init), vec![OpCode::Halt]);
    assert_eq!(opcodes(&program.render), vec![OpCode::Halt]);
    assert_eq!(program.frame_size, 0);
}

#[test]
fn test_compile_write_literal() {
    let program = compile_ok(r#"view { render { write("<p>"); } }"#);
    assert_eq!(
        opcodes(&program.render),
        vec![OpCode::LoadConst, OpCode::Write, OpCode::Halt]
    );
}

#[test]
fn test_compile_arithmetic() {
    let program = compile_ok("view { render { write(3 + 4 * 2); } }");
    assert_eq!(
        opcodes(&program.render),
        vec![
            OpCode::LoadConst,
            OpCode::LoadConst,
            OpCode::LoadConst,
            OpCode::Mul,
            OpCode::Add,
            OpCode::Write,
            OpCode::Halt,
        ]
    );
}

#[test]
fn test_compile_globals_into_init_chunk() {
    let program = compile_ok(
        r#"view { global title = "hello"; global count = 3; render { write(title); } }"#,
    );
    assert_eq!(program.globals, vec!["title".to_string(), "count".to_string()]);
    assert_eq!(
        opcodes(&program.init),
        vec![
            OpCode::LoadConst,
            OpCode::StoreGlobal,
            OpCode::LoadConst,
            OpCode::StoreGlobal,
            OpCode::Halt,
        ]
    );
    assert_eq!(
        program.render.instructions[0],
        Instruction::with_operand(OpCode::LoadGlobal, Operand::Global(0))
    );
}

#[test]
fn test_compile_local_declaration() {
    let program = compile_ok("view { render { var x = 1; write(x); } }");
    assert_eq!(program.frame_size, 1);
    assert_eq!(
        program.render.instructions[1],
        Instruction::with_operand(OpCode::StoreLocal, Operand::Local(0))
    );
    assert_eq!(
        program.render.instructions[2],
        Instruction::with_operand(OpCode::LoadLocal, Operand::Local(0))
    );
}

#[test]
fn test_assignment_to_global() {
    let program = compile_ok("view { global item = 3; render { item = 8; } }");
    assert_eq!(
        program.render.instructions[1],
        Instruction::with_operand(OpCode::StoreGlobal, Operand::Global(0))
    );
}

#[test]
fn test_foreach_lowering() {
    let program = compile_ok("view { render { foreach (var x in [1, 2]) { write(x); } } }");
    assert_eq!(
        opcodes(&program.render),
        vec![
            OpCode::LoadConst,
            OpCode::LoadConst,
            OpCode::NewList,
            OpCode::IterInit,
            OpCode::IterNext,
            OpCode::StoreLocal,
            OpCode::LoadLocal,
            OpCode::Write,
            OpCode::Jump,
            OpCode::Halt,
        ]
    );
    assert_eq!(program.render.instructions[4].operand, Some(Operand::Jump(9)));
    assert_eq!(program.render.instructions[8].operand, Some(Operand::Jump(4)));
}

#[test]
fn test_foreach_variable_scoped_to_body() {
    let codes = codes_of("view { render { foreach (var x in [1]) { } write(x); } }");
    assert_eq!(codes, vec![codes::UNKNOWN_NAME]);
}

#[test]
fn test_sibling_loops_reuse_slots() {
    let program = compile_ok(
        "view { render { foreach (var a in [1]) { var b = a; } foreach (var c in [2]) { } } }",
    );
    assert_eq!(program.frame_size, 2);
}

#[test]
fn test_logical_and_short_circuits() {
    let program = compile_ok("view { render { write(true && false); } }");
    assert_eq!(
        opcodes(&program.render),
        vec![
            OpCode::LoadTrue,
            OpCode::JumpIfFalse,
            OpCode::LoadFalse,
            OpCode::CheckBool,
            OpCode::Jump,
            OpCode::LoadFalse,
            OpCode::Write,
            OpCode::Halt,
        ]
    );
    assert_eq!(program.render.instructions[1].operand, Some(Operand::Jump(5)));
    assert_eq!(program.render.instructions[4].operand, Some(Operand::Jump(6)));
}

#[test]
fn test_conditional_jumps() {
    let program = compile_ok(r#"view { render { write(1 < 2 ? "a" : "b"); } }"#);
    let ops = opcodes(&program.render);
    assert_eq!(ops[3], OpCode::JumpIfFalse);
    assert_eq!(program.render.instructions[3].operand, Some(Operand::Jump(6)));
    assert_eq!(program.render.instructions[5].operand, Some(Operand::Jump(7)));
}

#[test]
fn test_unknown_name() {
    assert_eq!(
        codes_of("view { render { write(missing); } }"),
        vec![codes::UNKNOWN_NAME]
    );
}

#[test]
fn test_unknown_assignment_target() {
    assert_eq!(
        codes_of("view { render { missing = 1; } }"),
        vec![codes::UNKNOWN_NAME]
    );
}

#[test]
fn test_assignment_to_view_data_is_rejected() {
    assert_eq!(
        codes_of("view { render { ViewData = 1; } }"),
        vec![codes::INVALID_ASSIGNMENT_TARGET]
    );
}

#[test]
fn test_ambient_name_loads_from_context() {
    let ambient = vec!["Html".to_string()];
    let (program, diagnostics) = compile_with("view { render { write(Html); } }", &ambient);
    assert!(diagnostics.is_empty());
    assert_eq!(program.render.instructions[0].opcode, OpCode::LoadAmbient);
    assert_eq!(
        program.render.constants[0].as_str(),
        Some("Html")
    );
}

#[test]
fn test_duplicate_global() {
    assert_eq!(
        codes_of("view { global a = 1; global a = 2; render { } }"),
        vec![codes::DUPLICATE_GLOBAL]
    );
}

#[test]
fn test_duplicate_local() {
    assert_eq!(
        codes_of("view { render { var a = 1; var a = 2; } }"),
        vec![codes::DUPLICATE_LOCAL]
    );
}

#[test]
fn test_local_hiding_global_is_a_warning() {
    let (_, diagnostics) = compile_source("view { global a = 1; render { var a = 2; } }");
    assert!(!diagnostics.has_errors());
    let codes: Vec<_> = diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![codes::LOCAL_HIDES_GLOBAL]);
}

#[test]
fn test_initializer_cannot_reference_names() {
    assert_eq!(
        codes_of("view { global a = 1; global b = a; render { } }"),
        vec![codes::INITIALIZER_REFERENCE]
    );
}

#[test]
fn test_call_requires_member_callee() {
    assert_eq!(
        codes_of("view { render { write((1)(2)); } }"),
        vec![codes::METHOD_NAME_EXPECTED]
    );
}

#[test]
fn test_view_data_entry_binding() {
    let program = compile_ok(r#"view { render { var Foo = ViewData["Foo"] as string; } }"#);
    assert_eq!(program.render.instructions[0].opcode, OpCode::BindViewData);
    assert_eq!(program.types, vec![ValueType::String]);
}

#[test]
fn test_view_data_model_binding() {
    let program =
        compile_ok("view { render { var Model = ViewData.Model as Models.Comment; write(Model.Text); } }");
    assert_eq!(
        program.render.instructions[0],
        Instruction::with_operand(OpCode::BindModel, Operand::Type(0))
    );
}

#[test]
fn test_shadowed_view_data_is_not_bound() {
    let program = compile_ok(
        r#"view { render { var ViewData = [1]; var x = ViewData["k"] as string; } }"#,
    );
    let ops = opcodes(&program.render);
    assert!(!ops.contains(&OpCode::BindViewData));
    assert!(ops.contains(&OpCode::Convert));
}

#[test]
fn test_plain_conversion() {
    let program = compile_ok(r#"view { render { var s = "x" as string; } }"#);
    assert_eq!(
        opcodes(&program.render),
        vec![OpCode::LoadConst, OpCode::Convert, OpCode::StoreLocal, OpCode::Halt]
    );
}

#[test]
fn test_unknown_type() {
    assert_eq!(
        codes_of(r#"view { render { var p = ViewData["p"] as Models.Post; } }"#),
        vec![codes::UNKNOWN_TYPE]
    );
}

#[test]
fn test_unknown_member_on_typed_local() {
    let diagnostics = codes_of(
        "view { render { var Model = ViewData.Model as Models.Comment; write(Model.Body); } }",
    );
    assert_eq!(diagnostics, vec![codes::UNKNOWN_MEMBER]);
}

#[test]
fn test_type_table_is_interned() {
    let program = compile_ok(
        r#"view { render { var a = ViewData["a"] as string; var b = ViewData["b"] as string; } }"#,
    );
    assert_eq!(program.types.len(), 1);
}

#[test]
fn test_all_errors_reported() {
    let codes = codes_of("view { render { write(a); write(b); c = 1; } }");
    assert_eq!(codes.len(), 3);
}

#[test]
fn test_constant_pool_beyond_u16() {
    let body: String = (0..70_000).map(|i| format!("write(\"<{}>\");", i)).collect();
    let program = compile_ok(&format!("view {{ render {{ {} }} }}", body));
    assert_eq!(program.render.constants.len(), 70_000);
    let last_load = &program.render.instructions[2 * 69_999];
    assert_eq!(last_load.operand, Some(Operand::Constant(69_999)));
    assert_eq!(program.render.constants[69_999], Value::from("<69999>"));
}

#[test]
fn test_large_list_count_operand() {
    let items = vec!["0"; 70_000].join(",");
    let program = compile_ok(&format!("view {{ render {{ write([{}].Count); }} }}", items));
    let new_list = program
        .render
        .instructions
        .iter()
        .find(|i| i.opcode == OpCode::NewList)
        .unwrap();
    assert_eq!(new_list.operand, Some(Operand::Count(70_000)));
}

#[test]
fn test_expression_deeper_than_limit() {
    let mut expr = Expression::new(ExpressionKind::Literal(Literal::Boolean(true)), Span::default());
    for _ in 0..MAX_EXPRESSION_DEPTH {
        expr = Expression::new(
            ExpressionKind::Unary(UnaryExpression {
                operator: UnaryOperator::Not,
                argument: Box::new(expr),
            }),
            Span::default(),
        );
    }
    assert_eq!(expr.depth(), MAX_EXPRESSION_DEPTH + 1);
    let unit = ViewUnit {
        globals: Vec::new(),
        render: Block {
            body: vec![Statement::Write(expr)],
        },
    };
    let types = types();
    let (_, diagnostics) = Compiler::new(&types, &[]).compile(&unit);
    let found: Vec<_> = diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(found, vec![codes::EXPRESSION_TOO_COMPLEX]);
}
