// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Code generation from chunk trees to view-script source.
//!
//! Generation runs in two passes over the tree:
//!
//! 1. **Hoisting.** Every `GlobalVariable` chunk, wherever it sits and
//!    however deeply it is nested, becomes a `global NAME = INIT;`
//!    declaration in the unit header. Globals are initialized when an
//!    instance is created, so every statement of the render body observes
//!    their initial values regardless of chunk order.
//! 2. **Emission.** The render body is emitted in sequence order. A
//!    `GlobalVariable` chunk leaves only a comment behind.
//!
//! Expression fragments are copied into the output untouched; the build
//! pipeline is responsible for diagnosing them.

mod escape;

pub use escape::{escape_literal, string_literal};

use tracing::{debug, trace};

use crate::chunk::Chunk;
use crate::runtime::context::{MODEL, VIEW_DATA};
use crate::scope::{Binding, ScopeTracker};

const INDENT: &str = "    ";

/// A global lifted out of the chunk tree into the instance header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoistedGlobal {
    /// Variable name
    pub name: String,
    /// Initializer fragment
    pub init: String,
    /// Index path of the chunk that declared it
    pub chunk: Vec<usize>,
}

/// Maps generated source lines back to the chunk that produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    // Indexed by 0-based line.
    lines: Vec<Option<Vec<usize>>>,
}

impl SourceMap {
    /// The chunk index path of a 1-based line, if a chunk produced it.
    pub fn chunk_at(&self, line: usize) -> Option<&[usize]> {
        line.checked_sub(1)
            .and_then(|index| self.lines.get(index))
            .and_then(|entry| entry.as_deref())
    }

    /// Number of lines covered.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns true if no lines are covered.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn record(&mut self, chunk: Option<&[usize]>) {
        self.lines.push(chunk.map(<[usize]>::to_vec));
    }
}

/// The result of code generation: view-script source plus the metadata the
/// build pipeline needs to report diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedView {
    /// Label used in the header and in diagnostics
    pub view_name: String,
    /// The view-script source text
    pub source: String,
    /// Hoisted globals, in tree order
    pub globals: Vec<HoistedGlobal>,
    /// Line to chunk mapping
    pub source_map: SourceMap,
}

/// Generates view-script source for a chunk tree.
///
/// Output is deterministic for a given tree and view name.
pub fn generate(view_name: &str, chunks: &[Chunk]) -> GeneratedView {
    let mut generator = Generator::new();
    let globals = generator.hoist(chunks);
    generator.emit_unit(view_name, chunks, &globals);

    debug!(
        view = view_name,
        bytes = generator.out.len(),
        lines = generator.map.len(),
        globals = globals.len(),
        "generated view source"
    );

    GeneratedView {
        view_name: view_name.to_string(),
        source: generator.out,
        globals,
        source_map: generator.map,
    }
}

/// Walks a chunk tree and writes source.
struct Generator {
    out: String,
    map: SourceMap,
    depth: usize,
    scope: ScopeTracker,
    path: Vec<usize>,
}

impl Generator {
    fn new() -> Self {
        Self {
            out: String::new(),
            map: SourceMap::default(),
            depth: 0,
            scope: ScopeTracker::new(),
            path: Vec::new(),
        }
    }

    // ========================================================================
    // Pass 1: hoisting
    // ========================================================================

    /// Collects every `GlobalVariable` in the tree, nested bodies included.
    fn hoist(&mut self, chunks: &[Chunk]) -> Vec<HoistedGlobal> {
        let mut globals = Vec::new();
        let mut path = Vec::new();
        self.collect_globals(chunks, &mut path, &mut globals);
        globals
    }

    fn collect_globals(
        &mut self,
        chunks: &[Chunk],
        path: &mut Vec<usize>,
        globals: &mut Vec<HoistedGlobal>,
    ) {
        for (index, chunk) in chunks.iter().enumerate() {
            path.push(index);
            match chunk {
                Chunk::GlobalVariable { name, value } => {
                    // Duplicates are kept; the compiler reports them.
                    if self.scope.declare_global(name, None).is_err() {
                        trace!(name = name.as_str(), "duplicate global, deferring to compiler");
                    }
                    globals.push(HoistedGlobal {
                        name: name.clone(),
                        init: value.clone(),
                        chunk: path.clone(),
                    });
                }
                Chunk::ForEach { body, .. } => self.collect_globals(body, path, globals),
                _ => {}
            }
            path.pop();
        }
    }

    // ========================================================================
    // Pass 2: emission
    // ========================================================================

    fn emit_unit(&mut self, view_name: &str, chunks: &[Chunk], globals: &[HoistedGlobal]) {
        self.line(&format!("// Generated view '{}'", header_safe(view_name)), None);
        self.line("view {", None);
        self.depth += 1;

        for global in globals {
            let text = format!("global {} = {};", global.name, global.init);
            self.line(&text, Some(global.chunk.as_slice()));
        }
        if !globals.is_empty() {
            self.line("", None);
        }

        self.line("render {", None);
        self.depth += 1;
        self.scope.push_frame();
        self.emit_chunks(chunks);
        self.scope.pop_frame();
        self.depth -= 1;
        self.line("}", None);

        self.depth -= 1;
        self.line("}", None);
    }

    fn emit_chunks(&mut self, chunks: &[Chunk]) {
        for (index, chunk) in chunks.iter().enumerate() {
            self.path.push(index);
            self.emit_chunk(chunk);
            self.path.pop();
        }
    }

    fn emit_chunk(&mut self, chunk: &Chunk) {
        match chunk {
            Chunk::SendLiteral { text } => {
                if !text.is_empty() {
                    self.statement(&format!("write({});", string_literal(text)));
                }
            }
            Chunk::SendExpression { code } => {
                self.statement(&format!("write({});", code));
            }
            Chunk::LocalVariable { name, value } => {
                self.declare_local(name);
                self.statement(&format!("var {} = {};", name, value));
            }
            Chunk::GlobalVariable { name, .. } => {
                self.statement(&format!("// global {} (hoisted)", name));
            }
            Chunk::AssignVariable { name, value } => {
                match self.scope.resolve(name) {
                    Some(Binding::Global(_)) => trace!(name = name.as_str(), "assign global"),
                    Some(Binding::Local(_)) => trace!(name = name.as_str(), "assign local"),
                    None => trace!(name = name.as_str(), "assign to undeclared name"),
                }
                self.statement(&format!("{} = {};", name, value));
            }
            Chunk::ForEach { code, body } => {
                self.statement(&format!("foreach ({}) {{", code));
                self.depth += 1;
                self.scope.push_frame();
                if let Some(variable) = loop_variable(code) {
                    self.declare_local(variable);
                }
                self.emit_chunks(body);
                self.scope.pop_frame();
                self.depth -= 1;
                self.statement("}");
            }
            Chunk::ViewData { name, type_name } => {
                self.declare_local(name);
                self.statement(&format!(
                    "var {} = {}[{}] as {};",
                    name,
                    VIEW_DATA,
                    string_literal(name),
                    type_name
                ));
            }
            Chunk::ViewDataModel { model_type } => {
                self.declare_local(MODEL);
                self.statement(&format!(
                    "var {} = {}.{} as {};",
                    MODEL, VIEW_DATA, MODEL, model_type
                ));
            }
        }
    }

    fn declare_local(&mut self, name: &str) {
        if self.scope.declare_local(name, None).is_err() {
            trace!(name, "duplicate local, deferring to compiler");
        }
    }

    /// Writes a line attributed to the chunk currently being emitted.
    fn statement(&mut self, text: &str) {
        let path = std::mem::take(&mut self.path);
        self.line(text, Some(path.as_slice()));
        self.path = path;
    }

    /// Writes `text` at the current indentation. Fragments that span
    /// several lines map every line to the same chunk.
    fn line(&mut self, text: &str, chunk: Option<&[usize]>) {
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str(INDENT);
            }
        }
        self.out.push_str(text);
        self.out.push('\n');
        for _ in 0..=text.matches('\n').count() {
            self.map.record(chunk);
        }
    }
}

/// Extracts the loop variable from a `[var] NAME in EXPR` fragment.
fn loop_variable(code: &str) -> Option<&str> {
    let mut words = code.split_whitespace();
    let mut name = words.next()?;
    if name == "var" {
        name = words.next()?;
    }
    let is_identifier = name.chars().next().is_some_and(|c| c == '_' || c.is_alphabetic())
        && name.chars().all(|c| c == '_' || c.is_alphanumeric());
    (is_identifier && words.next() == Some("in")).then_some(name)
}

/// Keeps the header comment on one line.
fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_lines(view: &GeneratedView) -> Vec<String> {
        let lines: Vec<&str> = view.source.lines().collect();
        let start = lines
            .iter()
            .position(|line| line.trim() == "render {")
            .expect("render block");
        lines[start + 1..lines.len() - 2]
            .iter()
            .map(|line| line.trim().to_string())
            .collect()
    }

    #[test]
    fn test_unit_layout() {
        let view = generate("index", &[Chunk::expression("3 + 4")]);
        assert_eq!(
            view.source,
            "// Generated view 'index'\n\
             view {\n\
             \x20   render {\n\
             \x20       write(3 + 4);\n\
             \x20   }\n\
             }\n"
        );
    }

    #[test]
    fn test_literal_is_escaped() {
        let view = generate("v", &[Chunk::literal("hello\t\r\n\"world")]);
        assert!(view.source.contains(r#"write("hello\t\r\n\"world");"#));
    }

    #[test]
    fn test_empty_literal_emits_nothing() {
        let view = generate("v", &[Chunk::literal(""), Chunk::literal("x")]);
        assert_eq!(body_lines(&view), vec![r#"write("x");"#]);
    }

    #[test]
    fn test_statements_in_sequence_order() {
        let view = generate(
            "v",
            &[
                Chunk::local("i", "5"),
                Chunk::assign("i", "i + 1"),
                Chunk::expression("i"),
            ],
        );
        assert_eq!(body_lines(&view), vec!["var i = 5;", "i = i + 1;", "write(i);"]);
    }

    #[test]
    fn test_globals_are_hoisted_to_header() {
        let chunks = vec![
            Chunk::expression("title"),
            Chunk::assign("item", "8"),
            Chunk::literal(":"),
            Chunk::expression("item"),
            Chunk::global("title", "\"hello world\""),
            Chunk::global("item", "3"),
        ];
        let view = generate("v", &chunks);

        let header: Vec<&str> = view.source.lines().skip(2).take(2).map(str::trim).collect();
        assert_eq!(header, vec![r#"global title = "hello world";"#, "global item = 3;"]);
        assert_eq!(
            body_lines(&view),
            vec![
                "write(title);",
                "item = 8;",
                r#"write(":");"#,
                "write(item);",
                "// global title (hoisted)",
                "// global item (hoisted)",
            ]
        );
        assert_eq!(view.globals[1].name, "item");
        assert_eq!(view.globals[1].chunk, vec![5]);
    }

    #[test]
    fn test_nested_globals_are_hoisted() {
        let chunks = vec![Chunk::for_each(
            "x in xs",
            vec![Chunk::global("seen", "0")],
        )];
        let view = generate("v", &chunks);
        assert_eq!(view.globals.len(), 1);
        assert_eq!(view.globals[0].chunk, vec![0, 0]);
        assert!(view.source.contains("    global seen = 0;\n"));
    }

    #[test]
    fn test_foreach_lowering() {
        let chunks = vec![
            Chunk::literal("<ul>"),
            Chunk::for_each(
                "var item in items",
                vec![Chunk::literal("<li>"), Chunk::expression("item")],
            ),
        ];
        let view = generate("v", &chunks);
        assert!(view.source.contains(
            "        foreach (var item in items) {\n            write(\"<li>\");\n            write(item);\n        }\n"
        ));
    }

    #[test]
    fn test_view_data_bindings() {
        let view = generate(
            "v",
            &[
                Chunk::view_data("Foo", "string"),
                Chunk::view_data_model("Models.Comment"),
            ],
        );
        assert_eq!(
            body_lines(&view),
            vec![
                r#"var Foo = ViewData["Foo"] as string;"#,
                "var Model = ViewData.Model as Models.Comment;",
            ]
        );
    }

    #[test]
    fn test_source_map_points_at_chunks() {
        let chunks = vec![
            Chunk::literal("a"),
            Chunk::for_each("x in xs", vec![Chunk::expression("x")]),
            Chunk::global("g", "1"),
        ];
        let view = generate("v", &chunks);
        let line_of = |needle: &str| {
            view.source
                .lines()
                .position(|line| line.contains(needle))
                .map(|i| i + 1)
                .expect("line present")
        };
        assert_eq!(view.source_map.chunk_at(line_of("global g")), Some(&[2][..]));
        assert_eq!(view.source_map.chunk_at(line_of("write(\"a\")")), Some(&[0][..]));
        assert_eq!(view.source_map.chunk_at(line_of("write(x)")), Some(&[1, 0][..]));
        assert_eq!(view.source_map.chunk_at(1), None);
        assert_eq!(view.source_map.chunk_at(0), None);
    }

    #[test]
    fn test_multiline_fragment_keeps_map_aligned() {
        let chunks = vec![Chunk::expression("1 +\n2"), Chunk::expression("after")];
        let view = generate("v", &chunks);
        let after = view
            .source
            .lines()
            .position(|line| line.contains("write(after)"))
            .map(|i| i + 1)
            .expect("line present");
        assert_eq!(view.source_map.chunk_at(after), Some(&[1][..]));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let chunks = vec![
            Chunk::global("a", "1"),
            Chunk::for_each("x in [1, 2]", vec![Chunk::expression("x + a")]),
        ];
        assert_eq!(generate("v", &chunks), generate("v", &chunks));
    }

    #[test]
    fn test_loop_variable_parsing() {
        assert_eq!(loop_variable("item in items"), Some("item"));
        assert_eq!(loop_variable("var item in Model.Items"), Some("item"));
        assert_eq!(loop_variable("var in items"), None);
        assert_eq!(loop_variable("item of items"), None);
    }

    #[test]
    fn test_header_stays_on_one_line() {
        let view = generate("a\nb", &[]);
        assert!(view.source.starts_with("// Generated view 'a b'\nview {\n"));
    }
}
