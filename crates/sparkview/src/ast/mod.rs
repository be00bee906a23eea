// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Abstract Syntax Tree (AST) definitions for view script.
//!
//! Every node carries the [`Span`] it was parsed from so the binder can
//! report diagnostics against the generated source.

use crate::lexer::Span;

/// A complete view-script unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewUnit {
    /// Hoisted global declarations, in source order
    pub globals: Vec<GlobalDeclaration>,
    /// The render body
    pub render: Block,
}

/// An identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    /// The name of the identifier
    pub name: String,
    /// Where it appears
    pub span: Span,
}

/// `global NAME = INIT;`
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDeclaration {
    /// The declared name
    pub id: Identifier,
    /// Initializer, evaluated once per instance
    pub init: Expression,
    /// The whole declaration
    pub span: Span,
}

/// A braced statement list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    /// The statements in the block
    pub body: Vec<Statement>,
}

/// A view-script statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `var NAME = INIT;`
    VariableDeclaration(VariableDeclaration),
    /// `NAME = VALUE;`
    Assignment(Assignment),
    /// `write(EXPR);`
    Write(Expression),
    /// `foreach (var NAME in EXPR) { ... }`
    Foreach(ForeachStatement),
    /// Nested block
    Block(Block),
    /// Empty statement (;)
    Empty,
}

/// A local variable declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    /// The identifier being declared
    pub id: Identifier,
    /// Initializer expression
    pub init: Expression,
}

/// An assignment to a visible variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Assignment target
    pub target: Identifier,
    /// Assigned value
    pub value: Expression,
}

/// A loop over the elements of a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeachStatement {
    /// Loop variable, scoped to the body
    pub binding: Identifier,
    /// The sequence being iterated
    pub iterable: Expression,
    /// Loop body
    pub body: Block,
}

/// Deepest expression tree the parser builds and the compiler accepts.
pub const MAX_EXPRESSION_DEPTH: usize = 512;

/// An expression with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// What kind of expression this is
    pub kind: ExpressionKind,
    /// Source range
    pub span: Span,
    depth: usize,
}

impl Expression {
    /// Creates an expression node.
    pub fn new(kind: ExpressionKind, span: Span) -> Self {
        let depth = 1 + kind.operands().map(Expression::depth).max().unwrap_or(0);
        Self { kind, span, depth }
    }

    /// Height of the tree rooted here; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl ExpressionKind {
    /// Direct subexpressions, left to right.
    pub fn operands(&self) -> Box<dyn Iterator<Item = &Expression> + '_> {
        match self {
            ExpressionKind::Literal(_) | ExpressionKind::Identifier(_) => {
                Box::new(std::iter::empty())
            }
            ExpressionKind::Array(items) => Box::new(items.iter()),
            ExpressionKind::Unary(unary) => Box::new(std::iter::once(&*unary.argument)),
            ExpressionKind::Binary(binary) => Box::new([&*binary.left, &*binary.right].into_iter()),
            ExpressionKind::Logical(logical) => {
                Box::new([&*logical.left, &*logical.right].into_iter())
            }
            ExpressionKind::Conditional(conditional) => Box::new(
                [
                    &*conditional.test,
                    &*conditional.consequent,
                    &*conditional.alternate,
                ]
                .into_iter(),
            ),
            ExpressionKind::Member(member) => Box::new(std::iter::once(&*member.object)),
            ExpressionKind::Index(index) => Box::new([&*index.object, &*index.index].into_iter()),
            ExpressionKind::Call(call) => {
                Box::new(std::iter::once(&*call.callee).chain(call.arguments.iter()))
            }
            ExpressionKind::As(conversion) => Box::new(std::iter::once(&*conversion.expression)),
        }
    }
}

/// View-script expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    /// Literal value
    Literal(Literal),
    /// Variable or ambient name
    Identifier(String),
    /// `[a, b, c]`
    Array(Vec<Expression>),
    /// Unary operation
    Unary(UnaryExpression),
    /// Binary operation
    Binary(BinaryExpression),
    /// `&&` and `||`
    Logical(LogicalExpression),
    /// `test ? a : b`
    Conditional(ConditionalExpression),
    /// `object.name`
    Member(MemberExpression),
    /// `object[index]`
    Index(IndexExpression),
    /// `callee(args)`
    Call(CallExpression),
    /// `expr as Type`
    As(AsExpression),
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Number literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// null
    Null,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// -
    Minus,
    /// !
    Not,
}

/// A unary expression.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    /// The operator
    pub operator: UnaryOperator,
    /// The operand
    pub argument: Box<Expression>,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// +
    Add,
    /// -
    Subtract,
    /// *
    Multiply,
    /// /
    Divide,
    /// %
    Modulo,
    /// ==
    Equal,
    /// !=
    NotEqual,
    /// <
    LessThan,
    /// <=
    LessThanEqual,
    /// >
    GreaterThan,
    /// >=
    GreaterThanEqual,
}

/// A binary expression.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    /// The operator
    pub operator: BinaryOperator,
    /// Left operand
    pub left: Box<Expression>,
    /// Right operand
    pub right: Box<Expression>,
}

/// Short-circuit operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    /// &&
    And,
    /// ||
    Or,
}

/// A short-circuit expression.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalExpression {
    /// The operator
    pub operator: LogicalOperator,
    /// Left operand
    pub left: Box<Expression>,
    /// Right operand, evaluated only when needed
    pub right: Box<Expression>,
}

/// A conditional (ternary) expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalExpression {
    /// The test
    pub test: Box<Expression>,
    /// Value when true
    pub consequent: Box<Expression>,
    /// Value when false
    pub alternate: Box<Expression>,
}

/// A member read.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpression {
    /// The receiver
    pub object: Box<Expression>,
    /// The member name
    pub property: Identifier,
}

/// An indexed read.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpression {
    /// The receiver
    pub object: Box<Expression>,
    /// The key
    pub index: Box<Expression>,
}

/// A call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    /// Called expression; must be a member expression
    pub callee: Box<Expression>,
    /// Arguments
    pub arguments: Vec<Expression>,
}

/// A checked conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct AsExpression {
    /// Converted value
    pub expression: Box<Expression>,
    /// Target type
    pub type_name: TypeName,
}

/// A dotted type name such as `Models.Comment`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    /// Path segments joined with `.`
    pub path: String,
    /// Source range
    pub span: Span,
}
