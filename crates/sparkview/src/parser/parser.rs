// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The main parser implementation.

use crate::ast::*;
use crate::diagnostics::{Diagnostics, codes};
use crate::lexer::{Scanner, Span, Token, TokenKind};

/// Marker for a syntax error that has already been recorded as a
/// diagnostic. The caller recovers by synchronizing.
#[derive(Debug)]
struct Recover;

type ParseResult<T> = Result<T, Recover>;

/// How deep parentheses, unary operators, conditionals and blocks may nest.
const MAX_NESTING: usize = 64;

/// A recursive descent parser for view script.
///
/// The parser never gives up on the first error: it records a diagnostic,
/// skips to the next statement boundary and carries on, so a single pass
/// reports every syntax error in the unit.
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    current: Token,
    previous: Token,
    diagnostics: Diagnostics,
    last_error_at: Option<usize>,
    /// Current recursion depth
    nesting: usize,
    too_complex_reported: bool,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given source code.
    pub fn new(source: &'a str) -> Self {
        let mut scanner = Scanner::new(source);
        let current = scanner.next_token();
        Self {
            scanner,
            current,
            previous: Token::new(TokenKind::Eof, Span::new(0, 0)),
            diagnostics: Diagnostics::new(),
            last_error_at: None,
            nesting: 0,
            too_complex_reported: false,
        }
    }

    /// Parses a whole unit. Always returns a tree; check
    /// [`finish`](Parser::finish) for errors.
    pub fn parse_unit(&mut self) -> ViewUnit {
        let _ = self.expect(&TokenKind::View);
        let _ = self.expect(&TokenKind::LeftBrace);

        let mut globals = Vec::new();
        while self.check(&TokenKind::Global) {
            match self.parse_global() {
                Ok(global) => globals.push(global),
                Err(Recover) => self.synchronize(),
            }
        }

        let render = if self.expect(&TokenKind::Render).is_ok() || self.check(&TokenKind::LeftBrace) {
            self.parse_block()
        } else {
            Block::default()
        };

        let _ = self.expect(&TokenKind::RightBrace);
        if !self.is_at_end() {
            self.report_at(
                codes::TOKEN_EXPECTED,
                "Syntax error, end of file expected".to_string(),
                self.current.span,
            );
        }

        ViewUnit { globals, render }
    }

    /// Consumes the parser, returning every lexical and syntax diagnostic.
    pub fn finish(self) -> Diagnostics {
        let mut diagnostics = self.scanner.into_diagnostics();
        diagnostics.extend(self.diagnostics);
        diagnostics
    }

    fn parse_global(&mut self) -> ParseResult<GlobalDeclaration> {
        let start = self.current.span;
        self.advance(); // consume 'global'
        let id = self.expect_identifier()?;
        self.expect(&TokenKind::Equal)?;
        let init = self.parse_expression()?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(GlobalDeclaration {
            id,
            init,
            span: start.to(self.previous.span),
        })
    }

    fn parse_block(&mut self) -> Block {
        let mut body = Vec::new();
        if self.expect(&TokenKind::LeftBrace).is_err() {
            return Block { body };
        }

        self.nesting += 1;
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            match self.parse_statement() {
                Ok(statement) => body.push(statement),
                Err(Recover) => self.synchronize(),
            }
        }
        self.nesting -= 1;

        let _ = self.expect(&TokenKind::RightBrace);
        Block { body }
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        match &self.current.kind {
            TokenKind::LeftBrace | TokenKind::Foreach if self.nesting >= MAX_NESTING => {
                self.too_complex(self.current.span);
                // Step past the opener so recovery makes progress.
                self.advance();
                Err(Recover)
            }
            TokenKind::Var => self.parse_variable_declaration(),
            TokenKind::Write => self.parse_write_statement(),
            TokenKind::Foreach => self.parse_foreach_statement(),
            TokenKind::LeftBrace => Ok(Statement::Block(self.parse_block())),
            TokenKind::Semicolon => {
                self.advance();
                Ok(Statement::Empty)
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_variable_declaration(&mut self) -> ParseResult<Statement> {
        self.advance(); // consume 'var'
        let id = self.expect_identifier()?;
        self.expect(&TokenKind::Equal)?;
        let init = self.parse_expression()?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(Statement::VariableDeclaration(VariableDeclaration { id, init }))
    }

    fn parse_write_statement(&mut self) -> ParseResult<Statement> {
        self.advance(); // consume 'write'
        self.expect(&TokenKind::LeftParen)?;
        let argument = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(Statement::Write(argument))
    }

    fn parse_foreach_statement(&mut self) -> ParseResult<Statement> {
        self.advance(); // consume 'foreach'
        self.expect(&TokenKind::LeftParen)?;
        if self.check(&TokenKind::Var) {
            self.advance();
        }
        let binding = self.expect_identifier()?;
        self.expect(&TokenKind::In)?;
        let iterable = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let body = self.parse_block();
        Ok(Statement::Foreach(ForeachStatement {
            binding,
            iterable,
            body,
        }))
    }

    fn parse_expression_statement(&mut self) -> ParseResult<Statement> {
        let expression = self.parse_expression()?;

        if !self.check(&TokenKind::Equal) {
            self.report_at(
                codes::NOT_A_STATEMENT,
                "Only assignment and write can be used as a statement".to_string(),
                expression.span,
            );
            self.expect(&TokenKind::Semicolon)?;
            return Ok(Statement::Empty);
        }
        self.advance(); // consume '='

        let target = match expression.kind {
            ExpressionKind::Identifier(name) => Identifier {
                name,
                span: expression.span,
            },
            _ => {
                self.report_at(
                    codes::INVALID_ASSIGNMENT_TARGET,
                    "The left-hand side of an assignment must be a variable".to_string(),
                    expression.span,
                );
                return Err(Recover);
            }
        };

        let value = self.parse_expression()?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(Statement::Assignment(Assignment { target, value }))
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> ParseResult<Expression> {
        self.enter()?;
        let result = self.parse_conditional_inner();
        self.nesting -= 1;
        result
    }

    fn parse_conditional_inner(&mut self) -> ParseResult<Expression> {
        let test = self.parse_logical_or()?;

        if self.check(&TokenKind::Question) {
            self.advance(); // consume '?'
            let consequent = self.parse_conditional()?;
            self.expect(&TokenKind::Colon)?;
            let alternate = self.parse_conditional()?;
            let span = test.span.to(alternate.span);
            return self.limit_depth(Expression::new(
                ExpressionKind::Conditional(ConditionalExpression {
                    test: Box::new(test),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                }),
                span,
            ));
        }

        Ok(test)
    }

    fn parse_logical_or(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_logical_and()?;

        while self.check(&TokenKind::PipePipe) {
            self.advance();
            let right = self.parse_logical_and()?;
            left = self.limit_depth(logical(LogicalOperator::Or, left, right))?;
        }

        Ok(left)
    }

    fn parse_logical_and(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_equality()?;

        while self.check(&TokenKind::AmpersandAmpersand) {
            self.advance();
            let right = self.parse_equality()?;
            left = self.limit_depth(logical(LogicalOperator::And, left, right))?;
        }

        Ok(left)
    }

    fn parse_equality(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_relational()?;

        loop {
            let operator = match self.current.kind {
                TokenKind::EqualEqual => BinaryOperator::Equal,
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = self.limit_depth(binary(operator, left, right))?;
        }

        Ok(left)
    }

    fn parse_relational(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_additive()?;

        loop {
            let operator = match self.current.kind {
                TokenKind::LessThan => BinaryOperator::LessThan,
                TokenKind::LessThanEqual => BinaryOperator::LessThanEqual,
                TokenKind::GreaterThan => BinaryOperator::GreaterThan,
                TokenKind::GreaterThanEqual => BinaryOperator::GreaterThanEqual,
                TokenKind::As => {
                    self.advance();
                    let type_name = self.parse_type_name()?;
                    let span = left.span.to(type_name.span);
                    left = self.limit_depth(Expression::new(
                        ExpressionKind::As(AsExpression {
                            expression: Box::new(left),
                            type_name,
                        }),
                        span,
                    ))?;
                    continue;
                }
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = self.limit_depth(binary(operator, left, right))?;
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let operator = match self.current.kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.limit_depth(binary(operator, left, right))?;
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_unary()?;

        loop {
            let operator = match self.current.kind {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                TokenKind::Percent => BinaryOperator::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.limit_depth(binary(operator, left, right))?;
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let operator = match self.current.kind {
            TokenKind::Minus => UnaryOperator::Minus,
            TokenKind::Bang => UnaryOperator::Not,
            _ => return self.parse_postfix(),
        };
        let start = self.current.span;
        self.advance();
        self.enter()?;
        let argument = self.parse_unary();
        self.nesting -= 1;
        let argument = argument?;
        let span = start.to(argument.span);
        self.limit_depth(Expression::new(
            ExpressionKind::Unary(UnaryExpression {
                operator,
                argument: Box::new(argument),
            }),
            span,
        ))
    }

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let mut expression = self.parse_primary()?;

        loop {
            match self.current.kind {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.expect_identifier()?;
                    let span = expression.span.to(property.span);
                    expression = self.limit_depth(Expression::new(
                        ExpressionKind::Member(MemberExpression {
                            object: Box::new(expression),
                            property,
                        }),
                        span,
                    ))?;
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&TokenKind::RightBracket)?;
                    let span = expression.span.to(self.previous.span);
                    expression = self.limit_depth(Expression::new(
                        ExpressionKind::Index(IndexExpression {
                            object: Box::new(expression),
                            index: Box::new(index),
                        }),
                        span,
                    ))?;
                }
                TokenKind::LeftParen => {
                    self.advance();
                    let arguments = self.parse_arguments(&TokenKind::RightParen)?;
                    let span = expression.span.to(self.previous.span);
                    expression = self.limit_depth(Expression::new(
                        ExpressionKind::Call(CallExpression {
                            callee: Box::new(expression),
                            arguments,
                        }),
                        span,
                    ))?;
                }
                _ => break,
            }
        }

        Ok(expression)
    }

    /// Parses a comma separated list up to and including `close`.
    fn parse_arguments(&mut self, close: &TokenKind) -> ParseResult<Vec<Expression>> {
        let mut arguments = Vec::new();

        if !self.check(close) {
            loop {
                arguments.push(self.parse_expression()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }

        self.expect(close)?;
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let span = self.current.span;
        let kind = match &self.current.kind {
            TokenKind::Number(n) => ExpressionKind::Literal(Literal::Number(*n)),
            TokenKind::String(s) => ExpressionKind::Literal(Literal::String(s.clone())),
            TokenKind::True => ExpressionKind::Literal(Literal::Boolean(true)),
            TokenKind::False => ExpressionKind::Literal(Literal::Boolean(false)),
            TokenKind::Null => ExpressionKind::Literal(Literal::Null),
            TokenKind::Identifier(name) => ExpressionKind::Identifier(name.clone()),
            TokenKind::LeftBracket => {
                self.advance();
                let items = self.parse_arguments(&TokenKind::RightBracket)?;
                return Ok(Expression::new(
                    ExpressionKind::Array(items),
                    span.to(self.previous.span),
                ));
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                return Ok(Expression::new(inner.kind, span.to(self.previous.span)));
            }
            // The scanner already reported the bad character.
            TokenKind::Invalid(_) => {
                self.last_error_at = Some(span.start);
                return Err(Recover);
            }
            other => {
                let message = format!("Invalid expression term '{}'", other);
                self.report_at(codes::INVALID_TERM, message, span);
                return Err(Recover);
            }
        };
        self.advance();
        Ok(Expression::new(kind, span))
    }

    fn parse_type_name(&mut self) -> ParseResult<TypeName> {
        let first = self.expect_identifier()?;
        let mut path = first.name;
        let mut span = first.span;

        while self.check(&TokenKind::Dot) {
            self.advance();
            let segment = self.expect_identifier()?;
            path.push('.');
            path.push_str(&segment.name);
            span = span.to(segment.span);
        }

        Ok(TypeName { path, span })
    }

    /// Counts one level of recursion, failing past [`MAX_NESTING`].
    fn enter(&mut self) -> ParseResult<()> {
        if self.nesting >= MAX_NESTING {
            self.too_complex(self.current.span);
            return Err(Recover);
        }
        self.nesting += 1;
        Ok(())
    }

    fn limit_depth(&mut self, expression: Expression) -> ParseResult<Expression> {
        if expression.depth() > MAX_EXPRESSION_DEPTH {
            self.too_complex(expression.span);
            return Err(Recover);
        }
        Ok(expression)
    }

    /// Reported once per unit; nesting errors cascade otherwise.
    fn too_complex(&mut self, span: Span) {
        if self.too_complex_reported {
            self.last_error_at = Some(span.start);
            return;
        }
        self.too_complex_reported = true;
        self.report_at(
            codes::EXPRESSION_TOO_COMPLEX,
            "An expression is too long or complex to compile".to_string(),
            span,
        );
    }

    /// Skips tokens until a likely statement boundary.
    fn synchronize(&mut self) {
        loop {
            match self.current.kind {
                TokenKind::Eof | TokenKind::RightBrace => return,
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::Var | TokenKind::Write | TokenKind::Foreach | TokenKind::Render => {
                    return;
                }
                TokenKind::Global if self.previous.kind == TokenKind::Semicolon => return,
                _ => self.advance(),
            }
        }
    }

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.scanner.next_token());
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<()> {
        if self.check(kind) {
            self.advance();
            return Ok(());
        }

        if *kind == TokenKind::Semicolon {
            // Reported just past the previous token, where the ';' belongs.
            let end = self.previous.span.end;
            self.report_at(codes::SEMICOLON_EXPECTED, "; expected".to_string(), Span::new(end, end));
        } else {
            let message = format!("Syntax error, '{}' expected", kind);
            self.report_at(codes::TOKEN_EXPECTED, message, self.current.span);
        }
        Err(Recover)
    }

    fn expect_identifier(&mut self) -> ParseResult<Identifier> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let id = Identifier {
                name: name.clone(),
                span: self.current.span,
            };
            self.advance();
            Ok(id)
        } else {
            let message = format!("Identifier expected, found '{}'", self.current.kind);
            self.report_at(codes::TOKEN_EXPECTED, message, self.current.span);
            Err(Recover)
        }
    }

    /// Records a syntax error unless one was already reported at the same
    /// position, which keeps cascades out of the output.
    fn report_at(&mut self, code: &'static str, message: String, span: Span) {
        if self.last_error_at == Some(span.start) {
            return;
        }
        self.last_error_at = Some(span.start);
        self.diagnostics.error(code, message, span);
    }

    fn is_at_end(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }
}

fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    let span = left.span.to(right.span);
    Expression::new(
        ExpressionKind::Binary(BinaryExpression {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }),
        span,
    )
}

fn logical(operator: LogicalOperator, left: Expression, right: Expression) -> Expression {
    let span = left.span.to(right.span);
    Expression::new(
        ExpressionKind::Logical(LogicalExpression {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }),
        span,
    )
}
