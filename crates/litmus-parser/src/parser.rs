// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The parser implementation using Pratt parsing for expressions.

use std::collections::HashSet;
use std::rc::Rc;

use litmus_ast::expr::{
    AssignOp, BinOp, Expr, ExprKind, FunctionBody, FunctionDecl, LogicalOp, Param, PropKey,
    Property, UnaryOp, UpdateOp,
};
use litmus_ast::stmt::{Declarator, Stmt, StmtKind, SwitchCase, VarKind};
use litmus_ast::token::{TemplatePart, Token, TokenKind};
use litmus_ast::Span;
use litmus_lexer::{LexError, Lexer};

/// Maximum number of errors to collect before stopping.
const MAX_ERRORS: usize = 20;

/// Deepest statement or expression nesting accepted before giving up.
const MAX_NESTING: usize = 1000;

/// Statement context that resets at every function boundary.
#[derive(Debug, Clone, Default)]
struct FnContext {
    in_function: bool,
    /// Enclosing loops (targets for `continue`)
    loops: u32,
    /// Enclosing loops and switches (targets for `break`)
    breakable: u32,
    labels: Vec<String>,
}

enum InfixOp {
    Binary(BinOp),
    Logical(LogicalOp),
}

/// The parser for snippet source code.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
    /// `in` is not a binary operator while parsing a `for` initializer.
    no_in: bool,
    ctx: FnContext,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            no_in: false,
            ctx: FnContext::default(),
            depth: 0,
        }
    }

    /// Record error, return if should continue.
    fn record_error(&mut self, error: ParseError) -> bool {
        self.errors.push(error);
        self.errors.len() < MAX_ERRORS
    }

    /// Skip to the start of the next statement after an error.
    fn synchronize(&mut self) {
        let mut depth = 0usize;
        self.advance();
        while !self.at_end() {
            if depth == 0 && matches!(self.previous().kind, TokenKind::Semi) {
                return;
            }
            match self.current_kind() {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace => depth -= 1,
                _ if depth == 0 && self.current().newline_before => return,
                _ => {}
            }
            self.advance();
        }
    }

    // =========================================================================
    // Token Navigation
    // =========================================================================

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)]
    }

    fn prev_end(&self) -> usize {
        self.previous().span.end
    }

    fn peek(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn advance(&mut self) {
        if !self.at_end() {
            self.pos += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    /// Contextual keywords such as `of` are plain identifiers to the lexer.
    fn check_ident(&self, name: &str) -> bool {
        matches!(self.current_kind(), TokenKind::Ident(n) if n == name)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Span, ParseError> {
        if self.check(kind) {
            let span = self.current().span;
            self.advance();
            Ok(span)
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::expected(expected, self.current_kind(), self.current().span)
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.current_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("a name")),
        }
    }

    /// Identifier or keyword after `.` or as an object key.
    fn expect_property_name(&mut self) -> Result<String, ParseError> {
        let kind = self.current_kind().clone();
        let name = match &kind {
            TokenKind::Ident(name) => name.clone(),
            other => match other.keyword_name() {
                Some(kw) => kw.to_string(),
                None => return Err(self.unexpected("property name")),
            },
        };
        self.advance();
        Ok(name)
    }

    /// Automatic semicolon insertion: a `;`, a line break, `}` or end of input
    /// terminates a statement.
    fn consume_semicolon(&mut self) -> Result<(), ParseError> {
        if self.match_token(&TokenKind::Semi) {
            return Ok(());
        }
        if self.check(&TokenKind::RBrace) || self.at_end() || self.current().newline_before {
            return Ok(());
        }
        Err(self.unexpected("';'"))
    }

    fn with_no_in<T>(&mut self, no_in: bool, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.no_in, no_in);
        let result = f(self);
        self.no_in = saved;
        result
    }

    /// Run one level of recursive descent, refusing input nested deeper
    /// than [`MAX_NESTING`].
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, ParseError>) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::new("too much nesting", self.current().span));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn with_function_context<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let fresh = FnContext {
            in_function: true,
            ..FnContext::default()
        };
        let saved = std::mem::replace(&mut self.ctx, fresh);
        let result = self.with_no_in(false, f);
        self.ctx = saved;
        result
    }

    // =========================================================================
    // Program and Statements
    // =========================================================================

    /// Parse a whole snippet.
    pub fn parse(&mut self) -> ParseResult {
        let mut stmts = Vec::new();
        while !self.at_end() {
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    if !self.record_error(e) {
                        break;
                    }
                    self.synchronize();
                }
            }
        }
        if self.errors.is_empty() {
            if let Err(e) = check_redeclarations(&stmts) {
                self.errors.push(e);
            }
        }
        ParseResult {
            stmts,
            errors: std::mem::take(&mut self.errors),
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.nested(|p| p.parse_stmt_inner())
    }

    fn parse_stmt_inner(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span.start;
        let kind = match self.current_kind().clone() {
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            TokenKind::Semi => {
                self.advance();
                StmtKind::Empty
            }
            TokenKind::Var => self.parse_var_stmt(VarKind::Var)?,
            TokenKind::Let => self.parse_var_stmt(VarKind::Let)?,
            TokenKind::Const => self.parse_var_stmt(VarKind::Const)?,
            TokenKind::Function => {
                let func = self.parse_function(true)?;
                StmtKind::Function(func)
            }
            TokenKind::If => self.parse_if_stmt()?,
            TokenKind::For => self.parse_for_stmt()?,
            TokenKind::While => self.parse_while_stmt()?,
            TokenKind::Do => self.parse_do_while_stmt()?,
            TokenKind::Return => self.parse_return_stmt()?,
            TokenKind::Break => self.parse_jump_stmt(true)?,
            TokenKind::Continue => self.parse_jump_stmt(false)?,
            TokenKind::Throw => self.parse_throw_stmt()?,
            TokenKind::Try => self.parse_try_stmt()?,
            TokenKind::Switch => self.parse_switch_stmt()?,
            TokenKind::Ident(label) if self.peek(1) == &TokenKind::Colon => {
                self.advance();
                self.advance();
                self.ctx.labels.push(label.clone());
                let body = self.parse_stmt();
                self.ctx.labels.pop();
                StmtKind::Labeled {
                    label,
                    body: Box::new(body?),
                }
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon()?;
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt::new(kind, Span::new(start, self.prev_end())))
    }

    /// `{ stmts }` with the block's own redeclaration check.
    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        check_redeclarations(&stmts)?;
        Ok(stmts)
    }

    fn parse_var_stmt(&mut self, kind: VarKind) -> Result<StmtKind, ParseError> {
        self.advance();
        let decls = self.parse_declarators(kind, false)?;
        self.consume_semicolon()?;
        Ok(StmtKind::VarDecl { kind, decls })
    }

    fn parse_declarators(&mut self, kind: VarKind, in_for: bool) -> Result<Vec<Declarator>, ParseError> {
        let mut decls = Vec::new();
        loop {
            let start = self.current().span.start;
            let name = self.expect_ident()?;
            let init = if self.match_token(&TokenKind::Eq) {
                Some(self.parse_assign()?)
            } else {
                None
            };
            let span = Span::new(start, self.prev_end());
            if kind == VarKind::Const && init.is_none() && !in_for {
                return Err(ParseError::new("Missing initializer in const declaration", span));
            }
            decls.push(Declarator { name, init, span });
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        Ok(decls)
    }

    fn parse_if_stmt(&mut self) -> Result<StmtKind, ParseError> {
        self.advance();
        let test = self.parse_paren_expr()?;
        let consequent = Box::new(self.parse_stmt()?);
        let alternate = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        Ok(StmtKind::If { test, consequent, alternate })
    }

    fn parse_paren_expr(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LParen, "'('")?;
        let expr = self.with_no_in(false, |p| p.parse_expression())?;
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(expr)
    }

    fn parse_loop_body(&mut self) -> Result<Box<Stmt>, ParseError> {
        self.ctx.loops += 1;
        self.ctx.breakable += 1;
        let body = self.parse_stmt();
        self.ctx.loops -= 1;
        self.ctx.breakable -= 1;
        Ok(Box::new(body?))
    }

    fn parse_while_stmt(&mut self) -> Result<StmtKind, ParseError> {
        self.advance();
        let test = self.parse_paren_expr()?;
        let body = self.parse_loop_body()?;
        Ok(StmtKind::While { test, body })
    }

    fn parse_do_while_stmt(&mut self) -> Result<StmtKind, ParseError> {
        self.advance();
        let body = self.parse_loop_body()?;
        self.expect(&TokenKind::While, "'while'")?;
        let test = self.parse_paren_expr()?;
        self.match_token(&TokenKind::Semi);
        Ok(StmtKind::DoWhile { body, test })
    }

    fn parse_for_stmt(&mut self) -> Result<StmtKind, ParseError> {
        self.advance();
        self.expect(&TokenKind::LParen, "'('")?;

        let decl_kind = match self.current_kind() {
            TokenKind::Var => Some(VarKind::Var),
            TokenKind::Let => Some(VarKind::Let),
            TokenKind::Const => Some(VarKind::Const),
            _ => None,
        };

        let mut init = None;
        if let Some(kind) = decl_kind {
            let start = self.current().span.start;
            self.advance();
            if self.at_for_each_head() {
                let name = self.expect_ident()?;
                return self.parse_for_each(Some(kind), name);
            }
            let decls = self.with_no_in(true, |p| p.parse_declarators(kind, true))?;
            if kind == VarKind::Const && decls.iter().any(|d| d.init.is_none()) {
                return Err(ParseError::new(
                    "Missing initializer in const declaration",
                    Span::new(start, self.prev_end()),
                ));
            }
            let span = Span::new(start, self.prev_end());
            init = Some(Box::new(Stmt::new(StmtKind::VarDecl { kind, decls }, span)));
        } else if !self.check(&TokenKind::Semi) {
            if self.at_for_each_head() {
                let name = self.expect_ident()?;
                return self.parse_for_each(None, name);
            }
            let expr = self.with_no_in(true, |p| p.parse_expression())?;
            let span = expr.span;
            init = Some(Box::new(Stmt::new(StmtKind::Expr(expr), span)));
        }

        self.expect(&TokenKind::Semi, "';'")?;
        let test = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semi, "';'")?;
        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RParen, "')'")?;
        let body = self.parse_loop_body()?;
        Ok(StmtKind::For { init, test, update, body })
    }

    /// `name of` / `name in` right after `for (` and an optional declaration keyword.
    fn at_for_each_head(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Ident(_))
            && (matches!(self.peek(1), TokenKind::In)
                || matches!(self.peek(1), TokenKind::Ident(n) if n == "of"))
    }

    fn parse_for_each(&mut self, kind: Option<VarKind>, name: String) -> Result<StmtKind, ParseError> {
        if self.check_ident("of") {
            self.advance();
            let iter = self.parse_assign()?;
            self.expect(&TokenKind::RParen, "')'")?;
            let body = self.parse_loop_body()?;
            Ok(StmtKind::ForOf { kind, name, iter, body })
        } else {
            self.expect(&TokenKind::In, "'in' or 'of'")?;
            let object = self.parse_expression()?;
            self.expect(&TokenKind::RParen, "')'")?;
            let body = self.parse_loop_body()?;
            Ok(StmtKind::ForIn { kind, name, object, body })
        }
    }

    fn parse_return_stmt(&mut self) -> Result<StmtKind, ParseError> {
        let span = self.current().span;
        if !self.ctx.in_function {
            return Err(ParseError::new("Illegal return statement", span));
        }
        self.advance();
        // Restricted production: a line break ends the statement.
        let value = if self.check(&TokenKind::Semi)
            || self.check(&TokenKind::RBrace)
            || self.at_end()
            || self.current().newline_before
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_semicolon()?;
        Ok(StmtKind::Return(value))
    }

    fn parse_jump_stmt(&mut self, is_break: bool) -> Result<StmtKind, ParseError> {
        let span = self.current().span;
        self.advance();
        let label = match self.current_kind().clone() {
            TokenKind::Ident(name) if !self.current().newline_before => {
                if !self.ctx.labels.contains(&name) {
                    return Err(ParseError::new(format!("Undefined label '{}'", name), self.current().span));
                }
                self.advance();
                Some(name)
            }
            _ => None,
        };
        if label.is_none() {
            if is_break && self.ctx.breakable == 0 {
                return Err(ParseError::new("Illegal break statement", span));
            }
            if !is_break && self.ctx.loops == 0 {
                return Err(ParseError::new(
                    "Illegal continue statement: no surrounding iteration statement",
                    span,
                ));
            }
        }
        self.consume_semicolon()?;
        Ok(if is_break {
            StmtKind::Break(label)
        } else {
            StmtKind::Continue(label)
        })
    }

    fn parse_throw_stmt(&mut self) -> Result<StmtKind, ParseError> {
        self.advance();
        if self.current().newline_before {
            return Err(ParseError::new("Illegal newline after throw", self.current().span));
        }
        let value = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(StmtKind::Throw(value))
    }

    fn parse_try_stmt(&mut self) -> Result<StmtKind, ParseError> {
        let span = self.current().span;
        self.advance();
        let block = self.parse_block()?;
        let mut param = None;
        let mut handler = None;
        if self.match_token(&TokenKind::Catch) {
            if self.match_token(&TokenKind::LParen) {
                param = Some(self.expect_ident()?);
                self.expect(&TokenKind::RParen, "')'")?;
            }
            handler = Some(self.parse_block()?);
        }
        let finalizer = if self.match_token(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(ParseError::new("Missing catch or finally after try", span));
        }
        Ok(StmtKind::Try { block, param, handler, finalizer })
    }

    fn parse_switch_stmt(&mut self) -> Result<StmtKind, ParseError> {
        self.advance();
        let discriminant = self.parse_paren_expr()?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        self.ctx.breakable += 1;
        let cases = self.parse_switch_cases();
        self.ctx.breakable -= 1;
        let cases = cases?;
        self.expect(&TokenKind::RBrace, "'}'")?;

        let all: Vec<Stmt> = cases.iter().flat_map(|c| c.body.iter().cloned()).collect();
        check_redeclarations(&all)?;
        Ok(StmtKind::Switch { discriminant, cases })
    }

    fn parse_switch_cases(&mut self) -> Result<Vec<SwitchCase>, ParseError> {
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            let span = self.current().span;
            let test = if self.match_token(&TokenKind::Case) {
                Some(self.parse_expression()?)
            } else if self.match_token(&TokenKind::Default) {
                if seen_default {
                    return Err(ParseError::new("More than one default clause in switch statement", span));
                }
                seen_default = true;
                None
            } else {
                return Err(self.unexpected("'case' or 'default'"));
            };
            self.expect(&TokenKind::Colon, "':'")?;
            let mut body = Vec::new();
            while !matches!(
                self.current_kind(),
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                body.push(self.parse_stmt()?);
            }
            cases.push(SwitchCase { test, body });
        }
        Ok(cases)
    }

    // =========================================================================
    // Functions
    // =========================================================================

    /// `function name(params) { body }`; the name is optional for expressions.
    fn parse_function(&mut self, is_decl: bool) -> Result<Rc<FunctionDecl>, ParseError> {
        let start = self.current().span.start;
        self.advance();
        let name = match self.current_kind() {
            TokenKind::Ident(_) => Some(self.expect_ident()?),
            _ if is_decl => {
                return Err(ParseError::new(
                    "Function statements require a function name",
                    self.current().span,
                ))
            }
            _ => None,
        };
        let (params, rest) = self.parse_params()?;
        let body = self.with_function_context(|p| p.parse_block())?;
        Ok(Rc::new(FunctionDecl {
            name,
            params,
            rest,
            body: FunctionBody::Block(body),
            is_arrow: false,
            span: Span::new(start, self.prev_end()),
        }))
    }

    fn parse_params(&mut self) -> Result<(Vec<Param>, Option<String>), ParseError> {
        self.expect(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        let mut rest = None;
        while !self.check(&TokenKind::RParen) {
            if self.match_token(&TokenKind::DotDotDot) {
                rest = Some(self.expect_ident()?);
                if !self.check(&TokenKind::RParen) {
                    return Err(ParseError::new(
                        "Rest parameter must be last formal parameter",
                        self.current().span,
                    ));
                }
                break;
            }
            let name = self.expect_ident()?;
            let default = if self.match_token(&TokenKind::Eq) {
                Some(self.with_no_in(false, |p| p.parse_assign())?)
            } else {
                None
            };
            params.push(Param { name, default });
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok((params, rest))
    }

    fn is_arrow_start(&self) -> bool {
        match self.current_kind() {
            TokenKind::Ident(_) => {
                matches!(self.tokens.get(self.pos + 1), Some(t) if t.kind == TokenKind::FatArrow && !t.newline_before)
            }
            TokenKind::LParen => self.paren_arrow_ahead(),
            _ => false,
        }
    }

    /// Scan to the `)` matching the current `(` and look for `=>` after it.
    fn paren_arrow_ahead(&self) -> bool {
        let mut depth = 0i32;
        for (i, tok) in self.tokens.iter().enumerate().skip(self.pos) {
            match tok.kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return matches!(
                            self.tokens.get(i + 1),
                            Some(t) if t.kind == TokenKind::FatArrow && !t.newline_before
                        );
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
        }
        false
    }

    fn parse_arrow(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span.start;
        let (params, rest) = if let TokenKind::Ident(name) = self.current_kind().clone() {
            self.advance();
            (vec![Param { name, default: None }], None)
        } else {
            self.parse_params()?
        };
        self.expect(&TokenKind::FatArrow, "'=>'")?;
        let body = if self.check(&TokenKind::LBrace) {
            FunctionBody::Block(self.with_function_context(|p| p.parse_block())?)
        } else {
            let no_in = self.no_in;
            FunctionBody::Expr(self.with_function_context(|p| p.with_no_in(no_in, |p| p.parse_assign()))?)
        };
        let span = Span::new(start, self.prev_end());
        let func = FunctionDecl {
            name: None,
            params,
            rest,
            body,
            is_arrow: true,
            span,
        };
        Ok(Expr::new(ExprKind::Function(Rc::new(func)), span))
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Full expression including the comma operator.
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_assign()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.match_token(&TokenKind::Comma) {
            exprs.push(self.parse_assign()?);
        }
        let span = exprs[0].span.to(exprs[exprs.len() - 1].span);
        Ok(Expr::new(ExprKind::Sequence(exprs), span))
    }

    fn parse_assign(&mut self) -> Result<Expr, ParseError> {
        self.nested(|p| p.parse_assign_inner())
    }

    fn parse_assign_inner(&mut self) -> Result<Expr, ParseError> {
        if self.is_arrow_start() {
            return self.parse_arrow();
        }
        let target = self.parse_conditional()?;
        let op = match self.current_kind() {
            TokenKind::Eq => AssignOp::Assign,
            TokenKind::PlusEq => AssignOp::Compound(BinOp::Add),
            TokenKind::MinusEq => AssignOp::Compound(BinOp::Sub),
            TokenKind::StarEq => AssignOp::Compound(BinOp::Mul),
            TokenKind::SlashEq => AssignOp::Compound(BinOp::Div),
            TokenKind::PercentEq => AssignOp::Compound(BinOp::Mod),
            TokenKind::StarStarEq => AssignOp::Compound(BinOp::Pow),
            TokenKind::AmpAmpEq => AssignOp::Logical(LogicalOp::And),
            TokenKind::PipePipeEq => AssignOp::Logical(LogicalOp::Or),
            TokenKind::QuestionQuestionEq => AssignOp::Logical(LogicalOp::Nullish),
            _ => return Ok(target),
        };
        if !is_simple_target(&target) {
            return Err(ParseError::new("Invalid left-hand side in assignment", target.span));
        }
        self.advance();
        let value = self.parse_assign()?;
        let span = target.span.to(value.span);
        Ok(Expr::new(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        ))
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.parse_expr_bp(0)?;
        if !self.match_token(&TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.with_no_in(false, |p| p.parse_assign())?;
        self.expect(&TokenKind::Colon, "':'")?;
        let alternate = self.parse_assign()?;
        let span = test.span.to(alternate.span);
        Ok(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            span,
        ))
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;

        while let Some((op, l_bp, r_bp)) = self.infix_bp() {
            if l_bp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.parse_expr_bp(r_bp)?;
            let span = lhs.span.to(rhs.span);
            let (left, right) = (Box::new(lhs), Box::new(rhs));
            let kind = match op {
                InfixOp::Binary(op) => ExprKind::Binary { op, left, right },
                InfixOp::Logical(op) => ExprKind::Logical { op, left, right },
            };
            lhs = Expr::new(kind, span);
        }

        Ok(lhs)
    }

    fn infix_bp(&self) -> Option<(InfixOp, u8, u8)> {
        use InfixOp::{Binary as B, Logical as L};
        Some(match self.current_kind() {
            TokenKind::QuestionQuestion => (L(LogicalOp::Nullish), 1, 2),
            TokenKind::PipePipe => (L(LogicalOp::Or), 3, 4),
            TokenKind::AmpAmp => (L(LogicalOp::And), 5, 6),
            TokenKind::Pipe => (B(BinOp::BitOr), 7, 8),
            TokenKind::Caret => (B(BinOp::BitXor), 9, 10),
            TokenKind::Amp => (B(BinOp::BitAnd), 11, 12),
            TokenKind::EqEq => (B(BinOp::Eq), 13, 14),
            TokenKind::BangEq => (B(BinOp::Ne), 13, 14),
            TokenKind::EqEqEq => (B(BinOp::StrictEq), 13, 14),
            TokenKind::BangEqEq => (B(BinOp::StrictNe), 13, 14),
            TokenKind::Lt => (B(BinOp::Lt), 15, 16),
            TokenKind::Gt => (B(BinOp::Gt), 15, 16),
            TokenKind::LtEq => (B(BinOp::Le), 15, 16),
            TokenKind::GtEq => (B(BinOp::Ge), 15, 16),
            TokenKind::Instanceof => (B(BinOp::InstanceOf), 15, 16),
            TokenKind::In if !self.no_in => (B(BinOp::In), 15, 16),
            TokenKind::LtLt => (B(BinOp::Shl), 17, 18),
            TokenKind::GtGt => (B(BinOp::Shr), 17, 18),
            TokenKind::GtGtGt => (B(BinOp::UShr), 17, 18),
            TokenKind::Plus => (B(BinOp::Add), 19, 20),
            TokenKind::Minus => (B(BinOp::Sub), 19, 20),
            TokenKind::Star => (B(BinOp::Mul), 21, 22),
            TokenKind::Slash => (B(BinOp::Div), 21, 22),
            TokenKind::Percent => (B(BinOp::Mod), 21, 22),
            // Right-associative
            TokenKind::StarStar => (B(BinOp::Pow), 24, 23),
            _ => return None,
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        self.nested(|p| p.parse_unary_inner())
    }

    fn parse_unary_inner(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span.start;
        let op = match self.current_kind() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Tilde => UnaryOp::BitNot,
            TokenKind::Typeof => UnaryOp::Typeof,
            TokenKind::Void => UnaryOp::Void,
            TokenKind::Delete => UnaryOp::Delete,
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = if self.check(&TokenKind::PlusPlus) { UpdateOp::Inc } else { UpdateOp::Dec };
                self.advance();
                let target = self.parse_unary()?;
                if !is_simple_target(&target) {
                    return Err(ParseError::new(
                        "Invalid left-hand side expression in prefix operation",
                        target.span,
                    ));
                }
                let span = Span::new(start, target.span.end);
                return Ok(Expr::new(
                    ExprKind::Update { op, prefix: true, target: Box::new(target) },
                    span,
                ));
            }
            _ => return self.parse_postfix_update(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        let span = Span::new(start, operand.span.end);
        Ok(Expr::new(ExprKind::Unary { op, operand: Box::new(operand) }, span))
    }

    fn parse_postfix_update(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_call_member()?;
        let op = match self.current_kind() {
            TokenKind::PlusPlus => UpdateOp::Inc,
            TokenKind::MinusMinus => UpdateOp::Dec,
            _ => return Ok(expr),
        };
        // Restricted production: `a\n++b` is `a; ++b`.
        if self.current().newline_before {
            return Ok(expr);
        }
        if !is_simple_target(&expr) {
            return Err(ParseError::new(
                "Invalid left-hand side expression in postfix operation",
                expr.span,
            ));
        }
        self.advance();
        let span = Span::new(expr.span.start, self.prev_end());
        Ok(Expr::new(
            ExprKind::Update { op, prefix: false, target: Box::new(expr) },
            span,
        ))
    }

    fn parse_call_member(&mut self) -> Result<Expr, ParseError> {
        let mut expr = if self.check(&TokenKind::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };

        loop {
            let start = expr.span.start;
            expr = match self.current_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.expect_property_name()?;
                    let span = Span::new(start, self.prev_end());
                    Expr::new(
                        ExprKind::Member { object: Box::new(expr), property, optional: false },
                        span,
                    )
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    match self.current_kind() {
                        TokenKind::LParen => {
                            let args = self.parse_args()?;
                            let span = Span::new(start, self.prev_end());
                            Expr::new(
                                ExprKind::Call { callee: Box::new(expr), args, optional: true },
                                span,
                            )
                        }
                        TokenKind::LBracket => {
                            self.advance();
                            let index = self.with_no_in(false, |p| p.parse_expression())?;
                            self.expect(&TokenKind::RBracket, "']'")?;
                            let span = Span::new(start, self.prev_end());
                            Expr::new(
                                ExprKind::Index { object: Box::new(expr), index: Box::new(index), optional: true },
                                span,
                            )
                        }
                        _ => {
                            let property = self.expect_property_name()?;
                            let span = Span::new(start, self.prev_end());
                            Expr::new(
                                ExprKind::Member { object: Box::new(expr), property, optional: true },
                                span,
                            )
                        }
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.with_no_in(false, |p| p.parse_expression())?;
                    self.expect(&TokenKind::RBracket, "']'")?;
                    let span = Span::new(start, self.prev_end());
                    Expr::new(
                        ExprKind::Index { object: Box::new(expr), index: Box::new(index), optional: false },
                        span,
                    )
                }
                TokenKind::LParen => {
                    let args = self.parse_args()?;
                    let span = Span::new(start, self.prev_end());
                    Expr::new(
                        ExprKind::Call { callee: Box::new(expr), args, optional: false },
                        span,
                    )
                }
                _ => break,
            };
        }

        Ok(expr)
    }

    /// `new Callee(args)`; member accesses bind tighter than the argument list.
    fn parse_new(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span.start;
        self.advance();
        let mut callee = if self.check(&TokenKind::New) {
            self.nested(|p| p.parse_new())?
        } else {
            self.parse_primary()?
        };
        loop {
            callee = match self.current_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.expect_property_name()?;
                    let span = Span::new(callee.span.start, self.prev_end());
                    Expr::new(
                        ExprKind::Member { object: Box::new(callee), property, optional: false },
                        span,
                    )
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.with_no_in(false, |p| p.parse_expression())?;
                    self.expect(&TokenKind::RBracket, "']'")?;
                    let span = Span::new(callee.span.start, self.prev_end());
                    Expr::new(
                        ExprKind::Index { object: Box::new(callee), index: Box::new(index), optional: false },
                        span,
                    )
                }
                _ => break,
            };
        }
        let args = if self.check(&TokenKind::LParen) {
            self.parse_args()?
        } else {
            Vec::new()
        };
        let span = Span::new(start, self.prev_end());
        Ok(Expr::new(ExprKind::New { callee: Box::new(callee), args }, span))
    }

    /// `( args )` with spread support.
    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(&TokenKind::LParen, "'('")?;
        self.with_no_in(false, |p| {
            let mut args = Vec::new();
            while !p.check(&TokenKind::RParen) {
                args.push(p.parse_spread_or_assign()?);
                if !p.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            p.expect(&TokenKind::RParen, "')'")?;
            Ok(args)
        })
    }

    fn parse_spread_or_assign(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span.start;
        if self.match_token(&TokenKind::DotDotDot) {
            let inner = self.parse_assign()?;
            let span = Span::new(start, inner.span.end);
            Ok(Expr::new(ExprKind::Spread(Box::new(inner)), span))
        } else {
            self.parse_assign()
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.current().span;
        let kind = match self.current_kind().clone() {
            TokenKind::Number(n) => ExprKind::Number(n),
            TokenKind::String(s) => ExprKind::String(s),
            TokenKind::Template(parts) => {
                self.advance();
                return self.parse_template(parts, span);
            }
            TokenKind::Bool(b) => ExprKind::Bool(b),
            TokenKind::Null => ExprKind::Null,
            TokenKind::This => ExprKind::This,
            TokenKind::Ident(name) => ExprKind::Ident(name),
            TokenKind::LParen => {
                self.advance();
                let inner = self.with_no_in(false, |p| p.parse_expression())?;
                self.expect(&TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::LBracket => return self.parse_array_literal(),
            TokenKind::LBrace => return self.parse_object_literal(),
            TokenKind::Function => {
                let func = self.parse_function(false)?;
                let span = func.span;
                return Ok(Expr::new(ExprKind::Function(func), span));
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(Expr::new(kind, span))
    }

    fn parse_array_literal(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span.start;
        self.advance();
        let elements = self.with_no_in(false, |p| {
            let mut elements = Vec::new();
            while !p.check(&TokenKind::RBracket) {
                // Holes read as undefined.
                if p.check(&TokenKind::Comma) {
                    let span = p.current().span;
                    p.advance();
                    elements.push(Expr::new(ExprKind::Ident("undefined".to_string()), span));
                    continue;
                }
                elements.push(p.parse_spread_or_assign()?);
                if !p.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            p.expect(&TokenKind::RBracket, "']'")?;
            Ok::<_, ParseError>(elements)
        })?;
        Ok(Expr::new(ExprKind::Array(elements), Span::new(start, self.prev_end())))
    }

    fn parse_object_literal(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span.start;
        self.advance();
        let props = self.with_no_in(false, |p| {
            let mut props = Vec::new();
            while !p.check(&TokenKind::RBrace) {
                props.push(p.parse_property()?);
                if !p.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            p.expect(&TokenKind::RBrace, "'}'")?;
            Ok::<_, ParseError>(props)
        })?;
        Ok(Expr::new(ExprKind::Object(props), Span::new(start, self.prev_end())))
    }

    fn parse_property(&mut self) -> Result<Property, ParseError> {
        let start = self.current().span.start;
        if self.match_token(&TokenKind::DotDotDot) {
            let value = self.parse_assign()?;
            return Ok(Property { key: PropKey::Spread, value });
        }

        let (key, shorthand_name) = match self.current_kind().clone() {
            TokenKind::LBracket => {
                self.advance();
                let key = self.parse_assign()?;
                self.expect(&TokenKind::RBracket, "']'")?;
                (PropKey::Computed(Box::new(key)), None)
            }
            TokenKind::String(s) => {
                self.advance();
                (PropKey::Named(s), None)
            }
            TokenKind::Number(n) => {
                self.advance();
                (PropKey::Named(number_key(n)), None)
            }
            TokenKind::Ident(name) => {
                self.advance();
                (PropKey::Named(name.clone()), Some(name))
            }
            _ => {
                let name = self.expect_property_name()?;
                (PropKey::Named(name), None)
            }
        };

        if self.match_token(&TokenKind::Colon) {
            let value = self.parse_assign()?;
            return Ok(Property { key, value });
        }

        if self.check(&TokenKind::LParen) {
            let name = match &key {
                PropKey::Named(name) => Some(name.clone()),
                _ => None,
            };
            let (params, rest) = self.parse_params()?;
            let body = self.with_function_context(|p| p.parse_block())?;
            let span = Span::new(start, self.prev_end());
            let func = FunctionDecl {
                name,
                params,
                rest,
                body: FunctionBody::Block(body),
                is_arrow: false,
                span,
            };
            return Ok(Property {
                key,
                value: Expr::new(ExprKind::Function(Rc::new(func)), span),
            });
        }

        match shorthand_name {
            Some(name) => {
                let span = Span::new(start, self.prev_end());
                Ok(Property { key, value: Expr::new(ExprKind::Ident(name), span) })
            }
            None => Err(self.unexpected("':'")),
        }
    }

    /// Re-lex and parse each `${}` substitution of a template literal.
    fn parse_template(&mut self, parts: Vec<TemplatePart>, span: Span) -> Result<Expr, ParseError> {
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        for part in parts {
            match part {
                TemplatePart::Str(text) => quasis.push(text),
                TemplatePart::Expr { source, offset } => {
                    let lexed = Lexer::with_offset(&source, offset).tokenize();
                    if let Some(err) = lexed.errors.into_iter().next() {
                        return Err(err.into());
                    }
                    let mut sub = Parser::new(lexed.tokens);
                    sub.ctx = self.ctx.clone();
                    sub.depth = self.depth;
                    let expr = sub.parse_expression()?;
                    if !sub.at_end() {
                        return Err(sub.unexpected("'}'"));
                    }
                    exprs.push(expr);
                }
            }
        }
        Ok(Expr::new(ExprKind::Template { quasis, exprs }, span))
    }
}

fn is_simple_target(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Ident(_)
            | ExprKind::Member { optional: false, .. }
            | ExprKind::Index { optional: false, .. }
    )
}

/// Numeric object keys are stored in their canonical string form.
fn number_key(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Lexical declarations may not collide with any other declaration in the
/// same statement list.
fn check_redeclarations(stmts: &[Stmt]) -> Result<(), ParseError> {
    let mut lexical: HashSet<&str> = HashSet::new();
    let mut vars: HashSet<&str> = HashSet::new();
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::VarDecl { kind, decls } => {
                for decl in decls {
                    let name = decl.name.as_str();
                    let taken = lexical.contains(name) || (kind.is_lexical() && vars.contains(name));
                    if taken {
                        return Err(ParseError::redeclared(name, decl.span));
                    }
                    if kind.is_lexical() {
                        lexical.insert(name);
                    } else {
                        vars.insert(name);
                    }
                }
            }
            StmtKind::Function(func) => {
                if let Some(name) = func.name.as_deref() {
                    if lexical.contains(name) {
                        return Err(ParseError::redeclared(name, stmt.span));
                    }
                    vars.insert(name);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Result of parsing: statements plus any errors found.
#[derive(Debug)]
pub struct ParseResult {
    pub stmts: Vec<Stmt>,
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A parse error with location and friendly message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub span: Span,
    pub message: String,
    pub hint: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            span,
            message: message.into(),
            hint: None,
        }
    }

    fn expected(expected: &str, found: &TokenKind, span: Span) -> Self {
        let message = format_unexpected_message(found);
        let hint = crate::hints::for_expected(expected, found)
            .map(|h| format!("expected {}: {}", expected, h))
            .unwrap_or_else(|| format!("expected {}", expected));
        Self {
            span,
            message,
            hint: Some(hint),
        }
    }

    fn redeclared(name: &str, span: Span) -> Self {
        Self::new(format!("Identifier '{}' has already been declared", name), span)
    }
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        Self {
            span: err.span,
            message: err.message,
            hint: err.hint,
        }
    }
}

/// Messages follow the wording scripts see in `SyntaxError.message`.
fn format_unexpected_message(found: &TokenKind) -> String {
    match found {
        TokenKind::Eof => "Unexpected end of input".to_string(),
        TokenKind::Ident(name) => format!("Unexpected identifier '{}'", name),
        TokenKind::Number(_) => "Unexpected number".to_string(),
        TokenKind::String(_) => "Unexpected string".to_string(),
        TokenKind::Template(_) => "Unexpected template string".to_string(),
        other => format!("Unexpected token {}", other.describe()),
    }
}
