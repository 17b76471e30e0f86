// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Parser for the Litmus scripting language.
//!
//! Transforms a token stream into a list of statements. Errors are collected
//! rather than thrown so a snippet reports every problem at once.

mod hints;
mod parser;

pub use parser::{ParseError, ParseResult, Parser};

/// Lex and parse a snippet, returning the first error if any.
pub fn parse_source(source: &str) -> Result<Vec<litmus_ast::stmt::Stmt>, ParseError> {
    let lexed = litmus_lexer::Lexer::new(source).tokenize();
    if let Some(err) = lexed.errors.into_iter().next() {
        return Err(err.into());
    }
    let result = Parser::new(lexed.tokens).parse();
    match result.errors.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(result.stmts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use litmus_ast::expr::{AssignOp, BinOp, ExprKind, FunctionBody, LogicalOp, PropKey};
    use litmus_ast::stmt::{StmtKind, VarKind};

    fn parse(src: &str) -> ParseResult {
        let lex_result = litmus_lexer::Lexer::new(src).tokenize();
        assert!(lex_result.is_ok(), "Lex errors: {:?}", lex_result.errors);
        Parser::new(lex_result.tokens).parse()
    }

    fn parse_ok(src: &str) -> Vec<litmus_ast::stmt::Stmt> {
        let result = parse(src);
        assert!(result.is_ok(), "Parse errors: {:?}", result.errors);
        result.stmts
    }

    fn first_error(src: &str) -> String {
        match parse_source(src) {
            Err(e) => e.message,
            Ok(_) => panic!("expected a syntax error for {:?}", src),
        }
    }

    #[test]
    fn automatic_semicolons() {
        let stmts = parse_ok("let a = 1\nlet b = 2\na + b");
        assert_eq!(stmts.len(), 3);
        assert!(matches!(stmts[2].kind, StmtKind::Expr(_)));
    }

    #[test]
    fn missing_semicolon_on_one_line_is_an_error() {
        assert_eq!(first_error("let a = 1 let b = 2"), "Unexpected token 'let'");
    }

    #[test]
    fn return_with_line_break_returns_undefined() {
        let stmts = parse_ok("function f() {\n  return\n  42\n}");
        let StmtKind::Function(func) = &stmts[0].kind else { panic!("expected function") };
        let FunctionBody::Block(body) = &func.body else { panic!("expected block body") };
        assert!(matches!(body[0].kind, StmtKind::Return(None)));
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn precedence_and_associativity() {
        let stmts = parse_ok("1 + 2 * 3 ** 2 ** 2");
        let StmtKind::Expr(expr) = &stmts[0].kind else { panic!() };
        let ExprKind::Binary { op: BinOp::Add, right, .. } = &expr.kind else { panic!("expected +") };
        let ExprKind::Binary { op: BinOp::Mul, right: pow, .. } = &right.kind else { panic!("expected *") };
        let ExprKind::Binary { op: BinOp::Pow, right: inner, .. } = &pow.kind else { panic!("expected **") };
        assert!(matches!(inner.kind, ExprKind::Binary { op: BinOp::Pow, .. }));
    }

    #[test]
    fn logical_and_nullish() {
        let stmts = parse_ok("a ?? b || c && d");
        let StmtKind::Expr(expr) = &stmts[0].kind else { panic!() };
        assert!(matches!(expr.kind, ExprKind::Logical { op: LogicalOp::Nullish, .. }));
    }

    #[test]
    fn arrow_functions() {
        let stmts = parse_ok("const f = (a, b = a, ...rest) => a * b\nconst g = x => ({ x })");
        let StmtKind::VarDecl { kind: VarKind::Const, decls } = &stmts[0].kind else { panic!() };
        let Some(ExprKind::Function(func)) = decls[0].init.as_ref().map(|e| &e.kind) else { panic!() };
        assert!(func.is_arrow);
        assert_eq!(func.params.len(), 2);
        assert!(func.params[1].default.is_some());
        assert_eq!(func.rest.as_deref(), Some("rest"));
        assert!(matches!(func.body, FunctionBody::Expr(_)));
    }

    #[test]
    fn object_literal_forms() {
        let stmts = parse_ok("({ a: 1, 'b c': 2, 3: 4, d, [k]: 5, m() { return this.a }, ...rest })");
        let StmtKind::Expr(expr) = &stmts[0].kind else { panic!() };
        let ExprKind::Object(props) = &expr.kind else { panic!("expected object") };
        assert_eq!(props.len(), 7);
        assert!(matches!(&props[1].key, PropKey::Named(k) if k == "b c"));
        assert!(matches!(&props[2].key, PropKey::Named(k) if k == "3"));
        assert!(matches!(props[3].value.kind, ExprKind::Ident(_)));
        assert!(matches!(props[4].key, PropKey::Computed(_)));
        assert!(matches!(props[5].value.kind, ExprKind::Function(_)));
        assert!(matches!(props[6].key, PropKey::Spread));
    }

    #[test]
    fn for_loop_variants() {
        let stmts = parse_ok(
            "for (let i = 0; i < 3; i++) {}\nfor (const x of xs) {}\nfor (k in obj) {}\nfor (;;) { break }",
        );
        assert!(matches!(stmts[0].kind, StmtKind::For { .. }));
        assert!(matches!(stmts[1].kind, StmtKind::ForOf { kind: Some(VarKind::Const), .. }));
        assert!(matches!(stmts[2].kind, StmtKind::ForIn { kind: None, .. }));
        assert!(matches!(stmts[3].kind, StmtKind::For { test: None, .. }));
    }

    #[test]
    fn in_operator_inside_for_initializer_parens() {
        parse_ok("for (var i = ('a' in o) ? 1 : 0; i < 2; i++) {}");
    }

    #[test]
    fn template_substitutions_parse() {
        let stmts = parse_ok("`sum: ${a + b}, nested: ${`${c}`}`");
        let StmtKind::Expr(expr) = &stmts[0].kind else { panic!() };
        let ExprKind::Template { quasis, exprs } = &expr.kind else { panic!("expected template") };
        assert_eq!(quasis.len(), 3);
        assert_eq!(exprs.len(), 2);
        assert!(matches!(exprs[0].kind, ExprKind::Binary { op: BinOp::Add, .. }));
    }

    #[test]
    fn compound_and_logical_assignment() {
        let stmts = parse_ok("x += 1; y ??= 2");
        let StmtKind::Expr(e) = &stmts[0].kind else { panic!() };
        assert!(matches!(e.kind, ExprKind::Assign { op: AssignOp::Compound(BinOp::Add), .. }));
        let StmtKind::Expr(e) = &stmts[1].kind else { panic!() };
        assert!(matches!(e.kind, ExprKind::Assign { op: AssignOp::Logical(LogicalOp::Nullish), .. }));
    }

    #[test]
    fn optional_chaining() {
        let stmts = parse_ok("a?.b?.[c]?.(d)");
        let StmtKind::Expr(e) = &stmts[0].kind else { panic!() };
        assert!(matches!(e.kind, ExprKind::Call { optional: true, .. }));
    }

    #[test]
    fn new_binds_member_access() {
        let stmts = parse_ok("new errors.Custom('x').message");
        let StmtKind::Expr(e) = &stmts[0].kind else { panic!() };
        let ExprKind::Member { object, property, .. } = &e.kind else { panic!("expected member") };
        assert_eq!(property, "message");
        assert!(matches!(object.kind, ExprKind::New { .. }));
    }

    #[test]
    fn labels_and_jumps() {
        parse_ok("outer: for (const a of xs) { for (const b of ys) { if (b) continue outer; break outer } }");
        assert_eq!(first_error("break"), "Illegal break statement");
        assert_eq!(first_error("while (x) { continue nowhere }"), "Undefined label 'nowhere'");
    }

    #[test]
    fn top_level_return_is_illegal() {
        assert_eq!(first_error("return 1"), "Illegal return statement");
    }

    #[test]
    fn redeclaration_in_one_block() {
        assert_eq!(
            first_error("let x = 1\nlet x = 2"),
            "Identifier 'x' has already been declared"
        );
        assert_eq!(
            first_error("{ const y = 1; var y = 2 }"),
            "Identifier 'y' has already been declared"
        );
        // Shadowing in a nested block is fine.
        parse_ok("let x = 1\n{ let x = 2 }");
        parse_ok("var v = 1\nvar v = 2");
    }

    #[test]
    fn invalid_assignment_target() {
        assert_eq!(first_error("1 = 2"), "Invalid left-hand side in assignment");
        assert_eq!(
            first_error("f()++"),
            "Invalid left-hand side expression in postfix operation"
        );
    }

    #[test]
    fn const_requires_initializer() {
        assert_eq!(first_error("const z"), "Missing initializer in const declaration");
    }

    #[test]
    fn unexpected_end_of_input() {
        assert_eq!(first_error("function f() {"), "Unexpected end of input");
        let err = parse_source("foo(1, 2").unwrap_err();
        assert!(err.hint.as_deref().unwrap_or("").contains("')'"));
    }

    #[test]
    fn errors_are_collected_across_statements() {
        let result = parse("let = 1\nlet ok = 2\nconst = 3");
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn try_catch_finally_and_switch() {
        parse_ok("try { f() } catch (e) { g(e) } finally { h() }\ntry {} catch {}");
        parse_ok("switch (x) { case 1: case 2: y(); break; default: z() }");
        assert_eq!(first_error("try {}"), "Missing catch or finally after try");
    }
    #[test]
    fn deep_nesting_is_a_syntax_error() {
        // Plenty of stack, so only the nesting limit can stop the parser.
        let handle = std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(|| {
                let nested = |open: &str, close: &str, n: usize| {
                    format!("{}1{}", open.repeat(n), close.repeat(n))
                };
                parse_ok(&nested("[", "]", 100));
                parse_ok(&nested("(", ")", 100));
                assert_eq!(first_error(&nested("[", "]", 5000)), "too much nesting");
                assert_eq!(first_error(&nested("!", "", 5000)), "too much nesting");
                assert_eq!(first_error(&nested("{", "}", 5000)), "too much nesting");
                assert_eq!(first_error(&format!("x = {}", nested("`${", "}`", 1500))), "too much nesting");
            })
            .unwrap();
        handle.join().unwrap();
    }
}

