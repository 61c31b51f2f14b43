//! Recursive-descent parser.
//!
//! Hand-written, no parser generator. The grammar's operator precedence is
//! the C ladder with `??` and the null-aware postfix operators added; the
//! interesting disambiguations (generic arguments vs comparison, cast vs
//! grouping, `for` vs `for-in`, tuple types vs grouping, the three lambda
//! forms) each get a dedicated lookahead.
//!
//! Errors are collected as diagnostics; after a failed declaration or
//! statement the parser panic-modes to the next `;`, `}` or declaration
//! start and keeps going, so one run reports everything it can.

mod decl;
mod expr;
mod stmt;
mod types;

use crate::ast::{Expr, ExprKind, NodeIdGen, Program, Span};
use crate::diag::{Diagnostic, Stage};
use crate::grammar::GrammarInfo;
use crate::lexer::{Token, TokenKind};

/// Internal parse failure; surfaces as a diagnostic at the recovery point.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

pub type ParseResult<T> = Result<T, ParseError>;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    grammar: &'a GrammarInfo,
    ids: NodeIdGen,
    diags: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, grammar: &'a GrammarInfo) -> Self {
        Parser {
            tokens,
            pos: 0,
            grammar,
            ids: NodeIdGen::new(),
            diags: Vec::new(),
        }
    }

    /// Parse a whole translation unit. Always returns a `Program`; parse
    /// failures come back as diagnostics and the affected declarations are
    /// dropped.
    pub fn parse_program(mut self) -> (Program, Vec<Diagnostic>) {
        let mut decls = Vec::new();
        while !self.at_end() {
            match self.parse_decl() {
                Ok(decl) => decls.push(decl),
                Err(e) => {
                    self.diags
                        .push(Diagnostic::error(Stage::Parser, e.message, e.span));
                    self.synchronize_decl();
                }
            }
        }
        (Program { decls }, self.diags)
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().expect("token stream has EOF"))
    }

    fn peek_nth(&self, n: usize) -> &Token {
        self.tokens
            .get(self.pos + n)
            .unwrap_or_else(|| self.tokens.last().expect("token stream has EOF"))
    }

    fn kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn span(&self) -> Span {
        self.peek().span()
    }

    fn at_end(&self) -> bool {
        self.kind() == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if !self.at_end() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    fn match_kind(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(&format!(
                "expected {}, got {} `{}`",
                what,
                self.kind().name(),
                self.peek().text
            )))
        }
    }

    fn error_here(&self, message: &str) -> ParseError {
        ParseError {
            message: message.to_string(),
            span: self.span(),
        }
    }

    /// Position bookmark for speculative parses.
    fn save(&self) -> usize {
        self.pos
    }

    fn restore(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Consume a single `>`, splitting `>>` and `>>=` tokens so nested
    /// generic argument lists close correctly (`Map<string, Vector<int>>`).
    fn expect_gt(&mut self) -> ParseResult<()> {
        match self.kind() {
            TokenKind::Gt => {
                self.advance();
                Ok(())
            }
            TokenKind::GtGt => {
                let tok = &mut self.tokens[self.pos];
                tok.kind = TokenKind::Gt;
                tok.text = ">".to_string();
                tok.col += 1;
                tok.offset += 1;
                Ok(())
            }
            TokenKind::GtGtEq => {
                let tok = &mut self.tokens[self.pos];
                tok.kind = TokenKind::GtEq;
                tok.text = ">=".to_string();
                tok.col += 1;
                tok.offset += 1;
                Ok(())
            }
            _ => Err(self.error_here(&format!(
                "expected `>`, got {} `{}`",
                self.kind().name(),
                self.peek().text
            ))),
        }
    }

    /// Build an expression node with a fresh id.
    fn expr(&mut self, kind: ExprKind, span: Span) -> Expr {
        Expr::new(kind, self.ids.fresh(), span)
    }

    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------

    /// Skip to the next plausible top-level declaration start.
    fn synchronize_decl(&mut self) {
        while !self.at_end() {
            match self.kind() {
                TokenKind::Semicolon | TokenKind::RBrace => {
                    self.advance();
                    return;
                }
                TokenKind::Class
                | TokenKind::Interface
                | TokenKind::Enum
                | TokenKind::Typedef
                | TokenKind::Extern
                | TokenKind::Struct => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skip to the next statement boundary inside a block.
    fn synchronize_stmt(&mut self) {
        while !self.at_end() {
            match self.kind() {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn record_error(&mut self, e: ParseError) {
        self.diags
            .push(Diagnostic::error(Stage::Parser, e.message, e.span));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DeclKind, StmtKind, TypeExprKind};
    use crate::lexer::Lexer;

    fn parse(input: &str) -> Program {
        let grammar = GrammarInfo::bundled().unwrap();
        let (tokens, lex_diags) = Lexer::new(input, &grammar).tokenize();
        assert!(lex_diags.is_empty(), "lex diagnostics: {:?}", lex_diags);
        let (program, diags) = Parser::new(tokens, &grammar).parse_program();
        assert!(diags.is_empty(), "parse diagnostics: {:?}", diags);
        program
    }

    fn parse_with_errors(input: &str) -> (Program, Vec<Diagnostic>) {
        let grammar = GrammarInfo::bundled().unwrap();
        let (tokens, _) = Lexer::new(input, &grammar).tokenize();
        Parser::new(tokens, &grammar).parse_program()
    }

    #[test]
    fn function_with_body() {
        let prog = parse("int main() { return 0; }");
        assert_eq!(prog.decls.len(), 1);
        match &prog.decls[0].kind {
            DeclKind::Function { func } => {
                assert_eq!(func.name, "main");
                assert!(func.body.is_some());
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn class_with_members() {
        let prog = parse(
            "class Counter {\n\
             private int count = 0;\n\
             public Counter() { }\n\
             public void inc() { self.count = self.count + 1; }\n\
             public int get() { return self.count; }\n\
             }",
        );
        match &prog.decls[0].kind {
            DeclKind::Class { class } => {
                assert_eq!(class.name, "Counter");
                assert_eq!(class.members.len(), 4);
            }
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn generic_vs_comparison() {
        // `a < b` must stay a comparison...
        let prog = parse("int f(int a, int b) { return a < b; }");
        assert_eq!(prog.decls.len(), 1);
        // ...while `Vector<int> v = ...` is a generic type application.
        let prog = parse("void g() { Vector<int> v = [1, 2]; }");
        match &prog.decls[0].kind {
            DeclKind::Function { func } => {
                let body = func.body.as_ref().unwrap();
                match &body.stmts[0].kind {
                    StmtKind::VarDecl { ty: Some(ty), .. } => match &ty.kind {
                        TypeExprKind::Named { name, args } => {
                            assert_eq!(name, "Vector");
                            assert_eq!(args.len(), 1);
                        }
                        other => panic!("expected generic type, got {:?}", other),
                    },
                    other => panic!("expected var decl, got {:?}", other),
                }
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn nested_generic_closes_shift_token() {
        let prog = parse("void g() { Map<string, Vector<int>> m = {}; }");
        assert_eq!(prog.decls.len(), 1);
    }

    #[test]
    fn panic_mode_recovers() {
        let (prog, diags) = parse_with_errors(
            "int broken( { return; }\nint ok() { return 1; }",
        );
        assert!(!diags.is_empty());
        // The second declaration still parses.
        assert!(prog
            .decls
            .iter()
            .any(|d| matches!(&d.kind, DeclKind::Function { func } if func.name == "ok")));
    }
}
