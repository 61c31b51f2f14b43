//! Statement parsing.

use crate::ast::{Block, CatchClause, Stmt, StmtKind, SwitchCase};
use crate::lexer::TokenKind;

use super::{ParseResult, Parser};

impl<'a> Parser<'a> {
    pub(super) fn parse_block(&mut self) -> ParseResult<Block> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    self.record_error(e);
                    self.synchronize_stmt();
                }
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(Block { stmts })
    }

    pub(super) fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        let start = self.span();
        match self.kind() {
            TokenKind::Var => self.parse_var_stmt(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => {
                self.advance();
                self.expect(TokenKind::LParen, "`(`")?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen, "`)`")?;
                let body = self.parse_block()?;
                Ok(Stmt::new(
                    StmtKind::While { cond: Box::new(cond), body: Box::new(body) },
                    start.merge(self.span()),
                ))
            }
            TokenKind::Do => {
                self.advance();
                let body = self.parse_block()?;
                self.expect(TokenKind::While, "`while`")?;
                self.expect(TokenKind::LParen, "`(`")?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen, "`)`")?;
                self.expect(TokenKind::Semicolon, "`;`")?;
                Ok(Stmt::new(
                    StmtKind::DoWhile { body: Box::new(body), cond: Box::new(cond) },
                    start.merge(self.span()),
                ))
            }
            TokenKind::For => self.parse_for(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Throw => {
                self.advance();
                let value = self.parse_expr()?;
                self.expect(TokenKind::Semicolon, "`;`")?;
                Ok(Stmt::new(
                    StmtKind::Throw { value: Box::new(value) },
                    start.merge(self.span()),
                ))
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(TokenKind::Semicolon) {
                    None
                } else {
                    Some(Box::new(self.parse_expr()?))
                };
                self.expect(TokenKind::Semicolon, "`;`")?;
                Ok(Stmt::new(StmtKind::Return { value }, start.merge(self.span())))
            }
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semicolon, "`;`")?;
                Ok(Stmt::new(StmtKind::Break, start))
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Semicolon, "`;`")?;
                Ok(Stmt::new(StmtKind::Continue, start))
            }
            TokenKind::Delete => {
                self.advance();
                let value = self.parse_expr()?;
                self.expect(TokenKind::Semicolon, "`;`")?;
                Ok(Stmt::new(
                    StmtKind::Delete { value: Box::new(value) },
                    start.merge(self.span()),
                ))
            }
            TokenKind::Keep => {
                self.advance();
                let value = self.parse_expr()?;
                self.expect(TokenKind::Semicolon, "`;`")?;
                Ok(Stmt::new(
                    StmtKind::Keep { value: Box::new(value) },
                    start.merge(self.span()),
                ))
            }
            TokenKind::Release => {
                self.advance();
                let value = self.parse_expr()?;
                self.expect(TokenKind::Semicolon, "`;`")?;
                Ok(Stmt::new(
                    StmtKind::Release { value: Box::new(value) },
                    start.merge(self.span()),
                ))
            }
            TokenKind::LBrace => {
                let inner = self.parse_block()?;
                Ok(Stmt::new(
                    StmtKind::Block { inner: Box::new(inner) },
                    start.merge(self.span()),
                ))
            }
            _ => {
                if let Some(stmt) = self.try_parse_var_decl()? {
                    return Ok(stmt);
                }
                self.parse_expr_or_assign()
            }
        }
    }

    /// `var x = e;`, `var (a, b) = e;` (tuple destructuring), or a typed
    /// declaration dispatched from `try_parse_var_decl`.
    fn parse_var_stmt(&mut self) -> ParseResult<Stmt> {
        let start = self.span();
        self.advance(); // var

        if self.match_kind(TokenKind::LParen).is_some() {
            let mut names = vec![self.expect(TokenKind::Ident, "a binding name")?.text];
            while self.match_kind(TokenKind::Comma).is_some() {
                names.push(self.expect(TokenKind::Ident, "a binding name")?.text);
            }
            self.expect(TokenKind::RParen, "`)`")?;
            self.expect(TokenKind::Eq, "`=`")?;
            let value = self.parse_expr()?;
            self.expect(TokenKind::Semicolon, "`;`")?;
            return Ok(Stmt::new(
                StmtKind::TupleDestructure { names, value: Box::new(value) },
                start.merge(self.span()),
            ));
        }

        let name = self.expect(TokenKind::Ident, "a variable name")?.text;
        let init = if self.match_kind(TokenKind::Eq).is_some() {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "`;`")?;
        Ok(Stmt::new(
            StmtKind::VarDecl { ty: None, name, init, infer: true },
            start.merge(self.span()),
        ))
    }

    /// Speculative typed variable declaration: commits only when a valid
    /// type is followed by `name =` or `name ;`.
    fn try_parse_var_decl(&mut self) -> ParseResult<Option<Stmt>> {
        if !self.is_type_start() {
            return Ok(None);
        }
        let save = self.save();
        let start = self.span();
        let ty = match self.parse_type() {
            Ok(ty) => ty,
            Err(_) => {
                self.restore(save);
                return Ok(None);
            }
        };
        if !self.check(TokenKind::Ident)
            || !matches!(self.peek_nth(1).kind, TokenKind::Eq | TokenKind::Semicolon)
        {
            self.restore(save);
            return Ok(None);
        }
        let name = self.advance().text;
        let init = if self.match_kind(TokenKind::Eq).is_some() {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "`;`")?;
        Ok(Some(Stmt::new(
            StmtKind::VarDecl {
                ty: Some(Box::new(ty)),
                name,
                init,
                infer: false,
            },
            start.merge(self.span()),
        )))
    }

    fn parse_expr_or_assign(&mut self) -> ParseResult<Stmt> {
        let start = self.span();
        let target = self.parse_expr()?;
        let op = match self.kind() {
            TokenKind::Eq
            | TokenKind::PlusEq
            | TokenKind::MinusEq
            | TokenKind::StarEq
            | TokenKind::SlashEq
            | TokenKind::PercentEq
            | TokenKind::AmpEq
            | TokenKind::PipeEq
            | TokenKind::CaretEq
            | TokenKind::LtLtEq
            | TokenKind::GtGtEq => Some(self.advance().text),
            _ => None,
        };
        let kind = match op {
            Some(op) => {
                let value = self.parse_expr()?;
                StmtKind::Assign {
                    target: Box::new(target),
                    op,
                    value: Box::new(value),
                }
            }
            None => StmtKind::ExprStmt { value: Box::new(target) },
        };
        self.expect(TokenKind::Semicolon, "`;`")?;
        Ok(Stmt::new(kind, start.merge(self.span())))
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let start = self.span();
        self.advance(); // if
        self.expect(TokenKind::LParen, "`(`")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen, "`)`")?;
        let then_block = self.parse_block()?;

        let else_block = if self.match_kind(TokenKind::Else).is_some() {
            if self.check(TokenKind::If) {
                // `else if` chains nest as a one-statement else block.
                let nested = self.parse_if()?;
                Some(Box::new(Block { stmts: vec![nested] }))
            } else {
                Some(Box::new(self.parse_block()?))
            }
        } else {
            None
        };

        Ok(Stmt::new(
            StmtKind::If {
                cond: Box::new(cond),
                then_block: Box::new(then_block),
                else_block,
            },
            start.merge(self.span()),
        ))
    }

    /// `for x in e { ... }` vs C-style `for (init; cond; update) { ... }`,
    /// decided by the presence of `in` after the loop binding.
    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let start = self.span();
        self.advance(); // for

        if self.check(TokenKind::Ident)
            && matches!(self.peek_nth(1).kind, TokenKind::In | TokenKind::Comma)
        {
            let binding = self.advance().text;
            let binding2 = if self.match_kind(TokenKind::Comma).is_some() {
                Some(self.expect(TokenKind::Ident, "a binding name")?.text)
            } else {
                None
            };
            self.expect(TokenKind::In, "`in`")?;
            let iterable = self.parse_expr()?;
            let body = self.parse_block()?;
            return Ok(Stmt::new(
                StmtKind::ForIn {
                    binding,
                    binding2,
                    iterable: Box::new(iterable),
                    body: Box::new(body),
                },
                start.merge(self.span()),
            ));
        }

        self.expect(TokenKind::LParen, "`(`")?;
        let init = if self.match_kind(TokenKind::Semicolon).is_some() {
            None
        } else if let Some(decl) = self.try_parse_var_decl()? {
            // try_parse_var_decl consumed the `;`.
            Some(Box::new(decl))
        } else {
            let stmt = self.parse_expr_or_assign()?;
            Some(Box::new(stmt))
        };
        let cond = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        self.expect(TokenKind::Semicolon, "`;`")?;
        let update = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(Box::new(self.parse_for_update()?))
        };
        self.expect(TokenKind::RParen, "`)`")?;
        let body = self.parse_block()?;

        Ok(Stmt::new(
            StmtKind::For {
                init,
                cond,
                update,
                body: Box::new(body),
            },
            start.merge(self.span()),
        ))
    }

    /// A for-loop update clause may be a bare assignment (`i += 1`); keep it
    /// as a binary node so the emitter renders it inline in the header.
    fn parse_for_update(&mut self) -> ParseResult<crate::ast::Expr> {
        let left = self.parse_expr()?;
        let op = match self.kind() {
            TokenKind::Eq
            | TokenKind::PlusEq
            | TokenKind::MinusEq
            | TokenKind::StarEq
            | TokenKind::SlashEq
            | TokenKind::PercentEq => Some(self.advance().text),
            _ => None,
        };
        match op {
            Some(op) => {
                let right = self.parse_expr()?;
                let span = left.span.merge(right.span);
                Ok(self.expr(
                    crate::ast::ExprKind::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    span,
                ))
            }
            None => Ok(left),
        }
    }

    fn parse_switch(&mut self) -> ParseResult<Stmt> {
        let start = self.span();
        self.advance(); // switch
        self.expect(TokenKind::LParen, "`(`")?;
        let value = self.parse_expr()?;
        self.expect(TokenKind::RParen, "`)`")?;
        self.expect(TokenKind::LBrace, "`{`")?;

        let mut cases = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            let case_value = if self.match_kind(TokenKind::Case).is_some() {
                let v = self.parse_expr()?;
                self.expect(TokenKind::Colon, "`:`")?;
                Some(Box::new(v))
            } else {
                self.expect(TokenKind::Default, "`case` or `default`")?;
                self.expect(TokenKind::Colon, "`:`")?;
                None
            };
            let mut body = Vec::new();
            while !matches!(
                self.kind(),
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                body.push(self.parse_stmt()?);
            }
            cases.push(SwitchCase { value: case_value, body });
        }
        self.expect(TokenKind::RBrace, "`}`")?;

        Ok(Stmt::new(
            StmtKind::Switch { value: Box::new(value), cases },
            start.merge(self.span()),
        ))
    }

    fn parse_try(&mut self) -> ParseResult<Stmt> {
        let start = self.span();
        self.advance(); // try
        let try_block = self.parse_block()?;

        let handler = if self.match_kind(TokenKind::Catch).is_some() {
            self.expect(TokenKind::LParen, "`(`")?;
            let ty = self.parse_type()?;
            let name = self.expect(TokenKind::Ident, "a catch binding")?.text;
            self.expect(TokenKind::RParen, "`)`")?;
            let body = self.parse_block()?;
            Some(Box::new(CatchClause {
                ty: Box::new(ty),
                name,
                body: Box::new(body),
            }))
        } else {
            None
        };

        let finally_block = if self.match_kind(TokenKind::Finally).is_some() {
            Some(Box::new(self.parse_block()?))
        } else {
            None
        };

        if handler.is_none() && finally_block.is_none() {
            return Err(self.error_here("`try` requires a `catch` or `finally` clause"));
        }

        Ok(Stmt::new(
            StmtKind::Try {
                try_block: Box::new(try_block),
                handler,
                finally_block,
            },
            start.merge(self.span()),
        ))
    }
}
