//! Expression parsing: the C precedence ladder plus the null-aware
//! operators, lambdas, and f-string chunk splitting.

use crate::ast::{Expr, ExprKind, FStringPart, LambdaBody, MapEntry, MemberOp, Span, TypeExprKind};
use crate::diag::{Diagnostic, Stage};
use crate::lexer::{Lexer, TokenKind};

use super::{ParseResult, Parser};

/// Characters allowed in an f-string format spec (`{x:.2f}`).
const FORMAT_SPEC_CHARS: &str = "0123456789.+-<>^#, defgsxXulo%";

impl<'a> Parser<'a> {
    pub(super) fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_coalesce()
    }

    fn parse_coalesce(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_ternary()?;
        while self.match_kind(TokenKind::QuestionQuestion).is_some() {
            let right = self.parse_ternary()?;
            let span = left.span.merge(right.span);
            left = self.expr(
                ExprKind::Coalesce {
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_ternary(&mut self) -> ParseResult<Expr> {
        let cond = self.parse_binary(0)?;
        if self.match_kind(TokenKind::Question).is_some() {
            let then_expr = self.parse_expr()?;
            self.expect(TokenKind::Colon, "`:`")?;
            // Right-associative.
            let else_expr = self.parse_ternary()?;
            let span = cond.span.merge(else_expr.span);
            return Ok(self.expr(
                ExprKind::Ternary {
                    cond: Box::new(cond),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                },
                span,
            ));
        }
        Ok(cond)
    }

    /// Binary operator levels, loosest (`||`) to tightest (`* / %`).
    fn parse_binary(&mut self, level: usize) -> ParseResult<Expr> {
        const LEVELS: &[&[TokenKind]] = &[
            &[TokenKind::PipePipe],
            &[TokenKind::AmpAmp],
            &[TokenKind::Pipe],
            &[TokenKind::Caret],
            &[TokenKind::Amp],
            &[TokenKind::EqEq, TokenKind::BangEq],
            &[TokenKind::Lt, TokenKind::Gt, TokenKind::LtEq, TokenKind::GtEq],
            &[TokenKind::LtLt, TokenKind::GtGt],
            &[TokenKind::Plus, TokenKind::Minus],
            &[TokenKind::Star, TokenKind::Slash, TokenKind::Percent],
        ];
        if level >= LEVELS.len() {
            return self.parse_prefix();
        }
        let mut left = self.parse_binary(level + 1)?;
        while LEVELS[level].contains(&self.kind()) {
            let op = self.advance().text;
            let right = self.parse_binary(level + 1)?;
            let span = left.span.merge(right.span);
            left = self.expr(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        let start = self.span();
        match self.kind() {
            TokenKind::Bang
            | TokenKind::Minus
            | TokenKind::Tilde
            | TokenKind::PlusPlus
            | TokenKind::MinusMinus
            | TokenKind::Star
            | TokenKind::Amp => {
                let op = self.advance().text;
                let operand = self.parse_prefix()?;
                let span = start.merge(operand.span);
                Ok(self.expr(
                    ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                        prefix: true,
                    },
                    span,
                ))
            }
            TokenKind::LParen => {
                if let Some(cast) = self.try_parse_cast()? {
                    return Ok(cast);
                }
                self.parse_postfix()
            }
            _ => self.parse_postfix(),
        }
    }

    /// `(Type)expr` is a cast iff the parentheses enclose a syntactically
    /// valid type and what follows can start a unary expression. For a bare
    /// user identifier the follow set is narrowed to atoms, so `(a) - b`
    /// stays a subtraction.
    fn try_parse_cast(&mut self) -> ParseResult<Option<Expr>> {
        let save = self.save();
        let start = self.span();
        self.advance(); // (
        let ty = match self.parse_type() {
            Ok(ty) => ty,
            Err(_) => {
                self.restore(save);
                return Ok(None);
            }
        };
        if !self.check(TokenKind::RParen) {
            self.restore(save);
            return Ok(None);
        }
        self.advance(); // )

        let bare_ident = matches!(
            &ty.kind,
            TypeExprKind::Named { name, args }
                if args.is_empty() && !is_builtin_type_name(name)
        );
        let next = self.kind();
        let is_atom = matches!(
            next,
            TokenKind::Ident
                | TokenKind::IntLit
                | TokenKind::FloatLit
                | TokenKind::StringLit
                | TokenKind::CharLit
                | TokenKind::FStringLit
                | TokenKind::SelfKw
                | TokenKind::New
                | TokenKind::Null
                | TokenKind::True
                | TokenKind::False
        );
        let is_unary_start = is_atom
            || matches!(
                next,
                TokenKind::Bang
                    | TokenKind::Minus
                    | TokenKind::Tilde
                    | TokenKind::Star
                    | TokenKind::Amp
                    | TokenKind::PlusPlus
                    | TokenKind::MinusMinus
                    | TokenKind::LParen
            );
        let commits = if bare_ident { is_atom } else { is_unary_start };
        if !commits {
            self.restore(save);
            return Ok(None);
        }

        let value = self.parse_prefix()?;
        let span = start.merge(value.span);
        Ok(Some(self.expr(
            ExprKind::Cast {
                ty: Box::new(ty),
                value: Box::new(value),
            },
            span,
        )))
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.kind() {
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(TokenKind::RParen) {
                        args.push(self.parse_expr()?);
                        while self.match_kind(TokenKind::Comma).is_some() {
                            args.push(self.parse_expr()?);
                        }
                    }
                    let end = self.expect(TokenKind::RParen, "`)`")?.span();
                    let span = expr.span.merge(end);
                    // `range(...)` is a grammar-level builtin, only
                    // meaningful as a for-in iterable.
                    if expr.as_ident() == Some("range") && !args.is_empty() && args.len() <= 3 {
                        let mut it = args.into_iter();
                        let range_start = it.next().expect("len checked");
                        let end_arg = it.next().map(Box::new);
                        let step = it.next().map(Box::new);
                        expr = self.expr(
                            ExprKind::Range {
                                start: Box::new(range_start),
                                end: end_arg,
                                step,
                            },
                            span,
                        );
                    } else {
                        expr = self.expr(
                            ExprKind::Call {
                                callee: Box::new(expr),
                                args,
                            },
                            span,
                        );
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    let end = self.expect(TokenKind::RBracket, "`]`")?.span();
                    let span = expr.span.merge(end);
                    expr = self.expr(
                        ExprKind::Index {
                            base: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                TokenKind::Dot | TokenKind::Arrow | TokenKind::QuestionDot => {
                    let op = match self.advance().kind {
                        TokenKind::Dot => MemberOp::Dot,
                        TokenKind::Arrow => MemberOp::Arrow,
                        _ => MemberOp::Question,
                    };
                    let field_tok = self.expect(TokenKind::Ident, "a member name")?;
                    let span = expr.span.merge(field_tok.span());
                    expr = self.expr(
                        ExprKind::Member {
                            base: Box::new(expr),
                            field: field_tok.text,
                            op,
                        },
                        span,
                    );
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let tok = self.advance();
                    let span = expr.span.merge(tok.span());
                    expr = self.expr(
                        ExprKind::Unary {
                            op: tok.text,
                            operand: Box::new(expr),
                            prefix: false,
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let start = self.span();
        match self.kind() {
            TokenKind::IntLit => {
                let text = self.advance().text;
                Ok(self.expr(ExprKind::IntLit { text }, start))
            }
            TokenKind::FloatLit => {
                let text = self.advance().text;
                Ok(self.expr(ExprKind::FloatLit { text }, start))
            }
            TokenKind::CharLit => {
                let text = self.advance().text;
                Ok(self.expr(ExprKind::CharLit { text }, start))
            }
            TokenKind::StringLit => {
                let text = self.advance().text;
                Ok(self.expr(ExprKind::StringLit { text }, start))
            }
            TokenKind::FStringLit => {
                let tok = self.advance();
                let parts = self.split_fstring(&tok.text, tok.span())?;
                Ok(self.expr(ExprKind::FString { parts }, start))
            }
            TokenKind::True => {
                self.advance();
                Ok(self.expr(ExprKind::BoolLit { value: true }, start))
            }
            TokenKind::False => {
                self.advance();
                Ok(self.expr(ExprKind::BoolLit { value: false }, start))
            }
            TokenKind::Null => {
                self.advance();
                Ok(self.expr(ExprKind::NullLit, start))
            }
            TokenKind::SelfKw => {
                self.advance();
                Ok(self.expr(ExprKind::SelfLit, start))
            }
            TokenKind::Super => {
                self.advance();
                Ok(self.expr(ExprKind::SuperLit, start))
            }
            TokenKind::Sizeof => {
                self.advance();
                self.expect(TokenKind::LParen, "`(`")?;
                let ty = self.parse_type()?;
                let end = self.expect(TokenKind::RParen, "`)`")?.span();
                Ok(self.expr(ExprKind::Sizeof { ty: Box::new(ty) }, start.merge(end)))
            }
            TokenKind::New => {
                self.advance();
                let ty = self.parse_type()?;
                let mut args = Vec::new();
                if self.match_kind(TokenKind::LParen).is_some() {
                    if !self.check(TokenKind::RParen) {
                        args.push(self.parse_expr()?);
                        while self.match_kind(TokenKind::Comma).is_some() {
                            args.push(self.parse_expr()?);
                        }
                    }
                    self.expect(TokenKind::RParen, "`)`")?;
                }
                Ok(self.expr(
                    ExprKind::New { ty: Box::new(ty), args },
                    start.merge(self.span()),
                ))
            }
            TokenKind::Spawn => {
                self.advance();
                let value = self.parse_expr()?;
                let span = start.merge(value.span);
                Ok(self.expr(ExprKind::Spawn { value: Box::new(value) }, span))
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(TokenKind::RBracket) {
                    items.push(self.parse_expr()?);
                    while self.match_kind(TokenKind::Comma).is_some() {
                        if self.check(TokenKind::RBracket) {
                            break;
                        }
                        items.push(self.parse_expr()?);
                    }
                }
                let end = self.expect(TokenKind::RBracket, "`]`")?.span();
                Ok(self.expr(ExprKind::ListLit { items }, start.merge(end)))
            }
            TokenKind::LBrace => self.parse_map_literal(),
            TokenKind::LParen => {
                if self.is_arrow_lambda_ahead() {
                    return self.parse_arrow_lambda();
                }
                self.advance();
                let first = self.parse_expr()?;
                if self.check(TokenKind::Comma) {
                    let mut items = vec![first];
                    while self.match_kind(TokenKind::Comma).is_some() {
                        items.push(self.parse_expr()?);
                    }
                    let end = self.expect(TokenKind::RParen, "`)`")?.span();
                    return Ok(self.expr(ExprKind::TupleLit { items }, start.merge(end)));
                }
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(first)
            }
            TokenKind::Ident => {
                if let Some(lambda) = self.try_parse_verbose_lambda()? {
                    return Ok(lambda);
                }
                let name = self.advance().text;
                Ok(self.expr(ExprKind::Ident { name }, start))
            }
            _ => {
                // A type keyword can still begin a verbose lambda:
                // `int function(int x) { ... }`.
                if self.is_type_start() {
                    if let Some(lambda) = self.try_parse_verbose_lambda()? {
                        return Ok(lambda);
                    }
                }
                Err(self.error_here(&format!(
                    "expected an expression, got {} `{}`",
                    self.kind().name(),
                    self.peek().text
                )))
            }
        }
    }

    /// `{}` / `{ key: value, ... }` in expression position.
    fn parse_map_literal(&mut self) -> ParseResult<Expr> {
        let start = self.span();
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut entries = Vec::new();
        if !self.check(TokenKind::RBrace) {
            loop {
                let key = self.parse_expr()?;
                self.expect(TokenKind::Colon, "`:`")?;
                let value = self.parse_expr()?;
                entries.push(MapEntry {
                    key: Box::new(key),
                    value: Box::new(value),
                });
                if self.match_kind(TokenKind::Comma).is_none() || self.check(TokenKind::RBrace) {
                    break;
                }
            }
        }
        let end = self.expect(TokenKind::RBrace, "`}`")?.span();
        Ok(self.expr(ExprKind::MapLit { entries }, start.merge(end)))
    }

    // ------------------------------------------------------------------
    // Lambdas
    // ------------------------------------------------------------------

    /// Does `(` open an arrow lambda's parameter list? Scan to the matching
    /// `)` and look for `=>`.
    fn is_arrow_lambda_ahead(&mut self) -> bool {
        let save = self.save();
        debug_assert!(self.check(TokenKind::LParen));
        self.advance();
        let mut depth = 1usize;
        while !self.at_end() && depth > 0 {
            match self.kind() {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth -= 1,
                TokenKind::Semicolon | TokenKind::LBrace => break,
                _ => {}
            }
            self.advance();
        }
        let is_lambda = depth == 0 && self.check(TokenKind::FatArrow);
        self.restore(save);
        is_lambda
    }

    /// `(params) => expr` or `(params) => { ... }`.
    fn parse_arrow_lambda(&mut self) -> ParseResult<Expr> {
        let start = self.span();
        self.expect(TokenKind::LParen, "`(`")?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen, "`)`")?;
        self.expect(TokenKind::FatArrow, "`=>`")?;

        let body = if self.check(TokenKind::LBrace) {
            LambdaBody::BlockBody {
                body: Box::new(self.parse_block()?),
            }
        } else {
            LambdaBody::ExprBody {
                value: Box::new(self.parse_expr()?),
            }
        };
        Ok(self.expr(
            ExprKind::Lambda {
                params,
                ret: None,
                body: Box::new(body),
            },
            start.merge(self.span()),
        ))
    }

    /// Verbose lambda: `ReturnT function(params) { ... }` in expression
    /// position. Speculative; rolls back unless `function` follows a type.
    fn try_parse_verbose_lambda(&mut self) -> ParseResult<Option<Expr>> {
        let save = self.save();
        let start = self.span();
        let ret = match self.parse_type() {
            Ok(ty) => ty,
            Err(_) => {
                self.restore(save);
                return Ok(None);
            }
        };
        if !self.check(TokenKind::Function) {
            self.restore(save);
            return Ok(None);
        }
        self.advance(); // function
        self.expect(TokenKind::LParen, "`(`")?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen, "`)`")?;
        let body = self.parse_block()?;
        Ok(Some(self.expr(
            ExprKind::Lambda {
                params,
                ret: Some(Box::new(ret)),
                body: Box::new(LambdaBody::BlockBody { body: Box::new(body) }),
            },
            start.merge(self.span()),
        )))
    }

    // ------------------------------------------------------------------
    // F-strings
    // ------------------------------------------------------------------

    /// Split a raw f-string body into text and expression chunks. `{{`/`}}`
    /// are literal braces; `{expr}` and `{expr:spec}` re-enter the lexer and
    /// an expression sub-parse. Nested f-strings are rejected.
    fn split_fstring(&mut self, body: &str, span: Span) -> ParseResult<Vec<FStringPart>> {
        let chars: Vec<char> = body.chars().collect();
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut i = 0usize;

        while i < chars.len() {
            match chars[i] {
                '{' if chars.get(i + 1) == Some(&'{') => {
                    text.push('{');
                    i += 2;
                }
                '}' if chars.get(i + 1) == Some(&'}') => {
                    text.push('}');
                    i += 2;
                }
                '{' => {
                    if !text.is_empty() {
                        parts.push(FStringPart::Text {
                            text: std::mem::take(&mut text),
                        });
                    }
                    let (chunk, consumed) = scan_chunk(&chars[i + 1..]);
                    if consumed == 0 {
                        return Err(ParseErrorAt(span, "unterminated `{` in f-string").into());
                    }
                    i += 1 + consumed; // chunk + closing brace
                    let (expr_src, format) = split_format_spec(&chunk);
                    if expr_src.trim().is_empty() {
                        return Err(ParseErrorAt(span, "empty expression in f-string").into());
                    }
                    let value = self.parse_fstring_chunk(&expr_src, span)?;
                    parts.push(FStringPart::Chunk {
                        value: Box::new(value),
                        format,
                    });
                }
                '}' => {
                    return Err(ParseErrorAt(span, "stray `}` in f-string").into());
                }
                c => {
                    text.push(c);
                    i += 1;
                }
            }
        }
        if !text.is_empty() {
            parts.push(FStringPart::Text { text });
        }
        Ok(parts)
    }

    /// Re-lex and parse one `{...}` chunk as an expression. The sub-parser
    /// shares this parser's node-id generator so ids stay unique.
    fn parse_fstring_chunk(&mut self, src: &str, span: Span) -> ParseResult<Expr> {
        let (tokens, lex_diags) = Lexer::new(src, self.grammar).tokenize();
        if !lex_diags.is_empty() {
            return Err(ParseErrorAt(span, "malformed expression in f-string").into());
        }
        if tokens.iter().any(|t| t.kind == TokenKind::FStringLit) {
            return Err(ParseErrorAt(span, "nested f-strings are not supported").into());
        }
        let mut sub = Parser {
            tokens,
            pos: 0,
            grammar: self.grammar,
            ids: std::mem::take(&mut self.ids),
            diags: Vec::new(),
        };
        let result = sub.parse_expr();
        let trailing_ok = sub.at_end();
        self.ids = std::mem::take(&mut sub.ids);
        for d in sub.diags {
            self.diags.push(Diagnostic::error(Stage::Parser, d.message, span));
        }
        let expr = result.map_err(|e| ParseErrorAt(span, &e.message).into_err())?;
        if !trailing_ok {
            return Err(ParseErrorAt(span, "trailing tokens in f-string expression").into());
        }
        Ok(expr)
    }
}

/// Scan an f-string chunk up to its top-level closing `}`, honoring nested
/// braces, brackets, and quoted strings. Returns (chunk text, chars consumed
/// including the closing brace).
fn scan_chunk(chars: &[char]) -> (String, usize) {
    let mut depth = 0usize;
    let mut out = String::new();
    let mut i = 0usize;
    while i < chars.len() {
        match chars[i] {
            '"' => {
                out.push('"');
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        out.push(chars[i]);
                        i += 1;
                    }
                    out.push(chars[i]);
                    i += 1;
                }
                if i < chars.len() {
                    out.push('"');
                    i += 1;
                }
            }
            '{' => {
                depth += 1;
                out.push('{');
                i += 1;
            }
            '}' if depth == 0 => return (out, i + 1),
            '}' => {
                depth -= 1;
                out.push('}');
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    (out, 0)
}

/// Split `expr:spec` at the last top-level colon, but only when the suffix
/// looks like a printf-style format spec (so `cond ? a : b` stays intact).
fn split_format_spec(chunk: &str) -> (String, Option<String>) {
    let chars: Vec<char> = chunk.chars().collect();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut colon = None;
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '"' => in_string = !in_string,
            '(' | '[' | '{' if !in_string => depth += 1,
            ')' | ']' | '}' if !in_string => depth -= 1,
            ':' if !in_string && depth == 0 => colon = Some(i),
            _ => {}
        }
    }
    if let Some(pos) = colon {
        let spec: String = chars[pos + 1..].iter().collect();
        if !spec.is_empty() && spec.chars().all(|c| FORMAT_SPEC_CHARS.contains(c)) {
            let expr: String = chars[..pos].iter().collect();
            return (expr, Some(spec));
        }
    }
    (chunk.to_string(), None)
}

/// Builtin type names commit a cast under the liberal follow-set rule.
fn is_builtin_type_name(name: &str) -> bool {
    let first = name.split_whitespace().next().unwrap_or(name);
    matches!(
        first,
        "void"
            | "int"
            | "float"
            | "double"
            | "char"
            | "string"
            | "bool"
            | "short"
            | "long"
            | "unsigned"
            | "signed"
            | "struct"
            | "enum"
            | "union"
    )
}

/// Tiny helper for span-carrying f-string errors.
struct ParseErrorAt<'m>(Span, &'m str);

impl<'m> ParseErrorAt<'m> {
    fn into_err(self) -> super::ParseError {
        super::ParseError {
            message: self.1.to_string(),
            span: self.0,
        }
    }
}

impl<'m> From<ParseErrorAt<'m>> for super::ParseError {
    fn from(value: ParseErrorAt<'m>) -> Self {
        value.into_err()
    }
}
