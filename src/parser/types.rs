//! Type expression and parameter parsing.

use crate::ast::{Param, TypeExpr, TypeExprKind};
use crate::lexer::TokenKind;

use super::{ParseResult, Parser};

/// Kinds that can begin a builtin type name.
const TYPE_KEYWORDS: &[TokenKind] = &[
    TokenKind::Void,
    TokenKind::Int,
    TokenKind::Float,
    TokenKind::Double,
    TokenKind::Char,
    TokenKind::Short,
    TokenKind::Long,
    TokenKind::Unsigned,
    TokenKind::Signed,
    TokenKind::String,
    TokenKind::Bool,
    TokenKind::Struct,
    TokenKind::Enum,
    TokenKind::Union,
    TokenKind::Const,
    TokenKind::Static,
    TokenKind::Volatile,
];

impl<'a> Parser<'a> {
    /// Could the current token begin a type expression?
    pub(super) fn is_type_start(&mut self) -> bool {
        let kind = self.kind();
        if kind == TokenKind::Var {
            return true;
        }
        if TYPE_KEYWORDS.contains(&kind) || kind == TokenKind::Ident {
            return true;
        }
        kind == TokenKind::LParen && self.is_tuple_type_start()
    }

    pub(super) fn parse_type(&mut self) -> ParseResult<TypeExpr> {
        let start = self.span();

        // const/static/volatile qualifiers carry no meaning for lowering;
        // accept and drop them.
        while matches!(
            self.kind(),
            TokenKind::Const | TokenKind::Static | TokenKind::Volatile
        ) {
            self.advance();
        }

        let mut ty = if self.check(TokenKind::LParen) {
            self.parse_tuple_type()?
        } else {
            let name = self.parse_base_name()?;
            let mut args = Vec::new();
            if self.check(TokenKind::Lt) && self.is_generic_args_start() {
                self.advance();
                args.push(self.parse_type()?);
                while self.match_kind(TokenKind::Comma).is_some() {
                    args.push(self.parse_type()?);
                }
                self.expect_gt()?;
            }
            TypeExpr::new(TypeExprKind::Named { name, args }, start)
        };

        while self.match_kind(TokenKind::Star).is_some() {
            let span = start.merge(self.span());
            ty = TypeExpr::new(TypeExprKind::Ptr { inner: Box::new(ty) }, span);
        }
        if self.match_kind(TokenKind::Question).is_some() {
            let span = start.merge(self.span());
            ty = TypeExpr::new(TypeExprKind::Nullable { inner: Box::new(ty) }, span);
        }
        Ok(ty)
    }

    /// Base type name, including multi-word C forms (`unsigned int`,
    /// `long long`, `struct Name`).
    fn parse_base_name(&mut self) -> ParseResult<String> {
        match self.kind() {
            TokenKind::Unsigned | TokenKind::Signed => {
                let mut base = self.advance().text;
                if matches!(
                    self.kind(),
                    TokenKind::Int | TokenKind::Short | TokenKind::Long | TokenKind::Char
                ) {
                    base.push(' ');
                    base.push_str(&self.advance().text);
                    if base.ends_with("long") && self.check(TokenKind::Long) {
                        base.push(' ');
                        base.push_str(&self.advance().text);
                    }
                }
                Ok(base)
            }
            TokenKind::Long => {
                let mut base = self.advance().text;
                if self.check(TokenKind::Long) {
                    base.push(' ');
                    base.push_str(&self.advance().text);
                }
                if matches!(self.kind(), TokenKind::Int | TokenKind::Double) {
                    base.push(' ');
                    base.push_str(&self.advance().text);
                }
                Ok(base)
            }
            TokenKind::Short => {
                let mut base = self.advance().text;
                if self.check(TokenKind::Int) {
                    base.push(' ');
                    base.push_str(&self.advance().text);
                }
                Ok(base)
            }
            TokenKind::Struct | TokenKind::Enum | TokenKind::Union => {
                let kw = self.advance().text;
                let name = self.expect(TokenKind::Ident, "a type name")?.text;
                Ok(format!("{} {}", kw, name))
            }
            TokenKind::Ident
            | TokenKind::Void
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::Double
            | TokenKind::Char
            | TokenKind::String
            | TokenKind::Bool => Ok(self.advance().text),
            _ => Err(self.error_here(&format!(
                "expected a type, got {} `{}`",
                self.kind().name(),
                self.peek().text
            ))),
        }
    }

    /// Parenthesized, comma-separated types form a tuple type; a single
    /// parenthesized type is grouping.
    fn parse_tuple_type(&mut self) -> ParseResult<TypeExpr> {
        let start = self.span();
        self.expect(TokenKind::LParen, "`(`")?;
        let mut items = vec![self.parse_type()?];
        while self.match_kind(TokenKind::Comma).is_some() {
            items.push(self.parse_type()?);
        }
        let end = self.expect(TokenKind::RParen, "`)`")?.span();
        if items.len() == 1 {
            return Ok(items.pop().expect("one item"));
        }
        Ok(TypeExpr::new(
            TypeExprKind::Tuple { items },
            start.merge(end),
        ))
    }

    /// Does `(` begin a tuple type like `(int, string)`? Requires a comma at
    /// paren depth 1 with a type-shaped first token.
    pub(super) fn is_tuple_type_start(&mut self) -> bool {
        let save = self.save();
        debug_assert!(self.check(TokenKind::LParen));
        self.advance();
        let first = self.kind();
        if first != TokenKind::Ident && !TYPE_KEYWORDS.contains(&first) {
            self.restore(save);
            return false;
        }
        let mut depth = 1usize;
        let mut found_comma = false;
        while !self.at_end() && depth > 0 {
            match self.kind() {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth -= 1,
                TokenKind::Comma if depth == 1 => {
                    found_comma = true;
                    break;
                }
                TokenKind::Semicolon | TokenKind::LBrace => break,
                _ => {}
            }
            self.advance();
        }
        self.restore(save);
        found_comma
    }

    /// Trial scan deciding whether `<` opens a generic argument list rather
    /// than a comparison: the list must close with a balanced `>` (or half
    /// of a `>>`) and be followed by a context consistent with a type
    /// application (identifier, call, initializer, member access, ...).
    pub(super) fn is_generic_args_start(&mut self) -> bool {
        let save = self.save();
        debug_assert!(self.check(TokenKind::Lt));
        self.advance();
        let mut depth = 1i32;
        while !self.at_end() && depth > 0 {
            match self.kind() {
                TokenKind::Lt => depth += 1,
                TokenKind::Gt => depth -= 1,
                TokenKind::GtGt => depth -= 2,
                TokenKind::Semicolon
                | TokenKind::LBrace
                | TokenKind::RBrace
                | TokenKind::Eof => {
                    self.restore(save);
                    return false;
                }
                _ => {}
            }
            self.advance();
        }
        if depth > 0 {
            self.restore(save);
            return false;
        }
        let next = self.kind();
        self.restore(save);
        matches!(
            next,
            TokenKind::Ident
                | TokenKind::Star
                | TokenKind::Question
                | TokenKind::LParen
                | TokenKind::RParen
                | TokenKind::LBracket
                | TokenKind::Comma
                | TokenKind::Gt
                | TokenKind::GtGt
                | TokenKind::Semicolon
                | TokenKind::LBrace
                | TokenKind::Eq
                | TokenKind::Dot
        )
    }

    // ------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------

    /// Parse a `(`-delimited parameter list; the caller consumed `(`.
    pub(super) fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        let mut params = Vec::new();
        if self.check(TokenKind::RParen) {
            return Ok(params);
        }
        params.push(self.parse_param()?);
        while self.match_kind(TokenKind::Comma).is_some() {
            params.push(self.parse_param()?);
        }
        Ok(params)
    }

    fn parse_param(&mut self) -> ParseResult<Param> {
        let keep = self.match_kind(TokenKind::Keep).is_some();
        let ty = self.parse_type()?;
        let name = self.expect(TokenKind::Ident, "a parameter name")?.text;
        let default = if self.match_kind(TokenKind::Eq).is_some() {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        Ok(Param {
            name,
            ty: Box::new(ty),
            default,
            keep,
        })
    }
}
