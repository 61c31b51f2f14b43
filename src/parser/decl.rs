//! Top-level declarations and class bodies.

use crate::ast::{
    Access, ClassDecl, Decl, DeclKind, EnumDecl, EnumVariant, FieldDecl, FunctionDecl,
    InterfaceDecl, Member, MethodDecl, MethodSig, PropertyDecl, TypeExpr,
};
use crate::lexer::TokenKind;

use super::{ParseResult, Parser};

impl<'a> Parser<'a> {
    pub(super) fn parse_decl(&mut self) -> ParseResult<Decl> {
        let start = self.span();
        let kind = match self.kind() {
            TokenKind::Abstract | TokenKind::Class => {
                let class = self.parse_class()?;
                DeclKind::Class { class: Box::new(class) }
            }
            TokenKind::Interface => {
                let iface = self.parse_interface()?;
                DeclKind::Interface { iface: Box::new(iface) }
            }
            TokenKind::Enum if self.peek_nth(2).kind == TokenKind::LBrace => {
                let enumeration = self.parse_enum()?;
                DeclKind::Enum { enumeration: Box::new(enumeration) }
            }
            TokenKind::Typedef => {
                self.advance();
                let target = self.parse_type()?;
                let name = self.expect(TokenKind::Ident, "a typedef name")?.text;
                self.expect(TokenKind::Semicolon, "`;`")?;
                DeclKind::Typedef { name, target: Box::new(target) }
            }
            TokenKind::Extern => {
                self.advance();
                let ret = self.parse_type()?;
                let name = self.expect(TokenKind::Ident, "an extern name")?.text;
                self.expect(TokenKind::LParen, "`(`")?;
                let params = self.parse_params()?;
                self.expect(TokenKind::RParen, "`)`")?;
                self.expect(TokenKind::Semicolon, "`;`")?;
                DeclKind::Extern { ret: Box::new(ret), name, params }
            }
            TokenKind::Struct if self.peek_nth(2).kind == TokenKind::LBrace => {
                self.advance();
                let name = self.expect(TokenKind::Ident, "a struct name")?.text;
                self.expect(TokenKind::LBrace, "`{`")?;
                let mut fields = Vec::new();
                while !self.check(TokenKind::RBrace) && !self.at_end() {
                    let ty = self.parse_type()?;
                    let fname = self.expect(TokenKind::Ident, "a field name")?.text;
                    self.expect(TokenKind::Semicolon, "`;`")?;
                    fields.push(crate::ast::Param {
                        name: fname,
                        ty: Box::new(ty),
                        default: None,
                        keep: false,
                    });
                }
                self.expect(TokenKind::RBrace, "`}`")?;
                let _ = self.match_kind(TokenKind::Semicolon);
                DeclKind::Struct { name, fields }
            }
            _ => return self.parse_function_or_global(),
        };
        Ok(Decl { kind, span: start.merge(self.span()) })
    }

    /// Functions and global variables share a `Type name` prefix; the next
    /// token decides which one it is.
    fn parse_function_or_global(&mut self) -> ParseResult<Decl> {
        let start = self.span();
        let keep_return = self.match_kind(TokenKind::Keep).is_some();
        let ret = self.parse_type()?;
        let name = self.expect(TokenKind::Ident, "a declaration name")?.text;

        // Generic function: `T identity<T>(T x)`.
        let mut generic_params = Vec::new();
        if self.check(TokenKind::Lt) {
            self.advance();
            generic_params.push(self.expect(TokenKind::Ident, "a type parameter")?.text);
            while self.match_kind(TokenKind::Comma).is_some() {
                generic_params.push(self.expect(TokenKind::Ident, "a type parameter")?.text);
            }
            self.expect_gt()?;
        }

        if self.check(TokenKind::LParen) {
            self.advance();
            let params = self.parse_params()?;
            self.expect(TokenKind::RParen, "`)`")?;
            let body = if self.match_kind(TokenKind::Semicolon).is_some() {
                None
            } else {
                Some(Box::new(self.parse_block()?))
            };
            let func = FunctionDecl {
                name,
                generic_params,
                ret: Some(Box::new(ret)),
                params,
                body,
                keep_return,
            };
            return Ok(Decl {
                kind: DeclKind::Function { func: Box::new(func) },
                span: start.merge(self.span()),
            });
        }

        // Global variable.
        let init = if self.match_kind(TokenKind::Eq).is_some() {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "`;`")?;
        Ok(Decl {
            kind: DeclKind::Global {
                ty: Some(Box::new(ret)),
                name,
                init,
            },
            span: start.merge(self.span()),
        })
    }

    // ------------------------------------------------------------------
    // Classes
    // ------------------------------------------------------------------

    fn parse_class(&mut self) -> ParseResult<ClassDecl> {
        let is_abstract = self.match_kind(TokenKind::Abstract).is_some();
        self.expect(TokenKind::Class, "`class`")?;
        let name = self.expect(TokenKind::Ident, "a class name")?.text;

        let mut generic_params = Vec::new();
        if self.check(TokenKind::Lt) {
            self.advance();
            generic_params.push(self.expect(TokenKind::Ident, "a type parameter")?.text);
            while self.match_kind(TokenKind::Comma).is_some() {
                generic_params.push(self.expect(TokenKind::Ident, "a type parameter")?.text);
            }
            self.expect_gt()?;
        }

        let parent = if self.match_kind(TokenKind::Extends).is_some() {
            Some(self.expect(TokenKind::Ident, "a superclass name")?.text)
        } else {
            None
        };

        let mut interfaces = Vec::new();
        if self.match_kind(TokenKind::Implements).is_some() {
            interfaces.push(self.expect(TokenKind::Ident, "an interface name")?.text);
            while self.match_kind(TokenKind::Comma).is_some() {
                interfaces.push(self.expect(TokenKind::Ident, "an interface name")?.text);
            }
        }

        self.expect(TokenKind::LBrace, "`{`")?;
        let mut members = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            match self.parse_member(&name) {
                Ok(member) => members.push(member),
                Err(e) => {
                    self.record_error(e);
                    self.synchronize_stmt();
                }
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;

        Ok(ClassDecl {
            name,
            generic_params,
            parent,
            interfaces,
            is_abstract,
            members,
        })
    }

    fn parse_member(&mut self, class_name: &str) -> ParseResult<Member> {
        let access = if self.match_kind(TokenKind::Private).is_some() {
            Access::Private
        } else {
            let _ = self.match_kind(TokenKind::Public);
            Access::Public
        };

        let is_static = self.match_kind(TokenKind::Static).is_some();
        let is_override = self.match_kind(TokenKind::Override).is_some();
        let is_abstract = self.match_kind(TokenKind::Abstract).is_some();
        let keep_return = self.match_kind(TokenKind::Keep).is_some();

        // Destructor: `~ClassName() { ... }`
        if self.check(TokenKind::Tilde) {
            self.advance();
            let name = self.expect(TokenKind::Ident, "the class name")?.text;
            if name != class_name {
                return Err(self.error_here("destructor name must match the class name"));
            }
            self.expect(TokenKind::LParen, "`(`")?;
            self.expect(TokenKind::RParen, "`)`")?;
            let body = self.parse_block()?;
            return Ok(Member::Dtor {
                dtor: Box::new(MethodDecl {
                    name,
                    params: Vec::new(),
                    ret: None,
                    body: Some(Box::new(body)),
                    access,
                    is_static: false,
                    is_override: false,
                    is_abstract: false,
                    keep_return: false,
                }),
            });
        }

        // Constructor: `ClassName(params) { ... }`
        if self.check(TokenKind::Ident)
            && self.peek().text == class_name
            && self.peek_nth(1).kind == TokenKind::LParen
        {
            let name = self.advance().text;
            self.advance(); // (
            let params = self.parse_params()?;
            self.expect(TokenKind::RParen, "`)`")?;
            let body = self.parse_block()?;
            return Ok(Member::Ctor {
                ctor: Box::new(MethodDecl {
                    name,
                    params,
                    ret: None,
                    body: Some(Box::new(body)),
                    access,
                    is_static: false,
                    is_override: false,
                    is_abstract: false,
                    keep_return: false,
                }),
            });
        }

        let ty = self.parse_type()?;
        let name = self.expect(TokenKind::Ident, "a member name")?.text;

        if self.check(TokenKind::LParen) {
            self.advance();
            let params = self.parse_params()?;
            self.expect(TokenKind::RParen, "`)`")?;
            let body = if self.match_kind(TokenKind::Semicolon).is_some() {
                None
            } else {
                Some(Box::new(self.parse_block()?))
            };
            if is_abstract && body.is_some() {
                return Err(self.error_here("abstract methods cannot have a body"));
            }
            return Ok(Member::Method {
                method: Box::new(MethodDecl {
                    name,
                    params,
                    ret: Some(Box::new(ty)),
                    body,
                    access,
                    is_static,
                    is_override,
                    is_abstract,
                    keep_return,
                }),
            });
        }

        if self.check(TokenKind::LBrace) {
            let prop = self.parse_property(name, ty, access)?;
            return Ok(Member::Property { prop: Box::new(prop) });
        }

        // Field.
        let init = if self.match_kind(TokenKind::Eq).is_some() {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "`;`")?;
        Ok(Member::Field {
            field: Box::new(FieldDecl {
                name,
                ty: Box::new(ty),
                access,
                init,
            }),
        })
    }

    /// `Type name { get ...; set ...; }` — block bodies make a computed
    /// property, `get;`/`set;` make an auto-property with a backing field.
    fn parse_property(
        &mut self,
        name: String,
        ty: TypeExpr,
        access: Access,
    ) -> ParseResult<PropertyDecl> {
        self.expect(TokenKind::LBrace, "`{`")?;

        let get_kw = self.expect(TokenKind::Ident, "`get`")?;
        if get_kw.text != "get" {
            return Err(self.error_here("property body must start with `get`"));
        }
        let (getter, mut auto) = if self.match_kind(TokenKind::Semicolon).is_some() {
            (None, true)
        } else {
            (Some(Box::new(self.parse_block()?)), false)
        };

        let mut setter = None;
        if self.check(TokenKind::Ident) && self.peek().text == "set" {
            self.advance();
            if self.match_kind(TokenKind::Semicolon).is_some() {
                if getter.is_some() {
                    return Err(self.error_here("`set;` requires `get;` (auto-property)"));
                }
                auto = true;
            } else {
                setter = Some(Box::new(self.parse_block()?));
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;

        Ok(PropertyDecl {
            name,
            ty: Box::new(ty),
            access,
            getter,
            setter,
            setter_param: "value".to_string(),
            auto,
        })
    }

    // ------------------------------------------------------------------
    // Interfaces and enums
    // ------------------------------------------------------------------

    fn parse_interface(&mut self) -> ParseResult<InterfaceDecl> {
        self.expect(TokenKind::Interface, "`interface`")?;
        let name = self.expect(TokenKind::Ident, "an interface name")?.text;

        let mut generic_params = Vec::new();
        if self.check(TokenKind::Lt) {
            self.advance();
            generic_params.push(self.expect(TokenKind::Ident, "a type parameter")?.text);
            while self.match_kind(TokenKind::Comma).is_some() {
                generic_params.push(self.expect(TokenKind::Ident, "a type parameter")?.text);
            }
            self.expect_gt()?;
        }

        self.expect(TokenKind::LBrace, "`{`")?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            let ret = self.parse_type()?;
            let mname = self.expect(TokenKind::Ident, "a method name")?.text;
            self.expect(TokenKind::LParen, "`(`")?;
            let params = self.parse_params()?;
            self.expect(TokenKind::RParen, "`)`")?;
            self.expect(TokenKind::Semicolon, "`;`")?;
            methods.push(MethodSig {
                name: mname,
                params,
                ret: Some(Box::new(ret)),
            });
        }
        self.expect(TokenKind::RBrace, "`}`")?;

        Ok(InterfaceDecl {
            name,
            generic_params,
            methods,
        })
    }

    fn parse_enum(&mut self) -> ParseResult<EnumDecl> {
        self.expect(TokenKind::Enum, "`enum`")?;
        let name = self.expect(TokenKind::Ident, "an enum name")?.text;
        self.expect(TokenKind::LBrace, "`{`")?;

        let mut variants = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            let vname = self.expect(TokenKind::Ident, "a variant name")?.text;
            let mut value = None;
            let mut fields = Vec::new();
            if self.match_kind(TokenKind::Eq).is_some() {
                value = Some(Box::new(self.parse_expr()?));
            } else if self.match_kind(TokenKind::LParen).is_some() {
                // Payload variant of a tagged-union enum.
                fields = self.parse_params()?;
                self.expect(TokenKind::RParen, "`)`")?;
            }
            variants.push(EnumVariant {
                name: vname,
                value,
                fields,
            });
            if self.match_kind(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        let _ = self.match_kind(TokenKind::Semicolon);

        Ok(EnumDecl { name, variants })
    }
}
