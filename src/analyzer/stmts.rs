//! Pass 2, statement walk: binds locals, checks control flow, and drives
//! expression typing through every body in the program.

use crate::ast::{
    Block, Decl, DeclKind, ExprKind, Member, MethodDecl, Program, Span, Stmt, StmtKind,
};

use super::types::Ty;
use super::{Analyzer, ScopeKind, SymbolKind};

#[derive(Clone, Copy)]
enum MethodRole {
    Plain,
    Ctor,
    Dtor,
}

impl Analyzer {
    pub(super) fn check_bodies(&mut self, program: &Program) {
        for decl in &program.decls {
            self.check_decl(decl);
        }
    }

    fn check_decl(&mut self, decl: &Decl) {
        match &decl.kind {
            DeclKind::Function { func } => {
                let info = match self.functions.get(&func.name) {
                    Some(i) => i.clone(),
                    None => return,
                };
                let body = match &func.body {
                    Some(b) => b,
                    None => return,
                };
                self.current_ret = info.ret.clone();
                self.push_scope(ScopeKind::Function);
                for p in &info.params {
                    self.define(&p.name, p.ty.clone(), SymbolKind::Param);
                }
                self.check_block_inline(body);
                self.pop_scope();
            }
            DeclKind::Class { class } => {
                self.current_class = Some(class.name.clone());
                self.generic_scope = class.generic_params.clone();
                self.push_scope(ScopeKind::Class);

                for member in &class.members {
                    match member {
                        Member::Method { method } => {
                            self.check_method(&class.name, method, MethodRole::Plain)
                        }
                        Member::Ctor { ctor } => {
                            self.check_method(&class.name, ctor, MethodRole::Ctor)
                        }
                        Member::Dtor { dtor } => {
                            self.check_method(&class.name, dtor, MethodRole::Dtor)
                        }
                        Member::Field { field } => {
                            if let Some(init) = &field.init {
                                let declared = self
                                    .field_on(&class.name, &field.name)
                                    .map(|f| f.ty)
                                    .unwrap_or(Ty::Error);
                                let got = self.type_expr(init);
                                if !self.convertible(&got, &declared) {
                                    self.error(
                                        format!(
                                            "field `{}` initializer has type `{}`, expected `{}`",
                                            field.name, got, declared
                                        ),
                                        init.span,
                                    );
                                }
                            }
                        }
                        Member::Property { prop } => {
                            let ty = self
                                .property_on(&class.name, &prop.name)
                                .map(|p| p.ty)
                                .unwrap_or(Ty::Error);
                            if let Some(getter) = &prop.getter {
                                self.current_ret = ty.clone();
                                self.push_scope(ScopeKind::Method);
                                self.check_block_inline(getter);
                                self.pop_scope();
                            }
                            if let Some(setter) = &prop.setter {
                                self.current_ret = Ty::VOID;
                                self.push_scope(ScopeKind::Method);
                                self.define(&prop.setter_param, ty, SymbolKind::Param);
                                self.check_block_inline(setter);
                                self.pop_scope();
                            }
                        }
                    }
                }

                self.pop_scope();
                self.generic_scope.clear();
                self.current_class = None;
            }
            DeclKind::Global { name, init, .. } => {
                if let Some(init) = init {
                    let declared = self
                        .lookup(name)
                        .map(|s| s.ty.clone())
                        .unwrap_or(Ty::Error);
                    let got = self.type_expr(init);
                    if !self.convertible(&got, &declared) {
                        self.error(
                            format!(
                                "global `{}` initializer has type `{}`, expected `{}`",
                                name, got, declared
                            ),
                            init.span,
                        );
                    }
                }
            }
            _ => {}
        }
    }

    fn check_method(&mut self, class_name: &str, method: &MethodDecl, role: MethodRole) {
        let body = match &method.body {
            Some(b) => b,
            None => return,
        };
        let params = match role {
            MethodRole::Plain => {
                let info = self.method_on(class_name, &method.name);
                self.current_ret = info.as_ref().map(|m| m.ret.clone()).unwrap_or(Ty::VOID);
                info.map(|m| m.params).unwrap_or_default()
            }
            MethodRole::Ctor => {
                self.current_ret = Ty::VOID;
                self.classes
                    .get(class_name)
                    .map(|c| c.ctor_params.clone())
                    .unwrap_or_default()
            }
            MethodRole::Dtor => {
                self.current_ret = Ty::VOID;
                Vec::new()
            }
        };
        self.push_scope(ScopeKind::Method);
        for p in &params {
            self.define(&p.name, p.ty.clone(), SymbolKind::Param);
        }
        self.check_block_inline(body);
        self.pop_scope();
    }

    /// Check a block's statements in the current scope (callers that need a
    /// fresh scope push one first).
    fn check_block_inline(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_block(&mut self, block: &Block) {
        self.push_scope(ScopeKind::Block);
        self.check_block_inline(block);
        self.pop_scope();
    }

    pub(super) fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::VarDecl { ty, name, init, infer } => {
                let declared = if *infer {
                    match init {
                        Some(e) => {
                            let got = self.type_expr(e);
                            if got.is_void() {
                                self.error(
                                    format!("`var {}` cannot bind a void expression", name),
                                    stmt.span,
                                );
                                Ty::Error
                            } else {
                                // `null` alone gives no type to infer.
                                if matches!(got, Ty::Null) {
                                    self.error(
                                        format!(
                                            "cannot infer a type for `var {}` from `null`",
                                            name
                                        ),
                                        stmt.span,
                                    );
                                    Ty::Error
                                } else {
                                    got
                                }
                            }
                        }
                        None => {
                            self.error(
                                format!("`var {}` requires an initializer", name),
                                stmt.span,
                            );
                            Ty::Error
                        }
                    }
                } else {
                    let declared = ty
                        .as_ref()
                        .map(|t| self.resolve_type(t))
                        .unwrap_or(Ty::Error);
                    if let Some(e) = init {
                        let got = self.type_expr_expecting(e, &declared);
                        if !self.convertible(&got, &declared) {
                            self.error(
                                format!(
                                    "cannot initialize `{}: {}` from `{}`",
                                    name, declared, got
                                ),
                                e.span,
                            );
                        }
                    }
                    declared
                };
                self.define(name, declared, SymbolKind::Var);
            }
            StmtKind::TupleDestructure { names, value } => {
                let got = self.type_expr(value);
                match &got {
                    Ty::Tuple(items) if items.len() == names.len() => {
                        for (name, ty) in names.iter().zip(items.iter()) {
                            self.define(name, ty.clone(), SymbolKind::Var);
                        }
                    }
                    Ty::Error => {
                        for name in names {
                            self.define(name, Ty::Error, SymbolKind::Var);
                        }
                    }
                    other => {
                        self.error(
                            format!(
                                "tuple destructuring needs a {}-element tuple, got `{}`",
                                names.len(),
                                other
                            ),
                            value.span,
                        );
                        for name in names {
                            self.define(name, Ty::Error, SymbolKind::Var);
                        }
                    }
                }
            }
            StmtKind::Assign { target, op, value } => {
                let target_ty = self.type_expr(target);
                self.check_assignable(target, stmt.span);
                let value_ty = self.type_expr_expecting(value, &target_ty);
                if op == "=" {
                    if !self.convertible(&value_ty, &target_ty) {
                        self.error(
                            format!("cannot assign `{}` to `{}`", value_ty, target_ty),
                            stmt.span,
                        );
                    }
                } else {
                    // Compound assignment needs numeric (or string +=).
                    let both_numeric = target_ty.is_numeric() && value_ty.is_numeric();
                    let string_append =
                        op == "+=" && target_ty.is_string() && value_ty.is_string();
                    if !both_numeric && !string_append && !target_ty.is_error() {
                        self.error(
                            format!(
                                "operator `{}` does not apply to `{}` and `{}`",
                                op, target_ty, value_ty
                            ),
                            stmt.span,
                        );
                    }
                }
            }
            StmtKind::ExprStmt { value } => {
                self.type_expr(value);
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.check_condition(cond);
                self.check_block(then_block);
                if let Some(e) = else_block {
                    self.check_block(e);
                }
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                self.push_scope(ScopeKind::Block);
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(cond) = cond {
                    self.check_condition(cond);
                }
                if let Some(update) = update {
                    self.type_expr(update);
                }
                self.loop_depth += 1;
                self.check_block_inline(body);
                self.loop_depth -= 1;
                self.pop_scope();
            }
            StmtKind::ForIn {
                binding,
                binding2,
                iterable,
                body,
            } => {
                let iter_ty = self.type_expr(iterable);
                let (elem, value_elem) = if matches!(iterable.kind, ExprKind::Range { .. }) {
                    (Ty::INT, None)
                } else {
                    self.for_in_element_types(&iter_ty, iterable.span)
                };
                self.push_scope(ScopeKind::Block);
                self.define(binding, elem, SymbolKind::Var);
                if let Some(b2) = binding2 {
                    match value_elem {
                        Some(v) => self.define(b2, v, SymbolKind::Var),
                        None => {
                            self.error(
                                "two-binding iteration requires a Map".to_string(),
                                iterable.span,
                            );
                            self.define(b2, Ty::Error, SymbolKind::Var);
                        }
                    }
                }
                self.loop_depth += 1;
                self.check_block_inline(body);
                self.loop_depth -= 1;
                self.pop_scope();
            }
            StmtKind::While { cond, body } => {
                self.check_condition(cond);
                self.loop_depth += 1;
                self.check_block(body);
                self.loop_depth -= 1;
            }
            StmtKind::DoWhile { body, cond } => {
                self.loop_depth += 1;
                self.check_block(body);
                self.loop_depth -= 1;
                self.check_condition(cond);
            }
            StmtKind::Switch { value, cases } => {
                let value_ty = self.type_expr(value);
                let ok = value_ty.is_integer()
                    || matches!(value_ty, Ty::Enum(_) | Ty::Error);
                if !ok {
                    self.error(
                        format!("switch requires an integer or enum value, got `{}`", value_ty),
                        value.span,
                    );
                }
                let mut saw_default = false;
                for case in cases {
                    match &case.value {
                        Some(v) => {
                            let case_ty = self.type_expr(v);
                            if !self.convertible(&case_ty, &value_ty) {
                                self.error(
                                    format!(
                                        "case label type `{}` does not match switch value `{}`",
                                        case_ty, value_ty
                                    ),
                                    v.span,
                                );
                            }
                        }
                        None => {
                            if saw_default {
                                self.error("duplicate default case".to_string(), stmt.span);
                            }
                            saw_default = true;
                        }
                    }
                    self.push_scope(ScopeKind::Block);
                    self.loop_depth += 1; // break is legal inside a case
                    for s in &case.body {
                        self.check_stmt(s);
                    }
                    self.loop_depth -= 1;
                    self.pop_scope();
                }
            }
            StmtKind::Try {
                try_block,
                handler,
                finally_block,
            } => {
                self.check_block(try_block);
                if let Some(h) = handler {
                    let caught = self.resolve_type(&h.ty);
                    if !caught.is_string() && !caught.is_error() {
                        self.error(
                            format!("only string exceptions can be caught, not `{}`", caught),
                            stmt.span,
                        );
                    }
                    self.push_scope(ScopeKind::Block);
                    self.define(&h.name, Ty::STR, SymbolKind::Var);
                    self.check_block_inline(&h.body);
                    self.pop_scope();
                }
                if let Some(f) = finally_block {
                    self.check_block(f);
                }
            }
            StmtKind::Throw { value } => {
                let ty = self.type_expr(value);
                if !ty.is_string() && !ty.is_error() {
                    self.error(
                        format!("throw requires a string message, got `{}`", ty),
                        value.span,
                    );
                }
            }
            StmtKind::Return { value } => {
                let expected = self.current_ret.clone();
                match value {
                    Some(v) => {
                        let got = self.type_expr_expecting(v, &expected);
                        if expected.is_void() {
                            self.error("void function returns a value".to_string(), v.span);
                        } else if !self.convertible(&got, &expected) {
                            self.error(
                                format!("return type `{}` does not match `{}`", got, expected),
                                v.span,
                            );
                        }
                    }
                    None => {
                        if !expected.is_void() {
                            self.error(
                                format!("missing return value of type `{}`", expected),
                                stmt.span,
                            );
                        }
                    }
                }
            }
            StmtKind::Break | StmtKind::Continue => {
                if self.loop_depth == 0 {
                    self.error(
                        "break/continue outside of a loop or switch".to_string(),
                        stmt.span,
                    );
                }
            }
            StmtKind::Block { inner } => self.check_block(inner),
            StmtKind::Delete { value } => {
                let ty = self.type_expr(value);
                if ty.class_name().is_none() && !matches!(ty, Ty::Ptr(_) | Ty::Error) {
                    self.error(
                        format!("delete requires a class or pointer value, got `{}`", ty),
                        value.span,
                    );
                }
            }
            StmtKind::Keep { value } | StmtKind::Release { value } => {
                let ty = self.type_expr(value);
                if ty.class_name().is_none() && !ty.is_error() {
                    self.error(
                        format!("keep/release requires a class instance, got `{}`", ty),
                        value.span,
                    );
                }
            }
        }
    }

    fn check_condition(&mut self, cond: &crate::ast::Expr) {
        let ty = self.type_expr(cond);
        let ok = matches!(&ty, Ty::Error)
            || ty.is_numeric()
            || matches!(ty, Ty::Prim(super::Prim::Bool))
            || ty.is_reference()
            || ty.is_opt();
        if !ok {
            self.error(format!("`{}` is not usable as a condition", ty), cond.span);
        }
    }

    /// Element type(s) of a for-in iterable: ranges yield ints, strings
    /// yield chars, collections yield their first type argument (Maps also
    /// yield values for two-binding loops).
    fn for_in_element_types(&mut self, iter_ty: &Ty, span: Span) -> (Ty, Option<Ty>) {
        match iter_ty.unwrap_opt() {
            Ty::Class { name, args } if name == "Map" && args.len() == 2 => {
                (args[0].clone(), Some(args[1].clone()))
            }
            Ty::Class { name, args }
                if !args.is_empty()
                    && matches!(name.as_str(), "Vector" | "List" | "Array" | "Set") =>
            {
                (args[0].clone(), None)
            }
            Ty::Class { name, args } if !args.is_empty() => {
                // User iterable: any generic class with iterLen/iterGet.
                let has_protocol = self.method_on(name, "iterLen").is_some()
                    && self.method_on(name, "iterGet").is_some();
                if has_protocol {
                    (args[0].clone(), None)
                } else {
                    self.error(
                        format!("`{}` is not iterable (needs iterLen/iterGet)", iter_ty),
                        span,
                    );
                    (Ty::Error, None)
                }
            }
            Ty::Prim(super::Prim::Str) => (Ty::CHAR, None),
            Ty::Error => (Ty::Error, None),
            other => {
                self.error(format!("`{}` is not iterable", other), span);
                (Ty::Error, None)
            }
        }
    }

    fn check_assignable(&mut self, target: &crate::ast::Expr, span: Span) {
        let ok = match &target.kind {
            ExprKind::Ident { .. } | ExprKind::Member { .. } | ExprKind::Index { .. } => true,
            ExprKind::Unary { op, prefix: true, .. } => op == "*",
            _ => false,
        };
        if !ok {
            self.error("expression is not assignable".to_string(), span);
        }
    }
}
