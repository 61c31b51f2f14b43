//! Pass 2, expression typing.
//!
//! Computes a resolved type for every expression node (stored by `NodeId`),
//! binds identifiers, resolves calls and operator overloads, collects
//! lambda captures, and warns on unchecked nullable dereference.

use std::collections::HashMap;

use crate::ast::{Expr, ExprKind, FStringPart, LambdaBody, MemberOp, Span};

use super::types::{Prim, Ty};
use super::{Analyzer, LambdaCtx, ParamInfo, ScopeKind, SymbolKind};

/// Operator methods a class may define. `a + b` resolves to `__add__` and
/// lowers to `ClassName_add`.
pub const OPERATOR_METHODS: &[(&str, &str)] = &[
    ("+", "__add__"),
    ("-", "__sub__"),
    ("*", "__mul__"),
    ("/", "__div__"),
    ("%", "__mod__"),
    ("==", "__eq__"),
    ("!=", "__eq__"),
];

pub fn operator_method(op: &str) -> Option<&'static str> {
    OPERATOR_METHODS
        .iter()
        .find(|(o, _)| *o == op)
        .map(|(_, m)| *m)
}

impl Analyzer {
    pub(super) fn type_expr(&mut self, e: &Expr) -> Ty {
        let ty = self.compute_type(e, None);
        self.expr_types.insert(e.id, ty.clone());
        ty
    }

    /// Typing with an expected type, so empty collection literals and
    /// `null` take their type from context.
    pub(super) fn type_expr_expecting(&mut self, e: &Expr, expected: &Ty) -> Ty {
        let ty = self.compute_type(e, Some(expected));
        self.expr_types.insert(e.id, ty.clone());
        ty
    }

    fn compute_type(&mut self, e: &Expr, expected: Option<&Ty>) -> Ty {
        match &e.kind {
            ExprKind::IntLit { text } => {
                let lower = text.to_ascii_lowercase();
                if lower.ends_with('l') || lower.ends_with("ll") {
                    Ty::Prim(Prim::Long)
                } else {
                    Ty::INT
                }
            }
            ExprKind::FloatLit { text } => {
                if text.ends_with('f') || text.ends_with('F') {
                    Ty::FLOAT
                } else {
                    Ty::DOUBLE
                }
            }
            ExprKind::CharLit { .. } => Ty::CHAR,
            ExprKind::StringLit { .. } => Ty::STR,
            ExprKind::BoolLit { .. } => Ty::BOOL,
            ExprKind::NullLit => Ty::Null,
            ExprKind::SelfLit => match self.current_class.clone() {
                Some(name) => {
                    let args = self
                        .generic_scope
                        .iter()
                        .map(|p| Ty::Param(p.clone()))
                        .collect();
                    Ty::Class { name, args }
                }
                None => {
                    self.error("`self` outside of a class".to_string(), e.span);
                    Ty::Error
                }
            },
            ExprKind::SuperLit => {
                let parent = self
                    .current_class
                    .as_ref()
                    .and_then(|c| self.classes.get(c))
                    .and_then(|info| info.parent.clone());
                match parent {
                    Some(p) => Ty::class(&p),
                    None => {
                        self.error("`super` requires a superclass".to_string(), e.span);
                        Ty::Error
                    }
                }
            }
            ExprKind::Ident { name } => self.type_ident(name, e.span),
            ExprKind::FString { parts } => {
                for part in parts {
                    if let FStringPart::Chunk { value, .. } = part {
                        let ty = self.type_expr(value);
                        if ty.is_void() {
                            self.error(
                                "void expression in f-string".to_string(),
                                value.span,
                            );
                        }
                    }
                }
                Ty::STR
            }
            ExprKind::Member { base, field, op } => self.type_member(base, field, *op, e.span),
            ExprKind::Index { base, index } => self.type_index(base, index, e.span),
            ExprKind::Call { callee, args } => self.type_call(callee, args, e.span),
            ExprKind::Unary { op, operand, prefix } => {
                self.type_unary(op, operand, *prefix, e.span)
            }
            ExprKind::Binary { op, left, right } => self.type_binary(op, left, right, e.span),
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.type_expr(cond);
                let a = self.type_expr(then_expr);
                let b = self.type_expr(else_expr);
                let joined = self.join(&a, &b);
                if joined.is_error() && !a.is_error() && !b.is_error() {
                    self.error(
                        format!("ternary branches disagree: `{}` vs `{}`", a, b),
                        e.span,
                    );
                }
                joined
            }
            ExprKind::Coalesce { left, right } => {
                let l = self.type_expr(left);
                if !l.is_opt() && !l.is_reference() && !l.is_error() {
                    self.error(
                        format!("`??` requires a nullable left operand, got `{}`", l),
                        left.span,
                    );
                }
                let r = self.type_expr(right);
                self.join(l.unwrap_opt(), &r)
            }
            ExprKind::Cast { ty, value } => {
                self.type_expr(value);
                self.resolve_type(ty)
            }
            ExprKind::Sizeof { ty } => {
                self.resolve_type(ty);
                Ty::INT
            }
            ExprKind::New { ty, args } => self.type_new(ty, args, e.span),
            ExprKind::Lambda { params, ret, body } => {
                self.type_lambda(e, params, ret.as_deref(), body)
            }
            ExprKind::TupleLit { items } => {
                Ty::Tuple(items.iter().map(|i| self.type_expr(i)).collect())
            }
            ExprKind::ListLit { items } => self.type_list_literal(items, expected, e.span),
            ExprKind::MapLit { entries } => self.type_map_literal(entries, expected, e.span),
            ExprKind::Range { start, end, step } => {
                for part in [Some(start), end.as_ref(), step.as_ref()].into_iter().flatten() {
                    let ty = self.type_expr(part);
                    if !ty.is_integer() && !ty.is_error() {
                        self.error(
                            format!("range bounds must be integers, got `{}`", ty),
                            part.span,
                        );
                    }
                }
                Ty::INT
            }
            ExprKind::Spawn { value } => {
                let ty = self.type_expr(value);
                match &ty {
                    Ty::Fn { params, .. } if params.is_empty() => {}
                    Ty::Error => {}
                    other => {
                        self.error(
                            format!("spawn requires a zero-argument lambda, got `{}`", other),
                            value.span,
                        );
                    }
                }
                Ty::VOID
            }
        }
    }

    // ------------------------------------------------------------------
    // Identifiers and captures
    // ------------------------------------------------------------------

    fn type_ident(&mut self, name: &str, span: Span) -> Ty {
        if let Some((idx, sym)) = self.lookup_indexed(name) {
            let ty = sym.ty.clone();
            let kind = sym.kind;
            if matches!(kind, SymbolKind::Var | SymbolKind::Param) {
                let scope_kind = self.scope_kind_at(idx);
                if !matches!(scope_kind, ScopeKind::Module | ScopeKind::Class) {
                    for ctx in self.lambda_stack.iter_mut() {
                        if idx < ctx.boundary
                            && !ctx.captures.iter().any(|(n, _)| n == name)
                        {
                            ctx.captures.push((name.to_string(), ty.clone()));
                        }
                    }
                }
            }
            return ty;
        }
        // Implicit field/method access inside a class body.
        if let Some(class) = self.current_class.clone() {
            if let Some(f) = self.field_on(&class, name) {
                return f.ty;
            }
            if let Some(p) = self.property_on(&class, name) {
                return p.ty;
            }
        }
        self.error(format!("unknown identifier `{}`", name), span);
        Ty::Error
    }

    // ------------------------------------------------------------------
    // Member access
    // ------------------------------------------------------------------

    fn type_member(&mut self, base: &Expr, field: &str, op: MemberOp, span: Span) -> Ty {
        // Enum variant or static access through a type name.
        if let Some(name) = base.as_ident() {
            if let Some(info) = self.enums.get(name).cloned() {
                self.expr_types.insert(base.id, Ty::Enum(name.to_string()));
                return match info.variants.iter().find(|v| v.name == field) {
                    Some(v) if v.fields.is_empty() => Ty::Enum(name.to_string()),
                    Some(_) => {
                        // Payload variants are constructed by calling; the
                        // call case handles argument checking.
                        Ty::Enum(name.to_string())
                    }
                    None => {
                        self.error(
                            format!("enum `{}` has no variant `{}`", name, field),
                            span,
                        );
                        Ty::Error
                    }
                };
            }
        }

        let base_ty = self.type_expr(base);
        if base_ty.is_error() {
            return Ty::Error;
        }

        if base_ty.is_opt() && op == MemberOp::Dot {
            self.warn(
                format!("dereference of nullable `{}` without `?.`", base_ty),
                span,
            );
        }

        let effective = base_ty.unwrap_opt().clone();
        let member_ty = self.member_type(&effective, field, span);
        if op == MemberOp::Question && member_ty.is_reference() {
            Ty::Opt(Box::new(member_ty))
        } else {
            member_ty
        }
    }

    fn member_type(&mut self, base: &Ty, field: &str, span: Span) -> Ty {
        match base {
            Ty::Class { name, args } => {
                if let Some(f) = self.field_on(name, field) {
                    if f.access == crate::ast::Access::Private
                        && self.current_class.as_deref() != Some(name.as_str())
                    {
                        self.error(
                            format!("field `{}.{}` is private", name, field),
                            span,
                        );
                    }
                    return self.substitute_class_args(name, args, &f.ty);
                }
                if let Some(p) = self.property_on(name, field) {
                    return self.substitute_class_args(name, args, &p.ty);
                }
                // Bare method reference (call handled separately).
                if let Some(m) = self.method_on(name, field) {
                    let params = m.params.iter().map(|p| p.ty.clone()).collect();
                    return Ty::Fn {
                        params,
                        ret: Box::new(m.ret),
                    };
                }
                // Plain C structs pass through untyped: their fields are
                // not tracked, so access neither types nor errors.
                if !self.classes.contains_key(name) {
                    return Ty::Error;
                }
                self.error(format!("`{}` has no member `{}`", name, field), span);
                Ty::Error
            }
            Ty::Enum(name) => {
                let info = match self.enums.get(name) {
                    Some(i) => i.clone(),
                    None => return Ty::Error,
                };
                if info.is_tagged && field == "tag" {
                    return Ty::INT;
                }
                if let Some(v) = info.variants.iter().find(|v| v.name == field) {
                    if !v.fields.is_empty() {
                        return Ty::Variant {
                            enum_name: name.clone(),
                            variant: field.to_string(),
                        };
                    }
                }
                self.error(format!("`{}` has no member `{}`", name, field), span);
                Ty::Error
            }
            Ty::Variant { enum_name, variant } => {
                let payload = self
                    .enums
                    .get(enum_name)
                    .and_then(|info| info.variants.iter().find(|v| &v.name == variant).cloned());
                match payload.and_then(|v| v.fields.iter().find(|f| f.name == field).cloned()) {
                    Some(f) => f.ty,
                    None => {
                        self.error(
                            format!(
                                "variant `{}.{}` has no field `{}`",
                                enum_name, variant, field
                            ),
                            span,
                        );
                        Ty::Error
                    }
                }
            }
            Ty::Tuple(items) => {
                // Positional access: `t._0`, `t._1`, ...
                if let Some(rest) = field.strip_prefix('_') {
                    if let Ok(i) = rest.parse::<usize>() {
                        if let Some(ty) = items.get(i) {
                            return ty.clone();
                        }
                    }
                }
                self.error(format!("tuple has no member `{}`", field), span);
                Ty::Error
            }
            Ty::Ptr(inner) => self.member_type(inner, field, span),
            other => {
                self.error(format!("`{}` has no member `{}`", other, field), span);
                Ty::Error
            }
        }
    }

    fn substitute_class_args(&self, class: &str, args: &[Ty], ty: &Ty) -> Ty {
        if args.is_empty() {
            return ty.clone();
        }
        let params = match self.classes.get(class) {
            Some(info) => info.generic_params.clone(),
            None => return ty.clone(),
        };
        let subst: HashMap<String, Ty> = params.into_iter().zip(args.iter().cloned()).collect();
        ty.substitute(&subst)
    }

    // ------------------------------------------------------------------
    // Indexing
    // ------------------------------------------------------------------

    fn type_index(&mut self, base: &Expr, index: &Expr, span: Span) -> Ty {
        let base_ty = self.type_expr(base);
        let index_ty = self.type_expr(index);
        match base_ty.unwrap_opt() {
            Ty::Prim(Prim::Str) => {
                self.require_integer(&index_ty, index.span);
                Ty::CHAR
            }
            Ty::Class { name, args }
                if matches!(name.as_str(), "Vector" | "List" | "Array") && !args.is_empty() =>
            {
                self.require_integer(&index_ty, index.span);
                args[0].clone()
            }
            Ty::Class { name, args } if name == "Map" && args.len() == 2 => {
                if !self.convertible(&index_ty, &args[0]) {
                    self.error(
                        format!("map key must be `{}`, got `{}`", args[0], index_ty),
                        index.span,
                    );
                }
                args[1].clone()
            }
            Ty::Ptr(inner) => {
                self.require_integer(&index_ty, index.span);
                (**inner).clone()
            }
            Ty::Error => Ty::Error,
            other => {
                self.error(format!("`{}` is not indexable", other), span);
                Ty::Error
            }
        }
    }

    fn require_integer(&mut self, ty: &Ty, span: Span) {
        if !ty.is_integer() && !ty.is_error() {
            self.error(format!("index must be an integer, got `{}`", ty), span);
        }
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    fn type_call(&mut self, callee: &Expr, args: &[Expr], span: Span) -> Ty {
        // Builtin print.
        if callee.as_ident() == Some("print") {
            for arg in args {
                let ty = self.type_expr(arg);
                if ty.is_void() {
                    self.error("cannot print a void expression".to_string(), arg.span);
                }
            }
            self.expr_types.insert(
                callee.id,
                Ty::Fn {
                    params: Vec::new(),
                    ret: Box::new(Ty::VOID),
                },
            );
            return Ty::VOID;
        }

        // Free function call.
        if let Some(name) = callee.as_ident() {
            if let Some(info) = self.functions.get(name).cloned() {
                self.expr_types.insert(
                    callee.id,
                    Ty::Fn {
                        params: info.params.iter().map(|p| p.ty.clone()).collect(),
                        ret: Box::new(info.ret.clone()),
                    },
                );
                self.check_args(&info.params, args, span, name, None);
                return info.ret;
            }
            // Constructor call through the bare class name:
            // `Dog("Rex")` is shorthand for `new Dog("Rex")`.
            if let Some(info) = self.classes.get(name).cloned() {
                if info.generic_params.is_empty() {
                    if info.is_abstract {
                        self.error(
                            format!("cannot instantiate abstract class `{}`", name),
                            span,
                        );
                    }
                    let ty = Ty::class(name);
                    self.expr_types.insert(callee.id, ty.clone());
                    self.check_args(&info.ctor_params, args, span, name, None);
                    return ty;
                }
            }
        }

        // Method, static, or enum-constructor call.
        if let ExprKind::Member { base, field, op } = &callee.kind {
            return self.type_member_call(callee, base, field, *op, args, span);
        }

        // Calling a function-typed value (lambda, captured fn pointer).
        let callee_ty = self.type_expr(callee);
        match callee_ty {
            Ty::Fn { params, ret } => {
                if args.len() != params.len() {
                    self.error(
                        format!("expected {} argument(s), got {}", params.len(), args.len()),
                        span,
                    );
                } else {
                    for (arg, expected) in args.iter().zip(params.iter()) {
                        let got = self.type_expr_expecting(arg, expected);
                        if !self.convertible(&got, expected) {
                            self.error(
                                format!("argument type `{}` does not match `{}`", got, expected),
                                arg.span,
                            );
                        }
                    }
                }
                (*ret).clone()
            }
            Ty::Error => Ty::Error,
            other => {
                self.error(format!("`{}` is not callable", other), span);
                Ty::Error
            }
        }
    }

    fn type_member_call(
        &mut self,
        callee: &Expr,
        base: &Expr,
        field: &str,
        op: MemberOp,
        args: &[Expr],
        span: Span,
    ) -> Ty {
        // Static call or enum variant construction through a type name.
        if let Some(name) = base.as_ident() {
            if self.lookup(name).map(|s| s.kind) == Some(SymbolKind::Type) {
                if let Some(info) = self.enums.get(name).cloned() {
                    self.expr_types.insert(base.id, Ty::Enum(name.to_string()));
                    match info.variants.iter().find(|v| v.name == field) {
                        Some(v) => {
                            let params = v.fields.clone();
                            self.check_args(&params, args, span, field, None);
                            let ty = Ty::Enum(name.to_string());
                            self.expr_types.insert(callee.id, ty.clone());
                            return ty;
                        }
                        None => {
                            self.error(
                                format!("enum `{}` has no variant `{}`", name, field),
                                span,
                            );
                            return Ty::Error;
                        }
                    }
                }
                if self.classes.contains_key(name) {
                    self.expr_types.insert(base.id, Ty::class(name));
                    match self.method_on(name, field) {
                        Some(m) if m.is_static => {
                            self.check_args(&m.params, args, span, field, None);
                            self.expr_types.insert(callee.id, m.ret.clone());
                            return m.ret;
                        }
                        Some(_) => {
                            self.error(
                                format!("`{}.{}` is not a static method", name, field),
                                span,
                            );
                            return Ty::Error;
                        }
                        None => {
                            self.error(
                                format!("class `{}` has no method `{}`", name, field),
                                span,
                            );
                            return Ty::Error;
                        }
                    }
                }
            }
        }

        // `super.method(...)`.
        if matches!(base.kind, ExprKind::SuperLit) {
            let parent_ty = self.type_expr(base);
            if let Some(parent) = parent_ty.class_name().map(str::to_string) {
                match self.method_on(&parent, field) {
                    Some(m) => {
                        self.check_args(&m.params, args, span, field, None);
                        self.expr_types.insert(callee.id, m.ret.clone());
                        return m.ret;
                    }
                    None => {
                        self.error(
                            format!("superclass has no method `{}`", field),
                            span,
                        );
                        return Ty::Error;
                    }
                }
            }
            return Ty::Error;
        }

        let base_ty = self.type_expr(base);
        if base_ty.is_error() {
            return Ty::Error;
        }
        if base_ty.is_opt() && op == MemberOp::Dot {
            self.warn(
                format!("method call on nullable `{}` without `?.`", base_ty),
                span,
            );
        }
        let effective = base_ty.unwrap_opt().clone();

        let ret = match &effective {
            Ty::Prim(Prim::Str) => match string_method(field) {
                Some((params, ret)) => {
                    self.check_fixed_args(&params, args, span, field);
                    if field == "split" {
                        self.record_instance("Vector", vec![Ty::STR]);
                    }
                    ret
                }
                None => {
                    self.error(format!("string has no method `{}`", field), span);
                    Ty::Error
                }
            },
            ty if ty.is_numeric() => {
                if field == "toString" {
                    self.check_fixed_args(&[], args, span, field);
                    Ty::STR
                } else {
                    self.error(format!("`{}` has no method `{}`", ty, field), span);
                    Ty::Error
                }
            }
            Ty::Class { name, args: targs } => {
                if let Some((params, ret)) = self.collection_method(name, targs, field) {
                    self.check_fixed_args(&params, args, span, field);
                    ret
                } else if let Some(m) = self.method_on(name, field) {
                    if m.access == crate::ast::Access::Private
                        && self.current_class.as_deref() != Some(name.as_str())
                    {
                        self.error(format!("method `{}.{}` is private", name, field), span);
                    }
                    if m.is_static {
                        self.error(
                            format!("static method `{}` called on an instance", field),
                            span,
                        );
                    }
                    let subst = self.class_subst(name, targs);
                    self.check_args(&m.params, args, span, field, subst.as_ref());
                    match &subst {
                        Some(s) => m.ret.substitute(s),
                        None => m.ret,
                    }
                } else {
                    self.error(format!("`{}` has no method `{}`", name, field), span);
                    Ty::Error
                }
            }
            Ty::Iface(name) => {
                let iface = self.interfaces.get(name).cloned();
                match iface.and_then(|i| i.methods.iter().find(|m| m.name == field).cloned()) {
                    Some(m) => {
                        self.check_args(&m.params, args, span, field, None);
                        m.ret
                    }
                    None => {
                        self.error(
                            format!("interface `{}` has no method `{}`", name, field),
                            span,
                        );
                        Ty::Error
                    }
                }
            }
            other => {
                self.error(format!("`{}` has no method `{}`", other, field), span);
                Ty::Error
            }
        };

        self.expr_types.insert(callee.id, ret.clone());
        if op == MemberOp::Question && ret.is_reference() {
            Ty::Opt(Box::new(ret))
        } else {
            ret
        }
    }

    fn class_subst(&self, class: &str, args: &[Ty]) -> Option<HashMap<String, Ty>> {
        if args.is_empty() {
            return None;
        }
        let params = self.classes.get(class)?.generic_params.clone();
        Some(params.into_iter().zip(args.iter().cloned()).collect())
    }

    /// Argument check against declared parameters: missing trailing
    /// arguments must have defaults; each present argument must convert.
    fn check_args(
        &mut self,
        params: &[ParamInfo],
        args: &[Expr],
        span: Span,
        what: &str,
        subst: Option<&HashMap<String, Ty>>,
    ) {
        let required = params.iter().take_while(|p| !p.has_default).count();
        if args.len() < required || args.len() > params.len() {
            self.error(
                format!(
                    "`{}` expects {}..{} argument(s), got {}",
                    what,
                    required,
                    params.len(),
                    args.len()
                ),
                span,
            );
        }
        for (arg, param) in args.iter().zip(params.iter()) {
            let expected = match subst {
                Some(s) => param.ty.substitute(s),
                None => param.ty.clone(),
            };
            let got = self.type_expr_expecting(arg, &expected);
            if !self.convertible(&got, &expected) {
                self.error(
                    format!(
                        "argument `{}` of `{}` has type `{}`, expected `{}`",
                        param.name, what, got, expected
                    ),
                    arg.span,
                );
            }
        }
    }

    fn check_fixed_args(&mut self, params: &[Ty], args: &[Expr], span: Span, what: &str) {
        if args.len() != params.len() {
            self.error(
                format!(
                    "`{}` expects {} argument(s), got {}",
                    what,
                    params.len(),
                    args.len()
                ),
                span,
            );
        }
        for (arg, expected) in args.iter().zip(params.iter()) {
            let got = self.type_expr_expecting(arg, expected);
            if !self.convertible(&got, expected) {
                self.error(
                    format!("argument type `{}` does not match `{}`", got, expected),
                    arg.span,
                );
            }
        }
    }

    /// Builtin collection method signatures, with element types filled in.
    fn collection_method(&mut self, name: &str, targs: &[Ty], method: &str) -> Option<(Vec<Ty>, Ty)> {
        if super::builtin_generic_arity(name).is_none() || targs.is_empty() {
            return None;
        }
        let t = targs[0].clone();
        let sig = match (name, method) {
            ("Vector" | "List", "push") => (vec![t], Ty::VOID),
            ("Vector" | "List", "pop") => (vec![], t),
            ("Vector" | "List" | "Array", "get") => (vec![Ty::INT], t),
            ("Vector" | "List" | "Array", "set") => (vec![Ty::INT, t], Ty::VOID),
            ("Vector" | "List" | "Array" | "Set", "len") => (vec![], Ty::INT),
            ("Vector" | "List", "clear") => (vec![], Ty::VOID),
            ("List", "insert") => (vec![Ty::INT, t], Ty::VOID),
            ("List", "removeAt") => (vec![Ty::INT], Ty::VOID),
            ("Set", "add") => (vec![t], Ty::VOID),
            ("Set", "has") => (vec![t], Ty::BOOL),
            ("Set", "remove") => (vec![t], Ty::VOID),
            ("Map", "put") => {
                let v = targs.get(1)?.clone();
                (vec![t, v], Ty::VOID)
            }
            ("Map", "get") => {
                let v = targs.get(1)?.clone();
                (vec![t], v)
            }
            ("Map", "has") => (vec![t], Ty::BOOL),
            ("Map", "remove") => (vec![t], Ty::VOID),
            ("Map", "len") => (vec![], Ty::INT),
            ("Map", "keys") => {
                self.record_instance("Vector", vec![t.clone()]);
                (
                    vec![],
                    Ty::Class {
                        name: "Vector".to_string(),
                        args: vec![t],
                    },
                )
            }
            ("Map", "iterValueAt") => {
                let v = targs.get(1)?.clone();
                (vec![Ty::INT], v)
            }
            ("Mutex", "lock") | ("Mutex", "unlock") => (vec![], Ty::VOID),
            ("Mutex", "get") => (vec![], t),
            ("Mutex", "set") => (vec![t], Ty::VOID),
            (_, "iterLen") => (vec![], Ty::INT),
            (_, "iterGet") => (vec![Ty::INT], t),
            _ => return None,
        };
        Some(sig)
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    fn type_unary(&mut self, op: &str, operand: &Expr, _prefix: bool, span: Span) -> Ty {
        let ty = self.type_expr(operand);
        if ty.is_error() {
            return Ty::Error;
        }
        match op {
            "!" => Ty::BOOL,
            "-" => {
                if ty.is_numeric() {
                    ty
                } else if let Some(class) = ty.class_name().map(str::to_string) {
                    match self.method_on(&class, "__neg__") {
                        Some(m) => m.ret,
                        None => {
                            self.error(
                                format!("class `{}` does not define `__neg__`", class),
                                span,
                            );
                            Ty::Error
                        }
                    }
                } else {
                    self.error(format!("cannot negate `{}`", ty), span);
                    Ty::Error
                }
            }
            "~" => {
                if ty.is_integer() {
                    ty
                } else {
                    self.error(format!("`~` requires an integer, got `{}`", ty), span);
                    Ty::Error
                }
            }
            "++" | "--" => {
                if ty.is_numeric() {
                    ty
                } else {
                    self.error(format!("`{}` requires a numeric value", op), span);
                    Ty::Error
                }
            }
            "*" => match ty {
                Ty::Ptr(inner) => (*inner).clone(),
                other => {
                    self.error(format!("cannot dereference `{}`", other), span);
                    Ty::Error
                }
            },
            "&" => Ty::Ptr(Box::new(ty)),
            _ => Ty::Error,
        }
    }

    fn type_binary(&mut self, op: &str, left: &Expr, right: &Expr, span: Span) -> Ty {
        let l = self.type_expr(left);
        let r = self.type_expr(right);
        if l.is_error() || r.is_error() {
            return Ty::Error;
        }

        // Operator overloading on class operands.
        if let Some(class) = l.class_name().map(str::to_string) {
            if super::builtin_generic_arity(&class).is_none() {
                if let Some(method) = operator_method(op) {
                    return match self.method_on(&class, method) {
                        Some(m) => {
                            if op == "==" || op == "!=" {
                                Ty::BOOL
                            } else {
                                m.ret
                            }
                        }
                        None => {
                            self.error(
                                format!(
                                    "class `{}` does not define `{}` for operator `{}`",
                                    class, method, op
                                ),
                                span,
                            );
                            Ty::Error
                        }
                    };
                }
                if matches!(op, "&&" | "||") {
                    return Ty::BOOL;
                }
                self.error(
                    format!("operator `{}` is not defined for class `{}`", op, class),
                    span,
                );
                return Ty::Error;
            }
        }

        match op {
            "+" if l.is_string() && r.is_string() => Ty::STR,
            "==" | "!=" => {
                if !self.convertible(&l, &r) && !self.convertible(&r, &l) {
                    self.error(format!("cannot compare `{}` with `{}`", l, r), span);
                }
                Ty::BOOL
            }
            "<" | ">" | "<=" | ">=" => {
                let comparable = (l.is_numeric() && r.is_numeric())
                    || (l.is_string() && r.is_string());
                if !comparable {
                    self.error(format!("cannot order `{}` and `{}`", l, r), span);
                }
                Ty::BOOL
            }
            "&&" | "||" => Ty::BOOL,
            "<<" | ">>" | "&" | "|" | "^" => {
                if !l.is_integer() || !r.is_integer() {
                    self.error(
                        format!("bitwise `{}` requires integers, got `{}` and `{}`", op, l, r),
                        span,
                    );
                }
                self.join(&l, &r)
            }
            "%" => {
                if !l.is_integer() || !r.is_integer() {
                    self.error(
                        format!("`%` requires integers, got `{}` and `{}`", l, r),
                        span,
                    );
                }
                self.join(&l, &r)
            }
            "+" | "-" | "*" | "/" => {
                if !l.is_numeric() || !r.is_numeric() {
                    self.error(
                        format!("arithmetic `{}` requires numbers, got `{}` and `{}`", op, l, r),
                        span,
                    );
                    return Ty::Error;
                }
                self.join(&l, &r)
            }
            // Compound forms reach here only from for-loop updates.
            "+=" | "-=" | "*=" | "/=" | "%=" | "=" => l,
            _ => {
                self.error(format!("unsupported operator `{}`", op), span);
                Ty::Error
            }
        }
    }

    // ------------------------------------------------------------------
    // Constructors, lambdas, literals
    // ------------------------------------------------------------------

    fn type_new(&mut self, ty: &crate::ast::TypeExpr, args: &[Expr], span: Span) -> Ty {
        let resolved = self.resolve_type(ty);
        match &resolved {
            Ty::Class { name, args: targs } => {
                if super::builtin_generic_arity(name).is_some() {
                    if !args.is_empty() {
                        self.error(
                            format!("`new {}` takes no constructor arguments", name),
                            span,
                        );
                    }
                    return resolved;
                }
                let info = match self.classes.get(name) {
                    Some(i) => i.clone(),
                    None => return Ty::Error,
                };
                if info.is_abstract {
                    self.error(
                        format!("cannot instantiate abstract class `{}`", name),
                        span,
                    );
                }
                let subst = self.class_subst(name, targs);
                self.check_args(&info.ctor_params, args, span, name, subst.as_ref());
                resolved
            }
            Ty::Error => Ty::Error,
            other => {
                self.error(format!("`new` requires a class type, got `{}`", other), span);
                Ty::Error
            }
        }
    }

    fn type_lambda(
        &mut self,
        e: &Expr,
        params: &[crate::ast::Param],
        ret: Option<&crate::ast::TypeExpr>,
        body: &LambdaBody,
    ) -> Ty {
        let param_infos: Vec<(String, Ty)> = params
            .iter()
            .map(|p| (p.name.clone(), self.resolve_type(&p.ty)))
            .collect();
        let declared_ret = ret.map(|t| self.resolve_type(t));

        self.push_scope(ScopeKind::Function);
        let boundary = self.scope_depth() - 1;
        self.lambda_stack.push(LambdaCtx {
            boundary,
            captures: Vec::new(),
        });
        for (name, ty) in &param_infos {
            self.define(name, ty.clone(), SymbolKind::Param);
        }

        let saved_ret = self.current_ret.clone();
        let ret_ty = match body {
            LambdaBody::ExprBody { value } => {
                let body_ty = self.type_expr(value);
                declared_ret.unwrap_or(body_ty)
            }
            LambdaBody::BlockBody { body } => {
                let rt = declared_ret.unwrap_or(Ty::VOID);
                self.current_ret = rt.clone();
                for stmt in &body.stmts {
                    self.check_stmt(stmt);
                }
                rt
            }
        };
        self.current_ret = saved_ret;

        let ctx = self.lambda_stack.pop().expect("pushed above");
        self.lambda_captures.insert(e.id, ctx.captures);
        self.pop_scope();

        Ty::Fn {
            params: param_infos.into_iter().map(|(_, t)| t).collect(),
            ret: Box::new(ret_ty),
        }
    }

    fn type_list_literal(
        &mut self,
        items: &[Expr],
        expected: Option<&Ty>,
        span: Span,
    ) -> Ty {
        if let Some(Ty::Class { name, args }) = expected.map(Ty::unwrap_opt) {
            if matches!(name.as_str(), "Vector" | "List" | "Array") && !args.is_empty() {
                let elem = args[0].clone();
                for item in items {
                    let got = self.type_expr_expecting(item, &elem);
                    if !self.convertible(&got, &elem) {
                        self.error(
                            format!("list element `{}` does not convert to `{}`", got, elem),
                            item.span,
                        );
                    }
                }
                return expected.cloned().expect("checked above");
            }
        }
        match items.first() {
            Some(first) => {
                let elem = self.type_expr(first);
                for item in &items[1..] {
                    let got = self.type_expr_expecting(item, &elem);
                    if !self.convertible(&got, &elem) {
                        self.error(
                            format!("list element `{}` does not convert to `{}`", got, elem),
                            item.span,
                        );
                    }
                }
                self.record_instance("Vector", vec![elem.clone()]);
                Ty::Class {
                    name: "Vector".to_string(),
                    args: vec![elem],
                }
            }
            None => {
                self.error(
                    "cannot infer the element type of an empty list literal".to_string(),
                    span,
                );
                Ty::Error
            }
        }
    }

    fn type_map_literal(
        &mut self,
        entries: &[crate::ast::MapEntry],
        expected: Option<&Ty>,
        span: Span,
    ) -> Ty {
        if let Some(expected_ty) = expected {
            if let Ty::Class { name, args } = expected_ty.unwrap_opt() {
                // `{}` initializes any builtin collection of the declared
                // type, not just maps.
                if super::builtin_generic_arity(name).is_some() && entries.is_empty() {
                    return expected_ty.unwrap_opt().clone();
                }
                if name == "Map" && args.len() == 2 {
                    let (k, v) = (args[0].clone(), args[1].clone());
                    for entry in entries {
                        let kt = self.type_expr_expecting(&entry.key, &k);
                        let vt = self.type_expr_expecting(&entry.value, &v);
                        if !self.convertible(&kt, &k) || !self.convertible(&vt, &v) {
                            self.error(
                                format!(
                                    "map entry `{}: {}` does not match `Map<{}, {}>`",
                                    kt, vt, k, v
                                ),
                                entry.key.span,
                            );
                        }
                    }
                    return expected_ty.unwrap_opt().clone();
                }
            }
        }
        match entries.first() {
            Some(first) => {
                let k = self.type_expr(&first.key);
                let v = self.type_expr(&first.value);
                for entry in &entries[1..] {
                    let kt = self.type_expr_expecting(&entry.key, &k);
                    let vt = self.type_expr_expecting(&entry.value, &v);
                    if !self.convertible(&kt, &k) || !self.convertible(&vt, &v) {
                        self.error("inconsistent map literal entry types".to_string(), entry.key.span);
                    }
                }
                self.record_instance("Map", vec![k.clone(), v.clone()]);
                Ty::Class {
                    name: "Map".to_string(),
                    args: vec![k, v],
                }
            }
            None => {
                self.error(
                    "cannot infer the type of an empty `{}` literal without context".to_string(),
                    span,
                );
                Ty::Error
            }
        }
    }
}

/// Builtin string method signatures (query / convert / transform families).
fn string_method(name: &str) -> Option<(Vec<Ty>, Ty)> {
    let sig = match name {
        "len" => (vec![], Ty::INT),
        "substring" => (vec![Ty::INT, Ty::INT], Ty::STR),
        "indexOf" => (vec![Ty::STR], Ty::INT),
        "contains" => (vec![Ty::STR], Ty::BOOL),
        "startsWith" | "endsWith" => (vec![Ty::STR], Ty::BOOL),
        "trim" | "toUpper" | "toLower" => (vec![], Ty::STR),
        "replace" => (vec![Ty::STR, Ty::STR], Ty::STR),
        "split" => (
            vec![Ty::STR],
            Ty::Class {
                name: "Vector".to_string(),
                args: vec![Ty::STR],
            },
        ),
        "toInt" => (vec![], Ty::INT),
        "toFloat" => (vec![], Ty::DOUBLE),
        _ => return None,
    };
    Some(sig)
}
