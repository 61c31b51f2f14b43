//! Expression lowering.
//!
//! Operator overloads rewrite to `ClassName_add`-style calls, properties to
//! getter/setter calls, methods to free functions with explicit `self`
//! (virtually dispatched through the vtable when the receiver's class sits
//! in a hierarchy), `?.`/`??` to hoisted null tests, and collection
//! literals to build-up sequences. Anything that needs statements pushes
//! them onto the generator's pending list; the enclosing statement drains
//! it.

use crate::analyzer::{builtin_generic_arity, Prim, Ty};
use crate::ast::{Expr, ExprKind, MemberOp};
use crate::ir::nodes::{IrBlock, IrExpr, IrStmt};

use super::IrGenerator;

/// Operator token to the stripped method-name core (`__add__` emits as
/// `ClassName_add`).
fn operator_core(op: &str) -> Option<&'static str> {
    Some(match op {
        "+" => "add",
        "-" => "sub",
        "*" => "mul",
        "/" => "div",
        "%" => "mod",
        "==" | "!=" => "eq",
        _ => return None,
    })
}

/// Strip the dunder wrapping from operator method names: `__add__` -> `add`.
pub fn method_core(name: &str) -> &str {
    name.strip_prefix("__")
        .and_then(|n| n.strip_suffix("__"))
        .unwrap_or(name)
}

impl<'a> IrGenerator<'a> {
    pub fn lower_expr(&mut self, e: &Expr) -> IrExpr {
        match &e.kind {
            ExprKind::IntLit { text } => IrExpr::lit(text.clone()),
            ExprKind::FloatLit { text } => IrExpr::lit(text.clone()),
            ExprKind::CharLit { text } => IrExpr::lit(format!("'{}'", text)),
            ExprKind::StringLit { text } => IrExpr::lit(format!("\"{}\"", text)),
            ExprKind::BoolLit { value } => IrExpr::lit(if *value { "true" } else { "false" }),
            ExprKind::NullLit => IrExpr::null(),
            ExprKind::SelfLit => IrExpr::var("self"),
            ExprKind::SuperLit => {
                let parent = self
                    .current_class
                    .as_ref()
                    .map(|(src, _)| src.clone())
                    .and_then(|c| self.analysis.classes.get(&c))
                    .and_then(|info| info.parent.clone());
                match parent {
                    Some(p) => IrExpr::cast(format!("{}*", p), IrExpr::var("self")),
                    None => IrExpr::var("self"),
                }
            }
            ExprKind::Ident { name } => self.lower_ident(name),
            ExprKind::FString { parts } => self.lower_fstring(parts),
            ExprKind::Member { base, field, op } => self.lower_member(e, base, field, *op),
            ExprKind::Index { base, index } => self.lower_index(base, index),
            ExprKind::Call { callee, args } => self.lower_call(e, callee, args),
            ExprKind::Unary { op, operand, prefix } => self.lower_unary(op, operand, *prefix),
            ExprKind::Binary { op, left, right } => self.lower_binary(op, left, right),
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => self.lower_ternary(e, cond, then_expr, else_expr),
            ExprKind::Coalesce { left, right } => self.lower_coalesce(e, left, right),
            ExprKind::Cast { ty, value } => {
                let target = self.lower_type_expr(ty);
                let c = self.c_type(&target);
                let inner = self.lower_expr(value);
                IrExpr::cast(c, inner)
            }
            ExprKind::Sizeof { ty } => {
                let target = self.lower_type_expr(ty);
                let c = self.c_type(&target);
                IrExpr::Sizeof(c)
            }
            ExprKind::New { ty, args } => self.lower_new(ty, args),
            ExprKind::Lambda { .. } => {
                let lowered = self.lower_lambda(e);
                IrExpr::var(lowered.fn_name)
            }
            ExprKind::TupleLit { items } => {
                let item_tys: Vec<Ty> = items.iter().map(|i| self.expr_ty(i)).collect();
                let name = self.ensure_tuple_struct(&item_tys);
                let values: Vec<(Option<String>, IrExpr)> = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| (Some(format!("_{}", i)), self.lower_expr(item)))
                    .collect();
                IrExpr::Compound {
                    c_type: name,
                    items: values,
                }
            }
            ExprKind::ListLit { items } => self.lower_list_lit(e, items),
            ExprKind::MapLit { entries } => self.lower_map_lit(e, entries),
            ExprKind::Range { start, .. } => {
                // Only meaningful as a for-in iterable; anything else
                // degrades to the start bound.
                self.lower_expr(start)
            }
            ExprKind::Spawn { value } => self.lower_spawn(value),
        }
    }

    /// Hoist an expression into a named temporary unless it already is a
    /// plain variable.
    pub fn hoist(&mut self, ir: IrExpr, c_type: &str, prefix: &str) -> String {
        if let IrExpr::Var(name) = &ir {
            return name.clone();
        }
        let tmp = self.fresh_temp(prefix);
        self.pending
            .push(IrStmt::var_decl(c_type, tmp.clone(), Some(ir)));
        tmp
    }

    /// Receiver lowering with a one-shot override, used by the null-safe
    /// call path to substitute an already-hoisted temporary.
    fn lower_receiver(&mut self, base: &Expr) -> IrExpr {
        match self.recv_override.take() {
            Some(ir) => ir,
            None => self.lower_expr(base),
        }
    }

    /// `x?.m(...)`: evaluate the receiver once; when non-null, perform the
    /// call into a result temporary, otherwise leave the zero value.
    fn lower_null_safe_call(
        &mut self,
        whole: &Expr,
        base: &Expr,
        field: &str,
        args: &[Expr],
    ) -> IrExpr {
        let base_ty = self.expr_ty(base);
        let base_c = self.c_type(&base_ty);
        let base_ir = self.lower_expr(base);
        let base_var = self.hoist(base_ir, &base_c, "__opt");

        let result_ty = self.expr_ty(whole);
        let is_void = result_ty.is_void();
        let result_var = self.fresh_temp("__optv");
        if !is_void {
            let result_c = self.c_type(&result_ty);
            let zero = self.c_zero(&result_ty);
            self.pending.push(IrStmt::var_decl(
                result_c,
                result_var.clone(),
                Some(IrExpr::lit(zero)),
            ));
        }

        let mark = self.pending.len();
        self.recv_override = Some(IrExpr::var(base_var.clone()));
        let call_ir = self.lower_member_call(base, field, MemberOp::Dot, args);
        self.recv_override = None;
        let mut guarded: Vec<IrStmt> = self.pending.split_off(mark);
        if is_void {
            guarded.push(IrStmt::expr(call_ir));
        } else {
            guarded.push(IrStmt::assign(IrExpr::var(result_var.clone()), call_ir));
        }
        self.pending.push(IrStmt::If {
            cond: IrExpr::binop(IrExpr::var(base_var), "!=", IrExpr::null()),
            then_block: IrBlock::new(guarded),
            else_block: None,
        });

        if is_void {
            IrExpr::lit("0")
        } else {
            IrExpr::var(result_var)
        }
    }

    // ------------------------------------------------------------------
    // Identifiers
    // ------------------------------------------------------------------

    fn lower_ident(&mut self, name: &str) -> IrExpr {
        if self.is_local(name) {
            return IrExpr::var(name);
        }
        // Implicit member access inside a class body.
        if let Some((src, _)) = self.current_class.clone() {
            if self.analysis.find_field(&src, name).is_some() {
                return IrExpr::arrow(IrExpr::var("self"), name);
            }
            if let Some(prop) = self.analysis.find_property(&src, name) {
                if prop.auto {
                    return IrExpr::arrow(IrExpr::var("self"), format!("_prop_{}", name));
                }
                let owner = self.property_owner_mangled(&src, name);
                return IrExpr::call(format!("{}_get_{}", owner, name), vec![IrExpr::var("self")]);
            }
        }
        IrExpr::var(name)
    }

    fn property_owner_mangled(&mut self, class: &str, prop: &str) -> String {
        let mut current = Some(class.to_string());
        while let Some(cname) = current {
            match self.analysis.classes.get(&cname) {
                Some(info) => {
                    if info.properties.iter().any(|p| p.name == prop) {
                        return self.current_mangled_for(&cname);
                    }
                    current = info.parent.clone();
                }
                None => break,
            }
        }
        class.to_string()
    }

    /// Mangled name of a class in the current lowering context (the
    /// instance name while inside a generic instance).
    fn current_mangled_for(&mut self, class: &str) -> String {
        if let Some((src, mangled)) = &self.current_class {
            if src == class {
                return mangled.clone();
            }
        }
        class.to_string()
    }

    // ------------------------------------------------------------------
    // Member access
    // ------------------------------------------------------------------

    fn lower_member(&mut self, whole: &Expr, base: &Expr, field: &str, op: MemberOp) -> IrExpr {
        // Enum variant constants through the type name.
        if let Some(name) = base.as_ident() {
            if !self.is_local(name) {
                if let Some(info) = self.analysis.enums.get(name) {
                    return if info.is_tagged {
                        IrExpr::lit(format!("{}_{}_TAG", name, field))
                    } else {
                        IrExpr::lit(field.to_string())
                    };
                }
            }
        }

        let base_ty = self.expr_ty(base);

        // Null-propagating access hoists a temp and a null test.
        if op == MemberOp::Question {
            return self.lower_null_safe_member(whole, base, field, &base_ty);
        }

        match base_ty.unwrap_opt() {
            Ty::Enum(enum_name) => {
                let base_ir = self.lower_expr(base);
                let info = self.analysis.enums.get(enum_name);
                let is_payload_variant = info
                    .map(|i| i.variants.iter().any(|v| v.name == field && !v.fields.is_empty()))
                    .unwrap_or(false);
                if is_payload_variant {
                    // Variant view: `e.Circle` -> `e.as.Circle`.
                    IrExpr::dot(IrExpr::dot(base_ir, "as"), field)
                } else {
                    // `e.tag`
                    IrExpr::dot(base_ir, field)
                }
            }
            Ty::Variant { .. } => {
                let base_ir = self.lower_expr(base);
                IrExpr::dot(base_ir, field)
            }
            Ty::Tuple(_) => {
                let base_ir = self.lower_expr(base);
                IrExpr::dot(base_ir, field)
            }
            Ty::Class { name, args } => {
                let class = name.clone();
                let args = args.clone();
                let base_ir = self.lower_expr(base);
                if self.analysis.find_field(&class, field).is_some() {
                    return IrExpr::arrow(base_ir, field);
                }
                if let Some(prop) = self.analysis.find_property(&class, field).cloned() {
                    if prop.auto && self.current_class.as_ref().map(|(s, _)| s.as_str()) == Some(class.as_str()) {
                        return IrExpr::arrow(base_ir, format!("_prop_{}", field));
                    }
                    let _ = self.mangled(&class, &args);
                    let owner = self.property_owner_mangled(&class, field);
                    return IrExpr::call(format!("{}_get_{}", owner, field), vec![base_ir]);
                }
                IrExpr::arrow(base_ir, field)
            }
            Ty::Ptr(_) => {
                let base_ir = self.lower_expr(base);
                IrExpr::arrow(base_ir, field)
            }
            _ => {
                let base_ir = self.lower_expr(base);
                IrExpr::dot(base_ir, field)
            }
        }
    }

    fn lower_null_safe_member(
        &mut self,
        whole: &Expr,
        base: &Expr,
        field: &str,
        base_ty: &Ty,
    ) -> IrExpr {
        let base_ir = self.lower_expr(base);
        let base_c = self.c_type(base_ty);
        let base_var = self.hoist(base_ir, &base_c, "__opt");

        let result_ty = self.expr_ty(whole);
        let result_c = self.c_type(&result_ty);
        let zero = self.c_zero(&result_ty);
        let result_var = self.fresh_temp("__optv");
        self.pending.push(IrStmt::var_decl(
            result_c,
            result_var.clone(),
            Some(IrExpr::lit(zero)),
        ));
        self.pending.push(IrStmt::If {
            cond: IrExpr::binop(IrExpr::var(base_var.clone()), "!=", IrExpr::null()),
            then_block: IrBlock::new(vec![IrStmt::assign(
                IrExpr::var(result_var.clone()),
                IrExpr::arrow(IrExpr::var(base_var), field),
            )]),
            else_block: None,
        });
        IrExpr::var(result_var)
    }

    // ------------------------------------------------------------------
    // Indexing
    // ------------------------------------------------------------------

    fn lower_index(&mut self, base: &Expr, index: &Expr) -> IrExpr {
        let base_ty = self.expr_ty(base);
        match base_ty.unwrap_opt() {
            Ty::Class { name, args }
                if matches!(name.as_str(), "Vector" | "List" | "Array") =>
            {
                let mangled = self.mangled(&name.clone(), &args.clone());
                let base_ir = self.lower_expr(base);
                let index_ir = self.lower_expr(index);
                IrExpr::call(format!("{}_get", mangled), vec![base_ir, index_ir])
            }
            Ty::Class { name, args } if name == "Map" => {
                let mangled = self.mangled(&name.clone(), &args.clone());
                let base_ir = self.lower_expr(base);
                let index_ir = self.lower_expr(index);
                IrExpr::call(format!("{}_get", mangled), vec![base_ir, index_ir])
            }
            _ => {
                let base_ir = self.lower_expr(base);
                let index_ir = self.lower_expr(index);
                IrExpr::index(base_ir, index_ir)
            }
        }
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    fn lower_unary(&mut self, op: &str, operand: &Expr, prefix: bool) -> IrExpr {
        let ty = self.expr_ty(operand);
        if op == "-" {
            if let Some(class) = ty.class_name().map(str::to_string) {
                if builtin_generic_arity(&class).is_none() {
                    let args = ty.class_args().to_vec();
                    let mangled = self.mangled(&class, &args);
                    let operand_ir = self.lower_expr(operand);
                    return IrExpr::call(format!("{}_neg", mangled), vec![operand_ir]);
                }
            }
        }
        let operand_ir = self.lower_expr(operand);
        if prefix {
            IrExpr::unary(op, operand_ir)
        } else {
            IrExpr::postfix(op, operand_ir)
        }
    }

    fn lower_binary(&mut self, op: &str, left: &Expr, right: &Expr) -> IrExpr {
        let lt = self.expr_ty(left);
        let rt = self.expr_ty(right);

        // Operator overloads on user classes.
        if let Some(class) = lt.class_name().map(str::to_string) {
            if builtin_generic_arity(&class).is_none()
                && self.analysis.classes.contains_key(&class)
            {
                if let Some(core) = operator_core(op) {
                    let args = lt.class_args().to_vec();
                    let owner = self
                        .analysis
                        .find_method(&class, &format!("__{}__", core))
                        .map(|m| m.defined_in.clone())
                        .unwrap_or_else(|| class.clone());
                    let mangled = if args.is_empty() {
                        owner
                    } else {
                        self.mangled(&class, &args)
                    };
                    let left_ir = self.lower_expr(left);
                    let right_ir = self.lower_expr(right);
                    let call =
                        IrExpr::call(format!("{}_{}", mangled, core), vec![left_ir, right_ir]);
                    return if op == "!=" {
                        IrExpr::unary("!", call)
                    } else {
                        call
                    };
                }
            }
        }

        // String operators.
        if lt.is_string() && rt.is_string() {
            match op {
                "+" => {
                    self.use_helper("strings.transform");
                    let left_ir = self.lower_expr(left);
                    let right_ir = self.lower_expr(right);
                    return IrExpr::call_helper(
                        "__btrc_str_concat",
                        vec![left_ir, right_ir],
                        "strings.transform",
                    );
                }
                "==" | "!=" => {
                    self.use_helper("hash");
                    let left_ir = self.lower_expr(left);
                    let right_ir = self.lower_expr(right);
                    let eq = IrExpr::call_helper(
                        "__btrc_eq_str",
                        vec![left_ir, right_ir],
                        "hash",
                    );
                    return if op == "!=" { IrExpr::unary("!", eq) } else { eq };
                }
                "<" | ">" | "<=" | ">=" => {
                    let left_ir = self.lower_expr(left);
                    let right_ir = self.lower_expr(right);
                    return IrExpr::binop(
                        IrExpr::call("strcmp", vec![left_ir, right_ir]),
                        op,
                        IrExpr::lit("0"),
                    );
                }
                _ => {}
            }
        }

        // Checked integer division.
        if matches!(op, "/" | "%") && lt.is_integer() && rt.is_integer() {
            self.use_helper("math.div");
            let name = if op == "/" { "__btrc_div_int" } else { "__btrc_mod_int" };
            let left_ir = self.lower_expr(left);
            let right_ir = self.lower_expr(right);
            return IrExpr::call_helper(name, vec![left_ir, right_ir], "math.div");
        }

        let left_ir = self.lower_expr(left);
        let right_ir = self.lower_expr(right);
        IrExpr::binop(left_ir, op, right_ir)
    }

    fn lower_ternary(
        &mut self,
        whole: &Expr,
        cond: &Expr,
        then_expr: &Expr,
        else_expr: &Expr,
    ) -> IrExpr {
        let result_ty = self.expr_ty(whole);
        let result_c = self.c_type(&result_ty);
        let result_var = self.fresh_temp("__sel");

        let cond_ir = self.lower_expr(cond);
        self.pending
            .push(IrStmt::var_decl(result_c, result_var.clone(), None));

        let mark = self.pending.len();
        let then_ir = self.lower_expr(then_expr);
        let mut then_stmts: Vec<IrStmt> = self.pending.split_off(mark);
        then_stmts.push(IrStmt::assign(IrExpr::var(result_var.clone()), then_ir));

        let mark = self.pending.len();
        let else_ir = self.lower_expr(else_expr);
        let mut else_stmts: Vec<IrStmt> = self.pending.split_off(mark);
        else_stmts.push(IrStmt::assign(IrExpr::var(result_var.clone()), else_ir));

        self.pending.push(IrStmt::If {
            cond: cond_ir,
            then_block: IrBlock::new(then_stmts),
            else_block: Some(IrBlock::new(else_stmts)),
        });
        IrExpr::var(result_var)
    }

    /// `a ?? b`: evaluate `a` once, fall back to `b` when null.
    fn lower_coalesce(&mut self, whole: &Expr, left: &Expr, right: &Expr) -> IrExpr {
        let result_ty = self.expr_ty(whole);
        let result_c = self.c_type(&result_ty);

        let left_ir = self.lower_expr(left);
        let result_var = self.fresh_temp("__co");
        self.pending.push(IrStmt::var_decl(
            result_c,
            result_var.clone(),
            Some(left_ir),
        ));

        let mark = self.pending.len();
        let right_ir = self.lower_expr(right);
        let mut fallback: Vec<IrStmt> = self.pending.split_off(mark);
        fallback.push(IrStmt::assign(IrExpr::var(result_var.clone()), right_ir));

        self.pending.push(IrStmt::If {
            cond: IrExpr::binop(IrExpr::var(result_var.clone()), "==", IrExpr::null()),
            then_block: IrBlock::new(fallback),
            else_block: None,
        });
        IrExpr::var(result_var)
    }

    // ------------------------------------------------------------------
    // new / literals
    // ------------------------------------------------------------------

    fn lower_new(&mut self, ty: &crate::ast::TypeExpr, args: &[Expr]) -> IrExpr {
        let resolved = self.lower_type_expr(ty);
        let (name, targs) = match resolved.unwrap_opt() {
            Ty::Class { name, args } => (name.clone(), args.clone()),
            _ => return IrExpr::null(),
        };
        let mangled = self.mangled(&name, &targs);

        if builtin_generic_arity(&name).is_some() {
            let lowered: Vec<IrExpr> = args.iter().map(|a| self.lower_expr(a)).collect();
            return IrExpr::call(format!("{}_new", mangled), lowered);
        }

        let params = self
            .analysis
            .classes
            .get(&name)
            .map(|c| c.ctor_params.clone())
            .unwrap_or_default();
        let lowered = self.lower_call_args(&name, args, &params, targs.as_slice());
        IrExpr::call(format!("{}_new", mangled), lowered)
    }

    fn lower_list_lit(&mut self, whole: &Expr, items: &[Expr]) -> IrExpr {
        let ty = self.expr_ty(whole);
        let (name, args) = match ty.unwrap_opt() {
            Ty::Class { name, args } => (name.clone(), args.clone()),
            _ => return IrExpr::null(),
        };
        let mangled = self.mangled(&name, &args);
        let tmp = self.fresh_temp("__lst");
        let c = self.c_type(&ty);

        if name == "Array" {
            self.pending.push(IrStmt::var_decl(
                c,
                tmp.clone(),
                Some(IrExpr::call(
                    format!("{}_new", mangled),
                    vec![IrExpr::lit(items.len().to_string())],
                )),
            ));
            for (i, item) in items.iter().enumerate() {
                let item_ir = self.lower_expr(item);
                self.pending.push(IrStmt::expr(IrExpr::call(
                    format!("{}_set", mangled),
                    vec![
                        IrExpr::var(tmp.clone()),
                        IrExpr::lit(i.to_string()),
                        item_ir,
                    ],
                )));
            }
        } else {
            self.pending.push(IrStmt::var_decl(
                c,
                tmp.clone(),
                Some(IrExpr::call(format!("{}_new", mangled), vec![])),
            ));
            for item in items {
                let item_ir = self.lower_expr(item);
                self.pending.push(IrStmt::expr(IrExpr::call(
                    format!("{}_push", mangled),
                    vec![IrExpr::var(tmp.clone()), item_ir],
                )));
            }
        }
        IrExpr::var(tmp)
    }

    fn lower_map_lit(&mut self, whole: &Expr, entries: &[crate::ast::MapEntry]) -> IrExpr {
        let ty = self.expr_ty(whole);
        let (name, args) = match ty.unwrap_opt() {
            Ty::Class { name, args } => (name.clone(), args.clone()),
            _ => return IrExpr::null(),
        };
        let mangled = self.mangled(&name, &args);
        let tmp = self.fresh_temp("__map");
        let c = self.c_type(&ty);
        // `{}` initializes any collection type; entries imply a Map.
        let ctor_args = if name == "Array" {
            vec![IrExpr::lit("0")]
        } else {
            vec![]
        };
        self.pending.push(IrStmt::var_decl(
            c,
            tmp.clone(),
            Some(IrExpr::call(format!("{}_new", mangled), ctor_args)),
        ));
        for entry in entries {
            let k = self.lower_expr(&entry.key);
            let v = self.lower_expr(&entry.value);
            self.pending.push(IrStmt::expr(IrExpr::call(
                format!("{}_put", mangled),
                vec![IrExpr::var(tmp.clone()), k, v],
            )));
        }
        IrExpr::var(tmp)
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    fn lower_call(&mut self, whole: &Expr, callee: &Expr, args: &[Expr]) -> IrExpr {
        // print builtin.
        if callee.as_ident() == Some("print") && !self.is_local("print") {
            return self.lower_print(args);
        }

        // Free function call.
        if let Some(name) = callee.as_ident() {
            if !self.is_local(name) {
                if let Some(info) = self.analysis.functions.get(name).cloned() {
                    let lowered = self.lower_fn_call_args(name, args, &info.params);
                    return IrExpr::call(name, lowered);
                }
                // Constructor call through the bare class name.
                if let Some(info) = self.analysis.classes.get(name).cloned() {
                    if info.generic_params.is_empty() {
                        let lowered =
                            self.lower_call_args(name, args, &info.ctor_params, &[]);
                        return IrExpr::call(format!("{}_new", name), lowered);
                    }
                }
            }
        }

        if let ExprKind::Member { base, field, op } = &callee.kind {
            if *op == MemberOp::Question {
                return self.lower_null_safe_call(whole, base, field, args);
            }
            return self.lower_member_call(base, field, *op, args);
        }

        // Function-pointer value.
        let callee_ir = self.lower_expr(callee);
        let lowered: Vec<IrExpr> = args.iter().map(|a| self.lower_expr(a)).collect();
        IrExpr::Call {
            callee: Box::new(callee_ir),
            args: lowered,
            helper_ref: None,
        }
    }

    fn lower_print(&mut self, args: &[Expr]) -> IrExpr {
        let mut fmt = String::new();
        let mut lowered = Vec::new();
        for arg in args {
            let ty = self.expr_ty(arg);
            let ir = self.lower_expr(arg);
            match ty.unwrap_opt() {
                Ty::Prim(Prim::Str) => {
                    fmt.push_str("%s");
                    lowered.push(ir);
                }
                Ty::Prim(Prim::Char) => {
                    fmt.push_str("%c");
                    lowered.push(ir);
                }
                Ty::Prim(Prim::Float | Prim::Double) => {
                    fmt.push_str("%g");
                    lowered.push(ir);
                }
                Ty::Prim(Prim::Long) => {
                    fmt.push_str("%ld");
                    lowered.push(ir);
                }
                Ty::Prim(Prim::Bool) => {
                    fmt.push_str("%s");
                    let tmp = self.fresh_temp("__b");
                    self.pending.push(IrStmt::var_decl(
                        "const char*",
                        tmp.clone(),
                        Some(IrExpr::lit("\"false\"")),
                    ));
                    self.pending.push(IrStmt::If {
                        cond: ir,
                        then_block: IrBlock::new(vec![IrStmt::assign(
                            IrExpr::var(tmp.clone()),
                            IrExpr::lit("\"true\""),
                        )]),
                        else_block: None,
                    });
                    lowered.push(IrExpr::var(tmp));
                }
                Ty::Enum(_) | Ty::Prim(_) => {
                    fmt.push_str("%d");
                    lowered.push(ir);
                }
                _ => {
                    fmt.push_str("%p");
                    lowered.push(IrExpr::cast("void*", ir));
                }
            }
        }
        fmt.push_str("\\n");
        let mut call_args = vec![IrExpr::lit(format!("\"{}\"", fmt))];
        call_args.extend(lowered);
        IrExpr::call("printf", call_args)
    }

    /// Arguments for a free-function call: defaults filled, conversions
    /// applied, `keep` parameters retained at the call site.
    fn lower_fn_call_args(
        &mut self,
        fn_name: &str,
        args: &[Expr],
        params: &[crate::analyzer::ParamInfo],
    ) -> Vec<IrExpr> {
        let mut lowered = Vec::new();
        for (i, param) in params.iter().enumerate() {
            let ir = match args.get(i) {
                Some(arg) => {
                    let got = self.expr_ty(arg);
                    let ir = self.lower_expr(arg);
                    self.coerce(ir, &got, &param.ty.clone())
                }
                None => match self.default_for_fn_param(fn_name, i) {
                    Some(ir) => ir,
                    None => break,
                },
            };
            let ir = if param.keep && param.ty.class_name().is_some() {
                self.retain_at_callsite(ir, &param.ty.clone())
            } else {
                ir
            };
            lowered.push(ir);
        }
        lowered
    }

    fn default_for_fn_param(&mut self, fn_name: &str, index: usize) -> Option<IrExpr> {
        let decl = self.fn_decls.get(fn_name).copied()?;
        let default = decl.params.get(index)?.default.clone()?;
        Some(self.lower_expr(&default))
    }

    /// `keep` parameter: increment the refcount before the call, through a
    /// hoisted temporary so the argument is evaluated once.
    fn retain_at_callsite(&mut self, ir: IrExpr, ty: &Ty) -> IrExpr {
        let c = self.c_type(ty);
        let var = self.hoist(ir, &c, "__keep");
        self.pending.push(IrStmt::If {
            cond: IrExpr::binop(IrExpr::var(var.clone()), "!=", IrExpr::null()),
            then_block: IrBlock::new(vec![IrStmt::expr(IrExpr::postfix(
                "++",
                IrExpr::arrow(IrExpr::var(var.clone()), "__rc"),
            ))]),
            else_block: None,
        });
        IrExpr::var(var)
    }

    /// Arguments for a method/constructor call (same machinery, defaults
    /// looked up on the class AST).
    fn lower_call_args(
        &mut self,
        class: &str,
        args: &[Expr],
        params: &[crate::analyzer::ParamInfo],
        targs: &[Ty],
    ) -> Vec<IrExpr> {
        let subst: std::collections::HashMap<String, Ty> = self
            .analysis
            .classes
            .get(class)
            .map(|c| {
                c.generic_params
                    .iter()
                    .cloned()
                    .zip(targs.iter().cloned())
                    .collect()
            })
            .unwrap_or_default();
        let mut lowered = Vec::new();
        for (i, param) in params.iter().enumerate() {
            let expected = if subst.is_empty() {
                param.ty.clone()
            } else {
                param.ty.substitute(&subst)
            };
            let ir = match args.get(i) {
                Some(arg) => {
                    let got = self.expr_ty(arg);
                    let ir = self.lower_expr(arg);
                    self.coerce(ir, &got, &expected)
                }
                None => match self.default_for_ctor_param(class, i) {
                    Some(ir) => ir,
                    None => break,
                },
            };
            let ir = if param.keep && expected.class_name().is_some() {
                self.retain_at_callsite(ir, &expected)
            } else {
                ir
            };
            lowered.push(ir);
        }
        lowered
    }

    fn default_for_ctor_param(&mut self, class: &str, index: usize) -> Option<IrExpr> {
        let decl = self.class_decls.get(class).copied()?;
        let ctor = decl.members.iter().find_map(|m| match m {
            crate::ast::Member::Ctor { ctor } => Some(ctor),
            _ => None,
        })?;
        let default = ctor.params.get(index)?.default.clone()?;
        Some(self.lower_expr(&default))
    }

    fn default_for_method_param(
        &mut self,
        class: &str,
        method: &str,
        index: usize,
    ) -> Option<IrExpr> {
        let mut current = Some(class.to_string());
        while let Some(cname) = current {
            if let Some(decl) = self.class_decls.get(cname.as_str()).copied() {
                for m in &decl.members {
                    if let crate::ast::Member::Method { method: md } = m {
                        if md.name == method {
                            let default = md.params.get(index)?.default.clone()?;
                            return Some(self.lower_expr(&default));
                        }
                    }
                }
            }
            current = self
                .analysis
                .classes
                .get(&cname)
                .and_then(|c| c.parent.clone());
        }
        None
    }

    fn lower_member_call(
        &mut self,
        base: &Expr,
        field: &str,
        op: MemberOp,
        args: &[Expr],
    ) -> IrExpr {
        // Static call or enum construction through a type name.
        if let Some(name) = base.as_ident() {
            if !self.is_local(name) {
                if self.analysis.enums.contains_key(name) {
                    let lowered: Vec<IrExpr> =
                        args.iter().map(|a| self.lower_expr(a)).collect();
                    return IrExpr::call(format!("{}_{}", name, field), lowered);
                }
                if self.analysis.classes.contains_key(name) {
                    if let Some(m) = self.analysis.find_method(name, field).cloned() {
                        if m.is_static {
                            let params = m.params.clone();
                            let lowered =
                                self.lower_method_args(name, field, args, &params, &[]);
                            return IrExpr::call(
                                format!("{}_{}", m.defined_in, method_core(field)),
                                lowered,
                            );
                        }
                    }
                }
            }
        }

        // super.m(...) is always a direct call on the parent.
        if matches!(base.kind, ExprKind::SuperLit) {
            let parent = self
                .current_class
                .as_ref()
                .map(|(src, _)| src.clone())
                .and_then(|c| self.analysis.classes.get(&c))
                .and_then(|i| i.parent.clone());
            if let Some(parent) = parent {
                if let Some(m) = self.analysis.find_method(&parent, field).cloned() {
                    let mut lowered = vec![IrExpr::cast(
                        format!("{}*", m.defined_in),
                        IrExpr::var("self"),
                    )];
                    lowered.extend(self.lower_method_args(&parent, field, args, &m.params, &[]));
                    return IrExpr::call(
                        format!("{}_{}", m.defined_in, method_core(field)),
                        lowered,
                    );
                }
            }
        }

        let base_ty = self.expr_ty(base);
        let effective = base_ty.unwrap_opt().clone();
        let _ = op;

        match &effective {
            // String builtins.
            Ty::Prim(Prim::Str) => self.lower_string_method(base, field, args),
            t if t.is_numeric() => {
                // number.toString()
                self.use_helper("strings.convert");
                let ir = self.lower_receiver(base);
                let (helper, cast) = match t {
                    Ty::Prim(Prim::Float | Prim::Double) => ("__btrc_float_tostr", "double"),
                    _ => ("__btrc_int_tostr", "long"),
                };
                IrExpr::call_helper(
                    helper,
                    vec![IrExpr::cast(cast, ir)],
                    "strings.convert",
                )
            }
            Ty::Class { name, args: targs } => {
                let name = name.clone();
                let targs = targs.clone();
                if builtin_generic_arity(&name).is_some() {
                    // Collection method.
                    let mangled = self.mangled(&name, &targs);
                    if name == "Map" && field == "keys" {
                        // Re-check that Vector<K> exists for keys().
                        self.ensure_instance("Vector", vec![targs[0].clone()]);
                    }
                    let base_ir = self.lower_receiver(base);
                    let mut lowered = vec![base_ir];
                    for a in args {
                        lowered.push(self.lower_expr(a));
                    }
                    return IrExpr::call(format!("{}_{}", mangled, field), lowered);
                }
                self.lower_class_method_call(base, &name, &targs, field, args)
            }
            Ty::Iface(iface) => {
                let iface = iface.clone();
                let base_ir = self.lower_receiver(base);
                let c = iface.clone();
                let recv = self.hoist(base_ir, &c, "__iref");
                let mut lowered = vec![IrExpr::var(recv.clone())];
                for a in args {
                    lowered.push(self.lower_expr(a));
                }
                IrExpr::Call {
                    callee: Box::new(IrExpr::arrow(
                        IrExpr::unary("*", IrExpr::var(recv)),
                        field,
                    )),
                    args: lowered,
                    helper_ref: None,
                }
            }
            _ => {
                let base_ir = self.lower_receiver(base);
                let mut lowered = vec![base_ir];
                for a in args {
                    lowered.push(self.lower_expr(a));
                }
                IrExpr::call(field, lowered)
            }
        }
    }

    fn lower_method_args(
        &mut self,
        class: &str,
        method: &str,
        args: &[Expr],
        params: &[crate::analyzer::ParamInfo],
        targs: &[Ty],
    ) -> Vec<IrExpr> {
        let subst: std::collections::HashMap<String, Ty> = self
            .analysis
            .classes
            .get(class)
            .map(|c| {
                c.generic_params
                    .iter()
                    .cloned()
                    .zip(targs.iter().cloned())
                    .collect()
            })
            .unwrap_or_default();
        let mut lowered = Vec::new();
        for (i, param) in params.iter().enumerate() {
            let expected = if subst.is_empty() {
                param.ty.clone()
            } else {
                param.ty.substitute(&subst)
            };
            let ir = match args.get(i) {
                Some(arg) => {
                    let got = self.expr_ty(arg);
                    let ir = self.lower_expr(arg);
                    self.coerce(ir, &got, &expected)
                }
                None => match self.default_for_method_param(class, method, i) {
                    Some(ir) => ir,
                    None => break,
                },
            };
            let ir = if param.keep && expected.class_name().is_some() {
                self.retain_at_callsite(ir, &expected)
            } else {
                ir
            };
            lowered.push(ir);
        }
        lowered
    }

    fn lower_class_method_call(
        &mut self,
        base: &Expr,
        class: &str,
        targs: &[Ty],
        field: &str,
        args: &[Expr],
    ) -> IrExpr {
        let method = match self.analysis.find_method(class, field).cloned() {
            Some(m) => m,
            None => {
                // User iterable protocol methods on generic instances fall
                // through to the mangled direct form.
                let mangled = self.mangled(class, targs);
                let base_ir = self.lower_receiver(base);
                let mut lowered = vec![base_ir];
                for a in args {
                    lowered.push(self.lower_expr(a));
                }
                return IrExpr::call(format!("{}_{}", mangled, method_core(field)), lowered);
            }
        };

        // Generic instance: methods are specialized under the mangled name.
        if !targs.is_empty() {
            let mangled = self.mangled(class, targs);
            let base_ir = self.lower_receiver(base);
            let mut lowered = vec![base_ir];
            lowered.extend(self.lower_method_args(class, field, args, &method.params, targs));
            return IrExpr::call(format!("{}_{}", mangled, method_core(field)), lowered);
        }

        let use_vtable = !method.is_static
            && self.analysis.in_hierarchy(class)
            && self.analysis.vtable_slot(class, field).is_some();

        if use_vtable {
            let slot = self
                .analysis
                .vtable_slot(class, field)
                .map(|(_, s)| s.clone())
                .expect("slot checked above");
            let base_ir = self.lower_receiver(base);
            let recv_c = format!("{}*", class);
            let recv = self.hoist(base_ir, &recv_c, "__recv");
            let self_arg = if slot.introduced_in == class {
                IrExpr::var(recv.clone())
            } else {
                IrExpr::cast(
                    format!("{}*", slot.introduced_in),
                    IrExpr::var(recv.clone()),
                )
            };
            let mut lowered = vec![self_arg];
            lowered.extend(self.lower_method_args(class, field, args, &method.params, &[]));
            return IrExpr::Call {
                callee: Box::new(IrExpr::arrow(
                    IrExpr::arrow(IrExpr::var(recv), "__vtable"),
                    method_core(field),
                )),
                args: lowered,
                helper_ref: None,
            };
        }

        // Direct call to the nearest implementation.
        let base_ir = self.lower_receiver(base);
        let self_arg = if method.defined_in == class {
            base_ir
        } else {
            IrExpr::cast(format!("{}*", method.defined_in), base_ir)
        };
        let mut lowered = vec![self_arg];
        lowered.extend(self.lower_method_args(class, field, args, &method.params, &[]));
        IrExpr::call(
            format!("{}_{}", method.defined_in, method_core(field)),
            lowered,
        )
    }

    fn lower_string_method(&mut self, base: &Expr, field: &str, args: &[Expr]) -> IrExpr {
        let base_ir = self.lower_receiver(base);
        let mut lowered = vec![base_ir];
        for a in args {
            lowered.push(self.lower_expr(a));
        }
        let (helper, category): (&str, &str) = match field {
            "len" => ("__btrc_str_len", "strings.query"),
            "indexOf" => ("__btrc_str_indexof", "strings.query"),
            "contains" => ("__btrc_str_contains", "strings.query"),
            "startsWith" => ("__btrc_str_startswith", "strings.query"),
            "endsWith" => ("__btrc_str_endswith", "strings.query"),
            "toInt" => ("__btrc_str_toint", "strings.convert"),
            "toFloat" => ("__btrc_str_tofloat", "strings.convert"),
            "substring" => ("__btrc_str_substring", "strings.transform"),
            "trim" => ("__btrc_str_trim", "strings.transform"),
            "toUpper" => ("__btrc_str_toupper", "strings.transform"),
            "toLower" => ("__btrc_str_tolower", "strings.transform"),
            "replace" => ("__btrc_str_replace", "strings.transform"),
            "split" => return self.lower_split(lowered),
            _ => {
                // Unknown method on string: keep the shape, the analyzer
                // already reported it.
                return IrExpr::call(field, lowered);
            }
        };
        self.use_helper(category);
        IrExpr::Call {
            callee: Box::new(IrExpr::var(helper)),
            args: lowered,
            helper_ref: Some(category.to_string()),
        }
    }

    /// `s.split(sep)` returns a `Vector<string>`; the splitter itself is
    /// generated once per module because it constructs the monomorphized
    /// vector type.
    fn lower_split(&mut self, args: Vec<IrExpr>) -> IrExpr {
        self.ensure_instance("Vector", vec![Ty::STR]);
        self.use_helper("strings.transform");
        if !self.split_emitted {
            self.split_emitted = true;
            self.module.generated.push(
                r#"
static Vector_string* __btrc_str_split(const char* s, const char* sep) {
    Vector_string* out = Vector_string_new();
    size_t sep_len;
    const char* hit;
    if (!s) s = "";
    if (!sep || !*sep) {
        Vector_string_push(out, __btrc_str_dup(s));
        return out;
    }
    sep_len = strlen(sep);
    for (;;) {
        hit = strstr(s, sep);
        if (!hit) {
            Vector_string_push(out, __btrc_str_dup(s));
            return out;
        }
        Vector_string_push(out, __btrc_str_substring(s, 0, (int)(hit - s)));
        s = hit + sep_len;
    }
}
"#
                .to_string(),
            );
        }
        IrExpr::call_helper("__btrc_str_split", args, "strings.transform")
    }
}
