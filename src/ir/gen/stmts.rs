//! Statement lowering.
//!
//! for-in becomes indexed iteration over the iterLen/iterGet protocol,
//! do-while becomes a `while(1)` with a trailing negated-condition break,
//! try/catch/finally becomes the setjmp stack machinery, and ARC scope
//! releases are appended on every exit path.

use crate::analyzer::{primitive_for, Prim, Ty};
use crate::ast::{Block, Expr, ExprKind, Stmt, StmtKind, TypeExpr, TypeExprKind};
use crate::ir::nodes::{IrBlock, IrCase, IrExpr, IrStmt};

use super::IrGenerator;

impl<'a> IrGenerator<'a> {
    /// Lower a function body: block lowering plus the return-type context
    /// for coercions.
    pub fn lower_function_block(&mut self, block: &Block, ret: &Ty) -> IrBlock {
        self.current_ret = ret.clone();
        self.lower_block(block)
    }

    pub fn lower_block(&mut self, block: &Block) -> IrBlock {
        self.push_locals();
        self.managed_stack.push(Vec::new());
        let mut stmts = Vec::new();
        for s in &block.stmts {
            stmts.extend(self.lower_stmt(s));
        }
        let managed = self.managed_stack.pop().unwrap_or_default();
        stmts.extend(self.scope_release(managed));
        self.pop_locals();
        IrBlock::new(stmts)
    }

    pub fn lower_stmt(&mut self, stmt: &Stmt) -> Vec<IrStmt> {
        match &stmt.kind {
            StmtKind::VarDecl { ty, name, init, infer } => {
                let declared = if *infer {
                    init.as_ref()
                        .map(|e| self.expr_ty(e))
                        .unwrap_or(Ty::Error)
                } else {
                    ty.as_ref()
                        .map(|t| self.lower_type_expr(t))
                        .unwrap_or(Ty::Error)
                };
                let init_ir = init.as_ref().map(|e| {
                    let got = self.expr_ty(e);
                    let ir = self.lower_expr(e);
                    self.coerce(ir, &got, &declared)
                });
                let c_type = self.c_type(&declared);
                self.declare_local(name);
                let mut out = self.take_pending();
                out.push(IrStmt::var_decl(c_type, name.clone(), init_ir));
                out.extend(self.register_managed(name, &declared));
                out
            }
            StmtKind::TupleDestructure { names, value } => {
                let tuple_ty = self.expr_ty(value);
                let ir = self.lower_expr(value);
                let tmp = self.fresh_temp("__tup");
                let c_type = self.c_type(&tuple_ty);
                let mut out = self.take_pending();
                out.push(IrStmt::var_decl(c_type, tmp.clone(), Some(ir)));
                if let Ty::Tuple(items) = tuple_ty.unwrap_opt() {
                    for (i, (name, item_ty)) in names.iter().zip(items.iter()).enumerate() {
                        let field = IrExpr::dot(IrExpr::var(tmp.clone()), format!("_{}", i));
                        let c = self.c_type(item_ty);
                        self.declare_local(name);
                        out.push(IrStmt::var_decl(c, name.clone(), Some(field)));
                    }
                }
                out
            }
            StmtKind::Assign { target, op, value } => self.lower_assign(target, op, value),
            StmtKind::ExprStmt { value } => {
                let ir = self.lower_expr(value);
                let mut out = self.take_pending();
                // Pure value expressions hoisted entirely into pending
                // (f-strings, list literals) leave only a variable behind.
                if !matches!(ir, IrExpr::Var(_) | IrExpr::Literal(_)) {
                    out.push(IrStmt::expr(ir));
                }
                out
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                let cond_ir = self.lower_expr(cond);
                let mut out = self.take_pending();
                let then_ir = self.lower_block(then_block);
                let else_ir = else_block.as_ref().map(|b| self.lower_block(b));
                out.push(IrStmt::If {
                    cond: cond_ir,
                    then_block: then_ir,
                    else_block: else_ir,
                });
                out
            }
            StmtKind::While { cond, body } => {
                let cond_ir = self.lower_expr(cond);
                let mut out = self.take_pending();
                let body_ir = self.lower_block(body);
                out.push(IrStmt::While {
                    cond: cond_ir,
                    body: body_ir,
                });
                out
            }
            StmtKind::DoWhile { body, cond } => {
                // The IR has no do-while node: run the body once per
                // iteration and break on a false condition at the bottom.
                let mut body_ir = self.lower_block(body);
                let cond_ir = self.lower_expr(cond);
                let mut tail = self.take_pending();
                tail.push(IrStmt::If {
                    cond: IrExpr::unary("!", cond_ir),
                    then_block: IrBlock::new(vec![IrStmt::Break]),
                    else_block: None,
                });
                body_ir.stmts.extend(tail);
                vec![IrStmt::While {
                    cond: IrExpr::lit("1"),
                    body: body_ir,
                }]
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                self.push_locals();
                let init_ir = init.as_ref().map(|s| {
                    let mut lowered = self.lower_stmt(s);
                    // A C for-init holds exactly one statement; anything the
                    // initializer hoisted goes in front of the loop.
                    let last = lowered.pop();
                    self.pending.extend(lowered);
                    Box::new(last.unwrap_or(IrStmt::expr(IrExpr::lit("0"))))
                });
                let cond_ir = cond.as_ref().map(|e| self.lower_expr(e));
                let update_ir = update.as_ref().map(|e| self.lower_assign_expr(e));
                let mut out = self.take_pending();
                let body_ir = self.lower_block(body);
                self.pop_locals();
                out.push(IrStmt::For {
                    init: init_ir,
                    cond: cond_ir,
                    update: update_ir,
                    body: body_ir,
                });
                out
            }
            StmtKind::ForIn {
                binding,
                binding2,
                iterable,
                body,
            } => self.lower_for_in(binding, binding2.as_deref(), iterable, body),
            StmtKind::Switch { value, cases } => {
                let value_ir = self.lower_expr(value);
                let mut out = self.take_pending();
                let mut ir_cases = Vec::new();
                for case in cases {
                    let case_value = case.value.as_ref().map(|v| {
                        let ir = self.lower_expr(v);
                        // Case labels are constant expressions; nothing to
                        // hoist.
                        self.pending.clear();
                        ir
                    });
                    let mut body_stmts = Vec::new();
                    self.push_locals();
                    for s in &case.body {
                        body_stmts.extend(self.lower_stmt(s));
                    }
                    self.pop_locals();
                    ir_cases.push(IrCase {
                        value: case_value,
                        body: body_stmts,
                    });
                }
                out.push(IrStmt::Switch {
                    value: value_ir,
                    cases: ir_cases,
                });
                out
            }
            StmtKind::Try {
                try_block,
                handler,
                finally_block,
            } => self.lower_try(try_block, handler.as_deref(), finally_block.as_deref()),
            StmtKind::Throw { value } => {
                self.use_helper("trycatch");
                self.need_setjmp();
                let ir = self.lower_expr(value);
                let mut out = self.take_pending();
                out.push(IrStmt::expr(IrExpr::call_helper(
                    "__btrc_throw",
                    vec![ir],
                    "trycatch",
                )));
                out
            }
            StmtKind::Return { value } => {
                let returned_name = value
                    .as_ref()
                    .and_then(|v| v.as_ident())
                    .map(str::to_string);
                let value_ir = value.as_ref().map(|v| {
                    let got = self.expr_ty(v);
                    let ir = self.lower_expr(v);
                    let expected = self.current_ret.clone();
                    self.coerce(ir, &got, &expected)
                });
                let mut out = self.take_pending();
                out.extend(self.return_release(returned_name.as_deref()));
                out.push(IrStmt::Return(value_ir));
                out
            }
            StmtKind::Break => vec![IrStmt::Break],
            StmtKind::Continue => vec![IrStmt::Continue],
            StmtKind::Block { inner } => {
                let block = self.lower_block(inner);
                vec![IrStmt::Block(block)]
            }
            StmtKind::Delete { value } => {
                let ty = self.expr_ty(value);
                let ir = self.lower_expr(value);
                // Evaluate the operand once; the release tests and uses it
                // repeatedly.
                let c = self.c_type(&ty);
                let var = self.hoist(ir, &c, "__del");
                let mut out = self.take_pending();
                out.extend(self.release_stmts(IrExpr::var(var), &ty, false));
                out
            }
            StmtKind::Keep { value } => {
                let ir = self.lower_expr(value);
                let mut out = self.take_pending();
                out.push(IrStmt::expr(IrExpr::postfix(
                    "++",
                    IrExpr::arrow(ir, "__rc"),
                )));
                out
            }
            StmtKind::Release { value } => {
                let ty = self.expr_ty(value);
                let ir = self.lower_expr(value);
                let null_after = matches!(value.kind, ExprKind::Ident { .. });
                let mut out = self.take_pending();
                out.extend(self.release_stmts(ir, &ty, null_after));
                out
            }
        }
    }

    // ------------------------------------------------------------------
    // Assignment
    // ------------------------------------------------------------------

    fn lower_assign(&mut self, target: &Expr, op: &str, value: &Expr) -> Vec<IrStmt> {
        // Property setter rewrite: `obj.prop = v` -> `Cls_set_prop(obj, v)`.
        if let ExprKind::Member { base, field, .. } = &target.kind {
            let base_ty = self.expr_ty(base);
            if let Some(class) = base_ty.class_name().map(str::to_string) {
                if self.analysis.find_property(&class, field).is_some() && op == "=" {
                    let args = base_ty.class_args().to_vec();
                    let mangled = self.mangled(&class, &args);
                    let owner = self.property_owner(&class, field);
                    let target_c = if owner == class {
                        mangled
                    } else {
                        owner.clone()
                    };
                    let base_ir = self.lower_expr(base);
                    let value_ir = self.lower_expr(value);
                    let mut out = self.take_pending();
                    out.push(IrStmt::expr(IrExpr::call(
                        format!("{}_set_{}", target_c, field),
                        vec![base_ir, value_ir],
                    )));
                    return out;
                }
            }
        }

        // Collection element stores: `v[i] = x` -> `Vector_T_set(v, i, x)`.
        if let ExprKind::Index { base, index } = &target.kind {
            let base_ty = self.expr_ty(base);
            if let Ty::Class { name, args } = base_ty.unwrap_opt() {
                if matches!(name.as_str(), "Vector" | "List" | "Array" | "Map") && op == "=" {
                    let method = if name == "Map" { "put" } else { "set" };
                    let mangled = self.mangled(name, args);
                    let base_ir = self.lower_expr(base);
                    let index_ir = self.lower_expr(index);
                    let value_ir = self.lower_expr(value);
                    let mut out = self.take_pending();
                    out.push(IrStmt::expr(IrExpr::call(
                        format!("{}_{}", mangled, method),
                        vec![base_ir, index_ir, value_ir],
                    )));
                    return out;
                }
            }
        }

        let target_ty = self.expr_ty(target);
        let value_ty = self.expr_ty(value);
        let target_ir = self.lower_expr(target);
        let value_ir = self.lower_expr(value);
        let value_ir = self.coerce(value_ir, &value_ty, &target_ty);
        let mut out = self.take_pending();

        // ARC: storing a tracked object into a class-typed field releases
        // the old value and retains the new one.
        let is_field_store = matches!(&target.kind, ExprKind::Member { .. });
        let value_tracked = value
            .as_ident()
            .map(|n| self.tracked.contains(n))
            .unwrap_or(false);
        if is_field_store && value_tracked && op == "=" && target_ty.class_name().is_some() {
            out.extend(self.release_stmts(target_ir.clone(), &target_ty, false));
            out.push(IrStmt::Assign {
                target: target_ir.clone(),
                op: "=".to_string(),
                value: value_ir,
            });
            out.push(IrStmt::If {
                cond: IrExpr::binop(target_ir.clone(), "!=", IrExpr::null()),
                then_block: IrBlock::new(vec![IrStmt::expr(IrExpr::postfix(
                    "++",
                    IrExpr::arrow(target_ir, "__rc"),
                ))]),
                else_block: None,
            });
            return out;
        }

        out.push(IrStmt::Assign {
            target: target_ir,
            op: op.to_string(),
            value: value_ir,
        });
        out
    }

    fn property_owner(&self, class: &str, prop: &str) -> String {
        let mut current = Some(class);
        while let Some(cname) = current {
            match self.analysis.classes.get(cname) {
                Some(info) => {
                    if info.properties.iter().any(|p| p.name == prop) {
                        return cname.to_string();
                    }
                    current = info.parent.as_deref();
                }
                None => break,
            }
        }
        class.to_string()
    }

    /// For-loop update clauses may be assignment-shaped binaries
    /// (`i += 1`); render them as-is.
    fn lower_assign_expr(&mut self, e: &Expr) -> IrExpr {
        self.lower_expr(e)
    }

    // ------------------------------------------------------------------
    // for-in
    // ------------------------------------------------------------------

    fn lower_for_in(
        &mut self,
        binding: &str,
        binding2: Option<&str>,
        iterable: &Expr,
        body: &Block,
    ) -> Vec<IrStmt> {
        if let ExprKind::Range { start, end, step } = &iterable.kind {
            return self.lower_range_for(binding, start, end.as_deref(), step.as_deref(), body);
        }

        let iter_ty = self.expr_ty(iterable);
        let iter_ir = self.lower_expr(iterable);
        let mut out = self.take_pending();

        // Hoist the iterable unless it is already a plain variable.
        let iter_var = match &iter_ir {
            IrExpr::Var(name) => name.clone(),
            _ => {
                let tmp = self.fresh_temp("__iter");
                let c = self.c_type(&iter_ty);
                out.push(IrStmt::var_decl(c, tmp.clone(), Some(iter_ir)));
                tmp
            }
        };

        // String iteration: char by char to the NUL.
        if matches!(iter_ty.unwrap_opt(), Ty::Prim(Prim::Str)) {
            let idx = self.fresh_temp("__i");
            self.push_locals();
            self.declare_local(binding);
            let mut body_ir = self.lower_block(body);
            self.pop_locals();
            body_ir.stmts.insert(
                0,
                IrStmt::var_decl(
                    "char",
                    binding.to_string(),
                    Some(IrExpr::index(
                        IrExpr::var(iter_var.clone()),
                        IrExpr::var(idx.clone()),
                    )),
                ),
            );
            out.push(IrStmt::For {
                init: Some(Box::new(IrStmt::var_decl("int", idx.clone(), Some(IrExpr::lit("0"))))),
                cond: Some(IrExpr::binop(
                    IrExpr::index(IrExpr::var(iter_var), IrExpr::var(idx.clone())),
                    "!=",
                    IrExpr::lit("'\\0'"),
                )),
                update: Some(IrExpr::postfix("++", IrExpr::var(idx))),
                body: body_ir,
            });
            return out;
        }

        // Collection (or user iterable) via iterLen/iterGet.
        let (name, args) = match iter_ty.unwrap_opt() {
            Ty::Class { name, args } => (name.clone(), args.clone()),
            _ => return out,
        };
        let mangled = self.mangled(&name, &args);
        let elem_ty = self.for_in_elem_ty(&args);
        let elem_c = self.c_type(&elem_ty);

        let n_var = self.fresh_temp("__n");
        let idx = self.fresh_temp("__i");

        self.push_locals();
        self.declare_local(binding);
        if let Some(b2) = binding2 {
            self.declare_local(b2);
        }
        let mut body_ir = self.lower_block(body);
        self.pop_locals();

        // Two-binding map iteration also pulls the value.
        if let Some(b2) = binding2 {
            if args.len() == 2 {
                let v_c = self.c_type(&args[1]);
                body_ir.stmts.insert(
                    0,
                    IrStmt::var_decl(
                        v_c,
                        b2.to_string(),
                        Some(IrExpr::call(
                            format!("{}_iterValueAt", mangled),
                            vec![IrExpr::var(iter_var.clone()), IrExpr::var(idx.clone())],
                        )),
                    ),
                );
            }
        }
        body_ir.stmts.insert(
            0,
            IrStmt::var_decl(
                elem_c,
                binding.to_string(),
                Some(IrExpr::call(
                    format!("{}_iterGet", mangled),
                    vec![IrExpr::var(iter_var.clone()), IrExpr::var(idx.clone())],
                )),
            ),
        );

        out.push(IrStmt::var_decl(
            "int",
            n_var.clone(),
            Some(IrExpr::call(
                format!("{}_iterLen", mangled),
                vec![IrExpr::var(iter_var)],
            )),
        ));
        out.push(IrStmt::For {
            init: Some(Box::new(IrStmt::var_decl("int", idx.clone(), Some(IrExpr::lit("0"))))),
            cond: Some(IrExpr::binop(
                IrExpr::var(idx.clone()),
                "<",
                IrExpr::var(n_var),
            )),
            update: Some(IrExpr::postfix("++", IrExpr::var(idx))),
            body: body_ir,
        });
        out
    }

    fn for_in_elem_ty(&self, args: &[Ty]) -> Ty {
        args.first().cloned().unwrap_or(Ty::Error)
    }

    /// `range(a, b, s)` becomes a stepped integer for loop.
    fn lower_range_for(
        &mut self,
        binding: &str,
        start: &Expr,
        end: Option<&Expr>,
        step: Option<&Expr>,
        body: &Block,
    ) -> Vec<IrStmt> {
        let start_ir = self.lower_expr(start);
        let end_ir = end.map(|e| self.lower_expr(e));
        let step_ir = step.map(|e| self.lower_expr(e));
        let mut out = self.take_pending();

        self.push_locals();
        self.declare_local(binding);
        let body_ir = self.lower_block(body);
        self.pop_locals();

        let loop_var = IrExpr::var(binding.to_string());
        match (end_ir, step_ir) {
            // range(n): 0..n
            (None, _) => {
                out.push(IrStmt::For {
                    init: Some(Box::new(IrStmt::var_decl(
                        "int",
                        binding.to_string(),
                        Some(IrExpr::lit("0")),
                    ))),
                    cond: Some(IrExpr::binop(loop_var.clone(), "<", start_ir)),
                    update: Some(IrExpr::postfix("++", loop_var)),
                    body: body_ir,
                });
            }
            // range(a, b)
            (Some(end_ir), None) => {
                out.push(IrStmt::For {
                    init: Some(Box::new(IrStmt::var_decl(
                        "int",
                        binding.to_string(),
                        Some(start_ir),
                    ))),
                    cond: Some(IrExpr::binop(loop_var.clone(), "<", end_ir)),
                    update: Some(IrExpr::postfix("++", loop_var)),
                    body: body_ir,
                });
            }
            // range(a, b, s): direction depends on the sign of the step.
            (Some(end_ir), Some(step_ir)) => {
                let end_var = self.fresh_temp("__end");
                let step_var = self.fresh_temp("__step");
                out.push(IrStmt::var_decl("int", end_var.clone(), Some(end_ir)));
                out.push(IrStmt::var_decl("int", step_var.clone(), Some(step_ir)));
                let up = IrExpr::binop(
                    IrExpr::binop(IrExpr::var(step_var.clone()), ">", IrExpr::lit("0")),
                    "&&",
                    IrExpr::binop(loop_var.clone(), "<", IrExpr::var(end_var.clone())),
                );
                let down = IrExpr::binop(
                    IrExpr::binop(IrExpr::var(step_var.clone()), "<", IrExpr::lit("0")),
                    "&&",
                    IrExpr::binop(loop_var.clone(), ">", IrExpr::var(end_var)),
                );
                out.push(IrStmt::For {
                    init: Some(Box::new(IrStmt::var_decl(
                        "int",
                        binding.to_string(),
                        Some(start_ir),
                    ))),
                    cond: Some(IrExpr::binop(up, "||", down)),
                    update: Some(IrExpr::BinOp {
                        op: "+=".to_string(),
                        left: Box::new(loop_var),
                        right: Box::new(IrExpr::var(step_var)),
                    }),
                    body: body_ir,
                });
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // try / catch / finally
    // ------------------------------------------------------------------

    fn lower_try(
        &mut self,
        try_block: &Block,
        handler: Option<&crate::ast::CatchClause>,
        finally_block: Option<&Block>,
    ) -> Vec<IrStmt> {
        self.use_helper("trycatch");
        self.need_setjmp();
        let mut out = Vec::new();

        // Jump-buffer stack growth and push (opaque setjmp scaffolding).
        out.push(IrStmt::RawC {
            text: "__btrc_try_push();".to_string(),
            helper_refs: vec!["trycatch".to_string()],
        });

        self.try_depth += 1;
        let mut try_ir = self.lower_block(try_block);
        self.try_depth -= 1;
        // Normal exit: pop the frame and forget the exception-path
        // cleanups registered inside it.
        try_ir.stmts.push(IrStmt::RawC {
            text: "__btrc_try_top--;\n__btrc_discard_cleanups(__btrc_try_top + 1);".to_string(),
            helper_refs: vec!["trycatch".to_string()],
        });

        let catch_ir = match handler {
            Some(h) => {
                self.push_locals();
                self.declare_local(&h.name);
                let mut stmts = vec![
                    IrStmt::var_decl(
                        "const char*",
                        h.name.clone(),
                        Some(IrExpr::var("__btrc_error_msg")),
                    ),
                    IrStmt::RawC {
                        text: "__btrc_pending = 0;".to_string(),
                        helper_refs: vec!["trycatch".to_string()],
                    },
                ];
                let body = self.lower_block(&h.body);
                self.pop_locals();
                stmts.extend(body.stmts);
                IrBlock::new(stmts)
            }
            // try/finally without catch: leave the exception pending; the
            // re-throw below propagates it after the finally body runs.
            None => IrBlock::default(),
        };

        out.push(IrStmt::If {
            cond: IrExpr::binop(
                IrExpr::call(
                    "setjmp",
                    vec![IrExpr::index(
                        IrExpr::var("__btrc_try_stack"),
                        IrExpr::var("__btrc_try_top"),
                    )],
                ),
                "==",
                IrExpr::lit("0"),
            ),
            then_block: try_ir,
            else_block: Some(catch_ir),
        });

        if let Some(f) = finally_block {
            let f_ir = self.lower_block(f);
            out.extend(f_ir.stmts);
            // Deterministic re-throw of a pending exception after finally.
            out.push(IrStmt::RawC {
                text: "__btrc_rethrow();".to_string(),
                helper_refs: vec!["trycatch".to_string()],
            });
        }
        out
    }

    // ------------------------------------------------------------------
    // Syntactic types in generator context
    // ------------------------------------------------------------------

    /// Resolve a syntactic type against the semantic tables (generator-side
    /// mirror of the analyzer's resolver; no diagnostics, error recovery by
    /// sentinel).
    pub fn lower_type_expr(&mut self, t: &TypeExpr) -> Ty {
        match &t.kind {
            TypeExprKind::Named { name, args } => {
                if args.is_empty() {
                    if let Some(bound) = self.subst.get(name) {
                        return bound.clone();
                    }
                }
                if let Some(p) = primitive_for(name) {
                    return Ty::Prim(p);
                }
                if let Some(resolved) = self.analysis.typedefs.get(name) {
                    return resolved.clone();
                }
                let lowered: Vec<Ty> = args.iter().map(|a| self.lower_type_expr(a)).collect();
                if self.analysis.classes.contains_key(name)
                    || crate::analyzer::builtin_generic_arity(name).is_some()
                {
                    return Ty::Class {
                        name: name.clone(),
                        args: lowered,
                    };
                }
                if self.analysis.interfaces.contains_key(name) {
                    return Ty::Iface(name.clone());
                }
                if self.analysis.enums.contains_key(name) {
                    return Ty::Enum(name.clone());
                }
                Ty::Error
            }
            TypeExprKind::Ptr { inner } => Ty::Ptr(Box::new(self.lower_type_expr(inner))),
            TypeExprKind::Nullable { inner } => Ty::Opt(Box::new(self.lower_type_expr(inner))),
            TypeExprKind::Fn { params, ret } => Ty::Fn {
                params: params.iter().map(|p| self.lower_type_expr(p)).collect(),
                ret: Box::new(self.lower_type_expr(ret)),
            },
            TypeExprKind::Tuple { items } => {
                Ty::Tuple(items.iter().map(|i| self.lower_type_expr(i)).collect())
            }
        }
    }

    /// Resolved type of an analyzed expression, with the active generic
    /// substitution applied.
    pub fn expr_ty(&self, e: &Expr) -> Ty {
        let ty = self
            .analysis
            .expr_types
            .get(&e.id)
            .cloned()
            .unwrap_or(Ty::Error);
        self.resolve_ty(&ty)
    }

    /// Coerce a value between compatible types where C needs an explicit
    /// cast: derived-to-base pointers and class-to-interface views.
    pub fn coerce(&mut self, ir: IrExpr, from: &Ty, to: &Ty) -> IrExpr {
        let from = self.resolve_ty(from);
        let to = self.resolve_ty(to);
        match (from.unwrap_opt(), to.unwrap_opt()) {
            (Ty::Class { name: f, .. }, Ty::Class { name: t, args }) if f != t => {
                let mangled = self.mangled(t, args);
                IrExpr::cast(format!("{}*", mangled), ir)
            }
            (Ty::Class { .. }, Ty::Iface(iface)) => {
                // Interface view: the address of the object's embedded
                // itab field (inherited fields keep the same offset, so
                // this works for subclasses too).
                let field = format!("__itab_{}", iface);
                IrExpr::cast(iface.clone(), IrExpr::addr(IrExpr::arrow(ir, field)))
            }
            _ => ir,
        }
    }

    // ------------------------------------------------------------------
    // Standalone expression lowering (globals, enum values)
    // ------------------------------------------------------------------

    pub fn lower_expr_standalone(&mut self, e: &Expr) -> IrExpr {
        let ir = self.lower_expr(e);
        // Constant contexts cannot hoist; drop anything that tried.
        self.pending.clear();
        ir
    }
}
