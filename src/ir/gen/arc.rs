//! ARC lowering: keep/release tracking, scope-exit releases, and the
//! cycle-collector hooks.
//!
//! Reference counting is pay-for-use. A variable is *tracked* when the
//! function applies `keep`/`release` to it, binds it from a `keep` return,
//! or passes it to a `keep` parameter; only tracked variables get scope
//! releases and field-assignment retain/release pairs. A program that never
//! uses `keep` compiles to zero retain/release operations.

use std::collections::HashSet;

use crate::analyzer::Ty;
use crate::ast::{Block, Expr, ExprKind, Stmt, StmtKind};
use crate::ir::nodes::{IrBlock, IrExpr, IrStmt};

use super::IrGenerator;

impl<'a> IrGenerator<'a> {
    /// Reset per-function ARC state and pre-scan the body for tracked
    /// variables.
    pub fn begin_function(&mut self, body: &Block) {
        self.tracked.clear();
        self.managed_stack.clear();
        self.try_depth = 0;
        let mut tracked = HashSet::new();
        self.scan_block(body, &mut tracked);
        self.tracked = tracked;
    }

    fn scan_block(&self, block: &Block, tracked: &mut HashSet<String>) {
        for stmt in &block.stmts {
            self.scan_stmt(stmt, tracked);
        }
    }

    fn scan_stmt(&self, stmt: &Stmt, tracked: &mut HashSet<String>) {
        match &stmt.kind {
            StmtKind::Keep { value } | StmtKind::Release { value } => {
                if let Some(name) = value.as_ident() {
                    tracked.insert(name.to_string());
                }
                self.scan_expr(value, tracked);
            }
            StmtKind::VarDecl { name, init, .. } => {
                if let Some(init) = init {
                    if self.call_has_keep_return(init) {
                        tracked.insert(name.clone());
                    }
                    self.scan_expr(init, tracked);
                }
            }
            StmtKind::TupleDestructure { value, .. } => self.scan_expr(value, tracked),
            StmtKind::Assign { target, value, .. } => {
                self.scan_expr(target, tracked);
                self.scan_expr(value, tracked);
            }
            StmtKind::ExprStmt { value } | StmtKind::Throw { value } | StmtKind::Delete { value } => {
                self.scan_expr(value, tracked)
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.scan_expr(cond, tracked);
                self.scan_block(then_block, tracked);
                if let Some(e) = else_block {
                    self.scan_block(e, tracked);
                }
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.scan_stmt(init, tracked);
                }
                if let Some(cond) = cond {
                    self.scan_expr(cond, tracked);
                }
                if let Some(update) = update {
                    self.scan_expr(update, tracked);
                }
                self.scan_block(body, tracked);
            }
            StmtKind::ForIn { iterable, body, .. } => {
                self.scan_expr(iterable, tracked);
                self.scan_block(body, tracked);
            }
            StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
                self.scan_expr(cond, tracked);
                self.scan_block(body, tracked);
            }
            StmtKind::Switch { value, cases } => {
                self.scan_expr(value, tracked);
                for case in cases {
                    for s in &case.body {
                        self.scan_stmt(s, tracked);
                    }
                }
            }
            StmtKind::Try {
                try_block,
                handler,
                finally_block,
            } => {
                self.scan_block(try_block, tracked);
                if let Some(h) = handler {
                    self.scan_block(&h.body, tracked);
                }
                if let Some(f) = finally_block {
                    self.scan_block(f, tracked);
                }
            }
            StmtKind::Return { value } => {
                if let Some(v) = value {
                    self.scan_expr(v, tracked);
                }
            }
            StmtKind::Block { inner } => self.scan_block(inner, tracked),
            StmtKind::Break | StmtKind::Continue => {}
        }
    }

    /// Arguments bound to `keep` parameters mark the passed variable as
    /// tracked.
    fn scan_expr(&self, e: &Expr, tracked: &mut HashSet<String>) {
        match &e.kind {
            ExprKind::Call { callee, args } => {
                let keeps = self.callee_keep_flags(callee);
                for (i, arg) in args.iter().enumerate() {
                    if keeps.get(i).copied().unwrap_or(false) {
                        if let Some(name) = arg.as_ident() {
                            tracked.insert(name.to_string());
                        }
                    }
                    self.scan_expr(arg, tracked);
                }
                self.scan_expr(callee, tracked);
            }
            ExprKind::Member { base, .. } => self.scan_expr(base, tracked),
            ExprKind::Index { base, index } => {
                self.scan_expr(base, tracked);
                self.scan_expr(index, tracked);
            }
            ExprKind::Unary { operand, .. } => self.scan_expr(operand, tracked),
            ExprKind::Binary { left, right, .. } | ExprKind::Coalesce { left, right } => {
                self.scan_expr(left, tracked);
                self.scan_expr(right, tracked);
            }
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.scan_expr(cond, tracked);
                self.scan_expr(then_expr, tracked);
                self.scan_expr(else_expr, tracked);
            }
            ExprKind::Cast { value, .. } | ExprKind::Spawn { value } => {
                self.scan_expr(value, tracked)
            }
            ExprKind::New { args, .. } => {
                for a in args {
                    self.scan_expr(a, tracked);
                }
            }
            ExprKind::TupleLit { items } | ExprKind::ListLit { items } => {
                for i in items {
                    self.scan_expr(i, tracked);
                }
            }
            ExprKind::MapLit { entries } => {
                for entry in entries {
                    self.scan_expr(&entry.key, tracked);
                    self.scan_expr(&entry.value, tracked);
                }
            }
            ExprKind::FString { parts } => {
                for part in parts {
                    if let crate::ast::FStringPart::Chunk { value, .. } = part {
                        self.scan_expr(value, tracked);
                    }
                }
            }
            _ => {}
        }
    }

    /// `keep` flags of the callee's parameters, best-effort.
    fn callee_keep_flags(&self, callee: &Expr) -> Vec<bool> {
        if let Some(name) = callee.as_ident() {
            if let Some(info) = self.analysis.functions.get(name) {
                return info.params.iter().map(|p| p.keep).collect();
            }
        }
        if let ExprKind::Member { base, field, .. } = &callee.kind {
            let class = self
                .analysis
                .expr_types
                .get(&base.id)
                .and_then(|t| t.class_name().map(str::to_string))
                .or_else(|| base.as_ident().map(str::to_string));
            if let Some(class) = class {
                if let Some(m) = self.analysis.find_method(&class, field) {
                    return m.params.iter().map(|p| p.keep).collect();
                }
            }
        }
        Vec::new()
    }

    /// Does this initializer call something with a `keep` return?
    fn call_has_keep_return(&self, e: &Expr) -> bool {
        if let ExprKind::Call { callee, .. } = &e.kind {
            if let Some(name) = callee.as_ident() {
                return self
                    .analysis
                    .functions
                    .get(name)
                    .map(|f| f.keep_return)
                    .unwrap_or(false);
            }
            if let ExprKind::Member { base, field, .. } = &callee.kind {
                let class = self
                    .analysis
                    .expr_types
                    .get(&base.id)
                    .and_then(|t| t.class_name().map(str::to_string));
                if let Some(class) = class {
                    return self
                        .analysis
                        .find_method(&class, field)
                        .map(|m| m.keep_return)
                        .unwrap_or(false);
                }
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // Release emission
    // ------------------------------------------------------------------

    pub fn destroy_fn_name(&mut self, ty: &Ty) -> String {
        let ty = self.resolve_ty(ty);
        match ty.unwrap_opt() {
            Ty::Class { name, args } => format!("{}_destroy", self.mangled(name, args)),
            _ => "free".to_string(),
        }
    }

    /// `if (v != NULL && --v->__rc <= 0) destroy(v);` with an optional
    /// trailing `v = NULL;`.
    pub fn release_stmts(&mut self, var: IrExpr, ty: &Ty, null_after: bool) -> Vec<IrStmt> {
        let destroy = self.destroy_fn_name(ty);
        let dec = IrExpr::binop(
            IrExpr::unary("--", IrExpr::arrow(var.clone(), "__rc")),
            "<=",
            IrExpr::lit("0"),
        );
        let mut stmts = vec![IrStmt::If {
            cond: IrExpr::binop(var.clone(), "!=", IrExpr::null()),
            then_block: IrBlock::new(vec![IrStmt::If {
                cond: dec,
                then_block: IrBlock::new(vec![IrStmt::expr(IrExpr::call(
                    destroy,
                    vec![var.clone()],
                ))]),
                else_block: None,
            }]),
            else_block: None,
        }];
        if null_after {
            stmts.push(IrStmt::assign(var, IrExpr::null()));
        }
        stmts
    }

    /// Scope-exit release for managed variables, reverse declaration
    /// order. Scopes that hold cycle-capable instances go through the
    /// suspect/collect path instead of plain destruction.
    pub fn scope_release(&mut self, managed: Vec<(String, Ty)>) -> Vec<IrStmt> {
        if managed.is_empty() {
            return Vec::new();
        }
        let has_cyclable = managed.iter().any(|(_, ty)| self.ty_is_cyclable(ty));
        if has_cyclable {
            return self.scope_release_phased(managed);
        }
        let mut stmts = Vec::new();
        for (name, ty) in managed.into_iter().rev() {
            stmts.extend(self.release_stmts(IrExpr::var(name), &ty, false));
        }
        stmts
    }

    fn ty_is_cyclable(&self, ty: &Ty) -> bool {
        // Generic instances carry no visitor; the collector covers plain
        // classes only.
        if !ty.class_args().is_empty() {
            return false;
        }
        ty.class_name()
            .and_then(|n| self.analysis.classes.get(n))
            .map(|c| c.is_cyclable)
            .unwrap_or(false)
    }

    /// Phased release for cyclable scopes: decrement everything, destroy
    /// what fell to zero (with cascade tracking), suspect the survivors,
    /// then run the trial-deletion collector.
    fn scope_release_phased(&mut self, managed: Vec<(String, Ty)>) -> Vec<IrStmt> {
        self.use_helper("arc.cycle");
        let mut stmts = Vec::new();
        stmts.push(IrStmt::assign(IrExpr::var("__btrc_tracking"), IrExpr::lit("1")));
        stmts.push(IrStmt::assign(
            IrExpr::var("__btrc_destroyed_count"),
            IrExpr::lit("0"),
        ));

        // Phase 1: decrement every managed variable.
        for (name, _) in managed.iter().rev() {
            stmts.push(IrStmt::If {
                cond: IrExpr::binop(IrExpr::var(name.clone()), "!=", IrExpr::null()),
                then_block: IrBlock::new(vec![IrStmt::expr(IrExpr::unary(
                    "--",
                    IrExpr::arrow(IrExpr::var(name.clone()), "__rc"),
                ))]),
                else_block: None,
            });
        }

        // Phase 2: destroy the ones at zero, skipping cascade-freed
        // objects.
        for (name, ty) in managed.iter().rev() {
            let destroy = self.destroy_fn_name(ty);
            let var = IrExpr::var(name.clone());
            stmts.push(IrStmt::If {
                cond: IrExpr::binop(var.clone(), "!=", IrExpr::null()),
                then_block: IrBlock::new(vec![IrStmt::If {
                    cond: IrExpr::binop(
                        IrExpr::call_helper(
                            "__btrc_is_destroyed",
                            vec![var.clone()],
                            "arc.cycle",
                        ),
                        "==",
                        IrExpr::lit("0"),
                    ),
                    then_block: IrBlock::new(vec![IrStmt::If {
                        cond: IrExpr::binop(
                            IrExpr::arrow(var.clone(), "__rc"),
                            "<=",
                            IrExpr::lit("0"),
                        ),
                        then_block: IrBlock::new(vec![
                            IrStmt::expr(IrExpr::call(destroy, vec![var.clone()])),
                            IrStmt::assign(var.clone(), IrExpr::null()),
                        ]),
                        else_block: None,
                    }]),
                    else_block: None,
                }]),
                else_block: None,
            });
        }

        // Phase 3: suspect surviving cyclable objects.
        for (name, ty) in managed.iter().rev() {
            if !self.ty_is_cyclable(ty) {
                continue;
            }
            let class_c = match ty.class_name() {
                Some(n) => {
                    let args = ty.class_args().to_vec();
                    self.mangled(n, &args)
                }
                None => continue,
            };
            let destroy = self.destroy_fn_name(ty);
            let var = IrExpr::var(name.clone());
            stmts.push(IrStmt::If {
                cond: IrExpr::binop(var.clone(), "!=", IrExpr::null()),
                then_block: IrBlock::new(vec![IrStmt::If {
                    cond: IrExpr::binop(
                        IrExpr::arrow(var.clone(), "__rc"),
                        ">",
                        IrExpr::lit("0"),
                    ),
                    then_block: IrBlock::new(vec![IrStmt::expr(IrExpr::call_helper(
                        "__btrc_suspect",
                        vec![
                            var.clone(),
                            IrExpr::cast(
                                "__btrc_class_visit_fn",
                                IrExpr::var(format!("{}_visit", class_c)),
                            ),
                            IrExpr::cast("__btrc_destroy_fn", IrExpr::var(destroy)),
                        ],
                        "arc.cycle",
                    ))]),
                    else_block: None,
                }]),
                else_block: None,
            });
        }

        // Phase 4: collect, then stop cascade tracking.
        stmts.push(IrStmt::If {
            cond: IrExpr::binop(
                IrExpr::var("__btrc_suspect_count"),
                ">",
                IrExpr::lit("0"),
            ),
            then_block: IrBlock::new(vec![IrStmt::expr(IrExpr::call_helper(
                "__btrc_collect_cycles",
                vec![],
                "arc.cycle",
            ))]),
            else_block: None,
        });
        stmts.push(IrStmt::assign(IrExpr::var("__btrc_tracking"), IrExpr::lit("0")));
        stmts
    }

    /// Release every managed variable in every active scope before a
    /// return, except the one being returned (ownership transfers to the
    /// caller).
    pub fn return_release(&mut self, returned: Option<&str>) -> Vec<IrStmt> {
        let all: Vec<(String, Ty)> = self
            .managed_stack
            .iter()
            .flat_map(|scope| scope.iter().cloned())
            .collect();
        let mut stmts = Vec::new();
        for (name, ty) in all.into_iter().rev() {
            if Some(name.as_str()) == returned {
                continue;
            }
            stmts.extend(self.release_stmts(IrExpr::var(name), &ty, false));
        }
        stmts
    }

    /// Register a tracked class-typed local in the innermost managed
    /// scope. Inside `try`, returns the exception-path cleanup
    /// registration to place right after the declaration.
    pub fn register_managed(&mut self, name: &str, ty: &Ty) -> Vec<IrStmt> {
        if !self.tracked.contains(name) || ty.class_name().is_none() {
            return Vec::new();
        }
        if let Some(scope) = self.managed_stack.last_mut() {
            scope.push((name.to_string(), ty.clone()));
        }
        if self.try_depth > 0 {
            let destroy = self.destroy_fn_name(ty);
            self.use_helper("trycatch");
            return vec![IrStmt::expr(IrExpr::call_helper(
                "__btrc_register_cleanup",
                vec![
                    IrExpr::cast("void**", IrExpr::addr(IrExpr::var(name.to_string()))),
                    IrExpr::cast("__btrc_cleanup_fn", IrExpr::var(destroy)),
                ],
                "trycatch",
            ))];
        }
        Vec::new()
    }
}
