//! Lambda lifting.
//!
//! Every lambda becomes a static function. Non-capturing lambdas are plain
//! function pointers; capturing lambdas pack their captures into a
//! generated env struct passed as a trailing `void*` (the shape the thread
//! spawn shim expects). Spawned lambdas release their class-typed captures
//! on exit, balancing the retain at the spawn site.

use crate::analyzer::Ty;
use crate::ast::{Expr, ExprKind, LambdaBody};
use crate::ir::nodes::{
    IrBlock, IrExpr, IrField, IrFunction, IrParam, IrProto, IrStmt, IrStruct, IrTypeDecl,
};

use super::IrGenerator;

pub struct LoweredLambda {
    pub fn_name: String,
    pub env_struct: Option<String>,
    pub captures: Vec<(String, Ty)>,
}

impl<'a> IrGenerator<'a> {
    /// Lift a lambda in value position. The expression result is the
    /// function name (a plain function pointer).
    pub fn lower_lambda(&mut self, e: &Expr) -> LoweredLambda {
        self.lift_lambda(e, false)
    }

    fn lift_lambda(&mut self, e: &Expr, for_spawn: bool) -> LoweredLambda {
        let (params, ret, body) = match &e.kind {
            ExprKind::Lambda { params, ret, body } => (params, ret.as_deref(), &**body),
            _ => {
                return LoweredLambda {
                    fn_name: "NULL".to_string(),
                    env_struct: None,
                    captures: Vec::new(),
                }
            }
        };

        let id = self.fresh_lambda_id();
        let fn_name = format!("__btrc_lambda_{}", id);
        let captures: Vec<(String, Ty)> = self
            .analysis
            .lambda_captures
            .get(&e.id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|(name, ty)| {
                let resolved = self.resolve_ty(&ty);
                (name, resolved)
            })
            .collect();
        let has_env = !captures.is_empty() || for_spawn;

        // Capture struct.
        let env_struct = if captures.is_empty() {
            None
        } else {
            let env_name = format!("{}_env", fn_name);
            self.module
                .type_decls
                .push(IrTypeDecl::StructFwd(env_name.clone()));
            let fields = captures
                .iter()
                .map(|(name, ty)| IrField {
                    c_type: self.c_type(ty),
                    name: name.clone(),
                })
                .collect();
            self.module.structs.push(IrStruct {
                name: env_name.clone(),
                fields,
            });
            Some(env_name)
        };

        // Signature.
        let mut ir_params = Vec::new();
        let mut param_tys = Vec::new();
        for p in params {
            let ty = self.lower_type_expr(&p.ty);
            ir_params.push(IrParam {
                c_type: self.c_type(&ty),
                name: p.name.clone(),
            });
            param_tys.push((p.name.clone(), ty));
        }
        if has_env {
            ir_params.push(IrParam {
                c_type: "void*".to_string(),
                name: "__btrc_env".to_string(),
            });
        }

        let ret_ty = match ret {
            Some(t) => self.lower_type_expr(t),
            None => match self.expr_ty(e) {
                Ty::Fn { ret, .. } => (*ret).clone(),
                _ => Ty::VOID,
            },
        };

        // The lambda body is a separate C function: isolate every piece of
        // per-function state.
        let saved_locals = std::mem::take(&mut self.locals);
        let saved_managed = std::mem::take(&mut self.managed_stack);
        let saved_tracked = std::mem::take(&mut self.tracked);
        let saved_try = self.try_depth;
        let saved_ret = self.current_ret.clone();
        let saved_pending = std::mem::take(&mut self.pending);
        self.try_depth = 0;

        self.push_locals();
        for (name, _) in &param_tys {
            self.declare_local(name);
        }

        let mut body_stmts = Vec::new();
        if let Some(env_name) = &env_struct {
            body_stmts.push(IrStmt::var_decl(
                format!("struct {}*", env_name),
                "__env",
                Some(IrExpr::cast(
                    format!("struct {}*", env_name),
                    IrExpr::var("__btrc_env"),
                )),
            ));
            for (name, ty) in &captures {
                let c = self.c_type(ty);
                self.declare_local(name);
                body_stmts.push(IrStmt::var_decl(
                    c,
                    name.clone(),
                    Some(IrExpr::arrow(IrExpr::var("__env"), name.clone())),
                ));
            }
        } else if has_env {
            // Spawned non-capturing lambda: the env parameter is unused.
            body_stmts.push(IrStmt::expr(IrExpr::cast(
                "void",
                IrExpr::var("__btrc_env"),
            )));
        }

        match body {
            LambdaBody::ExprBody { value } => {
                let ir = self.lower_expr(value);
                body_stmts.extend(self.take_pending());
                if ret_ty.is_void() {
                    body_stmts.push(IrStmt::expr(ir));
                } else {
                    body_stmts.push(IrStmt::Return(Some(ir)));
                }
            }
            LambdaBody::BlockBody { body } => {
                let lowered = self.lower_function_block(body, &ret_ty);
                body_stmts.extend(lowered.stmts);
            }
        }

        // Spawned lambdas balance the spawn-site retain of their
        // class-typed captures.
        if for_spawn {
            for (name, ty) in &captures {
                if ty.class_name().is_some() {
                    let release = self.release_stmts(IrExpr::var(name.clone()), ty, false);
                    body_stmts.extend(release);
                }
            }
        }

        self.pop_locals();
        self.locals = saved_locals;
        self.managed_stack = saved_managed;
        self.tracked = saved_tracked;
        self.try_depth = saved_try;
        self.current_ret = saved_ret;
        self.pending = saved_pending;

        let proto = IrProto {
            ret: self.c_type(&ret_ty),
            name: fn_name.clone(),
            params: ir_params,
            is_static: true,
        };
        self.module.protos.push(proto.clone());
        self.module.functions.push(IrFunction {
            proto,
            body: IrBlock::new(body_stmts),
        });

        LoweredLambda {
            fn_name,
            env_struct,
            captures,
        }
    }

    /// `spawn <lambda>`: lift with an env parameter, retain class-typed
    /// captures at the spawn site, and hand everything to the thread shim.
    pub fn lower_spawn(&mut self, value: &Expr) -> IrExpr {
        self.use_helper("threads");
        self.need_pthread();

        // `spawn someFunction` gets a tiny env-discarding wrapper.
        if let Some(name) = value.as_ident() {
            if !self.is_local(name) && self.analysis.functions.contains_key(name) {
                let id = self.fresh_lambda_id();
                let wrap_name = format!("__btrc_spawn_wrap_{}", id);
                let proto = IrProto {
                    ret: "void".to_string(),
                    name: wrap_name.clone(),
                    params: vec![IrParam {
                        c_type: "void*".to_string(),
                        name: "__btrc_env".to_string(),
                    }],
                    is_static: true,
                };
                self.module.protos.push(proto.clone());
                self.module.functions.push(IrFunction {
                    proto,
                    body: IrBlock::new(vec![
                        IrStmt::expr(IrExpr::cast("void", IrExpr::var("__btrc_env"))),
                        IrStmt::expr(IrExpr::call(name, vec![])),
                    ]),
                });
                return IrExpr::call_helper(
                    "__btrc_thread_spawn",
                    vec![
                        IrExpr::var(wrap_name),
                        IrExpr::null(),
                        IrExpr::lit("0"),
                    ],
                    "threads",
                );
            }
        }

        let lowered = self.lift_lambda(value, true);

        let env_arg = match &lowered.env_struct {
            Some(env_name) => {
                self.use_helper("alloc");
                let env_var = self.fresh_temp("__spawn_env");
                self.pending.push(IrStmt::var_decl(
                    format!("struct {}*", env_name),
                    env_var.clone(),
                    Some(IrExpr::cast(
                        format!("struct {}*", env_name),
                        IrExpr::call_helper(
                            "__btrc_alloc",
                            vec![IrExpr::Sizeof(format!("struct {}", env_name))],
                            "alloc",
                        ),
                    )),
                ));
                for (name, ty) in &lowered.captures {
                    self.pending.push(IrStmt::assign(
                        IrExpr::arrow(IrExpr::var(env_var.clone()), name.clone()),
                        IrExpr::var(name.clone()),
                    ));
                    // Retain shared objects for the thread's lifetime.
                    if ty.class_name().is_some() {
                        self.pending.push(IrStmt::If {
                            cond: IrExpr::binop(
                                IrExpr::var(name.clone()),
                                "!=",
                                IrExpr::null(),
                            ),
                            then_block: IrBlock::new(vec![IrStmt::expr(IrExpr::postfix(
                                "++",
                                IrExpr::arrow(IrExpr::var(name.clone()), "__rc"),
                            ))]),
                            else_block: None,
                        });
                    }
                }
                IrExpr::var(env_var)
            }
            None => IrExpr::null(),
        };

        IrExpr::call_helper(
            "__btrc_thread_spawn",
            vec![
                IrExpr::cast("void (*)(void*)", IrExpr::var(lowered.fn_name)),
                env_arg,
                IrExpr::lit("0"),
            ],
            "threads",
        )
    }
}
