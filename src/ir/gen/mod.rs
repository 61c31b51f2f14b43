//! IR generation.
//!
//! Walks the checked AST with the semantic tables and produces an
//! `IrModule`. All lowering of source constructs to a C-shaped form happens
//! here: class layout and vtables, monomorphization, control-flow
//! rewriting, f-strings, lambda lifting, ARC, operator overloads,
//! properties, new/delete. The emitter downstream is a plain tree walk.

mod arc;
mod classes;
mod exprs;
mod fstrings;
mod generics;
mod lambdas;
mod stmts;

use std::collections::{HashMap, HashSet, VecDeque};

use crate::analyzer::{builtin_generic_arity, Analysis, FnInfo, GenericInstance, Prim, Ty};
use crate::ast::{ClassDecl, DeclKind, FunctionDecl};
use crate::ir::nodes::{IrExpr, IrField, IrFunction, IrGlobal, IrModule, IrParam, IrProto, IrStmt, IrStruct, IrTypeDecl};

const STANDARD_INCLUDES: &[&str] = &[
    "stdio.h", "stdlib.h", "string.h", "stdbool.h", "stdint.h", "stddef.h", "ctype.h",
    "math.h", "assert.h",
];

pub struct IrGenerator<'a> {
    pub analysis: &'a Analysis,
    pub module: IrModule,

    /// AST lookups by name (the semantic tables hold signatures only).
    pub class_decls: HashMap<String, &'a ClassDecl>,
    pub fn_decls: HashMap<String, &'a FunctionDecl>,

    /// Monomorphization worklist, closed under appears-in-body.
    inst_queue: VecDeque<GenericInstance>,
    inst_done: HashSet<GenericInstance>,
    inst_seen: HashSet<GenericInstance>,

    /// Active generic substitution while lowering a generic instance body.
    pub subst: HashMap<String, Ty>,
    /// Current class context: (source name, mangled C name).
    pub current_class: Option<(String, String)>,

    /// Locals in scope (innermost last); names not found here resolve as
    /// implicit `self->field` inside methods, or globals.
    pub locals: Vec<HashSet<String>>,

    /// Statements hoisted by expression lowering, drained by the enclosing
    /// statement.
    pub pending: Vec<IrStmt>,

    /// ARC bookkeeping for the function being lowered (see `arc.rs`).
    pub tracked: HashSet<String>,
    pub managed_stack: Vec<Vec<(String, Ty)>>,
    pub try_depth: u32,
    /// Return type of the function currently being lowered.
    pub current_ret: Ty,

    temp_counter: u32,
    lambda_counter: u32,

    /// One-shot receiver substitution for null-safe member calls.
    pub(super) recv_override: Option<IrExpr>,

    /// Dedup for on-demand artifacts.
    tuple_structs: HashSet<String>,
    fn_typedefs: HashMap<String, String>,
    pub split_emitted: bool,
    needs_pthread: bool,
    needs_setjmp: bool,
}

/// Generate the IR module for an analyzed program.
pub fn generate(analysis: &Analysis) -> IrModule {
    let mut class_decls = HashMap::new();
    let mut fn_decls = HashMap::new();
    for decl in &analysis.program.decls {
        match &decl.kind {
            DeclKind::Class { class } => {
                class_decls.insert(class.name.clone(), &**class);
            }
            DeclKind::Function { func } => {
                fn_decls.insert(func.name.clone(), &**func);
            }
            _ => {}
        }
    }

    let mut gen = IrGenerator {
        analysis,
        module: IrModule::default(),
        class_decls,
        fn_decls,
        inst_queue: VecDeque::new(),
        inst_done: HashSet::new(),
        inst_seen: HashSet::new(),
        subst: HashMap::new(),
        current_class: None,
        locals: Vec::new(),
        pending: Vec::new(),
        tracked: HashSet::new(),
        managed_stack: Vec::new(),
        try_depth: 0,
        current_ret: Ty::VOID,
        temp_counter: 0,
        lambda_counter: 0,
        recv_override: None,
        tuple_structs: HashSet::new(),
        fn_typedefs: HashMap::new(),
        split_emitted: false,
        needs_pthread: false,
        needs_setjmp: false,
    };
    gen.run();
    gen.module
}

impl<'a> IrGenerator<'a> {
    fn run(&mut self) {
        let analysis = self.analysis;

        self.emit_forward_decls();
        self.emit_enums();
        self.emit_plain_structs();
        self.emit_interfaces();

        // Seed monomorphization with the analyzer's instances, then drain
        // to a fixed point (lowering may discover transitive instances).
        for inst in &analysis.instances {
            self.ensure_instance(&inst.base, inst.args.clone());
        }
        self.drain_instances();

        // Non-generic classes, declaration order.
        for name in &analysis.class_order {
            if let Some(info) = analysis.classes.get(name) {
                if info.generic_params.is_empty() {
                    self.emit_class(name, None);
                }
            }
        }
        self.drain_instances();

        self.emit_globals();
        self.emit_functions();
        self.drain_instances();

        self.finish_includes();
    }

    // ------------------------------------------------------------------
    // Fresh names and bookkeeping
    // ------------------------------------------------------------------

    pub fn fresh_temp(&mut self, prefix: &str) -> String {
        self.temp_counter += 1;
        format!("{}_{}", prefix, self.temp_counter)
    }

    pub fn fresh_lambda_id(&mut self) -> u32 {
        self.lambda_counter += 1;
        self.lambda_counter
    }

    pub fn take_pending(&mut self) -> Vec<IrStmt> {
        std::mem::take(&mut self.pending)
    }

    /// Register a helper category and, transitively, its prerequisites.
    /// The optimizer later prunes this set back to what the emitted code
    /// actually reaches.
    pub fn use_helper(&mut self, category: &str) {
        if !self.module.helper_categories.insert(category.to_string()) {
            return;
        }
        if let Some(cat) = crate::ir::helpers::category(category) {
            for dep in cat.depends_on {
                self.use_helper(dep);
            }
        }
    }

    pub fn need_pthread(&mut self) {
        self.needs_pthread = true;
    }

    pub fn need_setjmp(&mut self) {
        self.needs_setjmp = true;
    }

    // ------------------------------------------------------------------
    // Locals
    // ------------------------------------------------------------------

    pub fn push_locals(&mut self) {
        self.locals.push(HashSet::new());
    }

    pub fn pop_locals(&mut self) {
        self.locals.pop();
    }

    pub fn declare_local(&mut self, name: &str) {
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(name.to_string());
        }
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.locals.iter().any(|scope| scope.contains(name))
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    /// Apply the active generic substitution.
    pub fn resolve_ty(&self, ty: &Ty) -> Ty {
        if self.subst.is_empty() {
            ty.clone()
        } else {
            ty.substitute(&self.subst)
        }
    }

    /// Mangled C name for a (possibly generic) named type.
    pub fn mangled(&mut self, name: &str, args: &[Ty]) -> String {
        if args.is_empty() {
            return name.to_string();
        }
        let resolved: Vec<Ty> = args.iter().map(|a| self.resolve_ty(a)).collect();
        let parts: Vec<String> = resolved.iter().map(|a| self.mangle_ty(a)).collect();
        let mangled = format!("{}_{}", name, parts.join("_"));
        self.ensure_instance(name, resolved);
        mangled
    }

    /// Deterministic type mangling for specialized names.
    pub fn mangle_ty(&mut self, ty: &Ty) -> String {
        let ty = self.resolve_ty(ty);
        match &ty {
            Ty::Prim(p) => match p {
                Prim::Void => "void".to_string(),
                Prim::Int => "int".to_string(),
                Prim::Long => "long".to_string(),
                Prim::Short => "short".to_string(),
                Prim::Float => "float".to_string(),
                Prim::Double => "double".to_string(),
                Prim::Bool => "bool".to_string(),
                Prim::Char => "char".to_string(),
                Prim::Str => "string".to_string(),
            },
            Ty::Class { name, args } => self.mangled(name, args),
            Ty::Iface(name) | Ty::Enum(name) => name.clone(),
            Ty::Ptr(inner) => format!("{}p", self.mangle_ty(inner)),
            Ty::Opt(inner) => self.mangle_ty(inner),
            Ty::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(|t| self.mangle_ty(t)).collect();
                format!("tup_{}", parts.join("_"))
            }
            Ty::Fn { params, ret } => {
                let mut parts: Vec<String> = params.iter().map(|t| self.mangle_ty(t)).collect();
                parts.push(self.mangle_ty(ret));
                format!("fn_{}", parts.join("_"))
            }
            Ty::Param(name) => name.clone(),
            Ty::Variant { enum_name, variant } => format!("{}_{}", enum_name, variant),
            Ty::Null | Ty::Error => "void".to_string(),
        }
    }

    /// C type text for a semantic type.
    pub fn c_type(&mut self, ty: &Ty) -> String {
        let ty = self.resolve_ty(ty);
        match &ty {
            Ty::Prim(p) => match p {
                Prim::Void => "void".to_string(),
                Prim::Int => "int".to_string(),
                Prim::Long => "long".to_string(),
                Prim::Short => "short".to_string(),
                Prim::Float => "float".to_string(),
                Prim::Double => "double".to_string(),
                Prim::Bool => "bool".to_string(),
                Prim::Char => "char".to_string(),
                Prim::Str => "char*".to_string(),
            },
            Ty::Class { name, args } => format!("{}*", self.mangled(name, args)),
            Ty::Iface(name) => name.clone(),
            Ty::Enum(name) => name.clone(),
            Ty::Ptr(inner) => format!("{}*", self.c_type(inner)),
            Ty::Opt(inner) => self.c_type(inner),
            Ty::Tuple(items) => self.ensure_tuple_struct(items),
            Ty::Fn { params, ret } => self.ensure_fn_typedef(params, ret),
            // Unsubstituted parameters are only reachable on error paths.
            Ty::Param(_) => "void*".to_string(),
            Ty::Variant { .. } | Ty::Null => "void*".to_string(),
            Ty::Error => "int".to_string(),
        }
    }

    /// C zero value for a type (used by `?.` and `??` hoisting).
    pub fn c_zero(&mut self, ty: &Ty) -> &'static str {
        let ty = self.resolve_ty(ty);
        match ty.unwrap_opt() {
            Ty::Prim(Prim::Str) => "NULL",
            Ty::Prim(Prim::Float | Prim::Double) => "0.0",
            Ty::Prim(_) | Ty::Enum(_) => "0",
            _ => "NULL",
        }
    }

    /// Struct for a tuple type, created on first use.
    pub fn ensure_tuple_struct(&mut self, items: &[Ty]) -> String {
        let parts: Vec<String> = items.iter().map(|t| self.mangle_ty(t)).collect();
        let name = format!("__btrc_tup_{}", parts.join("_"));
        if !self.tuple_structs.insert(name.clone()) {
            return name;
        }
        self.module
            .type_decls
            .push(IrTypeDecl::StructFwd(name.clone()));
        let fields = items
            .iter()
            .enumerate()
            .map(|(i, t)| IrField {
                c_type: self.c_type(t),
                name: format!("_{}", i),
            })
            .collect();
        self.module.structs.push(IrStruct {
            name: name.clone(),
            fields,
        });
        name
    }

    /// Function-pointer typedef, created on first use.
    pub fn ensure_fn_typedef(&mut self, params: &[Ty], ret: &Ty) -> String {
        let mut key_parts: Vec<String> = params.iter().map(|t| self.mangle_ty(t)).collect();
        key_parts.push(self.mangle_ty(ret));
        let key = key_parts.join("_");
        if let Some(existing) = self.fn_typedefs.get(&key) {
            return existing.clone();
        }
        let name = format!("__btrc_fn_{}", key);
        self.fn_typedefs.insert(key, name.clone());
        let ret_c = self.c_type(ret);
        let params_c: Vec<String> = params.iter().map(|t| self.c_type(t)).collect();
        self.module.type_decls.push(IrTypeDecl::FnPtr {
            name: name.clone(),
            ret: ret_c,
            params: params_c,
        });
        name
    }

    // ------------------------------------------------------------------
    // Monomorphization worklist
    // ------------------------------------------------------------------

    /// Record a generic instance; new ones go on the worklist. The struct
    /// forward declaration goes out immediately so any typedef or field
    /// discovered before the instance body is emitted can already name it.
    pub fn ensure_instance(&mut self, base: &str, args: Vec<Ty>) {
        if args.is_empty() || args.iter().any(Ty::mentions_param) {
            return;
        }
        let args: Vec<Ty> = args.iter().map(|a| self.resolve_ty(a)).collect();
        let inst = GenericInstance {
            base: base.to_string(),
            args,
        };
        if self.inst_seen.insert(inst.clone()) {
            let has_struct = builtin_generic_arity(base).is_some()
                || self.analysis.classes.contains_key(base);
            if has_struct {
                let parts: Vec<String> =
                    inst.args.iter().map(|a| self.mangle_ty(a)).collect();
                self.module.type_decls.push(IrTypeDecl::StructFwd(format!(
                    "{}_{}",
                    base,
                    parts.join("_")
                )));
            }
            self.inst_queue.push_back(inst);
        }
    }

    /// Has `base<args>` been requested anywhere? Used to decide whether
    /// `Map.keys` support is emitted.
    pub fn instance_requested(&self, base: &str, args: &[Ty]) -> bool {
        self.inst_seen.contains(&GenericInstance {
            base: base.to_string(),
            args: args.to_vec(),
        })
    }

    /// Process queued instances until the set is closed under
    /// appears-in-body.
    fn drain_instances(&mut self) {
        while let Some(inst) = self.inst_queue.pop_front() {
            if !self.inst_done.insert(inst.clone()) {
                continue;
            }
            if builtin_generic_arity(&inst.base).is_some() {
                self.emit_builtin_collection(&inst);
            } else if self.analysis.classes.contains_key(&inst.base) {
                self.emit_generic_class_instance(&inst);
            }
            // Generic interfaces carry no code; their instances only feed
            // name mangling.
        }
    }

    // ------------------------------------------------------------------
    // Module-level declarations
    // ------------------------------------------------------------------

    fn emit_forward_decls(&mut self) {
        let analysis = self.analysis;
        for name in &analysis.class_order {
            if let Some(info) = analysis.classes.get(name) {
                if info.generic_params.is_empty() {
                    self.module
                        .type_decls
                        .push(IrTypeDecl::StructFwd(name.clone()));
                }
            }
        }
        for decl in &analysis.program.decls {
            if let DeclKind::Struct { name, .. } = &decl.kind {
                self.module
                    .type_decls
                    .push(IrTypeDecl::StructFwd(name.clone()));
            }
        }
    }

    fn emit_enums(&mut self) {
        let analysis = self.analysis;
        for decl in &analysis.program.decls {
            if let DeclKind::Enum { enumeration } = &decl.kind {
                let info = match analysis.enums.get(&enumeration.name) {
                    Some(i) => i.clone(),
                    None => continue,
                };
                if info.is_tagged {
                    self.emit_tagged_enum(enumeration, &info);
                } else {
                    let variants = enumeration
                        .variants
                        .iter()
                        .map(|v| {
                            let value = v.value.as_ref().map(|e| {
                                let ir = self.lower_expr_standalone(e);
                                render_const(&ir)
                            });
                            (v.name.clone(), value)
                        })
                        .collect();
                    self.module.type_decls.push(IrTypeDecl::EnumDef {
                        name: enumeration.name.clone(),
                        variants,
                    });
                }
            }
        }
    }

    fn emit_plain_structs(&mut self) {
        let analysis = self.analysis;
        for decl in &analysis.program.decls {
            if let DeclKind::Struct { name, fields } = &decl.kind {
                let ir_fields = fields
                    .iter()
                    .map(|f| IrField {
                        c_type: self.type_expr_to_c(&f.ty),
                        name: f.name.clone(),
                    })
                    .collect();
                self.module.structs.push(IrStruct {
                    name: name.clone(),
                    fields: ir_fields,
                });
            }
        }
    }

    /// Best-effort C type for a syntactic type in positions the analyzer
    /// does not annotate (plain struct fields, extern parameters).
    pub fn type_expr_to_c(&mut self, t: &crate::ast::TypeExpr) -> String {
        use crate::ast::TypeExprKind;
        match &t.kind {
            TypeExprKind::Named { name, args } if args.is_empty() => {
                let prim = match name.as_str() {
                    "void" => Some("void"),
                    "int" | "unsigned" | "unsigned int" | "signed" | "signed int" => Some("int"),
                    "float" => Some("float"),
                    "double" => Some("double"),
                    "bool" => Some("bool"),
                    "char" => Some("char"),
                    "string" => Some("char*"),
                    "short" | "short int" => Some("short"),
                    "long" | "long int" | "long long" => Some("long"),
                    _ => None,
                };
                match prim {
                    Some(p) => p.to_string(),
                    None if self.analysis.classes.contains_key(name) => format!("{}*", name),
                    None => name.clone(),
                }
            }
            TypeExprKind::Named { name, .. } => name.clone(),
            TypeExprKind::Ptr { inner } => format!("{}*", self.type_expr_to_c(inner)),
            TypeExprKind::Nullable { inner } => self.type_expr_to_c(inner),
            TypeExprKind::Fn { .. } | TypeExprKind::Tuple { .. } => "void*".to_string(),
        }
    }

    fn emit_globals(&mut self) {
        let analysis = self.analysis;
        for decl in &analysis.program.decls {
            if let DeclKind::Global { ty, name, init } = &decl.kind {
                let c_type = match ty {
                    Some(t) => self.type_expr_to_c(t),
                    None => "int".to_string(),
                };
                let init_ir = init.as_ref().map(|e| self.lower_expr_standalone(e));
                self.module.globals.push(IrGlobal {
                    c_type,
                    name: name.clone(),
                    init: init_ir,
                    is_static: true,
                    is_const: false,
                });
            }
        }
    }

    fn emit_functions(&mut self) {
        let analysis = self.analysis;
        for decl in &analysis.program.decls {
            match &decl.kind {
                DeclKind::Function { func } => {
                    if !func.generic_params.is_empty() {
                        continue;
                    }
                    self.emit_function(func);
                }
                DeclKind::Extern { ret, name, params } => {
                    let ret_c = self.type_expr_to_c(ret);
                    let params_c = params
                        .iter()
                        .map(|p| IrParam {
                            c_type: self.type_expr_to_c(&p.ty),
                            name: p.name.clone(),
                        })
                        .collect();
                    self.module.protos.push(IrProto {
                        ret: ret_c,
                        name: name.clone(),
                        params: params_c,
                        is_static: false,
                    });
                }
                DeclKind::Typedef { name, target } => {
                    let c_type = self.type_expr_to_c(target);
                    self.module.type_decls.push(IrTypeDecl::Typedef {
                        name: name.clone(),
                        c_type,
                    });
                }
                _ => {}
            }
        }
    }

    fn emit_function(&mut self, func: &FunctionDecl) {
        let info = match self.analysis.functions.get(&func.name) {
            Some(i) => i.clone(),
            None => return,
        };
        let proto = self.function_proto(&func.name, &info);
        let body = match &func.body {
            Some(b) => b,
            None => {
                self.module.protos.push(proto);
                return;
            }
        };
        if func.name != "main" {
            self.module.protos.push(proto.clone());
        }

        self.begin_function(body);
        self.push_locals();
        for p in &info.params {
            self.declare_local(&p.name);
        }
        let ir_body = self.lower_function_block(body, &info.ret);
        self.pop_locals();
        self.module.functions.push(IrFunction {
            proto,
            body: ir_body,
        });
    }

    pub fn function_proto(&mut self, name: &str, info: &FnInfo) -> IrProto {
        let params = info
            .params
            .iter()
            .map(|p| IrParam {
                c_type: self.c_type(&p.ty),
                name: p.name.clone(),
            })
            .collect();
        IrProto {
            ret: self.c_type(&info.ret),
            name: name.to_string(),
            params,
            is_static: false,
        }
    }

    fn finish_includes(&mut self) {
        let mut includes: Vec<String> =
            STANDARD_INCLUDES.iter().map(|s| s.to_string()).collect();
        if self.needs_setjmp || self.module.helper_categories.contains("trycatch") {
            includes.push("setjmp.h".to_string());
        }
        if self.needs_pthread || self.module.helper_categories.contains("threads") {
            includes.push("pthread.h".to_string());
        }
        self.module.includes = includes;
    }
}

/// Render a constant initializer expression as plain text (enum values).
fn render_const(e: &IrExpr) -> String {
    match e {
        IrExpr::Literal(t) | IrExpr::Var(t) => t.clone(),
        IrExpr::UnaryOp { op, operand, prefix } => {
            let inner = render_const(operand);
            if *prefix {
                format!("{}{}", op, inner)
            } else {
                format!("{}{}", inner, op)
            }
        }
        IrExpr::BinOp { op, left, right } => {
            format!("({} {} {})", render_const(left), op, render_const(right))
        }
        _ => "0".to_string(),
    }
}
