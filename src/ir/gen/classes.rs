//! Class lowering.
//!
//! Each class becomes a struct: `__rc` first, then the vtable pointer, one
//! itab pointer per interface along the chain, inherited fields in
//! declaration order, own fields (auto-property backing fields included).
//! Methods become free functions taking an explicit `self`; constructors
//! split into `_init` (placement) and `_new` (allocate + init); the
//! destructor becomes `_destroy`. Vtables inherit slot positions and
//! overwrite overridden entries; interfaces dispatch COM-style through
//! per-class itabs whose thunks recover `self` with `offsetof`.

use crate::analyzer::{ClassInfo, EnumInfo, MethodInfo, Ty};
use crate::ast::{EnumDecl, Member, MethodDecl};
use crate::ir::nodes::{
    IrBlock, IrExpr, IrField, IrFunction, IrGlobal, IrParam, IrProto, IrStmt, IrStruct,
    IrTypeDecl,
};

use super::exprs::method_core;
use super::IrGenerator;

impl<'a> IrGenerator<'a> {
    // ------------------------------------------------------------------
    // Interfaces
    // ------------------------------------------------------------------

    /// Emit the itab struct and reference typedef for every non-generic
    /// interface. An interface value is a pointer to an object's embedded
    /// itab field (`I_itab**`), so the view costs one indirection and no
    /// allocation.
    pub fn emit_interfaces(&mut self) {
        let analysis = self.analysis;
        for decl in &analysis.program.decls {
            let iface = match &decl.kind {
                crate::ast::DeclKind::Interface { iface } => &**iface,
                _ => continue,
            };
            let (name, info) = match analysis.interfaces.get(&iface.name) {
                Some(info) => (&iface.name, info),
                None => continue,
            };
            if !info.generic_params.is_empty() {
                continue;
            }
            let itab = format!("{}_itab", name);
            self.module
                .type_decls
                .push(IrTypeDecl::StructFwd(itab.clone()));
            self.module.type_decls.push(IrTypeDecl::Typedef {
                name: name.clone(),
                c_type: format!("{}**", itab),
            });

            let mut fields = Vec::new();
            for m in &info.methods {
                let ret = self.c_type(&m.ret);
                let mut params = vec![format!("{} self", name)];
                for p in &m.params {
                    params.push(format!("{} {}", self.c_type(&p.ty), p.name));
                }
                fields.push(IrField {
                    c_type: ret,
                    name: format!("(*{})({})", m.name, params.join(", ")),
                });
            }
            self.module.structs.push(IrStruct { name: itab, fields });
        }
    }

    // ------------------------------------------------------------------
    // Classes
    // ------------------------------------------------------------------

    /// Lower one class (or one generic instance when a mangled name and a
    /// substitution are active).
    pub fn emit_class(&mut self, name: &str, mangled_override: Option<String>) {
        let decl = match self.class_decls.get(name) {
            Some(d) => *d,
            None => return,
        };
        let info = match self.analysis.classes.get(name) {
            Some(i) => i.clone(),
            None => return,
        };
        let mangled = mangled_override.unwrap_or_else(|| name.to_string());
        let is_generic = !info.generic_params.is_empty();
        self.current_class = Some((name.to_string(), mangled.clone()));

        let in_hierarchy = !is_generic && self.analysis.in_hierarchy(name);
        // Interface views cover plain classes; generic instances would need
        // per-instance thunks with no matching interface type.
        let ifaces = if is_generic {
            Vec::new()
        } else {
            self.interfaces_along_chain(name)
        };

        self.emit_class_struct(name, &mangled, &info, in_hierarchy, &ifaces);
        if in_hierarchy {
            self.emit_vtable(name, &info);
        }
        self.emit_ctor(name, &mangled, decl, &info, in_hierarchy, &ifaces);
        self.emit_dtor(&mangled, decl, &info);
        if info.is_cyclable && !is_generic {
            self.emit_visitor(name);
        }
        for iface in &ifaces {
            self.emit_itab(name, &mangled, iface);
        }

        // Own methods.
        for member in &decl.members {
            match member {
                Member::Method { method } => {
                    if method.body.is_none() {
                        continue;
                    }
                    let minfo = match info.methods.iter().find(|m| m.name == method.name) {
                        Some(m) => m.clone(),
                        None => continue,
                    };
                    self.emit_method(&mangled, method, &minfo);
                }
                Member::Property { prop } => {
                    self.emit_property(&mangled, prop);
                }
                _ => {}
            }
        }

        self.current_class = None;
    }

    fn interfaces_along_chain(&self, class: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = Some(class.to_string());
        while let Some(cname) = current {
            match self.analysis.classes.get(&cname) {
                Some(info) => {
                    chain.push(info.clone());
                    current = info.parent.clone();
                }
                None => break,
            }
        }
        let mut out: Vec<String> = Vec::new();
        for info in chain.iter().rev() {
            for iface in &info.interfaces {
                if !out.contains(iface)
                    && self
                        .analysis
                        .interfaces
                        .get(iface)
                        .map(|i| i.generic_params.is_empty())
                        .unwrap_or(false)
                {
                    out.push(iface.clone());
                }
            }
        }
        out
    }

    fn emit_class_struct(
        &mut self,
        name: &str,
        mangled: &str,
        info: &ClassInfo,
        in_hierarchy: bool,
        ifaces: &[String],
    ) {
        let mut fields = Vec::new();
        fields.push(IrField {
            c_type: "int".to_string(),
            name: "__rc".to_string(),
        });
        if in_hierarchy {
            // The vtable pointer sits at a fixed offset so base-typed
            // access reads a prefix-compatible field.
            let vt_root = self.vtable_root(name);
            fields.push(IrField {
                c_type: format!("const {}_VT*", vt_root),
                name: "__vtable".to_string(),
            });
        }
        for iface in ifaces {
            fields.push(IrField {
                c_type: format!("{}_itab*", iface),
                name: format!("__itab_{}", iface),
            });
        }
        for f in self.analysis.all_fields(name) {
            let ty = f.ty.clone();
            let fname = f.name.clone();
            fields.push(IrField {
                c_type: self.c_type(&ty),
                name: fname,
            });
        }
        self.module.structs.push(IrStruct {
            name: mangled.to_string(),
            fields,
        });
    }

    /// The class whose `_VT` type the `__vtable` field uses: every class
    /// stores its own vtable type, but layout-compatibility along the
    /// chain comes from slots being append-only.
    fn vtable_root(&self, class: &str) -> String {
        class.to_string()
    }

    // ------------------------------------------------------------------
    // Vtables
    // ------------------------------------------------------------------

    fn emit_vtable(&mut self, class: &str, info: &ClassInfo) {
        let vt_name = format!("{}_VT", class);
        self.module
            .type_decls
            .push(IrTypeDecl::StructFwd(vt_name.clone()));

        let mut fields = Vec::new();
        for slot in &info.vtable {
            let sig = match self.analysis.find_method(&slot.introduced_in, &slot.name) {
                Some(m) => m.clone(),
                None => continue,
            };
            let ret = self.c_type(&sig.ret);
            let mut params = vec![format!("{}* self", slot.introduced_in)];
            for p in &sig.params {
                params.push(format!("{} {}", self.c_type(&p.ty), p.name));
            }
            fields.push(IrField {
                c_type: ret,
                name: format!("(*{})({})", method_core(&slot.name), params.join(", ")),
            });
        }
        self.module.structs.push(IrStruct {
            name: vt_name.clone(),
            fields,
        });

        // Abstract classes have no instances and no vtable value.
        if info.is_abstract {
            return;
        }

        let mut items = Vec::new();
        for slot in &info.vtable {
            let impl_method = match self.analysis.find_method(class, &slot.name) {
                Some(m) => m.clone(),
                None => continue,
            };
            let intro_sig = match self.analysis.find_method(&slot.introduced_in, &slot.name) {
                Some(m) => m.clone(),
                None => continue,
            };
            let impl_fn = format!("{}_{}", impl_method.defined_in, method_core(&slot.name));
            let value = if impl_method.defined_in == slot.introduced_in {
                IrExpr::var(impl_fn)
            } else {
                // Overrides take their own self type; the slot keeps the
                // introducing signature.
                let ret = self.c_type(&intro_sig.ret);
                let mut ptypes = vec![format!("{}*", slot.introduced_in)];
                for p in &intro_sig.params {
                    ptypes.push(self.c_type(&p.ty));
                }
                IrExpr::cast(
                    format!("{} (*)({})", ret, ptypes.join(", ")),
                    IrExpr::var(impl_fn),
                )
            };
            items.push((Some(method_core(&slot.name).to_string()), value));
        }
        self.module.globals.push(IrGlobal {
            c_type: format!("const {}", vt_name),
            name: format!("{}_vtable", class),
            init: Some(IrExpr::Compound {
                c_type: String::new(),
                items,
            }),
            is_static: true,
            is_const: false,
        });
    }

    // ------------------------------------------------------------------
    // itabs
    // ------------------------------------------------------------------

    fn emit_itab(&mut self, class: &str, mangled: &str, iface: &str) {
        let iface_info = match self.analysis.interfaces.get(iface) {
            Some(i) => i.clone(),
            None => return,
        };
        if self
            .analysis
            .classes
            .get(class)
            .map(|c| c.is_abstract)
            .unwrap_or(false)
        {
            return;
        }

        let mut items = Vec::new();
        for m in &iface_info.methods {
            let thunk_name = format!("{}_as_{}_{}", mangled, iface, m.name);
            let impl_method = match self.analysis.find_method(class, &m.name) {
                Some(found) => found.clone(),
                None => continue,
            };
            let mut params = vec![IrParam {
                c_type: iface.to_string(),
                name: "self".to_string(),
            }];
            for p in &m.params {
                params.push(IrParam {
                    c_type: self.c_type(&p.ty),
                    name: p.name.clone(),
                });
            }

            // Recover the object pointer from the embedded itab field.
            let recover = IrExpr::cast(
                format!("{}*", mangled),
                IrExpr::binop(
                    IrExpr::cast("char*", IrExpr::var("self")),
                    "-",
                    IrExpr::call(
                        "offsetof",
                        vec![
                            IrExpr::lit(mangled.to_string()),
                            IrExpr::lit(format!("__itab_{}", iface)),
                        ],
                    ),
                ),
            );
            let mut body = vec![IrStmt::var_decl(
                format!("{}*", mangled),
                "obj",
                Some(recover),
            )];
            let impl_fn = format!("{}_{}", impl_method.defined_in, method_core(&m.name));
            let self_arg = if impl_method.defined_in == mangled {
                IrExpr::var("obj")
            } else {
                IrExpr::cast(format!("{}*", impl_method.defined_in), IrExpr::var("obj"))
            };
            let mut call_args = vec![self_arg];
            for p in &m.params {
                call_args.push(IrExpr::var(p.name.clone()));
            }
            let call = IrExpr::call(impl_fn, call_args);
            if m.ret.is_void() {
                body.push(IrStmt::expr(call));
            } else {
                body.push(IrStmt::Return(Some(call)));
            }

            let proto = IrProto {
                ret: self.c_type(&m.ret),
                name: thunk_name.clone(),
                params,
                is_static: true,
            };
            self.module.protos.push(proto.clone());
            self.module.functions.push(IrFunction {
                proto,
                body: IrBlock::new(body),
            });
            items.push((Some(m.name.clone()), IrExpr::var(thunk_name)));
        }

        self.module.globals.push(IrGlobal {
            c_type: format!("{}_itab", iface),
            name: format!("{}_itab_{}", mangled, iface),
            init: Some(IrExpr::Compound {
                c_type: String::new(),
                items,
            }),
            is_static: true,
            is_const: false,
        });
    }

    // ------------------------------------------------------------------
    // Constructors / destructor / visitor
    // ------------------------------------------------------------------

    fn emit_ctor(
        &mut self,
        name: &str,
        mangled: &str,
        decl: &crate::ast::ClassDecl,
        info: &ClassInfo,
        in_hierarchy: bool,
        ifaces: &[String],
    ) {
        let ctor_decl = decl.members.iter().find_map(|m| match m {
            Member::Ctor { ctor } => Some(&**ctor),
            _ => None,
        });

        let mut init_params = vec![IrParam {
            c_type: format!("{}*", mangled),
            name: "self".to_string(),
        }];
        for p in &info.ctor_params {
            init_params.push(IrParam {
                c_type: self.c_type(&p.ty),
                name: p.name.clone(),
            });
        }

        let mut body = Vec::new();
        body.push(IrStmt::assign(
            IrExpr::arrow(IrExpr::var("self"), "__rc"),
            IrExpr::lit("1"),
        ));
        if in_hierarchy && !info.is_abstract {
            body.push(IrStmt::assign(
                IrExpr::arrow(IrExpr::var("self"), "__vtable"),
                IrExpr::addr(IrExpr::var(format!("{}_vtable", name))),
            ));
        }
        if !info.is_abstract {
            for iface in ifaces {
                body.push(IrStmt::assign(
                    IrExpr::arrow(IrExpr::var("self"), format!("__itab_{}", iface)),
                    IrExpr::addr(IrExpr::var(format!("{}_itab_{}", mangled, iface))),
                ));
            }
        }

        // Field default initializers along the chain, root first.
        let mut chain: Vec<&crate::ast::ClassDecl> = Vec::new();
        let mut current = Some(name.to_string());
        while let Some(cname) = current {
            if let Some(d) = self.class_decls.get(cname.as_str()).copied() {
                chain.push(d);
            }
            current = self
                .analysis
                .classes
                .get(&cname)
                .and_then(|c| c.parent.clone());
        }
        self.push_locals();
        for class_decl in chain.iter().rev() {
            for member in &class_decl.members {
                if let Member::Field { field } = member {
                    if let Some(init) = &field.init {
                        let init_ir = self.lower_expr(init);
                        body.extend(self.take_pending());
                        body.push(IrStmt::assign(
                            IrExpr::arrow(IrExpr::var("self"), field.name.clone()),
                            init_ir,
                        ));
                    }
                }
            }
        }
        self.pop_locals();

        // User constructor body.
        if let Some(ctor) = ctor_decl {
            if let Some(user_body) = &ctor.body {
                self.begin_function(user_body);
                self.push_locals();
                self.declare_local("self");
                for p in &info.ctor_params {
                    self.declare_local(&p.name);
                }
                let lowered = self.lower_function_block(user_body, &Ty::VOID);
                self.pop_locals();
                body.extend(lowered.stmts);
            }
        }

        let init_proto = IrProto {
            ret: "void".to_string(),
            name: format!("{}_init", mangled),
            params: init_params,
            is_static: false,
        };
        self.module.protos.push(init_proto.clone());
        self.module.functions.push(IrFunction {
            proto: init_proto,
            body: IrBlock::new(body),
        });

        // `_new`: allocate zeroed, then place.
        if info.is_abstract {
            return;
        }
        self.use_helper("alloc");
        let mut new_params = Vec::new();
        for p in &info.ctor_params {
            new_params.push(IrParam {
                c_type: self.c_type(&p.ty),
                name: p.name.clone(),
            });
        }
        let mut new_body = vec![IrStmt::var_decl(
            format!("{}*", mangled),
            "self",
            Some(IrExpr::cast(
                format!("{}*", mangled),
                IrExpr::call_helper(
                    "__btrc_alloc",
                    vec![IrExpr::Sizeof(mangled.to_string())],
                    "alloc",
                ),
            )),
        )];
        let mut init_args = vec![IrExpr::var("self")];
        for p in &info.ctor_params {
            init_args.push(IrExpr::var(p.name.clone()));
        }
        new_body.push(IrStmt::expr(IrExpr::call(
            format!("{}_init", mangled),
            init_args,
        )));
        new_body.push(IrStmt::Return(Some(IrExpr::var("self"))));

        let new_proto = IrProto {
            ret: format!("{}*", mangled),
            name: format!("{}_new", mangled),
            params: new_params,
            is_static: false,
        };
        self.module.protos.push(new_proto.clone());
        self.module.functions.push(IrFunction {
            proto: new_proto,
            body: IrBlock::new(new_body),
        });
    }

    fn emit_dtor(&mut self, mangled: &str, decl: &crate::ast::ClassDecl, info: &ClassInfo) {
        let dtor_decl = decl.members.iter().find_map(|m| match m {
            Member::Dtor { dtor } => Some(&**dtor),
            _ => None,
        });

        let mut body = vec![IrStmt::If {
            cond: IrExpr::binop(IrExpr::var("self"), "==", IrExpr::null()),
            then_block: IrBlock::new(vec![IrStmt::Return(None)]),
            else_block: None,
        }];
        if info.is_cyclable {
            self.use_helper("arc.cycle");
            body.push(IrStmt::expr(IrExpr::call_helper(
                "__btrc_note_destroyed",
                vec![IrExpr::var("self")],
                "arc.cycle",
            )));
        }
        if let Some(dtor) = dtor_decl {
            if let Some(user_body) = &dtor.body {
                self.begin_function(user_body);
                self.push_locals();
                self.declare_local("self");
                let lowered = self.lower_function_block(user_body, &Ty::VOID);
                self.pop_locals();
                body.extend(lowered.stmts);
            }
        }
        body.push(IrStmt::expr(IrExpr::call("free", vec![IrExpr::var("self")])));

        let proto = IrProto {
            ret: "void".to_string(),
            name: format!("{}_destroy", mangled),
            params: vec![IrParam {
                c_type: format!("{}*", mangled),
                name: "self".to_string(),
            }],
            is_static: false,
        };
        self.module.protos.push(proto.clone());
        self.module.functions.push(IrFunction {
            proto,
            body: IrBlock::new(body),
        });
    }

    /// `Cls_visit(self, fn)` feeds each cyclable field edge to the cycle
    /// collector. The callback gets field addresses so it can trial-adjust
    /// counts or break edges.
    fn emit_visitor(&mut self, name: &str) {
        self.use_helper("arc.cycle");
        let mut body = Vec::new();
        for f in self.analysis.all_fields(name) {
            let field_cyclable = f
                .ty
                .class_name()
                .and_then(|n| self.analysis.classes.get(n))
                .map(|c| c.is_cyclable)
                .unwrap_or(false);
            if !field_cyclable {
                continue;
            }
            let access = IrExpr::arrow(IrExpr::var("self"), f.name.clone());
            body.push(IrStmt::If {
                cond: IrExpr::binop(access.clone(), "!=", IrExpr::null()),
                then_block: IrBlock::new(vec![IrStmt::expr(IrExpr::Call {
                    callee: Box::new(IrExpr::var("fn")),
                    args: vec![IrExpr::cast("void**", IrExpr::addr(access))],
                    helper_ref: None,
                })]),
                else_block: None,
            });
        }
        let proto = IrProto {
            ret: "void".to_string(),
            name: format!("{}_visit", name),
            params: vec![
                IrParam {
                    c_type: format!("{}*", name),
                    name: "self".to_string(),
                },
                IrParam {
                    c_type: "__btrc_visit_fn".to_string(),
                    name: "fn".to_string(),
                },
            ],
            is_static: true,
        };
        self.module.protos.push(proto.clone());
        self.module.functions.push(IrFunction {
            proto,
            body: IrBlock::new(body),
        });
    }

    // ------------------------------------------------------------------
    // Methods and properties
    // ------------------------------------------------------------------

    fn emit_method(&mut self, mangled: &str, decl: &MethodDecl, info: &MethodInfo) {
        let body = match &decl.body {
            Some(b) => b,
            None => return,
        };
        let fn_name = format!("{}_{}", mangled, method_core(&decl.name));

        let mut params = Vec::new();
        if !info.is_static {
            params.push(IrParam {
                c_type: format!("{}*", mangled),
                name: "self".to_string(),
            });
        }
        for p in &info.params {
            params.push(IrParam {
                c_type: self.c_type(&p.ty),
                name: p.name.clone(),
            });
        }

        self.begin_function(body);
        self.push_locals();
        self.declare_local("self");
        for p in &info.params {
            self.declare_local(&p.name);
        }
        let ret_ty = self.resolve_ty(&info.ret);
        let lowered = self.lower_function_block(body, &ret_ty);
        self.pop_locals();

        let proto = IrProto {
            ret: self.c_type(&ret_ty),
            name: fn_name,
            params,
            is_static: false,
        };
        self.module.protos.push(proto.clone());
        self.module.functions.push(IrFunction {
            proto,
            body: lowered,
        });
    }

    fn emit_property(&mut self, mangled: &str, prop: &crate::ast::PropertyDecl) {
        let ty = self.lower_type_expr(&prop.ty);
        let c = self.c_type(&ty);
        let self_param = IrParam {
            c_type: format!("{}*", mangled),
            name: "self".to_string(),
        };

        // Getter.
        let get_body = if prop.auto {
            IrBlock::new(vec![IrStmt::Return(Some(IrExpr::arrow(
                IrExpr::var("self"),
                format!("_prop_{}", prop.name),
            )))])
        } else if let Some(getter) = &prop.getter {
            self.begin_function(getter);
            self.push_locals();
            self.declare_local("self");
            let lowered = self.lower_function_block(getter, &ty);
            self.pop_locals();
            lowered
        } else {
            IrBlock::default()
        };
        let get_proto = IrProto {
            ret: c.clone(),
            name: format!("{}_get_{}", mangled, prop.name),
            params: vec![self_param.clone()],
            is_static: false,
        };
        self.module.protos.push(get_proto.clone());
        self.module.functions.push(IrFunction {
            proto: get_proto,
            body: get_body,
        });

        // Setter.
        let needs_setter = prop.auto || prop.setter.is_some();
        if !needs_setter {
            return;
        }
        let set_body = if prop.auto {
            IrBlock::new(vec![IrStmt::assign(
                IrExpr::arrow(IrExpr::var("self"), format!("_prop_{}", prop.name)),
                IrExpr::var(prop.setter_param.clone()),
            )])
        } else if let Some(setter) = &prop.setter {
            self.begin_function(setter);
            self.push_locals();
            self.declare_local("self");
            self.declare_local(&prop.setter_param);
            let lowered = self.lower_function_block(setter, &Ty::VOID);
            self.pop_locals();
            lowered
        } else {
            IrBlock::default()
        };
        let set_proto = IrProto {
            ret: "void".to_string(),
            name: format!("{}_set_{}", mangled, prop.name),
            params: vec![
                self_param,
                IrParam {
                    c_type: c,
                    name: prop.setter_param.clone(),
                },
            ],
            is_static: false,
        };
        self.module.protos.push(set_proto.clone());
        self.module.functions.push(IrFunction {
            proto: set_proto,
            body: set_body,
        });
    }

    // ------------------------------------------------------------------
    // Tagged-union enums
    // ------------------------------------------------------------------

    /// `enum Shape { Circle(double r), Dot }` becomes a tag enum, a struct
    /// with a payload union, and one constructor function per variant.
    pub fn emit_tagged_enum(&mut self, decl: &EnumDecl, info: &EnumInfo) {
        let name = &decl.name;

        // Tag constants.
        let tag_variants = info
            .variants
            .iter()
            .map(|v| (format!("{}_{}_TAG", name, v.name), None))
            .collect();
        self.module.type_decls.push(IrTypeDecl::EnumDef {
            name: format!("{}_Tag", name),
            variants: tag_variants,
        });
        self.module
            .type_decls
            .push(IrTypeDecl::StructFwd(name.clone()));

        // Payload union, one member struct per payload variant.
        let mut union_body = String::from("union {\n");
        let mut has_payload = false;
        for v in &info.variants {
            if v.fields.is_empty() {
                continue;
            }
            has_payload = true;
            let mut fields = String::new();
            for f in &v.fields {
                let c = self.c_type(&f.ty);
                fields.push_str(&format!("{} {}; ", c, f.name));
            }
            union_body.push_str(&format!("        struct {{ {}}} {};\n", fields, v.name));
        }
        union_body.push_str("    }");

        let mut struct_fields = vec![IrField {
            c_type: "int".to_string(),
            name: "tag".to_string(),
        }];
        if has_payload {
            struct_fields.push(IrField {
                c_type: union_body,
                name: "as".to_string(),
            });
        }
        self.module.structs.push(IrStruct {
            name: name.clone(),
            fields: struct_fields,
        });

        // Constructors: `Shape Shape_Circle(double r)`.
        for v in &info.variants {
            let fn_name = format!("{}_{}", name, v.name);
            let params: Vec<IrParam> = v
                .fields
                .iter()
                .map(|f| IrParam {
                    c_type: self.c_type(&f.ty),
                    name: f.name.clone(),
                })
                .collect();
            let mut body = vec![
                IrStmt::var_decl(name.clone(), "__e", None),
                IrStmt::assign(
                    IrExpr::dot(IrExpr::var("__e"), "tag"),
                    IrExpr::lit(format!("{}_{}_TAG", name, v.name)),
                ),
            ];
            for f in &v.fields {
                body.push(IrStmt::assign(
                    IrExpr::dot(
                        IrExpr::dot(IrExpr::dot(IrExpr::var("__e"), "as"), v.name.clone()),
                        f.name.clone(),
                    ),
                    IrExpr::var(f.name.clone()),
                ));
            }
            body.push(IrStmt::Return(Some(IrExpr::var("__e"))));

            let proto = IrProto {
                ret: name.clone(),
                name: fn_name,
                params,
                is_static: false,
            };
            self.module.protos.push(proto.clone());
            self.module.functions.push(IrFunction {
                proto,
                body: IrBlock::new(body),
            });
        }
    }
}
