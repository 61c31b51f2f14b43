//! Pass 1: declaration registration.
//!
//! Enters every top-level declaration and class member into the semantic
//! tables, then validates the class graph: parent existence and acyclicity,
//! override signatures, abstract coverage, interface satisfaction. Vtable
//! layouts and cycle-capability are computed here so pass 2 and the IR
//! generator can consume them read-only.

use std::collections::{HashMap, HashSet};

use crate::ast::{
    Access, ClassDecl, Decl, DeclKind, Member, MethodDecl, Param, Program, Span,
};

use super::types::Ty;
use super::{
    Analyzer, ClassInfo, EnumInfo, EnumVariantInfo, FieldInfo, FnInfo, InterfaceInfo, MethodInfo,
    ParamInfo, PropertyInfo, SymbolKind, VtableSlot,
};

impl Analyzer {
    pub(super) fn register_declarations(&mut self, program: &Program) {
        // Names first, so forward references resolve while signatures are
        // being typed.
        for decl in &program.decls {
            self.register_name(decl);
        }
        for decl in &program.decls {
            self.register_details(decl);
        }
        self.validate_classes(program);
        self.build_vtables();
        self.mark_cyclable();
    }

    fn register_name(&mut self, decl: &Decl) {
        match &decl.kind {
            DeclKind::Class { class } => {
                if self.classes.contains_key(&class.name) {
                    self.error(format!("duplicate class `{}`", class.name), decl.span);
                    return;
                }
                self.class_order.push(class.name.clone());
                self.classes.insert(
                    class.name.clone(),
                    ClassInfo {
                        name: class.name.clone(),
                        generic_params: class.generic_params.clone(),
                        parent: class.parent.clone(),
                        interfaces: class.interfaces.clone(),
                        fields: Vec::new(),
                        methods: Vec::new(),
                        properties: Vec::new(),
                        ctor_params: Vec::new(),
                        has_ctor: false,
                        has_dtor: false,
                        is_abstract: class.is_abstract,
                        is_cyclable: false,
                        vtable: Vec::new(),
                    },
                );
                self.define(&class.name, Ty::class(&class.name), SymbolKind::Type);
            }
            DeclKind::Interface { iface } => {
                self.interfaces.insert(
                    iface.name.clone(),
                    InterfaceInfo {
                        name: iface.name.clone(),
                        generic_params: iface.generic_params.clone(),
                        methods: Vec::new(),
                    },
                );
                self.define(&iface.name, Ty::Iface(iface.name.clone()), SymbolKind::Type);
            }
            DeclKind::Enum { enumeration } => {
                let is_tagged = enumeration.variants.iter().any(|v| !v.fields.is_empty());
                self.enums.insert(
                    enumeration.name.clone(),
                    EnumInfo {
                        name: enumeration.name.clone(),
                        variants: Vec::new(),
                        is_tagged,
                    },
                );
                self.define(
                    &enumeration.name,
                    Ty::Enum(enumeration.name.clone()),
                    SymbolKind::Type,
                );
            }
            _ => {}
        }
    }

    fn register_details(&mut self, decl: &Decl) {
        match &decl.kind {
            DeclKind::Class { class } => self.register_class(class, decl.span),
            DeclKind::Interface { iface } => {
                let iface_name = iface.name.clone();
                self.generic_scope = iface.generic_params.clone();
                let mut methods = Vec::new();
                for sig in &iface.methods {
                    let params = self.resolve_params(&sig.params);
                    let ret = sig
                        .ret
                        .as_ref()
                        .map(|t| self.resolve_type(t))
                        .unwrap_or(Ty::VOID);
                    methods.push(MethodInfo {
                        name: sig.name.clone(),
                        params,
                        ret,
                        access: Access::Public,
                        is_static: false,
                        is_override: false,
                        is_abstract: true,
                        keep_return: false,
                        defined_in: iface_name.clone(),
                    });
                }
                self.generic_scope.clear();
                if let Some(info) = self.interfaces.get_mut(&iface_name) {
                    info.methods = methods;
                }
            }
            DeclKind::Enum { enumeration } => {
                let mut variants = Vec::new();
                for v in &enumeration.variants {
                    let fields = self.resolve_params(&v.fields);
                    variants.push(EnumVariantInfo {
                        name: v.name.clone(),
                        fields,
                    });
                }
                if let Some(info) = self.enums.get_mut(&enumeration.name) {
                    info.variants = variants;
                }
            }
            DeclKind::Typedef { name, target } => {
                let resolved = self.resolve_type(target);
                self.typedefs.insert(name.clone(), resolved);
            }
            DeclKind::Function { func } => {
                if !func.generic_params.is_empty() {
                    self.error(
                        format!(
                            "generic functions are not supported (`{}`); wrap the operation in a generic class",
                            func.name
                        ),
                        decl.span,
                    );
                }
                let params = self.resolve_params(&func.params);
                let ret = func
                    .ret
                    .as_ref()
                    .map(|t| self.resolve_type(t))
                    .unwrap_or(Ty::VOID);
                if self.functions.contains_key(&func.name) {
                    self.error(format!("duplicate function `{}`", func.name), decl.span);
                }
                let ty = Ty::Fn {
                    params: params.iter().map(|p| p.ty.clone()).collect(),
                    ret: Box::new(ret.clone()),
                };
                self.define(&func.name, ty, SymbolKind::Function);
                self.functions.insert(
                    func.name.clone(),
                    FnInfo {
                        name: func.name.clone(),
                        params,
                        ret,
                        keep_return: func.keep_return,
                        is_extern: func.body.is_none(),
                    },
                );
            }
            DeclKind::Extern { ret, name, params } => {
                let params = self.resolve_params(params);
                let ret = self.resolve_type(ret);
                let ty = Ty::Fn {
                    params: params.iter().map(|p| p.ty.clone()).collect(),
                    ret: Box::new(ret.clone()),
                };
                self.define(name, ty, SymbolKind::Function);
                self.functions.insert(
                    name.clone(),
                    FnInfo {
                        name: name.clone(),
                        params,
                        ret,
                        keep_return: false,
                        is_extern: true,
                    },
                );
            }
            DeclKind::Global { ty, name, .. } => {
                let resolved = match ty {
                    Some(t) => self.resolve_type(t),
                    None => Ty::Error,
                };
                self.define(name, resolved, SymbolKind::Var);
            }
            DeclKind::Struct { name, .. } => {
                // Plain C structs pass through; give the name a type symbol
                // so `struct Name` fields resolve.
                self.typedefs
                    .insert(name.clone(), Ty::class(name));
                self.define(name, Ty::class(name), SymbolKind::Type);
            }
            DeclKind::Include { .. } => {}
        }
    }

    fn register_class(&mut self, class: &ClassDecl, span: Span) {
        self.generic_scope = class.generic_params.clone();

        let mut fields = Vec::new();
        let mut methods: Vec<MethodInfo> = Vec::new();
        let mut properties = Vec::new();
        let mut ctor_params = Vec::new();
        let mut has_ctor = false;
        let mut has_dtor = false;

        for member in &class.members {
            match member {
                Member::Field { field } => {
                    let ty = self.resolve_type(&field.ty);
                    fields.push(FieldInfo {
                        name: field.name.clone(),
                        ty,
                        access: field.access,
                        has_init: field.init.is_some(),
                    });
                }
                Member::Method { method } => {
                    if methods.iter().any(|m| m.name == method.name) {
                        self.error(
                            format!(
                                "duplicate method `{}` in class `{}`",
                                method.name, class.name
                            ),
                            span,
                        );
                        continue;
                    }
                    let info = self.resolve_method(method, &class.name);
                    methods.push(info);
                }
                Member::Ctor { ctor } => {
                    has_ctor = true;
                    ctor_params = self.resolve_params(&ctor.params);
                }
                Member::Dtor { .. } => {
                    has_dtor = true;
                }
                Member::Property { prop } => {
                    let ty = self.resolve_type(&prop.ty);
                    properties.push(PropertyInfo {
                        name: prop.name.clone(),
                        ty: ty.clone(),
                        access: prop.access,
                        has_setter: prop.setter.is_some() || prop.auto,
                        auto: prop.auto,
                    });
                    if prop.auto {
                        // Auto-properties get a private backing field.
                        fields.push(FieldInfo {
                            name: format!("_prop_{}", prop.name),
                            ty,
                            access: Access::Private,
                            has_init: false,
                        });
                    }
                }
            }
        }

        self.generic_scope.clear();

        if let Some(info) = self.classes.get_mut(&class.name) {
            info.fields = fields;
            info.methods = methods;
            info.properties = properties;
            info.ctor_params = ctor_params;
            info.has_ctor = has_ctor;
            info.has_dtor = has_dtor;
        }
    }

    fn resolve_method(&mut self, method: &MethodDecl, class_name: &str) -> MethodInfo {
        let params = self.resolve_params(&method.params);
        let ret = method
            .ret
            .as_ref()
            .map(|t| self.resolve_type(t))
            .unwrap_or(Ty::VOID);
        MethodInfo {
            name: method.name.clone(),
            params,
            ret,
            access: method.access,
            is_static: method.is_static,
            is_override: method.is_override,
            is_abstract: method.is_abstract,
            keep_return: method.keep_return,
            defined_in: class_name.to_string(),
        }
    }

    fn resolve_params(&mut self, params: &[Param]) -> Vec<ParamInfo> {
        params
            .iter()
            .map(|p| ParamInfo {
                name: p.name.clone(),
                ty: self.resolve_type(&p.ty),
                keep: p.keep,
                has_default: p.default.is_some(),
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    fn validate_classes(&mut self, program: &Program) {
        let class_spans: HashMap<String, Span> = program
            .decls
            .iter()
            .filter_map(|d| match &d.kind {
                DeclKind::Class { class } => Some((class.name.clone(), d.span)),
                _ => None,
            })
            .collect();

        let names: Vec<String> = self.class_order.clone();
        for name in &names {
            let span = class_spans.get(name).copied().unwrap_or_default();
            self.validate_parent_chain(name, span);
            self.validate_overrides(name, span);
            self.validate_interfaces(name, span);
            self.validate_abstract_coverage(name, span);
        }
    }

    fn validate_parent_chain(&mut self, name: &str, span: Span) {
        let parent = match self.classes.get(name).and_then(|c| c.parent.clone()) {
            Some(p) => p,
            None => return,
        };
        if !self.classes.contains_key(&parent) {
            self.error(
                format!("class `{}` extends unknown class `{}`", name, parent),
                span,
            );
            if let Some(info) = self.classes.get_mut(name) {
                info.parent = None;
            }
            return;
        }
        // Cycle detection.
        let mut seen = HashSet::new();
        seen.insert(name.to_string());
        let mut current = Some(parent);
        while let Some(cname) = current {
            if !seen.insert(cname.clone()) {
                self.error(
                    format!("inheritance cycle involving class `{}`", name),
                    span,
                );
                if let Some(info) = self.classes.get_mut(name) {
                    info.parent = None;
                }
                return;
            }
            current = self.classes.get(&cname).and_then(|c| c.parent.clone());
        }
    }

    /// Overrides: parameters invariant; return covariant for reference
    /// types, invariant otherwise. `override` must match a parent method.
    fn validate_overrides(&mut self, name: &str, span: Span) {
        let info = match self.classes.get(name) {
            Some(i) => i.clone(),
            None => return,
        };
        let parent = match &info.parent {
            Some(p) => p.clone(),
            None => {
                for m in &info.methods {
                    if m.is_override {
                        self.error(
                            format!(
                                "`{}` is marked override but `{}` has no superclass",
                                m.name, name
                            ),
                            span,
                        );
                    }
                }
                return;
            }
        };

        for m in &info.methods {
            if m.is_static {
                continue;
            }
            let inherited = self.method_on(&parent, &m.name);
            match inherited {
                Some(base) => {
                    if !m.is_override && !base.is_abstract {
                        self.error(
                            format!(
                                "`{}.{}` hides `{}.{}`; mark it override",
                                name, m.name, base.defined_in, base.name
                            ),
                            span,
                        );
                    }
                    if m.params.len() != base.params.len()
                        || m.params
                            .iter()
                            .zip(base.params.iter())
                            .any(|(a, b)| a.ty != b.ty)
                    {
                        self.error(
                            format!(
                                "override `{}.{}` changes parameter types",
                                name, m.name
                            ),
                            span,
                        );
                    }
                    let ret_ok = m.ret == base.ret
                        || (m.ret.is_reference()
                            && base.ret.is_reference()
                            && self.convertible(&m.ret, &base.ret));
                    if !ret_ok {
                        self.error(
                            format!(
                                "override `{}.{}` has incompatible return type",
                                name, m.name
                            ),
                            span,
                        );
                    }
                }
                None => {
                    if m.is_override {
                        self.error(
                            format!(
                                "`{}.{}` is marked override but overrides nothing",
                                name, m.name
                            ),
                            span,
                        );
                    }
                }
            }
        }
    }

    fn validate_interfaces(&mut self, name: &str, span: Span) {
        let info = match self.classes.get(name) {
            Some(i) => i.clone(),
            None => return,
        };
        for iface_name in &info.interfaces {
            let iface = match self.interfaces.get(iface_name) {
                Some(i) => i.clone(),
                None => {
                    self.error(
                        format!(
                            "class `{}` implements unknown interface `{}`",
                            name, iface_name
                        ),
                        span,
                    );
                    continue;
                }
            };
            for required in &iface.methods {
                match self.method_on(name, &required.name) {
                    Some(found) => {
                        let params_ok = found.params.len() == required.params.len()
                            && found
                                .params
                                .iter()
                                .zip(required.params.iter())
                                .all(|(a, b)| a.ty == b.ty || b.ty.mentions_param());
                        let ret_ok =
                            found.ret == required.ret || required.ret.mentions_param();
                        if !params_ok || !ret_ok {
                            self.error(
                                format!(
                                    "`{}.{}` does not match the signature required by `{}`",
                                    name, required.name, iface_name
                                ),
                                span,
                            );
                        }
                    }
                    None => {
                        self.error(
                            format!(
                                "class `{}` does not implement `{}.{}`",
                                name, iface_name, required.name
                            ),
                            span,
                        );
                    }
                }
            }
        }
    }

    /// Abstract methods must be implemented by the first concrete
    /// descendant.
    fn validate_abstract_coverage(&mut self, name: &str, span: Span) {
        let info = match self.classes.get(name) {
            Some(i) => i.clone(),
            None => return,
        };
        if info.is_abstract {
            return;
        }
        // Collect abstract methods along the chain that are never
        // implemented at or below their declaration.
        let mut chain = Vec::new();
        let mut current = info.parent.clone();
        while let Some(cname) = current {
            match self.classes.get(&cname) {
                Some(ci) => {
                    chain.push(ci.clone());
                    current = ci.parent.clone();
                }
                None => break,
            }
        }
        for ancestor in &chain {
            for m in &ancestor.methods {
                if !m.is_abstract {
                    continue;
                }
                let implemented = self
                    .method_on(name, &m.name)
                    .map(|found| !found.is_abstract)
                    .unwrap_or(false);
                if !implemented {
                    self.error(
                        format!(
                            "concrete class `{}` does not implement abstract method `{}.{}`",
                            name, ancestor.name, m.name
                        ),
                        span,
                    );
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Vtable layout
    // ------------------------------------------------------------------

    /// Slots ordered by first appearance along the inheritance chain: the
    /// parent's vtable is copied, overridden entries stay in place, and
    /// newly introduced virtual methods append.
    fn build_vtables(&mut self) {
        let names = self.class_order.clone();
        let mut done: HashMap<String, Vec<VtableSlot>> = HashMap::new();
        for name in &names {
            self.build_vtable_for(name, &mut done);
        }
        for (name, vtable) in done {
            if let Some(info) = self.classes.get_mut(&name) {
                info.vtable = vtable;
            }
        }
    }

    fn build_vtable_for(
        &self,
        name: &str,
        done: &mut HashMap<String, Vec<VtableSlot>>,
    ) -> Vec<VtableSlot> {
        if let Some(v) = done.get(name) {
            return v.clone();
        }
        let info = match self.classes.get(name) {
            Some(i) => i,
            None => return Vec::new(),
        };
        let mut vtable = match &info.parent {
            Some(parent) => self.build_vtable_for(parent, done),
            None => Vec::new(),
        };
        for m in &info.methods {
            if m.is_static {
                continue;
            }
            if !vtable.iter().any(|slot| slot.name == m.name) {
                vtable.push(VtableSlot {
                    name: m.name.clone(),
                    introduced_in: name.to_string(),
                });
            }
        }
        done.insert(name.to_string(), vtable.clone());
        vtable
    }

    // ------------------------------------------------------------------
    // Cycle capability
    // ------------------------------------------------------------------

    /// A class is cycle-capable when its field type graph can reach back to
    /// itself (directly, via another class, or through a collection's
    /// element types). Non-cyclable classes skip all collector machinery.
    fn mark_cyclable(&mut self) {
        let edges: HashMap<String, HashSet<String>> = self
            .classes
            .iter()
            .map(|(name, info)| {
                let mut out = HashSet::new();
                for f in &info.fields {
                    collect_class_refs(&f.ty, &mut out);
                }
                (name.clone(), out)
            })
            .collect();

        let names: Vec<String> = self.classes.keys().cloned().collect();
        for name in names {
            let mut reachable = HashSet::new();
            let mut stack: Vec<String> = edges
                .get(&name)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default();
            while let Some(next) = stack.pop() {
                if !reachable.insert(next.clone()) {
                    continue;
                }
                if let Some(targets) = edges.get(&next) {
                    stack.extend(targets.iter().cloned());
                }
            }
            if reachable.contains(&name) {
                if let Some(info) = self.classes.get_mut(&name) {
                    info.is_cyclable = true;
                }
            }
        }
    }
}

/// Class names referenced by a field type, including through nullable
/// wrappers, pointers, tuples, and generic arguments.
fn collect_class_refs(ty: &Ty, out: &mut HashSet<String>) {
    match ty {
        Ty::Class { name, args } => {
            out.insert(name.clone());
            for a in args {
                collect_class_refs(a, out);
            }
        }
        Ty::Opt(inner) | Ty::Ptr(inner) => collect_class_refs(inner, out),
        Ty::Tuple(items) => {
            for i in items {
                collect_class_refs(i, out);
            }
        }
        _ => {}
    }
}
