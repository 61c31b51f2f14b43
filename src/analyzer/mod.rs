//! Semantic analysis.
//!
//! Two passes over the AST. Pass 1 (`registration`) enters every top-level
//! declaration and class member into the semantic tables, lays out vtables,
//! and validates inheritance. Pass 2 (`stmts`/`exprs`) walks bodies,
//! resolving every identifier and computing a type for every expression.
//! All diagnostics are accumulated; the pipeline moves on only when no
//! errors remain.

mod exprs;
mod registration;
mod stmts;
pub mod types;

use std::collections::{HashMap, HashSet};

use crate::ast::{Access, NodeId, Program, Span, TypeExpr, TypeExprKind};
use crate::diag::{Diagnostic, Stage};

pub use types::{Prim, Ty};

/// Builtin generic collections instantiated by the monomorphizer, with
/// their arities.
pub const BUILTIN_GENERICS: &[(&str, usize)] = &[
    ("Vector", 1),
    ("List", 1),
    ("Array", 1),
    ("Set", 1),
    ("Map", 2),
    ("Mutex", 1),
];

pub fn builtin_generic_arity(name: &str) -> Option<usize> {
    BUILTIN_GENERICS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, a)| *a)
}

// ============================================================================
// Semantic tables
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Var,
    Param,
    Field,
    Function,
    Method,
    Type,
    EnumVariant,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: Ty,
    pub kind: SymbolKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Function,
    Method,
    Class,
    Block,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    symbols: HashMap<String, Symbol>,
}

#[derive(Debug, Clone)]
pub struct ParamInfo {
    pub name: String,
    pub ty: Ty,
    pub keep: bool,
    pub has_default: bool,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: String,
    pub params: Vec<ParamInfo>,
    pub ret: Ty,
    pub access: Access,
    pub is_static: bool,
    pub is_override: bool,
    pub is_abstract: bool,
    pub keep_return: bool,
    /// Class that provides the implementation emitted for this entry.
    pub defined_in: String,
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub ty: Ty,
    pub access: Access,
    pub has_init: bool,
}

#[derive(Debug, Clone)]
pub struct PropertyInfo {
    pub name: String,
    pub ty: Ty,
    pub access: Access,
    pub has_setter: bool,
    pub auto: bool,
}

/// One virtual dispatch slot. Slot order is inherited-first; the class that
/// first declared the method fixes the slot's position and self type.
#[derive(Debug, Clone, PartialEq)]
pub struct VtableSlot {
    pub name: String,
    pub introduced_in: String,
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    pub generic_params: Vec<String>,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    /// Own fields, declaration order (auto-property backing fields last).
    pub fields: Vec<FieldInfo>,
    /// Own methods, declaration order.
    pub methods: Vec<MethodInfo>,
    pub properties: Vec<PropertyInfo>,
    pub ctor_params: Vec<ParamInfo>,
    pub has_ctor: bool,
    pub has_dtor: bool,
    pub is_abstract: bool,
    /// Filled by type-graph analysis: can instances form reference cycles?
    pub is_cyclable: bool,
    pub vtable: Vec<VtableSlot>,
}

#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    pub name: String,
    pub generic_params: Vec<String>,
    pub methods: Vec<MethodInfo>,
}

#[derive(Debug, Clone)]
pub struct EnumVariantInfo {
    pub name: String,
    pub fields: Vec<ParamInfo>,
}

#[derive(Debug, Clone)]
pub struct EnumInfo {
    pub name: String,
    pub variants: Vec<EnumVariantInfo>,
    /// Any variant with payload fields makes this a tagged union.
    pub is_tagged: bool,
}

#[derive(Debug, Clone)]
pub struct FnInfo {
    pub name: String,
    pub params: Vec<ParamInfo>,
    pub ret: Ty,
    pub keep_return: bool,
    pub is_extern: bool,
}

/// A concrete use of a generic class or interface, deduplicated
/// structurally. Drives monomorphization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericInstance {
    pub base: String,
    pub args: Vec<Ty>,
}

/// Everything downstream stages need: the checked program plus the
/// semantic tables. Owned by the analyzer, borrowed by the IR generator.
#[derive(Debug)]
pub struct Analysis {
    pub program: Program,
    pub classes: HashMap<String, ClassInfo>,
    pub class_order: Vec<String>,
    pub interfaces: HashMap<String, InterfaceInfo>,
    pub enums: HashMap<String, EnumInfo>,
    pub functions: HashMap<String, FnInfo>,
    pub typedefs: HashMap<String, Ty>,
    pub expr_types: HashMap<NodeId, Ty>,
    pub instances: Vec<GenericInstance>,
    pub lambda_captures: HashMap<NodeId, Vec<(String, Ty)>>,
}

impl Analysis {
    /// Nearest implementation of a method along the inheritance chain.
    pub fn find_method(&self, class: &str, name: &str) -> Option<&MethodInfo> {
        let mut current = Some(class);
        while let Some(cname) = current {
            let info = self.classes.get(cname)?;
            if let Some(m) = info.methods.iter().find(|m| m.name == name) {
                return Some(m);
            }
            current = info.parent.as_deref();
        }
        None
    }

    /// Field lookup along the inheritance chain.
    pub fn find_field(&self, class: &str, name: &str) -> Option<&FieldInfo> {
        let mut current = Some(class);
        while let Some(cname) = current {
            let info = self.classes.get(cname)?;
            if let Some(f) = info.fields.iter().find(|f| f.name == name) {
                return Some(f);
            }
            current = info.parent.as_deref();
        }
        None
    }

    pub fn find_property(&self, class: &str, name: &str) -> Option<&PropertyInfo> {
        let mut current = Some(class);
        while let Some(cname) = current {
            let info = self.classes.get(cname)?;
            if let Some(p) = info.properties.iter().find(|p| p.name == name) {
                return Some(p);
            }
            current = info.parent.as_deref();
        }
        None
    }

    /// All fields in struct layout order: inherited first, then own.
    pub fn all_fields(&self, class: &str) -> Vec<&FieldInfo> {
        let mut chain = Vec::new();
        let mut current = Some(class);
        while let Some(cname) = current {
            match self.classes.get(cname) {
                Some(info) => {
                    chain.push(info);
                    current = info.parent.as_deref();
                }
                None => break,
            }
        }
        chain
            .iter()
            .rev()
            .flat_map(|info| info.fields.iter())
            .collect()
    }

    /// Does the class (or an ancestor) participate in a hierarchy? Such
    /// classes dispatch instance methods through their vtable.
    pub fn in_hierarchy(&self, class: &str) -> bool {
        if let Some(info) = self.classes.get(class) {
            if info.parent.is_some() || !info.interfaces.is_empty() {
                return true;
            }
        }
        self.classes
            .values()
            .any(|c| c.parent.as_deref() == Some(class))
    }

    pub fn vtable_slot(&self, class: &str, method: &str) -> Option<(usize, &VtableSlot)> {
        let info = self.classes.get(class)?;
        info.vtable
            .iter()
            .enumerate()
            .find(|(_, slot)| slot.name == method)
    }
}

// ============================================================================
// Analyzer
// ============================================================================

pub struct Analyzer {
    pub classes: HashMap<String, ClassInfo>,
    pub class_order: Vec<String>,
    pub interfaces: HashMap<String, InterfaceInfo>,
    pub enums: HashMap<String, EnumInfo>,
    pub functions: HashMap<String, FnInfo>,
    pub typedefs: HashMap<String, Ty>,
    pub expr_types: HashMap<NodeId, Ty>,
    pub lambda_captures: HashMap<NodeId, Vec<(String, Ty)>>,
    instances: Vec<GenericInstance>,
    instance_set: HashSet<GenericInstance>,
    pub diags: Vec<Diagnostic>,

    scopes: Vec<Scope>,
    pub current_class: Option<String>,
    pub current_ret: Ty,
    pub loop_depth: u32,
    pub generic_scope: Vec<String>,
    /// Innermost-last stack of lambdas under analysis; identifiers that
    /// resolve below a lambda's boundary scope are its captures.
    pub lambda_stack: Vec<LambdaCtx>,
}

#[derive(Debug)]
pub struct LambdaCtx {
    /// Scope index of the lambda's own function scope.
    pub boundary: usize,
    pub captures: Vec<(String, Ty)>,
}

/// Run both analyzer passes. The program is returned inside the `Analysis`
/// (downstream stages walk the AST with the tables alongside).
pub fn analyze(program: Program) -> (Analysis, Vec<Diagnostic>) {
    let mut a = Analyzer::new();
    a.register_declarations(&program);
    a.check_bodies(&program);
    a.finish(program)
}

impl Analyzer {
    fn new() -> Self {
        Analyzer {
            classes: HashMap::new(),
            class_order: Vec::new(),
            interfaces: HashMap::new(),
            enums: HashMap::new(),
            functions: HashMap::new(),
            typedefs: HashMap::new(),
            expr_types: HashMap::new(),
            lambda_captures: HashMap::new(),
            instances: Vec::new(),
            instance_set: HashSet::new(),
            diags: Vec::new(),
            scopes: vec![Scope {
                kind: ScopeKind::Module,
                symbols: HashMap::new(),
            }],
            current_class: None,
            current_ret: Ty::VOID,
            loop_depth: 0,
            generic_scope: Vec::new(),
            lambda_stack: Vec::new(),
        }
    }

    fn finish(self, program: Program) -> (Analysis, Vec<Diagnostic>) {
        (
            Analysis {
                program,
                classes: self.classes,
                class_order: self.class_order,
                interfaces: self.interfaces,
                enums: self.enums,
                functions: self.functions,
                typedefs: self.typedefs,
                expr_types: self.expr_types,
                instances: self.instances,
                lambda_captures: self.lambda_captures,
            },
            self.diags,
        )
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    pub fn error(&mut self, message: String, span: Span) {
        self.diags
            .push(Diagnostic::error(Stage::Analyzer, message, span));
    }

    pub fn warn(&mut self, message: String, span: Span) {
        self.diags
            .push(Diagnostic::warning(Stage::Analyzer, message, span));
    }

    // ------------------------------------------------------------------
    // Scopes
    // ------------------------------------------------------------------

    pub fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope {
            kind,
            symbols: HashMap::new(),
        });
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn define(&mut self, name: &str, ty: Ty, kind: SymbolKind) {
        let scope = self.scopes.last_mut().expect("module scope always present");
        scope.symbols.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                ty,
                kind,
            },
        );
    }

    /// Lookup walks the parent chain, innermost first.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.symbols.get(name))
    }

    /// Lookup that also reports which scope the symbol lives in, for
    /// lambda capture detection.
    pub fn lookup_indexed(&self, name: &str) -> Option<(usize, &Symbol)> {
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if let Some(sym) = scope.symbols.get(name) {
                return Some((i, sym));
            }
        }
        None
    }

    pub fn scope_kind_at(&self, index: usize) -> ScopeKind {
        self.scopes[index].kind
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    // ------------------------------------------------------------------
    // Type resolution
    // ------------------------------------------------------------------

    pub fn record_instance(&mut self, base: &str, args: Vec<Ty>) {
        if args.is_empty() || args.iter().any(Ty::mentions_param) {
            return;
        }
        let inst = GenericInstance {
            base: base.to_string(),
            args,
        };
        if self.instance_set.insert(inst.clone()) {
            self.instances.push(inst);
        }
    }

    /// Resolve a syntactic type to a semantic one, recording generic
    /// instances along the way.
    pub fn resolve_type(&mut self, t: &TypeExpr) -> Ty {
        match &t.kind {
            TypeExprKind::Named { name, args } => self.resolve_named(name, args, t.span),
            TypeExprKind::Ptr { inner } => Ty::Ptr(Box::new(self.resolve_type(inner))),
            TypeExprKind::Nullable { inner } => {
                let inner_ty = self.resolve_type(inner);
                if inner_ty.is_reference() || inner_ty.is_error() {
                    Ty::Opt(Box::new(inner_ty))
                } else {
                    self.error(
                        format!("`{}?` is invalid: nullable requires a reference type", inner_ty),
                        t.span,
                    );
                    Ty::Error
                }
            }
            TypeExprKind::Fn { params, ret } => Ty::Fn {
                params: params.iter().map(|p| self.resolve_type(p)).collect(),
                ret: Box::new(self.resolve_type(ret)),
            },
            TypeExprKind::Tuple { items } => {
                Ty::Tuple(items.iter().map(|i| self.resolve_type(i)).collect())
            }
        }
    }

    fn resolve_named(&mut self, name: &str, args: &[TypeExpr], span: Span) -> Ty {
        if args.is_empty() && self.generic_scope.contains(&name.to_string()) {
            return Ty::Param(name.to_string());
        }

        if let Some(prim) = primitive_for(name) {
            if !args.is_empty() {
                self.error(format!("`{}` takes no type arguments", name), span);
            }
            return Ty::Prim(prim);
        }

        if let Some(resolved) = self.typedefs.get(name).cloned() {
            return resolved;
        }

        let resolved_args: Vec<Ty> = args.iter().map(|a| self.resolve_type(a)).collect();

        if let Some(arity) = builtin_generic_arity(name) {
            if resolved_args.len() != arity {
                self.error(
                    format!("`{}` expects {} type argument(s), got {}", name, arity, resolved_args.len()),
                    span,
                );
                return Ty::Error;
            }
            self.record_instance(name, resolved_args.clone());
            return Ty::Class {
                name: name.to_string(),
                args: resolved_args,
            };
        }

        if let Some(info) = self.classes.get(name) {
            if info.generic_params.len() != resolved_args.len() {
                self.error(
                    format!(
                        "`{}` expects {} type argument(s), got {}",
                        name,
                        info.generic_params.len(),
                        resolved_args.len()
                    ),
                    span,
                );
                return Ty::Error;
            }
            if !resolved_args.is_empty() {
                self.record_instance(name, resolved_args.clone());
            }
            return Ty::Class {
                name: name.to_string(),
                args: resolved_args,
            };
        }

        if self.interfaces.contains_key(name) {
            if !resolved_args.is_empty() {
                self.record_instance(name, resolved_args);
            }
            return Ty::Iface(name.to_string());
        }

        if self.enums.contains_key(name) {
            return Ty::Enum(name.to_string());
        }

        self.error(format!("unknown type `{}`", name), span);
        Ty::Error
    }

    // ------------------------------------------------------------------
    // Hierarchy queries (used by the compatibility relation)
    // ------------------------------------------------------------------

    pub fn is_subclass_of(&self, derived: &str, base: &str) -> bool {
        let mut current = Some(derived);
        while let Some(name) = current {
            if name == base {
                return true;
            }
            current = self
                .classes
                .get(name)
                .and_then(|info| info.parent.as_deref());
        }
        false
    }

    pub fn class_implements(&self, class: &str, iface: &str) -> bool {
        let mut current = Some(class);
        while let Some(name) = current {
            match self.classes.get(name) {
                Some(info) => {
                    if info.interfaces.iter().any(|i| i == iface) {
                        return true;
                    }
                    current = info.parent.as_deref();
                }
                None => break,
            }
        }
        false
    }

    pub fn method_on(&self, class: &str, name: &str) -> Option<MethodInfo> {
        let mut current = Some(class);
        while let Some(cname) = current {
            let info = self.classes.get(cname)?;
            if let Some(m) = info.methods.iter().find(|m| m.name == name) {
                return Some(m.clone());
            }
            current = info.parent.as_deref();
        }
        None
    }

    pub fn field_on(&self, class: &str, name: &str) -> Option<FieldInfo> {
        let mut current = Some(class);
        while let Some(cname) = current {
            let info = self.classes.get(cname)?;
            if let Some(f) = info.fields.iter().find(|f| f.name == name) {
                return Some(f.clone());
            }
            current = info.parent.as_deref();
        }
        None
    }

    pub fn property_on(&self, class: &str, name: &str) -> Option<PropertyInfo> {
        let mut current = Some(class);
        while let Some(cname) = current {
            let info = self.classes.get(cname)?;
            if let Some(p) = info.properties.iter().find(|p| p.name == name) {
                return Some(p.clone());
            }
            current = info.parent.as_deref();
        }
        None
    }
}

/// Primitive type names, including the multi-word C spellings.
pub fn primitive_for(name: &str) -> Option<Prim> {
    let p = match name {
        "void" => Prim::Void,
        "int" => Prim::Int,
        "float" => Prim::Float,
        "double" | "long double" => Prim::Double,
        "bool" => Prim::Bool,
        "char" | "signed char" | "unsigned char" => Prim::Char,
        "string" => Prim::Str,
        "short" | "short int" | "unsigned short" | "signed short" => Prim::Short,
        "long" | "long int" | "long long" | "long long int" | "unsigned long"
        | "unsigned long long" => Prim::Long,
        "unsigned" | "unsigned int" | "signed" | "signed int" => Prim::Int,
        _ => return None,
    };
    Some(p)
}
