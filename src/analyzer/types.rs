//! Semantic types and the compatibility relation.
//!
//! `Ty` is the canonical type representation produced by analysis: every
//! expression node gets one (or the `Error` sentinel, which propagates
//! without cascading diagnostics).

use std::fmt;

use super::Analyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prim {
    Void,
    Int,
    Long,
    Short,
    Float,
    Double,
    Bool,
    Char,
    Str,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Prim(Prim),
    /// A class, possibly a generic instance (`Vector<int>`).
    Class { name: String, args: Vec<Ty> },
    Iface(String),
    Enum(String),
    Ptr(Box<Ty>),
    /// Nullable reference (`T?`).
    Opt(Box<Ty>),
    Tuple(Vec<Ty>),
    Fn { params: Vec<Ty>, ret: Box<Ty> },
    /// Unsubstituted generic parameter inside a generic body.
    Param(String),
    /// View of one payload variant of a tagged-union enum (`e.Circle`).
    Variant { enum_name: String, variant: String },
    /// The type of `null`; converts to any reference type.
    Null,
    /// Error sentinel.
    Error,
}

impl Ty {
    pub const VOID: Ty = Ty::Prim(Prim::Void);
    pub const INT: Ty = Ty::Prim(Prim::Int);
    pub const FLOAT: Ty = Ty::Prim(Prim::Float);
    pub const DOUBLE: Ty = Ty::Prim(Prim::Double);
    pub const BOOL: Ty = Ty::Prim(Prim::Bool);
    pub const CHAR: Ty = Ty::Prim(Prim::Char);
    pub const STR: Ty = Ty::Prim(Prim::Str);

    pub fn class(name: &str) -> Ty {
        Ty::Class {
            name: name.to_string(),
            args: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Ty::Error)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Ty::Prim(Prim::Void))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Ty::Prim(
                Prim::Int | Prim::Long | Prim::Short | Prim::Float | Prim::Double | Prim::Char
            )
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Ty::Prim(Prim::Int | Prim::Long | Prim::Short | Prim::Char))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Ty::Prim(Prim::Str))
    }

    /// Reference types can be null and participate in `T?`/ARC.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Ty::Class { .. } | Ty::Iface(_) | Ty::Ptr(_) | Ty::Prim(Prim::Str) | Ty::Fn { .. }
        )
    }

    /// Strip one level of nullability, if present.
    pub fn unwrap_opt(&self) -> &Ty {
        match self {
            Ty::Opt(inner) => inner,
            other => other,
        }
    }

    pub fn is_opt(&self) -> bool {
        matches!(self, Ty::Opt(_))
    }

    /// The class name if this is (a nullable of) a class type.
    pub fn class_name(&self) -> Option<&str> {
        match self.unwrap_opt() {
            Ty::Class { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn class_args(&self) -> &[Ty] {
        match self.unwrap_opt() {
            Ty::Class { args, .. } => args,
            _ => &[],
        }
    }

    /// Does the type mention an unsubstituted generic parameter?
    pub fn mentions_param(&self) -> bool {
        match self {
            Ty::Param(_) => true,
            Ty::Class { args, .. } => args.iter().any(Ty::mentions_param),
            Ty::Ptr(t) | Ty::Opt(t) => t.mentions_param(),
            Ty::Tuple(items) => items.iter().any(Ty::mentions_param),
            Ty::Fn { params, ret } => {
                params.iter().any(Ty::mentions_param) || ret.mentions_param()
            }
            _ => false,
        }
    }

    /// Substitute generic parameters by name.
    pub fn substitute(&self, subst: &std::collections::HashMap<String, Ty>) -> Ty {
        match self {
            Ty::Param(name) => subst.get(name).cloned().unwrap_or_else(|| self.clone()),
            Ty::Class { name, args } => Ty::Class {
                name: name.clone(),
                args: args.iter().map(|a| a.substitute(subst)).collect(),
            },
            Ty::Ptr(t) => Ty::Ptr(Box::new(t.substitute(subst))),
            Ty::Opt(t) => Ty::Opt(Box::new(t.substitute(subst))),
            Ty::Tuple(items) => Ty::Tuple(items.iter().map(|t| t.substitute(subst)).collect()),
            Ty::Fn { params, ret } => Ty::Fn {
                params: params.iter().map(|t| t.substitute(subst)).collect(),
                ret: Box::new(ret.substitute(subst)),
            },
            other => other.clone(),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Prim(p) => {
                let s = match p {
                    Prim::Void => "void",
                    Prim::Int => "int",
                    Prim::Long => "long",
                    Prim::Short => "short",
                    Prim::Float => "float",
                    Prim::Double => "double",
                    Prim::Bool => "bool",
                    Prim::Char => "char",
                    Prim::Str => "string",
                };
                write!(f, "{}", s)
            }
            Ty::Class { name, args } => {
                if args.is_empty() {
                    write!(f, "{}", name)
                } else {
                    let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                    write!(f, "{}<{}>", name, parts.join(", "))
                }
            }
            Ty::Iface(name) => write!(f, "{}", name),
            Ty::Enum(name) => write!(f, "{}", name),
            Ty::Ptr(inner) => write!(f, "{}*", inner),
            Ty::Opt(inner) => write!(f, "{}?", inner),
            Ty::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(|t| t.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
            Ty::Fn { params, ret } => {
                let parts: Vec<String> = params.iter().map(|t| t.to_string()).collect();
                write!(f, "({}) => {}", parts.join(", "), ret)
            }
            Ty::Param(name) => write!(f, "{}", name),
            Ty::Variant { enum_name, variant } => write!(f, "{}.{}", enum_name, variant),
            Ty::Null => write!(f, "null"),
            Ty::Error => write!(f, "<error>"),
        }
    }
}

// ============================================================================
// Compatibility
// ============================================================================

/// Rank for numeric widening; a value converts implicitly to any type of
/// equal or higher rank.
fn numeric_rank(ty: &Ty) -> Option<u8> {
    match ty {
        Ty::Prim(Prim::Char) => Some(0),
        Ty::Prim(Prim::Short) => Some(1),
        Ty::Prim(Prim::Int) => Some(2),
        Ty::Prim(Prim::Long) => Some(3),
        Ty::Prim(Prim::Float) => Some(4),
        Ty::Prim(Prim::Double) => Some(5),
        _ => None,
    }
}

impl Analyzer {
    /// Implicit conversion: identity, numeric widening, `T -> T?`,
    /// derived-to-base, class-to-implemented-interface, `null` to any
    /// reference. The error sentinel converts both ways so one mistake does
    /// not cascade.
    pub fn convertible(&self, from: &Ty, to: &Ty) -> bool {
        if from.is_error() || to.is_error() || from == to {
            return true;
        }
        // Generic parameters unify with anything; they are checked again
        // after substitution.
        if matches!(from, Ty::Param(_)) || matches!(to, Ty::Param(_)) {
            return true;
        }
        match (from, to) {
            (Ty::Null, t) if t.is_reference() || t.is_opt() => true,
            // Enums are integers in C; both directions convert.
            (Ty::Enum(_), t) if t.is_integer() => true,
            (f, Ty::Enum(_)) if f.is_integer() => true,
            (f, Ty::Opt(inner)) => self.convertible(f, inner),
            (Ty::Opt(inner), t) => {
                // Narrowing from T? to T is allowed with a warning at the
                // use site, so the relation itself admits it.
                self.convertible(inner, t)
            }
            (f, t) if f.is_numeric() && t.is_numeric() => {
                match (numeric_rank(f), numeric_rank(t)) {
                    (Some(a), Some(b)) => a <= b,
                    _ => false,
                }
            }
            (Ty::Class { name: from_name, .. }, Ty::Class { name: to_name, .. }) => {
                self.is_subclass_of(from_name, to_name)
            }
            (Ty::Class { name, .. }, Ty::Iface(iface)) => self.class_implements(name, iface),
            (Ty::Fn { .. }, Ty::Fn { .. }) => from == to,
            _ => false,
        }
    }

    /// The joined type of two branches (ternary, `??`).
    pub fn join(&self, a: &Ty, b: &Ty) -> Ty {
        if a.is_error() || b.is_error() {
            return Ty::Error;
        }
        if a == b {
            return a.clone();
        }
        if matches!(a, Ty::Null) {
            return match b {
                Ty::Opt(_) => b.clone(),
                other if other.is_reference() => Ty::Opt(Box::new(other.clone())),
                other => other.clone(),
            };
        }
        if matches!(b, Ty::Null) {
            return self.join(b, a);
        }
        if a.is_numeric() && b.is_numeric() {
            let (ra, rb) = (numeric_rank(a), numeric_rank(b));
            return if ra >= rb { a.clone() } else { b.clone() };
        }
        if self.convertible(a, b) {
            return b.clone();
        }
        if self.convertible(b, a) {
            return a.clone();
        }
        Ty::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        let v = Ty::Class {
            name: "Vector".into(),
            args: vec![Ty::INT],
        };
        assert_eq!(v.to_string(), "Vector<int>");
        assert_eq!(Ty::Opt(Box::new(Ty::STR)).to_string(), "string?");
        assert_eq!(
            Ty::Tuple(vec![Ty::INT, Ty::BOOL]).to_string(),
            "(int, bool)"
        );
    }

    #[test]
    fn param_mentions() {
        let t = Ty::Class {
            name: "Vector".into(),
            args: vec![Ty::Param("T".into())],
        };
        assert!(t.mentions_param());
        assert!(!Ty::INT.mentions_param());
    }

    #[test]
    fn substitution() {
        let mut subst = std::collections::HashMap::new();
        subst.insert("T".to_string(), Ty::INT);
        let t = Ty::Class {
            name: "Vector".into(),
            args: vec![Ty::Param("T".into())],
        };
        assert_eq!(
            t.substitute(&subst),
            Ty::Class {
                name: "Vector".into(),
                args: vec![Ty::INT]
            }
        );
    }
}
