//! ASDL utilities.
//!
//! Parses Zephyr-style ASDL (as used by `spec/ast.asdl`) and generates the
//! Rust node definitions consumed by the parser. The `asdl-gen` binary is a
//! thin wrapper over [`generate_rust`]; its output is piped through rustfmt
//! and checked in as `src/ast/nodes.rs`.
//!
//! ASDL grammar (simplified):
//!
//! ```text
//! module      = "module" id "{" { type } "}"
//! type        = id "=" ( product | constructor { "|" constructor } ) [attributes]
//! product     = "(" field { "," field } ")"
//! constructor = id [ "(" field { "," field } ")" ]
//! field       = type_id [ "?" | "*" ] id
//! attributes  = "attributes" "(" field { "," field } ")"
//! ```

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AsdlError {
    #[error("unexpected end of ASDL input")]
    UnexpectedEof,
    #[error("expected `{expected}`, got `{got}` (token {at})")]
    Unexpected {
        expected: String,
        got: String,
        at: usize,
    },
}

// ============================================================================
// Data model
// ============================================================================

#[derive(Debug, Clone)]
pub struct Field {
    pub ty: String,
    pub name: String,
    pub seq: bool,
    pub opt: bool,
}

#[derive(Debug, Clone)]
pub struct Constructor {
    pub name: String,
    pub fields: Vec<Field>,
}

/// A named type: a sum (one or more named constructors) or a product
/// (a single anonymous field list).
#[derive(Debug, Clone)]
pub struct Type {
    pub name: String,
    pub constructors: Vec<Constructor>,
    pub is_product: bool,
    pub attributes: Vec<Field>,
}

impl Type {
    /// A sum whose constructors all carry no fields (maps to a C-like enum).
    pub fn is_simple_enum(&self) -> bool {
        !self.is_product && self.constructors.iter().all(|c| c.fields.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub types: Vec<Type>,
}

// ============================================================================
// Tokenizer
// ============================================================================

fn tokenize(source: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    while let Some(&ch) = chars.peek() {
        if ch == '-' {
            chars.next();
            if chars.peek() == Some(&'-') {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            continue;
        }
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        if ch.is_ascii_alphabetic() || ch == '_' {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    word.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(word);
            continue;
        }
        if "{}()|,=?*".contains(ch) {
            tokens.push(ch.to_string());
            chars.next();
            continue;
        }
        // Anything else is noise (the spec file has no other punctuation).
        chars.next();
    }
    tokens
}

// ============================================================================
// Parser
// ============================================================================

struct AsdlParser {
    tokens: Vec<String>,
    pos: usize,
}

impl AsdlParser {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn advance(&mut self) -> Result<String, AsdlError> {
        let tok = self.tokens.get(self.pos).cloned().ok_or(AsdlError::UnexpectedEof)?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect(&mut self, expected: &str) -> Result<(), AsdlError> {
        let tok = self.advance()?;
        if tok != expected {
            return Err(AsdlError::Unexpected {
                expected: expected.to_string(),
                got: tok,
                at: self.pos,
            });
        }
        Ok(())
    }

    fn parse_module(&mut self) -> Result<Module, AsdlError> {
        self.expect("module")?;
        let name = self.advance()?;
        self.expect("{")?;
        let mut types = Vec::new();
        while self.peek() != Some("}") {
            types.push(self.parse_type()?);
        }
        self.expect("}")?;
        Ok(Module { name, types })
    }

    fn parse_type(&mut self) -> Result<Type, AsdlError> {
        let name = self.advance()?;
        self.expect("=")?;

        let mut constructors = Vec::new();
        let is_product = self.peek() == Some("(");
        if is_product {
            let fields = self.parse_field_list()?;
            constructors.push(Constructor {
                name: name.clone(),
                fields,
            });
        } else {
            constructors.push(self.parse_constructor()?);
            while self.peek() == Some("|") {
                self.advance()?;
                constructors.push(self.parse_constructor()?);
            }
        }

        let mut attributes = Vec::new();
        if self.peek() == Some("attributes") {
            self.advance()?;
            attributes = self.parse_field_list()?;
        }

        Ok(Type {
            name,
            constructors,
            is_product,
            attributes,
        })
    }

    fn parse_constructor(&mut self) -> Result<Constructor, AsdlError> {
        let name = self.advance()?;
        let fields = if self.peek() == Some("(") {
            self.parse_field_list()?
        } else {
            Vec::new()
        };
        Ok(Constructor { name, fields })
    }

    fn parse_field_list(&mut self) -> Result<Vec<Field>, AsdlError> {
        self.expect("(")?;
        let mut fields = Vec::new();
        if self.peek() == Some(")") {
            self.advance()?;
            return Ok(fields);
        }
        loop {
            fields.push(self.parse_field()?);
            match self.advance()?.as_str() {
                "," => {
                    if self.peek() == Some(")") {
                        self.advance()?;
                        break;
                    }
                }
                ")" => break,
                other => {
                    return Err(AsdlError::Unexpected {
                        expected: "`,` or `)`".to_string(),
                        got: other.to_string(),
                        at: self.pos,
                    })
                }
            }
        }
        Ok(fields)
    }

    fn parse_field(&mut self) -> Result<Field, AsdlError> {
        let ty = self.advance()?;
        let (mut seq, mut opt) = (false, false);
        match self.peek() {
            Some("*") => {
                seq = true;
                self.advance()?;
            }
            Some("?") => {
                opt = true;
                self.advance()?;
            }
            _ => {}
        }
        let name = self.advance()?;
        Ok(Field { ty, name, seq, opt })
    }
}

/// Parse ASDL source into a module definition.
pub fn parse(source: &str) -> Result<Module, AsdlError> {
    let mut parser = AsdlParser {
        tokens: tokenize(source),
        pos: 0,
    };
    parser.parse_module()
}

// ============================================================================
// Rust code generation
// ============================================================================

const BUILTINS: &[(&str, &str)] = &[
    ("identifier", "String"),
    ("string", "String"),
    ("int", "i64"),
    ("bool", "bool"),
    ("span", "Span"),
    ("nodeid", "NodeId"),
];

fn builtin(ty: &str) -> Option<&'static str> {
    BUILTINS.iter().find(|(n, _)| *n == ty).map(|(_, r)| *r)
}

fn to_pascal(name: &str) -> String {
    name.split('_')
        .map(|part| {
            let mut cs = part.chars();
            match cs.next() {
                Some(first) => first.to_uppercase().chain(cs).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Render a field's Rust type. Node-typed single fields are boxed so that
/// recursive types (expr in expr) have finite size; simple enums count as
/// builtins and stay unboxed.
fn rust_type(field: &Field, simple_enums: &[String]) -> String {
    let base = match builtin(&field.ty) {
        Some(b) => b.to_string(),
        None => to_pascal(&field.ty),
    };
    let is_plain = builtin(&field.ty).is_some() || simple_enums.contains(&field.ty);
    if field.seq {
        format!("Vec<{}>", base)
    } else if field.opt {
        if is_plain {
            format!("Option<{}>", base)
        } else {
            format!("Option<Box<{}>>", base)
        }
    } else if is_plain {
        base
    } else {
        format!("Box<{}>", base)
    }
}

fn emit_fields(out: &mut String, fields: &[Field], simple_enums: &[String], indent: &str) {
    for f in fields {
        out.push_str(&format!("{}pub {}: {},\n", indent, f.name, rust_type(f, simple_enums)));
    }
}

fn emit_variant_fields(out: &mut String, fields: &[Field], simple_enums: &[String]) {
    for f in fields {
        out.push_str(&format!("        {}: {},\n", f.name, rust_type(f, simple_enums)));
    }
}

/// Generate the full `src/ast/nodes.rs` text from a parsed module.
pub fn generate_rust(module: &Module) -> String {
    let simple_enums: Vec<String> = module
        .types
        .iter()
        .filter(|t| t.is_simple_enum())
        .map(|t| t.name.clone())
        .collect();

    let mut out = String::new();
    out.push_str("//! AST node definitions for btrc.\n");
    out.push_str("//!\n");
    out.push_str("//! Generated from `spec/ast.asdl` by `asdl-gen`. DO NOT EDIT BY HAND;\n");
    out.push_str("//! regenerate with:\n");
    out.push_str("//!\n");
    out.push_str("//! ```text\n");
    out.push_str("//! cargo run --bin asdl-gen -- spec/ast.asdl > src/ast/nodes.rs\n");
    out.push_str("//! ```\n");
    out.push_str("//!\n");
    out.push_str("//! Sum types map to enums, product types to structs. Sequence fields (`*`)\n");
    out.push_str("//! become `Vec`, optional fields (`?`) become `Option`, and node-typed\n");
    out.push_str("//! fields are boxed. Types with `attributes(...)` are wrapped in a struct\n");
    out.push_str("//! carrying the attribute fields alongside the kind enum.\n\n");
    out.push_str("use crate::ast::{NodeId, Span};\n");

    for ty in &module.types {
        out.push('\n');
        let rust_name = to_pascal(&ty.name);

        if ty.is_product {
            out.push_str("#[derive(Debug, Clone, PartialEq)]\n");
            out.push_str(&format!("pub struct {} {{\n", rust_name));
            emit_fields(&mut out, &ty.constructors[0].fields, &simple_enums, "    ");
            out.push_str("}\n");
            continue;
        }

        if ty.is_simple_enum() {
            out.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq)]\n");
            out.push_str(&format!("pub enum {} {{\n", rust_name));
            for c in &ty.constructors {
                out.push_str(&format!("    {},\n", c.name));
            }
            out.push_str("}\n");
            continue;
        }

        let enum_name = if ty.attributes.is_empty() {
            rust_name.clone()
        } else {
            // Wrapper struct carrying the attribute fields.
            out.push_str("#[derive(Debug, Clone, PartialEq)]\n");
            out.push_str(&format!("pub struct {} {{\n", rust_name));
            out.push_str(&format!("    pub kind: {}Kind,\n", rust_name));
            emit_fields(&mut out, &ty.attributes, &simple_enums, "    ");
            out.push_str("}\n\n");
            format!("{}Kind", rust_name)
        };

        out.push_str("#[derive(Debug, Clone, PartialEq)]\n");
        out.push_str(&format!("pub enum {} {{\n", enum_name));
        for c in &ty.constructors {
            if c.fields.is_empty() {
                out.push_str(&format!("    {},\n", c.name));
            } else {
                out.push_str(&format!("    {} {{\n", c.name));
                emit_variant_fields(&mut out, &c.fields, &simple_enums);
                out.push_str("    },\n");
            }
        }
        out.push_str("}\n");
    }

    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
        module toy {
          expr = Num(int value)
               | Add(expr left, expr right)
               attributes(span span)
          color = Red | Green | Blue
          pair = (expr first, expr second)
        }
    "#;

    #[test]
    fn parses_sums_products_and_attrs() {
        let module = parse(SMALL).unwrap();
        assert_eq!(module.name, "toy");
        assert_eq!(module.types.len(), 3);
        let expr = &module.types[0];
        assert_eq!(expr.constructors.len(), 2);
        assert_eq!(expr.attributes.len(), 1);
        assert!(module.types[1].is_simple_enum());
        assert!(module.types[2].is_product);
    }

    #[test]
    fn field_modifiers() {
        let module = parse("module m { t = C(int* xs, string? name) }").unwrap();
        let fields = &module.types[0].constructors[0].fields;
        assert!(fields[0].seq);
        assert!(fields[1].opt);
    }

    #[test]
    fn generates_wrapper_for_attributed_sum() {
        let module = parse(SMALL).unwrap();
        let code = generate_rust(&module);
        assert!(code.contains("pub struct Expr {"));
        assert!(code.contains("pub kind: ExprKind,"));
        assert!(code.contains("pub enum ExprKind {"));
        assert!(code.contains("left: Box<Expr>,"));
        assert!(code.contains("pub enum Color {"));
        assert!(code.contains("pub struct Pair {"));
    }

    #[test]
    fn simple_enums_are_not_boxed() {
        let module = parse("module m { k = A | B  u = C(k tag) }").unwrap();
        let code = generate_rust(&module);
        assert!(code.contains("tag: K,"));
        assert!(!code.contains("Box<K>"));
    }

    #[test]
    fn bundled_asdl_matches_checked_in_nodes() {
        // The checked-in nodes.rs must stay regenerable from spec/ast.asdl:
        // every type the ASDL declares has to appear in the generated output.
        let module = parse(include_str!("../spec/ast.asdl")).unwrap();
        let code = generate_rust(&module);
        for expected in [
            "pub struct Program {",
            "pub enum DeclKind {",
            "pub enum StmtKind {",
            "pub enum ExprKind {",
            "pub enum TypeExprKind {",
            "pub enum MemberOp {",
            "pub struct Param {",
        ] {
            assert!(code.contains(expected), "missing {}", expected);
        }
    }
}
