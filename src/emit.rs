//! C emitter.
//!
//! A deterministic recursive walk over the IR module. Every node has
//! exactly one textual rendering; the emitter never inspects types and
//! never rewrites structure. Output order: includes, live helper fragments,
//! type declarations, function prototypes, type definitions, globals,
//! function definitions.

use std::fmt::Write;

use crate::ir::helpers;
use crate::ir::nodes::{
    IrBlock, IrCase, IrExpr, IrFunction, IrGlobal, IrModule, IrProto, IrStmt, IrStruct,
    IrTypeDecl,
};

pub struct CEmitter {
    out: String,
    indent: usize,
}

/// Render a whole module to C source text.
pub fn emit(module: &IrModule) -> String {
    let mut e = CEmitter {
        out: String::new(),
        indent: 0,
    };
    e.emit_module(module);
    e.out
}

impl CEmitter {
    // ------------------------------------------------------------------
    // Layout primitives
    // ------------------------------------------------------------------

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    // ------------------------------------------------------------------
    // Module
    // ------------------------------------------------------------------

    fn emit_module(&mut self, module: &IrModule) {
        self.line("/* Generated by btrc. Do not edit. */");
        self.blank();
        for inc in &module.includes {
            self.line(&format!("#include <{}>", inc));
        }
        self.blank();

        // Helper fragments, registry order (the registry is declared in
        // dependency order).
        for helper in helpers::registry() {
            if module.helper_categories.contains(helper.name) {
                self.line(&format!("/* --- runtime: {} --- */", helper.name));
                self.out.push_str(helper.source.trim_end());
                self.out.push('\n');
                self.blank();
            }
        }

        for decl in &module.type_decls {
            self.emit_type_decl(decl);
        }
        self.blank();

        for proto in &module.protos {
            let rendered = self.proto_text(proto);
            self.line(&format!("{};", rendered));
        }
        self.blank();

        for def in &module.structs {
            self.emit_struct(def);
        }

        for section in &module.generated {
            self.out.push_str(section.trim());
            self.out.push('\n');
            self.blank();
        }

        for global in &module.globals {
            self.emit_global(global);
        }
        if !module.globals.is_empty() {
            self.blank();
        }

        for func in &module.functions {
            self.emit_function(func);
            self.blank();
        }
    }

    fn emit_type_decl(&mut self, decl: &IrTypeDecl) {
        match decl {
            IrTypeDecl::StructFwd(name) => {
                self.line(&format!("typedef struct {} {};", name, name));
            }
            IrTypeDecl::Typedef { name, c_type } => {
                self.line(&format!("typedef {} {};", c_type, name));
            }
            IrTypeDecl::FnPtr { name, ret, params } => {
                let params = if params.is_empty() {
                    "void".to_string()
                } else {
                    params.join(", ")
                };
                self.line(&format!("typedef {} (*{})({});", ret, name, params));
            }
            IrTypeDecl::EnumDef { name, variants } => {
                self.line("typedef enum {");
                self.indent += 1;
                for (vname, value) in variants {
                    match value {
                        Some(v) => self.line(&format!("{} = {},", vname, v)),
                        None => self.line(&format!("{},", vname)),
                    }
                }
                self.indent -= 1;
                self.line(&format!("}} {};", name));
            }
        }
    }

    fn emit_struct(&mut self, def: &IrStruct) {
        self.line(&format!("struct {} {{", def.name));
        self.indent += 1;
        for field in &def.fields {
            self.line(&format!("{} {};", field.c_type, field.name));
        }
        self.indent -= 1;
        self.line("};");
        self.blank();
    }

    fn emit_global(&mut self, global: &IrGlobal) {
        let mut text = String::new();
        if global.is_static {
            text.push_str("static ");
        }
        if global.is_const {
            text.push_str("const ");
        }
        write!(text, "{} {}", global.c_type, global.name).expect("string write");
        if let Some(init) = &global.init {
            write!(text, " = {}", self.expr_text(init)).expect("string write");
        }
        text.push(';');
        self.line(&text);
    }

    fn proto_text(&self, proto: &IrProto) -> String {
        let params = if proto.params.is_empty() {
            "void".to_string()
        } else {
            proto
                .params
                .iter()
                .map(|p| format!("{} {}", p.c_type, p.name))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let storage = if proto.is_static { "static " } else { "" };
        format!("{}{} {}({})", storage, proto.ret, proto.name, params)
    }

    fn emit_function(&mut self, func: &IrFunction) {
        let header = self.proto_text(&func.proto);
        self.line(&format!("{} {{", header));
        self.indent += 1;
        self.emit_block_stmts(&func.body);
        self.indent -= 1;
        self.line("}");
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn emit_block_stmts(&mut self, block: &IrBlock) {
        for stmt in &block.stmts {
            self.emit_stmt(stmt);
        }
    }

    fn emit_stmt(&mut self, stmt: &IrStmt) {
        match stmt {
            IrStmt::VarDecl { c_type, name, init } => match init {
                Some(init) => {
                    let init = self.expr_text(init);
                    self.line(&format!("{} {} = {};", c_type, name, init));
                }
                None => self.line(&format!("{} {};", c_type, name)),
            },
            IrStmt::Assign { target, op, value } => {
                let t = self.expr_text(target);
                let v = self.expr_text(value);
                self.line(&format!("{} {} {};", t, op, v));
            }
            IrStmt::ExprStmt(e) => {
                let text = self.expr_text(e);
                self.line(&format!("{};", text));
            }
            IrStmt::If {
                cond,
                then_block,
                else_block,
            } => {
                let cond = self.expr_text(cond);
                self.line(&format!("if ({}) {{", cond));
                self.indent += 1;
                self.emit_block_stmts(then_block);
                self.indent -= 1;
                match else_block {
                    Some(else_block) => {
                        self.line("} else {");
                        self.indent += 1;
                        self.emit_block_stmts(else_block);
                        self.indent -= 1;
                        self.line("}");
                    }
                    None => self.line("}"),
                }
            }
            IrStmt::While { cond, body } => {
                let cond = self.expr_text(cond);
                self.line(&format!("while ({}) {{", cond));
                self.indent += 1;
                self.emit_block_stmts(body);
                self.indent -= 1;
                self.line("}");
            }
            IrStmt::For {
                init,
                cond,
                update,
                body,
            } => {
                let init = init.as_ref().map(|s| self.stmt_inline(s)).unwrap_or_default();
                let cond = cond.as_ref().map(|e| self.expr_text(e)).unwrap_or_default();
                let update = update.as_ref().map(|e| self.expr_text(e)).unwrap_or_default();
                self.line(&format!("for ({}; {}; {}) {{", init, cond, update));
                self.indent += 1;
                self.emit_block_stmts(body);
                self.indent -= 1;
                self.line("}");
            }
            IrStmt::Switch { value, cases } => {
                let value = self.expr_text(value);
                self.line(&format!("switch ({}) {{", value));
                for case in cases {
                    self.emit_case(case);
                }
                self.line("}");
            }
            IrStmt::Return(value) => match value {
                Some(v) => {
                    let v = self.expr_text(v);
                    self.line(&format!("return {};", v));
                }
                None => self.line("return;"),
            },
            IrStmt::Break => self.line("break;"),
            IrStmt::Continue => self.line("continue;"),
            IrStmt::Block(inner) => {
                self.line("{");
                self.indent += 1;
                self.emit_block_stmts(inner);
                self.indent -= 1;
                self.line("}");
            }
            IrStmt::RawC { text, .. } => {
                for raw_line in text.lines() {
                    self.line(raw_line);
                }
            }
        }
    }

    fn emit_case(&mut self, case: &IrCase) {
        match &case.value {
            Some(v) => {
                let v = self.expr_text(v);
                self.line(&format!("case {}: {{", v));
            }
            None => self.line("default: {"),
        }
        self.indent += 1;
        for stmt in &case.body {
            self.emit_stmt(stmt);
        }
        self.indent -= 1;
        self.line("}");
    }

    /// Render a statement without indentation or trailing `;`, for for-loop
    /// headers.
    fn stmt_inline(&self, stmt: &IrStmt) -> String {
        match stmt {
            IrStmt::VarDecl { c_type, name, init } => match init {
                Some(init) => format!("{} {} = {}", c_type, name, self.expr_text(init)),
                None => format!("{} {}", c_type, name),
            },
            IrStmt::Assign { target, op, value } => {
                format!("{} {} {}", self.expr_text(target), op, self.expr_text(value))
            }
            IrStmt::ExprStmt(e) => self.expr_text(e),
            _ => String::new(),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expr_text(&self, e: &IrExpr) -> String {
        match e {
            IrExpr::Literal(text) => text.clone(),
            IrExpr::Var(name) => name.clone(),
            IrExpr::BinOp { op, left, right } => {
                format!("({} {} {})", self.expr_text(left), op, self.expr_text(right))
            }
            IrExpr::UnaryOp { op, operand, prefix } => {
                if *prefix {
                    format!("({}{})", op, self.expr_text(operand))
                } else {
                    format!("({}{})", self.expr_text(operand), op)
                }
            }
            IrExpr::Call { callee, args, .. } => {
                let args: Vec<String> = args.iter().map(|a| self.expr_text(a)).collect();
                let callee_text = match &**callee {
                    IrExpr::Var(name) => name.clone(),
                    other => format!("({})", self.expr_text(other)),
                };
                format!("{}({})", callee_text, args.join(", "))
            }
            IrExpr::Member { base, field, arrow } => {
                let op = if *arrow { "->" } else { "." };
                format!("{}{}{}", self.expr_text(base), op, field)
            }
            IrExpr::Index { base, index } => {
                format!("{}[{}]", self.expr_text(base), self.expr_text(index))
            }
            IrExpr::Cast { c_type, value } => {
                format!("(({}){})", c_type, self.expr_text(value))
            }
            IrExpr::Sizeof(operand) => format!("sizeof({})", operand),
            IrExpr::Compound { c_type, items } => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|(designator, value)| match designator {
                        Some(d) => format!(".{} = {}", d, self.expr_text(value)),
                        None => self.expr_text(value),
                    })
                    .collect();
                format!("(({}){{{}}})", c_type, parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::nodes::IrParam;

    #[test]
    fn renders_function() {
        let module = IrModule {
            includes: vec!["stdio.h".to_string()],
            functions: vec![IrFunction {
                proto: IrProto {
                    ret: "int".to_string(),
                    name: "main".to_string(),
                    params: Vec::new(),
                    is_static: false,
                },
                body: IrBlock::new(vec![
                    IrStmt::expr(IrExpr::call(
                        "printf",
                        vec![IrExpr::lit("\"hi\\n\"")],
                    )),
                    IrStmt::Return(Some(IrExpr::lit("0"))),
                ]),
            }],
            ..Default::default()
        };
        let c = emit(&module);
        assert!(c.contains("#include <stdio.h>"));
        assert!(c.contains("int main(void) {"));
        assert!(c.contains("printf(\"hi\\n\");"));
        assert!(c.contains("return 0;"));
    }

    #[test]
    fn renders_member_chains_and_casts() {
        let e = IrExpr::cast(
            "Animal*",
            IrExpr::arrow(IrExpr::var("dog"), "parent"),
        );
        let emitter = CEmitter {
            out: String::new(),
            indent: 0,
        };
        assert_eq!(emitter.expr_text(&e), "((Animal*)dog->parent)");
    }

    #[test]
    fn for_header_is_inline() {
        let stmt = IrStmt::For {
            init: Some(Box::new(IrStmt::var_decl("int", "i", Some(IrExpr::lit("0"))))),
            cond: Some(IrExpr::binop(IrExpr::var("i"), "<", IrExpr::var("n"))),
            update: Some(IrExpr::postfix("++", IrExpr::var("i"))),
            body: IrBlock::default(),
        };
        let mut emitter = CEmitter {
            out: String::new(),
            indent: 0,
        };
        emitter.emit_stmt(&stmt);
        assert!(emitter.out.contains("for (int i = 0; (i < n); (i++)) {"));
    }

    #[test]
    fn emits_protos_before_structs() {
        let module = IrModule {
            protos: vec![IrProto {
                ret: "void".to_string(),
                name: "Counter_inc".to_string(),
                params: vec![IrParam {
                    c_type: "Counter*".to_string(),
                    name: "self".to_string(),
                }],
                is_static: false,
            }],
            structs: vec![IrStruct {
                name: "Counter".to_string(),
                fields: Vec::new(),
            }],
            ..Default::default()
        };
        let c = emit(&module);
        let proto_at = c.find("Counter_inc").expect("proto emitted");
        let struct_at = c.find("struct Counter {").expect("struct emitted");
        assert!(proto_at < struct_at);
    }
}
