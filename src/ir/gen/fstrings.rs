//! F-string lowering.
//!
//! An f-string becomes a bounded stack buffer filled by a series of
//! `snprintf` appends, one per chunk, each carrying its leading text and
//! either the chunk's explicit format specifier (`{x:.2f}`) or a default
//! chosen from the expression's resolved type. The value of the whole
//! expression is a tracked heap copy of the buffer, so f-strings can be
//! stored and returned like any other string.

use crate::analyzer::{Prim, Ty};
use crate::ast::FStringPart;
use crate::ir::nodes::{IrBlock, IrExpr, IrStmt};

use super::IrGenerator;

const BUF_SIZE: &str = "1024";

impl<'a> IrGenerator<'a> {
    pub fn lower_fstring(&mut self, parts: &[FStringPart]) -> IrExpr {
        // Pure text folds to a plain literal.
        if parts
            .iter()
            .all(|p| matches!(p, FStringPart::Text { .. }))
        {
            let mut text = String::new();
            for part in parts {
                if let FStringPart::Text { text: t } = part {
                    text.push_str(t);
                }
            }
            return IrExpr::lit(format!("\"{}\"", text));
        }

        self.use_helper("strings.transform");
        let buf = self.fresh_temp("__fstr");
        let off = format!("{}_off", buf);
        self.pending.push(IrStmt::VarDecl {
            c_type: "char".to_string(),
            name: format!("{}[{}]", buf, BUF_SIZE),
            init: None,
        });
        self.pending.push(IrStmt::var_decl(
            "int",
            off.clone(),
            Some(IrExpr::lit("0")),
        ));
        self.pending.push(IrStmt::assign(
            IrExpr::index(IrExpr::var(buf.clone()), IrExpr::lit("0")),
            IrExpr::lit("'\\0'"),
        ));

        // Each expression chunk takes the text before it along for the
        // ride; trailing text gets a final append of its own.
        let mut text_run = String::new();
        for part in parts {
            match part {
                FStringPart::Text { text } => {
                    text_run.push_str(&escape_percent(text));
                }
                FStringPart::Chunk { value, format } => {
                    let ty = self.expr_ty(value);
                    let mut arg = self.lower_expr(value);
                    let spec = match format {
                        Some(spec) => format!("%{}", spec),
                        None => self.default_spec(&ty, &mut arg),
                    };
                    let fmt = format!("{}{}", std::mem::take(&mut text_run), spec);
                    self.append_snprintf(&buf, &off, &fmt, Some(arg));
                }
            }
        }
        if !text_run.is_empty() {
            self.append_snprintf(&buf, &off, &text_run, None);
        }

        IrExpr::call_helper(
            "__btrc_str_dup",
            vec![IrExpr::var(buf)],
            "strings.transform",
        )
    }

    /// `if (off < size) off += snprintf(buf + off, size - off, fmt, arg);`
    fn append_snprintf(&mut self, buf: &str, off: &str, fmt: &str, arg: Option<IrExpr>) {
        let mut args = vec![
            IrExpr::binop(IrExpr::var(buf), "+", IrExpr::var(off)),
            IrExpr::binop(
                IrExpr::Sizeof(buf.to_string()),
                "-",
                IrExpr::cast("size_t", IrExpr::var(off)),
            ),
            IrExpr::lit(format!("\"{}\"", fmt)),
        ];
        if let Some(arg) = arg {
            args.push(arg);
        }
        let call = IrExpr::call("snprintf", args);
        self.pending.push(IrStmt::If {
            cond: IrExpr::binop(
                IrExpr::var(off),
                "<",
                IrExpr::cast("int", IrExpr::Sizeof(buf.to_string())),
            ),
            then_block: IrBlock::new(vec![IrStmt::Assign {
                target: IrExpr::var(off),
                op: "+=".to_string(),
                value: call,
            }]),
            else_block: None,
        });
    }

    /// Default conversion for a bare `{x}` chunk, picked from the resolved
    /// type; bools detour through a "true"/"false" temporary.
    fn default_spec(&mut self, ty: &Ty, arg: &mut IrExpr) -> String {
        match ty.unwrap_opt() {
            Ty::Prim(Prim::Str) => "%s".to_string(),
            Ty::Prim(Prim::Char) => "%c".to_string(),
            Ty::Prim(Prim::Float | Prim::Double) => "%g".to_string(),
            Ty::Prim(Prim::Long) => "%ld".to_string(),
            Ty::Prim(Prim::Bool) => {
                let tmp = self.fresh_temp("__b");
                let cond = std::mem::replace(arg, IrExpr::var(tmp.clone()));
                self.pending.push(IrStmt::var_decl(
                    "const char*",
                    tmp.clone(),
                    Some(IrExpr::lit("\"false\"")),
                ));
                self.pending.push(IrStmt::If {
                    cond,
                    then_block: IrBlock::new(vec![IrStmt::assign(
                        IrExpr::var(tmp),
                        IrExpr::lit("\"true\""),
                    )]),
                    else_block: None,
                });
                "%s".to_string()
            }
            Ty::Prim(_) | Ty::Enum(_) => "%d".to_string(),
            _ => {
                let inner = std::mem::replace(arg, IrExpr::null());
                *arg = IrExpr::cast("void*", inner);
                "%p".to_string()
            }
        }
    }
}

fn escape_percent(text: &str) -> String {
    text.replace('%', "%%")
}
