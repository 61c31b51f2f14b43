//! IR optimizer: dead-helper elimination.
//!
//! A single pass that computes the set of helper categories transitively
//! reachable from emitted code — `helper_ref` tags on calls, `RawC`
//! scaffolding, and the instantiated collection sections — closes it over
//! the registry's category dependencies, and prunes the module's category
//! set to that closure. Nothing else in the module is touched.

use std::collections::BTreeSet;

use super::helpers;
use super::nodes::{IrBlock, IrExpr, IrModule, IrStmt};

pub fn optimize(module: &mut IrModule) {
    eliminate_dead_helpers(module);
}

fn eliminate_dead_helpers(module: &mut IrModule) {
    if module.helper_categories.is_empty() {
        return;
    }

    let mut used: BTreeSet<String> = BTreeSet::new();

    for func in &module.functions {
        collect_block(&func.body, &mut used);
    }
    for global in &module.globals {
        if let Some(init) = &global.init {
            collect_expr(init, &mut used);
        }
    }

    // Text sections (collection bodies, setjmp scaffolding) reference
    // helpers by name rather than through `helper_ref`; scan them for each
    // category's entry-point symbols.
    let mut texts: Vec<&str> = module.generated.iter().map(String::as_str).collect();
    let mut raw_texts = Vec::new();
    for func in &module.functions {
        collect_raw_texts(&func.body, &mut raw_texts);
    }
    texts.extend(raw_texts);
    for cat in helpers::registry() {
        if used.contains(cat.name) {
            continue;
        }
        if texts
            .iter()
            .any(|t| cat.symbols.iter().any(|sym| t.contains(sym)))
        {
            used.insert(cat.name.to_string());
        }
    }

    // Transitive closure over category dependencies.
    let mut closure: BTreeSet<String> = BTreeSet::new();
    let mut worklist: Vec<String> = used.into_iter().collect();
    while let Some(name) = worklist.pop() {
        if !closure.insert(name.clone()) {
            continue;
        }
        if let Some(cat) = helpers::category(&name) {
            for dep in cat.depends_on {
                if !closure.contains(*dep) {
                    worklist.push((*dep).to_string());
                }
            }
        }
    }

    module.helper_categories = module
        .helper_categories
        .intersection(&closure)
        .cloned()
        .collect();
}

// ============================================================================
// Reference collection
// ============================================================================

fn collect_block(block: &IrBlock, used: &mut BTreeSet<String>) {
    for stmt in &block.stmts {
        collect_stmt(stmt, used);
    }
}

fn collect_stmt(stmt: &IrStmt, used: &mut BTreeSet<String>) {
    match stmt {
        IrStmt::VarDecl { init, .. } => {
            if let Some(init) = init {
                collect_expr(init, used);
            }
        }
        IrStmt::Assign { target, value, .. } => {
            collect_expr(target, used);
            collect_expr(value, used);
        }
        IrStmt::ExprStmt(e) => collect_expr(e, used),
        IrStmt::If {
            cond,
            then_block,
            else_block,
        } => {
            collect_expr(cond, used);
            collect_block(then_block, used);
            if let Some(e) = else_block {
                collect_block(e, used);
            }
        }
        IrStmt::While { cond, body } => {
            collect_expr(cond, used);
            collect_block(body, used);
        }
        IrStmt::For {
            init,
            cond,
            update,
            body,
        } => {
            if let Some(init) = init {
                collect_stmt(init, used);
            }
            if let Some(cond) = cond {
                collect_expr(cond, used);
            }
            if let Some(update) = update {
                collect_expr(update, used);
            }
            collect_block(body, used);
        }
        IrStmt::Switch { value, cases } => {
            collect_expr(value, used);
            for case in cases {
                if let Some(v) = &case.value {
                    collect_expr(v, used);
                }
                for s in &case.body {
                    collect_stmt(s, used);
                }
            }
        }
        IrStmt::Return(value) => {
            if let Some(v) = value {
                collect_expr(v, used);
            }
        }
        IrStmt::Block(inner) => collect_block(inner, used),
        IrStmt::RawC { helper_refs, .. } => {
            for r in helper_refs {
                used.insert(r.clone());
            }
        }
        IrStmt::Break | IrStmt::Continue => {}
    }
}

fn collect_expr(e: &IrExpr, used: &mut BTreeSet<String>) {
    match e {
        IrExpr::Call {
            callee,
            args,
            helper_ref,
        } => {
            if let Some(cat) = helper_ref {
                used.insert(cat.clone());
            }
            collect_expr(callee, used);
            for a in args {
                collect_expr(a, used);
            }
        }
        IrExpr::BinOp { left, right, .. } => {
            collect_expr(left, used);
            collect_expr(right, used);
        }
        IrExpr::UnaryOp { operand, .. } => collect_expr(operand, used),
        IrExpr::Member { base, .. } => collect_expr(base, used),
        IrExpr::Index { base, index } => {
            collect_expr(base, used);
            collect_expr(index, used);
        }
        IrExpr::Cast { value, .. } => collect_expr(value, used),
        IrExpr::Compound { items, .. } => {
            for (_, v) in items {
                collect_expr(v, used);
            }
        }
        IrExpr::Literal(_) | IrExpr::Var(_) | IrExpr::Sizeof(_) => {}
    }
}

fn collect_raw_texts<'m>(block: &'m IrBlock, out: &mut Vec<&'m str>) {
    for stmt in &block.stmts {
        match stmt {
            IrStmt::RawC { text, .. } => out.push(text),
            IrStmt::If {
                then_block,
                else_block,
                ..
            } => {
                collect_raw_texts(then_block, out);
                if let Some(e) = else_block {
                    collect_raw_texts(e, out);
                }
            }
            IrStmt::While { body, .. } | IrStmt::For { body, .. } => {
                collect_raw_texts(body, out)
            }
            IrStmt::Block(inner) => collect_raw_texts(inner, out),
            IrStmt::Switch { cases, .. } => {
                for case in cases {
                    for s in &case.body {
                        if let IrStmt::RawC { text, .. } = s {
                            out.push(text);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::nodes::{IrFunction, IrProto};

    fn module_with_call(category: &str, registered: &[&str]) -> IrModule {
        let mut module = IrModule::default();
        for r in registered {
            module.helper_categories.insert(r.to_string());
        }
        module.functions.push(IrFunction {
            proto: IrProto {
                ret: "void".to_string(),
                name: "f".to_string(),
                params: Vec::new(),
                is_static: false,
            },
            body: IrBlock::new(vec![IrStmt::expr(IrExpr::call_helper(
                "__btrc_str_concat",
                vec![],
                category,
            ))]),
        });
        module
    }

    #[test]
    fn unreferenced_categories_are_pruned() {
        let mut module = module_with_call(
            "strings.transform",
            &["strings.transform", "string.pool", "alloc", "trycatch", "hash"],
        );
        optimize(&mut module);
        let live: Vec<&str> = module.helper_categories.iter().map(String::as_str).collect();
        assert!(live.contains(&"strings.transform"));
        // Transitive deps survive...
        assert!(live.contains(&"string.pool"));
        assert!(live.contains(&"alloc"));
        // ...unreferenced categories do not.
        assert!(!live.contains(&"trycatch"));
        assert!(!live.contains(&"hash"));
    }

    #[test]
    fn generated_text_keeps_categories_alive() {
        let mut module = IrModule::default();
        for r in ["alloc", "hash", "trycatch"] {
            module.helper_categories.insert(r.to_string());
        }
        module
            .generated
            .push("x = __btrc_hash_str(k);".to_string());
        optimize(&mut module);
        assert!(module.helper_categories.contains("hash"));
        assert!(!module.helper_categories.contains("trycatch"));
    }
}
