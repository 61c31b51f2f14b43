//! Pipeline-level invariants: grammar closure, vtable monotonicity, helper
//! closure, ARC neutrality, and the dump surfaces.

use btrc::ir::helpers;
use btrc::pipeline::{self, DumpStage};
use btrc::{compile_source, GrammarInfo, Lexer};

fn grammar() -> GrammarInfo {
    GrammarInfo::bundled().unwrap()
}

fn compile(src: &str) -> String {
    compile_source(src, "test.btrc", &grammar())
        .unwrap_or_else(|e| panic!("compilation failed:\n{}", e))
        .code
}

// ============================================================================
// Grammar closure
// ============================================================================

#[test]
fn every_lexed_kind_is_declared_by_the_grammar() {
    let gi = grammar();
    let source = "\
        abstract class A<T> extends B implements C {\n\
            private int x = 0;\n\
            public override keep string m(keep T t = null) { return null; }\n\
            ~A() { }\n\
        }\n\
        int main() {\n\
            var a = 1 + 2 * 3 / 4 % 5 - ~6;\n\
            a <<= 1; a >>= 1; a &= 1; a |= 1; a ^= 1;\n\
            a += 1; a -= 1; a *= 2; a /= 2; a %= 2;\n\
            bool b = a == 1 || a != 2 && a < 3 && a > 4 && a <= 5 && a >= 6;\n\
            int c = a << 1 | a >> 1 & a ^ 1;\n\
            a++; a--; ++a; --a;\n\
            string? s = null;\n\
            var t = s ?? \"x\";\n\
            var u = s?.len;\n\
            var v = b ? 1 : 2;\n\
            float f = 1.5f;\n\
            char ch = 'c';\n\
            var fs = f\"{a}\";\n\
            int[3] w; for (int i = 0; i < 3; i++) { continue; }\n\
            do { break; } while (true);\n\
            switch (a) { case 1: break; default: break; }\n\
            try { throw \"x\"; } catch (string e) { } finally { }\n\
            delete s; spawn (() => { }); goto lab;\n\
            return sizeof(int);\n\
        }";
    let (tokens, _) = Lexer::new(source, &gi).tokenize();
    for token in tokens {
        assert!(
            gi.declares(token.kind),
            "token kind {} is not declared by the grammar",
            token.kind.name()
        );
    }
}

// ============================================================================
// Helper closure
// ============================================================================

#[test]
fn emitted_helpers_are_the_transitive_closure() {
    let c = compile(
        "int main() { string s = \"  x \"; print(s.trim()); return 0; }",
    );
    // trim is strings.transform; its deps (string.pool, alloc) must ride
    // along...
    assert!(c.contains("/* --- runtime: strings.transform --- */"));
    assert!(c.contains("/* --- runtime: string.pool --- */"));
    assert!(c.contains("/* --- runtime: alloc --- */"));
    // ...and unrelated categories must not.
    assert!(!c.contains("/* --- runtime: trycatch --- */"));
    assert!(!c.contains("/* --- runtime: arc.cycle --- */"));
    assert!(!c.contains("/* --- runtime: threads --- */"));
}

#[test]
fn helper_fragments_appear_in_dependency_order() {
    let c = compile(
        "int main() { string s = \"a\"; print(s.trim()); return 0; }",
    );
    let pool_at = c.find("/* --- runtime: string.pool --- */").unwrap();
    let alloc_at = c.find("/* --- runtime: alloc --- */").unwrap();
    let transform_at = c.find("/* --- runtime: strings.transform --- */").unwrap();
    assert!(alloc_at < pool_at);
    assert!(pool_at < transform_at);
}

#[test]
fn registry_dependencies_are_acyclic_and_ordered() {
    let reg = helpers::registry();
    for (i, cat) in reg.iter().enumerate() {
        for dep in cat.depends_on {
            let pos = reg.iter().position(|c| c.name == *dep);
            assert!(pos.is_some(), "{} depends on unknown {}", cat.name, dep);
            assert!(pos.unwrap() < i, "{} must follow {}", cat.name, dep);
        }
    }
}

// ============================================================================
// ARC neutrality
// ============================================================================

#[test]
fn keepless_programs_have_no_retain_release() {
    let c = compile(
        "class Node {\n\
             public int value = 0;\n\
             public Node(int value) { self.value = value; }\n\
         }\n\
         int main() {\n\
             Node a = new Node(1);\n\
             Node b = new Node(2);\n\
             int sum = a.value + b.value;\n\
             delete a;\n\
             delete b;\n\
             print(f\"{sum}\");\n\
             return 0;\n\
         }",
    );
    // delete still decrements, but no retain and no scope releases exist.
    assert!(!c.contains("__rc++"));
    assert!(!c.contains("__btrc_register_cleanup"));
    assert!(!c.contains("__btrc_suspect"));
}

#[test]
fn keep_turns_the_machinery_on() {
    let c = compile(
        "class Node { }\n\
         class Holder {\n\
             public Node? item = null;\n\
             public void put(keep Node n) { self.item = n; }\n\
         }\n\
         int main() {\n\
             Holder h = new Holder();\n\
             Node n = new Node();\n\
             h.put(n);\n\
             release n;\n\
             delete h;\n\
             return 0;\n\
         }",
    );
    assert!(c.contains("__rc++"));
}

// ============================================================================
// Vtable monotonicity (via emitted layout)
// ============================================================================

#[test]
fn vtable_slots_are_append_only() {
    let c = compile(
        "class Base {\n\
             public int first() { return 1; }\n\
             public int second() { return 2; }\n\
         }\n\
         class Derived extends Base {\n\
             public override int second() { return 20; }\n\
             public int third() { return 3; }\n\
         }\n\
         int main() {\n\
             Base b = Derived();\n\
             return b.second() - 20;\n\
         }",
    );
    // Base slots in declaration order, Derived appends.
    let base_struct = &c[c.find("struct Base_VT {").unwrap()..];
    let first_at = base_struct.find("(*first)").unwrap();
    let second_at = base_struct.find("(*second)").unwrap();
    assert!(first_at < second_at);

    let derived_struct = &c[c.find("struct Derived_VT {").unwrap()..];
    let d_first = derived_struct.find("(*first)").unwrap();
    let d_second = derived_struct.find("(*second)").unwrap();
    let d_third = derived_struct.find("(*third)").unwrap();
    assert!(d_first < d_second && d_second < d_third);
}

// ============================================================================
// Dumps and exit-code surfaces
// ============================================================================

#[test]
fn token_dump_is_one_per_line() {
    let dump = pipeline::dump_stage(
        "int main() { return 0; }",
        "t.btrc",
        &grammar(),
        DumpStage::Tokens,
    )
    .unwrap();
    let lines: Vec<&str> = dump.lines().collect();
    assert!(lines.len() > 5);
    assert!(lines[0].contains("INT"));
    assert!(lines.last().unwrap().contains("EOF"));
}

#[test]
fn ast_dump_is_canonical_debug() {
    let dump = pipeline::dump_stage(
        "int main() { return 0; }",
        "t.btrc",
        &grammar(),
        DumpStage::Ast,
    )
    .unwrap();
    assert!(dump.contains("Program"));
    assert!(dump.contains("Function"));
}

#[test]
fn ir_dump_shows_module_structure() {
    let dump = pipeline::dump_stage(
        "int main() { string s = \"a\".trim(); return 0; }",
        "t.btrc",
        &grammar(),
        DumpStage::Ir,
    )
    .unwrap();
    assert!(dump.contains("IrModule"));
    // Before optimization the registered category set is unpruned.
    assert!(dump.contains("strings.transform"));
}

#[test]
fn optimized_ir_dump_prunes_helpers() {
    let unopt = pipeline::dump_stage(
        "int main() { return 0; }",
        "t.btrc",
        &grammar(),
        DumpStage::Ir,
    )
    .unwrap();
    let opt = pipeline::dump_stage(
        "int main() { return 0; }",
        "t.btrc",
        &grammar(),
        DumpStage::OptimizedIr,
    )
    .unwrap();
    // Nothing to prune in either for an empty program; both parse as
    // module dumps.
    assert!(unopt.contains("IrModule"));
    assert!(opt.contains("IrModule"));
}

// ============================================================================
// Warnings pass through without blocking
// ============================================================================

#[test]
fn warnings_do_not_block_compilation() {
    let out = compile_source(
        "class Node { public int value = 0; }\n\
         int f(Node? n) { return n.value; }\n\
         int main() { return 0; }",
        "t.btrc",
        &grammar(),
    )
    .unwrap();
    assert!(!out.warnings.is_empty());
    assert!(out.code.contains("int main(void)"));
}

// ============================================================================
// Includes
// ============================================================================

#[test]
fn includes_resolve_once() {
    let dir = std::env::temp_dir().join("btrc_include_test");
    std::fs::create_dir_all(&dir).unwrap();
    let lib = dir.join("lib.btrc");
    let main_file = dir.join("main.btrc");
    std::fs::write(&lib, "int helper() { return 7; }\n").unwrap();
    std::fs::write(
        &main_file,
        "#include \"lib.btrc\"\n#include \"lib.btrc\"\nint main() { return helper() - 7; }\n",
    )
    .unwrap();

    let source = std::fs::read_to_string(&main_file).unwrap();
    let mut included = std::collections::HashSet::new();
    let resolved = pipeline::resolve_includes(&source, &main_file, &mut included).unwrap();
    // Included once despite the duplicate directive.
    assert_eq!(resolved.matches("int helper()").count(), 1);

    let c = compile(&resolved);
    assert!(c.contains("int helper(void)"));
}
